//! Mediashift - moves media between inline blobs and external files
//!
//! This library crate exposes the conversion engine for the CLI and for
//! integration testing.

pub mod config;
pub mod conversion;
pub mod jobs;
pub mod repository;
pub mod security;
