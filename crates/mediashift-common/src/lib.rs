//! Mediashift-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across mediashift:
//!
//! - **Typed IDs**: Type-safe UUID wrappers for items, blobs and jobs
//! - **Core Types**: Media references, version keys, conversion direction, access rights
//! - **Size Formatting**: Human-readable byte counts for progress messages
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use mediashift_common::{ItemId, MediaReference, MediaVersion, Error, Result};
//! use mediashift_common::size::friendly_size;
//!
//! // Address a record and its shared media unit
//! let reference = MediaReference::new(ItemId::new(), "master");
//! let unit = MediaVersion::shared(reference);
//! assert!(unit.is_shared());
//!
//! assert_eq!(friendly_size(512), "512 bytes");
//!
//! // Use common error types
//! fn example() -> Result<()> {
//!     Err(Error::not_found("item"))
//! }
//! ```

pub mod error;
pub mod ids;
pub mod size;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
