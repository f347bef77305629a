//! Mediashift-DB: Content repository schema, migrations, and query operations
//!
//! This crate stores the content tree that media conversion operates on:
//! records, their versions, the per-version media fields (external file path
//! and inline blob reference), and the inline blobs themselves. It uses SQLite
//! with rusqlite and r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching database schema
//! - `queries` - Database query operations
//!
//! # Example
//!
//! ```no_run
//! use mediashift_db::pool::{init_pool, get_conn};
//! use mediashift_db::queries::items::{self, NewItem};
//!
//! let pool = init_pool("/var/lib/mediashift/content.db").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let item = items::create_item(&conn, &NewItem::new("master", "images")).unwrap();
//! println!("Created item: {}", item.id);
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
