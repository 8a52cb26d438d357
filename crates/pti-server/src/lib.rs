//! PTI server - HTTP image host.
//!
//! Accepts image uploads, stores them in a flat directory, records each one
//! in SQLite under a random eight-character hexcode, and serves them back
//! at `/<hexcode>.<ext>`.

pub mod api;
pub mod audit;
pub mod config;
pub mod db;
pub mod storage;

pub use api::router;
pub use audit::{AuditReport, audit};
pub use config::{Config, NamingStrategy};
pub use db::{DbError, ImageDb, ImageRecord, NewImage};
pub use storage::{ByteStream, FsStorage, ObjectMeta, Storage, StorageError};
