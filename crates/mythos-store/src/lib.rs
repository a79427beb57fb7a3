//! # mythos-store
//!
//! Local object store for Mythos creations, backed by SQLite.
//!
//! Three tables hold creations, image data URIs and text outputs. All
//! access goes through [`Database::read`] and [`Database::transaction`];
//! [`History`] layers the multi-table operations (create, regenerate,
//! delete, export/import, wipe) on top and is what applications use.

pub mod archive;
pub mod creations;
pub mod data_migrations;
pub mod database;
pub mod history;
pub mod images;
pub mod live;
pub mod migrations;
pub mod models;
pub mod outputs;
pub mod scope;

mod error;

pub use archive::{ArchiveError, ExportArchive, ImportMode, ImportSource};
pub use database::Database;
pub use error::{Result, StoreError};
pub use history::{CreatedCreation, History, ImportStats, NewCreation, StoreStats};
pub use live::SubscriptionId;
pub use models::*;
pub use scope::{Scope, Table};
