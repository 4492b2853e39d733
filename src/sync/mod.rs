//! Content synchronization engine.
//!
//! A sync fetches the manifest, verifies or downloads every listed file with
//! bounded parallelism and then deletes whatever the manifest no longer lists.
//! Downloads land in a `.tmp` sibling and are renamed into place only after
//! their size and SHA-256 check out, so a cached file is never half-written.

pub mod client;
pub mod download;
pub mod error;
pub mod filename;
pub mod gc;
pub mod models;
pub mod service;
pub mod verify;

pub use client::{ClientConfig, FetchError, SyncClient};
pub use download::DownloadError;
pub use error::{ItemFailure, SyncError};
pub use filename::{InvalidFilename, validate_filename};
pub use models::{ManifestItem, SyncReport, SyncStatus};
pub use service::{SyncService, SyncSettings};
