//! Small JSON state files (sync schedule, last sync status)
//!
//! Every write goes to a sibling temp file first and is then renamed over the
//! target, so a concurrent reader sees either the old or the new document and
//! never a half-written one.

pub mod error;
pub mod store;

pub use error::{Result, StateError};
pub use store::JsonFile;
