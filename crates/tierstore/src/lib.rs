//! # tierstore
//!
//! Namespaced on-disk blob store used as the persistent tier of tiercache.
//!
//! ## Design
//! - One directory per namespace, one file per key
//! - Self-describing blob header so truncated files are detected on read
//! - Atomic replace via write-to-temp + rename

#![warn(missing_docs)]

mod error;
mod parser;
mod storage;

pub use error::{Error, Result};
pub use storage::{validate_name, BlobStore};
