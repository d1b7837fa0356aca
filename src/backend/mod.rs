//! Pluggable blob backends
//!
//! The key-value store only needs put/get/delete/exists/list over named
//! blobs. S3-compatible object storage is the production backend; the
//! directory and in-memory backends serve shared filesystems and tests.

mod file;
mod memory;
mod s3;
mod traits;

pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use s3::{S3Backend, S3Config};
pub use traits::{Backend, ObjectListing, ObjectPage, PutOptions};
