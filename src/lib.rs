//! # blobkv
//!
//! A minimal cross-machine key-value store backed by object storage.
//!
//! blobkv moves small artifacts (config values, tensors, structured records)
//! between machines through an S3-compatible bucket, without any shared
//! service besides the bucket itself. Every operation is a blocking round
//! trip of typically a few hundred milliseconds, so it is meant for handing
//! values between jobs, not for use inside a training loop.
//!
//! ## Core Concepts
//!
//! - **Keys**: user-chosen strings, namespaced per user in the bucket
//! - **Values**: a closed set of typed payloads, including numeric arrays
//!   that keep their dtype and shape
//! - **Backends**: S3, a shared directory, or memory
//!
//! ## Example
//!
//! ```ignore
//! use blobkv::{KeyValueStore, StoreConfig};
//!
//! let store = KeyValueStore::from_config(&StoreConfig::load()?)?;
//! store.set("my_name", "Bob")?;
//! let name: String = store.get_as("my_name")?;
//! ```

pub mod backend;
pub mod config;
pub mod model;
pub mod store;

mod error;

pub use backend::{Backend, FileBackend, MemoryBackend, S3Backend, S3Config};
pub use config::{BackendKind, StoreConfig};
pub use error::{Error, ErrorKind, Result};
pub use model::{DType, Entry, EntryMeta, IntoKey, Key, NdArray, Value};
pub use store::{KeyValueStore, SetOptions};

/// Entry format version
pub const FORMAT_VERSION: u8 = 1;

/// Magic bytes at the start of every stored entry
pub const MAGIC: &[u8; 4] = b"BLKV";
