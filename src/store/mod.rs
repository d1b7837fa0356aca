//! Key-value store layer
//!
//! Each entry is framed with [`encode`] and written as one backend object
//! per key.

mod envelope;
mod kv;

pub use envelope::{decode, encode};
pub use kv::{KeyValueStore, Keys, SetOptions};
