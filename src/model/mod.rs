//! Core data model types for blobkv

mod entry;
mod key;
mod value;

pub use entry::{Entry, EntryMeta};
pub use key::{IntoKey, Key, Namespace, MAX_KEY_LEN};
pub use value::{DType, Element, NdArray, Value};
