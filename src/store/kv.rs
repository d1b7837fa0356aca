//! Key-value store over a blob backend

use super::envelope;
use crate::backend::{
    Backend, FileBackend, MemoryBackend, ObjectListing, PutOptions, S3Backend,
};
use crate::config::{BackendKind, StoreConfig};
use crate::model::{Entry, EntryMeta, IntoKey, Key, Namespace, Value};
use crate::{Error, Result};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Options for [`KeyValueStore::set_with`]
#[derive(Clone, Debug, Default)]
pub struct SetOptions {
    /// Advisory lifetime of the entry
    pub ttl: Option<Duration>,
}

impl SetOptions {
    pub fn ttl(ttl: Duration) -> Self {
        SetOptions { ttl: Some(ttl) }
    }
}

/// A key-value store whose entries live as objects in a blob backend
///
/// Every operation is one or two blocking round trips to the backend; the
/// store keeps no state between calls besides its configuration. Writers on
/// different machines race with last-write-wins semantics, and a read that
/// overlaps a concurrent delete may see either outcome.
///
/// ```ignore
/// use blobkv::{KeyValueStore, StoreConfig};
///
/// let store = KeyValueStore::from_config(&StoreConfig::load()?)?;
/// store.set("my_name", "Bob")?;
/// assert_eq!(store.get("my_name")?, "Bob".into());
/// ```
pub struct KeyValueStore {
    backend: Arc<dyn Backend>,
    namespace: Namespace,
}

impl KeyValueStore {
    /// Create a store over an existing backend, scoped to `namespace`
    pub fn new(backend: impl Backend + 'static, namespace: &str) -> Result<Self> {
        Self::with_backend(Arc::new(backend), namespace)
    }

    /// Create a store over a shared backend handle
    pub fn with_backend(backend: Arc<dyn Backend>, namespace: &str) -> Result<Self> {
        Ok(KeyValueStore {
            backend,
            namespace: Namespace::new(namespace)?,
        })
    }

    /// Build the configured backend and a store over it
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let backend: Arc<dyn Backend> = match config.backend {
            BackendKind::S3 => Arc::new(S3Backend::new(config.s3_config()?)?),
            BackendKind::File => {
                let root = config
                    .root
                    .as_ref()
                    .ok_or_else(|| Error::Configuration("missing root directory".into()))?;
                Arc::new(FileBackend::open(root)?)
            }
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
        };
        info!(backend = %backend.describe(), user = %config.user, "opened store");
        Self::with_backend(backend, &config.user)
    }

    /// The backend this store writes to
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Backend object name for a key
    pub fn object_name<K>(&self, key: K) -> Result<String>
    where
        K: IntoKey,
    {
        Ok(self.namespace.object_name(&key.into_key()?))
    }

    // === Operations ===

    /// Store a value, replacing any existing entry for the key
    pub fn set<K, V>(&self, key: K, value: V) -> Result<()>
    where
        K: IntoKey,
        V: Into<Value>,
    {
        self.set_with(key, value, &SetOptions::default())
    }

    /// Store a value with explicit options
    pub fn set_with<K, V>(&self, key: K, value: V, options: &SetOptions) -> Result<()>
    where
        K: IntoKey,
        V: Into<Value>,
    {
        let key = key.into_key()?;
        let value = value.into();
        value.validate()?;

        let entry = Entry::new(value, EntryMeta::now(options.ttl));
        let data = envelope::encode(&entry)?;
        let name = self.namespace.object_name(&key);
        debug!(key = %key, object = %name, bytes = data.len(), "set");

        let put = PutOptions {
            expires_at: entry.meta.expires_at,
        };
        self.backend.put(&name, Bytes::from(data), &put)
    }

    /// Read the value stored under a key
    pub fn get<K>(&self, key: K) -> Result<Value>
    where
        K: IntoKey,
    {
        Ok(self.get_entry(key)?.value)
    }

    /// Read a value along with its metadata
    pub fn get_entry<K>(&self, key: K) -> Result<Entry>
    where
        K: IntoKey,
    {
        let key = key.into_key()?;
        self.read(&key)
    }

    /// Read a value and convert it to a Rust type
    pub fn get_as<K, T>(&self, key: K) -> Result<T>
    where
        K: IntoKey,
        T: TryFrom<Value, Error = Error>,
    {
        T::try_from(self.get(key)?)
    }

    /// Delete the entry for a key; fails if there is none
    pub fn unset<K>(&self, key: K) -> Result<()>
    where
        K: IntoKey,
    {
        let key = key.into_key()?;
        let name = self.namespace.object_name(&key);
        debug!(key = %key, object = %name, "unset");
        self.backend
            .delete(&name)
            .map_err(|e| not_found_as_key(e, &key))
    }

    /// Read and delete an entry.
    ///
    /// The entry is deleted only after it has been read and decoded, so a
    /// corrupt entry stays in place for inspection or retry. If another
    /// client deletes the entry between the read and the delete, this
    /// reports `KeyNotFound` rather than returning a value someone else
    /// already consumed.
    pub fn pop<K>(&self, key: K) -> Result<Value>
    where
        K: IntoKey,
    {
        let key = key.into_key()?;
        let entry = self.read(&key)?;

        let name = self.namespace.object_name(&key);
        debug!(key = %key, object = %name, "pop");
        self.backend
            .delete(&name)
            .map_err(|e| not_found_as_key(e, &key))?;
        Ok(entry.value)
    }

    /// Whether an entry exists for a key
    pub fn contains<K>(&self, key: K) -> Result<bool>
    where
        K: IntoKey,
    {
        let key = key.into_key()?;
        self.backend.exists(&self.namespace.object_name(&key))
    }

    /// Lazily enumerate the keys in this store's namespace.
    ///
    /// Backend pages are fetched as the iterator advances. The result
    /// reflects the backend at roughly the time of listing; entries written
    /// or deleted meanwhile may or may not appear.
    pub fn list_keys(&self) -> Keys<'_> {
        Keys {
            listing: ObjectListing::new(self.backend.as_ref(), self.namespace.prefix()),
            namespace: &self.namespace,
        }
    }

    fn read(&self, key: &Key) -> Result<Entry> {
        let name = self.namespace.object_name(key);
        debug!(key = %key, object = %name, "get");
        let data = self
            .backend
            .get(&name)
            .map_err(|e| not_found_as_key(e, key))?;
        envelope::decode(&data).map_err(|e| match e {
            Error::Deserialization(msg) => Error::Deserialization(format!("{}: {}", key, msg)),
            other => other,
        })
    }
}

/// Backend "no such object" becomes "no such key", naming the user's key
fn not_found_as_key(err: Error, key: &Key) -> Error {
    match err {
        Error::ObjectNotFound(_) => Error::KeyNotFound(key.to_string()),
        other => other,
    }
}

/// Iterator returned by [`KeyValueStore::list_keys`]
pub struct Keys<'a> {
    listing: ObjectListing<'a>,
    namespace: &'a Namespace,
}

impl Iterator for Keys<'_> {
    type Item = Result<Key>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.listing.next()? {
                Ok(name) => {
                    // Names that cannot be keys were not written by a store
                    if let Some(key) = self.namespace.key_for(&name) {
                        return Some(Ok(key));
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
