//! In-memory backend for testing and single-process use

use super::{Backend, ObjectPage, PutOptions};
use crate::{Error, Result};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Objects kept in a shared map
///
/// Clones share the same map, so two stores built over clones of one
/// `MemoryBackend` see each other's writes, the way two machines share a
/// bucket.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    objects: Arc<RwLock<BTreeMap<String, Bytes>>>,
    page_size: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit listing pages to `page_size` names
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl Backend for MemoryBackend {
    fn put(&self, name: &str, data: Bytes, _options: &PutOptions) -> Result<()> {
        self.objects.write().insert(name.to_string(), data);
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Bytes> {
        self.objects
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ObjectNotFound(name.to_string()))
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.objects
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::ObjectNotFound(name.to_string()))
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.objects.read().contains_key(name))
    }

    fn list_page(&self, prefix: &str, token: Option<&str>) -> Result<ObjectPage> {
        let objects = self.objects.read();
        let limit = self.page_size.unwrap_or(usize::MAX);

        // The token is the last name returned; resume strictly after it
        let names = objects
            .keys()
            .filter(|name| name.starts_with(prefix))
            .filter(|name| token.map(|t| name.as_str() > t).unwrap_or(true));

        let mut page: Vec<String> = names.take(limit.saturating_add(1)).cloned().collect();
        let next = if page.len() > limit {
            page.truncate(limit);
            page.last().cloned()
        } else {
            None
        };
        Ok(ObjectPage { names: page, next })
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
