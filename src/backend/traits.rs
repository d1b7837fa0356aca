//! Blob backend trait definition

use crate::Result;
use bytes::Bytes;

/// Options passed along with a put
#[derive(Clone, Debug, Default)]
pub struct PutOptions {
    /// Advisory expiry (unix seconds), forwarded as object metadata
    pub expires_at: Option<u64>,
}

/// One page of an object listing
#[derive(Clone, Debug, Default)]
pub struct ObjectPage {
    pub names: Vec<String>,
    /// Token for the next page, `None` on the last page
    pub next: Option<String>,
}

/// Named-blob storage capability the key-value store is built on
///
/// Implementations:
/// - S3-compatible object storage over HTTP
/// - A local (or network-mounted) directory
/// - Process memory, for tests
///
/// `get` and `delete` must fail with [`crate::Error::ObjectNotFound`] when the
/// object does not exist. `put` must replace the whole object atomically.
pub trait Backend: Send + Sync {
    /// Write an object, replacing any existing one
    fn put(&self, name: &str, data: Bytes, options: &PutOptions) -> Result<()>;

    /// Read a whole object
    fn get(&self, name: &str) -> Result<Bytes>;

    /// Delete an existing object
    fn delete(&self, name: &str) -> Result<()>;

    /// Check whether an object exists
    fn exists(&self, name: &str) -> Result<bool>;

    /// List object names starting with `prefix`, one page at a time
    fn list_page(&self, prefix: &str, token: Option<&str>) -> Result<ObjectPage>;

    /// Short backend description for logs
    fn describe(&self) -> String;
}

/// Lazy iterator over every object name under a prefix
///
/// Pages are fetched on demand. An error ends the iteration after it is
/// yielded.
pub struct ObjectListing<'a> {
    backend: &'a dyn Backend,
    prefix: String,
    buffer: std::vec::IntoIter<String>,
    next: Option<String>,
    done: bool,
}

impl<'a> ObjectListing<'a> {
    pub fn new(backend: &'a dyn Backend, prefix: impl Into<String>) -> Self {
        ObjectListing {
            backend,
            prefix: prefix.into(),
            buffer: Vec::new().into_iter(),
            next: None,
            done: false,
        }
    }
}

impl Iterator for ObjectListing<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(name) = self.buffer.next() {
                return Some(Ok(name));
            }
            if self.done {
                return None;
            }

            match self.backend.list_page(&self.prefix, self.next.as_deref()) {
                Ok(page) => {
                    self.done = page.next.is_none();
                    self.next = page.next;
                    self.buffer = page.names.into_iter();
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use parking_lot::Mutex;

    /// Serves fixed pages and counts requests
    struct PagedBackend {
        pages: Vec<Vec<&'static str>>,
        calls: Mutex<usize>,
        fail_at: Option<usize>,
    }

    impl Backend for PagedBackend {
        fn put(&self, _: &str, _: Bytes, _: &PutOptions) -> Result<()> {
            unimplemented!()
        }
        fn get(&self, _: &str) -> Result<Bytes> {
            unimplemented!()
        }
        fn delete(&self, _: &str) -> Result<()> {
            unimplemented!()
        }
        fn exists(&self, _: &str) -> Result<bool> {
            unimplemented!()
        }
        fn describe(&self) -> String {
            "paged".into()
        }

        fn list_page(&self, _prefix: &str, token: Option<&str>) -> Result<ObjectPage> {
            *self.calls.lock() += 1;
            let index: usize = token.map(|t| t.parse().unwrap()).unwrap_or(0);
            if self.fail_at == Some(index) {
                return Err(Error::BackendUnavailable("connection reset".into()));
            }
            let next = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());
            Ok(ObjectPage {
                names: self.pages[index].iter().map(|s| s.to_string()).collect(),
                next,
            })
        }
    }

    #[test]
    fn test_listing_is_lazy_and_pages() {
        let backend = PagedBackend {
            pages: vec![vec!["a", "b"], vec![], vec!["c"]],
            calls: Mutex::new(0),
            fail_at: None,
        };
        let mut listing = ObjectListing::new(&backend, "");
        assert_eq!(*backend.calls.lock(), 0);

        assert_eq!(listing.next().unwrap().unwrap(), "a");
        assert_eq!(*backend.calls.lock(), 1);

        let rest: Vec<String> = listing.map(|r| r.unwrap()).collect();
        assert_eq!(rest, vec!["b", "c"]);
        assert_eq!(*backend.calls.lock(), 3);
    }

    #[test]
    fn test_listing_stops_after_error() {
        let backend = PagedBackend {
            pages: vec![vec!["a"], vec!["b"]],
            calls: Mutex::new(0),
            fail_at: Some(1),
        };
        let items: Vec<Result<String>> = ObjectListing::new(&backend, "").collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(Error::BackendUnavailable(_))));
    }
}
