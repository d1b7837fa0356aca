//! S3-compatible object storage backend
//!
//! Built on `object_store`'s Amazon S3 client with path-style addressing
//! (`{endpoint}/{bucket}/{object}`), which works against AWS as well as
//! MinIO, Ceph and other self-hosted services. The client is async; each
//! call is driven to completion on a private current-thread runtime, so
//! these methods must not be called from inside another tokio runtime.
//!
//! Object names are split on `/` and each segment is percent-encoded the way
//! `object_store` encodes path parts, so names holding characters such as
//! `#`, `%` or `~` are stored under their encoded form. Names with empty
//! segments (`a//b`, a trailing `/`) cannot be represented and are rejected.

#![cfg_attr(not(feature = "s3"), allow(dead_code))]

#[cfg(all(test, feature = "s3"))]
mod fake;

/// Connection settings for an S3-compatible service
#[derive(Clone, Debug)]
pub struct S3Config {
    /// Service URL, e.g. `https://s3.example.org`
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Retries after the first attempt for transient failures
    pub max_retries: u32,
}

#[cfg(feature = "s3")]
mod client {
    use super::S3Config;
    use crate::backend::{Backend, ObjectPage, PutOptions};
    use crate::{Error, Result};
    use bytes::Bytes;
    use futures::{StreamExt, TryStreamExt};
    use object_store::aws::{AmazonS3, AmazonS3Builder};
    use object_store::path::Path;
    use object_store::{
        Attribute, Attributes, BackoffConfig, ClientOptions, ObjectMeta, ObjectStore,
        PutPayload, RetryConfig,
    };
    use percent_encoding::percent_decode_str;
    use std::time::Duration;
    use tokio::runtime::Runtime;
    use tracing::debug;

    const INITIAL_BACKOFF: Duration = Duration::from_millis(200);

    /// Objects fetched per listing page
    const PAGE_SIZE: usize = 1000;

    /// Object storage reached over the S3 REST API
    pub struct S3Backend {
        store: AmazonS3,
        runtime: Runtime,
        description: String,
    }

    impl S3Backend {
        /// Create a backend client
        pub fn new(config: S3Config) -> Result<Self> {
            let endpoint = config.endpoint.trim_end_matches('/');
            let host = endpoint
                .strip_prefix("https://")
                .or_else(|| endpoint.strip_prefix("http://"))
                .filter(|host| !host.is_empty() && !host.contains(char::is_whitespace))
                .ok_or_else(|| {
                    Error::Configuration(format!("Invalid endpoint {}", config.endpoint))
                })?;
            let description = format!("s3://{}/{}", host, config.bucket);

            let client_options = ClientOptions::new()
                .with_timeout(Duration::from_secs(config.timeout_secs))
                .with_allow_http(endpoint.starts_with("http://"));
            let retry = RetryConfig {
                backoff: BackoffConfig {
                    init_backoff: INITIAL_BACKOFF,
                    ..Default::default()
                },
                max_retries: config.max_retries as usize,
                ..Default::default()
            };

            let store = AmazonS3Builder::new()
                .with_endpoint(endpoint)
                .with_region(&config.region)
                .with_bucket_name(&config.bucket)
                .with_access_key_id(&config.access_key)
                .with_secret_access_key(&config.secret_key)
                .with_virtual_hosted_style_request(false)
                .with_client_options(client_options)
                .with_retry(retry)
                .build()
                .map_err(|e| Error::Configuration(format!("S3 client: {}", e)))?;

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| Error::Configuration(format!("Failed to create runtime: {}", e)))?;

            Ok(S3Backend {
                store,
                runtime,
                description,
            })
        }

        fn head(&self, name: &str, location: &Path) -> Result<Option<ObjectMeta>> {
            match self.runtime.block_on(self.store.head(location)) {
                Ok(meta) => Ok(Some(meta)),
                Err(object_store::Error::NotFound { .. }) => Ok(None),
                Err(e) => Err(map_error(name, e)),
            }
        }
    }

    /// Bucket location for an object name
    fn location(name: &str) -> Result<Path> {
        if name.split('/').any(str::is_empty) {
            return Err(Error::InvalidKey(format!(
                "{} has an empty path segment",
                name
            )));
        }
        Ok(Path::from_iter(name.split('/')))
    }

    /// Inverse of [`location`]
    fn object_name(location: &Path) -> Result<String> {
        let parts = location
            .parts()
            .map(|part| {
                percent_decode_str(part.as_ref())
                    .decode_utf8()
                    .map(|segment| segment.into_owned())
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                Error::BackendUnavailable(format!("Listed object {}: {}", location, e))
            })?;
        Ok(parts.join("/"))
    }

    fn map_error(name: &str, err: object_store::Error) -> Error {
        match err {
            object_store::Error::NotFound { .. } => Error::ObjectNotFound(name.to_string()),
            object_store::Error::PermissionDenied { .. }
            | object_store::Error::Unauthenticated { .. } => {
                Error::PermissionDenied(format!("{}: {}", name, err))
            }
            other => Error::BackendUnavailable(format!("{}: {}", name, other)),
        }
    }

    impl Backend for S3Backend {
        fn put(&self, name: &str, data: Bytes, options: &PutOptions) -> Result<()> {
            let location = location(name)?;
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, "application/octet-stream".into());
            if let Some(expires_at) = options.expires_at {
                attributes.insert(
                    Attribute::Metadata("expires-at".into()),
                    expires_at.to_string().into(),
                );
            }
            let put_options = object_store::PutOptions {
                attributes,
                ..Default::default()
            };

            debug!(name, bytes = data.len(), "S3 put");
            self.runtime
                .block_on(
                    self.store
                        .put_opts(&location, PutPayload::from(data), put_options),
                )
                .map_err(|e| map_error(name, e))?;
            Ok(())
        }

        fn get(&self, name: &str) -> Result<Bytes> {
            let location = location(name)?;
            debug!(name, "S3 get");
            self.runtime
                .block_on(async { self.store.get(&location).await?.bytes().await })
                .map_err(|e| map_error(name, e))
        }

        fn delete(&self, name: &str) -> Result<()> {
            let location = location(name)?;
            // S3 deletes are idempotent, so absence has to be checked first
            if self.head(name, &location)?.is_none() {
                return Err(Error::ObjectNotFound(name.to_string()));
            }
            debug!(name, "S3 delete");
            self.runtime
                .block_on(self.store.delete(&location))
                .map_err(|e| map_error(name, e))
        }

        fn exists(&self, name: &str) -> Result<bool> {
            let location = location(name)?;
            Ok(self.head(name, &location)?.is_some())
        }

        /// Prefixes are matched on whole `/`-separated segments; pass a
        /// prefix ending in `/`.
        fn list_page(&self, prefix: &str, token: Option<&str>) -> Result<ObjectPage> {
            let segments = prefix.trim_end_matches('/');
            let prefix_location = if segments.is_empty() {
                None
            } else {
                Some(location(segments)?)
            };
            let offset = token
                .map(|t| Path::parse(t))
                .transpose()
                .map_err(|e| Error::BackendUnavailable(format!("Invalid listing token: {}", e)))?;

            debug!(prefix, token, "S3 list");
            let objects: Vec<ObjectMeta> = self
                .runtime
                .block_on(async {
                    let stream = match &offset {
                        Some(offset) => self
                            .store
                            .list_with_offset(prefix_location.as_ref(), offset),
                        None => self.store.list(prefix_location.as_ref()),
                    };
                    stream.take(PAGE_SIZE).try_collect().await
                })
                .map_err(|e| map_error(prefix, e))?;

            let next = if objects.len() == PAGE_SIZE {
                objects.last().map(|meta| meta.location.to_string())
            } else {
                None
            };
            let mut names = Vec::with_capacity(objects.len());
            for meta in &objects {
                let name = object_name(&meta.location)?;
                if name.starts_with(prefix) {
                    names.push(name);
                }
            }
            Ok(ObjectPage { names, next })
        }

        fn describe(&self) -> String {
            self.description.clone()
        }
    }

}

#[cfg(feature = "s3")]
pub use client::S3Backend;

/// Stub implementation when the s3 feature is disabled
#[cfg(not(feature = "s3"))]
pub enum S3Backend {}

#[cfg(not(feature = "s3"))]
impl S3Backend {
    pub fn new(_config: S3Config) -> crate::Result<Self> {
        Err(crate::Error::Configuration(
            "S3 backend not enabled. Compile with --features s3".into(),
        ))
    }
}

#[cfg(not(feature = "s3"))]
impl crate::backend::Backend for S3Backend {
    fn put(&self, _: &str, _: bytes::Bytes, _: &crate::backend::PutOptions) -> crate::Result<()> {
        match *self {}
    }

    fn get(&self, _: &str) -> crate::Result<bytes::Bytes> {
        match *self {}
    }

    fn delete(&self, _: &str) -> crate::Result<()> {
        match *self {}
    }

    fn exists(&self, _: &str) -> crate::Result<bool> {
        match *self {}
    }

    fn list_page(&self, _: &str, _: Option<&str>) -> crate::Result<crate::backend::ObjectPage> {
        match *self {}
    }

    fn describe(&self) -> String {
        match *self {}
    }
}
