//! Store configuration
//!
//! Settings are read once, before the store is built, from (lowest to
//! highest priority) built-in defaults, `~/.config/blobkv/config.json` and
//! `BLOBKV_*` environment variables. The CLI layers its flags on top.

use crate::backend::S3Config;
use crate::model::Namespace;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const ENV_BACKEND: &str = "BLOBKV_BACKEND";
pub const ENV_ENDPOINT: &str = "BLOBKV_ENDPOINT";
pub const ENV_REGION: &str = "BLOBKV_REGION";
pub const ENV_BUCKET: &str = "BLOBKV_BUCKET";
pub const ENV_ACCESS_KEY: &str = "BLOBKV_ACCESS_KEY";
pub const ENV_SECRET_KEY: &str = "BLOBKV_SECRET_KEY";
pub const ENV_USER: &str = "BLOBKV_USER";
pub const ENV_ROOT: &str = "BLOBKV_ROOT";
pub const ENV_TIMEOUT: &str = "BLOBKV_TIMEOUT_SECS";
pub const ENV_RETRIES: &str = "BLOBKV_MAX_RETRIES";

/// Which blob backend to use
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    S3,
    /// A local or network-mounted directory
    File,
    /// Process memory; nothing outlives the process
    Memory,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "s3" => Ok(BackendKind::S3),
            "file" | "fs" => Ok(BackendKind::File),
            "memory" | "mem" => Ok(BackendKind::Memory),
            other => Err(format!(
                "unknown backend '{}' (expected s3, file or memory)",
                other
            )),
        }
    }
}

/// Everything needed to construct a store
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: BackendKind,
    /// S3 service URL
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Namespace for keys; entries of different users never collide
    pub user: String,
    /// Directory for the file backend
    pub root: Option<PathBuf>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            backend: BackendKind::default(),
            endpoint: None,
            region: "us-east-1".to_string(),
            bucket: None,
            access_key: None,
            secret_key: None,
            user: std::env::var("USER").unwrap_or_else(|_| "default".to_string()),
            root: None,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("backend", &self.backend)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("user", &self.user)
            .field("root", &self.root)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl StoreConfig {
    /// Default location of the config file (~/.config/blobkv/config.json)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("blobkv").join("config.json"))
    }

    /// Defaults, then the config file if present, then the environment
    pub fn load() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) => Self::from_file(&path)?.unwrap_or_default(),
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Read a JSON config file; `None` when it does not exist
    pub fn from_file(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = serde_json::from_str(&content).map_err(|e| {
            Error::Configuration(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(Some(config))
    }

    /// Save as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Configuration(format!("Failed to create config dir: {}", e))
            })?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)
            .map_err(|e| Error::Configuration(format!("Failed to write config: {}", e)))?;
        Ok(())
    }

    /// Override fields from environment variables, looked up through `var`
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = var(ENV_BACKEND) {
            self.backend = v.parse().map_err(Error::Configuration)?;
        }
        if let Some(v) = var(ENV_ENDPOINT) {
            self.endpoint = Some(v);
        }
        if let Some(v) = var(ENV_REGION) {
            self.region = v;
        }
        if let Some(v) = var(ENV_BUCKET) {
            self.bucket = Some(v);
        }
        if let Some(v) = var(ENV_ACCESS_KEY) {
            self.access_key = Some(v);
        }
        if let Some(v) = var(ENV_SECRET_KEY) {
            self.secret_key = Some(v);
        }
        if let Some(v) = var(ENV_USER) {
            self.user = v;
        }
        if let Some(v) = var(ENV_ROOT) {
            self.root = Some(PathBuf::from(v));
        }
        if let Some(v) = var(ENV_TIMEOUT) {
            self.timeout_secs = v
                .parse()
                .map_err(|e| Error::Configuration(format!("{}={}: {}", ENV_TIMEOUT, v, e)))?;
        }
        if let Some(v) = var(ENV_RETRIES) {
            self.max_retries = v
                .parse()
                .map_err(|e| Error::Configuration(format!("{}={}: {}", ENV_RETRIES, v, e)))?;
        }
        Ok(())
    }

    /// Check that the selected backend has what it needs
    pub fn validate(&self) -> Result<()> {
        Namespace::new(&self.user)?;
        match self.backend {
            BackendKind::S3 => {
                let missing: Vec<&str> = [
                    (ENV_ENDPOINT, self.endpoint.is_none()),
                    (ENV_BUCKET, self.bucket.is_none()),
                    (ENV_ACCESS_KEY, self.access_key.is_none()),
                    (ENV_SECRET_KEY, self.secret_key.is_none()),
                ]
                .iter()
                .filter(|(_, missing)| *missing)
                .map(|(name, _)| *name)
                .collect();
                if !missing.is_empty() {
                    return Err(Error::Configuration(format!(
                        "S3 backend needs {}",
                        missing.join(", ")
                    )));
                }
                if self.timeout_secs == 0 {
                    return Err(Error::Configuration("timeout must be positive".into()));
                }
            }
            BackendKind::File => {
                if self.root.is_none() {
                    return Err(Error::Configuration(format!(
                        "file backend needs a root directory ({})",
                        ENV_ROOT
                    )));
                }
            }
            BackendKind::Memory => {}
        }
        Ok(())
    }

    /// S3 connection settings; fails if any are missing
    pub fn s3_config(&self) -> Result<S3Config> {
        let required = |value: &Option<String>, name: &str| {
            value
                .clone()
                .ok_or_else(|| Error::Configuration(format!("missing {}", name)))
        };
        Ok(S3Config {
            endpoint: required(&self.endpoint, ENV_ENDPOINT)?,
            region: self.region.clone(),
            bucket: required(&self.bucket, ENV_BUCKET)?,
            access_key: required(&self.access_key, ENV_ACCESS_KEY)?,
            secret_key: required(&self.secret_key, ENV_SECRET_KEY)?,
            timeout_secs: self.timeout_secs,
            max_retries: self.max_retries,
        })
    }
}
