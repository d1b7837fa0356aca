//! Entry - a stored value plus its metadata

use super::Value;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Metadata written alongside every value
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    /// When the value was written (unix seconds)
    pub written_at: u64,
    /// Advisory expiry (unix seconds), from a TTL given at write time
    pub expires_at: Option<u64>,
    /// Host name of the machine that wrote the value
    pub writer: Option<String>,
}

impl EntryMeta {
    /// Metadata for a write happening now
    pub fn now(ttl: Option<Duration>) -> Self {
        let written_at = unix_now();
        EntryMeta {
            written_at,
            expires_at: ttl.map(|ttl| written_at.saturating_add(ttl.as_secs())),
            writer: hostname(),
        }
    }
}

/// A value together with its metadata
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub value: Value,
    pub meta: EntryMeta,
}

impl Entry {
    pub fn new(value: Value, meta: EntryMeta) -> Self {
        Entry { value, meta }
    }

    /// Whether the advisory expiry has passed. Expired entries are still
    /// readable; bucket lifecycle rules are what remove them.
    pub fn is_expired(&self) -> bool {
        self.meta
            .expires_at
            .map(|at| at <= unix_now())
            .unwrap_or(false)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn hostname() -> Option<String> {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
}
