//! In-process tile cache.
//!
//! Shares the entry framing with the Redis backend so the two are
//! interchangeable behind [`Cache`]. Unbounded and process-local, so it
//! suits single-instance deployments without Redis, and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use tiler_common::ImageType;

use crate::cache::{decode_entry, encode_entry, Cache, CacheLookup};

/// In-memory tile cache keyed by request fingerprint.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, fingerprint: &str) -> CacheLookup {
        let entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(_) => return CacheLookup::BackendError,
        };
        match entries.get(fingerprint) {
            Some(raw) => match decode_entry(raw) {
                Some((payload, format)) => CacheLookup::Hit(payload, format),
                None => CacheLookup::BackendError,
            },
            None => CacheLookup::Miss,
        }
    }

    async fn set(&self, fingerprint: &str, payload: &[u8], format: ImageType) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(fingerprint.to_string(), encode_entry(payload, format));
        }
    }
}
