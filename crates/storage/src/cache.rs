//! Redis-based cache for encoded tiles.
//!
//! Entries are opaque blobs keyed by request fingerprint. The backend is
//! never trusted to be available: lookups distinguish a true miss from a
//! backend failure, and callers fold the latter into a miss so a broken
//! cache degrades to computing every tile instead of failing requests.

use async_trait::async_trait;
use bytes::Bytes;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use std::time::Duration;
use tracing::{debug, warn};

use tiler_common::{ImageType, TilerError, TilerResult};

/// Result of a cache lookup.
///
/// `BackendError` exists so the caller can see (and count) degraded
/// lookups, but it must always be treated as `Miss` for control flow.
#[derive(Debug, Clone)]
pub enum CacheLookup {
    /// Cached payload and the format it was encoded with.
    Hit(Bytes, ImageType),
    /// Key not present.
    Miss,
    /// Backend unreachable or entry undecodable.
    BackendError,
}

/// A cache backend for encoded tiles.
///
/// Both operations are infallible at the signature level: `get` reports
/// backend trouble through [`CacheLookup::BackendError`] and `set` is
/// best-effort, so a broken backend never fails a tile request.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Look up a tile by fingerprint.
    async fn get(&self, fingerprint: &str) -> CacheLookup;

    /// Store an encoded tile.
    async fn set(&self, fingerprint: &str, payload: &[u8], format: ImageType);
}

/// Redis tile cache client.
pub struct TileCache {
    conn: MultiplexedConnection,
    default_ttl: Duration,
}

impl TileCache {
    /// Connect to Redis.
    pub async fn connect(redis_url: &str) -> TilerResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| TilerError::CacheError(format!("Redis connection failed: {}", e)))?;

        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| TilerError::CacheError(format!("Redis connection failed: {}", e)))?;

        Ok(Self {
            conn,
            default_ttl: Duration::from_secs(3600), // 1 hour default
        })
    }
}

#[async_trait]
impl Cache for TileCache {
    async fn get(&self, fingerprint: &str) -> CacheLookup {
        // The multiplexed connection is a cheap handle over one shared
        // link; cloning it per call keeps the cache usable through &self.
        let mut conn = self.conn.clone();
        let result: Result<Option<Vec<u8>>, _> = conn.get(fingerprint).await;

        match result {
            Ok(Some(raw)) => match decode_entry(&raw) {
                Some((payload, format)) => CacheLookup::Hit(payload, format),
                None => {
                    debug!(key = %fingerprint, "Discarding undecodable cache entry");
                    CacheLookup::BackendError
                }
            },
            Ok(None) => CacheLookup::Miss,
            Err(e) => {
                debug!(key = %fingerprint, error = %e, "Cache get failed");
                CacheLookup::BackendError
            }
        }
    }

    async fn set(&self, fingerprint: &str, payload: &[u8], format: ImageType) {
        let entry = encode_entry(payload, format);
        let mut conn = self.conn.clone();
        let result: Result<(), _> = conn
            .set_ex(fingerprint, entry, self.default_ttl.as_secs())
            .await;

        if let Err(e) = result {
            warn!(key = %fingerprint, error = %e, "Cache set failed");
        }
    }
}

/// Frame a cache entry: one format-discriminant byte followed by the payload.
pub(crate) fn encode_entry(payload: &[u8], format: ImageType) -> Vec<u8> {
    let mut entry = Vec::with_capacity(payload.len() + 1);
    entry.push(format.discriminant());
    entry.extend_from_slice(payload);
    entry
}

/// Decode an entry framed by [`encode_entry`]. Returns `None` for entries
/// written by an incompatible version or otherwise corrupted.
pub(crate) fn decode_entry(raw: &[u8]) -> Option<(Bytes, ImageType)> {
    let (&disc, payload) = raw.split_first()?;
    let format = ImageType::from_discriminant(disc)?;
    Some((Bytes::copy_from_slice(payload), format))
}
