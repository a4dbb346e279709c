//! Shared application state handed to every request handler.

use std::sync::Arc;

use raster::TileSource;
use storage::{Cache, TileCache};
use tiler_common::TilerResult;

use crate::config::Config;

/// Everything a handler needs: the raster source, the optional tile cache
/// and the resolved configuration.
pub struct AppState {
    pub source: Arc<dyn TileSource>,
    pub cache: Option<Arc<dyn Cache>>,
    pub config: Config,
}

impl AppState {
    /// Connect the Redis tile cache (unless disabled) and assemble the state.
    pub async fn new(config: Config, source: Arc<dyn TileSource>) -> TilerResult<Self> {
        let cache: Option<Arc<dyn Cache>> = if config.cache_disabled {
            None
        } else {
            Some(Arc::new(TileCache::connect(&config.redis_url).await?))
        };
        Ok(Self {
            source,
            cache,
            config,
        })
    }

    /// State with no cache backend. Used when caching is disabled and in
    /// tests that exercise the compute path directly.
    pub fn without_cache(config: Config, source: Arc<dyn TileSource>) -> Self {
        Self {
            source,
            cache: None,
            config,
        }
    }

    /// State with a caller-provided cache backend.
    pub fn with_cache(
        config: Config,
        source: Arc<dyn TileSource>,
        cache: Arc<dyn Cache>,
    ) -> Self {
        Self {
            source,
            cache: Some(cache),
            config,
        }
    }
}
