//! Service configuration, resolved once at startup.

/// Runtime configuration for the tile API.
///
/// Built from the environment exactly once in `main`; request handlers only
/// ever see the resolved values through [`crate::state::AppState`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection URL for the tile cache.
    pub redis_url: String,
    /// When true the service never connects to Redis and every tile is
    /// computed on demand.
    pub cache_disabled: bool,
    /// Path prefix under which the service is mounted behind a proxy.
    /// Empty when the service is served from the root.
    pub root_path: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://redis:6379".to_string()),
            cache_disabled: std::env::var("CACHE_DISABLE")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            root_path: std::env::var("ROOT_PATH").unwrap_or_default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: "redis://redis:6379".to_string(),
            cache_disabled: false,
            root_path: String::new(),
        }
    }
}
