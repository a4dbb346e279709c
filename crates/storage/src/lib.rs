//! Storage abstractions for the cog-tiler workspace.
//!
//! Encoded tiles are cached by request fingerprint behind the [`Cache`]
//! trait. Redis is the production backend; an in-memory backend covers
//! cache-less deployments and tests.

pub mod cache;
pub mod memory;

pub use cache::{Cache, CacheLookup, TileCache};
pub use memory::MemoryCache;
