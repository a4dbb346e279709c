//! HTTP request handlers.

pub mod common;
pub mod meta;
pub mod tilejson;
pub mod tiles;
pub mod wmts;

pub use common::{health_handler, metrics_handler, ready_handler};
pub use meta::{bounds_handler, info_handler, metadata_handler};
pub use tilejson::{tilejson_handler, tilejson_tms_handler};
pub use tiles::{tile_handler, tile_tms_handler};
pub use wmts::{wmts_handler, wmts_tms_handler};
