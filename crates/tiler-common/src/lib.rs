//! Common types shared across the cog-tiler workspace.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod format;
pub mod tile;

pub use bbox::BoundingBox;
pub use crs::CrsCode;
pub use error::{TilerError, TilerResult};
pub use format::ImageType;
pub use tile::{TileCoord, TileMatrix, TileMatrixSet};
