//! Raster source seam and tile encoding for the cog-tiler workspace.
//!
//! The actual raster decoding/reprojection engine (opening a remote COG,
//! windowed reads, resampling) lives behind the [`TileSource`] trait; this
//! crate owns everything that happens to a tile after it has been read:
//! rescaling, color formulas, colormaps, and encoding to the output
//! formats of the format registry.

pub mod colormap;
pub mod encode;
pub mod postprocess;
pub mod source;
pub mod stats;
pub mod synthetic;

pub use colormap::ColorMap;
pub use encode::{render, GeoReference};
pub use postprocess::{ColorFormula, RescaleRange, ScaledTile};
pub use stats::{band_statistics, BandStatistics, HistogramOptions};
pub use source::{ReadParams, RenderedTile, SourceInfo, TileSource};
pub use synthetic::SyntheticSource;
