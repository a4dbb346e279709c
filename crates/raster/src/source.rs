//! The raster source capability.

use async_trait::async_trait;

use crate::colormap::ColorMap;
use tiler_common::{BoundingBox, TileCoord, TileMatrixSet, TilerResult};

/// A decoded raster window aligned to a tile grid.
///
/// Bands hold raw sample values; `mask` is the alignment mask with one
/// byte per pixel, `0` for nodata and `255` for valid data (the rasterio
/// convention). Request-scoped: produced by a read, consumed by
/// postprocessing and encoding, then dropped.
#[derive(Debug, Clone)]
pub struct RenderedTile {
    pub width: u32,
    pub height: u32,
    pub bands: Vec<Vec<f32>>,
    pub mask: Vec<u8>,
}

impl RenderedTile {
    pub fn new(width: u32, height: u32, bands: Vec<Vec<f32>>, mask: Vec<u8>) -> Self {
        debug_assert!(bands.iter().all(|b| b.len() == (width * height) as usize));
        debug_assert_eq!(mask.len(), (width * height) as usize);
        Self {
            width,
            height,
            bands,
            mask,
        }
    }

    /// True when every pixel holds valid data.
    pub fn all_valid(&self) -> bool {
        self.mask.iter().all(|&m| m != 0)
    }
}

/// Summary metadata of a raster source, as needed by TileJSON.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    /// Source extent in WGS84 degrees.
    pub bounds: BoundingBox,
    /// (lon, lat, zoom) center.
    pub center: (f64, f64, u32),
    pub minzoom: u32,
    pub maxzoom: u32,
}

/// Parameters forwarded to the source read.
#[derive(Debug, Clone, Default)]
pub struct ReadParams {
    /// Output size in pixels (square tiles).
    pub tilesize: u32,
    /// 1-based band indexes, in order.
    pub indexes: Option<Vec<u32>>,
    /// Band math expression, evaluated by the source.
    pub expression: Option<String>,
    /// Override for the source's internal nodata value.
    pub nodata: Option<f64>,
}

/// Capability exposed by the raster decoding engine.
///
/// Implementations own the windowed read, reprojection to the tile grid,
/// resampling, and colormap extraction. Errors should classify via the
/// `TilerError` source variants so the service can map them to 4xx/5xx.
#[async_trait]
pub trait TileSource: Send + Sync {
    /// Summary metadata for a source URL.
    async fn info(&self, url: &str) -> TilerResult<SourceInfo>;

    /// Read one tile window, resampled to `params.tilesize`, together with
    /// the source's embedded colormap if it has one.
    async fn read_tile(
        &self,
        url: &str,
        tms: &TileMatrixSet,
        coord: TileCoord,
        params: &ReadParams,
    ) -> TilerResult<(RenderedTile, Option<ColorMap>)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_valid() {
        let tile = RenderedTile::new(2, 2, vec![vec![1.0; 4]], vec![255; 4]);
        assert!(tile.all_valid());

        let tile = RenderedTile::new(2, 2, vec![vec![1.0; 4]], vec![255, 255, 0, 255]);
        assert!(!tile.all_valid());
    }
}
