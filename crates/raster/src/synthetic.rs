//! Deterministic in-process tile source.
//!
//! Generates gradient tiles without touching the network. Used by the
//! service's `synthetic` backend for local runs and by tests that need a
//! `TileSource` with predictable pixels: tiles on the x == y diagonal
//! carry a nodata quadrant so the format-fallback path is exercisable.

use async_trait::async_trait;

use crate::colormap::ColorMap;
use crate::source::{ReadParams, RenderedTile, SourceInfo, TileSource};
use tiler_common::{BoundingBox, TileCoord, TileMatrixSet, TilerError, TilerResult};

const WEB_MERCATOR_LAT_LIMIT: f64 = 85.0511287798066;

/// Synthetic gradient source.
#[derive(Debug, Clone, Default)]
pub struct SyntheticSource;

impl SyntheticSource {
    pub fn new() -> Self {
        Self
    }

    fn check_url(url: &str) -> TilerResult<()> {
        if url.is_empty() {
            return Err(TilerError::invalid_param("url", "empty source URL"));
        }
        // Gives callers a deterministic way to exercise the 4xx read path.
        if url.contains("unreachable") {
            return Err(TilerError::SourceUnreachable(url.to_string()));
        }
        Ok(())
    }

    fn sample(coord: TileCoord, band: u32, px: u32, py: u32) -> f32 {
        let v = px
            .wrapping_add(py)
            .wrapping_add(band.wrapping_mul(31))
            .wrapping_add(coord.x.wrapping_mul(7))
            .wrapping_add(coord.y.wrapping_mul(13))
            .wrapping_add(coord.z.wrapping_mul(17));
        (v % 256) as f32
    }
}

#[async_trait]
impl TileSource for SyntheticSource {
    async fn info(&self, url: &str) -> TilerResult<SourceInfo> {
        Self::check_url(url)?;
        Ok(SourceInfo {
            bounds: BoundingBox::new(
                -180.0,
                -WEB_MERCATOR_LAT_LIMIT,
                180.0,
                WEB_MERCATOR_LAT_LIMIT,
            ),
            center: (0.0, 0.0, 0),
            minzoom: 0,
            maxzoom: 24,
        })
    }

    async fn read_tile(
        &self,
        url: &str,
        tms: &TileMatrixSet,
        coord: TileCoord,
        params: &ReadParams,
    ) -> TilerResult<(RenderedTile, Option<ColorMap>)> {
        Self::check_url(url)?;
        // Validates the coordinate against the grid like a real reader would.
        tms.xy_bounds(&coord)?;

        let size = params.tilesize;
        let n = (size * size) as usize;

        let band_ids: Vec<u32> = match (&params.expression, &params.indexes) {
            // An expression collapses the read to a single computed band.
            (Some(_), _) => vec![1],
            (None, Some(indexes)) => indexes.clone(),
            (None, None) => vec![1, 2, 3],
        };

        let bands: Vec<Vec<f32>> = band_ids
            .iter()
            .map(|&b| {
                (0..size)
                    .flat_map(|py| (0..size).map(move |px| Self::sample(coord, b, px, py)))
                    .collect()
            })
            .collect();

        // Diagonal tiles get a nodata quadrant in the top-left corner.
        let mut mask = vec![255u8; n];
        if coord.x == coord.y {
            for py in 0..size / 2 {
                for px in 0..size / 2 {
                    mask[(py * size + px) as usize] = 0;
                }
            }
        }

        Ok((RenderedTile::new(size, size, bands, mask), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiler_common::tile::tms_get;

    fn params() -> ReadParams {
        ReadParams {
            tilesize: 16,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_deterministic_reads() {
        let source = SyntheticSource::new();
        let tms = tms_get("WebMercatorQuad").unwrap();
        let coord = TileCoord::new(10, 100, 200);

        let (a, _) = source
            .read_tile("https://host/a.tif", tms, coord, &params())
            .await
            .unwrap();
        let (b, _) = source
            .read_tile("https://host/a.tif", tms, coord, &params())
            .await
            .unwrap();
        assert_eq!(a.bands, b.bands);
        assert_eq!(a.mask, b.mask);
        assert_eq!(a.bands.len(), 3);
        assert!(a.all_valid());
    }

    #[tokio::test]
    async fn test_diagonal_tiles_have_nodata() {
        let source = SyntheticSource::new();
        let tms = tms_get("WebMercatorQuad").unwrap();

        let (tile, _) = source
            .read_tile("https://host/a.tif", tms, TileCoord::new(10, 7, 7), &params())
            .await
            .unwrap();
        assert!(!tile.all_valid());
    }

    #[tokio::test]
    async fn test_unreachable_url() {
        let source = SyntheticSource::new();
        let tms = tms_get("WebMercatorQuad").unwrap();
        let err = source
            .read_tile(
                "https://unreachable/a.tif",
                tms,
                TileCoord::new(0, 0, 0),
                &params(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TilerError::SourceUnreachable(_)));
        assert_eq!(err.http_status_code(), 400);
    }

    #[tokio::test]
    async fn test_indexes_select_bands() {
        let source = SyntheticSource::new();
        let tms = tms_get("WebMercatorQuad").unwrap();
        let p = ReadParams {
            tilesize: 8,
            indexes: Some(vec![2]),
            ..Default::default()
        };
        let (tile, _) = source
            .read_tile("https://host/a.tif", tms, TileCoord::new(3, 1, 2), &p)
            .await
            .unwrap();
        assert_eq!(tile.bands.len(), 1);
    }
}
