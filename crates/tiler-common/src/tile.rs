//! Tile coordinates and TileMatrixSet definitions.
//!
//! Implements the OGC tile matrix concepts used to place a z/x/y tile in a
//! projected or geographic CRS, plus a read-only registry of the named sets
//! the service resolves per request.

use crate::{BoundingBox, CrsCode, TilerError, TilerResult};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// A tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level (TileMatrix identifier)
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }
}

/// A single tile matrix (zoom level) definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileMatrix {
    /// Identifier (zoom level as string)
    pub identifier: String,

    /// Scale denominator
    pub scale_denominator: f64,

    /// Top-left corner coordinates, in CRS units
    pub top_left_corner: (f64, f64),

    /// Tile width in pixels
    pub tile_width: u32,

    /// Tile height in pixels
    pub tile_height: u32,

    /// Number of tile columns
    pub matrix_width: u32,

    /// Number of tile rows
    pub matrix_height: u32,
}

impl TileMatrix {
    /// Calculate the resolution (CRS units per pixel) for this matrix.
    /// `meters_per_unit` converts the scale denominator's ground distance
    /// into the CRS's own units (1.0 for projected-meter systems).
    pub fn resolution(&self, meters_per_unit: f64) -> f64 {
        // Standard pixel size is 0.28mm (OGC WMTS spec)
        self.scale_denominator * 0.00028 / meters_per_unit
    }

    /// Get the bounding box for a specific tile, in CRS units.
    pub fn tile_bbox(&self, col: u32, row: u32, meters_per_unit: f64) -> BoundingBox {
        let res = self.resolution(meters_per_unit);
        let tile_span_x = res * self.tile_width as f64;
        let tile_span_y = res * self.tile_height as f64;

        let min_x = self.top_left_corner.0 + col as f64 * tile_span_x;
        let max_y = self.top_left_corner.1 - row as f64 * tile_span_y;
        let max_x = min_x + tile_span_x;
        let min_y = max_y - tile_span_y;

        BoundingBox::new(min_x, min_y, max_x, max_y)
    }
}

/// Affine georeferencing transform in rasterio order:
/// `(a, b, c, d, e, f)` where `c, f` is the top-left corner and `a, e`
/// are the pixel sizes (`e` negative for north-up rasters).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    /// Build a north-up transform mapping a pixel grid onto `bounds`.
    pub fn from_bounds(bounds: &BoundingBox, width: u32, height: u32) -> Self {
        Self {
            a: bounds.width() / width as f64,
            b: 0.0,
            c: bounds.min_x,
            d: 0.0,
            e: -bounds.height() / height as f64,
            f: bounds.max_y,
        }
    }

    /// GeoTIFF ModelPixelScale values: (sx, sy, sz).
    pub fn pixel_scale(&self) -> [f64; 3] {
        [self.a, -self.e, 0.0]
    }

    /// GeoTIFF ModelTiepoint values tying raster (0,0) to the top-left corner.
    pub fn tiepoint(&self) -> [f64; 6] {
        [0.0, 0.0, 0.0, self.c, self.f, 0.0]
    }
}

/// A complete tile matrix set definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileMatrixSet {
    /// Identifier for the tile matrix set
    pub identifier: String,

    /// Coordinate reference system
    pub crs: CrsCode,

    /// Bounding box of the tile matrix set, in CRS units
    pub bounding_box: BoundingBox,

    /// Individual tile matrices (zoom levels)
    pub tile_matrices: Vec<TileMatrix>,
}

impl TileMatrixSet {
    /// Get a tile matrix by zoom level.
    pub fn matrix(&self, zoom: u32) -> Option<&TileMatrix> {
        self.tile_matrices.get(zoom as usize)
    }

    pub fn minzoom(&self) -> u32 {
        0
    }

    pub fn maxzoom(&self) -> u32 {
        self.tile_matrices.len().saturating_sub(1) as u32
    }

    /// Bounds of a tile in CRS units. Errors when the coordinate falls
    /// outside the matrix for its zoom level.
    pub fn xy_bounds(&self, coord: &TileCoord) -> TilerResult<BoundingBox> {
        let matrix = self
            .matrix(coord.z)
            .ok_or(TilerError::TileOutOfRange {
                z: coord.z,
                x: coord.x,
                y: coord.y,
            })?;
        if coord.x >= matrix.matrix_width || coord.y >= matrix.matrix_height {
            return Err(TilerError::TileOutOfRange {
                z: coord.z,
                x: coord.x,
                y: coord.y,
            });
        }
        Ok(matrix.tile_bbox(coord.x, coord.y, self.crs.meters_per_unit()))
    }

    /// Georeferencing transform for a tile rendered at `tilesize` pixels.
    pub fn geo_transform(&self, coord: &TileCoord, tilesize: u32) -> TilerResult<GeoTransform> {
        let bounds = self.xy_bounds(coord)?;
        Ok(GeoTransform::from_bounds(&bounds, tilesize, tilesize))
    }
}

/// Standard Web Mercator (Google/OSM) tile matrix set.
fn web_mercator_tile_matrix_set() -> TileMatrixSet {
    let max_extent = 20037508.342789244;

    let tile_matrices: Vec<TileMatrix> = (0..=24)
        .map(|z| {
            let n = 2u32.pow(z);
            let scale = 559082264.0287178 / (n as f64);

            TileMatrix {
                identifier: z.to_string(),
                scale_denominator: scale,
                top_left_corner: (-max_extent, max_extent),
                tile_width: 256,
                tile_height: 256,
                matrix_width: n,
                matrix_height: n,
            }
        })
        .collect();

    TileMatrixSet {
        identifier: "WebMercatorQuad".to_string(),
        crs: CrsCode::Epsg3857,
        bounding_box: BoundingBox::new(-max_extent, -max_extent, max_extent, max_extent),
        tile_matrices,
    }
}

/// Standard WGS84 (geographic) tile matrix set with a 2:1 aspect ratio.
fn wgs84_tile_matrix_set() -> TileMatrixSet {
    let tile_matrices: Vec<TileMatrix> = (0..=24)
        .map(|z| {
            let n_cols = 2u32.pow(z + 1);
            let n_rows = 2u32.pow(z);
            // Geographic base scale: 0.703125 degrees per pixel at zoom 0.
            let scale = 279541132.0143589 / (n_rows as f64);

            TileMatrix {
                identifier: z.to_string(),
                scale_denominator: scale,
                top_left_corner: (-180.0, 90.0),
                tile_width: 256,
                tile_height: 256,
                matrix_width: n_cols,
                matrix_height: n_rows,
            }
        })
        .collect();

    TileMatrixSet {
        identifier: "WorldCRS84Quad".to_string(),
        crs: CrsCode::Epsg4326,
        bounding_box: BoundingBox::new(-180.0, -90.0, 180.0, 90.0),
        tile_matrices,
    }
}

static REGISTRY: OnceLock<Vec<TileMatrixSet>> = OnceLock::new();

fn registry() -> &'static [TileMatrixSet] {
    REGISTRY.get_or_init(|| vec![web_mercator_tile_matrix_set(), wgs84_tile_matrix_set()])
}

/// Resolve a named tile matrix set. The registry is built once and is
/// read-only afterwards.
pub fn tms_get(identifier: &str) -> TilerResult<&'static TileMatrixSet> {
    registry()
        .iter()
        .find(|tms| tms.identifier == identifier)
        .ok_or_else(|| TilerError::UnknownTileMatrixSet(identifier.to_string()))
}

/// List the registered tile matrix set names.
pub fn tms_list() -> Vec<&'static str> {
    registry().iter().map(|t| t.identifier.as_str()).collect()
}
