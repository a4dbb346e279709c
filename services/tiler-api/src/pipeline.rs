//! The read / post-process / encode pipeline for a single tile.

use raster::{colormap, postprocess, render, ColorFormula, GeoReference, TileSource};
use tiler_common::{ImageType, TileCoord, TileMatrixSet, TilerResult};

use crate::fingerprint::TileRequest;
use crate::timing::Timer;

/// Output of a full pipeline run: encoded bytes, the format they are in
/// (which may have been negotiated from the mask) and per-stage timings.
#[derive(Debug)]
pub struct RenderedOutput {
    pub payload: Vec<u8>,
    pub format: ImageType,
    pub timings: Vec<(&'static str, f64)>,
}

/// Read the tile from the source, apply post-processing and encode it.
///
/// Format negotiation happens after the read: a request without an explicit
/// extension becomes JPEG when every pixel is valid and PNG otherwise, so
/// fully-opaque tiles get the cheaper encoding and partial tiles keep their
/// transparency.
pub async fn render_tile(
    source: &dyn TileSource,
    tms: &TileMatrixSet,
    coord: TileCoord,
    req: &TileRequest,
) -> TilerResult<RenderedOutput> {
    let mut timings = Vec::with_capacity(3);
    let tilesize = 256 * req.scale;

    let params = raster::ReadParams {
        tilesize,
        indexes: req.indexes.clone(),
        expression: req.expression.clone(),
        nodata: req.parsed_nodata()?,
    };

    let timer = Timer::start();
    let (tile, source_colormap) = source.read_tile(&req.url, tms, coord, &params).await?;
    timings.push(("Read", timer.elapsed_ms()));

    let format = match req.ext {
        Some(explicit) => explicit,
        None if tile.all_valid() => ImageType::Jpg,
        None => ImageType::Png,
    };

    // A colormap named in the request overrides whatever the source carries.
    let cmap = match &req.color_map {
        Some(requested) => Some(colormap::lookup(requested)?),
        None => source_colormap,
    };

    let timer = Timer::start();
    let ranges = match &req.rescale {
        Some(raw) => raster::RescaleRange::parse_list(raw)?,
        None => Vec::new(),
    };
    let mut scaled = postprocess::rescale_tile(&tile, &ranges)?;
    if let Some(raw) = &req.color_formula {
        ColorFormula::parse(raw)?.apply(&mut scaled);
    }
    timings.push(("Post-process", timer.elapsed_ms()));

    let timer = Timer::start();
    let geo = if format == ImageType::Tif {
        Some(GeoReference {
            crs: tms.crs,
            transform: tms.geo_transform(&coord, tilesize)?,
        })
    } else {
        None
    };
    let payload = render(&scaled, cmap.as_ref(), format, geo.as_ref())?;
    timings.push(("Format", timer.elapsed_ms()));

    Ok(RenderedOutput {
        payload,
        format,
        timings,
    })
}
