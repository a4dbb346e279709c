//! XYZ tile endpoints.
//!
//! Route shapes:
//!   `/cogs/{z}/{x}/{y}[@{scale}x][.{ext}]`
//!   `/cogs/{identifier}/{z}/{x}/{y}[@{scale}x][.{ext}]`
//!
//! Scale and extension ride in the final path segment; both are optional.
//! When no extension is given the output format is negotiated from the
//! tile's mask after the read.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use bytes::Bytes;
use metrics::counter;
use serde::Deserialize;
use tracing::debug;

use raster::ColorFormula;
use storage::{Cache, CacheLookup};
use tiler_common::tile::tms_get;
use tiler_common::{ImageType, TileCoord, TilerError, TilerResult};

use crate::fingerprint::{parse_indexes, TileRequest};
use crate::handlers::common::error_response;
use crate::pipeline;
use crate::state::AppState;
use crate::timing::format_timings;

const DEFAULT_TMS: &str = "WebMercatorQuad";
const MAX_ZOOM: u32 = 30;

/// Query parameters accepted by the tile endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct TileQuery {
    /// Source raster URL. Required.
    pub url: Option<String>,
    /// Tile matrix set name, when not given as a path segment.
    pub identifier: Option<String>,
    /// Pixel-density scale, when not given in the path (`@{n}x`).
    pub scale: Option<u32>,
    /// Output format, when not given as a path extension.
    pub ext: Option<String>,
    /// Band selection, e.g. `bidx=1,2,3`.
    #[serde(alias = "bidx")]
    pub indexes: Option<String>,
    /// Band math expression, forwarded to the source.
    pub expression: Option<String>,
    /// Nodata override.
    pub nodata: Option<String>,
    /// Per-band linear rescale ranges, `min,max` pairs separated by `;`.
    pub rescale: Option<String>,
    /// Color correction formula applied after rescaling.
    pub color_formula: Option<String>,
    /// Named or inline-JSON colormap.
    pub color_map: Option<String>,
}

pub async fn tile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((z, x, tail)): Path<(String, String, String)>,
    Query(query): Query<TileQuery>,
) -> Response {
    match serve_tile(state, None, z, x, tail, query).await {
        Ok(resp) => resp,
        Err(err) => error_response(&err),
    }
}

pub async fn tile_tms_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((identifier, z, x, tail)): Path<(String, String, String, String)>,
    Query(query): Query<TileQuery>,
) -> Response {
    match serve_tile(state, Some(identifier), z, x, tail, query).await {
        Ok(resp) => resp,
        Err(err) => error_response(&err),
    }
}

async fn serve_tile(
    state: Arc<AppState>,
    path_identifier: Option<String>,
    z: String,
    x: String,
    tail: String,
    query: TileQuery,
) -> TilerResult<Response> {
    let req = build_request(path_identifier, &z, &x, &tail, query)?;
    let tms = tms_get(&req.identifier)?;
    let coord = TileCoord::new(req.z, req.x, req.y);
    // Reject coordinates outside the matrix before touching the source.
    tms.xy_bounds(&coord)?;

    let fingerprint = req.fingerprint();

    if let Some(cache) = &state.cache {
        // Backend failures fold into a miss: a broken cache degrades to
        // computing every tile, never to failing requests.
        match cache.get(&fingerprint).await {
            CacheLookup::Hit(payload, format) => {
                counter!("tiler_cache_hits_total").increment(1);
                return Ok(tile_response(payload, format, Some("HIT"), None));
            }
            CacheLookup::Miss => {
                counter!("tiler_cache_misses_total").increment(1);
            }
            CacheLookup::BackendError => {
                counter!("tiler_cache_errors_total").increment(1);
            }
        }
    }

    let out = pipeline::render_tile(state.source.as_ref(), tms, coord, &req).await?;
    counter!("tiler_tiles_rendered_total").increment(1);
    let timings = format_timings(&out.timings);
    let payload = Bytes::from(out.payload);

    if let Some(cache) = &state.cache {
        // Write-behind off the response path. Failures are logged inside
        // the cache, never surfaced to the client.
        let cache = cache.clone();
        let payload = payload.clone();
        let format = out.format;
        tokio::spawn(async move {
            cache.set(&fingerprint, &payload, format).await;
        });
    } else {
        debug!(key = %fingerprint, "Tile cache disabled, skipping store");
    }

    Ok(tile_response(payload, out.format, None, Some(timings)))
}

/// Validate every request parameter and assemble the canonical request.
fn build_request(
    path_identifier: Option<String>,
    z: &str,
    x: &str,
    tail: &str,
    query: TileQuery,
) -> TilerResult<TileRequest> {
    let url = query
        .url
        .ok_or_else(|| TilerError::MissingParameter("url".to_string()))?;

    let z: u32 = z
        .parse()
        .map_err(|_| TilerError::invalid_param("z", "expected an unsigned integer"))?;
    if z > MAX_ZOOM {
        return Err(TilerError::invalid_param("z", "zoom level out of range"));
    }
    let x: u32 = x
        .parse()
        .map_err(|_| TilerError::invalid_param("x", "expected an unsigned integer"))?;

    // Path values win over their query-parameter fallbacks.
    let (y, path_scale, path_ext) = parse_tail(tail)?;
    let scale = path_scale.or(query.scale).unwrap_or(1);
    if !(1..=3).contains(&scale) {
        return Err(TilerError::invalid_param("scale", "must be between 1 and 3"));
    }
    let ext = match path_ext {
        Some(format) => Some(format),
        None => query
            .ext
            .as_deref()
            .map(ImageType::from_extension)
            .transpose()?,
    };

    let identifier = path_identifier
        .or(query.identifier)
        .unwrap_or_else(|| DEFAULT_TMS.to_string());

    let indexes = query.indexes.as_deref().map(parse_indexes).transpose()?;

    let req = TileRequest {
        identifier,
        z,
        x,
        y,
        scale,
        ext,
        url,
        indexes,
        expression: query.expression,
        nodata: query.nodata,
        rescale: query.rescale,
        color_formula: query.color_formula,
        color_map: query.color_map,
    };

    // Vet every rendering option now so malformed input never reaches the
    // read stage.
    req.parsed_nodata()?;
    if let Some(raw) = &req.rescale {
        raster::RescaleRange::parse_list(raw)?;
    }
    if let Some(raw) = &req.color_formula {
        ColorFormula::parse(raw)?;
    }
    if let Some(raw) = &req.color_map {
        raster::colormap::lookup(raw)?;
    }

    Ok(req)
}

/// Split the final path segment `y[@{scale}x][.{ext}]` into its parts.
fn parse_tail(tail: &str) -> TilerResult<(u32, Option<u32>, Option<ImageType>)> {
    let (head, ext) = match tail.rsplit_once('.') {
        Some((head, ext)) => (head, Some(ImageType::from_extension(ext)?)),
        None => (tail, None),
    };

    let (y_part, scale) = match head.split_once('@') {
        Some((y_part, scale_part)) => {
            let digits = scale_part
                .strip_suffix('x')
                .ok_or_else(|| TilerError::invalid_param("scale", "expected the form @{n}x"))?;
            let scale: u32 = digits
                .parse()
                .map_err(|_| TilerError::invalid_param("scale", "expected the form @{n}x"))?;
            (y_part, Some(scale))
        }
        None => (head, None),
    };

    let y: u32 = y_part
        .parse()
        .map_err(|_| TilerError::invalid_param("y", "expected an unsigned integer"))?;

    Ok((y, scale, ext))
}

fn tile_response(
    payload: Bytes,
    format: ImageType,
    cache_status: Option<&'static str>,
    timings: Option<String>,
) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(format.mime()));
    if let Some(status) = cache_status {
        headers.insert(
            HeaderName::from_static("x-cache"),
            HeaderValue::from_static(status),
        );
    }
    if let Some(timings) = timings {
        if let Ok(value) = HeaderValue::from_str(&timings) {
            headers.insert(HeaderName::from_static("x-server-timings"), value);
        }
    }
    (StatusCode::OK, headers, Body::from(payload)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_variants_parse() {
        assert_eq!(parse_tail("200").unwrap(), (200, None, None));
        assert_eq!(
            parse_tail("200.png").unwrap(),
            (200, None, Some(ImageType::Png))
        );
        assert_eq!(parse_tail("200@2x").unwrap(), (200, Some(2), None));
        assert_eq!(
            parse_tail("200@3x.webp").unwrap(),
            (200, Some(3), Some(ImageType::Webp))
        );
    }

    #[test]
    fn query_params_back_up_the_path() {
        let query = TileQuery {
            url: Some("https://data.example.com/cog.tif".to_string()),
            scale: Some(2),
            ext: Some("webp".to_string()),
            ..Default::default()
        };
        let req = build_request(None, "10", "100", "200", query).unwrap();
        assert_eq!(req.scale, 2);
        assert_eq!(req.ext, Some(ImageType::Webp));

        // A path segment wins over the query fallback.
        let query = TileQuery {
            url: Some("https://data.example.com/cog.tif".to_string()),
            scale: Some(2),
            ext: Some("webp".to_string()),
            ..Default::default()
        };
        let req = build_request(None, "10", "100", "200@3x.png", query).unwrap();
        assert_eq!(req.scale, 3);
        assert_eq!(req.ext, Some(ImageType::Png));
    }

    #[test]
    fn malformed_tails_are_rejected() {
        assert!(parse_tail("abc").is_err());
        assert!(parse_tail("200@x").is_err());
        assert!(parse_tail("200@2").is_err());
        assert!(parse_tail("200.gif").is_err());
    }

    #[test]
    fn url_is_required() {
        let err = build_request(None, "10", "100", "200", TileQuery::default()).unwrap_err();
        assert!(matches!(err, TilerError::MissingParameter(p) if p == "url"));
    }

    #[test]
    fn scale_window_is_enforced() {
        let query = TileQuery {
            url: Some("https://data.example.com/cog.tif".to_string()),
            ..Default::default()
        };
        let err = build_request(None, "10", "100", "200@9x", query).unwrap_err();
        assert_eq!(err.http_status_code(), 400);
    }

    #[test]
    fn path_identifier_beats_query_identifier() {
        let query = TileQuery {
            url: Some("https://data.example.com/cog.tif".to_string()),
            identifier: Some("WorldCRS84Quad".to_string()),
            ..Default::default()
        };
        let req = build_request(
            Some("WebMercatorQuad".to_string()),
            "10",
            "100",
            "200",
            query,
        )
        .unwrap();
        assert_eq!(req.identifier, "WebMercatorQuad");
    }

    #[test]
    fn bad_rendering_options_fail_before_the_pipeline() {
        let query = TileQuery {
            url: Some("https://data.example.com/cog.tif".to_string()),
            rescale: Some("100,0".to_string()),
            ..Default::default()
        };
        assert!(build_request(None, "10", "100", "200", query).is_err());

        let query = TileQuery {
            url: Some("https://data.example.com/cog.tif".to_string()),
            color_map: Some("not-a-colormap".to_string()),
            ..Default::default()
        };
        assert!(build_request(None, "10", "100", "200", query).is_err());
    }
}
