//! Source metadata endpoints (`/cogs/bounds`, `/cogs/info`,
//! `/cogs/metadata`).

use std::sync::Arc;

use axum::extract::Query;
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use raster::{band_statistics, HistogramOptions, ReadParams};
use tiler_common::tile::tms_get;
use tiler_common::{TileCoord, TilerError, TilerResult};

use crate::fingerprint::{parse_indexes, parse_nodata};
use crate::handlers::common::error_response;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SourceQuery {
    pub url: Option<String>,
}

/// Query parameters for the statistics endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct MetadataQuery {
    pub url: Option<String>,
    /// Band selection, e.g. `bidx=1,2,3`.
    #[serde(alias = "bidx")]
    pub indexes: Option<String>,
    /// Nodata override.
    pub nodata: Option<String>,
    /// Lower percentile cut point, default 2.
    pub pmin: Option<f64>,
    /// Upper percentile cut point, default 98.
    pub pmax: Option<f64>,
    /// Number of histogram bins, default 10.
    pub histogram_bins: Option<usize>,
    /// Fixed histogram range as `min,max`.
    pub histogram_range: Option<String>,
}

pub async fn bounds_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<SourceQuery>,
) -> Response {
    match source_bounds(state, query).await {
        Ok(resp) => resp,
        Err(err) => error_response(&err),
    }
}

pub async fn info_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<SourceQuery>,
) -> Response {
    match source_info(state, query).await {
        Ok(resp) => resp,
        Err(err) => error_response(&err),
    }
}

async fn source_bounds(state: Arc<AppState>, query: SourceQuery) -> TilerResult<Response> {
    let url = query
        .url
        .ok_or_else(|| TilerError::MissingParameter("url".to_string()))?;
    let info = state.source.info(&url).await?;
    Ok(cacheable(json!({ "bounds": info.bounds.to_array() })))
}

async fn source_info(state: Arc<AppState>, query: SourceQuery) -> TilerResult<Response> {
    let url = query
        .url
        .ok_or_else(|| TilerError::MissingParameter("url".to_string()))?;
    let info = state.source.info(&url).await?;
    Ok(cacheable(json!({
        "bounds": info.bounds.to_array(),
        "center": [info.center.0, info.center.1, info.center.2],
        "minzoom": info.minzoom,
        "maxzoom": info.maxzoom,
    })))
}

pub async fn metadata_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<MetadataQuery>,
) -> Response {
    match source_metadata(state, query).await {
        Ok(resp) => resp,
        Err(err) => error_response(&err),
    }
}

/// Info plus per-band statistics computed from a whole-extent overview read.
async fn source_metadata(state: Arc<AppState>, query: MetadataQuery) -> TilerResult<Response> {
    let url = query
        .url
        .ok_or_else(|| TilerError::MissingParameter("url".to_string()))?;

    let pmin = query.pmin.unwrap_or(2.0);
    let pmax = query.pmax.unwrap_or(98.0);
    if !(0.0..=100.0).contains(&pmin) || !(0.0..=100.0).contains(&pmax) || pmin >= pmax {
        return Err(TilerError::invalid_param(
            "pmin/pmax",
            "percentiles must satisfy 0 <= pmin < pmax <= 100",
        ));
    }

    let bins = query.histogram_bins.unwrap_or(10);
    if bins == 0 {
        return Err(TilerError::invalid_param(
            "histogram_bins",
            "must be at least 1",
        ));
    }
    let range = query
        .histogram_range
        .as_deref()
        .map(parse_histogram_range)
        .transpose()?;

    let indexes = query.indexes.as_deref().map(parse_indexes).transpose()?;
    let nodata = parse_nodata(query.nodata.as_deref())?;

    let info = state.source.info(&url).await?;

    // A single zoom-0 read gives a whole-extent overview to sample from.
    let tms = tms_get("WebMercatorQuad")?;
    let params = ReadParams {
        tilesize: 256,
        indexes: indexes.clone(),
        expression: None,
        nodata,
    };
    let (tile, _) = state
        .source
        .read_tile(&url, tms, TileCoord::new(0, 0, 0), &params)
        .await?;

    let options = HistogramOptions { bins, range };
    let stats = band_statistics(&tile, pmin, pmax, options);

    // Key statistics by the requested band indexes, 1-based when unspecified.
    let mut statistics = Map::new();
    for (i, band_stats) in stats.iter().enumerate() {
        let key = match &indexes {
            Some(indexes) => indexes.get(i).copied().unwrap_or(i as u32 + 1),
            None => i as u32 + 1,
        };
        statistics.insert(key.to_string(), serde_json::to_value(band_stats)?);
    }

    Ok(cacheable(json!({
        "bounds": info.bounds.to_array(),
        "center": [info.center.0, info.center.1, info.center.2],
        "minzoom": info.minzoom,
        "maxzoom": info.maxzoom,
        "statistics": Value::Object(statistics),
    })))
}

/// Parse a `min,max` histogram range.
fn parse_histogram_range(raw: &str) -> TilerResult<(f64, f64)> {
    let invalid = || TilerError::invalid_param("histogram_range", "expected 'min,max' with min < max");
    let (lo, hi) = raw.split_once(',').ok_or_else(invalid)?;
    let lo: f64 = lo.trim().parse().map_err(|_| invalid())?;
    let hi: f64 = hi.trim().parse().map_err(|_| invalid())?;
    if lo >= hi {
        return Err(invalid());
    }
    Ok((lo, hi))
}

/// Source metadata is stable; let clients cache it for an hour.
fn cacheable(body: Value) -> Response {
    let mut resp = Json(body).into_response();
    resp.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("max-age=3600"),
    );
    resp
}
