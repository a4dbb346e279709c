//! TileJSON metadata endpoint.
//!
//! Builds a TileJSON 2.2.0 document whose tile URL template points back at
//! the tile endpoints of this service, carrying every rendering option of
//! the metadata request through to the tiles.

use std::sync::Arc;

use axum::extract::{Path, RawQuery};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Serialize;

use tiler_common::tile::tms_get;
use tiler_common::{ImageType, TilerError, TilerResult};

use crate::handlers::common::error_response;
use crate::state::AppState;

const DEFAULT_TMS: &str = "WebMercatorQuad";

/// TileJSON 2.2.0 document.
#[derive(Debug, Serialize)]
pub struct TileJson {
    pub tilejson: String,
    pub name: String,
    pub version: String,
    pub scheme: String,
    pub tiles: Vec<String>,
    pub minzoom: u32,
    pub maxzoom: u32,
    /// `[west, south, east, north]` in WGS84 degrees.
    pub bounds: [f64; 4],
    /// `[lon, lat, zoom]`.
    pub center: (f64, f64, u32),
}

pub async fn tilejson_handler(
    Extension(state): Extension<Arc<AppState>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    match build_tilejson(state, None, query.as_deref().unwrap_or(""), &headers).await {
        Ok(resp) => resp,
        Err(err) => error_response(&err),
    }
}

pub async fn tilejson_tms_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(identifier): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    match build_tilejson(
        state,
        Some(identifier),
        query.as_deref().unwrap_or(""),
        &headers,
    )
    .await
    {
        Ok(resp) => resp,
        Err(err) => error_response(&err),
    }
}

async fn build_tilejson(
    state: Arc<AppState>,
    path_identifier: Option<String>,
    raw_query: &str,
    headers: &HeaderMap,
) -> TilerResult<Response> {
    let mut url = None;
    let mut tile_format = None;
    let mut tile_scale = None;
    let mut query_identifier = None;
    let mut passthrough = Vec::new();

    // Template-shaping parameters move into the URL path; everything else
    // is carried through verbatim in the template's query string.
    for (key, value) in parse_query(raw_query) {
        match key.as_str() {
            "url" => {
                passthrough.push(("url".to_string(), value.clone()));
                url = Some(value);
            }
            "tile_format" => tile_format = Some(value),
            "tile_scale" => tile_scale = Some(value),
            "identifier" => query_identifier = Some(value),
            _ => passthrough.push((key, value)),
        }
    }

    let url = url.ok_or_else(|| TilerError::MissingParameter("url".to_string()))?;

    let ext = tile_format
        .as_deref()
        .map(ImageType::from_extension)
        .transpose()?;
    let scale: u32 = match tile_scale {
        Some(raw) => raw
            .parse()
            .map_err(|_| TilerError::invalid_param("tile_scale", "expected an integer"))?,
        None => 1,
    };
    if !(1..=3).contains(&scale) {
        return Err(TilerError::invalid_param(
            "tile_scale",
            "must be between 1 and 3",
        ));
    }

    let identifier = path_identifier
        .or(query_identifier)
        .unwrap_or_else(|| DEFAULT_TMS.to_string());
    let tms = tms_get(&identifier)?;

    let info = state.source.info(&url).await?;

    let template = tile_template(
        headers,
        &state.config.root_path,
        &identifier,
        scale,
        ext,
        &passthrough,
    );

    let name = url
        .rsplit('/')
        .next()
        .unwrap_or(url.as_str())
        .to_string();

    let tilejson = TileJson {
        tilejson: "2.2.0".to_string(),
        name,
        version: "1.0.0".to_string(),
        scheme: "xyz".to_string(),
        tiles: vec![template],
        minzoom: info.minzoom.max(tms.minzoom()),
        maxzoom: info.maxzoom.min(tms.maxzoom()),
        bounds: info.bounds.to_array(),
        center: info.center,
    };

    let mut resp = (StatusCode::OK, Json(tilejson)).into_response();
    resp.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("max-age=3600"),
    );
    Ok(resp)
}

/// Assemble the tile URL template with literal `{z}/{x}/{y}` placeholders.
fn tile_template(
    headers: &HeaderMap,
    root_path: &str,
    identifier: &str,
    scale: u32,
    ext: Option<ImageType>,
    passthrough: &[(String, String)],
) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    let ext_part = match ext {
        Some(format) => format!(".{}", format.as_str()),
        None => String::new(),
    };

    let qs = encode_query(passthrough);
    let qs_part = if qs.is_empty() {
        String::new()
    } else {
        format!("?{}", qs)
    };

    format!(
        "{scheme}://{host}{root_path}/cogs/{identifier}/{{z}}/{{x}}/{{y}}@{scale}x{ext_part}{qs_part}"
    )
}

/// Decode an application/x-www-form-urlencoded query string into pairs.
pub(super) fn parse_query(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (decode_component(key), decode_component(value)),
            None => (decode_component(pair), String::new()),
        })
        .collect()
}

pub(super) fn decode_component(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    urlencoding::decode(&raw)
        .map(|c| c.into_owned())
        .unwrap_or(raw)
}

/// Re-encode pairs so reserved characters survive the round trip,
/// `rescale=0,100` comes back as `rescale=0%2C100`.
pub(super) fn encode_query(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}
