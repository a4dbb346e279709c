//! End-to-end tests for the tile API over an in-process router.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use raster::SyntheticSource;
use storage::{Cache, MemoryCache};
use tiler_api::config::Config;
use tiler_api::fingerprint::TileRequest;
use tiler_api::state::AppState;
use tiler_common::tile::tms_get;
use tiler_common::{ImageType, TileCoord};

const SOURCE_URL: &str = "https%3A%2F%2Fdata.example.com%2Fcog.tif";

fn test_app() -> Router {
    let state = AppState::without_cache(Config::default(), Arc::new(SyntheticSource::new()));
    tiler_api::app(Arc::new(state))
}

async fn get(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let resp = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, headers, body)
}

fn header<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn fully_valid_tile_defaults_to_jpeg() {
    let uri = format!("/cogs/10/100/200?url={SOURCE_URL}");
    let (status, headers, body) = get(test_app(), &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "content-type"), Some("image/jpg"));
    assert!(!body.is_empty());
    // JPEG SOI marker.
    assert_eq!(&body[..2], &[0xFF, 0xD8]);

    // Computed, not cached: timings present, no cache marker.
    assert!(header(&headers, "x-cache").is_none());
    let timings = header(&headers, "x-server-timings").unwrap();
    assert!(timings.contains("Read - "), "timings: {timings}");
    assert!(timings.contains("; Post-process - "), "timings: {timings}");
    assert!(timings.contains("; Format - "), "timings: {timings}");
}

#[tokio::test]
async fn masked_tile_defaults_to_png() {
    // Diagonal tiles from the synthetic source carry nodata pixels.
    let uri = format!("/cogs/10/7/7?url={SOURCE_URL}");
    let (status, headers, body) = get(test_app(), &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "content-type"), Some("image/png"));
    assert_eq!(&body[..4], b"\x89PNG");
}

#[tokio::test]
async fn explicit_png_extension_is_honored() {
    let uri = format!("/cogs/10/100/200.png?url={SOURCE_URL}");
    let (status, headers, body) = get(test_app(), &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "content-type"), Some("image/png"));
    assert_eq!(&body[..4], b"\x89PNG");
}

#[tokio::test]
async fn geotiff_carries_georeferencing() {
    let uri = format!("/cogs/10/100/200.tif?url={SOURCE_URL}");
    let (status, headers, body) = get(test_app(), &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "content-type"), Some("image/tiff"));
    // Little-endian TIFF magic.
    assert_eq!(&body[..4], b"II\x2a\x00");

    // The tiepoint ties raster (0,0) to the tile's top-left corner, so the
    // corner coordinate must appear verbatim in the file.
    let tms = tms_get("WebMercatorQuad").unwrap();
    let bounds = tms.xy_bounds(&TileCoord::new(10, 100, 200)).unwrap();
    let needle = bounds.min_x.to_le_bytes();
    assert!(
        body.windows(8).any(|w| w == needle),
        "tiepoint coordinate missing from GeoTIFF"
    );
}

#[tokio::test]
async fn npy_returns_raw_planes() {
    let uri = format!("/cogs/10/100/200.npy?url={SOURCE_URL}");
    let (status, headers, body) = get(test_app(), &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "content-type"), Some("application/x-binary"));
    assert_eq!(&body[..6], b"\x93NUMPY");
    let header_text = String::from_utf8_lossy(&body[..128]).to_string();
    // Three bands plus the mask plane.
    assert!(header_text.contains("(4, 256, 256)"), "header: {header_text}");
}

#[tokio::test]
async fn scaled_tile_doubles_the_edge() {
    let uri = format!("/cogs/10/100/200@2x.npy?url={SOURCE_URL}");
    let (status, _, body) = get(test_app(), &uri).await;

    assert_eq!(status, StatusCode::OK);
    let header_text = String::from_utf8_lossy(&body[..128]).to_string();
    assert!(header_text.contains("(4, 512, 512)"), "header: {header_text}");
}

#[tokio::test]
async fn rendering_options_are_accepted() {
    let uri = format!(
        "/cogs/10/100/200.png?url={SOURCE_URL}&bidx=1&rescale=0,100&color_formula=gamma%20RGB%202.2&color_map=viridis"
    );
    let (status, headers, _) = get(test_app(), &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "content-type"), Some("image/png"));
}

#[tokio::test]
async fn missing_url_is_a_bad_request() {
    let (status, _, body) = get(test_app(), "/cogs/10/100/200").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let detail: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(detail["detail"].as_str().unwrap().contains("url"));
}

#[tokio::test]
async fn out_of_window_scale_is_rejected() {
    let uri = format!("/cogs/10/100/200@9x?url={SOURCE_URL}");
    let (status, _, body) = get(test_app(), &uri).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let detail: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(detail["detail"].as_str().unwrap().contains("scale"));
}

#[tokio::test]
async fn unknown_extension_is_rejected() {
    let uri = format!("/cogs/10/100/200.gif?url={SOURCE_URL}");
    let (status, _, _) = get(test_app(), &uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_tile_matrix_set_is_rejected() {
    let uri = format!("/cogs/Bogus/10/100/200?url={SOURCE_URL}");
    let (status, _, body) = get(test_app(), &uri).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let detail: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(detail["detail"].as_str().unwrap().contains("Bogus"));
}

#[tokio::test]
async fn out_of_range_tile_is_rejected() {
    // z2 has a 4x4 matrix.
    let uri = format!("/cogs/2/9/0?url={SOURCE_URL}");
    let (status, _, _) = get(test_app(), &uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unreachable_source_maps_to_client_error() {
    let (status, _, _) = get(
        test_app(),
        "/cogs/10/100/200?url=https%3A%2F%2Funreachable.example.com%2Fcog.tif",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tilejson_template_round_trips_options() {
    let uri = format!("/cogs/tilejson.json?url={SOURCE_URL}&rescale=0,100");
    let (status, headers, body) = get(test_app(), &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        header(&headers, "cache-control"),
        Some("max-age=3600")
    );

    let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(doc["tilejson"], "2.2.0");
    assert_eq!(doc["scheme"], "xyz");
    assert_eq!(doc["minzoom"], 0);
    assert_eq!(doc["maxzoom"], 24);

    let template = doc["tiles"][0].as_str().unwrap();
    assert!(template.contains("/cogs/WebMercatorQuad/{z}/{x}/{y}@1x?"));
    // Options survive with reserved characters re-encoded.
    assert!(template.contains("rescale=0%2C100"), "template: {template}");
    assert!(template.contains("url=https%3A%2F%2F"), "template: {template}");
}

#[tokio::test]
async fn tilejson_moves_shaping_params_into_the_path() {
    let uri = format!(
        "/cogs/tilejson.json?url={SOURCE_URL}&tile_format=png&tile_scale=2&identifier=WorldCRS84Quad"
    );
    let (status, _, body) = get(test_app(), &uri).await;

    assert_eq!(status, StatusCode::OK);
    let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let template = doc["tiles"][0].as_str().unwrap();
    assert!(
        template.contains("/cogs/WorldCRS84Quad/{z}/{x}/{y}@2x.png?"),
        "template: {template}"
    );
    assert!(!template.contains("tile_format="));
    assert!(!template.contains("tile_scale="));
    assert!(!template.contains("identifier="));
}

#[tokio::test]
async fn tilejson_path_identifier_wins() {
    let uri = format!("/cogs/WorldCRS84Quad/tilejson.json?url={SOURCE_URL}");
    let (status, _, body) = get(test_app(), &uri).await;

    assert_eq!(status, StatusCode::OK);
    let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let template = doc["tiles"][0].as_str().unwrap();
    assert!(template.contains("/cogs/WorldCRS84Quad/"));
}

#[tokio::test]
async fn bounds_and_info_report_source_metadata() {
    let uri = format!("/cogs/bounds?url={SOURCE_URL}");
    let (status, _, body) = get(test_app(), &uri).await;
    assert_eq!(status, StatusCode::OK);
    let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(doc["bounds"][0], -180.0);

    let uri = format!("/cogs/info?url={SOURCE_URL}");
    let (status, _, body) = get(test_app(), &uri).await;
    assert_eq!(status, StatusCode::OK);
    let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(doc["minzoom"], 0);
    assert_eq!(doc["maxzoom"], 24);
    assert_eq!(doc["center"][2], 0);
}

#[tokio::test]
async fn metadata_reports_band_statistics() {
    let uri = format!("/cogs/metadata?url={SOURCE_URL}&pmin=5&pmax=95&histogram_bins=4");
    let (status, headers, body) = get(test_app(), &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "cache-control"), Some("max-age=3600"));

    let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(doc["bounds"][0], -180.0);
    let stats = doc["statistics"].as_object().unwrap();
    assert_eq!(
        stats.keys().map(|k| k.as_str()).collect::<Vec<_>>(),
        vec!["1", "2", "3"]
    );

    let band = &stats["1"];
    assert!(band["min"].as_f64().unwrap() <= band["pc"][0].as_f64().unwrap());
    assert!(band["pc"][1].as_f64().unwrap() <= band["max"].as_f64().unwrap());
    assert_eq!(band["histogram"][0].as_array().unwrap().len(), 4);
    assert_eq!(band["histogram"][1].as_array().unwrap().len(), 5);

    // Every valid pixel lands in some bin.
    let counted: u64 = band["histogram"][0]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_u64().unwrap())
        .sum();
    assert_eq!(counted, band["valid_pixels"].as_u64().unwrap());
}

#[tokio::test]
async fn metadata_rejects_inverted_percentiles() {
    let uri = format!("/cogs/metadata?url={SOURCE_URL}&pmin=98&pmax=2");
    let (status, _, _) = get(test_app(), &uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wmts_capabilities_describe_the_layer() {
    let uri = format!("/cogs/WMTSCapabilities.xml?url={SOURCE_URL}&tile_format=png&rescale=0,100");
    let (status, headers, body) = get(test_app(), &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "content-type"), Some("application/xml"));

    let xml = String::from_utf8(body).unwrap();
    assert!(xml.contains("<ows:Identifier>WebMercatorQuad</ows:Identifier>"));
    assert!(xml.contains("<Format>image/png</Format>"));
    assert!(xml.contains("{TileMatrix}/{TileCol}/{TileRow}@1x.png"));
    // Shaping parameters move into the template; the rest ride its query
    // string, XML-escaped.
    assert!(xml.contains("rescale=0%2C100"));
    assert!(!xml.contains("tile_format="));
    assert!(xml.contains("url=https%3A%2F%2Fdata.example.com%2Fcog.tif"));
}

#[tokio::test]
async fn wmts_path_identifier_selects_the_matrix_set() {
    let uri = format!("/cogs/WorldCRS84Quad/WMTSCapabilities.xml?url={SOURCE_URL}");
    let (status, _, body) = get(test_app(), &uri).await;

    assert_eq!(status, StatusCode::OK);
    let xml = String::from_utf8(body).unwrap();
    assert!(xml.contains("<ows:Identifier>WorldCRS84Quad</ows:Identifier>"));
    assert!(xml.contains("urn:ogc:def:crs:EPSG::4326"));
    assert!(xml.contains("/cogs/WorldCRS84Quad/{TileMatrix}"));
}

#[tokio::test]
async fn second_identical_request_hits_the_cache() {
    let cache = Arc::new(MemoryCache::new());
    let state = AppState::with_cache(
        Config::default(),
        Arc::new(SyntheticSource::new()),
        cache.clone(),
    );
    let app = tiler_api::app(Arc::new(state));
    let uri = format!("/cogs/10/100/200?url={SOURCE_URL}");

    // First request computes the tile.
    let (status, headers, body) = get(app.clone(), &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert!(header(&headers, "x-cache").is_none());
    assert!(header(&headers, "x-server-timings").is_some());
    assert_eq!(&body[..2], &[0xFF, 0xD8]);

    // The store runs off the response path; wait for it to land.
    for _ in 0..100 {
        if !cache.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(cache.len(), 1);

    // Second request replays the stored bytes.
    let (status, headers, replay) = get(app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "x-cache"), Some("HIT"));
    assert_eq!(header(&headers, "content-type"), Some("image/jpg"));
    assert!(header(&headers, "x-server-timings").is_none());
    assert_eq!(replay, body);
}

#[tokio::test]
async fn cache_hit_replays_the_stored_format() {
    let cache = Arc::new(MemoryCache::new());

    // Prime the cache under the fingerprint the handler will derive.
    let req = TileRequest {
        identifier: "WebMercatorQuad".to_string(),
        z: 10,
        x: 100,
        y: 200,
        scale: 1,
        ext: None,
        url: "https://data.example.com/cog.tif".to_string(),
        indexes: None,
        expression: None,
        nodata: None,
        rescale: None,
        color_formula: None,
        color_map: None,
    };
    let stored = b"\x89PNG stand-in payload";
    cache.set(&req.fingerprint(), stored, ImageType::Png).await;

    let state = AppState::with_cache(
        Config::default(),
        Arc::new(SyntheticSource::new()),
        cache,
    );
    let app = tiler_api::app(Arc::new(state));
    let uri = format!("/cogs/10/100/200?url={SOURCE_URL}");
    let (status, headers, body) = get(app, &uri).await;

    // The stored format dictates the Content-Type, not format negotiation.
    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "x-cache"), Some("HIT"));
    assert_eq!(header(&headers, "content-type"), Some("image/png"));
    assert_eq!(body, stored);
}

#[tokio::test]
async fn health_endpoints_respond() {
    let (status, _, _) = get(test_app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = get(test_app(), "/ready").await;
    assert_eq!(status, StatusCode::OK);
}
