//! WMTS GetCapabilities endpoint.
//!
//! Describes one source as a single WMTS layer over the requested tile
//! matrix set, with a RESTful `ResourceURL` template pointing back at the
//! tile endpoints. Rendering options in the request's query string are
//! carried through to the template so GIS clients fetch styled tiles.

use std::sync::Arc;

use axum::extract::{Path, RawQuery};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;

use tiler_common::tile::{tms_get, TileMatrixSet};
use tiler_common::{ImageType, TilerError, TilerResult};

use crate::handlers::common::error_response;
use crate::handlers::tilejson::{encode_query, parse_query};
use crate::state::AppState;

const DEFAULT_TMS: &str = "WebMercatorQuad";

pub async fn wmts_handler(
    Extension(state): Extension<Arc<AppState>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    match build_capabilities(state, None, query.as_deref().unwrap_or(""), &headers).await {
        Ok(resp) => resp,
        Err(err) => error_response(&err),
    }
}

pub async fn wmts_tms_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(identifier): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    match build_capabilities(
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

async fn build_capabilities(
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

    // Template-shaping parameters move into the template's path; everything
    // else rides along in its query string.
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

    // WMTS always advertises a concrete format; default to PNG.
    let format = match tile_format.as_deref() {
        Some(raw) => ImageType::from_extension(raw)?,
        None => ImageType::Png,
    };
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
    let minzoom = info.minzoom.max(tms.minzoom());
    let maxzoom = info.maxzoom.min(tms.maxzoom());

    let template = resource_url_template(
        headers,
        &state.config.root_path,
        &identifier,
        scale,
        format,
        &passthrough,
    );
    let title = url.rsplit('/').next().unwrap_or(url.as_str());

    let xml = capabilities_xml(
        title,
        &info.bounds.to_array(),
        format,
        &template,
        tms,
        scale,
        minzoom,
        maxzoom,
    );

    let mut resp = (StatusCode::OK, xml).into_response();
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/xml"),
    );
    Ok(resp)
}

/// Tile URL template with WMTS `{TileMatrix}/{TileCol}/{TileRow}`
/// placeholders.
fn resource_url_template(
    headers: &HeaderMap,
    root_path: &str,
    identifier: &str,
    scale: u32,
    format: ImageType,
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

    let qs = encode_query(passthrough);
    let qs_part = if qs.is_empty() {
        String::new()
    } else {
        format!("?{}", qs)
    };

    format!(
        "{scheme}://{host}{root_path}/cogs/{identifier}/{{TileMatrix}}/{{TileCol}}/{{TileRow}}@{scale}x.{ext}{qs_part}",
        ext = format.as_str()
    )
}

/// Assemble the capabilities document.
fn capabilities_xml(
    title: &str,
    bounds: &[f64; 4],
    format: ImageType,
    template: &str,
    tms: &TileMatrixSet,
    scale: u32,
    minzoom: u32,
    maxzoom: u32,
) -> String {
    let media_type = format.mime();
    let mut xml = String::with_capacity(8192);

    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(concat!(
        r#"<Capabilities xmlns="http://www.opengis.net/wmts/1.0""#,
        r#" xmlns:ows="http://www.opengis.net/ows/1.1""#,
        r#" xmlns:xlink="http://www.w3.org/1999/xlink""#,
        r#" version="1.0.0">"#,
    ));
    xml.push('\n');

    xml.push_str(concat!(
        "  <ows:ServiceIdentification>\n",
        "    <ows:Title>Cloud Optimized GeoTIFF tile server</ows:Title>\n",
        "    <ows:ServiceType>OGC WMTS</ows:ServiceType>\n",
        "    <ows:ServiceTypeVersion>1.0.0</ows:ServiceTypeVersion>\n",
        "  </ows:ServiceIdentification>\n",
    ));

    xml.push_str("  <Contents>\n");
    xml.push_str("    <Layer>\n");
    xml.push_str(&format!(
        "      <ows:Title>{}</ows:Title>\n",
        xml_escape(title)
    ));
    xml.push_str(&format!(
        "      <ows:Identifier>{}</ows:Identifier>\n",
        xml_escape(title)
    ));
    xml.push_str(&format!(
        concat!(
            "      <ows:WGS84BoundingBox crs=\"urn:ogc:def:crs:OGC:2:84\">\n",
            "        <ows:LowerCorner>{} {}</ows:LowerCorner>\n",
            "        <ows:UpperCorner>{} {}</ows:UpperCorner>\n",
            "      </ows:WGS84BoundingBox>\n",
        ),
        bounds[0], bounds[1], bounds[2], bounds[3]
    ));
    xml.push_str(concat!(
        "      <Style isDefault=\"true\">\n",
        "        <ows:Identifier>default</ows:Identifier>\n",
        "      </Style>\n",
    ));
    xml.push_str(&format!("      <Format>{}</Format>\n", media_type));
    xml.push_str(&format!(
        concat!(
            "      <TileMatrixSetLink>\n",
            "        <TileMatrixSet>{}</TileMatrixSet>\n",
            "      </TileMatrixSetLink>\n",
        ),
        tms.identifier
    ));
    xml.push_str(&format!(
        "      <ResourceURL format=\"{}\" resourceType=\"tile\" template=\"{}\"/>\n",
        media_type,
        xml_escape(template)
    ));
    xml.push_str("    </Layer>\n");

    xml.push_str("    <TileMatrixSet>\n");
    xml.push_str(&format!(
        "      <ows:Identifier>{}</ows:Identifier>\n",
        tms.identifier
    ));
    xml.push_str(&format!(
        "      <ows:SupportedCRS>urn:ogc:def:crs:EPSG::{}</ows:SupportedCRS>\n",
        tms.crs.epsg()
    ));
    for zoom in minzoom..=maxzoom {
        if let Some(matrix) = tms.matrix(zoom) {
            // Higher pixel density means a finer scale at the same matrix
            // dimensions.
            xml.push_str(&format!(
                concat!(
                    "      <TileMatrix>\n",
                    "        <ows:Identifier>{id}</ows:Identifier>\n",
                    "        <ScaleDenominator>{scale_denominator}</ScaleDenominator>\n",
                    "        <TopLeftCorner>{left} {top}</TopLeftCorner>\n",
                    "        <TileWidth>{tile_width}</TileWidth>\n",
                    "        <TileHeight>{tile_height}</TileHeight>\n",
                    "        <MatrixWidth>{matrix_width}</MatrixWidth>\n",
                    "        <MatrixHeight>{matrix_height}</MatrixHeight>\n",
                    "      </TileMatrix>\n",
                ),
                id = matrix.identifier,
                scale_denominator = matrix.scale_denominator / scale as f64,
                left = matrix.top_left_corner.0,
                top = matrix.top_left_corner.1,
                tile_width = matrix.tile_width * scale,
                tile_height = matrix.tile_height * scale,
                matrix_width = matrix.matrix_width,
                matrix_height = matrix.matrix_height,
            ));
        }
    }
    xml.push_str("    </TileMatrixSet>\n");
    xml.push_str("  </Contents>\n");
    xml.push_str("</Capabilities>\n");

    xml
}

/// Escape text for XML element content and attribute values.
fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiler_common::BoundingBox;

    #[test]
    fn capabilities_describe_the_matrix_set() {
        let tms = tms_get("WebMercatorQuad").unwrap();
        let bounds = BoundingBox::new(-180.0, -85.05, 180.0, 85.05).to_array();
        let template = "http://localhost/cogs/WebMercatorQuad/{TileMatrix}/{TileCol}/{TileRow}@1x.png?url=https%3A%2F%2Fhost%2Fa.tif";

        let xml = capabilities_xml(
            "a.tif",
            &bounds,
            ImageType::Png,
            template,
            tms,
            1,
            0,
            2,
        );

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains("<ows:Identifier>WebMercatorQuad</ows:Identifier>"));
        assert!(xml.contains("urn:ogc:def:crs:EPSG::3857"));
        assert!(xml.contains("<Format>image/png</Format>"));
        assert!(xml.contains("{TileMatrix}/{TileCol}/{TileRow}"));
        // Zoom levels 0..=2 inclusive.
        assert_eq!(xml.matches("<TileMatrix>").count(), 3);
        assert!(xml.contains("<ScaleDenominator>559082264.0287178</ScaleDenominator>"));
        assert!(xml.contains("<MatrixWidth>4</MatrixWidth>"));
    }

    #[test]
    fn doubled_density_halves_the_scale_denominator() {
        let tms = tms_get("WebMercatorQuad").unwrap();
        let bounds = [-180.0, -85.05, 180.0, 85.05];
        let xml = capabilities_xml("a.tif", &bounds, ImageType::Png, "t", tms, 2, 0, 0);

        assert!(xml.contains("<ScaleDenominator>279541132.0143589</ScaleDenominator>"));
        assert!(xml.contains("<TileWidth>512</TileWidth>"));
    }

    #[test]
    fn template_query_string_is_escaped() {
        let tms = tms_get("WebMercatorQuad").unwrap();
        let bounds = [-180.0, -85.05, 180.0, 85.05];
        let template = "http://localhost/cogs/x?url=a&rescale=0%2C100";
        let xml = capabilities_xml("a.tif", &bounds, ImageType::Png, template, tms, 1, 0, 0);

        assert!(xml.contains("url=a&amp;rescale=0%2C100"));
    }
}
