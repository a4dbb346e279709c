//! Canonical tile request representation and cache-key derivation.

use serde::Serialize;
use sha2::{Digest, Sha256};

use tiler_common::{ImageType, TilerError, TilerResult};

/// Every parameter that influences the bytes of a rendered tile.
///
/// Rendering options that arrive as query strings are kept verbatim so that
/// the fingerprint is stable even for values with no canonical numeric form
/// (`nodata=nan` and friends). The same raw strings are re-parsed by the
/// pipeline with the parsers that validated them at admission.
#[derive(Debug, Clone, Serialize)]
pub struct TileRequest {
    pub identifier: String,
    pub z: u32,
    pub x: u32,
    pub y: u32,
    pub scale: u32,
    pub ext: Option<ImageType>,
    pub url: String,
    pub indexes: Option<Vec<u32>>,
    pub expression: Option<String>,
    pub nodata: Option<String>,
    pub rescale: Option<String>,
    pub color_formula: Option<String>,
    pub color_map: Option<String>,
}

impl TileRequest {
    /// Cache key for this request: a SHA-256 hex digest over the canonical
    /// JSON serialization of every render-affecting field.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        // Serialization of a plain struct with ordered fields is
        // deterministic, so equal requests always hash equally.
        if let Ok(encoded) = serde_json::to_vec(self) {
            hasher.update(&encoded);
        }
        hex::encode(hasher.finalize())
    }

    /// Nodata override parsed to a float, `nan` accepted.
    pub fn parsed_nodata(&self) -> TilerResult<Option<f64>> {
        parse_nodata(self.nodata.as_deref())
    }
}

/// Parse a nodata override to a float, `nan` accepted.
pub fn parse_nodata(raw: Option<&str>) -> TilerResult<Option<f64>> {
    match raw {
        None => Ok(None),
        Some(raw) if raw.eq_ignore_ascii_case("nan") => Ok(Some(f64::NAN)),
        Some(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|_| TilerError::invalid_param("nodata", "expected a number or 'nan'")),
    }
}

/// Parse a comma-separated band index list, e.g. `bidx=1,2,3`.
pub fn parse_indexes(raw: &str) -> TilerResult<Vec<u32>> {
    let indexes = raw
        .split(',')
        .map(|part| part.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| TilerError::invalid_param("indexes", "expected comma-separated band numbers"))?;
    if indexes.is_empty() || indexes.iter().any(|&i| i == 0) {
        return Err(TilerError::invalid_param(
            "indexes",
            "band numbers are one-based",
        ));
    }
    Ok(indexes)
}
