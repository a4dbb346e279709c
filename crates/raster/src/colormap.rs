//! Colormaps: pixel value to RGBA lookup tables.
//!
//! A colormap is a `BTreeMap<u8, [u8; 4]>` so iteration (and therefore any
//! serialization feeding the request fingerprint) is independent of
//! insertion order. Registered names cover the common ramps; a raw JSON
//! object form is accepted for custom maps.

use std::collections::BTreeMap;
use tiler_common::{TilerError, TilerResult};

/// Mapping of pixel value to RGBA color.
pub type ColorMap = BTreeMap<u8, [u8; 4]>;

/// Resolve a colormap parameter: a registered name, or a JSON object of
/// the form `{"0": [0, 0, 0, 255], ...}`.
pub fn lookup(name: &str) -> TilerResult<ColorMap> {
    let trimmed = name.trim();
    if trimmed.starts_with('{') {
        return parse_json(trimmed);
    }
    match trimmed {
        "gray" => Ok(interpolated(&[(0, [0, 0, 0]), (255, [255, 255, 255])])),
        "viridis" => Ok(interpolated(&[
            (0, [68, 1, 84]),
            (64, [59, 82, 139]),
            (128, [33, 145, 140]),
            (192, [94, 201, 98]),
            (255, [253, 231, 37]),
        ])),
        "rdbu" => Ok(interpolated(&[
            (0, [103, 0, 31]),
            (128, [247, 247, 247]),
            (255, [5, 48, 97]),
        ])),
        // Threshold map: transparent below the midpoint, solid red above.
        "above" => {
            let mut cmap = ColorMap::new();
            for v in 0..=255u8 {
                cmap.insert(v, if v < 128 { [0, 0, 0, 0] } else { [195, 0, 0, 255] });
            }
            Ok(cmap)
        }
        other => Err(TilerError::invalid_param(
            "color_map",
            format!("unknown colormap '{}'", other),
        )),
    }
}

/// Names accepted by [`lookup`].
pub fn names() -> &'static [&'static str] {
    &["gray", "viridis", "rdbu", "above"]
}

fn parse_json(s: &str) -> TilerResult<ColorMap> {
    let raw: BTreeMap<String, [u8; 4]> = serde_json::from_str(s)
        .map_err(|e| TilerError::invalid_param("color_map", format!("invalid JSON: {}", e)))?;

    let mut cmap = ColorMap::new();
    for (key, rgba) in raw {
        let value: u8 = key.parse().map_err(|_| {
            TilerError::invalid_param("color_map", format!("invalid pixel value '{}'", key))
        })?;
        cmap.insert(value, rgba);
    }
    Ok(cmap)
}

/// Build a full 256-entry map by linear interpolation between stops.
fn interpolated(stops: &[(u8, [u8; 3])]) -> ColorMap {
    let mut cmap = ColorMap::new();
    for window in stops.windows(2) {
        let (from, from_rgb) = window[0];
        let (to, to_rgb) = window[1];
        let span = (to - from).max(1) as f64;
        for v in from..=to {
            let t = (v - from) as f64 / span;
            let mut rgba = [0u8; 4];
            for c in 0..3 {
                rgba[c] = (from_rgb[c] as f64 + t * (to_rgb[c] as f64 - from_rgb[c] as f64))
                    .round() as u8;
            }
            rgba[3] = 255;
            cmap.insert(v, rgba);
        }
    }
    cmap
}
