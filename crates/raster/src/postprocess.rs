//! Tile postprocessing: value rescaling and color formulas.
//!
//! Order matters and is enforced by the types: rescaling turns a raw
//! [`RenderedTile`] into a display-range [`ScaledTile`], and the color
//! formula DSL only operates on a [`ScaledTile`].

use crate::source::RenderedTile;
use tiler_common::{TilerError, TilerResult};

/// A tile rescaled to display range (u8 per sample), mask carried through.
#[derive(Debug, Clone)]
pub struct ScaledTile {
    pub width: u32,
    pub height: u32,
    pub bands: Vec<Vec<u8>>,
    pub mask: Vec<u8>,
}

/// One per-band min/max rescale range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RescaleRange {
    pub min: f64,
    pub max: f64,
}

impl RescaleRange {
    /// Parse `"min,max"`.
    pub fn parse(s: &str) -> TilerResult<Self> {
        let mut parts = s.split(',');
        let (min, max) = match (parts.next(), parts.next(), parts.next()) {
            (Some(min), Some(max), None) => (min.trim(), max.trim()),
            _ => {
                return Err(TilerError::invalid_param(
                    "rescale",
                    format!("expected 'min,max', got '{}'", s),
                ))
            }
        };
        let min: f64 = min
            .parse()
            .map_err(|_| TilerError::invalid_param("rescale", format!("invalid number '{}'", min)))?;
        let max: f64 = max
            .parse()
            .map_err(|_| TilerError::invalid_param("rescale", format!("invalid number '{}'", max)))?;
        if max <= min {
            return Err(TilerError::invalid_param(
                "rescale",
                format!("max must exceed min in '{}'", s),
            ));
        }
        Ok(Self { min, max })
    }

    /// Parse a semicolon-separated list of ranges, one per band.
    /// A single range is broadcast to every band.
    pub fn parse_list(s: &str) -> TilerResult<Vec<Self>> {
        s.split(';').map(Self::parse).collect()
    }
}

/// Rescale raw sample values to 0..=255.
///
/// With no ranges, values are clamp-cast; with one range it applies to all
/// bands; otherwise the range count must match the band count.
pub fn rescale_tile(tile: &RenderedTile, ranges: &[RescaleRange]) -> TilerResult<ScaledTile> {
    let n_bands = tile.bands.len();
    if ranges.len() > 1 && ranges.len() != n_bands {
        return Err(TilerError::invalid_param(
            "rescale",
            format!("{} ranges given for {} bands", ranges.len(), n_bands),
        ));
    }

    let bands = tile
        .bands
        .iter()
        .enumerate()
        .map(|(i, band)| {
            let range = match ranges {
                [] => None,
                [only] => Some(only),
                many => Some(&many[i]),
            };
            band.iter()
                .map(|&v| match range {
                    Some(r) => {
                        let norm = (v as f64 - r.min) / (r.max - r.min);
                        (norm * 255.0).clamp(0.0, 255.0) as u8
                    }
                    None => v.clamp(0.0, 255.0) as u8,
                })
                .collect()
        })
        .collect();

    Ok(ScaledTile {
        width: tile.width,
        height: tile.height,
        bands,
        mask: tile.mask.clone(),
    })
}

/// Band selection for a color operation (subset of R, G, B).
#[derive(Debug, Clone, PartialEq)]
struct BandSelect(Vec<usize>);

impl BandSelect {
    fn parse(s: &str) -> TilerResult<Self> {
        let mut bands = Vec::new();
        for c in s.chars() {
            let idx = match c.to_ascii_uppercase() {
                'R' => 0,
                'G' => 1,
                'B' => 2,
                other => {
                    return Err(TilerError::invalid_param(
                        "color_formula",
                        format!("unknown band letter '{}'", other),
                    ))
                }
            };
            if !bands.contains(&idx) {
                bands.push(idx);
            }
        }
        Ok(Self(bands))
    }
}

/// One operation of the color formula DSL.
#[derive(Debug, Clone, PartialEq)]
enum ColorOp {
    Gamma { bands: BandSelect, g: f64 },
    Sigmoidal { bands: BandSelect, contrast: f64, bias: f64 },
    Saturation { s: f64 },
}

/// A parsed color formula: a sequence of gamma / sigmoidal / saturation
/// operations applied in order to display-range bands.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorFormula {
    ops: Vec<ColorOp>,
}

impl ColorFormula {
    /// Parse a whitespace-separated formula such as
    /// `"gamma RG 1.3 sigmoidal RGB 22 0.1 saturation 1.2"`.
    /// Commas between operations are tolerated.
    pub fn parse(s: &str) -> TilerResult<Self> {
        let cleaned = s.replace(',', " ");
        let mut tokens = cleaned.split_whitespace();
        let mut ops = Vec::new();

        while let Some(op) = tokens.next() {
            match op.to_ascii_lowercase().as_str() {
                "gamma" => {
                    let bands = BandSelect::parse(expect_arg(&mut tokens, "gamma bands")?)?;
                    let g = parse_num(expect_arg(&mut tokens, "gamma value")?)?;
                    if g <= 0.0 {
                        return Err(TilerError::invalid_param(
                            "color_formula",
                            "gamma must be positive",
                        ));
                    }
                    ops.push(ColorOp::Gamma { bands, g });
                }
                "sigmoidal" => {
                    let bands = BandSelect::parse(expect_arg(&mut tokens, "sigmoidal bands")?)?;
                    let contrast = parse_num(expect_arg(&mut tokens, "sigmoidal contrast")?)?;
                    let bias = parse_num(expect_arg(&mut tokens, "sigmoidal bias")?)?;
                    ops.push(ColorOp::Sigmoidal {
                        bands,
                        contrast,
                        bias,
                    });
                }
                "saturation" => {
                    let s = parse_num(expect_arg(&mut tokens, "saturation value")?)?;
                    ops.push(ColorOp::Saturation { s });
                }
                other => {
                    return Err(TilerError::invalid_param(
                        "color_formula",
                        format!("unknown operation '{}'", other),
                    ))
                }
            }
        }

        Ok(Self { ops })
    }

    /// Apply the formula in place.
    pub fn apply(&self, tile: &mut ScaledTile) {
        for op in &self.ops {
            match op {
                ColorOp::Gamma { bands, g } => {
                    for &b in &bands.0 {
                        if let Some(band) = tile.bands.get_mut(b) {
                            for v in band.iter_mut() {
                                let u = *v as f64 / 255.0;
                                *v = (u.powf(1.0 / g) * 255.0).round().clamp(0.0, 255.0) as u8;
                            }
                        }
                    }
                }
                ColorOp::Sigmoidal {
                    bands,
                    contrast,
                    bias,
                } => {
                    for &b in &bands.0 {
                        if let Some(band) = tile.bands.get_mut(b) {
                            for v in band.iter_mut() {
                                let u = *v as f64 / 255.0;
                                *v = (sigmoidal(u, *contrast, *bias) * 255.0)
                                    .round()
                                    .clamp(0.0, 255.0) as u8;
                            }
                        }
                    }
                }
                ColorOp::Saturation { s } => saturate(tile, *s),
            }
        }
    }
}

fn expect_arg<'a>(tokens: &mut impl Iterator<Item = &'a str>, what: &str) -> TilerResult<&'a str> {
    tokens
        .next()
        .ok_or_else(|| TilerError::invalid_param("color_formula", format!("missing {}", what)))
}

fn parse_num(s: &str) -> TilerResult<f64> {
    s.parse()
        .map_err(|_| TilerError::invalid_param("color_formula", format!("invalid number '{}'", s)))
}

/// Sigmoidal contrast with bias, on a 0..1 value.
fn sigmoidal(u: f64, contrast: f64, bias: f64) -> f64 {
    if contrast == 0.0 {
        return u;
    }
    let logistic = |x: f64| 1.0 / (1.0 + (contrast * (bias - x)).exp());
    let num = logistic(u) - logistic(0.0);
    let den = logistic(1.0) - logistic(0.0);
    if den == 0.0 {
        u
    } else {
        (num / den).clamp(0.0, 1.0)
    }
}

/// Mix each pixel with its luminance. `s = 1` is identity, `s = 0` grayscale.
fn saturate(tile: &mut ScaledTile, s: f64) {
    if tile.bands.len() < 3 {
        return;
    }
    let n = (tile.width * tile.height) as usize;
    for i in 0..n {
        let r = tile.bands[0][i] as f64;
        let g = tile.bands[1][i] as f64;
        let b = tile.bands[2][i] as f64;
        let lum = 0.2126 * r + 0.7152 * g + 0.0722 * b;
        tile.bands[0][i] = (lum + s * (r - lum)).round().clamp(0.0, 255.0) as u8;
        tile.bands[1][i] = (lum + s * (g - lum)).round().clamp(0.0, 255.0) as u8;
        tile.bands[2][i] = (lum + s * (b - lum)).round().clamp(0.0, 255.0) as u8;
    }
}
