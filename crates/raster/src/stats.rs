//! Per-band summary statistics over a tile's valid pixels.
//!
//! Backs the metadata endpoint: percentile cut points for rescale hints
//! plus a histogram of the value distribution. Masked pixels never count.

use serde::Serialize;

use crate::source::RenderedTile;

/// Statistics for one band.
#[derive(Debug, Clone, Serialize)]
pub struct BandStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    /// Lower and upper percentile cut points.
    pub pc: [f64; 2],
    /// Histogram as (counts, bin edges); edges has one more entry
    /// than counts.
    pub histogram: (Vec<u64>, Vec<f64>),
    pub valid_pixels: u64,
}

/// Histogram shape: bin count plus an optional fixed value range. Without
/// a range the band's own min/max spans the bins.
#[derive(Debug, Clone, Copy)]
pub struct HistogramOptions {
    pub bins: usize,
    pub range: Option<(f64, f64)>,
}

impl Default for HistogramOptions {
    fn default() -> Self {
        Self {
            bins: 10,
            range: None,
        }
    }
}

/// Compute statistics for every band of `tile`, skipping masked pixels.
///
/// `pmin`/`pmax` are the percentile cut points to report (range-checked by
/// the caller). A band with no valid pixels reports zeros and an empty
/// histogram.
pub fn band_statistics(
    tile: &RenderedTile,
    pmin: f64,
    pmax: f64,
    options: HistogramOptions,
) -> Vec<BandStatistics> {
    tile.bands
        .iter()
        .map(|band| {
            let mut valid: Vec<f64> = band
                .iter()
                .zip(tile.mask.iter())
                .filter(|(_, &m)| m != 0)
                .map(|(&v, _)| v as f64)
                .collect();
            valid.sort_by(|a, b| a.total_cmp(b));
            single_band(&valid, pmin, pmax, options)
        })
        .collect()
}

fn single_band(sorted: &[f64], pmin: f64, pmax: f64, options: HistogramOptions) -> BandStatistics {
    if sorted.is_empty() {
        return BandStatistics {
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            std: 0.0,
            pc: [0.0, 0.0],
            histogram: (Vec::new(), Vec::new()),
            valid_pixels: 0,
        };
    }

    let n = sorted.len();
    let min = sorted[0];
    let max = sorted[n - 1];
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;

    BandStatistics {
        min,
        max,
        mean,
        std: variance.sqrt(),
        pc: [percentile(sorted, pmin), percentile(sorted, pmax)],
        histogram: histogram(sorted, options.bins, options.range.unwrap_or((min, max))),
        valid_pixels: n as u64,
    }
}

/// Percentile with linear interpolation between the two nearest ranks.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Equal-width histogram over `[lo, hi]`. Values outside the range are
/// dropped; the top edge is inclusive so `hi` lands in the last bin.
fn histogram(sorted: &[f64], bins: usize, (lo, hi): (f64, f64)) -> (Vec<u64>, Vec<f64>) {
    let span = hi - lo;
    let edges: Vec<f64> = (0..=bins)
        .map(|i| lo + span * i as f64 / bins as f64)
        .collect();

    let mut counts = vec![0u64; bins];
    if span > 0.0 {
        for &v in sorted {
            if v < lo || v > hi {
                continue;
            }
            let idx = (((v - lo) / span * bins as f64) as usize).min(bins - 1);
            counts[idx] += 1;
        }
    } else {
        // Degenerate range: every in-range value falls in the first bin.
        counts[0] = sorted.iter().filter(|&&v| v == lo).count() as u64;
    }

    (counts, edges)
}
