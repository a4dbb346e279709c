//! Per-stage timing for tile requests.

use std::time::Instant;

/// Wall-clock timer for a single pipeline stage.
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed time in milliseconds with sub-millisecond precision.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

/// Render stage timings as a response header value, e.g.
/// `Read - 12.34; Post-process - 0.52; Format - 3.10`.
pub fn format_timings(timings: &[(&str, f64)]) -> String {
    timings
        .iter()
        .map(|(name, ms)| format!("{} - {:.2}", name, ms))
        .collect::<Vec<_>>()
        .join("; ")
}
