//! Stage timing for pipeline runs: a scoped meter and the run report.

use std::time::Instant;

use log::info;

/// One timed measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    pub label: String,
    pub duration_ns: u64,
    pub item_count: usize,
}

impl BenchmarkResult {
    pub fn new(label: impl Into<String>, duration_ns: u64, item_count: usize) -> Self {
        Self {
            label: label.into(),
            duration_ns,
            item_count,
        }
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ns as f64 / 1_000_000.0
    }

    pub fn ns_per_item(&self) -> f64 {
        if self.item_count == 0 {
            return 0.0;
        }
        self.duration_ns as f64 / self.item_count as f64
    }

    pub fn items_per_second(&self) -> f64 {
        if self.duration_ns == 0 {
            return 0.0;
        }
        self.item_count as f64 * 1_000_000_000.0 / self.duration_ns as f64
    }
}

/// Scoped stage timer. Records the start on construction and pushes a
/// [`BenchmarkResult`] into the results vector when the scope closes,
/// on every exit path.
pub struct StageMeter<'a> {
    label: String,
    item_count: usize,
    results: &'a mut Vec<BenchmarkResult>,
    start: Instant,
}

impl<'a> StageMeter<'a> {
    pub fn start(
        label: impl Into<String>,
        item_count: usize,
        results: &'a mut Vec<BenchmarkResult>,
    ) -> Self {
        Self {
            label: label.into(),
            item_count,
            results,
            start: Instant::now(),
        }
    }

    /// For stages whose item count is only known once the work is done.
    pub fn set_count(&mut self, item_count: usize) {
        self.item_count = item_count;
    }
}

impl Drop for StageMeter<'_> {
    fn drop(&mut self) {
        let duration_ns = self.start.elapsed().as_nanos() as u64;
        self.results.push(BenchmarkResult {
            label: std::mem::take(&mut self.label),
            duration_ns,
            item_count: self.item_count,
        });
    }
}

/// Emit one line per stage plus a pipeline total.
pub fn report(results: &[BenchmarkResult]) {
    let mut total_ns: u64 = 0;
    for r in results {
        total_ns += r.duration_ns;
        info!(
            "{:<24} {:>12.3} ms {:>12.1} ns/item {:>14.0} items/s",
            r.label,
            r.duration_ms(),
            r.ns_per_item(),
            r.items_per_second()
        );
    }
    info!("{:<24} {:>12.3} ms", "TOTAL", total_ns as f64 / 1_000_000.0);
}
