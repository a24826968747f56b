use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use tracing::{error, info, warn};

use crate::error::RoundError;
use crate::record::{CSV_HEADER, Mechanism, RoundRecord};

/// Writes round records as CSV and accumulates the end-of-run summary.
///
/// The CSV stream (normally stdout) carries only the header and one line per
/// successful round. Failures go to the log and the summary's failure count.
pub struct Reporter<W: Write> {
    out: W,
    mirror: Option<File>,
    summary: BenchSummary,
}

impl<W: Write> Reporter<W> {
    pub fn new(mut out: W) -> io::Result<Self> {
        writeln!(out, "{}", CSV_HEADER)?;
        out.flush()?;
        Ok(Self {
            out,
            mirror: None,
            summary: BenchSummary::default(),
        })
    }

    /// Also append CSV lines to `path`. The header is written only if the
    /// file is empty so repeated runs can share one results file.
    pub fn with_results_file(mut self, path: &Path) -> io::Result<Self> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        if file.metadata()?.len() == 0 {
            writeln!(file, "{}", CSV_HEADER)?;
        }
        info!("Mirroring results to {}", path.display());
        self.mirror = Some(file);
        Ok(self)
    }

    pub fn record(&mut self, record: &RoundRecord) -> io::Result<()> {
        let line = record.csv_line();
        writeln!(self.out, "{}", line)?;
        self.out.flush()?;
        if let Some(file) = self.mirror.as_mut() {
            writeln!(file, "{}", line)?;
        }

        info!(
            "{} size={}B rep={} time={:.3}ms thr={:.3}MiB/s",
            record.mechanism.to_string().to_uppercase(),
            record.size_bytes,
            record.rep,
            record.elapsed_ms(),
            record.throughput_mib_s()
        );
        self.summary.record_success(record);
        Ok(())
    }

    pub fn failure(&mut self, mechanism: &Mechanism, size: usize, rep: u32, err: &RoundError) {
        if err.is_integrity() {
            error!(
                mechanism = %mechanism,
                size,
                rep,
                failure = err.category(),
                "Round failed integrity check: {}",
                err
            );
        } else {
            warn!(
                mechanism = %mechanism,
                size,
                rep,
                failure = err.category(),
                "Round failed: {}",
                err
            );
        }
        self.summary.record_failure(size);
    }

    pub fn summary(&self) -> &BenchSummary {
        &self.summary
    }

    /// Log the summary and hand back the sink and summary.
    pub fn finish(self) -> (W, BenchSummary) {
        for size in self.summary.sizes() {
            match &size.timing {
                Some(t) => info!(
                    "summary size={}B ok={} failed={} mean={:.3}ms p50={:.3}ms p95={:.3}ms p99={:.3}ms thr={:.3}±{:.3}MiB/s",
                    size.size_bytes,
                    size.successes,
                    size.failures,
                    t.mean_ms,
                    t.p50_ms,
                    t.p95_ms,
                    t.p99_ms,
                    t.mean_mib_s,
                    t.std_dev_mib_s
                ),
                None => warn!(
                    "summary size={}B ok=0 failed={} (no successful rounds)",
                    size.size_bytes, size.failures
                ),
            }
        }
        (self.out, self.summary)
    }
}

#[derive(Debug, Default)]
struct SizeSamples {
    elapsed_ms: Vec<f64>,
    throughput: Vec<f64>,
    failures: u32,
}

/// Per-size aggregates over successful rounds only.
#[derive(Debug, Default)]
pub struct BenchSummary {
    by_size: BTreeMap<usize, SizeSamples>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SizeSummary {
    pub size_bytes: usize,
    pub successes: usize,
    pub failures: u32,
    /// `None` when every round for this size failed.
    pub timing: Option<TimingStats>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimingStats {
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub mean_mib_s: f64,
    pub std_dev_mib_s: f64,
}

impl BenchSummary {
    fn record_success(&mut self, record: &RoundRecord) {
        let samples = self.by_size.entry(record.size_bytes).or_default();
        samples.elapsed_ms.push(record.elapsed_ms());
        samples.throughput.push(record.throughput_mib_s());
    }

    fn record_failure(&mut self, size: usize) {
        self.by_size.entry(size).or_default().failures += 1;
    }

    pub fn total_successes(&self) -> usize {
        self.by_size.values().map(|s| s.elapsed_ms.len()).sum()
    }

    pub fn total_failures(&self) -> u32 {
        self.by_size.values().map(|s| s.failures).sum()
    }

    pub fn sizes(&self) -> Vec<SizeSummary> {
        self.by_size
            .iter()
            .map(|(&size_bytes, samples)| SizeSummary {
                size_bytes,
                successes: samples.elapsed_ms.len(),
                failures: samples.failures,
                timing: timing_stats(samples),
            })
            .collect()
    }
}

fn timing_stats(samples: &SizeSamples) -> Option<TimingStats> {
    if samples.elapsed_ms.is_empty() {
        return None;
    }
    let mut sorted = samples.elapsed_ms.clone();
    sorted.sort_by(f64::total_cmp);

    Some(TimingStats {
        mean_ms: mean(&sorted),
        p50_ms: percentile(&sorted, 0.50),
        p95_ms: percentile(&sorted, 0.95),
        p99_ms: percentile(&sorted, 0.99),
        mean_mib_s: mean(&samples.throughput),
        std_dev_mib_s: sample_std_dev(&samples.throughput),
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Linear interpolation between closest ranks. `sorted` must be non-empty.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}
