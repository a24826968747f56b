use std::future::Future;
use std::io::Write;
use std::time::Duration;

use tracing::info;

use crate::config::{BenchConfig, FailurePolicy};
use crate::error::{BenchError, RoundError};
use crate::record::{Mechanism, RoundRecord};
use crate::report::Reporter;

/// One side of a handoff mechanism that can execute timed rounds.
pub trait RoundRunner {
    fn mechanism(&self) -> Mechanism;

    /// Execute one complete round for a payload of `size` bytes and return
    /// the timed interval. Implementations leave shared state clean on
    /// success so the next round starts from scratch.
    fn run_round(
        &mut self,
        size: usize,
        rep: u32,
    ) -> impl Future<Output = Result<Duration, RoundError>>;
}

/// Drive `runner` through every (size, repetition) pair in order.
///
/// Rounds are strictly sequential. A failed round is reported and never
/// folded into timing statistics; `config.on_failure` decides whether the
/// run stops there.
pub async fn run_benchmark<R, W>(
    config: &BenchConfig,
    runner: &mut R,
    reporter: &mut Reporter<W>,
) -> Result<(), BenchError>
where
    R: RoundRunner,
    W: Write,
{
    config.validate()?;
    let mechanism = runner.mechanism();
    info!(
        "Benchmark {}: sizes={:?} reps={} on_failure={:?}",
        mechanism, config.sizes, config.reps, config.on_failure
    );

    for &size in &config.sizes {
        for rep in 1..=config.reps {
            match runner.run_round(size, rep).await {
                Ok(elapsed) => {
                    let record = RoundRecord::new(mechanism.clone(), size, rep, elapsed);
                    reporter.record(&record)?;
                }
                Err(err) => {
                    reporter.failure(&mechanism, size, rep, &err);
                    if config.on_failure == FailurePolicy::Abort {
                        return Err(BenchError::RoundFailed { size, rep, source: err });
                    }
                }
            }
        }
    }

    Ok(())
}
