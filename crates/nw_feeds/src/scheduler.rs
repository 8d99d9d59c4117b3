use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::pipeline::IngestPipeline;

/// Runs the pipeline now and then every `every` until `shutdown` resolves.
/// Failed rounds are logged; the loop keeps going. A round still in flight
/// when `shutdown` resolves is abandoned.
pub async fn run_periodic<F>(pipeline: Arc<IngestPipeline>, every: Duration, source: Option<String>, shutdown: F) -> usize
where
    F: Future<Output = ()>,
{
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let mut rounds = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("🛑 Scheduler stopping after {} rounds", rounds);
                return rounds;
            }
            _ = ticker.tick() => {}
        }

        rounds += 1;
        tokio::select! {
            _ = &mut shutdown => {
                warn!("🛑 Scheduler stopping, round {} interrupted", rounds);
                return rounds;
            }
            result = pipeline.run_once(source.as_deref()) => match result {
                Ok(report) => info!(
                    "⏰ Round {}: {} new, {} merged, {} updated",
                    rounds, report.new, report.merged, report.updated
                ),
                Err(e) => error!("Round {} failed: {}", rounds, e),
            }
        }
    }
}
