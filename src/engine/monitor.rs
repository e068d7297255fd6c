use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::ScrapingEngine;
use crate::models::Match;

/// Run filtered cycles every `every` until `shutdown` resolves.
///
/// Each snapshot is handed to `sink`. A cycle in flight is never cancelled;
/// shutdown is observed between cycles. Returns the number of cycles run.
pub async fn run_monitor<S, F>(
    engine: &ScrapingEngine,
    every: Duration,
    shutdown: S,
    mut sink: F,
) -> usize
where
    S: Future<Output = ()>,
    F: FnMut(&[Match]),
{
    info!(
        "Match monitor started ({} sources: {:?}, interval={:?})",
        engine.source_names().len(),
        engine.source_names(),
        every
    );

    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let mut cycles = 0;
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping monitor after {} cycles", cycles);
                break;
            }
            _ = interval.tick() => {}
        }

        cycles += 1;
        match engine.get_filtered_matches().await {
            Ok(matches) => {
                let active = matches.iter().filter(|m| m.status.is_active()).count();
                let tie_breaks = matches.iter().filter(|m| m.is_tie_break()).count();
                info!(
                    "Cycle {}: {} matches ({} active, {} tie-breaks)",
                    cycles,
                    matches.len(),
                    active,
                    tie_breaks
                );
                sink(&matches);
            }
            Err(e) => error!("Monitoring cycle {} failed: {}", cycles, e),
        }
    }
    cycles
}
