use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};

use crate::mirror::MirrorEngine;

/// Runs a pass every `period`, starting immediately. Never returns.
///
/// Passes started here run back to back; a slow pass delays the next tick
/// instead of stacking up. Manual runs through the API are not coordinated
/// with this loop.
pub async fn run_periodic(engine: MirrorEngine, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(period_secs = period.as_secs(), "scheduled mirroring enabled");

    loop {
        ticker.tick().await;
        match engine.run_pass().await {
            Ok(summary) if summary.is_success() => {}
            Ok(summary) => {
                tracing::warn!(
                    pass_id = %summary.pass_id,
                    errors = summary.errors.len(),
                    "scheduled mirror pass left items unmirrored"
                );
            }
            Err(err) => {
                tracing::error!(error = %err, "scheduled mirror pass aborted");
            }
        }
    }
}
