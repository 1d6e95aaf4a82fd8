use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::Engine;

/// Periodic reclaim of offer rounds nobody accepted in time. The rides
/// themselves stay pending; re-broadcast is left to resubmission or an
/// external scheduler.
pub async fn run_sweeper(engine: Arc<Engine>, period: Duration) {
    let mut interval = tokio::time::interval(period);

    loop {
        interval.tick().await;

        let reclaimed = engine.offers().sweep(Utc::now());

        for ride_id in reclaimed {
            tracing::info!(%ride_id, "offer round expired, ride left pending");
        }
    }
}
