//! Periodic background sync
//!
//! One task, one pass at a time: run an aggregation, then sleep. A slow
//! pass delays the next one instead of overlapping it.

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use referral_core::{ReferralService, SyncOutcome};

pub fn spawn_updater(service: ReferralService, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "Background updater started");
        loop {
            match service.run_aggregation().await {
                SyncOutcome::Ok { groups, replica_error } => {
                    info!(groups, "Background sync complete");
                    if let Some(e) = replica_error {
                        warn!(error = %e, "Background sync saved locally, replica push failed");
                    }
                }
                SyncOutcome::NoCredentials => info!("Background sync skipped, no contacts credentials"),
                SyncOutcome::Error { message } => warn!(error = %message, "Background sync failed"),
            }
            tokio::time::sleep(interval).await;
        }
    })
}
