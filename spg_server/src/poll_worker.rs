use std::time::Duration;

use log::*;
use spg_engine::{ReconciliationApi, SqliteDatabase};
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::integrations::gateway::ProviderGateway;

/// Starts the payment poll worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Each tick reconciles the pending orders that are old enough to have missed their webhook, and cancels those that
/// are past the payment expiry. A tick that overruns the interval delays the next one rather than piling up.
pub fn start_poll_worker(api: ReconciliationApi<SqliteDatabase, ProviderGateway>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("🕰️ Payment poll worker started. Polling every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            trace!("🕰️ Running payment poll");
            match api.poll_pending_orders().await {
                Ok(summary) if summary.checked == 0 => trace!("🕰️ No pending orders to poll"),
                Ok(summary) => info!("🕰️ Payment poll complete: {summary}"),
                Err(e) => error!("🕰️ Error running payment poll: {e}"),
            }
        }
    })
}
