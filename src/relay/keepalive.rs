//! Keep-alive channel for the relay host
//!
//! While a run is active, a long-lived channel named [`KEEP_ALIVE_CHANNEL`] pings the
//! host on a fixed interval and re-arms itself shortly before the host's idle timeout.
//! This reduces suspend/restart churn; nothing depends on it for correctness.

use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::host::RelayHost;
use crate::config::KeepAliveConfig;

/// Name of the keep-alive channel
pub const KEEP_ALIVE_CHANNEL: &str = "keepAlive";

/// What the keep-alive loop did before it stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeepAliveStats {
    pub pings: u64,
    pub failed_pings: u64,
    pub rearms: u64,
}

/// Handle to a running keep-alive loop
pub struct KeepAlive {
    cancel: CancellationToken,
    task: JoinHandle<KeepAliveStats>,
}

impl KeepAlive {
    pub fn spawn(host: RelayHost, config: KeepAliveConfig) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(host, config, cancel.clone()));
        Self { cancel, task }
    }

    /// Stop the loop and collect its counters
    pub async fn stop(self) -> KeepAliveStats {
        self.cancel.cancel();
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(error = %e, "Keep-alive task failed");
                KeepAliveStats::default()
            }
        }
    }
}

async fn run(host: RelayHost, config: KeepAliveConfig, cancel: CancellationToken) -> KeepAliveStats {
    let mut stats = KeepAliveStats::default();
    // Never re-arm more often than the ping interval
    let rearm_after = config
        .max_idle
        .saturating_sub(config.rearm_margin)
        .max(config.interval);

    let mut ticker = interval_at(Instant::now() + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut rearm_at = Instant::now() + rearm_after;

    tracing::debug!(channel = KEEP_ALIVE_CHANNEL, "Keep-alive started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match host.ping() {
                    Ok(()) => stats.pings += 1,
                    Err(e) => {
                        stats.failed_pings += 1;
                        tracing::debug!(error = %e, "Keep-alive ping failed");
                    }
                }
            }
            _ = sleep_until(rearm_at) => {
                if let Err(e) = host.rearm_keepalive() {
                    tracing::debug!(error = %e, "Keep-alive re-arm failed");
                } else {
                    stats.rearms += 1;
                }
                rearm_at = Instant::now() + rearm_after;
            }
        }
    }

    tracing::debug!(
        channel = KEEP_ALIVE_CHANNEL,
        pings = stats.pings,
        rearms = stats.rearms,
        "Keep-alive stopped"
    );
    stats
}
