//! Keepalive pinger.
//!
//! Keeps a session alive by periodically visiting a target URL in a
//! background tab: open it inactive, wait for it to load, click it, wait,
//! then close it. One timer runs per target; scheduling a target again
//! replaces its timer.
//!
//! Visits are fire-and-forget. A failed step is logged and the visit is
//! abandoned until the next tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::browser::{BrowserError, TabController, TabCreate};
use crate::config::KeepaliveConfig;

/// Periodic keepalive timers, one per target URL.
pub struct Keepalive {
    tabs: Arc<dyn TabController>,
    timings: KeepaliveConfig,
    timers: Mutex<HashMap<String, CancellationToken>>,
    shutdown: CancellationToken,
}

impl Keepalive {
    pub fn new(tabs: Arc<dyn TabController>, timings: KeepaliveConfig) -> Self {
        Self {
            tabs,
            timings,
            timers: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Starts or replaces the timer for `target`.
    ///
    /// An interval of zero or less cancels it. The first visit happens one
    /// interval from now.
    pub fn schedule(&self, target: &str, interval_ms: i64) {
        if interval_ms <= 0 {
            self.cancel(target);
            return;
        }
        if self.shutdown.is_cancelled() {
            debug!(target, "Keepalive shut down, ignoring schedule");
            return;
        }

        let period = Duration::from_millis(interval_ms.unsigned_abs());
        let token = self.shutdown.child_token();
        let previous = self
            .timers
            .lock()
            .insert(target.to_string(), token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        info!(target, interval_ms, "Keepalive scheduled");
        tokio::spawn(run_timer(
            Arc::clone(&self.tabs),
            self.timings,
            target.to_string(),
            period,
            token,
        ));
    }

    /// Stops the timer for `target`. Returns true if one was running.
    pub fn cancel(&self, target: &str) -> bool {
        let removed = self.timers.lock().remove(target);
        match removed {
            Some(token) => {
                token.cancel();
                info!(target, "Keepalive cancelled");
                true
            }
            None => false,
        }
    }

    /// Targets with a running timer, sorted.
    pub fn active_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self.timers.lock().keys().cloned().collect();
        targets.sort();
        targets
    }

    /// Cancels every timer and refuses new ones.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.timers.lock().clear();
    }
}

impl std::fmt::Debug for Keepalive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keepalive")
            .field("timings", &self.timings)
            .field("targets", &self.active_targets())
            .finish()
    }
}

async fn run_timer(
    tabs: Arc<dyn TabController>,
    timings: KeepaliveConfig,
    target: String,
    period: Duration,
    token: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // A visit outlasting the interval delays the next one
        tokio::select! {
            _ = token.cancelled() => break,
            result = visit(tabs.as_ref(), &timings, &target) => {
                if let Err(e) = result {
                    warn!(target = %target, error = %e, "Keepalive visit failed");
                }
            }
        }
    }

    debug!(target = %target, "Keepalive timer stopped");
}

/// One keepalive visit of `target`.
async fn visit(
    tabs: &dyn TabController,
    timings: &KeepaliveConfig,
    target: &str,
) -> Result<(), BrowserError> {
    let tab = tabs.create(TabCreate::background(target)).await?;
    debug!(target, tab = %tab.id, "Keepalive tab opened");

    tokio::time::sleep(timings.load_delay()).await;
    tabs.click(tab.id).await?;

    tokio::time::sleep(timings.close_delay()).await;
    tabs.remove(&[tab.id]).await
}
