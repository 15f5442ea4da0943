//! Polling client.
//!
//! One task per endpoint. Each task polls, applies the payload to the shared
//! `UiState`, then sleeps for the endpoint's interval, whatever the outcome.
//! There is no retry or backoff: a failure marks the engine as down and the
//! next scheduled poll fires as usual.

use crate::state::{PollOutcome, SharedState};
use chrono::{DateTime, Utc};
use nubot_console_core::{AppConfig, Endpoint};
use nubot_control_client::ControlClient;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters for one endpoint's poll loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Total number of poll cycles, including skipped ones
    pub cycles: u64,
    /// Responses applied or answered without data
    pub successes: u64,
    /// Failed requests
    pub failures: u64,
    /// Cycles with no request because the bot is stopped
    pub skipped: u64,
    /// Responses dropped because the run state flipped in flight
    pub stale: u64,
    /// Last successful poll timestamp
    pub last_success: Option<DateTime<Utc>>,
}

impl PollStats {
    fn record(&mut self, outcome: PollOutcome) {
        self.cycles += 1;
        match outcome {
            PollOutcome::Applied | PollOutcome::Empty => {
                self.successes += 1;
                self.last_success = Some(Utc::now());
            }
            PollOutcome::Stale => self.stale += 1,
            PollOutcome::Skipped => self.skipped += 1,
            PollOutcome::Failed => self.failures += 1,
            PollOutcome::Cancelled => {}
        }
    }
}

#[derive(Clone)]
pub struct Poller {
    client: ControlClient,
    state: SharedState,
    config: watch::Receiver<AppConfig>,
    cancel: CancellationToken,
    stats: Arc<Mutex<HashMap<Endpoint, PollStats>>>,
}

impl Poller {
    #[must_use]
    pub fn new(
        client: ControlClient,
        state: SharedState,
        config: watch::Receiver<AppConfig>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            state,
            config,
            cancel,
            stats: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Issues one read request for `endpoint` and reconciles the response.
    ///
    /// Orders and balances are skipped while the bot is stopped. The run epoch
    /// is captured before the request goes out so that a response crossing a
    /// start/stop transition is discarded.
    pub async fn poll(&self, endpoint: Endpoint) -> PollOutcome {
        let outcome = self.poll_once(endpoint).await;
        self.stats.lock().await.entry(endpoint).or_default().record(outcome);
        outcome
    }

    async fn poll_once(&self, endpoint: Endpoint) -> PollOutcome {
        let (running, epoch) = {
            let state = self.state.read().await;
            (state.is_running(), state.run_epoch())
        };

        if endpoint.requires_running() && !running {
            return PollOutcome::Skipped;
        }

        let result = tokio::select! {
            () = self.cancel.cancelled() => return PollOutcome::Cancelled,
            result = self.client.poll(endpoint) => result,
        };

        if self.cancel.is_cancelled() {
            return PollOutcome::Cancelled;
        }

        match result {
            Ok(payload) => {
                let outcome = self.state.write().await.apply_poll(payload, epoch);
                if outcome == PollOutcome::Stale {
                    debug!(endpoint = %endpoint, epoch, "Dropped response from previous run");
                }
                outcome
            }
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "Poll failed");
                self.state.write().await.mark_engine_down(&e.to_string());
                PollOutcome::Failed
            }
        }
    }

    /// Spawns one loop per endpoint. Loops run until the token is cancelled.
    #[must_use]
    pub fn spawn(&self) -> Vec<JoinHandle<()>> {
        Endpoint::ALL
            .into_iter()
            .map(|endpoint| {
                let poller = self.clone();
                tokio::spawn(async move { poller.run(endpoint).await })
            })
            .collect()
    }

    async fn run(self, endpoint: Endpoint) {
        let delay = self.config.borrow().polling.initial_delay(endpoint);
        info!(endpoint = %endpoint, delay_ms = delay.as_millis() as u64, "Poll loop started");

        if !self.sleep(delay).await {
            return;
        }

        loop {
            if self.poll(endpoint).await == PollOutcome::Cancelled {
                break;
            }

            // Re-read each cycle so a config reload changes the cadence
            let interval = self.config.borrow().polling.interval(endpoint);
            if !self.sleep(interval).await {
                break;
            }
        }

        debug!(endpoint = %endpoint, "Poll loop stopped");
    }

    /// Sleeps unless cancelled first. Returns false on cancellation.
    async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }

    pub async fn stats(&self, endpoint: Endpoint) -> PollStats {
        self.stats
            .lock()
            .await
            .get(&endpoint)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}
