//! The single UI-state object shared by pollers, the dispatcher and renderers.

use chrono::{DateTime, Utc};
use nubot_console_core::{
    BalanceSnapshot, BotStatus, ConfigForm, Endpoint, Operation, Order, RunState,
};
use nubot_control_client::PollPayload;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared handle to the dashboard state.
pub type SharedState = Arc<RwLock<UiState>>;

/// How a poll response was reconciled with the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The region was replaced with the payload.
    Applied,
    /// The server answered without data for the region.
    Empty,
    /// The running flag flipped while the request was in flight.
    Stale,
    /// The endpoint is not polled while the bot is stopped.
    Skipped,
    /// The request failed; the engine is considered down.
    Failed,
    /// The dashboard shut down before the response could be applied.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Error,
}

/// A user-facing notice. Replaces blocking alert dialogs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiMessage {
    pub level: MessageLevel,
    pub text: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UiState {
    run_state: RunState,
    run_epoch: u64,
    pending: Option<Operation>,
    engine_down: bool,
    status: Option<BotStatus>,
    orders: Vec<Order>,
    balances: Option<BalanceSnapshot>,
    log: String,
    config_file: String,
    config_form: ConfigForm,
    log_line: u64,
    spinner_frame: usize,
    messages: VecDeque<UiMessage>,
    message_capacity: usize,
    last_update: HashMap<Endpoint, DateTime<Utc>>,
}

impl Default for UiState {
    fn default() -> Self {
        Self::new(10)
    }
}

impl UiState {
    #[must_use]
    pub fn new(message_capacity: usize) -> Self {
        Self {
            run_state: RunState::Stopped,
            run_epoch: 0,
            pending: None,
            engine_down: false,
            status: None,
            orders: Vec::new(),
            balances: None,
            log: String::new(),
            config_file: String::new(),
            config_form: ConfigForm::default(),
            log_line: 0,
            spinner_frame: 0,
            messages: VecDeque::with_capacity(message_capacity),
            message_capacity: message_capacity.max(1),
            last_update: HashMap::new(),
        }
    }

    #[must_use]
    pub fn shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[must_use]
    pub const fn run_state(&self) -> RunState {
        self.run_state
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.run_state.is_running()
    }

    /// Incremented every time the running flag flips.
    #[must_use]
    pub const fn run_epoch(&self) -> u64 {
        self.run_epoch
    }

    /// Start/stop request currently awaiting an answer, if any.
    #[must_use]
    pub const fn pending(&self) -> Option<Operation> {
        self.pending
    }

    #[must_use]
    pub const fn engine_down(&self) -> bool {
        self.engine_down
    }

    #[must_use]
    pub const fn status(&self) -> Option<&BotStatus> {
        self.status.as_ref()
    }

    #[must_use]
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    #[must_use]
    pub const fn balances(&self) -> Option<&BalanceSnapshot> {
        self.balances.as_ref()
    }

    #[must_use]
    pub fn log(&self) -> &str {
        &self.log
    }

    #[must_use]
    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    #[must_use]
    pub const fn config_form(&self) -> &ConfigForm {
        &self.config_form
    }

    pub fn config_form_mut(&mut self) -> &mut ConfigForm {
        &mut self.config_form
    }

    /// Number of log polls applied so far.
    #[must_use]
    pub const fn log_line(&self) -> u64 {
        self.log_line
    }

    #[must_use]
    pub const fn spinner_frame(&self) -> usize {
        self.spinner_frame
    }

    pub fn messages(&self) -> impl Iterator<Item = &UiMessage> {
        self.messages.iter()
    }

    #[must_use]
    pub fn last_update(&self, endpoint: Endpoint) -> Option<DateTime<Utc>> {
        self.last_update.get(&endpoint).copied()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Sets the running flag. Returns true when it actually flipped.
    ///
    /// A flip bumps the run epoch, and stopping empties the order and balance
    /// tables.
    pub fn set_run_state(&mut self, state: RunState) -> bool {
        if self.run_state == state {
            return false;
        }
        self.run_state = state;
        self.run_epoch += 1;
        if let Some(status) = self.status.as_mut() {
            status.state = state;
        }
        if !state.is_running() {
            self.orders.clear();
            self.balances = None;
        }
        tracing::debug!(state = %state, epoch = self.run_epoch, "Run state changed");
        true
    }

    pub fn set_pending(&mut self, operation: Option<Operation>) {
        self.pending = operation;
    }

    /// Blanks the duration shown for the last session.
    pub fn clear_duration(&mut self) {
        if let Some(status) = self.status.as_mut() {
            status.duration.clear();
        }
    }

    /// Flags the engine as unreachable. The first failure after a healthy
    /// period is reported once in the message list.
    pub fn mark_engine_down(&mut self, reason: &str) {
        if !self.engine_down {
            self.push_error(format!("NuBot engine is down ({reason})"));
        }
        self.engine_down = true;
    }

    pub fn set_config_form(&mut self, form: ConfigForm) {
        self.config_form = form;
    }

    pub fn set_config_file(&mut self, contents: String) {
        self.config_file = contents;
    }

    pub fn push_info(&mut self, text: impl Into<String>) {
        self.push_message(MessageLevel::Info, text.into());
    }

    pub fn push_error(&mut self, text: impl Into<String>) {
        self.push_message(MessageLevel::Error, text.into());
    }

    fn push_message(&mut self, level: MessageLevel, text: String) {
        if self.messages.len() >= self.message_capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(UiMessage {
            level,
            text,
            at: Utc::now(),
        });
    }

    /// Reconciles a successful poll with the state.
    ///
    /// `issued_epoch` is the run epoch read when the request went out.
    /// Status, order and balance payloads are dropped if the epoch moved on
    /// since.
    pub fn apply_poll(&mut self, payload: PollPayload, issued_epoch: u64) -> PollOutcome {
        self.engine_down = false;
        let stale = issued_epoch != self.run_epoch;

        let (endpoint, outcome) = match payload {
            PollPayload::Status(status) => {
                self.spinner_frame = self.spinner_frame.wrapping_add(1);
                if stale {
                    (Endpoint::Status, PollOutcome::Stale)
                } else {
                    self.set_run_state(status.state);
                    self.status = Some(status);
                    (Endpoint::Status, PollOutcome::Applied)
                }
            }
            PollPayload::Orders(orders) => {
                let outcome = if stale || !self.is_running() {
                    PollOutcome::Stale
                } else if let Some(orders) = orders {
                    self.orders = orders;
                    PollOutcome::Applied
                } else {
                    PollOutcome::Empty
                };
                (Endpoint::Orders, outcome)
            }
            PollPayload::Balances(balances) => {
                let outcome = if stale || !self.is_running() {
                    PollOutcome::Stale
                } else if let Some(balances) = balances {
                    self.balances = Some(balances);
                    PollOutcome::Applied
                } else {
                    PollOutcome::Empty
                };
                (Endpoint::Balances, outcome)
            }
            PollPayload::Log(log) => {
                self.log = log;
                self.log_line += 1;
                (Endpoint::Log, PollOutcome::Applied)
            }
            PollPayload::ConfigFile(contents) => {
                self.config_file = contents;
                (Endpoint::ConfigFile, PollOutcome::Applied)
            }
        };

        if outcome == PollOutcome::Applied {
            self.last_update.insert(endpoint, Utc::now());
        }
        outcome
    }
}
