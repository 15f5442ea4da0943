//! Polling client, command dispatcher and UI state for the NuBot console.
//!
//! [`Dashboard`] wires the pieces together: the poll loops write into one
//! shared [`UiState`], the dispatcher posts commands and reflects their
//! outcome there, and renderers read it.

pub mod dispatcher;
pub mod poller;
pub mod render;
pub mod state;

pub use dispatcher::{Command, DispatchError, Dispatcher};
pub use poller::{PollStats, Poller};
pub use state::{MessageLevel, PollOutcome, SharedState, UiMessage, UiState};

use nubot_console_core::AppConfig;
use nubot_control_client::ControlClient;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Owns the poll tasks and the cancellation token bounding their lifetime.
pub struct Dashboard {
    state: SharedState,
    poller: Poller,
    dispatcher: Dispatcher,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Dashboard {
    #[must_use]
    pub fn new(client: ControlClient, config: watch::Receiver<AppConfig>) -> Self {
        let message_capacity = config.borrow().ui.message_capacity;
        let state = UiState::new(message_capacity).shared();
        let cancel = CancellationToken::new();

        let poller = Poller::new(client.clone(), state.clone(), config, cancel.clone());
        let dispatcher = Dispatcher::new(client, state.clone(), cancel.clone());

        Self {
            state,
            poller,
            dispatcher,
            cancel,
            tasks: Vec::new(),
        }
    }

    /// Spawns the poll loops. Calling it twice is a no-op.
    pub fn start(&mut self) {
        if !self.tasks.is_empty() {
            return;
        }
        self.tasks = self.poller.spawn();
        info!(loops = self.tasks.len(), "Dashboard polling started");
    }

    #[must_use]
    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    #[must_use]
    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    #[must_use]
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    /// Cancels every loop and in-flight request, then waits for the tasks.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Poll task ended abnormally");
            }
        }
        info!("Dashboard stopped");
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
