//! Command dispatcher.
//!
//! Turns user actions into single mutating requests and reflects the
//! server's `success` field in the shared `UiState`. Overlapping commands are
//! not deduplicated; whichever response lands last wins.

use crate::state::SharedState;
use nubot_console_core::{Operation, RunState};
use nubot_control_client::{ControlClient, ControlError};
use std::fmt;
use std::future::Future;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    SaveConfig,
    ResetConfig,
    LoadConfig,
}

impl Command {
    /// Question to put to the user before dispatching, if any.
    #[must_use]
    pub const fn confirmation_prompt(self) -> Option<&'static str> {
        match self {
            Self::Start => Some("Are you sure you want to start the bot?"),
            Self::Stop => Some("Are you sure you want to stop the bot?"),
            Self::ResetConfig => Some("Are you sure?"),
            Self::SaveConfig | Self::LoadConfig => None,
        }
    }

    #[must_use]
    pub const fn needs_confirmation(self) -> bool {
        self.confirmation_prompt().is_some()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::SaveConfig => "save config",
            Self::ResetConfig => "reset config",
            Self::LoadConfig => "load config",
        };
        f.write_str(name)
    }
}

impl From<Operation> for Command {
    fn from(operation: Operation) -> Self {
        match operation {
            Operation::Start => Self::Start,
            Operation::Stop => Self::Stop,
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The command needs confirmation and none was given. Nothing was sent.
    #[error("{0} was not confirmed")]
    NotConfirmed(Command),

    /// The server answered `success: false`.
    #[error("{0}")]
    Rejected(String),

    /// The dashboard shut down while the request was in flight.
    #[error("dispatch cancelled")]
    Cancelled,

    #[error(transparent)]
    Control(ControlError),
}

impl From<ControlError> for DispatchError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::Rejected { message } => Self::Rejected(message),
            other => Self::Control(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;

#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: ControlClient,
    state: SharedState,
    cancel: CancellationToken,
}

impl Dispatcher {
    #[must_use]
    pub fn new(client: ControlClient, state: SharedState, cancel: CancellationToken) -> Self {
        Self {
            client,
            state,
            cancel,
        }
    }

    /// Runs `command`.
    ///
    /// # Errors
    /// `NotConfirmed` when the command needs confirmation and `confirmed` is
    /// false; otherwise whatever the command itself returns.
    pub async fn dispatch(&self, command: Command, confirmed: bool) -> Result<()> {
        if command.needs_confirmation() && !confirmed {
            info!(command = %command, "Command not confirmed");
            return Err(DispatchError::NotConfirmed(command));
        }

        let result = match command {
            Command::Start => self.start_stop(Operation::Start).await,
            Command::Stop => self.start_stop(Operation::Stop).await,
            Command::SaveConfig => self.save_config().await,
            Command::ResetConfig => self.reset_config().await,
            Command::LoadConfig => self.load_config().await,
        };

        if let Err(e) = &result {
            self.report_failure(command, e).await;
        }
        result
    }

    /// Starts the bot. Requires confirmation.
    pub async fn start(&self, confirmed: bool) -> Result<()> {
        self.dispatch(Command::Start, confirmed).await
    }

    /// Stops the bot. Requires confirmation.
    pub async fn stop(&self, confirmed: bool) -> Result<()> {
        self.dispatch(Command::Stop, confirmed).await
    }

    /// Start or stop, whichever flips the current running flag.
    pub async fn toggle(&self, confirmed: bool) -> Result<()> {
        let command = self.toggle_command().await;
        self.dispatch(command, confirmed).await
    }

    /// The command `toggle` would dispatch right now.
    pub async fn toggle_command(&self) -> Command {
        if self.state.read().await.is_running() {
            Command::Stop
        } else {
            Command::Start
        }
    }

    /// Posts the current form.
    pub async fn save(&self) -> Result<()> {
        self.dispatch(Command::SaveConfig, true).await
    }

    /// Resets the server config. Requires confirmation.
    pub async fn reset(&self, confirmed: bool) -> Result<()> {
        self.dispatch(Command::ResetConfig, confirmed).await
    }

    /// Reloads the form from the server.
    pub async fn load(&self) -> Result<()> {
        self.dispatch(Command::LoadConfig, true).await
    }

    // =========================================================================
    // Command bodies
    // =========================================================================

    async fn start_stop(&self, operation: Operation) -> Result<()> {
        self.state.write().await.set_pending(Some(operation));
        let result = self.guarded(self.client.start_stop(operation)).await;
        let mut state = self.state.write().await;
        state.set_pending(None);
        result?;

        state.set_run_state(operation.target_state());
        if operation == Operation::Stop {
            state.clear_duration();
        }
        state.push_info(match operation.target_state() {
            RunState::Running => "Bot started",
            RunState::Stopped => "Bot stopped",
        });
        info!(operation = %operation, "Start/stop accepted");
        Ok(())
    }

    async fn save_config(&self) -> Result<()> {
        let form = self.state.read().await.config_form().clone();
        self.guarded(self.client.save_config(&form)).await?;
        self.state.write().await.push_info("Configuration saved");
        info!("Configuration saved");
        Ok(())
    }

    async fn reset_config(&self) -> Result<()> {
        self.guarded(self.client.reset_config()).await?;
        info!("Configuration reset, refreshing");

        // One fetch of each, concurrently
        let refresh = async {
            Ok::<_, DispatchError>(tokio::join!(
                self.client.get_config_file(),
                self.client.get_config()
            ))
        };
        let (config_file, form) = self.guarded(refresh).await?;
        let contents = config_file?;
        let form = form?;

        let mut state = self.state.write().await;
        state.set_config_file(contents);
        state.set_config_form(form);
        state.push_info("Configuration reset to defaults");
        Ok(())
    }

    async fn load_config(&self) -> Result<()> {
        let form = self.guarded(self.client.get_config()).await?;
        self.state.write().await.set_config_form(form);
        Ok(())
    }

    /// Awaits `request` unless the dashboard shuts down first.
    async fn guarded<T, E>(
        &self,
        request: impl Future<Output = std::result::Result<T, E>>,
    ) -> Result<T>
    where
        DispatchError: From<E>,
    {
        tokio::select! {
            () = self.cancel.cancelled() => Err(DispatchError::Cancelled),
            result = request => result.map_err(DispatchError::from),
        }
    }

    async fn report_failure(&self, command: Command, error: &DispatchError) {
        let mut state = self.state.write().await;
        match error {
            DispatchError::Rejected(message) => {
                warn!(command = %command, error = %message, "Command rejected");
                state.push_error(format!("Error: {message}"));
            }
            DispatchError::Control(e) => {
                warn!(command = %command, error = %e, "Command failed");
                if e.is_transport() {
                    state.mark_engine_down(&e.to_string());
                } else {
                    state.push_error(format!("{command} failed: {e}"));
                }
            }
            DispatchError::NotConfirmed(_) | DispatchError::Cancelled => {}
        }
    }
}
