//! One-shot console commands.

pub mod bot;
pub mod config;
pub mod monitor;

pub use bot::{run_start, run_stop};
pub use config::{run_config, ConfigCommand};
pub use monitor::{run_balances, run_config_file, run_log, run_orders, run_status};

use anyhow::{bail, Context, Result};
use nubot_console_core::AppConfig;
use nubot_control_client::ControlClient;
use nubot_dashboard::{Command, Dashboard, DispatchError, Dispatcher};
use std::io::{self, BufRead, Write};
use tokio::sync::watch;

/// Resolved settings and client shared by every command.
pub struct Console {
    pub config: AppConfig,
    pub client: ControlClient,
    pub assume_yes: bool,
}

impl Console {
    /// Builds the client, applying the `--url` override if given.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn connect(mut config: AppConfig, url: Option<String>, assume_yes: bool) -> Result<Self> {
        if let Some(url) = url {
            config.server.base_url = url;
        }
        let client = ControlClient::new(&config.server).context("Failed to build control client")?;
        tracing::debug!(base_url = %client.base_url(), "Control client ready");

        Ok(Self {
            config,
            client,
            assume_yes,
        })
    }

    /// A dashboard whose loops are never started, used for one-shot polls.
    #[must_use]
    pub fn dashboard(&self) -> Dashboard {
        let (_tx, rx) = watch::channel(self.config.clone());
        Dashboard::new(self.client.clone(), rx)
    }
}

/// Asks `prompt` on stdin unless `--yes` was given.
///
/// # Errors
/// Returns an error if stdin cannot be read.
pub fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    let stdin = io::stdin();
    confirm_with(prompt, &mut stdin.lock(), &mut io::stdout())
}

fn confirm_with(prompt: &str, input: &mut impl BufRead, output: &mut impl Write) -> Result<bool> {
    write!(output, "{prompt} [y/N] ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

/// Confirms if needed, then dispatches `command`.
///
/// Returns false when the user declined.
///
/// # Errors
/// Returns an error if the server rejects the command or cannot be reached.
pub async fn dispatch_confirmed(
    console: &Console,
    dispatcher: &Dispatcher,
    command: Command,
) -> Result<bool> {
    let confirmed = match command.confirmation_prompt() {
        Some(prompt) => confirm(prompt, console.assume_yes)?,
        None => true,
    };

    match dispatcher.dispatch(command, confirmed).await {
        Ok(()) => Ok(true),
        Err(DispatchError::NotConfirmed(_)) => {
            println!("Aborted.");
            Ok(false)
        }
        Err(DispatchError::Rejected(message)) => bail!("Server rejected {command}: {message}"),
        Err(e) => Err(e).with_context(|| format!("Failed to {command}")),
    }
}
