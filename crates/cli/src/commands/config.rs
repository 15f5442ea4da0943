//! `config` subcommands: show, edit and reset the bot's settings.

use super::{dispatch_confirmed, Console};
use anyhow::Result;
use clap::Subcommand;
use nubot_dashboard::render::config_rows;
use nubot_dashboard::Command;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Show the bot's current settings
    Show,
    /// Edit settings and save them (e.g. `set spread=0.01 verbose=true`)
    Set {
        /// KEY=VALUE pairs; keys are case-insensitive
        #[arg(required = true, value_name = "KEY=VALUE")]
        assignments: Vec<String>,
    },
    /// Restore the bot's default settings
    Reset,
}

/// Runs a `config` subcommand.
///
/// # Errors
/// Returns an error if an assignment is invalid or the server refuses.
pub async fn run_config(console: &Console, command: ConfigCommand) -> Result<()> {
    let dashboard = console.dashboard();
    let dispatcher = dashboard.dispatcher();
    let state = dashboard.state();

    match command {
        ConfigCommand::Show => {
            dispatch_confirmed(console, &dispatcher, Command::LoadConfig).await?;
            print_form(&config_rows(state.read().await.config_form()));
        }
        ConfigCommand::Set { assignments } => {
            dispatch_confirmed(console, &dispatcher, Command::LoadConfig).await?;
            {
                let mut state = state.write().await;
                let form = state.config_form_mut();
                for assignment in &assignments {
                    let field = form.apply_assignment(assignment)?;
                    tracing::debug!(key = field.read_key(), "Setting updated");
                }
            }
            dispatch_confirmed(console, &dispatcher, Command::SaveConfig).await?;
            println!("Saved {} setting(s).", assignments.len());
        }
        ConfigCommand::Reset => {
            if dispatch_confirmed(console, &dispatcher, Command::ResetConfig).await? {
                println!("Settings reset.");
                println!("{}", state.read().await.config_file());
            }
        }
    }
    Ok(())
}

fn print_form(rows: &[(&'static str, String)]) {
    let width = rows.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    for (key, value) in rows {
        println!("{key:<width$} = {value}");
    }
}
