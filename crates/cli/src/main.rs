use clap::{Parser, Subcommand};
use nubot_console_core::{ConfigSource, DEFAULT_CONFIG_PATH};

mod commands;
mod tui_dashboard;

use commands::{ConfigCommand, Console};

#[derive(Parser)]
#[command(name = "nubot-console")]
#[command(about = "Console for the NuBot trading bot's control server", long_about = None)]
struct Cli {
    /// Console config file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH, env = "NUBOT_CONSOLE_CONFIG")]
    config: String,

    /// Config profile overlay (loads Console.<profile>.toml next to the config file)
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Control server base URL (overrides the config file)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Answer yes to every confirmation prompt
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the bot's operational status
    Status,
    /// Show the bot's open orders
    Orders,
    /// Show peg and NBT balances
    Balances,
    /// Print the bot's log
    Log,
    /// Print the bot's raw configuration file
    ConfigFile,
    /// Show, edit or reset the bot's settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Start the bot
    Start,
    /// Stop the bot
    Stop,
    /// Interactive terminal dashboard
    Dashboard {
        /// Optional log file path (logs to file instead of stderr)
        #[arg(long)]
        log_file: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging (disabled for TUI to prevent screen corruption, unless log_file is provided)
    match &cli.command {
        Commands::Dashboard {
            log_file: Some(path),
        } => {
            // Log to file for TUI
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
                )
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        Commands::Dashboard { .. } => {
            // No logging for TUI (prevents screen corruption)
        }
        _ => {
            // Normal stderr logging for one-shot commands
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
                )
                .with_writer(std::io::stderr)
                .init();
        }
    }

    let source = ConfigSource::new(&cli.config)
        .with_profile(cli.profile)
        .with_base_url(cli.url);
    let console = Console::connect(source.load()?, None, cli.yes)?;

    match cli.command {
        Commands::Status => commands::run_status(&console).await?,
        Commands::Orders => commands::run_orders(&console).await?,
        Commands::Balances => commands::run_balances(&console).await?,
        Commands::Log => commands::run_log(&console).await?,
        Commands::ConfigFile => commands::run_config_file(&console).await?,
        Commands::Config { command } => commands::run_config(&console, command).await?,
        Commands::Start => commands::run_start(&console).await?,
        Commands::Stop => commands::run_stop(&console).await?,
        Commands::Dashboard { log_file: _ } => {
            tui_dashboard::run(console, source).await?;
        }
    }

    Ok(())
}
