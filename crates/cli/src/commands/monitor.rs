//! Read-only commands: one poll, rendered once.

use super::Console;
use anyhow::{bail, Result};
use nubot_console_core::Endpoint;
use nubot_dashboard::render::{
    balance_rows, format_table, order_rows, status_line, title, BALANCE_HEADERS,
    ENGINE_DOWN_BANNER, ORDER_HEADERS,
};
use nubot_dashboard::{Dashboard, PollOutcome};

/// Polls `endpoints` in order, failing on the first unreachable one.
async fn poll_all(dashboard: &Dashboard, endpoints: &[Endpoint]) -> Result<Vec<PollOutcome>> {
    let mut outcomes = Vec::with_capacity(endpoints.len());
    for &endpoint in endpoints {
        let outcome = dashboard.poller().poll(endpoint).await;
        if outcome == PollOutcome::Failed {
            let state = dashboard.state();
            let state = state.read().await;
            let reason = state
                .messages()
                .last()
                .map(|m| m.text.clone())
                .unwrap_or_default();
            bail!("{ENGINE_DOWN_BANNER}. {reason}");
        }
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// Prints the bot's operational status.
///
/// # Errors
/// Returns an error if the engine is unreachable.
pub async fn run_status(console: &Console) -> Result<()> {
    let dashboard = console.dashboard();
    poll_all(&dashboard, &[Endpoint::Status]).await?;

    let state = dashboard.state();
    let state = state.read().await;
    println!("{}", title(&state));
    println!("{}", status_line(&state));
    Ok(())
}

/// Prints the open orders. Orders are only requested while the bot runs.
///
/// # Errors
/// Returns an error if the engine is unreachable.
pub async fn run_orders(console: &Console) -> Result<()> {
    let dashboard = console.dashboard();
    let outcomes = poll_all(&dashboard, &[Endpoint::Status, Endpoint::Orders]).await?;

    if outcomes[1] == PollOutcome::Skipped {
        println!("Bot is stopped; no orders.");
        return Ok(());
    }

    let state = dashboard.state();
    let rows = order_rows(state.read().await.orders());
    println!("{}", format_table(ORDER_HEADERS, &rows));
    Ok(())
}

/// Prints peg and NBT balances. Only requested while the bot runs.
///
/// # Errors
/// Returns an error if the engine is unreachable.
pub async fn run_balances(console: &Console) -> Result<()> {
    let dashboard = console.dashboard();
    let outcomes = poll_all(&dashboard, &[Endpoint::Status, Endpoint::Balances]).await?;

    if outcomes[1] == PollOutcome::Skipped {
        println!("Bot is stopped; no balances.");
        return Ok(());
    }

    let state = dashboard.state();
    let rows = balance_rows(state.read().await.balances());
    println!("{}", format_table(BALANCE_HEADERS, &rows));
    Ok(())
}

/// Prints the bot's log dump.
///
/// # Errors
/// Returns an error if the engine is unreachable.
pub async fn run_log(console: &Console) -> Result<()> {
    let dashboard = console.dashboard();
    poll_all(&dashboard, &[Endpoint::Log]).await?;
    println!("{}", dashboard.state().read().await.log());
    Ok(())
}

/// Prints the bot's raw configuration file.
///
/// # Errors
/// Returns an error if the engine is unreachable.
pub async fn run_config_file(console: &Console) -> Result<()> {
    let dashboard = console.dashboard();
    poll_all(&dashboard, &[Endpoint::ConfigFile]).await?;
    println!("{}", dashboard.state().read().await.config_file());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nubot_console_core::AppConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn console_for(url: String) -> Console {
        Console::connect(AppConfig::default(), Some(url), true).unwrap()
    }

    #[tokio::test]
    async fn test_orders_not_requested_while_stopped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/opstatus"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"status":"stopped","sessionstart":"","duration":""}"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orders"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"orders":[]}"#))
            .expect(0)
            .mount(&server)
            .await;

        run_orders(&console_for(server.uri())).await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_engine_reports_banner() {
        let err = run_status(&console_for("http://127.0.0.1:9".to_string()))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with(ENGINE_DOWN_BANNER));
    }
}
