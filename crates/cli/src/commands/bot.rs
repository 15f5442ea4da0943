use super::{dispatch_confirmed, Console};
use anyhow::Result;
use nubot_console_core::Operation;
use nubot_dashboard::Command;

async fn run_operation(console: &Console, operation: Operation) -> Result<()> {
    let dashboard = console.dashboard();
    if dispatch_confirmed(console, &dashboard.dispatcher(), Command::from(operation)).await? {
        tracing::info!(operation = %operation, "Server accepted request");
        let verb = match operation {
            Operation::Start => "started",
            Operation::Stop => "stopped",
        };
        println!("Bot {verb}.");
    }
    Ok(())
}

/// Starts the bot after confirmation.
///
/// # Errors
/// Returns an error if the server refuses or cannot be reached.
pub async fn run_start(console: &Console) -> Result<()> {
    run_operation(console, Operation::Start).await
}

/// Stops the bot after confirmation.
///
/// # Errors
/// Returns an error if the server refuses or cannot be reached.
pub async fn run_stop(console: &Console) -> Result<()> {
    run_operation(console, Operation::Stop).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use nubot_console_core::AppConfig;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_stop_posts_operation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/startstop"))
            .and(body_json(serde_json::json!({"operation": "stop"})))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"success":true}"#))
            .expect(1)
            .mount(&server)
            .await;

        let console = Console::connect(AppConfig::default(), Some(server.uri()), true).unwrap();
        run_stop(&console).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_start_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/startstop"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"success":false,"error":"no exchange keys"}"#),
            )
            .mount(&server)
            .await;

        let console = Console::connect(AppConfig::default(), Some(server.uri()), true).unwrap();
        let err = run_start(&console).await.unwrap_err();
        assert_eq!(err.to_string(), "Server rejected start: no exchange keys");
    }
}
