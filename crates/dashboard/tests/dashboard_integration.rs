//! End-to-end tests of the dashboard against a mocked control server.

use nubot_console_core::{AppConfig, ConfigField, Endpoint, FieldValue, RunState};
use nubot_control_client::ControlClient;
use nubot_dashboard::render::{balance_rows, format_table, order_rows, ORDER_HEADERS};
use nubot_dashboard::{Command, Dashboard, DispatchError, PollOutcome};
use serde_json::json;
use std::time::Duration;
use tokio::sync::watch;
use wiremock::matchers::{body_json, body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn dashboard_for(base_url: &str, config: AppConfig) -> (Dashboard, watch::Sender<AppConfig>) {
    let client = ControlClient::new(&config.server)
        .expect("client")
        .with_base_url(base_url);
    let (tx, rx) = watch::channel(config);
    (Dashboard::new(client, rx), tx)
}

async fn mount_running_status(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/opstatus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "running",
            "sessionstart": "Apr 23, 2015 10:00:00 AM",
            "duration": "2 minutes"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_two_orders_render_in_input_order() {
    let server = MockServer::start().await;
    mount_running_status(&server).await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orders": [
                {"type": "SELL", "amount": {"quantity": "12.5"}, "price": {"quantity": "1.0050"}},
                {"type": "buy", "amount": {"quantity": 3}, "price": {"quantity": "0.9950"}}
            ]
        })))
        .mount(&server)
        .await;

    let (dashboard, _tx) = dashboard_for(&server.uri(), AppConfig::default());
    let poller = dashboard.poller();

    assert_eq!(poller.poll(Endpoint::Status).await, PollOutcome::Applied);
    assert_eq!(poller.poll(Endpoint::Orders).await, PollOutcome::Applied);

    let state = dashboard.state();
    let state = state.read().await;
    let rows = order_rows(state.orders());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], ["SELL", "12.5", "1.005"]);
    assert_eq!(rows[1], ["BUY", "3", "0.995"]);

    let table = format_table(ORDER_HEADERS, &rows);
    assert_eq!(table.lines().count(), 4);
}

#[tokio::test]
async fn test_balance_rows_match_payload() {
    let server = MockServer::start().await;
    mount_running_status(&server).await;
    Mock::given(method("GET"))
        .and(path("/balances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pegBalance": {
                "balanceTotal": 1.5, "balanceLocked": 0.5,
                "balanceAvailable": 1.0, "currencyCode": "BTC"
            },
            "nbtBalance": {
                "balanceTotal": 200, "balanceLocked": 50,
                "balanceAvailable": 150, "currencyCode": "NBT"
            }
        })))
        .mount(&server)
        .await;

    let (dashboard, _tx) = dashboard_for(&server.uri(), AppConfig::default());
    dashboard.poller().poll(Endpoint::Status).await;
    dashboard.poller().poll(Endpoint::Balances).await;

    let state = dashboard.state();
    let rows = balance_rows(state.read().await.balances());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], "BTC");
    assert_eq!(rows[1], ["NBT", "200", "50", "150"]);
}

#[tokio::test]
async fn test_rejected_toggle_leaves_running_flag() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/startstop"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": false, "error": "busy"})),
        )
        .expect(2)
        .mount(&server)
        .await;

    let (dashboard, _tx) = dashboard_for(&server.uri(), AppConfig::default());
    let dispatcher = dashboard.dispatcher();
    let state = dashboard.state();

    // Stopped -> start rejected
    assert!(dispatcher.toggle(true).await.is_err());
    assert_eq!(state.read().await.run_state(), RunState::Stopped);

    // Running -> stop rejected
    state.write().await.set_run_state(RunState::Running);
    let err = dispatcher.toggle(true).await.unwrap_err();
    assert_eq!(err.to_string(), "busy");
    assert_eq!(state.read().await.run_state(), RunState::Running);
}

#[tokio::test]
async fn test_successful_stop_clears_tables_and_duration() {
    let server = MockServer::start().await;
    mount_running_status(&server).await;
    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orders": [{"type": "SELL", "amount": {"quantity": 1}, "price": {"quantity": 1}}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/startstop"))
        .and(body_json(json!({"operation": "stop"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let (dashboard, _tx) = dashboard_for(&server.uri(), AppConfig::default());
    dashboard.poller().poll(Endpoint::Status).await;
    dashboard.poller().poll(Endpoint::Orders).await;
    assert_eq!(dashboard.state().read().await.orders().len(), 1);

    dashboard.dispatcher().stop(true).await.expect("stop");

    let state = dashboard.state();
    let state = state.read().await;
    assert!(!state.is_running());
    assert!(state.orders().is_empty());
    assert_eq!(state.status().map(|s| s.duration.as_str()), Some(""));
}

#[tokio::test]
async fn test_reset_refetches_config_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/configreset"))
        .and(body_string(""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/configfile"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"configfile": "{\"options\":{}}"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/config"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"exchangeName": "ccedk", "spread": 0.01})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (dashboard, _tx) = dashboard_for(&server.uri(), AppConfig::default());

    dashboard
        .dispatcher()
        .dispatch(Command::ResetConfig, true)
        .await
        .expect("reset");

    let state = dashboard.state();
    let state = state.read().await;
    assert_eq!(state.config_file(), "{\"options\":{}}");
    assert_eq!(
        state.config_form().get(ConfigField::Spread),
        &FieldValue::Text("0.01".to_string())
    );
}

#[tokio::test]
async fn test_unconfirmed_commands_send_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(0)
        .mount(&server)
        .await;

    let (dashboard, _tx) = dashboard_for(&server.uri(), AppConfig::default());
    let dispatcher = dashboard.dispatcher();

    for command in [Command::Start, Command::Stop, Command::ResetConfig] {
        let err = dispatcher.dispatch(command, false).await.unwrap_err();
        assert!(matches!(err, DispatchError::NotConfirmed(c) if c == command));
    }
}

#[tokio::test]
async fn test_save_config_posts_write_keys() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let (dashboard, _tx) = dashboard_for(&server.uri(), AppConfig::default());
    {
        let state = dashboard.state();
        let mut state = state.write().await;
        let form = state.config_form_mut();
        form.set(ConfigField::MainFeed, "blockchain").expect("set");
        form.set(ConfigField::BackupFeeds, "coinbase, bitstamp").expect("set");
    }

    dashboard.dispatcher().save().await.expect("save");

    let requests = server.received_requests().await.expect("recording enabled");
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).expect("json body");
    assert_eq!(body["mainfeed"], "blockchain");
    assert_eq!(body["backupfeeds"], json!(["coinbase", " bitstamp"]));
    assert!(body.get("mainFeed").is_none());
}

#[tokio::test]
async fn test_transport_failure_does_not_stop_polling() {
    let mut config = AppConfig::default();
    config.polling.log_ms = 20;
    config.polling.status_ms = 20;
    config.server.timeout_secs = 1;

    let (mut dashboard, _tx) = dashboard_for("http://127.0.0.1:9", config);
    dashboard.start();

    tokio::time::sleep(Duration::from_millis(400)).await;

    let log_stats = dashboard.poller().stats(Endpoint::Log).await;
    let status_stats = dashboard.poller().stats(Endpoint::Status).await;
    assert!(log_stats.failures >= 2, "log failures: {}", log_stats.failures);
    assert!(status_stats.failures >= 2);
    assert!(dashboard.state().read().await.engine_down());

    dashboard.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_all_loops() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"log": ""})))
        .mount(&server)
        .await;

    let (mut dashboard, _tx) = dashboard_for(&server.uri(), AppConfig::default());
    dashboard.start();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let poller = dashboard.poller().clone();
    dashboard.shutdown().await;

    let before = poller.stats(Endpoint::Log).await.cycles;
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(poller.stats(Endpoint::Log).await.cycles, before);
    assert!(poller.cancel_token().is_cancelled());
}
