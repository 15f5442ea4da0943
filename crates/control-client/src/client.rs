//! NuBot control-server REST client.
//!
//! Provides typed access to the bot's UI endpoints. Requests go through a
//! client-side throttle; the server still caps how often it refreshes orders
//! and balances.
//!
//! # Example
//!
//! ```ignore
//! use nubot_control_client::ControlClient;
//! use nubot_console_core::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ControlClient::new(&ServerConfig::default())?;
//!
//!     let status = client.get_status().await?;
//!     println!("Bot is {}", status.state);
//!
//!     if let Some(orders) = client.get_orders().await? {
//!         println!("{} open orders", orders.len());
//!     }
//!
//!     Ok(())
//! }
//! ```

use crate::error::{ControlError, Result};
use governor::{Quota, RateLimiter};
use nubot_console_core::{
    Balance, BalanceSnapshot, BotStatus, CommandResponse, ConfigForm, Endpoint, Operation, Order,
    OrderSide, RunState, ServerConfig, StartStopRequest,
};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// API Response Types
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
struct RawStatus {
    status: Option<Value>,
    sessionstart: Option<Value>,
    duration: Option<Value>,
}

impl From<RawStatus> for BotStatus {
    fn from(raw: RawStatus) -> Self {
        let status = raw.status.as_ref().map(value_text).unwrap_or_default();
        Self {
            state: RunState::from_wire(&status),
            session_start: raw.sessionstart.as_ref().map(value_text).unwrap_or_default(),
            duration: raw.duration.as_ref().map(value_text).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawOrdersResponse {
    orders: Option<Vec<RawOrder>>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawOrder {
    #[serde(rename = "type")]
    order_type: String,
    amount: RawAmount,
    price: RawAmount,
}

/// `{quantity, currency}` pair; only the quantity is rendered.
#[derive(Debug, Clone, Deserialize)]
struct RawAmount {
    quantity: Decimal,
}

impl TryFrom<RawOrder> for Order {
    type Error = ControlError;

    fn try_from(raw: RawOrder) -> Result<Self> {
        let side = OrderSide::parse(&raw.order_type)
            .ok_or_else(|| ControlError::Decode(format!("unknown order type: {}", raw.order_type)))?;
        Ok(Self {
            side,
            quantity: raw.amount.quantity,
            price: raw.price.quantity,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBalancesResponse {
    peg_balance: Option<RawBalance>,
    nbt_balance: Option<RawBalance>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBalance {
    balance_total: Decimal,
    balance_locked: Decimal,
    balance_available: Decimal,
    currency_code: String,
}

impl From<RawBalance> for Balance {
    fn from(raw: RawBalance) -> Self {
        Self {
            currency_code: raw.currency_code,
            total: raw.balance_total,
            locked: raw.balance_locked,
            available: raw.balance_available,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawLogDump {
    log: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawConfigFile {
    configfile: Option<String>,
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// Poll payloads
// =============================================================================

/// Decoded response of one poll.
///
/// `None` snapshots mean the server answered without the expected key and the
/// previous table should be kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollPayload {
    Status(BotStatus),
    Orders(Option<Vec<Order>>),
    Balances(Option<BalanceSnapshot>),
    Log(String),
    ConfigFile(String),
}

// =============================================================================
// ControlClient
// =============================================================================

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Client for the bot control server.
#[derive(Clone)]
pub struct ControlClient {
    http: Client,
    base_url: String,
    orders_endpoint: String,
    rate_limiter: Arc<DirectLimiter>,
}

impl std::fmt::Debug for ControlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlClient")
            .field("base_url", &self.base_url)
            .field("orders_endpoint", &self.orders_endpoint)
            .finish_non_exhaustive()
    }
}

impl ControlClient {
    /// Creates a new client for the configured server.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ControlError::Network(format!("failed to build HTTP client: {e}")))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second)));

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            orders_endpoint: config.orders_endpoint.trim_matches('/').to_string(),
            rate_limiter,
        })
    }

    /// Sets a custom base URL (useful for testing).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Path (without leading slash) serving `endpoint`.
    #[must_use]
    pub fn endpoint_path(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::Status => "opstatus",
            Endpoint::Orders => &self.orders_endpoint,
            Endpoint::Balances => "balances",
            Endpoint::Log => "logdump",
            Endpoint::ConfigFile => "configfile",
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Waits for the throttle and makes a GET request.
    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = self.url(path);
        tracing::trace!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Waits for the throttle and makes a POST request. `None` sends an empty body.
    async fn post<B: Serialize>(&self, path: &str, body: Option<&B>) -> Result<CommandResponse> {
        self.rate_limiter.until_ready().await;

        let url = self.url(path);
        let body_json = match body {
            Some(body) => serde_json::to_string(body)
                .map_err(|e| ControlError::InvalidRequest(e.to_string()))?,
            None => String::new(),
        };

        tracing::debug!("POST {} body_len={}", url, body_json.len());

        let response = self
            .http
            .post(&url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .body(body_json)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Converts non-success statuses and decodes the body.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ControlError::api(status.as_u16(), text));
        }

        let body = response.json::<T>().await?;
        Ok(body)
    }

    fn ensure_success(response: &CommandResponse) -> Result<()> {
        if response.success {
            Ok(())
        } else {
            Err(ControlError::rejected(response.error_message()))
        }
    }

    // =========================================================================
    // Read endpoints
    // =========================================================================

    /// Gets the bot's operational status.
    ///
    /// # Errors
    /// Returns error if the request fails or the body cannot be decoded.
    pub async fn get_status(&self) -> Result<BotStatus> {
        let raw: RawStatus = self.get(self.endpoint_path(Endpoint::Status)).await?;
        Ok(raw.into())
    }

    /// Gets the open orders, in server order.
    ///
    /// # Returns
    /// `None` when the response carries no `orders` key.
    ///
    /// # Errors
    /// Returns error if the request fails or an order cannot be decoded.
    pub async fn get_orders(&self) -> Result<Option<Vec<Order>>> {
        let raw: RawOrdersResponse = self.get(self.endpoint_path(Endpoint::Orders)).await?;

        raw.orders
            .map(|orders| {
                orders
                    .into_iter()
                    .map(Order::try_from)
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()
    }

    /// Gets the peg and NBT balances.
    ///
    /// # Returns
    /// `None` when the response carries no `pegBalance` key.
    ///
    /// # Errors
    /// Returns error if the request fails, or `pegBalance` arrives without
    /// `nbtBalance`.
    pub async fn get_balances(&self) -> Result<Option<BalanceSnapshot>> {
        let raw: RawBalancesResponse = self.get(self.endpoint_path(Endpoint::Balances)).await?;

        let Some(peg) = raw.peg_balance else {
            return Ok(None);
        };
        let nbt = raw
            .nbt_balance
            .ok_or_else(|| ControlError::Decode("pegBalance without nbtBalance".to_string()))?;

        Ok(Some(BalanceSnapshot {
            peg: peg.into(),
            nbt: nbt.into(),
        }))
    }

    /// Gets the current log dump.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn get_log(&self) -> Result<String> {
        let raw: RawLogDump = self.get(self.endpoint_path(Endpoint::Log)).await?;
        Ok(raw.log.unwrap_or_default())
    }

    /// Gets the raw configuration file contents.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn get_config_file(&self) -> Result<String> {
        let raw: RawConfigFile = self.get(self.endpoint_path(Endpoint::ConfigFile)).await?;
        Ok(raw.configfile.unwrap_or_default())
    }

    /// Gets the parsed settings as a form.
    ///
    /// # Errors
    /// Returns error if the request fails or the body is not a JSON object.
    pub async fn get_config(&self) -> Result<ConfigForm> {
        let settings: Map<String, Value> = self.get("config").await?;
        Ok(ConfigForm::from_server(&settings))
    }

    /// Polls one endpoint and decodes its payload.
    ///
    /// # Errors
    /// Returns error if the underlying request fails.
    pub async fn poll(&self, endpoint: Endpoint) -> Result<PollPayload> {
        let payload = match endpoint {
            Endpoint::Status => PollPayload::Status(self.get_status().await?),
            Endpoint::Orders => PollPayload::Orders(self.get_orders().await?),
            Endpoint::Balances => PollPayload::Balances(self.get_balances().await?),
            Endpoint::Log => PollPayload::Log(self.get_log().await?),
            Endpoint::ConfigFile => PollPayload::ConfigFile(self.get_config_file().await?),
        };
        Ok(payload)
    }

    // =========================================================================
    // Command endpoints
    // =========================================================================

    /// Asks the server to start or stop the bot.
    ///
    /// # Errors
    /// Returns `ControlError::Rejected` when the server answers `success: false`.
    pub async fn start_stop(&self, operation: Operation) -> Result<()> {
        let response = self
            .post("startstop", Some(&StartStopRequest { operation }))
            .await?;
        Self::ensure_success(&response)
    }

    /// Posts the whole settings form.
    ///
    /// # Errors
    /// Returns `ControlError::Rejected` when the server refuses the settings.
    pub async fn save_config(&self, form: &ConfigForm) -> Result<()> {
        let response = self.post("config", Some(&form.to_payload())).await?;
        Self::ensure_success(&response)
    }

    /// Resets the settings to the server's defaults.
    ///
    /// # Errors
    /// Returns `ControlError::Rejected` when the server answers `success: false`.
    pub async fn reset_config(&self) -> Result<()> {
        let response = self.post::<()>("configreset", None).await?;
        Self::ensure_success(&response)
    }
}
