use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Read-only endpoints the dashboard polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    Status,
    Orders,
    Balances,
    Log,
    ConfigFile,
}

impl Endpoint {
    pub const ALL: [Self; 5] = [
        Self::Status,
        Self::Orders,
        Self::Balances,
        Self::Log,
        Self::ConfigFile,
    ];

    /// Whether this endpoint is only worth polling while the bot runs.
    #[must_use]
    pub const fn requires_running(self) -> bool {
        matches!(self, Self::Orders | Self::Balances)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Orders => "orders",
            Self::Balances => "balances",
            Self::Log => "log",
            Self::ConfigFile => "configfile",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunState {
    #[default]
    Stopped,
    Running,
}

impl RunState {
    /// Parses the server's status string. Anything but `running` is stopped.
    #[must_use]
    pub fn from_wire(status: &str) -> Self {
        if status.trim().eq_ignore_ascii_case("running") {
            Self::Running
        } else {
            Self::Stopped
        }
    }

    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => f.write_str("stopped"),
            Self::Running => f.write_str("running"),
        }
    }
}

/// Operational status as reported by `/opstatus`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BotStatus {
    pub state: RunState,
    /// Session start as formatted by the server.
    pub session_start: String,
    pub duration: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Parses a side case-insensitively (`"BUY"`, `"sell"`).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "buy" => Some(Self::Buy),
            "sell" => Some(Self::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => f.write_str("BUY"),
            Self::Sell => f.write_str("SELL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub currency_code: String,
    pub total: Decimal,
    pub locked: Decimal,
    pub available: Decimal,
}

/// Peg and NBT balances, in that order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub peg: Balance,
    pub nbt: Balance,
}

impl BalanceSnapshot {
    #[must_use]
    pub fn balances(&self) -> [&Balance; 2] {
        [&self.peg, &self.nbt]
    }
}

/// Intent sent to `/startstop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Start,
    Stop,
}

impl Operation {
    #[must_use]
    pub const fn target_state(self) -> RunState {
        match self {
            Self::Start => RunState::Running,
            Self::Stop => RunState::Stopped,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::Stop => f.write_str("stop"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StartStopRequest {
    pub operation: Operation,
}

/// Envelope returned by every mutating endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl CommandResponse {
    /// Server-provided failure text, or a placeholder when none was sent.
    #[must_use]
    pub fn error_message(&self) -> String {
        self.error
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or("unknown error")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_from_wire() {
        assert_eq!(RunState::from_wire("running"), RunState::Running);
        assert_eq!(RunState::from_wire("Running "), RunState::Running);
        assert_eq!(RunState::from_wire("stopped"), RunState::Stopped);
        assert_eq!(RunState::from_wire("halting"), RunState::Stopped);
    }

    #[test]
    fn test_order_side_parse_is_case_insensitive() {
        assert_eq!(OrderSide::parse("SELL"), Some(OrderSide::Sell));
        assert_eq!(OrderSide::parse("buy"), Some(OrderSide::Buy));
        assert_eq!(OrderSide::parse("hold"), None);
    }

    #[test]
    fn test_operation_serializes_lowercase() {
        let body = serde_json::to_string(&StartStopRequest {
            operation: Operation::Stop,
        })
        .unwrap();
        assert_eq!(body, r#"{"operation":"stop"}"#);
    }

    #[test]
    fn test_command_response_error_message() {
        let resp: CommandResponse =
            serde_json::from_str(r#"{"success":false,"error":"exchange offline"}"#).unwrap();
        assert!(!resp.success);
        assert_eq!(resp.error_message(), "exchange offline");

        let bare: CommandResponse = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert_eq!(bare.error_message(), "unknown error");
    }

    #[test]
    fn test_only_market_endpoints_require_running() {
        assert!(Endpoint::Orders.requires_running());
        assert!(Endpoint::Balances.requires_running());
        assert!(!Endpoint::Status.requires_running());
        assert!(!Endpoint::Log.requires_running());
        assert!(!Endpoint::ConfigFile.requires_running());
    }
}
