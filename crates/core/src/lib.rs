pub mod config;
pub mod config_form;
pub mod config_loader;
pub mod config_watcher;
pub mod types;

pub use config::{AppConfig, PollingConfig, ServerConfig, UiConfig, DEFAULT_SERVER_PORT};
pub use config_form::{ConfigField, ConfigForm, FieldKind, FieldValue};
pub use config_loader::{ConfigLoader, ConfigSource, DEFAULT_CONFIG_PATH};
pub use config_watcher::ConfigWatcher;
pub use types::{
    Balance, BalanceSnapshot, BotStatus, CommandResponse, Endpoint, Operation, Order, OrderSide,
    RunState, StartStopRequest,
};
