//! Editable mirror of the bot's settings.
//!
//! The server reads settings back with camelCase keys and expects them posted
//! with all-lowercase keys. The form keeps values as the user would edit them
//! and leaves every check to the server.

use anyhow::{bail, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Flag,
    /// Comma-separated in the form, posted as an array.
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigField {
    ExchangeName,
    ApiKey,
    ApiSecret,
    TxFee,
    Pair,
    DualSide,
    MultipleCustodians,
    ExecuteOrders,
    Verbose,
    Hipchat,
    MailNotifications,
    MailRecipient,
    EmergencyTimeout,
    KeepProceeds,
    MaxSellVolume,
    MaxBuyVolume,
    PriceIncrement,
    SubmitLiquidity,
    NubitAddress,
    NudIp,
    NudPort,
    RpcPass,
    RpcUser,
    WallchangeThreshold,
    Spread,
    MainFeed,
    BackupFeeds,
}

impl ConfigField {
    pub const ALL: [Self; 27] = [
        Self::ExchangeName,
        Self::ApiKey,
        Self::ApiSecret,
        Self::TxFee,
        Self::Pair,
        Self::DualSide,
        Self::MultipleCustodians,
        Self::ExecuteOrders,
        Self::Verbose,
        Self::Hipchat,
        Self::MailNotifications,
        Self::MailRecipient,
        Self::EmergencyTimeout,
        Self::KeepProceeds,
        Self::MaxSellVolume,
        Self::MaxBuyVolume,
        Self::PriceIncrement,
        Self::SubmitLiquidity,
        Self::NubitAddress,
        Self::NudIp,
        Self::NudPort,
        Self::RpcPass,
        Self::RpcUser,
        Self::WallchangeThreshold,
        Self::Spread,
        Self::MainFeed,
        Self::BackupFeeds,
    ];

    /// Key used by `GET /config`.
    #[must_use]
    pub const fn read_key(self) -> &'static str {
        match self {
            Self::ExchangeName => "exchangeName",
            Self::ApiKey => "apiKey",
            Self::ApiSecret => "apiSecret",
            Self::TxFee => "txFee",
            Self::Pair => "pair",
            Self::DualSide => "dualSide",
            Self::MultipleCustodians => "multipleCustodians",
            Self::ExecuteOrders => "executeOrders",
            Self::Verbose => "verbose",
            Self::Hipchat => "hipchat",
            Self::MailNotifications => "mailnotifications",
            Self::MailRecipient => "mailRecipient",
            Self::EmergencyTimeout => "emergencyTimeout",
            Self::KeepProceeds => "keepProceeds",
            Self::MaxSellVolume => "maxSellVolume",
            Self::MaxBuyVolume => "maxBuyVolume",
            Self::PriceIncrement => "priceIncrement",
            Self::SubmitLiquidity => "submitliquidity",
            Self::NubitAddress => "nubitAddress",
            Self::NudIp => "nudIp",
            Self::NudPort => "nudPort",
            Self::RpcPass => "rpcPass",
            Self::RpcUser => "rpcUser",
            Self::WallchangeThreshold => "wallchangeThreshold",
            Self::Spread => "spread",
            Self::MainFeed => "mainFeed",
            Self::BackupFeeds => "backupFeeds",
        }
    }

    /// Key expected by `POST /config`: the read key, lowercased.
    #[must_use]
    pub fn write_key(self) -> String {
        self.read_key().to_ascii_lowercase()
    }

    #[must_use]
    pub const fn kind(self) -> FieldKind {
        match self {
            Self::DualSide
            | Self::MultipleCustodians
            | Self::ExecuteOrders
            | Self::Verbose
            | Self::Hipchat
            | Self::SubmitLiquidity => FieldKind::Flag,
            Self::BackupFeeds => FieldKind::List,
            _ => FieldKind::Text,
        }
    }

    /// Looks a field up by either of its wire keys, ignoring case.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.read_key().eq_ignore_ascii_case(key.trim()))
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.read_key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
}

impl FieldValue {
    fn empty(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Flag => Self::Flag(false),
            FieldKind::Text | FieldKind::List => Self::Text(String::new()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Flag(flag) => write!(f, "{flag}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigForm {
    values: BTreeMap<ConfigField, FieldValue>,
}

impl Default for ConfigForm {
    fn default() -> Self {
        Self {
            values: ConfigField::ALL
                .into_iter()
                .map(|f| (f, FieldValue::empty(f.kind())))
                .collect(),
        }
    }
}

impl ConfigForm {
    /// Fills the form from a `GET /config` body. Unknown keys are ignored,
    /// missing ones are left empty.
    #[must_use]
    pub fn from_server(settings: &Map<String, Value>) -> Self {
        let mut form = Self::default();
        for field in ConfigField::ALL {
            let Some(raw) = settings.get(field.read_key()) else {
                continue;
            };
            let value = match field.kind() {
                FieldKind::Flag => FieldValue::Flag(value_as_flag(raw)),
                FieldKind::Text => FieldValue::Text(value_as_text(raw)),
                FieldKind::List => FieldValue::Text(value_as_list_text(raw)),
            };
            form.values.insert(field, value);
        }
        form
    }

    /// Builds the flat object posted to `/config`.
    #[must_use]
    pub fn to_payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        for (field, value) in &self.values {
            let json = match (field.kind(), value) {
                (_, FieldValue::Flag(flag)) => Value::Bool(*flag),
                (FieldKind::List, FieldValue::Text(text)) => Value::Array(
                    text.split(',')
                        .map(|item| Value::String(item.to_string()))
                        .collect(),
                ),
                (_, FieldValue::Text(text)) => Value::String(text.clone()),
            };
            payload.insert(field.write_key(), json);
        }
        payload
    }

    #[must_use]
    pub fn get(&self, field: ConfigField) -> &FieldValue {
        // Every field is populated by construction
        &self.values[&field]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConfigField, &FieldValue)> {
        self.values.iter().map(|(f, v)| (*f, v))
    }

    /// Sets a field from user text. Flags accept `true/false/yes/no/1/0/on/off`.
    pub fn set(&mut self, field: ConfigField, input: &str) -> Result<()> {
        let value = match field.kind() {
            FieldKind::Flag => FieldValue::Flag(parse_flag(input)?),
            FieldKind::Text | FieldKind::List => FieldValue::Text(input.to_string()),
        };
        self.values.insert(field, value);
        Ok(())
    }

    /// Applies a `key=value` edit.
    pub fn apply_assignment(&mut self, assignment: &str) -> Result<ConfigField> {
        let Some((key, value)) = assignment.split_once('=') else {
            bail!("Invalid assignment '{assignment}'. Expected KEY=VALUE");
        };
        let Some(field) = ConfigField::from_key(key) else {
            bail!("Unknown config key '{}'", key.trim());
        };
        self.set(field, value)?;
        Ok(field)
    }

    /// Flips a flag field. Text fields are left untouched.
    pub fn toggle(&mut self, field: ConfigField) -> bool {
        if let Some(FieldValue::Flag(flag)) = self.values.get_mut(&field) {
            *flag = !*flag;
            return true;
        }
        false
    }
}

fn value_as_text(raw: &Value) -> String {
    match raw {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_as_list_text(raw: &Value) -> String {
    match raw {
        Value::Array(items) => items
            .iter()
            .map(value_as_text)
            .collect::<Vec<_>>()
            .join(","),
        other => value_as_text(other),
    }
}

fn value_as_flag(raw: &Value) -> bool {
    match raw {
        Value::Bool(b) => *b,
        Value::String(s) => parse_flag(s).unwrap_or(false),
        _ => false,
    }
}

fn parse_flag(input: &str) -> Result<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" | "" => Ok(false),
        other => bail!("Invalid flag value '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn server_settings() -> Map<String, Value> {
        let Value::Object(map) = json!({
            "exchangeName": "peatio",
            "apiKey": "key-1",
            "txFee": 0.2,
            "dualSide": true,
            "verbose": false,
            "nudPort": 9091,
            "mailRecipient": null,
            "backupFeeds": ["btce", "coinbase"],
            "somethingElse": "ignored"
        }) else {
            unreachable!()
        };
        map
    }

    #[test]
    fn test_from_server_maps_read_keys() {
        let form = ConfigForm::from_server(&server_settings());

        assert_eq!(
            form.get(ConfigField::ExchangeName),
            &FieldValue::Text("peatio".to_string())
        );
        assert_eq!(form.get(ConfigField::TxFee), &FieldValue::Text("0.2".to_string()));
        assert_eq!(form.get(ConfigField::NudPort), &FieldValue::Text("9091".to_string()));
        assert_eq!(form.get(ConfigField::DualSide), &FieldValue::Flag(true));
        assert_eq!(form.get(ConfigField::Hipchat), &FieldValue::Flag(false));
        assert_eq!(form.get(ConfigField::MailRecipient), &FieldValue::Text(String::new()));
        assert_eq!(
            form.get(ConfigField::BackupFeeds),
            &FieldValue::Text("btce,coinbase".to_string())
        );
    }

    #[test]
    fn test_payload_uses_lowercase_write_keys() {
        let form = ConfigForm::from_server(&server_settings());
        let payload = form.to_payload();

        assert_eq!(payload.len(), 27);
        assert_eq!(payload["exchangename"], json!("peatio"));
        assert_eq!(payload["dualside"], json!(true));
        assert_eq!(payload["wallchangethreshold"], json!(""));
        assert!(!payload.contains_key("exchangeName"));
    }

    #[test]
    fn test_payload_splits_backup_feeds_without_trimming() {
        let mut form = ConfigForm::default();
        form.set(ConfigField::BackupFeeds, "bitfinex, btce").unwrap();

        let payload = form.to_payload();
        assert_eq!(payload["backupfeeds"], json!(["bitfinex", " btce"]));
    }

    #[test]
    fn test_apply_assignment_accepts_either_key_spelling() {
        let mut form = ConfigForm::default();

        assert_eq!(
            form.apply_assignment("maxsellvolume=100").unwrap(),
            ConfigField::MaxSellVolume
        );
        assert_eq!(
            form.apply_assignment("executeOrders=yes").unwrap(),
            ConfigField::ExecuteOrders
        );
        assert_eq!(
            form.get(ConfigField::MaxSellVolume),
            &FieldValue::Text("100".to_string())
        );
        assert_eq!(form.get(ConfigField::ExecuteOrders), &FieldValue::Flag(true));
    }

    #[test]
    fn test_apply_assignment_rejects_unknown_key_and_bad_flag() {
        let mut form = ConfigForm::default();
        assert!(form.apply_assignment("leverage=3").is_err());
        assert!(form.apply_assignment("verbose=maybe").is_err());
        assert!(form.apply_assignment("no-equals-sign").is_err());
    }

    #[test]
    fn test_toggle_only_flips_flags() {
        let mut form = ConfigForm::default();
        assert!(form.toggle(ConfigField::Verbose));
        assert_eq!(form.get(ConfigField::Verbose), &FieldValue::Flag(true));
        assert!(!form.toggle(ConfigField::Pair));
    }
}
