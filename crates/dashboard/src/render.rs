//! Turns `UiState` into rows and strings. Shared by the terminal dashboard and
//! the one-shot CLI output.

use crate::state::UiState;
use nubot_console_core::{BalanceSnapshot, ConfigForm, FieldValue, Order};

pub const ENGINE_DOWN_BANNER: &str = "NuBot engine is down. Relaunch it";

pub const ORDER_HEADERS: [&str; 3] = ["Type", "Amount", "Price"];
pub const BALANCE_HEADERS: [&str; 4] = ["Currency", "Total", "Locked", "Available"];

const SPINNER_WIDTH: usize = 4;

/// One row per order, in input order.
#[must_use]
pub fn order_rows(orders: &[Order]) -> Vec<[String; 3]> {
    orders
        .iter()
        .map(|order| {
            [
                order.side.to_string(),
                order.quantity.normalize().to_string(),
                order.price.normalize().to_string(),
            ]
        })
        .collect()
}

/// Peg row first, NBT row second.
#[must_use]
pub fn balance_rows(snapshot: Option<&BalanceSnapshot>) -> Vec<[String; 4]> {
    snapshot
        .map(|snapshot| {
            snapshot
                .balances()
                .iter()
                .map(|b| {
                    [
                        b.currency_code.clone(),
                        b.total.normalize().to_string(),
                        b.locked.normalize().to_string(),
                        b.available.normalize().to_string(),
                    ]
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Form fields as `(label, value)` pairs, flags shown as `[x]`/`[ ]`.
#[must_use]
pub fn config_rows(form: &ConfigForm) -> Vec<(&'static str, String)> {
    form.iter()
        .map(|(field, value)| {
            let shown = match value {
                FieldValue::Text(text) => text.clone(),
                FieldValue::Flag(true) => "[x]".to_string(),
                FieldValue::Flag(false) => "[ ]".to_string(),
            };
            (field.read_key(), shown)
        })
        .collect()
}

#[must_use]
pub fn title(state: &UiState) -> &'static str {
    if state.is_running() {
        "Running! - NuBot"
    } else {
        "NuBot - Stopped"
    }
}

/// Activity indicator advanced by every status poll.
#[must_use]
pub fn spinner(state: &UiState) -> String {
    let dots = state.spinner_frame() % SPINNER_WIDTH;
    format!("{:<width$}", ".".repeat(dots), width = SPINNER_WIDTH - 1)
}

/// Label for the start/stop control.
#[must_use]
pub fn toggle_label(state: &UiState) -> &'static str {
    if state.pending().is_some() {
        "Working..."
    } else if state.is_running() {
        "Stop Bot"
    } else {
        "Start Bot"
    }
}

/// One-line summary of the last status poll.
#[must_use]
pub fn status_line(state: &UiState) -> String {
    let Some(status) = state.status() else {
        return format!("{} (no status yet)", state.run_state());
    };
    let mut line = format!("{}", status.state);
    if !status.session_start.is_empty() {
        line.push_str(&format!(" | since {}", status.session_start));
    }
    if !status.duration.is_empty() {
        line.push_str(&format!(" | up {}", status.duration));
    }
    line
}

/// Renders headers and rows as a plain column-aligned table.
#[must_use]
pub fn format_table<const N: usize>(headers: [&str; N], rows: &[[String; N]]) -> String {
    let mut widths = headers.map(str::len);
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = join_cells(&widths, headers.iter().copied());
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in rows {
        out.push('\n');
        out.push_str(&join_cells(&widths, row.iter().map(String::as_str)));
    }
    out
}

fn join_cells<'a>(widths: &[usize], cells: impl Iterator<Item = &'a str>) -> String {
    cells
        .zip(widths.iter().copied())
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}
