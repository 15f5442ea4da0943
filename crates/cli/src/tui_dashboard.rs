use crate::commands::Console;
use anyhow::Result;
use chrono::Local;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use nubot_console_core::{ConfigField, ConfigSource, ConfigWatcher, FieldKind};
use nubot_dashboard::render::{
    balance_rows, config_rows, order_rows, spinner, status_line, title, toggle_label,
    BALANCE_HEADERS, ENGINE_DOWN_BANNER, ORDER_HEADERS,
};
use nubot_dashboard::{Command, Dashboard, Dispatcher, MessageLevel, SharedState, UiState};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    Operation,
    Config,
}

enum InputMode {
    Normal,
    Confirm(Command),
    Edit(ConfigField),
}

struct App {
    state: SharedState,
    dispatcher: Dispatcher,
    page: Page,
    input: Input,
    input_mode: InputMode,
    selected_field: usize,
    tick: Duration,
}

impl App {
    fn new(dashboard: &Dashboard, tick: Duration) -> Self {
        Self {
            state: dashboard.state(),
            dispatcher: dashboard.dispatcher(),
            page: Page::Operation,
            input: Input::default(),
            input_mode: InputMode::Normal,
            selected_field: 0,
            tick,
        }
    }

    fn selected(&self) -> ConfigField {
        ConfigField::ALL[self.selected_field.min(ConfigField::ALL.len() - 1)]
    }

    /// Runs `command` in the background; its outcome lands in the message list.
    fn spawn_command(&self, command: Command, confirmed: bool) {
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            if let Err(e) = dispatcher.dispatch(command, confirmed).await {
                tracing::debug!(command = %command, error = %e, "Command finished with error");
            }
        });
    }

    async fn push_info(&self, text: impl Into<String>) {
        self.state.write().await.push_info(text);
    }
}

pub async fn run(console: Console, source: ConfigSource) -> Result<()> {
    let (watcher, config_rx) = ConfigWatcher::new(console.config.clone());
    if source.path().exists() {
        tokio::spawn(async move {
            if let Err(e) = watcher.watch(source).await {
                tracing::warn!(error = %e, "Config watcher stopped");
            }
        });
    }

    let mut dashboard = Dashboard::new(console.client.clone(), config_rx);
    dashboard.start();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(&dashboard, Duration::from_millis(console.config.ui.tick_ms));
    app.spawn_command(Command::LoadConfig, true);

    // Run app
    let res = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    dashboard.shutdown().await;

    if let Err(err) = res {
        println!("Error: {err:?}");
    }

    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<()> {
    loop {
        let snapshot = app.state.read().await.clone();
        terminal.draw(|f| ui(f, app, &snapshot))?;

        if event::poll(app.tick)? {
            if let Event::Key(key) = event::read()? {
                if !handle_key(app, key).await {
                    return Ok(());
                }
            }
        }
    }
}

/// Returns false when the user asked to quit.
async fn handle_key(app: &mut App, key: KeyEvent) -> bool {
    match app.input_mode {
        InputMode::Normal => match key.code {
            KeyCode::Char('q') => return false,
            KeyCode::Tab => {
                app.page = match app.page {
                    Page::Operation => Page::Config,
                    Page::Config => Page::Operation,
                };
            }
            KeyCode::Char('s') => {
                let command = app.dispatcher.toggle_command().await;
                app.input_mode = InputMode::Confirm(command);
            }
            _ if app.page == Page::Config => handle_config_key(app, key.code).await,
            _ => {}
        },
        InputMode::Confirm(command) => match key.code {
            KeyCode::Char('y' | 'Y') => {
                app.spawn_command(command, true);
                app.input_mode = InputMode::Normal;
            }
            KeyCode::Char('n' | 'N') | KeyCode::Esc => {
                app.push_info(format!("Cancelled {command}")).await;
                app.input_mode = InputMode::Normal;
            }
            _ => {}
        },
        InputMode::Edit(field) => match key.code {
            KeyCode::Enter => {
                let value = app.input.value().to_string();
                let mut state = app.state.write().await;
                if let Err(e) = state.config_form_mut().set(field, &value) {
                    state.push_error(format!("{e}"));
                }
                drop(state);
                app.input.reset();
                app.input_mode = InputMode::Normal;
            }
            KeyCode::Esc => {
                app.input.reset();
                app.input_mode = InputMode::Normal;
            }
            _ => {
                app.input.handle_event(&Event::Key(key));
            }
        },
    }
    true
}

async fn handle_config_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Down => {
            if app.selected_field < ConfigField::ALL.len() - 1 {
                app.selected_field += 1;
            }
        }
        KeyCode::Up => {
            app.selected_field = app.selected_field.saturating_sub(1);
        }
        KeyCode::Enter => {
            let field = app.selected();
            if field.kind() == FieldKind::Flag {
                app.state.write().await.config_form_mut().toggle(field);
            } else {
                let current = app.state.read().await.config_form().get(field).to_string();
                app.input = Input::new(current);
                app.input_mode = InputMode::Edit(field);
            }
        }
        KeyCode::Char('w') => app.spawn_command(Command::SaveConfig, true),
        KeyCode::Char('r') => app.input_mode = InputMode::Confirm(Command::ResetConfig),
        KeyCode::Char('l') => app.spawn_command(Command::LoadConfig, true),
        _ => {}
    }
}

fn ui(f: &mut Frame, app: &App, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(8),
            Constraint::Length(3),
        ])
        .split(f.area());

    // Title
    let title_style = if state.is_running() {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    };
    let page_name = match app.page {
        Page::Operation => "Operation",
        Page::Config => "Config",
    };
    let header = Paragraph::new(format!(
        "{} {}  [{page_name}]  {}",
        title(state),
        spinner(state),
        toggle_label(state)
    ))
    .style(title_style)
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(header, chunks[0]);

    if state.engine_down() {
        let banner = Paragraph::new(ENGINE_DOWN_BANNER)
            .style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(banner, chunks[1]);
    } else {
        match app.page {
            Page::Operation => render_operation(f, chunks[1], state),
            Page::Config => render_config(f, chunks[1], app, state),
        }
    }

    render_messages(f, chunks[2], state);
    render_help(f, chunks[3], app);
}

fn render_operation(f: &mut Frame, area: Rect, state: &UiState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Min(6),
        ])
        .split(area);

    let status = Paragraph::new(status_line(state))
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, rows[0]);

    let tables = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);

    let orders = table_widget(ORDER_HEADERS, &order_rows(state.orders()), "Orders");
    f.render_widget(orders, tables[0]);

    let balances = table_widget(BALANCE_HEADERS, &balance_rows(state.balances()), "Balances");
    f.render_widget(balances, tables[1]);

    let visible = rows[2].height.saturating_sub(2) as usize;
    let lines: Vec<&str> = state.log().lines().collect();
    let tail = lines[lines.len().saturating_sub(visible)..].join("\n");
    let log = Paragraph::new(tail).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Log (#{})", state.log_line())),
    );
    f.render_widget(log, rows[2]);
}

fn table_widget<const N: usize>(
    headers: [&'static str; N],
    rows: &[[String; N]],
    title: &'static str,
) -> Table<'static> {
    let header = Row::new(headers.map(Cell::from))
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    let body: Vec<Row> = rows
        .iter()
        .map(|cells| Row::new(cells.clone().map(Cell::from)))
        .collect();
    let widths = [Constraint::Ratio(1, N as u32); N];

    Table::new(body, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title))
}

fn render_config(f: &mut Frame, area: Rect, app: &App, state: &UiState) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let file = Paragraph::new(state.config_file().to_string())
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Config file"));
    f.render_widget(file, columns[0]);

    let items: Vec<ListItem> = config_rows(state.config_form())
        .into_iter()
        .enumerate()
        .map(|(i, (key, value))| {
            let style = if i == app.selected_field {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!("{key}: {value}")).style(style)
        })
        .collect();

    // Keep the selection in view
    let visible = columns[1].height.saturating_sub(2) as usize;
    let skip = (app.selected_field + 1).saturating_sub(visible);
    let list = List::new(items.into_iter().skip(skip))
        .block(Block::default().borders(Borders::ALL).title("Settings"));
    f.render_widget(list, columns[1]);
}

fn render_messages(f: &mut Frame, area: Rect, state: &UiState) {
    let messages: Vec<ListItem> = state
        .messages()
        .map(|m| {
            let style = match m.level {
                MessageLevel::Info => Style::default(),
                MessageLevel::Error => Style::default().fg(Color::Red),
            };
            ListItem::new(format!(
                "{} {}",
                m.at.with_timezone(&Local).format("%H:%M:%S"),
                m.text
            ))
            .style(style)
        })
        .collect();
    let widget =
        List::new(messages).block(Block::default().borders(Borders::ALL).title("Messages"));
    f.render_widget(widget, area);
}

fn render_help(f: &mut Frame, area: Rect, app: &App) {
    let (msg, style) = match &app.input_mode {
        InputMode::Normal => {
            let mut spans = vec![
                Span::styled("Tab", Style::default().fg(Color::Yellow)),
                Span::raw(" page, "),
                Span::styled("s", Style::default().fg(Color::Green)),
                Span::raw(" start/stop, "),
            ];
            if app.page == Page::Config {
                spans.extend([
                    Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
                    Span::raw(" select, "),
                    Span::styled("Enter", Style::default().fg(Color::Yellow)),
                    Span::raw(" edit, "),
                    Span::styled("w", Style::default().fg(Color::Green)),
                    Span::raw(" save, "),
                    Span::styled("r", Style::default().fg(Color::Red)),
                    Span::raw(" reset, "),
                    Span::styled("l", Style::default().fg(Color::Yellow)),
                    Span::raw(" reload, "),
                ]);
            }
            spans.extend([
                Span::styled("q", Style::default().fg(Color::Red)),
                Span::raw(" quit"),
            ]);
            (spans, Style::default())
        }
        InputMode::Confirm(command) => (
            vec![
                Span::raw(command.confirmation_prompt().unwrap_or("Are you sure?")),
                Span::styled(" (y/n)", Style::default().fg(Color::Yellow)),
            ],
            Style::default().fg(Color::Yellow),
        ),
        InputMode::Edit(field) => (
            vec![
                Span::raw(format!("{}: ", field.read_key())),
                Span::styled(app.input.value(), Style::default().fg(Color::Yellow)),
            ],
            Style::default().fg(Color::Yellow),
        ),
    };
    let text = Text::from(Line::from(msg)).patch_style(style);
    let help = Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}
