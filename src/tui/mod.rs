mod clipboard;
mod help;
mod state;

use crate::cli::{build_config, Cli};
use crate::model::{DownloadKind, ViewState, WorkflowEvent};
use crate::orchestrator::{self, UiCommand};
use crate::text_summary::format_count;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
    Terminal,
};
use state::UiState;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli) -> Result<()> {
    // Unbounded channels avoid backpressure and task switching in the hot path.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<WorkflowEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_args = args.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(ui_args, event_rx, cmd_tx));

    let cfg = build_config(&args);
    let res = orchestrator::run_controller(cfg, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
pub fn run_threaded(
    args: Cli,
    mut event_rx: UnboundedReceiver<WorkflowEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState::default();

    // A FILE argument behaves like an immediate selection.
    if let Some(path) = args.file.clone() {
        state.selected_path = Some(path.clone());
        let _ = cmd_tx.send(UiCommand::Select(path));
    }

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep UI responsive; unbounded channel avoids backpressure.
        while let Ok(ev) = event_rx.try_recv() {
            state.apply_event(ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }

                // Path entry captures printable keys until Enter or Escape.
                if state.path_editing {
                    match k.code {
                        KeyCode::Enter => {
                            let trimmed = state.path_input.trim().to_string();
                            state.path_editing = false;
                            if !trimmed.is_empty() {
                                let path = std::path::PathBuf::from(trimmed);
                                state.selected_path = Some(path.clone());
                                let _ = cmd_tx.send(UiCommand::Select(path));
                            }
                        }
                        KeyCode::Backspace => {
                            state.path_input.pop();
                        }
                        KeyCode::Esc => {
                            state.path_editing = false;
                            state.path_input.clear();
                            let _ = cmd_tx.send(UiCommand::Reset);
                        }
                        KeyCode::Char(c) => {
                            state.path_input.push(c);
                        }
                        _ => {}
                    }
                    continue;
                }

                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    // Escape is a full reset from any state.
                    (_, KeyCode::Esc) => {
                        let _ = cmd_tx.send(UiCommand::Reset);
                    }
                    (_, KeyCode::Char('o')) => {
                        state.path_editing = true;
                        state.path_input.clear();
                        state.show_help = false;
                    }
                    (_, KeyCode::Char('r')) => {
                        if let Some(path) = state.selected_path.clone() {
                            let _ = cmd_tx.send(UiCommand::Select(path));
                        } else {
                            state.info = "Nothing selected yet".into();
                        }
                    }
                    (_, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Download(DownloadKind::Csv));
                    }
                    (_, KeyCode::Char('e')) => {
                        let _ = cmd_tx.send(UiCommand::Download(DownloadKind::Excel));
                    }
                    (_, KeyCode::Char('s')) => {
                        let _ = cmd_tx.send(UiCommand::Download(DownloadKind::Summary));
                    }
                    (_, KeyCode::Char('a')) => {
                        for kind in DownloadKind::all() {
                            let _ = cmd_tx.send(UiCommand::Download(kind));
                        }
                    }
                    (_, KeyCode::Char('y')) => {
                        if let Some(sess) = state.session.as_ref() {
                            match clipboard::copy_to_clipboard(&sess.session_id) {
                                Ok(()) => {
                                    state.info =
                                        format!("Copied session id {}", sess.session_id);
                                }
                                Err(e) => {
                                    state.info = format!("Copy failed: {e:#}");
                                }
                            }
                        } else {
                            state.info = "No session to copy".into();
                        }
                    }
                    (_, KeyCode::Char('?')) => {
                        state.show_help = !state.show_help;
                    }
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(area);

    let health = state
        .server_health
        .as_ref()
        .map(|h| h.to_message())
        .unwrap_or_else(|| "Service not checked".into());
    let header = Paragraph::new(Line::from(vec![
        Span::styled("Statement Converter", Style::default().fg(Color::Cyan)),
        Span::raw("   "),
        Span::styled(health, Style::default().fg(Color::Gray)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("statement-convert-cli"),
    );
    f.render_widget(header, chunks[0]);

    if state.show_help {
        help::draw_help(chunks[1], f);
    } else {
        // Exactly one view section renders per frame; the ViewState enum makes
        // the mutual exclusion structural.
        match state.view {
            ViewState::Idle => draw_idle(chunks[1], f, state),
            ViewState::Processing => draw_processing(chunks[1], f, state),
            ViewState::Results => draw_results(chunks[1], f, state),
            ViewState::Error => draw_error(chunks[1], f, state),
        }
    }

    // Path entry lives in the status bar so it is visible from any view.
    let status_line = if state.path_editing {
        Line::from(vec![
            Span::raw("Path: "),
            Span::styled(
                format!("{}_", state.path_input),
                Style::default().fg(Color::Yellow),
            ),
        ])
    } else {
        Line::from(state.info.clone())
    };
    let status = Paragraph::new(status_line).block(
        Block::default()
            .borders(Borders::ALL)
            .title("q quit | Esc reset | o open | ? help"),
    );
    f.render_widget(status, chunks[2]);
}

/// Bordered section with the entry highlight after a view change.
fn section_block(title: &str, state: &UiState) -> Block<'static> {
    let style = if state.view_just_entered() {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .title(title.to_string())
        .border_style(style)
}

fn key_hint(key: &'static str, text: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw("  "),
        Span::raw(text),
    ])
}

fn draw_idle(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let mut lines = vec![
        Line::from("Upload a bank statement PDF for conversion (max 50 MiB)."),
        Line::from(""),
        key_hint("o", "enter a file path"),
        key_hint("r", "re-submit the last selection"),
        key_hint("?", "help"),
        Line::from(""),
    ];
    if let Some(p) = state.selected_path.as_ref() {
        lines.push(Line::from(format!("Selected: {}", p.display())));
    }
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(section_block("Upload", state));
    f.render_widget(p, area);
}

fn draw_processing(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let gauge = Gauge::default()
        .block(section_block("Processing", state))
        .gauge_style(Style::default().fg(Color::Green))
        .percent(state.progress_percent.min(100));
    f.render_widget(gauge, rows[0]);

    let mut lines = vec![Line::from(state.status.clone())];
    if let Some(p) = state.selected_path.as_ref() {
        lines.push(Line::from(Span::styled(
            format!("File: {}", p.display()),
            Style::default().fg(Color::Gray),
        )));
    }
    let status = Paragraph::new(lines).wrap(Wrap { trim: false });
    f.render_widget(status, rows[1]);
}

fn draw_results(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let mut lines = Vec::new();
    if let Some(sess) = state.session.as_ref() {
        lines.push(Line::from(vec![
            Span::raw("Transactions: "),
            Span::styled(
                format_count(sess.stats.transaction_count),
                Style::default().fg(Color::Green),
            ),
        ]));
        lines.push(Line::from(vec![
            Span::raw("Pages processed: "),
            Span::styled(
                format_count(sess.stats.page_count),
                Style::default().fg(Color::Green),
            ),
        ]));
        lines.push(Line::from(vec![
            Span::raw("Categories: "),
            Span::styled(
                format_count(sess.stats.category_count),
                Style::default().fg(Color::Green),
            ),
        ]));
        if let Some(range) = sess.stats.date_range.as_ref() {
            lines.push(Line::from(format!(
                "Date range: {} to {}",
                range.start, range.end
            )));
        }
        if let Some(w) = sess.stats.total_withdrawals {
            lines.push(Line::from(format!("Total withdrawals: {:.2}", w)));
        }
        if let Some(d) = sess.stats.total_deposits {
            lines.push(Line::from(format!("Total deposits: {:.2}", d)));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("Session {}", sess.session_id),
            Style::default().fg(Color::Gray),
        )));
        lines.push(Line::from(""));
        lines.push(key_hint("c", "download CSV"));
        lines.push(key_hint("e", "download Excel workbook"));
        lines.push(key_hint("s", "download summary"));
        lines.push(key_hint("a", "download all"));
        lines.push(key_hint("y", "copy session id"));
        for (kind, path) in &state.downloads {
            lines.push(Line::from(Span::styled(
                format!("Saved {}: {}", kind, path.display()),
                Style::default().fg(Color::Gray),
            )));
        }
    } else {
        lines.push(Line::from("No session data."));
    }
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(section_block("Results", state));
    f.render_widget(p, area);
}

fn draw_error(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let message = state
        .error_message
        .clone()
        .unwrap_or_else(|| "processing failed".into());
    let lines = vec![
        Line::from(Span::styled(message, Style::default().fg(Color::Red))),
        Line::from(""),
        key_hint("Esc", "reset"),
        key_hint("o", "pick another file"),
    ];
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(section_block("Error", state));
    f.render_widget(p, area);
}
