use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap};

use crate::collection::FeatureCollectionResult;
use crate::domain::ServiceSummary;
use crate::error::GeodataError;
use crate::metadata::LayerMetadata;
use crate::output::{ProgressEvent, ProgressSink, cell_text, info_rows};

const EVENTS_MAX: usize = 8;
const COLUMN_MAX: u16 = 32;
const SPINNER: &[&str] = &["|", "/", "-", "\\"];

type Backend = CrosstermBackend<io::Stdout>;

#[derive(Debug, Clone, Copy)]
pub enum ProgressSinkKind {
    List,
    Search,
    Info,
    Filter,
}

impl ProgressSinkKind {
    fn label(self) -> &'static str {
        match self {
            ProgressSinkKind::List => "List",
            ProgressSinkKind::Search => "Search",
            ProgressSinkKind::Info => "Info",
            ProgressSinkKind::Filter => "Filter",
        }
    }
}

#[derive(Debug)]
struct RunState {
    phase: String,
    status: String,
    events: VecDeque<String>,
    started: Instant,
}

pub struct Tui {
    kind: ProgressSinkKind,
    state: Arc<Mutex<RunState>>,
}

struct TuiProgress {
    state: Arc<Mutex<RunState>>,
}

impl ProgressSink for TuiProgress {
    fn event(&self, event: ProgressEvent) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let message = event.message.trim().to_string();
        match parse_phase(&message) {
            Some((phase, detail)) => {
                state.phase = phase.to_string();
                state.status = detail.to_string();
            }
            None => state.status = message.clone(),
        }
        let line = match event.elapsed {
            Some(elapsed) => format!("{message} ({} ms)", elapsed.as_millis()),
            None => message,
        };
        state.events.push_back(line);
        while state.events.len() > EVENTS_MAX {
            state.events.pop_front();
        }
    }
}

impl Tui {
    pub fn new(kind: ProgressSinkKind) -> Self {
        Self {
            kind,
            state: Arc::new(Mutex::new(RunState {
                phase: "Resolve".to_string(),
                status: "starting".to_string(),
                events: VecDeque::new(),
                started: Instant::now(),
            })),
        }
    }

    pub fn run<F, R>(&mut self, job: F) -> miette::Result<R>
    where
        F: FnOnce(&dyn ProgressSink) -> Result<R, GeodataError> + Send + 'static,
        R: Send + 'static,
    {
        if let Ok(mut state) = self.state.lock() {
            state.started = Instant::now();
        }
        let mut terminal = enter_terminal()?;

        let (tx, rx) = mpsc::channel();
        let sink = TuiProgress {
            state: Arc::clone(&self.state),
        };
        let handle = thread::spawn(move || tx.send(job(&sink)));

        let mut tick = 0usize;
        let outcome = loop {
            if let Ok(state) = self.state.lock() {
                let kind = self.kind;
                terminal
                    .draw(|frame| draw_progress(frame, kind, &state, tick))
                    .into_diagnostic()?;
            }

            if let Ok(result) = rx.try_recv() {
                handle.join().ok();
                break Some(result);
            }

            if event::poll(Duration::from_millis(120)).into_diagnostic()?
                && let Event::Key(key) = event::read().into_diagnostic()?
                && is_quit(key)
            {
                break None;
            }
            tick = tick.wrapping_add(1);
        };

        leave_terminal()?;
        match outcome {
            Some(result) => result.map_err(miette::Report::new),
            None => Err(miette::Report::msg("aborted")),
        }
    }

    pub fn show_services(
        &mut self,
        title: &str,
        services: &[ServiceSummary],
    ) -> miette::Result<()> {
        let header = vec!["#".to_string(), "Name".to_string(), "Type".to_string()];
        let rows = services
            .iter()
            .enumerate()
            .map(|(index, service)| {
                vec![
                    (index + 1).to_string(),
                    service.name.clone(),
                    service.kind.clone(),
                ]
            })
            .collect::<Vec<_>>();
        let footer = format!("{} datasets", services.len());
        browse(title, header, rows, &footer)
    }

    pub fn show_info(&mut self, metadata: &LayerMetadata) -> miette::Result<()> {
        let header = vec!["Property".to_string(), "Value".to_string()];
        let rows = info_rows(metadata)
            .into_iter()
            .map(|(label, value)| vec![label.to_string(), value])
            .collect::<Vec<_>>();
        browse(&metadata.layer_name, header, rows, &metadata.crs())
    }

    pub fn show_collection(&mut self, collection: &FeatureCollectionResult) -> miette::Result<()> {
        let columns = collection.property_names();
        let rows = collection
            .features
            .iter()
            .map(|feature| {
                columns
                    .iter()
                    .map(|column| {
                        feature
                            .properties
                            .get(column)
                            .map(cell_text)
                            .unwrap_or_default()
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        let footer = format!("{} features · {}", collection.len(), collection.crs);
        browse("Filtered features", columns, rows, &footer)
    }
}

fn browse(
    title: &str,
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    footer: &str,
) -> miette::Result<()> {
    let widths = column_widths(&header, &rows);
    let mut table_state = TableState::default();
    if !rows.is_empty() {
        table_state.select(Some(0));
    }

    let mut terminal = enter_terminal()?;
    loop {
        terminal
            .draw(|frame| {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([Constraint::Min(4), Constraint::Length(1)])
                    .split(frame.area());

                let header_row = Row::new(header.iter().map(|name| Cell::from(name.as_str())))
                    .style(
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    );
                let body = rows
                    .iter()
                    .map(|row| Row::new(row.iter().map(|cell| Cell::from(cell.as_str()))));
                let table = Table::new(body, widths.clone())
                    .header(header_row)
                    .block(
                        Block::default()
                            .borders(Borders::ALL)
                            .title(format!(" {title} ")),
                    )
                    .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
                    .highlight_symbol("> ");
                frame.render_stateful_widget(table, chunks[0], &mut table_state);

                let hint = Line::from(vec![
                    Span::styled(footer.to_string(), Style::default().fg(Color::Gray)),
                    Span::raw("   "),
                    Span::styled(
                        "↑/↓ move · PgUp/PgDn page · q quit",
                        Style::default().fg(Color::DarkGray),
                    ),
                ]);
                frame.render_widget(Paragraph::new(hint), chunks[1]);
            })
            .into_diagnostic()?;

        if !event::poll(Duration::from_millis(200)).into_diagnostic()? {
            continue;
        }
        let Event::Key(key) = event::read().into_diagnostic()? else {
            continue;
        };
        if is_quit(key) {
            break;
        }
        if key.kind != KeyEventKind::Press || rows.is_empty() {
            continue;
        }
        let last = rows.len() - 1;
        let current = table_state.selected().unwrap_or(0);
        let next = match key.code {
            KeyCode::Down | KeyCode::Char('j') => (current + 1).min(last),
            KeyCode::Up | KeyCode::Char('k') => current.saturating_sub(1),
            KeyCode::PageDown => (current + 20).min(last),
            KeyCode::PageUp => current.saturating_sub(20),
            KeyCode::Home => 0,
            KeyCode::End => last,
            _ => current,
        };
        table_state.select(Some(next));
    }
    leave_terminal()
}

fn draw_progress(
    frame: &mut ratatui::Frame,
    kind: ProgressSinkKind,
    state: &RunState,
    tick: usize,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Min(4),
        ])
        .split(frame.area());

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "NGEO",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(env!("CARGO_PKG_VERSION"), Style::default().fg(Color::Gray)),
        Span::raw("   Source: GRID3   Op: "),
        Span::styled(kind.label(), Style::default().fg(Color::Cyan)),
    ]))
    .block(Block::default().borders(Borders::BOTTOM))
    .alignment(Alignment::Left);
    frame.render_widget(header, chunks[0]);

    let spinner = SPINNER[tick % SPINNER.len()];
    let status = Paragraph::new(vec![
        Line::from(vec![
            Span::styled(format!("{spinner} "), Style::default().fg(Color::Green)),
            Span::styled("Phase: ", Style::default().fg(Color::Gray)),
            Span::styled(state.phase.clone(), Style::default().fg(Color::Cyan)),
            Span::styled("   Elapsed: ", Style::default().fg(Color::Gray)),
            Span::raw(format!("{:.1}s", state.started.elapsed().as_secs_f64())),
        ]),
        Line::from(Span::raw(state.status.clone())),
    ])
    .wrap(Wrap { trim: true });
    frame.render_widget(status, chunks[1]);

    let events = state
        .events
        .iter()
        .map(|event| Line::from(Span::styled(event.clone(), Style::default().fg(Color::Gray))))
        .collect::<Vec<_>>();
    let events = Paragraph::new(events)
        .block(Block::default().borders(Borders::ALL).title(" Events "))
        .wrap(Wrap { trim: true });
    frame.render_widget(events, chunks[2]);
}

fn column_widths(header: &[String], rows: &[Vec<String>]) -> Vec<Constraint> {
    (0..header.len())
        .map(|index| {
            let widest = rows
                .iter()
                .filter_map(|row| row.get(index))
                .chain(std::iter::once(&header[index]))
                .map(|text| text.chars().count())
                .max()
                .unwrap_or(1);
            Constraint::Length((widest as u16).clamp(1, COLUMN_MAX))
        })
        .collect()
}

fn parse_phase(message: &str) -> Option<(&str, &str)> {
    let rest = message.strip_prefix("phase=")?;
    let (phase, detail) = rest.split_once(';')?;
    Some((phase.trim(), detail.trim()))
}

fn is_quit(key: KeyEvent) -> bool {
    key.kind == KeyEventKind::Press && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
}

fn enter_terminal() -> miette::Result<Terminal<Backend>> {
    enable_raw_mode().into_diagnostic()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen).into_diagnostic()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout)).into_diagnostic()?;
    terminal.clear().into_diagnostic()?;
    Ok(terminal)
}

fn leave_terminal() -> miette::Result<()> {
    disable_raw_mode().into_diagnostic()?;
    io::stdout()
        .execute(LeaveAlternateScreen)
        .into_diagnostic()?;
    Ok(())
}
