//! Watch command implementation - Interactive TUI viewer.

// CLI watch uses intentional casts for display and timing
#![allow(
    clippy::needless_pass_by_value,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss
)]

use super::{CliError, load_config, resolve_seed};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use hivelog::{Builder, Location, RegionKind, SimConfig, Simulation, UnitKind};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
};
use std::collections::{HashMap, HashSet};
use std::io::stdout;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Execute the watch command.
///
/// # Errors
///
/// Returns an error if the config is invalid or the TUI fails.
pub(crate) fn execute(
    seed: Option<u64>,
    ticks: Option<u32>,
    config: Option<PathBuf>,
    speed: u64,
) -> Result<(), CliError> {
    let config = load_config(config.as_deref(), ticks)?;
    let seed = resolve_seed(seed);
    let sim = Simulation::new(seed, &config)?;
    run_tui(App::new(sim, seed, config, speed))
}

/// App state for the TUI.
struct App {
    sim: Simulation,
    seed: u64,
    config: SimConfig,
    paused: bool,
    speed_ms: u64,
    last_step: Instant,
    /// Set when the host array fails; stepping stops.
    error: Option<String>,
}

impl App {
    fn new(sim: Simulation, seed: u64, config: SimConfig, speed_ms: u64) -> Self {
        Self {
            sim,
            seed,
            config,
            paused: true, // Start paused
            speed_ms,
            last_step: Instant::now(),
            error: None,
        }
    }

    fn is_over(&self) -> bool {
        self.sim.is_finished() || self.error.is_some()
    }

    fn step_forward(&mut self) {
        if self.is_over() {
            return;
        }
        if let Err(e) = self.sim.step() {
            self.error = Some(e.to_string());
        }
        self.last_step = Instant::now();
    }

    fn restart(&mut self) {
        match Simulation::new(self.seed, &self.config) {
            Ok(sim) => {
                self.sim = sim;
                self.error = None;
            }
            Err(e) => self.error = Some(e.to_string()),
        }
        self.paused = true;
    }

    fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    fn increase_speed(&mut self) {
        self.speed_ms = self.speed_ms.saturating_sub(100).max(50);
    }

    fn decrease_speed(&mut self) {
        self.speed_ms = (self.speed_ms + 100).min(2000);
    }

    fn should_auto_step(&self) -> bool {
        !self.paused && !self.is_over() && self.last_step.elapsed() >= Duration::from_millis(self.speed_ms)
    }
}

fn run_tui(mut app: App) -> Result<(), CliError> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(|e| CliError::new(e.to_string()))?;

    loop {
        terminal.draw(|f| ui(f, &app)).map_err(|e| CliError::new(e.to_string()))?;

        if app.should_auto_step() {
            app.step_forward();
        }

        // Handle input with timeout
        if event::poll(Duration::from_millis(50))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Char(' ') => app.toggle_pause(),
                KeyCode::Right | KeyCode::Char('l') => {
                    app.paused = true;
                    app.step_forward();
                }
                KeyCode::Char('+' | '=') => app.increase_speed(),
                KeyCode::Char('-') => app.decrease_speed(),
                KeyCode::Char('r') => app.restart(),
                _ => {}
            }
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    Ok(())
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(10),   // Main content
            Constraint::Length(3), // Footer
        ])
        .split(f.area());

    render_header(f, chunks[0], app);

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(chunks[1]);

    render_map(f, main_chunks[0], app);
    render_side(f, main_chunks[1], app);

    render_footer(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let status = if app.error.is_some() {
        "HOST FAILURE"
    } else if app.sim.is_finished() {
        "FINISHED"
    } else if app.paused {
        "PAUSED"
    } else {
        "RUNNING"
    };

    let title = format!(
        " Hivelog Viewer | Seed {} | Tick {}/{} | {} | Speed: {}ms ",
        app.seed,
        app.sim.ticks_played(),
        app.config.ticks,
        status,
        app.speed_ms
    );

    let header = Paragraph::new(title)
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL));

    f.render_widget(header, area);
}

fn render_map(f: &mut Frame, area: Rect, app: &App) {
    let units: HashMap<Location, Builder> = app
        .sim
        .units()
        .map(|unit| (unit.location, unit.builder))
        .collect();
    let sources: HashSet<Location> = app.sim.sources().iter().copied().collect();
    let known: HashSet<Location> = app
        .sim
        .base_knowledge()
        .map(|set| set.iter().copied().collect())
        .unwrap_or_default();

    // Show the part of the grid that fits
    let visible_width = (area.width as usize).saturating_sub(2).min(app.config.width as usize);
    let visible_height = (area.height as usize).saturating_sub(2).min(app.config.height as usize);

    let lines: Vec<Line> = (0..visible_height)
        .map(|y| {
            let spans: Vec<Span> = (0..visible_width)
                .map(|x| {
                    let at = Location::new(x as i32, y as i32);
                    let (ch, color) = cell_glyph(
                        units.get(&at).copied(),
                        sources.contains(&at),
                        known.contains(&at),
                    );
                    Span::styled(ch.to_string(), Style::default().fg(color))
                })
                .collect();
            Line::from(spans)
        })
        .collect();

    let map_widget = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Grid "));

    f.render_widget(map_widget, area);
}

fn cell_glyph(unit: Option<Builder>, source: bool, known: bool) -> (char, Color) {
    match unit {
        Some(Builder::Base) => ('@', Color::Yellow),
        Some(Builder::Unit(kind)) => (unit_glyph(kind), unit_color(kind)),
        None if source => ('*', Color::Red),
        None if known => ('~', Color::LightRed),
        None => ('.', Color::DarkGray),
    }
}

/// Structures in capitals, mobile units in lowercase.
fn unit_glyph(kind: UnitKind) -> char {
    let first = kind.name().chars().next().unwrap_or('?');
    if kind.is_structure() {
        first.to_ascii_uppercase()
    } else {
        first
    }
}

fn unit_color(kind: UnitKind) -> Color {
    match kind {
        UnitKind::Worker => Color::Blue,
        UnitKind::Fumigator => Color::Green,
        UnitKind::Soldier => Color::Magenta,
        UnitKind::Infecter => Color::LightMagenta,
        _ => Color::White,
    }
}

fn render_side(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(3), Constraint::Min(5)])
        .split(area);

    for (i, kind) in RegionKind::ALL.into_iter().enumerate() {
        let (used, max) = app.sim.region_fill(kind).unwrap_or((0, 0));
        let ratio = if max == 0 { 0.0 } else { (used as f64 / max as f64).min(1.0) };
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title(format!(" {} log ", kind.name())))
            .gauge_style(Style::default().fg(match kind {
                RegionKind::Hazard => Color::Red,
                RegionKind::Cleared => Color::Green,
            }))
            .ratio(ratio)
            .label(format!("{used}/{max}"));
        f.render_widget(gauge, chunks[i]);
    }

    render_counters(f, chunks[2], app);
}

fn render_counters(f: &mut Frame, area: Rect, app: &App) {
    let mut lines = vec![Line::from("")];

    if let Some(error) = &app.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(""));
    }

    match app.sim.counters() {
        Ok(counters) => {
            lines.push(Line::from(Span::styled(
                "  kind        alive  built",
                Style::default().add_modifier(Modifier::BOLD),
            )));
            for kind in UnitKind::ALL {
                let built = counters.lifetime(kind);
                if built == 0 {
                    continue;
                }
                lines.push(Line::from(vec![
                    Span::styled(
                        format!("  {:<11}", kind.name()),
                        Style::default().fg(unit_color(kind)),
                    ),
                    Span::raw(format!("{:>5}  {built:>5}", counters.current(kind))),
                ]));
            }
        }
        Err(e) => lines.push(Line::from(format!("  counters unavailable: {e}"))),
    }

    let known = app.sim.base_knowledge().map_or(0, hivelog::WorkingSet::len);
    lines.push(Line::from(""));
    lines.push(Line::from(format!("  Sources: {}", app.sim.sources().len())));
    lines.push(Line::from(format!("  Known hazards: {known}")));
    lines.push(Line::from(format!("  Units: {}", app.sim.units().count())));

    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Production "))
        .wrap(Wrap { trim: false });

    f.render_widget(widget, area);
}

fn render_footer(f: &mut Frame, area: Rect, app: &App) {
    let controls = if app.is_over() {
        " [q] Quit  [r] Restart "
    } else {
        " [q] Quit  [Space] Pause  [→] Step  [+/-] Speed  [r] Restart "
    };

    let footer = Paragraph::new(controls)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));

    f.render_widget(footer, area);
}
