use std::{
    collections::VecDeque,
    f32::consts::{PI, TAU},
    fs::{self, File},
    io::{self, Stdout},
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use minnow_core::{ControlIntent, Fish, MinnowConfig, TickSummary, WorldState};
use minnow_index::Point;
use rand::{Rng, SeedableRng, rngs::SmallRng};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Sparkline},
};
use serde::Serialize;
use supports_color::{ColorLevel, Stream, on_cached};
use tracing::info;

use crate::{
    SharedWorld,
    input::IntentTracker,
    renderer::{Renderer, RendererContext},
};

const TARGET_SIM_HZ: f32 = 30.0;
const MAX_STEPS_PER_FRAME: usize = 120;
const UI_TICK_MILLIS: u64 = 100;
const DEFAULT_HEADLESS_FRAMES: usize = 12;
const MAX_HEADLESS_FRAMES: usize = 360;
const EVENT_LOG_CAPACITY: usize = 16;
const HISTORY_WINDOW: usize = 48;
const DRIFTER_COUNT: usize = 24;

pub struct TerminalRenderer {
    tick_interval: Duration,
    draw_interval: Duration,
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs_f32(1.0 / TARGET_SIM_HZ),
            draw_interval: Duration::from_millis(UI_TICK_MILLIS),
        }
    }
}

impl Renderer for TerminalRenderer {
    fn name(&self) -> &'static str {
        "terminal"
    }

    fn run(&self, ctx: RendererContext) -> Result<()> {
        if std::env::var_os("MINNOW_TERMINAL_HEADLESS").is_some() {
            let report = self.run_headless(ctx)?;
            info!(
                target = "minnow::terminal",
                frames = report.summary.frame_count,
                ticks_simulated = report.summary.ticks_simulated,
                final_tick = report.summary.final_tick,
                total_consumed = report.summary.total_consumed,
                final_size = report.summary.final_size,
                final_plankton = report.summary.final_plankton_count,
                "Terminal headless run completed"
            );
            return Ok(());
        }

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enable raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to build terminal backend")?;
        terminal.hide_cursor().ok();

        let result = run_event_loop(self, &mut terminal, ctx);

        terminal.show_cursor().ok();
        if let Err(err) = disable_raw_mode() {
            tracing::error!(?err, "failed to disable raw mode");
        }
        if let Err(err) = execute!(terminal.backend_mut(), LeaveAlternateScreen) {
            tracing::error!(?err, "failed to leave alternate screen");
        }

        result
    }
}

fn run_event_loop(
    renderer: &TerminalRenderer,
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ctx: RendererContext,
) -> Result<()> {
    let mut app = TerminalApp::new(renderer, ctx);

    loop {
        let now = Instant::now();
        app.maybe_step_simulation(now);

        if now.duration_since(app.last_draw) >= app.draw_interval {
            terminal.draw(|frame| app.draw(frame))?;
            app.last_draw = now;
        }

        let timeout = renderer
            .draw_interval
            .saturating_sub(now.duration_since(app.last_event_check));
        let event_ready = event::poll(timeout).unwrap_or(false);
        if event_ready
            && let Event::Key(key) = event::read()?
            && app.handle_key(key)?
        {
            break;
        }
        if event_ready {
            app.last_event_check = Instant::now();
        }
    }

    Ok(())
}

impl TerminalRenderer {
    fn run_headless(&self, ctx: RendererContext) -> Result<HeadlessReport> {
        let backend = ratatui::backend::TestBackend::new(80, 36);
        let mut terminal = Terminal::new(backend).context("failed to build test backend")?;
        let mut app = TerminalApp::new(self, ctx);
        let mut report = HeadlessReport::new(app.snapshot().clone());
        let frames = self.headless_frame_budget();

        for _ in 0..frames {
            app.step_once(ControlIntent::cruise());
            report.record(app.snapshot());
            terminal.draw(|frame| app.draw(frame))?;
        }

        report.finalize();

        if let Some(path) = report_file_path_from_env() {
            report.write_json(&path).with_context(|| {
                format!("failed to write headless report to {}", path.display())
            })?;
        }

        Ok(report)
    }

    fn headless_frame_budget(&self) -> usize {
        std::env::var("MINNOW_TERMINAL_HEADLESS_FRAMES")
            .ok()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|value| *value > 0)
            .map(|value| value.min(MAX_HEADLESS_FRAMES))
            .unwrap_or(DEFAULT_HEADLESS_FRAMES)
    }
}

struct TerminalApp {
    world: SharedWorld,
    tick_interval: Duration,
    draw_interval: Duration,
    speed_multiplier: f32,
    paused: bool,
    help_visible: bool,
    sim_accumulator: f32,
    last_tick: Instant,
    last_draw: Instant,
    last_event_check: Instant,
    tracker: IntentTracker,
    palette: Palette,
    drifters: Vec<Drifter>,
    event_log: VecDeque<EventEntry>,
    last_event_tick: u64,
    snapshot: Snapshot,
}

impl TerminalApp {
    fn new(renderer: &TerminalRenderer, ctx: RendererContext) -> Self {
        let palette = Palette::detect();
        let drifters = {
            let world = ctx
                .world
                .lock()
                .expect("world mutex poisoned while seeding drifters");
            Drifter::school(world.config())
        };
        let mut app = Self {
            world: Arc::clone(&ctx.world),
            tick_interval: renderer.tick_interval,
            draw_interval: renderer.draw_interval,
            speed_multiplier: 1.0,
            paused: false,
            help_visible: false,
            sim_accumulator: 0.0,
            last_tick: Instant::now(),
            last_draw: Instant::now(),
            last_event_check: Instant::now(),
            tracker: IntentTracker::default(),
            palette,
            drifters,
            event_log: VecDeque::with_capacity(EVENT_LOG_CAPACITY),
            last_event_tick: 0,
            snapshot: Snapshot::default(),
        };
        app.refresh_snapshot();
        app
    }

    fn maybe_step_simulation(&mut self, now: Instant) {
        let delta = now - self.last_tick;
        self.last_tick = now;

        let mut steps = 0usize;

        let effective_speed = if self.paused {
            0.0
        } else {
            self.speed_multiplier.max(0.0)
        };

        let step_interval = self.tick_interval.as_secs_f32();
        if effective_speed > f32::EPSILON && step_interval > f32::EPSILON {
            self.sim_accumulator += delta.as_secs_f32() * effective_speed;
            let max_accumulator = step_interval * MAX_STEPS_PER_FRAME as f32;
            if self.sim_accumulator > max_accumulator {
                self.sim_accumulator = max_accumulator;
            }
            steps = (self.sim_accumulator / step_interval).floor() as usize;
            if steps > MAX_STEPS_PER_FRAME {
                steps = MAX_STEPS_PER_FRAME;
            }
            if steps > 0 {
                self.sim_accumulator -= step_interval * steps as f32;
            }
        }

        // One intent sample covers every tick stepped under this frame.
        if steps > 0
            && let Ok(mut world) = self.world.lock()
        {
            let intent = self.tracker.snapshot(now);
            for _ in 0..steps {
                world.step(intent);
            }
        }

        self.refresh_snapshot();
    }

    fn step_once(&mut self, intent: ControlIntent) {
        if let Ok(mut world) = self.world.lock() {
            world.step(intent);
        }
        self.refresh_snapshot();
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        self.refresh_snapshot();
        let snapshot = self.snapshot.clone();

        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(frame.area());

        self.draw_header(frame, outer[0], &snapshot);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(64), Constraint::Percentage(36)])
            .split(outer[1]);

        self.draw_map(frame, body[0], &snapshot);

        let sidebar = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(8),
                Constraint::Length(6),
                Constraint::Length(6),
                Constraint::Min(3),
            ])
            .split(body[1]);

        self.draw_fish_panel(frame, sidebar[0], &snapshot);
        self.draw_trends(frame, sidebar[1], &snapshot);
        self.draw_index_panel(frame, sidebar[2], &snapshot);
        self.draw_events(frame, sidebar[3], &snapshot);

        if self.help_visible {
            self.draw_help(frame);
        }
    }

    fn draw_header(&self, frame: &mut Frame<'_>, area: Rect, snapshot: &Snapshot) {
        let status = format!(
            "Tick {:>6}  Size {:>4.0}  Speed {:>4.2}  Eaten {:>5}  Plankton {:>5}",
            snapshot.tick,
            snapshot.fish.size,
            snapshot.fish.velocity,
            snapshot.consumed_total,
            snapshot.plankton_count,
        );

        let paused_flag = if self.paused {
            Span::styled(" PAUSED ", self.palette.paused_style())
        } else {
            Span::styled(" RUNNING ", self.palette.running_style())
        };

        let mode_span = Span::styled(
            format!(
                " x{:.1} ",
                if self.paused {
                    0.0
                } else {
                    self.speed_multiplier
                }
            ),
            self.palette.speed_style(self.speed_multiplier),
        );

        let mut line = Line::from(vec![Span::styled(status, self.palette.header_style())]);
        line.spans.push(Span::raw("  "));
        line.spans.push(paused_flag);
        line.spans.push(mode_span);
        line.spans.push(Span::raw("  "));
        line.spans.push(Span::styled(
            format!(
                "Yaw {:>6.1}°  Pitch {:>5.1}°",
                snapshot.fish.yaw.to_degrees(),
                snapshot.fish.pitch.to_degrees()
            ),
            self.palette.accent_style(),
        ));

        let paragraph = Paragraph::new(line).block(
            Block::default()
                .title(self.palette.title("Minnow Tank HUD"))
                .borders(Borders::ALL),
        );
        frame.render_widget(paragraph, area);
    }

    fn draw_fish_panel(&self, frame: &mut Frame<'_>, area: Rect, snapshot: &Snapshot) {
        let fish = &snapshot.fish;
        let mut lines = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("Position ", self.palette.header_style()),
            Span::raw(format!(
                "x {:>7.1}  y {:>7.1}  z {:>7.1}",
                fish.position.x, fish.position.y, fish.position.z
            )),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Heading ", self.palette.header_style()),
            Span::raw(format!(
                "yaw {:>6.1}°  pitch {:>5.1}°",
                fish.yaw.to_degrees(),
                fish.pitch.to_degrees()
            )),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Motion ", self.palette.header_style()),
            Span::raw(format!(
                "velocity {:>4.2}  stride {:>4.2}",
                fish.velocity, snapshot.stride
            )),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Mouth ", self.palette.header_style()),
            Span::raw(format!(
                "len {:>5.1}  radius {:>4.1}",
                fish.hit_length(),
                fish.hit_radius()
            )),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Camera ", self.palette.header_style()),
            Span::raw(format!(
                "anchor ({:>6.1}, {:>6.1}, {:>6.1})",
                snapshot.chase_anchor.x, snapshot.chase_anchor.y, snapshot.chase_anchor.z
            )),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Eaten ", self.palette.header_style()),
            Span::raw(format!("{:>6} total", snapshot.consumed_total)),
        ]));

        let paragraph = Paragraph::new(Text::from(lines)).block(
            Block::default()
                .title(self.palette.title("Fish"))
                .borders(Borders::ALL),
        );
        frame.render_widget(paragraph, area);
    }

    fn draw_trends(&self, frame: &mut Frame<'_>, area: Rect, snapshot: &Snapshot) {
        let block = Block::default()
            .title(self.palette.title("Feeding & Speed Trends"))
            .borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if inner.height == 0 {
            return;
        }

        let trend_layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(0),
            ])
            .split(inner);

        let consumed_data: Vec<u64> = snapshot
            .history
            .iter()
            .rev()
            .map(|entry| entry.consumed as u64)
            .collect();
        let velocity_data: Vec<u64> = snapshot
            .history
            .iter()
            .rev()
            .map(|entry| (entry.velocity.max(0.0) * 100.0) as u64)
            .collect();

        if !consumed_data.is_empty() {
            let spark = Sparkline::default()
                .style(self.palette.consumed_spark_style())
                .data(&consumed_data);
            frame.render_widget(spark, trend_layout[0]);
        }
        if !velocity_data.is_empty() {
            let spark = Sparkline::default()
                .style(self.palette.velocity_spark_style())
                .data(&velocity_data);
            frame.render_widget(spark, trend_layout[1]);
        }

        let mut trend_lines = Vec::new();
        if let Some(recent) = snapshot.history.first() {
            trend_lines.push(Line::from(vec![
                Span::styled("Last Tick ", self.palette.header_style()),
                Span::raw(format!(
                    "t{:>6} ate {:>2} size {:>4.0} v {:>4.2}",
                    recent.tick, recent.consumed, recent.size, recent.velocity
                )),
            ]));
        }
        if let (Some(latest), Some(oldest)) = (snapshot.history.first(), snapshot.history.last()) {
            trend_lines.push(Line::from(vec![
                Span::styled("Window ", self.palette.header_style()),
                Span::raw(format!(
                    "t{:>6}→t{:>6} size {:>4.0}→{:>4.0}",
                    oldest.tick, latest.tick, oldest.size, latest.size
                )),
            ]));
        }
        if trend_lines.is_empty() {
            trend_lines.push(Line::from(vec![Span::raw("Waiting for samples...")]));
        }
        let trend_text = Paragraph::new(trend_lines).block(Block::default());
        frame.render_widget(trend_text, trend_layout[2]);
    }

    fn draw_map(&self, frame: &mut Frame<'_>, area: Rect, snapshot: &Snapshot) {
        let title = format!(
            "Tank Top-Down ±{:.0}  view {:.0}",
            snapshot.world_half_extent, snapshot.view_range
        );
        let block = Block::default()
            .title(self.palette.title(title))
            .borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if inner.width < 2 || inner.height < 2 {
            return;
        }

        let width = inner.width as usize;
        let height = inner.height as usize;
        let mut grid = vec![CellGlyph::default(); width * height];

        for y in 0..height {
            for x in 0..width {
                let ripple = (x * 7 + y * 13) % 29 == 0;
                let (glyph, style) = self.palette.water_symbol(ripple);
                grid[y * width + x] = CellGlyph { ch: glyph, style };
            }
        }

        let extent = snapshot.world_half_extent.max(f32::MIN_POSITIVE);
        for drifter in &self.drifters {
            let u = ((drifter.position.x + extent) / (2.0 * extent)).clamp(0.0, 0.9999);
            let v = ((drifter.position.z + extent) / (2.0 * extent)).clamp(0.0, 0.9999);
            let x = (u * width as f32).floor() as usize;
            let y = (v * height as f32).floor() as usize;
            let idx = y * width + x;
            let glyph = if drifter.size >= 10.0 { 'F' } else { 'f' };
            let base = grid[idx].style;
            grid[idx] = CellGlyph {
                ch: glyph,
                style: self.palette.drifter_style(base),
            };
        }

        for dot in &snapshot.plankton {
            let x = (dot.position.0 * width as f32)
                .floor()
                .clamp(0.0, (width - 1) as f32) as usize;
            let y = (dot.position.1 * height as f32)
                .floor()
                .clamp(0.0, (height - 1) as f32) as usize;
            let idx = y * width + x;
            let base = grid[idx].style;
            let (glyph, style) =
                self.palette
                    .plankton_symbol(dot.depth_delta, snapshot.world_half_extent, base);
            grid[idx] = CellGlyph { ch: glyph, style };
        }

        let fish_x = (snapshot.fish_norm.0 * width as f32)
            .floor()
            .clamp(0.0, (width - 1) as f32) as usize;
        let fish_y = (snapshot.fish_norm.1 * height as f32)
            .floor()
            .clamp(0.0, (height - 1) as f32) as usize;
        let idx = fish_y * width + fish_x;
        let base = grid[idx].style;
        grid[idx] = CellGlyph {
            ch: Palette::heading_char(screen_heading(snapshot.fish.yaw)),
            style: self.palette.fish_style(snapshot.fish.velocity, base),
        };

        let mut lines = Vec::with_capacity(height);
        for y in 0..height {
            let mut spans = Vec::with_capacity(width);
            for x in 0..width {
                let cell = &grid[y * width + x];
                spans.push(Span::styled(cell.ch.to_string(), cell.style));
            }
            lines.push(Line::from(spans));
        }

        let paragraph = Paragraph::new(Text::from(lines));
        frame.render_widget(paragraph, inner);
    }

    fn draw_index_panel(&self, frame: &mut Frame<'_>, area: Rect, snapshot: &Snapshot) {
        let mut lines = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("Plankton ", self.palette.header_style()),
            Span::raw(format!("{:>5}", snapshot.plankton_count)),
            Span::raw("  "),
            Span::styled("Drifters ", self.palette.header_style()),
            Span::raw(format!("{:>3}", self.drifters.len())),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Nodes ", self.palette.header_style()),
            Span::raw(format!("{:>5}", snapshot.node_count)),
            Span::raw("  "),
            Span::styled("Depth ", self.palette.header_style()),
            Span::raw(format!("{:>3}", snapshot.tree_depth)),
        ]));
        lines.push(Line::from(vec![
            Span::styled("View ", self.palette.header_style()),
            Span::raw(format!(
                "fog {:>5.0}  far {:>5.0}",
                snapshot.fog_range, snapshot.view_range
            )),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Anchor ", self.palette.header_style()),
            Span::raw(format!(
                "({:>5.1}, {:>5.1}, {:>5.1})",
                snapshot.chase_anchor.x, snapshot.chase_anchor.y, snapshot.chase_anchor.z
            )),
        ]));

        let paragraph = Paragraph::new(Text::from(lines)).block(
            Block::default()
                .title(self.palette.title("Index & View"))
                .borders(Borders::ALL),
        );
        frame.render_widget(paragraph, area);
    }

    fn draw_events(&self, frame: &mut Frame<'_>, area: Rect, _snapshot: &Snapshot) {
        let events: Vec<ListItem> = self
            .event_log
            .iter()
            .rev()
            .map(|entry| {
                let style = self.palette.event_style(entry.kind);
                let text = format!("[t{:>6}] {}", entry.tick, entry.message);
                ListItem::new(Span::styled(text, style))
            })
            .collect();
        let block = Block::default()
            .title(self.palette.title("Recent Events"))
            .borders(Borders::ALL);
        frame.render_widget(List::new(events).block(block), area);
    }

    fn draw_help(&self, frame: &mut Frame<'_>) {
        let size = frame.area();
        let help_width = (size.width as f32 * 0.6).round() as u16;
        let help_height = 10;
        let help_x = size.x + (size.width - help_width) / 2;
        let help_y = size.y + (size.height - help_height) / 2;
        let area = Rect::new(help_x, help_y, help_width, help_height);

        let help_lines = vec![
            Line::from(vec![Span::styled(
                "Controls",
                self.palette.header_style().add_modifier(Modifier::BOLD),
            )]),
            Line::raw(" space     Thrust"),
            Line::raw(" w a s d   Pitch and turn (arrows too)"),
            Line::raw(" p         Toggle pause"),
            Line::raw(" + / -     Adjust speed"),
            Line::raw(" .         Single step"),
            Line::raw(" q / Esc   Quit"),
            Line::raw(" ?         Toggle this help"),
        ];

        let paragraph = Paragraph::new(help_lines).block(
            Block::default()
                .title(self.palette.title("Help"))
                .borders(Borders::ALL)
                .style(Style::default().bg(Color::Black).fg(Color::White)),
        );
        frame.render_widget(paragraph, area);
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        if self.tracker.observe(&key, Instant::now()) {
            return Ok(false);
        }
        if key.kind == KeyEventKind::Release {
            return Ok(false);
        }

        match (key.code, key.modifiers) {
            (KeyCode::Esc, _)
            | (KeyCode::Char('q'), _)
            | (KeyCode::Char('Q'), _)
            | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
                return Ok(true);
            }
            (KeyCode::Char('p') | KeyCode::Char('P'), _) => {
                self.paused = !self.paused;
                if self.paused {
                    self.speed_multiplier = 0.0;
                } else if self.speed_multiplier <= 0.0 {
                    self.speed_multiplier = 1.0;
                }
                self.push_event(
                    self.snapshot.tick,
                    EventKind::Info,
                    if self.paused {
                        "Simulation paused"
                    } else {
                        "Simulation resumed"
                    },
                );
            }
            (KeyCode::Char('+') | KeyCode::Char('='), _) => {
                self.speed_multiplier = (self.speed_multiplier + 0.5).clamp(0.5, 8.0);
                if self.speed_multiplier > 0.0 {
                    self.paused = false;
                }
                self.push_event(
                    self.snapshot.tick,
                    EventKind::Info,
                    format!("Speed x{:.1}", self.speed_multiplier),
                );
            }
            (KeyCode::Char('-') | KeyCode::Char('_'), _) => {
                self.speed_multiplier = (self.speed_multiplier - 0.5).max(0.0);
                if self.speed_multiplier <= 0.0 {
                    self.paused = true;
                }
                self.push_event(
                    self.snapshot.tick,
                    EventKind::Info,
                    if self.paused {
                        "Simulation paused".to_string()
                    } else {
                        format!("Speed x{:.1}", self.speed_multiplier)
                    },
                );
            }
            (KeyCode::Char('.'), _) => {
                let intent = self.tracker.snapshot(Instant::now());
                self.step_once(intent);
                self.paused = true;
                self.speed_multiplier = 0.0;
                self.push_event(self.snapshot.tick, EventKind::Info, "Single-step executed");
            }
            (KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::Char('H'), _) => {
                self.help_visible = !self.help_visible;
                self.push_event(
                    self.snapshot.tick,
                    EventKind::Info,
                    if self.help_visible {
                        "Help overlay opened"
                    } else {
                        "Help overlay closed"
                    },
                );
            }
            _ => {}
        }

        Ok(false)
    }

    fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    fn refresh_snapshot(&mut self) {
        let new_snapshot = match self.world.lock() {
            Ok(world) => Snapshot::from_world(&world),
            Err(_) => return,
        };
        self.ingest_events(&new_snapshot);
        self.snapshot = new_snapshot;
    }

    fn ingest_events(&mut self, new_snapshot: &Snapshot) {
        if new_snapshot.tick <= self.last_event_tick && new_snapshot.tick <= self.snapshot.tick {
            return;
        }

        if new_snapshot.tick > self.last_event_tick {
            let eaten = new_snapshot
                .consumed_total
                .saturating_sub(self.snapshot.consumed_total);
            if eaten > 0 {
                self.push_event(
                    new_snapshot.tick,
                    EventKind::Feeding,
                    format!("Ate {} plankton (size {:.0})", eaten, new_snapshot.fish.size),
                );
            }
        }

        self.last_event_tick = new_snapshot.tick;
    }

    fn push_event(&mut self, tick: u64, kind: EventKind, message: impl Into<String>) {
        if self.event_log.len() >= EVENT_LOG_CAPACITY {
            self.event_log.pop_front();
        }
        self.event_log.push_back(EventEntry {
            tick,
            kind,
            message: message.into(),
        });
    }
}

/// Decorative school scattered through the tank. Drifters never move or
/// feed; they only dress the map.
#[derive(Clone, Copy, Debug)]
struct Drifter {
    position: Point,
    size: f32,
}

impl Drifter {
    fn school(config: &MinnowConfig) -> Vec<Self> {
        let mut rng = SmallRng::seed_from_u64(config.rng_seed.unwrap_or(0xD1F7_E125));
        let extent = config.world_half_extent;
        (0..DRIFTER_COUNT)
            .map(|_| Self {
                position: Point::new(
                    rng.random_range(-extent..=extent),
                    rng.random_range(-extent..=extent),
                    rng.random_range(-extent..=extent),
                ),
                // Log-uniform sizes keep most drifters small with a few giants.
                size: rng.random_range(1.0_f32..4.0).exp(),
            })
            .collect()
    }
}

#[derive(Clone, Debug, Default)]
struct Snapshot {
    tick: u64,
    fish: Fish,
    fish_norm: (f32, f32),
    chase_anchor: Point,
    stride: f32,
    fog_range: f32,
    view_range: f32,
    plankton_count: usize,
    node_count: usize,
    tree_depth: usize,
    consumed_total: u64,
    world_half_extent: f32,
    history: Vec<HistoryEntry>,
    plankton: Vec<PlanktonDot>,
}

#[derive(Clone, Copy, Debug, Default)]
struct HistoryEntry {
    tick: u64,
    consumed: usize,
    size: f32,
    velocity: f32,
}

#[derive(Clone, Copy, Debug)]
struct PlanktonDot {
    position: (f32, f32),
    depth_delta: f32,
}

impl Snapshot {
    fn from_world(world: &WorldState) -> Self {
        let config = world.config();
        let extent = config.world_half_extent;
        let fish = *world.fish();

        let summaries: Vec<TickSummary> = world.history().copied().collect();
        let history: Vec<HistoryEntry> = summaries
            .iter()
            .rev()
            .take(HISTORY_WINDOW)
            .map(|entry| HistoryEntry {
                tick: entry.tick.0,
                consumed: entry.consumed,
                size: entry.size,
                velocity: entry.velocity,
            })
            .collect();

        let normalize = |value: f32| ((value + extent) / (2.0 * extent)).clamp(0.0, 0.9999);

        let mut plankton = Vec::with_capacity(world.plankton().len());
        world.plankton().for_each_point(|point| {
            plankton.push(PlanktonDot {
                position: (normalize(point.x), normalize(point.z)),
                depth_delta: (point.y - fish.position.y).abs(),
            });
        });

        Self {
            tick: world.tick().0,
            fish,
            fish_norm: (normalize(fish.position.x), normalize(fish.position.z)),
            chase_anchor: fish.chase_anchor(),
            stride: fish.velocity.powf(config.velocity_exponent),
            fog_range: 80.0 + 4.0 * fish.size,
            view_range: 100.0 + 4.0 * fish.size,
            plankton_count: world.plankton().len(),
            node_count: world.plankton().node_count(),
            tree_depth: world.plankton().depth(),
            consumed_total: world.consumed_total(),
            world_half_extent: extent,
            history,
            plankton,
        }
    }
}

#[derive(Clone, Debug)]
struct CellGlyph {
    ch: char,
    style: Style,
}

impl Default for CellGlyph {
    fn default() -> Self {
        Self {
            ch: ' ',
            style: Style::default(),
        }
    }
}

#[derive(Clone, Debug)]
struct EventEntry {
    tick: u64,
    message: String,
    kind: EventKind,
}

#[derive(Clone, Copy, Debug)]
enum EventKind {
    Feeding,
    Info,
}

/// Map the fish's yaw onto the screen plane, where east is +x and north
/// is -z.
fn screen_heading(yaw: f32) -> f32 {
    yaw.cos().atan2(-yaw.sin())
}

#[derive(Debug, Clone, Serialize)]
struct HeadlessReport {
    initial: FrameStats,
    frames: Vec<FrameStats>,
    summary: ReportSummary,
}

impl HeadlessReport {
    fn new(initial_snapshot: Snapshot) -> Self {
        Self {
            initial: FrameStats::from_snapshot(&initial_snapshot),
            frames: Vec::new(),
            summary: ReportSummary::default(),
        }
    }

    fn record(&mut self, snapshot: &Snapshot) {
        self.frames.push(FrameStats::from_snapshot(snapshot));
    }

    fn finalize(&mut self) {
        self.summary = ReportSummary::from(&self.initial, &self.frames);
    }

    fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self).context("failed to serialize headless report")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
struct FrameStats {
    tick: u64,
    plankton_count: usize,
    consumed_total: u64,
    fish_size: f32,
    fish_velocity: f32,
}

impl FrameStats {
    fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            tick: snapshot.tick,
            plankton_count: snapshot.plankton_count,
            consumed_total: snapshot.consumed_total,
            fish_size: snapshot.fish.size,
            fish_velocity: snapshot.fish.velocity,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
struct ReportSummary {
    frame_count: usize,
    ticks_simulated: u64,
    final_tick: u64,
    total_consumed: u64,
    final_size: f32,
    final_plankton_count: usize,
    velocity_mean: f32,
    velocity_min: f32,
    velocity_max: f32,
}

impl ReportSummary {
    fn from(initial: &FrameStats, frames: &[FrameStats]) -> Self {
        if frames.is_empty() {
            return Self {
                frame_count: 0,
                ticks_simulated: 0,
                final_tick: initial.tick,
                total_consumed: 0,
                final_size: initial.fish_size,
                final_plankton_count: initial.plankton_count,
                velocity_mean: initial.fish_velocity,
                velocity_min: initial.fish_velocity,
                velocity_max: initial.fish_velocity,
            };
        }

        let frame_count = frames.len();
        let final_stats = frames.last().expect("frame list not empty");
        let ticks_simulated = final_stats.tick.saturating_sub(initial.tick);
        let total_consumed = final_stats
            .consumed_total
            .saturating_sub(initial.consumed_total);

        let mut velocity_min = f32::INFINITY;
        let mut velocity_max = f32::NEG_INFINITY;
        let mut velocity_sum = 0.0_f32;
        for frame in frames {
            let velocity = frame.fish_velocity;
            if velocity < velocity_min {
                velocity_min = velocity;
            }
            if velocity > velocity_max {
                velocity_max = velocity;
            }
            velocity_sum += velocity;
        }

        Self {
            frame_count,
            ticks_simulated,
            final_tick: final_stats.tick,
            total_consumed,
            final_size: final_stats.fish_size,
            final_plankton_count: final_stats.plankton_count,
            velocity_mean: velocity_sum / frame_count as f32,
            velocity_min,
            velocity_max,
        }
    }
}

fn report_file_path_from_env() -> Option<PathBuf> {
    std::env::var_os("MINNOW_TERMINAL_HEADLESS_REPORT").and_then(|raw| {
        if raw.is_empty() {
            None
        } else {
            Some(PathBuf::from(raw))
        }
    })
}

struct Palette {
    level: Option<ColorLevel>,
}

impl Palette {
    fn detect() -> Self {
        Self {
            level: on_cached(Stream::Stdout),
        }
    }

    fn header_style(&self) -> Style {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    }

    fn accent_style(&self) -> Style {
        Style::default().fg(Color::LightMagenta)
    }

    fn paused_style(&self) -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    }

    fn running_style(&self) -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Green)
            .add_modifier(Modifier::BOLD)
    }

    fn speed_style(&self, speed: f32) -> Style {
        let color = if speed > 1.0 {
            Color::Yellow
        } else if speed <= 0.0 {
            Color::DarkGray
        } else {
            Color::LightCyan
        };
        Style::default().fg(color)
    }

    fn title<T: Into<String>>(&self, title: T) -> Span<'static> {
        Span::styled(title.into(), self.header_style())
    }

    fn consumed_spark_style(&self) -> Style {
        Style::default().fg(Color::Green)
    }

    fn velocity_spark_style(&self) -> Style {
        Style::default().fg(Color::Yellow)
    }

    fn event_style(&self, kind: EventKind) -> Style {
        let color = match kind {
            EventKind::Feeding => Color::Green,
            EventKind::Info => Color::Cyan,
        };
        Style::default().fg(color)
    }

    fn has_color(&self) -> bool {
        self.level.is_some()
    }

    fn rich_color(&self) -> bool {
        self.level
            .is_some_and(|level| level.has_16m || level.has_256)
    }

    fn water_symbol(&self, ripple: bool) -> (char, Style) {
        let glyph = if ripple { '~' } else { ' ' };
        let mut style = Style::default().fg(Color::Cyan);
        if self.has_color() {
            style = style.bg(if self.rich_color() {
                Color::Rgb(0, 40, 80)
            } else {
                Color::Blue
            });
        }
        if ripple {
            style = style.add_modifier(Modifier::DIM);
        }
        (glyph, style)
    }

    /// Dot weight falls off with vertical distance from the fish, standing
    /// in for depth on a flat map.
    fn plankton_symbol(&self, depth_delta: f32, half_extent: f32, base: Style) -> (char, Style) {
        let near = half_extent / 8.0;
        let mid = half_extent / 3.0;
        if depth_delta < near {
            (
                '•',
                base.fg(Color::LightGreen).add_modifier(Modifier::BOLD),
            )
        } else if depth_delta < mid {
            ('·', base.fg(Color::Green))
        } else {
            ('.', base.fg(Color::Green).add_modifier(Modifier::DIM))
        }
    }

    fn drifter_style(&self, base: Style) -> Style {
        let color = if self.rich_color() {
            Color::Rgb(120, 160, 200)
        } else {
            Color::Gray
        };
        base.fg(color)
    }

    fn fish_style(&self, velocity: f32, base: Style) -> Style {
        let mut style = base.fg(Color::Yellow).add_modifier(Modifier::BOLD);
        if velocity > 0.5 {
            style = style.add_modifier(Modifier::REVERSED);
        }
        style
    }

    fn heading_char(heading: f32) -> char {
        let normalized = heading.rem_euclid(TAU);
        let sector = ((normalized / (PI / 4.0)).round() as i32) & 7;
        match sector {
            0 => '→',
            1 => '↗',
            2 => '↑',
            3 => '↖',
            4 => '←',
            5 => '↙',
            6 => '↓',
            _ => '↘',
        }
    }
}
