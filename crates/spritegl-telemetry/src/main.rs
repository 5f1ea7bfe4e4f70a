//! spritegl-telemetry — TUI dashboard for a running spritegl demo.
//!
//! Listens for the JSON datagrams the demo sends on UDP `127.0.0.1:9100`
//! (built with the `diagnostics` feature) and draws frame timing and batch
//! statistics with ratatui.
//!
//! Start the demo, then run `cargo run -p spritegl-telemetry`.

use std::collections::VecDeque;
use std::io;
use std::net::UdpSocket;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Sparkline};
use ratatui::Terminal;
use serde::Deserialize;

const LISTEN_ADDR: &str = "127.0.0.1:9100";
const HISTORY_CAP: usize = 600;

// ── Wire type (must match spritegl's diag snapshot) ─────────────────────

#[derive(Deserialize, Clone, Default, Debug, PartialEq)]
struct DiagSnapshot {
    fps: f32,
    smoothed_fps: f32,
    delta_ms: f32,
    frame_count: u64,
    elapsed_secs: f32,
    sprites: usize,
    draw_calls: u32,
    instances: u32,
    capacity: usize,
}

impl DiagSnapshot {
    /// How full the last batch window was, in `[0, 1]`.
    fn batch_fill(&self) -> f64 {
        if self.capacity == 0 || self.draw_calls == 0 {
            return 0.0;
        }
        let slots = self.capacity as f64 * self.draw_calls as f64;
        (self.instances as f64 / slots).clamp(0.0, 1.0)
    }
}

// ── App state ───────────────────────────────────────────────────────────

struct App {
    latest: DiagSnapshot,
    fps_history: VecDeque<u64>,
    draw_history: VecDeque<u64>,
    sprite_history: VecDeque<u64>,
    paused: bool,
    connected: bool,
}

impl App {
    fn new() -> Self {
        Self {
            latest: DiagSnapshot::default(),
            fps_history: VecDeque::with_capacity(HISTORY_CAP),
            draw_history: VecDeque::with_capacity(HISTORY_CAP),
            sprite_history: VecDeque::with_capacity(HISTORY_CAP),
            paused: false,
            connected: false,
        }
    }

    fn push_snapshot(&mut self, snap: DiagSnapshot) {
        if self.paused {
            return;
        }
        push_capped(&mut self.fps_history, snap.fps.round().max(0.0) as u64);
        push_capped(&mut self.draw_history, snap.draw_calls as u64);
        push_capped(&mut self.sprite_history, snap.sprites as u64);
        self.latest = snap;
        self.connected = true;
    }
}

fn push_capped(history: &mut VecDeque<u64>, value: u64) {
    if history.len() >= HISTORY_CAP {
        history.pop_front();
    }
    history.push_back(value);
}

fn main() -> io::Result<()> {
    let socket = UdpSocket::bind(LISTEN_ADDR).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("cannot bind {LISTEN_ADDR} (is another spritegl-telemetry running?): {e}"),
        )
    })?;
    socket.set_nonblocking(true)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new();
    let mut buf = [0u8; 65536];

    loop {
        // Drain all pending datagrams.
        while let Ok(n) = socket.recv(&mut buf) {
            if let Ok(snap) = serde_json::from_slice::<DiagSnapshot>(&buf[..n]) {
                app.push_snapshot(snap);
            }
        }

        terminal.draw(|f| ui(f, &app))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if handle_key(&mut app, key) {
                    break;
                }
            }
        }
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Returns `true` if the app should quit.
fn handle_key(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => true,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => true,
        KeyCode::Char('p') => {
            app.paused = !app.paused;
            false
        }
        _ => false,
    }
}

// ── Drawing ─────────────────────────────────────────────────────────────

fn ui(f: &mut ratatui::Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(6),    // sparklines
            Constraint::Length(3), // batch fill
            Constraint::Length(3), // render stats
            Constraint::Length(1), // help bar
        ])
        .split(f.area());

    draw_header(f, app, chunks[0]);
    draw_sparklines(f, app, chunks[1]);
    draw_batch_fill(f, app, chunks[2]);
    draw_render_panel(f, app, chunks[3]);
    draw_help_bar(f, chunks[4]);
}

fn draw_header(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let s = &app.latest;
    let (status, status_color) = if app.paused {
        (" PAUSED ", Color::Yellow)
    } else if app.connected {
        (" LIVE ", Color::Green)
    } else {
        (" WAITING ", Color::DarkGray)
    };

    let label = Style::default().fg(Color::DarkGray);
    let value = Style::default().fg(Color::White);
    let text = Line::from(vec![
        Span::styled(format!(" {status} "), Style::default().bg(status_color).fg(Color::Black)),
        Span::raw("  "),
        Span::styled("FPS: ", label),
        Span::styled(
            format!("{:.1}", s.fps),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" (~{:.1})", s.smoothed_fps), label),
        Span::raw("  |  "),
        Span::styled("Frame: ", label),
        Span::styled(s.frame_count.to_string(), value),
        Span::raw("  |  "),
        Span::styled("\u{0394}: ", label),
        Span::styled(format!("{:.1}ms", s.delta_ms), value),
        Span::raw("  |  "),
        Span::styled("Up: ", label),
        Span::styled(format_uptime(s.elapsed_secs), value),
    ]);

    let block = Block::default()
        .title(" spritegl-telemetry ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    f.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_sparklines(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(30),
            Constraint::Percentage(30),
        ])
        .split(area);

    draw_history(f, chunks[0], " FPS History ", &app.fps_history, Color::Green);
    draw_history(f, chunks[1], " Draw Calls ", &app.draw_history, Color::Yellow);
    draw_history(f, chunks[2], " Sprites ", &app.sprite_history, Color::Magenta);
}

fn draw_history(f: &mut ratatui::Frame, area: Rect, title: &str, history: &VecDeque<u64>, color: Color) {
    let data: Vec<u64> = history.iter().copied().collect();
    let (min, avg, max) = stats(&data);
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let inner = block.inner(area);
    f.render_widget(block, area);
    if inner.height < 2 {
        return;
    }
    let spark_area = Rect { height: inner.height - 1, ..inner };
    let stats_area = Rect {
        y: inner.y + inner.height - 1,
        height: 1,
        ..inner
    };
    f.render_widget(Sparkline::default().data(&data).style(Style::default().fg(color)), spark_area);
    let stats_text = Line::from(Span::styled(
        format!("min: {min:.0}  avg: {avg:.0}  max: {max:.0}"),
        Style::default().fg(Color::DarkGray),
    ));
    f.render_widget(Paragraph::new(stats_text), stats_area);
}

fn draw_batch_fill(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let fill = app.latest.batch_fill();
    let gauge = Gauge::default()
        .block(
            Block::default()
                .title(" Batch Fill ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(fill)
        .label(format!("{:.0}% of {} slots per draw", fill * 100.0, app.latest.capacity));
    f.render_widget(gauge, area);
}

fn draw_render_panel(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let s = &app.latest;
    let label = Style::default().fg(Color::DarkGray);
    let value = Style::default().fg(Color::White);
    let text = Line::from(vec![
        Span::styled("  Sprites: ", label),
        Span::styled(s.sprites.to_string(), value),
        Span::raw("  |  "),
        Span::styled("Draw calls: ", label),
        Span::styled(s.draw_calls.to_string(), value),
        Span::raw("  |  "),
        Span::styled("Instances: ", label),
        Span::styled(s.instances.to_string(), value),
        Span::raw("  |  "),
        Span::styled("Capacity: ", label),
        Span::styled(s.capacity.to_string(), value),
    ]);

    let block = Block::default()
        .title(" Render ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    f.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_help_bar(f: &mut ratatui::Frame, area: Rect) {
    let key = Style::default().fg(Color::Cyan);
    let help = Line::from(vec![
        Span::styled(" [p]", key),
        Span::raw(" pause  "),
        Span::styled("[q]", key),
        Span::raw(" quit"),
    ]);
    f.render_widget(Paragraph::new(help), area);
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn stats(data: &[u64]) -> (f64, f64, f64) {
    let (Some(min), Some(max)) = (data.iter().min(), data.iter().max()) else {
        return (0.0, 0.0, 0.0);
    };
    let avg = data.iter().sum::<u64>() as f64 / data.len() as f64;
    (*min as f64, avg, *max as f64)
}

fn format_uptime(secs: f32) -> String {
    let total = secs as u64;
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    if h > 0 {
        format!("{h}h{m}m{s}s")
    } else if m > 0 {
        format!("{m}m{s}s")
    } else {
        format!("{secs:.1}s")
    }
}
