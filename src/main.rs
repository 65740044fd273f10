mod app;
mod ui;

use anyhow::{Context, Result};
use app::{App, Mode};
use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::execute;
use energy_atlas::config::AtlasConfig;
use energy_atlas::data::{load_all, Datasets, Metric};
use energy_atlas::stepper::Event as ViewEvent;
use log::info;
use ratatui::DefaultTerminal;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Redraw cadence while idle
const FRAME: Duration = Duration::from_millis(16);

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Directory holding map/ and data/
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,
    /// Animation step (milliseconds)
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,
    /// Countries kept in the treemap
    #[arg(long, default_value_t = 10)]
    top_n: usize,
    /// Metric shown at startup
    #[arg(long, default_value = "population")]
    metric: Metric,
    /// Verbosity
    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

impl Args {
    fn config(&self) -> AtlasConfig {
        AtlasConfig {
            data_dir: self.data_dir.clone(),
            tick_interval: Duration::from_millis(self.interval_ms.max(1)),
            top_n: self.top_n.max(1),
            metric: self.metric,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    pretty_env_logger::formatted_timed_builder()
        .filter_level(args.verbose.log_level_filter())
        .init();
    let config = args.config();

    // Everything loads before the first frame; a missing file aborts here
    let datasets = load_all(&config.paths())
        .with_context(|| format!("loading data from {}", config.data_dir.display()))?;

    let mut terminal = ratatui::init();
    terminal.clear()?;
    execute!(std::io::stdout(), EnableMouseCapture)?;

    let result = run(&mut terminal, &config, datasets);

    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    result
}

fn run(terminal: &mut DefaultTerminal, config: &AtlasConfig, datasets: Datasets) -> Result<()> {
    let size = terminal.size()?;
    let mut app = App::new(config, datasets, size.width as usize, size.height as usize);
    info!("Starting at {} {}", app.state().metric, app.state().year());

    loop {
        terminal.draw(|frame| ui::render(frame, &app))?;

        if event::poll(FRAME)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match app.mode {
                    Mode::Map => handle_map_key(&mut app, key),
                    Mode::Formula => handle_formula_key(&mut app, key),
                },
                Event::Mouse(mouse) => handle_mouse(&mut app, mouse),
                Event::Resize(width, height) => app.resize(width as usize, height as usize),
                _ => {}
            }
        }

        app.tick(Instant::now());

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn handle_map_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Esc => app.back(),

        // Timeline
        KeyCode::Char(' ') => app.dispatch(ViewEvent::TogglePlay),
        KeyCode::Char(',') | KeyCode::Char('<') => app.dispatch(ViewEvent::StepYear(-1)),
        KeyCode::Char('.') | KeyCode::Char('>') => app.dispatch(ViewEvent::StepYear(1)),

        // Metric and treemap size
        KeyCode::Char('m') => app.next_metric(),
        KeyCode::Char('M') => app.prev_metric(),
        KeyCode::Char('[') => app.adjust_top_n(-1),
        KeyCode::Char(']') => app.adjust_top_n(1),

        // Pan with hjkl or arrow keys
        KeyCode::Left | KeyCode::Char('h') => app.pan(-10, 0),
        KeyCode::Right | KeyCode::Char('l') => app.pan(10, 0),
        KeyCode::Up | KeyCode::Char('k') => app.pan(0, -6),
        KeyCode::Down | KeyCode::Char('j') => app.pan(0, 6),

        // Zoom
        KeyCode::Char('+') | KeyCode::Char('=') => app.zoom_in(),
        KeyCode::Char('-') | KeyCode::Char('_') => app.zoom_out(),

        KeyCode::Enter => app.select_center(),

        // Formulas
        KeyCode::Char('f') => app.begin_formula(),
        KeyCode::Char('x') => app.remove_last_formula(),

        // Layer toggles
        KeyCode::Char('b') | KeyCode::Char('B') => app.map_renderer.toggle_borders(),
        KeyCode::Char('F') => app.map_renderer.toggle_fill(),

        _ => {}
    }
}

fn handle_formula_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.cancel_formula(),
        KeyCode::Enter => app.submit_formula(),
        KeyCode::Backspace => {
            app.formula_input.pop();
        }
        KeyCode::Char(c) => app.formula_input.push(c),
        _ => {}
    }
}

/// Handle mouse events for selection, panning and zooming
fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    // Always track mouse position for cursor marker and hover text
    app.set_mouse_pos(mouse.column, mouse.row);

    match mouse.kind {
        MouseEventKind::ScrollUp => app.zoom_in(),
        MouseEventKind::ScrollDown => app.zoom_out(),
        // Horizontal scroll for panning (trackpad two-finger swipe)
        MouseEventKind::ScrollLeft => app.pan(-15, 0),
        MouseEventKind::ScrollRight => app.pan(15, 0),
        MouseEventKind::Down(MouseButton::Left) => {
            app.last_mouse = Some((mouse.column, mouse.row));
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            app.handle_drag(mouse.column, mouse.row);
        }
        MouseEventKind::Up(MouseButton::Left) => {
            // A press released without dragging is a click
            if app.last_mouse.is_some() && !app.dragged {
                app.select_at(mouse.column, mouse.row);
            }
            app.end_drag();
        }
        _ => {}
    }
}
