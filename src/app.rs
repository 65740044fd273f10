use energy_atlas::config::AtlasConfig;
use energy_atlas::data::{DataPaths, Datasets, Metric};
use energy_atlas::drilldown::DrillDown;
use energy_atlas::formula::Formula;
use energy_atlas::join::{resolve, RecordKeys};
use energy_atlas::map::{MapRenderer, Viewport};
use energy_atlas::project::{describe, Snapshot};
use energy_atlas::scale::{hex_rgb, ColorScale, Rgb};
use energy_atlas::stepper::{Event, Stepper, ViewState};
use energy_atlas::treemap::{aggregate, TreemapNode};
use glam::DVec2;
use log::{debug, warn};
use std::time::Instant;

/// What the keyboard currently drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Map,
    Formula,
}

/// Application state
pub struct App {
    pub paths: DataPaths,
    pub datasets: Datasets,
    /// `(country, year)` positions into `datasets`, built once at startup
    keys: RecordKeys,
    pub viewport: Viewport,
    pub map_renderer: MapRenderer,
    pub stepper: Stepper,
    pub mode: Mode,
    pub should_quit: bool,
    /// Projection of the rendered (year, metric)
    pub snapshot: Snapshot,
    /// Fill per world feature
    pub fills: Vec<Option<Rgb>>,
    pub treemap: TreemapNode,
    pub drilldown: Option<DrillDown>,
    /// Fill per drill-down city cell
    pub cell_fills: Vec<Option<Rgb>>,
    pub formulas: Vec<Formula>,
    pub formula_input: String,
    /// Last error or notice for the status bar
    pub status: Option<String>,
    /// Last mouse position for drag tracking
    pub last_mouse: Option<(u16, u16)>,
    /// Whether the current press has moved
    pub dragged: bool,
    /// Current mouse position for cursor marker
    pub mouse_pos: Option<(u16, u16)>,
    /// Key of what `snapshot`, `fills` and `treemap` were built for
    rendered: Option<(i32, Metric, usize)>,
    drill_rendered: Option<(i32, Metric)>,
}

impl App {
    pub fn new(config: &AtlasConfig, datasets: Datasets, width: usize, height: usize) -> Self {
        let (pixel_width, pixel_height) = map_pixels(width, height);
        let state = ViewState::new(config.metric, config.top_n);
        let year = state.year();
        let map_renderer = MapRenderer::new(&datasets.world);
        let keys = RecordKeys::new(&datasets.energy, &datasets.yearly_weather, &datasets.meta);
        if !map_renderer.has_data() {
            warn!("World map has no polygons");
        }

        let mut app = Self {
            paths: config.paths(),
            viewport: Viewport::world(pixel_width, pixel_height),
            map_renderer,
            stepper: Stepper::new(state, config.tick_interval),
            mode: Mode::Map,
            should_quit: false,
            snapshot: Snapshot {
                year,
                metric: config.metric,
                scale: ColorScale::placeholder(),
                values: Vec::new(),
            },
            fills: Vec::new(),
            treemap: aggregate(&[], &[], config.metric, config.top_n),
            drilldown: None,
            cell_fills: Vec::new(),
            formulas: Vec::new(),
            formula_input: String::new(),
            status: None,
            last_mouse: None,
            dragged: false,
            mouse_pos: None,
            rendered: None,
            drill_rendered: None,
            keys,
            datasets,
        };
        app.refresh();
        app
    }

    pub fn state(&self) -> &ViewState {
        self.stepper.state()
    }

    /// Queue a view event and apply it right away
    pub fn dispatch(&mut self, event: Event) {
        self.stepper.dispatch(event);
        self.tick(Instant::now());
    }

    /// Drive the animation timer; rebuilds derived views on change
    pub fn tick(&mut self, now: Instant) {
        if self.stepper.update(now) {
            self.refresh();
        }
    }

    /// Rebuild whatever the current view state invalidated
    fn refresh(&mut self) {
        let state = self.stepper.state().clone();
        let key = (state.year(), state.metric, state.top_n);
        if self.rendered != Some(key) {
            let index = self
                .keys
                .bind(&self.datasets.energy, &self.datasets.yearly_weather, &self.datasets.meta);
            let frames = resolve(&self.datasets.world, &index, state.year());
            self.snapshot = Snapshot::build(&frames, state.year(), state.metric);
            self.fills = self.snapshot.fills().into_iter().map(hex_rgb).collect();
            self.treemap = aggregate(&frames, &self.datasets.meta, state.metric, state.top_n);
            debug!(
                "{} {}: {} of {} countries with data",
                state.metric,
                state.year(),
                self.snapshot.with_data(),
                frames.len()
            );
            self.rendered = Some(key);
        }
        self.sync_drilldown(&state);
    }

    fn sync_drilldown(&mut self, state: &ViewState) {
        let open = self.drilldown.as_ref().map(|d| d.country.as_str());
        if open != state.selected.as_deref() {
            self.drilldown = None;
            self.drill_rendered = None;
            if let Some(country) = state.selected.as_deref() {
                self.open_drilldown(country);
            }
        }
        if let Some(drill) = &self.drilldown {
            let key = (state.year(), state.metric);
            if self.drill_rendered != Some(key) {
                self.cell_fills = drill.cell_fills(&self.datasets.stations, state.year(), state.metric);
                self.drill_rendered = Some(key);
            }
        }
    }

    fn open_drilldown(&mut self, country: &str) {
        let (w, h) = (self.viewport.width as f64, self.viewport.height as f64);
        match DrillDown::open(&self.paths, &self.datasets, country, w, h) {
            Ok(drill) => {
                self.status = None;
                self.drilldown = Some(drill);
            }
            Err(e) => {
                warn!("{e}");
                self.status = Some(e.to_string());
                // The failed view closes; the world map stays usable
                self.stepper.dispatch(Event::CloseDrillDown);
            }
        }
    }

    /// Update viewport size when terminal resizes
    pub fn resize(&mut self, width: usize, height: usize) {
        let (pixel_width, pixel_height) = map_pixels(width, height);
        self.viewport.width = pixel_width;
        self.viewport.height = pixel_height;
        if let Some(drill) = self.drilldown.take() {
            let relaid = DrillDown::from_geometry(
                &drill.country,
                drill.outline,
                &self.datasets.cities,
                pixel_width as f64,
                pixel_height as f64,
            );
            self.drilldown = relaid.ok();
            self.drill_rendered = None;
            let state = self.stepper.state().clone();
            self.sync_drilldown(&state);
        }
    }

    /// Pan the map
    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.viewport.pan(dx, dy);
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
    }

    pub fn next_metric(&mut self) {
        self.dispatch(Event::SetMetric(self.state().metric.next()));
    }

    pub fn prev_metric(&mut self) {
        self.dispatch(Event::SetMetric(self.state().metric.prev()));
    }

    pub fn adjust_top_n(&mut self, delta: isize) {
        let n = self.state().top_n.saturating_add_signed(delta);
        self.dispatch(Event::SetTopN(n));
    }

    /// Esc: leave the drill-down, or quit from the world map
    pub fn back(&mut self) {
        if self.state().selected.is_some() {
            self.dispatch(Event::CloseDrillDown);
        } else {
            self.quit();
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Open the drill-down for the country under a terminal cell
    pub fn select_at(&mut self, col: u16, row: u16) {
        if self.drilldown.is_some() {
            return;
        }
        let (px, py) = cell_to_pixel(col, row);
        let (lon, lat) = self.viewport.unproject(px, py);
        if let Some(idx) = self.map_renderer.pick(&self.datasets.world, lon, lat) {
            let name = self.datasets.world[idx].name.clone();
            self.dispatch(Event::Select(name));
        }
    }

    /// Open the drill-down for the country under the viewport center
    pub fn select_center(&mut self) {
        let (lon, lat) = (self.viewport.center_lon, self.viewport.center_lat);
        if let Some(idx) = self.map_renderer.pick(&self.datasets.world, lon, lat) {
            let name = self.datasets.world[idx].name.clone();
            self.dispatch(Event::Select(name));
        }
    }

    pub fn begin_formula(&mut self) {
        self.mode = Mode::Formula;
        self.formula_input.clear();
    }

    pub fn cancel_formula(&mut self) {
        self.mode = Mode::Map;
        self.formula_input.clear();
    }

    /// Parse the typed formula. A bad formula is reported and the input kept
    /// for editing.
    pub fn submit_formula(&mut self) {
        match Formula::parse(&self.formula_input) {
            Ok(formula) => {
                self.status = Some(format!("Added formula {formula}"));
                self.formulas.push(formula);
                self.cancel_formula();
            }
            Err(e) => self.status = Some(format!("Error in formula: {e}")),
        }
    }

    pub fn remove_last_formula(&mut self) {
        self.formulas.pop();
    }

    /// Hover text for whatever is under the mouse
    pub fn hover_text(&self) -> Option<String> {
        let (col, row) = self.mouse_pos?;
        let (px, py) = cell_to_pixel(col, row);
        if let Some(drill) = &self.drilldown {
            let idx = drill.city_at(DVec2::new(px as f64, py as f64))?;
            return Some(format!("City: {}", drill.cities[idx].name));
        }
        let (lon, lat) = self.viewport.unproject(px, py);
        let idx = self.map_renderer.pick(&self.datasets.world, lon, lat)?;
        let projected = *self.snapshot.values.get(idx)?;
        Some(describe(&self.datasets.world[idx].name, self.snapshot.metric, projected))
    }

    /// Get current zoom level as a string
    pub fn zoom_level(&self) -> String {
        format!("{:.0}x", self.viewport.zoom)
    }

    /// Get current center coordinates as a string
    pub fn center_coords(&self) -> String {
        format!(
            "{:.1}°{}, {:.1}°{}",
            self.viewport.center_lat.abs(),
            if self.viewport.center_lat >= 0.0 { "N" } else { "S" },
            self.viewport.center_lon.abs(),
            if self.viewport.center_lon >= 0.0 { "E" } else { "W" }
        )
    }

    /// Handle mouse drag
    pub fn handle_drag(&mut self, x: u16, y: u16) {
        if let Some((last_x, last_y)) = self.last_mouse {
            let dx = last_x as i32 - x as i32;
            let dy = last_y as i32 - y as i32;
            // Scale based on zoom: less sensitive when zoomed out
            let scale = if self.viewport.zoom < 2.0 {
                2
            } else if self.viewport.zoom < 4.0 {
                3
            } else {
                4
            };
            self.pan(dx * scale, dy * scale);
            self.dragged = true;
        }
        self.last_mouse = Some((x, y));
    }

    /// Reset drag state when mouse button released
    pub fn end_drag(&mut self) {
        self.last_mouse = None;
        self.dragged = false;
    }

    pub fn set_mouse_pos(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
    }

    /// Get mouse position in braille pixel coordinates (for rendering marker)
    pub fn mouse_pixel_pos(&self) -> Option<(i32, i32)> {
        self.mouse_pos.map(|(col, row)| cell_to_pixel(col, row))
    }
}

/// Braille pixel size of the map pane: the left two thirds of the terminal
/// inside a border, above the status bar
pub fn map_pixels(width: usize, height: usize) -> (usize, usize) {
    let inner_width = (width * 2 / 3).saturating_sub(2);
    let inner_height = height.saturating_sub(3);
    (inner_width * 2, inner_height * 4)
}

/// Terminal cell to braille pixel, accounting for the 1-cell border
fn cell_to_pixel(col: u16, row: u16) -> (i32, i32) {
    let px = (col.saturating_sub(1) as i32) * 2;
    let py = (row.saturating_sub(1) as i32) * 4;
    (px, py)
}
