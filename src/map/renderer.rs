use crate::braille::BrailleCanvas;
use crate::data::features::Ring;
use crate::data::GeoFeature;
use crate::drilldown::DrillDown;
use crate::map::geometry::{draw_circle, draw_ring, fill_polygon, fill_polygon_where, point_in_rings};
use crate::map::projection::Viewport;
use crate::map::spatial::FeatureGrid;
use crate::scale::Rgb;
use glam::DVec2;

/// Grid cell size for country picking, in degrees
const PICK_CELL_DEGREES: f64 = 10.0;

/// Display settings for map layers
#[derive(Clone)]
pub struct DisplaySettings {
    pub show_fill: bool,
    pub show_borders: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_fill: true,
            show_borders: true,
        }
    }
}

/// Separate canvases so the UI can color borders apart from fills
pub struct MapLayers {
    pub fill: BrailleCanvas,
    pub borders: BrailleCanvas,
}

impl MapLayers {
    fn new(width: usize, height: usize) -> Self {
        Self {
            fill: BrailleCanvas::new(width, height),
            borders: BrailleCanvas::new(width, height),
        }
    }
}

/// Choropleth renderer over the world features
pub struct MapRenderer {
    /// Rings per feature, index-aligned with the feature list
    rings: Vec<Vec<Ring>>,
    grid: FeatureGrid,
    pub settings: DisplaySettings,
}

impl MapRenderer {
    pub fn new(features: &[GeoFeature]) -> Self {
        let rings: Vec<Vec<Ring>> = features.iter().map(GeoFeature::rings).collect();
        let grid = FeatureGrid::build(
            features.iter().enumerate().filter_map(|(i, f)| f.bbox().map(|b| (i, b))),
            PICK_CELL_DEGREES,
        );
        Self {
            rings,
            grid,
            settings: DisplaySettings::default(),
        }
    }

    pub fn has_data(&self) -> bool {
        self.rings.iter().any(|r| !r.is_empty())
    }

    /// Feature under a geographic point. Candidates come from the grid and
    /// are confirmed with an exact even-odd test.
    pub fn pick(&self, features: &[GeoFeature], lon: f64, lat: f64) -> Option<usize> {
        self.grid
            .query_point(lon, lat)
            .iter()
            .copied()
            .find(|&i| features.get(i).is_some_and(|f| f.contains(lon, lat)))
    }

    /// Fill every country with its color, then draw borders.
    /// `fills` is index-aligned with the features.
    pub fn render(&self, width: usize, height: usize, viewport: &Viewport, fills: &[Option<Rgb>]) -> MapLayers {
        let mut layers = MapLayers::new(width, height);
        let max_jump = viewport.width as f64 / 2.0;

        for (idx, feature_rings) in self.rings.iter().enumerate() {
            let projected: Vec<Vec<DVec2>> = feature_rings
                .iter()
                .map(|ring| {
                    ring.iter()
                        .map(|&(lon, lat)| {
                            let (x, y) = viewport.project_f(lon, lat);
                            DVec2::new(x, y)
                        })
                        .collect()
                })
                .collect();
            if !projected.iter().flatten().any(|p| viewport.is_visible(p.x as i32, p.y as i32)) {
                continue;
            }

            if self.settings.show_fill {
                if let Some(color) = fills.get(idx).copied().flatten() {
                    // Rings that wrap the antimeridian would smear across the map
                    let fillable: Vec<Vec<DVec2>> = projected
                        .iter()
                        .filter(|ring| !wraps(ring, max_jump))
                        .cloned()
                        .collect();
                    fill_polygon(&mut layers.fill, &fillable, color);
                }
            }
            if self.settings.show_borders {
                for ring in &projected {
                    draw_ring(&mut layers.borders, ring, max_jump);
                }
            }
        }
        layers
    }

    pub fn toggle_fill(&mut self) {
        self.settings.show_fill = !self.settings.show_fill;
    }

    pub fn toggle_borders(&mut self) {
        self.settings.show_borders = !self.settings.show_borders;
    }
}

fn wraps(ring: &[DVec2], max_jump: f64) -> bool {
    ring.windows(2).any(|w| (w[1].x - w[0].x).abs() > max_jump)
}

/// Drill-down view: Voronoi cells clipped to the country outline, the
/// outline itself and city markers. The drill-down must have been laid out
/// for this canvas' pixel size.
pub fn render_drilldown(width: usize, height: usize, drill: &DrillDown, fills: &[Option<Rgb>]) -> MapLayers {
    let mut layers = MapLayers::new(width, height);
    let outline = drill.outline_px();

    for (cell, color) in drill.cells.iter().zip(fills) {
        let Some(color) = *color else { continue };
        if cell.is_empty() {
            continue;
        }
        fill_polygon_where(&mut layers.fill, std::slice::from_ref(&cell.polygon), color, |p| {
            point_in_rings(&outline, p)
        });
    }
    for ring in &outline {
        draw_ring(&mut layers.borders, ring, f64::INFINITY);
    }
    for cell in drill.cells.iter().filter(|c| !c.is_empty()) {
        draw_ring(&mut layers.borders, &cell.polygon, f64::INFINITY);
    }
    for p in &drill.points {
        draw_circle(&mut layers.borders, p.x as i32, p.y as i32, 1);
    }
    layers
}
