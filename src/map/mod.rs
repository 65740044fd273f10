mod geometry;
pub mod projection;
mod renderer;
mod spatial;
pub mod voronoi;

pub use projection::{FitProjection, Viewport};
pub use renderer::{render_drilldown, MapLayers, MapRenderer};
