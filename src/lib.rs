//! Energy and weather atlas: joins per-country yearly panels to world
//! geometry and projects them into choropleth colors, a continent/region
//! treemap, Voronoi drill-downs and user formulas.

pub mod braille;
pub mod config;
pub mod data;
pub mod drilldown;
pub mod error;
pub mod formula;
pub mod join;
pub mod map;
pub mod project;
pub mod scale;
pub mod stepper;
pub mod treemap;
