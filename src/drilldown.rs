//! Per-country detail view: city Voronoi cells over the country outline,
//! plus the yearly series behind the line, bar and formula plots.

use crate::data::features::{collect_rings, Ring};
use crate::data::{
    load_features, CityRecord, CountryYearRecord, DataPaths, Datasets, GeoFeature, Metric, MetricKind,
    MetricSource, StationYearRecord, WeatherYearRecord,
};
use crate::error::DrillDownError;
use crate::formula::{self, Formula};
use crate::map::projection::FitProjection;
use crate::map::voronoi::{partition, Rect, VoronoiCell};
use crate::scale::{hex_rgb, hsl_rgb, ColorScale, Rgb};
use glam::DVec2;
use log::{debug, info};
use std::collections::HashMap;

/// Temperature hue: 30 °C and above is orange-red, -30 °C and below blue
pub fn temperature_hue(celsius: f64) -> f64 {
    30.0 + 240.0 * (30.0 - celsius) / 60.0
}

/// The open detail view of one country
#[derive(Debug, Clone)]
pub struct DrillDown {
    pub country: String,
    pub outline: Vec<Ring>,
    pub cities: Vec<CityRecord>,
    /// City positions in view pixels, index-aligned with `cities`
    pub points: Vec<DVec2>,
    /// Voronoi cell per city, index-aligned with `cities`
    pub cells: Vec<VoronoiCell>,
    pub bounds: Rect,
    projection: FitProjection,
}

impl DrillDown {
    /// Load `map/countries/<name>.json` and lay the country's cities out in a
    /// `width` x `height` view. Failures only affect this view.
    pub fn open(
        paths: &DataPaths,
        datasets: &Datasets,
        country: &str,
        width: f64,
        height: f64,
    ) -> Result<Self, DrillDownError> {
        let path = paths.detail(country);
        let features = load_features(&path).map_err(|source| DrillDownError::Detail {
            country: country.to_string(),
            source,
        })?;
        let drill = Self::from_features(country, &features, &datasets.cities, width, height)?;
        info!(
            "Opened {} with {} cities from {}",
            country,
            drill.cities.len(),
            path.display()
        );
        Ok(drill)
    }

    pub fn from_features(
        country: &str,
        features: &[GeoFeature],
        cities: &[CityRecord],
        width: f64,
        height: f64,
    ) -> Result<Self, DrillDownError> {
        let mut outline = Vec::new();
        for geometry in features.iter().filter_map(|f| f.geometry.as_ref()) {
            collect_rings(geometry, &mut outline);
        }
        Self::from_geometry(country, outline, cities, width, height)
    }

    pub fn from_geometry(
        country: &str,
        outline: Vec<Ring>,
        cities: &[CityRecord],
        width: f64,
        height: f64,
    ) -> Result<Self, DrillDownError> {
        let projection = FitProjection::fit(width, height, outline.iter().flatten().copied())
            .ok_or_else(|| DrillDownError::EmptyGeometry(country.to_string()))?;
        let cities: Vec<CityRecord> = cities.iter().filter(|c| c.country == country).cloned().collect();
        let points: Vec<DVec2> = cities.iter().map(|c| projection.project(c.lon, c.lat)).collect();
        let bounds = Rect::sized(width, height);
        let cells = partition(&points, bounds);
        debug!(
            "{}: {} cities, {} empty cells",
            country,
            cities.len(),
            cells.iter().filter(|c| c.is_empty()).count()
        );
        Ok(Self {
            country: country.to_string(),
            outline,
            cities,
            points,
            cells,
            bounds,
            projection,
        })
    }

    /// Outline rings in view pixels
    pub fn outline_px(&self) -> Vec<Vec<DVec2>> {
        self.outline
            .iter()
            .map(|ring| ring.iter().map(|&(lon, lat)| self.projection.project(lon, lat)).collect())
            .collect()
    }

    /// Index of the city whose cell covers a view pixel
    pub fn city_at(&self, p: DVec2) -> Option<usize> {
        self.cells.iter().position(|c| c.contains(p))
    }

    /// Station weather per city for `year`. Energy metrics have no station
    /// form, so cells fall back to average temperature.
    pub fn cell_values(&self, stations: &[StationYearRecord], year: i32, metric: Metric) -> Vec<f64> {
        let metric = cell_metric(metric);
        let mut by_station: HashMap<&str, &StationYearRecord> = HashMap::new();
        for record in stations.iter().filter(|s| s.year == Some(year)) {
            by_station.entry(record.station_id.as_str()).or_insert(record);
        }
        self.cities
            .iter()
            .map(|city| {
                by_station
                    .get(city.station_id.as_str())
                    .map_or(f64::NAN, |s| s.metric(metric))
            })
            .collect()
    }

    /// Cell colors, `None` where the station has no data that year
    pub fn cell_fills(&self, stations: &[StationYearRecord], year: i32, metric: Metric) -> Vec<Option<Rgb>> {
        let values = self.cell_values(stations, year, metric);
        if cell_metric(metric).is_temperature() {
            return values
                .iter()
                .map(|&t| (!t.is_nan()).then(|| hsl_rgb(temperature_hue(t), 0.7, 0.5)))
                .collect();
        }
        let scale = ColorScale::from_values(values.iter().copied()).unwrap_or_default();
        values
            .iter()
            .map(|&v| scale.color(v).and_then(hex_rgb))
            .collect()
    }

    /// Energy rows of this country in `[start, end]`, each joined with the
    /// same year's weather averages
    pub fn year_rows<'a>(&self, datasets: &'a Datasets, start: i32, end: i32) -> Vec<YearRow<'a>> {
        year_rows(&self.country, &datasets.energy, &datasets.yearly_weather, start, end)
    }

    /// One line per metric over `[start, end]`
    pub fn series(&self, datasets: &Datasets, metrics: &[Metric], start: i32, end: i32) -> Vec<Series> {
        let rows = self.year_rows(datasets, start, end);
        metrics
            .iter()
            .map(|&metric| Series {
                label: metric.name().to_string(),
                points: rows.iter().map(|r| (r.year, r.metric(metric))).collect(),
            })
            .collect()
    }

    /// Stacked share bars for every fifth year
    pub fn share_stacks(&self, datasets: &Datasets, start: i32, end: i32) -> Vec<ShareStack> {
        share_stacks(&self.year_rows(datasets, start, end))
    }

    pub fn formula_series(&self, datasets: &Datasets, formula: &Formula, start: i32, end: i32) -> Series {
        let rows = self.year_rows(datasets, start, end);
        Series {
            label: formula.source().to_string(),
            points: formula::formula_series(formula, rows.into_iter().map(|r| (r.year, r)), start, end),
        }
    }
}

fn cell_metric(metric: Metric) -> Metric {
    match metric.kind() {
        MetricKind::Weather => metric,
        MetricKind::Energy => Metric::AvgTempC,
    }
}

/// A country-year: energy first, then weather layered over it
#[derive(Debug, Clone, Copy)]
pub struct YearRow<'a> {
    pub year: i32,
    pub energy: &'a CountryYearRecord,
    pub weather: Option<&'a WeatherYearRecord>,
}

impl MetricSource for YearRow<'_> {
    fn metric(&self, metric: Metric) -> f64 {
        match metric.kind() {
            MetricKind::Energy => self.energy.metric(metric),
            MetricKind::Weather => self.weather.map_or(f64::NAN, |w| w.metric(metric)),
        }
    }

    fn year(&self) -> Option<i32> {
        Some(self.year)
    }
}

/// Rows are driven by the energy panel; a year without energy data has no row
pub fn year_rows<'a>(
    country: &str,
    energy: &'a [CountryYearRecord],
    weather: &'a [WeatherYearRecord],
    start: i32,
    end: i32,
) -> Vec<YearRow<'a>> {
    let in_range = |year: Option<i32>| year.filter(|y| (start..=end).contains(y));
    let mut weather_by_year: HashMap<i32, &WeatherYearRecord> = HashMap::new();
    for w in weather.iter().filter(|w| w.country == country) {
        if let Some(year) = in_range(w.year) {
            weather_by_year.entry(year).or_insert(w);
        }
    }
    energy
        .iter()
        .filter(|e| e.country == country)
        .filter_map(|e| {
            let year = in_range(e.year)?;
            Some(YearRow {
                year,
                energy: e,
                weather: weather_by_year.get(&year).copied(),
            })
        })
        .collect()
}

/// A labelled `(year, value)` line; `NaN` values are gaps
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub points: Vec<(i32, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareKind {
    Elec,
    Energy,
}

impl ShareKind {
    pub fn metrics(self) -> &'static [Metric] {
        match self {
            ShareKind::Elec => &Metric::ELEC_SHARES,
            ShareKind::Energy => &Metric::ENERGY_SHARES,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            ShareKind::Elec => "elec",
            ShareKind::Energy => "energy",
        }
    }
}

/// One stacked bar: every share of one kind in one year
#[derive(Debug, Clone, PartialEq)]
pub struct ShareStack {
    pub year: i32,
    pub kind: ShareKind,
    pub segments: Vec<(Metric, f64)>,
}

impl ShareStack {
    /// `2005_elec`, `2005_energy`
    pub fn label(&self) -> String {
        format!("{}_{}", self.year, self.kind.suffix())
    }

    /// Stack height; missing segments count as empty
    pub fn total(&self) -> f64 {
        self.segments.iter().map(|(_, v)| v).filter(|v| !v.is_nan()).sum()
    }
}

/// Elec then energy bar for each row whose year is a multiple of five
pub fn share_stacks(rows: &[YearRow]) -> Vec<ShareStack> {
    rows.iter()
        .filter(|r| r.year % 5 == 0)
        .flat_map(|row| {
            [ShareKind::Elec, ShareKind::Energy].map(|kind| ShareStack {
                year: row.year,
                kind,
                segments: kind.metrics().iter().map(|&m| (m, row.metric(m))).collect(),
            })
        })
        .collect()
}
