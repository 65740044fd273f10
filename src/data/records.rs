use crate::data::metric::{Metric, MetricSource, ENERGY_METRICS};
use serde::Serialize;
use std::collections::HashMap;

/// One CSV row keyed by header name
pub type RawRow = HashMap<String, String>;

/// Strict string to number conversion. Empty, missing or non-numeric input
/// becomes `NaN` so it can never be mistaken for zero downstream. Only
/// finite numbers pass: `inf`, `Infinity` and `nan` spellings are text.
#[inline]
pub fn coerce(raw: Option<&str>) -> f64 {
    match raw.map(str::trim) {
        None | Some("") => f64::NAN,
        Some(s) => s
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .unwrap_or(f64::NAN),
    }
}

/// Integral year, `None` when the cell is missing, fractional or non-numeric
pub fn coerce_year(raw: Option<&str>) -> Option<i32> {
    let value = coerce(raw);
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= i32::MAX as f64 {
        Some(value as i32)
    } else {
        None
    }
}

/// Station panels label rows by `date`; only its leading year matters here
fn date_year(raw: Option<&str>) -> Option<i32> {
    let raw = raw?.trim();
    coerce_year(Some(raw)).or_else(|| raw.get(..4).and_then(|y| coerce_year(Some(y))))
}

fn text(row: &RawRow, key: &str) -> String {
    row.get(key).map(|s| s.trim().to_string()).unwrap_or_default()
}

fn number(row: &RawRow, key: &str) -> f64 {
    coerce(row.get(key).map(String::as_str))
}

/// One (country, year) row of the energy/economic panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryYearRecord {
    pub country: String,
    pub year: Option<i32>,
    /// Indexed by [`Metric::energy_index`]
    pub values: [f64; ENERGY_METRICS],
}

impl CountryYearRecord {
    pub fn from_row(row: &RawRow) -> Self {
        let mut values = [f64::NAN; ENERGY_METRICS];
        for metric in Metric::ALL {
            if let Some(idx) = metric.energy_index() {
                values[idx] = number(row, metric.name());
            }
        }
        Self {
            country: text(row, "country"),
            year: coerce_year(row.get("year").map(String::as_str)),
            values,
        }
    }
}

impl MetricSource for CountryYearRecord {
    #[inline]
    fn metric(&self, metric: Metric) -> f64 {
        metric.energy_index().map_or(f64::NAN, |idx| self.values[idx])
    }

    fn year(&self) -> Option<i32> {
        self.year
    }
}

/// The five weather measurements shared by country and station panels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeatherValues {
    pub avg_temp_c: f64,
    pub max_temp_c: f64,
    pub min_temp_c: f64,
    pub snow_depth: f64,
    pub precipitation_mm: f64,
}

impl WeatherValues {
    fn from_row(row: &RawRow) -> Self {
        Self {
            avg_temp_c: number(row, "avg_temp_c"),
            max_temp_c: number(row, "max_temp_c"),
            min_temp_c: number(row, "min_temp_c"),
            snow_depth: number(row, "snow_depth"),
            precipitation_mm: number(row, "precipitation_mm"),
        }
    }
}

impl MetricSource for WeatherValues {
    fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::AvgTempC => self.avg_temp_c,
            Metric::MaxTempC => self.max_temp_c,
            Metric::MinTempC => self.min_temp_c,
            Metric::SnowDepth => self.snow_depth,
            Metric::PrecipitationMm => self.precipitation_mm,
            _ => f64::NAN,
        }
    }
}

/// Yearly per-country weather averages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherYearRecord {
    pub country: String,
    pub year: Option<i32>,
    pub weather: WeatherValues,
}

impl WeatherYearRecord {
    pub fn from_row(row: &RawRow) -> Self {
        Self {
            country: text(row, "country"),
            year: coerce_year(row.get("year").map(String::as_str)),
            weather: WeatherValues::from_row(row),
        }
    }
}

impl MetricSource for WeatherYearRecord {
    fn metric(&self, metric: Metric) -> f64 {
        self.weather.metric(metric)
    }

    fn year(&self) -> Option<i32> {
        self.year
    }
}

/// Station-level weather, one row per station and year label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationYearRecord {
    pub station_id: String,
    pub year: Option<i32>,
    pub weather: WeatherValues,
}

impl StationYearRecord {
    pub fn from_row(row: &RawRow) -> Self {
        let year = row
            .get("date")
            .or_else(|| row.get("year"))
            .and_then(|d| date_year(Some(d.as_str())));
        Self {
            station_id: text(row, "station_id"),
            year,
            weather: WeatherValues::from_row(row),
        }
    }
}

impl MetricSource for StationYearRecord {
    fn metric(&self, metric: Metric) -> f64 {
        self.weather.metric(metric)
    }

    fn year(&self) -> Option<i32> {
        self.year
    }
}

/// A city and the station its weather comes from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityRecord {
    pub name: String,
    pub country: String,
    pub lon: f64,
    pub lat: f64,
    pub station_id: String,
}

impl CityRecord {
    pub fn from_row(row: &RawRow) -> Self {
        let name = row
            .get("city_name")
            .or_else(|| row.get("name"))
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        Self {
            name,
            country: text(row, "country"),
            lon: number(row, "longitude"),
            lat: number(row, "latitude"),
            station_id: text(row, "station_id"),
        }
    }
}

/// Continent and region classification of a country
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryMetaRecord {
    pub name: String,
    pub continent: String,
    pub region: String,
}

impl CountryMetaRecord {
    pub fn from_row(row: &RawRow) -> Self {
        let name = row
            .get("country")
            .or_else(|| row.get("name"))
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        Self {
            name,
            continent: text(row, "continent"),
            region: text(row, "region"),
        }
    }

    /// Treemap grouping needs both levels
    pub fn is_complete(&self) -> bool {
        !self.continent.is_empty() && !self.region.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_coerce_is_strict() {
        assert_eq!(coerce(Some("42.5")), 42.5);
        assert_eq!(coerce(Some(" 7 ")), 7.0);
        assert_eq!(coerce(Some("0")), 0.0);
        assert!(coerce(Some("")).is_nan());
        assert!(coerce(Some("n/a")).is_nan());
        assert!(coerce(None).is_nan());
        for text in ["inf", "-inf", "Infinity", "INF", "NaN", "1e400"] {
            assert!(coerce(Some(text)).is_nan(), "{text} should not be a number");
        }
        assert_eq!(coerce_year(Some("inf")), None);
    }

    #[test]
    fn test_coerce_year() {
        assert_eq!(coerce_year(Some("2005")), Some(2005));
        assert_eq!(coerce_year(Some("2005.5")), None);
        assert_eq!(coerce_year(Some("")), None);
    }

    #[test]
    fn test_energy_row_keeps_missing_as_nan() {
        let record = CountryYearRecord::from_row(&row(&[
            ("country", "Norway"),
            ("year", "2010"),
            ("population", "4889000"),
            ("hydro_share_elec", "95.7"),
            ("coal_share_elec", ""),
        ]));
        assert_eq!(record.country, "Norway");
        assert_eq!(record.year, Some(2010));
        assert_eq!(record.metric(Metric::Population), 4_889_000.0);
        assert_eq!(record.metric(Metric::HydroShareElec), 95.7);
        assert!(record.metric(Metric::CoalShareElec).is_nan());
        assert!(record.metric(Metric::Gdp).is_nan());
        assert!(record.metric(Metric::AvgTempC).is_nan());
    }

    #[test]
    fn test_station_date_takes_leading_year() {
        let a = StationYearRecord::from_row(&row(&[("station_id", "X1"), ("date", "2018")]));
        let b = StationYearRecord::from_row(&row(&[("station_id", "X1"), ("date", "2018-06-01")]));
        assert_eq!(a.year, Some(2018));
        assert_eq!(b.year, Some(2018));
    }

    #[test]
    fn test_city_and_meta_rows() {
        let city = CityRecord::from_row(&row(&[
            ("city_name", "Bergen"),
            ("country", "Norway"),
            ("latitude", "60.39"),
            ("longitude", "5.32"),
            ("station_id", "01317"),
        ]));
        assert_eq!(city.name, "Bergen");
        assert_eq!((city.lon, city.lat), (5.32, 60.39));

        let meta = CountryMetaRecord::from_row(&row(&[("name", "Norway"), ("continent", "Europe")]));
        assert_eq!(meta.name, "Norway");
        assert!(!meta.is_complete());
    }
}
