//! Country key resolution: joins geometry, energy, weather and metadata by
//! exact country name and year.

use crate::data::{
    CountryMetaRecord, CountryYearRecord, GeoFeature, Metric, MetricKind, MetricSource,
    WeatherYearRecord,
};
use geojson::{JsonObject, JsonValue};
use std::borrow::Cow;
use std::collections::HashMap;

/// Positions of each `(country, year)` record in the panels. Owns no
/// records, so it can be built once and kept beside the datasets. The first
/// record in panel order wins when keys repeat.
#[derive(Debug, Clone, Default)]
pub struct RecordKeys {
    energy: HashMap<String, HashMap<i32, usize>>,
    weather: HashMap<String, HashMap<i32, usize>>,
    meta: HashMap<String, usize>,
}

impl RecordKeys {
    pub fn new(
        energy: &[CountryYearRecord],
        weather: &[WeatherYearRecord],
        meta: &[CountryMetaRecord],
    ) -> Self {
        let mut keys = Self::default();
        for (pos, record) in energy.iter().enumerate() {
            if let Some(year) = record.year {
                keys.energy.entry(record.country.clone()).or_default().entry(year).or_insert(pos);
            }
        }
        for (pos, record) in weather.iter().enumerate() {
            if let Some(year) = record.year {
                keys.weather.entry(record.country.clone()).or_default().entry(year).or_insert(pos);
            }
        }
        for (pos, record) in meta.iter().enumerate() {
            keys.meta.entry(record.name.clone()).or_insert(pos);
        }
        keys
    }

    /// Pair the keys with the panels they were built from
    pub fn bind<'a>(
        &'a self,
        energy: &'a [CountryYearRecord],
        weather: &'a [WeatherYearRecord],
        meta: &'a [CountryMetaRecord],
    ) -> RecordIndex<'a> {
        RecordIndex {
            keys: Cow::Borrowed(self),
            energy,
            weather,
            meta,
        }
    }
}

/// `(country, year)` lookup over the panels
pub struct RecordIndex<'a> {
    keys: Cow<'a, RecordKeys>,
    energy: &'a [CountryYearRecord],
    weather: &'a [WeatherYearRecord],
    meta: &'a [CountryMetaRecord],
}

impl<'a> RecordIndex<'a> {
    /// Build the keys and bind them in one go
    pub fn new(
        energy: &'a [CountryYearRecord],
        weather: &'a [WeatherYearRecord],
        meta: &'a [CountryMetaRecord],
    ) -> Self {
        Self {
            keys: Cow::Owned(RecordKeys::new(energy, weather, meta)),
            energy,
            weather,
            meta,
        }
    }

    #[inline]
    pub fn energy(&self, country: &str, year: i32) -> Option<&'a CountryYearRecord> {
        let records = self.energy;
        let pos = *self.keys.energy.get(country)?.get(&year)?;
        records.get(pos)
    }

    #[inline]
    pub fn weather(&self, country: &str, year: i32) -> Option<&'a WeatherYearRecord> {
        let records = self.weather;
        let pos = *self.keys.weather.get(country)?.get(&year)?;
        records.get(pos)
    }

    #[inline]
    pub fn meta(&self, country: &str) -> Option<&'a CountryMetaRecord> {
        let records = self.meta;
        let pos = *self.keys.meta.get(country)?;
        records.get(pos)
    }
}

/// A country's geometry with the year's records overlaid on its properties
#[derive(Debug, Clone)]
pub struct JoinedCountryFrame<'a> {
    pub feature: &'a GeoFeature,
    pub energy: Option<&'a CountryYearRecord>,
    pub weather: Option<&'a WeatherYearRecord>,
    pub meta: Option<&'a CountryMetaRecord>,
    /// geometry ← meta ← weather ← energy, later layers overwrite
    pub properties: JsonObject,
}

impl<'a> JoinedCountryFrame<'a> {
    fn new(
        feature: &'a GeoFeature,
        energy: Option<&'a CountryYearRecord>,
        weather: Option<&'a WeatherYearRecord>,
        meta: Option<&'a CountryMetaRecord>,
    ) -> Self {
        let mut properties = feature.properties.clone();
        if let Some(meta) = meta {
            properties.insert("continent".to_string(), meta.continent.as_str().into());
            properties.insert("region".to_string(), meta.region.as_str().into());
        }
        if let Some(weather) = weather {
            overlay(&mut properties, &weather.country, weather.year);
            for metric in Metric::ALL.iter().filter(|m| m.kind() == MetricKind::Weather) {
                properties.insert(metric.name().to_string(), number(weather.metric(*metric)));
            }
        }
        if let Some(energy) = energy {
            overlay(&mut properties, &energy.country, energy.year);
            for metric in Metric::ALL.iter().filter(|m| m.kind() == MetricKind::Energy) {
                properties.insert(metric.name().to_string(), number(energy.metric(*metric)));
            }
        }
        Self {
            feature,
            energy,
            weather,
            meta,
            properties,
        }
    }

    pub fn name(&self) -> &'a str {
        &self.feature.name
    }

    /// Typed metric read. `NaN` when the joined record is absent or the cell
    /// was not numeric.
    #[inline]
    pub fn value(&self, metric: Metric) -> f64 {
        match metric.kind() {
            MetricKind::Energy => self.energy.map_or(f64::NAN, |r| r.metric(metric)),
            MetricKind::Weather => self.weather.map_or(f64::NAN, |r| r.metric(metric)),
        }
    }
}

impl MetricSource for JoinedCountryFrame<'_> {
    fn metric(&self, metric: Metric) -> f64 {
        self.value(metric)
    }

    fn year(&self) -> Option<i32> {
        self.energy.and_then(|r| r.year).or_else(|| self.weather.and_then(|r| r.year))
    }
}

fn overlay(properties: &mut JsonObject, country: &str, year: Option<i32>) {
    properties.insert("country".to_string(), country.into());
    if let Some(year) = year {
        properties.insert("year".to_string(), year.into());
    }
}

/// `NaN` has no JSON form; it is carried as `null`
fn number(value: f64) -> JsonValue {
    serde_json::Number::from_f64(value).map_or(JsonValue::Null, JsonValue::Number)
}

/// Join every feature with its records for `year`, in feature order
pub fn resolve<'a>(features: &'a [GeoFeature], index: &RecordIndex<'a>, year: i32) -> Vec<JoinedCountryFrame<'a>> {
    features
        .iter()
        .map(|feature| {
            let name = feature.name.as_str();
            JoinedCountryFrame::new(
                feature,
                index.energy(name, year),
                index.weather(name, year),
                index.meta(name),
            )
        })
        .collect()
}

/// Linear-scan join, first match in input order. Kept alongside the indexed
/// path; both must agree.
pub fn resolve_scan<'a>(
    features: &'a [GeoFeature],
    energy: &'a [CountryYearRecord],
    weather: &'a [WeatherYearRecord],
    meta: &'a [CountryMetaRecord],
    year: i32,
) -> Vec<JoinedCountryFrame<'a>> {
    features
        .iter()
        .map(|feature| {
            let name = feature.name.as_str();
            JoinedCountryFrame::new(
                feature,
                energy.iter().find(|r| r.country == name && r.year == Some(year)),
                weather.iter().find(|r| r.country == name && r.year == Some(year)),
                meta.iter().find(|m| m.name == name),
            )
        })
        .collect()
}
