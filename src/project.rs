use crate::data::Metric;
use crate::join::JoinedCountryFrame;
use crate::scale::{compute_scale, format_number, ColorScale, NO_DATA_COLOR};

/// Display value of one country for the active metric
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projected {
    Value(f64),
    /// Absent record or non-numeric cell. Distinct from zero.
    NoData,
}

impl Projected {
    #[inline]
    pub fn from_value(value: f64) -> Self {
        if value.is_nan() {
            Projected::NoData
        } else {
            Projected::Value(value)
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Projected::Value(v) => Some(v),
            Projected::NoData => None,
        }
    }

    /// Bucket color, or the neutral no-data fill
    pub fn fill(self, scale: &ColorScale) -> &'static str {
        match self {
            Projected::Value(v) => scale.color(v).unwrap_or(NO_DATA_COLOR),
            Projected::NoData => NO_DATA_COLOR,
        }
    }
}

/// Per-frame lookup of `metric`, index-aligned with `frames`
pub fn project(frames: &[JoinedCountryFrame], metric: Metric) -> Vec<Projected> {
    frames.iter().map(|f| Projected::from_value(f.value(metric))).collect()
}

/// Everything the map, legend and tooltips need for one (year, metric)
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub year: i32,
    pub metric: Metric,
    pub scale: ColorScale,
    pub values: Vec<Projected>,
}

impl Snapshot {
    pub fn build(frames: &[JoinedCountryFrame], year: i32, metric: Metric) -> Self {
        Self {
            year,
            metric,
            scale: compute_scale(frames, metric),
            values: project(frames, metric),
        }
    }

    /// Fill color per frame
    pub fn fills(&self) -> Vec<&'static str> {
        self.values.iter().map(|p| p.fill(&self.scale)).collect()
    }

    /// Number of frames that received a scale bucket
    pub fn with_data(&self) -> usize {
        self.values.iter().filter(|p| p.value().is_some()).count()
    }
}

/// Hover text: `<name> - <metric>: <value>`
pub fn describe(name: &str, metric: Metric, projected: Projected) -> String {
    let value = match projected {
        Projected::Value(v) => format_number(v),
        Projected::NoData => "N/A".to_string(),
    };
    format!("{name} - {metric}: {value}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CountryYearRecord, GeoFeature, RawRow};
    use crate::join::{resolve, RecordIndex};
    use crate::scale::PALETTE;

    fn record(country: &str, year: &str, population: &str) -> CountryYearRecord {
        let row: RawRow = [("country", country), ("year", year), ("population", population)]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CountryYearRecord::from_row(&row)
    }

    #[test]
    fn test_zero_is_a_value_not_no_data() {
        assert_eq!(Projected::from_value(0.0), Projected::Value(0.0));
        assert_eq!(Projected::from_value(f64::NAN), Projected::NoData);
    }

    #[test]
    fn test_snapshot_matches_source_values() {
        let features = vec![GeoFeature::new("A", None), GeoFeature::new("B", None), GeoFeature::new("C", None)];
        let records = vec![
            record("A", "2000", "10"),
            record("B", "2000", "1000000000"),
            record("A", "2001", "11"),
            record("C", "2000", "oops"),
        ];
        let index = RecordIndex::new(&records, &[], &[]);
        let frames = resolve(&features, &index, 2000);
        let snapshot = Snapshot::build(&frames, 2000, Metric::Population);

        assert_eq!(
            snapshot.values,
            vec![Projected::Value(10.0), Projected::Value(1e9), Projected::NoData]
        );
        assert_eq!(snapshot.scale.domain(), (10.0, 1e9));
        assert_eq!(snapshot.fills(), vec![PALETTE[0], PALETTE[8], NO_DATA_COLOR]);
        assert_eq!(snapshot.with_data(), 2);
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            describe("India", Metric::Population, Projected::Value(1.05e9)),
            "India - population: 1.1B"
        );
        assert_eq!(describe("Nowhere", Metric::Gdp, Projected::NoData), "Nowhere - gdp: N/A");
    }
}
