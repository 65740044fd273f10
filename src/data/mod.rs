pub mod features;
pub mod metric;
pub mod records;

pub use features::GeoFeature;
pub use metric::{Metric, MetricKind, MetricSource};
pub use records::{
    CityRecord, CountryMetaRecord, CountryYearRecord, RawRow, StationYearRecord, WeatherValues,
    WeatherYearRecord,
};

use crate::error::{LoadError, Result};
use log::{debug, info};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Where each input lives under the data root
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn world(&self) -> PathBuf {
        self.root.join("map/world.geojson")
    }

    pub fn energy(&self) -> PathBuf {
        self.root.join("data/filtered_df.csv")
    }

    pub fn yearly_weather(&self) -> PathBuf {
        self.root.join("data/yearly_country_avg.csv")
    }

    pub fn stations(&self) -> PathBuf {
        self.root.join("data/weather-aggregated.csv")
    }

    pub fn cities(&self) -> PathBuf {
        self.root.join("data/cities.csv")
    }

    pub fn meta(&self) -> PathBuf {
        self.root.join("data/country_meta.csv")
    }

    /// Per-country boundary file fetched on drill-down
    pub fn detail(&self, country: &str) -> PathBuf {
        self.root.join("map/countries").join(detail_file_name(country))
    }
}

/// `<lowercased name, spaces as underscores>.json`
pub fn detail_file_name(country: &str) -> String {
    format!("{}.json", country.to_lowercase().replace(' ', "_"))
}

/// Every normalized dataset, loaded once and held for the session
#[derive(Debug, Clone, Default)]
pub struct Datasets {
    pub world: Vec<GeoFeature>,
    pub energy: Vec<CountryYearRecord>,
    pub yearly_weather: Vec<WeatherYearRecord>,
    pub stations: Vec<StationYearRecord>,
    pub cities: Vec<CityRecord>,
    pub meta: Vec<CountryMetaRecord>,
}

impl Datasets {
    /// Normalize raw tables. No rows are dropped here.
    pub fn from_tables(
        world: Vec<GeoFeature>,
        energy: &[RawRow],
        yearly_weather: &[RawRow],
        stations: &[RawRow],
        cities: &[RawRow],
        meta: &[RawRow],
    ) -> Self {
        Self {
            world,
            energy: energy.iter().map(CountryYearRecord::from_row).collect(),
            yearly_weather: yearly_weather.iter().map(WeatherYearRecord::from_row).collect(),
            stations: stations.iter().map(StationYearRecord::from_row).collect(),
            cities: cities.iter().map(CityRecord::from_row).collect(),
            meta: meta.iter().map(CountryMetaRecord::from_row).collect(),
        }
    }
}

/// Load all inputs concurrently. Any single failure fails the whole load.
pub fn load_all(paths: &DataPaths) -> Result<Datasets> {
    let (world, (energy, (weather, (stations, (cities, meta))))) = rayon::join(
        || load_features(&paths.world()),
        || {
            rayon::join(
                || read_rows(&paths.energy()),
                || {
                    rayon::join(
                        || read_rows(&paths.yearly_weather()),
                        || {
                            rayon::join(
                                || read_rows(&paths.stations()),
                                || rayon::join(|| read_rows(&paths.cities()), || read_rows(&paths.meta())),
                            )
                        },
                    )
                },
            )
        },
    );

    let datasets = Datasets::from_tables(world?, &energy?, &weather?, &stations?, &cities?, &meta?);
    info!(
        "Loaded {} features, {} energy rows, {} weather rows, {} station rows, {} cities, {} country metadata rows",
        datasets.world.len(),
        datasets.energy.len(),
        datasets.yearly_weather.len(),
        datasets.stations.len(),
        datasets.cities.len(),
        datasets.meta.len()
    );
    Ok(datasets)
}

/// Parse a header-first delimited table into raw rows.
/// Short rows simply lack the trailing keys.
pub fn parse_rows<R: Read>(reader: R) -> std::result::Result<Vec<RawRow>, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.trim().to_string(), v.to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Read a CSV panel from disk
pub fn read_rows(path: &Path) -> Result<Vec<RawRow>> {
    let file = fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let rows = parse_rows(file).map_err(|source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("{}: {} rows", path.display(), rows.len());
    Ok(rows)
}

/// Read a GeoJSON feature file from disk
pub fn load_features(path: &Path) -> Result<Vec<GeoFeature>> {
    let mut bytes = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let features = features::parse_features(&mut bytes).map_err(|source| LoadError::GeoJson {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("{}: {} features", path.display(), features.len());
    Ok(features)
}
