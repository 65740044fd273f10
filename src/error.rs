/// Error types for loading and drilling into the atlas datasets
use std::path::PathBuf;
use thiserror::Error;

/// Failure to load one of the input files
#[derive(Error, Debug)]
pub enum LoadError {
    /// File missing or unreadable
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Malformed delimited panel
    #[error("failed to parse CSV {}: {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },

    /// Malformed geographic feature file
    #[error("failed to parse GeoJSON {}: {source}", path.display())]
    GeoJson {
        path: PathBuf,
        source: simd_json::Error,
    },
}

/// Failure confined to a single country drill-down
#[derive(Error, Debug)]
pub enum DrillDownError {
    /// Detail boundary file missing or malformed
    #[error("no detail map for {country}: {source}")]
    Detail {
        country: String,
        #[source]
        source: LoadError,
    },

    /// Detail file parsed but carries no polygons
    #[error("detail map for {0} has no polygons")]
    EmptyGeometry(String),
}

/// Type alias for Results using LoadError
pub type Result<T> = std::result::Result<T, LoadError>;
