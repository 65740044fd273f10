use crate::data::{DataPaths, Metric};
use std::path::PathBuf;
use std::time::Duration;

/// Session settings, filled from the command line
#[derive(Debug, Clone, PartialEq)]
pub struct AtlasConfig {
    /// Root holding `map/` and `data/`
    pub data_dir: PathBuf,
    /// Animation step
    pub tick_interval: Duration,
    /// Countries kept in the treemap
    pub top_n: usize,
    /// Metric shown at startup
    pub metric: Metric,
}

impl AtlasConfig {
    pub fn paths(&self) -> DataPaths {
        DataPaths::new(&self.data_dir)
    }
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            tick_interval: Duration::from_millis(1000),
            top_n: 10,
            metric: Metric::Population,
        }
    }
}
