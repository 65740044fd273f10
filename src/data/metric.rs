use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// First and last year covered by the panels
pub const YEAR_MIN: i32 = 2000;
pub const YEAR_MAX: i32 = 2020;

/// Number of metrics carried by the energy panel (population, gdp and shares)
pub const ENERGY_METRICS: usize = 28;

/// Every column the atlas can color, rank, plot or reference in a formula.
///
/// The discriminant order is load-bearing: the first [`ENERGY_METRICS`]
/// variants index straight into [`CountryYearRecord`](super::records::CountryYearRecord)
/// values, the rest are weather fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Population,
    Gdp,
    BiofuelShareElec,
    BiofuelShareEnergy,
    CoalShareElec,
    CoalShareEnergy,
    ElectricityShareEnergy,
    FossilShareElec,
    FossilShareEnergy,
    GasShareElec,
    GasShareEnergy,
    HydroShareElec,
    HydroShareEnergy,
    LowCarbonShareElec,
    LowCarbonShareEnergy,
    NuclearShareElec,
    NuclearShareEnergy,
    OilShareElec,
    OilShareEnergy,
    OtherRenewablesShareElec,
    OtherRenewablesShareElecExcBiofuel,
    OtherRenewablesShareEnergy,
    RenewablesShareElec,
    RenewablesShareEnergy,
    SolarShareElec,
    SolarShareEnergy,
    WindShareElec,
    WindShareEnergy,
    AvgTempC,
    MaxTempC,
    MinTempC,
    SnowDepth,
    PrecipitationMm,
}

/// Which panel a metric is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Energy,
    Weather,
}

impl Metric {
    pub const ALL: [Metric; 33] = [
        Metric::Population,
        Metric::Gdp,
        Metric::BiofuelShareElec,
        Metric::BiofuelShareEnergy,
        Metric::CoalShareElec,
        Metric::CoalShareEnergy,
        Metric::ElectricityShareEnergy,
        Metric::FossilShareElec,
        Metric::FossilShareEnergy,
        Metric::GasShareElec,
        Metric::GasShareEnergy,
        Metric::HydroShareElec,
        Metric::HydroShareEnergy,
        Metric::LowCarbonShareElec,
        Metric::LowCarbonShareEnergy,
        Metric::NuclearShareElec,
        Metric::NuclearShareEnergy,
        Metric::OilShareElec,
        Metric::OilShareEnergy,
        Metric::OtherRenewablesShareElec,
        Metric::OtherRenewablesShareElecExcBiofuel,
        Metric::OtherRenewablesShareEnergy,
        Metric::RenewablesShareElec,
        Metric::RenewablesShareEnergy,
        Metric::SolarShareElec,
        Metric::SolarShareEnergy,
        Metric::WindShareElec,
        Metric::WindShareEnergy,
        Metric::AvgTempC,
        Metric::MaxTempC,
        Metric::MinTempC,
        Metric::SnowDepth,
        Metric::PrecipitationMm,
    ];

    /// Share of electricity generation, stacked per year in drill-down bars
    pub const ELEC_SHARES: [Metric; 12] = [
        Metric::BiofuelShareElec,
        Metric::CoalShareElec,
        Metric::FossilShareElec,
        Metric::GasShareElec,
        Metric::HydroShareElec,
        Metric::LowCarbonShareElec,
        Metric::NuclearShareElec,
        Metric::OilShareElec,
        Metric::OtherRenewablesShareElec,
        Metric::RenewablesShareElec,
        Metric::SolarShareElec,
        Metric::WindShareElec,
    ];

    /// Share of primary energy, stacked per year in drill-down bars
    pub const ENERGY_SHARES: [Metric; 13] = [
        Metric::BiofuelShareEnergy,
        Metric::CoalShareEnergy,
        Metric::ElectricityShareEnergy,
        Metric::FossilShareEnergy,
        Metric::GasShareEnergy,
        Metric::HydroShareEnergy,
        Metric::LowCarbonShareEnergy,
        Metric::NuclearShareEnergy,
        Metric::OilShareEnergy,
        Metric::OtherRenewablesShareEnergy,
        Metric::RenewablesShareEnergy,
        Metric::SolarShareEnergy,
        Metric::WindShareEnergy,
    ];

    /// Column name as it appears in the CSV headers
    pub fn name(self) -> &'static str {
        match self {
            Metric::Population => "population",
            Metric::Gdp => "gdp",
            Metric::BiofuelShareElec => "biofuel_share_elec",
            Metric::BiofuelShareEnergy => "biofuel_share_energy",
            Metric::CoalShareElec => "coal_share_elec",
            Metric::CoalShareEnergy => "coal_share_energy",
            Metric::ElectricityShareEnergy => "electricity_share_energy",
            Metric::FossilShareElec => "fossil_share_elec",
            Metric::FossilShareEnergy => "fossil_share_energy",
            Metric::GasShareElec => "gas_share_elec",
            Metric::GasShareEnergy => "gas_share_energy",
            Metric::HydroShareElec => "hydro_share_elec",
            Metric::HydroShareEnergy => "hydro_share_energy",
            Metric::LowCarbonShareElec => "low_carbon_share_elec",
            Metric::LowCarbonShareEnergy => "low_carbon_share_energy",
            Metric::NuclearShareElec => "nuclear_share_elec",
            Metric::NuclearShareEnergy => "nuclear_share_energy",
            Metric::OilShareElec => "oil_share_elec",
            Metric::OilShareEnergy => "oil_share_energy",
            Metric::OtherRenewablesShareElec => "other_renewables_share_elec",
            Metric::OtherRenewablesShareElecExcBiofuel => "other_renewables_share_elec_exc_biofuel",
            Metric::OtherRenewablesShareEnergy => "other_renewables_share_energy",
            Metric::RenewablesShareElec => "renewables_share_elec",
            Metric::RenewablesShareEnergy => "renewables_share_energy",
            Metric::SolarShareElec => "solar_share_elec",
            Metric::SolarShareEnergy => "solar_share_energy",
            Metric::WindShareElec => "wind_share_elec",
            Metric::WindShareEnergy => "wind_share_energy",
            Metric::AvgTempC => "avg_temp_c",
            Metric::MaxTempC => "max_temp_c",
            Metric::MinTempC => "min_temp_c",
            Metric::SnowDepth => "snow_depth",
            Metric::PrecipitationMm => "precipitation_mm",
        }
    }

    pub fn from_name(name: &str) -> Option<Metric> {
        Metric::ALL.iter().copied().find(|m| m.name() == name)
    }

    pub fn kind(self) -> MetricKind {
        if (self as usize) < ENERGY_METRICS {
            MetricKind::Energy
        } else {
            MetricKind::Weather
        }
    }

    /// Position in the energy record's value array, `None` for weather metrics
    #[inline(always)]
    pub fn energy_index(self) -> Option<usize> {
        let idx = self as usize;
        (idx < ENERGY_METRICS).then_some(idx)
    }

    pub fn is_temperature(self) -> bool {
        matches!(self, Metric::AvgTempC | Metric::MaxTempC | Metric::MinTempC)
    }

    /// Year range the slider and animation use for this metric
    pub fn default_years(self) -> (i32, i32) {
        match self {
            // The panel's GDP series stops two years early
            Metric::Gdp => (YEAR_MIN, 2018),
            _ => (YEAR_MIN, YEAR_MAX),
        }
    }

    /// Next metric in selector order, wrapping around
    pub fn next(self) -> Metric {
        Metric::ALL[(self as usize + 1) % Metric::ALL.len()]
    }

    /// Previous metric in selector order, wrapping around
    pub fn prev(self) -> Metric {
        Metric::ALL[(self as usize + Metric::ALL.len() - 1) % Metric::ALL.len()]
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown metric '{0}'")]
pub struct UnknownMetric(pub String);

impl FromStr for Metric {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::from_name(s.trim()).ok_or_else(|| UnknownMetric(s.to_string()))
    }
}

/// Anything a metric can be read from. `NaN` means "no data".
pub trait MetricSource {
    fn metric(&self, metric: Metric) -> f64;

    /// Year the values belong to, when the source knows it
    fn year(&self) -> Option<i32> {
        None
    }
}
