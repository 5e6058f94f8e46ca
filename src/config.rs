//! Configuration management and validation.
//!
//! Provides configuration structures for the decoders and each stream stage,
//! validation rules enforced before any stage is constructed, and a JSON
//! configuration file loader used by the command-line interface.

use crate::app::services::stream_stages::statistics::StatisticOperation;
use crate::constants::{
    DEFAULT_FUTURE_TOLERANCE_SECS, DEFAULT_IDW_CLASSES, DEFAULT_MAX_BYTE_TUPLES,
    DEFAULT_OUTLIER_THRESHOLD, DEFAULT_OUTLIER_WINDOW, IDW_MAX_POWER, IDW_MAX_TIME_STEPS,
    IDW_MIN_POWER, IDW_MIN_TIME_STEPS, OUTLIER_MAX_WINDOW, OUTLIER_MIN_WINDOW,
};
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::debug;

static WINDOW_LENGTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+)\s*(ms|s|m|h|d|w)\s*$").expect("window length pattern is valid")
});

// =============================================================================
// Decoder Configuration
// =============================================================================

/// Limits applied while decoding device payloads
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Maximum number of tuples in a raw byte payload
    pub max_byte_tuples: usize,

    /// Allowed clock skew for `createdAt` values, in seconds
    pub future_tolerance_secs: i64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_byte_tuples: DEFAULT_MAX_BYTE_TUPLES,
            future_tolerance_secs: DEFAULT_FUTURE_TOLERANCE_SECS,
        }
    }
}

impl DecoderConfig {
    /// Set the byte tuple cap
    pub fn with_max_byte_tuples(mut self, max_byte_tuples: usize) -> Self {
        self.max_byte_tuples = max_byte_tuples;
        self
    }

    /// Set the allowed clock skew
    pub fn with_future_tolerance_secs(mut self, secs: i64) -> Self {
        self.future_tolerance_secs = secs;
        self
    }

    /// Allowed clock skew as a duration
    pub fn future_tolerance(&self) -> Duration {
        Duration::seconds(self.future_tolerance_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_byte_tuples == 0 {
            return Err(Error::configuration(
                "max_byte_tuples must be greater than 0",
            ));
        }

        if self.future_tolerance_secs < 0 {
            return Err(Error::configuration(
                "future_tolerance_secs cannot be negative",
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Outlier Configuration
// =============================================================================

/// What the outlier stage does with a flagged value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMode {
    /// Pass the value through and add an `isOutlier` flag
    Mark,
    /// Substitute the window median for flagged values
    Replace,
}

impl FromStr for OutlierMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mark" => Ok(OutlierMode::Mark),
            "replace" => Ok(OutlierMode::Replace),
            other => Err(Error::configuration(format!(
                "Unknown outlier mode '{other}' (expected 'mark' or 'replace')"
            ))),
        }
    }
}

/// Sliding-window outlier detection settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    /// Number of preceding values the decision is based on (1..=50)
    pub window_size: usize,

    /// Mark or replace flagged values
    pub mode: OutlierMode,

    /// Modified z-score above which a value is an outlier
    pub threshold: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_OUTLIER_WINDOW,
            mode: OutlierMode::Mark,
            threshold: DEFAULT_OUTLIER_THRESHOLD,
        }
    }
}

impl OutlierConfig {
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_mode(mut self, mode: OutlierMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(OUTLIER_MIN_WINDOW..=OUTLIER_MAX_WINDOW).contains(&self.window_size) {
            return Err(Error::configuration(format!(
                "Outlier window size {} out of range {}..={}",
                self.window_size, OUTLIER_MIN_WINDOW, OUTLIER_MAX_WINDOW
            )));
        }

        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(Error::configuration(format!(
                "Outlier threshold must be a positive number, got {}",
                self.threshold
            )));
        }

        Ok(())
    }
}

// =============================================================================
// Descriptive Statistics Configuration
// =============================================================================

/// Windowed statistics settings
///
/// `windows` holds ordered boundary timestamps; window `i` covers
/// `[windows[i], windows[i + 1])`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsConfig {
    pub windows: Vec<DateTime<Utc>>,
    pub operation: StatisticOperation,
}

impl StatisticsConfig {
    /// Use precomputed window boundaries
    pub fn new(windows: Vec<DateTime<Utc>>, operation: StatisticOperation) -> Result<Self> {
        let config = Self {
            windows,
            operation,
        };
        config.validate()?;
        Ok(config)
    }

    /// Generate boundaries covering `[from, to]` in steps of `window_length`.
    ///
    /// The first boundary is `from`; the last one is the first step at or
    /// after `to`.
    pub fn from_range(
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        window_length: Duration,
        operation: StatisticOperation,
    ) -> Result<Self> {
        if from >= to {
            return Err(Error::configuration(format!(
                "Statistics range start {from} must be before end {to}"
            )));
        }

        if window_length <= Duration::zero() {
            return Err(Error::configuration("Window length must be positive"));
        }

        let mut windows = vec![from];
        let mut boundary = from;
        while boundary < to {
            boundary += window_length;
            windows.push(boundary);
        }

        debug!(
            "Generated {} statistics windows between {} and {}",
            windows.len() - 1,
            from,
            to
        );

        Self::new(windows, operation)
    }

    /// Number of windows (one less than the number of boundaries)
    pub fn window_count(&self) -> usize {
        self.windows.len().saturating_sub(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.windows.len() < 2 {
            return Err(Error::configuration(
                "Statistics need at least two window boundaries",
            ));
        }

        if self.windows.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(Error::configuration(
                "Statistics window boundaries must be strictly increasing",
            ));
        }

        Ok(())
    }
}

/// Parse a window length such as `15m`, `6h`, `1d` or `500ms`
pub fn parse_window_length(input: &str) -> Result<Duration> {
    let captures = WINDOW_LENGTH.captures(input).ok_or_else(|| {
        Error::configuration(format!(
            "Invalid window length '{input}' (expected e.g. 30m, 6h, 1d)"
        ))
    })?;

    let amount: i64 = captures[1]
        .parse()
        .map_err(|e| Error::configuration(format!("Invalid window amount in '{input}': {e}")))?;

    let length = match &captures[2] {
        "ms" => Duration::try_milliseconds(amount),
        "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        _ => Duration::try_weeks(amount),
    }
    .ok_or_else(|| Error::configuration(format!("Window length '{input}' is too large")))?;

    if length <= Duration::zero() {
        return Err(Error::configuration(format!(
            "Window length '{input}' must be positive"
        )));
    }

    Ok(length)
}

// =============================================================================
// IDW Configuration
// =============================================================================

/// Geographic bounding box in WGS84 degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let in_range = (-180.0..=180.0).contains(&self.west)
            && (-180.0..=180.0).contains(&self.east)
            && (-90.0..=90.0).contains(&self.south)
            && (-90.0..=90.0).contains(&self.north);

        if !in_range {
            return Err(Error::configuration(format!(
                "Bounding box {self:?} exceeds WGS84 ranges"
            )));
        }

        if self.west >= self.east || self.south >= self.north {
            return Err(Error::configuration(format!(
                "Bounding box {self:?} is empty (west < east and south < north required)"
            )));
        }

        Ok(())
    }
}

impl FromStr for BoundingBox {
    type Err = Error;

    /// Parse `west,south,east,north`
    fn from_str(s: &str) -> Result<Self> {
        let parts = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::configuration(format!("Invalid bounding box '{s}': {e}")))?;

        match parts.as_slice() {
            [west, south, east, north] => Ok(Self::new(*west, *south, *east, *north)),
            _ => Err(Error::configuration(format!(
                "Invalid bounding box '{s}': expected west,south,east,north"
            ))),
        }
    }
}

/// Tiling used for the interpolation grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridType {
    Hex,
    Square,
    Triangle,
}

impl FromStr for GridType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hex" | "hexagon" => Ok(GridType::Hex),
            "square" => Ok(GridType::Square),
            "triangle" => Ok(GridType::Triangle),
            other => Err(Error::configuration(format!(
                "Unknown grid type '{other}' (expected hex, square or triangle)"
            ))),
        }
    }
}

/// Inverse-distance-weighting settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdwConfig {
    pub bbox: BoundingBox,
    pub grid_type: GridType,
    /// Cell width in kilometres
    pub cell_width: f64,
    /// Distance exponent (1..=9)
    pub power: u8,
    /// Number of equal time steps in `[from, to]` (1..=10)
    pub num_time_steps: u32,
    /// Number of classes for the value breaks (>= 1)
    pub num_classes: u32,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl IdwConfig {
    /// Hex grid, 1 km cells, power 1, one time step, default classes
    pub fn new(bbox: BoundingBox, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            bbox,
            grid_type: GridType::Hex,
            cell_width: 1.0,
            power: IDW_MIN_POWER,
            num_time_steps: IDW_MIN_TIME_STEPS,
            num_classes: DEFAULT_IDW_CLASSES,
            from,
            to,
        }
    }

    pub fn with_grid_type(mut self, grid_type: GridType) -> Self {
        self.grid_type = grid_type;
        self
    }

    pub fn with_cell_width(mut self, cell_width: f64) -> Self {
        self.cell_width = cell_width;
        self
    }

    pub fn with_power(mut self, power: u8) -> Self {
        self.power = power;
        self
    }

    pub fn with_time_steps(mut self, num_time_steps: u32) -> Self {
        self.num_time_steps = num_time_steps;
        self
    }

    pub fn with_classes(mut self, num_classes: u32) -> Self {
        self.num_classes = num_classes;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.bbox.validate()?;

        if !self.cell_width.is_finite() || self.cell_width <= 0.0 {
            return Err(Error::configuration(format!(
                "Cell width must be a positive number of kilometres, got {}",
                self.cell_width
            )));
        }

        if !(IDW_MIN_POWER..=IDW_MAX_POWER).contains(&self.power) {
            return Err(Error::configuration(format!(
                "IDW power {} out of range {}..={}",
                self.power, IDW_MIN_POWER, IDW_MAX_POWER
            )));
        }

        if !(IDW_MIN_TIME_STEPS..=IDW_MAX_TIME_STEPS).contains(&self.num_time_steps) {
            return Err(Error::configuration(format!(
                "IDW time steps {} out of range {}..={}",
                self.num_time_steps, IDW_MIN_TIME_STEPS, IDW_MAX_TIME_STEPS
            )));
        }

        if self.num_classes == 0 {
            return Err(Error::configuration("IDW needs at least one class"));
        }

        if self.from >= self.to {
            return Err(Error::configuration(format!(
                "IDW range start {} must be before end {}",
                self.from, self.to
            )));
        }

        Ok(())
    }
}

// =============================================================================
// Global Configuration
// =============================================================================

/// Pipeline configuration as loaded from a JSON file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub decoder: DecoderConfig,
    pub outlier: OutlierConfig,
    pub statistics: Option<StatisticsConfig>,
    pub idw: Option<IdwConfig>,
}

impl Config {
    /// Load and validate a JSON configuration file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::io(
                format!("Failed to read configuration file {}", path.display()),
                e,
            )
        })?;

        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.decoder.validate()?;
        self.outlier.validate()?;

        if let Some(statistics) = &self.statistics {
            statistics.validate()?;
        }

        if let Some(idw) = &self.idw {
            idw.validate()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_window_length() {
        assert_eq!(parse_window_length("1d").unwrap(), Duration::days(1));
        assert_eq!(parse_window_length("15m").unwrap(), Duration::minutes(15));
        assert_eq!(parse_window_length("500ms").unwrap(), Duration::milliseconds(500));
        assert_eq!(parse_window_length(" 2w ").unwrap(), Duration::weeks(2));
        assert!(parse_window_length("0h").is_err());
        assert!(parse_window_length("1 day").is_err());
        assert!(parse_window_length("").is_err());
    }

    #[test]
    fn test_windows_from_range_cover_range() {
        let config =
            StatisticsConfig::from_range(day(1), day(5), Duration::days(1), StatisticOperation::Min)
                .unwrap();
        assert_eq!(config.windows, vec![day(1), day(2), day(3), day(4), day(5)]);
        assert_eq!(config.window_count(), 4);

        let config = StatisticsConfig::from_range(
            day(1),
            day(2) + Duration::hours(1),
            Duration::days(1),
            StatisticOperation::Min,
        )
        .unwrap();
        assert_eq!(config.windows.last(), Some(&day(3)));
    }

    #[test]
    fn test_statistics_config_rejects_bad_boundaries() {
        assert!(StatisticsConfig::new(vec![day(1)], StatisticOperation::Sum).is_err());
        assert!(StatisticsConfig::new(vec![day(2), day(1)], StatisticOperation::Sum).is_err());
        assert!(
            StatisticsConfig::from_range(day(2), day(1), Duration::days(1), StatisticOperation::Sum)
                .is_err()
        );
    }

    #[test]
    fn test_outlier_config_validation() {
        assert!(OutlierConfig::default().validate().is_ok());
        assert!(OutlierConfig::default().with_window_size(0).validate().is_err());
        assert!(OutlierConfig::default().with_window_size(51).validate().is_err());
        assert!(OutlierConfig::default().with_window_size(50).validate().is_ok());
        assert_eq!("Replace".parse::<OutlierMode>().unwrap(), OutlierMode::Replace);
        assert!("drop".parse::<OutlierMode>().is_err());
    }

    #[test]
    fn test_idw_config_validation() {
        let bbox = "7.5,51.8,7.7,52.0".parse::<BoundingBox>().unwrap();
        let config = IdwConfig::new(bbox, day(1), day(2));
        assert!(config.validate().is_ok());
        assert!(config.clone().with_power(0).validate().is_err());
        assert!(config.clone().with_power(10).validate().is_err());
        assert!(config.clone().with_time_steps(11).validate().is_err());
        assert!(config.clone().with_classes(0).validate().is_err());
        assert!(config.clone().with_cell_width(0.0).validate().is_err());
        assert!(IdwConfig::new(bbox, day(2), day(1)).validate().is_err());
        assert!("1,2,3".parse::<BoundingBox>().is_err());
        assert!(BoundingBox::new(8.0, 51.0, 7.0, 52.0).validate().is_err());
    }

    #[test]
    fn test_config_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"decoder": {{"max_byte_tuples": 10}}, "outlier": {{"window_size": 5, "mode": "replace"}}}}"#
        )
        .unwrap();

        let config = Config::from_json_file(file.path()).unwrap();
        assert_eq!(config.decoder.max_byte_tuples, 10);
        assert_eq!(config.decoder.future_tolerance_secs, DEFAULT_FUTURE_TOLERANCE_SECS);
        assert_eq!(config.outlier.window_size, 5);
        assert_eq!(config.outlier.mode, OutlierMode::Replace);
        assert!(config.idw.is_none());
    }

    #[test]
    fn test_config_from_json_file_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"outlier": {{"window_size": 99}}}}"#).unwrap();

        assert!(matches!(
            Config::from_json_file(file.path()),
            Err(Error::Configuration { .. })
        ));
    }
}
