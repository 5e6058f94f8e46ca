//! Command-line argument definitions for the senseBox pipeline
//!
//! Every analytics subcommand reads measurements as JSON lines and writes its
//! output records as JSON lines to stdout. Flags override the values of a
//! `--config` file.

use crate::app::services::decoder::ContentType;
use crate::app::services::stream_stages::StatisticOperation;
use crate::config::{
    BoundingBox, Config, GridType, IdwConfig, OutlierConfig, OutlierMode, StatisticsConfig,
    parse_window_length,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for the senseBox measurement pipeline
///
/// Decodes device payloads and runs streaming analytics over measurement
/// exports.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sensebox-pipeline",
    version,
    about = "Decode senseBox payloads and run streaming analytics over measurements",
    long_about = "Decodes device payloads (JSON, CSV, Luftdaten, hackAir, raw bytes) into \
                  canonical measurements and runs outlier detection, activity classification, \
                  windowed statistics and IDW interpolation over JSON-lines measurement exports."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// JSON configuration file; flags take precedence over its values
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Only show errors
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        conflicts_with = "verbose",
        help = "Suppress output except errors"
    )]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Decode a device payload into measurements
    Decode(DecodeArgs),
    /// Windowed descriptive statistics per sensor
    Stats(StatsArgs),
    /// Mark or replace outliers in one sensor's measurements
    Outliers(OutliersArgs),
    /// Interpolate measurements onto a grid with inverse distance weighting
    Idw(IdwArgs),
    /// Classify boxes as active, inactive or old
    Classify(ClassifyArgs),
}

/// Arguments for the decode command
#[derive(Debug, Clone, Parser)]
pub struct DecodeArgs {
    /// File holding the raw payload
    #[arg(value_name = "PAYLOAD")]
    pub payload: PathBuf,

    /// Content type of the payload (json, csv, luftdaten, hackair,
    /// application/sbx-bytes, application/sbx-bytes-ts)
    #[arg(short = 'f', long = "format", value_name = "TYPE")]
    pub format: ContentType,

    /// JSON file with the addressed box (id, sensors, locations, currentLocation)
    #[arg(short = 'b', long = "box", value_name = "FILE")]
    pub box_file: PathBuf,

    /// Resolve locations against the box's timeline and update its sensors
    #[arg(long = "resolve")]
    pub resolve: bool,

    /// Write the updated box here (implies --resolve)
    #[arg(long = "updated-box", value_name = "FILE")]
    pub updated_box: Option<PathBuf>,

    /// Reception time (RFC 3339); defaults to now
    #[arg(long = "now", value_name = "TIME")]
    pub now: Option<DateTime<Utc>>,
}

impl DecodeArgs {
    pub fn should_resolve(&self) -> bool {
        self.resolve || self.updated_box.is_some()
    }
}

/// Arguments for the stats command
#[derive(Debug, Clone, Parser)]
pub struct StatsArgs {
    /// JSON-lines measurements sorted by sensor and time ("-" for stdin)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Statistic to compute per window
    #[arg(short = 'o', long = "operation", value_name = "OP")]
    pub operation: Option<StatisticOperation>,

    /// Window length such as 15m, 1h or 1d
    #[arg(short = 'w', long = "window", value_name = "LENGTH", default_value = "1d")]
    pub window: String,

    /// Start of the first window (RFC 3339)
    #[arg(long = "from", value_name = "TIME", requires = "to")]
    pub from: Option<DateTime<Utc>>,

    /// End of the range (RFC 3339)
    #[arg(long = "to", value_name = "TIME", requires = "from")]
    pub to: Option<DateTime<Utc>>,
}

impl StatsArgs {
    /// Windows from `--from/--to`, or the config file's statistics section
    pub fn statistics_config(&self, config: &Config) -> Result<StatisticsConfig> {
        let base = config.statistics.as_ref();
        let operation = self
            .operation
            .or(base.map(|statistics| statistics.operation))
            .unwrap_or(StatisticOperation::ArithmeticMean);

        match (self.from, self.to) {
            (Some(from), Some(to)) => {
                StatisticsConfig::from_range(from, to, parse_window_length(&self.window)?, operation)
            }
            _ => {
                let base = base.ok_or_else(|| {
                    Error::configuration(
                        "Statistics need --from and --to or a statistics section in the config file",
                    )
                })?;
                StatisticsConfig::new(base.windows.clone(), operation)
            }
        }
    }
}

/// Arguments for the outliers command
#[derive(Debug, Clone, Parser)]
pub struct OutliersArgs {
    /// JSON-lines measurements of one sensor sorted by time ("-" for stdin)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Number of previous values to judge against (1-50)
    #[arg(short = 'w', long = "window-size", value_name = "N")]
    pub window_size: Option<usize>,

    /// mark adds isOutlier, replace substitutes the window median
    #[arg(short = 'm', long = "mode", value_name = "MODE")]
    pub mode: Option<OutlierMode>,

    /// Modified z-score above which a value is an outlier
    #[arg(long = "threshold", value_name = "Z")]
    pub threshold: Option<f64>,
}

impl OutliersArgs {
    pub fn outlier_config(&self, config: &Config) -> Result<OutlierConfig> {
        let mut outlier = config.outlier;

        if let Some(window_size) = self.window_size {
            outlier = outlier.with_window_size(window_size);
        }
        if let Some(mode) = self.mode {
            outlier = outlier.with_mode(mode);
        }
        if let Some(threshold) = self.threshold {
            outlier = outlier.with_threshold(threshold);
        }

        outlier.validate()?;
        Ok(outlier)
    }
}

/// Arguments for the idw command
#[derive(Debug, Clone, Parser)]
pub struct IdwArgs {
    /// JSON-lines located measurements sorted by time ("-" for stdin)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Bounding box as west,south,east,north
    #[arg(long = "bbox", value_name = "W,S,E,N", allow_hyphen_values = true)]
    pub bbox: Option<BoundingBox>,

    /// Grid tiling: hex, square or triangle
    #[arg(short = 'g', long = "grid", value_name = "TYPE")]
    pub grid: Option<GridType>,

    /// Cell width in kilometres
    #[arg(long = "cell-width", value_name = "KM")]
    pub cell_width: Option<f64>,

    /// Distance exponent (1-9)
    #[arg(short = 'p', long = "power", value_name = "N")]
    pub power: Option<u8>,

    /// Number of time steps (1-10)
    #[arg(short = 't', long = "time-steps", value_name = "N")]
    pub time_steps: Option<u32>,

    /// Number of classes for the value breaks
    #[arg(long = "classes", value_name = "N")]
    pub classes: Option<u32>,

    /// Start of the interval (RFC 3339)
    #[arg(long = "from", value_name = "TIME")]
    pub from: Option<DateTime<Utc>>,

    /// End of the interval (RFC 3339)
    #[arg(long = "to", value_name = "TIME")]
    pub to: Option<DateTime<Utc>>,
}

impl IdwArgs {
    /// Flags layered over the config file's idw section
    pub fn idw_config(&self, config: &Config) -> Result<IdwConfig> {
        let mut idw = match (&config.idw, self.bbox, self.from, self.to) {
            (_, Some(bbox), Some(from), Some(to)) => IdwConfig::new(bbox, from, to),
            (Some(base), bbox, from, to) => {
                let mut idw = base.clone();
                idw.bbox = bbox.unwrap_or(idw.bbox);
                idw.from = from.unwrap_or(idw.from);
                idw.to = to.unwrap_or(idw.to);
                idw
            }
            (None, ..) => {
                return Err(Error::configuration(
                    "IDW needs --bbox, --from and --to or an idw section in the config file",
                ));
            }
        };

        if let Some(grid) = self.grid {
            idw = idw.with_grid_type(grid);
        }
        if let Some(cell_width) = self.cell_width {
            idw = idw.with_cell_width(cell_width);
        }
        if let Some(power) = self.power {
            idw = idw.with_power(power);
        }
        if let Some(time_steps) = self.time_steps {
            idw = idw.with_time_steps(time_steps);
        }
        if let Some(classes) = self.classes {
            idw = idw.with_classes(classes);
        }

        idw.validate()?;
        Ok(idw)
    }
}

/// Arguments for the classify command
#[derive(Debug, Clone, Parser)]
pub struct ClassifyArgs {
    /// Box JSON, an array of boxes, or JSON-lines boxes ("-" for stdin)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Reference time (RFC 3339); defaults to now
    #[arg(long = "now", value_name = "TIME")]
    pub now: Option<DateTime<Utc>>,
}

impl Args {
    /// Get the log level based on verbosity settings
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Load the config file if one was given
    pub fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => Config::from_json_file(path),
            None => Ok(Config::default()),
        }
    }
}
