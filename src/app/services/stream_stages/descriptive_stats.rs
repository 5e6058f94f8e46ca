//! Windowed descriptive statistics per sensor
//!
//! Input must be sorted by `(sensorId, createdAt)`. Windows are half-open
//! intervals `[windows[i], windows[i + 1])` over the configured boundaries,
//! so a record exactly on an inner boundary belongs to the later window.
//! The stage holds the values of one open window for one sensor at a time;
//! closed windows are reduced to their statistic immediately.
//!
//! One record is emitted per sensor once the stream moves on to the next
//! sensor or ends. Windows without values, and windows whose statistic is
//! undefined for their values, are omitted from that record.

use super::StreamStage;
use crate::Result;
use crate::app::models::Measurement;
use crate::config::StatisticsConfig;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Statistics of one sensor keyed by window start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorStatistics {
    pub sensor_id: String,
    #[serde(flatten)]
    pub windows: BTreeMap<String, f64>,
}

/// Format a window boundary the way it appears in output records
pub fn window_key(boundary: DateTime<Utc>) -> String {
    boundary.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Mutable state of the sensor currently being aggregated
#[derive(Debug, Default, Clone)]
struct SensorState {
    sensor_id: String,
    window_index: usize,
    values: Vec<f64>,
    results: BTreeMap<String, f64>,
}

/// Descriptive statistics stage
#[derive(Debug, Clone)]
pub struct DescriptiveStatsStage {
    config: StatisticsConfig,
    current: Option<SensorState>,
    sensors_emitted: usize,
    skipped: usize,
}

impl DescriptiveStatsStage {
    /// Create a stage after validating its configuration
    pub fn new(config: StatisticsConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            current: None,
            sensors_emitted: 0,
            skipped: 0,
        })
    }

    /// Whether `timestamp` falls into any window
    fn in_range(&self, timestamp: DateTime<Utc>) -> bool {
        let windows = &self.config.windows;
        match (windows.first(), windows.last()) {
            (Some(first), Some(last)) => timestamp >= *first && timestamp < *last,
            _ => false,
        }
    }

    /// Index of the first window whose upper bound lies after `timestamp`
    fn window_for(&self, timestamp: DateTime<Utc>) -> usize {
        self.config
            .windows
            .windows(2)
            .position(|bounds| bounds[1] > timestamp)
            .unwrap_or(0)
    }

    /// Reduce the open window of `state` to its statistic
    fn close_window(&self, state: &mut SensorState) {
        if state.values.is_empty() {
            return;
        }

        let start = self.config.windows[state.window_index];
        match self.config.operation.compute(&state.values) {
            Ok(statistic) => {
                state.results.insert(window_key(start), statistic);
            }
            Err(error) => debug!(
                "Omitting window {} of sensor {}: {}",
                window_key(start),
                state.sensor_id,
                error
            ),
        }

        state.values.clear();
    }

    /// Close the open window of the current sensor and build its record
    fn finish_sensor(&mut self) -> Option<SensorStatistics> {
        let mut state = self.current.take()?;
        self.close_window(&mut state);
        self.sensors_emitted += 1;

        Some(SensorStatistics {
            sensor_id: state.sensor_id,
            windows: state.results,
        })
    }
}

impl StreamStage for DescriptiveStatsStage {
    type Input = Measurement;
    type Output = SensorStatistics;

    fn name(&self) -> &'static str {
        "descriptive-statistics"
    }

    fn push(&mut self, measurement: Measurement) -> Result<Vec<SensorStatistics>> {
        let mut output = Vec::new();
        let timestamp = measurement.created_at;

        let same_sensor = self
            .current
            .as_ref()
            .is_some_and(|state| state.sensor_id == measurement.sensor_id);

        if !same_sensor {
            output.extend(self.finish_sensor());
            self.current = Some(SensorState {
                window_index: self.window_for(timestamp),
                sensor_id: measurement.sensor_id,
                ..SensorState::default()
            });
        }

        if !self.in_range(timestamp) {
            self.skipped += 1;
            debug!("Skipping measurement at {} outside of all windows", timestamp);
            return Ok(output);
        }

        let value = measurement.value.as_f64()?;

        if let Some(mut state) = self.current.take() {
            while state.window_index + 1 < self.config.windows.len()
                && timestamp >= self.config.windows[state.window_index + 1]
            {
                self.close_window(&mut state);
                state.window_index += 1;
            }

            state.values.push(value);
            self.current = Some(state);
        }

        Ok(output)
    }

    fn flush(&mut self) -> Result<Vec<SensorStatistics>> {
        let output: Vec<SensorStatistics> = self.finish_sensor().into_iter().collect();

        info!(
            "Computed {} over {} windows for {} sensors ({} measurements outside the range)",
            self.config.operation,
            self.config.window_count(),
            self.sensors_emitted,
            self.skipped
        );

        self.sensors_emitted = 0;
        self.skipped = 0;
        Ok(output)
    }
}
