//! Sliding-window outlier detection
//!
//! Input is the measurement stream of one sensor ordered by `createdAt`.
//! Each value is compared against the previous `window_size` raw values with
//! the modified z-score
//!
//! ```text
//! z = 0.6745 * (x - median) / MAD
//! ```
//!
//! falling back to `(x - median) / (1.253314 * meanAD)` when the median
//! absolute deviation is zero. Values with `|z|` above the threshold are
//! outliers. Until `min(3, window_size)` previous values are seen, or while a
//! window of at least three values has no spread, no value is flagged.
//!
//! Windows configured with one or two values cannot carry a median absolute
//! deviation. They are judged with
//!
//! ```text
//! z = (x - center) / max(1.253314 * meanAD, 0.1 * max(|center|, 1))
//! ```
//!
//! where `center` is the window mean, so a jump of more than the threshold
//! times a tenth of the level is flagged.
//!
//! The window always receives raw values, so replaced values do not pull the
//! median towards themselves.

use super::StreamStage;
use super::statistics::median;
use crate::Result;
use crate::app::models::{Measurement, MeasurementValue};
use crate::config::{OutlierConfig, OutlierMode};
use crate::constants::{MAD_CONSISTENCY, MEAN_AD_CONSISTENCY};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Minimum number of previous values before a value can be judged
const MIN_WINDOW_FILL: usize = 3;

/// Scale floor for one- and two-value windows, relative to the window level
const SMALL_WINDOW_SCALE_FLOOR: f64 = 0.1;

/// A measurement passed through the outlier stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierRecord {
    #[serde(flatten)]
    pub measurement: Measurement,
    /// Set in mark mode only
    #[serde(rename = "isOutlier", default, skip_serializing_if = "Option::is_none")]
    pub is_outlier: Option<bool>,
}

/// Outlier stage over one sensor's ordered measurements
#[derive(Debug, Clone)]
pub struct OutlierStage {
    config: OutlierConfig,
    window: VecDeque<f64>,
    sensor_id: Option<String>,
    flagged: usize,
}

impl OutlierStage {
    /// Create a stage after validating its configuration
    pub fn new(config: OutlierConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            window: VecDeque::with_capacity(config.window_size),
            config,
            sensor_id: None,
            flagged: 0,
        })
    }

    /// Judge `value` against the current window
    ///
    /// # Returns
    ///
    /// The window center when `value` is an outlier
    fn judge(&self, value: f64) -> Option<f64> {
        if self.window.len() < MIN_WINDOW_FILL.min(self.config.window_size) {
            return None;
        }

        let values: Vec<f64> = self.window.iter().copied().collect();

        if values.len() < MIN_WINDOW_FILL {
            return self.judge_small(value, &values);
        }

        let center = median(&values)?;
        let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
        let mad = median(&deviations)?;

        let score = if mad > 0.0 {
            MAD_CONSISTENCY * (value - center) / mad
        } else {
            let mean_ad = deviations.iter().sum::<f64>() / deviations.len() as f64;
            if mean_ad == 0.0 {
                return None;
            }
            (value - center) / (MEAN_AD_CONSISTENCY * mean_ad)
        };

        (score.abs() > self.config.threshold).then_some(center)
    }

    /// Judge against a window too small for a median absolute deviation
    fn judge_small(&self, value: f64, values: &[f64]) -> Option<f64> {
        let center = values.iter().sum::<f64>() / values.len() as f64;
        let mean_ad = values.iter().map(|v| (v - center).abs()).sum::<f64>() / values.len() as f64;
        let floor = SMALL_WINDOW_SCALE_FLOOR * center.abs().max(1.0);
        let scale = (MEAN_AD_CONSISTENCY * mean_ad).max(floor);

        (((value - center) / scale).abs() > self.config.threshold).then_some(center)
    }

    fn remember(&mut self, value: f64) {
        if self.window.len() == self.config.window_size {
            self.window.pop_front();
        }
        self.window.push_back(value);
    }
}

impl StreamStage for OutlierStage {
    type Input = Measurement;
    type Output = OutlierRecord;

    fn name(&self) -> &'static str {
        "outliers"
    }

    fn push(&mut self, measurement: Measurement) -> Result<Vec<OutlierRecord>> {
        if self.sensor_id.as_deref() != Some(measurement.sensor_id.as_str()) {
            self.window.clear();
            self.sensor_id = Some(measurement.sensor_id.clone());
        }

        let value = measurement.value.as_f64()?;
        let replacement = self.judge(value);
        self.remember(value);

        if replacement.is_some() {
            self.flagged += 1;
        }

        let record = match (self.config.mode, replacement) {
            (OutlierMode::Mark, replacement) => OutlierRecord {
                measurement,
                is_outlier: Some(replacement.is_some()),
            },
            (OutlierMode::Replace, Some(median)) => OutlierRecord {
                measurement: Measurement {
                    value: MeasurementValue::Number(median),
                    ..measurement
                },
                is_outlier: None,
            },
            (OutlierMode::Replace, None) => OutlierRecord {
                measurement,
                is_outlier: None,
            },
        };

        Ok(vec![record])
    }

    fn flush(&mut self) -> Result<Vec<OutlierRecord>> {
        debug!("Outlier stage flagged {} values", self.flagged);

        self.window.clear();
        self.sensor_id = None;
        self.flagged = 0;
        Ok(Vec::new())
    }
}
