//! Activity classification of boxes
//!
//! A box is classified by the newest `lastMeasurement.createdAt` across its
//! sensors. The state is computed per query and never stored.

use super::StreamStage;
use crate::Result;
use crate::app::models::SenseBox;
use crate::constants::{ACTIVE_MAX_AGE_DAYS, INACTIVE_MAX_AGE_DAYS};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Activity state of a box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityState {
    /// Reported within the last 7 days
    Active,
    /// Last report between 7 and 30 days ago
    Inactive,
    /// Last report 30 or more days ago, or never
    Old,
}

impl ActivityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityState::Active => "active",
            ActivityState::Inactive => "inactive",
            ActivityState::Old => "old",
        }
    }

    /// State for a given age of the newest measurement
    pub fn from_age(age: Option<Duration>) -> Self {
        match age {
            Some(age) if age < Duration::days(ACTIVE_MAX_AGE_DAYS) => ActivityState::Active,
            Some(age) if age < Duration::days(INACTIVE_MAX_AGE_DAYS) => ActivityState::Inactive,
            _ => ActivityState::Old,
        }
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Newest `lastMeasurement.createdAt` across the box's sensors
pub fn latest_measurement_at(sense_box: &SenseBox) -> Option<DateTime<Utc>> {
    sense_box
        .sensors
        .iter()
        .filter_map(|sensor| sensor.last_measurement.as_ref())
        .map(|measurement| measurement.created_at)
        .max()
}

/// Classify a box relative to `now`
pub fn classify(sense_box: &SenseBox, now: DateTime<Utc>) -> ActivityState {
    ActivityState::from_age(latest_measurement_at(sense_box).map(|latest| now - latest))
}

/// A box id with its state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedBox {
    pub box_id: String,
    pub state: ActivityState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_measurement_at: Option<DateTime<Utc>>,
}

/// Stage classifying each box of a stream against a fixed reference time
#[derive(Debug, Clone)]
pub struct ClassificationStage {
    now: DateTime<Utc>,
}

impl ClassificationStage {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

impl Default for ClassificationStage {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl StreamStage for ClassificationStage {
    type Input = SenseBox;
    type Output = ClassifiedBox;

    fn name(&self) -> &'static str {
        "classification"
    }

    fn push(&mut self, sense_box: SenseBox) -> Result<Vec<ClassifiedBox>> {
        let last_measurement_at = latest_measurement_at(&sense_box);

        Ok(vec![ClassifiedBox {
            state: ActivityState::from_age(last_measurement_at.map(|latest| self.now - latest)),
            box_id: sense_box.id,
            last_measurement_at,
        }])
    }

    fn flush(&mut self) -> Result<Vec<ClassifiedBox>> {
        Ok(Vec::new())
    }
}
