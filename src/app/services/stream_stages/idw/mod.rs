//! Inverse-distance-weighted interpolation with time steps
//!
//! Input must be sorted by `createdAt` and carry locations. The interval
//! `[from, to]` is split into `num_time_steps` equal steps. Within a step each
//! sensor contributes one control point: its first location and the running
//! mean of its values. Whenever a record reaches the end of the current step,
//! every grid cell is interpolated from the step's control points and the
//! next step begins. A cell at distance zero from a control point takes that
//! point's value directly.
//!
//! ## Architecture
//!
//! - [`grid`] - hex, square and triangle tilings and great-circle distances
//!
//! On flush the stage emits, in order, the class breaks, the grid as a GeoJSON
//! `FeatureCollection` with `idwValues` per cell, and the ISO 8601 midpoints
//! of the interpolated steps.

pub mod grid;

use super::StreamStage;
use crate::app::models::Measurement;
use crate::config::IdwConfig;
use crate::constants::IDW_NO_MEASUREMENTS;
use crate::{Error, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use grid::{GridCell, Position, build_grid, distance_km};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// One record emitted by the IDW stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdwOutput {
    /// `num_classes - 1` equal-width class boundaries over the value range
    Breaks { breaks: Vec<f64> },
    /// Interpolated grid
    FeatureCollection(FeatureCollection),
    /// Midpoints of the interpolated time steps
    Timesteps { timesteps: Vec<String> },
    /// The stage consumed no measurements
    NoMeasurements { error: String },
}

/// GeoJSON feature collection of grid polygons
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: Polygon,
    pub properties: CellProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Vec<Vec<Position>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellProperties {
    /// One value per time step; `null` when the step had no control points
    #[serde(rename = "idwValues")]
    pub idw_values: Vec<Option<f64>>,
}

/// Time-step average of one sensor
#[derive(Debug, Clone, PartialEq)]
pub struct ControlPoint {
    pub count: usize,
    pub position: Position,
    pub average: f64,
}

impl ControlPoint {
    fn fold(&mut self, value: f64) {
        self.count += 1;
        self.average += (value - self.average) / self.count as f64;
    }
}

/// Interpolate the value at `target` from `points`
///
/// # Returns
///
/// `None` when there are no control points
pub fn interpolate<'a>(
    target: Position,
    points: impl IntoIterator<Item = &'a ControlPoint>,
    power: u8,
) -> Option<f64> {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    for point in points {
        let distance = distance_km(target, point.position);
        if distance == 0.0 {
            return Some(point.average);
        }

        let weight = 1.0 / distance.powi(i32::from(power));
        weighted_sum += weight * point.average;
        weight_total += weight;
    }

    (weight_total > 0.0).then(|| weighted_sum / weight_total)
}

/// Grid state built on the first record
#[derive(Debug, Clone)]
struct StepState {
    cells: Vec<GridCell>,
    idw_values: Vec<Vec<Option<f64>>>,
    timesteps: Vec<String>,
    step_index: u32,
    control_points: BTreeMap<String, ControlPoint>,
    min: f64,
    max: f64,
    folded: usize,
}

/// IDW interpolation stage
#[derive(Debug, Clone)]
pub struct IdwStage {
    config: IdwConfig,
    step_length: Duration,
    state: Option<StepState>,
    skipped: usize,
}

impl IdwStage {
    /// Create a stage after validating its configuration
    pub fn new(config: IdwConfig) -> Result<Self> {
        config.validate()?;

        let span_ms = (config.to - config.from).num_milliseconds();
        let step_length = Duration::milliseconds(span_ms / i64::from(config.num_time_steps));

        Ok(Self {
            config,
            step_length,
            state: None,
            skipped: 0,
        })
    }

    fn step_start(&self, index: u32) -> DateTime<Utc> {
        self.config.from + self.step_length * index as i32
    }

    /// End of step `index`; the last step ends at `to`
    fn step_end(&self, index: u32) -> DateTime<Utc> {
        if index + 1 >= self.config.num_time_steps {
            self.config.to
        } else {
            self.step_start(index + 1)
        }
    }

    fn step_label(&self, index: u32) -> String {
        let midpoint = self.step_start(index) + (self.step_end(index) - self.step_start(index)) / 2;
        midpoint.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn build_state(&self) -> Result<StepState> {
        let cells = build_grid(&self.config.bbox, self.config.grid_type, self.config.cell_width);

        if cells.is_empty() {
            return Err(Error::configuration(format!(
                "A {:?} grid with {} km cells does not fit into the bounding box",
                self.config.grid_type, self.config.cell_width
            )));
        }

        debug!(
            "Built {:?} grid with {} cells for {} time steps",
            self.config.grid_type,
            cells.len(),
            self.config.num_time_steps
        );

        Ok(StepState {
            idw_values: vec![Vec::with_capacity(self.config.num_time_steps as usize); cells.len()],
            cells,
            timesteps: Vec::new(),
            step_index: 0,
            control_points: BTreeMap::new(),
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            folded: 0,
        })
    }

    /// Interpolate every cell for the current step and clear its control points
    fn interpolate_step(&self, state: &mut StepState) {
        for (cell, values) in state.cells.iter().zip(state.idw_values.iter_mut()) {
            values.push(interpolate(
                cell.centroid,
                state.control_points.values(),
                self.config.power,
            ));
        }

        debug!(
            "Interpolated step {} from {} control points",
            state.step_index,
            state.control_points.len()
        );

        state.timesteps.push(self.step_label(state.step_index));
        state.control_points.clear();
    }

    fn breaks(&self, min: f64, max: f64) -> Vec<f64> {
        let classes = self.config.num_classes;
        let width = (max - min) / f64::from(classes);

        (1..classes).map(|i| min + f64::from(i) * width).collect()
    }
}

impl StreamStage for IdwStage {
    type Input = Measurement;
    type Output = IdwOutput;

    fn name(&self) -> &'static str {
        "idw"
    }

    fn push(&mut self, measurement: Measurement) -> Result<Vec<IdwOutput>> {
        let timestamp = measurement.created_at;

        if timestamp < self.config.from || timestamp > self.config.to {
            self.skipped += 1;
            debug!("Skipping measurement at {} outside of the interval", timestamp);
            return Ok(Vec::new());
        }

        let Some(location) = measurement.location.as_ref() else {
            self.skipped += 1;
            debug!(
                "Skipping measurement of sensor {} without location",
                measurement.sensor_id
            );
            return Ok(Vec::new());
        };

        let value = measurement.value.as_f64()?;

        let mut state = match self.state.take() {
            Some(state) => state,
            None => self.build_state()?,
        };

        while timestamp >= self.step_end(state.step_index)
            && state.step_index + 1 < self.config.num_time_steps
        {
            self.interpolate_step(&mut state);
            state.step_index += 1;
        }

        state
            .control_points
            .entry(measurement.sensor_id.clone())
            .or_insert_with(|| ControlPoint {
                count: 0,
                position: [location.lng, location.lat],
                average: 0.0,
            })
            .fold(value);

        state.min = state.min.min(value);
        state.max = state.max.max(value);
        state.folded += 1;

        self.state = Some(state);
        Ok(Vec::new())
    }

    fn flush(&mut self) -> Result<Vec<IdwOutput>> {
        let skipped = std::mem::take(&mut self.skipped);

        let Some(mut state) = self.state.take().filter(|state| state.folded > 0) else {
            info!("IDW stage received no usable measurements ({} skipped)", skipped);
            return Ok(vec![IdwOutput::NoMeasurements {
                error: IDW_NO_MEASUREMENTS.to_string(),
            }]);
        };

        self.interpolate_step(&mut state);

        info!(
            "Interpolated {} measurements onto {} cells over {} time steps ({} skipped)",
            state.folded,
            state.cells.len(),
            state.timesteps.len(),
            skipped
        );

        let features = state
            .cells
            .into_iter()
            .zip(state.idw_values)
            .map(|(cell, idw_values)| Feature {
                kind: "Feature".to_string(),
                geometry: Polygon {
                    kind: "Polygon".to_string(),
                    coordinates: vec![cell.ring],
                },
                properties: CellProperties { idw_values },
            })
            .collect();

        Ok(vec![
            IdwOutput::Breaks {
                breaks: self.breaks(state.min, state.max),
            },
            IdwOutput::FeatureCollection(FeatureCollection {
                kind: "FeatureCollection".to_string(),
                features,
            }),
            IdwOutput::Timesteps {
                timesteps: state.timesteps,
            },
        ])
    }
}
