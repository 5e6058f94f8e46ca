//! Location resolution for incoming measurements
//!
//! Every stored measurement carries a position. Devices may send one with each
//! measurement, or rely on the box's location timeline: the ordered history of
//! fixes the box reported. This module keeps that timeline ordered and
//! deduplicated while assigning each measurement the position that was valid
//! at its `createdAt`.
//!
//! ## Architecture
//!
//! - [`timeline`] - single insertions into a box's timeline ([`update_location`])
//! - [`batch`] - location assignment for a whole measurement batch ([`resolve_batch`])
//!
//! The functions here are the only code that mutates a box's timeline or its
//! sensors' `last_measurement`. Callers serialize saves to the same box.

pub mod batch;
pub mod timeline;

#[cfg(test)]
pub mod tests;

use crate::Result;
use crate::app::models::{Measurement, SenseBox};
use crate::app::services::decoder::ensure_sensors_belong;
use std::collections::HashMap;
use tracing::debug;

pub use batch::resolve_batch;
pub use timeline::update_location;

/// Record the newest measurement of the batch as each sensor's `last_measurement`
///
/// A sensor is only touched when the batch holds a measurement newer than the
/// one already stored.
///
/// # Returns
///
/// Number of sensors whose `last_measurement` changed
pub fn update_sensors(sense_box: &mut SenseBox, measurements: &[Measurement]) -> usize {
    let mut newest: HashMap<&str, &Measurement> = HashMap::new();

    for measurement in measurements {
        newest
            .entry(measurement.sensor_id.as_str())
            .and_modify(|stored| {
                if measurement.created_at >= stored.created_at {
                    *stored = measurement;
                }
            })
            .or_insert(measurement);
    }

    let mut updated = 0;
    for sensor in &mut sense_box.sensors {
        let Some(candidate) = newest.get(sensor.id.as_str()) else {
            continue;
        };

        let is_newer = sensor
            .last_measurement
            .as_ref()
            .is_none_or(|last| candidate.created_at > last.created_at);

        if is_newer {
            sensor.last_measurement = Some((*candidate).clone());
            updated += 1;
        }
    }

    debug!(
        "Updated last measurement of {} sensors of box {}",
        updated, sense_box.id
    );
    updated
}

/// Prepare a decoded batch for storage
///
/// Checks sensor ownership, resolves locations against the box's timeline and
/// updates the sensors' `last_measurement`, in that order.
///
/// # Arguments
///
/// * `sense_box` - The addressed box; its timeline and sensors are updated in place
/// * `measurements` - Decoded measurements in any order
///
/// # Returns
///
/// The measurements sorted by `createdAt`, each carrying its resolved location
pub fn prepare_measurements(
    sense_box: &mut SenseBox,
    measurements: Vec<Measurement>,
) -> Result<Vec<Measurement>> {
    ensure_sensors_belong(&sense_box.id, &sense_box.sensors, &measurements)?;

    let located = resolve_batch(sense_box, measurements)?;
    update_sensors(sense_box, &located);

    Ok(located)
}
