//! Location assignment for a measurement batch
//!
//! The batch is processed in `createdAt` order. For each measurement the
//! nearest event at or before its timestamp is looked up in both the stored
//! timeline and the events created earlier in the same batch. Consecutive
//! measurements that stay within the validity span of the resolved event, and
//! do not declare a different position, reuse it without another scan.

use crate::app::models::{LocationEvent, Measurement, Point, SenseBox};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

/// An event together with the start of the next one
#[derive(Debug, Clone)]
struct Resolved {
    event: LocationEvent,
    valid_until: Option<DateTime<Utc>>,
}

impl Resolved {
    fn covers(&self, timestamp: DateTime<Utc>, declared: Option<&Point>) -> bool {
        timestamp >= self.event.timestamp
            && self.valid_until.is_none_or(|until| timestamp < until)
            && declared.is_none_or(|point| point.same_position(&self.event.point))
    }
}

/// Assign every measurement the location valid at its `createdAt`
///
/// New events are created for declared positions that differ from the one in
/// effect and merged into the timeline at the end, sorted by timestamp.
///
/// # Arguments
///
/// * `sense_box` - Box whose timeline is read and extended
/// * `measurements` - Batch in any order
///
/// # Returns
///
/// The measurements sorted by `createdAt` with `location` set
pub fn resolve_batch(
    sense_box: &mut SenseBox,
    mut measurements: Vec<Measurement>,
) -> Result<Vec<Measurement>> {
    if measurements.is_empty() {
        return Ok(measurements);
    }

    if sense_box.locations.is_empty() {
        return Err(Error::validation(format!(
            "Box {} has no location timeline",
            sense_box.id
        )));
    }

    measurements.sort_by_key(|measurement| measurement.created_at);

    let mut fresh: Vec<LocationEvent> = Vec::new();
    let mut current: Option<Resolved> = None;

    for measurement in &mut measurements {
        let declared = measurement.location.as_ref();

        let reusable = current
            .as_ref()
            .is_some_and(|resolved| resolved.covers(measurement.created_at, declared));

        if !reusable {
            if let Some(point) = declared {
                point.validate()?;
            }
            current = Some(resolve_one(
                sense_box,
                &mut fresh,
                declared,
                measurement.created_at,
            ));
        }

        if let Some(resolved) = &current {
            measurement.location = Some(resolved.event.point.clone());
        }
    }

    if !fresh.is_empty() {
        debug!(
            "Adding {} locations to timeline of box {}",
            fresh.len(),
            sense_box.id
        );
        sense_box.locations.extend(fresh);
        sense_box.locations.sort_by_key(|event| event.timestamp);
    }

    if let Some(last) = sense_box.locations.last() {
        if *last != sense_box.current_location {
            sense_box.current_location = last.clone();
        }
    }

    debug_assert!(sense_box.timeline_is_consistent());

    Ok(measurements)
}

/// Find or create the event valid at `timestamp`
fn resolve_one(
    sense_box: &mut SenseBox,
    fresh: &mut Vec<LocationEvent>,
    declared: Option<&Point>,
    timestamp: DateTime<Utc>,
) -> Resolved {
    let mut earlier: Option<&LocationEvent> = None;
    let mut valid_until: Option<DateTime<Utc>> = None;

    for event in sense_box.locations.iter().chain(fresh.iter()) {
        if event.timestamp <= timestamp {
            if earlier.is_none_or(|found| event.timestamp > found.timestamp) {
                earlier = Some(event);
            }
        } else if valid_until.is_none_or(|until| event.timestamp < until) {
            valid_until = Some(event.timestamp);
        }
    }

    match (earlier.cloned(), declared) {
        (Some(found), None) => Resolved {
            event: found,
            valid_until,
        },
        (Some(found), Some(point))
            if found.point.same_position(point) || found.timestamp == timestamp =>
        {
            Resolved {
                event: found,
                valid_until,
            }
        }
        (None, Some(point)) if point.same_position(&sense_box.locations[0].point) => {
            redate_first(sense_box, fresh, timestamp)
        }
        (_, Some(point)) => {
            let event = LocationEvent::new(point.clone(), timestamp);
            fresh.push(event.clone());
            Resolved { event, valid_until }
        }
        (None, None) => redate_first(sense_box, fresh, timestamp),
    }
}

/// Move the registration event back to a timestamp before every known fix
fn redate_first(
    sense_box: &mut SenseBox,
    fresh: &[LocationEvent],
    timestamp: DateTime<Utc>,
) -> Resolved {
    let first = &mut sense_box.locations[0];
    first.timestamp = timestamp;
    let event = first.clone();

    debug!(
        "Re-dated first location of box {} to {}",
        sense_box.id, timestamp
    );

    let valid_until = sense_box.locations[1..]
        .iter()
        .chain(fresh.iter())
        .map(|event| event.timestamp)
        .filter(|until| *until > timestamp)
        .min();

    Resolved { event, valid_until }
}
