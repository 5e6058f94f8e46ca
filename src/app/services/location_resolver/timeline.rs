//! Single insertions into a box's location timeline

use crate::app::models::{LocationEvent, Point, SenseBox};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Insert a fix into the box's timeline, or reuse an existing one
///
/// Without `coords` the event valid at `timestamp` is returned; a timestamp
/// before the first known event re-dates that first event instead. With
/// `coords` a new event is only inserted when both the position and the
/// timestamp differ from the preceding event, so repeated identical fixes do
/// not grow the timeline and a box is never at two places at once. A fix
/// before the first event at that event's position re-dates it as well.
///
/// `current_location` follows the timeline when the change lands at its end.
///
/// # Arguments
///
/// * `sense_box` - Box whose timeline is updated
/// * `coords` - Reported position, if any
/// * `timestamp` - Time the position is valid from
///
/// # Returns
///
/// The event that is valid at `timestamp` after the update
pub fn update_location(
    sense_box: &mut SenseBox,
    coords: Option<&Point>,
    timestamp: DateTime<Utc>,
) -> Result<LocationEvent> {
    if sense_box.locations.is_empty() {
        return Err(Error::validation(format!(
            "Box {} has no location timeline",
            sense_box.id
        )));
    }

    let later_index = sense_box
        .locations
        .iter()
        .position(|event| timestamp < event.timestamp)
        .unwrap_or(sense_box.locations.len());
    let earlier = later_index
        .checked_sub(1)
        .map(|index| sense_box.locations[index].clone());

    let Some(point) = coords else {
        return Ok(match earlier {
            Some(earlier) => earlier,
            None => redate_first(sense_box, timestamp),
        });
    };

    point.validate()?;

    match earlier {
        Some(earlier) if earlier.point.same_position(point) || earlier.timestamp == timestamp => {
            return Ok(earlier);
        }
        None if sense_box.locations[later_index].point.same_position(point) => {
            return Ok(redate_first(sense_box, timestamp));
        }
        _ => {}
    }

    let event = LocationEvent::new(point.clone(), timestamp);
    sense_box.locations.insert(later_index, event.clone());

    if later_index + 1 == sense_box.locations.len() {
        sense_box.current_location = event.clone();
    }

    debug!(
        "Inserted location ({}, {}) at {} into timeline of box {} (position {} of {})",
        point.lng,
        point.lat,
        timestamp,
        sense_box.id,
        later_index,
        sense_box.locations.len()
    );

    Ok(event)
}

/// Move the first event of a non-empty timeline back to `timestamp`
fn redate_first(sense_box: &mut SenseBox, timestamp: DateTime<Utc>) -> LocationEvent {
    let first = &mut sense_box.locations[0];
    first.timestamp = timestamp;
    let event = first.clone();

    if sense_box.locations.len() == 1 {
        sense_box.current_location = event.clone();
    }

    debug!(
        "Re-dated first location of box {} to {}",
        sense_box.id, timestamp
    );
    event
}
