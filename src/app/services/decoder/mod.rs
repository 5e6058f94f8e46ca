//! Multi-format measurement decoder
//!
//! This module turns device payloads into canonical [`Measurement`]s bound to
//! the sensors of the addressed box. One decoder exists per wire format; all
//! of them implement [`Decode`] and are selected through the closed
//! [`ContentType`] enum rather than by string lookup.
//!
//! ## Architecture
//!
//! - [`json`] - JSON object (`{sensorId: value}`) and array (`[{sensor, value}]`) payloads
//! - [`csv_lines`] - `sensorId,value[,createdAt[,lng,lat[,height]]]` lines
//! - [`luftdaten`] - sensor.community `sensordatavalues` payloads
//! - [`hackair`] - hackAir `reading` payloads
//! - [`bytes`] - fixed-width binary tuples, with or without timestamp
//! - [`validation`] - value, timestamp, location and ownership checks shared by all decoders
//!
//! ## Usage
//!
//! ```rust
//! use sensebox_pipeline::app::services::decoder::{decode, ContentType, DecodeContext};
//! use sensebox_pipeline::Sensor;
//!
//! # fn example() -> sensebox_pipeline::Result<()> {
//! let sensors = vec![Sensor::new("5a0c2cc89fd3c200111118f0", "Temperatur", "°C", "HDC1080")];
//! let ctx = DecodeContext::new("box-1", &sensors);
//!
//! let content_type: ContentType = "text/csv".parse()?;
//! let measurements = decode(content_type, b"5a0c2cc89fd3c200111118f0,21.4", &ctx)?;
//! assert_eq!(measurements.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod bytes;
pub mod csv_lines;
pub mod hackair;
pub mod json;
pub mod luftdaten;
pub mod validation;

#[cfg(test)]
pub mod tests;

use crate::app::models::{Measurement, SenseBox, Sensor};
use crate::config::DecoderConfig;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub use bytes::BytesDecoder;
pub use csv_lines::CsvDecoder;
pub use hackair::HackAirDecoder;
pub use json::JsonDecoder;
pub use luftdaten::LuftdatenDecoder;
pub use validation::ensure_sensors_belong;

/// Wire formats accepted from devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// `application/json` - object or array shape, told apart by the payload
    Json,
    /// `text/csv`
    Csv,
    /// Luftdaten firmware JSON (selected by query flag)
    Luftdaten,
    /// hackAir JSON (selected by query flag)
    HackAir,
    /// `application/sbx-bytes`
    Bytes,
    /// `application/sbx-bytes-ts`
    BytesTimestamped,
}

impl ContentType {
    /// Canonical name of the content type
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Csv => "text/csv",
            ContentType::Luftdaten => "luftdaten",
            ContentType::HackAir => "hackair",
            ContentType::Bytes => "application/sbx-bytes",
            ContentType::BytesTimestamped => "application/sbx-bytes-ts",
        }
    }
}

impl FromStr for ContentType {
    type Err = Error;

    /// Parse a content-type header value; parameters such as `charset` are ignored
    fn from_str(s: &str) -> Result<Self> {
        let essence = s.split(';').next().unwrap_or_default().trim().to_lowercase();

        match essence.as_str() {
            "json" | "application/json" => Ok(ContentType::Json),
            "csv" | "text/csv" => Ok(ContentType::Csv),
            "luftdaten" => Ok(ContentType::Luftdaten),
            "hackair" => Ok(ContentType::HackAir),
            "application/sbx-bytes" => Ok(ContentType::Bytes),
            "application/sbx-bytes-ts" => Ok(ContentType::BytesTimestamped),
            _ => Err(Error::unsupported_content_type(s.trim())),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a decoder needs to know about the addressed box
#[derive(Debug, Clone)]
pub struct DecodeContext<'a> {
    /// Identifier of the addressed box
    pub box_id: &'a str,
    /// Sensor catalog of the addressed box
    pub sensors: &'a [Sensor],
    /// Reception time, used for missing `createdAt` and the future check
    pub now: DateTime<Utc>,
    /// Decoder limits
    pub config: DecoderConfig,
}

impl<'a> DecodeContext<'a> {
    /// Create a context with the current time and default limits
    pub fn new(box_id: &'a str, sensors: &'a [Sensor]) -> Self {
        Self {
            box_id,
            sensors,
            now: Utc::now(),
            config: DecoderConfig::default(),
        }
    }

    /// Create a context from a box's id and sensor catalog
    pub fn for_box(sense_box: &'a SenseBox) -> Self {
        Self::new(&sense_box.id, &sense_box.sensors)
    }

    /// Override the reception time
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Override the decoder limits
    pub fn with_config(mut self, config: DecoderConfig) -> Self {
        self.config = config;
        self
    }

    /// Latest `createdAt` that is not considered to be in the future
    pub fn latest_allowed(&self) -> DateTime<Utc> {
        self.now + self.config.future_tolerance()
    }
}

/// A decoder for one wire format
pub trait Decode: Send + Sync {
    /// Short name of the format, used in errors and logs
    fn format(&self) -> &'static str;

    /// Decode a payload into validated measurements
    fn decode(&self, payload: &[u8], ctx: &DecodeContext<'_>) -> Result<Vec<Measurement>>;
}

/// Registry lookup from content type to decoder
pub fn decoder_for(content_type: ContentType) -> &'static dyn Decode {
    match content_type {
        ContentType::Json => &JsonDecoder,
        ContentType::Csv => &CsvDecoder,
        ContentType::Luftdaten => &LuftdatenDecoder,
        ContentType::HackAir => &HackAirDecoder,
        ContentType::Bytes => &BytesDecoder::PLAIN,
        ContentType::BytesTimestamped => &BytesDecoder::TIMESTAMPED,
    }
}

/// Decode a payload addressed to one box
///
/// Enforces the byte tuple cap before decoding and checks afterwards that
/// every measurement belongs to one of the box's sensors.
///
/// # Arguments
///
/// * `content_type` - Wire format of the payload
/// * `payload` - Raw request body
/// * `ctx` - Sensor catalog, reception time and limits
///
/// # Returns
///
/// The decoded measurements, in payload order except for the JSON object
/// shape, which yields them ordered by sensor id
pub fn decode(
    content_type: ContentType,
    payload: &[u8],
    ctx: &DecodeContext<'_>,
) -> Result<Vec<Measurement>> {
    let decoder = decoder_for(content_type);

    if let Some(tuple_len) = BytesDecoder::tuple_len_for(content_type) {
        let tuples = payload.len() / tuple_len;
        if tuples > ctx.config.max_byte_tuples {
            return Err(Error::decode(
                decoder.format(),
                format!(
                    "Payload carries {} tuples, at most {} are accepted",
                    tuples, ctx.config.max_byte_tuples
                ),
            ));
        }
    }

    let measurements = decoder.decode(payload, ctx)?;
    ensure_sensors_belong(ctx.box_id, ctx.sensors, &measurements)?;

    debug!(
        "Decoded {} measurements for box {} from {} bytes of {}",
        measurements.len(),
        ctx.box_id,
        payload.len(),
        content_type
    );

    Ok(measurements)
}
