//! Application constants for the senseBox pipeline
//!
//! This module contains wire-format sizes, validation tolerances, matching
//! tables for third-party payload dialects, and default stage parameters.

// =============================================================================
// Raw Byte Payloads
// =============================================================================

/// Length of a sensor identifier inside a byte tuple
pub const BYTES_SENSOR_ID_LEN: usize = 12;

/// Length of the little-endian f32 value inside a byte tuple
pub const BYTES_VALUE_LEN: usize = 4;

/// Length of the optional little-endian u32 unix timestamp
pub const BYTES_TIMESTAMP_LEN: usize = 4;

/// Tuple size for `application/sbx-bytes`
pub const BYTES_TUPLE_LEN: usize = BYTES_SENSOR_ID_LEN + BYTES_VALUE_LEN;

/// Tuple size for `application/sbx-bytes-ts`
pub const BYTES_TS_TUPLE_LEN: usize = BYTES_TUPLE_LEN + BYTES_TIMESTAMP_LEN;

/// Maximum number of byte tuples accepted in one payload
pub const DEFAULT_MAX_BYTE_TUPLES: usize = 2500;

// =============================================================================
// Validation
// =============================================================================

/// How far in the future a measurement timestamp may lie (clock skew)
pub const DEFAULT_FUTURE_TOLERANCE_SECS: i64 = 60;

/// Minimum number of CSV fields per line (`sensorId,value`)
pub const CSV_MIN_FIELDS: usize = 2;

/// Maximum number of CSV fields per line (`sensorId,value,createdAt,lng,lat,height`)
pub const CSV_MAX_FIELDS: usize = 6;

/// Strict RFC 3339 UTC layout accepted for `createdAt`
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

// =============================================================================
// Luftdaten Matching
// =============================================================================

/// Phenomenon tables for the Luftdaten (sensor.community) JSON dialect
pub mod luftdaten {
    /// A phenomenon reported by Luftdaten firmware
    #[derive(Debug)]
    pub struct Phenomenon {
        /// Stable phenomenon key
        pub key: &'static str,
        /// `value_type` tokens naming this phenomenon (after the sensor prefix)
        pub tokens: &'static [&'static str],
        /// Lower-cased sensor titles that represent this phenomenon
        pub title_aliases: &'static [&'static str],
    }

    pub const PM10: Phenomenon = Phenomenon {
        key: "pm10",
        tokens: &["p1"],
        title_aliases: &["pm10", "p10", "p1"],
    };

    pub const PM25: Phenomenon = Phenomenon {
        key: "pm2.5",
        tokens: &["p2"],
        title_aliases: &["pm2.5", "pm25", "p2.5", "p25", "p2"],
    };

    pub const TEMPERATURE: Phenomenon = Phenomenon {
        key: "temperature",
        tokens: &["temperature"],
        title_aliases: &["temperatur", "temperature"],
    };

    pub const HUMIDITY: Phenomenon = Phenomenon {
        key: "humidity",
        tokens: &["humidity"],
        title_aliases: &[
            "rel. luftfeuchte",
            "luftfeuchtigkeit",
            "luftfeuchte",
            "humidity",
            "rel. humidity",
        ],
    };

    pub const PRESSURE: Phenomenon = Phenomenon {
        key: "pressure",
        tokens: &["pressure"],
        title_aliases: &["luftdruck", "druck", "pressure", "air pressure", "atmospheric pressure"],
    };

    pub const SIGNAL: Phenomenon = Phenomenon {
        key: "signal",
        tokens: &["signal"],
        title_aliases: &["signal", "stärke", "signalstärke", "wifi signal"],
    };

    /// All phenomena in matching order
    pub const PHENOMENA: &[Phenomenon] = &[PM10, PM25, TEMPERATURE, HUMIDITY, PRESSURE, SIGNAL];

    /// Sensor-type prefix assumed for `value_type`s sent without one.
    ///
    /// DHT sensors report bare `temperature`/`humidity`; the WiFi signal
    /// carries no sensor type, so any sensor type matches.
    pub const PREFIXLESS_SENSOR_TYPES: &[(&str, &str)] = &[
        ("temperature", "dht"),
        ("humidity", "dht"),
        ("pressure", "bmp"),
        ("signal", ""),
    ];
}

// =============================================================================
// hackAir Matching
// =============================================================================

/// Alias table for the hackAir JSON dialect, matched against sensor titles
pub mod hackair {
    pub const ALIASES: &[(&str, &[&str])] = &[
        ("pm10", &["pm10"]),
        ("pm2.5", &["pm2.5", "pm25"]),
        ("temperature", &["temperature", "temperatur"]),
        ("humidity", &["humidity", "luftfeuchte", "luftfeuchtigkeit"]),
    ];
}

// =============================================================================
// Stream Stage Defaults
// =============================================================================

/// Smallest accepted outlier window
pub const OUTLIER_MIN_WINDOW: usize = 1;

/// Largest accepted outlier window
pub const OUTLIER_MAX_WINDOW: usize = 50;

/// Default outlier window
pub const DEFAULT_OUTLIER_WINDOW: usize = 15;

/// Modified z-score above which a value is flagged
pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 3.5;

/// Consistency constant relating MAD to the standard deviation (0.6745)
pub const MAD_CONSISTENCY: f64 = 0.6745;

/// Consistency constant relating mean absolute deviation to the standard deviation
pub const MEAN_AD_CONSISTENCY: f64 = 1.253314;

/// Boxes whose newest measurement is younger than this are active
pub const ACTIVE_MAX_AGE_DAYS: i64 = 7;

/// Boxes whose newest measurement is younger than this (and not active) are inactive
pub const INACTIVE_MAX_AGE_DAYS: i64 = 30;

/// Accepted IDW power range
pub const IDW_MIN_POWER: u8 = 1;
pub const IDW_MAX_POWER: u8 = 9;

/// Accepted IDW time step range
pub const IDW_MIN_TIME_STEPS: u32 = 1;
pub const IDW_MAX_TIME_STEPS: u32 = 10;

/// Default number of classes for IDW breaks
pub const DEFAULT_IDW_CLASSES: u32 = 6;

/// Mean earth radius in kilometres used for great-circle distances
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Result emitted by the IDW stage when no measurement was consumed
pub const IDW_NO_MEASUREMENTS: &str = "no measurements found";
