//! Integration tests for the stream stages driven as async pipelines
//!
//! Stages are configured from a JSON configuration file and run through
//! `StageStream` over in-memory record streams.

use chrono::{DateTime, Duration, TimeZone, Utc};
use futures::{StreamExt, stream};
use sensebox_pipeline::app::services::stream_stages::idw::IdwOutput;
use sensebox_pipeline::app::services::stream_stages::{
    ActivityState, ClassificationStage, IdwStage, OutlierStage, StageStreamExt,
};
use sensebox_pipeline::config::{GridType, OutlierMode};
use sensebox_pipeline::{Config, Error, Measurement, Point, SenseBox, Sensor};
use std::io::Write;
use tokio_util::sync::CancellationToken;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
}

fn write_config(json: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

fn located(sensor_id: &str, minutes: i64, value: f64, lng: f64, lat: f64) -> Measurement {
    Measurement::new(sensor_id, value, start() + Duration::minutes(minutes))
        .with_location(Point::new(lng, lat))
}

/// Test an IDW run configured from a file
///
/// Purpose: Validate the emitted record order and grid values of a two-step run
/// Benefit: Ensures file configuration, stage and async adapter agree
#[tokio::test]
async fn test_idw_pipeline_from_config_file() {
    let file = write_config(
        r#"{
            "idw": {
                "bbox": {"west": 7.60, "south": 51.95, "east": 7.64, "north": 51.97},
                "gridType": "square",
                "cellWidth": 1.0,
                "power": 2,
                "numTimeSteps": 2,
                "numClasses": 4,
                "from": "2024-05-01T00:00:00Z",
                "to": "2024-05-01T02:00:00Z"
            }
        }"#,
    );
    let config = Config::from_json_file(file.path()).unwrap();
    let idw = config.idw.clone().unwrap();
    assert_eq!(idw.grid_type, GridType::Square);

    let measurements = vec![
        located("a", 10, 10.0, 7.61, 51.955),
        located("b", 20, 30.0, 7.63, 51.965),
        located("a", 40, 12.0, 7.61, 51.955),
        located("a", 70, 14.0, 7.61, 51.955),
    ];

    let outputs: Vec<_> = stream::iter(measurements.into_iter().map(Ok::<_, Error>))
        .through(IdwStage::new(idw).unwrap())
        .collect()
        .await;
    let outputs: Vec<IdwOutput> = outputs.into_iter().collect::<Result<_, _>>().unwrap();

    assert_eq!(outputs.len(), 3);

    let IdwOutput::Breaks { breaks } = &outputs[0] else {
        panic!("expected breaks first, got {:?}", outputs[0]);
    };
    assert_eq!(breaks.len(), 3);
    assert!(breaks.windows(2).all(|pair| pair[0] <= pair[1]));

    let IdwOutput::FeatureCollection(collection) = &outputs[1] else {
        panic!("expected the grid second, got {:?}", outputs[1]);
    };
    assert!(!collection.features.is_empty());
    for feature in &collection.features {
        let values = &feature.properties.idw_values;
        assert_eq!(values.len(), 2);

        // First step blends both sensors, second only has sensor a
        let first = values[0].unwrap();
        assert!((11.0..=30.0).contains(&first), "{first}");
        assert!((values[1].unwrap() - 14.0).abs() < 1e-9);
    }

    let IdwOutput::Timesteps { timesteps } = &outputs[2] else {
        panic!("expected timesteps last, got {:?}", outputs[2]);
    };
    assert_eq!(
        timesteps,
        &vec![
            "2024-05-01T00:30:00.000Z".to_string(),
            "2024-05-01T01:30:00.000Z".to_string()
        ]
    );
}

/// Test the outlier stage configured from a file
///
/// Purpose: Validate replace mode substitutes the window median for a spike
/// Benefit: Ensures configured outlier settings reach the stage
#[tokio::test]
async fn test_outlier_replace_pipeline() {
    let file = write_config(r#"{"outlier": {"window_size": 4, "mode": "replace"}}"#);
    let config = Config::from_json_file(file.path()).unwrap();
    assert_eq!(config.outlier.mode, OutlierMode::Replace);

    let values = [10.0, 10.2, 9.8, 10.1, 60.0, 10.0];
    let measurements = values
        .iter()
        .enumerate()
        .map(|(i, value)| Measurement::new("s", *value, start() + Duration::minutes(i as i64)));

    let records: Vec<_> = stream::iter(measurements.map(Ok::<_, Error>))
        .through(OutlierStage::new(config.outlier).unwrap())
        .map(|record| record.unwrap())
        .collect()
        .await;

    assert_eq!(records.len(), values.len());
    assert!(records.iter().all(|record| record.is_outlier.is_none()));

    let replaced = records[4].measurement.value.as_f64().unwrap();
    assert!((replaced - 10.05).abs() < 1e-9, "{replaced}");
    assert_eq!(records[5].measurement.value.as_f64().unwrap(), 10.0);
}

/// Test classification of a mixed fleet
///
/// Purpose: Validate the three activity states against a fixed reference time
/// Benefit: Ensures the stage reads each sensor's last measurement
#[tokio::test]
async fn test_classification_pipeline() {
    let now = start() + Duration::days(60);
    let registered = start() - Duration::days(365);

    let with_last = |id: &str, last: Option<DateTime<Utc>>| {
        let sensor_id = format!("{id}-t");
        let mut sensor = Sensor::new(sensor_id.clone(), "Temperatur", "°C", "HDC1080");
        sensor.last_measurement = last.map(|at| Measurement::new(sensor_id, 20.0, at));
        SenseBox::new(id, vec![sensor], Point::new(7.6, 51.9), registered).unwrap()
    };

    let boxes = vec![
        with_last("fresh", Some(now - Duration::hours(2))),
        with_last("quiet", Some(now - Duration::days(10))),
        with_last("stale", Some(now - Duration::days(45))),
        with_last("never", None),
    ];

    let states: Vec<_> = stream::iter(boxes.into_iter().map(Ok::<_, Error>))
        .through(ClassificationStage::new(now))
        .map(|record| record.map(|classified| (classified.box_id, classified.state)))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(
        states,
        vec![
            ("fresh".to_string(), ActivityState::Active),
            ("quiet".to_string(), ActivityState::Inactive),
            ("stale".to_string(), ActivityState::Old),
            ("never".to_string(), ActivityState::Old),
        ]
    );
}

/// Test cancellation of a pipeline that never ends
///
/// Purpose: Validate that a cancelled stage stream yields one error and stops
/// Benefit: Ensures an abandoned consumer releases the pipeline
#[tokio::test]
async fn test_cancelled_pipeline_stops() {
    let token = CancellationToken::new();
    let upstream = stream::iter(vec![Ok::<_, Error>(Measurement::new("s", 1.0, start()))])
        .chain(stream::pending());

    let mut pipeline = upstream
        .through(OutlierStage::new(Default::default()).unwrap())
        .with_cancellation(token.clone());

    let first = pipeline.next().await.unwrap().unwrap();
    assert_eq!(first.measurement.sensor_id, "s");

    token.cancel();
    assert!(matches!(
        pipeline.next().await,
        Some(Err(Error::Cancelled { .. }))
    ));
    assert!(pipeline.next().await.is_none());
}
