//! Analytics command implementations
//!
//! Each command reads JSON-lines records lazily, pipes them through one stream
//! stage and writes the stage output as JSON lines. The stage stream stops at the
//! first malformed record or stage error and when the run is cancelled.

use super::shared::{CommandStats, documents_stream, json_lines_stream, write_json_lines};
use crate::Result;
use crate::app::models::{Measurement, SenseBox};
use crate::app::services::stream_stages::{
    ClassificationStage, DescriptiveStatsStage, IdwStage, OutlierStage, StageStreamExt,
};
use crate::cli::args::{ClassifyArgs, IdwArgs, OutliersArgs, StatsArgs};
use crate::config::Config;
use chrono::Utc;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Windowed descriptive statistics per sensor
pub async fn run_stats(
    args: &StatsArgs,
    config: &Config,
    token: CancellationToken,
) -> Result<CommandStats> {
    let statistics = args.statistics_config(config)?;
    info!(
        "Computing {} over {} windows",
        statistics.operation,
        statistics.window_count()
    );

    let stage = DescriptiveStatsStage::new(statistics)?;
    let mut records_read = 0;
    let records = json_lines_stream::<Measurement>(&args.input)
        .await?
        .inspect(|_| records_read += 1);
    let records_written =
        write_json_lines(records.through(stage).with_cancellation(token)).await?;

    Ok(CommandStats {
        records_read,
        records_written,
    })
}

/// Outlier marking or replacement for one sensor's series
pub async fn run_outliers(
    args: &OutliersArgs,
    config: &Config,
    token: CancellationToken,
) -> Result<CommandStats> {
    let outlier = args.outlier_config(config)?;
    info!(
        "Detecting outliers over {} values in {:?} mode",
        outlier.window_size, outlier.mode
    );

    let stage = OutlierStage::new(outlier)?;
    let mut records_read = 0;
    let records = json_lines_stream::<Measurement>(&args.input)
        .await?
        .inspect(|_| records_read += 1);
    let records_written =
        write_json_lines(records.through(stage).with_cancellation(token)).await?;

    Ok(CommandStats {
        records_read,
        records_written,
    })
}

/// Inverse-distance-weighted interpolation over a grid
pub async fn run_idw(
    args: &IdwArgs,
    config: &Config,
    token: CancellationToken,
) -> Result<CommandStats> {
    let idw = args.idw_config(config)?;
    info!(
        "Interpolating {} time steps on a {:?} grid of {} km cells",
        idw.num_time_steps, idw.grid_type, idw.cell_width
    );

    let stage = IdwStage::new(idw)?;
    let mut records_read = 0;
    let records = json_lines_stream::<Measurement>(&args.input)
        .await?
        .inspect(|_| records_read += 1);
    let records_written =
        write_json_lines(records.through(stage).with_cancellation(token)).await?;

    Ok(CommandStats {
        records_read,
        records_written,
    })
}

/// Activity classification of boxes
pub async fn run_classify(args: &ClassifyArgs, token: CancellationToken) -> Result<CommandStats> {
    let now = args.now.unwrap_or_else(Utc::now);
    info!("Classifying boxes relative to {}", now);

    let stage = ClassificationStage::new(now);
    let (records_read, records) = documents_stream::<SenseBox>(&args.input).await?;
    let records_written =
        write_json_lines(records.through(stage).with_cancellation(token)).await?;

    Ok(CommandStats {
        records_read,
        records_written,
    })
}
