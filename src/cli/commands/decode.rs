//! Decode command implementation
//!
//! Decodes one payload file for the box described by a JSON document and
//! writes the measurements as JSON lines. With `--resolve` the measurements
//! are located against the box's timeline first, and `--updated-box` saves
//! the box with its extended timeline and refreshed sensors.

use super::shared::{CommandStats, read_input, read_json_file, write_json_lines};
use crate::app::models::SenseBox;
use crate::app::services::decoder::{DecodeContext, decode};
use crate::app::services::location_resolver::prepare_measurements;
use crate::cli::args::DecodeArgs;
use crate::config::Config;
use crate::{Error, Result};
use futures::stream;
use tracing::info;

/// Run the decode command
pub async fn run_decode(args: &DecodeArgs, config: &Config) -> Result<CommandStats> {
    let payload = read_input(&args.payload).await?;
    let mut sense_box: SenseBox = read_json_file(&args.box_file).await?;

    let measurements = {
        let mut ctx = DecodeContext::for_box(&sense_box).with_config(config.decoder);
        if let Some(now) = args.now {
            ctx = ctx.with_now(now);
        }
        decode(args.format, &payload, &ctx)?
    };

    info!(
        "Decoded {} measurements for box {} ({})",
        measurements.len(),
        sense_box.id,
        args.format
    );

    let measurements = if args.should_resolve() {
        let before = sense_box.locations.len();
        let located = prepare_measurements(&mut sense_box, measurements)?;
        info!(
            "Resolved locations, timeline grew from {} to {} events",
            before,
            sense_box.locations.len()
        );
        located
    } else {
        measurements
    };

    if let Some(path) = &args.updated_box {
        let document = serde_json::to_string_pretty(&sense_box)?;
        tokio::fs::write(path, document)
            .await
            .map_err(|e| Error::io(format!("Failed to write {}", path.display()), e))?;
        info!("Wrote updated box to {}", path.display());
    }

    let records_read = measurements.len();
    let records_written = write_json_lines(stream::iter(measurements.into_iter().map(Ok))).await?;

    Ok(CommandStats {
        records_read,
        records_written,
    })
}
