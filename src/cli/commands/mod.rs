//! Command implementations for the senseBox pipeline CLI
//!
//! Each command is implemented in its own module:
//! - `decode`: payload decoding and location resolution for one box
//! - `analytics`: stream stages over JSON-lines measurement exports
//! - `shared`: logging setup and JSON-lines input/output

pub mod analytics;
pub mod decode;
pub mod shared;

pub use shared::CommandStats;

use crate::cli::args::{Args, Commands};
use crate::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Main command runner
///
/// Sets up logging, loads the configuration and dispatches to the subcommand
/// handler. Stage commands stop as soon as `token` is cancelled.
pub async fn run(args: Args, token: CancellationToken) -> Result<CommandStats> {
    shared::setup_logging(&args)?;
    debug!("Command line arguments: {:?}", args);

    let config = args.load_config()?;
    config.validate()?;

    let command = args
        .command
        .as_ref()
        .ok_or_else(|| Error::configuration("No command given"))?;

    let stats = match command {
        Commands::Decode(decode_args) => decode::run_decode(decode_args, &config).await?,
        Commands::Stats(stats_args) => analytics::run_stats(stats_args, &config, token).await?,
        Commands::Outliers(outlier_args) => {
            analytics::run_outliers(outlier_args, &config, token).await?
        }
        Commands::Idw(idw_args) => analytics::run_idw(idw_args, &config, token).await?,
        Commands::Classify(classify_args) => analytics::run_classify(classify_args, token).await?,
    };

    info!(
        "Read {} records, wrote {} records",
        stats.records_read, stats.records_written
    );
    Ok(stats)
}
