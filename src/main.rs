use clap::Parser;
use sensebox_pipeline::cli::{args::Args, commands};
use std::process;
use tokio_util::sync::CancellationToken;

fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // If no subcommand was provided, show help and available commands
    if args.command.is_none() {
        show_help_and_commands();
        process::exit(0);
    }

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        let cancellation_token = CancellationToken::new();

        let shutdown_signal = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("Failed to install CTRL+C signal handler: {}", e);
                std::future::pending::<()>().await;
            }
            cancellation_token.cancel();
        };

        tokio::select! {
            result = commands::run(args, cancellation_token.clone()) => {
                result
            }
            _ = shutdown_signal => {
                eprintln!("\nReceived CTRL+C, shutting down...");
                Err(sensebox_pipeline::Error::cancelled("Interrupted by user"))
            }
        }
    });

    match result {
        Ok(_stats) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            let code = if error.is_client_error() { 2 } else { 1 };
            process::exit(code);
        }
    }
}

/// Show help information and available commands when no subcommand is provided
fn show_help_and_commands() {
    println!("senseBox Pipeline - Measurement Decoding and Streaming Analytics");
    println!("================================================================");
    println!();
    println!("Decode device payloads into measurements and run outlier detection,");
    println!("activity classification, windowed statistics and IDW interpolation.");
    println!();
    println!("USAGE:");
    println!("    sensebox-pipeline <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    decode      Decode a device payload into measurements");
    println!("    stats       Windowed descriptive statistics per sensor");
    println!("    outliers    Mark or replace outliers in one sensor's measurements");
    println!("    idw         Inverse distance weighted interpolation onto a grid");
    println!("    classify    Classify boxes as active, inactive or old");
    println!("    help        Show this help message or help for specific commands");
    println!();
    println!("EXAMPLES:");
    println!("    # Decode a CSV upload and resolve its locations:");
    println!("    sensebox-pipeline decode upload.csv --format text/csv --box box.json --resolve");
    println!();
    println!("    # Daily means per sensor:");
    println!("    sensebox-pipeline stats measurements.jsonl --operation arithmeticMean \\");
    println!("                      --from 2024-05-01T00:00:00Z --to 2024-05-08T00:00:00Z");
    println!();
    println!("    # Hourly IDW over Münster on a hex grid:");
    println!("    sensebox-pipeline idw measurements.jsonl --bbox 7.55,51.9,7.7,52.0 \\");
    println!("                      --from 2024-05-01T00:00:00Z --to 2024-05-01T04:00:00Z \\");
    println!("                      --time-steps 4 --power 2");
    println!();
    println!("For detailed help on any command, use:");
    println!("    sensebox-pipeline <COMMAND> --help");
}
