//! Shared components for CLI commands
//!
//! Logging setup, the per-command summary, and JSON-lines input and output.
//! Measurement input is one JSON document per line; `-` reads from stdin.

use crate::cli::args::Args;
use crate::{Error, Result};
use futures::{Stream, StreamExt, stream};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::debug;

/// Record counts reported after a command finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandStats {
    /// Input records read
    pub records_read: usize,
    /// Output records written
    pub records_written: usize,
}

/// Set up structured logging on stderr
pub fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sensebox_pipeline={}", log_level)));

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
            .map_err(|e| Error::internal(format!("Failed to initialize logging: {e}")))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .map_err(|e| Error::internal(format!("Failed to initialize logging: {e}")))?;
    }

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Read a whole input file, or stdin for `-`
pub async fn read_input(path: &Path) -> Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buffer = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut buffer)
            .await
            .map_err(|e| Error::io("Failed to read stdin", e))?;
        return Ok(buffer);
    }

    tokio::fs::read(path)
        .await
        .map_err(|e| Error::io(format!("Failed to read {}", path.display()), e))
}

/// Read a single JSON document
pub async fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_input(path).await?;
    serde_json::from_slice(&content).map_err(|e| {
        Error::validation(format!("{} is not a valid document: {e}", path.display()))
    })
}

/// Parse JSON lines, skipping blank lines
///
/// Each line parses independently; a malformed line becomes an error item
/// naming its 1-based line number.
pub fn parse_json_lines<T: DeserializeOwned>(content: &str) -> Vec<Result<T>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .map_err(|e| Error::validation(format!("Line {}: {e}", index + 1)))
        })
        .collect()
}

/// Parse a single document, an array of documents, or JSON lines
pub fn parse_documents<T: DeserializeOwned>(content: &str) -> Vec<Result<T>> {
    if let Ok(document) = serde_json::from_str::<T>(content) {
        return vec![Ok(document)];
    }

    if let Ok(documents) = serde_json::from_str::<Vec<T>>(content) {
        return documents.into_iter().map(Ok).collect();
    }

    parse_json_lines(content)
}

async fn read_text(path: &Path) -> Result<String> {
    let content = read_input(path).await?;
    String::from_utf8(content)
        .map_err(|e| Error::validation(format!("{} is not UTF-8: {e}", path.display())))
}

/// Open a JSON-lines input as a record stream
///
/// Lines are read and parsed one at a time as the stream is polled. Blank
/// lines are skipped; a malformed line becomes an error item naming its
/// 1-based line number. A read failure ends the stream after its error item.
pub async fn json_lines_stream<T: DeserializeOwned>(
    path: &Path,
) -> Result<impl Stream<Item = Result<T>> + Unpin> {
    let reader: Box<dyn AsyncRead + Send + Unpin> = if path.as_os_str() == "-" {
        Box::new(tokio::io::stdin())
    } else {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| Error::io(format!("Failed to read {}", path.display()), e))?;
        Box::new(file)
    };
    debug!("Streaming records from {}", path.display());

    let lines = BufReader::new(reader).lines();

    Ok(Box::pin(stream::unfold(
        (Some(lines), 0usize),
        |(lines, mut line_number)| async move {
            let Some(mut lines) = lines else {
                return None;
            };
            loop {
                line_number += 1;
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => {
                        let record = serde_json::from_str::<T>(&line).map_err(|e| {
                            Error::validation(format!("Line {line_number}: {e}"))
                        });
                        return Some((record, (Some(lines), line_number)));
                    }
                    Ok(None) => return None,
                    Err(e) => {
                        let error = Error::io(format!("Failed to read line {line_number}"), e);
                        return Some((Err(error), (None, line_number)));
                    }
                }
            }
        },
    )))
}

/// Open an input holding one document, an array, or JSON lines as a record stream
pub async fn documents_stream<T: DeserializeOwned>(
    path: &Path,
) -> Result<(usize, impl Stream<Item = Result<T>> + Unpin)> {
    let content = read_text(path).await?;

    let records = parse_documents(&content);
    debug!("Read {} documents from {}", records.len(), path.display());

    Ok((records.len(), stream::iter(records)))
}

/// Write every item of a stream to stdout as one JSON line
///
/// Stops at the first error, after flushing what was already written.
pub async fn write_json_lines<T, S>(records: S) -> Result<usize>
where
    T: Serialize,
    S: Stream<Item = Result<T>>,
{
    let mut records = std::pin::pin!(records);
    let mut out = BufWriter::new(tokio::io::stdout());
    let mut written = 0;

    let outcome = loop {
        let Some(record) = records.next().await else {
            break Ok(());
        };

        let line = match record.and_then(|record| Ok(serde_json::to_string(&record)?)) {
            Ok(line) => line,
            Err(error) => break Err(error),
        };

        out.write_all(line.as_bytes()).await?;
        out.write_all(b"\n").await?;
        written += 1;
    };

    out.flush().await?;
    outcome.map(|_| written)
}
