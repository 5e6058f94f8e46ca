//! Streaming transform stages over ordered measurement cursors
//!
//! Each stage consumes records one at a time through [`StreamStage::push`]
//! and may hold back output until it has seen enough input (a closed window,
//! a finished time step). [`StreamStage::flush`] emits whatever remains once
//! the input is exhausted and resets the stage.
//!
//! ## Architecture
//!
//! - [`outlier`] - sliding-window outlier marking or replacement for one sensor
//! - [`classification`] - active/inactive/old state of boxes
//! - [`statistics`] - statistic kernels shared by the windowed stages
//! - [`descriptive_stats`] - per-sensor windowed statistics
//! - [`idw`] - inverse-distance-weighted interpolation over a grid, per time step
//!
//! Stages are driven either synchronously with [`run_stage`] or as an async
//! pipeline with [`StageStream`], which pulls from its upstream only when
//! polled and stops promptly when its [`CancellationToken`] fires.

pub mod classification;
pub mod descriptive_stats;
pub mod idw;
pub mod outlier;
pub mod statistics;

#[cfg(test)]
pub mod tests;

use crate::{Error, Result};
use futures::Stream;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::debug;

pub use classification::{ActivityState, ClassificationStage, ClassifiedBox, classify};
pub use descriptive_stats::{DescriptiveStatsStage, SensorStatistics};
pub use idw::{IdwOutput, IdwStage};
pub use outlier::{OutlierRecord, OutlierStage};
pub use statistics::StatisticOperation;

/// A single-pass transform with bounded internal state
pub trait StreamStage {
    type Input;
    type Output;

    /// Short name used in logs and errors
    fn name(&self) -> &'static str;

    /// Consume one record, returning any output it completes
    fn push(&mut self, input: Self::Input) -> Result<Vec<Self::Output>>;

    /// Emit the remaining output and reset the stage
    fn flush(&mut self) -> Result<Vec<Self::Output>>;
}

/// Drive a stage over an in-memory sequence
pub fn run_stage<S, I>(stage: &mut S, inputs: I) -> Result<Vec<S::Output>>
where
    S: StreamStage,
    I: IntoIterator<Item = S::Input>,
{
    let mut outputs = Vec::new();

    for input in inputs {
        outputs.extend(stage.push(input)?);
    }
    outputs.extend(stage.flush()?);

    Ok(outputs)
}

/// Async adapter running a stage over a fallible upstream stream
///
/// Upstream is polled only when the consumer asks for output and nothing is
/// pending. The first error, from upstream or from the stage, is yielded and
/// ends the stream. Cancellation drops the upstream, the stage and every
/// pending output before yielding a single [`Error::Cancelled`].
pub struct StageStream<St, S: StreamStage> {
    upstream: Option<St>,
    stage: Option<S>,
    pending: VecDeque<S::Output>,
    cancelled: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
    name: &'static str,
    finished: bool,
}

impl<St, S: StreamStage> StageStream<St, S> {
    pub fn new(upstream: St, stage: S) -> Self {
        Self {
            name: stage.name(),
            upstream: Some(upstream),
            stage: Some(stage),
            pending: VecDeque::new(),
            cancelled: None,
            finished: false,
        }
    }

    /// Stop pulling and release all state once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancelled = Some(Box::pin(token.cancelled_owned()));
        self
    }

    /// Drop upstream, stage state and pending output
    fn release(&mut self) {
        self.upstream = None;
        self.stage = None;
        self.pending.clear();
        self.finished = true;
    }
}

impl<St, S> Stream for StageStream<St, S>
where
    St: Stream<Item = Result<S::Input>> + Unpin,
    S: StreamStage + Unpin,
    S::Output: Unpin,
{
    type Item = Result<S::Output>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.finished && this.pending.is_empty() {
                this.cancelled = None;
                return Poll::Ready(None);
            }

            if let Some(cancelled) = this.cancelled.as_mut() {
                if cancelled.as_mut().poll(cx).is_ready() {
                    this.cancelled = None;
                    this.release();
                    debug!("Stage {} cancelled, state released", this.name);
                    return Poll::Ready(Some(Err(Error::cancelled(format!(
                        "consumer of stage {} went away",
                        this.name
                    )))));
                }
            }

            if let Some(output) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(output)));
            }

            let (Some(upstream), Some(stage)) = (this.upstream.as_mut(), this.stage.as_mut())
            else {
                this.finished = true;
                continue;
            };

            match Pin::new(upstream).poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(input))) => match stage.push(input) {
                    Ok(outputs) => this.pending.extend(outputs),
                    Err(error) => {
                        this.release();
                        return Poll::Ready(Some(Err(error)));
                    }
                },
                Poll::Ready(Some(Err(error))) => {
                    this.release();
                    return Poll::Ready(Some(Err(error)));
                }
                Poll::Ready(None) => {
                    let flushed = stage.flush();
                    this.upstream = None;
                    this.stage = None;
                    this.finished = true;

                    match flushed {
                        Ok(outputs) => this.pending.extend(outputs),
                        Err(error) => {
                            this.pending.clear();
                            return Poll::Ready(Some(Err(error)));
                        }
                    }
                }
            }
        }
    }
}

/// Extension for piping a fallible stream through a stage
pub trait StageStreamExt<T>: Stream<Item = Result<T>> + Sized {
    fn through<S>(self, stage: S) -> StageStream<Self, S>
    where
        S: StreamStage<Input = T>,
    {
        StageStream::new(self, stage)
    }
}

impl<T, St> StageStreamExt<T> for St where St: Stream<Item = Result<T>> + Sized {}
