//! Event delivery over a bounded channel.
//!
//! The orchestrator writes every event through an [`EventSink`]. Batch and
//! incremental delivery are two consumers of the same channel.
//! Cancellation closes the session silently: once the token fires, the sink
//! refuses further events and the stream yields nothing more.

use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::AgentEvent;
use crate::session::GenerationResult;

/// The session was cancelled, or nobody is listening any more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cancelled;

/// Producer half held by the orchestrator.
pub(crate) struct EventSink {
    tx: mpsc::Sender<AgentEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::Sender<AgentEvent>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    /// Fail fast if cancellation was requested.
    pub(crate) fn check(&self) -> Result<(), Cancelled> {
        if self.cancel.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run a suspending call, discarding its result if cancelled meanwhile.
    pub(crate) async fn guard<F: std::future::Future>(&self, call: F) -> Result<F::Output, Cancelled> {
        self.check()?;
        let output = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Cancelled),
            output = call => output,
        };
        self.check()?;
        Ok(output)
    }

    /// Deliver one event, waiting for buffer space.
    pub(crate) async fn emit(&self, event: AgentEvent) -> Result<(), Cancelled> {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Cancelled),
            sent = self.tx.send(event) => sent.map_err(|_| Cancelled),
        }
    }
}

/// Incremental delivery of one session's events.
///
/// Ends after the terminal event, or immediately once cancelled. Dropping
/// the stream cancels the session.
pub struct EventStream {
    rx: mpsc::Receiver<AgentEvent>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    finished: bool,
}

impl EventStream {
    pub(crate) fn new(
        rx: mpsc::Receiver<AgentEvent>,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            rx,
            cancel,
            task: Some(task),
            finished: false,
        }
    }

    /// Request cancellation. No further events are yielded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A handle that cancels this session when fired.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Next event, or `None` at end of stream.
    pub async fn next_event(&mut self) -> Option<AgentEvent> {
        futures::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }

    /// Drain the stream and build the final result.
    ///
    /// `None` if the session was cancelled before a terminal event.
    pub async fn into_result(mut self) -> Option<GenerationResult> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        GenerationResult::from_events(events)
    }
}

impl Stream for EventStream {
    type Item = AgentEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished || self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                if event.state.is_terminal() {
                    self.finished = true;
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if !self.finished {
            self.cancel.cancel();
        }
        // The driver stops at its next suspension point; detach it.
        self.task.take();
    }
}
