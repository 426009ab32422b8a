//! Streaming API: receive an operation's progress and result as a `Stream`.
//!
//! ## Why stream?
//!
//! Hosts that already speak streams (WebSocket handlers, SSE endpoints, UI
//! event loops) would otherwise have to bridge the callback into a channel
//! themselves. [`run_stream`] does that bridging: it runs the pipeline on its
//! own task and yields every [`ProgressEvent`] followed by exactly one
//! [`PipelineEvent::Finished`].
//!
//! Dropping the stream does not stop the operation; cancel it through
//! [`OperationPipeline::cancel`] if you lose interest.

use crate::output::OperationResult;
use crate::pipeline::{OperationInput, OperationPipeline};
use crate::progress::ProgressEvent;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tracing::debug;

/// One item of an operation's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Progress(ProgressEvent),
    /// Always the last item.
    Finished(OperationResult),
}

/// A boxed stream of pipeline events.
pub type EventStream = Pin<Box<dyn Stream<Item = PipelineEvent> + Send>>;

/// Run `pipeline` on a new task, streaming its events.
///
/// Must be called from within a Tokio runtime.
pub fn run_stream(pipeline: Arc<OperationPipeline>, input: OperationInput) -> EventStream {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let progress_tx = tx.clone();
        let sink = move |percent: u8, message: &str| {
            // A closed receiver means the caller dropped the stream.
            let _ = progress_tx.send(PipelineEvent::Progress(ProgressEvent::new(
                percent, message,
            )));
        };

        let result = pipeline.run(input, Some(&sink)).await;
        debug!(success = result.is_success(), "Streamed operation finished");
        let _ = tx.send(PipelineEvent::Finished(result));
    });

    Box::pin(UnboundedReceiverStream::new(rx))
}
