//! [`OperationPipeline`]: validate → acquire engine → convert → finalize.

use crate::config::PipelineConfig;
use crate::engine::EngineHandle;
use crate::error::ProcessingError;
use crate::format::{DocumentFormat, FormatAdapter, PDF_EXTENSION};
use crate::output::{ConversionMetadata, ConversionSuccess, OperationResult};
use crate::pipeline::input::{InputFile, OperationInput};
use crate::progress::{NoopProgressCallback, Phase, ProgressAggregator, ProgressCallback};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where an operation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Idle,
    Validating,
    AcquiringEngine,
    Converting,
    Finalizing,
    Succeeded,
    Failed,
    Cancelled,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Succeeded | PipelineState::Failed | PipelineState::Cancelled
        )
    }

    fn is_running(&self) -> bool {
        !self.is_terminal() && *self != PipelineState::Idle
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::Idle => "idle",
            PipelineState::Validating => "validating",
            PipelineState::AcquiringEngine => "acquiring-engine",
            PipelineState::Converting => "converting",
            PipelineState::Finalizing => "finalizing",
            PipelineState::Succeeded => "succeeded",
            PipelineState::Failed => "failed",
            PipelineState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Runs exactly one conversion operation against the shared engine.
///
/// The pipeline owns the operation's cancellation token: call
/// [`cancel`](Self::cancel) (or cancel a clone from
/// [`cancellation_token`](Self::cancellation_token)) from anywhere to stop
/// it at the next checkpoint. Cancelling never affects the shared engine or
/// other operations.
///
/// # Example
/// ```rust,no_run
/// use officepdf::{engine, DocumentFormat, InputFile, OperationPipeline, SofficeEngine};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let handle = engine::shared_with(|| Arc::new(SofficeEngine::default()));
/// let pipeline = OperationPipeline::for_format(DocumentFormat::Presentation, handle);
///
/// let file = InputFile::from_path("Quarterly.pptx").await?;
/// let progress = |percent: u8, message: &str| eprintln!("{percent:>3}% {message}");
/// let done = pipeline.run(file.into(), Some(&progress)).await.into_result()?;
/// std::fs::write(&done.suggested_file_name, &done.blob)?;
/// # Ok(())
/// # }
/// ```
pub struct OperationPipeline {
    adapter: FormatAdapter,
    engine: EngineHandle,
    config: PipelineConfig,
    state: Mutex<PipelineState>,
    cancel: Mutex<CancellationToken>,
}

impl fmt::Debug for OperationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationPipeline")
            .field("format", &self.adapter.id)
            .field("state", &self.state())
            .field("engine", &self.engine)
            .finish()
    }
}

impl OperationPipeline {
    pub fn new(adapter: FormatAdapter, engine: EngineHandle) -> Self {
        Self::with_config(adapter, engine, PipelineConfig::default())
    }

    pub fn with_config(adapter: FormatAdapter, engine: EngineHandle, config: PipelineConfig) -> Self {
        Self {
            adapter,
            engine,
            config,
            state: Mutex::new(PipelineState::Idle),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn for_format(format: DocumentFormat, engine: EngineHandle) -> Self {
        Self::new(format.adapter(), engine)
    }

    pub fn adapter(&self) -> &FormatAdapter {
        &self.adapter
    }

    pub fn state(&self) -> PipelineState {
        *lock(&self.state)
    }

    /// Request cancellation; observed at the next checkpoint.
    pub fn cancel(&self) {
        lock(&self.cancel).cancel();
    }

    /// A clone of this operation's token, for cancelling from another task.
    pub fn cancellation_token(&self) -> CancellationToken {
        lock(&self.cancel).clone()
    }

    /// Return to `Idle` with a fresh cancellation token.
    ///
    /// Refused (returns `false`) while an operation is in flight.
    pub fn reset(&self) -> bool {
        let mut state = lock(&self.state);
        if state.is_running() {
            return false;
        }
        *state = PipelineState::Idle;
        *lock(&self.cancel) = CancellationToken::new();
        true
    }

    /// Execute the operation.
    ///
    /// Never fails past this boundary: every problem becomes
    /// [`OperationResult::Error`] with a stable code.
    pub async fn run(
        &self,
        input: OperationInput,
        progress: Option<&dyn ProgressCallback>,
    ) -> OperationResult {
        let cancel = match self.begin() {
            Ok(token) => token,
            Err(err) => {
                warn!(format = %self.adapter.id, "{}", err);
                return OperationResult::Error(err.into());
            }
        };

        let _abandoned = AbandonGuard { pipeline: self };
        let started = Instant::now();
        let sink: &dyn ProgressCallback = progress.unwrap_or(&NoopProgressCallback);
        let mut aggregator = ProgressAggregator::new(self.config.weights, sink);

        match self.execute(input, &cancel, &mut aggregator, started).await {
            Ok(success) => {
                self.transition(PipelineState::Succeeded);
                info!(
                    "Converted {} → {} ({} bytes) in {}ms",
                    success.metadata.source_file_name,
                    success.suggested_file_name,
                    success.metadata.output_bytes,
                    success.metadata.duration_ms
                );
                OperationResult::Success(success)
            }
            Err(ProcessingError::Cancelled) => {
                self.transition(PipelineState::Cancelled);
                info!(format = %self.adapter.id, "Operation cancelled");
                OperationResult::Error(ProcessingError::Cancelled.into())
            }
            Err(err) => {
                self.transition(PipelineState::Failed);
                let detail = err.detail().unwrap_or_default();
                warn!(code = %err.code(), detail = %detail, "{}", err);
                OperationResult::Error(err.into())
            }
        }
    }

    async fn execute(
        &self,
        input: OperationInput,
        cancel: &CancellationToken,
        progress: &mut ProgressAggregator<'_>,
        started: Instant,
    ) -> Result<ConversionSuccess, ProcessingError> {
        let file = self.validate(input)?;
        checkpoint(cancel)?;

        // ── Acquire the shared engine ────────────────────────────────────
        self.transition(PipelineState::AcquiringEngine);
        let messages = &self.adapter.messages;
        progress.report(Phase::EngineLoad, 0, &messages.loading);
        let engine = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Stopped waiting for the engine; its initialisation continues");
                return Err(ProcessingError::Cancelled);
            }
            acquired = self.engine.acquire(|raw, message| {
                let message = if message.is_empty() { messages.loading.as_str() } else { message };
                progress.report(Phase::EngineLoad, raw, message);
            }) => acquired?,
        };
        progress.report(Phase::EngineLoad, 100, &messages.loading);
        checkpoint(cancel)?;

        // ── Convert ──────────────────────────────────────────────────────
        self.transition(PipelineState::Converting);
        progress.report(Phase::Conversion, 0, &messages.converting);
        checkpoint(cancel)?;
        let blob = engine
            .convert_to_pdf(&file)
            .await
            .map_err(|source| ProcessingError::Conversion {
                file_name: file.name.clone(),
                source,
            })?;
        checkpoint(cancel)?;

        // ── Finalize ─────────────────────────────────────────────────────
        self.transition(PipelineState::Finalizing);
        let suggested_file_name = self.adapter.output_file_name(&file.name);
        let metadata = ConversionMetadata {
            format: PDF_EXTENSION.to_string(),
            source_format: self.adapter.id.clone(),
            source_file_name: file.name,
            input_bytes: file.data.len(),
            output_bytes: blob.len(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        checkpoint(cancel)?;
        progress.report(Phase::Conversion, 100, &messages.done);

        Ok(ConversionSuccess {
            blob,
            suggested_file_name,
            metadata,
        })
    }

    /// Arity and extension checks; no engine work happens before these pass.
    fn validate(&self, input: OperationInput) -> Result<InputFile, ProcessingError> {
        let expected = self.adapter.expected_file_count;
        let actual = input.files.len();
        if actual != expected {
            return Err(ProcessingError::InvalidInput { expected, actual });
        }

        if let Some(bad) = input.files.iter().find(|f| !self.adapter.accepts(&f.name)) {
            return Err(ProcessingError::UnsupportedFormat {
                file_name: bad.name.clone(),
                accepted: self.adapter.accepted_extensions.clone(),
            });
        }

        debug!(format = %self.adapter.id, files = actual, "Input validated");
        input
            .files
            .into_iter()
            .next()
            .ok_or(ProcessingError::InvalidInput {
                expected,
                actual: 0,
            })
    }

    /// `Idle → Validating`, handing out the token for this operation.
    fn begin(&self) -> Result<CancellationToken, ProcessingError> {
        let mut state = lock(&self.state);
        if *state != PipelineState::Idle {
            return Err(ProcessingError::AlreadyStarted);
        }
        *state = PipelineState::Validating;
        debug!(format = %self.adapter.id, "idle → validating");
        Ok(self.cancellation_token())
    }

    fn transition(&self, next: PipelineState) {
        let mut state = lock(&self.state);
        debug!(format = %self.adapter.id, "{} → {}", *state, next);
        *state = next;
    }
}

/// Settles a `run` future that was dropped mid-operation (for example when
/// a caller's timeout won the race) as `Cancelled`, so `reset()` can reuse
/// the pipeline.
struct AbandonGuard<'a> {
    pipeline: &'a OperationPipeline,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        let mut state = lock(&self.pipeline.state);
        if state.is_running() {
            debug!(format = %self.pipeline.adapter.id, "{} → cancelled (abandoned)", *state);
            *state = PipelineState::Cancelled;
            lock(&self.pipeline.cancel).cancel();
        }
    }
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), ProcessingError> {
    if cancel.is_cancelled() {
        Err(ProcessingError::Cancelled)
    } else {
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
