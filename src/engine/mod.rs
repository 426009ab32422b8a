//! The shared conversion engine and its single-flight lifecycle.
//!
//! ## Why a handle instead of a global engine?
//!
//! Starting a conversion engine is expensive (seconds, not milliseconds) and
//! must happen at most once per process, yet any number of operations may ask
//! for it at the same moment. [`EngineHandle`] owns that lifecycle:
//!
//! ```text
//!  Unrequested ──acquire──▶ Initializing ──ok──▶ Ready
//!       ▲                        │
//!       └──── next acquire ◀── Failed
//! ```
//!
//! * Callers arriving while `Initializing` attach to the flight already in
//!   progress; the engine's `initialize` runs exactly once for all of them.
//! * The flight runs on its own task. A caller that stops waiting (dropped
//!   future, cancelled operation) never aborts it: other waiters still need
//!   the engine. If the flight itself is dropped with its runtime, it counts
//!   as failed.
//! * A failed flight is not sticky. Every waiter of that flight receives the
//!   same error, and the next `acquire` starts a fresh attempt.
//!
//! The handle is cheap to clone; clones share one state. Use
//! [`shared_with`] for the process-wide instance.

pub mod soffice;

use crate::error::{ConversionError, EngineInitError};
use crate::pipeline::input::InputFile;
use crate::progress::ProgressEvent;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Instant;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Sub-progress events buffered per flight before slow waiters start lagging.
const EVENT_BUFFER: usize = 64;

/// The external conversion capability.
///
/// Implementations wrap something heavyweight (an office suite, a WASM
/// module, a remote service). The pipeline only ever reaches an engine
/// through [`EngineHandle::acquire`], so `initialize` is called at most once
/// at a time.
#[async_trait]
pub trait ConversionEngine: Send + Sync {
    /// Whether the engine can convert right now without initialising.
    fn is_ready(&self) -> bool;

    /// Perform the expensive setup, reporting 0–100 sub-progress.
    async fn initialize(&self, progress: &InitProgress) -> Result<(), EngineInitError>;

    /// Convert one document to PDF bytes.
    async fn convert_to_pdf(&self, file: &InputFile) -> Result<Vec<u8>, ConversionError>;
}

/// Sub-progress sink handed to [`ConversionEngine::initialize`].
///
/// Every event is forwarded to all callers waiting on the flight.
#[derive(Clone)]
pub struct InitProgress {
    tx: broadcast::Sender<ProgressEvent>,
}

impl InitProgress {
    /// A reporter nobody listens to, for driving an engine directly.
    pub fn detached() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Report `percent` (0–100, clamped) within the initialisation phase.
    pub fn report(&self, percent: u8, message: impl Into<String>) {
        let event = ProgressEvent::new(percent, message);
        debug!(percent = event.percent, message = %event.message, "engine init progress");
        // No receivers simply means nobody is waiting any more.
        let _ = self.tx.send(event);
    }
}

/// Read-only view of the handle's lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Unrequested,
    Initializing,
    Ready,
    /// The last flight failed; the next `acquire` retries.
    Failed(String),
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStatus::Unrequested => f.write_str("unrequested"),
            EngineStatus::Initializing => f.write_str("initializing"),
            EngineStatus::Ready => f.write_str("ready"),
            EngineStatus::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

type FlightOutcome = Option<Result<Arc<dyn ConversionEngine>, EngineInitError>>;

/// The initialisation in progress that late callers attach to.
struct Flight {
    events: broadcast::Sender<ProgressEvent>,
    outcome: watch::Receiver<FlightOutcome>,
}

enum EngineState {
    Unrequested,
    Initializing(Flight),
    Ready(Arc<dyn ConversionEngine>),
    Failed(EngineInitError),
}

enum Attach {
    Ready(Arc<dyn ConversionEngine>),
    Waiting {
        events: broadcast::Receiver<ProgressEvent>,
        outcome: watch::Receiver<FlightOutcome>,
    },
}

struct HandleInner {
    engine: Arc<dyn ConversionEngine>,
    state: Mutex<EngineState>,
}

/// Owner of the single shared engine instance.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<HandleInner>,
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("status", &self.status())
            .finish()
    }
}

impl EngineHandle {
    pub fn new(engine: Arc<dyn ConversionEngine>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                engine,
                state: Mutex::new(EngineState::Unrequested),
            }),
        }
    }

    pub fn from_engine<E: ConversionEngine + 'static>(engine: E) -> Self {
        Self::new(Arc::new(engine))
    }

    pub fn status(&self) -> EngineStatus {
        match &*lock(&self.inner.state) {
            EngineState::Unrequested => EngineStatus::Unrequested,
            EngineState::Initializing(_) => EngineStatus::Initializing,
            EngineState::Ready(_) => EngineStatus::Ready,
            EngineState::Failed(e) => EngineStatus::Failed(e.message.clone()),
        }
    }

    /// Get a ready engine, initialising it first if nobody has yet.
    ///
    /// `on_progress` receives the engine's own 0–100 initialisation progress
    /// while this caller waits; it is never called when the engine is
    /// already ready.
    pub async fn acquire<F>(
        &self,
        mut on_progress: F,
    ) -> Result<Arc<dyn ConversionEngine>, EngineInitError>
    where
        F: FnMut(u8, &str),
    {
        let (mut events, mut outcome) = match self.attach() {
            Attach::Ready(engine) => return Ok(engine),
            Attach::Waiting { events, outcome } => (events, outcome),
        };

        let mut events_open = true;
        loop {
            let published = outcome.borrow_and_update().clone();
            if let Some(result) = published {
                // Deliver whatever the flight reported before it finished.
                while let Ok(event) = events.try_recv() {
                    on_progress(event.percent, &event.message);
                }
                return result;
            }

            tokio::select! {
                event = events.recv(), if events_open => match event {
                    Ok(event) => on_progress(event.percent, &event.message),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "waiter lagged behind engine init progress")
                    }
                    Err(RecvError::Closed) => events_open = false,
                },
                changed = outcome.changed() => {
                    if changed.is_err() && outcome.borrow().is_none() {
                        return Err(EngineInitError::new(
                            "engine initialisation ended without reporting a result",
                        ));
                    }
                }
            }
        }
    }

    /// Attach to the current state, starting a flight when there is none.
    fn attach(&self) -> Attach {
        let mut state = lock(&self.inner.state);
        match &*state {
            EngineState::Ready(engine) => return Attach::Ready(Arc::clone(engine)),
            EngineState::Initializing(flight) => {
                debug!("joining engine initialisation already in flight");
                return Attach::Waiting {
                    events: flight.events.subscribe(),
                    outcome: flight.outcome.clone(),
                };
            }
            EngineState::Failed(previous) => {
                info!(previous = %previous.message, "retrying engine initialisation");
            }
            EngineState::Unrequested => {}
        }

        if self.inner.engine.is_ready() {
            debug!("engine reports ready; skipping initialisation");
            let engine = Arc::clone(&self.inner.engine);
            *state = EngineState::Ready(Arc::clone(&engine));
            return Attach::Ready(engine);
        }

        let (events_tx, events_rx) = broadcast::channel(EVENT_BUFFER);
        let (outcome_tx, outcome_rx) = watch::channel(None);
        *state = EngineState::Initializing(Flight {
            events: events_tx.clone(),
            outcome: outcome_rx.clone(),
        });
        drop(state);

        self.spawn_flight(events_tx, outcome_tx);
        Attach::Waiting {
            events: events_rx,
            outcome: outcome_rx,
        }
    }

    fn spawn_flight(
        &self,
        events: broadcast::Sender<ProgressEvent>,
        outcome: watch::Sender<FlightOutcome>,
    ) {
        let mut landing = FlightLanding {
            inner: Arc::clone(&self.inner),
            outcome: Some(outcome),
        };
        tokio::spawn(async move {
            let started = Instant::now();
            info!("Initialising conversion engine");

            let progress = InitProgress { tx: events };
            let engine = Arc::clone(&landing.inner.engine);
            let result = AssertUnwindSafe(engine.initialize(&progress))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(EngineInitError::new(format!(
                        "engine initialisation panicked: {}",
                        panic_message(panic.as_ref())
                    )))
                });
            let result = result.map(|()| engine);
            if result.is_ok() {
                info!(
                    "Conversion engine ready in {}ms",
                    started.elapsed().as_millis()
                );
            }
            landing.land(result);
        });
    }
}

/// Ends a flight exactly once.
///
/// If the flight task is dropped before `land` (its runtime shut down), the
/// drop lands it as a failure so the handle never stays `Initializing`.
struct FlightLanding {
    inner: Arc<HandleInner>,
    outcome: Option<watch::Sender<FlightOutcome>>,
}

impl FlightLanding {
    fn land(&mut self, result: Result<Arc<dyn ConversionEngine>, EngineInitError>) {
        let Some(outcome) = self.outcome.take() else {
            return;
        };
        let mut state = lock(&self.inner.state);
        match &result {
            Ok(engine) => *state = EngineState::Ready(Arc::clone(engine)),
            Err(e) => {
                warn!(error = %e.message, "Conversion engine failed to initialise");
                *state = EngineState::Failed(e.clone());
            }
        }
        // Published under the lock: nobody can attach to a finished flight.
        outcome.send_replace(Some(result));
    }
}

impl Drop for FlightLanding {
    fn drop(&mut self) {
        if self.outcome.is_some() {
            self.land(Err(EngineInitError::new(
                "engine initialisation was abandoned before it finished \
                 (its runtime shut down)",
            )));
        }
    }
}

fn lock(state: &Mutex<EngineState>) -> MutexGuard<'_, EngineState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ── Process-wide instance ────────────────────────────────────────────────────

static SHARED: OnceLock<EngineHandle> = OnceLock::new();

/// The process-wide handle, created from `make_engine` on first call.
///
/// Later calls ignore `make_engine` and return a clone of the same handle.
pub fn shared_with<F>(make_engine: F) -> EngineHandle
where
    F: FnOnce() -> Arc<dyn ConversionEngine>,
{
    SHARED
        .get_or_init(|| EngineHandle::new(make_engine()))
        .clone()
}

/// The process-wide handle, if [`shared_with`] has created it.
pub fn shared() -> Option<EngineHandle> {
    SHARED.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysReady;

    #[async_trait]
    impl ConversionEngine for AlwaysReady {
        fn is_ready(&self) -> bool {
            true
        }

        async fn initialize(&self, _progress: &InitProgress) -> Result<(), EngineInitError> {
            panic!("a ready engine must not be initialised");
        }

        async fn convert_to_pdf(&self, file: &InputFile) -> Result<Vec<u8>, ConversionError> {
            Ok(file.data.clone())
        }
    }

    #[test]
    fn new_handle_is_unrequested() {
        let handle = EngineHandle::from_engine(AlwaysReady);
        assert_eq!(handle.status(), EngineStatus::Unrequested);
    }

    #[tokio::test]
    async fn ready_engine_skips_initialisation() {
        let handle = EngineHandle::from_engine(AlwaysReady);
        let mut calls = 0;
        handle.acquire(|_, _| calls += 1).await.unwrap();
        assert_eq!(calls, 0);
        assert_eq!(handle.status(), EngineStatus::Ready);
    }

    #[test]
    fn clones_share_state() {
        let a = EngineHandle::from_engine(AlwaysReady);
        let b = a.clone();
        assert!(Arc::ptr_eq(&a.inner, &b.inner));
    }

    #[test]
    fn panic_message_extracts_strings() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[test]
    fn status_display() {
        assert_eq!(EngineStatus::Ready.to_string(), "ready");
        assert_eq!(
            EngineStatus::Failed("no soffice".into()).to_string(),
            "failed (no soffice)"
        );
    }
}
