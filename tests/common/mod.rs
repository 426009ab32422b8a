//! Scripted conversion engine shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use officepdf::{
    ConversionEngine, ConversionError, EngineInitError, InitProgress, InputFile, ProgressCallback,
    ProgressEvent,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// A fake engine whose behaviour each test scripts up front.
#[derive(Default)]
pub struct FakeEngine {
    pub init_calls: AtomicUsize,
    pub convert_calls: AtomicUsize,
    ready: AtomicBool,
    failing_inits: AtomicUsize,
    panicking_inits: AtomicUsize,
    fail_convert: AtomicBool,
    init_delay: Duration,
    gate: Option<Arc<Semaphore>>,
    cancel_during_convert: Option<CancellationToken>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    /// The next `n` initialisations fail.
    pub fn failing_inits(self, n: usize) -> Self {
        self.failing_inits.store(n, Ordering::SeqCst);
        self
    }

    /// The next `n` initialisations panic.
    pub fn panicking_inits(self, n: usize) -> Self {
        self.panicking_inits.store(n, Ordering::SeqCst);
        self
    }

    pub fn failing_convert(self) -> Self {
        self.fail_convert.store(true, Ordering::SeqCst);
        self
    }

    /// Initialisation blocks after its first report until a permit is added.
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    /// Cancel `token` while a conversion is running.
    pub fn cancel_during_convert(mut self, token: CancellationToken) -> Self {
        self.cancel_during_convert = Some(token);
        self
    }

    pub fn inits(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn converts(&self) -> usize {
        self.convert_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversionEngine for FakeEngine {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn initialize(&self, progress: &InitProgress) -> Result<(), EngineInitError> {
        let attempt = self.init_calls.fetch_add(1, Ordering::SeqCst) + 1;
        progress.report(10, "Loading fake engine");

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| EngineInitError::new(e.to_string()))?
                .forget();
        }
        if !self.init_delay.is_zero() {
            tokio::time::sleep(self.init_delay).await;
        }
        progress.report(50, "Warming up fake engine");

        if take_one(&self.panicking_inits) {
            panic!("fake engine exploded on attempt {attempt}");
        }
        if take_one(&self.failing_inits) {
            return Err(EngineInitError::new(format!(
                "fake init failure on attempt {attempt}"
            )));
        }

        progress.report(100, "Fake engine ready");
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn convert_to_pdf(&self, file: &InputFile) -> Result<Vec<u8>, ConversionError> {
        if !self.is_ready() {
            return Err(ConversionError::NotInitialized);
        }
        self.convert_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if let Some(token) = &self.cancel_during_convert {
            token.cancel();
            // Let tasks waiting on the token run before the call returns.
            tokio::task::yield_now().await;
        }
        if self.fail_convert.load(Ordering::SeqCst) {
            return Err(ConversionError::Engine(format!(
                "cannot parse {}",
                file.name
            )));
        }

        let mut pdf = b"%PDF-1.7\n".to_vec();
        pdf.extend_from_slice(file.name.as_bytes());
        Ok(pdf)
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Records every progress event it receives.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<ProgressEvent>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn percents(&self) -> Vec<u8> {
        self.events().iter().map(|e| e.percent).collect()
    }
}

impl ProgressCallback for Recorder {
    fn on_progress(&self, percent: u8, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push(ProgressEvent::new(percent, message));
    }
}

pub fn docx(name: &str) -> InputFile {
    InputFile::new(name, b"PK\x03\x04 fake docx".to_vec())
}

pub fn assert_monotonic(percents: &[u8]) {
    assert!(
        percents.windows(2).all(|w| w[0] <= w[1]),
        "progress went backwards: {percents:?}"
    );
    assert!(percents.iter().all(|p| *p <= 100), "out of range: {percents:?}");
}
