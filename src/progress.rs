//! Progress reporting: caller-facing callback trait plus phase weighting.
//!
//! An operation has two weighted phases — loading the shared engine and
//! converting the document. The engine reports its own 0–100 progress within
//! each phase; [`ProgressAggregator`] maps that onto the caller's single
//! 0–100 scale and guarantees the emitted percentages never go backwards.
//!
//! # Example
//!
//! ```rust
//! use officepdf::{ProgressCallback, ProgressEvent};
//! use std::sync::Mutex;
//!
//! struct Recorder(Mutex<Vec<ProgressEvent>>);
//!
//! impl ProgressCallback for Recorder {
//!     fn on_progress(&self, percent: u8, message: &str) {
//!         self.0.lock().unwrap().push(ProgressEvent::new(percent, message));
//!     }
//! }
//!
//! // Plain closures work too.
//! let log = |percent: u8, message: &str| eprintln!("{percent:>3}% {message}");
//! log.on_progress(40, "Loading conversion engine…");
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// One caller-visible progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Overall percentage, 0–100, non-decreasing within one operation.
    pub percent: u8,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(percent: u8, message: impl Into<String>) -> Self {
        Self {
            percent: percent.min(100),
            message: message.into(),
        }
    }
}

/// Receives progress events for one operation.
///
/// Implementations must be `Send + Sync`: several operations may report
/// through clones of the same sink from different tasks.
pub trait ProgressCallback: Send + Sync {
    /// Called with the overall percentage and a user-facing message.
    fn on_progress(&self, percent: u8, message: &str);
}

impl<F> ProgressCallback for F
where
    F: Fn(u8, &str) + Send + Sync,
{
    fn on_progress(&self, percent: u8, message: &str) {
        self(percent, message)
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ProgressCallback for NoopProgressCallback {
    fn on_progress(&self, _percent: u8, _message: &str) {}
}

/// Convenience alias for a shareable sink.
pub type SharedProgress = Arc<dyn ProgressCallback>;

// ── Phase weighting ──────────────────────────────────────────────────────────

/// The two weighted phases of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Acquiring (and possibly initialising) the shared engine.
    EngineLoad,
    /// The conversion call itself, through finalisation.
    Conversion,
}

/// A sub-range `[start, end]` of the overall 0–100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSpan {
    pub start: u8,
    pub end: u8,
}

impl PhaseSpan {
    pub const fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    /// `start + raw * (end - start) / 100`, clamped to `[start, end]`.
    pub fn scale(&self, raw: u8) -> u8 {
        let raw = u32::from(raw.min(100));
        let width = u32::from(self.end.saturating_sub(self.start));
        let scaled = u32::from(self.start) + raw * width / 100;
        scaled.min(u32::from(self.end)) as u8
    }
}

/// Phase weight table. Default: engine load `[0, 80]`, conversion `[80, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseWeights {
    pub engine_load: PhaseSpan,
    pub conversion: PhaseSpan,
}

impl Default for PhaseWeights {
    fn default() -> Self {
        Self::with_load_share(80)
    }
}

impl PhaseWeights {
    /// Give the engine-load phase `[0, share]` and conversion the rest.
    pub fn with_load_share(share: u8) -> Self {
        let share = share.min(100);
        Self {
            engine_load: PhaseSpan::new(0, share),
            conversion: PhaseSpan::new(share, 100),
        }
    }

    pub fn span(&self, phase: Phase) -> PhaseSpan {
        match phase {
            Phase::EngineLoad => self.engine_load,
            Phase::Conversion => self.conversion,
        }
    }

    /// Spans must be ordered, contiguous and cover `[0, 100]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (load, conv) = (self.engine_load, self.conversion);
        if load.start != 0 || conv.end != 100 {
            return Err(ConfigError(format!(
                "phase weights must cover 0–100, got [{}, {}] + [{}, {}]",
                load.start, load.end, conv.start, conv.end
            )));
        }
        if load.start > load.end || conv.start > conv.end || load.end != conv.start {
            return Err(ConfigError(format!(
                "phase spans must be ordered and contiguous, got [{}, {}] + [{}, {}]",
                load.start, load.end, conv.start, conv.end
            )));
        }
        Ok(())
    }
}

/// Maps in-phase progress onto the overall scale and forwards it to a sink.
///
/// Lives for exactly one operation. Emitted percentages are monotonic even
/// when the raw feed is noisy: a lower value than the last one emitted is
/// reported as the last value.
pub struct ProgressAggregator<'a> {
    weights: PhaseWeights,
    sink: &'a dyn ProgressCallback,
    last: u8,
}

impl<'a> ProgressAggregator<'a> {
    pub fn new(weights: PhaseWeights, sink: &'a dyn ProgressCallback) -> Self {
        Self {
            weights,
            sink,
            last: 0,
        }
    }

    /// Report `raw` percent within `phase`; returns the overall percent emitted.
    pub fn report(&mut self, phase: Phase, raw: u8, message: &str) -> u8 {
        let percent = self.weights.span(phase).scale(raw).max(self.last);
        self.last = percent;
        debug!(?phase, raw, percent, message, "progress");
        self.sink.on_progress(percent, message);
        percent
    }

    /// Last percentage emitted (0 before any report).
    pub fn last(&self) -> u8 {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<u8>>);

    impl ProgressCallback for Recorder {
        fn on_progress(&self, percent: u8, _message: &str) {
            self.0.lock().unwrap().push(percent);
        }
    }

    #[test]
    fn scale_maps_into_span() {
        let span = PhaseSpan::new(80, 100);
        assert_eq!(span.scale(0), 80);
        assert_eq!(span.scale(50), 90);
        assert_eq!(span.scale(100), 100);
    }

    #[test]
    fn scale_clamps_to_end() {
        let span = PhaseSpan::new(0, 80);
        assert_eq!(span.scale(250), 80);
        assert_eq!(span.scale(100), 80);
    }

    #[test]
    fn aggregator_is_monotonic_with_noisy_feed() {
        let rec = Recorder::default();
        let mut agg = ProgressAggregator::new(PhaseWeights::default(), &rec);
        for raw in [10, 40, 20, 60, 55, 100] {
            agg.report(Phase::EngineLoad, raw, "loading");
        }
        agg.report(Phase::Conversion, 0, "converting");
        agg.report(Phase::Conversion, 100, "done");

        let seen = rec.0.lock().unwrap().clone();
        assert_eq!(seen, vec![8, 32, 32, 48, 48, 80, 80, 100]);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn default_weights_validate() {
        assert!(PhaseWeights::default().validate().is_ok());
        assert!(PhaseWeights::with_load_share(0).validate().is_ok());
    }

    #[test]
    fn gap_between_spans_is_rejected() {
        let w = PhaseWeights {
            engine_load: PhaseSpan::new(0, 50),
            conversion: PhaseSpan::new(60, 100),
        };
        assert!(w.validate().is_err());
    }

    #[test]
    fn closure_is_a_callback() {
        let hits = Mutex::new(0);
        let cb = |_: u8, _: &str| {
            *hits.lock().unwrap() += 1;
        };
        cb.on_progress(1, "a");
        cb.on_progress(2, "b");
        assert_eq!(*hits.lock().unwrap(), 2);
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        let mut agg = ProgressAggregator::new(PhaseWeights::default(), &cb);
        assert_eq!(agg.report(Phase::Conversion, 100, "done"), 100);
        assert_eq!(agg.last(), 100);
    }
}
