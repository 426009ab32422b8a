//! Configuration for [`crate::pipeline::OperationPipeline`].
//!
//! Built via [`PipelineConfig::builder()`] or [`PipelineConfig::default()`].
//! The only knob today is how the overall 0–100 progress scale is split
//! between loading the engine and converting; the builder exists so new
//! settings don't break callers.

use crate::error::ConfigError;
use crate::progress::PhaseWeights;
use serde::{Deserialize, Serialize};

/// Configuration for a conversion pipeline.
///
/// # Example
/// ```rust
/// use officepdf::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .load_share(60)
///     .build()
///     .unwrap();
/// assert_eq!(config.weights.conversion.start, 60);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Progress sub-ranges per phase. Default: engine load `[0, 80]`,
    /// conversion `[80, 100]`.
    ///
    /// Engine start-up dominates a cold first run, so it gets the lion's
    /// share of the bar; once the engine is warm the load phase completes
    /// instantly and the bar jumps straight to the conversion range.
    pub weights: PhaseWeights,
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn weights(mut self, weights: PhaseWeights) -> Self {
        self.config.weights = weights;
        self
    }

    /// Give the engine-load phase `[0, share]` of the progress scale.
    pub fn load_share(mut self, share: u8) -> Self {
        self.config.weights = PhaseWeights::with_load_share(share);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        self.config.weights.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::PhaseSpan;

    #[test]
    fn default_split_is_eighty_twenty() {
        let config = PipelineConfig::builder().build().unwrap();
        assert_eq!(config.weights.engine_load, PhaseSpan::new(0, 80));
        assert_eq!(config.weights.conversion, PhaseSpan::new(80, 100));
    }

    #[test]
    fn load_share_is_clamped() {
        let config = PipelineConfig::builder().load_share(150).build().unwrap();
        assert_eq!(config.weights.engine_load, PhaseSpan::new(0, 100));
    }

    #[test]
    fn overlapping_weights_are_rejected() {
        let err = PipelineConfig::builder()
            .weights(PhaseWeights {
                engine_load: PhaseSpan::new(0, 90),
                conversion: PhaseSpan::new(70, 100),
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("contiguous"));
    }
}
