// Configuration for Monte Carlo dropout effect estimation
//
// Iteration count drives both runtime and the power of the paired t-test:
// the test has `iterations - 1` degrees of freedom, so at least two draws
// per orientation are required.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration for a dropout effect estimation run
///
/// # Example
/// ```
/// use dropeffect::EstimationConfig;
///
/// let config = EstimationConfig::default();
/// assert_eq!(config.iterations, 30);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationConfig {
    /// Number of stochastic forward passes per input batch
    ///
    /// Default: 30
    pub iterations: usize,

    /// Base seed for the dropout masks
    ///
    /// With a seed, repeated runs produce bit-identical samples and tables.
    /// Without one, a fresh base seed is drawn per run.
    pub seed: Option<u64>,

    /// Run iterations on the rayon pool (needs the `parallel` feature)
    ///
    /// Results do not depend on this flag: every draw has its own RNG.
    pub parallel: bool,

    /// Prefix for the named result tables (`{prefix}_pv`, `{prefix}_diff`, ...)
    pub prefix: String,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            iterations: 30,
            seed: None,
            parallel: true,
            prefix: "do".to_string(),
        }
    }
}

impl EstimationConfig {
    /// Configuration for quick exploratory runs
    pub fn quick() -> Self {
        Self {
            iterations: 10,
            ..Self::default()
        }
    }

    /// Configuration for reported results (more draws, tighter p-values)
    pub fn thorough() -> Self {
        Self {
            iterations: 100,
            ..Self::default()
        }
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.iterations < 2 {
            return Err(format!(
                "iterations must be >= 2 for a paired t-test, got {}",
                self.iterations
            ));
        }

        if self.prefix.is_empty() {
            return Err("prefix must not be empty".to_string());
        }

        Ok(())
    }

    /// Load configuration from a TOML file
    ///
    /// Missing keys take their default values.
    ///
    /// # Example TOML
    /// ```toml
    /// iterations = 60
    /// seed = 1234
    /// parallel = false
    /// ```
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read estimation config: {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).context("Failed to parse estimation config TOML")?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid estimation config: {}", e))?;
        Ok(config)
    }
}
