use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::prompt::{DEFAULT_PROMPT_TEMPLATE, DEFAULT_SYSTEM_INSTRUCTION};

/// Hard deadline for a single provider request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-run pipeline configuration.
///
/// Use [`PipelineConfig::builder()`] for ergonomic construction,
/// [`PipelineConfig::from_file()`] to load TOML, or
/// [`PipelineConfig::default()`] for the stock rewriting setup. Every field
/// has a default, so partial TOML files are accepted:
///
/// ```
/// use rewrite_pipeline::PipelineConfig;
///
/// let config = PipelineConfig::from_toml_str("concurrency = 4\ndelay_ms = 0").unwrap();
/// assert_eq!(config.concurrency, 4);
/// assert_eq!(config.model, "gemini-2.5-flash");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Model identifier passed to the provider.
    pub model: String,

    /// Generation temperature (0.0 = deterministic).
    pub temperature: f32,

    /// Maximum number of items dispatched per batch (at least 1).
    pub concurrency: usize,

    /// Throttle applied before every dispatch, in milliseconds.
    pub delay_ms: u64,

    /// Ceiling on manual requeues of a failed item (0 = no ceiling).
    pub max_retries: u32,

    pub system_instruction: String,

    /// Prompt template containing a single `{{text}}` placeholder.
    pub prompt_template: String,

    /// Ask the vendor to reason natively instead of using the text delimiters.
    pub use_native_thinking: bool,

    /// Reasoning token budget sent with native thinking.
    pub thinking_budget: u32,

    /// Per-request deadline in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.7,
            concurrency: 2,
            delay_ms: 500,
            max_retries: 3,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            use_native_thinking: false,
            thinking_budget: 1024,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT.as_millis() as u64,
        }
    }
}

impl PipelineConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check the invariants the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".to_string()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Thinking budget to send, substituting the default for 0.
    pub fn effective_thinking_budget(&self) -> u32 {
        if self.thinking_budget == 0 {
            1024
        } else {
            self.thinking_budget
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the maximum number of concurrently dispatched items.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Set the throttle delay applied before every dispatch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.config.delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.system_instruction = instruction.into();
        self
    }

    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_template = template.into();
        self
    }

    /// Enable native reasoning with the given token budget.
    pub fn with_native_thinking(mut self, enabled: bool, budget: u32) -> Self {
        self.config.use_native_thinking = enabled;
        self.config.thinking_budget = budget;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Build the final [`PipelineConfig`]. Call [`PipelineConfig::validate`]
    /// separately or let the engine do it on start.
    pub fn build(self) -> PipelineConfig {
        self.config
    }
}
