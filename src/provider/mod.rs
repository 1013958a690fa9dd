//! Inference provider contract and vendor implementations.
//!
//! The engine only ever talks to a [`TextProvider`]; vendors are additional
//! implementations of the same two operations.

pub mod gemini;
pub mod ollama;

pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;

use async_trait::async_trait;

use crate::config::PipelineConfig;
use crate::error::ProviderError;
use crate::parser::{self, ParsedResponse};
use crate::types::TransformOutput;

/// A text-generation backend able to rewrite one input at a time.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use rewrite_pipeline::{PipelineConfig, ProviderError, TextProvider, TransformOutput};
///
/// struct Shout;
///
/// #[async_trait]
/// impl TextProvider for Shout {
///     fn name(&self) -> &str {
///         "shout"
///     }
///
///     async fn validate(&self, _model: &str) -> bool {
///         true
///     }
///
///     async fn transform(
///         &self,
///         input: &str,
///         _config: &PipelineConfig,
///     ) -> Result<TransformOutput, ProviderError> {
///         Ok(TransformOutput {
///             reasoning: "louder is clearer".into(),
///             output: input.to_uppercase(),
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Short vendor label used in logs.
    fn name(&self) -> &str;

    /// Whether credentials are present at all. Checked before a run starts.
    fn is_configured(&self) -> bool {
        true
    }

    /// Minimal-cost call confirming the credentials and model are usable.
    ///
    /// Never errors: failures are logged and reported as `false`.
    async fn validate(&self, model: &str) -> bool;

    /// Render the prompt for `input`, send one generation request, and
    /// split the reply into reasoning and output.
    async fn transform(
        &self,
        input: &str,
        config: &PipelineConfig,
    ) -> Result<TransformOutput, ProviderError>;
}

/// Race `provider.transform` against `config.request_timeout()`.
///
/// On timeout only the wait is abandoned; the underlying request future is
/// dropped and whatever the vendor does with it is out of our hands.
pub async fn transform_with_deadline(
    provider: &dyn TextProvider,
    input: &str,
    config: &PipelineConfig,
) -> Result<TransformOutput, ProviderError> {
    let timeout = config.request_timeout();
    match tokio::time::timeout(timeout, provider.transform(input, config)).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(timeout)),
    }
}

/// Combine parsed text with a reasoning trace the vendor returned out of band.
///
/// The trace only replaces the fallback placeholder; a reasoning section the
/// model wrote itself always wins.
pub(crate) fn with_native_trace(
    parsed: ParsedResponse,
    trace: Option<String>,
    native_thinking: bool,
) -> TransformOutput {
    let used_fallback = parsed.reasoning == parser::placeholder(native_thinking);
    let reasoning = match trace {
        Some(t) if used_fallback && !t.trim().is_empty() => t.trim().to_string(),
        _ => parsed.reasoning,
    };
    TransformOutput {
        reasoning,
        output: parsed.output,
    }
}
