#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rewrite_pipeline::*;
use tokio::time::Instant;

/// Succeeds with `OK:<input>` after a per-input delay, recording
/// concurrency and dispatch times.
pub struct EchoProvider {
    delay_for: fn(&str) -> Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub transform_calls: AtomicUsize,
    pub validate_calls: AtomicUsize,
    pub dispatched: Mutex<Vec<(String, Instant)>>,
}

impl EchoProvider {
    pub fn new() -> Self {
        Self::with_delay(|_| Duration::ZERO)
    }

    pub fn with_delay(delay_for: fn(&str) -> Duration) -> Self {
        Self {
            delay_for,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            transform_calls: AtomicUsize::new(0),
            validate_calls: AtomicUsize::new(0),
            dispatched: Mutex::new(Vec::new()),
        }
    }

    pub fn dispatch_time(&self, input: &str) -> Option<Instant> {
        self.dispatched
            .lock()
            .unwrap()
            .iter()
            .find(|(i, _)| i == input)
            .map(|(_, at)| *at)
    }
}

#[async_trait]
impl TextProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn validate(&self, _model: &str) -> bool {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        true
    }

    async fn transform(
        &self,
        input: &str,
        _config: &PipelineConfig,
    ) -> Result<TransformOutput, ProviderError> {
        self.transform_calls.fetch_add(1, Ordering::SeqCst);
        self.dispatched
            .lock()
            .unwrap()
            .push((input.to_string(), Instant::now()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep((self.delay_for)(input)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(TransformOutput {
            reasoning: "polished tone".to_string(),
            output: format!("OK:{}", input),
        })
    }
}

/// Always fails every transform with the same error.
pub struct FailingProvider(pub ProviderError);

#[async_trait]
impl TextProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn validate(&self, _model: &str) -> bool {
        true
    }

    async fn transform(
        &self,
        _input: &str,
        _config: &PipelineConfig,
    ) -> Result<TransformOutput, ProviderError> {
        Err(self.0.clone())
    }
}

/// Never answers.
pub struct HangingProvider;

#[async_trait]
impl TextProvider for HangingProvider {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn validate(&self, _model: &str) -> bool {
        true
    }

    async fn transform(
        &self,
        _input: &str,
        _config: &PipelineConfig,
    ) -> Result<TransformOutput, ProviderError> {
        std::future::pending().await
    }
}

/// Rejects the connection check and counts transforms that should never happen.
#[derive(Default)]
pub struct RejectingProvider {
    pub transform_calls: AtomicUsize,
}

#[async_trait]
impl TextProvider for RejectingProvider {
    fn name(&self) -> &str {
        "rejecting"
    }

    async fn validate(&self, _model: &str) -> bool {
        false
    }

    async fn transform(
        &self,
        _input: &str,
        _config: &PipelineConfig,
    ) -> Result<TransformOutput, ProviderError> {
        self.transform_calls.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::Other("should not be called".into()))
    }
}

/// Reports missing credentials.
pub struct UnconfiguredProvider;

#[async_trait]
impl TextProvider for UnconfiguredProvider {
    fn name(&self) -> &str {
        "unconfigured"
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn validate(&self, _model: &str) -> bool {
        false
    }

    async fn transform(
        &self,
        _input: &str,
        _config: &PipelineConfig,
    ) -> Result<TransformOutput, ProviderError> {
        Err(ProviderError::NotInitialized)
    }
}

pub fn fast_config(concurrency: usize) -> PipelineConfig {
    PipelineConfig::builder()
        .with_concurrency(concurrency)
        .with_delay(Duration::ZERO)
        .build()
}

pub fn inputs(texts: &[&str]) -> Vec<ItemInput> {
    texts.iter().map(|t| ItemInput::new(*t)).collect()
}

pub fn numbered_inputs(count: usize) -> Vec<ItemInput> {
    (0..count).map(|i| ItemInput::new(format!("text-{}", i))).collect()
}
