//! # Rewrite Pipeline
//!
//! Concurrent batch rewriting of text datasets through an LLM, with
//! reasoning extraction, request throttling, and live progress.
//!
//! ## Key Features
//!
//! - **Bounded batches**: at most `concurrency` requests in flight; the next
//!   batch starts only after the previous one fully settles
//! - **Throttling and deadlines**: fixed per-request delay and a per-request
//!   timeout, so a hung vendor call costs one item, not the run
//! - **Reasoning extraction**: delimiter sections, `<think>` blocks, or the
//!   vendor's native thinking trace
//! - **Item-level status tracking**: failures stay on the item, with a retry
//!   count and a capped manual requeue
//! - **Pluggable providers**: Gemini and Ollama built in, anything else via
//!   [`TextProvider`]
//!
//! ## Quick Start
//!
//! 1. Build a [`PipelineConfig`] (or load one from TOML)
//! 2. Pick a provider such as [`GeminiProvider`] or [`OllamaProvider`]
//! 3. Create a [`PipelineEngine`] and load items, e.g. from
//!    [`dataset::parse_dataset`]
//! 4. `await` [`PipelineEngine::start`] and observe with
//!    [`PipelineEngine::subscribe`] or [`PipelineEngine::stats`]

pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod eta;
pub mod events;
pub mod parser;
pub mod prompt;
pub mod provider;
pub mod stats;
pub mod store;
pub mod types;

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use dataset::{export_json, parse_dataset, sample_dataset};
pub use engine::{PipelineEngine, RunSummary};
pub use error::{ConfigError, DatasetError, EngineError, ProviderError};
pub use events::PipelineEvent;
pub use parser::{parse_response, ParsedResponse};
pub use provider::{GeminiProvider, OllamaProvider, TextProvider};
pub use stats::RunStatistics;
pub use store::ItemStore;
pub use types::{ItemInput, ItemStatus, RunState, TransformOutput, WorkItem};
