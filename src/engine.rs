//! Batch scheduler driving work items through a [`TextProvider`].
//!
//! One control loop owns the run. Each iteration claims up to
//! `concurrency` Idle items, dispatches them as futures polled together on
//! the loop's own task, and waits for the whole batch to settle before
//! claiming the next one. Because the batch futures share a single task,
//! reconciliation into the [`ItemStore`] never interleaves.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::dataset;
use crate::error::{EngineError, Result};
use crate::eta;
use crate::events::PipelineEvent;
use crate::prompt;
use crate::provider::{transform_with_deadline, TextProvider};
use crate::stats::RunStatistics;
use crate::store::ItemStore;
use crate::types::{items_from_inputs, ItemInput, ItemStatus, RunState, WorkItem};

const EVENT_CAPACITY: usize = 256;

/// Outcome of one call to [`PipelineEngine::start`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub stats: RunStatistics,
    /// Whether the run ended because of [`PipelineEngine::stop`].
    pub cancelled: bool,
    /// Number of batches dispatched.
    pub batches: usize,
}

/// The batch pipeline engine.
///
/// Share it behind an `Arc` to drive a run on one task while another task
/// observes progress or calls [`stop`](Self::stop):
///
/// ```no_run
/// use std::sync::Arc;
/// use rewrite_pipeline::{GeminiProvider, ItemInput, PipelineConfig, PipelineEngine};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = Arc::new(GeminiProvider::new(std::env::var("GEMINI_API_KEY")?));
/// let engine = Arc::new(PipelineEngine::new(provider, PipelineConfig::default()));
/// engine.load_inputs(vec![ItemInput::new("hey u there? need help")])?;
///
/// let runner = tokio::spawn({
///     let engine = Arc::clone(&engine);
///     async move { engine.start().await }
/// });
///
/// println!("{:.0}% done", engine.stats().percent());
/// let summary = runner.await??;
/// println!("{} succeeded", summary.stats.successful);
/// # Ok(())
/// # }
/// ```
pub struct PipelineEngine {
    provider: Arc<dyn TextProvider>,
    store: ItemStore,
    config: RwLock<PipelineConfig>,
    state: Mutex<RunState>,
    cancel: Arc<AtomicBool>,
    validated: AtomicBool,
    started_at: Mutex<Option<DateTime<Utc>>>,
    events: broadcast::Sender<PipelineEvent>,
}

impl std::fmt::Debug for PipelineEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineEngine")
            .field("provider", &self.provider.name())
            .field("state", &self.state())
            .field("items", &self.store.len())
            .field("validated", &self.validated.load(Ordering::SeqCst))
            .finish()
    }
}

impl PipelineEngine {
    /// Create an engine with an empty item collection.
    pub fn new(provider: Arc<dyn TextProvider>, config: PipelineConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            provider,
            store: ItemStore::new(),
            config: RwLock::new(config),
            state: Mutex::new(RunState::Stopped),
            cancel: Arc::new(AtomicBool::new(false)),
            validated: AtomicBool::new(false),
            started_at: Mutex::new(None),
            events,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_state(&self, next: RunState) {
        let mut state = self.lock_state();
        if *state != next {
            debug!(from = ?*state, to = ?next, "Run state transition");
            *state = next;
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    // -- Observation --

    /// Current lifecycle state of the run.
    pub fn state(&self) -> RunState {
        *self.lock_state()
    }

    /// Copy of the active configuration.
    pub fn config(&self) -> PipelineConfig {
        self.config
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Point-in-time copy of every work item.
    pub fn snapshot(&self) -> Vec<WorkItem> {
        self.store.snapshot()
    }

    /// Copy of a single item.
    pub fn item(&self, id: &str) -> Option<WorkItem> {
        self.store.get(id)
    }

    /// Statistics recomputed from the current items.
    pub fn stats(&self) -> RunStatistics {
        let config = self.config();
        let started_at = *self.started_at.lock().unwrap_or_else(|p| p.into_inner());
        self.store.with_items(|items| {
            RunStatistics::from_items(items).with_timing(
                started_at,
                eta::estimate_remaining_ms(items, config.concurrency, config.delay_ms),
            )
        })
    }

    /// Subscribe to progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Serialize the current items as the export JSON array.
    pub fn export_json(&self) -> Result<String> {
        Ok(dataset::export_json(&self.store.snapshot())?)
    }

    // -- Setup --

    /// Replace the item collection. Rejected while a run is active.
    pub fn load(&self, items: Vec<WorkItem>) -> Result<()> {
        let state = self.lock_state();
        if state.is_active() {
            return Err(EngineError::AlreadyRunning);
        }
        info!(count = items.len(), "Loading work items");
        self.store.load(items);
        Ok(())
    }

    /// Replace the item collection from raw inputs, synthesizing missing ids.
    pub fn load_inputs(&self, inputs: Vec<ItemInput>) -> Result<()> {
        self.load(items_from_inputs(inputs))
    }

    /// Replace the configuration between runs.
    ///
    /// A different model invalidates the cached connection check, so the
    /// next [`start`](Self::start) validates again.
    pub fn set_config(&self, config: PipelineConfig) -> Result<()> {
        let state = self.lock_state();
        if state.is_active() {
            return Err(EngineError::AlreadyRunning);
        }
        config.validate()?;

        let mut current = self.config.write().unwrap_or_else(|p| p.into_inner());
        if current.model != config.model {
            self.validated.store(false, Ordering::SeqCst);
        }
        *current = config;
        Ok(())
    }

    // -- Control --

    /// Run until no Idle items remain or [`stop`](Self::stop) is called.
    ///
    /// Per-item provider failures never end the run; they are recorded on the
    /// item. Only pre-flight problems are returned as errors.
    pub async fn start(&self) -> Result<RunSummary> {
        let config = {
            let mut state = self.lock_state();
            if state.is_active() {
                return Err(EngineError::AlreadyRunning);
            }

            let config = self.config();
            config.validate()?;

            if !self.provider.is_configured() {
                warn!(provider = self.provider.name(), "Provider has no credentials");
                return Err(EngineError::NotInitialized);
            }

            if self.store.count_by_status(ItemStatus::Idle) == 0 {
                info!("No idle items to process");
                return Ok(RunSummary {
                    stats: self.stats(),
                    cancelled: false,
                    batches: 0,
                });
            }

            self.cancel.store(false, Ordering::SeqCst);
            *state = RunState::Validating;
            config
        };

        if !self.validated.load(Ordering::SeqCst) {
            info!(
                provider = self.provider.name(),
                model = %config.model,
                "Validating provider connection"
            );
            if !self.provider.validate(&config.model).await {
                self.set_state(RunState::Stopped);
                return Err(EngineError::ValidationFailed {
                    model: config.model.clone(),
                });
            }
            self.validated.store(true, Ordering::SeqCst);
        }

        if self.is_cancelled() {
            self.set_state(RunState::Stopped);
            return Ok(self.finish(0));
        }
        self.set_state(RunState::Running);

        Ok(self.run_batches(&config).await)
    }

    /// Request cancellation.
    ///
    /// No new batch is dispatched after this call. Items currently
    /// Processing go back to Idle immediately; requests already in flight
    /// are still reconciled when they settle. Returns `false` when no run
    /// is active.
    pub fn stop(&self) -> bool {
        {
            let mut state = self.lock_state();
            if !state.is_active() {
                return false;
            }
            self.cancel.store(true, Ordering::SeqCst);
            if *state == RunState::Running {
                *state = RunState::Draining;
            }
        }

        let reset = self.store.reset_processing();
        info!(reset, "Stop requested, draining in-flight requests");
        true
    }

    /// Move Failed items back to Idle, clearing their errors.
    ///
    /// Items whose `retry_count` has reached `max_retries` stay Failed
    /// (`max_retries == 0` disables the ceiling). Returns how many moved.
    pub fn requeue_failed(&self) -> usize {
        let cap = self.config().max_retries;
        let requeued = if cap == 0 {
            self.store.requeue_failed()
        } else {
            self.store.requeue_failed_below(cap)
        };
        let exhausted = self.store.count_by_status(ItemStatus::Failed);
        info!(requeued, exhausted, "Requeued failed items");
        requeued
    }

    // -- Loop --

    async fn run_batches(&self, config: &PipelineConfig) -> RunSummary {
        *self.started_at.lock().unwrap_or_else(|p| p.into_inner()) = Some(Utc::now());

        if !prompt::has_placeholder(&config.prompt_template) {
            warn!("Prompt template has no {{{{text}}}} placeholder; item text will not be included in the prompt");
        }

        let stats = self.stats();
        let pending = self.store.count_by_status(ItemStatus::Idle);
        info!(
            total = stats.total,
            pending,
            concurrency = config.concurrency,
            delay_ms = config.delay_ms,
            "Pipeline run started"
        );
        self.emit(PipelineEvent::RunStarted {
            total: stats.total,
            pending,
        });

        let mut batches = 0;
        loop {
            if self.is_cancelled() {
                break;
            }

            let batch = self.store.claim_idle(config.concurrency);
            if batch.is_empty() {
                break;
            }
            if self.is_cancelled() {
                self.store.reset_processing();
                break;
            }

            batches += 1;
            let item_ids: Vec<String> = batch.iter().map(|i| i.id.clone()).collect();
            debug!(batch = batches, size = batch.len(), "Dispatching batch");
            self.emit(PipelineEvent::BatchStarted {
                batch: batches,
                item_ids,
            });

            join_all(batch.iter().map(|item| self.run_item(item, config))).await;

            self.emit(PipelineEvent::BatchSettled {
                batch: batches,
                stats: self.stats(),
            });
        }

        // Items reset by stop() may have been reconciled since; anything
        // still Processing here never got a result.
        self.store.reset_processing();
        self.set_state(RunState::Stopped);
        self.finish(batches)
    }

    fn finish(&self, batches: usize) -> RunSummary {
        let stats = self.stats();
        let cancelled = self.is_cancelled();
        info!(
            processed = stats.processed,
            successful = stats.successful,
            failed = stats.failed,
            batches,
            cancelled,
            "Pipeline run stopped"
        );
        self.emit(PipelineEvent::RunStopped {
            stats: stats.clone(),
            cancelled,
        });
        RunSummary {
            stats,
            cancelled,
            batches,
        }
    }

    /// Throttle, dispatch, and reconcile a single item.
    async fn run_item(&self, item: &WorkItem, config: &PipelineConfig) {
        if config.delay_ms > 0 {
            tokio::time::sleep(config.delay()).await;
        }

        if self.is_cancelled() {
            self.store.update_by_id(&item.id, |i| {
                if i.status == ItemStatus::Processing {
                    i.reset_to_idle();
                }
            });
            debug!(item_id = %item.id, "Skipping dispatch after stop");
            return;
        }

        let start = Instant::now();
        let result =
            transform_with_deadline(self.provider.as_ref(), &item.original_text, config).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(output) => {
                self.store
                    .update_by_id(&item.id, |i| i.mark_completed(output, duration_ms));
                debug!(item_id = %item.id, duration_ms, "Item completed");
                self.emit(PipelineEvent::ItemCompleted {
                    id: item.id.clone(),
                    duration_ms,
                });
            }
            Err(e) => {
                let error = e.to_string();
                let mut retry_count = 0;
                self.store.update_by_id(&item.id, |i| {
                    i.mark_failed(error.clone(), duration_ms);
                    retry_count = i.retry_count;
                });
                warn!(
                    item_id = %item.id,
                    retry_count,
                    retryable = e.is_retryable(),
                    error = %e,
                    "Item failed"
                );
                self.emit(PipelineEvent::ItemFailed {
                    id: item.id.clone(),
                    error,
                    retry_count,
                });
            }
        }
    }
}
