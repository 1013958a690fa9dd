use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a single work item.
///
/// `Paused` is reserved: nothing in the engine transitions into or out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Idle,
    Processing,
    Completed,
    Failed,
    Paused,
}

impl ItemStatus {
    /// Whether the item has reached an outcome (Completed or Failed).
    pub fn is_settled(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }
}

/// One record of the dataset and its processing state.
///
/// Serializes to the export shape: `id`, `original`, `rewritten`,
/// `reasoning`, `status`, `error`, `retryCount`, `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub id: String,
    #[serde(rename = "original")]
    pub original_text: String,
    #[serde(rename = "rewritten", default, skip_serializing_if = "Option::is_none")]
    pub rewritten_text: Option<String>,
    #[serde(rename = "reasoning", default, skip_serializing_if = "Option::is_none")]
    pub reasoning_text: Option<String>,
    pub status: ItemStatus,
    #[serde(rename = "error", default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(
        rename = "timestamp",
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    /// Time spent waiting on the provider for the last attempt.
    #[serde(skip)]
    pub duration_ms: Option<u64>,
}

impl WorkItem {
    /// Create a fresh Idle item.
    pub fn new(id: impl Into<String>, original_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            original_text: original_text.into(),
            rewritten_text: None,
            reasoning_text: None,
            status: ItemStatus::Idle,
            error_message: None,
            retry_count: 0,
            completed_at: None,
            duration_ms: None,
        }
    }

    pub(crate) fn mark_processing(&mut self) {
        self.status = ItemStatus::Processing;
    }

    pub(crate) fn mark_completed(&mut self, result: TransformOutput, duration_ms: u64) {
        self.status = ItemStatus::Completed;
        self.rewritten_text = Some(result.output);
        self.reasoning_text = Some(result.reasoning);
        self.error_message = None;
        self.completed_at = Some(Utc::now());
        self.duration_ms = Some(duration_ms);
    }

    pub(crate) fn mark_failed(&mut self, error: String, duration_ms: u64) {
        self.status = ItemStatus::Failed;
        self.rewritten_text = None;
        self.reasoning_text = None;
        self.error_message = Some(error);
        self.completed_at = None;
        self.retry_count += 1;
        self.duration_ms = Some(duration_ms);
    }

    /// Back to Idle without touching `retry_count`.
    pub(crate) fn reset_to_idle(&mut self) {
        self.status = ItemStatus::Idle;
        self.error_message = None;
    }
}

/// Caller-supplied input row. A missing id is synthesized on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInput {
    pub id: Option<String>,
    pub original_text: String,
}

impl ItemInput {
    pub fn new(original_text: impl Into<String>) -> Self {
        Self {
            id: None,
            original_text: original_text.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Format the synthesized id for the item at zero-based `index`.
pub fn sequence_id(index: usize) -> String {
    format!("ID-{:05}", index + 1)
}

/// Turn input rows into Idle work items, synthesizing `ID-00001`-style ids.
pub fn items_from_inputs(inputs: Vec<ItemInput>) -> Vec<WorkItem> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(idx, input)| {
            let id = input.id.unwrap_or_else(|| sequence_id(idx));
            WorkItem::new(id, input.original_text)
        })
        .collect()
}

/// Structured result of one provider transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformOutput {
    pub reasoning: String,
    pub output: String,
}

/// Engine run lifecycle: `Stopped -> Validating -> Running -> (Draining | Stopped)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    Stopped,
    Validating,
    Running,
    Draining,
}

impl RunState {
    pub fn is_active(&self) -> bool {
        !matches!(self, RunState::Stopped)
    }
}
