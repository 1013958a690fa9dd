use serde::{Deserialize, Serialize};

use crate::stats::RunStatistics;

/// Progress notifications broadcast by the engine.
///
/// Subscribe with [`PipelineEngine::subscribe`](crate::PipelineEngine::subscribe).
/// Events are best-effort: a slow subscriber may observe
/// `RecvError::Lagged` and should fall back to
/// [`PipelineEngine::stats`](crate::PipelineEngine::stats).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PipelineEvent {
    /// Emitted once validation passed and the loop begins.
    RunStarted { total: usize, pending: usize },

    /// Emitted when a batch has been claimed and is about to dispatch.
    BatchStarted { batch: usize, item_ids: Vec<String> },

    ItemCompleted { id: String, duration_ms: u64 },

    ItemFailed {
        id: String,
        error: String,
        retry_count: u32,
    },

    /// Emitted after every task of a batch has been reconciled.
    BatchSettled { batch: usize, stats: RunStatistics },

    /// Emitted when the loop exits, whether exhausted or cancelled.
    RunStopped {
        stats: RunStatistics,
        cancelled: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = PipelineEvent::ItemFailed {
            id: "ID-00001".into(),
            error: "Request timed out after 60000ms".into(),
            retry_count: 2,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "itemFailed");
        assert_eq!(value["retryCount"], 2);

        let back: PipelineEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_batch_started_fields() {
        let event = PipelineEvent::BatchStarted {
            batch: 3,
            item_ids: vec!["a".into(), "b".into()],
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "batchStarted");
        assert_eq!(value["itemIds"][1], "b");
    }
}
