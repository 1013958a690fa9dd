use crate::types::{ItemStatus, WorkItem};

/// Estimate remaining run time from the durations of already settled items.
///
/// Remaining work (Idle + Processing) is processed in waves of
/// `concurrency` items, each wave costing the average observed request
/// duration plus the throttle delay. Returns `None` until at least one item
/// has settled with a recorded duration, and `Some(0)` when nothing remains.
pub fn estimate_remaining_ms(items: &[WorkItem], concurrency: usize, delay_ms: u64) -> Option<u64> {
    let remaining = items
        .iter()
        .filter(|i| matches!(i.status, ItemStatus::Idle | ItemStatus::Processing))
        .count() as u64;

    if remaining == 0 {
        return Some(0);
    }

    let (total_ms, samples) = items
        .iter()
        .filter(|i| i.status.is_settled())
        .filter_map(|i| i.duration_ms)
        .fold((0u64, 0u64), |(sum, n), ms| (sum + ms, n + 1));

    if samples == 0 {
        return None;
    }

    let avg_ms = total_ms / samples;
    let width = concurrency.max(1) as u64;
    let waves = remaining.div_ceil(width);
    Some(waves * (avg_ms + delay_ms))
}
