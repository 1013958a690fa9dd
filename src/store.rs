use std::sync::{Mutex, MutexGuard};

use crate::types::{ItemStatus, WorkItem};

/// Ordered, in-memory collection of work items.
///
/// Every operation takes the lock once and releases it before returning, so
/// observers can snapshot the store while the engine reconciles results.
/// Mutation is always targeted by id; there is no full-collection
/// read-modify-write outside of [`load`](Self::load).
#[derive(Debug, Default)]
pub struct ItemStore {
    items: Mutex<Vec<WorkItem>>,
}

impl ItemStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `items` in the given order.
    pub fn from_items(items: Vec<WorkItem>) -> Self {
        Self {
            items: Mutex::new(items),
        }
    }

    // Poisoning is recovered; no mutation spans more than one item.
    fn lock(&self) -> MutexGuard<'_, Vec<WorkItem>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the entire collection.
    pub fn load(&self, items: Vec<WorkItem>) {
        *self.lock() = items;
    }

    /// Point-in-time copy of every item.
    pub fn snapshot(&self) -> Vec<WorkItem> {
        self.lock().clone()
    }

    /// Run `f` against the current items without cloning them.
    pub fn with_items<R>(&self, f: impl FnOnce(&[WorkItem]) -> R) -> R {
        f(&self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Get a copy of a specific item by id.
    pub fn get(&self, id: &str) -> Option<WorkItem> {
        self.lock().iter().find(|i| i.id == id).cloned()
    }

    /// Items matching `predicate`, in collection order.
    pub fn filter(&self, predicate: impl Fn(&WorkItem) -> bool) -> Vec<WorkItem> {
        self.lock()
            .iter()
            .filter(|i| predicate(i))
            .cloned()
            .collect()
    }

    pub fn filter_by_status(&self, status: ItemStatus) -> Vec<WorkItem> {
        self.filter(|i| i.status == status)
    }

    pub fn count_by_status(&self, status: ItemStatus) -> usize {
        self.lock().iter().filter(|i| i.status == status).count()
    }

    /// Apply `patch` to the item with `id`. Returns `false` if the id is absent.
    pub fn update_by_id(&self, id: &str, patch: impl FnOnce(&mut WorkItem)) -> bool {
        let mut items = self.lock();
        match items.iter_mut().find(|i| i.id == id) {
            Some(item) => {
                patch(item);
                true
            }
            None => false,
        }
    }

    /// Select up to `limit` Idle items in collection order and mark them
    /// Processing. Returns copies of the claimed items.
    pub fn claim_idle(&self, limit: usize) -> Vec<WorkItem> {
        let mut items = self.lock();
        let mut claimed = Vec::with_capacity(limit);
        for item in items
            .iter_mut()
            .filter(|i| i.status == ItemStatus::Idle)
            .take(limit)
        {
            item.mark_processing();
            claimed.push(item.clone());
        }
        claimed
    }

    /// Move every Processing item back to Idle. Returns how many moved.
    pub fn reset_processing(&self) -> usize {
        let mut items = self.lock();
        let mut count = 0;
        for item in items
            .iter_mut()
            .filter(|i| i.status == ItemStatus::Processing)
        {
            item.reset_to_idle();
            count += 1;
        }
        count
    }

    /// Move every Failed item back to Idle and clear its error.
    /// `retry_count` is preserved. Returns how many moved.
    pub fn requeue_failed(&self) -> usize {
        self.requeue_failed_where(|_| true)
    }

    /// Like [`requeue_failed`](Self::requeue_failed), but items whose
    /// `retry_count` has reached `cap` stay Failed.
    pub fn requeue_failed_below(&self, cap: u32) -> usize {
        self.requeue_failed_where(|i| i.retry_count < cap)
    }

    fn requeue_failed_where(&self, eligible: impl Fn(&WorkItem) -> bool) -> usize {
        let mut items = self.lock();
        let mut count = 0;
        for item in items
            .iter_mut()
            .filter(|i| i.status == ItemStatus::Failed && eligible(i))
        {
            item.reset_to_idle();
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransformOutput;

    fn make_items(count: usize) -> Vec<WorkItem> {
        (0..count)
            .map(|i| WorkItem::new(format!("item-{}", i), format!("text-{}", i)))
            .collect()
    }

    fn fail(store: &ItemStore, id: &str) {
        store.update_by_id(id, |i| i.mark_failed("err".to_string(), 1));
    }

    #[test]
    fn test_load_replaces_collection() {
        let store = ItemStore::from_items(make_items(3));
        assert_eq!(store.len(), 3);
        store.load(make_items(1));
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }

    #[test]
    fn test_filter_preserves_order() {
        let store = ItemStore::from_items(make_items(4));
        fail(&store, "item-1");
        let idle = store.filter_by_status(ItemStatus::Idle);
        let ids: Vec<_> = idle.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["item-0", "item-2", "item-3"]);
        assert_eq!(store.count_by_status(ItemStatus::Failed), 1);
    }

    #[test]
    fn test_update_missing_id_is_noop() {
        let store = ItemStore::from_items(make_items(2));
        let before = store.snapshot();
        assert!(!store.update_by_id("nope", |i| i.mark_processing()));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_claim_idle_respects_limit_and_order() {
        let store = ItemStore::from_items(make_items(5));
        fail(&store, "item-0");

        let claimed = store.claim_idle(2);
        let ids: Vec<_> = claimed.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["item-1", "item-2"]);
        assert!(claimed.iter().all(|i| i.status == ItemStatus::Processing));
        assert_eq!(store.count_by_status(ItemStatus::Processing), 2);

        let next = store.claim_idle(10);
        assert_eq!(next.len(), 2);
        assert!(store.claim_idle(10).is_empty());
    }

    #[test]
    fn test_reset_processing() {
        let store = ItemStore::from_items(make_items(3));
        store.claim_idle(2);
        assert_eq!(store.reset_processing(), 2);
        assert_eq!(store.count_by_status(ItemStatus::Idle), 3);
    }

    #[test]
    fn test_requeue_failed_keeps_retry_count() {
        let store = ItemStore::from_items(make_items(3));
        fail(&store, "item-0");
        fail(&store, "item-2");
        store.update_by_id("item-1", |i| {
            i.mark_completed(
                TransformOutput {
                    reasoning: "r".into(),
                    output: "o".into(),
                },
                1,
            )
        });

        assert_eq!(store.requeue_failed(), 2);
        let item = store.get("item-0").unwrap();
        assert_eq!(item.status, ItemStatus::Idle);
        assert_eq!(item.retry_count, 1);
        assert!(item.error_message.is_none());
        assert_eq!(
            store.get("item-1").unwrap().status,
            ItemStatus::Completed
        );
    }

    #[test]
    fn test_requeue_failed_idempotent() {
        let store = ItemStore::from_items(make_items(2));
        fail(&store, "item-0");
        store.requeue_failed();
        let once = store.snapshot();
        assert_eq!(store.requeue_failed(), 0);
        assert_eq!(store.snapshot(), once);
    }

    #[test]
    fn test_requeue_failed_below_cap() {
        let store = ItemStore::from_items(make_items(2));
        fail(&store, "item-1");
        store.requeue_failed_below(5);
        fail(&store, "item-1");
        fail(&store, "item-0");

        // item-0 has 1 attempt, item-1 has 2
        assert_eq!(store.requeue_failed_below(2), 1);
        assert_eq!(store.get("item-0").unwrap().status, ItemStatus::Idle);
        assert_eq!(store.get("item-1").unwrap().status, ItemStatus::Failed);
    }
}
