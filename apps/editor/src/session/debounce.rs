//! Per-field edit debouncing. A newer edit to the same field replaces the pending one
//! and restarts its window.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::models::field_key::FieldKey;

#[derive(Debug, Clone)]
struct PendingEdit {
    value: String,
    due: Instant,
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    pending: BTreeMap<FieldKey, PendingEdit>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: BTreeMap::new(),
        }
    }

    /// Queues `value` for `key`, superseding any pending value. Returns when it is due.
    pub fn push(&mut self, key: FieldKey, value: String, now: Instant) -> Instant {
        let due = now + self.window;
        self.pending.insert(key, PendingEdit { value, due });
        due
    }

    /// Removes and returns every edit due at `now`.
    pub fn take_due(&mut self, now: Instant) -> Vec<(FieldKey, String)> {
        let due: Vec<FieldKey> = self
            .pending
            .iter()
            .filter(|(_, edit)| edit.due <= now)
            .map(|(key, _)| key.clone())
            .collect();
        due.into_iter()
            .filter_map(|key| self.pending.remove(&key).map(|edit| (key, edit.value)))
            .collect()
    }

    /// Removes and returns everything pending, due or not.
    pub fn take_all(&mut self) -> Vec<(FieldKey, String)> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(key, edit)| (key, edit.value))
            .collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|edit| edit.due).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(field: &str) -> FieldKey {
        FieldKey::scalar("personal_info", field)
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_write_wins_and_restarts_window() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let t0 = Instant::now();
        debouncer.push(key("name"), "J".into(), t0);
        let due = debouncer.push(key("name"), "Jo".into(), t0 + Duration::from_millis(60));

        assert!(debouncer.take_due(t0 + Duration::from_millis(100)).is_empty());
        assert_eq!(debouncer.take_due(due), vec![(key("name"), "Jo".to_string())]);
        assert!(debouncer.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fields_debounce_independently() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let t0 = Instant::now();
        debouncer.push(key("name"), "Jordan".into(), t0);
        debouncer.push(key("email"), "j@x.dev".into(), t0 + Duration::from_millis(50));
        assert_eq!(debouncer.next_deadline(), Some(t0 + Duration::from_millis(100)));

        let first = debouncer.take_due(t0 + Duration::from_millis(100));
        assert_eq!(first, vec![(key("name"), "Jordan".to_string())]);
        assert_eq!(debouncer.len(), 1);
        assert_eq!(debouncer.take_all().len(), 1);
    }
}
