use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::debug;

use crate::time::get_now_as_u128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenTask {
    /// Milliseconds since the epoch at which routing failed
    pub frozen_at_ms: u128,
    pub task_id: String,
}

/// Tasks whose routing failed transiently, oldest first.
///
/// Retrying them is up to whoever polls the freezer.
#[derive(Debug, Default)]
pub struct Freezer {
    entries: Mutex<VecDeque<FrozenTask>>,
}

impl Freezer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn freeze(
        &self,
        task_id: &str,
    ) {
        let mut entries = self.entries.lock();
        entries.push_back(FrozenTask {
            frozen_at_ms: get_now_as_u128(),
            task_id: task_id.to_string(),
        });
        debug!("task {} frozen, {} task(s) in freezer", task_id, entries.len());
    }

    /// Drops every entry of `task_id`. Returns whether there was any.
    pub fn remove(
        &self,
        task_id: &str,
    ) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|entry| entry.task_id != task_id);
        entries.len() != before
    }

    pub fn contains(
        &self,
        task_id: &str,
    ) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|entry| entry.task_id == task_id)
    }

    pub fn entries(&self) -> Vec<FrozenTask> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
