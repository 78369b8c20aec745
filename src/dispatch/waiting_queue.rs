use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::debug;
use tracing::error;

use crate::DispatchError;
use crate::Result;

#[derive(Debug, Default)]
struct QueueState {
    queues: HashMap<String, VecDeque<String>>,
    /// task id -> worker type it waits for
    queued_as: HashMap<String, String>,
    last_used: HashMap<String, Instant>,
}

/// Per worker type FIFO of tasks waiting for a free slot.
///
/// A task waits in at most one queue at a time.
#[derive(Debug, Default)]
pub struct WaitingQueue {
    inner: Mutex<QueueState>,
}

impl WaitingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `task_id` for `worker_type`, at the head when `ahead` is set.
    ///
    /// Pushing a task already waiting for the same type is a no-op. A task
    /// waiting for another type is a contract violation and fails.
    pub fn push(
        &self,
        worker_type: &str,
        task_id: &str,
        ahead: bool,
    ) -> Result<()> {
        let mut state = self.inner.lock();
        match state.queued_as.get(task_id) {
            Some(queued) if queued == worker_type => return Ok(()),
            Some(queued) => {
                error!(
                    "task {} is queued for {}, refusing to queue it for {}",
                    task_id, queued, worker_type
                );
                return Err(DispatchError::QueuedUnderOtherType {
                    task_id: task_id.to_string(),
                    queued_type: queued.clone(),
                    requested_type: worker_type.to_string(),
                }
                .into());
            }
            None => {}
        }

        state
            .queued_as
            .insert(task_id.to_string(), worker_type.to_string());
        let queue = state.queues.entry(worker_type.to_string()).or_default();
        if ahead {
            queue.push_front(task_id.to_string());
        } else {
            queue.push_back(task_id.to_string());
        }
        let depth = queue.len();
        state.last_used.insert(worker_type.to_string(), Instant::now());
        debug!(
            "task {} queued for {} (ahead: {}), depth {}",
            task_id, worker_type, ahead, depth
        );
        Ok(())
    }

    /// Takes the next task waiting for `worker_type`.
    pub fn pop(
        &self,
        worker_type: &str,
    ) -> Option<String> {
        let mut state = self.inner.lock();
        let task_id = state.queues.get_mut(worker_type)?.pop_front()?;
        state.queued_as.remove(&task_id);
        Some(task_id)
    }

    /// Removes `task_id` from wherever it waits. Returns whether it was queued.
    pub fn remove(
        &self,
        task_id: &str,
    ) -> bool {
        let mut state = self.inner.lock();
        let Some(worker_type) = state.queued_as.remove(task_id) else {
            return false;
        };
        if let Some(queue) = state.queues.get_mut(&worker_type) {
            queue.retain(|queued| queued != task_id);
        }
        true
    }

    pub fn depth(
        &self,
        worker_type: &str,
    ) -> usize {
        self.inner
            .lock()
            .queues
            .get(worker_type)
            .map_or(0, VecDeque::len)
    }

    /// Number of waiting tasks across all types
    pub fn len(&self) -> usize {
        self.inner.lock().queued_as.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn queued_type(
        &self,
        task_id: &str,
    ) -> Option<String> {
        self.inner.lock().queued_as.get(task_id).cloned()
    }

    /// Last time a task was pushed for `worker_type`
    pub fn last_used(
        &self,
        worker_type: &str,
    ) -> Option<Instant> {
        self.inner.lock().last_used.get(worker_type).copied()
    }

    /// Copy of every queue, head first.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<String>> {
        self.inner
            .lock()
            .queues
            .iter()
            .map(|(worker_type, queue)| (worker_type.clone(), queue.iter().cloned().collect()))
            .collect()
    }
}
