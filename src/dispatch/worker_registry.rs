use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::HashSet;

use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct RegistryState {
    /// worker type -> worker ids, ordered so ties resolve to the lowest id
    by_type: HashMap<String, BTreeSet<String>>,
    capacity: HashMap<String, usize>,
    assigned: HashMap<String, HashSet<String>>,
    /// task id -> worker executing it
    owner: HashMap<String, String>,
}

impl RegistryState {
    fn free_slots(
        &self,
        worker_id: &str,
    ) -> usize {
        match (self.capacity.get(worker_id), self.assigned.get(worker_id)) {
            (Some(capacity), Some(tasks)) => capacity.saturating_sub(tasks.len()),
            _ => 0,
        }
    }

    fn assign(
        &mut self,
        worker_id: &str,
        task_id: &str,
    ) -> usize {
        if !self.assigned.contains_key(worker_id) {
            return 0;
        }
        if let Some(previous) = self.owner.insert(task_id.to_string(), worker_id.to_string()) {
            if previous != worker_id {
                if let Some(tasks) = self.assigned.get_mut(&previous) {
                    tasks.remove(task_id);
                }
            }
        }
        let tasks = self.assigned.entry(worker_id.to_string()).or_default();
        tasks.insert(task_id.to_string());
        tasks.len()
    }
}

/// Bookkeeping of workers, their slots and the tasks they execute.
///
/// Forward (worker -> tasks) and inverse (task -> worker) indexes are updated
/// together under one lock. The registry never re-routes anything: tasks
/// orphaned by a removed worker are handed back to the caller.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    inner: Mutex<RegistryState>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `worker_id` under `worker_type`. Repeating the call updates
    /// the capacity and adds the type; current assignments are kept.
    pub fn add_worker(
        &self,
        worker_id: &str,
        worker_type: &str,
        capacity: usize,
    ) {
        let mut state = self.inner.lock();
        state.capacity.insert(worker_id.to_string(), capacity);
        state.assigned.entry(worker_id.to_string()).or_default();
        state
            .by_type
            .entry(worker_type.to_string())
            .or_default()
            .insert(worker_id.to_string());
        debug!(
            "worker {} registered for {} with {} slot(s)",
            worker_id, worker_type, capacity
        );
    }

    /// Forgets `worker_id` and returns the tasks it was executing.
    pub fn remove_worker(
        &self,
        worker_id: &str,
    ) -> Vec<String> {
        let mut state = self.inner.lock();
        state.by_type.retain(|_, workers| {
            workers.remove(worker_id);
            !workers.is_empty()
        });
        state.capacity.remove(worker_id);
        let orphans: Vec<String> = state
            .assigned
            .remove(worker_id)
            .map(|tasks| tasks.into_iter().collect())
            .unwrap_or_default();
        for task_id in &orphans {
            state.owner.remove(task_id);
        }
        debug!("worker {} removed, {} task(s) orphaned", worker_id, orphans.len());
        orphans
    }

    pub fn contains_worker(
        &self,
        worker_id: &str,
    ) -> bool {
        self.inner.lock().capacity.contains_key(worker_id)
    }

    /// Unknown workers count as full.
    pub fn is_full(
        &self,
        worker_id: &str,
    ) -> bool {
        self.free_slots(worker_id) == 0
    }

    pub fn free_slots(
        &self,
        worker_id: &str,
    ) -> usize {
        self.inner.lock().free_slots(worker_id)
    }

    /// Free slots of every worker of `worker_type` that has any.
    pub fn idle_workers_of_type(
        &self,
        worker_type: &str,
    ) -> BTreeMap<String, usize> {
        let state = self.inner.lock();
        let Some(workers) = state.by_type.get(worker_type) else {
            return BTreeMap::new();
        };
        workers
            .iter()
            .map(|id| (id.clone(), state.free_slots(id)))
            .filter(|(_, free)| *free > 0)
            .collect()
    }

    /// Worker of `worker_type` with the most free slots, lowest id on ties.
    pub fn most_idle_worker_of_type(
        &self,
        worker_type: &str,
    ) -> Option<String> {
        self.most_idle_worker_excluding(worker_type, &HashSet::new())
    }

    pub(crate) fn most_idle_worker_excluding(
        &self,
        worker_type: &str,
        skip: &HashSet<String>,
    ) -> Option<String> {
        let state = self.inner.lock();
        let mut best: Option<(&String, usize)> = None;
        for id in state.by_type.get(worker_type)?.iter() {
            if skip.contains(id) {
                continue;
            }
            let free = state.free_slots(id);
            if free > best.map_or(0, |(_, most)| most) {
                best = Some((id, free));
            }
        }
        best.map(|(id, _)| id.clone())
    }

    /// Records `task_id` as executed by `worker_id`.
    ///
    /// Returns the worker's new task count, 0 for an unknown worker.
    pub fn assign_task(
        &self,
        worker_id: &str,
        task_id: &str,
    ) -> usize {
        self.inner.lock().assign(worker_id, task_id)
    }

    /// Takes a slot of `worker_id` for `task_id` only if one is free.
    pub(crate) fn try_reserve(
        &self,
        worker_id: &str,
        task_id: &str,
    ) -> Option<usize> {
        let mut state = self.inner.lock();
        if state.free_slots(worker_id) == 0 {
            return None;
        }
        Some(state.assign(worker_id, task_id))
    }

    /// Drops the assignment of `task_id`, looking the worker up when not given.
    ///
    /// Returns the worker's remaining task count, 0 when the task or the
    /// worker is unknown.
    pub fn release_task(
        &self,
        task_id: &str,
        worker_id: Option<&str>,
    ) -> usize {
        let mut state = self.inner.lock();
        let worker_id = match worker_id {
            Some(id) => id.to_string(),
            None => match state.owner.get(task_id) {
                Some(id) => id.clone(),
                None => return 0,
            },
        };
        if state.owner.get(task_id) == Some(&worker_id) {
            state.owner.remove(task_id);
        }
        let Some(tasks) = state.assigned.get_mut(&worker_id) else {
            return 0;
        };
        if tasks.remove(task_id) {
            tasks.len()
        } else {
            0
        }
    }

    pub fn worker_of(
        &self,
        task_id: &str,
    ) -> Option<String> {
        self.inner.lock().owner.get(task_id).cloned()
    }

    pub fn tasks_of(
        &self,
        worker_id: &str,
    ) -> Vec<String> {
        let state = self.inner.lock();
        let mut tasks: Vec<String> = state
            .assigned
            .get(worker_id)
            .map(|tasks| tasks.iter().cloned().collect())
            .unwrap_or_default();
        tasks.sort();
        tasks
    }

    /// Types `worker_id` is registered under
    pub fn types_of(
        &self,
        worker_id: &str,
    ) -> Vec<String> {
        let state = self.inner.lock();
        let mut types: Vec<String> = state
            .by_type
            .iter()
            .filter(|(_, workers)| workers.contains(worker_id))
            .map(|(worker_type, _)| worker_type.clone())
            .collect();
        types.sort();
        types
    }
}
