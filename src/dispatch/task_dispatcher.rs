use std::collections::HashSet;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::DispatchOutcome;
use super::Freezer;
use super::SendOutcome;
use super::TaskRouter;
use super::TaskSender;
use super::WaitingQueue;
use super::WorkerRegistry;
use crate::DispatchError;
use crate::DispatcherConfig;
use crate::Result;

/// Routes tasks to worker types and drains the waiting queues into idle
/// worker slots.
///
/// The master registry, the worker registry and the waiting queues each sit
/// behind their own lock. None of them is held across a call to the router or
/// the sender.
pub struct TaskDispatcher<P>
where
    P: Send + Sync + 'static,
{
    config: DispatcherConfig,
    tasks: DashMap<String, Arc<P>>,
    workers: WorkerRegistry,
    queues: WaitingQueue,
    freezer: Freezer,
    router: Arc<dyn TaskRouter<P>>,
    sender: Arc<dyn TaskSender>,
}

impl<P> TaskDispatcher<P>
where
    P: Send + Sync + 'static,
{
    pub fn new(
        config: DispatcherConfig,
        router: Arc<dyn TaskRouter<P>>,
        sender: Arc<dyn TaskSender>,
    ) -> Self {
        Self {
            config,
            tasks: DashMap::new(),
            workers: WorkerRegistry::new(),
            queues: WaitingQueue::new(),
            freezer: Freezer::new(),
            router,
            sender,
        }
    }

    pub fn workers(&self) -> &WorkerRegistry {
        &self.workers
    }

    pub fn queues(&self) -> &WaitingQueue {
        &self.queues
    }

    pub fn freezer(&self) -> &Freezer {
        &self.freezer
    }

    pub fn contains_task(
        &self,
        task_id: &str,
    ) -> bool {
        self.tasks.contains_key(task_id)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn payload(
        &self,
        task_id: &str,
    ) -> Option<Arc<P>> {
        self.tasks.get(task_id).map(|entry| entry.value().clone())
    }

    /// Registers a new task and dispatches it.
    ///
    /// Submitting an id that is already registered changes nothing.
    pub async fn submit(
        &self,
        task_id: &str,
        payload: P,
    ) -> Result<DispatchOutcome> {
        match self.tasks.entry(task_id.to_string()) {
            Entry::Occupied(_) => {
                debug!("task {} already registered, ignoring submission", task_id);
                return Ok(DispatchOutcome::Duplicate);
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(payload));
            }
        }
        self.dispatch(task_id).await
    }

    /// Routes a registered task again, e.g. one waiting in the freezer or
    /// orphaned by a removed worker. The task leaves its queue and any slot
    /// it still holds first, so routing may pick another worker type.
    pub async fn redispatch(
        &self,
        task_id: &str,
    ) -> Result<DispatchOutcome> {
        self.freezer.remove(task_id);
        self.queues.remove(task_id);
        self.workers.release_task(task_id, None);
        self.dispatch(task_id).await
    }

    async fn dispatch(
        &self,
        task_id: &str,
    ) -> Result<DispatchOutcome> {
        let payload = self
            .payload(task_id)
            .ok_or_else(|| DispatchError::UnknownTask(task_id.to_string()))?;

        let worker_type = match self.router.route(task_id, payload.as_ref()).await {
            Err(e) => {
                if !self.tasks.contains_key(task_id) {
                    error!("task {} vanished while being routed", task_id);
                    return Err(DispatchError::UnknownTask(task_id.to_string()).into());
                }
                warn!("routing task {} failed, freezing it: {}", task_id, e);
                self.freezer.freeze(task_id);
                return Ok(DispatchOutcome::Frozen);
            }
            Ok(Some(worker_type)) if !worker_type.is_empty() => worker_type,
            Ok(_) => {
                info!("task {} needs no more processing", task_id);
                self.forget(task_id);
                return Ok(DispatchOutcome::Finished);
            }
        };

        if !self.tasks.contains_key(task_id) {
            debug!("task {} was removed while being routed", task_id);
            return Err(DispatchError::UnknownTask(task_id.to_string()).into());
        }
        self.queues.push(&worker_type, task_id, false)?;
        // A removal between the check and the push misses the queue entry
        if !self.tasks.contains_key(task_id) {
            self.queues.remove(task_id);
            debug!("task {} was removed while being queued", task_id);
            return Err(DispatchError::UnknownTask(task_id.to_string()).into());
        }
        self.fill_workers_of_type(&worker_type).await?;
        Ok(DispatchOutcome::Queued { worker_type })
    }

    /// Hands queued tasks of `worker_type` to its idle workers until either
    /// side runs out. Returns how many tasks were accepted.
    ///
    /// A task refused by a worker goes back to the head of the queue and the
    /// pass moves on to the next idle worker; a transport error ends the pass.
    pub async fn fill_workers_of_type(
        &self,
        worker_type: &str,
    ) -> Result<usize> {
        let mut accepted = 0;
        let mut refused: HashSet<String> = HashSet::new();

        loop {
            let Some(worker_id) = self.workers.most_idle_worker_excluding(worker_type, &refused) else {
                break;
            };
            let Some(task_id) = self.queues.pop(worker_type) else {
                break;
            };
            if !self.tasks.contains_key(&task_id) {
                debug!("task {} was removed while waiting, skipping it", task_id);
                continue;
            }
            if self.workers.try_reserve(&worker_id, &task_id).is_none() {
                // Slot taken by a concurrent pass
                self.requeue_ahead(worker_type, &task_id)?;
                continue;
            }

            match self.sender.send(&worker_id, &task_id).await {
                Ok(SendOutcome::Accepted) => {
                    if !self.tasks.contains_key(&task_id) {
                        self.workers.release_task(&task_id, Some(&worker_id));
                        continue;
                    }
                    accepted += 1;
                    debug!(
                        "task {} accepted by {}, {} slot(s) left",
                        task_id,
                        worker_id,
                        self.workers.free_slots(&worker_id)
                    );
                }
                Ok(SendOutcome::Rejected) => {
                    debug!("worker {} rejected task {}", worker_id, task_id);
                    self.workers.release_task(&task_id, Some(&worker_id));
                    self.requeue_ahead(worker_type, &task_id)?;
                    refused.insert(worker_id);
                }
                Err(e) => {
                    warn!("failed to send task {} to {}: {}", task_id, worker_id, e);
                    self.workers.release_task(&task_id, Some(&worker_id));
                    self.requeue_ahead(worker_type, &task_id)?;
                    break;
                }
            }
        }

        Ok(accepted)
    }

    fn requeue_ahead(
        &self,
        worker_type: &str,
        task_id: &str,
    ) -> Result<()> {
        if self.tasks.contains_key(task_id) {
            self.queues.push(worker_type, task_id, true)?;
        }
        Ok(())
    }

    /// Registers a worker and gives it queued tasks of its type.
    ///
    /// `capacity = None` uses the configured default.
    pub async fn add_worker(
        &self,
        worker_id: &str,
        worker_type: &str,
        capacity: Option<usize>,
    ) -> Result<usize> {
        let capacity = capacity.unwrap_or(self.config.default_worker_capacity);
        self.workers.add_worker(worker_id, worker_type, capacity);
        self.fill_workers_of_type(worker_type).await
    }

    /// Forgets a worker and returns the tasks it was executing.
    ///
    /// Those tasks stay registered; re-dispatching them is up to the caller.
    pub fn remove_worker(
        &self,
        worker_id: &str,
    ) -> Vec<String> {
        let orphans = self.workers.remove_worker(worker_id);
        if !orphans.is_empty() {
            warn!(
                "worker {} removed while executing {} task(s)",
                worker_id,
                orphans.len()
            );
        }
        orphans
    }

    /// Frees the slot held by `task_id` without refilling it.
    pub fn release_task(
        &self,
        task_id: &str,
    ) -> usize {
        self.workers.release_task(task_id, None)
    }

    /// A worker finished its stage of `task_id`: free the slot, route the task
    /// to its next stage and refill the freed worker.
    pub async fn task_done(
        &self,
        task_id: &str,
    ) -> Result<DispatchOutcome> {
        let worker_id = self.workers.worker_of(task_id);
        self.workers.release_task(task_id, worker_id.as_deref());

        let outcome = self.dispatch(task_id).await?;

        if let Some(worker_id) = worker_id {
            for worker_type in self.workers.types_of(&worker_id) {
                self.fill_workers_of_type(&worker_type).await?;
            }
        }
        Ok(outcome)
    }

    /// Drops a task from every registry. Returns whether it was known.
    pub fn remove_task(
        &self,
        task_id: &str,
    ) -> bool {
        let known = self.tasks.remove(task_id).is_some();
        self.forget(task_id);
        known
    }

    fn forget(
        &self,
        task_id: &str,
    ) {
        self.tasks.remove(task_id);
        self.queues.remove(task_id);
        self.freezer.remove(task_id);
        self.workers.release_task(task_id, None);
    }
}
