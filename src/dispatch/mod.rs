//! Task dispatch: routes submitted tasks to a type of worker, queues them and
//! hands them to idle workers of that type.
//!
//! The dispatcher owns no transport. The application injects a [`TaskRouter`]
//! deciding which worker type handles a task and a [`TaskSender`] delivering a
//! task to a worker.
mod freezer;
mod task_dispatcher;
mod waiting_queue;
mod worker_registry;

pub use freezer::*;
pub use task_dispatcher::*;
pub use waiting_queue::*;
pub use worker_registry::*;

#[cfg(test)]
mod waiting_queue_test;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::Result;

/// Answer of a worker to a task handed over by [`TaskSender::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Accepted,
    Rejected,
}

/// What happened to a task passed to the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The task id was already registered, nothing changed
    Duplicate,
    /// Routing returned no worker type: the task is complete and was dropped
    Finished,
    /// Routing failed, the task waits in the freezer
    Frozen,
    /// The task waits for (or already runs on) a worker of this type
    Queued { worker_type: String },
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TaskRouter<P>: Send + Sync + 'static
where
    P: Send + Sync + 'static,
{
    /// Worker type that should process the task next.
    ///
    /// `Ok(None)` (or an empty type) means the task needs no more processing.
    /// An error means routing failed transiently.
    async fn route(
        &self,
        task_id: &str,
        payload: &P,
    ) -> Result<Option<String>>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TaskSender: Send + Sync + 'static {
    /// Hands `task_id` over to `worker_id`.
    ///
    /// An error is a transport failure; a worker refusing the task answers
    /// [`SendOutcome::Rejected`].
    async fn send(
        &self,
        worker_id: &str,
        task_id: &str,
    ) -> Result<SendOutcome>;
}
