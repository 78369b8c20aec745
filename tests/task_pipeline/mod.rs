use std::sync::Arc;

use d_coord::DispatchOutcome;
use d_coord::DispatcherConfig;
use d_coord::TaskDispatcher;

use crate::commons::Farm;
use crate::commons::FixedRouter;
use crate::commons::Job;
use crate::commons::StageRouter;

fn job(stages: &[&str]) -> Job {
    Job {
        stages: stages.iter().map(|s| s.to_string()).collect(),
    }
}

fn dispatcher(farm: &Farm) -> TaskDispatcher<Job> {
    TaskDispatcher::new(
        DispatcherConfig::default(),
        Arc::new(StageRouter::default()),
        Arc::new(farm.clone()),
    )
}

#[tokio::test]
async fn jobs_flow_through_their_stages() {
    let farm = Farm::default();
    let d = dispatcher(&farm);
    d.add_worker("opt-1", "Optimizer", Some(1)).await.unwrap();
    d.add_worker("exe-1", "Executor", Some(2)).await.unwrap();

    for id in ["j1", "j2"] {
        d.submit(id, job(&["Optimizer", "Executor"])).await.unwrap();
    }
    assert_eq!(d.workers().worker_of("j1").as_deref(), Some("opt-1"));
    assert_eq!(d.queues().depth("Optimizer"), 1);

    d.task_done("j1").await.unwrap();
    d.task_done("j2").await.unwrap();
    assert_eq!(
        d.workers().tasks_of("exe-1"),
        vec!["j1".to_string(), "j2".to_string()]
    );

    assert_eq!(d.task_done("j1").await.unwrap(), DispatchOutcome::Finished);
    assert_eq!(d.task_done("j2").await.unwrap(), DispatchOutcome::Finished);
    assert_eq!(d.task_count(), 0);

    assert_eq!(
        *farm.received.lock(),
        vec![
            ("opt-1".to_string(), "j1".to_string()),
            ("exe-1".to_string(), "j1".to_string()),
            ("opt-1".to_string(), "j2".to_string()),
            ("exe-1".to_string(), "j2".to_string()),
        ]
    );
}

#[tokio::test]
async fn busy_worker_is_bypassed_and_lost_worker_work_is_recovered() {
    let farm = Farm::default();
    farm.busy.lock().push("exe-1".to_string());
    let d: TaskDispatcher<Job> = TaskDispatcher::new(
        DispatcherConfig::default(),
        Arc::new(FixedRouter("Executor")),
        Arc::new(farm.clone()),
    );
    d.add_worker("exe-1", "Executor", Some(4)).await.unwrap();
    d.add_worker("exe-2", "Executor", Some(1)).await.unwrap();

    d.submit("j1", job(&["Executor"])).await.unwrap();
    d.submit("j2", job(&["Executor"])).await.unwrap();

    assert_eq!(d.workers().worker_of("j1").as_deref(), Some("exe-2"));
    assert_eq!(d.queues().snapshot()["Executor"], vec!["j2".to_string()]);

    // exe-2 disappears: its job goes back to the dispatcher
    let orphans = d.remove_worker("exe-2");
    assert_eq!(orphans, vec!["j1".to_string()]);

    farm.busy.lock().clear();
    for orphan in &orphans {
        d.redispatch(orphan).await.unwrap();
    }

    assert_eq!(
        d.workers().tasks_of("exe-1"),
        vec!["j1".to_string(), "j2".to_string()]
    );
    assert!(d.queues().is_empty());
}
