use super::*;
use crate::DispatchError;
use crate::Error;

#[test]
fn test_push_pop_is_fifo_per_type() {
    let queue = WaitingQueue::new();
    queue.push("A", "t1", false).unwrap();
    queue.push("A", "t2", false).unwrap();
    queue.push("B", "t3", false).unwrap();

    assert_eq!(queue.depth("A"), 2);
    assert_eq!(queue.len(), 3);
    assert_eq!(queue.pop("A").as_deref(), Some("t1"));
    assert_eq!(queue.pop("A").as_deref(), Some("t2"));
    assert_eq!(queue.pop("A"), None);
    assert_eq!(queue.pop("B").as_deref(), Some("t3"));
    assert!(queue.is_empty());
}

#[test]
fn test_push_ahead_goes_to_head() {
    let queue = WaitingQueue::new();
    queue.push("A", "t1", false).unwrap();
    queue.push("A", "t2", true).unwrap();

    assert_eq!(queue.pop("A").as_deref(), Some("t2"));
    assert_eq!(queue.pop("A").as_deref(), Some("t1"));
}

#[test]
fn test_push_same_type_twice_is_noop() {
    let queue = WaitingQueue::new();
    queue.push("A", "t1", false).unwrap();
    queue.push("A", "t1", true).unwrap();

    assert_eq!(queue.depth("A"), 1);
    assert_eq!(queue.queued_type("t1").as_deref(), Some("A"));
}

#[test]
fn test_push_under_other_type_fails() {
    let queue = WaitingQueue::new();
    queue.push("A", "t1", false).unwrap();

    let err = queue.push("B", "t1", false).unwrap_err();
    match err {
        Error::Dispatch(DispatchError::QueuedUnderOtherType {
            task_id,
            queued_type,
            requested_type,
        }) => {
            assert_eq!(task_id, "t1");
            assert_eq!(queued_type, "A");
            assert_eq!(requested_type, "B");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(queue.depth("B"), 0);
    assert_eq!(queue.depth("A"), 1);
}

#[test]
fn test_task_can_be_queued_again_after_pop() {
    let queue = WaitingQueue::new();
    queue.push("A", "t1", false).unwrap();
    queue.pop("A");

    queue.push("B", "t1", false).unwrap();
    assert_eq!(queue.queued_type("t1").as_deref(), Some("B"));
}

#[test]
fn test_remove_from_middle_keeps_order() {
    let queue = WaitingQueue::new();
    for task in ["t1", "t2", "t3"] {
        queue.push("A", task, false).unwrap();
    }

    assert!(queue.remove("t2"));
    assert!(!queue.remove("t2"));
    assert_eq!(queue.queued_type("t2"), None);

    let snapshot = queue.snapshot();
    assert_eq!(snapshot["A"], vec!["t1".to_string(), "t3".to_string()]);
}

#[test]
fn test_snapshot_is_a_copy() {
    let queue = WaitingQueue::new();
    queue.push("A", "t1", false).unwrap();

    let snapshot = queue.snapshot();
    queue.pop("A");

    assert_eq!(snapshot["A"], vec!["t1".to_string()]);
    assert_eq!(queue.depth("A"), 0);
}

#[test]
fn test_last_used_is_recorded_on_push() {
    let queue = WaitingQueue::new();
    assert!(queue.last_used("A").is_none());

    let before = std::time::Instant::now();
    queue.push("A", "t1", false).unwrap();
    let stamp = queue.last_used("A").unwrap();
    assert!(stamp >= before);
}
