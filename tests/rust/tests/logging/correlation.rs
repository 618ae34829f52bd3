//! Correlation context isolation across tasks and threads

use nexlog_core::{correlation, CorrelationId, Extras};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use tests::logging::console_capture;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tasks_never_see_each_others_id() {
    let (system, capture) = console_capture();
    let logger = system.get_logger("app.worker");

    let mut handles = Vec::new();
    for task in 0..32 {
        let logger = logger.clone();
        let id = CorrelationId::parse(&format!("task-{task}")).unwrap();
        handles.push(tokio::spawn(correlation::scope_with(id, async move {
            for step in 0..5 {
                logger.info_with("step", Extras::new().with("task", task).with("step", step));
                tokio::task::yield_now().await;
            }
        })));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let records = capture.records();
    assert_eq!(records.len(), 32 * 5);

    let mut per_task: HashMap<String, usize> = HashMap::new();
    for record in &records {
        let expected = format!("task-{}", record["task"]);
        assert_eq!(record["correlation_id"], expected.as_str());
        *per_task.entry(expected).or_default() += 1;
    }
    assert_eq!(per_task.len(), 32);
    assert!(per_task.values().all(|count| *count == 5));

    // Nothing leaks back into the test task
    assert!(correlation::get().is_none());
}

#[test]
fn test_threads_bind_independently() {
    let (system, capture) = console_capture();

    let workers: Vec<_> = (0..8)
        .map(|n| {
            let logger = system.get_logger("app.thread");
            std::thread::spawn(move || {
                let _bound = correlation::bind(CorrelationId::parse(&format!("thread-{n}")).unwrap());
                logger.info_with("working", Extras::new().with("n", n));
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    for record in capture.records() {
        assert_eq!(record["correlation_id"], format!("thread-{}", record["n"]).as_str());
    }
    assert!(correlation::get().is_none());
}

#[test]
fn test_clear_without_binding_is_a_noop() {
    let (system, capture) = console_capture();
    let logger = system.get_logger("app");

    correlation::clear();
    correlation::clear();
    assert!(correlation::get().is_none());

    logger.info("no id bound");
    let record = &capture.records()[0];
    assert!(record.get("correlation_id").is_none());
}

#[tokio::test]
async fn test_spawned_subtasks_keep_the_request_id() {
    let (system, capture) = console_capture();
    let logger = system.get_logger("app.audit");

    let id = CorrelationId::parse("req-parent").unwrap();
    correlation::scope_with(id, async {
        let logger = logger.clone();
        tokio::spawn(correlation::propagate(async move {
            logger.info("audited");
        }))
        .await
        .unwrap();

        // Without propagation the spawned task starts unbound
        let unbound = tokio::spawn(async { correlation::get() }).await.unwrap();
        assert!(unbound.is_none());
    })
    .await;

    let records = capture.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["correlation_id"], "req-parent");
}

#[tokio::test(flavor = "current_thread")]
async fn test_unscoped_tasks_on_one_worker_stay_unbound() {
    let (system, capture) = console_capture();
    let logger = system.get_logger("app.unscoped");

    let binder = {
        let logger = logger.clone();
        tokio::spawn(async move {
            let _bound = correlation::bind(CorrelationId::parse("req-A").unwrap());
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            logger.info("binder done");
        })
    };
    let observer = {
        let logger = logger.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            logger.info("observer done");
        })
    };
    observer.await.unwrap();
    binder.await.unwrap();

    let records = capture.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.get("correlation_id").is_none()));
}
