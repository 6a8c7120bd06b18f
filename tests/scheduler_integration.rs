//! End-to-end scheduler behavior through the public API, on paused tokio time

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tickpoll::domain::{RetryLimit, SchedulerEvent, Task, TaskFn, TaskSchema, TaskState, TimeUnit};
use tickpoll::id::now_ms;
use tickpoll::scheduler::{SchedulerConfig, SchedulerContext};
use tickpoll::TickpollError;

fn context() -> SchedulerContext {
    SchedulerContext::new(SchedulerConfig::default().with_random_start(false))
}

fn flaky(failures: u32, calls: Arc<AtomicU32>) -> TaskFn {
    TaskFn::sync(move |_| {
        if calls.fetch_add(1, Ordering::SeqCst) < failures {
            Err(TickpollError::failure("error"))
        } else {
            Ok(Value::from("success"))
        }
    })
}

#[tokio::test(start_paused = true)]
async fn test_repeating_task_stats_over_three_seconds() {
    let ctx = context();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let work = TaskFn::sync(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Null)
    });

    ctx.scheduler
        .add_task(TaskSchema::new(work).at(now_ms() + 100).every(1, TimeUnit::Second));
    ctx.start();
    tokio::time::sleep(Duration::from_millis(3000)).await;

    let stats = ctx.stats.snapshot();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(stats.successful_runs, 3);
    assert_eq!(stats.failed_runs, 0);
    assert_eq!(stats.completed, 0);
    assert_eq!(stats.total(), 1);
    ctx.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_one_shot_retries_then_succeeds() {
    let ctx = context();
    ctx.start();
    let calls = Arc::new(AtomicU32::new(0));

    let result = ctx
        .scheduler
        .run_in_with_retries(flaky(2, calls.clone()), 1, TimeUnit::Second, RetryLimit::Times(2))
        .await;

    assert_eq!(result, Ok(Value::from("success")));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(ctx.scheduler.is_empty());
    assert_eq!(ctx.stats.completed(), 1);
    assert_eq!(ctx.stats.failed_runs(), 2);
    assert_eq!(ctx.stats.successful_runs(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_one_shot_exhausts_retry_budget() {
    let ctx = context();
    ctx.start();
    let calls = Arc::new(AtomicU32::new(0));

    let result = ctx
        .scheduler
        .run_in_with_retries(flaky(2, calls.clone()), 1, TimeUnit::Second, RetryLimit::Times(1))
        .await;

    assert_eq!(result, Err(TickpollError::failure("error")));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(ctx.scheduler.is_empty());
    assert_eq!(ctx.stats.idle(), 0);
    assert_eq!(ctx.stats.running(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_run_once_in_does_not_retry() {
    let ctx = context();
    ctx.start();
    let calls = Arc::new(AtomicU32::new(0));

    let result = ctx.scheduler.run_once_in(flaky(1, calls.clone()), 500, TimeUnit::Millisecond).await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_in_cancelled_on_destroy() {
    let ctx = context();
    ctx.start();
    let pending = ctx
        .scheduler
        .run_in(TaskFn::sync(|_| Ok(Value::Null)), 1, TimeUnit::Hour);

    ctx.shutdown();

    assert!(matches!(pending.await, Err(TickpollError::Cancelled(_))));
}

#[tokio::test(start_paused = true)]
async fn test_event_stream_for_one_shot_task() {
    let ctx = context();
    let mut events = ctx.scheduler.subscribe();
    let task = Task::new(
        TaskSchema::new(TaskFn::sync(|args| Ok(args[0].clone())))
            .args(vec![json!(42)])
            .at(now_ms()),
    );
    let id = ctx.scheduler.add_task(&task);
    ctx.start();

    let mut names = Vec::new();
    loop {
        let event = events.recv().await.unwrap();
        assert_eq!(event.task_id(), Some(id.as_str()));
        if let SchedulerEvent::TaskSuccess { result, .. } = &event {
            assert_eq!(result, &json!(42));
        }
        names.push(event.name());
        if event.name() == "task.removed" {
            break;
        }
    }

    assert_eq!(
        names,
        vec!["task.added", "task.launched", "task.success", "task.completed", "task.removed"]
    );
    assert_eq!(task.state(), TaskState::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn test_async_work_is_awaited() {
    let ctx = context();
    ctx.start();

    let work = TaskFn::from_async(|args: Vec<Value>| async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(json!(args.len()))
    });
    let result = ctx.scheduler.run_in(work, 100, TimeUnit::Millisecond).await;

    assert_eq!(result, Ok(json!(0)));
}

#[tokio::test(start_paused = true)]
async fn test_removed_task_is_not_dispatched() {
    let ctx = context();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let id = ctx.scheduler.add_task(
        TaskSchema::new(TaskFn::sync(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        }))
        .at(now_ms() + 1000),
    );
    ctx.start();

    assert!(ctx.scheduler.remove_task(&id));
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(ctx.stats.idle(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_remove_while_running_keeps_stats_consistent() {
    let ctx = context();
    let work = TaskFn::from_async(|_| async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(Value::Null)
    });
    let id = ctx
        .scheduler
        .add_task(TaskSchema::new(work).at(now_ms()).every(1, TimeUnit::Second));
    ctx.start();

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(ctx.stats.running(), 1);
    assert!(ctx.scheduler.remove_task(&id));

    tokio::time::sleep(Duration::from_secs(2)).await;

    let stats = ctx.stats.snapshot();
    assert_eq!(stats.successful_runs, 1);
    assert_eq!(stats.idle, 0);
    assert_eq!(stats.running, 0);
    assert!(ctx.scheduler.is_empty());
}
