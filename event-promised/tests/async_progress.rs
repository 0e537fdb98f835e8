use event_promised::{EventPromise, PromiseOptions, PromiseStatus, ReplayEventBus};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

fn spawn_job(steps: u64, gate: oneshot::Receiver<()>) -> EventPromise<u64, String> {
    EventPromise::new(move |resolve, _reject, emit| {
        tokio::spawn(async move {
            let _ = gate.await;
            for step in 1..=steps {
                emit.emit("progress", [json!(step)]);
                tokio::task::yield_now().await;
            }
            resolve.resolve(steps * 10);
            emit.emit("progress", [json!("after settle")]);
        });
        Ok(())
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn live_events_arrive_in_order_and_stop_at_settlement() {
    let (open, gate) = oneshot::channel();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    let job = spawn_job(3, gate).on("progress", move |args: &[Value]| {
        sink.lock().unwrap().push(args[0].clone())
    });
    let bus = job.bus().clone();
    open.send(()).unwrap();

    assert_eq!(job.await, Ok(30));
    // 等待后台任务完成结算后的最后一次 emit
    tokio::time::timeout(Duration::from_secs(2), async {
        while bus.history_len() < 4 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![json!(1), json!(2), json!(3)]);
    assert_eq!(bus.history_len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn late_subscriber_replays_then_receives_live_events() {
    let (open, gate) = oneshot::channel::<()>();
    let mut emitter = None;
    let job = EventPromise::<(), String>::new(|resolve, _, emit| {
        emit.emit("log", [json!("queued")]);
        let emit_later = emit.clone();
        emitter = Some(emit);
        tokio::spawn(async move {
            let _ = gate.await;
            emit_later.emit("log", [json!("running")]);
            resolve.resolve(());
        });
        Ok(())
    });
    assert!(emitter.is_some());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let job = job.on("log", move |args| sink.lock().unwrap().push(args[0].clone()));
    assert_eq!(*seen.lock().unwrap(), vec![json!("queued")]);

    open.send(()).unwrap();
    job.await.unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![json!("queued"), json!("running")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_from_another_task_wakes_the_waiter() {
    let job = EventPromise::<u64, String>::new(|_, _, emit| {
        emit.emit("progress", [json!(0)]);
        Ok(())
    });
    let handle = job.cancel_handle().unwrap();

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.reject("timed out".into())
    });

    let out = tokio::time::timeout(Duration::from_secs(2), job).await.unwrap();
    assert_eq!(out, Err("timed out".to_string()));
    assert!(canceller.await.unwrap());
}

#[tokio::test]
async fn chain_built_from_pending_promise_waits_for_settlement() {
    let (tx, rx) = oneshot::channel::<u32>();
    let mut resolver = None;
    let root = EventPromise::<u32, String>::new(|resolve, _, _| {
        resolver = Some(resolve);
        Ok(())
    });
    let chained = root.then(|x| Ok(x + 1)).then(|x| Ok(x * 2));
    assert_eq!(chained.status(), PromiseStatus::Pending);

    let resolve = resolver.unwrap();
    tokio::spawn(async move {
        let value = rx.await.unwrap_or_default();
        resolve.resolve(value);
    });
    tx.send(20).unwrap();

    assert_eq!(chained.await, Ok(42));
}

#[tokio::test]
async fn futures_sharing_a_bus_see_each_others_history() {
    let bus: ReplayEventBus = ReplayEventBus::new();
    bus.set_history_size(2);

    let uploads: Vec<EventPromise<usize, String>> = (0..3)
        .map(|i| {
            EventPromise::with_bus_and_options(
                move |resolve, _, emit| {
                    emit.emit("uploaded", [json!(i)]);
                    resolve.resolve(i);
                    Ok(())
                },
                bus.clone(),
                PromiseOptions::default(),
            )
        })
        .collect();

    let mut total = 0;
    for upload in uploads {
        total += upload.await.unwrap();
    }
    assert_eq!(total, 3);

    let kept: Vec<Value> = bus.history().iter().map(|r| r.args()[0].clone()).collect();
    assert_eq!(kept, vec![json!(1), json!(2)]);
}
