use anyhow::Result as AnyResult;
use event_promised::EventPromise;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

type Results = Arc<Mutex<Vec<Value>>>;

fn push(results: &Results, value: Value) {
    results.lock().unwrap().push(value);
}

#[tokio::test]
async fn events_values_and_errors_flow_through_the_chain() -> AnyResult<()> {
    let results: Results = Arc::new(Mutex::new(Vec::new()));
    let (r1, r2, r3, r4, r5, r6, r7, r8, r9, r10) = (
        results.clone(),
        results.clone(),
        results.clone(),
        results.clone(),
        results.clone(),
        results.clone(),
        results.clone(),
        results.clone(),
        results.clone(),
        results.clone(),
    );

    let outcome = EventPromise::<i32, String>::new(|resolve, _reject, emit| {
        emit.emit("A", [json!("blabla")]);
        emit.emit("B", [json!(45)]);
        emit.emit("B", [json!("skipped value")]);
        resolve.resolve(45);
        Ok(())
    })
    .on("A", move |args| push(&r1, args[0].clone()))
    .once("B", move |args| push(&r2, args[0].clone()))
    .then(move |res| {
        push(&r3, json!(res));
        Ok(())
    })
    .catch(move |_| {
        push(&r4, json!("error"));
        Ok::<(), String>(())
    })
    .then(move |res| {
        push(&r5, serde_json::to_value(res).unwrap_or_default());
        Ok(())
    })
    .then(move |res| {
        push(&r6, serde_json::to_value(res).unwrap_or_default());
        Ok(())
    })
    .then(|()| {
        EventPromise::<i32, String>::new(|resolve, _, _| {
            resolve.resolve(5);
            Ok(())
        })
    })
    .then(move |res| {
        push(&r7, json!(res));
        Err::<(), _>("Error to be stored".to_string())
    })
    .then(move |()| {
        push(&r8, json!("should be skipped"));
        Ok(())
    })
    .catch(move |res| {
        push(&r9, json!(format!("Error should be catched : {res}")));
        Ok::<(), String>(())
    })
    .then(move |()| {
        push(&r10, json!("should be stored"));
        Ok(())
    })
    .await;

    assert_eq!(outcome, Ok(()));
    assert_eq!(
        *results.lock().unwrap(),
        vec![
            json!("blabla"),
            json!(45),
            json!(45),
            Value::Null,
            Value::Null,
            json!(5),
            json!("Error should be catched : Error to be stored"),
            json!("should be stored"),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn uncaught_rejection_surfaces_at_the_end_of_the_chain() {
    let out = EventPromise::<i32, String>::resolved(1)
        .then(|x| Err::<i32, _>(format!("failed at {x}")))
        .then(|x| Ok(x + 1))
        .await;
    assert_eq!(out, Err("failed at 1".to_string()));
}

#[tokio::test]
async fn chained_promises_keep_event_capability() {
    let seen: Results = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    let child = EventPromise::<i32, String>::resolved(2).then(|x| Ok(x * 3));
    child.bus().emit("note", [json!("child event")]);
    let child = child.on("note", move |args| push(&sink, args[0].clone()));

    assert_eq!(child.await, Ok(6));
    assert_eq!(*seen.lock().unwrap(), vec![json!("child event")]);
}
