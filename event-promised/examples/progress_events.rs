/// 进度事件示例
/// 后台任务分步推送进度，调用方实时订阅，迟到的订阅者回放历史；最后取消一个超时任务
use anyhow::Result as AnyResult;
use event_promised::{EventPromise, HistoryCapacity, PromiseOptions};
use serde_json::json;
use std::time::Duration;

fn download(name: &'static str, chunks: u64, delay: Duration) -> EventPromise<u64, String> {
    let options = PromiseOptions::builder()
        .history(HistoryCapacity::Bounded(16))
        .build();

    EventPromise::with_options(
        move |resolve, _reject, emit| {
            emit.emit("started", [json!(name)]);
            tokio::spawn(async move {
                for chunk in 1..=chunks {
                    tokio::time::sleep(delay).await;
                    emit.emit("progress", [json!(name), json!(chunk * 100 / chunks)]);
                }
                resolve.resolve(chunks * 1024);
            });
            Ok(())
        },
        options,
    )
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "event_promised=debug".into()),
        )
        .init();

    let report = download("report.pdf", 4, Duration::from_millis(50))
        .once("started", |args| println!("started: {}", args[0]))
        .on("progress", |args| println!("{}: {}%", args[0], args[1]))
        .then(|bytes| Ok(format!("{bytes} bytes")));
    println!("report => {:?}", report.await);

    let slow = download("archive.zip", 10, Duration::from_millis(200));
    let cancel = slow.cancel_handle()?;
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel.reject("timeout".to_string());
    });

    // 迟到订阅：先回放已发生的 started 事件
    tokio::time::sleep(Duration::from_millis(10)).await;
    let slow = slow.on("started", |args| println!("(replayed) started: {}", args[0]));
    let slow = slow.catch(|reason| {
        println!("archive cancelled: {reason}");
        Ok::<_, String>(0)
    });
    match slow.await {
        Ok(bytes) => println!("archive => {bytes} bytes"),
        Err(e) => println!("archive failed: {e}"),
    }

    Ok(())
}
