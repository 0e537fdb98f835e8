use event_promised::{EventPromise, PromiseOptions, ReplayEventBus};
use std::fmt::{Display, Formatter};
use std::time::Duration;

#[derive(Debug, Clone)]
enum StageEvent {
    Started { stage: &'static str },
    Progress { stage: &'static str, percent: u8 },
    Warning { stage: &'static str, message: String },
}

#[derive(Debug)]
enum PipelineError {
    StageFailed { stage: &'static str, reason: String },
    Cancelled,
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StageFailed { stage, reason } => write!(f, "stage {stage} failed: {reason}"),
            Self::Cancelled => write!(f, "pipeline cancelled"),
        }
    }
}
impl std::error::Error for PipelineError {}

type Stage = EventPromise<u32, PipelineError, StageEvent>;

fn run_stage(bus: &ReplayEventBus<StageEvent>, stage: &'static str, fail: bool) -> Stage {
    EventPromise::with_bus_and_options(
        move |resolve, reject, emit| {
            emit.emit("started", [StageEvent::Started { stage }]);
            tokio::spawn(async move {
                for percent in [25u8, 50, 75, 100] {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    emit.emit("progress", [StageEvent::Progress { stage, percent }]);
                    if fail && percent == 50 {
                        emit.emit(
                            "warning",
                            [StageEvent::Warning {
                                stage,
                                message: "disk almost full".into(),
                            }],
                        );
                        reject.reject(PipelineError::StageFailed {
                            stage,
                            reason: "out of disk space".into(),
                        });
                        return;
                    }
                }
                resolve.resolve(stage.len() as u32);
            });
            Ok(())
        },
        bus.clone(),
        PromiseOptions::default(),
    )
}

fn print_event(args: &[StageEvent]) {
    for event in args {
        match event {
            StageEvent::Started { stage } => println!("[{stage}] started"),
            StageEvent::Progress { stage, percent } => println!("[{stage}] {percent}%"),
            StageEvent::Warning { stage, message } => println!("[{stage}] warning: {message}"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "event_promised=debug,demo=info".into()),
        )
        .init();

    // 所有阶段共享一条总线，后加入的观察者也能看到此前全部阶段的事件
    let bus: ReplayEventBus<StageEvent> = ReplayEventBus::new();
    bus.set_history_size(64);

    let build = run_stage(&bus, "build", false)
        .on("started", print_event)
        .on("progress", print_event);
    let built = build.await?;
    tracing::info!(built, "build stage finished");

    let test = run_stage(&bus, "test", false);
    let cancel = test.cancel_handle()?;
    let test = test
        .on("progress", print_event)
        .then(|score| Ok(score * 10));
    let watchdog = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.reject(PipelineError::Cancelled)
    });
    println!("test score => {}", test.await?);
    watchdog.abort();

    let deploy = run_stage(&bus, "deploy", true)
        .on("warning", print_event)
        .catch(|err| {
            println!("recovering: {err}");
            Ok::<_, PipelineError>(0)
        });
    println!("deploy => {}", deploy.await?);

    println!("--- {} events recorded on the shared bus ---", bus.history_len());
    for record in bus.history() {
        println!("#{} {} {:?}", record.sequence(), record.name(), record.args());
    }
    Ok(())
}
