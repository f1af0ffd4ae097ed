use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use taskflow_core::{
    BoxError, CancellationToken, Task, TaskContinuationStrategy, TaskReport, TaskResult,
};

/// Runs a small task graph and prints what every node ended up as.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Deadline for the slowest download, in milliseconds
    #[arg(long, default_value = "150")]
    timeout_ms: u64,

    /// Cancel the shared token after this many milliseconds
    #[arg(long, default_value = "250")]
    cancel_after_ms: u64,

    /// Pretty-print the JSON reports
    #[arg(long)]
    pretty: bool,
}

/// A download that checks the token between chunks.
fn download(name: &'static str, chunks: u32, token: CancellationToken) -> Task<String> {
    Task::new(move || async move {
        for _ in 0..chunks {
            token.throw_if_cancellation_requested()?;
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        Ok::<_, BoxError>(format!("{name}: {chunks} chunks"))
    })
}

fn print_report<T>(label: &str, task: &Task<T>, pretty: bool) -> Result<()>
where
    T: taskflow_core::TaskValue + serde::Serialize,
{
    let report = TaskReport::of(task)?;
    let json = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{label}: {json}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let token = CancellationToken::new();
    token.cancel_after(
        Duration::from_millis(args.cancel_after_ms),
        Some("demo deadline".to_string()),
    );

    // (A) fan out three downloads and wait for all of them
    let small = download("small", 2, token.clone());
    let medium = download("medium", 4, token.clone());
    let large = download("large", 16, token.clone());
    let all = small.join([medium.clone(), large.clone()]);

    // (B) the large download alone, with a deadline
    let bounded = large.timeout(Duration::from_millis(args.timeout_ms));

    // (C) summarize only if the join completed
    let summary = all.then_with(
        |result: TaskResult<Vec<TaskResult<String>>>| {
            let finished = result
                .into_value()
                .unwrap_or_default()
                .iter()
                .filter(|r| r.is_completed())
                .count();
            Task::from_result(format!("{finished} download(s) finished"))
        },
        TaskContinuationStrategy::ON_COMPLETION,
    );

    // (D) first of the two small ones
    let first = small.race([medium.clone()]);

    info!(
        timeout_ms = args.timeout_ms,
        cancel_after_ms = args.cancel_after_ms,
        "running task graph"
    );
    let summary_result = summary.execute().await?;
    let _ = bounded.execute().await?;
    let _ = first.execute().await?;
    info!(state = %summary_result.state(), "task graph settled");

    print_report("first", &first, args.pretty)?;
    print_report("bounded", &bounded, args.pretty)?;
    print_report("all", &all, args.pretty)?;
    print_report("summary", &summary, args.pretty)?;
    print_report("completed", &Task::completed(), args.pretty)?;
    Ok(())
}
