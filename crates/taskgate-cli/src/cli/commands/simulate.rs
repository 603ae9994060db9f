//! `taskgate simulate` – drive synthetic tasks through a dispatcher.

use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use taskgate_core::config::GateConfig;
use taskgate_core::{Dispatcher, DispatcherConfig, DispatcherStats, TaskError, TaskFailure, TaskOptions};

#[derive(Debug, Clone)]
pub struct SimulateArgs {
    pub tasks: usize,
    pub concurrency: Option<usize>,
    pub failure_rate: f64,
    pub latency_ms: u64,
    pub json: bool,
}

/// Short label for grouping failures in the report.
fn failure_label(failure: &TaskFailure) -> &'static str {
    match failure {
        TaskFailure::QueueTimeout { .. } => "queue_timeout",
        TaskFailure::QueueCleared => "queue_cleared",
        TaskFailure::Fatal(_) => "fatal",
        TaskFailure::RetriesExhausted { .. } => "retries_exhausted",
        TaskFailure::NonRetryable(_) => "non_retryable",
        TaskFailure::Dropped => "dropped",
    }
}

/// One synthetic attempt: sleeps around `latency_ms`, then fails with a
/// connection reset with probability `failure_rate`.
async fn synthetic_attempt(index: usize, latency_ms: u64, failure_rate: f64) -> Result<usize, TaskError> {
    let spread = 0.5 + rand::random::<f64>();
    tokio::time::sleep(Duration::from_millis((latency_ms as f64 * spread) as u64)).await;
    if rand::random::<f64>() < failure_rate {
        return Err(TaskError::new("read ECONNRESET (simulated)").with_code("ECONNRESET"));
    }
    Ok(index)
}

fn print_stats(stats: &DispatcherStats) {
    println!("  {:<14} {:>8}", "enqueued", stats.enqueued);
    println!("  {:<14} {:>8}", "rejected", stats.rejected);
    println!("  {:<14} {:>8}", "started", stats.started);
    println!("  {:<14} {:>8}", "completed", stats.completed);
    println!("  {:<14} {:>8}", "failed", stats.failed);
    println!("  {:<14} {:>8}", "retried", stats.retried);
    println!("  {:<14} {:>8}", "timed_out", stats.timed_out);
}

pub async fn run_simulate(cfg: &GateConfig, args: &SimulateArgs) -> Result<()> {
    if !(0.0..=1.0).contains(&args.failure_rate) {
        bail!("--failure-rate must be within [0, 1], got {}", args.failure_rate);
    }
    if args.concurrency == Some(0) {
        bail!("--concurrency must be at least 1");
    }

    let dispatcher_cfg = DispatcherConfig {
        max_concurrent: args.concurrency.unwrap_or(cfg.dispatcher.max_concurrent),
        ..cfg.dispatcher.clone()
    };
    let dispatcher: Dispatcher<usize> =
        Dispatcher::with_retry(dispatcher_cfg, cfg.backoff_policy(), cfg.classifier());

    let started = Instant::now();
    let mut handles = Vec::with_capacity(args.tasks);
    let mut rejected = 0usize;
    for index in 0..args.tasks {
        let (latency_ms, failure_rate) = (args.latency_ms, args.failure_rate);
        let options = TaskOptions::default().with_priority(rand::random_range(0..3));
        match dispatcher.submit(move || synthetic_attempt(index, latency_ms, failure_rate), options) {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                tracing::debug!(index, "simulated task rejected: {}", e);
                rejected += 1;
            }
        }
    }

    let mut succeeded = 0usize;
    let mut attempts = 0u64;
    let mut failures: BTreeMap<&'static str, usize> = BTreeMap::new();
    for handle in handles {
        let outcome = handle.await;
        attempts += u64::from(outcome.attempts);
        match &outcome.result {
            Ok(_) => succeeded += 1,
            Err(failure) => *failures.entry(failure_label(failure)).or_default() += 1,
        }
    }
    dispatcher.idle().await;
    let elapsed = started.elapsed();
    let stats = dispatcher.stats();

    if args.json {
        let report = serde_json::json!({
            "tasks": args.tasks,
            "succeeded": succeeded,
            "rejected": rejected,
            "failures": failures,
            "attempts": attempts,
            "elapsed_ms": elapsed.as_millis() as u64,
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Simulated {} tasks in {:.2}s (max_concurrent {}): {} succeeded, {} rejected",
        args.tasks,
        elapsed.as_secs_f64(),
        stats.max_concurrent,
        succeeded,
        rejected
    );
    for (label, count) in &failures {
        println!("  failed ({label}): {count}");
    }
    print_stats(&stats);
    Ok(())
}
