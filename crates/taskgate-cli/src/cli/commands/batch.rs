//! `taskgate batch` – drive requests through a batcher with an echo client.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use taskgate_core::config::GateConfig;
use taskgate_core::{BatchClient, BatchResponse, Batcher, TaskError};
use tokio::task::JoinSet;

/// Answers each member with `key:payload`.
struct EchoClient;

#[async_trait]
impl BatchClient for EchoClient {
    type Payload = String;
    type Output = String;

    async fn send(&self, key: &str, payloads: Vec<String>) -> Result<BatchResponse<String>, TaskError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let count = payloads.len();
        let outputs = payloads.into_iter().map(|p| format!("{key}:{p}")).collect();
        Ok(BatchResponse::per_item(outputs).with_metadata(serde_json::json!({ "batch_size": count })))
    }
}

pub async fn run_batch(cfg: &GateConfig, requests: usize, keys: usize, json: bool) -> Result<()> {
    if keys == 0 {
        bail!("--keys must be at least 1");
    }
    let batcher = Batcher::new(Arc::new(EchoClient), cfg.batcher.clone());
    // Spread arrivals over roughly two idle windows so some batches fill and some time out.
    let spread_ms = cfg.batcher.batch_delay_ms.saturating_mul(2).max(1);

    let mut join_set = JoinSet::new();
    for i in 0..requests {
        let batcher = batcher.clone();
        let key = format!("key-{}", i % keys);
        let delay = Duration::from_millis(rand::random_range(0..spread_ms));
        join_set.spawn(async move {
            tokio::time::sleep(delay).await;
            batcher.add_to_batch(key, format!("req-{i}")).await
        });
    }

    let mut succeeded = 0usize;
    let mut failed = 0usize;
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(outcome) if outcome.is_success() => succeeded += 1,
            Ok(outcome) => {
                if let Err(e) = &outcome.result {
                    tracing::warn!(key = %outcome.key, "batched request failed: {}", e);
                }
                failed += 1;
            }
            Err(e) => {
                tracing::warn!("batch request task failed: {}", e);
                failed += 1;
            }
        }
    }
    let drained = batcher.flush_all().await;
    let stats = batcher.stats();

    if json {
        let report = serde_json::json!({
            "requests": requests,
            "keys": keys,
            "succeeded": succeeded,
            "failed": failed,
            "drained": drained,
            "efficiency": stats.efficiency(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Batched {} requests over {} keys: {} succeeded, {} failed",
        requests, keys, succeeded, failed
    );
    println!("  {:<18} {:>8}", "batches_created", stats.batches_created);
    println!("  {:<18} {:>8}", "batches_processed", stats.batches_processed);
    println!("  {:<18} {:>8}", "failed_batches", stats.failed_batches);
    println!("  {:<18} {:>8.2}", "requests/batch", stats.efficiency());
    Ok(())
}
