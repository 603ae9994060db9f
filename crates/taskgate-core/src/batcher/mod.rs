//! Key-based request batching.
//!
//! Requests added under the same key accumulate into one batch until either
//! the batch reaches `batch_size`, no request arrived for `batch_delay`, or
//! the batch is `max_batch_delay` old. The batch is then sent to the
//! [`BatchClient`] as a single call and the reply is fanned back to every
//! waiting caller. A client failure fails every member with the same error.

mod batch;
mod client;
mod config;

pub use batch::{BatchFailure, BatchOutcome};
pub use client::{BatchClient, BatchReply, BatchResponse};
pub use config::BatcherConfig;

use std::collections::{hash_map::Entry, BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::stats::BatcherStats;

use batch::{Batch, FlushReason, Member};

type ClientBatch<C> = Batch<<C as BatchClient>::Payload, <C as BatchClient>::Output>;

struct State<C: BatchClient> {
    active: HashMap<String, ClientBatch<C>>,
    counters: BatcherStats,
}

struct Inner<C: BatchClient> {
    config: BatcherConfig,
    client: Arc<C>,
    state: Mutex<State<C>>,
    next_batch: AtomicU64,
}

/// Groups requests by key and executes each group as one client call.
pub struct Batcher<C: BatchClient> {
    inner: Arc<Inner<C>>,
}

impl<C: BatchClient> Clone for Batcher<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: BatchClient> Batcher<C> {
    pub fn new(client: Arc<C>, config: BatcherConfig) -> Self {
        let config = BatcherConfig {
            batch_size: config.batch_size.max(1),
            ..config
        };
        Self {
            inner: Arc::new(Inner {
                config,
                client,
                state: Mutex::new(State {
                    active: HashMap::new(),
                    counters: BatcherStats::default(),
                }),
                next_batch: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &BatcherConfig {
        &self.inner.config
    }

    /// Add a request to the batch for `key` and wait for its share of the reply.
    pub async fn add_to_batch(&self, key: impl Into<String>, payload: C::Payload) -> BatchOutcome<C::Output> {
        let key = key.into();
        let rx = self.register(key.clone(), payload);
        rx.await.unwrap_or_else(|_| BatchOutcome {
            key,
            batch_size: 0,
            result: Err(BatchFailure::Dropped),
            metadata: None,
        })
    }

    /// Flush every active batch now and wait for the client calls to finish.
    /// Returns the number of batches flushed.
    ///
    /// Flushes run as detached tasks, so dropping this future (e.g. under a
    /// shutdown timeout) still delivers every member's outcome.
    pub async fn flush_all(&self) -> usize {
        let batches: Vec<ClientBatch<C>> = {
            let mut state = self.inner.lock();
            state.active.drain().map(|(_, batch)| batch).collect()
        };
        let handles: Vec<_> = batches
            .into_iter()
            .map(|mut batch| {
                batch.cancel_timer();
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move { inner.flush(batch, FlushReason::Drain).await })
            })
            .collect();
        let count = handles.len();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "batch flush task failed");
            }
        }
        count
    }

    /// Pending request count per active key.
    pub fn active_batches(&self) -> BTreeMap<String, usize> {
        self.inner
            .lock()
            .active
            .iter()
            .map(|(key, batch)| (key.clone(), batch.members.len()))
            .collect()
    }

    pub fn stats(&self) -> BatcherStats {
        let state = self.inner.lock();
        let mut stats = state.counters.clone();
        stats.active_batches = state.active.len();
        stats.pending_requests = state.active.values().map(|b| b.members.len()).sum();
        stats
    }

    fn register(&self, key: String, payload: C::Payload) -> oneshot::Receiver<BatchOutcome<C::Output>> {
        let (tx, rx) = oneshot::channel();
        let full = {
            let mut guard = self.inner.lock();
            let state = &mut *guard;
            state.counters.requests_batched += 1;

            let batch = match state.active.entry(key.clone()) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => {
                    state.counters.batches_created += 1;
                    let id = self.inner.next_batch.fetch_add(1, Ordering::Relaxed);
                    let mut batch = Batch::new(id, key.clone());
                    batch.timer = Some(arm_timer(Arc::downgrade(&self.inner), key.clone(), id));
                    debug!(key = %key, batch_id = id, "batch created");
                    e.insert(batch)
                }
            };
            batch.members.push(Member { payload, tx });
            batch.last_arrival = Instant::now();

            if batch.members.len() >= self.inner.config.batch_size {
                state.active.remove(&key)
            } else {
                None
            }
        };

        if let Some(mut batch) = full {
            batch.cancel_timer();
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.flush(batch, FlushReason::Size).await });
        }
        rx
    }
}

/// One timer task per batch covers both the idle and the age deadline; it
/// re-reads the deadline after every wake because arrivals push the idle one.
fn arm_timer<C: BatchClient>(weak: Weak<Inner<C>>, key: String, id: u64) -> tokio::task::AbortHandle {
    let handle = tokio::spawn(async move {
        loop {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let due = {
                let mut state = inner.lock();
                let current = state
                    .active
                    .get(&key)
                    .filter(|batch| batch.id == id)
                    .map(|batch| batch.deadline(&inner.config));
                let Some((deadline, reason)) = current else {
                    return;
                };
                if deadline > Instant::now() {
                    Err(deadline)
                } else {
                    Ok((state.active.remove(&key), reason))
                }
            };
            match due {
                Err(deadline) => {
                    drop(inner);
                    tokio::time::sleep_until(deadline).await;
                }
                Ok((batch, reason)) => {
                    if let Some(batch) = batch {
                        inner.flush(batch, reason).await;
                    }
                    return;
                }
            }
        }
    });
    handle.abort_handle()
}

impl<C: BatchClient> Inner<C> {
    fn lock(&self) -> MutexGuard<'_, State<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn flush(&self, batch: ClientBatch<C>, reason: FlushReason) {
        let Batch {
            id, key, members, ..
        } = batch;
        let size = members.len();
        let (payloads, senders): (Vec<_>, Vec<_>) =
            members.into_iter().map(|m| (m.payload, m.tx)).unzip();

        debug!(key = %key, batch_id = id, size, reason = reason.as_str(), "flushing batch");

        // Run the client in its own task so a panic becomes a failure outcome.
        let client = Arc::clone(&self.client);
        let call_key = key.clone();
        let joined = tokio::spawn(async move { client.send(&call_key, payloads).await }).await;
        let response = match joined {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(BatchFailure::Client(e)),
            Err(_) => Err(BatchFailure::ClientPanicked),
        };

        {
            let mut state = self.lock();
            state.counters.batches_processed += 1;
            if response.is_err() {
                state.counters.failed_batches += 1;
            }
        }

        let outcome = |result, metadata| BatchOutcome {
            key: key.clone(),
            batch_size: size,
            result,
            metadata,
        };

        match response {
            Ok(BatchResponse {
                reply: BatchReply::Shared(output),
                metadata,
            }) => {
                for tx in senders {
                    let _ = tx.send(outcome(Ok(output.clone()), metadata.clone()));
                }
            }
            Ok(BatchResponse {
                reply: BatchReply::PerItem(outputs),
                metadata,
            }) => {
                if outputs.len() != size {
                    warn!(key = %key, batch_id = id, expected = size, got = outputs.len(), "per-item reply count mismatch");
                }
                let mut outputs = outputs.into_iter();
                for (index, tx) in senders.into_iter().enumerate() {
                    let result = outputs
                        .next()
                        .ok_or(BatchFailure::MissingReply { index });
                    let _ = tx.send(outcome(result, metadata.clone()));
                }
            }
            Err(failure) => {
                warn!(key = %key, batch_id = id, size, error = %failure, "batch failed");
                for tx in senders {
                    let _ = tx.send(outcome(Err(failure.clone()), None));
                }
                return;
            }
        }
        info!(key = %key, batch_id = id, size, reason = reason.as_str(), "batch processed");
    }
}
