//! Rate-limit recovery.
//!
//! The queue has two states: **Idle** (no batch, no timer) and **Draining**
//! (one batch, one pending delay timer). A lookup submitted while Idle runs
//! immediately; if the endpoint answers 429, the request becomes the first
//! entry of a new batch and a single delay timer is started. Every lookup
//! submitted while Draining joins that batch instead of hitting the
//! endpoint, which would only prolong the limit. When the timer fires, the
//! whole batch is re-issued concurrently and each caller gets its own
//! outcome. There is exactly one retry wave: a 429 during the wave is
//! terminal for that caller. This bounds both worst-case latency (the timer
//! is never extended by new arrivals) and retry amplification under
//! sustained 429s.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::search::Searcher;
use crate::{CallOptions, ErrorKind, LookupResult, Result};

/// A caller's lookup deferred until the next drain.
///
/// One producer (the submitting caller) and one consumer (the drain task);
/// consumed when its sender resolves or rejects it.
#[derive(Debug)]
struct QueuedLookup {
    query: String,
    options: CallOptions,
    tx: oneshot::Sender<Result<Vec<LookupResult>>>,
}

/// The shared queue/timer pair.
///
/// Invariant: `batch` is `Some` exactly when `timer` is `Some`. Both change
/// together under the lock, which guards nothing but these transitions;
/// HTTP calls and the delay itself happen outside it.
#[derive(Debug, Default)]
struct Slot {
    batch: Option<Vec<QueuedLookup>>,
    timer: Option<AbortHandle>,
}

/// The stateful orchestrator between callers and the request executor.
#[derive(Debug)]
pub(crate) struct RetryQueue {
    searcher: Searcher,

    /// Delay between the first rate-limit signal and the drain
    delay: Duration,

    slot: Mutex<Slot>,
}

impl RetryQueue {
    pub(crate) fn new(searcher: Searcher, delay: Duration) -> Self {
        Self {
            searcher,
            delay,
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Submits one lookup.
    ///
    /// While Draining the request joins the current batch without touching
    /// the endpoint. While Idle it runs immediately; only a 429 moves it
    /// into a (possibly fresh) batch. Every other outcome is final.
    ///
    /// # Panics
    ///
    /// Panics if the queue mutex is poisoned.
    pub(crate) async fn submit(
        self: &Arc<Self>,
        query: String,
        options: CallOptions,
    ) -> Result<Vec<LookupResult>> {
        if let Some(rx) = self.try_join_batch(&query, &options) {
            return await_settled(rx).await;
        }

        match self.searcher.search(&query, &options).await {
            Err(ErrorKind::RateLimited) => {
                let rx = self.enqueue_rate_limited(query, options);
                await_settled(rx).await
            }
            outcome => outcome,
        }
    }

    /// Appends to the current batch, if one exists. Returns `None` while
    /// Idle.
    fn try_join_batch(
        &self,
        query: &str,
        options: &CallOptions,
    ) -> Option<oneshot::Receiver<Result<Vec<LookupResult>>>> {
        let mut slot = self.slot.lock().unwrap();
        let batch = slot.batch.as_mut()?;
        let (tx, rx) = oneshot::channel();
        batch.push(QueuedLookup {
            query: query.to_owned(),
            options: options.clone(),
            tx,
        });
        log::debug!("queued lookup {query:?} ({} waiting)", batch.len());
        Some(rx)
    }

    /// Called after a 429 on an immediate attempt. Re-checks state under
    /// the lock: a concurrent rate-limited submission may have created the
    /// batch in the meantime, and two batches must never exist.
    fn enqueue_rate_limited(
        self: &Arc<Self>,
        query: String,
        options: CallOptions,
    ) -> oneshot::Receiver<Result<Vec<LookupResult>>> {
        let (tx, rx) = oneshot::channel();
        let queued = QueuedLookup { query, options, tx };

        let mut slot = self.slot.lock().unwrap();
        if let Some(batch) = slot.batch.as_mut() {
            // Lost the race: another 429 already started the delay window.
            batch.push(queued);
            log::debug!("queued rate-limited lookup ({} waiting)", batch.len());
            return rx;
        }

        slot.batch = Some(vec![queued]);
        let queue = Arc::clone(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(queue.delay).await;
            queue.drain().await;
        });
        slot.timer = Some(timer.abort_handle());
        log::debug!("rate limited; draining in {:?}", self.delay);
        rx
    }

    /// Timer body: takes the batch, returns the queue to Idle and re-issues
    /// every request concurrently. Each caller gets its own outcome; one
    /// sibling's failure never affects another. A second 429 here is
    /// surfaced to that caller as-is, never re-queued.
    async fn drain(self: Arc<Self>) {
        let batch = {
            let mut slot = self.slot.lock().unwrap();
            slot.timer = None;
            slot.batch.take()
        };

        // Defensive: the timer should never fire on an empty slot, but if
        // it does the transition to Idle above is all there is to do.
        let Some(batch) = batch else { return };

        log::debug!("draining {} queued lookups", batch.len());
        let searcher = &self.searcher;
        join_all(batch.into_iter().map(|queued| async move {
            let outcome = searcher.search(&queued.query, &queued.options).await;
            if let Err(ErrorKind::RateLimited) = &outcome {
                log::warn!("lookup {:?} rate limited again; giving up", queued.query);
            }
            // The caller may have stopped waiting; nothing left to do then.
            let _ = queued.tx.send(outcome);
        }))
        .await;
    }

    /// Cancels the pending timer and rejects every queued request with
    /// [`ErrorKind::Disposed`]. Idempotent; a no-op while Idle. Requests
    /// whose drain already started are not affected.
    ///
    /// # Panics
    ///
    /// Panics if the queue mutex is poisoned.
    pub(crate) fn dispose(&self) {
        let batch = {
            let mut slot = self.slot.lock().unwrap();
            if let Some(timer) = slot.timer.take() {
                timer.abort();
            }
            slot.batch.take()
        };

        let Some(batch) = batch else { return };

        log::debug!("disposed with {} queued lookups", batch.len());
        for queued in batch {
            let _ = queued.tx.send(Err(ErrorKind::Disposed));
        }
    }

    /// Number of requests currently queued for the next drain, 0 while
    /// Idle. Intended for test harnesses observing queue depth.
    ///
    /// # Panics
    ///
    /// Panics if the queue mutex is poisoned.
    pub(crate) fn pending(&self) -> usize {
        self.slot.lock().unwrap().batch.as_ref().map_or(0, Vec::len)
    }
}

/// Awaits a queued request's settlement. The sender is dropped unresolved
/// only if the drain task died mid-wave; treat that as disposal.
async fn await_settled(
    rx: oneshot::Receiver<Result<Vec<LookupResult>>>,
) -> Result<Vec<LookupResult>> {
    rx.await.unwrap_or(Err(ErrorKind::Disposed))
}
