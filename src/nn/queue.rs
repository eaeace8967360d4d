//! Batching evaluation queue.
//!
//! Search threads call `evaluate` concurrently; each call prepares its input,
//! enqueues it with a one-shot reply channel and blocks. Consumer threads,
//! one per backend replica, wake on the queue condition, drain everything
//! that accumulated since their last wake, run the backend once on that
//! batch and answer each request in submission order.
//!
//! There is no batch size limit and no batching timeout: the batch is
//! whatever was pending when a consumer got the lock.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

use super::traits::{BatchEvaluator, EvalError, Evaluation, Evaluator};

/// Errors raised when building an evaluation queue.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("evaluation queue has no backend evaluators")]
    NoEvaluators,

    #[error("failed to spawn consumer thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Snapshot of queue throughput counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Requests answered by a backend (successfully or not).
    pub requests: u64,

    /// Backend invocations.
    pub batches: u64,

    /// Largest batch handed to a backend.
    pub largest_batch: u64,
}

impl QueueStats {
    /// Average number of requests per backend call.
    #[must_use]
    pub fn avg_batch_size(&self) -> f64 {
        if self.batches == 0 {
            0.0
        } else {
            self.requests as f64 / self.batches as f64
        }
    }
}

struct Request<I, O> {
    input: I,
    reply: Sender<Result<O, EvalError>>,
}

struct Pending<I, O> {
    requests: VecDeque<Request<I, O>>,
    running: bool,
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    batches: AtomicU64,
    largest_batch: AtomicU64,
}

struct Shared<I, O> {
    pending: Mutex<Pending<I, O>>,
    available: Condvar,
    counters: Counters,
}

impl<I, O> Shared<I, O> {
    fn lock(&self) -> MutexGuard<'_, Pending<I, O>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Batching dispatcher in front of one or more backend replicas.
///
/// All replicas share the one request queue, so load spreads across them
/// without routing. The queue itself implements `Evaluator`, which makes it a
/// drop-in replacement for a direct evaluator.
pub struct EvaluationQueue<S, B: BatchEvaluator<S>> {
    shared: Arc<Shared<B::Input, B::Output>>,
    consumers: Mutex<Vec<JoinHandle<()>>>,
    _state: PhantomData<fn(&S)>,
}

impl<S, B> EvaluationQueue<S, B>
where
    S: Send + Sync + 'static,
    B: BatchEvaluator<S>,
{
    /// Start one consumer thread per backend.
    pub fn new(backends: Vec<B>) -> Result<Self, QueueError> {
        if backends.is_empty() {
            return Err(QueueError::NoEvaluators);
        }

        let queue = Self {
            shared: Arc::new(Shared {
                pending: Mutex::new(Pending {
                    requests: VecDeque::new(),
                    running: true,
                }),
                available: Condvar::new(),
                counters: Counters::default(),
            }),
            consumers: Mutex::new(Vec::with_capacity(backends.len())),
            _state: PhantomData,
        };

        let replicas = backends.len();
        for (idx, backend) in backends.into_iter().enumerate() {
            let shared = Arc::clone(&queue.shared);
            // On failure `queue` is dropped, which stops the consumers already started.
            let handle = thread::Builder::new()
                .name(format!("eval-consumer-{idx}"))
                .spawn(move || consume::<S, B>(&shared, backend, idx))?;
            queue.lock_consumers().push(handle);
        }

        debug!(replicas, "evaluation queue started");
        Ok(queue)
    }

    /// Convenience constructor for a single backend.
    pub fn single(backend: B) -> Result<Self, QueueError> {
        Self::new(vec![backend])
    }
}

impl<S, B: BatchEvaluator<S>> EvaluationQueue<S, B> {
    /// Number of consumer threads still attached.
    #[must_use]
    pub fn replicas(&self) -> usize {
        self.lock_consumers().len()
    }

    /// Current throughput counters.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let counters = &self.shared.counters;
        QueueStats {
            requests: counters.requests.load(Ordering::Relaxed),
            batches: counters.batches.load(Ordering::Relaxed),
            largest_batch: counters.largest_batch.load(Ordering::Relaxed),
        }
    }

    /// Number of requests waiting for a consumer.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.lock().requests.len()
    }

    /// Stop and join all consumers.
    ///
    /// This is a hard stop, not a drain: requests still queued are never
    /// evaluated and their callers receive `EvalError::QueueClosed`.
    /// Calling it more than once is harmless.
    pub fn shutdown(&self) {
        self.shared.lock().running = false;
        self.shared.available.notify_all();

        let handles = std::mem::take(&mut *self.lock_consumers());
        if handles.is_empty() {
            return;
        }
        for handle in handles {
            if handle.join().is_err() {
                warn!("evaluation consumer panicked");
            }
        }

        let dropped = {
            let mut pending = self.shared.lock();
            let count = pending.requests.len();
            pending.requests.clear();
            count
        };
        if dropped > 0 {
            warn!(dropped, "evaluation requests abandoned at shutdown");
        }
        debug!("evaluation queue stopped");
    }

    fn lock_consumers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.consumers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S, B> Evaluator<S> for EvaluationQueue<S, B>
where
    S: Send + Sync + 'static,
    B: BatchEvaluator<S>,
{
    fn evaluate(&self, state: &S) -> Result<Evaluation, EvalError> {
        let input = B::prepare(state);
        let (reply, response) = bounded(1);
        {
            let mut pending = self.shared.lock();
            if !pending.running {
                return Err(EvalError::QueueClosed);
            }
            pending.requests.push_back(Request { input, reply });
        }
        self.shared.available.notify_one();

        let output = response.recv().map_err(|_| EvalError::QueueClosed)??;
        Ok(B::finish(output, state))
    }
}

impl<S, B: BatchEvaluator<S>> Drop for EvaluationQueue<S, B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<S, B: BatchEvaluator<S>> std::fmt::Debug for EvaluationQueue<S, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationQueue")
            .field("replicas", &self.replicas())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Consumer loop bound to one backend replica.
fn consume<S, B: BatchEvaluator<S>>(shared: &Shared<B::Input, B::Output>, mut backend: B, idx: usize) {
    loop {
        let batch: Vec<Request<B::Input, B::Output>> = {
            let pending = shared.lock();
            let mut pending = shared
                .available
                .wait_while(pending, |p| p.running && p.requests.is_empty())
                .unwrap_or_else(PoisonError::into_inner);
            if !pending.running {
                break;
            }
            pending.requests.drain(..).collect()
        };

        let size = batch.len();
        trace!(consumer = idx, size, "evaluating batch");

        let (inputs, replies): (Vec<_>, Vec<_>) =
            batch.into_iter().map(|r| (r.input, r.reply)).unzip();

        match backend.evaluate_batch(inputs) {
            Ok(outputs) if outputs.len() == size => {
                for (reply, output) in replies.into_iter().zip(outputs) {
                    // A caller that went away no longer needs its answer.
                    let _ = reply.send(Ok(output));
                }
            }
            Ok(outputs) => {
                let err = EvalError::BatchSizeMismatch {
                    expected: size,
                    got: outputs.len(),
                };
                warn!(consumer = idx, %err, "backend returned a malformed batch");
                for reply in replies {
                    let _ = reply.send(Err(err.clone()));
                }
            }
            Err(err) => {
                warn!(consumer = idx, %err, "backend failed");
                for reply in replies {
                    let _ = reply.send(Err(err.clone()));
                }
            }
        }

        let counters = &shared.counters;
        counters.requests.fetch_add(size as u64, Ordering::Relaxed);
        counters.batches.fetch_add(1, Ordering::Relaxed);
        counters.largest_batch.fetch_max(size as u64, Ordering::Relaxed);
    }
    trace!(consumer = idx, "evaluation consumer exiting");
}
