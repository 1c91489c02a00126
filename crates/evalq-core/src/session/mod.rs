//! Async evaluation sessions.
//!
//! An [`EvaluationSession`] wraps a [`QueueDriver`] behind a shared handle and
//! drives an [`Evaluator`] through the queue: drain posted dispatch steps,
//! evaluate the active chunk with the lock released, then report the result
//! back as a resolve or reject.
//!
//! # Module Structure
//!
//! - `config` - Session configuration (event capacity, evaluation timeout)
//! - `evaluator` - Evaluator trait and failure type

mod config;
mod evaluator;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, broadcast, oneshot};

use crate::driver::{QueueDriver, QueueEvent};
use crate::error::{Error, Result};
use crate::id::RequestId;
use crate::registry::RegistrySnapshot;
use crate::request::{Completion, Outcome};

pub use config::SessionConfig;
pub use evaluator::{EvaluationFailure, Evaluator};

/// Shared handle to a session's driver.
pub type SessionHandle<C> = Arc<Mutex<QueueDriver<C>>>;

/// Summary of one `run_until_idle` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Requests that resolved, in order.
    pub resolved: Vec<RequestId>,
    /// The request whose failure stopped the batch.
    pub rejected: Option<RequestId>,
    /// Failure reported for `rejected`.
    pub failure: Option<EvaluationFailure>,
    /// Requests dropped because of the rejection.
    pub abandoned: Vec<RequestId>,
}

impl SessionReport {
    pub fn is_success(&self) -> bool {
        self.rejected.is_none()
    }
}

/// One notebook session's evaluation queue.
///
/// Sessions share no state. Dropping a session drops all pending work.
pub struct EvaluationSession<C> {
    driver: SessionHandle<C>,
    config: SessionConfig,
    /// Whether a `run_until_idle` loop is currently driving the evaluator.
    running: AtomicBool,
}

/// Clears the session's running flag when a run ends, including on panic
/// or early return.
struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(running: &'a AtomicBool) -> Result<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::RunInProgress)?;
        Ok(Self { running })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

impl<C> Default for EvaluationSession<C> {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl<C> EvaluationSession<C> {
    pub fn new(config: SessionConfig) -> Self {
        let driver = QueueDriver::with_event_capacity(config.event_capacity);
        Self {
            driver: Arc::new(Mutex::new(driver)),
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether a `run_until_idle` loop is active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clone of the shared driver handle.
    pub fn handle(&self) -> SessionHandle<C> {
        Arc::clone(&self.driver)
    }

    /// Submit a chunk and receive its outcome on a oneshot channel.
    ///
    /// If the request is abandoned the sender is dropped, so the receiver
    /// resolves to an error instead of an outcome.
    pub async fn submit(&self, chunk: C) -> (RequestId, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        let id = self
            .submit_with(chunk, move |completion: Completion| {
                let _ = tx.send(completion.outcome);
            })
            .await;
        (id, rx)
    }

    /// Submit a chunk with a custom completion handler.
    pub async fn submit_with(
        &self,
        chunk: C,
        on_complete: impl FnOnce(Completion) + Send + 'static,
    ) -> RequestId {
        self.driver.lock().await.append(chunk, on_complete)
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.driver.lock().await.subscribe()
    }

    pub async fn queue_size(&self) -> usize {
        self.driver.lock().await.get_queue_size()
    }

    pub async fn active(&self) -> RegistrySnapshot {
        self.driver.lock().await.get_active_registry().snapshot()
    }

    /// Drop all pending work without running handlers.
    pub async fn reset(&self) -> usize {
        self.driver.lock().await.reset()
    }
}

impl<C> EvaluationSession<C>
where
    C: Clone + Send + Sync + 'static,
{
    /// Evaluate queued chunks one at a time until the queue is empty.
    ///
    /// Stops at the first failure, which abandons the rest of the batch.
    /// A timed out evaluation is rejected like a failure and reported as
    /// `Error::EvaluationTimeout`.
    ///
    /// Only one run may drive a session at a time. A concurrent call returns
    /// `Error::RunInProgress` without touching the queue; chunks submitted
    /// meanwhile are picked up by the run already in progress.
    pub async fn run_until_idle<E>(&self, evaluator: &E) -> Result<SessionReport>
    where
        E: Evaluator<C>,
    {
        let _guard = RunGuard::acquire(&self.running).inspect_err(|_| {
            tracing::warn!("evaluation run already in progress");
        })?;
        let mut report = SessionReport::default();

        loop {
            let (id, chunk) = {
                let mut driver = self.driver.lock().await;
                driver.run_pending_steps();
                match driver.active_chunk() {
                    Some((id, chunk)) => (id, chunk.clone()),
                    None => {
                        if driver.get_queue_size() > 0 {
                            tracing::warn!(
                                queue_size = driver.get_queue_size(),
                                "queued requests without an active evaluation"
                            );
                        }
                        break;
                    }
                }
            };

            tracing::debug!(id = %id, "evaluating chunk");
            let (result, timed_out) = match self.config.evaluation_timeout() {
                Some(limit) => {
                    match tokio::time::timeout(limit, evaluator.evaluate(id, &chunk)).await {
                        Ok(result) => (result, false),
                        Err(_) => (
                            Err(EvaluationFailure::new(format!(
                                "evaluation exceeded {}ms",
                                limit.as_millis()
                            ))),
                            true,
                        ),
                    }
                }
                None => (evaluator.evaluate(id, &chunk).await, false),
            };

            let mut driver = self.driver.lock().await;
            if driver.get_active_registry().active_id() != Some(id) {
                // Reset while the chunk was running.
                tracing::debug!(id = %id, "session reset during evaluation");
                break;
            }

            match result {
                Ok(()) => {
                    driver.resolve_evaluation(id)?;
                    report.resolved.push(id);
                }
                Err(failure) => {
                    tracing::warn!(id = %id, "evaluation failed: {}", failure);
                    report.abandoned = driver.reject_evaluation(id)?;
                    report.rejected = Some(id);
                    report.failure = Some(failure);
                    if timed_out {
                        return Err(Error::EvaluationTimeout { id });
                    }
                    break;
                }
            }
        }

        Ok(report)
    }
}
