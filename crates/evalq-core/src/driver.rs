//! Queue driver: admission, dispatch and completion of evaluation requests.
//!
//! The driver serializes evaluation. Exactly one request is active at a time,
//! requests complete in submission order, and a single rejection abandons the
//! whole remaining batch.
//!
//! # Dispatch steps
//!
//! ```text
//! append ──► RequestQueue ──(queue was empty)──► ActiveRegistry   [immediate]
//!
//! resolve(id) ──► pop head ──► post Step::DispatchNext ──► run handler
//!                                        │
//!         run_pending_steps() ◄──────────┘
//!               │
//!               └──► ActiveRegistry (next head)                  [deferred]
//!
//! reject(id) ──► clear queue, registry, steps ──► run handler (Rejected)
//! ```
//!
//! Handlers run last, after the driver's own state is consistent.
//!
//! Advancing after a resolve is posted onto a step channel instead of being
//! applied inline. The owner decides when to drain it, so every signal moves
//! the queue by exactly one step and the state in between is observable.

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::error::Result;
use crate::id::{IdGenerator, RequestId};
use crate::queue::RequestQueue;
use crate::registry::ActiveRegistry;
use crate::request::{Completion, EvaluationRequest, Outcome};

/// Capacity for the event broadcast channel.
/// Slow subscribers lose the oldest events first.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Deferred continuation posted by the driver onto its step channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Activate the queue head if nothing is active.
    DispatchNext,
}

/// Notifications emitted as requests move through the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    /// A request was admitted to the tail of the queue.
    Queued { id: RequestId },
    /// A request became active; the evaluator should run its chunk now.
    Dispatched { id: RequestId },
    /// The active request completed successfully.
    Resolved { id: RequestId },
    /// The active request failed and every queued request behind it was dropped.
    Rejected {
        id: RequestId,
        abandoned: Vec<RequestId>,
    },
    /// The driver was reset, discarding all pending work.
    Reset { discarded: usize },
}

/// Serializes evaluation requests for one notebook session.
pub struct QueueDriver<C> {
    ids: IdGenerator,
    queue: RequestQueue<C>,
    registry: ActiveRegistry,
    step_tx: mpsc::UnboundedSender<Step>,
    step_rx: mpsc::UnboundedReceiver<Step>,
    /// Steps posted but not yet applied.
    pending_steps: usize,
    events: broadcast::Sender<QueueEvent>,
}

impl<C> Default for QueueDriver<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> QueueDriver<C> {
    /// Create an idle driver whose first request id is 1.
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create an idle driver with a custom event channel capacity.
    pub fn with_event_capacity(capacity: usize) -> Self {
        let (step_tx, step_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            ids: IdGenerator::new(),
            queue: RequestQueue::new(),
            registry: ActiveRegistry::new(),
            step_tx,
            step_rx,
            pending_steps: 0,
            events,
        }
    }

    /// Subscribe to queue events.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: QueueEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Submit a chunk for evaluation.
    ///
    /// The request is activated right away when it lands at the head of an
    /// empty queue. Otherwise it waits until every earlier request resolved.
    pub fn append(
        &mut self,
        chunk: C,
        on_complete: impl FnOnce(Completion) + Send + 'static,
    ) -> RequestId {
        let id = self.ids.next();
        let was_empty = self.queue.is_empty();

        self.queue
            .push(EvaluationRequest::new(id, chunk, Box::new(on_complete)));
        tracing::debug!(id = %id, queue_size = self.queue.len(), "appended evaluation request");
        self.emit(QueueEvent::Queued { id });

        // A non-empty queue with nothing active means a dispatch step is
        // already pending for the current head.
        if was_empty {
            self.dispatch_head();
        }

        id
    }

    /// Report that the active request finished successfully.
    ///
    /// Removes it from the queue, posts a [`Step::DispatchNext`] if more work
    /// is waiting, then runs its handler with [`Outcome::Resolved`].
    ///
    /// Queue state is settled before the handler runs, so a panicking
    /// handler cannot leave waiting requests without a dispatch step.
    pub fn resolve_evaluation(&mut self, id: RequestId) -> Result<()> {
        let handler = self.registry.clear_active(id).inspect_err(|e| {
            tracing::error!(id = %id, "rejected resolve signal: {}", e);
        })?;
        let request = self.queue.pop_head()?;
        debug_assert_eq!(request.id, id, "active id must match queue head");

        if !self.queue.is_empty() {
            self.post(Step::DispatchNext);
        }

        tracing::debug!(id = %id, remaining = self.queue.len(), "evaluation resolved");
        self.emit(QueueEvent::Resolved { id });

        handler(Completion {
            id,
            outcome: Outcome::Resolved,
        });

        Ok(())
    }

    /// Report that the active request failed.
    ///
    /// Empties the queue and pending steps, runs the rejected handler with
    /// [`Outcome::Rejected`], and only then drops the other requests without
    /// calling their handlers. Returns the ids that were abandoned, in
    /// submission order.
    pub fn reject_evaluation(&mut self, id: RequestId) -> Result<Vec<RequestId>> {
        let handler = self.registry.clear_active(id).inspect_err(|e| {
            tracing::error!(id = %id, "rejected reject signal: {}", e);
        })?;

        // Held until after the handler so abandoned handlers are dropped last.
        let mut dropped = self.queue.drain_all();
        dropped.retain(|queued| queued.id != id);
        self.drain_steps();

        let abandoned: Vec<RequestId> = dropped.iter().map(|req| req.id).collect();
        tracing::warn!(id = %id, abandoned = abandoned.len(), "evaluation rejected, batch aborted");
        self.emit(QueueEvent::Rejected {
            id,
            abandoned: abandoned.clone(),
        });

        handler(Completion {
            id,
            outcome: Outcome::Rejected,
        });
        drop(dropped);

        Ok(abandoned)
    }

    /// Apply every posted step. Returns how many were applied.
    pub fn run_pending_steps(&mut self) -> usize {
        let mut applied = 0;
        while self.run_next_step().is_some() {
            applied += 1;
        }
        applied
    }

    /// Apply the oldest posted step, if any.
    pub fn run_next_step(&mut self) -> Option<Step> {
        let step = self.step_rx.try_recv().ok()?;
        self.pending_steps = self.pending_steps.saturating_sub(1);
        match step {
            Step::DispatchNext => {
                self.dispatch_head();
            }
        }
        Some(step)
    }

    /// Number of steps posted but not yet applied.
    pub fn pending_steps(&self) -> usize {
        self.pending_steps
    }

    /// Discard all queued work without running any handler.
    ///
    /// The id counter keeps counting, so ids are never reused by this driver.
    /// Returns the number of discarded requests.
    pub fn reset(&mut self) -> usize {
        self.registry.discard();
        let discarded = self.queue.clear().len();
        self.drain_steps();

        tracing::debug!(discarded, "evaluation queue reset");
        self.emit(QueueEvent::Reset { discarded });
        discarded
    }

    /// Read-only view of the active registry.
    pub fn get_active_registry(&self) -> &ActiveRegistry {
        &self.registry
    }

    /// Requests not yet completed (active plus waiting).
    pub fn get_queue_size(&self) -> usize {
        self.queue.len()
    }

    /// Ids of all pending requests, head first.
    pub fn queued_ids(&self) -> Vec<RequestId> {
        self.queue.ids()
    }

    /// The chunk the evaluator should be running now.
    pub fn active_chunk(&self) -> Option<(RequestId, &C)> {
        let active = self.registry.active_id()?;
        self.queue
            .peek_head()
            .filter(|head| head.id == active)
            .map(|head| (head.id, &head.chunk))
    }

    /// Whether nothing is queued, active or pending.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.registry.is_empty() && self.pending_steps == 0
    }

    fn post(&mut self, step: Step) {
        // The receiver lives in `self`, so the send cannot fail.
        if self.step_tx.send(step).is_ok() {
            self.pending_steps += 1;
        }
    }

    fn drain_steps(&mut self) {
        while self.step_rx.try_recv().is_ok() {}
        self.pending_steps = 0;
    }

    /// Move the head's handler into the registry if nothing is active.
    fn dispatch_head(&mut self) -> Option<RequestId> {
        if !self.registry.is_empty() {
            return None;
        }
        let head = self.queue.peek_head_mut()?;
        let handler = head.on_complete.take()?;
        let id = head.id;

        if let Err(e) = self.registry.set_active(id, handler) {
            tracing::error!(id = %id, "failed to dispatch: {}", e);
            return None;
        }

        tracing::debug!(id = %id, "evaluation dispatched");
        self.emit(QueueEvent::Dispatched { id });
        Some(id)
    }
}

impl<C> std::fmt::Debug for QueueDriver<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueDriver")
            .field("last_id", &self.ids.last())
            .field("queued", &self.queue.ids())
            .field("active", &self.registry.active_id())
            .field("pending_steps", &self.pending_steps)
            .finish()
    }
}
