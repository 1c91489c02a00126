//! Evaluation requests and their completion handlers.

use serde::{Deserialize, Serialize};

use crate::id::RequestId;

/// How an evaluation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The evaluator reported success.
    Resolved,
    /// The evaluator reported failure. The rest of the batch was abandoned.
    Rejected,
}

/// Value passed to a request's completion handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub id: RequestId,
    pub outcome: Outcome,
}

/// Completion callback supplied at submission.
///
/// `FnOnce` guarantees the handler runs at most once. Abandoned requests
/// drop their handler without calling it.
pub type CompletionHandler = Box<dyn FnOnce(Completion) + Send>;

/// A submitted chunk waiting for, or undergoing, evaluation.
pub struct EvaluationRequest<C> {
    /// Id assigned at submission.
    pub id: RequestId,
    /// Opaque payload. Never inspected by the queue.
    pub chunk: C,
    /// Present until the request is dispatched, then owned by the
    /// [`ActiveRegistry`](crate::ActiveRegistry).
    pub on_complete: Option<CompletionHandler>,
}

impl<C> EvaluationRequest<C> {
    pub fn new(id: RequestId, chunk: C, on_complete: CompletionHandler) -> Self {
        Self {
            id,
            chunk,
            on_complete: Some(on_complete),
        }
    }

    /// Whether the handler has already moved to the active registry.
    pub fn is_dispatched(&self) -> bool {
        self.on_complete.is_none()
    }
}

impl<C: std::fmt::Debug> std::fmt::Debug for EvaluationRequest<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationRequest")
            .field("id", &self.id)
            .field("chunk", &self.chunk)
            .field("dispatched", &self.is_dispatched())
            .finish()
    }
}
