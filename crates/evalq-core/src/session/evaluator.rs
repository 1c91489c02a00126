//! The external evaluator seam.

use std::future::Future;

use crate::id::RequestId;

/// Failure reported by an evaluator for one chunk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EvaluationFailure {
    pub message: String,
}

impl EvaluationFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Runs chunks on behalf of an [`EvaluationSession`](super::EvaluationSession).
///
/// The session calls `evaluate` for one chunk at a time, in submission order,
/// and never while another evaluation is outstanding.
pub trait Evaluator<C>: Send + Sync {
    fn evaluate(
        &self,
        id: RequestId,
        chunk: &C,
    ) -> impl Future<Output = Result<(), EvaluationFailure>> + Send;
}
