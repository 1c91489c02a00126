//! Error types for evalq-core.

use thiserror::Error;

use crate::id::RequestId;

/// Result type for evalq-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in evalq-core.
///
/// [`Error::is_contract_violation`] separates resolve/reject misuse from
/// session-level failures. The driver never mutates its state before
/// returning an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Resolve or reject was called while no request is active.
    #[error("no active evaluation (got signal for {id})")]
    NothingActive { id: RequestId },

    /// Resolve or reject was called with an id that is not the active one.
    #[error("evaluation id mismatch: active is {expected}, got {actual}")]
    IdMismatch {
        expected: RequestId,
        actual: RequestId,
    },

    /// An evaluation was activated while another one is still in flight.
    #[error("cannot activate {requested}: {active} is already active")]
    AlreadyActive {
        active: RequestId,
        requested: RequestId,
    },

    /// Attempted to pop the head of an empty queue.
    #[error("request queue is empty")]
    EmptyQueue,

    /// Another caller is already driving this session's evaluator.
    #[error("evaluation run already in progress")]
    RunInProgress,

    /// The evaluator did not report back within the session timeout.
    #[error("evaluation of {id} timed out")]
    EvaluationTimeout { id: RequestId },
}

impl Error {
    /// Whether this error is a violation of the resolve/reject contract.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::NothingActive { .. }
                | Error::IdMismatch { .. }
                | Error::AlreadyActive { .. }
                | Error::EmptyQueue
        )
    }

    /// Render the error together with a recovery hint for end users.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Error::NothingActive { .. } => {
                "only report completion for a request after it has been dispatched"
            }
            Error::IdMismatch { .. } => {
                "evaluations complete in submission order; report the active id"
            }
            Error::AlreadyActive { .. } => "wait for the active evaluation to finish",
            Error::EmptyQueue => "check the queue size before removing its head",
            Error::RunInProgress => {
                "let the running loop pick up new submissions instead of starting another"
            }
            Error::EvaluationTimeout { .. } => {
                "raise the evaluation timeout or resubmit the remaining chunks"
            }
        };
        format!("{self}\n  hint: {hint}")
    }
}
