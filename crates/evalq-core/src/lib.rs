//! Core engine for serialized notebook chunk evaluation.
//!
//! This crate provides:
//! - Request id generation
//! - FIFO request queue with a single active slot
//! - Queue driver with explicit one-step dispatch and fail-fast rejection
//! - Async evaluation sessions driving an external evaluator

pub mod driver;
pub mod error;
pub mod id;
pub mod queue;
pub mod registry;
pub mod request;
pub mod session;

pub use driver::{QueueDriver, QueueEvent, Step};
pub use error::{Error, Result};
pub use id::{IdGenerator, RequestId};
pub use queue::RequestQueue;
pub use registry::{ActiveRegistry, RegistrySnapshot};
pub use request::{Completion, CompletionHandler, EvaluationRequest, Outcome};
pub use session::{
    EvaluationFailure, EvaluationSession, Evaluator, SessionConfig, SessionHandle, SessionReport,
};
