//! FIFO queue of requests that have not completed yet.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::id::RequestId;
use crate::request::EvaluationRequest;

/// Ordered pending requests, head first.
///
/// The head is the active request whenever one is in flight. Entries leave
/// the queue only by resolving (head) or by a full `clear` after a rejection.
pub struct RequestQueue<C> {
    entries: VecDeque<EvaluationRequest<C>>,
}

impl<C> Default for RequestQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> RequestQueue<C> {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Append to the tail.
    pub fn push(&mut self, request: EvaluationRequest<C>) {
        self.entries.push_back(request);
    }

    pub fn peek_head(&self) -> Option<&EvaluationRequest<C>> {
        self.entries.front()
    }

    pub(crate) fn peek_head_mut(&mut self) -> Option<&mut EvaluationRequest<C>> {
        self.entries.front_mut()
    }

    /// Remove and return the head.
    ///
    /// Returns `Error::EmptyQueue` if there is nothing to remove.
    pub fn pop_head(&mut self) -> Result<EvaluationRequest<C>> {
        self.entries.pop_front().ok_or(Error::EmptyQueue)
    }

    /// Drop every entry without invoking any handler.
    ///
    /// Returns the ids that were discarded, in queue order.
    pub fn clear(&mut self) -> Vec<RequestId> {
        self.drain_all().into_iter().map(|req| req.id).collect()
    }

    /// Take every entry out of the queue, handlers included.
    pub(crate) fn drain_all(&mut self) -> Vec<EvaluationRequest<C>> {
        self.entries.drain(..).collect()
    }

    /// Number of entries, including the active one.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids in queue order.
    pub fn ids(&self) -> Vec<RequestId> {
        self.entries.iter().map(|req| req.id).collect()
    }
}
