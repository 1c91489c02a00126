//! Request identifiers.

use serde::{Deserialize, Serialize};

/// Unique identifier for an evaluation request.
///
/// Ids start at 1 and increase by one per submission. A given
/// [`IdGenerator`] never hands out the same id twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub(crate) u64);

impl RequestId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Issues strictly increasing request ids.
///
/// Each [`QueueDriver`](crate::QueueDriver) owns its own generator, so
/// independent sessions number their requests independently.
#[derive(Debug, Default)]
pub struct IdGenerator {
    /// Last issued id, 0 before the first call to `next`.
    last: u64,
}

impl IdGenerator {
    /// Create a generator whose first id is 1.
    pub fn new() -> Self {
        Self { last: 0 }
    }

    /// Advance the counter and return the new id.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> RequestId {
        self.last += 1;
        RequestId(self.last)
    }

    /// The most recently issued id value (0 if none).
    pub fn last(&self) -> u64 {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_one() {
        let mut ids = IdGenerator::new();
        assert_eq!(ids.last(), 0);
        assert_eq!(ids.next(), RequestId::new(1));
        assert_eq!(ids.last(), 1);
    }

    #[test]
    fn test_strictly_increasing() {
        let mut ids = IdGenerator::default();
        let issued: Vec<u64> = (0..5).map(|_| ids.next().as_u64()).collect();
        assert_eq!(issued, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_independent_generators() {
        let mut a = IdGenerator::new();
        let mut b = IdGenerator::new();
        a.next();
        a.next();
        assert_eq!(b.next(), RequestId::new(1));
        assert_eq!(a.next(), RequestId::new(3));
    }

    #[test]
    fn test_display_and_serde() {
        let id = RequestId::new(7);
        assert_eq!(id.to_string(), "#7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
        let parsed: RequestId = serde_json::from_str("7").unwrap();
        assert_eq!(parsed, id);
    }
}
