//! Registry of the single in-flight evaluation.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::RequestId;
use crate::request::CompletionHandler;

/// Tracks the request currently dispatched to the evaluator.
///
/// Holds at most one entry. Activating a second request while one is in
/// flight is rejected, which is what keeps evaluation serialized.
#[derive(Default)]
pub struct ActiveRegistry {
    active: Option<(RequestId, CompletionHandler)>,
}

/// Read-only copy of the registry contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub active: Option<RequestId>,
}

impl RegistrySnapshot {
    /// Active ids (zero or one).
    pub fn ids(&self) -> Vec<RequestId> {
        self.active.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        usize::from(self.active.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_none()
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.active == Some(id)
    }
}

impl ActiveRegistry {
    pub fn new() -> Self {
        Self { active: None }
    }

    /// Record `id` as the active request.
    pub fn set_active(&mut self, id: RequestId, handler: CompletionHandler) -> Result<()> {
        if let Some((active, _)) = &self.active {
            return Err(Error::AlreadyActive {
                active: *active,
                requested: id,
            });
        }
        self.active = Some((id, handler));
        Ok(())
    }

    /// Remove the active entry and hand back its handler.
    ///
    /// `id` must match the active id; the registry is left untouched otherwise.
    pub fn clear_active(&mut self, id: RequestId) -> Result<CompletionHandler> {
        match self.active.take() {
            Some((active, handler)) if active == id => Ok(handler),
            Some(entry) => {
                let expected = entry.0;
                self.active = Some(entry);
                Err(Error::IdMismatch {
                    expected,
                    actual: id,
                })
            }
            None => Err(Error::NothingActive { id }),
        }
    }

    pub fn get(&self) -> Option<(RequestId, &CompletionHandler)> {
        self.active.as_ref().map(|(id, handler)| (*id, handler))
    }

    pub fn active_id(&self) -> Option<RequestId> {
        self.active.as_ref().map(|(id, _)| *id)
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_none()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            active: self.active_id(),
        }
    }

    /// Drop the active entry without running its handler.
    pub(crate) fn discard(&mut self) -> Option<RequestId> {
        self.active.take().map(|(id, _)| id)
    }
}

impl std::fmt::Debug for ActiveRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveRegistry")
            .field("active", &self.active_id())
            .finish()
    }
}
