//! Error types.

use thiserror::Error;

use crate::graph::{NodeId, NodeKind};

/// Boxed error carried out of a failing effect worker.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised synchronously to the caller of a reactive read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// The signal or computed was read after `dispose`.
    #[error("{kind} {id} has been disposed")]
    Disposed { kind: NodeKind, id: NodeId },

    /// A computed read itself while deriving its value.
    #[error("computed {id} depends on itself")]
    Cycle { id: NodeId },
}

/// Convenience alias for fallible reactive reads.
pub type Result<T> = std::result::Result<T, ReactiveError>;

/// An effect run that ended in an error or a panic.
///
/// Delivered to the effect's own handler if it has one, otherwise to the
/// runtime's default handler.
#[derive(Debug, Error)]
pub enum EffectError {
    #[error("effect {id} failed: {source}")]
    Failed {
        id: NodeId,
        #[source]
        source: BoxError,
    },

    #[error("effect {id} panicked: {message}")]
    Panicked { id: NodeId, message: String },
}

impl EffectError {
    /// The effect that raised this error.
    pub fn effect_id(&self) -> NodeId {
        match self {
            EffectError::Failed { id, .. } | EffectError::Panicked { id, .. } => *id,
        }
    }

    pub(crate) fn from_panic(id: NodeId, payload: Box<dyn std::any::Any + Send>) -> Self {
        EffectError::Panicked {
            id,
            message: panic_message(payload.as_ref()),
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_owned()
    }
}
