use crate::EngineError;

/// Deterministic execution-state machine for host-observable engine control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RunState {
    /// No run has been started since the engine was opened.
    #[default]
    Idle,
    /// A run is in progress.
    Running,
    /// The last run reached its `until` address.
    Stopped,
    /// The last run ended with an error.
    Faulted(EngineError),
}

impl RunState {
    /// Returns the error that ended the last run, if any.
    #[must_use]
    pub const fn latched_fault(self) -> Option<EngineError> {
        match self {
            Self::Faulted(cause) => Some(cause),
            Self::Idle | Self::Running | Self::Stopped => None,
        }
    }
}
