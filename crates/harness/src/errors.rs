//! Structured error reporting for harness scenarios.
//!
//! Engine faults and logical assertion failures travel through the same
//! [`HarnessError`] type but stay distinguishable: every engine-facing phase
//! has its own variant wrapping the originating [`EngineError`], while a
//! clean run whose observations do not match expectations produces
//! [`HarnessError::Verification`].

use engine_core::EngineError;
use thiserror::Error;

use crate::verifier::ScenarioPhase;

/// Process exit status reserved for verification failures.
///
/// Engine error codes are small positive integers, so this value never
/// collides with one of them.
pub const VERIFICATION_FAILURE_EXIT: u8 = 64;

/// Coarse failure classification used for reporting and aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FailureKind {
    /// Engine could not be opened for the requested architecture and mode.
    EngineInit,
    /// Memory map request was rejected.
    MemoryMap,
    /// Program image could not be written.
    Write,
    /// Code hook could not be registered.
    HookRegistration,
    /// Execution stopped on a fault or an exhausted bound.
    ExecutionFault,
    /// A register could not be read back after execution.
    RegisterRead,
    /// Execution completed cleanly but the observations are wrong.
    VerificationFailure,
}

impl FailureKind {
    /// Stable lower-case label for reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::EngineInit => "engine-init",
            Self::MemoryMap => "memory-map",
            Self::Write => "write",
            Self::HookRegistration => "hook-registration",
            Self::ExecutionFault => "execution-fault",
            Self::RegisterRead => "register-read",
            Self::VerificationFailure => "verification-failure",
        }
    }
}

/// Logical assertion failures raised after a clean run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationFailure {
    /// The hook never fired for the delay-slot witness address.
    #[error("code hook never fired for delay-slot witness {witness:#x}")]
    WitnessNotObserved {
        /// Address of the delay-slot instruction.
        witness: u64,
    },
    /// The loop top was observed a different number of times than expected.
    #[error("loop top observed {observed} times, expected {expected}")]
    IterationCount {
        /// Expected number of loop-top retirements.
        expected: u32,
        /// Observed number of loop-top retirements.
        observed: u32,
    },
    /// The program counter did not stop at the exit address.
    #[error("final pc {observed:#x}, expected {expected:#x}")]
    FinalPc {
        /// Exit address.
        expected: u64,
        /// Program counter read back after the run.
        observed: u64,
    },
    /// The loop counter register holds an unexpected value.
    #[error("final counter {observed:#x}, expected {expected:#x}")]
    FinalCounter {
        /// Architecturally expected counter value.
        expected: u64,
        /// Counter value read back after the run.
        observed: u64,
    },
}

/// Failure of a harness scenario.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarnessError {
    /// Engine open failed.
    #[error("engine init failed: {0}")]
    EngineInit(#[source] EngineError),
    /// Memory map failed.
    #[error("memory map failed: {0}")]
    MemoryMap(#[source] EngineError),
    /// Image write failed.
    #[error("image write failed: {0}")]
    Write(#[source] EngineError),
    /// Hook registration failed.
    #[error("hook registration failed: {0}")]
    HookRegistration(#[source] EngineError),
    /// Execution stopped on a fault.
    #[error("execution fault: {0}")]
    ExecutionFault(#[source] EngineError),
    /// Register read-back failed.
    #[error("register read failed: {0}")]
    RegisterRead(#[source] EngineError),
    /// Observations did not match expectations.
    #[error("verification failed: {0}")]
    Verification(#[from] VerificationFailure),
}

impl HarnessError {
    /// Returns the aggregation kind.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::EngineInit(_) => FailureKind::EngineInit,
            Self::MemoryMap(_) => FailureKind::MemoryMap,
            Self::Write(_) => FailureKind::Write,
            Self::HookRegistration(_) => FailureKind::HookRegistration,
            Self::ExecutionFault(_) => FailureKind::ExecutionFault,
            Self::RegisterRead(_) => FailureKind::RegisterRead,
            Self::Verification(_) => FailureKind::VerificationFailure,
        }
    }

    /// Returns the wrapped engine error, if this is an infrastructure fault.
    #[must_use]
    pub const fn engine_error(&self) -> Option<EngineError> {
        match self {
            Self::EngineInit(cause)
            | Self::MemoryMap(cause)
            | Self::Write(cause)
            | Self::HookRegistration(cause)
            | Self::ExecutionFault(cause)
            | Self::RegisterRead(cause) => Some(*cause),
            Self::Verification(_) => None,
        }
    }

    /// Returns `true` for engine faults and `false` for assertion failures.
    #[must_use]
    pub const fn is_engine_error(&self) -> bool {
        self.engine_error().is_some()
    }

    /// Process exit status for this failure.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self.engine_error() {
            Some(cause) => cause.code(),
            None => VERIFICATION_FAILURE_EXIT,
        }
    }

    /// Phase the scenario was in when this failure was raised.
    #[must_use]
    pub const fn failed_phase(&self) -> ScenarioPhase {
        match self {
            Self::EngineInit(_)
            | Self::MemoryMap(_)
            | Self::Write(_)
            | Self::HookRegistration(_) => ScenarioPhase::Unstarted,
            Self::ExecutionFault(_) | Self::RegisterRead(_) | Self::Verification(_) => {
                ScenarioPhase::Executing
            }
        }
    }
}

/// Rejected program-image parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ImageError {
    /// Loop count does not fit the signed 16-bit `li` immediate.
    #[error("loop count {0} exceeds the 16-bit signed immediate range")]
    LoopCountOutOfRange(u16),
    /// Load address is not word aligned.
    #[error("load address {0:#x} is not word aligned")]
    MisalignedBase(u64),
    /// Image would not fit below the top of the 32-bit address space.
    #[error("load address {0:#x} leaves no room for the image")]
    BaseOutOfRange(u64),
}
