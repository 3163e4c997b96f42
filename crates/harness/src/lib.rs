//! Delay-slot code-hook verification harness.
//!
//! Loads a countdown loop whose decrement sits in a branch delay slot, runs
//! it on an [`engine_core::Engine`], and decides whether the engine's code
//! hook fired for the delay-slot instruction.

#[cfg(test)]
use proptest as _;

/// Scenario configuration and assertion depth.
pub mod config;
/// Failure classification and exit codes.
pub mod errors;
/// The delay-slot program image.
pub mod image;
/// `tracing` subscriber setup for binaries.
pub mod logging;
/// Code-hook observer.
pub mod observer;
/// Report rendering.
pub mod report;
/// Exactly-once engine ownership.
pub mod session;
/// Scenario driver and verdicts.
pub mod verifier;

pub use config::{ScenarioConfig, Strictness, MAP_ALIGNMENT, REFERENCE_MAP_SIZE};
pub use errors::{
    FailureKind, HarnessError, ImageError, VerificationFailure, VERIFICATION_FAILURE_EXIT,
};
pub use image::{ProgramImage, REFERENCE_BASE, REFERENCE_BYTES, REFERENCE_LOOP_COUNT};
pub use observer::{ExecutionObserver, Observation, ObserverState};
pub use session::Session;
pub use verifier::{FinalRegisters, Outcome, Scenario, ScenarioPhase, Verdict};
