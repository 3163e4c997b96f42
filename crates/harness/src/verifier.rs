//! Scenario driver and verdict computation.
//!
//! A [`Scenario`] walks `Unstarted -> Configured -> Executing -> Concluded`.
//! Configuration failures jump straight to `Concluded` with the originating
//! error. After a clean run the verdict passes iff the observer saw the
//! delay-slot witness; [`Strictness::Full`] adds the count and register
//! checks after that primary one.

use engine_core::{Engine, EngineFamily};

use crate::config::{ScenarioConfig, Strictness};
use crate::errors::{FailureKind, HarnessError, VerificationFailure};
use crate::image::ProgramImage;
use crate::observer::{ExecutionObserver, Observation, ObserverState};
use crate::session::Session;

/// Phase of a scenario run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ScenarioPhase {
    /// Nothing has been configured yet.
    #[default]
    Unstarted,
    /// Image mapped and written, hook registered.
    Configured,
    /// `run` is in progress.
    Executing,
    /// Verdict computed.
    Concluded {
        /// Whether the verdict passed.
        passed: bool,
    },
}

/// Registers read back after a clean run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FinalRegisters {
    /// Program counter.
    pub pc: u64,
    /// Loop counter register.
    pub counter: u64,
}

/// Pass/fail result of a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The hook fired for the delay slot (and, under full strictness, every
    /// other check held).
    Pass,
    /// The scenario failed.
    Fail(HarnessError),
}

impl Verdict {
    /// Returns `true` for [`Verdict::Pass`].
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// Failure classification, if any.
    #[must_use]
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Pass => None,
            Self::Fail(error) => Some(error.kind()),
        }
    }

    /// The failure, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&HarnessError> {
        match self {
            Self::Pass => None,
            Self::Fail(error) => Some(error),
        }
    }
}

/// Everything a finished scenario produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Verdict.
    pub verdict: Verdict,
    /// Observer state at the end of the run.
    pub state: ObserverState,
    /// Hook invocations in call order.
    pub observations: Vec<Observation>,
    /// Registers read back, when execution completed cleanly.
    pub registers: Option<FinalRegisters>,
}

impl Outcome {
    /// Observed addresses in call order.
    #[must_use]
    pub fn trace(&self) -> Vec<u64> {
        self.observations
            .iter()
            .map(|observation| observation.address)
            .collect()
    }
}

/// One delay-slot hook verification scenario.
#[derive(Debug, Clone)]
pub struct Scenario {
    image: ProgramImage,
    config: ScenarioConfig,
    phase: ScenarioPhase,
}

impl Scenario {
    /// Creates a scenario for `image` under `config`.
    #[must_use]
    pub const fn new(image: ProgramImage, config: ScenarioConfig) -> Self {
        Self {
            image,
            config,
            phase: ScenarioPhase::Unstarted,
        }
    }

    /// The reference scenario with default configuration.
    #[must_use]
    pub fn reference() -> Self {
        Self::new(ProgramImage::reference(), ScenarioConfig::default())
    }

    /// A scenario for `image` with the mapping derived from it.
    #[must_use]
    pub fn for_image(image: ProgramImage) -> Self {
        let config = ScenarioConfig::for_image(&image);
        Self::new(image, config)
    }

    /// Program image under test.
    #[must_use]
    pub const fn image(&self) -> &ProgramImage {
        &self.image
    }

    /// Scenario configuration.
    #[must_use]
    pub const fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> ScenarioPhase {
        self.phase
    }

    /// Runs the scenario on a fresh engine of family `F`.
    pub fn run<F: EngineFamily>(&mut self) -> Outcome {
        let mut observer = ExecutionObserver::for_image(&self.image);
        let executed = self.execute::<F::Engine<'_>>(&mut observer);
        self.conclude(executed, observer)
    }

    /// Opens a session on engine `E`, configures it, and runs the image.
    ///
    /// `observer` is lent to the engine for the session and is free again
    /// when this returns; the session is released before any error is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns the [`HarnessError`] of the first failing engine call.
    pub fn execute<'h, E: Engine<'h>>(
        &mut self,
        observer: &'h mut ExecutionObserver,
    ) -> Result<FinalRegisters, HarnessError> {
        let config = self.config;
        self.phase = ScenarioPhase::Unstarted;

        let mut session =
            Session::<E>::open(config.arch, config.mode).map_err(HarnessError::EngineInit)?;
        session
            .map(config.map_base, config.map_size, config.map_perms)
            .map_err(HarnessError::MemoryMap)?;
        session
            .write(self.image.base(), self.image.bytes())
            .map_err(HarnessError::Write)?;
        session
            .register_code_hook(config.hook_range, observer)
            .map_err(HarnessError::HookRegistration)?;
        self.enter(ScenarioPhase::Configured);

        self.enter(ScenarioPhase::Executing);
        session
            .run(
                self.image.base(),
                self.image.exit(),
                config.timeout_us,
                config.max_instructions,
            )
            .map_err(HarnessError::ExecutionFault)?;

        let registers = FinalRegisters {
            pc: session
                .read_register(engine_core::Register::Pc)
                .map_err(HarnessError::RegisterRead)?,
            counter: session
                .read_register(config.counter)
                .map_err(HarnessError::RegisterRead)?,
        };
        session.close();
        Ok(registers)
    }

    /// Computes the verdict from the result of [`Scenario::execute`] and the
    /// observer it used.
    pub fn conclude(
        &mut self,
        executed: Result<FinalRegisters, HarnessError>,
        observer: ExecutionObserver,
    ) -> Outcome {
        let (state, observations) = observer.into_parts();
        let (verdict, registers) = match executed {
            Ok(registers) => (self.judge(state, registers), Some(registers)),
            Err(error) => (Verdict::Fail(error), None),
        };

        self.enter(ScenarioPhase::Concluded {
            passed: verdict.is_pass(),
        });
        match &verdict {
            Verdict::Pass => tracing::info!(
                iterations = state.iterations,
                observations = observations.len(),
                "scenario passed"
            ),
            Verdict::Fail(error) => tracing::warn!(
                kind = error.kind().label(),
                phase = ?error.failed_phase(),
                %error,
                "scenario failed"
            ),
        }

        Outcome {
            verdict,
            state,
            observations,
            registers,
        }
    }

    fn judge(&self, state: ObserverState, registers: FinalRegisters) -> Verdict {
        match self.check(state, registers) {
            Ok(()) => Verdict::Pass,
            Err(failure) => Verdict::Fail(failure.into()),
        }
    }

    fn check(
        &self,
        state: ObserverState,
        registers: FinalRegisters,
    ) -> Result<(), VerificationFailure> {
        if !state.terminal_observed {
            return Err(VerificationFailure::WitnessNotObserved {
                witness: self.image.witness(),
            });
        }
        if self.config.strictness == Strictness::WitnessOnly {
            return Ok(());
        }

        let expected = self.image.expected_iterations();
        if state.iterations != expected {
            return Err(VerificationFailure::IterationCount {
                expected,
                observed: state.iterations,
            });
        }
        if registers.pc != self.image.exit() {
            return Err(VerificationFailure::FinalPc {
                expected: self.image.exit(),
                observed: registers.pc,
            });
        }
        let expected = self.image.expected_final_counter();
        if registers.counter != expected {
            return Err(VerificationFailure::FinalCounter {
                expected,
                observed: registers.counter,
            });
        }
        Ok(())
    }

    fn enter(&mut self, phase: ScenarioPhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "scenario phase");
        self.phase = phase;
    }
}
