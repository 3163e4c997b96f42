//! Stateful code-hook observer.

use engine_core::CodeHook;

use crate::image::ProgramImage;

/// One code-hook invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Observation {
    /// Address of the instruction about to retire.
    pub address: u64,
    /// Instruction size in bytes.
    pub size: u32,
}

/// The two facts the verifier decides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ObserverState {
    /// Loop-top retirements seen so far.
    pub iterations: u32,
    /// Whether the delay-slot witness address was seen.
    pub terminal_observed: bool,
}

/// Code hook that tallies loop-top visits and watches for the witness.
///
/// The observer only records what it is told. It holds no engine handle and
/// cannot influence the run it observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionObserver {
    loop_top: u64,
    witness: u64,
    state: ObserverState,
    log: Vec<Observation>,
}

impl ExecutionObserver {
    /// Creates an observer for explicit loop-top and witness addresses.
    #[must_use]
    pub const fn new(loop_top: u64, witness: u64) -> Self {
        Self {
            loop_top,
            witness,
            state: ObserverState {
                iterations: 0,
                terminal_observed: false,
            },
            log: Vec::new(),
        }
    }

    /// Creates an observer for the addresses derived from `image`.
    #[must_use]
    pub const fn for_image(image: &ProgramImage) -> Self {
        Self::new(image.loop_top(), image.witness())
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ObserverState {
        self.state
    }

    /// Every observation in call order.
    #[must_use]
    pub fn observations(&self) -> &[Observation] {
        &self.log
    }

    /// Observed addresses in call order.
    #[must_use]
    pub fn trace(&self) -> Vec<u64> {
        self.log.iter().map(|observation| observation.address).collect()
    }

    /// Instruction addresses of `image` that never appeared in the log.
    #[must_use]
    pub fn unobserved(&self, image: &ProgramImage) -> Vec<u64> {
        image
            .instruction_addresses()
            .filter(|address| !self.log.iter().any(|seen| seen.address == *address))
            .collect()
    }

    /// Consumes the observer, returning its state and log.
    #[must_use]
    pub fn into_parts(self) -> (ObserverState, Vec<Observation>) {
        (self.state, self.log)
    }
}

impl CodeHook for ExecutionObserver {
    fn on_code(&mut self, address: u64, size: u32) {
        tracing::trace!(address = format_args!("{address:#x}"), size, "code hook");
        self.log.push(Observation { address, size });
        if address == self.witness {
            self.state.terminal_observed = true;
        }
        if address == self.loop_top {
            self.state.iterations = self.state.iterations.saturating_add(1);
        }
    }
}
