//! Scenario configuration with the reference values as defaults.

use engine_core::{Arch, HookRange, Mode, Permissions, Register};

use crate::image::{ProgramImage, REFERENCE_BASE};

/// Size of the region mapped for the reference image.
pub const REFERENCE_MAP_SIZE: u64 = 0x1000;
/// Alignment of mappings derived from an image; one host page.
pub const MAP_ALIGNMENT: u64 = 0x1000;

/// How much of the final state the verifier asserts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Strictness {
    /// Pass iff the delay-slot witness was observed.
    #[default]
    WitnessOnly,
    /// Also check loop-top count, final program counter, and final counter.
    Full,
}

/// Every knob of a delay-slot scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ScenarioConfig {
    /// Architecture the engine is opened for.
    pub arch: Arch,
    /// Mode the engine is opened with.
    pub mode: Mode,
    /// Base address of the mapped region.
    pub map_base: u64,
    /// Size of the mapped region in bytes.
    pub map_size: u64,
    /// Permissions of the mapped region.
    pub map_perms: Permissions,
    /// Address filter of the observer hook.
    pub hook_range: HookRange,
    /// Wall-clock bound in microseconds; zero is unbounded.
    pub timeout_us: u64,
    /// Instruction bound; zero is unbounded.
    pub max_instructions: u64,
    /// Register holding the loop counter.
    pub counter: Register,
    /// Assertion depth.
    pub strictness: Strictness,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            arch: Arch::Mips,
            mode: Mode::MIPS32_LE,
            map_base: REFERENCE_BASE,
            map_size: REFERENCE_MAP_SIZE,
            map_perms: Permissions::ALL,
            hook_range: HookRange::from_bounds(1, 0),
            timeout_us: 0,
            max_instructions: 0,
            counter: Register::A0,
            strictness: Strictness::WitnessOnly,
        }
    }
}

impl ScenarioConfig {
    /// Default configuration with the mapping widened to whole pages around
    /// `image`.
    #[must_use]
    pub fn for_image(image: &ProgramImage) -> Self {
        let base = image.base() - image.base() % MAP_ALIGNMENT;
        let end = image.exit().div_ceil(MAP_ALIGNMENT) * MAP_ALIGNMENT;
        Self::default().with_mapping(base, end - base, Permissions::ALL)
    }

    /// Returns a copy with a different assertion depth.
    #[must_use]
    pub const fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    /// Returns a copy with a different hook filter.
    #[must_use]
    pub const fn with_hook_range(mut self, hook_range: HookRange) -> Self {
        self.hook_range = hook_range;
        self
    }

    /// Returns a copy mapping `size` bytes at `base`.
    #[must_use]
    pub const fn with_mapping(mut self, base: u64, size: u64, perms: Permissions) -> Self {
        self.map_base = base;
        self.map_size = size;
        self.map_perms = perms;
        self
    }

    /// Returns a copy with execution bounds.
    #[must_use]
    pub const fn with_limits(mut self, timeout_us: u64, max_instructions: u64) -> Self {
        self.timeout_us = timeout_us;
        self.max_instructions = max_instructions;
        self
    }
}
