//! End-to-end delay-slot scenarios against the reference engine and
//! instrumented wrappers around it.

use std::cell::Cell;

use delay_slot_harness::report::exit_code;
use delay_slot_harness::{
    ExecutionObserver, FailureKind, HarnessError, ProgramImage, Scenario, ScenarioConfig,
    ScenarioPhase, Strictness, Verdict, VerificationFailure, REFERENCE_BASE,
};
#[cfg(feature = "unicorn")]
use engine_core::UnicornEngineFamily;
use engine_core::{
    Arch, CodeHook, Engine, EngineError, EngineFamily, HookHandle, HookRange, MipsEngine,
    MipsEngineFamily, Mode, Permissions, Register,
};
use proptest::prelude::*;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;
use tracing_subscriber as _;

thread_local! {
    static RELEASES: Cell<u32> = const { Cell::new(0) };
}

/// Reference engine that counts how many times it is dropped.
struct Counted<'h>(MipsEngine<'h>);

impl Drop for Counted<'_> {
    fn drop(&mut self) {
        RELEASES.with(|releases| releases.set(releases.get() + 1));
    }
}

/// Reference engine whose hooks never see the delay-slot witness.
struct Withholding<'h>(MipsEngine<'h>);

struct SkipWitness<'h> {
    inner: Box<dyn CodeHook + 'h>,
}

impl CodeHook for SkipWitness<'_> {
    fn on_code(&mut self, address: u64, size: u32) {
        if address != REFERENCE_BASE + 0xC {
            self.inner.on_code(address, size);
        }
    }
}

macro_rules! forward_engine {
    ($wrapper:ident, |$inner:ident| $hook:expr) => {
        impl<'h> Engine<'h> for $wrapper<'h> {
            fn open(arch: Arch, mode: Mode) -> Result<Self, EngineError> {
                MipsEngine::open(arch, mode).map(Self)
            }

            fn mem_map(
                &mut self,
                base: u64,
                size: u64,
                perms: Permissions,
            ) -> Result<(), EngineError> {
                self.0.mem_map(base, size, perms)
            }

            fn mem_write(&mut self, address: u64, bytes: &[u8]) -> Result<(), EngineError> {
                self.0.mem_write(address, bytes)
            }

            fn mem_read(&self, address: u64, buf: &mut [u8]) -> Result<(), EngineError> {
                self.0.mem_read(address, buf)
            }

            fn add_code_hook(
                &mut self,
                range: HookRange,
                $inner: Box<dyn CodeHook + 'h>,
            ) -> Result<HookHandle, EngineError> {
                self.0.add_code_hook(range, $hook)
            }

            fn remove_hook(&mut self, handle: HookHandle) -> Result<(), EngineError> {
                self.0.remove_hook(handle)
            }

            fn emu_start(
                &mut self,
                begin: u64,
                until: u64,
                timeout_us: u64,
                count: u64,
            ) -> Result<(), EngineError> {
                self.0.emu_start(begin, until, timeout_us, count)
            }

            fn reg_read(&self, reg: Register) -> Result<u64, EngineError> {
                self.0.reg_read(reg)
            }

            fn reg_write(&mut self, reg: Register, value: u64) -> Result<(), EngineError> {
                self.0.reg_write(reg, value)
            }
        }
    };
}

forward_engine!(Counted, |hook| hook);
forward_engine!(Withholding, |hook| Box::new(SkipWitness { inner: hook }));

struct CountedFamily;

impl EngineFamily for CountedFamily {
    type Engine<'h> = Counted<'h>;
}

struct WithholdingFamily;

impl EngineFamily for WithholdingFamily {
    type Engine<'h> = Withholding<'h>;
}

fn releases() -> u32 {
    RELEASES.with(Cell::get)
}

#[test]
fn reference_scenario_observes_delay_slot() {
    let mut scenario = Scenario::reference();
    let outcome = scenario.run::<MipsEngineFamily>();

    assert_eq!(outcome.verdict, Verdict::Pass);
    assert_eq!(exit_code(&outcome.verdict), 0);
    assert_eq!(outcome.state.iterations, 3);
    assert!(outcome.state.terminal_observed);
    assert_eq!(outcome.trace(), scenario.image().expected_trace());
    assert!(outcome.observations.iter().all(|seen| seen.size == 4));
    let registers = outcome.registers.expect("clean run reads registers");
    assert_eq!(registers.pc, 0x10_0010);
    assert_eq!(registers.counter, 0xFFFF_FFFF);
}

#[test]
fn repeated_runs_are_identical() {
    let first = Scenario::reference().run::<MipsEngineFamily>();
    let second = Scenario::reference().run::<MipsEngineFamily>();
    assert_eq!(first, second);

    let mut scenario = Scenario::reference();
    let again = scenario.run::<MipsEngineFamily>();
    let and_again = scenario.run::<MipsEngineFamily>();
    assert_eq!(again, and_again);
}

#[test]
fn all_range_hook_leaves_no_instruction_unobserved() {
    let image = ProgramImage::reference();
    let mut scenario = Scenario::new(image.clone(), ScenarioConfig::default());
    let mut observer = ExecutionObserver::for_image(&image);
    let executed = scenario.execute::<MipsEngine<'_>>(&mut observer);

    assert!(executed.is_ok());
    assert!(observer.unobserved(&image).is_empty());
    let outcome = scenario.conclude(executed, observer);
    assert!(outcome.verdict.is_pass());
}

#[rstest]
#[case::whole_image(HookRange::Bounded { begin: 0x10_0000, end: 0x10_000F }, 10)]
#[case::slot_only(HookRange::Bounded { begin: 0x10_000C, end: 0x10_000C }, 3)]
#[case::loop_top_only(HookRange::Bounded { begin: 0x10_0004, end: 0x10_0007 }, 3)]
fn bounded_hook_range_filters_observations(#[case] range: HookRange, #[case] calls: usize) {
    let mut scenario = Scenario::new(
        ProgramImage::reference(),
        ScenarioConfig::default().with_hook_range(range),
    );
    let outcome = scenario.run::<MipsEngineFamily>();
    assert_eq!(outcome.observations.len(), calls);
    assert_eq!(
        outcome.state.terminal_observed,
        range.contains(REFERENCE_BASE + 0xC)
    );
}

#[test]
fn undersized_mapping_fails_write_and_releases_once() {
    let before = releases();
    let mut scenario = Scenario::new(
        ProgramImage::reference(),
        ScenarioConfig::default().with_mapping(REFERENCE_BASE, 8, Permissions::ALL),
    );
    let outcome = scenario.run::<CountedFamily>();

    assert_eq!(
        outcome.verdict,
        Verdict::Fail(HarnessError::Write(EngineError::WriteUnmapped))
    );
    assert_eq!(exit_code(&outcome.verdict), EngineError::WriteUnmapped.code());
    assert!(outcome.observations.is_empty());
    assert_eq!(outcome.registers, None);
    assert_eq!(releases() - before, 1);
    assert_eq!(scenario.phase(), ScenarioPhase::Concluded { passed: false });
}

#[test]
fn passing_scenario_also_releases_once() {
    let before = releases();
    let outcome = Scenario::reference().run::<CountedFamily>();
    assert!(outcome.verdict.is_pass());
    assert_eq!(releases() - before, 1);
}

#[rstest]
#[case::unsupported_arch(
    ScenarioConfig { arch: Arch::X86, ..ScenarioConfig::default() },
    FailureKind::EngineInit,
    EngineError::Arch
)]
#[case::unaligned_map(
    ScenarioConfig::default().with_mapping(REFERENCE_BASE + 2, 0x1000, Permissions::ALL),
    FailureKind::MemoryMap,
    EngineError::Arg
)]
#[case::read_only_image(
    ScenarioConfig::default().with_mapping(REFERENCE_BASE, 0x1000, Permissions::READ),
    FailureKind::Write,
    EngineError::WriteProt
)]
#[case::non_executable_image(
    ScenarioConfig::default().with_mapping(
        REFERENCE_BASE,
        0x1000,
        Permissions::READ | Permissions::WRITE,
    ),
    FailureKind::ExecutionFault,
    EngineError::FetchProt
)]
#[case::instruction_bound(
    ScenarioConfig::default().with_limits(0, 5),
    FailureKind::ExecutionFault,
    EngineError::InstructionLimit
)]
fn engine_failures_conclude_with_engine_error(
    #[case] config: ScenarioConfig,
    #[case] kind: FailureKind,
    #[case] cause: EngineError,
) {
    let mut scenario = Scenario::new(ProgramImage::reference(), config);
    let outcome = scenario.run::<MipsEngineFamily>();
    assert_eq!(outcome.verdict.failure_kind(), Some(kind));
    let error = outcome.verdict.error().expect("scenario fails");
    assert_eq!(error.engine_error(), Some(cause));
    assert_eq!(exit_code(&outcome.verdict), cause.code());
}

#[test]
fn missing_delay_slot_hook_is_a_verification_failure() {
    let mut scenario = Scenario::reference();
    let outcome = scenario.run::<WithholdingFamily>();

    assert_eq!(
        outcome.verdict,
        Verdict::Fail(HarnessError::Verification(
            VerificationFailure::WitnessNotObserved { witness: 0x10_000C }
        ))
    );
    assert_eq!(exit_code(&outcome.verdict), 64);
    assert_eq!(outcome.state.iterations, 3);
    assert_eq!(outcome.observations.len(), 7);
    let registers = outcome.registers.expect("run itself completed");
    assert_eq!(registers.counter, 0xFFFF_FFFF);
}

#[test]
fn strict_scenario_passes_on_reference_engine() {
    let mut scenario = Scenario::new(
        ProgramImage::reference(),
        ScenarioConfig::default().with_strictness(Strictness::Full),
    );
    let outcome = scenario.run::<MipsEngineFamily>();
    assert_eq!(outcome.verdict, Verdict::Pass);
}

#[test]
fn strict_scenario_catches_short_hook_range() {
    let mut scenario = Scenario::new(
        ProgramImage::reference(),
        ScenarioConfig::default()
            .with_strictness(Strictness::Full)
            .with_hook_range(HookRange::Bounded {
                begin: 0x10_0008,
                end: 0x10_000F,
            }),
    );
    let outcome = scenario.run::<MipsEngineFamily>();
    assert_eq!(
        outcome.verdict,
        Verdict::Fail(HarnessError::Verification(
            VerificationFailure::IterationCount {
                expected: 3,
                observed: 0,
            }
        ))
    );
}

#[test]
fn relocated_image_runs_under_derived_mapping() {
    let image = ProgramImage::delay_slot_loop(0x2000, 2).expect("fits");
    let mut scenario = Scenario::for_image(image.clone());
    let outcome = scenario.run::<MipsEngineFamily>();

    assert_eq!(outcome.verdict, Verdict::Pass);
    assert_eq!(outcome.trace(), image.expected_trace());
    assert_eq!(outcome.registers.map(|registers| registers.pc), Some(0x2010));
}

#[test]
fn reference_mapping_does_not_cover_relocated_image() {
    let image = ProgramImage::delay_slot_loop(0x2000, 2).expect("fits");
    let outcome = Scenario::new(image, ScenarioConfig::default()).run::<MipsEngineFamily>();
    assert_eq!(
        outcome.verdict,
        Verdict::Fail(HarnessError::Write(EngineError::WriteUnmapped))
    );
}

#[cfg(feature = "unicorn")]
#[test]
fn reference_scenario_passes_on_unicorn() {
    let mut scenario = Scenario::new(
        ProgramImage::reference(),
        ScenarioConfig::default().with_strictness(Strictness::Full),
    );
    let outcome = scenario.run::<UnicornEngineFamily>();

    assert_eq!(outcome.verdict, Verdict::Pass);
    assert_eq!(outcome.trace(), scenario.image().expected_trace());
}

#[cfg(feature = "unicorn")]
#[test]
fn undersized_mapping_is_rejected_by_unicorn() {
    let outcome = Scenario::new(
        ProgramImage::reference(),
        ScenarioConfig::default().with_mapping(REFERENCE_BASE, 8, Permissions::ALL),
    )
    .run::<UnicornEngineFamily>();
    assert_eq!(outcome.verdict.failure_kind(), Some(FailureKind::MemoryMap));
}

proptest! {
    #[test]
    fn delay_slot_runs_on_every_pass(loop_count in 0u16..64) {
        let image = ProgramImage::delay_slot_loop(REFERENCE_BASE, loop_count)
            .expect("small loop counts fit");
        let mut scenario = Scenario::new(
            image.clone(),
            ScenarioConfig::default().with_strictness(Strictness::Full),
        );
        let outcome = scenario.run::<MipsEngineFamily>();

        prop_assert_eq!(&outcome.verdict, &Verdict::Pass);
        prop_assert_eq!(outcome.state.iterations, u32::from(loop_count) + 1);
        let slot_hits = outcome
            .observations
            .iter()
            .filter(|seen| seen.address == image.witness())
            .count();
        prop_assert_eq!(slot_hits, usize::from(loop_count) + 1);
        prop_assert_eq!(outcome.trace(), image.expected_trace());
    }

    #[test]
    fn delay_slot_is_observed_at_any_base(
        page in 0u64..0xF_FFFF,
        offset in 0u64..0x400,
        loop_count in 0u16..8,
    ) {
        let image = ProgramImage::delay_slot_loop(page * 0x1000 + offset * 4, loop_count)
            .expect("word-aligned base below the top page fits");
        let mut scenario = Scenario::for_image(image.clone());
        let outcome = scenario.run::<MipsEngineFamily>();

        prop_assert!(outcome.verdict.is_pass());
        prop_assert!(outcome.state.terminal_observed);
        prop_assert_eq!(outcome.registers.map(|registers| registers.pc), Some(image.exit()));
    }
}
