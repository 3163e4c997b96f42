//! Human-readable scenario reports.

use std::fmt::Write as _;

use engine_core::disassemble_word;

use crate::image::ProgramImage;
use crate::verifier::{Outcome, Verdict};

/// Process exit status for `verdict`: zero on pass, the engine error code
/// for engine faults, and the reserved verification code otherwise.
#[must_use]
pub const fn exit_code(verdict: &Verdict) -> u8 {
    match verdict {
        Verdict::Pass => 0,
        Verdict::Fail(error) => error.exit_code(),
    }
}

/// Renders `outcome` as a short report.
///
/// With `verbose`, every hook invocation is listed with its disassembly.
#[must_use]
pub fn render(outcome: &Outcome, image: &ProgramImage, verbose: bool) -> String {
    let mut out = String::new();
    match &outcome.verdict {
        Verdict::Pass => {
            let _ = writeln!(
                out,
                "PASS: code hook fired for delay-slot instruction at {:#x}",
                image.witness()
            );
        }
        Verdict::Fail(error) => {
            let _ = writeln!(out, "FAIL [{}]: {error}", error.kind().label());
        }
    }
    let _ = writeln!(
        out,
        "loop top {:#x} observed {} time(s), {} hook call(s)",
        image.loop_top(),
        outcome.state.iterations,
        outcome.observations.len()
    );
    if let Some(registers) = outcome.registers {
        let _ = writeln!(
            out,
            "final pc {:#x}, counter {:#x}",
            registers.pc, registers.counter
        );
    }

    if verbose {
        let _ = writeln!(out, "trace:");
        for observation in &outcome.observations {
            match word_at(image, observation.address) {
                Some((address, word)) => {
                    let _ = writeln!(out, "  {}", disassemble_word(address, word));
                }
                None => {
                    let _ = writeln!(out, "  {:#010x}:  <outside image>", observation.address);
                }
            }
        }
    }
    out
}

fn word_at(image: &ProgramImage, address: u64) -> Option<(u32, u32)> {
    let offset = usize::try_from(address.checked_sub(image.base())?).ok()?;
    let bytes = image.bytes().get(offset..offset.checked_add(4)?)?;
    let word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    Some((u32::try_from(address).ok()?, word))
}
