//! Instruction decoder for the MIPS32 integer subset.
//!
//! Decoding is split from execution so a fetch that does not name a supported
//! instruction faults before any hook or side effect runs.

use crate::encoding::{classify_opcode, decode_word_op_sel, OpcodeEncoding};
use crate::EngineError;

/// Decoded instruction with every field extracted.
///
/// Fields that a given encoding does not use still hold the raw bits, which
/// is what the disassembler and the executor expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedInstruction {
    /// Raw 32-bit instruction word.
    pub raw: u32,
    /// Resolved encoding.
    pub encoding: OpcodeEncoding,
    /// `RS` field (bits 25..21).
    pub rs: u8,
    /// `RT` field (bits 20..16).
    pub rt: u8,
    /// `RD` field (bits 15..11).
    pub rd: u8,
    /// `SHAMT` field (bits 10..6).
    pub shamt: u8,
    /// 16-bit immediate (bits 15..0).
    pub imm: u16,
    /// 26-bit jump target index (bits 25..0).
    pub target: u32,
}

impl DecodedInstruction {
    /// Immediate sign-extended to 32 bits.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn simm(self) -> i32 {
        self.imm as i16 as i32
    }

    /// Immediate zero-extended to 32 bits.
    #[must_use]
    pub const fn uimm(self) -> u32 {
        self.imm as u32
    }

    /// Target of a PC-relative branch at `pc`.
    ///
    /// The offset is relative to the delay-slot address (`pc + 4`).
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn branch_target(self, pc: u32) -> u32 {
        pc.wrapping_add(4)
            .wrapping_add((self.simm() << 2) as u32)
    }

    /// Target of a `J`/`JAL` at `pc`, inside the 256 MiB segment of the delay slot.
    #[must_use]
    pub const fn jump_target(self, pc: u32) -> u32 {
        (pc.wrapping_add(4) & 0xF000_0000) | (self.target << 2)
    }
}

/// Instruction decoder.
#[derive(Debug, Clone, Copy)]
pub struct Decoder;

impl Decoder {
    /// Decodes a 32-bit instruction word.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InsnInvalid`] when the word does not name a
    /// supported encoding.
    #[allow(clippy::cast_possible_truncation)]
    pub fn decode(word: u32) -> Result<DecodedInstruction, EngineError> {
        let (op, sel) = decode_word_op_sel(word);
        let encoding = classify_opcode(op, sel).ok_or(EngineError::InsnInvalid)?;

        Ok(DecodedInstruction {
            raw: word,
            encoding,
            rs: ((word >> 21) & 0x1F) as u8,
            rt: ((word >> 16) & 0x1F) as u8,
            rd: ((word >> 11) & 0x1F) as u8,
            shamt: ((word >> 6) & 0x1F) as u8,
            imm: (word & 0xFFFF) as u16,
            target: word & 0x03FF_FFFF,
        })
    }
}
