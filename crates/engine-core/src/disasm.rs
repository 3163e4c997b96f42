//! Instruction disassembly for the MIPS32 integer subset.
//!
//! Turns raw instruction words into assembler-style text so harness reports
//! and failing tests can show the program that ran.

use std::fmt;

use crate::decoder::{DecodedInstruction, Decoder};
use crate::encoding::OpcodeEncoding;
use crate::{Endian, Register};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single disassembled instruction row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisassemblyRow {
    /// Address of the instruction.
    pub address: u32,
    /// Raw instruction word.
    pub raw: u32,
    /// The instruction mnemonic (e.g., "addiu", "bne", "nop").
    pub mnemonic: String,
    /// The formatted operands (e.g., "$a0, $zero, 2").
    pub operands: String,
    /// Whether this word is not a supported encoding.
    pub is_illegal: bool,
}

impl fmt::Display for DisassemblyRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}:  {:08x}  {}", self.address, self.raw, self.mnemonic)?;
        if !self.operands.is_empty() {
            write!(f, " {}", self.operands)?;
        }
        Ok(())
    }
}

/// Disassembles one instruction word located at `address`.
#[must_use]
pub fn disassemble_word(address: u32, word: u32) -> DisassemblyRow {
    match Decoder::decode(word) {
        Ok(instr) => {
            let (mnemonic, operands) = render(address, instr);
            DisassemblyRow {
                address,
                raw: word,
                mnemonic: mnemonic.to_owned(),
                operands,
                is_illegal: false,
            }
        }
        Err(_) => DisassemblyRow {
            address,
            raw: word,
            mnemonic: ".word".to_owned(),
            operands: format!("{word:#010x}"),
            is_illegal: true,
        },
    }
}

/// Disassembles every whole word in `bytes`, which is loaded at `base`.
///
/// A trailing partial word is ignored.
#[must_use]
pub fn disassemble_bytes(base: u32, bytes: &[u8], endian: Endian) -> Vec<DisassemblyRow> {
    bytes
        .chunks_exact(4)
        .zip((0u32..).map(|index| base.wrapping_add(index * 4)))
        .map(|(chunk, address)| {
            let word = endian.word_from_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            disassemble_word(address, word)
        })
        .collect()
}

fn reg(bits: u8) -> &'static str {
    Register::from_u5(bits).map_or("$?", Register::name)
}

fn render(address: u32, instr: DecodedInstruction) -> (&'static str, String) {
    let (rs, rt, rd) = (reg(instr.rs), reg(instr.rt), reg(instr.rd));
    let mnemonic = instr.encoding.mnemonic();
    let operands = match instr.encoding {
        OpcodeEncoding::Sll if instr.raw == 0 => return ("nop", String::new()),
        OpcodeEncoding::Sll | OpcodeEncoding::Srl | OpcodeEncoding::Sra => {
            format!("{rd}, {rt}, {}", instr.shamt)
        }
        OpcodeEncoding::Sllv | OpcodeEncoding::Srlv | OpcodeEncoding::Srav => {
            format!("{rd}, {rt}, {rs}")
        }
        OpcodeEncoding::Jr | OpcodeEncoding::Mthi | OpcodeEncoding::Mtlo => rs.to_owned(),
        OpcodeEncoding::Jalr => format!("{rd}, {rs}"),
        OpcodeEncoding::Syscall | OpcodeEncoding::Break => String::new(),
        OpcodeEncoding::Mfhi | OpcodeEncoding::Mflo => rd.to_owned(),
        OpcodeEncoding::Mult
        | OpcodeEncoding::Multu
        | OpcodeEncoding::Div
        | OpcodeEncoding::Divu => format!("{rs}, {rt}"),
        OpcodeEncoding::Add
        | OpcodeEncoding::Addu
        | OpcodeEncoding::Sub
        | OpcodeEncoding::Subu
        | OpcodeEncoding::And
        | OpcodeEncoding::Or
        | OpcodeEncoding::Xor
        | OpcodeEncoding::Nor
        | OpcodeEncoding::Slt
        | OpcodeEncoding::Sltu => format!("{rd}, {rs}, {rt}"),
        OpcodeEncoding::Bltz
        | OpcodeEncoding::Bgez
        | OpcodeEncoding::Bltzal
        | OpcodeEncoding::Bgezal
        | OpcodeEncoding::Blez
        | OpcodeEncoding::Bgtz => format!("{rs}, {:#x}", instr.branch_target(address)),
        OpcodeEncoding::J | OpcodeEncoding::Jal => format!("{:#x}", instr.jump_target(address)),
        OpcodeEncoding::Beq | OpcodeEncoding::Bne => {
            format!("{rs}, {rt}, {:#x}", instr.branch_target(address))
        }
        OpcodeEncoding::Addi
        | OpcodeEncoding::Addiu
        | OpcodeEncoding::Slti
        | OpcodeEncoding::Sltiu => format!("{rt}, {rs}, {}", instr.simm()),
        OpcodeEncoding::Andi | OpcodeEncoding::Ori | OpcodeEncoding::Xori => {
            format!("{rt}, {rs}, {:#x}", instr.uimm())
        }
        OpcodeEncoding::Lui => format!("{rt}, {:#x}", instr.uimm()),
        OpcodeEncoding::Lb
        | OpcodeEncoding::Lh
        | OpcodeEncoding::Lw
        | OpcodeEncoding::Lbu
        | OpcodeEncoding::Lhu
        | OpcodeEncoding::Sb
        | OpcodeEncoding::Sh
        | OpcodeEncoding::Sw => format!("{rt}, {}({rs})", instr.simm()),
    };
    (mnemonic, operands)
}
