//! Instruction execution for the MIPS32 integer subset.
//!
//! [`execute_instruction`] applies one decoded instruction to architectural
//! state. It never advances the program counter itself: the engine owns
//! sequencing, including the delay slot that follows every branch and jump.
//!
//! Faults are precise. Operands are read and every fallible step (trapping
//! arithmetic, memory access) completes before the destination is written.

#![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]

mod helpers;

pub use helpers::{
    access_width, add_trapping, divide_signed, divide_unsigned, multiply_signed,
    multiply_unsigned, shift_right_arithmetic, sign_extend_16, sign_extend_8,
    sign_extend_halfword, sub_trapping,
};

use crate::decoder::DecodedInstruction;
use crate::encoding::OpcodeEncoding;
use crate::state::Register;
use crate::{ArchitecturalState, EngineError};

/// Data-memory port used by loads and stores.
pub trait DataBus {
    /// Loads `width` bytes at `address`, returned zero-extended.
    ///
    /// # Errors
    ///
    /// Returns the read fault raised by the memory system.
    fn load(&mut self, address: u32, width: u8) -> Result<u32, EngineError>;

    /// Stores the low `width` bytes of `value` at `address`.
    ///
    /// # Errors
    ///
    /// Returns the write fault raised by the memory system.
    fn store(&mut self, address: u32, width: u8, value: u32) -> Result<(), EngineError>;
}

/// Outcome of executing a single instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// Ordinary instruction; execution continues at the next word.
    Retired,
    /// Branch or jump; the next word is a delay slot, after which execution
    /// continues at `target`.
    Transfer {
        /// Address executed after the delay slot.
        target: u32,
        /// Whether the transfer condition held.
        taken: bool,
    },
}

/// Executes `instr`, located at `state.pc()`, against `state` and `bus`.
///
/// # Errors
///
/// Returns [`EngineError::Exception`] for `SYSCALL`, `BREAK`, and signed
/// overflow, or the fault reported by `bus` for a failed load or store.
/// `state` is unchanged on error.
pub fn execute_instruction<B: DataBus + ?Sized>(
    state: &mut ArchitecturalState,
    bus: &mut B,
    instr: DecodedInstruction,
) -> Result<ExecuteOutcome, EngineError> {
    let pc = state.pc();
    let rs = state.gpr(usize::from(instr.rs));
    let rt = state.gpr(usize::from(instr.rt));
    let rd = usize::from(instr.rd);
    let rt_index = usize::from(instr.rt);
    let shamt = u32::from(instr.shamt);
    let link = pc.wrapping_add(8);
    let fallthrough = pc.wrapping_add(8);

    let branch = |taken: bool| ExecuteOutcome::Transfer {
        target: if taken {
            instr.branch_target(pc)
        } else {
            fallthrough
        },
        taken,
    };

    match instr.encoding {
        OpcodeEncoding::Sll => state.set_gpr(rd, rt << shamt),
        OpcodeEncoding::Srl => state.set_gpr(rd, rt >> shamt),
        OpcodeEncoding::Sra => state.set_gpr(rd, shift_right_arithmetic(rt, shamt)),
        OpcodeEncoding::Sllv => state.set_gpr(rd, rt << (rs & 0x1F)),
        OpcodeEncoding::Srlv => state.set_gpr(rd, rt >> (rs & 0x1F)),
        OpcodeEncoding::Srav => state.set_gpr(rd, shift_right_arithmetic(rt, rs)),
        OpcodeEncoding::Jr => {
            return Ok(ExecuteOutcome::Transfer {
                target: rs,
                taken: true,
            })
        }
        OpcodeEncoding::Jalr => {
            state.set_gpr(rd, link);
            return Ok(ExecuteOutcome::Transfer {
                target: rs,
                taken: true,
            });
        }
        OpcodeEncoding::Syscall | OpcodeEncoding::Break => return Err(EngineError::Exception),
        OpcodeEncoding::Mfhi => state.set_gpr(rd, state.hi()),
        OpcodeEncoding::Mthi => state.set_hi(rs),
        OpcodeEncoding::Mflo => state.set_gpr(rd, state.lo()),
        OpcodeEncoding::Mtlo => state.set_lo(rs),
        OpcodeEncoding::Mult => set_hi_lo(state, multiply_signed(rs, rt)),
        OpcodeEncoding::Multu => set_hi_lo(state, multiply_unsigned(rs, rt)),
        OpcodeEncoding::Div => {
            if let Some(result) = divide_signed(rs, rt) {
                set_hi_lo(state, result);
            }
        }
        OpcodeEncoding::Divu => {
            if let Some(result) = divide_unsigned(rs, rt) {
                set_hi_lo(state, result);
            }
        }
        OpcodeEncoding::Add => state.set_gpr(rd, add_trapping(rs, rt)?),
        OpcodeEncoding::Addu => state.set_gpr(rd, rs.wrapping_add(rt)),
        OpcodeEncoding::Sub => state.set_gpr(rd, sub_trapping(rs, rt)?),
        OpcodeEncoding::Subu => state.set_gpr(rd, rs.wrapping_sub(rt)),
        OpcodeEncoding::And => state.set_gpr(rd, rs & rt),
        OpcodeEncoding::Or => state.set_gpr(rd, rs | rt),
        OpcodeEncoding::Xor => state.set_gpr(rd, rs ^ rt),
        OpcodeEncoding::Nor => state.set_gpr(rd, !(rs | rt)),
        OpcodeEncoding::Slt => state.set_gpr(rd, u32::from((rs as i32) < (rt as i32))),
        OpcodeEncoding::Sltu => state.set_gpr(rd, u32::from(rs < rt)),
        OpcodeEncoding::Bltz => return Ok(branch((rs as i32) < 0)),
        OpcodeEncoding::Bgez => return Ok(branch((rs as i32) >= 0)),
        OpcodeEncoding::Bltzal => {
            state.write(Register::Ra, link);
            return Ok(branch((rs as i32) < 0));
        }
        OpcodeEncoding::Bgezal => {
            state.write(Register::Ra, link);
            return Ok(branch((rs as i32) >= 0));
        }
        OpcodeEncoding::J => {
            return Ok(ExecuteOutcome::Transfer {
                target: instr.jump_target(pc),
                taken: true,
            })
        }
        OpcodeEncoding::Jal => {
            state.write(Register::Ra, link);
            return Ok(ExecuteOutcome::Transfer {
                target: instr.jump_target(pc),
                taken: true,
            });
        }
        OpcodeEncoding::Beq => return Ok(branch(rs == rt)),
        OpcodeEncoding::Bne => return Ok(branch(rs != rt)),
        OpcodeEncoding::Blez => return Ok(branch((rs as i32) <= 0)),
        OpcodeEncoding::Bgtz => return Ok(branch((rs as i32) > 0)),
        OpcodeEncoding::Addi => state.set_gpr(rt_index, add_trapping(rs, instr.simm() as u32)?),
        OpcodeEncoding::Addiu => state.set_gpr(rt_index, rs.wrapping_add(instr.simm() as u32)),
        OpcodeEncoding::Slti => state.set_gpr(rt_index, u32::from((rs as i32) < instr.simm())),
        OpcodeEncoding::Sltiu => {
            state.set_gpr(rt_index, u32::from(rs < sign_extend_16(instr.imm)));
        }
        OpcodeEncoding::Andi => state.set_gpr(rt_index, rs & instr.uimm()),
        OpcodeEncoding::Ori => state.set_gpr(rt_index, rs | instr.uimm()),
        OpcodeEncoding::Xori => state.set_gpr(rt_index, rs ^ instr.uimm()),
        OpcodeEncoding::Lui => state.set_gpr(rt_index, instr.uimm() << 16),
        OpcodeEncoding::Lb
        | OpcodeEncoding::Lh
        | OpcodeEncoding::Lw
        | OpcodeEncoding::Lbu
        | OpcodeEncoding::Lhu => {
            let address = rs.wrapping_add(instr.simm() as u32);
            let width = access_width(instr.encoding).ok_or(EngineError::InsnInvalid)?;
            let raw = bus.load(address, width)?;
            let value = match instr.encoding {
                OpcodeEncoding::Lb => sign_extend_8(raw),
                OpcodeEncoding::Lh => sign_extend_halfword(raw),
                _ => raw,
            };
            state.set_gpr(rt_index, value);
        }
        OpcodeEncoding::Sb | OpcodeEncoding::Sh | OpcodeEncoding::Sw => {
            let address = rs.wrapping_add(instr.simm() as u32);
            let width = access_width(instr.encoding).ok_or(EngineError::InsnInvalid)?;
            bus.store(address, width, rt)?;
        }
    }

    Ok(ExecuteOutcome::Retired)
}

fn set_hi_lo(state: &mut ArchitecturalState, (hi, lo): (u32, u32)) {
    state.set_hi(hi);
    state.set_lo(lo);
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{execute_instruction, DataBus, ExecuteOutcome};
    use crate::{ArchitecturalState, Decoder, EngineError, Register};

    /// Byte-addressed little-endian test bus; unmapped addresses fault.
    #[derive(Default)]
    struct TestBus {
        bytes: BTreeMap<u32, u8>,
    }

    impl DataBus for TestBus {
        fn load(&mut self, address: u32, width: u8) -> Result<u32, EngineError> {
            let mut value = 0;
            for offset in 0..u32::from(width) {
                let byte = self
                    .bytes
                    .get(&(address + offset))
                    .ok_or(EngineError::ReadUnmapped)?;
                value |= u32::from(*byte) << (8 * offset);
            }
            Ok(value)
        }

        fn store(&mut self, address: u32, width: u8, value: u32) -> Result<(), EngineError> {
            for offset in 0..u32::from(width) {
                self.bytes
                    .insert(address + offset, (value >> (8 * offset)) as u8);
            }
            Ok(())
        }
    }

    fn run(state: &mut ArchitecturalState, word: u32) -> Result<ExecuteOutcome, EngineError> {
        let instr = Decoder::decode(word).expect("test word decodes");
        execute_instruction(state, &mut TestBus::default(), instr)
    }

    #[test]
    fn li_and_decrement_update_a0() {
        let mut state = ArchitecturalState::default();
        assert_eq!(run(&mut state, 0x2404_0002), Ok(ExecuteOutcome::Retired));
        assert_eq!(state.read(Register::A0), 2);
        assert_eq!(run(&mut state, 0x2484_FFFF), Ok(ExecuteOutcome::Retired));
        assert_eq!(state.read(Register::A0), 1);
    }

    #[test]
    fn bnez_reports_target_or_fallthrough() {
        let mut state = ArchitecturalState::default();
        state.set_pc(0x10_0008);
        state.write(Register::A0, 1);
        assert_eq!(
            run(&mut state, 0x1480_FFFE),
            Ok(ExecuteOutcome::Transfer {
                target: 0x10_0004,
                taken: true
            })
        );

        state.write(Register::A0, 0);
        assert_eq!(
            run(&mut state, 0x1480_FFFE),
            Ok(ExecuteOutcome::Transfer {
                target: 0x10_0010,
                taken: false
            })
        );
    }

    #[test]
    fn jal_links_past_the_delay_slot() {
        let mut state = ArchitecturalState::default();
        state.set_pc(0x10_0000);
        assert_eq!(
            run(&mut state, 0x0C04_0010),
            Ok(ExecuteOutcome::Transfer {
                target: 0x10_0040,
                taken: true
            })
        );
        assert_eq!(state.read(Register::Ra), 0x10_0008);
    }

    #[test]
    fn zero_register_is_hardwired() {
        let mut state = ArchitecturalState::default();
        // addiu $zero, $zero, 5
        run(&mut state, 0x2400_0005).expect("addiu executes");
        assert_eq!(state.read(Register::Zero), 0);
    }

    #[test]
    fn overflow_traps_without_writing_destination() {
        let mut state = ArchitecturalState::default();
        state.write(Register::A0, 0x7FFF_FFFF);
        // addi $a1, $a0, 1
        assert_eq!(run(&mut state, 0x2085_0001), Err(EngineError::Exception));
        assert_eq!(state.read(Register::A1), 0);
    }

    #[test]
    fn syscall_and_break_raise_exception() {
        let mut state = ArchitecturalState::default();
        assert_eq!(run(&mut state, 0x0000_000C), Err(EngineError::Exception));
        assert_eq!(run(&mut state, 0x0000_000D), Err(EngineError::Exception));
    }

    #[test]
    fn division_by_zero_keeps_hi_lo() {
        let mut state = ArchitecturalState::default();
        state.set_hi(0x11);
        state.set_lo(0x22);
        state.write(Register::A0, 9);
        // div $a0, $zero
        run(&mut state, 0x0080_001A).expect("div executes");
        assert_eq!((state.hi(), state.lo()), (0x11, 0x22));
    }

    #[test]
    fn store_then_signed_load_roundtrips_through_bus() {
        let mut state = ArchitecturalState::default();
        let mut bus = TestBus::default();
        state.write(Register::Sp, 0x2000);
        state.write(Register::A0, 0x0000_00F0);

        // sb $a0, 0($sp)
        let sb = Decoder::decode(0xA3A4_0000).expect("sb decodes");
        execute_instruction(&mut state, &mut bus, sb).expect("store succeeds");
        // lb $a1, 0($sp)
        let lb = Decoder::decode(0x83A5_0000).expect("lb decodes");
        execute_instruction(&mut state, &mut bus, lb).expect("load succeeds");
        assert_eq!(state.read(Register::A1), 0xFFFF_FFF0);
    }

    #[test]
    fn failed_load_leaves_destination_unchanged() {
        let mut state = ArchitecturalState::default();
        state.write(Register::A1, 0x55);
        // lw $a1, 16($sp)
        assert_eq!(run(&mut state, 0x8FA5_0010), Err(EngineError::ReadUnmapped));
        assert_eq!(state.read(Register::A1), 0x55);
    }
}
