/// Number of architecturally visible general-purpose registers (`$0..$31`).
pub const GENERAL_REGISTER_COUNT: usize = 32;

/// Register identifiers readable and writable through the engine contract.
///
/// General-purpose registers use their o32 ABI names; discriminants equal the
/// hardware register number for `Zero..=Ra`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Register {
    Zero = 0,
    At = 1,
    V0 = 2,
    V1 = 3,
    A0 = 4,
    A1 = 5,
    A2 = 6,
    A3 = 7,
    T0 = 8,
    T1 = 9,
    T2 = 10,
    T3 = 11,
    T4 = 12,
    T5 = 13,
    T6 = 14,
    T7 = 15,
    S0 = 16,
    S1 = 17,
    S2 = 18,
    S3 = 19,
    S4 = 20,
    S5 = 21,
    S6 = 22,
    S7 = 23,
    T8 = 24,
    T9 = 25,
    K0 = 26,
    K1 = 27,
    Gp = 28,
    Sp = 29,
    Fp = 30,
    Ra = 31,
    /// Program counter.
    Pc = 32,
    /// Multiply/divide high result.
    Hi = 33,
    /// Multiply/divide low result.
    Lo = 34,
}

impl Register {
    /// General-purpose registers in hardware numbering order.
    pub const GENERAL: [Self; GENERAL_REGISTER_COUNT] = [
        Self::Zero,
        Self::At,
        Self::V0,
        Self::V1,
        Self::A0,
        Self::A1,
        Self::A2,
        Self::A3,
        Self::T0,
        Self::T1,
        Self::T2,
        Self::T3,
        Self::T4,
        Self::T5,
        Self::T6,
        Self::T7,
        Self::S0,
        Self::S1,
        Self::S2,
        Self::S3,
        Self::S4,
        Self::S5,
        Self::S6,
        Self::S7,
        Self::T8,
        Self::T9,
        Self::K0,
        Self::K1,
        Self::Gp,
        Self::Sp,
        Self::Fp,
        Self::Ra,
    ];

    /// Decodes a 5-bit instruction register field.
    #[must_use]
    pub const fn from_u5(bits: u8) -> Option<Self> {
        if (bits as usize) < GENERAL_REGISTER_COUNT {
            Some(Self::GENERAL[bits as usize])
        } else {
            None
        }
    }

    /// Returns the hardware register number for general-purpose registers.
    #[must_use]
    pub const fn gpr_index(self) -> Option<usize> {
        match self {
            Self::Pc | Self::Hi | Self::Lo => None,
            gpr => Some(gpr as usize),
        }
    }

    /// Returns the assembler name, including the `$` sigil.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Zero => "$zero",
            Self::At => "$at",
            Self::V0 => "$v0",
            Self::V1 => "$v1",
            Self::A0 => "$a0",
            Self::A1 => "$a1",
            Self::A2 => "$a2",
            Self::A3 => "$a3",
            Self::T0 => "$t0",
            Self::T1 => "$t1",
            Self::T2 => "$t2",
            Self::T3 => "$t3",
            Self::T4 => "$t4",
            Self::T5 => "$t5",
            Self::T6 => "$t6",
            Self::T7 => "$t7",
            Self::S0 => "$s0",
            Self::S1 => "$s1",
            Self::S2 => "$s2",
            Self::S3 => "$s3",
            Self::S4 => "$s4",
            Self::S5 => "$s5",
            Self::S6 => "$s6",
            Self::S7 => "$s7",
            Self::T8 => "$t8",
            Self::T9 => "$t9",
            Self::K0 => "$k0",
            Self::K1 => "$k1",
            Self::Gp => "$gp",
            Self::Sp => "$sp",
            Self::Fp => "$fp",
            Self::Ra => "$ra",
            Self::Pc => "pc",
            Self::Hi => "hi",
            Self::Lo => "lo",
        }
    }
}

/// Full architectural register state for a MIPS32 hart.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ArchitecturalState {
    gpr: [u32; GENERAL_REGISTER_COUNT],
    pc: u32,
    hi: u32,
    lo: u32,
}

impl ArchitecturalState {
    /// Reads a general-purpose register by hardware number.
    ///
    /// Out-of-range numbers read as zero.
    #[must_use]
    pub const fn gpr(&self, index: usize) -> u32 {
        if index < GENERAL_REGISTER_COUNT {
            self.gpr[index]
        } else {
            0
        }
    }

    /// Writes a general-purpose register by hardware number.
    ///
    /// Writes to `$zero` and out-of-range numbers are discarded.
    pub const fn set_gpr(&mut self, index: usize, value: u32) {
        if index != 0 && index < GENERAL_REGISTER_COUNT {
            self.gpr[index] = value;
        }
    }

    /// Reads the program counter.
    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.pc
    }

    /// Writes the program counter.
    pub const fn set_pc(&mut self, value: u32) {
        self.pc = value;
    }

    /// Reads `HI`.
    #[must_use]
    pub const fn hi(&self) -> u32 {
        self.hi
    }

    /// Writes `HI`.
    pub const fn set_hi(&mut self, value: u32) {
        self.hi = value;
    }

    /// Reads `LO`.
    #[must_use]
    pub const fn lo(&self) -> u32 {
        self.lo
    }

    /// Writes `LO`.
    pub const fn set_lo(&mut self, value: u32) {
        self.lo = value;
    }

    /// Reads any contract-visible register.
    #[must_use]
    pub const fn read(&self, reg: Register) -> u32 {
        match reg {
            Register::Pc => self.pc,
            Register::Hi => self.hi,
            Register::Lo => self.lo,
            gpr => self.gpr[gpr as usize],
        }
    }

    /// Writes any contract-visible register.
    pub const fn write(&mut self, reg: Register, value: u32) {
        match reg {
            Register::Pc => self.pc = value,
            Register::Hi => self.hi = value,
            Register::Lo => self.lo = value,
            gpr => self.set_gpr(gpr as usize, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ArchitecturalState, Register, GENERAL_REGISTER_COUNT};

    #[test]
    fn register_count_and_decode_match_architecture() {
        assert_eq!(GENERAL_REGISTER_COUNT, 32);

        for bits in 0_u8..32 {
            let reg = Register::from_u5(bits).expect("valid 5-bit register encoding");
            assert_eq!(reg.gpr_index(), Some(usize::from(bits)));
        }

        assert!(Register::from_u5(32).is_none());
        assert_eq!(Register::Pc.gpr_index(), None);
    }

    #[test]
    fn zero_register_ignores_writes() {
        let mut state = ArchitecturalState::default();
        state.set_gpr(0, 0xDEAD_BEEF);
        state.write(Register::Zero, 0x1234);

        assert_eq!(state.gpr(0), 0);
        assert_eq!(state.read(Register::Zero), 0);
    }

    #[test]
    fn general_register_file_tracks_each_register_independently() {
        let mut state = ArchitecturalState::default();

        for (offset, reg) in (0_u32..).zip(Register::GENERAL) {
            state.write(reg, 0x1000 + offset);
        }

        assert_eq!(state.read(Register::Zero), 0);
        for (offset, reg) in (0_u32..).zip(Register::GENERAL).skip(1) {
            assert_eq!(state.read(reg), 0x1000 + offset);
        }
    }

    #[test]
    fn special_registers_are_present_and_readable() {
        let mut state = ArchitecturalState::default();
        state.write(Register::Pc, 0x0010_0000);
        state.write(Register::Hi, 0xAAAA_0000);
        state.write(Register::Lo, 0x0000_5555);

        assert_eq!(state.pc(), 0x0010_0000);
        assert_eq!(state.hi(), 0xAAAA_0000);
        assert_eq!(state.lo(), 0x0000_5555);
    }

    #[test]
    fn abi_names_follow_o32_convention() {
        assert_eq!(Register::A0.name(), "$a0");
        assert_eq!(Register::Ra.name(), "$ra");
        assert_eq!(Register::Pc.name(), "pc");
    }
}
