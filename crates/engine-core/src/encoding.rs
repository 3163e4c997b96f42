/// Primary opcode classes (`OP` field, bits 31..26).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum OpcodeClass {
    /// Register-register operations selected by `FUNCT`.
    Special,
    /// Register-immediate branches selected by `RT`.
    RegImm,
    Jump,
    Branch,
    Immediate,
    Load,
    Store,
}

impl OpcodeClass {
    /// Classifies a 6-bit primary opcode.
    #[must_use]
    pub const fn from_u6(op: u8) -> Option<Self> {
        match op {
            OP_SPECIAL => Some(Self::Special),
            OP_REGIMM => Some(Self::RegImm),
            OP_J | OP_JAL => Some(Self::Jump),
            OP_BEQ..=OP_BGTZ => Some(Self::Branch),
            OP_ADDI..=OP_LUI => Some(Self::Immediate),
            OP_LB | OP_LH | OP_LW | OP_LBU | OP_LHU => Some(Self::Load),
            OP_SB | OP_SH | OP_SW => Some(Self::Store),
            _ => None,
        }
    }
}

/// `SPECIAL` primary opcode.
pub const OP_SPECIAL: u8 = 0x00;
/// `REGIMM` primary opcode.
pub const OP_REGIMM: u8 = 0x01;
/// `J` primary opcode.
pub const OP_J: u8 = 0x02;
/// `JAL` primary opcode.
pub const OP_JAL: u8 = 0x03;
/// `BEQ` primary opcode.
pub const OP_BEQ: u8 = 0x04;
/// `BNE` primary opcode.
pub const OP_BNE: u8 = 0x05;
/// `BLEZ` primary opcode.
pub const OP_BLEZ: u8 = 0x06;
/// `BGTZ` primary opcode.
pub const OP_BGTZ: u8 = 0x07;
/// `ADDI` primary opcode.
pub const OP_ADDI: u8 = 0x08;
/// `ADDIU` primary opcode.
pub const OP_ADDIU: u8 = 0x09;
/// `SLTI` primary opcode.
pub const OP_SLTI: u8 = 0x0A;
/// `SLTIU` primary opcode.
pub const OP_SLTIU: u8 = 0x0B;
/// `ANDI` primary opcode.
pub const OP_ANDI: u8 = 0x0C;
/// `ORI` primary opcode.
pub const OP_ORI: u8 = 0x0D;
/// `XORI` primary opcode.
pub const OP_XORI: u8 = 0x0E;
/// `LUI` primary opcode.
pub const OP_LUI: u8 = 0x0F;
/// `LB` primary opcode.
pub const OP_LB: u8 = 0x20;
/// `LH` primary opcode.
pub const OP_LH: u8 = 0x21;
/// `LW` primary opcode.
pub const OP_LW: u8 = 0x23;
/// `LBU` primary opcode.
pub const OP_LBU: u8 = 0x24;
/// `LHU` primary opcode.
pub const OP_LHU: u8 = 0x25;
/// `SB` primary opcode.
pub const OP_SB: u8 = 0x28;
/// `SH` primary opcode.
pub const OP_SH: u8 = 0x29;
/// `SW` primary opcode.
pub const OP_SW: u8 = 0x2B;

/// Supported instruction encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum OpcodeEncoding {
    Sll,
    Srl,
    Sra,
    Sllv,
    Srlv,
    Srav,
    Jr,
    Jalr,
    Syscall,
    Break,
    Mfhi,
    Mthi,
    Mflo,
    Mtlo,
    Mult,
    Multu,
    Div,
    Divu,
    Add,
    Addu,
    Sub,
    Subu,
    And,
    Or,
    Xor,
    Nor,
    Slt,
    Sltu,
    Bltz,
    Bgez,
    Bltzal,
    Bgezal,
    J,
    Jal,
    Beq,
    Bne,
    Blez,
    Bgtz,
    Addi,
    Addiu,
    Slti,
    Sltiu,
    Andi,
    Ori,
    Xori,
    Lui,
    Lb,
    Lh,
    Lw,
    Lbu,
    Lhu,
    Sb,
    Sh,
    Sw,
}

impl OpcodeEncoding {
    /// Returns `true` for control transfers that are followed by a delay slot.
    #[must_use]
    pub const fn has_delay_slot(self) -> bool {
        matches!(
            self,
            Self::Jr
                | Self::Jalr
                | Self::Bltz
                | Self::Bgez
                | Self::Bltzal
                | Self::Bgezal
                | Self::J
                | Self::Jal
                | Self::Beq
                | Self::Bne
                | Self::Blez
                | Self::Bgtz
        )
    }

    /// Lower-case assembler mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Sll => "sll",
            Self::Srl => "srl",
            Self::Sra => "sra",
            Self::Sllv => "sllv",
            Self::Srlv => "srlv",
            Self::Srav => "srav",
            Self::Jr => "jr",
            Self::Jalr => "jalr",
            Self::Syscall => "syscall",
            Self::Break => "break",
            Self::Mfhi => "mfhi",
            Self::Mthi => "mthi",
            Self::Mflo => "mflo",
            Self::Mtlo => "mtlo",
            Self::Mult => "mult",
            Self::Multu => "multu",
            Self::Div => "div",
            Self::Divu => "divu",
            Self::Add => "add",
            Self::Addu => "addu",
            Self::Sub => "sub",
            Self::Subu => "subu",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Nor => "nor",
            Self::Slt => "slt",
            Self::Sltu => "sltu",
            Self::Bltz => "bltz",
            Self::Bgez => "bgez",
            Self::Bltzal => "bltzal",
            Self::Bgezal => "bgezal",
            Self::J => "j",
            Self::Jal => "jal",
            Self::Beq => "beq",
            Self::Bne => "bne",
            Self::Blez => "blez",
            Self::Bgtz => "bgtz",
            Self::Addi => "addi",
            Self::Addiu => "addiu",
            Self::Slti => "slti",
            Self::Sltiu => "sltiu",
            Self::Andi => "andi",
            Self::Ori => "ori",
            Self::Xori => "xori",
            Self::Lui => "lui",
            Self::Lb => "lb",
            Self::Lh => "lh",
            Self::Lw => "lw",
            Self::Lbu => "lbu",
            Self::Lhu => "lhu",
            Self::Sb => "sb",
            Self::Sh => "sh",
            Self::Sw => "sw",
        }
    }
}

/// Single source-of-truth assigned encoding table.
///
/// Entries are `(OP, SEL, encoding)`. `SEL` is the `FUNCT` field for
/// `SPECIAL`, the `RT` field for `REGIMM`, and zero for every other opcode.
/// Any pair not present here is an invalid instruction.
pub const OPCODE_ENCODING_TABLE: &[(u8, u8, OpcodeEncoding)] = &[
    (OP_SPECIAL, 0x00, OpcodeEncoding::Sll),
    (OP_SPECIAL, 0x02, OpcodeEncoding::Srl),
    (OP_SPECIAL, 0x03, OpcodeEncoding::Sra),
    (OP_SPECIAL, 0x04, OpcodeEncoding::Sllv),
    (OP_SPECIAL, 0x06, OpcodeEncoding::Srlv),
    (OP_SPECIAL, 0x07, OpcodeEncoding::Srav),
    (OP_SPECIAL, 0x08, OpcodeEncoding::Jr),
    (OP_SPECIAL, 0x09, OpcodeEncoding::Jalr),
    (OP_SPECIAL, 0x0C, OpcodeEncoding::Syscall),
    (OP_SPECIAL, 0x0D, OpcodeEncoding::Break),
    (OP_SPECIAL, 0x10, OpcodeEncoding::Mfhi),
    (OP_SPECIAL, 0x11, OpcodeEncoding::Mthi),
    (OP_SPECIAL, 0x12, OpcodeEncoding::Mflo),
    (OP_SPECIAL, 0x13, OpcodeEncoding::Mtlo),
    (OP_SPECIAL, 0x18, OpcodeEncoding::Mult),
    (OP_SPECIAL, 0x19, OpcodeEncoding::Multu),
    (OP_SPECIAL, 0x1A, OpcodeEncoding::Div),
    (OP_SPECIAL, 0x1B, OpcodeEncoding::Divu),
    (OP_SPECIAL, 0x20, OpcodeEncoding::Add),
    (OP_SPECIAL, 0x21, OpcodeEncoding::Addu),
    (OP_SPECIAL, 0x22, OpcodeEncoding::Sub),
    (OP_SPECIAL, 0x23, OpcodeEncoding::Subu),
    (OP_SPECIAL, 0x24, OpcodeEncoding::And),
    (OP_SPECIAL, 0x25, OpcodeEncoding::Or),
    (OP_SPECIAL, 0x26, OpcodeEncoding::Xor),
    (OP_SPECIAL, 0x27, OpcodeEncoding::Nor),
    (OP_SPECIAL, 0x2A, OpcodeEncoding::Slt),
    (OP_SPECIAL, 0x2B, OpcodeEncoding::Sltu),
    (OP_REGIMM, 0x00, OpcodeEncoding::Bltz),
    (OP_REGIMM, 0x01, OpcodeEncoding::Bgez),
    (OP_REGIMM, 0x10, OpcodeEncoding::Bltzal),
    (OP_REGIMM, 0x11, OpcodeEncoding::Bgezal),
    (OP_J, 0x00, OpcodeEncoding::J),
    (OP_JAL, 0x00, OpcodeEncoding::Jal),
    (OP_BEQ, 0x00, OpcodeEncoding::Beq),
    (OP_BNE, 0x00, OpcodeEncoding::Bne),
    (OP_BLEZ, 0x00, OpcodeEncoding::Blez),
    (OP_BGTZ, 0x00, OpcodeEncoding::Bgtz),
    (OP_ADDI, 0x00, OpcodeEncoding::Addi),
    (OP_ADDIU, 0x00, OpcodeEncoding::Addiu),
    (OP_SLTI, 0x00, OpcodeEncoding::Slti),
    (OP_SLTIU, 0x00, OpcodeEncoding::Sltiu),
    (OP_ANDI, 0x00, OpcodeEncoding::Andi),
    (OP_ORI, 0x00, OpcodeEncoding::Ori),
    (OP_XORI, 0x00, OpcodeEncoding::Xori),
    (OP_LUI, 0x00, OpcodeEncoding::Lui),
    (OP_LB, 0x00, OpcodeEncoding::Lb),
    (OP_LH, 0x00, OpcodeEncoding::Lh),
    (OP_LW, 0x00, OpcodeEncoding::Lw),
    (OP_LBU, 0x00, OpcodeEncoding::Lbu),
    (OP_LHU, 0x00, OpcodeEncoding::Lhu),
    (OP_SB, 0x00, OpcodeEncoding::Sb),
    (OP_SH, 0x00, OpcodeEncoding::Sh),
    (OP_SW, 0x00, OpcodeEncoding::Sw),
];

/// Returns the assigned encoding for an `(OP, SEL)` pair.
///
/// `None` means invalid instruction.
#[must_use]
pub fn classify_opcode(op: u8, sel: u8) -> Option<OpcodeEncoding> {
    if op > 0x3F || sel > 0x3F {
        return None;
    }

    OPCODE_ENCODING_TABLE
        .iter()
        .find_map(|(entry_op, entry_sel, encoding)| {
            ((*entry_op == op) && (*entry_sel == sel)).then_some(*encoding)
        })
}

/// Extracts the `(OP, SEL)` pair from an instruction word.
#[must_use]
pub const fn decode_word_op_sel(word: u32) -> (u8, u8) {
    let op = (word >> 26) as u8;
    let sel = match op {
        OP_SPECIAL => (word & 0x3F) as u8,
        OP_REGIMM => ((word >> 16) & 0x1F) as u8,
        _ => 0,
    };
    (op, sel)
}
