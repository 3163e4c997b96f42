use thiserror::Error;

/// Coarse error classes used for reporting and aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ErrorClass {
    /// Engine could not be created or was handed an invalid argument.
    Setup,
    /// Memory map, host access, or guest access violation.
    Memory,
    /// Hook registration or removal failure.
    Hook,
    /// Guest instruction could not be executed.
    Execution,
    /// A caller-provided execution bound was exhausted.
    Limit,
}

/// Stable engine error taxonomy.
///
/// Values are small integer codes so they can travel across an FFI boundary or
/// a process exit status unchanged. Gaps in the numbering are codes the
/// reference engine never produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum EngineError {
    /// Host allocation for a mapped region failed.
    #[error("no memory available or memory not present")]
    NoMem = 1,
    /// Requested architecture is not supported by this engine.
    #[error("invalid or unsupported architecture")]
    Arch = 2,
    /// Engine handle is no longer usable.
    #[error("invalid engine handle")]
    Handle = 3,
    /// Requested mode is not supported for the architecture.
    #[error("invalid or unsupported mode")]
    Mode = 4,
    /// Read from an address with no mapped region.
    #[error("invalid memory read (unmapped)")]
    ReadUnmapped = 6,
    /// Write to an address with no mapped region.
    #[error("invalid memory write (unmapped)")]
    WriteUnmapped = 7,
    /// Instruction fetch from an address with no mapped region.
    #[error("invalid instruction fetch (unmapped)")]
    FetchUnmapped = 8,
    /// Hook registration or removal was rejected.
    #[error("invalid hook type or handle")]
    Hook = 9,
    /// Fetched word is not a supported instruction.
    #[error("invalid instruction")]
    InsnInvalid = 10,
    /// Map request overlaps an existing region or is malformed.
    #[error("invalid memory mapping")]
    Map = 11,
    /// Write to a region without write permission.
    #[error("write to write-protected region")]
    WriteProt = 12,
    /// Read from a region without read permission.
    #[error("read from non-readable region")]
    ReadProt = 13,
    /// Fetch from a region without execute permission.
    #[error("fetch from non-executable region")]
    FetchProt = 14,
    /// Argument outside the range the engine accepts.
    #[error("invalid argument")]
    Arg = 15,
    /// Data read at an address not aligned to its width.
    #[error("read from unaligned memory")]
    ReadUnaligned = 16,
    /// Data write at an address not aligned to its width.
    #[error("write to unaligned memory")]
    WriteUnaligned = 17,
    /// Instruction fetch at an address not aligned to the word size.
    #[error("fetch from unaligned memory")]
    FetchUnaligned = 18,
    /// Guest raised an exception with no handler (syscall, break, overflow).
    #[error("unhandled cpu exception")]
    Exception = 21,
    /// Wall-clock budget for the run elapsed.
    #[error("execution timed out")]
    Timeout = 22,
    /// Instruction budget for the run was exhausted.
    #[error("instruction limit reached")]
    InstructionLimit = 23,
}

impl EngineError {
    /// Every defined error in ascending code order.
    pub const ALL: [Self; 20] = [
        Self::NoMem,
        Self::Arch,
        Self::Handle,
        Self::Mode,
        Self::ReadUnmapped,
        Self::WriteUnmapped,
        Self::FetchUnmapped,
        Self::Hook,
        Self::InsnInvalid,
        Self::Map,
        Self::WriteProt,
        Self::ReadProt,
        Self::FetchProt,
        Self::Arg,
        Self::ReadUnaligned,
        Self::WriteUnaligned,
        Self::FetchUnaligned,
        Self::Exception,
        Self::Timeout,
        Self::InstructionLimit,
    ];

    /// Returns the stable integer code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Converts a stable integer code back into an error.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::NoMem),
            2 => Some(Self::Arch),
            3 => Some(Self::Handle),
            4 => Some(Self::Mode),
            6 => Some(Self::ReadUnmapped),
            7 => Some(Self::WriteUnmapped),
            8 => Some(Self::FetchUnmapped),
            9 => Some(Self::Hook),
            10 => Some(Self::InsnInvalid),
            11 => Some(Self::Map),
            12 => Some(Self::WriteProt),
            13 => Some(Self::ReadProt),
            14 => Some(Self::FetchProt),
            15 => Some(Self::Arg),
            16 => Some(Self::ReadUnaligned),
            17 => Some(Self::WriteUnaligned),
            18 => Some(Self::FetchUnaligned),
            21 => Some(Self::Exception),
            22 => Some(Self::Timeout),
            23 => Some(Self::InstructionLimit),
            _ => None,
        }
    }

    /// Returns the aggregation class for this error.
    #[must_use]
    pub const fn class(self) -> ErrorClass {
        match self {
            Self::NoMem | Self::Arch | Self::Handle | Self::Mode | Self::Arg => ErrorClass::Setup,
            Self::ReadUnmapped
            | Self::WriteUnmapped
            | Self::FetchUnmapped
            | Self::Map
            | Self::WriteProt
            | Self::ReadProt
            | Self::FetchProt
            | Self::ReadUnaligned
            | Self::WriteUnaligned
            | Self::FetchUnaligned => ErrorClass::Memory,
            Self::Hook => ErrorClass::Hook,
            Self::InsnInvalid | Self::Exception => ErrorClass::Execution,
            Self::Timeout | Self::InstructionLimit => ErrorClass::Limit,
        }
    }
}

/// Human-readable description for a raw error code.
///
/// Unknown codes get a generic description instead of failing.
#[must_use]
pub fn describe_code(code: u8) -> String {
    EngineError::from_code(code).map_or_else(
        || format!("unknown error code {code}"),
        |error| error.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::{describe_code, EngineError, ErrorClass};

    #[test]
    fn stable_code_roundtrip_is_bijective_for_defined_values() {
        for error in EngineError::ALL {
            assert_eq!(EngineError::from_code(error.code()), Some(error));
        }
    }

    #[test]
    fn undefined_codes_are_rejected() {
        for code in [0u8, 5, 19, 20, 24, 0xFF] {
            assert!(EngineError::from_code(code).is_none());
        }
    }

    #[test]
    fn all_table_is_sorted_by_code() {
        assert!(EngineError::ALL
            .windows(2)
            .all(|pair| pair[0].code() < pair[1].code()));
    }

    #[test]
    fn class_mapping_matches_taxonomy() {
        assert_eq!(EngineError::Arch.class(), ErrorClass::Setup);
        assert_eq!(EngineError::WriteUnmapped.class(), ErrorClass::Memory);
        assert_eq!(EngineError::FetchProt.class(), ErrorClass::Memory);
        assert_eq!(EngineError::Hook.class(), ErrorClass::Hook);
        assert_eq!(EngineError::InsnInvalid.class(), ErrorClass::Execution);
        assert_eq!(EngineError::InstructionLimit.class(), ErrorClass::Limit);
    }

    #[test]
    fn describe_code_uses_display_text() {
        assert_eq!(describe_code(7), "invalid memory write (unmapped)");
        assert_eq!(describe_code(99), "unknown error code 99");
    }
}
