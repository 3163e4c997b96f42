//! Memory access policy helpers shared by host and guest accesses.

use crate::{EngineError, Permissions};

/// Instruction width in bytes; fetches must be aligned to it.
pub const INSTRUCTION_BYTES: u8 = 4;

/// Kind of memory access being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AccessKind {
    /// Instruction fetch.
    Fetch,
    /// Data read.
    Read,
    /// Data write.
    Write,
}

impl AccessKind {
    /// Permission a guest access of this kind needs.
    #[must_use]
    pub const fn required(self) -> Permissions {
        match self {
            Self::Fetch => Permissions::EXEC,
            Self::Read => Permissions::READ,
            Self::Write => Permissions::WRITE,
        }
    }

    /// Error raised when the accessed address has no mapping.
    #[must_use]
    pub const fn unmapped_fault(self) -> EngineError {
        match self {
            Self::Fetch => EngineError::FetchUnmapped,
            Self::Read => EngineError::ReadUnmapped,
            Self::Write => EngineError::WriteUnmapped,
        }
    }

    /// Error raised when the mapping lacks the needed permission.
    #[must_use]
    pub const fn protection_fault(self) -> EngineError {
        match self {
            Self::Fetch => EngineError::FetchProt,
            Self::Read => EngineError::ReadProt,
            Self::Write => EngineError::WriteProt,
        }
    }

    /// Error raised when the address is not aligned to the access width.
    #[must_use]
    pub const fn unaligned_fault(self) -> EngineError {
        match self {
            Self::Fetch => EngineError::FetchUnaligned,
            Self::Read => EngineError::ReadUnaligned,
            Self::Write => EngineError::WriteUnaligned,
        }
    }
}

/// Validates natural alignment of a `width_bytes` access at `address`.
///
/// Widths of one byte are always aligned.
///
/// # Errors
///
/// Returns the unaligned fault of `kind` when `address` is not a multiple of
/// `width_bytes`.
pub const fn validate_alignment(
    kind: AccessKind,
    address: u64,
    width_bytes: u8,
) -> Result<(), EngineError> {
    if width_bytes <= 1 || address % width_bytes as u64 == 0 {
        Ok(())
    } else {
        Err(kind.unaligned_fault())
    }
}

/// Validates that `granted` covers `required`.
///
/// Passing [`Permissions::NONE`] as `required` skips the check, which is how
/// host reads bypass region permissions.
///
/// # Errors
///
/// Returns the protection fault of `kind` when a required bit is missing.
pub const fn validate_permissions(
    kind: AccessKind,
    granted: Permissions,
    required: Permissions,
) -> Result<(), EngineError> {
    if granted.contains(required) {
        Ok(())
    } else {
        Err(kind.protection_fault())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{validate_alignment, validate_permissions, AccessKind, INSTRUCTION_BYTES};
    use crate::{EngineError, Permissions};

    #[rstest]
    #[case(AccessKind::Fetch, EngineError::FetchUnmapped, EngineError::FetchProt, EngineError::FetchUnaligned)]
    #[case(AccessKind::Read, EngineError::ReadUnmapped, EngineError::ReadProt, EngineError::ReadUnaligned)]
    #[case(AccessKind::Write, EngineError::WriteUnmapped, EngineError::WriteProt, EngineError::WriteUnaligned)]
    fn access_kinds_map_to_distinct_faults(
        #[case] kind: AccessKind,
        #[case] unmapped: EngineError,
        #[case] protection: EngineError,
        #[case] unaligned: EngineError,
    ) {
        assert_eq!(kind.unmapped_fault(), unmapped);
        assert_eq!(kind.protection_fault(), protection);
        assert_eq!(kind.unaligned_fault(), unaligned);
    }

    #[test]
    fn fetch_alignment_requires_word_boundary() {
        assert_eq!(
            validate_alignment(AccessKind::Fetch, 0x10_0000, INSTRUCTION_BYTES),
            Ok(())
        );
        assert_eq!(
            validate_alignment(AccessKind::Fetch, 0x10_0002, INSTRUCTION_BYTES),
            Err(EngineError::FetchUnaligned)
        );
    }

    #[test]
    fn byte_accesses_are_always_aligned() {
        assert_eq!(validate_alignment(AccessKind::Read, 0x10_0003, 1), Ok(()));
        assert_eq!(
            validate_alignment(AccessKind::Write, 0x10_0003, 2),
            Err(EngineError::WriteUnaligned)
        );
    }

    #[test]
    fn permission_checks_follow_required_bits() {
        let rx = Permissions::READ | Permissions::EXEC;
        assert_eq!(
            validate_permissions(AccessKind::Fetch, rx, AccessKind::Fetch.required()),
            Ok(())
        );
        assert_eq!(
            validate_permissions(AccessKind::Write, rx, AccessKind::Write.required()),
            Err(EngineError::WriteProt)
        );
        assert_eq!(
            validate_permissions(AccessKind::Read, Permissions::NONE, Permissions::NONE),
            Ok(())
        );
    }
}
