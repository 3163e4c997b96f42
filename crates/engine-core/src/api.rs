//! Public host-facing engine contract.
//!
//! A harness talks to an emulation engine only through [`Engine`]: open a
//! session for an architecture and mode, map memory, load bytes, register
//! code hooks, drive execution, and read registers back. Dropping the engine
//! releases it.

use std::fmt;
use std::ops::BitOr;

use crate::{EngineError, Register};

/// Instruction-set architectures an engine may be asked to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Arch {
    /// MIPS family.
    Mips,
    /// 32-bit ARM.
    Arm,
    /// 64-bit ARM.
    Arm64,
    /// x86 family.
    X86,
    /// RISC-V family.
    RiscV,
}

/// Register width of the requested mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Width {
    /// 32-bit registers and addresses.
    Bits32,
    /// 64-bit registers and addresses.
    Bits64,
}

/// Byte order used for instruction fetch and data access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Endian {
    /// Least significant byte first.
    #[default]
    Little,
    /// Most significant byte first.
    Big,
}

impl Endian {
    /// Assembles a 32-bit word from bytes in this byte order.
    #[must_use]
    pub const fn word_from_bytes(self, bytes: [u8; 4]) -> u32 {
        match self {
            Self::Little => u32::from_le_bytes(bytes),
            Self::Big => u32::from_be_bytes(bytes),
        }
    }

    /// Splits a 32-bit word into bytes in this byte order.
    #[must_use]
    pub const fn word_to_bytes(self, word: u32) -> [u8; 4] {
        match self {
            Self::Little => word.to_le_bytes(),
            Self::Big => word.to_be_bytes(),
        }
    }
}

/// Architecture mode tag passed to [`Engine::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Mode {
    /// Register and address width.
    pub width: Width,
    /// Memory byte order.
    pub endian: Endian,
}

impl Mode {
    /// 32-bit little-endian MIPS.
    pub const MIPS32_LE: Self = Self {
        width: Width::Bits32,
        endian: Endian::Little,
    };
    /// 32-bit big-endian MIPS.
    pub const MIPS32_BE: Self = Self {
        width: Width::Bits32,
        endian: Endian::Big,
    };
    /// 64-bit little-endian MIPS.
    pub const MIPS64_LE: Self = Self {
        width: Width::Bits64,
        endian: Endian::Little,
    };
}

/// Access permissions for a mapped memory region.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Permissions(u8);

impl Permissions {
    /// No access.
    pub const NONE: Self = Self(0);
    /// Data reads allowed.
    pub const READ: Self = Self(1 << 0);
    /// Data writes allowed.
    pub const WRITE: Self = Self(1 << 1);
    /// Instruction fetch allowed.
    pub const EXEC: Self = Self(1 << 2);
    /// Read, write, and execute.
    pub const ALL: Self = Self(0b111);

    /// Builds permissions from raw bits, rejecting unknown bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::ALL.0 == 0 {
            Some(Self(bits))
        } else {
            None
        }
    }

    /// Returns the raw permission bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` when every bit in `other` is granted.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |bit: Self, ch: char| if self.contains(bit) { ch } else { '-' };
        write!(
            f,
            "Permissions({}{}{})",
            flag(Self::READ, 'r'),
            flag(Self::WRITE, 'w'),
            flag(Self::EXEC, 'x')
        )
    }
}

/// Address filter attached to a code hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum HookRange {
    /// Fire for every executed instruction regardless of address.
    All,
    /// Fire only for instructions whose address lies in `begin..=end`.
    Bounded {
        /// Inclusive lower bound.
        begin: u64,
        /// Inclusive upper bound.
        end: u64,
    },
}

impl HookRange {
    /// Builds a range from raw numeric bounds.
    ///
    /// An inverted pair (`begin > end`, conventionally `1, 0`) selects every
    /// address.
    #[must_use]
    pub const fn from_bounds(begin: u64, end: u64) -> Self {
        if begin > end {
            Self::All
        } else {
            Self::Bounded { begin, end }
        }
    }

    /// Returns `true` when a hook with this range fires for `address`.
    #[must_use]
    pub const fn contains(self, address: u64) -> bool {
        match self {
            Self::All => true,
            Self::Bounded { begin, end } => address >= begin && address <= end,
        }
    }
}

/// Opaque identifier for a registered hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookHandle(pub u32);

/// Per-instruction callback invoked by the engine before each instruction executes.
///
/// The callback receives only the instruction address and size. It has no
/// access to the engine and cannot influence execution.
pub trait CodeHook {
    /// Called once per executed instruction that falls inside the hook's range.
    fn on_code(&mut self, address: u64, size: u32);
}

impl<T: CodeHook + ?Sized> CodeHook for &mut T {
    fn on_code(&mut self, address: u64, size: u32) {
        (**self).on_code(address, size);
    }
}

impl<T: CodeHook + ?Sized> CodeHook for Box<T> {
    fn on_code(&mut self, address: u64, size: u32) {
        (**self).on_code(address, size);
    }
}

/// Adapts a closure into a [`CodeHook`].
pub struct HookFn<F>(pub F);

impl<F: FnMut(u64, u32)> CodeHook for HookFn<F> {
    fn on_code(&mut self, address: u64, size: u32) {
        (self.0)(address, size);
    }
}

impl<F> fmt::Debug for HookFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HookFn(..)")
    }
}

/// Programmatic contract of an emulation engine.
///
/// `'h` bounds the hooks the engine may hold: a hook can borrow caller state
/// for `'h`, and the borrow ends when the engine is dropped.
pub trait Engine<'h>: Sized {
    /// Opens a new engine instance.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Arch`] or [`EngineError::Mode`] when the engine
    /// cannot emulate the requested target.
    fn open(arch: Arch, mode: Mode) -> Result<Self, EngineError>;

    /// Maps `size` bytes at `base` with `perms`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Arg`] for malformed requests and
    /// [`EngineError::Map`] when the range overlaps an existing mapping.
    fn mem_map(&mut self, base: u64, size: u64, perms: Permissions) -> Result<(), EngineError>;

    /// Copies `bytes` into guest memory starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::WriteUnmapped`] when any target byte is unmapped
    /// and [`EngineError::WriteProt`] when a target region is not writable.
    fn mem_write(&mut self, address: u64, bytes: &[u8]) -> Result<(), EngineError>;

    /// Copies guest memory starting at `address` into `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ReadUnmapped`] when any source byte is unmapped.
    fn mem_read(&self, address: u64, buf: &mut [u8]) -> Result<(), EngineError>;

    /// Registers a per-instruction code hook.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Hook`] when the engine cannot accept the hook.
    fn add_code_hook(
        &mut self,
        range: HookRange,
        hook: Box<dyn CodeHook + 'h>,
    ) -> Result<HookHandle, EngineError>;

    /// Removes a previously registered hook.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Hook`] when `handle` is unknown.
    fn remove_hook(&mut self, handle: HookHandle) -> Result<(), EngineError>;

    /// Executes from `begin` until the program counter reaches `until`.
    ///
    /// The instruction at `until` is not executed. A zero `timeout_us` or
    /// `count` leaves that bound unlimited.
    ///
    /// # Errors
    ///
    /// Returns the fault that stopped execution: unmapped or protected
    /// access, invalid instruction, unhandled exception, or an exhausted
    /// bound.
    fn emu_start(
        &mut self,
        begin: u64,
        until: u64,
        timeout_us: u64,
        count: u64,
    ) -> Result<(), EngineError>;

    /// Reads a register.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Arg`] when the register does not exist in the
    /// opened mode.
    fn reg_read(&self, reg: Register) -> Result<u64, EngineError>;

    /// Writes a register.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Arg`] when the register does not exist in the
    /// opened mode or `value` does not fit.
    fn reg_write(&mut self, reg: Register, value: u64) -> Result<(), EngineError>;
}

/// Names an engine type independently of its hook lifetime.
///
/// Lets a driver open an engine whose hooks borrow state the driver itself
/// creates.
pub trait EngineFamily {
    /// The engine type for hooks that live for `'h`.
    type Engine<'h>: Engine<'h>;
}

#[cfg(test)]
mod tests {
    use super::{CodeHook, Endian, HookFn, HookRange, Mode, Permissions, Width};

    #[test]
    fn inverted_bounds_select_every_address() {
        assert_eq!(HookRange::from_bounds(1, 0), HookRange::All);
        assert_eq!(HookRange::from_bounds(u64::MAX, 0), HookRange::All);
        assert!(HookRange::All.contains(0));
        assert!(HookRange::All.contains(u64::MAX));
    }

    #[test]
    fn ordered_bounds_are_inclusive() {
        let range = HookRange::from_bounds(0x10_0004, 0x10_0008);
        assert_eq!(
            range,
            HookRange::Bounded {
                begin: 0x10_0004,
                end: 0x10_0008
            }
        );
        assert!(!range.contains(0x10_0000));
        assert!(range.contains(0x10_0004));
        assert!(range.contains(0x10_0008));
        assert!(!range.contains(0x10_000C));
    }

    #[test]
    fn single_address_range_is_not_the_all_sentinel() {
        let range = HookRange::from_bounds(5, 5);
        assert!(range.contains(5));
        assert!(!range.contains(6));
    }

    #[test]
    fn permission_bits_compose_and_reject_unknown_bits() {
        let rw = Permissions::READ | Permissions::WRITE;
        assert!(rw.contains(Permissions::READ));
        assert!(rw.contains(Permissions::WRITE));
        assert!(!rw.contains(Permissions::EXEC));
        assert!(Permissions::ALL.contains(rw));
        assert_eq!(Permissions::from_bits(0b111), Some(Permissions::ALL));
        assert_eq!(Permissions::from_bits(0b1000), None);
        assert_eq!(format!("{rw:?}"), "Permissions(rw-)");
    }

    #[test]
    fn endian_word_conversion_matches_byte_order() {
        let bytes = [0x02, 0x00, 0x04, 0x24];
        assert_eq!(Endian::Little.word_from_bytes(bytes), 0x2404_0002);
        assert_eq!(Endian::Big.word_from_bytes(bytes), 0x0200_0424);
        assert_eq!(Endian::Little.word_to_bytes(0x2404_0002), bytes);
    }

    #[test]
    fn mode_constants_describe_width_and_order() {
        assert_eq!(Mode::MIPS32_LE.width, Width::Bits32);
        assert_eq!(Mode::MIPS32_LE.endian, Endian::Little);
        assert_eq!(Mode::MIPS32_BE.endian, Endian::Big);
        assert_eq!(Mode::MIPS64_LE.width, Width::Bits64);
    }

    fn dispatch<H: CodeHook>(mut hook: H, address: u64) {
        hook.on_code(address, 4);
    }

    #[test]
    fn closure_hooks_observe_calls() {
        let mut seen = Vec::new();
        {
            let mut hook = HookFn(|address, size| seen.push((address, size)));
            hook.on_code(0x10, 4);
            dispatch(&mut hook, 0x14);
            dispatch(Box::new(&mut hook), 0x18);
        }
        assert_eq!(seen, vec![(0x10, 4), (0x14, 4), (0x18, 4)]);
    }
}
