//! Emulation engine contract and deterministic MIPS32 reference engine.

/// Stable engine error taxonomy.
pub mod error;
pub use error::{describe_code, EngineError, ErrorClass};

/// Public host-facing engine contract and integration types.
pub mod api;
pub use api::{
    Arch, CodeHook, Endian, Engine, EngineFamily, HookFn, HookHandle, HookRange, Mode,
    Permissions, Width,
};

/// Architectural CPU state model primitives.
pub mod state;
pub use state::{ArchitecturalState, Register, RunState, GENERAL_REGISTER_COUNT};

/// Memory map primitives and access policies.
pub mod memory;
pub use memory::{AccessKind, MemoryMap, RegionDescriptor, MAP_GRANULE};

/// Deterministic opcode and encoding classification tables.
pub mod encoding;
pub use encoding::{classify_opcode, OpcodeClass, OpcodeEncoding, OPCODE_ENCODING_TABLE};

/// Instruction decode with field extraction.
pub mod decoder;
pub use decoder::{DecodedInstruction, Decoder};

/// Instruction execution pipeline.
pub mod execute;
pub use execute::{execute_instruction, DataBus, ExecuteOutcome};

/// Reference engine implementation.
pub mod engine;
pub use engine::{MipsEngine, MipsEngineFamily};

/// Unicorn-backed engine adapter.
#[cfg(feature = "unicorn")]
pub mod unicorn;
#[cfg(feature = "unicorn")]
pub use unicorn::{UnicornEngine, UnicornEngineFamily};

/// Human-readable instruction listings.
pub mod disasm;
pub use disasm::{disassemble_bytes, disassemble_word, DisassemblyRow};

#[cfg(test)]
use proptest as _;
