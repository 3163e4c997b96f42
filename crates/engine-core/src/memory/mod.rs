//! Memory model primitives and access policies.

/// Access-kind fault mapping and validation helpers.
pub mod access;
/// Sparse region map and byte-level copy routines.
pub mod map;

pub use access::{
    validate_alignment, validate_permissions, AccessKind, INSTRUCTION_BYTES,
};
pub use map::{validate_map_request, MemoryMap, RegionDescriptor, MAP_GRANULE};
