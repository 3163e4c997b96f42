//! Sparse guest memory map built from host-requested regions.

use crate::memory::access::{validate_permissions, AccessKind};
use crate::{EngineError, Permissions};

/// Alignment granule for region base addresses and sizes.
pub const MAP_GRANULE: u64 = 4;

/// Public description of one mapped region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegionDescriptor {
    /// Inclusive start address.
    pub base: u64,
    /// Length in bytes.
    pub size: u64,
    /// Access permissions.
    pub perms: Permissions,
}

impl RegionDescriptor {
    /// Exclusive end address.
    #[must_use]
    pub const fn end(self) -> u64 {
        self.base + self.size
    }

    /// Returns `true` when `address` belongs to this region.
    #[must_use]
    pub const fn contains(self, address: u64) -> bool {
        address >= self.base && address - self.base < self.size
    }

    /// Returns `true` when this region and `other` share at least one byte.
    #[must_use]
    pub const fn overlaps(self, other: Self) -> bool {
        self.base < other.end() && other.base < self.end()
    }
}

#[derive(Debug)]
struct MappedRegion {
    descriptor: RegionDescriptor,
    bytes: Box<[u8]>,
}

/// Validates a map request and returns its descriptor.
///
/// # Errors
///
/// Returns [`EngineError::Arg`] for an empty, misaligned, or wrapping range.
pub const fn validate_map_request(
    base: u64,
    size: u64,
    perms: Permissions,
) -> Result<RegionDescriptor, EngineError> {
    if size == 0 || base % MAP_GRANULE != 0 || size % MAP_GRANULE != 0 {
        return Err(EngineError::Arg);
    }
    if base.checked_add(size).is_none() {
        return Err(EngineError::Arg);
    }
    Ok(RegionDescriptor { base, size, perms })
}

/// Guest memory made of disjoint, zero-initialised regions.
#[derive(Debug, Default)]
pub struct MemoryMap {
    regions: Vec<MappedRegion>,
}

impl MemoryMap {
    /// Creates an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regions: Vec::new(),
        }
    }

    /// Maps a new zero-filled region.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Arg`] for a malformed request,
    /// [`EngineError::Map`] when it overlaps an existing region, and
    /// [`EngineError::NoMem`] when the backing store cannot be allocated.
    pub fn map(&mut self, base: u64, size: u64, perms: Permissions) -> Result<(), EngineError> {
        let descriptor = validate_map_request(base, size, perms)?;
        if self
            .regions
            .iter()
            .any(|region| region.descriptor.overlaps(descriptor))
        {
            return Err(EngineError::Map);
        }

        let len = usize::try_from(size).map_err(|_| EngineError::NoMem)?;
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|_| EngineError::NoMem)?;
        bytes.resize(len, 0);

        let at = self
            .regions
            .partition_point(|region| region.descriptor.base < base);
        self.regions.insert(
            at,
            MappedRegion {
                descriptor,
                bytes: bytes.into_boxed_slice(),
            },
        );
        Ok(())
    }

    /// Returns the region containing `address`.
    #[must_use]
    pub fn region_at(&self, address: u64) -> Option<RegionDescriptor> {
        self.index_of(address)
            .map(|index| self.regions[index].descriptor)
    }

    /// Mapped regions in ascending address order.
    pub fn regions(&self) -> impl Iterator<Item = RegionDescriptor> + '_ {
        self.regions.iter().map(|region| region.descriptor)
    }

    /// Copies `buf.len()` bytes starting at `address` into `buf`.
    ///
    /// The span may cross adjacent regions. Each touched region must grant
    /// `required`.
    ///
    /// # Errors
    ///
    /// Returns the unmapped or protection fault of `kind` for the first byte
    /// that fails. `buf` is left untouched on error.
    pub fn read(
        &self,
        address: u64,
        buf: &mut [u8],
        kind: AccessKind,
        required: Permissions,
    ) -> Result<(), EngineError> {
        self.check_span(address, buf.len(), kind, required)?;
        let mut cursor = address;
        let mut done = 0;
        while done < buf.len() {
            let region = self.region_for(cursor, kind)?;
            let (offset, chunk) = region.chunk(cursor, buf.len() - done);
            buf[done..done + chunk].copy_from_slice(&region.bytes[offset..offset + chunk]);
            done += chunk;
            cursor += chunk as u64;
        }
        Ok(())
    }

    /// Copies `bytes` into memory starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns the unmapped or protection fault of `kind` for the first byte
    /// that fails. Memory is left untouched on error.
    pub fn write(
        &mut self,
        address: u64,
        bytes: &[u8],
        kind: AccessKind,
        required: Permissions,
    ) -> Result<(), EngineError> {
        self.check_span(address, bytes.len(), kind, required)?;
        let mut cursor = address;
        let mut done = 0;
        while done < bytes.len() {
            let index = self.index_of(cursor).ok_or(kind.unmapped_fault())?;
            let region = &mut self.regions[index];
            let (offset, chunk) = region.chunk(cursor, bytes.len() - done);
            region.bytes[offset..offset + chunk].copy_from_slice(&bytes[done..done + chunk]);
            done += chunk;
            cursor += chunk as u64;
        }
        Ok(())
    }

    fn index_of(&self, address: u64) -> Option<usize> {
        self.regions
            .iter()
            .position(|region| region.descriptor.contains(address))
    }

    fn region_for(&self, address: u64, kind: AccessKind) -> Result<&MappedRegion, EngineError> {
        self.index_of(address)
            .map(|index| &self.regions[index])
            .ok_or(kind.unmapped_fault())
    }

    fn check_span(
        &self,
        address: u64,
        len: usize,
        kind: AccessKind,
        required: Permissions,
    ) -> Result<(), EngineError> {
        let mut cursor = address;
        let mut remaining = len;
        while remaining > 0 {
            let region = self.region_for(cursor, kind)?;
            validate_permissions(kind, region.descriptor.perms, required)?;
            let (_, chunk) = region.chunk(cursor, remaining);
            remaining -= chunk;
            if remaining > 0 {
                cursor = cursor
                    .checked_add(chunk as u64)
                    .ok_or(kind.unmapped_fault())?;
            }
        }
        Ok(())
    }
}

impl MappedRegion {
    /// Offset of `address` in this region and how many of `wanted` bytes fit
    /// before the region ends.
    #[allow(clippy::cast_possible_truncation)]
    fn chunk(&self, address: u64, wanted: usize) -> (usize, usize) {
        let offset = (address - self.descriptor.base) as usize;
        (offset, (self.bytes.len() - offset).min(wanted))
    }
}
