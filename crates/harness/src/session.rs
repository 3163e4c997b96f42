//! Scoped ownership of one engine instance.
//!
//! A [`Session`] opens an engine, forwards configuration and execution calls
//! to it, and releases it exactly once: either through [`Session::close`] or,
//! on an early return, when the session is dropped.

use std::marker::PhantomData;

use engine_core::{
    Arch, CodeHook, Engine, EngineError, HookHandle, HookRange, Mode, Permissions,
    RegionDescriptor, Register,
};

/// Owned engine session.
///
/// `'h` is the lifetime of state lent to hooks registered on this session.
#[derive(Debug)]
pub struct Session<'h, E: Engine<'h>> {
    engine: Option<E>,
    arch: Arch,
    mode: Mode,
    mappings: Vec<RegionDescriptor>,
    hooks: PhantomData<&'h ()>,
}

impl<'h, E: Engine<'h>> Session<'h, E> {
    /// Opens an engine for `arch` and `mode`.
    ///
    /// # Errors
    ///
    /// Returns the engine's error when it cannot emulate the target.
    pub fn open(arch: Arch, mode: Mode) -> Result<Self, EngineError> {
        let engine = E::open(arch, mode)?;
        tracing::debug!(?arch, ?mode, "session opened");
        Ok(Self {
            engine: Some(engine),
            arch,
            mode,
            mappings: Vec::new(),
            hooks: PhantomData,
        })
    }

    /// Architecture the session was opened for.
    #[must_use]
    pub const fn arch(&self) -> Arch {
        self.arch
    }

    /// Mode the session was opened with.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Regions mapped through this session, in request order.
    #[must_use]
    pub fn mappings(&self) -> &[RegionDescriptor] {
        &self.mappings
    }

    /// Borrows the underlying engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Handle`] after the engine was released.
    pub fn engine(&self) -> Result<&E, EngineError> {
        self.engine.as_ref().ok_or(EngineError::Handle)
    }

    fn engine_mut(&mut self) -> Result<&mut E, EngineError> {
        self.engine.as_mut().ok_or(EngineError::Handle)
    }

    /// Maps `size` bytes at `base`.
    ///
    /// # Errors
    ///
    /// Returns the engine's error for a malformed or overlapping request.
    pub fn map(&mut self, base: u64, size: u64, perms: Permissions) -> Result<(), EngineError> {
        self.engine_mut()?.mem_map(base, size, perms)?;
        self.mappings.push(RegionDescriptor { base, size, perms });
        Ok(())
    }

    /// Writes `bytes` at `address`.
    ///
    /// # Errors
    ///
    /// Returns the engine's error when the target is unmapped or protected.
    pub fn write(&mut self, address: u64, bytes: &[u8]) -> Result<(), EngineError> {
        self.engine_mut()?.mem_write(address, bytes)?;
        tracing::debug!(
            address = format_args!("{address:#x}"),
            len = bytes.len(),
            "image written"
        );
        Ok(())
    }

    /// Registers `hook` for instructions inside `range`.
    ///
    /// # Errors
    ///
    /// Returns the engine's error when the hook is rejected.
    pub fn register_code_hook<H: CodeHook + 'h>(
        &mut self,
        range: HookRange,
        hook: H,
    ) -> Result<HookHandle, EngineError> {
        self.engine_mut()?.add_code_hook(range, Box::new(hook))
    }

    /// Runs from `start` until the program counter reaches `end`.
    ///
    /// # Errors
    ///
    /// Returns the fault that stopped execution.
    pub fn run(
        &mut self,
        start: u64,
        end: u64,
        timeout_us: u64,
        max_instructions: u64,
    ) -> Result<(), EngineError> {
        self.engine_mut()?
            .emu_start(start, end, timeout_us, max_instructions)
    }

    /// Reads a register.
    ///
    /// # Errors
    ///
    /// Returns the engine's error for an unknown register.
    pub fn read_register(&self, reg: Register) -> Result<u64, EngineError> {
        self.engine()?.reg_read(reg)
    }

    /// Releases the engine.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(engine) = self.engine.take() {
            drop(engine);
            tracing::debug!(arch = ?self.arch, "session released");
        }
    }
}

impl<'h, E: Engine<'h>> Drop for Session<'h, E> {
    fn drop(&mut self) {
        self.release();
    }
}
