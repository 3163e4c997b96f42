//! [`Engine`] adapter over the Unicorn CPU emulator.
//!
//! Compiled with the `unicorn` feature. Unicorn error codes share their
//! numbering with [`EngineError`], so faults convert by code. Unicorn ends a
//! run silently when a timeout or instruction count runs out; the adapter
//! reports those as [`EngineError::Timeout`] and
//! [`EngineError::InstructionLimit`] when the program counter stopped short
//! of `until`.

use std::fmt;

use unicorn_engine::unicorn_const::{uc_error, Arch as UcArch, Mode as UcMode, Permission};
use unicorn_engine::{RegisterMIPS, Unicorn};

use crate::api::{Arch, CodeHook, Engine, EngineFamily, HookHandle, HookRange, Mode, Width};
use crate::{Endian, EngineError, Permissions, Register};

type HookRemover<'h> = Box<dyn FnOnce(&mut Unicorn<'h, ()>) -> Result<(), uc_error> + 'h>;

/// Unicorn-backed MIPS32 engine.
pub struct UnicornEngine<'h> {
    emu: Unicorn<'h, ()>,
    mode: Mode,
    hooks: Vec<(HookHandle, HookRemover<'h>)>,
    next_hook_id: u32,
}

/// Maps a Unicorn error onto the engine taxonomy.
///
/// Codes without a counterpart (`VERSION`, `HOOK_EXIST`, `RESOURCE`) fold into
/// the closest class.
#[must_use]
pub fn engine_error(error: uc_error) -> EngineError {
    let code = error as u32;
    match u8::try_from(code).ok().and_then(EngineError::from_code) {
        Some(mapped) => mapped,
        None if code == 19 => EngineError::Hook,
        None if code == 20 => EngineError::NoMem,
        None => EngineError::Arg,
    }
}

fn unicorn_permissions(perms: Permissions) -> Permission {
    let mut mapped = Permission::NONE;
    if perms.contains(Permissions::READ) {
        mapped |= Permission::READ;
    }
    if perms.contains(Permissions::WRITE) {
        mapped |= Permission::WRITE;
    }
    if perms.contains(Permissions::EXEC) {
        mapped |= Permission::EXEC;
    }
    mapped
}

fn unicorn_register(reg: Register) -> Result<i32, EngineError> {
    match reg {
        Register::Pc => Ok(i32::from(RegisterMIPS::PC)),
        Register::Hi => Ok(i32::from(RegisterMIPS::HI)),
        Register::Lo => Ok(i32::from(RegisterMIPS::LO)),
        gpr => {
            let index = gpr.gpr_index().ok_or(EngineError::Arg)?;
            let index = i32::try_from(index).map_err(|_| EngineError::Arg)?;
            Ok(i32::from(RegisterMIPS::R0) + index)
        }
    }
}

impl UnicornEngine<'_> {
    /// Mode the engine was opened with.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Number of registered code hooks.
    #[must_use]
    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }
}

impl<'h> Engine<'h> for UnicornEngine<'h> {
    fn open(arch: Arch, mode: Mode) -> Result<Self, EngineError> {
        if arch != Arch::Mips {
            return Err(EngineError::Arch);
        }
        if mode.width != Width::Bits32 {
            return Err(EngineError::Mode);
        }
        let endian = match mode.endian {
            Endian::Little => UcMode::LITTLE_ENDIAN,
            Endian::Big => UcMode::BIG_ENDIAN,
        };
        let emu = Unicorn::new(UcArch::MIPS, UcMode::MIPS32 | endian).map_err(engine_error)?;
        tracing::debug!(?arch, ?mode, "unicorn engine opened");
        Ok(Self {
            emu,
            mode,
            hooks: Vec::new(),
            next_hook_id: 0,
        })
    }

    fn mem_map(&mut self, base: u64, size: u64, perms: Permissions) -> Result<(), EngineError> {
        let size = size.try_into().map_err(|_| EngineError::Arg)?;
        self.emu
            .mem_map(base, size, unicorn_permissions(perms))
            .map_err(engine_error)?;
        tracing::debug!(
            base = format_args!("{base:#x}"),
            ?perms,
            "unicorn region mapped"
        );
        Ok(())
    }

    fn mem_write(&mut self, address: u64, bytes: &[u8]) -> Result<(), EngineError> {
        self.emu.mem_write(address, bytes).map_err(engine_error)
    }

    fn mem_read(&self, address: u64, buf: &mut [u8]) -> Result<(), EngineError> {
        self.emu.mem_read(address, buf).map_err(engine_error)
    }

    fn add_code_hook(
        &mut self,
        range: HookRange,
        mut hook: Box<dyn CodeHook + 'h>,
    ) -> Result<HookHandle, EngineError> {
        let (begin, end) = match range {
            HookRange::All => (1, 0),
            HookRange::Bounded { begin, end } => (begin, end),
        };
        let handle = HookHandle(self.next_hook_id);
        let next_hook_id = self.next_hook_id.checked_add(1).ok_or(EngineError::Hook)?;
        let id = self
            .emu
            .add_code_hook(begin, end, move |_, address, size| {
                hook.on_code(address, size);
            })
            .map_err(engine_error)?;
        self.next_hook_id = next_hook_id;
        self.hooks.push((
            handle,
            Box::new(move |emu: &mut Unicorn<'h, ()>| emu.remove_hook(id)),
        ));
        tracing::debug!(handle = handle.0, ?range, "unicorn code hook registered");
        Ok(handle)
    }

    fn remove_hook(&mut self, handle: HookHandle) -> Result<(), EngineError> {
        let index = self
            .hooks
            .iter()
            .position(|(registered, _)| *registered == handle)
            .ok_or(EngineError::Hook)?;
        let (_, remove) = self.hooks.remove(index);
        remove(&mut self.emu).map_err(engine_error)
    }

    fn emu_start(
        &mut self,
        begin: u64,
        until: u64,
        timeout_us: u64,
        count: u64,
    ) -> Result<(), EngineError> {
        let limit = count.try_into().map_err(|_| EngineError::Arg)?;
        tracing::debug!(
            begin = format_args!("{begin:#x}"),
            until = format_args!("{until:#x}"),
            timeout_us,
            count,
            "unicorn emulation started"
        );
        if let Err(error) = self.emu.emu_start(begin, until, timeout_us, limit) {
            let cause = engine_error(error);
            tracing::warn!(code = cause.code(), %cause, "unicorn emulation stopped on fault");
            return Err(cause);
        }

        let pc = self.reg_read(Register::Pc)?;
        if pc == until {
            return Ok(());
        }
        let cause = if count != 0 {
            EngineError::InstructionLimit
        } else {
            EngineError::Timeout
        };
        tracing::warn!(pc = format_args!("{pc:#x}"), %cause, "unicorn emulation stopped early");
        Err(cause)
    }

    fn reg_read(&self, reg: Register) -> Result<u64, EngineError> {
        let value = self
            .emu
            .reg_read(unicorn_register(reg)?)
            .map_err(engine_error)?;
        Ok(value & u64::from(u32::MAX))
    }

    fn reg_write(&mut self, reg: Register, value: u64) -> Result<(), EngineError> {
        if value > u64::from(u32::MAX) {
            return Err(EngineError::Arg);
        }
        self.emu
            .reg_write(unicorn_register(reg)?, value)
            .map_err(engine_error)
    }
}

impl fmt::Debug for UnicornEngine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnicornEngine")
            .field("mode", &self.mode)
            .field("hooks", &self.hooks.len())
            .finish_non_exhaustive()
    }
}

/// [`EngineFamily`] marker for [`UnicornEngine`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicornEngineFamily;

impl EngineFamily for UnicornEngineFamily {
    type Engine<'h> = UnicornEngine<'h>;
}
