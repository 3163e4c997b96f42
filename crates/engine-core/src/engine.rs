//! Deterministic reference engine for 32-bit MIPS.
//!
//! [`MipsEngine`] implements [`Engine`] with architectural branch-delay-slot
//! sequencing: the word after every branch or jump executes before control
//! transfers, whether or not the branch is taken, and code hooks fire for it
//! like for any other instruction.

use std::fmt;
use std::time::{Duration, Instant};

use crate::api::{Arch, CodeHook, Engine, EngineFamily, HookHandle, HookRange, Mode, Width};
use crate::execute::{execute_instruction, DataBus, ExecuteOutcome};
use crate::memory::{validate_alignment, AccessKind, MemoryMap, INSTRUCTION_BYTES};
use crate::{ArchitecturalState, Decoder, Endian, EngineError, Permissions, Register, RunState};

/// Size of the 32-bit guest address space.
const ADDRESS_SPACE_END: u64 = 1 << 32;

struct RegisteredHook<'h> {
    handle: HookHandle,
    range: HookRange,
    hook: Box<dyn CodeHook + 'h>,
}

/// Reference MIPS32 engine.
pub struct MipsEngine<'h> {
    endian: Endian,
    memory: MemoryMap,
    regs: ArchitecturalState,
    delay_slot: Option<u32>,
    hooks: Vec<RegisteredHook<'h>>,
    next_hook_id: u32,
    run_state: RunState,
    retired: u64,
}

impl MipsEngine<'_> {
    /// Current run state.
    #[must_use]
    pub const fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Instructions retired across every run since the engine was opened.
    #[must_use]
    pub const fn retired(&self) -> u64 {
        self.retired
    }

    /// Byte order the engine was opened with.
    #[must_use]
    pub const fn endian(&self) -> Endian {
        self.endian
    }

    /// Number of registered code hooks.
    #[must_use]
    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    fn fetch(&self, pc: u32) -> Result<u32, EngineError> {
        let address = u64::from(pc);
        validate_alignment(AccessKind::Fetch, address, INSTRUCTION_BYTES)?;
        let mut word = [0; 4];
        self.memory
            .read(address, &mut word, AccessKind::Fetch, Permissions::EXEC)?;
        Ok(self.endian.word_from_bytes(word))
    }

    fn dispatch_hooks(&mut self, pc: u32) {
        let address = u64::from(pc);
        for registered in &mut self.hooks {
            if registered.range.contains(address) {
                registered
                    .hook
                    .on_code(address, u32::from(INSTRUCTION_BYTES));
            }
        }
    }

    fn run(&mut self, until: u32, timeout_us: u64, count: u64) -> Result<u64, EngineError> {
        let started = Instant::now();
        let budget = Duration::from_micros(timeout_us);
        let mut executed = 0u64;

        loop {
            let pc = self.regs.pc();
            if self.delay_slot.is_none() && pc == until {
                return Ok(executed);
            }
            if count != 0 && executed >= count {
                return Err(EngineError::InstructionLimit);
            }
            if timeout_us != 0 && started.elapsed() >= budget {
                return Err(EngineError::Timeout);
            }

            let instr = Decoder::decode(self.fetch(pc)?)?;
            if self.delay_slot.is_some() && instr.encoding.has_delay_slot() {
                tracing::warn!(pc = format_args!("{pc:#x}"), "control transfer in delay slot");
                return Err(EngineError::InsnInvalid);
            }

            self.dispatch_hooks(pc);

            let mut bus = GuestBus {
                memory: &mut self.memory,
                endian: self.endian,
            };
            let outcome = execute_instruction(&mut self.regs, &mut bus, instr)?;
            executed += 1;
            self.retired += 1;

            let next = match (self.delay_slot.take(), outcome) {
                (Some(target), _) => target,
                (None, ExecuteOutcome::Retired) => pc.wrapping_add(4),
                (None, ExecuteOutcome::Transfer { target, taken }) => {
                    tracing::trace!(
                        pc = format_args!("{pc:#x}"),
                        target = format_args!("{target:#x}"),
                        taken,
                        "delay slot armed"
                    );
                    self.delay_slot = Some(target);
                    pc.wrapping_add(4)
                }
            };
            self.regs.set_pc(next);
        }
    }
}

impl<'h> Engine<'h> for MipsEngine<'h> {
    fn open(arch: Arch, mode: Mode) -> Result<Self, EngineError> {
        if arch != Arch::Mips {
            return Err(EngineError::Arch);
        }
        if mode.width != Width::Bits32 {
            return Err(EngineError::Mode);
        }
        tracing::debug!(?arch, ?mode, "engine opened");
        Ok(Self {
            endian: mode.endian,
            memory: MemoryMap::new(),
            regs: ArchitecturalState::default(),
            delay_slot: None,
            hooks: Vec::new(),
            next_hook_id: 0,
            run_state: RunState::Idle,
            retired: 0,
        })
    }

    fn mem_map(&mut self, base: u64, size: u64, perms: Permissions) -> Result<(), EngineError> {
        match base.checked_add(size) {
            Some(end) if end <= ADDRESS_SPACE_END => {}
            _ => return Err(EngineError::Arg),
        }
        self.memory.map(base, size, perms)?;
        tracing::debug!(
            base = format_args!("{base:#x}"),
            size = format_args!("{size:#x}"),
            ?perms,
            "region mapped"
        );
        Ok(())
    }

    fn mem_write(&mut self, address: u64, bytes: &[u8]) -> Result<(), EngineError> {
        self.memory
            .write(address, bytes, AccessKind::Write, Permissions::WRITE)
    }

    fn mem_read(&self, address: u64, buf: &mut [u8]) -> Result<(), EngineError> {
        self.memory
            .read(address, buf, AccessKind::Read, Permissions::NONE)
    }

    fn add_code_hook(
        &mut self,
        range: HookRange,
        hook: Box<dyn CodeHook + 'h>,
    ) -> Result<HookHandle, EngineError> {
        let handle = HookHandle(self.next_hook_id);
        self.next_hook_id = self.next_hook_id.checked_add(1).ok_or(EngineError::Hook)?;
        self.hooks.push(RegisteredHook {
            handle,
            range,
            hook,
        });
        tracing::debug!(handle = handle.0, ?range, "code hook registered");
        Ok(handle)
    }

    fn remove_hook(&mut self, handle: HookHandle) -> Result<(), EngineError> {
        let index = self
            .hooks
            .iter()
            .position(|registered| registered.handle == handle)
            .ok_or(EngineError::Hook)?;
        self.hooks.remove(index);
        tracing::debug!(handle = handle.0, "code hook removed");
        Ok(())
    }

    fn emu_start(
        &mut self,
        begin: u64,
        until: u64,
        timeout_us: u64,
        count: u64,
    ) -> Result<(), EngineError> {
        let begin = u32::try_from(begin).map_err(|_| EngineError::Arg)?;
        let until = u32::try_from(until).map_err(|_| EngineError::Arg)?;

        self.regs.set_pc(begin);
        self.delay_slot = None;
        self.run_state = RunState::Running;
        tracing::debug!(
            begin = format_args!("{begin:#x}"),
            until = format_args!("{until:#x}"),
            timeout_us,
            count,
            "emulation started"
        );

        match self.run(until, timeout_us, count) {
            Ok(executed) => {
                self.run_state = RunState::Stopped;
                tracing::debug!(executed, "emulation reached until address");
                Ok(())
            }
            Err(cause) => {
                self.run_state = RunState::Faulted(cause);
                tracing::warn!(
                    pc = format_args!("{:#x}", self.regs.pc()),
                    code = cause.code(),
                    %cause,
                    "emulation stopped on fault"
                );
                Err(cause)
            }
        }
    }

    fn reg_read(&self, reg: Register) -> Result<u64, EngineError> {
        Ok(u64::from(self.regs.read(reg)))
    }

    fn reg_write(&mut self, reg: Register, value: u64) -> Result<(), EngineError> {
        let value = u32::try_from(value).map_err(|_| EngineError::Arg)?;
        self.regs.write(reg, value);
        Ok(())
    }
}

impl fmt::Debug for MipsEngine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MipsEngine")
            .field("endian", &self.endian)
            .field("memory", &self.memory)
            .field("regs", &self.regs)
            .field("delay_slot", &self.delay_slot)
            .field("hooks", &self.hooks.len())
            .field("run_state", &self.run_state)
            .field("retired", &self.retired)
            .finish()
    }
}

impl Drop for MipsEngine<'_> {
    fn drop(&mut self) {
        tracing::trace!(retired = self.retired, "engine released");
    }
}

/// [`EngineFamily`] marker for [`MipsEngine`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MipsEngineFamily;

impl EngineFamily for MipsEngineFamily {
    type Engine<'h> = MipsEngine<'h>;
}

struct GuestBus<'a> {
    memory: &'a mut MemoryMap,
    endian: Endian,
}

impl DataBus for GuestBus<'_> {
    fn load(&mut self, address: u32, width: u8) -> Result<u32, EngineError> {
        let address = u64::from(address);
        validate_alignment(AccessKind::Read, address, width)?;
        let mut buf = [0; 4];
        let bytes = &mut buf[..usize::from(width)];
        self.memory
            .read(address, bytes, AccessKind::Read, Permissions::READ)?;
        Ok(match self.endian {
            Endian::Little => bytes
                .iter()
                .rev()
                .fold(0, |acc, byte| (acc << 8) | u32::from(*byte)),
            Endian::Big => bytes
                .iter()
                .fold(0, |acc, byte| (acc << 8) | u32::from(*byte)),
        })
    }

    fn store(&mut self, address: u32, width: u8, value: u32) -> Result<(), EngineError> {
        let address = u64::from(address);
        validate_alignment(AccessKind::Write, address, width)?;
        let width = usize::from(width);
        let word = self.endian.word_to_bytes(value);
        let bytes = match self.endian {
            Endian::Little => &word[..width],
            Endian::Big => &word[4 - width..],
        };
        self.memory
            .write(address, bytes, AccessKind::Write, Permissions::WRITE)
    }
}
