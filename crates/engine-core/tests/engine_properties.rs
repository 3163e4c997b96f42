//! Property tests over decode totality and the countdown delay-slot loop.

use engine_core::{
    disassemble_word, Arch, Decoder, Engine, HookFn, HookRange, MipsEngine, Mode, Permissions,
    Register,
};
use proptest::prelude::*;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;
#[cfg(feature = "unicorn")]
use unicorn_engine as _;

const BASE: u64 = 0x10_0000;

fn countdown(start: u16) -> [u32; 4] {
    [0x2404_0000 | u32::from(start), 0x0000_0000, 0x1480_FFFE, 0x2484_FFFF]
}

proptest! {
    #[test]
    fn decode_and_disassembly_are_total(word in any::<u32>()) {
        let row = disassemble_word(0x10_0000, word);
        prop_assert_eq!(row.is_illegal, Decoder::decode(word).is_err());
        prop_assert!(!row.mnemonic.is_empty());
    }

    #[test]
    fn countdown_loop_runs_delay_slot_once_per_pass(start in 1u16..200) {
        let program = countdown(start);
        let bytes: Vec<u8> = program.iter().flat_map(|word| word.to_le_bytes()).collect();

        let mut slot_hits = 0u32;
        let mut total_hits = 0u32;
        let (pc, a0) = {
            let mut engine = MipsEngine::open(Arch::Mips, Mode::MIPS32_LE).expect("open");
            engine.mem_map(BASE, 0x1000, Permissions::ALL).expect("map");
            engine.mem_write(BASE, &bytes).expect("write");
            engine
                .add_code_hook(HookRange::from_bounds(BASE + 12, BASE + 12), Box::new(HookFn(|_, _| slot_hits += 1)))
                .expect("slot hook");
            engine
                .add_code_hook(HookRange::All, Box::new(HookFn(|_, _| total_hits += 1)))
                .expect("all hook");
            engine.emu_start(BASE, BASE + 16, 0, 0).expect("run");
            (
                engine.reg_read(Register::Pc).expect("pc"),
                engine.reg_read(Register::A0).expect("a0"),
            )
        };

        prop_assert_eq!(slot_hits, u32::from(start) + 1);
        prop_assert_eq!(total_hits, 1 + 3 * (u32::from(start) + 1));
        prop_assert_eq!(pc, BASE + 16);
        prop_assert_eq!(a0, 0xFFFF_FFFF);
    }
}
