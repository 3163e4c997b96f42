#![no_main]

use engine_core::{
    disassemble_word, Arch, Decoder, Engine, HookFn, HookRange, MipsEngine, Mode, Permissions,
};
use libfuzzer_sys::fuzz_target;

const BASE: u64 = 0x10_0000;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let word = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let _ = Decoder::decode(word);
    let _ = disassemble_word(0x10_0000, word);

    let mut hits = 0u64;
    let Ok(mut engine) = MipsEngine::open(Arch::Mips, Mode::MIPS32_LE) else {
        return;
    };
    if engine.mem_map(BASE, 0x1000, Permissions::ALL).is_err() {
        return;
    }
    let image = &data[..data.len().min(0x1000)];
    if engine.mem_write(BASE, image).is_err() {
        return;
    }

    let _ = engine.add_code_hook(HookRange::All, Box::new(HookFn(|_, _| hits += 1)));
    let _ = engine.emu_start(BASE, BASE + 0x1000, 0, 4096);
});
