//! Deterministic run fingerprint used for cross-host comparison.
//!
//! Runs the countdown delay-slot loop on the reference engine and folds the
//! hook trace, final registers, and code region into one FNV-1a hash.

use engine_core::{Arch, Engine, HookFn, HookRange, MipsEngine, Mode, Permissions, Register};
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;
#[cfg(feature = "unicorn")]
use unicorn_engine as _;

const BASE: u64 = 0x10_0000;
const CODE: [u8; 16] = [
    0x02, 0x00, 0x04, 0x24, 0x00, 0x00, 0x00, 0x00, 0xFE, 0xFF, 0x80, 0x14, 0xFF, 0xFF, 0x84, 0x24,
];

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

fn fingerprint() -> String {
    let mut trace = Vec::new();
    let mut hash = 0xcbf2_9ce4_8422_2325_u64;

    {
        let mut engine =
            MipsEngine::open(Arch::Mips, Mode::MIPS32_LE).expect("reference engine should open");
        engine
            .mem_map(BASE, 0x1000, Permissions::ALL)
            .expect("code region should map");
        engine.mem_write(BASE, &CODE).expect("code should load");
        engine
            .add_code_hook(
                HookRange::All,
                Box::new(HookFn(|address, _| trace.push(address))),
            )
            .expect("hook should register");
        engine
            .emu_start(BASE, BASE + 16, 0, 0)
            .expect("run should reach until");

        for register in [Register::Pc, Register::A0, Register::Hi, Register::Lo] {
            let value = engine.reg_read(register).expect("register should read");
            hash_bytes(&mut hash, &value.to_le_bytes());
        }
        let mut memory = vec![0; 0x1000];
        engine
            .mem_read(BASE, &mut memory)
            .expect("code region should read");
        hash_bytes(&mut hash, &memory);
        hash_bytes(&mut hash, &engine.retired().to_le_bytes());
    }

    for address in trace {
        hash_bytes(&mut hash, &address.to_le_bytes());
    }

    format!("{hash:016x}")
}

fn main() {
    println!("{}", fingerprint());
}
