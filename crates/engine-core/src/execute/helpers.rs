//! Helper functions for instruction execution.

#![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]

use crate::encoding::OpcodeEncoding;
use crate::EngineError;

/// Signed 32-bit addition that traps on overflow, as `ADD`/`ADDI` do.
pub const fn add_trapping(a: u32, b: u32) -> Result<u32, EngineError> {
    match (a as i32).checked_add(b as i32) {
        Some(sum) => Ok(sum as u32),
        None => Err(EngineError::Exception),
    }
}

/// Signed 32-bit subtraction that traps on overflow, as `SUB` does.
pub const fn sub_trapping(a: u32, b: u32) -> Result<u32, EngineError> {
    match (a as i32).checked_sub(b as i32) {
        Some(diff) => Ok(diff as u32),
        None => Err(EngineError::Exception),
    }
}

/// Sign-extends a 16-bit immediate.
pub const fn sign_extend_16(value: u16) -> u32 {
    value as i16 as i32 as u32
}

/// Sign-extends the low byte.
pub const fn sign_extend_8(value: u32) -> u32 {
    value as u8 as i8 as i32 as u32
}

/// Sign-extends the low halfword.
pub const fn sign_extend_halfword(value: u32) -> u32 {
    value as u16 as i16 as i32 as u32
}

/// Arithmetic right shift.
pub const fn shift_right_arithmetic(value: u32, amount: u32) -> u32 {
    ((value as i32) >> (amount & 0x1F)) as u32
}

/// Signed 32x32 multiply split into `(hi, lo)`.
#[allow(clippy::cast_possible_truncation)]
pub const fn multiply_signed(a: u32, b: u32) -> (u32, u32) {
    let product = (a as i32 as i64) * (b as i32 as i64);
    ((product >> 32) as u32, product as u32)
}

/// Unsigned 32x32 multiply split into `(hi, lo)`.
#[allow(clippy::cast_possible_truncation)]
pub const fn multiply_unsigned(a: u32, b: u32) -> (u32, u32) {
    let product = (a as u64) * (b as u64);
    ((product >> 32) as u32, product as u32)
}

/// Signed division producing `(remainder, quotient)` for `(hi, lo)`.
///
/// Returns `None` for a zero divisor; the architecture leaves `HI`/`LO`
/// unpredictable there and this engine keeps them unchanged.
pub const fn divide_signed(a: u32, b: u32) -> Option<(u32, u32)> {
    if b == 0 {
        return None;
    }
    let (a, b) = (a as i32, b as i32);
    Some((a.wrapping_rem(b) as u32, a.wrapping_div(b) as u32))
}

/// Unsigned division producing `(remainder, quotient)` for `(hi, lo)`.
pub const fn divide_unsigned(a: u32, b: u32) -> Option<(u32, u32)> {
    if b == 0 {
        return None;
    }
    Some((a % b, a / b))
}

/// Access width in bytes for load and store encodings.
pub const fn access_width(encoding: OpcodeEncoding) -> Option<u8> {
    match encoding {
        OpcodeEncoding::Lb | OpcodeEncoding::Lbu | OpcodeEncoding::Sb => Some(1),
        OpcodeEncoding::Lh | OpcodeEncoding::Lhu | OpcodeEncoding::Sh => Some(2),
        OpcodeEncoding::Lw | OpcodeEncoding::Sw => Some(4),
        _ => None,
    }
}
