//! Program image exercising a branch delay slot.
//!
//! The image is a four-instruction little-endian MIPS32 countdown loop:
//!
//! ```text
//! base+0x0  li    $a0, N
//! base+0x4  nop                    loop top
//! base+0x8  bnez  $a0, loop top
//! base+0xC  addiu $a0, $a0, -1     delay slot (witness)
//! ```
//!
//! The decrement sits in the delay slot, so it runs on every pass including
//! the final not-taken one, and the loop top retires `N + 1` times.

use crate::errors::ImageError;

/// Load address of the reference image.
pub const REFERENCE_BASE: u64 = 0x10_0000;
/// Loop count encoded in the reference image.
pub const REFERENCE_LOOP_COUNT: u16 = 2;
/// Width of every instruction in the image.
pub const INSTRUCTION_BYTES: u64 = 4;

/// Reference image bytes, exactly as loaded.
pub const REFERENCE_BYTES: [u8; 16] = [
    0x02, 0x00, 0x04, 0x24, // li    $a0, 2
    0x00, 0x00, 0x00, 0x00, // nop
    0xFE, 0xFF, 0x80, 0x14, // bnez  $a0, -2
    0xFF, 0xFF, 0x84, 0x24, // addiu $a0, $a0, -1
];

const LI_A0: u32 = 0x2404_0000;
const NOP: u32 = 0x0000_0000;
const BNEZ_A0_BACK_ONE: u32 = 0x1480_FFFE;
const DECREMENT_A0: u32 = 0x2484_FFFF;
const ADDRESS_SPACE_END: u64 = 1 << 32;

/// Immutable program image with a fixed load address.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ProgramImage {
    base: u64,
    loop_count: u16,
    bytes: Vec<u8>,
}

impl ProgramImage {
    /// The reference image at [`REFERENCE_BASE`] with `N = 2`.
    #[must_use]
    pub fn reference() -> Self {
        Self {
            base: REFERENCE_BASE,
            loop_count: REFERENCE_LOOP_COUNT,
            bytes: REFERENCE_BYTES.to_vec(),
        }
    }

    /// Builds the countdown loop for `loop_count` at `base`.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError`] when `loop_count` does not fit the signed
    /// immediate, or `base` is misaligned or too high for the image.
    pub fn delay_slot_loop(base: u64, loop_count: u16) -> Result<Self, ImageError> {
        if loop_count > 0x7FFF {
            return Err(ImageError::LoopCountOutOfRange(loop_count));
        }
        if base % INSTRUCTION_BYTES != 0 {
            return Err(ImageError::MisalignedBase(base));
        }
        if base > ADDRESS_SPACE_END - 4 * INSTRUCTION_BYTES {
            return Err(ImageError::BaseOutOfRange(base));
        }

        let words = [
            LI_A0 | u32::from(loop_count),
            NOP,
            BNEZ_A0_BACK_ONE,
            DECREMENT_A0,
        ];
        Ok(Self {
            base,
            loop_count,
            bytes: words.iter().flat_map(|word| word.to_le_bytes()).collect(),
        })
    }

    /// Load address.
    #[must_use]
    pub const fn base(&self) -> u64 {
        self.base
    }

    /// Image bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Image length in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Returns `true` when the image holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Loop count `N` loaded into the counter register.
    #[must_use]
    pub const fn loop_count(&self) -> u16 {
        self.loop_count
    }

    /// Address of the `nop` at the top of the loop.
    #[must_use]
    pub const fn loop_top(&self) -> u64 {
        self.base + INSTRUCTION_BYTES
    }

    /// Address of the backward branch.
    #[must_use]
    pub const fn branch(&self) -> u64 {
        self.base + 2 * INSTRUCTION_BYTES
    }

    /// Address of the delay-slot decrement.
    #[must_use]
    pub const fn witness(&self) -> u64 {
        self.base + 3 * INSTRUCTION_BYTES
    }

    /// First address past the image; execution stops here.
    #[must_use]
    pub fn exit(&self) -> u64 {
        self.base + self.len()
    }

    /// Every instruction address in `[base, exit)`.
    pub fn instruction_addresses(&self) -> impl Iterator<Item = u64> + '_ {
        (self.base..self.exit()).step_by(4)
    }

    /// Number of times the loop top retires.
    #[must_use]
    pub const fn expected_iterations(&self) -> u32 {
        self.loop_count as u32 + 1
    }

    /// Architecturally expected retirement order.
    #[must_use]
    pub fn expected_trace(&self) -> Vec<u64> {
        let pass = [self.loop_top(), self.branch(), self.witness()];
        std::iter::once(self.base)
            .chain(
                std::iter::repeat(pass)
                    .take(self.expected_iterations() as usize)
                    .flatten(),
            )
            .collect()
    }

    /// Counter value after the final delay slot decrements past zero.
    ///
    /// This is deliberately `0xFFFF_FFFF`, not `0`: the decrement in the
    /// delay slot also runs on the last, not-taken pass of the branch, so the
    /// counter wraps once more after reaching zero.
    #[must_use]
    pub const fn expected_final_counter(&self) -> u64 {
        0xFFFF_FFFF
    }
}

#[cfg(test)]
mod tests {
    use super::{ProgramImage, REFERENCE_BASE, REFERENCE_BYTES};
    use crate::errors::ImageError;

    #[test]
    fn reference_image_matches_generated_loop() {
        let generated =
            ProgramImage::delay_slot_loop(REFERENCE_BASE, 2).expect("reference parameters fit");
        assert_eq!(generated, ProgramImage::reference());
        assert_eq!(generated.bytes(), REFERENCE_BYTES);
    }

    #[test]
    fn derived_addresses_follow_base() {
        let image = ProgramImage::reference();
        assert_eq!(image.loop_top(), 0x10_0004);
        assert_eq!(image.branch(), 0x10_0008);
        assert_eq!(image.witness(), 0x10_000C);
        assert_eq!(image.exit(), 0x10_0010);
        assert_eq!(
            image.instruction_addresses().collect::<Vec<_>>(),
            vec![0x10_0000, 0x10_0004, 0x10_0008, 0x10_000C]
        );
    }

    #[test]
    fn expected_trace_repeats_loop_body_n_plus_one_times() {
        let image = ProgramImage::reference();
        assert_eq!(image.expected_iterations(), 3);
        assert_eq!(
            image.expected_trace(),
            vec![
                0x10_0000, 0x10_0004, 0x10_0008, 0x10_000C, 0x10_0004, 0x10_0008, 0x10_000C,
                0x10_0004, 0x10_0008, 0x10_000C,
            ]
        );
    }

    #[test]
    fn zero_loop_count_runs_body_once() {
        let image = ProgramImage::delay_slot_loop(0x2000, 0).expect("zero fits");
        assert_eq!(image.expected_trace(), vec![0x2000, 0x2004, 0x2008, 0x200C]);
        assert_eq!(&image.bytes()[..4], &[0x00, 0x00, 0x04, 0x24]);
    }

    #[test]
    fn final_counter_wraps_past_zero() {
        for loop_count in [0, 2, 0x7FFF] {
            let image = ProgramImage::delay_slot_loop(0x2000, loop_count).expect("fits");
            assert_ne!(image.expected_final_counter(), 0);
            assert_eq!(image.expected_final_counter(), u64::from(0u32.wrapping_sub(1)));
        }
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert_eq!(
            ProgramImage::delay_slot_loop(REFERENCE_BASE, 0x8000),
            Err(ImageError::LoopCountOutOfRange(0x8000))
        );
        assert_eq!(
            ProgramImage::delay_slot_loop(0x10_0002, 2),
            Err(ImageError::MisalignedBase(0x10_0002))
        );
        assert_eq!(
            ProgramImage::delay_slot_loop(0xFFFF_FFF4, 2),
            Err(ImageError::BaseOutOfRange(0xFFFF_FFF4))
        );
        assert!(ProgramImage::delay_slot_loop(0xFFFF_FFF0, 2).is_ok());
    }
}
