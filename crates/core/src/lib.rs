//! Core primitives for the cartridge swapper: pin bank access, select and
//! button masks, board layout, errors and logging.

pub mod error;
pub mod layout;
pub mod logging;
pub mod pins;

pub mod types {
    use serde::{Deserialize, Serialize};
    use std::fmt;

    const fn low_bits(width: u8) -> u32 {
        if width >= 32 {
            u32::MAX
        } else {
            (1u32 << width) - 1
        }
    }

    /// Active-low cartridge select pattern. Bit `i` drives cartridge `i`.
    ///
    /// A well-formed mask has exactly one bit clear: the selected cartridge.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct SelectMask {
        bits: u32,
        width: u8,
    }

    impl SelectMask {
        /// Raw pattern over `width` lines; bits above `width` are dropped.
        pub const fn from_bits(bits: u32, width: u8) -> Self {
            Self {
                bits: bits & low_bits(width),
                width,
            }
        }

        /// One-hot active-low mask selecting `cart`.
        pub const fn selecting(cart: u8, width: u8) -> Self {
            Self::from_bits(low_bits(width) & !(1u32 << cart), width)
        }

        /// Every line deasserted.
        pub const fn none(width: u8) -> Self {
            Self::from_bits(u32::MAX, width)
        }

        pub const fn bits(self) -> u32 {
            self.bits
        }

        pub const fn width(self) -> u8 {
            self.width
        }

        /// The selected cartridge, if exactly one line is asserted.
        pub fn selected(self) -> Option<u8> {
            let asserted = !self.bits & low_bits(self.width);
            if asserted.count_ones() == 1 {
                Some(asserted.trailing_zeros() as u8)
            } else {
                None
            }
        }

        pub fn is_one_hot(self) -> bool {
            self.selected().is_some()
        }
    }

    impl fmt::Display for SelectMask {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "0b{:0width$b}", self.bits, width = self.width as usize)
        }
    }

    /// Snapshot of the select buttons, active-low. Bit `i` is button `i`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ButtonMask {
        bits: u32,
        width: u8,
    }

    impl ButtonMask {
        pub const fn from_bits(bits: u32, width: u8) -> Self {
            Self {
                bits: bits & low_bits(width),
                width,
            }
        }

        /// All buttons released (pulled up).
        pub const fn released(width: u8) -> Self {
            Self::from_bits(u32::MAX, width)
        }

        /// Mask with exactly `buttons` held down.
        pub fn pressing(buttons: &[u8], width: u8) -> Self {
            let held = buttons.iter().fold(0u32, |acc, &b| acc | (1 << b));
            Self::from_bits(!held, width)
        }

        pub const fn bits(self) -> u32 {
            self.bits
        }

        pub const fn width(self) -> u8 {
            self.width
        }

        pub fn pressed_count(self) -> u32 {
            (!self.bits & low_bits(self.width)).count_ones()
        }

        pub fn is_pressed(self, button: u8) -> bool {
            button < self.width && self.bits & (1 << button) == 0
        }

        /// The held button, if exactly one is held.
        pub fn single_pressed(self) -> Option<u8> {
            let held = !self.bits & low_bits(self.width);
            if held.count_ones() == 1 {
                Some(held.trailing_zeros() as u8)
            } else {
                None
            }
        }
    }

    /// Sequencer iterations per console clock half-period.
    ///
    /// This is a build-time assumption about the console, not a measurement.
    /// A console whose clock runs at a different rate than the one this value
    /// was tuned against can make reset detection fire early or never.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct ClockPeriod(u32);

    impl ClockPeriod {
        pub const fn new(iterations: u32) -> Self {
            Self(iterations)
        }

        pub const fn get(self) -> u32 {
            self.0
        }

        /// Consecutive low samples that declare a reset.
        pub const fn reset_threshold(self) -> u64 {
            self.0 as u64 + 1
        }
    }
}

pub use types::{ButtonMask, ClockPeriod, SelectMask};
