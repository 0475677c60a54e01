//! Board wiring: which GPIOs carry the buttons, the cartridge select lines and
//! the console clock.

use crate::error::LayoutError;
use crate::types::{ButtonMask, SelectMask};

/// Number of user GPIOs on the board's single I/O bank.
pub const GPIO_BANK_SIZE: u8 = 30;

/// GPIO assignment for one board.
///
/// Buttons and select lines are contiguous runs. The last button is the
/// replay trigger; button `i` below it selects cartridge `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinLayout {
    key_base: u8,
    key_count: u8,
    cart_base: u8,
    cart_count: u8,
    clock_pin: u8,
}

impl Default for PinLayout {
    /// Six buttons on GPIO 0-5, five select lines on GPIO 6-10, clock (M2) on
    /// GPIO 11.
    fn default() -> Self {
        Self {
            key_base: 0,
            key_count: 6,
            cart_base: 6,
            cart_count: 5,
            clock_pin: 11,
        }
    }
}

fn run_mask(base: u8, count: u8) -> u32 {
    (((1u64 << count) - 1) << base) as u32
}

impl PinLayout {
    pub fn new(
        key_base: u8,
        key_count: u8,
        cart_base: u8,
        cart_count: u8,
        clock_pin: u8,
    ) -> Result<Self, LayoutError> {
        if key_count < 2 {
            return Err(LayoutError::TooFewButtons(key_count));
        }
        if cart_count == 0 {
            return Err(LayoutError::NoCartridges);
        }
        if key_count - 1 > cart_count {
            return Err(LayoutError::ButtonsExceedCartridges {
                buttons: key_count - 1,
                carts: cart_count,
            });
        }

        let key_last = key_base as u16 + key_count as u16 - 1;
        let cart_last = cart_base as u16 + cart_count as u16 - 1;
        for last in [key_last, cart_last, clock_pin as u16] {
            if last >= GPIO_BANK_SIZE as u16 {
                return Err(LayoutError::PinOutOfRange {
                    pin: last.min(u8::MAX as u16) as u8,
                    bank: GPIO_BANK_SIZE,
                });
            }
        }

        let layout = Self {
            key_base,
            key_count,
            cart_base,
            cart_count,
            clock_pin,
        };

        let overlap = layout.key_mask() & layout.cart_mask();
        if overlap != 0 {
            return Err(LayoutError::Overlap {
                group: "button",
                other: "cartridge",
                pin: overlap.trailing_zeros() as u8,
            });
        }
        if layout.clock_mask() & layout.key_mask() != 0 {
            return Err(LayoutError::Overlap {
                group: "clock",
                other: "button",
                pin: clock_pin,
            });
        }
        if layout.clock_mask() & layout.cart_mask() != 0 {
            return Err(LayoutError::Overlap {
                group: "clock",
                other: "cartridge",
                pin: clock_pin,
            });
        }

        Ok(layout)
    }

    pub fn key_count(&self) -> u8 {
        self.key_count
    }

    pub fn cart_count(&self) -> u8 {
        self.cart_count
    }

    pub fn clock_pin(&self) -> u8 {
        self.clock_pin
    }

    /// Index of the button that arms the sequencer.
    pub fn trigger_button(&self) -> u8 {
        self.key_count - 1
    }

    pub fn key_mask(&self) -> u32 {
        run_mask(self.key_base, self.key_count)
    }

    pub fn cart_mask(&self) -> u32 {
        run_mask(self.cart_base, self.cart_count)
    }

    pub fn clock_mask(&self) -> u32 {
        1 << self.clock_pin
    }

    /// Inputs with pull-ups enabled: every button.
    pub fn pull_up_mask(&self) -> u32 {
        self.key_mask()
    }

    pub fn buttons_from_gpio(&self, raw: u32) -> ButtonMask {
        ButtonMask::from_bits(raw >> self.key_base, self.key_count)
    }

    pub fn clock_high(&self, raw: u32) -> bool {
        raw & self.clock_mask() != 0
    }

    pub fn select_from_gpio(&self, raw: u32) -> SelectMask {
        SelectMask::from_bits(raw >> self.cart_base, self.cart_count)
    }

    pub fn select_to_gpio(&self, select: SelectMask) -> u32 {
        (select.bits() << self.cart_base) & self.cart_mask()
    }

    /// Power-on selection: the last cartridge.
    pub fn boot_select(&self) -> SelectMask {
        SelectMask::selecting(self.cart_count - 1, self.cart_count)
    }

    /// Select pattern for a cartridge button, or `None` for the trigger.
    pub fn select_for_button(&self, button: u8) -> Option<SelectMask> {
        if button >= self.trigger_button() {
            None
        } else {
            Some(SelectMask::selecting(button, self.cart_count))
        }
    }
}
