//! Button polling and direct cartridge selection.

use crate::armed::ArmedFlag;
use crate::schedule::ReplaySchedule;
use crate::sequencer::{self, SequencerHandle};
use cartswap_core::error::ArmError;
use cartswap_core::layout::PinLayout;
use cartswap_core::logging::{log, LogCategory, LogLevel};
use cartswap_core::pins::PinBank;
use cartswap_core::{ButtonMask, ClockPeriod};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What one poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Nothing held.
    Idle,
    /// Two or more buttons held; ignored.
    Ambiguous,
    /// Trigger held and the sequencer was started.
    Armed,
    /// Trigger held after the sequencer was already started.
    AlreadyArmed,
    /// Cartridge button held; its select line was driven.
    Selected(u8),
    /// Cartridge button held after arming; the lines are not ours anymore.
    Ignored(u8),
}

pub struct ControlLoop<P: PinBank + 'static> {
    pins: Arc<P>,
    layout: PinLayout,
    schedule: ReplaySchedule,
    period: ClockPeriod,
    armed: Arc<ArmedFlag>,
    sequencer: Option<SequencerHandle>,
}

impl<P: PinBank + 'static> ControlLoop<P> {
    pub fn new(pins: Arc<P>, layout: PinLayout, schedule: ReplaySchedule, period: ClockPeriod) -> Self {
        Self {
            pins,
            layout,
            schedule,
            period,
            armed: Arc::new(ArmedFlag::new()),
            sequencer: None,
        }
    }

    pub fn layout(&self) -> &PinLayout {
        &self.layout
    }

    pub fn pins(&self) -> &Arc<P> {
        &self.pins
    }

    pub fn armed_flag(&self) -> Arc<ArmedFlag> {
        Arc::clone(&self.armed)
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_armed()
    }

    pub fn sequencer(&self) -> Option<&SequencerHandle> {
        self.sequencer.as_ref()
    }

    /// Power-on default: every select line high except the last cartridge.
    pub fn boot(&self) {
        if self.is_armed() {
            return;
        }
        let select = self.layout.boot_select();
        self.pins
            .modify_outputs(self.layout.cart_mask(), self.layout.select_to_gpio(select));
        log(LogCategory::Control, LogLevel::Info, || {
            format!("boot selection {}", select)
        });
    }

    /// Read the buttons once and act on them.
    pub fn poll_once(&mut self) -> Action {
        let buttons = self.layout.buttons_from_gpio(self.pins.read_inputs());
        self.handle(buttons)
    }

    fn handle(&mut self, buttons: ButtonMask) -> Action {
        let Some(button) = buttons.single_pressed() else {
            return if buttons.pressed_count() == 0 {
                Action::Idle
            } else {
                log(LogCategory::Control, LogLevel::Trace, || {
                    format!("ignoring {} buttons held at once", buttons.pressed_count())
                });
                Action::Ambiguous
            };
        };

        if button == self.layout.trigger_button() {
            return self.arm();
        }

        if self.is_armed() {
            return Action::Ignored(button);
        }

        match self.layout.select_for_button(button) {
            Some(select) => {
                self.pins
                    .modify_outputs(self.layout.cart_mask(), self.layout.select_to_gpio(select));
                log(LogCategory::Control, LogLevel::Debug, || {
                    format!("button {} selected {}", button, select)
                });
                Action::Selected(button)
            }
            None => Action::Idle,
        }
    }

    fn arm(&mut self) -> Action {
        if self.is_armed() {
            return Action::AlreadyArmed;
        }
        match sequencer::arm(
            Arc::clone(&self.pins),
            self.layout,
            self.schedule,
            &self.armed,
            self.period,
        ) {
            Ok(handle) => {
                self.sequencer = Some(handle);
                Action::Armed
            }
            Err(ArmError::AlreadyArmed) => Action::AlreadyArmed,
            Err(e) => {
                // The flag is claimed either way; nothing to retry.
                log(LogCategory::Control, LogLevel::Error, || {
                    format!("arming failed: {}", e)
                });
                Action::AlreadyArmed
            }
        }
    }

    /// Poll until `stop` is set. An armed sequencer keeps running afterwards.
    pub fn run_until(&mut self, stop: &AtomicBool) {
        while !stop.load(Ordering::Acquire) {
            self.poll_once();
        }
    }

    pub fn run(mut self) -> ! {
        loop {
            self.poll_once();
        }
    }
}
