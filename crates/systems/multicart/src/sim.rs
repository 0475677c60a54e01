//! Host-side stand-in for the console and the button panel.
//!
//! `BoardSim` plays the console clock and the user's fingers against a
//! [`SimPins`] bank and steps the control loop in between. The sequencer
//! keeps running on its own thread. A read is counted before the iteration
//! that made it steps and writes, and the first read counted after a level
//! change may still have loaded the old level. So to be sure `n` samples of
//! the new level have been fully acted on, the simulator waits for `n + 2`
//! counted reads: one for the possibly stale read, one proving the last
//! acted-on iteration finished its side write.

use crate::control::{Action, ControlLoop};
use crate::schedule::ReplaySchedule;
use cartswap_core::layout::PinLayout;
use cartswap_core::logging::{log, LogCategory, LogLevel};
use cartswap_core::pins::{PinBank, SimPins};
use cartswap_core::{ButtonMask, ClockPeriod, SelectMask};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Reads beyond the wanted sample count; see the module docs.
const SETTLE_SLACK: u64 = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("sequencer stopped sampling the clock ({reads} reads in {timeout:?})")]
    SequencerStalled { reads: u64, timeout: Duration },

    #[error("button {0} does not exist on this board")]
    NoSuchButton(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEvent {
    PowerOn,
    Press { button: u8, action: Action },
    ResetHeld { samples: u64 },
    Pulse { index: u64 },
}

/// Select lines as they stood right after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub event: SimEvent,
    pub select: SelectMask,
    pub armed: bool,
}

/// One simulated board.
///
/// Arming starts a sequencer thread that never exits, so every armed
/// `BoardSim` leaves a poller behind for the rest of the process. `SimPins`
/// yields between its polls so many of them can share a test run.
pub struct BoardSim {
    pins: Arc<SimPins>,
    control: ControlLoop<SimPins>,
    layout: PinLayout,
    timeout: Duration,
    pulses: u64,
    trace: Vec<TraceEntry>,
}

impl BoardSim {
    pub fn new(layout: PinLayout, schedule: ReplaySchedule, period: ClockPeriod) -> Self {
        let pins = Arc::new(SimPins::for_layout(&layout));
        let control = ControlLoop::new(Arc::clone(&pins), layout, schedule, period);
        Self {
            pins,
            control,
            layout,
            timeout: Duration::from_secs(5),
            pulses: 0,
            trace: Vec::new(),
        }
    }

    /// Upper bound on waiting for the sequencer to sample a level.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn pins(&self) -> &Arc<SimPins> {
        &self.pins
    }

    pub fn control(&self) -> &ControlLoop<SimPins> {
        &self.control
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    pub fn into_trace(self) -> Vec<TraceEntry> {
        self.trace
    }

    pub fn select(&self) -> SelectMask {
        self.layout.select_from_gpio(self.pins.read_outputs())
    }

    /// Boot default on the select lines, console clock running.
    pub fn power_on(&mut self) {
        self.control.boot();
        self.pins.set_pin(self.layout.clock_pin(), true);
        self.record(SimEvent::PowerOn);
    }

    /// Hold `button` for one poll, then release it for one poll.
    pub fn press(&mut self, button: u8) -> Result<Action, SimError> {
        if button >= self.layout.key_count() {
            return Err(SimError::NoSuchButton(button));
        }
        let key_mask = self.layout.key_mask();
        let held = ButtonMask::pressing(&[button], self.layout.key_count());
        let shift = key_mask.trailing_zeros();

        self.pins.set_inputs(key_mask, held.bits() << shift);
        let action = self.control.poll_once();
        self.pins.set_inputs(key_mask, key_mask);
        self.control.poll_once();

        log(LogCategory::Sim, LogLevel::Debug, || {
            format!("button {} -> {:?}", button, action)
        });
        self.record(SimEvent::Press { button, action });
        Ok(action)
    }

    /// Pull the clock low, as the console does while reset is held, for
    /// `samples` sequencer iterations. Without a sequencer the level is just
    /// left low.
    pub fn hold_reset(&mut self, samples: u64) -> Result<(), SimError> {
        self.pins.set_pin(self.layout.clock_pin(), false);
        if self.control.is_armed() {
            self.settle(samples.max(1))?;
        }
        log(LogCategory::Sim, LogLevel::Info, || {
            format!("reset held for {} samples", samples)
        });
        self.record(SimEvent::ResetHeld { samples });
        Ok(())
    }

    /// One full clock pulse: rise, then fall.
    pub fn pulse(&mut self) -> Result<(), SimError> {
        let clock = self.layout.clock_pin();
        self.pins.set_pin(clock, true);
        self.settle_edge()?;
        self.pins.set_pin(clock, false);
        self.settle_edge()?;

        self.pulses += 1;
        self.record(SimEvent::Pulse { index: self.pulses });
        Ok(())
    }

    pub fn pulses(&mut self, count: u64) -> Result<(), SimError> {
        for _ in 0..count {
            self.pulse()?;
        }
        Ok(())
    }

    fn settle_edge(&self) -> Result<(), SimError> {
        if self.control.is_armed() {
            self.settle(1)
        } else {
            Ok(())
        }
    }

    /// Wait until `samples` iterations have seen the current levels and
    /// finished their side writes.
    fn settle(&self, samples: u64) -> Result<(), SimError> {
        let reads = samples + SETTLE_SLACK;
        let target = self.pins.input_reads() + reads;
        if self.pins.wait_for_reads(target, self.timeout) {
            Ok(())
        } else {
            Err(SimError::SequencerStalled {
                reads,
                timeout: self.timeout,
            })
        }
    }

    fn record(&mut self, event: SimEvent) {
        let entry = TraceEntry {
            event,
            select: self.select(),
            armed: self.control.is_armed(),
        };
        self.trace.push(entry);
    }
}
