//! Register-level pin access.
//!
//! `PinBank` is the seam to the board's GPIO registers: one atomic read of
//! every input, one atomic read-modify-write of the outputs. `SimPins` backs
//! it with atomics so the control loop and the sequencer can run on a host.

use crate::layout::PinLayout;
use crate::logging::{log, LogCategory, LogLevel};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub trait PinBank: Send + Sync {
    /// Snapshot of every input pin, one bit per GPIO.
    fn read_inputs(&self) -> u32;

    /// Atomically replace the output bits under `mask` with `value`.
    fn modify_outputs(&self, mask: u32, value: u32);

    /// Current output register.
    fn read_outputs(&self) -> u32;

    /// Called once per iteration by free-running pollers. Real registers
    /// leave it empty so the poll rate stays fixed.
    fn pace(&self) {}
}

/// In-memory pin bank.
///
/// Inputs are driven by whoever plays the console and the buttons. Reads and
/// output writes are counted so a driver can tell when a free-running reader
/// has observed a level change.
#[derive(Debug, Default)]
pub struct SimPins {
    inputs: AtomicU32,
    outputs: AtomicU32,
    input_reads: AtomicU64,
    output_writes: AtomicU64,
}

impl SimPins {
    pub fn new(inputs: u32, outputs: u32) -> Self {
        Self {
            inputs: AtomicU32::new(inputs),
            outputs: AtomicU32::new(outputs),
            input_reads: AtomicU64::new(0),
            output_writes: AtomicU64::new(0),
        }
    }

    /// Pins at their pulled levels: buttons high, clock low, outputs low.
    pub fn for_layout(layout: &PinLayout) -> Self {
        Self::new(layout.pull_up_mask(), 0)
    }

    pub fn set_inputs(&self, mask: u32, value: u32) {
        let _ = self
            .inputs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                Some((cur & !mask) | (value & mask))
            });
    }

    pub fn set_pin(&self, pin: u8, high: bool) {
        let bit = 1u32 << pin;
        self.set_inputs(bit, if high { bit } else { 0 });
    }

    /// Inputs without counting a read.
    pub fn peek_inputs(&self) -> u32 {
        self.inputs.load(Ordering::Acquire)
    }

    pub fn input_reads(&self) -> u64 {
        self.input_reads.load(Ordering::Acquire)
    }

    pub fn output_writes(&self) -> u64 {
        self.output_writes.load(Ordering::Acquire)
    }

    /// Spin until at least `target` input reads have happened.
    ///
    /// Returns `false` if `timeout` elapses first, which means nothing is
    /// polling the inputs.
    pub fn wait_for_reads(&self, target: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.input_reads() < target {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::yield_now();
        }
        true
    }
}

impl PinBank for SimPins {
    fn read_inputs(&self) -> u32 {
        let v = self.inputs.load(Ordering::Acquire);
        self.input_reads.fetch_add(1, Ordering::AcqRel);
        v
    }

    fn modify_outputs(&self, mask: u32, value: u32) {
        let _ = self
            .outputs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                Some((cur & !mask) | (value & mask))
            });
        let n = self.output_writes.fetch_add(1, Ordering::AcqRel) + 1;
        log(LogCategory::Pins, LogLevel::Trace, || {
            format!("write #{} mask {:#010x} value {:#010x}", n, mask, value)
        });
    }

    fn read_outputs(&self) -> u32 {
        self.outputs.load(Ordering::Acquire)
    }

    /// Host threads share cores; give them up between polls. Reads are
    /// counted, not timed, so this does not change what the poller sees.
    fn pace(&self) {
        std::thread::yield_now();
    }
}
