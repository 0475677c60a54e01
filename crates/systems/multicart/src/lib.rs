//! Cartridge multiplexer with a clock-synchronous replay sequencer.
//!
//! The [`ControlLoop`] polls the select buttons and drives the cartridge
//! select lines directly until the trigger button arms the sequencer. From
//! then on the lines belong to the sequencer thread, which waits for the
//! console's reset (the M2 clock stopping) and replays the compiled swap
//! schedule in step with the clock.

mod armed;
pub mod control;
pub mod schedule;
pub mod sequencer;
pub mod sim;

pub use armed::ArmedFlag;
pub use control::{Action, ControlLoop};
pub use schedule::{ReplaySchedule, ReplayStep, CARTRIDGE_TITLES, SMB3_TAS};
pub use sequencer::{MachineState, Sequencer, SequencerHandle, Transition};
pub use sim::{BoardSim, SimError, SimEvent, TraceEntry};

use cartswap_core::layout::PinLayout;
use cartswap_core::pins::PinBank;
use cartswap_core::ClockPeriod;
use std::sync::Arc;

/// Sequencer iterations per half M2 cycle, tuned against an NTSC console.
///
/// Not measured at run time. Consoles clocked differently need a rebuild
/// with a different value.
pub const DEFAULT_CLOCK_PERIOD: ClockPeriod = ClockPeriod::new(100);

/// Control loop for the stock board: default wiring, SMB3 schedule,
/// [`DEFAULT_CLOCK_PERIOD`].
pub fn stock_control_loop<P: PinBank + 'static>(pins: Arc<P>) -> ControlLoop<P> {
    ControlLoop::new(pins, PinLayout::default(), SMB3_TAS, DEFAULT_CLOCK_PERIOD)
}

/// Title of the cartridge a select pattern points at, if any.
pub fn title_of(select: cartswap_core::SelectMask) -> Option<&'static str> {
    select
        .selected()
        .and_then(|cart| CARTRIDGE_TITLES.get(cart as usize).copied())
}
