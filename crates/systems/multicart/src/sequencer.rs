//! Clock-synchronous cartridge sequencer.
//!
//! The sequencer samples the console clock (M2) once per iteration. Before a
//! reset it only counts: a high sample reloads the countdown with the clock
//! period, a low sample decrements it, and a low sample taken with the
//! countdown already at zero means the clock has stopped for longer than a
//! bus cycle, i.e. the console's reset button is held. From then on it walks
//! the replay schedule one full clock pulse (rise, then fall) at a time and
//! finally parks on the schedule's park pattern.
//!
//! Every state change carries a side write: the select pattern the new state
//! holds. The free-running executor applies that write immediately after the
//! clock sample that caused it, so the select lines only move right behind a
//! clock edge.
//!
//! [`Sequencer`] is the bare state machine, stepped by hand in tests and
//! benchmarks. [`arm`] hands it to its own thread together with the pin bank
//! and never takes it back.

use crate::armed::ArmedFlag;
use crate::schedule::ReplaySchedule;
use cartswap_core::error::ArmError;
use cartswap_core::layout::PinLayout;
use cartswap_core::logging::{log, LogCategory, LogLevel};
use cartswap_core::pins::PinBank;
use cartswap_core::{ClockPeriod, SelectMask};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{sync_channel, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineState {
    /// Waiting for the clock period.
    Idle,
    /// Countdown loaded; the last sample was high (or none taken yet).
    TimeoutArmed,
    /// Clock low, counting down.
    Polling,
    /// Replaying `step`, waiting for the clock to rise.
    AwaitRise { step: usize, remaining: u32 },
    /// Replaying `step`, waiting for the fall that completes a pulse.
    AwaitFall { step: usize, remaining: u32 },
    /// Parked on the final pattern.
    Looping,
}

impl MachineState {
    /// Reset detection has fired.
    pub fn is_replaying(&self) -> bool {
        matches!(
            self,
            MachineState::AwaitRise { .. } | MachineState::AwaitFall { .. } | MachineState::Looping
        )
    }
}

/// A state change and the side write that goes with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub state: MachineState,
    pub side: SelectMask,
}

#[derive(Debug, Clone)]
pub struct Sequencer {
    schedule: ReplaySchedule,
    period: Option<ClockPeriod>,
    countdown: u32,
    state: MachineState,
    side: SelectMask,
}

impl Sequencer {
    pub fn new(schedule: ReplaySchedule) -> Self {
        Self {
            schedule,
            period: None,
            countdown: 0,
            state: MachineState::Idle,
            side: schedule.park(),
        }
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    /// Pattern currently driven on the select lines.
    pub fn side(&self) -> SelectMask {
        self.side
    }

    pub fn period(&self) -> Option<ClockPeriod> {
        self.period
    }

    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    /// Accept the clock period and start watching for a reset.
    ///
    /// Only the first call does anything; the period is immutable afterwards.
    pub fn load_period(&mut self, period: ClockPeriod) -> Option<Transition> {
        if self.state != MachineState::Idle {
            return None;
        }
        self.period = Some(period);
        self.countdown = period.get();
        self.transition(MachineState::TimeoutArmed, self.schedule.park())
    }

    /// Run one iteration against a clock sample.
    pub fn step(&mut self, clock_high: bool) -> Option<Transition> {
        match self.state {
            MachineState::Idle | MachineState::Looping => None,
            MachineState::TimeoutArmed | MachineState::Polling => {
                if clock_high {
                    self.countdown = self.period.map_or(0, ClockPeriod::get);
                    self.transition(MachineState::TimeoutArmed, self.side)
                } else if self.countdown == 0 {
                    self.enter_step(0)
                } else {
                    self.countdown -= 1;
                    self.transition(MachineState::Polling, self.side)
                }
            }
            MachineState::AwaitRise { step, remaining } => {
                if clock_high {
                    self.transition(MachineState::AwaitFall { step, remaining }, self.side)
                } else {
                    None
                }
            }
            MachineState::AwaitFall { step, remaining } => {
                if clock_high {
                    None
                } else if remaining > 1 {
                    self.transition(
                        MachineState::AwaitRise {
                            step,
                            remaining: remaining - 1,
                        },
                        self.side,
                    )
                } else {
                    self.enter_step(step + 1)
                }
            }
        }
    }

    fn enter_step(&mut self, first: usize) -> Option<Transition> {
        let next = self.schedule.steps()[first.min(self.schedule.len())..]
            .iter()
            .enumerate()
            .find(|(_, s)| s.pulses > 0);
        match next {
            Some((offset, s)) => self.transition(
                MachineState::AwaitRise {
                    step: first + offset,
                    remaining: s.pulses,
                },
                s.pattern,
            ),
            None => self.transition(MachineState::Looping, self.schedule.park()),
        }
    }

    fn transition(&mut self, state: MachineState, side: SelectMask) -> Option<Transition> {
        if state == self.state && side == self.side {
            return None;
        }
        self.state = state;
        self.side = side;
        Some(Transition { state, side })
    }
}

/// Proof that a sequencer thread owns the select lines.
#[derive(Debug)]
pub struct SequencerHandle {
    thread: JoinHandle<()>,
    period: ClockPeriod,
}

impl SequencerHandle {
    pub fn period(&self) -> ClockPeriod {
        self.period
    }

    /// The thread never exits on its own; `false` means it panicked.
    pub fn is_running(&self) -> bool {
        !self.thread.is_finished()
    }
}

/// Start the sequencer on its own thread and hand it the clock period.
///
/// `armed` is claimed first, so at most one sequencer ever exists per flag.
/// If the thread cannot be started the flag stays claimed: the select lines
/// are then owned by nobody until the next power cycle.
pub fn arm<P>(
    pins: Arc<P>,
    layout: PinLayout,
    schedule: ReplaySchedule,
    armed: &ArmedFlag,
    period: ClockPeriod,
) -> Result<SequencerHandle, ArmError>
where
    P: PinBank + 'static,
{
    if !armed.claim() {
        return Err(ArmError::AlreadyArmed);
    }

    let (handoff, receiver) = sync_channel::<ClockPeriod>(1);
    let machine = Sequencer::new(schedule);
    let thread = thread::Builder::new()
        .name("sequencer".to_string())
        .spawn(move || free_run(pins, layout, machine, receiver))?;

    handoff.send(period).map_err(|_| ArmError::HandoffClosed)?;

    log(LogCategory::Sequencer, LogLevel::Info, || {
        format!("armed with clock period {}", period.get())
    });
    Ok(SequencerHandle { thread, period })
}

fn free_run<P: PinBank>(
    pins: Arc<P>,
    layout: PinLayout,
    mut machine: Sequencer,
    handoff: Receiver<ClockPeriod>,
) {
    let Ok(period) = handoff.recv() else {
        return;
    };
    drop(handoff);

    let lines = layout.cart_mask();
    if let Some(t) = machine.load_period(period) {
        pins.modify_outputs(lines, layout.select_to_gpio(t.side));
    }

    // Parked is still a loop: the clock keeps being sampled and `step`
    // returns nothing, so the last side write holds until power is removed.
    loop {
        let before = (machine.state(), machine.side());
        let high = layout.clock_high(pins.read_inputs());
        if let Some(t) = machine.step(high) {
            pins.modify_outputs(lines, layout.select_to_gpio(t.side));
            report(before, &t);
        }
        pins.pace();
    }
}

fn report(before: (MachineState, SelectMask), t: &Transition) {
    let (prev_state, prev_side) = before;
    if !prev_state.is_replaying() && t.state.is_replaying() {
        log(LogCategory::Sequencer, LogLevel::Info, || {
            format!("reset detected, replay started on {}", t.side)
        });
    } else if t.state == MachineState::Looping {
        log(LogCategory::Sequencer, LogLevel::Info, || {
            format!("replay finished, parked on {}", t.side)
        });
    } else if t.side != prev_side {
        log(LogCategory::Sequencer, LogLevel::Debug, || {
            format!("{:?} -> {}", t.state, t.side)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{ReplayStep, SMB3_TAS};
    use cartswap_core::pins::SimPins;
    use std::time::Duration;

    const PERIOD: ClockPeriod = ClockPeriod::new(10);

    fn armed_machine() -> Sequencer {
        let mut m = Sequencer::new(SMB3_TAS);
        m.load_period(PERIOD).expect("idle machine accepts a period");
        m
    }

    /// Hold the clock low long enough to trip reset detection.
    fn hold_reset(m: &mut Sequencer) {
        for _ in 0..PERIOD.reset_threshold() {
            m.step(false);
        }
    }

    fn pulse(m: &mut Sequencer) {
        m.step(true);
        m.step(false);
    }

    #[test]
    fn idle_ignores_clock() {
        let mut m = Sequencer::new(SMB3_TAS);
        assert_eq!(m.step(false), None);
        assert_eq!(m.step(true), None);
        assert_eq!(m.state(), MachineState::Idle);
        assert_eq!(m.side(), SMB3_TAS.park());
    }

    #[test]
    fn period_loads_once() {
        let mut m = Sequencer::new(SMB3_TAS);
        let t = m.load_period(PERIOD).expect("first load");
        assert_eq!(t.state, MachineState::TimeoutArmed);
        assert_eq!(t.side, SMB3_TAS.park());
        assert_eq!(m.countdown(), 10);

        assert_eq!(m.load_period(ClockPeriod::new(99)), None);
        assert_eq!(m.period(), Some(PERIOD));
    }

    #[test]
    fn reset_fires_after_period_plus_one_low_samples() {
        let mut m = armed_machine();
        for i in 0..PERIOD.get() {
            m.step(false);
            assert_eq!(m.state(), MachineState::Polling, "sample {}", i);
        }
        assert_eq!(m.countdown(), 0);
        let t = m.step(false).expect("reset transition");
        assert_eq!(t.state, MachineState::AwaitRise { step: 0, remaining: 7 });
        assert_eq!(t.side.selected(), Some(4));
    }

    #[test]
    fn high_sample_reloads_countdown() {
        let mut m = armed_machine();
        // Ordinary clock: low half-cycles shorter than the period never trip.
        for _ in 0..1_000 {
            for _ in 0..PERIOD.get() {
                m.step(false);
            }
            m.step(true);
            assert_eq!(m.state(), MachineState::TimeoutArmed);
            assert_eq!(m.countdown(), PERIOD.get());
        }
        assert!(!m.state().is_replaying());
    }

    #[test]
    fn replay_follows_schedule() {
        let mut m = armed_machine();
        hold_reset(&mut m);

        let mut seen = Vec::new();
        for _ in 0..SMB3_TAS.total_pulses() + 5 {
            seen.push(m.side().selected().expect("one-hot"));
            pulse(&mut m);
        }
        assert_eq!(seen, vec![4, 4, 4, 4, 4, 4, 4, 0, 1, 2, 3, 4, 4, 4, 4, 4]);
        assert_eq!(m.state(), MachineState::Looping);
    }

    #[test]
    fn side_changes_only_on_falling_edge() {
        let mut m = armed_machine();
        hold_reset(&mut m);
        for _ in 0..6 {
            pulse(&mut m);
        }

        let rise = m.step(true).expect("rise is a transition");
        assert_eq!(rise.state, MachineState::AwaitFall { step: 0, remaining: 1 });
        assert_eq!(rise.side.selected(), Some(4));
        // Holding high changes nothing.
        assert_eq!(m.step(true), None);

        let fall = m.step(false).expect("fall completes the step");
        assert_eq!(fall.state, MachineState::AwaitRise { step: 1, remaining: 1 });
        assert_eq!(fall.side.selected(), Some(0));
        assert_eq!(m.step(false), None);
    }

    #[test]
    fn reset_detection_never_reverts() {
        let mut m = armed_machine();
        hold_reset(&mut m);
        assert!(m.state().is_replaying());

        // Another long low level in the middle of replay is just a low level.
        for _ in 0..PERIOD.reset_threshold() * 3 {
            m.step(false);
        }
        assert_eq!(m.state(), MachineState::AwaitRise { step: 0, remaining: 7 });
    }

    #[test]
    fn parked_machine_accepts_nothing() {
        let mut m = armed_machine();
        hold_reset(&mut m);
        for _ in 0..SMB3_TAS.total_pulses() {
            pulse(&mut m);
        }
        assert_eq!(m.state(), MachineState::Looping);
        for high in [true, false, true, false, false] {
            assert_eq!(m.step(high), None);
        }
        assert_eq!(m.side(), SMB3_TAS.park());
    }

    #[test]
    fn zero_pulse_steps_are_skipped() {
        static STEPS: [ReplayStep; 3] = [
            ReplayStep::new(0, SelectMask::selecting(1, 3)),
            ReplayStep::new(2, SelectMask::selecting(0, 3)),
            ReplayStep::new(0, SelectMask::selecting(1, 3)),
        ];
        let schedule = ReplaySchedule::new(&STEPS, SelectMask::selecting(2, 3));
        let mut m = Sequencer::new(schedule);
        m.load_period(ClockPeriod::new(0));

        let t = m.step(false).expect("zero period trips on first low");
        assert_eq!(t.state, MachineState::AwaitRise { step: 1, remaining: 2 });

        pulse(&mut m);
        assert_eq!(m.side().selected(), Some(0));
        pulse(&mut m);
        assert_eq!(m.state(), MachineState::Looping);
        assert_eq!(m.side().selected(), Some(2));
    }

    #[test]
    fn empty_schedule_parks_on_reset() {
        static NONE: [ReplayStep; 0] = [];
        let schedule = ReplaySchedule::new(&NONE, SelectMask::selecting(1, 2));
        let mut m = Sequencer::new(schedule);
        m.load_period(ClockPeriod::new(1));
        m.step(false);
        let t = m.step(false).expect("reset");
        assert_eq!(t.state, MachineState::Looping);
        assert_eq!(t.side.selected(), Some(1));
    }

    #[test]
    fn arm_twice_is_rejected() {
        let layout = PinLayout::default();
        let pins = Arc::new(SimPins::for_layout(&layout));
        pins.set_pin(layout.clock_pin(), true);
        let flag = ArmedFlag::new();

        let handle = arm(Arc::clone(&pins), layout, SMB3_TAS, &flag, PERIOD).expect("first arm");
        assert_eq!(handle.period(), PERIOD);
        assert!(matches!(
            arm(Arc::clone(&pins), layout, SMB3_TAS, &flag, PERIOD),
            Err(ArmError::AlreadyArmed)
        ));

        // The running sequencer is sampling the clock.
        let start = pins.input_reads();
        assert!(pins.wait_for_reads(start + 100, Duration::from_secs(5)));
        assert!(handle.is_running());
        assert_eq!(
            layout.select_from_gpio(pins.read_outputs()),
            SMB3_TAS.park()
        );
    }
}
