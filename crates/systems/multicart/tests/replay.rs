//! End-to-end replay against a live sequencer thread.
//!
//! Each test boots a simulated board, arms the sequencer with the trigger
//! button and plays the console clock at it.

use cartswap_core::layout::PinLayout;
use cartswap_core::pins::PinBank;
use cartswap_core::ClockPeriod;
use cartswap_multicart::{Action, BoardSim, SimEvent, SMB3_TAS};

const PERIOD: ClockPeriod = ClockPeriod::new(50);

fn armed_sim() -> BoardSim {
    let mut sim = BoardSim::new(PinLayout::default(), SMB3_TAS, PERIOD);
    sim.power_on();
    assert_eq!(sim.press(5), Ok(Action::Armed));
    sim
}

fn selected_after_pulses(sim: &BoardSim) -> Vec<u8> {
    sim.trace()
        .iter()
        .filter(|e| matches!(e.event, SimEvent::Pulse { .. }))
        .map(|e| e.select.selected().expect("one-hot select"))
        .collect()
}

#[test]
fn full_replay_scenario() {
    let mut sim = armed_sim();
    sim.hold_reset(PERIOD.reset_threshold() * 4).expect("hold reset");
    assert_eq!(sim.select().selected(), Some(4));

    sim.pulses(7).expect("first seven pulses");
    sim.pulses(4).expect("one pulse per swap");
    sim.pulses(20).expect("parked pulses");

    let mut expected = vec![4, 4, 4, 4, 4, 4, 0, 1, 2, 3, 4];
    expected.extend(std::iter::repeat(4).take(20));
    assert_eq!(selected_after_pulses(&sim), expected);
}

#[test]
fn parked_sequencer_keeps_sampling() {
    let mut sim = armed_sim();
    sim.hold_reset(PERIOD.reset_threshold() * 4).expect("hold reset");
    sim.pulses(SMB3_TAS.total_pulses()).expect("whole schedule");
    assert_eq!(sim.select(), SMB3_TAS.park());

    let writes = sim.pins().output_writes();
    sim.pulses(SMB3_TAS.total_pulses() + 5)
        .expect("pulses after the park still get sampled");
    assert_eq!(sim.select().selected(), Some(4));
    assert_eq!(sim.pins().output_writes(), writes);
    assert!(sim.control().sequencer().map_or(false, |h| h.is_running()));
}

#[test]
fn reset_hold_at_threshold_starts_replay() {
    let mut sim = armed_sim();
    sim.hold_reset(PERIOD.reset_threshold()).expect("hold reset");
    sim.pulses(7).expect("first step");
    assert_eq!(sim.select().selected(), Some(0));
    sim.pulse().expect("second step");
    assert_eq!(sim.select().selected(), Some(1));
}

#[test]
fn replay_waits_for_reset() {
    let mut sim = armed_sim();
    // Clock parked high: the countdown keeps reloading, nothing replays.
    let reads = sim.pins().input_reads();
    assert!(sim
        .pins()
        .wait_for_reads(reads + PERIOD.reset_threshold() * 10, std::time::Duration::from_secs(5)));
    assert_eq!(sim.select().selected(), Some(4));

    sim.hold_reset(PERIOD.reset_threshold() * 4).expect("hold reset");
    sim.pulses(7).expect("first step");
    assert_eq!(sim.select().selected(), Some(0));
}

#[test]
fn buttons_after_arming_do_nothing() {
    let mut sim = armed_sim();
    sim.hold_reset(PERIOD.reset_threshold() * 4).expect("hold reset");
    sim.pulses(7).expect("into the swaps");
    assert_eq!(sim.select().selected(), Some(0));

    let writes = sim.pins().output_writes();
    for button in 0..5 {
        assert_eq!(sim.press(button), Ok(Action::Ignored(button)));
    }
    assert_eq!(sim.press(5), Ok(Action::AlreadyArmed));
    assert_eq!(sim.pins().output_writes(), writes);
    assert_eq!(sim.select().selected(), Some(0));
}

#[test]
fn manual_selection_before_arming_is_overridden_by_replay() {
    let mut sim = BoardSim::new(PinLayout::default(), SMB3_TAS, PERIOD);
    sim.power_on();
    assert_eq!(sim.press(2), Ok(Action::Selected(2)));
    assert_eq!(sim.select().selected(), Some(2));

    assert_eq!(sim.press(5), Ok(Action::Armed));
    sim.hold_reset(PERIOD.reset_threshold() * 4).expect("hold reset");
    // The sequencer owns the lines and starts from its own pattern.
    assert_eq!(sim.select().selected(), Some(4));
    assert_eq!(
        PinLayout::default().select_from_gpio(sim.pins().read_outputs()),
        SMB3_TAS.park()
    );
}

#[test]
fn trace_serializes_to_json() {
    let mut sim = armed_sim();
    sim.hold_reset(PERIOD.reset_threshold() * 2).expect("hold reset");
    sim.pulse().expect("pulse");

    let json = serde_json::to_value(sim.trace()).expect("serialize trace");
    let entries = json.as_array().expect("array");
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0]["event"], "PowerOn");
    assert_eq!(entries[1]["event"]["Press"]["action"], "Armed");
    assert_eq!(entries[3]["armed"], true);
}
