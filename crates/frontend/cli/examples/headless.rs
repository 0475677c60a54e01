use cartswap_core::layout::PinLayout;
use cartswap_multicart::{BoardSim, DEFAULT_CLOCK_PERIOD, SMB3_TAS};
use std::env;

fn main() {
    let pulses: u64 = env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(12);

    let layout = PinLayout::default();
    let mut sim = BoardSim::new(layout, SMB3_TAS, DEFAULT_CLOCK_PERIOD);
    sim.power_on();
    sim.press(layout.trigger_button()).unwrap();
    sim.hold_reset(DEFAULT_CLOCK_PERIOD.reset_threshold() * 4).unwrap();
    sim.pulses(pulses).unwrap();

    println!("Headless replay, {} pulses:", pulses);
    println!("{}", serde_json::to_string_pretty(sim.trace()).unwrap());
}
