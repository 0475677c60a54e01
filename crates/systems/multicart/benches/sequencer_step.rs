use cartswap_core::ClockPeriod;
use cartswap_multicart::{Sequencer, SMB3_TAS};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Reset detection counts iterations, so the step rate has to be both high
/// and steady. These track it for the two phases.
fn bench_timeout_polling(c: &mut Criterion) {
    let period = ClockPeriod::new(100);
    c.bench_function("sequencer_timeout_polling", |b| {
        let mut machine = Sequencer::new(SMB3_TAS);
        machine.load_period(period);
        b.iter(|| {
            // One console cycle: a low half-period, then high.
            for _ in 0..period.get() {
                black_box(machine.step(black_box(false)));
            }
            black_box(machine.step(black_box(true)));
        });
    });
}

fn bench_full_replay(c: &mut Criterion) {
    let period = ClockPeriod::new(100);
    c.bench_function("sequencer_full_replay", |b| {
        b.iter(|| {
            let mut machine = Sequencer::new(SMB3_TAS);
            machine.load_period(period);
            for _ in 0..period.reset_threshold() {
                machine.step(black_box(false));
            }
            for _ in 0..SMB3_TAS.total_pulses() {
                machine.step(black_box(true));
                machine.step(black_box(false));
            }
            black_box(machine.side())
        });
    });
}

criterion_group!(benches, bench_timeout_polling, bench_full_replay);
criterion_main!(benches);
