//! Compiled cartridge swap schedules.
//!
//! A schedule is a list of (pulse count, select pattern) steps followed by
//! the pattern the sequencer parks on forever. Schedules are `'static` data:
//! there is no way to build or edit one at run time.

use cartswap_core::SelectMask;

/// Hold `pattern` on the select lines for `pulses` full clock pulses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStep {
    pub pulses: u32,
    pub pattern: SelectMask,
}

impl ReplayStep {
    pub const fn new(pulses: u32, pattern: SelectMask) -> Self {
        Self { pulses, pattern }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySchedule {
    steps: &'static [ReplayStep],
    park: SelectMask,
}

impl ReplaySchedule {
    pub const fn new(steps: &'static [ReplayStep], park: SelectMask) -> Self {
        Self { steps, park }
    }

    pub fn steps(&self) -> &'static [ReplayStep] {
        self.steps
    }

    pub fn step(&self, index: usize) -> Option<&'static ReplayStep> {
        self.steps.get(index)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Pattern held after the last step.
    pub fn park(&self) -> SelectMask {
        self.park
    }

    /// Clock pulses from the end of the reset until the sequencer parks.
    pub fn total_pulses(&self) -> u64 {
        self.steps.iter().map(|s| s.pulses as u64).sum()
    }

    /// Pattern on the select lines after `pulses` complete pulses of replay.
    pub fn pattern_after(&self, pulses: u64) -> SelectMask {
        let mut elapsed = 0u64;
        for step in self.steps {
            elapsed += step.pulses as u64;
            if pulses < elapsed {
                return step.pattern;
            }
        }
        self.park
    }
}

const CARTS: u8 = 5;

/// Super Mario Bros.
pub const PATTERN_SMB: SelectMask = SelectMask::selecting(0, CARTS);
/// Dash Galaxy in the Alien Asylum
pub const PATTERN_DASH_GALAXY: SelectMask = SelectMask::selecting(1, CARTS);
/// Kung Fu
pub const PATTERN_KUNG_FU: SelectMask = SelectMask::selecting(2, CARTS);
/// Pipe Dream
pub const PATTERN_PIPE_DREAM: SelectMask = SelectMask::selecting(3, CARTS);
/// Super Mario Bros. 3, also the power-on selection.
pub const PATTERN_SMB3: SelectMask = SelectMask::selecting(4, CARTS);

/// Titles on the select lines of the stock board, by cartridge index.
pub const CARTRIDGE_TITLES: [&str; CARTS as usize] = [
    "Super Mario Bros.",
    "Dash Galaxy in the Alien Asylum",
    "Kung Fu",
    "Pipe Dream",
    "Super Mario Bros. 3",
];

const SMB3_TAS_STEPS: [ReplayStep; 5] = [
    ReplayStep::new(7, PATTERN_SMB3),
    ReplayStep::new(1, PATTERN_SMB),
    ReplayStep::new(1, PATTERN_DASH_GALAXY),
    ReplayStep::new(1, PATTERN_KUNG_FU),
    ReplayStep::new(1, PATTERN_PIPE_DREAM),
];

/// Seven pulses on SMB3 after reset, one pulse on each of the other four
/// cartridges, then back to SMB3 for good.
pub const SMB3_TAS: ReplaySchedule = ReplaySchedule::new(&SMB3_TAS_STEPS, PATTERN_SMB3);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smb3_tas_shape() {
        let pulses: Vec<u32> = SMB3_TAS.steps().iter().map(|s| s.pulses).collect();
        assert_eq!(pulses, vec![7, 1, 1, 1, 1]);
        assert_eq!(SMB3_TAS.total_pulses(), 11);
        assert_eq!(SMB3_TAS.park(), PATTERN_SMB3);

        let bits: Vec<u32> = SMB3_TAS.steps().iter().map(|s| s.pattern.bits()).collect();
        assert_eq!(bits, vec![0b01111, 0b11110, 0b11101, 0b11011, 0b10111]);
    }

    #[test]
    fn every_pattern_selects_one_cartridge() {
        for step in SMB3_TAS.steps() {
            assert!(step.pattern.is_one_hot(), "{} is not one-hot", step.pattern);
            assert!(step.pulses > 0);
        }
        assert!(SMB3_TAS.park().is_one_hot());
    }

    #[test]
    fn pattern_after_walks_the_steps() {
        for p in 0..7 {
            assert_eq!(SMB3_TAS.pattern_after(p).selected(), Some(4));
        }
        assert_eq!(SMB3_TAS.pattern_after(7).selected(), Some(0));
        assert_eq!(SMB3_TAS.pattern_after(8).selected(), Some(1));
        assert_eq!(SMB3_TAS.pattern_after(9).selected(), Some(2));
        assert_eq!(SMB3_TAS.pattern_after(10).selected(), Some(3));
        assert_eq!(SMB3_TAS.pattern_after(11).selected(), Some(4));
        assert_eq!(SMB3_TAS.pattern_after(1_000).selected(), Some(4));
    }

    #[test]
    fn empty_schedule_is_parked() {
        static NONE: [ReplayStep; 0] = [];
        let s = ReplaySchedule::new(&NONE, PATTERN_SMB);
        assert!(s.is_empty());
        assert_eq!(s.pattern_after(0), PATTERN_SMB);
    }
}
