use blur_effect_config::BLUR_STRENGTH_STEPS;

/// Blur parameters for one strength step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurStrength {
    /// Number of downsample passes.
    pub iterations: usize,
    /// Kawase sample offset.
    pub offset: f32,
    /// Logical pixels the captured background extends past the blurred shape.
    pub expand_size: i32,
}

#[derive(Debug, Clone, Copy)]
struct LevelRange {
    min_offset: f32,
    max_offset: f32,
    expand_size: i32,
}

// Beyond the max offset of a level the blur starts showing artifacts, below the min offset the
// next smaller level looks the same for less work.
const LEVELS: [LevelRange; 4] = [
    LevelRange {
        min_offset: 1.,
        max_offset: 2.5,
        expand_size: 12,
    },
    LevelRange {
        min_offset: 2.,
        max_offset: 3.5,
        expand_size: 24,
    },
    LevelRange {
        min_offset: 2.,
        max_offset: 5.,
        expand_size: 54,
    },
    LevelRange {
        min_offset: 3.,
        max_offset: 8.,
        expand_size: 160,
    },
];

/// Maps the strength setting to iteration count, offset and expand size.
#[derive(Debug, Clone)]
pub struct StrengthTable {
    entries: Vec<BlurStrength>,
}

impl StrengthTable {
    pub fn new() -> Self {
        let steps = BLUR_STRENGTH_STEPS as usize;
        let offset_sum: f32 = LEVELS.iter().map(|l| l.max_offset - l.min_offset).sum();

        let mut entries = Vec::with_capacity(steps);
        for (i, level) in LEVELS.iter().enumerate() {
            let remaining = steps - entries.len();
            if remaining == 0 {
                break;
            }

            let range = level.max_offset - level.min_offset;
            let share = (range / offset_sum * steps as f32).ceil() as usize;
            let level_steps = share.clamp(1, remaining);
            let step = range / level_steps as f32;

            for j in 1..=level_steps {
                entries.push(BlurStrength {
                    iterations: i + 1,
                    offset: level.min_offset + step * j as f32,
                    expand_size: level.expand_size,
                });
            }
        }

        Self { entries }
    }

    /// Entry for `strength`, clamped to `1..=BLUR_STRENGTH_STEPS`.
    pub fn get(&self, strength: u32) -> BlurStrength {
        let index = strength.clamp(1, BLUR_STRENGTH_STEPS) as usize - 1;
        self.entries[index.min(self.entries.len() - 1)]
    }

    pub fn entries(&self) -> &[BlurStrength] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Write as _;

    use super::*;

    #[test]
    fn table_shape() {
        let table = StrengthTable::new();
        let entries = table.entries();
        assert_eq!(entries.len(), BLUR_STRENGTH_STEPS as usize);
        assert_eq!(entries[0].iterations, 1);
        assert_eq!(entries[entries.len() - 1].iterations, 4);
        assert!(entries.windows(2).all(|w| w[0].iterations <= w[1].iterations));
    }

    #[test]
    fn out_of_range_strength_is_clamped() {
        let table = StrengthTable::new();
        assert_eq!(table.get(0), table.get(1));
        assert_eq!(table.get(100), table.get(BLUR_STRENGTH_STEPS));
    }

    #[test]
    fn table_values() {
        let table = StrengthTable::new();
        let mut s = String::new();
        for (i, e) in table.entries().iter().enumerate() {
            writeln!(s, "{:02}: {} {:.2} {}", i + 1, e.iterations, e.offset, e.expand_size).unwrap();
        }
        insta::assert_snapshot!(s, @r"
        01: 1 1.50 12
        02: 1 2.00 12
        03: 1 2.50 12
        04: 2 2.50 24
        05: 2 3.00 24
        06: 2 3.50 24
        07: 3 2.60 54
        08: 3 3.20 54
        09: 3 3.80 54
        10: 3 4.40 54
        11: 3 5.00 54
        12: 4 4.25 160
        13: 4 5.50 160
        14: 4 6.75 160
        15: 4 8.00 160
        ");
    }
}
