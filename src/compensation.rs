//! Temperature compensation table: per-(size, temperature band) stage timing.

use crate::geometry::PanelSize;

/// Ambient temperature band used to index the compensation table.
///
/// Band 0 covers cold panels (`< 10 °C`), band 1 the normal operating range
/// (`10..=40 °C`), band 2 hot panels (`> 40 °C`). Warmer panels need fewer
/// stage repeats and shorter stage-2 intervals because the film's particle
/// mobility increases with temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureBand {
    Cold,
    Normal,
    Hot,
}

impl TemperatureBand {
    /// Selects a band for a temperature given in whole degrees Celsius.
    ///
    /// Boundary literals: `9 -> Cold`, `10 -> Normal`, `40 -> Normal`, `41 -> Hot`.
    pub fn for_temperature(celsius: i16) -> TemperatureBand {
        if celsius < 10 {
            TemperatureBand::Cold
        } else if celsius > 40 {
            TemperatureBand::Hot
        } else {
            TemperatureBand::Normal
        }
    }

    const fn index(self) -> usize {
        match self {
            TemperatureBand::Cold => 0,
            TemperatureBand::Normal => 1,
            TemperatureBand::Hot => 2,
        }
    }
}

/// Per-stage repeat/step/block/timing parameters for one (size, temperature
/// band) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compensation {
    pub s1_repeat: u16,
    pub s1_step: u16,
    pub s1_block: u16,
    pub s2_repeat: u16,
    pub s2_t1_ms: u32,
    pub s2_t2_ms: u32,
    pub s3_repeat: u16,
    pub s3_step: u16,
    pub s3_block: u16,
}

// Three bands per size: [Cold, Normal, Hot].
const TABLE_1_44: [Compensation; 3] = [
    Compensation { s1_repeat: 4, s1_step: 4, s1_block: 48, s2_repeat: 8, s2_t1_ms: 392, s2_t2_ms: 392, s3_repeat: 4, s3_step: 4, s3_block: 48 },
    Compensation { s1_repeat: 2, s1_step: 4, s1_block: 48, s2_repeat: 4, s2_t1_ms: 196, s2_t2_ms: 196, s3_repeat: 2, s3_step: 4, s3_block: 48 },
    Compensation { s1_repeat: 2, s1_step: 4, s1_block: 48, s2_repeat: 2, s2_t1_ms: 98, s2_t2_ms: 98, s3_repeat: 2, s3_step: 4, s3_block: 48 },
];

const TABLE_2_0: [Compensation; 3] = [
    Compensation { s1_repeat: 4, s1_step: 2, s1_block: 48, s2_repeat: 8, s2_t1_ms: 392, s2_t2_ms: 392, s3_repeat: 4, s3_step: 2, s3_block: 48 },
    Compensation { s1_repeat: 2, s1_step: 2, s1_block: 48, s2_repeat: 4, s2_t1_ms: 196, s2_t2_ms: 196, s3_repeat: 2, s3_step: 2, s3_block: 48 },
    Compensation { s1_repeat: 2, s1_step: 2, s1_block: 48, s2_repeat: 2, s2_t1_ms: 98, s2_t2_ms: 98, s3_repeat: 2, s3_step: 2, s3_block: 48 },
];

const TABLE_2_7: [Compensation; 3] = [
    Compensation { s1_repeat: 4, s1_step: 8, s1_block: 44, s2_repeat: 10, s2_t1_ms: 480, s2_t2_ms: 480, s3_repeat: 4, s3_step: 8, s3_block: 44 },
    Compensation { s1_repeat: 2, s1_step: 8, s1_block: 44, s2_repeat: 4, s2_t1_ms: 240, s2_t2_ms: 240, s3_repeat: 2, s3_step: 8, s3_block: 44 },
    Compensation { s1_repeat: 2, s1_step: 8, s1_block: 44, s2_repeat: 2, s2_t1_ms: 120, s2_t2_ms: 120, s3_repeat: 2, s3_step: 8, s3_block: 44 },
];

/// Looks up the compensation record for a (size, band) pair.
pub const fn compensation(size: PanelSize, band: TemperatureBand) -> &'static Compensation {
    let table = match size {
        PanelSize::Inch1_44 => &TABLE_1_44,
        PanelSize::Inch2_0 => &TABLE_2_0,
        PanelSize::Inch2_7 => &TABLE_2_7,
    };
    &table[band.index()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_selection_boundaries() {
        assert_eq!(TemperatureBand::for_temperature(9), TemperatureBand::Cold);
        assert_eq!(TemperatureBand::for_temperature(10), TemperatureBand::Normal);
        assert_eq!(TemperatureBand::for_temperature(40), TemperatureBand::Normal);
        assert_eq!(TemperatureBand::for_temperature(41), TemperatureBand::Hot);
        assert_eq!(TemperatureBand::for_temperature(-40), TemperatureBand::Cold);
    }

    #[test]
    fn two_inch_normal_band_matches_spec_example() {
        let c = compensation(PanelSize::Inch2_0, TemperatureBand::Normal);
        assert_eq!(
            (c.s1_repeat, c.s1_step, c.s1_block, c.s2_repeat, c.s2_t1_ms, c.s2_t2_ms, c.s3_repeat, c.s3_step, c.s3_block),
            (2, 2, 48, 4, 196, 196, 2, 2, 48)
        );
    }
}
