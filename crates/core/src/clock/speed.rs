//! Speed levels and the simulated-seconds table behind them.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Simulated seconds advanced per real second, indexed by speed level.
const SPEED_PROFILE: [u32; 6] = [0, 3_600, 7_200, 21_600, 86_400, 432_000];

/// Rate at which simulated time runs. `Paused` freezes the clock.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum SpeedLevel {
    /// Simulated time does not move.
    Paused,
    /// One simulated hour per second.
    #[default]
    X1,
    /// Two simulated hours per second.
    X2,
    /// Six simulated hours per second.
    X3,
    /// One simulated day per second.
    X4,
    /// Five simulated days per second.
    X5,
}

impl SpeedLevel {
    /// Every level in ascending order.
    pub const ALL: [SpeedLevel; 6] = [
        SpeedLevel::Paused,
        SpeedLevel::X1,
        SpeedLevel::X2,
        SpeedLevel::X3,
        SpeedLevel::X4,
        SpeedLevel::X5,
    ];

    /// Numeric level, `0` for paused through `5`.
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Look up a level by its numeric index.
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    /// Simulated seconds that pass for every real second at this level.
    pub fn simulated_seconds_per_second(self) -> u32 {
        SPEED_PROFILE[usize::from(self.index())]
    }

    /// Whether the clock is frozen at this level.
    pub fn is_paused(self) -> bool {
        self == SpeedLevel::Paused
    }

    /// Short label shown in the status line.
    pub fn label(self) -> &'static str {
        match self {
            SpeedLevel::Paused => "Paused",
            SpeedLevel::X1 => "x1",
            SpeedLevel::X2 => "x2",
            SpeedLevel::X3 => "x3",
            SpeedLevel::X4 => "x4",
            SpeedLevel::X5 => "x5",
        }
    }
}

impl fmt::Display for SpeedLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<SpeedLevel> for u8 {
    fn from(level: SpeedLevel) -> Self {
        level.index()
    }
}

impl TryFrom<u8> for SpeedLevel {
    type Error = SpeedParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        SpeedLevel::from_index(value).ok_or(SpeedParseError::OutOfRange(value))
    }
}

/// Reasons user-supplied speed input was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpeedParseError {
    /// Nothing was supplied.
    #[error("no speed given; expected 0-5 or x0-x5")]
    Empty,
    /// The input is not a number or `x`-prefixed number.
    #[error("invalid speed `{0}`; expected 0-5 or x0-x5")]
    Invalid(String),
    /// The number is outside the supported range.
    #[error("speed {0} is out of range; expected 0-5")]
    OutOfRange(u8),
}

impl FromStr for SpeedLevel {
    type Err = SpeedParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SpeedParseError::Empty);
        }

        let lowered = trimmed.to_ascii_lowercase();
        if matches!(lowered.as_str(), "pause" | "paused") {
            return Ok(SpeedLevel::Paused);
        }

        let digits = lowered.strip_prefix('x').unwrap_or(&lowered);
        let value: u8 = digits
            .parse()
            .map_err(|_| SpeedParseError::Invalid(trimmed.to_string()))?;
        SpeedLevel::try_from(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_matches_levels() {
        let rates: Vec<u32> = SpeedLevel::ALL
            .iter()
            .map(|level| level.simulated_seconds_per_second())
            .collect();
        assert_eq!(rates, vec![0, 3_600, 7_200, 21_600, 86_400, 432_000]);
        assert!(SpeedLevel::Paused.is_paused());
        assert!(!SpeedLevel::X4.is_paused());
    }

    #[test]
    fn parses_plain_and_prefixed_forms() {
        assert_eq!("0".parse(), Ok(SpeedLevel::Paused));
        assert_eq!(" 3 ".parse(), Ok(SpeedLevel::X3));
        assert_eq!("x2".parse(), Ok(SpeedLevel::X2));
        assert_eq!("X5".parse(), Ok(SpeedLevel::X5));
        assert_eq!("paused".parse(), Ok(SpeedLevel::Paused));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!("".parse::<SpeedLevel>(), Err(SpeedParseError::Empty));
        assert_eq!("6".parse::<SpeedLevel>(), Err(SpeedParseError::OutOfRange(6)));
        assert_eq!(
            "fast".parse::<SpeedLevel>(),
            Err(SpeedParseError::Invalid("fast".to_string()))
        );
        assert_eq!(
            "x-1".parse::<SpeedLevel>(),
            Err(SpeedParseError::Invalid("x-1".to_string()))
        );
    }

    #[test]
    fn labels_round_trip_through_parse() {
        for level in SpeedLevel::ALL.into_iter().skip(1) {
            assert_eq!(level.label().parse(), Ok(level));
        }
        assert_eq!(SpeedLevel::Paused.label().parse(), Ok(SpeedLevel::Paused));
    }
}
