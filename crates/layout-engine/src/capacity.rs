//! Conversion between operator-facing capacities and controller byte counts.
//!
//! The unit ladder is decimal (powers of 1000) and shared by parsing and
//! resolving. Whole magnitudes are kept as integers, so
//! `Capacity::from_bytes(n).to_bytes() == n` for every non-zero `u64`.

use std::str::FromStr;

use common::NodeCapacity;

use crate::error::CapacityError;

/// Byte multiples offered to operators, smallest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CapacityUnit {
    B,
    KB,
    MB,
    GB,
    TB,
    PB,
}

impl CapacityUnit {
    pub const LADDER: [CapacityUnit; 6] = [
        CapacityUnit::B,
        CapacityUnit::KB,
        CapacityUnit::MB,
        CapacityUnit::GB,
        CapacityUnit::TB,
        CapacityUnit::PB,
    ];

    /// Unit preselected for a fresh assignment.
    pub const DEFAULT: CapacityUnit = CapacityUnit::GB;

    pub fn multiplier(self) -> u64 {
        match self {
            CapacityUnit::B => 1,
            CapacityUnit::KB => 1_000,
            CapacityUnit::MB => 1_000_000,
            CapacityUnit::GB => 1_000_000_000,
            CapacityUnit::TB => 1_000_000_000_000,
            CapacityUnit::PB => 1_000_000_000_000_000,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CapacityUnit::B => "B",
            CapacityUnit::KB => "KB",
            CapacityUnit::MB => "MB",
            CapacityUnit::GB => "GB",
            CapacityUnit::TB => "TB",
            CapacityUnit::PB => "PB",
        }
    }
}

impl std::fmt::Display for CapacityUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapacityUnit {
    type Err = CapacityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        CapacityUnit::LADDER
            .iter()
            .copied()
            .find(|unit| unit.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| CapacityError::UnknownUnit {
                unit: trimmed.to_string(),
            })
    }
}

/// Number of units in a [`Capacity`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Magnitude {
    /// Exact whole number of units.
    Whole(u64),
    /// Anything else an operator typed; resolved to the nearest byte.
    Fraction(f64),
}

impl Magnitude {
    /// Whole when `value` is a non-negative integer that fits in `u64`.
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value < u64::MAX as f64 {
            Magnitude::Whole(value as u64)
        } else {
            Magnitude::Fraction(value)
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Magnitude::Whole(n) => n as f64,
            Magnitude::Fraction(value) => value,
        }
    }
}

impl std::fmt::Display for Magnitude {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Magnitude::Whole(n) => write!(f, "{}", n),
            Magnitude::Fraction(value) => write!(f, "{}", value),
        }
    }
}

/// Capacity as entered by an operator: a magnitude and a unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capacity {
    pub magnitude: Magnitude,
    pub unit: CapacityUnit,
}

impl Default for Capacity {
    fn default() -> Self {
        Self::new(1.0, CapacityUnit::DEFAULT)
    }
}

impl Capacity {
    pub fn new(magnitude: f64, unit: CapacityUnit) -> Self {
        Self {
            magnitude: Magnitude::from_f64(magnitude),
            unit,
        }
    }

    pub fn whole(magnitude: u64, unit: CapacityUnit) -> Self {
        Self {
            magnitude: Magnitude::Whole(magnitude),
            unit,
        }
    }

    /// Largest unit that divides `bytes` exactly, so the magnitude stays integral.
    /// Zero maps to `0` in the default unit.
    pub fn from_bytes(bytes: u64) -> Self {
        if bytes == 0 {
            return Self::whole(0, CapacityUnit::DEFAULT);
        }
        let unit = CapacityUnit::LADDER
            .iter()
            .rev()
            .copied()
            .find(|unit| bytes % unit.multiplier() == 0)
            .unwrap_or(CapacityUnit::B);
        Self::whole(bytes / unit.multiplier(), unit)
    }

    /// Seed an edit form from a committed capacity: the form capacity plus the
    /// gateway flag. Gateways get the default magnitude so that unticking the
    /// flag leaves a usable value behind.
    pub fn parse(capacity: NodeCapacity) -> (Self, bool) {
        match capacity {
            NodeCapacity::Gateway => (Self::default(), true),
            NodeCapacity::Storage(bytes) => (Self::from_bytes(bytes), false),
        }
    }

    /// Resolve to the controller representation. The gateway flag wins over
    /// any magnitude; it is never inferred from a zero magnitude.
    pub fn resolve(&self, is_gateway: bool) -> Result<NodeCapacity, CapacityError> {
        if is_gateway {
            return Ok(NodeCapacity::Gateway);
        }
        self.to_bytes().map(NodeCapacity::Storage)
    }

    pub fn to_bytes(&self) -> Result<u64, CapacityError> {
        let multiplier = self.unit.multiplier();
        let value = match self.magnitude {
            Magnitude::Whole(0) => return Err(CapacityError::NonPositive { magnitude: 0.0 }),
            Magnitude::Whole(n) => {
                return n.checked_mul(multiplier).ok_or(CapacityError::Overflow {
                    magnitude: n as f64,
                    unit: self.unit,
                })
            }
            Magnitude::Fraction(value) => value,
        };

        if !value.is_finite() {
            return Err(CapacityError::NotFinite);
        }
        if value <= 0.0 {
            return Err(CapacityError::NonPositive { magnitude: value });
        }
        let bytes = (value * multiplier as f64).round();
        if bytes >= u64::MAX as f64 {
            return Err(CapacityError::Overflow {
                magnitude: value,
                unit: self.unit,
            });
        }
        if bytes < 1.0 {
            return Err(CapacityError::BelowOneByte {
                magnitude: value,
                unit: self.unit,
            });
        }
        Ok(bytes as u64)
    }
}

impl std::fmt::Display for Capacity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.magnitude, self.unit)
    }
}

impl FromStr for Capacity {
    type Err = CapacityError;

    /// Parses `2TB`, `1.5 tb` or a bare byte count such as `4096`. Integer
    /// input is kept exact.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);
        let number = number.trim();

        let magnitude = match number.parse::<u64>() {
            Ok(whole) => Magnitude::Whole(whole),
            Err(_) => number
                .parse::<f64>()
                .map(Magnitude::from_f64)
                .map_err(|_| CapacityError::InvalidMagnitude {
                    input: s.to_string(),
                })?,
        };
        let unit = if unit.trim().is_empty() {
            CapacityUnit::B
        } else {
            unit.parse()?
        };
        Ok(Self { magnitude, unit })
    }
}

/// Human-readable byte count using the largest unit not exceeding `bytes`.
pub fn format_bytes(bytes: u64) -> String {
    let unit = CapacityUnit::LADDER
        .iter()
        .rev()
        .copied()
        .find(|unit| bytes >= unit.multiplier())
        .unwrap_or(CapacityUnit::B);
    if unit == CapacityUnit::B {
        return format!("{} B", bytes);
    }
    format!("{:.2} {}", bytes as f64 / unit.multiplier() as f64, unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_two_terabytes_resolve_exactly() {
        let capacity = Capacity::new(2.0, CapacityUnit::TB);
        assert_eq!(
            capacity.resolve(false),
            Ok(NodeCapacity::Storage(2_000_000_000_000))
        );
    }

    #[test]
    fn test_gateway_discards_magnitude() {
        let capacity = Capacity::new(5.0, CapacityUnit::GB);
        assert_eq!(capacity.resolve(true), Ok(NodeCapacity::Gateway));

        let nonsense = Capacity::new(-3.0, CapacityUnit::PB);
        assert_eq!(nonsense.resolve(true), Ok(NodeCapacity::Gateway));
    }

    #[test]
    fn test_non_positive_magnitudes_rejected() {
        assert_eq!(
            Capacity::new(0.0, CapacityUnit::GB).resolve(false),
            Err(CapacityError::NonPositive { magnitude: 0.0 })
        );
        assert!(matches!(
            Capacity::new(-1.0, CapacityUnit::TB).resolve(false),
            Err(CapacityError::NonPositive { .. })
        ));
        assert_eq!(
            Capacity::new(f64::NAN, CapacityUnit::TB).resolve(false),
            Err(CapacityError::NotFinite)
        );
    }

    #[test]
    fn test_fractional_magnitudes_round_to_bytes() {
        let capacity = Capacity::new(1.5, CapacityUnit::TB);
        assert_eq!(capacity.to_bytes(), Ok(1_500_000_000_000));

        assert!(matches!(
            Capacity::new(0.1, CapacityUnit::B).to_bytes(),
            Err(CapacityError::BelowOneByte { .. })
        ));
    }

    #[test]
    fn test_overflow_detected() {
        assert!(matches!(
            Capacity::new(20_000.0, CapacityUnit::PB).to_bytes(),
            Err(CapacityError::Overflow { .. })
        ));
    }

    #[test]
    fn test_from_bytes_picks_largest_exact_unit() {
        assert_eq!(
            Capacity::from_bytes(2_000_000_000_000),
            Capacity::new(2.0, CapacityUnit::TB)
        );
        assert_eq!(
            Capacity::from_bytes(1_500_000_000_000),
            Capacity::new(1500.0, CapacityUnit::GB)
        );
        assert_eq!(Capacity::from_bytes(1234), Capacity::new(1234.0, CapacityUnit::B));
    }

    #[test]
    fn test_zero_capacity_is_not_a_gateway() {
        let (capacity, is_gateway) = Capacity::parse(NodeCapacity::Storage(0));
        assert!(!is_gateway);
        assert_eq!(capacity.magnitude, Magnitude::Whole(0));

        let (capacity, is_gateway) = Capacity::parse(NodeCapacity::Gateway);
        assert!(is_gateway);
        assert_eq!(capacity, Capacity::default());
    }

    #[test]
    fn test_parse_strings() {
        assert_eq!("2TB".parse::<Capacity>(), Ok(Capacity::new(2.0, CapacityUnit::TB)));
        assert_eq!(" 1.5 gb ".parse::<Capacity>(), Ok(Capacity::new(1.5, CapacityUnit::GB)));
        assert_eq!("4096".parse::<Capacity>(), Ok(Capacity::new(4096.0, CapacityUnit::B)));
        assert!(matches!(
            "3 XB".parse::<Capacity>(),
            Err(CapacityError::UnknownUnit { .. })
        ));
        assert!(matches!(
            "TB".parse::<Capacity>(),
            Err(CapacityError::InvalidMagnitude { .. })
        ));
    }

    #[test]
    fn test_large_odd_byte_counts_stay_exact() {
        let bytes = (1u64 << 53) + 1;
        let (capacity, _) = Capacity::parse(NodeCapacity::Storage(bytes));
        assert_eq!(capacity, Capacity::whole(bytes, CapacityUnit::B));
        assert_eq!(capacity.resolve(false), Ok(NodeCapacity::Storage(bytes)));

        assert_eq!(
            "9007199254740993".parse::<Capacity>().unwrap().to_bytes(),
            Ok(bytes)
        );
        assert_eq!(Capacity::from_bytes(u64::MAX).to_bytes(), Ok(u64::MAX));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(999), "999 B");
        assert_eq!(format_bytes(1_500_000_000_000), "1.50 TB");
        assert_eq!(format_bytes(2_000_000_000), "2.00 GB");
    }

    fn unit_strategy() -> impl Strategy<Value = CapacityUnit> {
        prop::sample::select(CapacityUnit::LADDER.to_vec())
    }

    proptest! {
        #[test]
        fn prop_parse_then_resolve_round_trips(bytes in 1u64..=u64::MAX) {
            let (capacity, is_gateway) = Capacity::parse(NodeCapacity::Storage(bytes));
            prop_assert!(!is_gateway);
            prop_assert_eq!(capacity.resolve(is_gateway), Ok(NodeCapacity::Storage(bytes)));
        }

        #[test]
        fn prop_whole_multiples_round_trip(unit in unit_strategy(), seed in 1u64..=u64::MAX) {
            let magnitude = 1 + seed % (u64::MAX / unit.multiplier());
            let bytes = magnitude * unit.multiplier();

            let (capacity, _) = Capacity::parse(NodeCapacity::Storage(bytes));
            prop_assert_eq!(capacity.to_bytes(), Ok(bytes));
            prop_assert_eq!(capacity.to_string().parse::<Capacity>(), Ok(capacity));
        }

        #[test]
        fn prop_gateway_always_resolves_to_gateway(unit in unit_strategy(), magnitude in any::<f64>()) {
            prop_assert_eq!(Capacity::new(magnitude, unit).resolve(true), Ok(NodeCapacity::Gateway));
        }
    }
}
