//! Exact fixed-point values with 8 implied decimal places.
//!
//! Prices, quantities and volumes are stored as scaled `i64` raw units so
//! that addition, integer multiplication and comparison are exact. Decimal
//! strings are parsed and printed through `rust_decimal`, which rejects
//! partial numeric parses (`"12x"`, `"not_a_number"`).

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

/// Raw units per 1.0.
const SCALE: i64 = 100_000_000;

/// Decimal places carried by [`Fixed`].
const DECIMALS: u32 = 8;

/// A price level. 8 decimal places, exact arithmetic.
pub type Price = Fixed;

/// An order or trade quantity. 8 decimal places, exact arithmetic.
pub type Quantity = Fixed;

/// A notional volume. 8 decimal places, exact arithmetic.
pub type Volume = Fixed;

/// Error returned when a decimal string cannot be represented as a [`Fixed`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid fixed-point value: {0}")]
pub struct FixedParseError(pub String);

/// Fixed-point value with 8 implied decimal places.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed {
    raw: i64,
}

impl Fixed {
    pub const ZERO: Fixed = Fixed { raw: 0 };

    /// Build from raw scaled units (`raw = value * 10^8`).
    pub const fn from_raw(raw: i64) -> Self {
        Self { raw }
    }

    pub const fn raw(self) -> i64 {
        self.raw
    }

    /// Nearest representable value. Non-finite inputs saturate (NaN to zero).
    pub fn from_f64(value: f64) -> Self {
        Self {
            raw: (value * SCALE as f64).round() as i64,
        }
    }

    pub fn to_f64(self) -> f64 {
        self.raw as f64 / SCALE as f64
    }

    pub const fn is_zero(self) -> bool {
        self.raw == 0
    }

    pub fn abs(self) -> Self {
        Self {
            raw: self.raw.abs(),
        }
    }

    fn from_decimal(d: Decimal) -> Result<Self, FixedParseError> {
        let scaled = d
            .round_dp(DECIMALS)
            .checked_mul(Decimal::from(SCALE))
            .ok_or_else(|| FixedParseError(d.to_string()))?;
        let raw = scaled
            .to_i64()
            .ok_or_else(|| FixedParseError(d.to_string()))?;
        Ok(Self { raw })
    }
}

impl FromStr for Fixed {
    type Err = FixedParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let d = Decimal::from_str(s).map_err(|_| FixedParseError(s.to_string()))?;
        Self::from_decimal(d)
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = Decimal::from_i128_with_scale(self.raw as i128, DECIMALS);
        write!(f, "{}", d.normalize())
    }
}

impl Add for Fixed {
    type Output = Fixed;

    fn add(self, rhs: Fixed) -> Fixed {
        Fixed {
            raw: self.raw + rhs.raw,
        }
    }
}

impl AddAssign for Fixed {
    fn add_assign(&mut self, rhs: Fixed) {
        self.raw += rhs.raw;
    }
}

impl Sub for Fixed {
    type Output = Fixed;

    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed {
            raw: self.raw - rhs.raw,
        }
    }
}

impl SubAssign for Fixed {
    fn sub_assign(&mut self, rhs: Fixed) {
        self.raw -= rhs.raw;
    }
}

impl Mul<i64> for Fixed {
    type Output = Fixed;

    fn mul(self, rhs: i64) -> Fixed {
        Fixed {
            raw: self.raw * rhs,
        }
    }
}

impl Neg for Fixed {
    type Output = Fixed;

    fn neg(self) -> Fixed {
        Fixed { raw: -self.raw }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_exact() {
        let p: Fixed = "30000.5".parse().unwrap();
        assert_eq!(p.raw(), 3_000_050_000_000);

        let q: Fixed = "0.1".parse().unwrap();
        assert_eq!(q.raw(), 10_000_000);
    }

    #[test]
    fn test_round_trip() {
        for s in ["30000.5", "0.1", "1", "0.00000001", "-2.25", "123456.789"] {
            let v: Fixed = s.parse().unwrap();
            assert_eq!(v.to_string(), s);
            let again: Fixed = v.to_string().parse().unwrap();
            assert_eq!(again, v);
        }
    }

    #[test]
    fn test_rejects_partial_and_invalid() {
        assert!("not_a_number".parse::<Fixed>().is_err());
        assert!("12x".parse::<Fixed>().is_err());
        assert!("".parse::<Fixed>().is_err());
        assert!("1.2.3".parse::<Fixed>().is_err());
    }

    #[test]
    fn test_exact_arithmetic() {
        let a: Fixed = "0.1".parse().unwrap();
        let b: Fixed = "0.2".parse().unwrap();
        assert_eq!((a + b).to_string(), "0.3");
        assert_eq!((b - a).to_string(), "0.1");
        assert_eq!((a * 3).to_string(), "0.3");
    }

    #[test]
    fn test_ordering() {
        let a: Fixed = "1.5".parse().unwrap();
        let b: Fixed = "1.50000001".parse().unwrap();
        assert!(a < b);
        assert_eq!(a, Fixed::from_raw(150_000_000));
    }

    #[test]
    fn test_from_f64() {
        assert_eq!(Fixed::from_f64(30000.5), "30000.5".parse().unwrap());
        assert_eq!(Fixed::from_f64(f64::NAN), Fixed::ZERO);
        assert!((Fixed::from_f64(0.1).to_f64() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_extra_precision_rounds() {
        let v: Fixed = "0.123456789".parse().unwrap();
        assert_eq!(v.raw(), 12_345_679);
    }
}
