//! # Fixed-Point Currency
//!
//! **CRITICAL: NO FLOATING POINT IN BALANCES OR PRICES**
//!
//! Wallet balances, case prices and item values are all `FixedPoint`.
//! Floats only appear at the serialization edge (JSON numbers in payloads,
//! TOML numbers in catalogs) and are rounded to six decimals on the way in.
//!
//! ## Why Fixed-Point?
//!
//! - Deterministic: same calculation = same result on all hardware
//! - No rounding errors: 0.1 + 0.2 == 0.3 (unlike IEEE 754 floats)
//! - Auditable: a settlement must be reproducible from its inputs

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{EconomyError, EconomyResult};

/// Number of decimal places.
const DECIMAL_PLACES: u32 = 6;

/// The multiplier for 6 decimal places.
const MULTIPLIER: u64 = 10u64.pow(DECIMAL_PLACES);

/// Fixed-point decimal number with 6 decimal places.
///
/// Internally stores value * 1,000,000 as a u64, so it can never be negative.
///
/// # Range
///
/// - Minimum: 0.000000
/// - Maximum: 18,446,744,073,709.551615
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct FixedPoint(u64);

impl FixedPoint {
    /// Zero value.
    pub const ZERO: Self = Self(0);

    /// One unit (1.000000).
    pub const ONE: Self = Self(MULTIPLIER);

    /// Maximum representable value.
    pub const MAX: Self = Self(u64::MAX);

    /// Creates a fixed-point number from a whole number.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let ten = FixedPoint::from_whole(10); // 10.000000
    /// ```
    #[inline]
    #[must_use]
    pub const fn from_whole(whole: u64) -> Self {
        Self(whole * MULTIPLIER)
    }

    /// Creates a fixed-point number from parts.
    ///
    /// # Arguments
    ///
    /// * `whole` - The whole number part
    /// * `decimal` - The decimal part (0-999999)
    #[inline]
    #[must_use]
    pub const fn from_parts(whole: u64, decimal: u32) -> Self {
        Self(whole * MULTIPLIER + (decimal as u64 % MULTIPLIER))
    }

    /// Creates a fixed-point number from raw internal value.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Converts a float, rounding to six decimals.
    ///
    /// Returns `None` for negative, non-finite or out-of-range input.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        let scaled = (value * MULTIPLIER as f64).round();
        if scaled >= u64::MAX as f64 {
            return None;
        }
        Some(Self(scaled as u64))
    }

    /// Returns the whole number part.
    #[inline]
    #[must_use]
    pub const fn whole(self) -> u64 {
        self.0 / MULTIPLIER
    }

    /// Returns the decimal part (0-999999).
    #[inline]
    #[must_use]
    pub const fn decimal(self) -> u32 {
        (self.0 % MULTIPLIER) as u32
    }

    /// Lossy conversion for display and JSON payloads.
    #[inline]
    #[must_use]
    pub fn to_f64(self) -> f64 {
        self.whole() as f64 + f64::from(self.decimal()) / MULTIPLIER as f64
    }

    /// Checked subtraction. Returns `None` on underflow.
    #[inline]
    #[must_use]
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.0.checked_sub(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Checked multiplication by an integer.
    #[inline]
    #[must_use]
    pub const fn checked_mul_int(self, rhs: u64) -> Option<Self> {
        match self.0.checked_mul(rhs) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Safe subtraction with error on underflow.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::ArithmeticOverflow` if the subtraction would underflow.
    #[inline]
    pub fn safe_sub(self, rhs: Self) -> EconomyResult<Self> {
        self.checked_sub(rhs).ok_or(EconomyError::ArithmeticOverflow)
    }

    /// Safe multiplication by an integer.
    ///
    /// # Errors
    ///
    /// Returns `EconomyError::ArithmeticOverflow` if the product does not fit.
    #[inline]
    pub fn safe_mul_int(self, rhs: u64) -> EconomyResult<Self> {
        self.checked_mul_int(rhs).ok_or(EconomyError::ArithmeticOverflow)
    }
}

impl fmt::Debug for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedPoint({}.{:06})", self.whole(), self.decimal())
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.whole(), self.decimal())
    }
}

/// Error returned when a decimal string is not valid currency.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid currency amount: {0:?}")]
pub struct ParseFixedPointError(String);

impl FromStr for FixedPoint {
    type Err = ParseFixedPointError;

    /// Parses `"12"`, `"12.5"` or `"0.000001"`. At most six decimals.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseFixedPointError(s.to_owned());
        let (whole, frac) = s.trim().split_once('.').unwrap_or((s.trim(), ""));
        if whole.is_empty() || frac.len() > DECIMAL_PLACES as usize {
            return Err(err());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }

        let whole: u64 = whole.parse().map_err(|_| err())?;
        let decimal: u64 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{frac:0<6}");
            padded.parse().map_err(|_| err())?
        };

        whole
            .checked_mul(MULTIPLIER)
            .and_then(|w| w.checked_add(decimal))
            .map(Self)
            .ok_or_else(err)
    }
}

impl Serialize for FixedPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.decimal() == 0 {
            serializer.serialize_u64(self.whole())
        } else {
            serializer.serialize_f64(self.to_f64())
        }
    }
}

impl<'de> Deserialize<'de> for FixedPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FixedPointVisitor)
    }
}

struct FixedPointVisitor;

impl Visitor<'_> for FixedPointVisitor {
    type Value = FixedPoint;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative currency amount")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        v.checked_mul(MULTIPLIER)
            .map(FixedPoint)
            .ok_or_else(|| E::custom("currency amount out of range"))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        let v = u64::try_from(v).map_err(|_| E::custom("currency amount cannot be negative"))?;
        self.visit_u64(v)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        FixedPoint::from_f64(v).ok_or_else(|| E::custom("currency amount out of range"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_whole() {
        let value = FixedPoint::from_whole(100);
        assert_eq!(value.whole(), 100);
        assert_eq!(value.decimal(), 0);
    }

    #[test]
    fn test_from_parts() {
        let value = FixedPoint::from_parts(3, 141_592);
        assert_eq!(value.whole(), 3);
        assert_eq!(value.decimal(), 141_592);
    }

    #[test]
    fn test_checked_sub_underflow() {
        let zero = FixedPoint::ZERO;
        assert!(zero.checked_sub(FixedPoint::ONE).is_none());
        assert_eq!(zero.safe_sub(FixedPoint::ONE), Err(EconomyError::ArithmeticOverflow));
    }

    #[test]
    fn test_mul_overflow() {
        assert!(FixedPoint::MAX.checked_mul_int(2).is_none());
        assert_eq!(FixedPoint::MAX.safe_mul_int(1), Ok(FixedPoint::MAX));
        assert_eq!(FixedPoint::MAX.safe_mul_int(2), Err(EconomyError::ArithmeticOverflow));
        assert_eq!(FixedPoint::from_whole(50).safe_mul_int(2), Ok(FixedPoint::from_whole(100)));
    }

    #[test]
    fn test_display() {
        let value = FixedPoint::from_parts(42, 123_456);
        assert_eq!(format!("{value}"), "42.123456");
    }

    #[test]
    fn test_parse() {
        assert_eq!("12".parse::<FixedPoint>(), Ok(FixedPoint::from_whole(12)));
        assert_eq!("12.5".parse::<FixedPoint>(), Ok(FixedPoint::from_parts(12, 500_000)));
        assert_eq!("0.000001".parse::<FixedPoint>(), Ok(FixedPoint::from_raw(1)));
        assert!("-1".parse::<FixedPoint>().is_err());
        assert!("1.0000001".parse::<FixedPoint>().is_err());
        assert!("abc".parse::<FixedPoint>().is_err());
        assert!(".5".parse::<FixedPoint>().is_err());
    }

    #[test]
    fn test_from_f64_rounds_to_six_decimals() {
        assert_eq!(FixedPoint::from_f64(0.1), Some(FixedPoint::from_raw(100_000)));
        assert_eq!(FixedPoint::from_f64(2.999_999_9), Some(FixedPoint::from_whole(3)));
        assert_eq!(FixedPoint::from_f64(-0.5), None);
        assert_eq!(FixedPoint::from_f64(f64::NAN), None);
    }

    #[test]
    fn test_json_edge() {
        let whole: FixedPoint = serde_json::from_str("100").unwrap();
        assert_eq!(whole, FixedPoint::from_whole(100));
        let frac: FixedPoint = serde_json::from_str("12.25").unwrap();
        assert_eq!(frac, FixedPoint::from_parts(12, 250_000));
        let text: FixedPoint = serde_json::from_str("\"7.5\"").unwrap();
        assert_eq!(text, FixedPoint::from_parts(7, 500_000));
        assert!(serde_json::from_str::<FixedPoint>("-3").is_err());

        assert_eq!(serde_json::to_string(&FixedPoint::from_whole(100)).unwrap(), "100");
        assert_eq!(serde_json::to_string(&FixedPoint::from_parts(0, 500_000)).unwrap(), "0.5");
    }
}
