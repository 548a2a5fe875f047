//! Value objects for the order domain.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Stock-keeping unit identifier of a product line.
///
/// Surrounding whitespace is not part of the code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SkuCode(String);

impl SkuCode {
    /// Creates a new SKU code from a string, trimming surrounding whitespace.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_string())
    }

    /// Returns the SKU code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the code is empty or was whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SkuCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SkuCode {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SkuCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<SkuCode> for String {
    fn from(sku: SkuCode) -> Self {
        sku.0
    }
}

impl AsRef<str> for SkuCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Error returned when a decimal amount cannot be read as [`Money`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid decimal amount '{input}': {reason}")]
pub struct MoneyParseError {
    pub input: String,
    pub reason: &'static str,
}

/// Decimal money amount held as integer cents.
///
/// Serialized as a decimal string (`"12.50"`). Deserializes from either a
/// decimal string or a JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money {
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new Money amount from whole units, saturating at the
    /// representable range.
    pub fn from_units(units: i64) -> Self {
        Self {
            cents: units.saturating_mul(100),
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity, or `None` on overflow.
    pub fn checked_mul(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
    }

    /// Adds two amounts, or `None` on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.cents.checked_add(other.cents).map(Money::from_cents)
    }

    /// Renders the amount as a plain decimal string with two fraction digits.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        format!("{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for Money {
    type Err = MoneyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason| MoneyParseError {
            input: s.to_string(),
            reason,
        };

        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, fraction) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(fail("expected digits before the decimal point"));
        }
        if digits.contains('.') && fraction.is_empty() {
            return Err(fail("expected digits after the decimal point"));
        }
        if !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(fail("expected digits after the decimal point"));
        }
        if fraction.len() > 2 {
            return Err(fail("at most two fraction digits are supported"));
        }

        let units: i64 = whole.parse().map_err(|_| fail("amount out of range"))?;
        let mut fraction_cents: i64 = if fraction.is_empty() {
            0
        } else {
            fraction.parse().map_err(|_| fail("amount out of range"))?
        };
        if fraction.len() == 1 {
            fraction_cents *= 10;
        }

        let cents = units
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction_cents))
            .ok_or_else(|| fail("amount out of range"))?;

        Ok(Money::from_cents(if negative { -cents } else { cents }))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal_string())
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal_string())
    }
}

struct MoneyVisitor;

impl Visitor<'_> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal amount as a string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        v.checked_mul(100)
            .map(Money::from_cents)
            .ok_or_else(|| E::custom("amount out of range"))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        let v = i64::try_from(v).map_err(|_| E::custom("amount out of range"))?;
        self.visit_i64(v)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        if !v.is_finite() {
            return Err(E::custom("amount must be finite"));
        }
        // Display yields the shortest round-tripping form, e.g. 12.5 -> "12.5".
        v.to_string().parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sku_code_string_conversion() {
        let sku = SkuCode::new("iphone_13");
        assert_eq!(sku.as_str(), "iphone_13");

        let sku2: SkuCode = "iphone_13_red".into();
        assert_eq!(sku2.as_str(), "iphone_13_red");
    }

    #[test]
    fn test_sku_code_blank() {
        assert!(SkuCode::new("").is_blank());
        assert!(SkuCode::new("   ").is_blank());
        assert!(!SkuCode::new("phone").is_blank());
    }

    #[test]
    fn test_money_parse_whole_and_fraction() {
        assert_eq!("1200".parse::<Money>().unwrap().cents(), 120_000);
        assert_eq!("12.5".parse::<Money>().unwrap().cents(), 1250);
        assert_eq!("12.05".parse::<Money>().unwrap().cents(), 1205);
        assert_eq!("0".parse::<Money>().unwrap().cents(), 0);
        assert_eq!("-3.10".parse::<Money>().unwrap().cents(), -310);
    }

    #[test]
    fn test_money_parse_rejects_malformed_input() {
        assert!("".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
        assert!("1.".parse::<Money>().is_err());
        assert!(".5".parse::<Money>().is_err());
        assert!("1.234".parse::<Money>().is_err());
        assert!("1,50".parse::<Money>().is_err());
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(1234).to_string(), "12.34");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-12.34");
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);
        assert_eq!(a.checked_add(b), Some(Money::from_cents(1500)));
        assert_eq!(a.checked_mul(3), Some(Money::from_cents(3000)));
        assert_eq!(a.checked_mul(0), Some(Money::zero()));
    }

    #[test]
    fn test_money_arithmetic_overflow_is_none() {
        let price: Money = serde_json::from_str("\"90000000000000000\"").unwrap();
        assert_eq!(price.checked_mul(2), None);
        assert_eq!(price.checked_mul(1), Some(price));

        let max = Money::from_cents(i64::MAX);
        assert_eq!(max.checked_add(Money::from_cents(1)), None);
        assert_eq!(max.checked_add(Money::zero()), Some(max));
    }

    #[test]
    fn test_sku_code_is_trimmed() {
        assert_eq!(SkuCode::new(" phone\t"), SkuCode::new("phone"));
        let sku: SkuCode = serde_json::from_str("\"  phone \"").unwrap();
        assert_eq!(sku.as_str(), "phone");
        assert_eq!(serde_json::to_string(&sku).unwrap(), "\"phone\"");
    }

    #[test]
    fn test_money_deserializes_from_string_and_number() {
        let from_str: Money = serde_json::from_str("\"1200.00\"").unwrap();
        let from_int: Money = serde_json::from_str("1200").unwrap();
        let from_float: Money = serde_json::from_str("12.5").unwrap();

        assert_eq!(from_str.cents(), 120_000);
        assert_eq!(from_int.cents(), 120_000);
        assert_eq!(from_float.cents(), 1250);
    }

    #[test]
    fn test_money_serializes_as_decimal_string() {
        let json = serde_json::to_string(&Money::from_cents(999)).unwrap();
        assert_eq!(json, "\"9.99\"");
    }
}
