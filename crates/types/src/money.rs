//! Monetary amounts.
//!
//! Amounts travel over JSON as plain decimal numbers (`150.5`) because that is
//! what the admin forms send, but they are held as integer minor units so sums
//! over many invoice or sale lines never drift.

use std::fmt;

use utoipa::openapi::schema::{ObjectBuilder, Schema, SchemaType};
use utoipa::openapi::RefOr;

const MINOR_PER_MAJOR: i64 = 100;

/// Largest magnitude, in minor units, any amount or derived total may take.
pub const MAX_MINOR: i64 = 1_000_000_000_000_000;

/// Errors raised while parsing an amount.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MoneyError {
    #[error("amount is not a finite number: {0}")]
    NotFinite(String),
    #[error("amount is not numeric: {0}")]
    NotNumeric(String),
    #[error("amount is out of range: {0}")]
    OutOfRange(String),
    #[error("amount overflows the supported range")]
    Overflow,
}

/// An amount of money in minor units (cents, paisa).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Converts a decimal major-unit amount, rounding to the nearest minor unit.
    pub fn from_major(major: f64) -> Result<Self, MoneyError> {
        if !major.is_finite() {
            return Err(MoneyError::NotFinite(major.to_string()));
        }
        let minor = (major * MINOR_PER_MAJOR as f64).round();
        if minor.abs() > MAX_MINOR as f64 {
            return Err(MoneyError::OutOfRange(major.to_string()));
        }
        Ok(Self(minor as i64))
    }

    pub fn minor(self) -> i64 {
        self.0
    }

    pub fn as_major(self) -> f64 {
        self.0 as f64 / MINOR_PER_MAJOR as f64
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    fn bounded(minor: Option<i64>) -> Result<Self, MoneyError> {
        match minor {
            Some(m) if m.unsigned_abs() <= MAX_MINOR as u64 => Ok(Self(m)),
            _ => Err(MoneyError::Overflow),
        }
    }

    pub fn checked_add(self, rhs: Money) -> Result<Self, MoneyError> {
        Self::bounded(self.0.checked_add(rhs.0))
    }

    pub fn checked_sub(self, rhs: Money) -> Result<Self, MoneyError> {
        Self::bounded(self.0.checked_sub(rhs.0))
    }

    /// Multiplies a unit price by a quantity.
    pub fn times(self, quantity: u32) -> Result<Self, MoneyError> {
        Self::bounded(self.0.checked_mul(i64::from(quantity)))
    }

    /// Sums amounts, failing once the running total leaves the supported range.
    pub fn try_sum<I>(amounts: I) -> Result<Self, MoneyError>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }

    /// Addition clamped to `i64`, for aggregates over already stored amounts.
    pub fn saturating_add(self, rhs: Money) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Subtraction floored at zero.
    pub fn saturating_sub_floor(self, other: Money) -> Self {
        Self(self.0.saturating_sub(other.0).max(0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(
            f,
            "{}{}.{:02}",
            sign,
            abs / MINOR_PER_MAJOR as u64,
            abs % MINOR_PER_MAJOR as u64
        )
    }
}

impl std::str::FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Money::ZERO);
        }
        let value: f64 = trimmed
            .parse()
            .map_err(|_| MoneyError::NotNumeric(trimmed.to_string()))?;
        Money::from_major(value)
    }
}

impl serde::Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_f64(self.as_major())
    }
}

impl<'de> serde::Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Form inputs sometimes arrive as strings.
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Money::from_major(n).map_err(serde::de::Error::custom),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl<'s> utoipa::ToSchema<'s> for Money {
    fn schema() -> (&'s str, RefOr<Schema>) {
        (
            "Money",
            RefOr::T(Schema::Object(
                ObjectBuilder::new()
                    .schema_type(SchemaType::Number)
                    .description(Some("Decimal amount in major currency units"))
                    .build(),
            )),
        )
    }
}
