use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const CURRENCY_CODE: &str = "IDR";

const MINOR_UNITS: i64 = 100;

//--------------------------------------        Money        ---------------------------------------------------------
/// A currency amount, stored as an integer number of minor units (1/100 of a Rupiah).
///
/// Provider APIs exchange amounts as decimal strings, so `Money` parses from, and formats to, that representation
/// without ever passing through a float.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(unary Money, Neg, neg);

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Value cannot be represented as a currency amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Money {
    /// The amount in minor units.
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_major(units: i64) -> Self {
        Self(units * MINOR_UNITS)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Formats the amount as a plain decimal string with two fractional digits, e.g. `150000.50`.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let minor = MINOR_UNITS.unsigned_abs();
        format!("{sign}{}.{:02}", abs / minor, abs % minor)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{CURRENCY_CODE} {}", self.to_decimal_string())
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    /// Parses a decimal string with at most two fractional digits. `"150000"`, `"150000.5"` and `"150000.50"` are all
    /// accepted; `"1.234"` is not, since it cannot be represented exactly.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let mut parts = digits.splitn(2, '.');
        let whole = parts
            .next()
            .filter(|w| !w.is_empty())
            .ok_or_else(|| MoneyConversionError(s.to_string()))?
            .parse::<i64>()
            .map_err(|e| MoneyConversionError(format!("{s}. {e}")))?;
        let fraction = match parts.next() {
            None => 0,
            Some(f) if f.len() == 1 => f.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s}. {e}")))? * 10,
            Some(f) if f.len() == 2 => f.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s}. {e}")))?,
            Some(_) => return Err(MoneyConversionError(format!("{s} has too many decimal places"))),
        };
        let value = whole
            .checked_mul(MINOR_UNITS)
            .and_then(|v| v.checked_add(fraction))
            .ok_or_else(|| MoneyConversionError(format!("{s} is too large")))?;
        Ok(Self(if negative { -value } else { value }))
    }
}
