use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use crate::errors::{LedgerError, Result};

/// currencies accepted by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// philippine peso, minor unit is the centavo
    #[default]
    Php,
    Usd,
}

impl Currency {
    /// number of minor units in one major unit
    pub fn minor_per_major(&self) -> u64 {
        match self {
            Currency::Php | Currency::Usd => 100,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Php => write!(f, "PHP"),
            Currency::Usd => write!(f, "USD"),
        }
    }
}

impl FromStr for Currency {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "PHP" => Ok(Currency::Php),
            "USD" => Ok(Currency::Usd),
            _ => Err(LedgerError::InvalidConfiguration {
                message: format!("unknown currency: {}", s),
            }),
        }
    }
}

/// Non-negative amount of money held as integer minor units.
///
/// Arithmetic never goes through binary floating point. Percent computations
/// go through `Decimal` and are rounded back to whole minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    minor: u64,
    currency: Currency,
}

impl Money {
    pub const ZERO: Money = Money { minor: 0, currency: Currency::Php };

    /// create from minor units (centavos, cents)
    pub const fn from_minor(minor: u64, currency: Currency) -> Self {
        Money { minor, currency }
    }

    /// create from whole major units (pesos, dollars)
    pub fn from_major(major: u64, currency: Currency) -> Self {
        Money {
            minor: major * currency.minor_per_major(),
            currency,
        }
    }

    /// shorthand for whole pesos
    pub fn php(major: u64) -> Self {
        Money::from_major(major, Currency::Php)
    }

    /// zero in the given currency
    pub const fn zero(currency: Currency) -> Self {
        Money { minor: 0, currency }
    }

    /// parse a major-unit string such as "1500.25"
    pub fn parse(s: &str, currency: Currency) -> Result<Self> {
        let d = Decimal::from_str(s.trim()).map_err(|e| LedgerError::InvalidConfiguration {
            message: format!("invalid amount {:?}: {}", s, e),
        })?;
        if d.is_sign_negative() && !d.is_zero() {
            return Err(LedgerError::InvalidConfiguration {
                message: format!("negative amount {:?}", s),
            });
        }
        let scaled = d * Decimal::from(currency.minor_per_major());
        if scaled.fract() != Decimal::ZERO {
            return Err(LedgerError::InvalidConfiguration {
                message: format!("amount {:?} has sub-minor precision", s),
            });
        }
        let minor = scaled.to_u64().ok_or_else(|| LedgerError::InvalidConfiguration {
            message: format!("amount {:?} out of range", s),
        })?;
        Ok(Money { minor, currency })
    }

    pub fn minor_units(&self) -> u64 {
        self.minor
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// value in major units as a decimal, for display and reporting
    pub fn as_decimal(&self) -> Decimal {
        Decimal::from(self.minor) / Decimal::from(self.currency.minor_per_major())
    }

    pub fn is_zero(&self) -> bool {
        self.minor == 0
    }

    pub fn is_positive(&self) -> bool {
        self.minor > 0
    }

    pub fn min(self, other: Self) -> Self {
        if other.minor < self.minor {
            Money { minor: other.minor, currency: self.currency }
        } else {
            self
        }
    }

    pub fn max(self, other: Self) -> Self {
        if other.minor > self.minor {
            Money { minor: other.minor, currency: self.currency }
        } else {
            self
        }
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<()> {
        if self.currency != other.currency {
            return Err(LedgerError::CurrencyMismatch {
                expected: self.currency,
                found: other.currency,
            });
        }
        Ok(())
    }

    /// add, failing on currency mismatch or overflow
    pub fn checked_add(self, other: Money) -> Result<Money> {
        self.ensure_same_currency(&other)?;
        let minor = self.minor.checked_add(other.minor).ok_or_else(|| {
            LedgerError::InvalidConfiguration {
                message: format!("amount overflow adding {} and {}", self, other),
            }
        })?;
        Ok(Money { minor, currency: self.currency })
    }

    /// subtract for remaining-balance math; never goes below zero
    pub fn subtract(self, other: Money) -> Result<Money> {
        self.ensure_same_currency(&other)?;
        match self.minor.checked_sub(other.minor) {
            Some(minor) => Ok(Money { minor, currency: self.currency }),
            None => Err(LedgerError::NegativeResult {
                minuend: self,
                subtrahend: other,
            }),
        }
    }

    /// subtract where the caller accepts an overpayment as credit
    pub fn subtract_allowing_credit(self, other: Money) -> Result<NetPosition> {
        self.ensure_same_currency(&other)?;
        let position = if self.minor > other.minor {
            NetPosition::Due(Money::from_minor(self.minor - other.minor, self.currency))
        } else if self.minor < other.minor {
            NetPosition::Credit(Money::from_minor(other.minor - self.minor, self.currency))
        } else {
            NetPosition::Settled
        };
        Ok(position)
    }

    /// saturating subtraction, for projections where zero is the floor
    pub fn saturating_sub(self, other: Money) -> Money {
        Money {
            minor: self.minor.saturating_sub(other.minor),
            currency: self.currency,
        }
    }

    /// percentage of this amount using banker's rounding (late fees)
    pub fn multiply_by_percent(&self, percent: Percent) -> Money {
        self.percent_with(percent, RoundingStrategy::MidpointNearestEven)
    }

    /// percentage of this amount rounded toward zero (down payments)
    pub fn multiply_by_percent_floor(&self, percent: Percent) -> Money {
        self.percent_with(percent, RoundingStrategy::ToZero)
    }

    fn percent_with(&self, percent: Percent, strategy: RoundingStrategy) -> Money {
        let raw = Decimal::from(self.minor) * percent.as_decimal() / Decimal::ONE_HUNDRED;
        let minor = raw
            .round_dp_with_strategy(0, strategy)
            .to_u64()
            .unwrap_or(0);
        Money { minor, currency: self.currency }
    }

    /// split into `parts` amounts whose sum is exactly `self`;
    /// the remainder goes one minor unit at a time to the earliest parts
    pub fn split_evenly(&self, parts: u32) -> Vec<Money> {
        if parts == 0 {
            return Vec::new();
        }
        let base = self.minor / parts as u64;
        let remainder = self.minor % parts as u64;
        (0..parts as u64)
            .map(|i| Money {
                minor: base + u64::from(i < remainder),
                currency: self.currency,
            })
            .collect()
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::ZERO
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let per = self.currency.minor_per_major();
        write!(f, "{} {}.{:02}", self.currency, self.minor / per, self.minor % per)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        debug_assert_eq!(self.currency, other.currency, "adding mixed currencies");
        Money {
            minor: self.minor + other.minor,
            currency: self.currency,
        }
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        debug_assert_eq!(self.currency, other.currency, "adding mixed currencies");
        self.minor += other.minor;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        let mut total: Option<Money> = None;
        for m in iter {
            total = Some(match total {
                Some(t) => t + m,
                None => m,
            });
        }
        total.unwrap_or(Money::ZERO)
    }
}

/// signed outcome of a subtraction that may overshoot zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetPosition {
    /// amount still owed
    Due(Money),
    /// amount owed back to the student
    Credit(Money),
    Settled,
}

impl NetPosition {
    pub fn due(&self) -> Option<Money> {
        match self {
            NetPosition::Due(m) => Some(*m),
            _ => None,
        }
    }

    pub fn credit(&self) -> Option<Money> {
        match self {
            NetPosition::Credit(m) => Some(*m),
            _ => None,
        }
    }
}

/// percentage value, 5 means 5%
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Percent(Decimal);

impl Percent {
    pub const ZERO: Percent = Percent(Decimal::ZERO);
    pub const HUNDRED: Percent = Percent(Decimal::ONE_HUNDRED);

    /// create from a whole percentage (e.g., 20 for 20%)
    pub fn from_whole(p: u32) -> Self {
        Percent(Decimal::from(p))
    }

    /// create from decimal percentage (e.g., 2.5 for 2.5%)
    pub fn from_decimal(d: Decimal) -> Self {
        Percent(d)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// true when within the closed range 0..=100
    pub fn is_bounded(&self) -> bool {
        self.0 >= Decimal::ZERO && self.0 <= Decimal::ONE_HUNDRED
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_display_major_and_minor() {
        let m = Money::from_minor(5_000_050, Currency::Php);
        assert_eq!(m.to_string(), "PHP 50000.50");
        assert_eq!(Money::php(15_000).to_string(), "PHP 15000.00");
    }

    #[test]
    fn test_parse_exact() {
        assert_eq!(
            Money::parse("1500.25", Currency::Php).unwrap(),
            Money::from_minor(150_025, Currency::Php)
        );
        assert!(Money::parse("1.001", Currency::Php).is_err());
        assert!(Money::parse("-3", Currency::Php).is_err());
        assert!(Money::parse("abc", Currency::Php).is_err());
    }

    #[test]
    fn test_subtract_refuses_negative() {
        let a = Money::php(100);
        let b = Money::php(150);

        assert_eq!(b.subtract(a).unwrap(), Money::php(50));
        match a.subtract(b) {
            Err(LedgerError::NegativeResult { .. }) => {}
            other => panic!("expected NegativeResult, got {:?}", other),
        }
    }

    #[test]
    fn test_subtract_allowing_credit() {
        let due = Money::php(100);
        assert_eq!(
            due.subtract_allowing_credit(Money::php(30)).unwrap(),
            NetPosition::Due(Money::php(70))
        );
        assert_eq!(
            due.subtract_allowing_credit(Money::php(130)).unwrap(),
            NetPosition::Credit(Money::php(30))
        );
        assert_eq!(
            due.subtract_allowing_credit(Money::php(100)).unwrap(),
            NetPosition::Settled
        );
    }

    #[test]
    fn test_currency_mismatch() {
        let php = Money::php(1);
        let usd = Money::from_major(1, Currency::Usd);
        assert!(matches!(
            php.checked_add(usd),
            Err(LedgerError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_bankers_rounding_on_percent() {
        // 2.5% of 1.00 = 2.5 centavos -> 2 (round half to even)
        let m = Money::from_minor(100, Currency::Php);
        assert_eq!(m.multiply_by_percent(Percent::from_decimal(dec!(2.5))).minor_units(), 2);

        // 3.5% of 1.00 = 3.5 centavos -> 4
        assert_eq!(m.multiply_by_percent(Percent::from_decimal(dec!(3.5))).minor_units(), 4);

        // floor variant always truncates
        assert_eq!(m.multiply_by_percent_floor(Percent::from_decimal(dec!(3.5))).minor_units(), 3);
    }

    #[test]
    fn test_split_evenly_distributes_remainder_first() {
        let parts = Money::from_minor(10, Currency::Php).split_evenly(3);
        let minors: Vec<u64> = parts.iter().map(|m| m.minor_units()).collect();
        assert_eq!(minors, vec![4, 3, 3]);
        assert_eq!(parts.into_iter().sum::<Money>(), Money::from_minor(10, Currency::Php));
    }

    #[test]
    fn test_ordering_by_minor_units() {
        assert!(Money::php(10) < Money::php(11));
        assert_eq!(Money::php(10).max(Money::php(3)), Money::php(10));
        assert_eq!(Money::php(10).min(Money::php(3)), Money::php(3));
    }

    #[test]
    fn test_percent_bounds() {
        assert!(Percent::from_whole(0).is_bounded());
        assert!(Percent::from_whole(100).is_bounded());
        assert!(!Percent::from_whole(101).is_bounded());
        assert!(!Percent::from_decimal(dec!(-1)).is_bounded());
    }
}
