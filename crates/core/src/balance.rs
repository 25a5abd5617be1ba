//! Exact balances in minimal denomination units.
//!
//! Balances travel as decimal strings of arbitrary size. Each one carries a
//! floating point approximation in whole tokens which is only meant for
//! display and range queries; it is always derived from the exact integer it
//! accompanies, never accumulated on its own.

use std::{fmt::Display, ops::Add, str::FromStr, sync::OnceLock};

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use tracing::warn;

use crate::Error;

/// Number of decimals between the minimal unit and one whole token.
pub const DENOMINATION_DECIMALS: u32 = 18;

const DENOMINATION_F64: f64 = 1e18;

fn denomination() -> &'static BigUint {
    static DENOMINATION: OnceLock<BigUint> = OnceLock::new();
    DENOMINATION.get_or_init(|| BigUint::from(10u32).pow(DENOMINATION_DECIMALS))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    value: BigUint,
    approx: f64,
}

impl Balance {
    pub fn zero() -> Self {
        Self::from(BigUint::zero())
    }

    /// Parses a base-10 integer string. Signs, separators and surrounding
    /// whitespace are rejected.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidBalanceFormat(raw.to_owned()));
        }

        BigUint::from_str(raw)
            .map(Self::from)
            .map_err(|_| Error::InvalidBalanceFormat(raw.to_owned()))
    }

    /// Lenient variant for values that only feed derived fields.
    pub fn parse_or_zero(raw: &str) -> Self {
        match Self::parse(raw) {
            Ok(x) => x,
            Err(err) => {
                warn!(%err, "treating unparseable balance as zero");
                Self::zero()
            }
        }
    }

    /// Decodes a big-endian unsigned integer, as returned by contract views.
    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        Self::from(BigUint::from_bytes_be(bytes))
    }

    pub fn value(&self) -> &BigUint {
        &self.value
    }

    pub fn exact(&self) -> String {
        self.value.to_string()
    }

    pub fn approx(&self) -> f64 {
        self.approx
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<BigUint> for Balance {
    fn from(value: BigUint) -> Self {
        let approx = approximate(&value);
        Self { value, approx }
    }
}

impl From<u64> for Balance {
    fn from(value: u64) -> Self {
        Self::from(BigUint::from(value))
    }
}

impl Add for &Balance {
    type Output = Balance;

    fn add(self, rhs: Self) -> Self::Output {
        Balance::from(&self.value + &rhs.value)
    }
}

impl Add for Balance {
    type Output = Balance;

    fn add(self, rhs: Self) -> Self::Output {
        Balance::from(self.value + rhs.value)
    }
}

impl Display for Balance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.value.fmt(f)
    }
}

// whole tokens and the remainder are converted separately
fn approximate(value: &BigUint) -> f64 {
    let unit = denomination();
    let whole = value / unit;
    let fraction = value % unit;

    let whole = whole.to_f64().unwrap_or(f64::INFINITY);
    let fraction = fraction.to_f64().unwrap_or_default() / DENOMINATION_F64;

    whole + fraction
}

/// Returns the exact and approximate forms of a raw balance string.
pub fn parse_balance(raw: &str) -> Result<(String, f64), Error> {
    let balance = Balance::parse(raw)?;
    Ok((balance.exact(), balance.approx()))
}

/// Adds two raw balance strings exactly; the approximation comes from the sum.
pub fn sum_balances(a: &str, b: &str) -> Result<(String, f64), Error> {
    let sum = Balance::parse(a)? + Balance::parse(b)?;
    Ok((sum.exact(), sum.approx()))
}
