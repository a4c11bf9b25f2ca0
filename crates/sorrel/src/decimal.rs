//! Decimal type for the interpreter's number values.
//!
//! Numbers are arbitrary-precision decimals stored as coefficient * 10^exponent,
//! with arithmetic rounded to a fixed context precision the way Python's
//! `decimal` module rounds: [`PRECISION`] significant digits, ties to even.
//! Special values (NaN, infinities) are not representable; guest-visible
//! failure cases such as division by zero surface as errors instead.

use std::{cmp::Ordering, fmt, str::FromStr};

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::error::{Error, RunResult};

/// Significant digits kept by arithmetic operations.
///
/// This is a documented convention of the language (11 significant digits,
/// round half to even). Widening only requires changing this constant.
pub const PRECISION: u32 = 11;

/// An arbitrary-precision decimal number.
///
/// The value is `coefficient * 10^exponent`. Trailing zeros in the
/// coefficient are significant and preserved, so `5.00` and `5` display
/// differently while comparing equal.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Decimal {
    /// The significand of the number.
    coefficient: BigInt,
    /// The power of ten scaling the coefficient.
    exponent: i32,
}

impl Decimal {
    pub(crate) fn new(coefficient: BigInt, exponent: i32) -> Self {
        Self { coefficient, exponent }
    }

    #[must_use]
    pub fn zero() -> Self {
        Self::new(BigInt::zero(), 0)
    }

    #[must_use]
    pub fn one() -> Self {
        Self::new(BigInt::one(), 0)
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.coefficient.is_zero()
    }

    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.coefficient.is_negative()
    }

    /// Returns the integral value of this decimal, or None when it has a
    /// fractional part.
    #[must_use]
    pub fn to_bigint(&self) -> Option<BigInt> {
        if self.exponent >= 0 {
            Some(&self.coefficient * pow10(u32::try_from(self.exponent).ok()?))
        } else {
            let scale = pow10(u32::try_from(-i64::from(self.exponent)).ok()?);
            let (quot, rem) = self.coefficient.div_rem(&scale);
            rem.is_zero().then_some(quot)
        }
    }

    /// Rounds the coefficient down to [`PRECISION`] significant digits.
    ///
    /// `sticky` records that digits beyond the coefficient were already
    /// dropped (used by division to keep half-even ties exact).
    fn apply_context(mut self, sticky: bool) -> Self {
        let digits = digit_count(&self.coefficient);
        if digits > PRECISION {
            let excess = digits - PRECISION;
            self.coefficient = round_half_even(&self.coefficient, excess, sticky);
            self.exponent = add_exp(self.exponent, i64::from(excess));
            // Rounding 999..9 up yields a coefficient one digit too wide.
            if digit_count(&self.coefficient) > PRECISION {
                self.coefficient = &self.coefficient / BigInt::from(10u8);
                self.exponent = add_exp(self.exponent, 1);
            }
        }
        self
    }

    /// Rescales both coefficients to the smaller of the two exponents.
    fn align(&self, other: &Self) -> (BigInt, BigInt, i32) {
        let exp = self.exponent.min(other.exponent);
        let lhs = &self.coefficient * pow10_i64(i64::from(self.exponent) - i64::from(exp));
        let rhs = &other.coefficient * pow10_i64(i64::from(other.exponent) - i64::from(exp));
        (lhs, rhs, exp)
    }

    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        let (lhs, rhs, exp) = self.align(other);
        Self::new(lhs + rhs, exp).apply_context(false)
    }

    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        let (lhs, rhs, exp) = self.align(other);
        Self::new(lhs - rhs, exp).apply_context(false)
    }

    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        let coefficient = &self.coefficient * &other.coefficient;
        let exponent = add_exp(self.exponent, i64::from(other.exponent));
        Self::new(coefficient, exponent).apply_context(false)
    }

    #[must_use]
    pub fn neg(&self) -> Self {
        Self::new(-&self.coefficient, self.exponent)
    }

    #[must_use]
    pub fn abs(&self) -> Self {
        Self::new(self.coefficient.abs(), self.exponent)
    }

    /// True decimal division, correctly rounded to the context precision.
    ///
    /// Exact quotients are reduced toward the ideal exponent
    /// (`self.exponent - other.exponent`) so `10 / 2` yields `5`, not
    /// `5.0000000000`.
    pub fn div(&self, other: &Self) -> RunResult<Self> {
        if other.is_zero() {
            return Err(Error::program("division by zero"));
        }
        if self.is_zero() {
            return Ok(Self::zero());
        }
        // Scale the numerator so the raw quotient carries one guard digit
        // beyond the context precision.
        let shift = (i64::from(PRECISION) + 1 + i64::from(digit_count(&other.coefficient))
            - i64::from(digit_count(&self.coefficient)))
        .max(0);
        let numerator = &self.coefficient * pow10_i64(shift);
        let (quot, rem) = numerator.div_rem(&other.coefficient);
        let exponent = add_exp(self.exponent, -i64::from(other.exponent) - shift);
        let ideal = i64::from(self.exponent) - i64::from(other.exponent);

        let mut result = Self::new(quot, exponent).apply_context(!rem.is_zero());
        if rem.is_zero() {
            let ten = BigInt::from(10u8);
            while i64::from(result.exponent) < ideal && (&result.coefficient % &ten).is_zero() {
                result.coefficient = &result.coefficient / &ten;
                result.exponent = add_exp(result.exponent, 1);
            }
        }
        Ok(result)
    }

    /// Remainder with the sign of the dividend (truncated division).
    pub fn rem(&self, other: &Self) -> RunResult<Self> {
        if other.is_zero() {
            return Err(Error::program("remainder by zero"));
        }
        let (lhs, rhs, exp) = self.align(other);
        Ok(Self::new(lhs % rhs, exp).apply_context(false))
    }

    /// Raises self to an integral power.
    ///
    /// Negative exponents go through the reciprocal; fractional exponents are
    /// rejected.
    pub fn pow(&self, exponent: &Self) -> RunResult<Self> {
        let Some(power) = exponent.to_bigint().and_then(|n| n.to_i64()) else {
            return Err(Error::type_mismatch("exponent must be an integral number"));
        };
        if power == 0 {
            if self.is_zero() {
                return Err(Error::program("0 ** 0 is undefined"));
            }
            return Ok(Self::one());
        }
        if self.is_zero() && power < 0 {
            return Err(Error::program("0 cannot be raised to a negative power"));
        }

        let mut result = Self::one();
        let mut base = self.clone();
        let mut remaining = power.unsigned_abs();
        while remaining > 0 {
            if remaining & 1 == 1 {
                result = result.mul(&base);
            }
            remaining >>= 1;
            if remaining > 0 {
                base = base.mul(&base);
            }
        }
        if power < 0 { Self::one().div(&result) } else { Ok(result) }
    }
}

impl FromStr for Decimal {
    type Err = String;

    /// Parses a signed decimal literal: `-12`, `3.25`, `+.5`, `1e-3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let (mantissa, exp_part) = match text.find(['e', 'E']) {
            Some(idx) => {
                let exp: i64 = text[idx + 1..]
                    .parse()
                    .map_err(|_| format!("invalid decimal exponent in {text:?}"))?;
                (&text[..idx], exp)
            }
            None => (text, 0),
        };

        let (sign, digits) = match mantissa.as_bytes().first() {
            Some(b'-') => (-1, &mantissa[1..]),
            Some(b'+') => (1, &mantissa[1..]),
            _ => (1, mantissa),
        };
        let (int_part, frac_part) = match digits.find('.') {
            Some(idx) => (&digits[..idx], &digits[idx + 1..]),
            None => (digits, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(format!("invalid decimal literal {text:?}"));
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("invalid decimal literal {text:?}"));
        }

        let mut coefficient: BigInt = format!("{int_part}{frac_part}").parse().map_err(|_| {
            // digits may still overflow an intermediate buffer in pathological cases
            format!("invalid decimal literal {text:?}")
        })?;
        if sign < 0 {
            coefficient = -coefficient;
        }
        let exponent = exp_part - i64::try_from(frac_part.len()).unwrap_or(i64::MAX);
        Ok(Self::new(coefficient, clamp_exp(exponent)))
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self::new(BigInt::from(value), 0)
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        let (lhs, rhs, _) = self.align(other);
        lhs == rhs
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let (lhs, rhs, _) = self.align(other);
        lhs.cmp(&rhs)
    }
}

impl fmt::Display for Decimal {
    /// Formats the value the way Python's `decimal` module does: fixed
    /// notation while `exponent <= 0` and the adjusted exponent stays above
    /// -6, scientific notation otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(f, "-")?;
        }
        let digits = self.coefficient.abs().to_string();
        let len = i64::try_from(digits.len()).unwrap_or(i64::MAX);
        let exponent = i64::from(self.exponent);
        let adjusted = exponent + len - 1;

        if exponent <= 0 && adjusted >= -6 {
            let leading = len + exponent;
            if exponent == 0 {
                write!(f, "{digits}")
            } else if leading > 0 {
                let split = usize::try_from(leading).unwrap_or(digits.len());
                write!(f, "{}.{}", &digits[..split], &digits[split..])
            } else {
                let zeros = usize::try_from(-leading).unwrap_or(0);
                write!(f, "0.{}{}", "0".repeat(zeros), digits)
            }
        } else {
            if digits.len() > 1 {
                write!(f, "{}.{}", &digits[..1], &digits[1..])?;
            } else {
                write!(f, "{digits}")?;
            }
            if adjusted >= 0 {
                write!(f, "E+{adjusted}")
            } else {
                write!(f, "E{adjusted}")
            }
        }
    }
}

/// Number of decimal digits in the magnitude of `n` (at least 1).
fn digit_count(n: &BigInt) -> u32 {
    if n.is_zero() {
        return 1;
    }
    u32::try_from(n.abs().to_string().len()).unwrap_or(u32::MAX)
}

/// Divides `n` by 10^excess, rounding half to even on its magnitude.
///
/// `sticky` means nonzero digits were already discarded below the ones being
/// dropped here, which breaks exact-half ties upward.
fn round_half_even(n: &BigInt, excess: u32, sticky: bool) -> BigInt {
    let negative = n.is_negative();
    let divisor = pow10(excess);
    let (mut quot, rem) = n.abs().div_rem(&divisor);
    let doubled = &rem + &rem;
    let round_up = match doubled.cmp(&divisor) {
        Ordering::Greater => true,
        Ordering::Equal => sticky || quot.is_odd(),
        Ordering::Less => false,
    };
    if round_up {
        quot += BigInt::one();
    }
    if negative { -quot } else { quot }
}

fn pow10(power: u32) -> BigInt {
    BigInt::from(10u8).pow(power)
}

fn pow10_i64(power: i64) -> BigInt {
    pow10(u32::try_from(power.max(0)).unwrap_or(u32::MAX))
}

fn clamp_exp(exponent: i64) -> i32 {
    i32::try_from(exponent).unwrap_or(if exponent > 0 { i32::MAX } else { i32::MIN })
}

fn add_exp(exponent: i32, delta: i64) -> i32 {
    clamp_exp(i64::from(exponent) + delta)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn parse_and_display_round_trip() {
        for text in ["0", "1", "-1", "42", "3.25", "-0.5", "0.00", "1000"] {
            assert_eq!(dec(text).to_string(), text);
        }
    }

    #[test]
    fn parse_exponent_forms() {
        assert_eq!(dec("1e3"), dec("1000"));
        assert_eq!(dec("2.5E-2"), dec("0.025"));
        assert_eq!(dec("+.5"), dec("0.5"));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<Decimal>().is_err());
        assert!("abc".parse::<Decimal>().is_err());
        assert!("1.2.3".parse::<Decimal>().is_err());
        assert!("nan".parse::<Decimal>().is_err());
    }

    #[test]
    fn integer_arithmetic_stays_exact() {
        assert_eq!(dec("3").add(&dec("4")).to_string(), "7");
        assert_eq!(dec("10").mul(&dec("10")).to_string(), "100");
        assert_eq!(dec("1").sub(&dec("3")).to_string(), "-2");
    }

    #[test]
    fn exact_division_reduces_to_ideal_exponent() {
        assert_eq!(dec("10").div(&dec("2")).unwrap().to_string(), "5");
        assert_eq!(dec("6").div(&dec("2")).unwrap().to_string(), "3");
        assert_eq!(dec("1").div(&dec("8")).unwrap().to_string(), "0.125");
    }

    #[test]
    fn inexact_division_rounds_to_eleven_digits() {
        assert_eq!(dec("1").div(&dec("3")).unwrap().to_string(), "0.33333333333");
        assert_eq!(dec("2").div(&dec("3")).unwrap().to_string(), "0.66666666667");
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert!(dec("1").div(&dec("0")).is_err());
        assert!(dec("1").rem(&dec("0")).is_err());
    }

    #[test]
    fn remainder_sign_follows_dividend() {
        assert_eq!(dec("7").rem(&dec("3")).unwrap().to_string(), "1");
        assert_eq!(dec("-7").rem(&dec("3")).unwrap().to_string(), "-1");
        assert_eq!(dec("7.5").rem(&dec("2")).unwrap().to_string(), "1.5");
    }

    #[test]
    fn pow_integral_exponents() {
        assert_eq!(dec("2").pow(&dec("10")).unwrap().to_string(), "1024");
        assert_eq!(dec("2").pow(&dec("-2")).unwrap().to_string(), "0.25");
        assert_eq!(dec("9").pow(&dec("0")).unwrap().to_string(), "1");
        assert!(dec("2").pow(&dec("0.5")).is_err());
    }

    #[test]
    fn context_rounding_is_half_even() {
        // 12 digits, the dropped digit is an exact tie either side of even.
        let tie_up = dec("123456789015").mul(&dec("1"));
        assert_eq!(tie_up.to_string(), "1.2345678902E+11");
        let tie_down = dec("123456789025").mul(&dec("1"));
        assert_eq!(tie_down.to_string(), "1.2345678902E+11");
        let plain_up = dec("123456789017").mul(&dec("1"));
        assert_eq!(plain_up.to_string(), "1.2345678902E+11");
        let plain_down = dec("123456789012").mul(&dec("1"));
        assert_eq!(plain_down.to_string(), "1.2345678901E+11");
    }

    #[test]
    fn comparisons_align_exponents() {
        assert_eq!(dec("5.00"), dec("5"));
        assert!(dec("2") < dec("10"));
        assert!(dec("-1") < dec("0.5"));
        assert!(dec("0.00").is_zero());
    }

    #[test]
    fn to_bigint_rejects_fractions() {
        assert_eq!(dec("300").to_bigint().unwrap(), BigInt::from(300));
        assert_eq!(dec("3.00").to_bigint().unwrap(), BigInt::from(3));
        assert!(dec("3.5").to_bigint().is_none());
    }
}
