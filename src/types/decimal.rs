//! Exact decimal text rounding.
//!
//! NUMERIC and BIGNUMERIC values are carried as text so that up to 38
//! fractional digits survive without going through a float.

use thiserror::Error;

/// Largest exponent magnitude accepted in `1e<exp>` notation.
const MAX_EXPONENT: i64 = 1024;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecimalError {
    #[error("invalid decimal text '{0}'")]
    Invalid(String),

    #[error("decimal exponent out of range in '{0}'")]
    ExponentOutOfRange(String),
}

/// `digits * 10^exponent`, with the sign kept separately.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Parsed {
    negative: bool,
    /// Decimal digits, most significant first, values 0..=9.
    digits: Vec<u8>,
    exponent: i64,
}

impl Parsed {
    fn parse(text: &str) -> Result<Self, DecimalError> {
        let invalid = || DecimalError::Invalid(text.to_string());
        let s = text.trim();

        let (negative, s) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };

        let (mantissa, exp) = match s.find(['e', 'E']) {
            Some(pos) => {
                let exp: i64 = s[pos + 1..].parse().map_err(|_| invalid())?;
                if exp.abs() > MAX_EXPONENT {
                    return Err(DecimalError::ExponentOutOfRange(text.to_string()));
                }
                (&s[..pos], exp)
            }
            None => (s, 0),
        };

        let (int_part, frac_part) = match mantissa.split_once('.') {
            Some((i, f)) => (i, f),
            None => (mantissa, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }

        let mut digits = Vec::with_capacity(int_part.len() + frac_part.len());
        for b in int_part.bytes().chain(frac_part.bytes()) {
            if !b.is_ascii_digit() {
                return Err(invalid());
            }
            digits.push(b - b'0');
        }

        Ok(Self {
            negative,
            digits,
            exponent: exp - frac_part.len() as i64,
        })
    }

    /// Drop fractional digits beyond `scale`, rounding half to even when
    /// `round` is set and truncating otherwise.
    fn rescale(&mut self, scale: u32, round: bool) {
        let frac_len = -self.exponent;
        let excess = frac_len - scale as i64;
        if excess <= 0 {
            return;
        }
        let excess = excess as usize;

        // Make sure at least one digit is kept.
        if self.digits.len() <= excess {
            let pad = excess + 1 - self.digits.len();
            self.digits.splice(0..0, std::iter::repeat(0).take(pad));
        }

        let keep = self.digits.len() - excess;
        let dropped = self.digits.split_off(keep);
        self.exponent += excess as i64;

        if !round {
            return;
        }
        let first = dropped[0];
        let rest_nonzero = dropped[1..].iter().any(|&d| d != 0);
        let last_odd = self.digits.last().is_some_and(|d| d % 2 == 1);
        let round_up = first > 5 || (first == 5 && (rest_nonzero || last_odd));
        if round_up {
            self.increment();
        }
    }

    fn increment(&mut self) {
        for d in self.digits.iter_mut().rev() {
            if *d == 9 {
                *d = 0;
            } else {
                *d += 1;
                return;
            }
        }
        self.digits.insert(0, 1);
    }

    /// Plain notation without trailing fractional zeros or leading zeros.
    fn to_plain(&self) -> String {
        let mut digits: Vec<u8> = self.digits.clone();
        if self.exponent > 0 {
            digits.extend(std::iter::repeat(0).take(self.exponent as usize));
        }
        let frac_len = (-self.exponent).max(0) as usize;
        if digits.len() <= frac_len {
            let pad = frac_len + 1 - digits.len();
            digits.splice(0..0, std::iter::repeat(0).take(pad));
        }

        let split = digits.len() - frac_len;
        let int_digits = &digits[..split];
        let mut frac_digits = &digits[split..];
        while let Some((&0, rest)) = frac_digits.split_last() {
            frac_digits = rest;
        }
        let first_nonzero = int_digits
            .iter()
            .position(|&d| d != 0)
            .unwrap_or(int_digits.len() - 1);
        let int_digits = &int_digits[first_nonzero..];

        let is_zero = int_digits.iter().all(|&d| d == 0) && frac_digits.is_empty();
        let mut out = String::with_capacity(digits.len() + 2);
        if self.negative && !is_zero {
            out.push('-');
        }
        out.extend(int_digits.iter().map(|d| (b'0' + d) as char));
        if !frac_digits.is_empty() {
            out.push('.');
            out.extend(frac_digits.iter().map(|d| (b'0' + d) as char));
        }
        out
    }
}

/// Round decimal text to at most `scale` fractional digits, half to even.
///
/// Accepts plain (`12.345`) and exponent (`-9.876e-3`) notation and returns
/// plain notation with trailing fractional zeros removed.
pub fn round_decimal(text: &str, scale: u32) -> Result<String, DecimalError> {
    let mut parsed = Parsed::parse(text)?;
    parsed.rescale(scale, true);
    Ok(parsed.to_plain())
}

/// Integer part of decimal text, truncated toward zero.
pub fn truncate_decimal(text: &str) -> Result<String, DecimalError> {
    let mut parsed = Parsed::parse(text)?;
    parsed.rescale(0, false);
    Ok(parsed.to_plain())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_values_pass_through() {
        assert_eq!(round_decimal("12.5", 9).unwrap(), "12.5");
        assert_eq!(round_decimal("-3", 9).unwrap(), "-3");
        assert_eq!(round_decimal("0", 9).unwrap(), "0");
        assert_eq!(round_decimal("+7.250", 9).unwrap(), "7.25");
        assert_eq!(round_decimal("007.0", 9).unwrap(), "7");
        assert_eq!(round_decimal(".5", 9).unwrap(), "0.5");
    }

    #[test]
    fn test_exponent_notation() {
        assert_eq!(round_decimal("-9.876e-3", 9).unwrap(), "-0.009876");
        assert_eq!(round_decimal("1.5E3", 9).unwrap(), "1500");
        assert_eq!(round_decimal("12e0", 9).unwrap(), "12");
    }

    #[test]
    fn test_rounding_half_even() {
        assert_eq!(round_decimal("0.1234567894", 9).unwrap(), "0.123456789");
        assert_eq!(round_decimal("0.1234567896", 9).unwrap(), "0.12345679");
        // ties go to the even neighbour
        assert_eq!(round_decimal("0.0000000005", 9).unwrap(), "0");
        assert_eq!(round_decimal("0.0000000015", 9).unwrap(), "0.000000002");
        assert_eq!(round_decimal("0.00000000050001", 9).unwrap(), "0.000000001");
    }

    #[test]
    fn test_rounding_carries() {
        assert_eq!(round_decimal("9.9999999999", 9).unwrap(), "10");
        assert_eq!(round_decimal("-0.9999999999", 9).unwrap(), "-1");
    }

    #[test]
    fn test_negative_zero_has_no_sign() {
        assert_eq!(round_decimal("-0.0000000001", 9).unwrap(), "0");
    }

    #[test]
    fn test_bignumeric_precision_is_kept() {
        let text = "1.12345678901234567890123456789012345678";
        assert_eq!(round_decimal(text, 38).unwrap(), text);
        assert_eq!(
            round_decimal("0.123456789012345678901234567890123456789", 38).unwrap(),
            "0.12345678901234567890123456789012345679"
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate_decimal("12.99").unwrap(), "12");
        assert_eq!(truncate_decimal("-12.99").unwrap(), "-12");
        assert_eq!(truncate_decimal("-0.5").unwrap(), "0");
        assert_eq!(truncate_decimal("2.5e2").unwrap(), "250");
    }

    #[test]
    fn test_invalid_text() {
        assert!(matches!(round_decimal("abc", 9), Err(DecimalError::Invalid(_))));
        assert!(matches!(round_decimal("", 9), Err(DecimalError::Invalid(_))));
        assert!(matches!(round_decimal("1.2.3", 9), Err(DecimalError::Invalid(_))));
        assert!(matches!(
            round_decimal("1e99999", 9),
            Err(DecimalError::ExponentOutOfRange(_))
        ));
    }
}
