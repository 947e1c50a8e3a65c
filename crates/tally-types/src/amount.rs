//! Fixed-point decimal used for every monetary amount and metered quantity.
//!
//! Values are stored as an `i64` count of millionths (1e-6 scale). Equality is
//! exact, which the diff engine relies on: a re-rated amount that lands on the
//! same decimal value compares equal and produces no update.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Number of fractional decimal digits carried by [`Micros`].
pub const FRACTION_DIGITS: u32 = 6;

const SCALE: i64 = 1_000_000;

/// A fixed-point decimal at 1e-6 scale.
///
/// There is no `From<i64>`: use [`Micros::new`] for raw millionths or
/// [`Micros::from_units`] for whole units. Serialized as a decimal string
/// (`"12.5"`) so that JSON consumers never round through `f64`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Micros(i64);

impl Micros {
    /// Construct from a raw count of millionths.
    #[inline]
    pub const fn new(raw: i64) -> Self {
        Micros(raw)
    }

    /// Construct from whole units (`from_units(3)` is `3.000000`).
    ///
    /// Returns `None` if the scaled value does not fit.
    pub fn from_units(units: i64) -> Option<Self> {
        units.checked_mul(SCALE).map(Micros)
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl FromStr for Micros {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));

        let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if (int_part.is_empty() && frac_part.is_empty())
            || !all_digits(int_part)
            || !all_digits(frac_part)
        {
            return Err(TypeError::InvalidDecimal(s.to_string()));
        }
        if frac_part.len() > FRACTION_DIGITS as usize {
            return Err(TypeError::Precision {
                value: s.to_string(),
                max: FRACTION_DIGITS,
            });
        }

        let whole: i64 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| TypeError::Overflow(s.to_string()))?
        };
        let mut frac: i64 = 0;
        for b in frac_part.bytes() {
            frac = frac * 10 + i64::from(b - b'0');
        }
        frac *= 10_i64.pow(FRACTION_DIGITS - frac_part.len() as u32);

        let raw = whole
            .checked_mul(SCALE)
            .and_then(|v| v.checked_add(frac))
            .ok_or_else(|| TypeError::Overflow(s.to_string()))?;

        Ok(Micros(if negative { -raw } else { raw }))
    }
}

impl fmt::Display for Micros {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.unsigned_abs();
        let whole = abs / SCALE as u64;
        let frac = abs % SCALE as u64;
        let sign = if self.0 < 0 { "-" } else { "" };
        if frac == 0 {
            write!(f, "{sign}{whole}")
        } else {
            let digits = format!("{frac:06}");
            write!(f, "{sign}{whole}.{}", digits.trim_end_matches('0'))
        }
    }
}

impl Serialize for Micros {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct MicrosVisitor;

impl<'de> Visitor<'de> for MicrosVisitor {
    type Value = Micros;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal string or an integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Micros, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Micros, E> {
        Micros::from_units(v).ok_or_else(|| E::custom(TypeError::Overflow(v.to_string())))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Micros, E> {
        i64::try_from(v)
            .ok()
            .and_then(Micros::from_units)
            .ok_or_else(|| E::custom(TypeError::Overflow(v.to_string())))
    }
}

impl<'de> Deserialize<'de> for Micros {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MicrosVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn m(s: &str) -> Micros {
        s.parse().unwrap()
    }

    #[test]
    fn parse_whole_and_fraction() {
        assert_eq!(m("12"), Micros::new(12_000_000));
        assert_eq!(m("12.5"), Micros::new(12_500_000));
        assert_eq!(m("-0.000001"), Micros::new(-1));
        assert_eq!(m(".25"), Micros::new(250_000));
        assert_eq!(m("+3."), Micros::new(3_000_000));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!("".parse::<Micros>(), Err(TypeError::InvalidDecimal(_))));
        assert!(matches!("-".parse::<Micros>(), Err(TypeError::InvalidDecimal(_))));
        assert!(matches!("1.2.3".parse::<Micros>(), Err(TypeError::InvalidDecimal(_))));
        assert!(matches!("1e5".parse::<Micros>(), Err(TypeError::InvalidDecimal(_))));
    }

    #[test]
    fn parse_rejects_excess_precision() {
        let err = "0.0000001".parse::<Micros>().unwrap_err();
        assert_eq!(
            err,
            TypeError::Precision {
                value: "0.0000001".into(),
                max: 6
            }
        );
    }

    #[test]
    fn parse_rejects_overflow() {
        assert!(matches!(
            "99999999999999999999".parse::<Micros>(),
            Err(TypeError::Overflow(_))
        ));
    }

    #[test]
    fn display_trims_trailing_zeros() {
        assert_eq!(m("12.500").to_string(), "12.5");
        assert_eq!(m("7").to_string(), "7");
        assert_eq!(m("-0.5").to_string(), "-0.5");
        assert_eq!(Micros::default().to_string(), "0");
    }

    #[test]
    fn serde_as_string_and_integer() {
        let json = serde_json::to_string(&m("1.25")).unwrap();
        assert_eq!(json, "\"1.25\"");
        let parsed: Micros = serde_json::from_str("\"1.25\"").unwrap();
        assert_eq!(parsed, m("1.25"));
        let parsed: Micros = serde_json::from_str("4").unwrap();
        assert_eq!(parsed, m("4"));
        assert_eq!(Micros::from_units(4), Some(parsed));
        assert!(serde_json::from_str::<Micros>("9223372036854775807").is_err());
    }

    proptest! {
        #[test]
        fn display_then_parse_is_identity(raw in -1_000_000_000_000i64..1_000_000_000_000i64) {
            let value = Micros::new(raw);
            prop_assert_eq!(value.to_string().parse::<Micros>().unwrap(), value);
        }
    }
}
