use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Neg, Sub};

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};
use serde::{Serialize, Serializer};

/// Exact fraction; grade values and coefficients arrive in hundredths and are
/// only rounded when shown.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Score(BigRational);

impl Score {
    pub fn zero() -> Self {
        Self(BigRational::zero())
    }

    /// `None` when `den` is zero.
    pub fn ratio(num: i128, den: i128) -> Option<Self> {
        if den == 0 {
            return None;
        }
        Some(Self(BigRational::new(BigInt::from(num), BigInt::from(den))))
    }

    pub fn from_integer(value: i64) -> Self {
        Self(BigRational::from_integer(BigInt::from(value)))
    }

    pub fn from_hundredths(value: i64) -> Self {
        Self(BigRational::new(BigInt::from(value), BigInt::from(100)))
    }

    pub fn abs(&self) -> Score {
        Score(self.0.abs())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_positive()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    pub fn checked_div(self, other: Score) -> Option<Score> {
        if other.is_zero() {
            return None;
        }
        Some(Score(self.0 / other.0))
    }

    /// Rounded half away from zero.
    pub fn round_hundredths(&self) -> BigInt {
        let hundred = BigRational::from_integer(BigInt::from(100));
        (&self.0 * &hundred).round().to_integer()
    }

    pub fn to_f64(&self) -> f64 {
        self.round_hundredths().to_f64().map_or(f64::NAN, |value| value / 100.0)
    }
}

impl Add for Score {
    type Output = Score;

    fn add(self, other: Score) -> Score {
        Score(self.0 + other.0)
    }
}

impl Sub for Score {
    type Output = Score;

    fn sub(self, other: Score) -> Score {
        Score(self.0 - other.0)
    }
}

impl Neg for Score {
    type Output = Score;

    fn neg(self) -> Score {
        Score(-self.0)
    }
}

impl Mul for Score {
    type Output = Score;

    fn mul(self, other: Score) -> Score {
        Score(self.0 * other.0)
    }
}

impl Sum for Score {
    fn sum<I: Iterator<Item = Score>>(iter: I) -> Score {
        iter.fold(Score::zero(), |acc, value| acc + value)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hundredths = self.round_hundredths();
        let sign = if hundredths.is_negative() { "-" } else { "" };
        let hundred = BigInt::from(100);
        let abs = hundredths.abs();
        let fraction = (&abs % &hundred).to_string();
        let padding = if fraction.len() < 2 { "0" } else { "" };
        write!(f, "{}{}.{}{}", sign, &abs / &hundred, padding, fraction)
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

/// Missing values and non-positive weights are filtered out before the
/// reduction; nothing left to weigh means there is no mean.
pub fn weighted_mean<I>(pairs: I) -> Option<Score>
where
    I: IntoIterator<Item = (Score, Option<Score>)>,
{
    let (total, weight) = pairs
        .into_iter()
        .filter_map(|(weight, value)| value.map(|value| (weight, value)))
        .filter(|(weight, _)| weight.is_positive())
        .fold((Score::zero(), Score::zero()), |(total, sum), (weight, value)| {
            (total + weight.clone() * value, sum + weight)
        });

    total.checked_div(weight)
}

/// Parses decimal text such as `"14.5"`, `"7"` or `"12,25"` into hundredths.
pub fn parse_hundredths(text: &str) -> Option<i64> {
    let text = text.trim();
    let (whole, fraction) = match text.find(|c: char| c == '.' || c == ',') {
        Some(idx) => (&text[..idx], &text[idx + 1..]),
        None => (text, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if fraction.len() > 2 || !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let fraction: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };

    whole.checked_mul(100)?.checked_add(fraction)
}
