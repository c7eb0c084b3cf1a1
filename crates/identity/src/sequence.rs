//! The 3-character base-36 counter at the end of every display id.

use serde::{Deserialize, Serialize};

use internhub_core::ValueObject;

use crate::base36;
use crate::error::{AllocationError, AllocationResult};

/// A fixed-width sequence component (`"001"`..=`"ZZZ"`).
///
/// Stored as its numeric value; rendered zero-padded to [`Sequence::WIDTH`].
/// Because the alphabet is ordered `0-9A-Z`, lexicographic order of the rendered
/// strings equals numeric order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sequence(u16);

impl Sequence {
    pub const WIDTH: usize = 3;
    /// `36^3 - 1`, rendered as `"ZZZ"`.
    pub const MAX_VALUE: u16 = 46_655;
    pub const MIN: Sequence = Sequence(0);
    pub const FIRST: Sequence = Sequence(1);
    pub const MAX: Sequence = Sequence(Self::MAX_VALUE);

    pub fn from_value(value: u16) -> AllocationResult<Self> {
        if value > Self::MAX_VALUE {
            return Err(AllocationError::invalid_argument(format!(
                "sequence value {value} does not fit in {} base-36 digits",
                Self::WIDTH
            )));
        }
        Ok(Self(value))
    }

    /// Parse a 3-character base-36 string (case-insensitive).
    pub fn parse(s: &str) -> AllocationResult<Self> {
        if s.chars().count() != Self::WIDTH {
            return Err(AllocationError::invalid_argument(format!(
                "sequence '{s}' must be exactly {} characters",
                Self::WIDTH
            )));
        }
        let value = base36::decode(s)?;
        // Three digits can never exceed MAX_VALUE.
        Ok(Self(value as u16))
    }

    pub const fn value(self) -> u16 {
        self.0
    }

    /// The sequence that follows `last` within one prefix.
    ///
    /// `None` for `last` means the prefix has no allocations yet. Returns `None`
    /// when `last` is already [`Sequence::MAX`]: there is no successor that fits
    /// in three characters.
    pub fn next_after(last: Option<Sequence>) -> Option<Sequence> {
        match last {
            None => Some(Self::FIRST),
            Some(Sequence(v)) if v >= Self::MAX_VALUE => None,
            Some(Sequence(v)) => Some(Sequence(v + 1)),
        }
    }
}

impl ValueObject for Sequence {}

impl core::fmt::Display for Sequence {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // A u16 <= MAX_VALUE always encodes.
        let digits = base36::encode(i64::from(self.0)).map_err(|_| core::fmt::Error)?;
        write!(f, "{digits:0>width$}", width = Self::WIDTH)
    }
}

impl TryFrom<String> for Sequence {
    type Error = AllocationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Sequence> for String {
    fn from(value: Sequence) -> Self {
        value.to_string()
    }
}

/// String-level increment: `""` -> `"001"`, `"009"` -> `"00A"`, `"ZZY"` -> `"ZZZ"`.
///
/// `"ZZZ"` has no successor and yields `CapacityExhausted` (with an empty
/// prefix, since none is known at this level).
pub fn increment(last: &str) -> AllocationResult<String> {
    let last = match last {
        "" => None,
        s => Some(Sequence::parse(s)?),
    };
    Sequence::next_after(last)
        .map(|next| next.to_string())
        .ok_or_else(|| AllocationError::capacity_exhausted(String::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_starts_at_one() {
        assert_eq!(increment("").unwrap(), "001");
        assert_eq!(Sequence::next_after(None), Some(Sequence::FIRST));
    }

    #[test]
    fn carries_into_letters_and_next_digit() {
        assert_eq!(increment("001").unwrap(), "002");
        assert_eq!(increment("009").unwrap(), "00A");
        assert_eq!(increment("00Z").unwrap(), "010");
        assert_eq!(increment("0ZZ").unwrap(), "100");
        assert_eq!(increment("ZZY").unwrap(), "ZZZ");
    }

    #[test]
    fn accepts_lower_case_input_and_emits_upper_case() {
        assert_eq!(increment("a1z").unwrap(), "A20");
    }

    #[test]
    fn refuses_to_widen_past_three_characters() {
        let err = increment("ZZZ").unwrap_err();
        assert!(matches!(err, AllocationError::CapacityExhausted { .. }));
        assert_eq!(Sequence::next_after(Some(Sequence::MAX)), None);
    }

    #[test]
    fn rejects_wrong_width_and_bad_digits() {
        assert!(matches!(increment("01"), Err(AllocationError::InvalidArgument(_))));
        assert!(matches!(increment("0001"), Err(AllocationError::InvalidArgument(_))));
        assert!(matches!(increment("0#1"), Err(AllocationError::InvalidArgument(_))));
    }

    #[test]
    fn from_value_guards_the_width() {
        assert_eq!(Sequence::from_value(46_655).unwrap(), Sequence::MAX);
        assert!(Sequence::from_value(46_656).is_err());
    }

    #[test]
    fn string_order_matches_numeric_order() {
        let a = Sequence::from_value(35).unwrap();
        let b = Sequence::from_value(36).unwrap();
        assert!(a < b);
        assert!(a.to_string() < b.to_string());
    }
}
