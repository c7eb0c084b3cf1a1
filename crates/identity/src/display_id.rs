//! Human-readable Smart IDs (`25INT1211001`).

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use internhub_core::{DomainError, DomainResult, ValueObject};

use crate::prefix::Prefix;
use crate::role::RoleCode;
use crate::sequence::Sequence;

/// The external identifier of an account: a [`Prefix`] followed by a
/// [`Sequence`], always exactly 12 characters of `[0-9A-Z]`.
///
/// Ordering agrees with plain string ordering of the rendered id: prefixes are
/// fixed width, and within a prefix the sequence decides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayId {
    prefix: Prefix,
    sequence: Sequence,
    rendered: String,
}

impl DisplayId {
    pub const LEN: usize = Prefix::LEN + Sequence::WIDTH;

    pub fn compose(prefix: &Prefix, sequence: Sequence) -> Self {
        Self {
            prefix: prefix.clone(),
            sequence,
            rendered: format!("{prefix}{sequence}"),
        }
    }

    /// Parse a display id typed by a person or read back from storage.
    pub fn parse(s: &str) -> DomainResult<Self> {
        let s = s.trim();
        if s.len() != Self::LEN || !s.is_ascii() {
            return Err(DomainError::invalid_id(format!(
                "display id '{s}' must be {} ASCII characters",
                Self::LEN
            )));
        }

        let (head, tail) = s.split_at(Prefix::LEN);
        let prefix = Prefix::parse(head)?;
        let sequence = Sequence::parse(tail)
            .map_err(|e| DomainError::invalid_id(format!("display id '{s}': {e}")))?;

        Ok(Self::compose(&prefix, sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    pub fn role(&self) -> RoleCode {
        self.prefix.role()
    }

    pub fn has_prefix(&self, prefix: &Prefix) -> bool {
        &self.prefix == prefix
    }
}

impl ValueObject for DisplayId {}

impl core::fmt::Display for DisplayId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.rendered)
    }
}

impl AsRef<str> for DisplayId {
    fn as_ref(&self) -> &str {
        &self.rendered
    }
}

impl FromStr for DisplayId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DisplayId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DisplayId> for String {
    fn from(value: DisplayId) -> Self {
        value.rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn role_strategy() -> impl Strategy<Value = RoleCode> {
        prop::sample::select(RoleCode::ALL.to_vec())
    }

    fn date_strategy() -> impl Strategy<Value = NaiveDate> {
        (1970i32..2200, 1u32..=12, 1u32..=28)
            .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn parses_and_splits_example() {
        let id: DisplayId = "25int1211a01".parse().unwrap();
        assert_eq!(id.as_str(), "25INT1211A01");
        assert_eq!(id.prefix().as_str(), "25INT1211");
        assert_eq!(id.sequence().value(), 10 * 36 * 36 + 1);
        assert_eq!(id.role(), RoleCode::Intern);
    }

    #[test]
    fn rejects_wrong_length_and_charset() {
        assert!(DisplayId::parse("25INT121100").is_err());
        assert!(DisplayId::parse("25INT12110011").is_err());
        assert!(DisplayId::parse("25INT1211-01").is_err());
        assert!(DisplayId::parse("25ABC1211001").is_err());
    }

    #[test]
    fn rejects_impossible_day() {
        assert!(DisplayId::parse("25INT0231001").is_err());
        assert!(DisplayId::parse("25INT0228001").is_ok());
    }

    #[test]
    fn serde_uses_plain_string() {
        let id = DisplayId::parse("26SUP1019001").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"26SUP1019001\"");
        assert!(serde_json::from_str::<DisplayId>("\"26SUP10190\"").is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: every (role, date, sequence) renders to 12 characters under
        /// the deterministic prefix, and parses back to itself.
        #[test]
        fn fixed_width_under_deterministic_prefix(
            role in role_strategy(),
            date in date_strategy(),
            seq in 1u16..=Sequence::MAX_VALUE,
        ) {
            let prefix = Prefix::compute(role, date);
            let id = prefix.display_id(Sequence::from_value(seq).unwrap());

            prop_assert_eq!(id.as_str().len(), DisplayId::LEN);
            prop_assert!(id.as_str().bytes().all(|b| b.is_ascii_digit() || b.is_ascii_uppercase()));
            prop_assert!(id.has_prefix(&prefix));
            prop_assert_eq!(id.prefix(), &prefix);
            prop_assert_eq!(id.sequence().value(), seq);
            prop_assert_eq!(DisplayId::parse(id.as_str()).unwrap(), id);
        }
    }
}
