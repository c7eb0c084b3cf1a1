//! The deterministic `YY ROLE MMDD` head of a display id.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use internhub_core::{DomainError, DomainResult, ValueObject};

use crate::display_id::DisplayId;
use crate::error::{AllocationError, AllocationResult};
use crate::role::RoleCode;
use crate::sequence::Sequence;

/// 9-character allocation scope: 2-digit year, role code, 2-digit month and day.
///
/// One prefix covers one role on one calendar day, so it is also the key of
/// the allocation counter. The year wraps every century (`2125` and `2025` share
/// `25`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Prefix(String);

impl Prefix {
    pub const LEN: usize = 9;

    pub fn compute(role: RoleCode, date: NaiveDate) -> Self {
        Self(format!(
            "{:02}{}{:02}{:02}",
            date.year().rem_euclid(100),
            role.as_str(),
            date.month(),
            date.day()
        ))
    }

    /// Parse an already-rendered prefix such as `25INT1211`.
    pub fn parse(s: &str) -> DomainResult<Self> {
        let s = s.trim().to_ascii_uppercase();
        if s.len() != Self::LEN || !s.is_ascii() {
            return Err(DomainError::invalid_id(format!(
                "prefix '{s}' must be {} ASCII characters",
                Self::LEN
            )));
        }

        let (yy, rest) = s.split_at(2);
        let (role, mmdd) = rest.split_at(3);
        if !yy.bytes().chain(mmdd.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(DomainError::invalid_id(format!(
                "prefix '{s}' must carry numeric year, month and day"
            )));
        }
        role.parse::<RoleCode>()
            .map_err(|_| DomainError::invalid_id(format!("prefix '{s}' has unknown role '{role}'")))?;

        // Two-digit years are read as 20YY.
        let year = 2000 + yy.parse::<i32>().unwrap_or(0);
        let month: u32 = mmdd[..2].parse().unwrap_or(0);
        let day: u32 = mmdd[2..].parse().unwrap_or(0);
        if NaiveDate::from_ymd_opt(year, month, day).is_none() {
            return Err(DomainError::invalid_id(format!(
                "prefix '{s}' does not name a calendar day"
            )));
        }

        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn role(&self) -> RoleCode {
        // Validated at construction.
        self.0[2..5].parse().unwrap_or_default()
    }

    pub fn display_id(&self, sequence: Sequence) -> DisplayId {
        DisplayId::compose(self, sequence)
    }

    /// The display id that follows `last` under this prefix.
    ///
    /// `last` is the greatest display id already assigned under this prefix, or
    /// `None` for a fresh prefix.
    pub fn next_display_id(&self, last: Option<&DisplayId>) -> AllocationResult<DisplayId> {
        if let Some(last) = last {
            if !last.has_prefix(self) {
                return Err(AllocationError::invalid_argument(format!(
                    "display id {last} does not belong to prefix {self}"
                )));
            }
        }
        Sequence::next_after(last.map(DisplayId::sequence))
            .map(|next| self.display_id(next))
            .ok_or_else(|| AllocationError::capacity_exhausted(self.as_str()))
    }
}

impl ValueObject for Prefix {}

impl core::fmt::Display for Prefix {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Prefix {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Prefix {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Prefix> for String {
    fn from(value: Prefix) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn computes_documented_example() {
        let prefix = Prefix::compute(RoleCode::Intern, date(2025, 12, 11));
        assert_eq!(prefix.as_str(), "25INT1211");
        assert_eq!(prefix.role(), RoleCode::Intern);
    }

    #[test]
    fn zero_pads_every_field() {
        assert_eq!(Prefix::compute(RoleCode::DeptAdmin, date(2007, 1, 5)).as_str(), "07ADM0105");
        assert_eq!(Prefix::compute(RoleCode::SuperAdmin, date(2100, 2, 28)).as_str(), "00SUP0228");
    }

    #[test]
    fn roles_never_share_a_prefix() {
        let d = date(2025, 12, 11);
        let a = Prefix::compute(RoleCode::Intern, d);
        let b = Prefix::compute(RoleCode::DeptAdmin, d);
        let c = Prefix::compute(RoleCode::SuperAdmin, d);
        assert!(a != b && b != c && a != c);
    }

    #[test]
    fn parse_accepts_computed_prefixes() {
        let prefix = Prefix::compute(RoleCode::SuperAdmin, date(2026, 10, 19));
        assert_eq!(Prefix::parse("26sup1019").unwrap(), prefix);
    }

    #[test]
    fn parse_rejects_malformed_prefixes() {
        assert!(Prefix::parse("25INT121").is_err());
        assert!(Prefix::parse("25XYZ1211").is_err());
        assert!(Prefix::parse("2AINT1211").is_err());
        assert!(Prefix::parse("25INT1311").is_err());
        assert!(Prefix::parse("25INT1200").is_err());
    }

    #[test]
    fn parse_rejects_days_missing_from_the_calendar() {
        assert!(Prefix::parse("25INT0231").is_err());
        assert!(Prefix::parse("25ADM0431").is_err());
        assert!(Prefix::parse("25SUP0229").is_err());
        assert!(Prefix::parse("24SUP0229").is_ok());
        assert!(Prefix::parse("00INT0229").is_ok());
    }

    #[test]
    fn next_display_id_starts_at_001_and_continues() {
        let prefix = Prefix::compute(RoleCode::Intern, date(2025, 12, 11));
        let first = prefix.next_display_id(None).unwrap();
        assert_eq!(first.as_str(), "25INT1211001");
        let second = prefix.next_display_id(Some(&first)).unwrap();
        assert_eq!(second.as_str(), "25INT1211002");
    }

    #[test]
    fn next_display_id_guards_capacity() {
        let prefix = Prefix::compute(RoleCode::Intern, date(2025, 12, 11));
        let last = prefix.display_id(Sequence::MAX);
        let err = prefix.next_display_id(Some(&last)).unwrap_err();
        assert_eq!(err, AllocationError::capacity_exhausted("25INT1211"));
    }

    #[test]
    fn next_display_id_rejects_foreign_ids() {
        let prefix = Prefix::compute(RoleCode::Intern, date(2025, 12, 11));
        let other = Prefix::compute(RoleCode::Intern, date(2025, 12, 12)).display_id(Sequence::FIRST);
        assert!(matches!(
            prefix.next_display_id(Some(&other)),
            Err(AllocationError::InvalidArgument(_))
        ));
    }
}
