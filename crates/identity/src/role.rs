//! Account roles and the 3-letter codes they contribute to display ids.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use internhub_core::DomainError;

/// Account role, embedded literally in every display id.
///
/// The set is closed: the allocator relies on each code being exactly three
/// upper-case ASCII letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum RoleCode {
    #[default]
    #[serde(rename = "INT")]
    Intern,
    #[serde(rename = "ADM")]
    DeptAdmin,
    #[serde(rename = "SUP")]
    SuperAdmin,
}

impl RoleCode {
    pub const ALL: [RoleCode; 3] = [RoleCode::Intern, RoleCode::DeptAdmin, RoleCode::SuperAdmin];

    /// The 3-character code used in display ids and storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            RoleCode::Intern => "INT",
            RoleCode::DeptAdmin => "ADM",
            RoleCode::SuperAdmin => "SUP",
        }
    }

    /// Human-readable label.
    pub const fn label(self) -> &'static str {
        match self {
            RoleCode::Intern => "Intern",
            RoleCode::DeptAdmin => "Dept Admin",
            RoleCode::SuperAdmin => "Super Admin",
        }
    }
}

impl core::fmt::Display for RoleCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        RoleCode::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(code))
            .ok_or_else(|| DomainError::validation(format!("unknown role code '{code}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_three_upper_case_letters() {
        for role in RoleCode::ALL {
            let code = role.as_str();
            assert_eq!(code.len(), 3);
            assert!(code.bytes().all(|b| b.is_ascii_uppercase()));
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("int".parse::<RoleCode>().unwrap(), RoleCode::Intern);
        assert_eq!(" Adm ".parse::<RoleCode>().unwrap(), RoleCode::DeptAdmin);
        assert_eq!("SUP".parse::<RoleCode>().unwrap(), RoleCode::SuperAdmin);
    }

    #[test]
    fn parse_rejects_unknown_codes() {
        let err = "HR".parse::<RoleCode>().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn serializes_as_code() {
        let json = serde_json::to_string(&RoleCode::DeptAdmin).unwrap();
        assert_eq!(json, "\"ADM\"");
        let back: RoleCode = serde_json::from_str("\"SUP\"").unwrap();
        assert_eq!(back, RoleCode::SuperAdmin);
    }
}
