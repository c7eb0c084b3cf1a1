//! Identity records and the account data that travels with them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use internhub_core::{DomainError, DomainResult, InternalId};

use crate::display_id::DisplayId;
use crate::prefix::Prefix;
use crate::role::RoleCode;

/// Department assigned when the caller does not name one.
pub const DEFAULT_DEPARTMENT: &str = "General";

// ─────────────────────────────────────────────────────────────────────────────
// Identity Record
// ─────────────────────────────────────────────────────────────────────────────

/// One account's identity.
///
/// # Invariants
/// - `internal_id`, `display_id`, `role` and `creation_date` never change after
///   the record is built.
/// - `display_id` starts with the prefix computed from `role` and `creation_date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IdentityRecordRepr")]
pub struct IdentityRecord {
    internal_id: InternalId,
    display_id: DisplayId,
    role: RoleCode,
    creation_date: NaiveDate,
    /// `None` for identities created without account details.
    profile: Option<AccountProfile>,
}

impl IdentityRecord {
    /// Fails when `display_id` was not allocated under `creation_date`.
    pub fn new(
        internal_id: InternalId,
        display_id: DisplayId,
        creation_date: NaiveDate,
        profile: Option<AccountProfile>,
    ) -> DomainResult<Self> {
        let role = display_id.role();
        let expected = Prefix::compute(role, creation_date);
        if !display_id.has_prefix(&expected) {
            return Err(DomainError::invalid_id(format!(
                "display id {display_id} was not allocated on {creation_date} (expected prefix {expected})"
            )));
        }

        Ok(Self {
            internal_id,
            display_id,
            role,
            creation_date,
            profile,
        })
    }

    pub fn internal_id(&self) -> InternalId {
        self.internal_id
    }

    pub fn display_id(&self) -> &DisplayId {
        &self.display_id
    }

    pub fn into_display_id(self) -> DisplayId {
        self.display_id
    }

    pub fn role(&self) -> RoleCode {
        self.role
    }

    pub fn creation_date(&self) -> NaiveDate {
        self.creation_date
    }

    pub fn profile(&self) -> Option<&AccountProfile> {
        self.profile.as_ref()
    }

    pub fn email(&self) -> Option<&str> {
        self.profile.as_ref().map(|p| p.email.as_str())
    }
}

/// Wire shape of [`IdentityRecord`], checked on the way in.
#[derive(Deserialize)]
struct IdentityRecordRepr {
    internal_id: InternalId,
    display_id: DisplayId,
    role: RoleCode,
    creation_date: NaiveDate,
    profile: Option<AccountProfile>,
}

impl TryFrom<IdentityRecordRepr> for IdentityRecord {
    type Error = DomainError;

    fn try_from(repr: IdentityRecordRepr) -> Result<Self, Self::Error> {
        if repr.role != repr.display_id.role() {
            return Err(DomainError::invalid_id(format!(
                "role {} does not match display id {}",
                repr.role, repr.display_id
            )));
        }
        Self::new(repr.internal_id, repr.display_id, repr.creation_date, repr.profile)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Account Profile
// ─────────────────────────────────────────────────────────────────────────────

/// Validated account details stored next to the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub department: String,
    /// Set until the account holder first signs in. Credentials live with the
    /// authentication service, not here.
    pub is_first_login: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// New Account
// ─────────────────────────────────────────────────────────────────────────────

/// Request to open an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: RoleCode,
    pub department: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl NewAccount {
    /// A super admin account. The role is forced to `SUP` regardless of
    /// anything else the caller supplies.
    pub fn superuser(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            role: RoleCode::SuperAdmin,
            department: None,
            occurred_at,
        }
    }

    /// Calendar day the identity is allocated under (UTC).
    pub fn creation_date(&self) -> NaiveDate {
        self.occurred_at.date_naive()
    }

    /// Validate and normalize into the profile that gets persisted.
    pub fn validate(&self) -> DomainResult<AccountProfile> {
        let email = self.email.trim().to_lowercase();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(DomainError::validation("invalid email format")),
        }

        let first_name = self.first_name.trim();
        if first_name.is_empty() {
            return Err(DomainError::validation("first name cannot be empty"));
        }

        let department = self
            .department
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DEPARTMENT);

        Ok(AccountProfile {
            email,
            first_name: first_name.to_string(),
            last_name: self.last_name.trim().to_string(),
            department: department.to_string(),
            is_first_login: true,
            is_active: true,
            created_at: self.occurred_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::Sequence;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 11, 9, 30, 0).unwrap()
    }

    fn intern(email: &str) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            first_name: " Test ".to_string(),
            last_name: "Intern".to_string(),
            role: RoleCode::Intern,
            department: None,
            occurred_at: at(),
        }
    }

    #[test]
    fn validate_normalizes_email_and_defaults_department() {
        let profile = intern("  Intern.Test@SMG.com ").validate().unwrap();
        assert_eq!(profile.email, "intern.test@smg.com");
        assert_eq!(profile.first_name, "Test");
        assert_eq!(profile.department, DEFAULT_DEPARTMENT);
        assert!(profile.is_first_login);
        assert!(profile.is_active);
    }

    #[test]
    fn validate_keeps_named_department() {
        let mut cmd = intern("a@b.io");
        cmd.department = Some(" Engineering ".to_string());
        assert_eq!(cmd.validate().unwrap().department, "Engineering");
    }

    #[test]
    fn validate_rejects_bad_email() {
        for email in ["", "   ", "no-at-sign", "@smg.com", "intern@"] {
            let err = intern(email).validate().unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "accepted {email:?}");
        }
    }

    #[test]
    fn validate_rejects_blank_first_name() {
        let mut cmd = intern("a@b.io");
        cmd.first_name = "  ".to_string();
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn superuser_forces_sup_role() {
        let cmd = NewAccount::superuser("root@smg.com", "Root", "", at());
        assert_eq!(cmd.role, RoleCode::SuperAdmin);
        assert_eq!(cmd.creation_date(), NaiveDate::from_ymd_opt(2025, 12, 11).unwrap());
    }

    #[test]
    fn record_takes_role_from_display_id() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 11).unwrap();
        let display_id = Prefix::compute(RoleCode::DeptAdmin, date).display_id(Sequence::FIRST);
        let record = IdentityRecord::new(InternalId::new(), display_id, date, None).unwrap();
        assert_eq!(record.role(), RoleCode::DeptAdmin);
        assert_eq!(record.creation_date(), date);
        assert_eq!(record.email(), None);
    }

    #[test]
    fn record_rejects_display_id_from_another_day() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 11).unwrap();
        let display_id = DisplayId::parse("25INT1212001").unwrap();
        let err = IdentityRecord::new(InternalId::new(), display_id, date, None).unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(_)));

        let display_id = DisplayId::parse("25INT1211001").unwrap();
        let later = NaiveDate::from_ymd_opt(2026, 12, 11).unwrap();
        assert!(IdentityRecord::new(InternalId::new(), display_id, later, None).is_err());
    }

    #[test]
    fn deserialize_checks_record_invariants() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 11).unwrap();
        let display_id = Prefix::compute(RoleCode::Intern, date).display_id(Sequence::FIRST);
        let record = IdentityRecord::new(InternalId::new(), display_id, date, None).unwrap();
        let json = serde_json::to_value(&record).unwrap();

        let back: IdentityRecord = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, record);

        let mut wrong_day = json.clone();
        wrong_day["creation_date"] = serde_json::json!("2025-12-12");
        assert!(serde_json::from_value::<IdentityRecord>(wrong_day).is_err());

        let mut wrong_role = json;
        wrong_role["role"] = serde_json::json!("SUP");
        assert!(serde_json::from_value::<IdentityRecord>(wrong_role).is_err());
    }
}
