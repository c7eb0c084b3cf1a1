use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use internhub_core::InternalId;
use internhub_identity::{DisplayId, IdentityRecord, Prefix, Sequence};

use super::r#trait::{IdentityStore, IdentityStoreError};

#[derive(Debug, Default)]
struct Records {
    by_display_id: BTreeMap<DisplayId, IdentityRecord>,
    internal_ids: HashSet<InternalId>,
}

/// In-memory identity store.
///
/// Intended for tests/dev. Records are kept ordered by display id, so the
/// greatest id under a prefix is a single range lookup.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    records: RwLock<Records>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .map(|r| r.by_display_id.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> IdentityStoreError {
    IdentityStoreError::Storage("lock poisoned".to_string())
}

fn prefix_range(prefix: &Prefix) -> std::ops::RangeInclusive<DisplayId> {
    prefix.display_id(Sequence::MIN)..=prefix.display_id(Sequence::MAX)
}

impl IdentityStore for InMemoryIdentityStore {
    fn last_display_id(&self, prefix: &Prefix) -> Result<Option<DisplayId>, IdentityStoreError> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records
            .by_display_id
            .range(prefix_range(prefix))
            .next_back()
            .map(|(id, _)| id.clone()))
    }

    fn insert(&self, record: IdentityRecord) -> Result<(), IdentityStoreError> {
        let mut records = self.records.write().map_err(|_| poisoned())?;

        if records.by_display_id.contains_key(record.display_id()) {
            return Err(IdentityStoreError::DisplayIdTaken(record.into_display_id()));
        }
        if records.internal_ids.contains(&record.internal_id()) {
            return Err(IdentityStoreError::Duplicate(format!(
                "internal id {} already exists",
                record.internal_id()
            )));
        }

        records.internal_ids.insert(record.internal_id());
        records.by_display_id.insert(record.display_id().clone(), record);
        Ok(())
    }

    fn get(&self, display_id: &DisplayId) -> Result<Option<IdentityRecord>, IdentityStoreError> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.by_display_id.get(display_id).cloned())
    }

    fn list_by_prefix(&self, prefix: &Prefix) -> Result<Vec<IdentityRecord>, IdentityStoreError> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records
            .by_display_id
            .range(prefix_range(prefix))
            .map(|(_, record)| record.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use internhub_identity::RoleCode;
    use proptest::prelude::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 11).unwrap()
    }

    fn record(prefix: &Prefix, seq: u16) -> IdentityRecord {
        record_with_id(InternalId::new(), prefix, seq)
    }

    fn record_with_id(internal_id: InternalId, prefix: &Prefix, seq: u16) -> IdentityRecord {
        let display_id = prefix.display_id(Sequence::from_value(seq).unwrap());
        IdentityRecord::new(internal_id, display_id, date(), None).unwrap()
    }

    #[test]
    fn last_display_id_is_scoped_to_prefix() {
        let store = InMemoryIdentityStore::new();
        let interns = Prefix::compute(RoleCode::Intern, date());
        let admins = Prefix::compute(RoleCode::DeptAdmin, date());
        let next_day = Prefix::compute(RoleCode::Intern, date().succ_opt().unwrap());

        assert_eq!(store.last_display_id(&interns).unwrap(), None);

        store.insert(record(&interns, 1)).unwrap();
        store.insert(record(&interns, 37)).unwrap();
        store.insert(record(&admins, 500)).unwrap();
        store.insert(record(&next_day, 900)).unwrap();

        let last = store.last_display_id(&interns).unwrap().unwrap();
        assert_eq!(last.as_str(), "25INT1211011");
        assert_eq!(store.list_by_prefix(&interns).unwrap().len(), 2);
    }

    #[test]
    fn insert_rejects_taken_display_id() {
        let store = InMemoryIdentityStore::new();
        let prefix = Prefix::compute(RoleCode::Intern, date());
        store.insert(record(&prefix, 1)).unwrap();

        let err = store.insert(record(&prefix, 1)).unwrap_err();
        assert!(matches!(err, IdentityStoreError::DisplayIdTaken(id) if id.as_str() == "25INT1211001"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn insert_rejects_reused_internal_id() {
        let store = InMemoryIdentityStore::new();
        let prefix = Prefix::compute(RoleCode::Intern, date());
        let first = record(&prefix, 1);
        let second = record_with_id(first.internal_id(), &prefix, 2);

        store.insert(first).unwrap();
        assert!(matches!(store.insert(second), Err(IdentityStoreError::Duplicate(_))));
    }

    #[test]
    fn get_finds_inserted_record() {
        let store = InMemoryIdentityStore::new();
        let prefix = Prefix::compute(RoleCode::SuperAdmin, date());
        let rec = record(&prefix, 1);
        store.insert(rec.clone()).unwrap();

        assert_eq!(store.get(rec.display_id()).unwrap(), Some(rec));
        let missing = prefix.display_id(Sequence::from_value(2).unwrap());
        assert_eq!(store.get(&missing).unwrap(), None);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: the last display id under a prefix carries the greatest
        /// inserted sequence, whatever the insertion order and neighbours.
        #[test]
        fn last_display_id_is_max_sequence(
            seqs in prop::collection::hash_set(0u16..=Sequence::MAX_VALUE, 1..40),
            noise in prop::collection::hash_set(0u16..=Sequence::MAX_VALUE, 0..20),
        ) {
            let store = InMemoryIdentityStore::new();
            let interns = Prefix::compute(RoleCode::Intern, date());
            let admins = Prefix::compute(RoleCode::DeptAdmin, date());

            for &seq in &seqs {
                store.insert(record(&interns, seq)).unwrap();
            }
            for &seq in &noise {
                store.insert(record(&admins, seq)).unwrap();
            }

            let last = store.last_display_id(&interns).unwrap().unwrap();
            prop_assert_eq!(Some(last.sequence().value()), seqs.iter().copied().max());
            prop_assert_eq!(store.list_by_prefix(&interns).unwrap().len(), seqs.len());
        }
    }
}
