//! In-memory credential store.
//!
//! Implements the four-primitive interface against a process-local map with
//! enough platform behavior to exercise the paths that matter: duplicate
//! rejection on `add`, challenge simulation for protected reads, and
//! invalidation of protected entries when the enrolled biometric set
//! changes. Backs the test suite and the CLI's demo mode on platforms
//! without a real store.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;
use zeroize::Zeroizing;

use crate::biometric::AccessControl;
use crate::credential::{
    CredentialStore, EntryAttributes, EntryChanges, EntryKind, EntryQuery, EntryStatus,
};

#[derive(Clone, PartialEq, Eq, Hash)]
struct EntryKey {
    kind: EntryKind,
    service: String,
    account: String,
}

impl EntryKey {
    fn from_query(query: &EntryQuery) -> Self {
        Self {
            kind: query.kind,
            service: query.service.clone(),
            account: query.account.clone(),
        }
    }
}

struct StoredEntry {
    value: Zeroizing<Vec<u8>>,
    #[allow(dead_code)]
    label: String,
    #[allow(dead_code)]
    access_group: Option<String>,
    protection: Option<AccessControl>,
    /// Enrollment generation the entry was written under. Protected entries
    /// from an older generation read as gone, the way the platform
    /// invalidates biometry-bound items.
    generation: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<EntryKey, StoredEntry>,
    generation: u64,
    deny_challenges: bool,
    fail_add_for: Option<(String, EntryStatus)>,
}

/// Process-local credential store.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Inner>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent simulated challenges fail, as if the user cancelled
    /// or presented an unrecognized biometric.
    pub fn set_challenge_denied(&self, denied: bool) {
        self.inner.lock().deny_challenges = denied;
    }

    /// Simulate a change to the enrolled biometric set. Entries written
    /// under an access-control policy before this call read as absent
    /// afterwards.
    pub fn invalidate_enrollment(&self) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        debug!(generation = inner.generation, "enrollment invalidated");
    }

    /// Make the next `add` targeting `service` fail with `status`.
    pub fn fail_next_add_for(&self, service: &str, status: EntryStatus) {
        self.inner.lock().fail_add_for = Some((service.to_string(), status));
    }

    /// Number of live entries, invalidated ones included.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_invalidated(entry: &StoredEntry, current_generation: u64) -> bool {
        entry.protection.is_some() && entry.generation != current_generation
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn add(&self, attributes: EntryAttributes) -> EntryStatus {
        let mut inner = self.inner.lock();

        if let Some((service, status)) = inner.fail_add_for.take() {
            if service == attributes.service {
                return status;
            }
            inner.fail_add_for = Some((service, status));
        }

        let key = EntryKey {
            kind: attributes.kind,
            service: attributes.service,
            account: attributes.account,
        };
        // Invalidated leftovers still occupy the slot; only delete clears it.
        if inner.entries.contains_key(&key) {
            return EntryStatus::DuplicateItem;
        }

        let generation = inner.generation;
        inner.entries.insert(
            key,
            StoredEntry {
                value: attributes.value,
                label: attributes.label,
                access_group: attributes.access_group,
                protection: attributes.access_control,
                generation,
            },
        );
        EntryStatus::Success
    }

    fn update(&self, query: &EntryQuery, changes: EntryChanges) -> EntryStatus {
        let mut inner = self.inner.lock();
        let current_generation = inner.generation;
        let deny = inner.deny_challenges;

        let Some(entry) = inner.entries.get_mut(&EntryKey::from_query(query)) else {
            return EntryStatus::ItemNotFound;
        };
        if Self::is_invalidated(entry, current_generation) {
            return EntryStatus::ItemNotFound;
        }
        if entry.protection.is_some() {
            if query.suppress_auth_ui {
                return EntryStatus::AuthFailed;
            }
            if deny {
                return EntryStatus::AuthFailed;
            }
        }

        entry.value = changes.value;
        EntryStatus::Success
    }

    fn delete(&self, query: &EntryQuery) -> EntryStatus {
        let mut inner = self.inner.lock();
        // Invalidated entries are still deletable; that is what lets an
        // overwrite recover from an enrollment change.
        match inner.entries.remove(&EntryKey::from_query(query)) {
            Some(_) => EntryStatus::Success,
            None => EntryStatus::ItemNotFound,
        }
    }

    fn copy_matching(&self, query: &EntryQuery) -> (EntryStatus, Option<Vec<u8>>) {
        let inner = self.inner.lock();

        let Some(entry) = inner.entries.get(&EntryKey::from_query(query)) else {
            return (EntryStatus::ItemNotFound, None);
        };
        if Self::is_invalidated(entry, inner.generation) {
            return (EntryStatus::ItemNotFound, None);
        }

        if !query.return_data {
            // Attribute-only existence check: no value released, no
            // challenge presented.
            return (EntryStatus::Success, None);
        }

        if entry.protection.is_some() {
            if query.suppress_auth_ui {
                // The value exists but releasing it would need a challenge.
                return (EntryStatus::AuthFailed, None);
            }
            if inner.deny_challenges {
                return (EntryStatus::AuthFailed, None);
            }
        }

        (EntryStatus::Success, Some(entry.value.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biometric::{AccessControl, Accessibility};

    fn attributes(service: &str, account: &str, value: &[u8]) -> EntryAttributes {
        EntryAttributes {
            kind: EntryKind::Generic,
            service: service.into(),
            account: account.into(),
            label: "Test".into(),
            access_group: None,
            value: Zeroizing::new(value.to_vec()),
            access_control: None,
            suppress_auth_ui: false,
        }
    }

    fn protected(service: &str, account: &str, value: &[u8]) -> EntryAttributes {
        EntryAttributes {
            access_control: Some(AccessControl::new(Accessibility::WhenPasscodeSet, true)),
            ..attributes(service, account, value)
        }
    }

    fn query(service: &str, account: &str, return_data: bool, suppress: bool) -> EntryQuery {
        EntryQuery {
            kind: EntryKind::Generic,
            service: service.into(),
            account: account.into(),
            return_data,
            suppress_auth_ui: suppress,
        }
    }

    #[test]
    fn add_then_copy_returns_value() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.add(attributes("svc", "k", b"v")), EntryStatus::Success);

        let (status, value) = store.copy_matching(&query("svc", "k", true, false));
        assert_eq!(status, EntryStatus::Success);
        assert_eq!(value.as_deref(), Some(b"v".as_ref()));
    }

    #[test]
    fn second_add_is_duplicate() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.add(attributes("svc", "k", b"a")), EntryStatus::Success);
        assert_eq!(
            store.add(attributes("svc", "k", b"b")),
            EntryStatus::DuplicateItem
        );
    }

    #[test]
    fn delete_missing_is_not_found() {
        let store = MemoryCredentialStore::new();
        assert_eq!(
            store.delete(&query("svc", "k", false, true)),
            EntryStatus::ItemNotFound
        );
    }

    #[test]
    fn suppressed_read_of_protected_value_fails_auth() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.add(protected("svc", "k", b"v")), EntryStatus::Success);

        let (status, value) = store.copy_matching(&query("svc", "k", true, true));
        assert_eq!(status, EntryStatus::AuthFailed);
        assert!(value.is_none());

        // Attribute-only check still succeeds without a challenge.
        let (status, _) = store.copy_matching(&query("svc", "k", false, true));
        assert_eq!(status, EntryStatus::Success);
    }

    #[test]
    fn denied_challenge_blocks_protected_read() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.add(protected("svc", "k", b"v")), EntryStatus::Success);

        store.set_challenge_denied(true);
        let (status, _) = store.copy_matching(&query("svc", "k", true, false));
        assert_eq!(status, EntryStatus::AuthFailed);

        store.set_challenge_denied(false);
        let (status, value) = store.copy_matching(&query("svc", "k", true, false));
        assert_eq!(status, EntryStatus::Success);
        assert_eq!(value.as_deref(), Some(b"v".as_ref()));
    }

    #[test]
    fn enrollment_change_invalidates_protected_entries_only() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.add(protected("svc", "p", b"v")), EntryStatus::Success);
        assert_eq!(store.add(attributes("svc", "u", b"v")), EntryStatus::Success);

        store.invalidate_enrollment();

        let (status, _) = store.copy_matching(&query("svc", "p", false, true));
        assert_eq!(status, EntryStatus::ItemNotFound);

        let (status, _) = store.copy_matching(&query("svc", "u", true, false));
        assert_eq!(status, EntryStatus::Success);
    }

    #[test]
    fn invalidated_entry_still_occupies_its_slot() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.add(protected("svc", "k", b"v")), EntryStatus::Success);
        store.invalidate_enrollment();

        // Reads say gone, but a blind add still collides.
        assert_eq!(
            store.add(protected("svc", "k", b"w")),
            EntryStatus::DuplicateItem
        );

        // Delete clears the slot and the add goes through.
        assert_eq!(store.delete(&query("svc", "k", false, true)), EntryStatus::Success);
        assert_eq!(store.add(protected("svc", "k", b"w")), EntryStatus::Success);
    }

    #[test]
    fn update_changes_value_and_keeps_protection() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.add(protected("svc", "k", b"old")), EntryStatus::Success);

        let status = store.update(
            &query("svc", "k", false, false),
            EntryChanges {
                value: Zeroizing::new(b"new".to_vec()),
            },
        );
        assert_eq!(status, EntryStatus::Success);

        // Still protected: suppressed value read keeps failing auth.
        let (status, _) = store.copy_matching(&query("svc", "k", true, true));
        assert_eq!(status, EntryStatus::AuthFailed);

        let (status, value) = store.copy_matching(&query("svc", "k", true, false));
        assert_eq!(status, EntryStatus::Success);
        assert_eq!(value.as_deref(), Some(b"new".as_ref()));
    }

    #[test]
    fn update_missing_is_not_found() {
        let store = MemoryCredentialStore::new();
        let status = store.update(
            &query("svc", "k", false, false),
            EntryChanges {
                value: Zeroizing::new(b"v".to_vec()),
            },
        );
        assert_eq!(status, EntryStatus::ItemNotFound);
    }

    #[test]
    fn targeted_add_failure_fires_once() {
        let store = MemoryCredentialStore::new();
        store.fail_next_add_for("svc_validation", EntryStatus::Other(-34018));

        // Unrelated service is untouched.
        assert_eq!(store.add(attributes("svc", "k", b"v")), EntryStatus::Success);

        assert_eq!(
            store.add(attributes("svc_validation", "marker", b"m")),
            EntryStatus::Other(-34018)
        );
        assert_eq!(
            store.add(attributes("svc_validation", "marker", b"m")),
            EntryStatus::Success
        );
    }
}
