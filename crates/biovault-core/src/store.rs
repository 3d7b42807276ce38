//! Secure entry store: one value per key within a service namespace.
//!
//! Wraps the credential-store capability with overwrite-safe writes and the
//! validation-marker bookkeeping that detects enrollment changes behind
//! biometric-protected entries.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::biometric::{AccessControl, Accessibility, BiometricSubsystem};
use crate::credential::{
    CredentialStore, EntryAttributes, EntryChanges, EntryKind, EntryQuery, EntryStatus,
};
use crate::error::{Result, StoreError};

/// Suffix deriving the marker service from the entry service.
const MARKER_SERVICE_SUFFIX: &str = "_validation";

/// Account the per-service validation marker is filed under.
const MARKER_ACCOUNT: &str = "biometric_validation";

/// Fixed marker payload.
const MARKER_VALUE: &[u8] = b"validated";

/// Immutable configuration of one store instance.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Namespace scoping which entries belong to this store.
    pub service: String,
    /// Human-readable label attached to entries.
    pub label: String,
    /// Optional group for cross-application sharing.
    pub access_group: Option<String>,
    /// Protect entries behind the device's presence challenge.
    pub biometric_gate: bool,
}

/// Durable, access-controlled storage of one value per key.
pub struct SecureEntryStore {
    credentials: Arc<dyn CredentialStore>,
    biometrics: Arc<dyn BiometricSubsystem>,
    config: StoreConfig,
    /// Built lazily once per instance and reused for every protected write.
    access_control: OnceCell<AccessControl>,
}

impl SecureEntryStore {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        biometrics: Arc<dyn BiometricSubsystem>,
        config: StoreConfig,
    ) -> Self {
        Self {
            credentials,
            biometrics,
            config,
            access_control: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Look up the value stored for `key`.
    ///
    /// Reading a gated entry makes the platform run its challenge as a side
    /// effect; this call blocks until the challenge resolves. Absence is a
    /// result, never an error.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let query = self.entry_query(key, true, false);
        match self.credentials.copy_matching(&query) {
            (EntryStatus::Success, Some(value)) => Ok(Some(value)),
            (EntryStatus::ItemNotFound, _) => Ok(None),
            // Success without data would be a store bug; surface it rather
            // than inventing an empty value.
            (EntryStatus::Success, None) => Err(StoreError::Unknown { code: 0 }),
            (status, _) => Err(StoreError::from_status(status)),
        }
    }

    /// Store `value` under `key`, replacing any existing entry.
    ///
    /// The add primitive fails on duplicates and cannot atomically swap
    /// access-control attributes, so any existing entry is deleted first.
    /// When the gate is enabled and the add succeeds, the service's
    /// validation marker is (re)written; a marker-write failure is reported
    /// as the operation's error even though the value itself persisted, and
    /// a repeated `set` repairs that state.
    pub fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        match self.credentials.delete(&self.entry_query(key, false, true)) {
            EntryStatus::Success | EntryStatus::ItemNotFound => {}
            status => return Err(StoreError::from_status(status)),
        }

        let attributes = EntryAttributes {
            kind: EntryKind::Generic,
            service: self.config.service.clone(),
            account: key.to_string(),
            label: self.config.label.clone(),
            access_group: self.config.access_group.clone(),
            value: Zeroizing::new(value.to_vec()),
            access_control: self.protection()?,
            suppress_auth_ui: false,
        };
        match self.credentials.add(attributes) {
            EntryStatus::Success => {}
            status => return Err(StoreError::from_status(status)),
        }
        debug!(
            service = %self.config.service,
            key,
            gated = self.config.biometric_gate,
            "stored entry"
        );

        if self.config.biometric_gate {
            self.write_marker()?;
        }
        Ok(())
    }

    /// Change the value of an existing entry in place, preserving its
    /// access-control attributes. Fails with [`StoreError::NotFound`] when
    /// no entry exists.
    pub fn update(&self, key: &str, value: &[u8]) -> Result<()> {
        let query = self.entry_query(key, false, false);
        let changes = EntryChanges {
            value: Zeroizing::new(value.to_vec()),
        };
        match self.credentials.update(&query, changes) {
            EntryStatus::Success => {
                debug!(service = %self.config.service, key, "updated entry");
                Ok(())
            }
            status => Err(StoreError::from_status(status)),
        }
    }

    /// Delete the entry for `key`, then the service's validation marker.
    ///
    /// Not-found counts as success for both deletes: removing a value must
    /// also clear stale enrollment evidence, and doing so twice is harmless.
    pub fn remove(&self, key: &str) -> Result<()> {
        match self.credentials.delete(&self.entry_query(key, false, true)) {
            EntryStatus::Success | EntryStatus::ItemNotFound => {}
            status => return Err(StoreError::from_status(status)),
        }
        match self.credentials.delete(&self.marker_query()) {
            EntryStatus::Success | EntryStatus::ItemNotFound => {
                debug!(service = %self.config.service, key, "removed entry");
                Ok(())
            }
            status => Err(StoreError::from_status(status)),
        }
    }

    /// Whether this service's validation marker is currently present.
    ///
    /// Attribute-only, UI-suppressed query: never triggers a challenge.
    /// Absence means either "no protected write ever happened" or "the
    /// enrolled biometric set changed since the last one" -- the underlying
    /// store cannot tell the two apart, so neither can this call.
    pub fn has_validation_marker(&self) -> Result<bool> {
        match self.credentials.copy_matching(&self.marker_query()) {
            (EntryStatus::Success, _) => Ok(true),
            (EntryStatus::ItemNotFound, _) => Ok(false),
            // Exists but not retrievable without a challenge: not usable as
            // validation evidence.
            (EntryStatus::AuthFailed, _) => Ok(false),
            (status, _) => Err(StoreError::from_status(status)),
        }
    }

    /// Record that a protected write succeeded under the currently enrolled
    /// biometric set. The marker carries the same access-control policy as
    /// the values it vouches for, so an enrollment change invalidates it too.
    fn write_marker(&self) -> Result<()> {
        let delete_query = EntryQuery {
            kind: EntryKind::Generic,
            service: self.marker_service(),
            account: MARKER_ACCOUNT.to_string(),
            return_data: false,
            suppress_auth_ui: true,
        };
        match self.credentials.delete(&delete_query) {
            EntryStatus::Success | EntryStatus::ItemNotFound => {}
            status => return Err(StoreError::from_status(status)),
        }

        let attributes = EntryAttributes {
            kind: EntryKind::Generic,
            service: self.marker_service(),
            account: MARKER_ACCOUNT.to_string(),
            label: self.config.label.clone(),
            access_group: self.config.access_group.clone(),
            value: Zeroizing::new(MARKER_VALUE.to_vec()),
            access_control: self.protection()?,
            suppress_auth_ui: false,
        };
        match self.credentials.add(attributes) {
            EntryStatus::Success => Ok(()),
            status => {
                warn!(
                    service = %self.config.service,
                    code = status.code(),
                    "validation marker write failed"
                );
                Err(StoreError::from_status(status))
            }
        }
    }

    /// The access-control policy for this instance's protected entries, or
    /// `None` when the gate is disabled. Construction failure is fatal for
    /// every protected operation on this instance.
    fn protection(&self) -> Result<Option<AccessControl>> {
        if !self.config.biometric_gate {
            return Ok(None);
        }
        let access_control = self.access_control.get_or_try_init(|| {
            self.biometrics
                .access_control(Accessibility::WhenPasscodeSet, true)
                .map_err(|error| StoreError::AccessControlCreation {
                    reason: error.to_string(),
                })
        })?;
        Ok(Some(*access_control))
    }

    fn entry_query(&self, key: &str, return_data: bool, suppress_auth_ui: bool) -> EntryQuery {
        EntryQuery {
            kind: EntryKind::Generic,
            service: self.config.service.clone(),
            account: key.to_string(),
            return_data,
            suppress_auth_ui,
        }
    }

    fn marker_query(&self) -> EntryQuery {
        EntryQuery {
            kind: EntryKind::Generic,
            service: self.marker_service(),
            account: MARKER_ACCOUNT.to_string(),
            return_data: false,
            suppress_auth_ui: true,
        }
    }

    fn marker_service(&self) -> String {
        format!("{}{MARKER_SERVICE_SUFFIX}", self.config.service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biometric::FixedBiometrics;
    use crate::memory::MemoryCredentialStore;

    fn gated_store() -> (SecureEntryStore, Arc<MemoryCredentialStore>) {
        let credentials = Arc::new(MemoryCredentialStore::new());
        let store = SecureEntryStore::new(
            credentials.clone(),
            Arc::new(FixedBiometrics::configured()),
            StoreConfig {
                service: "vault".into(),
                label: "Vault".into(),
                access_group: None,
                biometric_gate: true,
            },
        );
        (store, credentials)
    }

    fn plain_store() -> SecureEntryStore {
        SecureEntryStore::new(
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(FixedBiometrics::unavailable()),
            StoreConfig {
                service: "vault".into(),
                label: "Vault".into(),
                access_group: None,
                biometric_gate: false,
            },
        )
    }

    #[test]
    fn set_then_get_round_trips() {
        let store = plain_store();
        store.set("token", b"abc123").unwrap();
        assert_eq!(store.get("token").unwrap().as_deref(), Some(b"abc123".as_ref()));
    }

    #[test]
    fn get_missing_is_absent_not_error() {
        let store = plain_store();
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn overwrite_never_reports_duplicate() {
        let store = plain_store();
        store.set("token", b"first").unwrap();
        store.set("token", b"second").unwrap();
        assert_eq!(store.get("token").unwrap().as_deref(), Some(b"second".as_ref()));
    }

    #[test]
    fn remove_is_idempotent() {
        let store = plain_store();
        store.set("token", b"v").unwrap();
        store.remove("token").unwrap();
        assert_eq!(store.get("token").unwrap(), None);
        // Second removal still reports success.
        store.remove("token").unwrap();
    }

    #[test]
    fn gated_set_round_trips_and_writes_marker() {
        let (store, _credentials) = gated_store();
        assert!(!store.has_validation_marker().unwrap());

        store.set("token", b"abc123").unwrap();
        assert_eq!(store.get("token").unwrap().as_deref(), Some(b"abc123".as_ref()));
        assert!(store.has_validation_marker().unwrap());
    }

    #[test]
    fn remove_clears_marker_for_any_key() {
        let (store, _credentials) = gated_store();
        store.set("token", b"v").unwrap();
        assert!(store.has_validation_marker().unwrap());

        // Removing a key that never existed still clears the marker.
        store.remove("other").unwrap();
        assert!(!store.has_validation_marker().unwrap());
    }

    #[test]
    fn enrollment_change_invalidates_marker_and_values() {
        let (store, credentials) = gated_store();
        store.set("token", b"v").unwrap();
        assert!(store.has_validation_marker().unwrap());

        credentials.invalidate_enrollment();

        // Both the marker and the protected value now read as absent; the
        // store cannot say whether the marker was never written or died
        // with the old enrollment.
        assert!(!store.has_validation_marker().unwrap());
        assert_eq!(store.get("token").unwrap(), None);

        // A fresh set recovers: delete-then-add clears the stale slot.
        store.set("token", b"w").unwrap();
        assert_eq!(store.get("token").unwrap().as_deref(), Some(b"w".as_ref()));
        assert!(store.has_validation_marker().unwrap());
    }

    #[test]
    fn denied_challenge_surfaces_auth_failure_with_code() {
        let (store, credentials) = gated_store();
        store.set("token", b"v").unwrap();

        credentials.set_challenge_denied(true);
        let error = store.get("token").unwrap_err();
        assert!(matches!(
            error,
            StoreError::AuthenticationFailed { code: -25293 }
        ));
        assert_eq!(error.status_code(), Some(-25293));
    }

    #[test]
    fn marker_write_failure_fails_set_but_value_persists() {
        let (store, credentials) = gated_store();
        credentials.fail_next_add_for("vault_validation", EntryStatus::Other(-34018));

        let error = store.set("token", b"v").unwrap_err();
        assert!(matches!(error, StoreError::Unknown { code: -34018 }));

        // Value persisted despite the reported failure; re-invoking set
        // repairs the marker.
        assert_eq!(store.get("token").unwrap().as_deref(), Some(b"v".as_ref()));
        assert!(!store.has_validation_marker().unwrap());

        store.set("token", b"v").unwrap();
        assert!(store.has_validation_marker().unwrap());
    }

    #[test]
    fn update_missing_entry_is_an_error() {
        let store = plain_store();
        let error = store.update("missing", b"v").unwrap_err();
        assert!(matches!(error, StoreError::NotFound { code: -25300 }));
    }

    #[test]
    fn update_changes_value_in_place() {
        let store = plain_store();
        store.set("token", b"old").unwrap();
        store.update("token", b"new").unwrap();
        assert_eq!(store.get("token").unwrap().as_deref(), Some(b"new".as_ref()));
    }

    #[test]
    fn access_control_failure_is_fatal_for_protected_writes() {
        let credentials = Arc::new(MemoryCredentialStore::new());
        let biometrics = Arc::new(FixedBiometrics::configured());
        biometrics.fail_access_control();

        let store = SecureEntryStore::new(
            credentials,
            biometrics,
            StoreConfig {
                service: "vault".into(),
                label: "Vault".into(),
                access_group: None,
                biometric_gate: true,
            },
        );

        let error = store.set("token", b"v").unwrap_err();
        assert!(matches!(error, StoreError::AccessControlCreation { .. }));
    }

    #[test]
    fn ungated_set_leaves_no_marker() {
        let store = plain_store();
        store.set("token", b"v").unwrap();
        assert!(!store.has_validation_marker().unwrap());
    }
}
