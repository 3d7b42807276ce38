//! Platform adapters.
//!
//! macOS gets a real credential-store backend (Keychain generic passwords)
//! and a Touch ID availability probe. Other platforms report no backend and
//! no biometric hardware; callers fall back to
//! [`MemoryCredentialStore`](crate::memory::MemoryCredentialStore) or their
//! own [`CredentialStore`] implementation.

use std::sync::Arc;

use crate::biometric::BiometricSubsystem;
use crate::credential::CredentialStore;

// ---------------------------------------------------------------------------
// macOS implementation
// ---------------------------------------------------------------------------

#[cfg(target_os = "macos")]
mod macos {
    use std::process::Command;

    use security_framework::passwords::{
        delete_generic_password, get_generic_password, set_generic_password,
    };
    use tracing::warn;

    use crate::biometric::{
        AccessControl, Accessibility, AccessControlError, BiometricSubsystem, DenialReason,
    };
    use crate::credential::{
        CredentialStore, EntryAttributes, EntryChanges, EntryQuery, EntryStatus,
    };

    /// Credential store backed by the macOS Keychain.
    ///
    /// The passwords API does not expose `SecAccessControl`, so
    /// access-control attributes are carried but not enforced by this
    /// adapter; entries protected elsewhere still prompt through the
    /// Keychain's own settings.
    pub struct KeychainCredentialStore;

    fn is_not_found(error: &security_framework::base::Error) -> bool {
        // errSecItemNotFound is the expected "nothing stored" case.
        let message = error.to_string();
        message.contains("not found") || message.contains("-25300")
    }

    fn status_of(error: &security_framework::base::Error) -> EntryStatus {
        if is_not_found(error) {
            EntryStatus::ItemNotFound
        } else {
            EntryStatus::Other(error.code())
        }
    }

    impl CredentialStore for KeychainCredentialStore {
        fn add(&self, attributes: EntryAttributes) -> EntryStatus {
            if attributes.access_control.is_some() {
                warn!(
                    service = %attributes.service,
                    "access-control attributes are not enforced by the passwords API"
                );
            }
            // The passwords API upserts, so duplicate detection is a
            // read-before-write here.
            match get_generic_password(&attributes.service, &attributes.account) {
                Ok(_) => EntryStatus::DuplicateItem,
                Err(error) if is_not_found(&error) => {
                    match set_generic_password(
                        &attributes.service,
                        &attributes.account,
                        &attributes.value,
                    ) {
                        Ok(()) => EntryStatus::Success,
                        Err(error) => status_of(&error),
                    }
                }
                Err(error) => EntryStatus::Other(error.code()),
            }
        }

        fn update(&self, query: &EntryQuery, changes: EntryChanges) -> EntryStatus {
            match get_generic_password(&query.service, &query.account) {
                Ok(_) => {
                    match set_generic_password(&query.service, &query.account, &changes.value) {
                        Ok(()) => EntryStatus::Success,
                        Err(error) => status_of(&error),
                    }
                }
                Err(error) => status_of(&error),
            }
        }

        fn delete(&self, query: &EntryQuery) -> EntryStatus {
            match delete_generic_password(&query.service, &query.account) {
                Ok(()) => EntryStatus::Success,
                Err(error) => status_of(&error),
            }
        }

        fn copy_matching(&self, query: &EntryQuery) -> (EntryStatus, Option<Vec<u8>>) {
            match get_generic_password(&query.service, &query.account) {
                Ok(data) => {
                    let value = query.return_data.then(|| data.to_vec());
                    (EntryStatus::Success, value)
                }
                Err(error) => (status_of(&error), None),
            }
        }
    }

    /// Touch ID availability probe.
    ///
    /// Queries `bioutil` for sensor availability; a missing binary reads as
    /// no biometric hardware.
    pub struct LocalBiometrics;

    impl BiometricSubsystem for LocalBiometrics {
        fn can_evaluate(&self) -> Result<(), DenialReason> {
            match Command::new("bioutil").args(["--availability"]).output() {
                Ok(output) if output.status.success() => Ok(()),
                Ok(output) => Err(DenialReason::Other(output.status.code().unwrap_or(-1))),
                Err(_) => Err(DenialReason::NoHardware),
            }
        }

        fn access_control(
            &self,
            accessibility: Accessibility,
            require_presence: bool,
        ) -> Result<AccessControl, AccessControlError> {
            Ok(AccessControl::new(accessibility, require_presence))
        }
    }
}

#[cfg(target_os = "macos")]
pub use macos::{KeychainCredentialStore, LocalBiometrics};

/// The platform credential-store backend, when this platform has one.
#[cfg(target_os = "macos")]
pub fn credential_store() -> Option<Arc<dyn CredentialStore>> {
    Some(Arc::new(macos::KeychainCredentialStore))
}

/// The best biometric subsystem this platform offers.
#[cfg(target_os = "macos")]
pub fn biometrics() -> Arc<dyn BiometricSubsystem> {
    Arc::new(macos::LocalBiometrics)
}

// ---------------------------------------------------------------------------
// Fallback for other platforms
// ---------------------------------------------------------------------------

/// The platform credential-store backend, when this platform has one.
#[cfg(not(target_os = "macos"))]
pub fn credential_store() -> Option<Arc<dyn CredentialStore>> {
    tracing::warn!("no platform credential store on this OS");
    None
}

/// The best biometric subsystem this platform offers.
#[cfg(not(target_os = "macos"))]
pub fn biometrics() -> Arc<dyn BiometricSubsystem> {
    Arc::new(crate::biometric::FixedBiometrics::unavailable())
}
