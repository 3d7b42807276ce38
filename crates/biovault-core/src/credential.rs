//! Platform credential-store capability.
//!
//! The platform's secure credential store is consumed through exactly four
//! primitives; everything above this boundary only composes them. The store
//! owns encryption, access-control enforcement, and cross-application
//! sharing -- none of that is reimplemented here.
//!
//! Physical entries are keyed by the triple `(kind, service, account)`.
//! Label and access group are attributes attached for display and sharing,
//! never part of the lookup key.

use std::fmt;

use zeroize::Zeroizing;

use crate::biometric::AccessControl;

/// Kind tag filed with every entry.
///
/// Keeps BioVault entries disjoint from anything else living in the same
/// credential store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// A generic stored value.
    Generic,
}

/// Raw outcome of a credential-store primitive.
///
/// Mirrors the platform status codes the core consumes; anything the
/// taxonomy does not name arrives as [`EntryStatus::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Success,
    ItemNotFound,
    DuplicateItem,
    AuthFailed,
    BadParameter,
    Other(i32),
}

impl EntryStatus {
    /// The raw platform status code, for diagnostics.
    pub fn code(self) -> i32 {
        match self {
            EntryStatus::Success => 0,
            EntryStatus::ItemNotFound => -25300,
            EntryStatus::DuplicateItem => -25299,
            EntryStatus::AuthFailed => -25293,
            EntryStatus::BadParameter => -50,
            EntryStatus::Other(code) => code,
        }
    }
}

/// Attributes of a new entry handed to [`CredentialStore::add`].
pub struct EntryAttributes {
    pub kind: EntryKind,
    pub service: String,
    pub account: String,
    /// Human-readable label, attached for display.
    pub label: String,
    /// Optional group for cross-application sharing.
    pub access_group: Option<String>,
    /// The stored value; zeroed when the attributes drop.
    pub value: Zeroizing<Vec<u8>>,
    /// Access-control policy the store must enforce on later reads.
    pub access_control: Option<AccessControl>,
    /// Suppress any authentication UI the store would otherwise present.
    pub suppress_auth_ui: bool,
}

impl fmt::Debug for EntryAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryAttributes")
            .field("kind", &self.kind)
            .field("service", &self.service)
            .field("account", &self.account)
            .field("label", &self.label)
            .field("access_group", &self.access_group)
            .field("value", &"[REDACTED]")
            .field("access_control", &self.access_control)
            .field("suppress_auth_ui", &self.suppress_auth_ui)
            .finish()
    }
}

/// Match query for lookup, update, and delete primitives.
#[derive(Debug, Clone)]
pub struct EntryQuery {
    pub kind: EntryKind,
    pub service: String,
    pub account: String,
    /// Request the stored value. Attribute-only queries (`false`) check
    /// existence without ever triggering an authentication challenge.
    pub return_data: bool,
    /// Suppress any authentication UI the store would otherwise present.
    pub suppress_auth_ui: bool,
}

/// Changes applied by [`CredentialStore::update`].
///
/// Only the value may change; every other attribute of the matched entry,
/// including its access-control policy, is preserved.
pub struct EntryChanges {
    pub value: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for EntryChanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryChanges")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// The four credential-store primitives.
///
/// Implementations are assumed correct: a returned [`EntryStatus::Success`]
/// means the operation durably happened. Reads of entries protected by an
/// access-control policy may block the calling thread until the platform's
/// challenge resolves, unless the query suppresses authentication UI.
pub trait CredentialStore: Send + Sync {
    /// Create a new entry. Fails with [`EntryStatus::DuplicateItem`] when an
    /// entry already exists for the `(kind, service, account)` triple.
    fn add(&self, attributes: EntryAttributes) -> EntryStatus;

    /// Change the value of an existing matched entry in place.
    fn update(&self, query: &EntryQuery, changes: EntryChanges) -> EntryStatus;

    /// Delete the matched entry.
    fn delete(&self, query: &EntryQuery) -> EntryStatus;

    /// Look up the matched entry, returning its value when `query.return_data`
    /// is set and the store releases it.
    fn copy_matching(&self, query: &EntryQuery) -> (EntryStatus, Option<Vec<u8>>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_stable() {
        assert_eq!(EntryStatus::Success.code(), 0);
        assert_eq!(EntryStatus::ItemNotFound.code(), -25300);
        assert_eq!(EntryStatus::DuplicateItem.code(), -25299);
        assert_eq!(EntryStatus::AuthFailed.code(), -25293);
        assert_eq!(EntryStatus::BadParameter.code(), -50);
        assert_eq!(EntryStatus::Other(-4).code(), -4);
    }

    #[test]
    fn attributes_debug_redacts_value() {
        let attributes = EntryAttributes {
            kind: EntryKind::Generic,
            service: "svc".into(),
            account: "token".into(),
            label: "Test".into(),
            access_group: None,
            value: Zeroizing::new(b"hunter2".to_vec()),
            access_control: None,
            suppress_auth_ui: false,
        };
        let rendered = format!("{attributes:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("hunter2"));
    }
}
