//! Error taxonomy for store operations.
//!
//! Platform failures are wrapped exactly once, at the store boundary, and
//! propagate unchanged through the gate facade. Absence is not a failure:
//! lookups and deletes map item-not-found to a result, so the only
//! operation that surfaces [`StoreError::NotFound`] is the in-place update.

use thiserror::Error;

use crate::credential::EntryStatus;

/// Convenience result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by store and gate operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No entry exists where one was required. Produced only by in-place
    /// updates; lookups report absence as `Ok(None)`.
    #[error("entry not found (status {code})")]
    NotFound { code: i32 },

    /// An entry already exists for this key.
    #[error("duplicate entry (status {code})")]
    DuplicateItem { code: i32 },

    /// The platform challenge failed, was cancelled, or was required while
    /// authentication UI was suppressed.
    #[error("authentication failed (status {code})")]
    AuthenticationFailed { code: i32 },

    /// The store rejected the supplied attributes or query.
    #[error("invalid attributes or query (status {code})")]
    InvalidParameters { code: i32 },

    /// The access-control object could not be built; protected operations
    /// on this store instance cannot proceed.
    #[error("access control construction failed: {reason}")]
    AccessControlCreation { reason: String },

    /// Any platform status the taxonomy does not name.
    #[error("credential store failure (status {code})")]
    Unknown { code: i32 },

    /// The gate's worker is gone; the operation was never executed.
    #[error("store worker has shut down")]
    Disconnected,
}

impl StoreError {
    /// Wrap a platform status into the taxonomy.
    ///
    /// Callers only reach for this on non-success statuses; a stray
    /// `Success` falls into [`StoreError::Unknown`] rather than panicking.
    pub(crate) fn from_status(status: EntryStatus) -> Self {
        let code = status.code();
        match status {
            EntryStatus::ItemNotFound => StoreError::NotFound { code },
            EntryStatus::DuplicateItem => StoreError::DuplicateItem { code },
            EntryStatus::AuthFailed => StoreError::AuthenticationFailed { code },
            EntryStatus::BadParameter => StoreError::InvalidParameters { code },
            EntryStatus::Success | EntryStatus::Other(_) => StoreError::Unknown { code },
        }
    }

    /// The originating platform status code, when one exists.
    pub fn status_code(&self) -> Option<i32> {
        match self {
            StoreError::NotFound { code }
            | StoreError::DuplicateItem { code }
            | StoreError::AuthenticationFailed { code }
            | StoreError::InvalidParameters { code }
            | StoreError::Unknown { code } => Some(*code),
            StoreError::AccessControlCreation { .. } | StoreError::Disconnected => None,
        }
    }
}
