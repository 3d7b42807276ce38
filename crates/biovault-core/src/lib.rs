//! # biovault-core
//!
//! Biometric-gated secure storage of small opaque values keyed by
//! application-chosen names.
//!
//! Two pieces, consumed leaf-first:
//!
//! - **[`SecureEntryStore`]**: one value per key within a service namespace,
//!   over an injected platform credential store; handles overwrite-safe
//!   writes and the validation marker that detects enrollment changes.
//! - **[`BiometricGate`]**: async facade that resolves biometric
//!   availability fresh on every call and serializes all store operations
//!   on a dedicated background queue.
//!
//! The platform credential store and biometric subsystem are capabilities
//! ([`CredentialStore`], [`BiometricSubsystem`]); [`MemoryCredentialStore`]
//! and [`FixedBiometrics`] serve tests and platforms without real backends,
//! and [`platform`] wires up what the current OS offers.

pub mod biometric;
pub mod credential;
pub mod error;
pub mod gate;
pub mod memory;
pub mod platform;
pub mod store;

pub use biometric::{
    AccessControl, AccessControlError, Accessibility, AvailabilityState, BiometricSubsystem,
    DenialReason, FixedBiometrics,
};
pub use credential::{CredentialStore, EntryStatus};
pub use error::{Result, StoreError};
pub use gate::{BiometricGate, GateConfig};
pub use memory::MemoryCredentialStore;
pub use store::{SecureEntryStore, StoreConfig};
