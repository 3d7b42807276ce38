//! Biometric-authentication subsystem capability and availability model.
//!
//! The subsystem is consumed through two primitives: a fresh
//! "can evaluate device-owner authentication via biometrics" query, and a
//! factory for the access-control objects protected entries are filed under.
//! Enrollment management and the challenge UI belong to the platform.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why the subsystem declined the availability query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// No biometric sensor on this device.
    NoHardware,
    /// No passcode/unlock is configured.
    PasscodeNotSet,
    /// Sensor present but no biometric credential enrolled.
    NotEnrolled,
    /// Any other platform-specific denial, by raw code.
    Other(i32),
}

/// Accessibility level an access-control object demands of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessibility {
    /// Device currently unlocked.
    WhenUnlocked,
    /// Device unlocked with a passcode set; entries never migrate to
    /// another device.
    WhenPasscodeSet,
}

/// Opaque access-control policy attached to protected entries.
///
/// Built by the subsystem factory; the credential store enforces it on
/// every read of an entry carrying one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessControl {
    accessibility: Accessibility,
    require_presence: bool,
}

impl AccessControl {
    pub fn new(accessibility: Accessibility, require_presence: bool) -> Self {
        Self {
            accessibility,
            require_presence,
        }
    }

    pub fn accessibility(&self) -> Accessibility {
        self.accessibility
    }

    /// Whether a successful biometric or passcode challenge is required at
    /// access time.
    pub fn requires_presence(&self) -> bool {
        self.require_presence
    }
}

/// Access-control object construction failure.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct AccessControlError(pub String);

/// The biometric subsystem primitives.
pub trait BiometricSubsystem: Send + Sync {
    /// Live "can evaluate device-owner authentication via biometrics" query.
    ///
    /// Callers never cache the answer; enrollment can change between any
    /// two calls.
    fn can_evaluate(&self) -> Result<(), DenialReason>;

    /// Build the access-control object protected entries are filed under.
    fn access_control(
        &self,
        accessibility: Accessibility,
        require_presence: bool,
    ) -> Result<AccessControl, AccessControlError>;
}

/// Current biometric availability.
///
/// Computed, never stored: every resolution queries the subsystem afresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityState {
    /// No usable sensor, or no passcode set.
    Unavailable,
    /// Sensor physically present and usable in principle, but currently
    /// unconfigured.
    Available,
    /// A biometric credential is enrolled and usable right now.
    Configured,
}

impl AvailabilityState {
    /// Classify a live subsystem query.
    ///
    /// "No hardware" and "no passcode" are definite negatives. Every other
    /// denial lands in `Available`: some OS releases reported "no passcode"
    /// and "not enrolled" through the same code, so the broad bucket is the
    /// one that still lets callers offer enrollment.
    pub fn resolve(subsystem: &dyn BiometricSubsystem) -> Self {
        match subsystem.can_evaluate() {
            Ok(()) => AvailabilityState::Configured,
            Err(DenialReason::NoHardware | DenialReason::PasscodeNotSet) => {
                AvailabilityState::Unavailable
            }
            Err(_) => AvailabilityState::Available,
        }
    }
}

impl fmt::Display for AvailabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AvailabilityState::Unavailable => "unavailable",
            AvailabilityState::Available => "available",
            AvailabilityState::Configured => "configured",
        };
        f.write_str(text)
    }
}

/// Subsystem stub with a settable outcome.
///
/// Backs tests and platforms without a real probe.
pub struct FixedBiometrics {
    outcome: Mutex<Result<(), DenialReason>>,
    fail_access_control: Mutex<bool>,
}

impl FixedBiometrics {
    pub fn with_outcome(outcome: Result<(), DenialReason>) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            fail_access_control: Mutex::new(false),
        }
    }

    /// A subsystem with an enrolled, usable biometric credential.
    pub fn configured() -> Self {
        Self::with_outcome(Ok(()))
    }

    /// A subsystem with no biometric hardware at all.
    pub fn unavailable() -> Self {
        Self::with_outcome(Err(DenialReason::NoHardware))
    }

    /// A subsystem whose sensor exists but has nothing enrolled.
    pub fn not_enrolled() -> Self {
        Self::with_outcome(Err(DenialReason::NotEnrolled))
    }

    /// Change the outcome subsequent queries report.
    pub fn set_outcome(&self, outcome: Result<(), DenialReason>) {
        *self.outcome.lock() = outcome;
    }

    /// Make access-control construction fail from now on.
    pub fn fail_access_control(&self) {
        *self.fail_access_control.lock() = true;
    }
}

impl BiometricSubsystem for FixedBiometrics {
    fn can_evaluate(&self) -> Result<(), DenialReason> {
        *self.outcome.lock()
    }

    fn access_control(
        &self,
        accessibility: Accessibility,
        require_presence: bool,
    ) -> Result<AccessControl, AccessControlError> {
        if *self.fail_access_control.lock() {
            return Err(AccessControlError(
                "access control construction disabled".into(),
            ));
        }
        Ok(AccessControl::new(accessibility, require_presence))
    }
}
