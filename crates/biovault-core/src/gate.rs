//! Biometric gate facade.
//!
//! Presents an async API over [`SecureEntryStore`], resolving biometric
//! availability fresh for every operation and serializing all store work
//! issued through one facade instance. Operations run one at a time, in
//! submission order, on a dedicated background thread -- the delete-then-add
//! and delete-entry-then-delete-marker sequences must never interleave with
//! a concurrent operation on the same key.
//!
//! The platform challenge blocks that worker thread, never the caller's
//! runtime; each result travels back over a oneshot channel and is awaited
//! on whatever execution context the caller lives on. Every operation
//! resolves exactly once.

use std::sync::Arc;
use std::thread;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::biometric::{AvailabilityState, BiometricSubsystem};
use crate::credential::CredentialStore;
use crate::error::{Result, StoreError};
use crate::store::{SecureEntryStore, StoreConfig};

/// Immutable configuration of one gate instance.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Namespace scoping this gate's entries.
    pub service: String,
    /// Human-readable label attached to entries.
    pub label: String,
    /// Optional group for cross-application sharing.
    pub access_group: Option<String>,
    /// Gate entries behind biometrics whenever a credential is enrolled.
    /// With this off, values are stored unprotected regardless of
    /// availability.
    pub prefer_biometrics: bool,
}

enum Command {
    Set {
        key: String,
        value: Vec<u8>,
        reply: oneshot::Sender<Result<()>>,
    },
    Get {
        key: String,
        reply: oneshot::Sender<Result<Option<Vec<u8>>>>,
    },
    Remove {
        key: String,
        reply: oneshot::Sender<Result<()>>,
    },
    MarkerPresent {
        reply: oneshot::Sender<Result<bool>>,
    },
}

/// Async facade over the secure entry store.
///
/// Cloning is cheap; clones share the same queue and therefore the same
/// ordering domain. No ordering is guaranteed between operations submitted
/// through two independently constructed gates, even on the same service.
#[derive(Clone)]
pub struct BiometricGate {
    commands: mpsc::UnboundedSender<Command>,
    biometrics: Arc<dyn BiometricSubsystem>,
}

impl BiometricGate {
    /// Spawn the worker and return the facade handle.
    ///
    /// The worker exits when the last clone of the returned gate drops;
    /// in-flight operations still complete.
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        biometrics: Arc<dyn BiometricSubsystem>,
        config: GateConfig,
    ) -> Self {
        let (commands, queue) = mpsc::unbounded_channel();
        let worker_biometrics = biometrics.clone();
        // Store primitives block on the user-facing challenge, so the loop
        // gets its own OS thread instead of a runtime worker.
        let spawned = thread::Builder::new()
            .name("biovault-gate".into())
            .spawn(move || worker_loop(queue, credentials, worker_biometrics, config));
        if let Err(error) = spawned {
            // The receiver died with the failed spawn; every submission will
            // resolve with `Disconnected` instead of hanging.
            warn!(%error, "could not spawn gate worker");
        }
        Self {
            commands,
            biometrics,
        }
    }

    /// Current biometric availability, queried fresh.
    pub fn availability(&self) -> AvailabilityState {
        AvailabilityState::resolve(self.biometrics.as_ref())
    }

    /// Store `value` under `key`, gated when biometrics are configured and
    /// this gate prefers them.
    pub async fn set_value(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        self.submit(|reply| Command::Set { key, value, reply }).await
    }

    /// The value stored under `key`, or `None`.
    pub async fn value(&self, key: impl Into<String>) -> Result<Option<Vec<u8>>> {
        let key = key.into();
        self.submit(|reply| Command::Get { key, reply }).await
    }

    /// The value stored under `key`, decoded as UTF-8.
    ///
    /// Bytes that do not decode are "no usable string": `Ok(None)`, not an
    /// error.
    pub async fn string_value(&self, key: impl Into<String>) -> Result<Option<String>> {
        let value = self.value(key).await?;
        Ok(value.and_then(|bytes| String::from_utf8(bytes).ok()))
    }

    /// Remove the value stored under `key` along with the service's
    /// validation marker. Succeeds when nothing was stored.
    pub async fn remove_value(&self, key: impl Into<String>) -> Result<()> {
        let key = key.into();
        self.submit(|reply| Command::Remove { key, reply }).await
    }

    /// Whether a validation marker is present for this gate's service.
    ///
    /// Marker absence cannot distinguish "no protected write ever happened"
    /// from "enrollment changed since the last one".
    pub async fn validation_present(&self) -> Result<bool> {
        self.submit(|reply| Command::MarkerPresent { reply }).await
    }

    async fn submit<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| StoreError::Disconnected)?;
        response.await.map_err(|_| StoreError::Disconnected)?
    }
}

fn worker_loop(
    mut queue: mpsc::UnboundedReceiver<Command>,
    credentials: Arc<dyn CredentialStore>,
    biometrics: Arc<dyn BiometricSubsystem>,
    config: GateConfig,
) {
    while let Some(command) = queue.blocking_recv() {
        // Availability is never cached: each operation sees the enrollment
        // state at the moment it runs, and the gate only engages when a
        // credential is enrolled right now.
        let availability = AvailabilityState::resolve(biometrics.as_ref());
        let gated = config.prefer_biometrics && availability == AvailabilityState::Configured;
        let store = SecureEntryStore::new(
            credentials.clone(),
            biometrics.clone(),
            StoreConfig {
                service: config.service.clone(),
                label: config.label.clone(),
                access_group: config.access_group.clone(),
                biometric_gate: gated,
            },
        );

        // A dropped reply receiver means the caller went away; the work
        // still ran, the result just has no audience.
        match command {
            Command::Set { key, value, reply } => {
                let _ = reply.send(store.set(&key, &value));
            }
            Command::Get { key, reply } => {
                let _ = reply.send(store.get(&key));
            }
            Command::Remove { key, reply } => {
                let _ = reply.send(store.remove(&key));
            }
            Command::MarkerPresent { reply } => {
                let _ = reply.send(store.has_validation_marker());
            }
        }
    }
    debug!("gate worker shutting down");
}
