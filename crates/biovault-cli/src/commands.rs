//! Command implementations.
//!
//! Each invocation builds one [`BiometricGate`] over the platform backends;
//! platforms without a real credential store run against an in-memory one,
//! which is enough to demonstrate the flow but does not persist.

use std::io::Write;
use std::sync::Arc;

use biovault_core::{platform, BiometricGate, CredentialStore, GateConfig, MemoryCredentialStore};
use console::style;

use crate::{Cli, Commands};

/// Run the parsed command against a freshly wired gate.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let credentials: Arc<dyn CredentialStore> = match platform::credential_store() {
        Some(store) => store,
        None => {
            eprintln!(
                "{}",
                style("warning: no platform credential store; values will not persist")
                    .yellow()
            );
            Arc::new(MemoryCredentialStore::new())
        }
    };

    let gate = BiometricGate::new(
        credentials,
        platform::biometrics(),
        GateConfig {
            service: cli.service,
            label: cli.label,
            access_group: cli.access_group,
            prefer_biometrics: !cli.no_biometrics,
        },
    );

    match cli.command {
        Commands::Status { json } => status(&gate, json).await,
        Commands::Set { key, value } => set(&gate, key, value).await,
        Commands::Get { key, raw } => get(&gate, key, raw).await,
        Commands::Rm { key } => remove(&gate, key).await,
        Commands::Check => check(&gate).await,
    }
}

async fn status(gate: &BiometricGate, json: bool) -> anyhow::Result<()> {
    let availability = gate.availability();
    let validated = gate.validation_present().await?;

    if json {
        let report = serde_json::json!({
            "availability": availability,
            "validation_present": validated,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Biometrics:  {}", style(availability).cyan());
    println!(
        "Validation:  {}",
        if validated {
            style("present").green()
        } else {
            style("absent").dim()
        }
    );
    Ok(())
}

async fn set(gate: &BiometricGate, key: String, value: Option<String>) -> anyhow::Result<()> {
    let value = match value {
        Some(v) => v,
        None => {
            let prompt = format!("Enter value for '{key}': ");
            rpassword::prompt_password(prompt)
                .map_err(|e| anyhow::anyhow!("Failed to read value: {}", e))?
        }
    };

    if value.is_empty() {
        anyhow::bail!("Value must not be empty");
    }

    gate.set_value(key.clone(), value).await?;
    println!("Stored '{}'.", key);
    Ok(())
}

async fn get(gate: &BiometricGate, key: String, raw: bool) -> anyhow::Result<()> {
    if raw {
        match gate.value(key.clone()).await? {
            Some(bytes) => {
                std::io::stdout().write_all(&bytes)?;
            }
            None => anyhow::bail!("No value stored for '{}'", key),
        }
        return Ok(());
    }

    match gate.string_value(key.clone()).await? {
        Some(value) => println!("{value}"),
        None => anyhow::bail!("No value stored for '{}' (or not valid UTF-8; try --raw)", key),
    }
    Ok(())
}

async fn remove(gate: &BiometricGate, key: String) -> anyhow::Result<()> {
    gate.remove_value(key.clone()).await?;
    println!("Removed '{}'.", key);
    Ok(())
}

async fn check(gate: &BiometricGate) -> anyhow::Result<()> {
    if gate.validation_present().await? {
        println!("A biometric-validated write is on record for this service.");
    } else {
        // Absence cannot distinguish "never written" from "enrollment
        // changed since the last write".
        println!("No validation value present.");
    }
    Ok(())
}
