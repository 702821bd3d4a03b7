// SPDX-FileCopyrightText: 2026 the Aviron contributors
// SPDX-License-Identifier: Apache-2.0

//! JSON configuration file mapping onto the client builder.
//!
//! Every field is optional and falls back to the builder defaults, so a
//! minimal deployment config can name nothing but the endpoint.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::client::{
    ClamClient, ClamClientBuilder, DEFAULT_CONNECTION_TIMEOUT_MS, DEFAULT_HOSTNAME, DEFAULT_PORT,
    DEFAULT_READ_TIMEOUT_MS,
};
use crate::error::ClamError;
use crate::path::FileSeparator;
use crate::quarantine::QuarantineAction;

/// Client settings as stored on disk.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    /// Daemon hostname (default: `localhost`).
    pub server_hostname: String,

    /// Daemon TCP port (default: 3310).
    pub server_port: u16,

    /// Separator flavor the daemon expects in paths.
    pub server_file_separator: FileSeparator,

    /// Connect timeout in milliseconds; 0 blocks indefinitely.
    pub connection_timeout_millis: u64,

    /// Read timeout in milliseconds; 0 blocks indefinitely.
    pub read_timeout_millis: u64,

    /// Action for infected files found by SCAN-family commands.
    pub quarantine_file_action: QuarantineAction,

    /// Quarantine directory, required when the action is not `none`.
    pub quarantine_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_hostname: DEFAULT_HOSTNAME.to_string(),
            server_port: DEFAULT_PORT,
            server_file_separator: FileSeparator::default(),
            connection_timeout_millis: DEFAULT_CONNECTION_TIMEOUT_MS,
            read_timeout_millis: DEFAULT_READ_TIMEOUT_MS,
            quarantine_file_action: QuarantineAction::default(),
            quarantine_dir: None,
        }
    }
}

/// Check that a path is an accessible directory.
fn check_dir(dir: &Path) -> Result<(), &'static str> {
    match dir.metadata() {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err("is not a directory"),
        Err(e) if e.kind() == ErrorKind::NotFound => Err("does not exist"),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => Err("permission denied"),
        Err(_) => Err("is not accessible"),
    }
}

impl ClientConfig {
    /// Load and validate configuration from a JSON file.
    pub fn load(config_path: &Path) -> Result<Self, ClamError> {
        let config_data = fs::read(config_path).map_err(|e| {
            ClamError::Config(format!(
                "failed to read config file {}: {e}",
                config_path.display()
            ))
        })?;

        let config: Self = serde_json::from_slice(&config_data)
            .map_err(|e| ClamError::Config(format!("failed to parse config JSON: {e}")))?;

        if let Err(errors) = config.validate() {
            return Err(ClamError::Config(errors.join("; ")));
        }

        info!(
            "loaded client configuration for {}:{}",
            config.server_hostname, config.server_port
        );
        Ok(config)
    }

    /// Validate the configuration.
    /// Returns `Ok(())` if valid, or `Err(Vec<String>)` with error messages.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors: Vec<String> = Vec::new();

        if self.server_hostname.is_empty() {
            errors.push("serverHostname must not be empty".to_string());
        }
        if self.server_port == 0 {
            errors.push("serverPort must not be 0".to_string());
        }

        if self.quarantine_file_action == QuarantineAction::None {
            if self.quarantine_dir.is_some() {
                errors.push(
                    "quarantineDir is set but quarantineFileAction is 'none'".to_string(),
                );
            }
        } else {
            match &self.quarantine_dir {
                None => errors.push(format!(
                    "quarantineDir is required for quarantineFileAction '{}'",
                    self.quarantine_file_action
                )),
                Some(dir) => {
                    if let Err(e) = check_dir(dir) {
                        errors.push(format!("quarantineDir '{}' {e}", dir.display()));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Turn the configuration into a builder, for callers that still want
    /// to attach listeners.
    #[must_use]
    pub fn into_builder(self) -> ClamClientBuilder {
        let mut builder = ClamClient::builder()
            .hostname(&self.server_hostname)
            .port(self.server_port)
            .file_separator(self.server_file_separator)
            .connection_timeout_ms(self.connection_timeout_millis)
            .read_timeout_ms(self.read_timeout_millis)
            .quarantine_action(self.quarantine_file_action);
        if let Some(dir) = &self.quarantine_dir {
            builder = builder.quarantine_dir(dir);
        }
        builder
    }

    /// Build a client straight from the configuration.
    pub fn into_client(self) -> Result<ClamClient, ClamError> {
        self.into_builder().build()
    }
}
