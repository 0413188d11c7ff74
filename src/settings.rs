//! Credential loading
//!
//! Credentials come from a JSON secrets file with `clientId` and
//! `clientSecret` keys. Values passed on the command line or through
//! `WHOSTREAM_CLIENT_ID` / `WHOSTREAM_CLIENT_SECRET` take precedence.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use whostream_catalog::Credentials;
use whostream_core::error::{Result, WhoStreamError};

/// Default secrets file name
pub const SECRETS_FILE_NAME: &str = "secrets.json";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretsFile {
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
}

/// Resolved application credentials
#[derive(Debug, Clone)]
pub struct Settings {
    credentials: Credentials,
}

impl Settings {
    /// Resolve credentials
    ///
    /// `secrets` is an explicit secrets file and must exist. Without it the
    /// first of [`Settings::default_secrets_paths`] that exists is used, if
    /// any. `client_id` and `client_secret` override the file.
    pub fn load(
        secrets: Option<&Path>,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Result<Self> {
        let needs_file = client_id.is_none() || client_secret.is_none();
        let file = match secrets {
            Some(path) => Self::read_secrets(path)?,
            None if needs_file => match Self::default_secrets_paths().into_iter().find(|p| p.is_file()) {
                Some(path) => Self::read_secrets(&path)?,
                None => SecretsFile::default(),
            },
            None => SecretsFile::default(),
        };

        let client_id = non_blank(client_id.or(file.client_id)).ok_or_else(|| {
            WhoStreamError::Config(
                "no client id; set clientId in secrets.json or WHOSTREAM_CLIENT_ID".to_string(),
            )
        })?;
        let client_secret = non_blank(client_secret.or(file.client_secret)).ok_or_else(|| {
            WhoStreamError::Config(
                "no client secret; set clientSecret in secrets.json or WHOSTREAM_CLIENT_SECRET"
                    .to_string(),
            )
        })?;

        Ok(Self {
            credentials: Credentials::new(client_id, client_secret),
        })
    }

    /// `./secrets.json`, then `<config dir>/whostream/secrets.json`
    pub fn default_secrets_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(SECRETS_FILE_NAME)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("whostream").join(SECRETS_FILE_NAME));
        }
        paths
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    fn read_secrets(path: &Path) -> Result<SecretsFile> {
        debug!("Reading credentials from {}", path.display());
        let contents = std::fs::read_to_string(path).map_err(|e| {
            WhoStreamError::Config(format!("cannot read secrets file {}: {e}", path.display()))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            WhoStreamError::Config(format!("invalid secrets file {}: {e}", path.display()))
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
