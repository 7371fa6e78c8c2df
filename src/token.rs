use crate::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// OAuth token as persisted by the login flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Read-only access to the bearer token used for catalog requests.
///
/// Resolution order:
/// 1. `CATALOG_ACCESS_TOKEN`
/// 2. The JSON file named by `CATALOG_TOKEN_FILE`
/// 3. `~/.local/share/artist-catalog/token.json` (XDG data directory)
///
/// Obtaining and refreshing tokens is left to the login flow.
pub struct TokenStore;

impl TokenStore {
    /// Get the default token file path using XDG directories.
    pub fn default_token_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            CatalogError::Config("Cannot determine XDG data directory".to_string())
        })?;
        Ok(data_dir.join("artist-catalog").join("token.json"))
    }

    pub fn token_path() -> Result<PathBuf> {
        match env::var("CATALOG_TOKEN_FILE") {
            Ok(path) => Ok(PathBuf::from(path)),
            Err(_) => Self::default_token_path(),
        }
    }

    /// Load a token file from an explicit path.
    pub fn load_from(path: &Path) -> Result<StoredToken> {
        if !path.exists() {
            return Err(CatalogError::Config(format!(
                "No token file at {}; log in first",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path)?;
        let token: StoredToken = serde_json::from_str(&contents).map_err(|e| {
            CatalogError::Config(format!("Bad JSON in token file {}: {e}", path.display()))
        })?;

        if token.access_token.trim().is_empty() {
            return Err(CatalogError::Config(format!(
                "Token file {} has an empty access token",
                path.display()
            )));
        }

        log::debug!("Loaded access token from {}", path.display());
        Ok(token)
    }

    /// Resolve the bearer token from the environment or the token file.
    pub fn bearer_token() -> Result<String> {
        if let Ok(token) = env::var("CATALOG_ACCESS_TOKEN") {
            if !token.trim().is_empty() {
                return Ok(token.trim().to_string());
            }
        }
        let path = Self::token_path()?;
        Ok(Self::load_from(&path)?.access_token)
    }
}
