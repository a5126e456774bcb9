use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Cached OAuth token, stored as JSON next to the binary (token.json by default).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at_epoch: Option<i64>, // unix seconds
    pub token_type: Option<String>,
}

impl StoredToken {
    /// A token without an expiry is treated as still usable.
    pub fn is_expired(&self, now_epoch: i64) -> bool {
        matches!(self.expires_at_epoch, Some(exp) if now_epoch >= exp)
    }
}

/// Load the cached token if the file exists. A missing file is not an error.
pub fn load(path: &Path) -> Result<Option<StoredToken>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("unable to read token file {}", path.display()))?;
    let tok: StoredToken = serde_json::from_str(&raw)
        .with_context(|| format!("unable to parse token file {}", path.display()))?;
    Ok(Some(tok))
}

/// Overwrite the token file, owner read/write only.
pub fn save(path: &Path, token: &StoredToken) -> Result<()> {
    let raw = serde_json::to_string_pretty(token)?;
    fs::write(path, raw).with_context(|| format!("unable to write token file {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("unable to restrict permissions on {}", path.display()))?;
    }
    Ok(())
}
