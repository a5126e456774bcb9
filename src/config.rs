use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Read-only mailbox access; changing the scope invalidates cached tokens.
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// Runtime configuration, assembled in main and passed down explicitly.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    pub subject_filter: String,
    pub scope: String,
}

/// OAuth client registration as found inside Google's credentials.json.
#[derive(Debug, Clone, Deserialize)]
pub struct OauthApp {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub auth_uri: String,
    pub token_uri: String,
    pub redirect_uris: Option<Vec<String>>,
}

/// credentials.json wraps the registration under "installed" or "web".
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: Option<OauthApp>,
    web: Option<OauthApp>,
}

pub fn load_oauth_app(path: &Path) -> Result<OauthApp> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("unable to read client secret file {}", path.display()))?;
    let file: CredentialsFile = serde_json::from_str(&raw)
        .with_context(|| format!("unable to parse {} as an OAuth client config", path.display()))?;
    file.installed
        .or(file.web)
        .ok_or_else(|| anyhow!("{}: no \"installed\" or \"web\" section", path.display()))
}
