pub mod oauth;
pub mod token_file;

use anyhow::{Context, Result};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::AppConfig;
use crate::gmail::GmailClient;
use oauth::{CodePrompt, StdinPrompt};
use token_file::StoredToken;

pub fn unix_now() -> Result<i64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system time before unix epoch")?
        .as_secs() as i64)
}

/// The two network-facing ways of producing a token. Behind a trait so the
/// cache policy in `obtain_token` is testable without terminal or network I/O.
#[cfg_attr(test, mockall::automock)]
pub trait AuthFlow {
    fn consent(&self) -> Result<StoredToken>;
    fn refresh(&self, refresh_token: &str) -> Result<StoredToken>;
}

/// Real flow: interactive consent and refresh against the provider endpoints.
pub struct OauthFlow<'a> {
    app: &'a crate::config::OauthApp,
    scope: &'a str,
    prompt: &'a dyn CodePrompt,
}

impl AuthFlow for OauthFlow<'_> {
    fn consent(&self) -> Result<StoredToken> {
        oauth::consent_flow(self.app, self.scope, self.prompt)
    }

    fn refresh(&self, refresh_token: &str) -> Result<StoredToken> {
        oauth::refresh_access_token(self.app, refresh_token)
    }
}

/// Load the OAuth client config and produce an authenticated Gmail client,
/// reusing, refreshing, or interactively acquiring the token as needed.
pub fn acquire_client(cfg: &AppConfig) -> Result<GmailClient> {
    let app = crate::config::load_oauth_app(&cfg.credentials_path)?;
    let prompt = StdinPrompt;
    let flow = OauthFlow {
        app: &app,
        scope: &cfg.scope,
        prompt: &prompt,
    };
    let token = obtain_token(&cfg.token_path, &flow)?;
    GmailClient::new(&token.access_token)
}

/// Token cache policy:
/// 1. cached and not expired -> use it;
/// 2. cached, expired, refresh token present -> refresh and re-persist;
/// 3. otherwise -> interactive consent flow, then persist.
/// An unreadable cache file falls through to the consent flow.
pub fn obtain_token(token_path: &Path, flow: &dyn AuthFlow) -> Result<StoredToken> {
    let now = unix_now()?;

    let cached = match token_file::load(token_path) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("ignoring unreadable token file: {e:#}");
            None
        }
    };

    if let Some(tok) = cached {
        if !tok.is_expired(now) {
            log::debug!("using cached access token");
            return Ok(tok);
        }
        if let Some(rt) = tok.refresh_token.clone() {
            println!("Cached token expired; refreshing...");
            match flow.refresh(&rt) {
                Ok(mut fresh) => {
                    // Google omits the refresh token on refresh responses; keep the old one.
                    if fresh.refresh_token.is_none() {
                        fresh.refresh_token = Some(rt);
                    }
                    token_file::save(token_path, &fresh)?;
                    return Ok(fresh);
                }
                Err(e) => {
                    eprintln!("Refresh failed: {e:#}; falling back to interactive auth");
                }
            }
        } else {
            println!("Cached token expired and no refresh token; re-authorizing...");
        }
    }

    let tok = flow.consent()?;
    println!("Saving credential file to: {}", token_path.display());
    token_file::save(token_path, &tok)?;
    Ok(tok)
}
