use anyhow::{Context, Result, anyhow, bail};
use oauth2::TokenResponse;
use oauth2::basic::{BasicClient, BasicTokenResponse, BasicTokenType};
use oauth2::reqwest::http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge, RedirectUrl,
    RefreshToken, Scope, TokenUrl,
};
use std::io::{self, BufRead, Write};

use super::token_file::StoredToken;
use super::unix_now;
use crate::config::OauthApp;

/// Out-of-band redirect: the provider shows the code for the user to paste.
const OOB_REDIRECT: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Where the authorization code comes from during the consent flow.
/// Pluggable so tests can feed a fixed code instead of reading a terminal.
#[cfg_attr(test, mockall::automock)]
pub trait CodePrompt {
    fn read_code(&self) -> Result<String>;
}

/// Blocks on stdin until the user pastes the authorization code.
pub struct StdinPrompt;

impl CodePrompt for StdinPrompt {
    fn read_code(&self) -> Result<String> {
        print!("Paste the authorization code here: ");
        io::stdout().flush()?;

        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("unable to read authorization code")?;
        let code = line.trim().to_string();
        if code.is_empty() {
            bail!("empty authorization code");
        }
        Ok(code)
    }
}

fn oauth_client(app: &OauthApp) -> Result<BasicClient> {
    let auth_url = AuthUrl::new(app.auth_uri.clone())
        .map_err(|e| anyhow!("invalid auth_uri '{}': {e}", app.auth_uri))?;
    let token_url = TokenUrl::new(app.token_uri.clone())
        .map_err(|e| anyhow!("invalid token_uri '{}': {e}", app.token_uri))?;

    Ok(BasicClient::new(
        ClientId::new(app.client_id.clone()),
        app.client_secret.clone().map(ClientSecret::new),
        auth_url,
        Some(token_url),
    ))
}

/// Authorization Code + PKCE consent flow with manual code entry.
/// Prints the consent URL, opens the browser best-effort, then blocks on the prompt.
pub fn consent_flow(app: &OauthApp, scope: &str, prompt: &dyn CodePrompt) -> Result<StoredToken> {
    let redirect = app
        .redirect_uris
        .as_ref()
        .and_then(|uris| uris.first().cloned())
        .unwrap_or_else(|| OOB_REDIRECT.to_string());

    let client = oauth_client(app)?.set_redirect_uri(RedirectUrl::new(redirect)?);

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let (auth_url, _csrf_token) = client
        .authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new(scope.to_string()))
        .add_extra_param("access_type", "offline")
        .set_pkce_challenge(pkce_challenge)
        .url();

    println!("Open this URL in your browser and authorize access:\n{auth_url}");
    // best-effort: don't fail if browser can't be opened
    if let Err(e) = open::that(auth_url.as_str()) {
        log::warn!("could not open browser automatically: {e}");
    }

    let code = prompt.read_code()?;

    let token = client
        .exchange_code(AuthorizationCode::new(code))
        .set_pkce_verifier(pkce_verifier)
        .request(http_client)
        .map_err(|e| anyhow!("token exchange failed: {e}"))?;

    stored_from(&token)
}

/// Exchange a refresh token for a fresh access token.
pub fn refresh_access_token(app: &OauthApp, refresh_token: &str) -> Result<StoredToken> {
    let client = oauth_client(app)?;
    let token = client
        .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
        .request(http_client)
        .map_err(|e| anyhow!("token refresh failed: {e}"))?;

    stored_from(&token)
}

fn stored_from(token: &BasicTokenResponse) -> Result<StoredToken> {
    let now = unix_now()?;
    let token_type = match token.token_type() {
        BasicTokenType::Bearer => "Bearer".to_string(),
        other => format!("{other:?}"),
    };

    Ok(StoredToken {
        access_token: token.access_token().secret().to_string(),
        refresh_token: token.refresh_token().map(|r| r.secret().to_string()),
        expires_at_epoch: token.expires_in().map(|d| now + d.as_secs() as i64),
        token_type: Some(token_type),
    })
}
