pub mod types;

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;

use types::{ListMessagesResponse, Message};

const BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// The two Gmail calls the pipeline needs. Behind a trait so the pipeline
/// is testable without a mailbox.
#[cfg_attr(test, mockall::automock)]
pub trait MailApi {
    fn list_message_ids(&self, query: &str) -> Result<Vec<String>>;
    fn get_message(&self, id: &str) -> Result<Message>;
}

/// Blocking Gmail REST client bound to one access token.
pub struct GmailClient {
    http: Client,
    access_token: String,
    base_url: String,
}

impl GmailClient {
    pub fn new(access_token: &str) -> Result<Self> {
        let http = Client::builder()
            .build()
            .context("unable to construct HTTP client")?;
        Ok(Self {
            http,
            access_token: access_token.to_string(),
            base_url: BASE_URL.to_string(),
        })
    }
}

impl MailApi for GmailClient {
    fn list_message_ids(&self, query: &str) -> Result<Vec<String>> {
        let url = format!("{}/messages", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("q", query)])
            .bearer_auth(&self.access_token)
            .send()
            .context("message list request failed")?;

        if !resp.status().is_success() {
            bail!("message list request returned {}", resp.status());
        }

        let list: ListMessagesResponse = resp
            .json()
            .context("unable to parse message list response")?;

        Ok(list
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| m.id)
            .collect())
    }

    fn get_message(&self, id: &str) -> Result<Message> {
        let url = format!("{}/messages/{}", self.base_url, id);
        let resp = self
            .http
            .get(&url)
            .query(&[("format", "full")])
            .bearer_auth(&self.access_token)
            .send()
            .with_context(|| format!("get request for message {id} failed"))?;

        if !resp.status().is_success() {
            bail!("get request for message {id} returned {}", resp.status());
        }

        resp.json()
            .with_context(|| format!("unable to parse message {id}"))
    }
}
