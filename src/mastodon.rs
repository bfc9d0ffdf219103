use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use crate::config;
use crate::model::Artwork;

/// A status ready to be submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRequest {
    pub text: String,
    pub media_ids: Vec<String>,
    pub visibility: String,
    /// Sent as `Idempotency-Key`; the server drops repeated submissions with the same key.
    pub idempotency_key: String,
}

/// Write side: where favorites get announced.
#[async_trait]
pub trait PublishService: Send + Sync {
    /// Upload an image attachment and return its media id.
    async fn upload_media(&self, artwork: &Artwork, description: &str) -> Result<String>;

    /// Create a status and return its id.
    async fn create_status(&self, status: &StatusRequest) -> Result<String>;

    /// Set the account's first profile metadata field to `name: value`.
    async fn update_profile_field(&self, name: &str, value: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct MastodonClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl fmt::Debug for MastodonClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MastodonClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl MastodonClient {
    pub fn new(base_url: &str, token: String) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid Mastodon base URL")?;
        let http = Client::builder()
            .user_agent(concat!("starbot/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    pub fn from_config(cfg: &config::Mastodon) -> Result<Self> {
        Self::new(&cfg.base_url, cfg.access_token.clone())
    }

    pub fn build_status_request(&self, status: &StatusRequest) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join("api/v1/statuses")
            .context("invalid Mastodon base URL")?;
        self.http
            .post(endpoint)
            .bearer_auth(&self.token)
            .header("Idempotency-Key", &status.idempotency_key)
            .json(&build_status_body(status))
            .build()
            .context("failed to build Mastodon request")
    }

    /// PATCH of the account credentials. Only field 0 is sent, so the server
    /// drops any other metadata fields on the profile.
    pub fn build_profile_request(&self, name: &str, value: &str) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join("api/v1/accounts/update_credentials")
            .context("invalid Mastodon base URL")?;
        self.http
            .patch(endpoint)
            .bearer_auth(&self.token)
            .form(&[
                ("fields_attributes[0][name]", name),
                ("fields_attributes[0][value]", value),
            ])
            .build()
            .context("failed to build profile update")
    }

    async fn execute(&self, request: reqwest::Request) -> Result<String> {
        let url = request.url().clone();
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach Mastodon")?;

        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            warn!(url = %url, "rate limited by Mastodon");
            return Err(anyhow!("received 429 from Mastodon: {}", body));
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("mastodon error {}: {}", status, body));
        }

        let payload: IdResponse = res.json().await.context("invalid Mastodon response")?;
        debug!(url = %url, id = %payload.id, "mastodon request succeeded");
        Ok(payload.id)
    }
}

#[async_trait]
impl PublishService for MastodonClient {
    async fn upload_media(&self, artwork: &Artwork, description: &str) -> Result<String> {
        let endpoint = self
            .base_url
            .join("api/v2/media")
            .context("invalid Mastodon base URL")?;
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(artwork.bytes.clone())
                    .file_name(artwork.file_name())
                    .mime_str(&artwork.content_type)?,
            )
            .text("description", description.to_string());
        let request = self
            .http
            .post(endpoint)
            .bearer_auth(&self.token)
            .multipart(form)
            .build()
            .context("failed to build media upload")?;

        let media_id = self.execute(request).await.context("media upload failed")?;
        info!(media_id = %media_id, bytes = artwork.bytes.len(), "uploaded cover art");
        Ok(media_id)
    }

    async fn create_status(&self, status: &StatusRequest) -> Result<String> {
        let request = self.build_status_request(status)?;
        self.execute(request).await.context("status creation failed")
    }

    async fn update_profile_field(&self, name: &str, value: &str) -> Result<()> {
        let request = self.build_profile_request(name, value)?;
        let account_id = self.execute(request).await.context("profile update failed")?;
        debug!(account_id = %account_id, field = name, "profile field updated");
        Ok(())
    }
}

/// Logs what would be posted instead of talking to a server.
#[derive(Debug, Default)]
pub struct DryRunPublisher {
    counter: AtomicU64,
}

impl DryRunPublisher {
    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.counter.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[async_trait]
impl PublishService for DryRunPublisher {
    async fn upload_media(&self, artwork: &Artwork, description: &str) -> Result<String> {
        info!(bytes = artwork.bytes.len(), description, "[dry-run] would upload cover art");
        Ok(self.next_id("dry-media"))
    }

    async fn create_status(&self, status: &StatusRequest) -> Result<String> {
        info!(
            visibility = %status.visibility,
            media = status.media_ids.len(),
            "[dry-run] would post:\n{}",
            status.text
        );
        Ok(self.next_id("dry-status"))
    }

    async fn update_profile_field(&self, name: &str, value: &str) -> Result<()> {
        info!(field = name, value, "[dry-run] would update profile");
        Ok(())
    }
}

pub fn build_status_body(status: &StatusRequest) -> Value {
    let mut body = json!({
        "status": status.text,
        "visibility": status.visibility,
    });
    if !status.media_ids.is_empty() {
        body["media_ids"] = json!(status.media_ids);
    }
    body
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}
