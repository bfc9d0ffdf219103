//! Subsonic API client used to read starred tracks and their cover art.
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use md5::{Digest, Md5};
use reqwest::{header, Client, Url};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use crate::config;
use crate::model::{Artwork, Track};
use crate::subsonic::model::Envelope;

pub mod model;

const RECENT_PLAYS: &str = "10";

/// Read side of the media server.
#[async_trait]
pub trait SourceService: Send + Sync {
    /// Currently favorited tracks, in the order the server lists them.
    async fn fetch_favorites(&self) -> Result<Vec<Track>>;

    async fn fetch_cover_art(&self, cover_id: &str) -> Result<Artwork>;

    /// Most recently played track, if the server reports any plays.
    async fn fetch_latest_play(&self) -> Result<Option<Track>>;
}

#[derive(Clone)]
pub struct SubsonicClient {
    http: Client,
    base_url: Url,
    username: String,
    password: String,
    client_name: String,
    api_version: String,
}

impl fmt::Debug for SubsonicClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubsonicClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl SubsonicClient {
    pub fn new(base_url: &str, username: String, password: String) -> Result<Self> {
        let mut base_url = Url::parse(base_url).context("invalid Subsonic base URL")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .user_agent(concat!("starbot/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            username,
            password,
            client_name: "starbot".into(),
            api_version: "1.16.1".into(),
        })
    }

    pub fn from_config(cfg: &config::Source) -> Result<Self> {
        let mut client = Self::new(&cfg.base_url, cfg.username.clone(), cfg.password.clone())?;
        client.client_name = cfg.client_name.clone();
        client.api_version = cfg.api_version.clone();
        Ok(client)
    }

    /// Build a GET for `rest/{endpoint}` carrying salted-token auth parameters.
    pub fn build_request(&self, endpoint: &str, extra: &[(&str, &str)]) -> Result<reqwest::Request> {
        let url = self
            .base_url
            .join(&format!("rest/{endpoint}"))
            .context("invalid Subsonic endpoint")?;
        let salt = new_salt();
        let token = auth_token(&self.password, &salt);
        self.http
            .get(url)
            .query(&[
                ("u", self.username.as_str()),
                ("t", token.as_str()),
                ("s", salt.as_str()),
                ("v", self.api_version.as_str()),
                ("c", self.client_name.as_str()),
                ("f", "json"),
            ])
            .query(extra)
            .build()
            .context("failed to build Subsonic request")
    }

    async fn execute(&self, endpoint: &str, extra: &[(&str, &str)]) -> Result<reqwest::Response> {
        let request = self.build_request(endpoint, extra)?;
        debug!(endpoint, "sending subsonic request");
        let res = self
            .http
            .execute(request)
            .await
            .with_context(|| format!("failed to reach Subsonic server ({endpoint})"))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            bail!("subsonic {endpoint} returned {status}: {body}");
        }
        Ok(res)
    }
}

#[async_trait]
impl SourceService for SubsonicClient {
    async fn fetch_favorites(&self) -> Result<Vec<Track>> {
        let res = self.execute("getStarred2", &[]).await?;
        let envelope: Envelope = res.json().await.context("invalid getStarred2 response")?;
        let response = check_status(envelope)?;
        let songs = response.starred2.unwrap_or_default().song;
        debug!(count = songs.len(), "fetched starred songs");
        Ok(songs.into_iter().map(Track::from).collect())
    }

    async fn fetch_cover_art(&self, cover_id: &str) -> Result<Artwork> {
        let res = self.execute("getCoverArt", &[("id", cover_id)]).await?;
        let content_type = res
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase())
            .unwrap_or_else(|| "image/jpeg".into());

        // Errors come back as a regular API document instead of an image.
        if content_type.contains("json") || content_type.contains("xml") {
            let body = res.text().await.unwrap_or_default();
            if let Ok(envelope) = serde_json::from_str::<Envelope>(&body) {
                check_status(envelope)?;
            }
            bail!("getCoverArt returned {content_type} instead of an image");
        }

        let bytes = res.bytes().await.context("failed to read cover art body")?;
        if bytes.is_empty() {
            bail!("getCoverArt returned an empty body");
        }
        Ok(Artwork {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    async fn fetch_latest_play(&self) -> Result<Option<Track>> {
        let res = self
            .execute("getScrobbles", &[("count", RECENT_PLAYS)])
            .await?;
        let envelope: Envelope = res.json().await.context("invalid getScrobbles response")?;
        let response = check_status(envelope)?;
        let latest = response
            .scrobbles
            .unwrap_or_default()
            .song
            .into_iter()
            .next();
        Ok(latest.map(Track::from))
    }
}

fn check_status(envelope: Envelope) -> Result<model::SubsonicResponse> {
    let response = envelope.response;
    if response.status == "ok" {
        return Ok(response);
    }
    let (code, message) = response
        .error
        .map(|e| (e.code, e.message.unwrap_or_default()))
        .unwrap_or((0, "unknown error".into()));
    Err(anyhow!("subsonic error {code}: {message}"))
}

fn new_salt() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// `md5(password + salt)` as lowercase hex.
pub fn auth_token(password: &str, salt: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}
