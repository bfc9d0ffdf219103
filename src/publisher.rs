use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::BotError;
use crate::format::{compose_post, media_description};
use crate::mastodon::{PublishService, StatusRequest};
use crate::model::{Artwork, PublishedEntry, Track};
use crate::state::StateStore;
use crate::subsonic::SourceService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSettings {
    pub header: String,
    pub visibility: String,
    /// Pause between a media upload and the status that references it.
    pub media_settle: Duration,
}

impl PostSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            header: cfg.post.header.clone(),
            visibility: cfg.mastodon.visibility.clone(),
            media_settle: cfg.media_settle(),
        }
    }

    /// Nothing is uploaded in a dry run, so there is nothing to wait for.
    pub fn for_dry_run(self) -> Self {
        Self {
            media_settle: Duration::ZERO,
            ..self
        }
    }
}

/// Turns one favorite into one status.
pub struct Publisher {
    source: Arc<dyn SourceService>,
    api: Arc<dyn PublishService>,
    settings: PostSettings,
}

impl Publisher {
    pub fn new(
        source: Arc<dyn SourceService>,
        api: Arc<dyn PublishService>,
        settings: PostSettings,
    ) -> Self {
        Self {
            source,
            api,
            settings,
        }
    }

    /// Fetch art, compose, upload and post. Cover art problems degrade to a
    /// text-only post; anything else is a `Publish` error and nothing was posted.
    #[instrument(skip_all, fields(track_id = %track.id))]
    pub async fn publish(&self, track: &Track) -> Result<String, BotError> {
        let artwork = match self.fetch_artwork(track).await {
            Ok(artwork) => artwork,
            Err(err) => {
                warn!(error = %err, stage = err.stage(), "posting without cover art");
                None
            }
        };

        let text = compose_post(&self.settings.header, track);
        let mut media_ids = Vec::new();
        if let Some(artwork) = artwork {
            let media_id = self
                .api
                .upload_media(&artwork, &media_description(track))
                .await
                .map_err(|err| publish_error(track, err))?;
            media_ids.push(media_id);
            if !self.settings.media_settle.is_zero() {
                tokio::time::sleep(self.settings.media_settle).await;
            }
        }

        let status = StatusRequest {
            text,
            media_ids,
            visibility: self.settings.visibility.clone(),
            idempotency_key: idempotency_key(&track.id),
        };
        let post_id = self
            .api
            .create_status(&status)
            .await
            .map_err(|err| publish_error(track, err))?;
        info!(
            post_id = %post_id,
            artist = %track.artist,
            title = %track.title,
            with_media = !status.media_ids.is_empty(),
            "posted favorite"
        );
        Ok(post_id)
    }

    /// Publish, then commit. The id only reaches the store after the post
    /// was confirmed, so a failure here leaves the track to the next cycle.
    pub async fn process_track<S>(&self, track: &Track, store: &mut S) -> Result<String, BotError>
    where
        S: StateStore + ?Sized,
    {
        let post_id = self.publish(track).await?;
        store.commit(&track.id, PublishedEntry::posted(post_id.as_str()))?;
        debug!(track_id = %track.id, "committed");
        Ok(post_id)
    }

    async fn fetch_artwork(&self, track: &Track) -> Result<Option<Artwork>, BotError> {
        let Some(cover) = track.cover_art.as_deref() else {
            debug!("track has no cover art reference");
            return Ok(None);
        };
        self.source
            .fetch_cover_art(cover)
            .await
            .map(Some)
            .map_err(|err| BotError::ArtworkFetch {
                cover: cover.to_string(),
                err,
            })
    }
}

fn publish_error(track: &Track, err: anyhow::Error) -> BotError {
    BotError::Publish {
        track_id: track.id.clone(),
        err,
    }
}

/// Stable per track, so a resubmission after a lost response is dropped by the server.
pub fn idempotency_key(track_id: &str) -> String {
    Uuid::new_v5(
        &Uuid::NAMESPACE_URL,
        format!("starbot:favorite:{track_id}").as_bytes(),
    )
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_is_stable_per_track() {
        assert_eq!(idempotency_key("a"), idempotency_key("a"));
        assert_ne!(idempotency_key("a"), idempotency_key("b"));
        assert_eq!(idempotency_key("a").len(), 36);
    }

    #[test]
    fn settings_follow_config() {
        let cfg: Config = serde_yaml::from_str(crate::config::example()).unwrap();
        let settings = PostSettings::from_config(&cfg);
        assert_eq!(settings.visibility, "public");
        assert_eq!(settings.media_settle, Duration::from_secs(5));
        assert_eq!(settings.header, cfg.post.header);
    }

    #[test]
    fn dry_run_settings_skip_the_settle_delay() {
        let cfg: Config = serde_yaml::from_str(crate::config::example()).unwrap();
        let settings = PostSettings::from_config(&cfg).for_dry_run();
        assert!(settings.media_settle.is_zero());
        assert_eq!(settings.visibility, "public");
    }
}
