//! Optional "now playing" profile field.
//!
//! Independent of the favorites loop: it keeps only the id of the last song it
//! wrote, in memory, and a failure here never touches the state file.
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::error::BotError;
use crate::format::track_line;
use crate::mastodon::PublishService;
use crate::subsonic::SourceService;

pub struct NowPlaying {
    source: Arc<dyn SourceService>,
    api: Arc<dyn PublishService>,
    field_name: String,
    last_song_id: Option<String>,
}

impl NowPlaying {
    pub fn new(
        source: Arc<dyn SourceService>,
        api: Arc<dyn PublishService>,
        field_name: impl Into<String>,
    ) -> Self {
        Self {
            source,
            api,
            field_name: field_name.into(),
            last_song_id: None,
        }
    }

    pub fn last_song_id(&self) -> Option<&str> {
        self.last_song_id.as_deref()
    }

    /// Write the latest play to the profile if it changed since the last
    /// successful update. Returns whether the profile was written.
    #[instrument(skip_all, fields(field = %self.field_name))]
    pub async fn refresh(&mut self) -> Result<bool, BotError> {
        let latest = self
            .source
            .fetch_latest_play()
            .await
            .map_err(BotError::SourceUnavailable)?;
        let Some(track) = latest else {
            debug!("no plays reported");
            return Ok(false);
        };
        if self.last_song_id.as_deref() == Some(track.id.as_str()) {
            debug!(track_id = %track.id, "latest play unchanged");
            return Ok(false);
        }

        let value = track_line(&track);
        self.api
            .update_profile_field(&self.field_name, &value)
            .await
            .map_err(|err| BotError::ProfileUpdate {
                track_id: track.id.clone(),
                err,
            })?;
        info!(track_id = %track.id, value = %value, "profile updated");
        self.last_song_id = Some(track.id);
        Ok(true)
    }
}
