use std::path::PathBuf;
use thiserror::Error;

/// Failures of the poll-and-publish loop, classified by stage.
///
/// Collaborator clients report `anyhow` errors; they are wrapped into these
/// variants where the stage boundary is crossed so the scheduler can decide
/// between logging and stopping.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("source unavailable: {0:#}")]
    SourceUnavailable(anyhow::Error),
    #[error("artwork fetch failed for cover {cover}: {err:#}")]
    ArtworkFetch { cover: String, err: anyhow::Error },
    #[error("publish failed for track {track_id}: {err:#}")]
    Publish { track_id: String, err: anyhow::Error },
    #[error("profile update failed for track {track_id}: {err:#}")]
    ProfileUpdate { track_id: String, err: anyhow::Error },
    #[error("state file {} is corrupt: {detail}", path.display())]
    CorruptState { path: PathBuf, detail: String },
    #[error("failed to persist state file {}", path.display())]
    StatePersist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BotError {
    /// Fatal errors stop the process; everything else is retried next cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BotError::CorruptState { .. } | BotError::StatePersist { .. }
        )
    }

    /// Loop stage the error belongs to, used as a structured log field.
    pub fn stage(&self) -> &'static str {
        match self {
            BotError::SourceUnavailable(_) => "poll",
            BotError::ArtworkFetch { .. } => "artwork",
            BotError::Publish { .. } => "publish",
            BotError::ProfileUpdate { .. } => "profile",
            BotError::CorruptState { .. } => "load",
            BotError::StatePersist { .. } => "commit",
        }
    }
}
