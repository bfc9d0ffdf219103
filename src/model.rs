use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A favorited track as reported by the media server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub artist: String,
    pub title: String,
    pub album: String,
    pub genres: Vec<String>,
    pub cover_art: Option<String>,
}

/// Cover art downloaded from the media server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl Artwork {
    pub fn file_name(&self) -> &'static str {
        match self.content_type.as_str() {
            "image/png" => "cover.png",
            "image/gif" => "cover.gif",
            "image/webp" => "cover.webp",
            _ => "cover.jpg",
        }
    }
}

/// Bookkeeping kept next to each published track id in the state file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishedEntry {
    pub posted_at: DateTime<Utc>,
    /// `None` when the id was seeded without posting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
}

impl PublishedEntry {
    pub fn posted(post_id: impl Into<String>) -> Self {
        Self {
            posted_at: Utc::now(),
            post_id: Some(post_id.into()),
        }
    }

    pub fn seeded() -> Self {
        Self {
            posted_at: Utc::now(),
            post_id: None,
        }
    }
}
