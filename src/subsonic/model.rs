use serde::{Deserialize, Deserializer};

use crate::model::Track;

#[derive(Deserialize, Debug)]
pub struct Envelope {
    #[serde(rename = "subsonic-response")]
    pub response: SubsonicResponse,
}

#[derive(Deserialize, Debug)]
pub struct SubsonicResponse {
    pub status: String,
    #[serde(default)]
    pub error: Option<ApiError>,
    #[serde(default)]
    pub starred2: Option<SongList>,
    /// Most recent plays first.
    #[serde(default)]
    pub scrobbles: Option<SongList>,
}

#[derive(Deserialize, Debug)]
pub struct ApiError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct SongList {
    #[serde(default)]
    pub song: Vec<Song>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    /// OpenSubsonic extension; preferred over `genre` when present.
    #[serde(default)]
    pub genres: Vec<ItemGenre>,
    #[serde(default)]
    pub cover_art: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ItemGenre {
    pub name: String,
}

impl From<Song> for Track {
    fn from(song: Song) -> Self {
        let genres = if song.genres.is_empty() {
            song.genre
                .as_deref()
                .map(split_genre_string)
                .unwrap_or_default()
        } else {
            song.genres
                .into_iter()
                .map(|g| g.name.trim().to_string())
                .filter(|g| !g.is_empty())
                .collect()
        };
        Track {
            id: song.id,
            artist: song
                .artist
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| "Unknown Artist".into()),
            title: song.title,
            album: song.album.unwrap_or_default(),
            genres,
            cover_art: song.cover_art.filter(|c| !c.is_empty()),
        }
    }
}

/// Servers that only know a single genre tag pack several into it, e.g. "Rock/Pop".
fn split_genre_string(raw: &str) -> Vec<String> {
    raw.split(['/', ';'])
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect()
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
