//! Post text composition.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::Track;

pub const MAX_HASHTAGS: usize = 3;

static HASHTAG_STRIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\-]+").expect("static hashtag regex"));

/// `"Progressive Rock"` → `#ProgressiveRock`. `None` if nothing is left.
pub fn hashtag(genre: &str) -> Option<String> {
    let stripped = HASHTAG_STRIP.replace_all(genre, "");
    if stripped.is_empty() {
        None
    } else {
        Some(format!("#{stripped}"))
    }
}

/// First `MAX_HASHTAGS` usable genres, in source order.
pub fn hashtags(genres: &[String]) -> Vec<String> {
    genres
        .iter()
        .filter_map(|g| hashtag(g))
        .take(MAX_HASHTAGS)
        .collect()
}

/// `"{artist} - {title}"`, shared by posts and the profile field.
pub fn track_line(track: &Track) -> String {
    format!("{} - {}", track.artist, track.title)
}

pub fn compose_post(header: &str, track: &Track) -> String {
    let mut text = format!("{}\n{}", header.trim(), track_line(track));
    let tags = hashtags(&track.genres);
    if !tags.is_empty() {
        text.push_str("\n\n");
        text.push_str(&tags.join(" "));
    }
    text
}

/// Alt text for the attached cover.
pub fn media_description(track: &Track) -> String {
    if track.album.trim().is_empty() {
        format!("Cover art for {} by {}", track.title, track.artist)
    } else {
        format!("Cover art of {} by {}", track.album, track.artist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(genres: &[&str]) -> Track {
        Track {
            id: "tr-1".into(),
            artist: "Yes".into(),
            title: "Roundabout".into(),
            album: "Fragile".into(),
            genres: genres.iter().map(|g| g.to_string()).collect(),
            cover_art: None,
        }
    }

    #[test]
    fn hashtag_strips_spaces_and_hyphens() {
        assert_eq!(hashtag("Progressive Rock").as_deref(), Some("#ProgressiveRock"));
        assert_eq!(hashtag("Classic-Rock").as_deref(), Some("#ClassicRock"));
        assert_eq!(hashtag("Hip - Hop").as_deref(), Some("#HipHop"));
        assert_eq!(hashtag(" - "), None);
    }

    #[test]
    fn five_genres_truncate_to_three_in_order() {
        let t = track(&["Progressive Rock", "Classic-Rock", "Art Rock", "Symphonic", "Jazz"]);
        assert_eq!(
            hashtags(&t.genres),
            vec!["#ProgressiveRock", "#ClassicRock", "#ArtRock"]
        );
    }

    #[test]
    fn empty_genres_do_not_use_a_slot() {
        let t = track(&["-", "Rock", "Pop", "Jazz"]);
        assert_eq!(hashtags(&t.genres), vec!["#Rock", "#Pop", "#Jazz"]);
    }

    #[test]
    fn compose_post_layout() {
        let t = track(&["Progressive Rock", "Classic-Rock", "Art Rock", "Symphonic", "Jazz"]);
        assert_eq!(
            compose_post("🎵 New favorite", &t),
            "🎵 New favorite\nYes - Roundabout\n\n#ProgressiveRock #ClassicRock #ArtRock"
        );
    }

    #[test]
    fn compose_post_without_genres_has_no_trailing_blank_line() {
        let t = track(&[]);
        assert_eq!(compose_post("Fav", &t), "Fav\nYes - Roundabout");
    }

    #[test]
    fn media_description_prefers_album() {
        let mut t = track(&[]);
        assert_eq!(media_description(&t), "Cover art of Fragile by Yes");
        t.album.clear();
        assert_eq!(media_description(&t), "Cover art for Roundabout by Yes");
    }
}
