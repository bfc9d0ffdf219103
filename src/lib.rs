//! Mirrors newly starred Navidrome tracks to Mastodon, at most once per track.

pub mod config;
pub mod dedup;
pub mod error;
pub mod format;
pub mod mastodon;
pub mod model;
pub mod profile;
pub mod publisher;
pub mod scheduler;
pub mod state;
pub mod subsonic;

pub use error::BotError;
