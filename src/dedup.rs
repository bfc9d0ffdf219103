use std::collections::HashSet;

use crate::model::Track;
use crate::state::StateStore;

/// Tracks from `fetched` not yet in `store`, in fetch order. When the server
/// lists an id twice only the first occurrence is kept.
pub fn select_new<S>(fetched: Vec<Track>, store: &S) -> Vec<Track>
where
    S: StateStore + ?Sized,
{
    let mut seen = HashSet::new();
    fetched
        .into_iter()
        .filter(|track| !store.contains(&track.id))
        .filter(|track| seen.insert(track.id.clone()))
        .collect()
}
