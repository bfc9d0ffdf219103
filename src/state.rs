//! Durable record of which favorites have already been posted.
//!
//! The store is the only authority on "already handled": a track id present
//! here is never published again, and a track id absent from it is picked up
//! by the next poll cycle. Committing is the only mutation.
use crate::error::BotError;
use crate::model::PublishedEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

const STATE_VERSION: u32 = 1;

/// Set of published track ids with a commit-then-persist contract.
pub trait StateStore: Send {
    fn contains(&self, id: &str) -> bool;

    /// Record `id` as published. Returns `false` (and writes nothing) if the
    /// id was already present. The update is durable once this returns `Ok`.
    fn commit(&mut self, id: &str, entry: PublishedEntry) -> Result<bool, BotError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Serialize)]
struct StateDocumentRef<'a> {
    version: u32,
    posted: &'a BTreeMap<String, PublishedEntry>,
}

#[derive(Deserialize)]
struct StateDocument {
    version: u32,
    posted: BTreeMap<String, PublishedEntry>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StateFile {
    Keyed(StateDocument),
    /// Hand-written seed: a bare array of track ids.
    Flat(Vec<String>),
}

/// JSON file backed store. Every commit rewrites the whole file through a
/// temp file in the same directory followed by a rename, so readers only
/// ever see a complete document.
#[derive(Debug)]
pub struct JsonStateStore {
    path: PathBuf,
    posted: BTreeMap<String, PublishedEntry>,
}

impl JsonStateStore {
    /// Read the state file. A missing file yields an empty store; anything
    /// unreadable or unparsable is `CorruptState`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, BotError> {
        let path = path.into();
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no state file yet; starting empty");
                return Ok(Self {
                    path,
                    posted: BTreeMap::new(),
                });
            }
            Err(err) => {
                return Err(BotError::CorruptState {
                    path,
                    detail: format!("unreadable: {err}"),
                })
            }
        };

        let posted = parse_state(&content).map_err(|detail| BotError::CorruptState {
            path: path.clone(),
            detail,
        })?;
        info!(path = %path.display(), count = posted.len(), "loaded state file");
        Ok(Self { path, posted })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry(&self, id: &str) -> Option<&PublishedEntry> {
        self.posted.get(id)
    }

    /// In-memory copy of the current contents, detached from the file.
    pub fn snapshot(&self) -> MemoryStateStore {
        MemoryStateStore {
            posted: self.posted.clone(),
        }
    }

    fn persist(&self, posted: &BTreeMap<String, PublishedEntry>) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let doc = StateDocumentRef {
            version: STATE_VERSION,
            posted,
        };
        let mut body = serde_json::to_vec_pretty(&doc)?;
        body.push(b'\n');

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&body)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        sync_dir(dir)?;
        debug!(path = %self.path.display(), count = posted.len(), "state file written");
        Ok(())
    }
}

impl StateStore for JsonStateStore {
    fn contains(&self, id: &str) -> bool {
        self.posted.contains_key(id)
    }

    fn commit(&mut self, id: &str, entry: PublishedEntry) -> Result<bool, BotError> {
        if self.posted.contains_key(id) {
            warn!(track_id = id, "track already committed; ignoring");
            return Ok(false);
        }
        let mut next = self.posted.clone();
        next.insert(id.to_string(), entry);
        self.persist(&next).map_err(|source| BotError::StatePersist {
            path: self.path.clone(),
            source,
        })?;
        self.posted = next;
        Ok(true)
    }

    fn len(&self) -> usize {
        self.posted.len()
    }
}

fn parse_state(content: &[u8]) -> Result<BTreeMap<String, PublishedEntry>, String> {
    let file: StateFile = serde_json::from_slice(content).map_err(|e| e.to_string())?;
    match file {
        StateFile::Keyed(doc) if doc.version == STATE_VERSION => Ok(doc.posted),
        StateFile::Keyed(doc) => Err(format!("unsupported state version {}", doc.version)),
        StateFile::Flat(ids) => Ok(ids
            .into_iter()
            .map(|id| (id, PublishedEntry::seeded()))
            .collect()),
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

/// Volatile store with the same contract, for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStateStore {
    posted: BTreeMap<String, PublishedEntry>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            posted: ids
                .into_iter()
                .map(|id| (id.into(), PublishedEntry::seeded()))
                .collect(),
        }
    }

    pub fn entry(&self, id: &str) -> Option<&PublishedEntry> {
        self.posted.get(id)
    }
}

impl StateStore for MemoryStateStore {
    fn contains(&self, id: &str) -> bool {
        self.posted.contains_key(id)
    }

    fn commit(&mut self, id: &str, entry: PublishedEntry) -> Result<bool, BotError> {
        if self.posted.contains_key(id) {
            return Ok(false);
        }
        self.posted.insert(id.to_string(), entry);
        Ok(true)
    }

    fn len(&self) -> usize {
        self.posted.len()
    }
}
