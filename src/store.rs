//! Persistence backends for normalized records, selected by a `SaveOption`.
//! Every backend appends; re-running a crawl adds rows rather than replacing them.

use crate::mapping::{CommentRow, ContactRecord, CreatorRecord, DynamicRecord, VideoRecord};
use crate::util::init_tracing_once;
use ahash::AHashMap;
use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Video,
    Creator,
    Comment,
    Contact,
    Dynamic,
}

impl EntityKind {
    /// Stable name used for file names.
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Video => "videos",
            EntityKind::Creator => "creators",
            EntityKind::Comment => "comments",
            EntityKind::Contact => "contacts",
            EntityKind::Dynamic => "dynamics",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EntityRecord {
    Video(VideoRecord),
    Creator(CreatorRecord),
    Comment(CommentRow),
    Contact(ContactRecord),
    Dynamic(DynamicRecord),
}

impl EntityRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRecord::Video(_) => EntityKind::Video,
            EntityRecord::Creator(_) => EntityKind::Creator,
            EntityRecord::Comment(_) => EntityKind::Comment,
            EntityRecord::Contact(_) => EntityKind::Contact,
            EntityRecord::Dynamic(_) => EntityKind::Dynamic,
        }
    }
}

pub trait Store: Send + Sync {
    fn accept_and_persist(&self, rec: &EntityRecord) -> Result<()>;
    fn flush(&self) -> Result<()>;
}

/// Backend choice, parsed from configuration text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOption {
    Json,
    Csv,
    Memory,
}

impl FromStr for SaveOption {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" | "jsonl" => Ok(SaveOption::Json),
            "csv" => Ok(SaveOption::Csv),
            "memory" => Ok(SaveOption::Memory),
            other => Err(anyhow!("invalid save option `{other}`; supported: csv, json, memory")),
        }
    }
}

pub fn create_store(option: SaveOption, dir: &Path) -> Result<Box<dyn Store>> {
    init_tracing_once();
    Ok(match option {
        SaveOption::Json => Box::new(JsonStore::new(dir)?),
        SaveOption::Csv => Box::new(CsvStore::new(dir)?),
        SaveOption::Memory => Box::new(MemoryStore::default()),
    })
}

fn open_append(path: &Path) -> Result<(File, bool)> {
    let fresh = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    tracing::debug!(path = %path.display(), fresh, "opening store file");
    let f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {} for append", path.display()))?;
    Ok((f, fresh))
}

// ----------------------------- JSON lines ------------------------------------

/// One `<kind>.jsonl` file per entity kind under `dir`.
pub struct JsonStore {
    dir: PathBuf,
    writers: Mutex<AHashMap<EntityKind, BufWriter<File>>>,
}

impl JsonStore {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        Ok(Self { dir: dir.to_path_buf(), writers: Mutex::new(AHashMap::new()) })
    }

    pub fn path_for(&self, kind: EntityKind) -> PathBuf {
        self.dir.join(format!("{}.jsonl", kind.name()))
    }
}

impl Store for JsonStore {
    fn accept_and_persist(&self, rec: &EntityRecord) -> Result<()> {
        let kind = rec.kind();
        let mut writers = self.writers.lock();
        let w = match writers.entry(kind) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                let (f, _) = open_append(&self.path_for(kind))?;
                e.insert(BufWriter::new(f))
            }
        };
        serde_json::to_writer(&mut *w, rec)?;
        w.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        for w in self.writers.lock().values_mut() {
            w.flush()?;
        }
        Ok(())
    }
}

// ----------------------------- CSV -------------------------------------------

/// One `<kind>.csv` file per entity kind; the header row is written only
/// when the file starts out empty.
pub struct CsvStore {
    dir: PathBuf,
    writers: Mutex<AHashMap<EntityKind, csv::Writer<File>>>,
}

impl CsvStore {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        Ok(Self { dir: dir.to_path_buf(), writers: Mutex::new(AHashMap::new()) })
    }

    pub fn path_for(&self, kind: EntityKind) -> PathBuf {
        self.dir.join(format!("{}.csv", kind.name()))
    }
}

impl Store for CsvStore {
    fn accept_and_persist(&self, rec: &EntityRecord) -> Result<()> {
        let kind = rec.kind();
        let mut writers = self.writers.lock();
        let w = match writers.entry(kind) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                let path = self.path_for(kind);
                let (f, fresh) = open_append(&path)?;
                e.insert(csv::WriterBuilder::new().has_headers(fresh).from_writer(f))
            }
        };
        w.serialize(rec).with_context(|| format!("write {} row", kind.name()))?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        for w in self.writers.lock().values_mut() {
            w.flush()?;
        }
        Ok(())
    }
}

// ----------------------------- memory ----------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<EntityRecord>>,
}

impl MemoryStore {
    pub fn records(&self) -> Vec<EntityRecord> {
        self.records.lock().clone()
    }

    pub fn of_kind(&self, kind: EntityKind) -> Vec<EntityRecord> {
        self.records.lock().iter().filter(|r| r.kind() == kind).cloned().collect()
    }
}

impl Store for MemoryStore {
    fn accept_and_persist(&self, rec: &EntityRecord) -> Result<()> {
        self.records.lock().push(rec.clone());
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
