use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use super::{check_sequences, stream_of, EventStore, StoreError};
use crate::criteria::Expr;
use crate::event::EventRecord;

/// Configuration for [`JsonFileEventStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonFileConfig {
    pub path: PathBuf,
    /// Indent the file for humans.
    pub pretty: bool,
}

impl Default for JsonFileConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("events.json"),
            pretty: true,
        }
    }
}

/// Writer locks keyed by resolved file path, shared by every store instance
/// in the process.
static FILE_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = Lazy::new(Default::default);

fn file_lock(path: &Path) -> Result<Arc<Mutex<()>>, StoreError> {
    let mut locks = FILE_LOCKS
        .lock()
        .map_err(|_| StoreError::LockPoisoned("file lock registry"))?;
    Ok(Arc::clone(locks.entry(path.to_path_buf()).or_default()))
}

/// An event store keeping the whole log as one JSON array in a single file.
///
/// Every append reads the file, appends and rewrites it through a fresh
/// temporary file in the same directory that is then renamed over the
/// original. Appends to the same file are serialized across all instances in
/// the process. A missing or empty file is an empty log.
pub struct JsonFileEventStore {
    config: JsonFileConfig,
}

impl JsonFileEventStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_config(JsonFileConfig {
            path: path.into(),
            ..JsonFileConfig::default()
        })
    }

    pub fn with_config(config: JsonFileConfig) -> Self {
        Self { config }
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn read_all(&self) -> Result<Vec<EventRecord>, StoreError> {
        let file = match File::open(&self.config.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        if file.metadata()?.len() == 0 {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Creates the parent directory and resolves it, so differently spelled
    /// paths to one file share a lock.
    fn resolved_path(&self) -> Result<PathBuf, StoreError> {
        let path = &self.config.path;
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let parent = fs::canonicalize(parent)?;
        Ok(match path.file_name() {
            Some(name) => parent.join(name),
            None => parent,
        })
    }

    fn write_all(&self, target: &Path, records: &[EventRecord]) -> Result<(), StoreError> {
        let dir = target.parent().unwrap_or(Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;

        {
            let mut writer = BufWriter::new(&mut tmp);
            if self.config.pretty {
                serde_json::to_writer_pretty(&mut writer, records)?;
            } else {
                serde_json::to_writer(&mut writer, records)?;
            }
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;

        tmp.persist(target).map_err(|err| err.error)?;
        Ok(())
    }
}

impl EventStore for JsonFileEventStore {
    fn append(&self, records: &[EventRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let target = self.resolved_path()?;
        let lock = file_lock(&target)?;
        let _guard = lock.lock().map_err(|_| StoreError::LockPoisoned("append"))?;

        let mut stored = self.read_all()?;
        check_sequences(&stored, records)?;
        stored.extend_from_slice(records);
        self.write_all(&target, &stored)?;

        debug!(
            path = %self.config.path.display(),
            count = records.len(),
            total = stored.len(),
            "events appended to file"
        );
        Ok(())
    }

    fn load(&self, aggregate_id: &str) -> Result<Vec<EventRecord>, StoreError> {
        Ok(stream_of(&self.read_all()?, aggregate_id))
    }

    fn query(&self, filter: &Expr) -> Result<Vec<EventRecord>, StoreError> {
        let stored = self.read_all()?;
        Ok(filter.filter(stored.iter()).cloned().collect())
    }
}
