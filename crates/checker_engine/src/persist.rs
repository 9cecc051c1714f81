use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use checker_core::TaskHandle;
use checker_logging::{checker_info, checker_warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

pub const TASK_HANDLE_FILENAME: &str = ".checker_task.ron";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state directory missing or not writable: {0}")]
    StateDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode task handle: {0}")]
    Encode(String),
    #[error("failed to decode task handle: {0}")]
    Decode(String),
}

/// Durable single slot holding the task currently in flight.
pub trait TaskHandleStore {
    fn load(&self) -> Result<Option<TaskHandle>, PersistError>;
    /// Overwrites any previously saved handle.
    fn save(&self, handle: &TaskHandle) -> Result<(), PersistError>;
    /// Removing an absent handle is not an error.
    fn clear(&self) -> Result<(), PersistError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedTask {
    task_id: String,
}

/// Stores the handle as a RON file inside a state directory.
#[derive(Debug, Clone)]
pub struct FileTaskHandleStore {
    dir: PathBuf,
}

impl FileTaskHandleStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TASK_HANDLE_FILENAME)
    }
}

impl TaskHandleStore for FileTaskHandleStore {
    fn load(&self) -> Result<Option<TaskHandle>, PersistError> {
        let path = self.path();
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let task: PersistedTask =
            ron::from_str(&content).map_err(|err| PersistError::Decode(err.to_string()))?;
        if task.task_id.is_empty() {
            checker_warn!("Ignoring empty task id persisted at {:?}", path);
            return Ok(None);
        }
        Ok(Some(TaskHandle::new(task.task_id)))
    }

    fn save(&self, handle: &TaskHandle) -> Result<(), PersistError> {
        let task = PersistedTask {
            task_id: handle.id.clone(),
        };
        let content = ron::ser::to_string_pretty(&task, ron::ser::PrettyConfig::new())
            .map_err(|err| PersistError::Encode(err.to_string()))?;
        let target =
            AtomicFileWriter::new(self.dir.clone()).write(TASK_HANDLE_FILENAME, &content)?;
        checker_info!("Persisted task {} to {:?}", handle.id, target);
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistError> {
        match fs::remove_file(self.path()) {
            Ok(()) => {
                checker_info!("Cleared persisted task handle");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory store for sessions that need no durability, and for tests.
#[derive(Debug, Default)]
pub struct MemoryTaskHandleStore {
    slot: Mutex<Option<TaskHandle>>,
}

impl MemoryTaskHandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handle(handle: TaskHandle) -> Self {
        Self {
            slot: Mutex::new(Some(handle)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<TaskHandle>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TaskHandleStore for MemoryTaskHandleStore {
    fn load(&self) -> Result<Option<TaskHandle>, PersistError> {
        Ok(self.lock().clone())
    }

    fn save(&self, handle: &TaskHandle) -> Result<(), PersistError> {
        *self.lock() = Some(handle.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistError> {
        *self.lock() = None;
        Ok(())
    }
}

/// Writes whole files into one directory through a temp file and a rename.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn prepare_dir(&self) -> Result<(), PersistError> {
        fs::create_dir_all(&self.dir).map_err(|err| PersistError::StateDir(err.to_string()))?;
        if !self.dir.is_dir() {
            return Err(PersistError::StateDir(format!("{:?} is not a directory", self.dir)));
        }
        Ok(())
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        self.prepare_dir()?;
        let target = self.dir.join(filename);
        let mut staged = NamedTempFile::new_in(&self.dir)?;
        staged.write_all(content.as_bytes())?;
        staged.as_file().sync_all()?;
        staged
            .persist(&target)
            .map_err(|err| PersistError::Io(err.error))?;
        Ok(target)
    }
}
