use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use spp_core::StateEntry;
use spp_core::storage::{Result, StateStore, StorageError};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StatesFile {
    version: u32,
    entries: Vec<StateEntry>,
}

/// Хранит снимок таблицы состояний в одном JSON-файле.
pub struct JsonStateStore {
    db_path: PathBuf,
}

impl JsonStateStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn tmp_path(&self) -> PathBuf {
        self.db_path.with_extension("json.tmp")
    }
}

impl StateStore for JsonStateStore {
    /// Отсутствующий файл читается как пустая таблица.
    fn load(&self) -> Result<Vec<StateEntry>> {
        if !self.db_path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.db_path).map_err(StorageError::Io)?;
        let reader = BufReader::new(file);
        let data: StatesFile = serde_json::from_reader(reader).map_err(StorageError::Serde)?;
        debug!(path = ?self.db_path, version = data.version, count = data.entries.len(), "states loaded");
        Ok(data.entries)
    }

    /// Пишет во временный файл и переименовывает его поверх основного.
    fn save(&mut self, entries: &[StateEntry]) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent).map_err(StorageError::Io)?;
        }

        let tmp = self.tmp_path();
        {
            let file = File::create(&tmp).map_err(StorageError::Io)?;
            let mut writer = BufWriter::new(file);
            let data = StatesFile {
                version: FORMAT_VERSION,
                entries: entries.to_vec(),
            };
            serde_json::to_writer_pretty(&mut writer, &data).map_err(StorageError::Serde)?;
            writer.flush().map_err(StorageError::Io)?;
        }
        fs::rename(&tmp, &self.db_path).map_err(StorageError::Io)?;
        Ok(())
    }
}
