use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::thread;

/// Настройки из `.spp/config.json`. Отсутствующие поля берутся по умолчанию.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Размер пула потоков для `--async`.
    pub threads: usize,
    /// Период опроса завершенных команд, в миллисекундах.
    pub tick_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            tick_ms: 50,
        }
    }
}

impl Config {
    /// Читает конфиг. Нет файла - настройки по умолчанию.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Не удалось прочитать {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Некорректный конфиг {}", path.display()))
    }

    /// Флаги командной строки перекрывают файл.
    pub fn apply_overrides(&mut self, threads: Option<usize>, tick_ms: Option<u64>) {
        if let Some(t) = threads {
            self.threads = t;
        }
        if let Some(ms) = tick_ms {
            self.tick_ms = ms;
        }
    }
}
