use serde::{Serialize, Deserialize};
use std::fmt;
use chrono::{DateTime, Utc};

/// Путь отслеживаемого элемента относительно рабочей директории.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemPath(pub String);

impl ItemPath {
    pub fn new(path: impl Into<String>) -> Self {
        ItemPath(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemPath {
    fn from(s: &str) -> Self {
        ItemPath(s.to_string())
    }
}

/// Последнее известное состояние элемента с точки зрения системы контроля версий.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ItemState {
    #[default]
    Unknown,
    Unchanged,
    Modified,
    Added,
    Removed,
    Missing,
    NotTracked,
    Ignored,
    Conflicted,
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemState::Unknown => "unknown",
            ItemState::Unchanged => "unchanged",
            ItemState::Modified => "modified",
            ItemState::Added => "added",
            ItemState::Removed => "removed",
            ItemState::Missing => "missing",
            ItemState::NotTracked => "not-tracked",
            ItemState::Ignored => "ignored",
            ItemState::Conflicted => "conflicted",
        };
        f.write_str(s)
    }
}

/// Запись таблицы состояний: путь, состояние и момент, когда оно было получено.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    pub path: ItemPath,
    pub state: ItemState,
    pub updated_at: DateTime<Utc>,
}

/// Режим выполнения команды.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    /// Блокирует вызывающий поток до завершения.
    Synchronous,
    /// Выполняется в пуле потоков, результат забирает `Provider::tick`.
    Asynchronous,
}

/// Итог выполнения команды. Частичного успеха на этом уровне нет.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    Succeeded,
    Failed,
}

impl CommandResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandResult::Succeeded)
    }
}

impl From<bool> for CommandResult {
    fn from(success: bool) -> Self {
        if success { CommandResult::Succeeded } else { CommandResult::Failed }
    }
}

/// Как `Provider::states` использует кэш.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateCacheUsage {
    /// Вернуть то, что уже лежит в таблице.
    Use,
    /// Сначала синхронно обновить статус путей.
    ForceUpdate,
}
