use std::collections::HashMap;
use chrono::Utc;

use crate::types::{ItemPath, ItemState, StateEntry};

/// Кэш состояний отслеживаемых путей.
///
/// Таблицей владеет `Provider`, и меняется она только через `&mut`, то есть
/// из одного потока. Воркеры считают новые состояния у себя и сливают их сюда
/// в `Worker::update_states`.
#[derive(Debug, Default)]
pub struct StateTable {
    entries: HashMap<ItemPath, StateEntry>,
}

impl StateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = StateEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.path.clone(), e)).collect(),
        }
    }

    /// Записывает состояние пути.
    ///
    /// # Returns
    ///
    /// `true`, если состояние реально поменялось (или путь появился впервые).
    pub fn merge(&mut self, path: ItemPath, state: ItemState) -> bool {
        let now = Utc::now();
        match self.entries.get_mut(&path) {
            Some(entry) => {
                entry.updated_at = now;
                if entry.state == state {
                    false
                } else {
                    entry.state = state;
                    true
                }
            }
            None => {
                self.entries.insert(path.clone(), StateEntry { path, state, updated_at: now });
                true
            }
        }
    }

    /// Сливает пачку обновлений, возвращает `true`, если изменилось хоть что-то.
    pub fn merge_all(&mut self, updates: impl IntoIterator<Item = (ItemPath, ItemState)>) -> bool {
        // без short-circuit: каждое обновление должно попасть в таблицу
        updates
            .into_iter()
            .fold(false, |changed, (path, state)| self.merge(path, state) | changed)
    }

    pub fn get(&self, path: &ItemPath) -> Option<&StateEntry> {
        self.entries.get(path)
    }

    /// Состояние пути или `Unknown`, если путь еще не встречался.
    pub fn state_of(&self, path: &ItemPath) -> ItemState {
        self.entries.get(path).map(|e| e.state).unwrap_or_default()
    }

    /// Все известные пути, в произвольном порядке.
    pub fn paths(&self) -> Vec<ItemPath> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Снимок таблицы, отсортированный по пути.
    pub fn snapshot(&self) -> Vec<StateEntry> {
        let mut entries: Vec<StateEntry> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_reports_changes_only() {
        let mut table = StateTable::new();
        assert!(table.merge("a.txt".into(), ItemState::Modified));
        assert!(!table.merge("a.txt".into(), ItemState::Modified));
        assert!(table.merge("a.txt".into(), ItemState::Unchanged));
        assert_eq!(table.state_of(&"a.txt".into()), ItemState::Unchanged);
    }

    #[test]
    fn test_merge_all_applies_every_update() {
        let mut table = StateTable::new();
        table.merge("a.txt".into(), ItemState::Added);

        let changed = table.merge_all(vec![
            (ItemPath::from("a.txt"), ItemState::Added),
            (ItemPath::from("b.txt"), ItemState::Conflicted),
        ]);

        assert!(changed);
        assert_eq!(table.len(), 2);
        assert_eq!(table.state_of(&"b.txt".into()), ItemState::Conflicted);
    }

    #[test]
    fn test_unknown_for_unseen_path() {
        let table = StateTable::new();
        assert_eq!(table.state_of(&"nope".into()), ItemState::Unknown);
        assert!(table.get(&"nope".into()).is_none());
    }

    #[test]
    fn test_snapshot_sorted_and_roundtrips() {
        let mut table = StateTable::new();
        table.merge("z".into(), ItemState::Missing);
        table.merge("a".into(), ItemState::Ignored);

        let snap = table.snapshot();
        assert_eq!(snap[0].path.as_str(), "a");
        assert_eq!(snap[1].path.as_str(), "z");

        let restored = StateTable::from_entries(snap);
        assert_eq!(restored.state_of(&"z".into()), ItemState::Missing);
    }
}
