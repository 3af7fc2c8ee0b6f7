use std::collections::HashMap;
use crate::worker::Worker;

/// Фабрика воркеров: на каждую команду создается свежий экземпляр.
pub type WorkerFactory = Box<dyn Fn() -> Box<dyn Worker> + Send + Sync>;

/// Реестр воркеров: имя операции -> фабрика
#[derive(Default)]
pub struct WorkerRegistry {
    factories: HashMap<String, WorkerFactory>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Регистрация фабрики. Повторная регистрация заменяет прежнюю.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Worker> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Создает воркер для операции с данным именем.
    pub fn create_worker(&self, name: &str) -> Option<Box<dyn Worker>> {
        self.factories.get(name).map(|f| f())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Отсортированный список имен для справки
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}
