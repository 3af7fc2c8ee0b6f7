use std::sync::Arc;
use tracing::{debug, error, info};

use crate::command::Command;
use crate::completion::OnComplete;
use crate::error::{CommandError, ProviderError};
use crate::operation::{Operation, OperationRef};
use crate::pool::{PoolConfig, QueuedWork, ThreadPool};
use crate::registry::WorkerRegistry;
use crate::state_table::StateTable;
use crate::storage::StateStore;
use crate::types::{CommandResult, Concurrency, ItemPath, ItemState, StateCacheUsage};
use crate::worker::Worker;

/// Что стало с отправленной операцией.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Синхронная операция выполнена, состояния слиты, уведомление отправлено.
    Completed(CommandResult),
    /// Асинхронная операция в очереди, итог придет через `tick`.
    Queued,
}

/// Итог одного `tick`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Сколько команд завершено и уведомлено.
    pub completed: usize,
    /// Поменялось ли что-то в таблице состояний.
    pub states_changed: bool,
}

/// Диспетчер команд.
///
/// Владеет пулом, реестром воркеров и таблицей состояний. Все методы с `&mut self`
/// выполняются на потоке-владельце, и это единственное место, где таблица
/// меняется: воркеры считают результат на потоках пула, а слияние и
/// уведомления происходят здесь, в `execute` (синхронный режим) или в `tick`.
pub struct Provider {
    pool: ThreadPool,
    registry: WorkerRegistry,
    states: StateTable,
    store: Option<Box<dyn StateStore>>,
    // в порядке отправки
    in_flight: Vec<Arc<Command>>,
}

impl Provider {
    pub fn new(registry: WorkerRegistry, pool_config: PoolConfig) -> Result<Self, ProviderError> {
        let pool = ThreadPool::new(pool_config)?;
        Ok(Self {
            pool,
            registry,
            states: StateTable::new(),
            store: None,
            in_flight: Vec::new(),
        })
    }

    /// Подключает хранилище снимков и сразу загружает из него таблицу.
    pub fn with_store(mut self, store: Box<dyn StateStore>) -> Result<Self, ProviderError> {
        self.store = Some(store);
        self.load_states()?;
        Ok(self)
    }

    pub fn register_worker<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn Worker> + Send + Sync + 'static,
    {
        self.registry.register(name, factory);
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    /// Отправляет операцию на выполнение.
    ///
    /// # Arguments
    ///
    /// * `operation` - Операция. Та же ссылка вернется в уведомлении.
    /// * `concurrency` - Синхронно на текущем потоке или через пул.
    /// * `on_complete` - Необязательный обработчик, вызывается ровно один раз.
    ///
    /// # Errors
    ///
    /// * `UnknownOperation`, если для операции нет воркера. Обработчик при этом не вызывается.
    /// * `Pool`, если пул уже остановлен. Команда к этому моменту уже уведомлена с `Failed`.
    pub fn execute(
        &mut self,
        operation: OperationRef,
        concurrency: Concurrency,
        on_complete: Option<OnComplete>,
    ) -> Result<Submission, ProviderError> {
        let worker = self
            .registry
            .create_worker(operation.name())
            .ok_or_else(|| ProviderError::UnknownOperation(operation.name().to_string()))?;

        let command = match on_complete {
            Some(callback) => Command::with_completion(Arc::clone(&operation), worker, concurrency, callback),
            None => Command::new(Arc::clone(&operation), worker, concurrency),
        };

        match concurrency {
            Concurrency::Synchronous => {
                command.execute();
                let result = self.finish_command(&command)?;
                Ok(Submission::Completed(result))
            }
            Concurrency::Asynchronous => {
                let command = Arc::new(command);
                let work: Arc<dyn QueuedWork> = command.clone();
                if let Err(e) = self.pool.add_queued_work(work) {
                    // пул уже бросил команду, уведомление все равно положено
                    self.finish_command(&command)?;
                    return Err(e.into());
                }
                debug!(operation = operation.name(), "command queued");
                self.in_flight.push(command);
                Ok(Submission::Queued)
            }
        }
    }

    /// Забирает завершенные асинхронные команды: сливает их состояния и уведомляет.
    ///
    /// Вызывается периодически с потока-владельца.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        // завершенные вынимаются по одной, остальные все время остаются в списке
        let mut i = 0;
        while i < self.in_flight.len() {
            if !self.in_flight[i].has_executed() {
                i += 1;
                continue;
            }
            let command = self.in_flight.remove(i);

            let changed = match command.update_states(&mut self.states) {
                Ok(changed) => changed,
                Err(e) => {
                    error!(operation = command.operation().name(), error = %e, "state update failed");
                    false
                }
            };
            report.states_changed |= changed;

            if let Err(e) = command.notify_operation_complete() {
                error!(operation = command.operation().name(), error = %e, "completion not delivered");
            }
            report.completed += 1;
        }

        if report.completed > 0 {
            debug!(completed = report.completed, states_changed = report.states_changed, "tick");
        }
        report
    }

    /// Можно ли еще отменить операцию: она в очереди и ни один поток ее не забрал.
    ///
    /// Одна и та же операция может быть отправлена несколько раз, годится любая
    /// копия, которая еще ждет в очереди.
    pub fn can_cancel_operation(&self, operation: &OperationRef) -> bool {
        self.in_flight_for(operation).any(|work| self.pool.is_queued(&work))
    }

    /// Отменяет первую еще не начатую копию операции.
    ///
    /// Команда бросается и на следующем `tick` уведомляется с `Failed`.
    pub fn cancel_operation(&mut self, operation: &OperationRef) -> bool {
        for work in self.in_flight_for(operation) {
            if self.pool.retract_queued_work(&work) {
                work.abandon();
                info!(operation = operation.name(), "operation cancelled");
                return true;
            }
        }
        false
    }

    /// Закэшированное состояние пути.
    pub fn state(&self, path: &ItemPath) -> ItemState {
        self.states.state_of(path)
    }

    /// Состояния путей, при `ForceUpdate` предварительно обновленные синхронно.
    pub fn states(
        &mut self,
        paths: &[ItemPath],
        usage: StateCacheUsage,
    ) -> Result<Vec<(ItemPath, ItemState)>, ProviderError> {
        if usage == StateCacheUsage::ForceUpdate {
            let op = Operation::UpdateStatus { paths: paths.to_vec() }.into_ref();
            self.execute(op, Concurrency::Synchronous, None)?;
        }
        Ok(paths.iter().map(|p| (p.clone(), self.states.state_of(p))).collect())
    }

    pub fn state_table(&self) -> &StateTable {
        &self.states
    }

    /// Число отправленных, но еще не уведомленных асинхронных команд.
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Перечитывает таблицу из хранилища. Без хранилища ничего не делает.
    pub fn load_states(&mut self) -> Result<(), ProviderError> {
        if let Some(store) = &self.store {
            let entries = store.load()?;
            debug!(count = entries.len(), "state table loaded");
            self.states = StateTable::from_entries(entries);
        }
        Ok(())
    }

    pub fn save_states(&mut self) -> Result<(), ProviderError> {
        if let Some(store) = self.store.as_mut() {
            let snapshot = self.states.snapshot();
            store.save(&snapshot)?;
            debug!(count = snapshot.len(), "state table saved");
        }
        Ok(())
    }

    /// Останавливает пул и уведомляет все оставшиеся команды.
    ///
    /// Брошенные из очереди команды получают `Failed`.
    pub fn shutdown(&mut self) -> TickReport {
        self.pool.shutdown();
        self.tick()
    }

    fn finish_command(&mut self, command: &Command) -> Result<CommandResult, CommandError> {
        command.update_states(&mut self.states)?;
        command.notify_operation_complete()?;
        command.result()
    }

    fn in_flight_for<'a>(&'a self, operation: &'a OperationRef) -> impl Iterator<Item = Arc<dyn QueuedWork>> + 'a {
        self.in_flight
            .iter()
            .filter(move |c| Arc::ptr_eq(c.operation(), operation))
            .map(|c| Arc::clone(c) as Arc<dyn QueuedWork>)
    }
}

impl Drop for Provider {
    fn drop(&mut self) {
        if !self.in_flight.is_empty() {
            self.shutdown();
        }
    }
}
