use crate::error::WorkerError;
use crate::operation::Operation;
use crate::state_table::StateTable;

/// Исполнитель одного вида операций.
///
/// `execute` вызывается на потоке пула (или на вызывающем потоке в синхронном
/// режиме) и может блокироваться на время работы внешнего инструмента.
/// Результаты копятся внутри воркера и сливаются в таблицу только в
/// `update_states`, который всегда вызывается из потока-владельца таблицы.
pub trait Worker: Send {
    /// Имя операции, которую обслуживает воркер.
    fn name(&self) -> &'static str;

    fn execute(&mut self, operation: &Operation) -> Result<(), WorkerError>;

    /// Сливает накопленные состояния в таблицу.
    ///
    /// # Returns
    ///
    /// `true`, если в таблице что-то поменялось.
    fn update_states(&mut self, states: &mut StateTable) -> bool;
}
