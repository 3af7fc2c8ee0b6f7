use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::completion::OnComplete;
use crate::error::CommandError;
use crate::operation::OperationRef;
use crate::pool::QueuedWork;
use crate::state_table::StateTable;
use crate::types::{CommandResult, Concurrency};
use crate::worker::Worker;

const NOT_STARTED: u8 = 0;
const EXECUTING: u8 = 1;
const FINISHED: u8 = 2;

/// Сообщение, которое получает брошенная пулом команда.
pub const ABANDONED_MESSAGE: &str = "abandoned";

/// Одна операция, связанная с одним воркером.
///
/// Команда выполняется ровно один раз: синхронно через [`Command::execute`] или
/// в пуле через [`QueuedWork::do_threaded_work`]. Результат и обновление
/// состояний доступны только после того, как [`Command::has_executed`] вернул `true`.
pub struct Command {
    operation: OperationRef,
    worker: Mutex<Box<dyn Worker>>,
    concurrency: Concurrency,

    // NOT_STARTED -> EXECUTING -> FINISHED, назад не возвращается
    executed: AtomicU8,
    succeeded: AtomicBool,
    error: Mutex<Option<String>>,

    on_complete: Mutex<Option<OnComplete>>,
    notified: AtomicBool,
}

impl Command {
    pub fn new(operation: OperationRef, worker: Box<dyn Worker>, concurrency: Concurrency) -> Self {
        Self {
            operation,
            worker: Mutex::new(worker),
            concurrency,
            executed: AtomicU8::new(NOT_STARTED),
            succeeded: AtomicBool::new(false),
            error: Mutex::new(None),
            on_complete: Mutex::new(None),
            notified: AtomicBool::new(false),
        }
    }

    /// То же, что [`Command::new`], но с обработчиком завершения.
    pub fn with_completion(
        operation: OperationRef,
        worker: Box<dyn Worker>,
        concurrency: Concurrency,
        on_complete: OnComplete,
    ) -> Self {
        let cmd = Self::new(operation, worker, concurrency);
        *cmd.on_complete.lock() = Some(on_complete);
        cmd
    }

    /// Выполняет воркер на текущем потоке.
    ///
    /// Ошибки и паники воркера превращаются в `false` и дальше не уходят.
    /// Повторный вызов воркер не запускает и возвращает уже сохраненный исход.
    pub fn execute(&self) -> bool {
        if let Err(current) = self.executed.compare_exchange(
            NOT_STARTED,
            EXECUTING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            warn!(operation = self.operation.name(), "command executed more than once");
            return current == FINISHED && self.succeeded.load(Ordering::Acquire);
        }

        debug!(operation = self.operation.name(), concurrency = ?self.concurrency, "executing command");

        let outcome = {
            let mut worker = self.worker.lock();
            panic::catch_unwind(AssertUnwindSafe(|| worker.execute(&self.operation)))
        };

        let success = match outcome {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(operation = self.operation.name(), error = %e, "operation failed");
                *self.error.lock() = Some(e.to_string());
                false
            }
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                error!(operation = self.operation.name(), panic = %msg, "worker panicked");
                *self.error.lock() = Some(format!("worker panicked: {}", msg));
                false
            }
        };

        self.finish(success);
        debug!(operation = self.operation.name(), success, "command finished");
        success
    }

    /// `true`, когда выполнение (или отказ от него) завершено. Безблокировочное чтение.
    pub fn has_executed(&self) -> bool {
        self.executed.load(Ordering::Acquire) == FINISHED
    }

    /// Сливает состояния воркера в таблицу.
    ///
    /// # Errors
    ///
    /// `CommandError::NotExecuted`, если команда еще не завершилась.
    pub fn update_states(&self, states: &mut StateTable) -> Result<bool, CommandError> {
        self.ensure_executed()?;
        let mut worker = self.worker.lock();
        match panic::catch_unwind(AssertUnwindSafe(|| worker.update_states(states))) {
            Ok(changed) => Ok(changed),
            Err(payload) => {
                error!(operation = self.operation.name(), panic = %panic_message(payload.as_ref()), "worker panicked while updating states");
                Ok(false)
            }
        }
    }

    pub fn result(&self) -> Result<CommandResult, CommandError> {
        self.ensure_executed()?;
        Ok(CommandResult::from(self.succeeded.load(Ordering::Acquire)))
    }

    /// Текст ошибки неудачного выполнения, если она была.
    pub fn error_message(&self) -> Result<Option<String>, CommandError> {
        self.ensure_executed()?;
        Ok(self.error.lock().clone())
    }

    /// Вызывает обработчик завершения с операцией и результатом.
    ///
    /// Без обработчика ничего не делает, но второй вызов все равно считается ошибкой.
    /// Паника обработчика перехватывается: уведомление считается доставленным.
    pub fn notify_operation_complete(&self) -> Result<(), CommandError> {
        let result = self.result()?;
        if self.notified.swap(true, Ordering::AcqRel) {
            return Err(CommandError::AlreadyNotified);
        }

        let callback = self.on_complete.lock().take();
        if let Some(callback) = callback {
            let operation = Arc::clone(&self.operation);
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || callback(operation, result))) {
                error!(operation = self.operation.name(), panic = %panic_message(payload.as_ref()), "completion callback panicked");
            }
        }
        Ok(())
    }

    pub fn operation(&self) -> &OperationRef {
        &self.operation
    }

    pub fn concurrency(&self) -> Concurrency {
        self.concurrency
    }

    fn ensure_executed(&self) -> Result<(), CommandError> {
        if self.has_executed() {
            Ok(())
        } else {
            Err(CommandError::NotExecuted)
        }
    }

    fn finish(&self, success: bool) {
        self.succeeded.store(success, Ordering::Release);
        self.executed.store(FINISHED, Ordering::Release);
    }
}

impl QueuedWork for Command {
    fn do_threaded_work(&self) {
        // состояния и уведомление забирает поток-владелец таблицы в Provider::tick
        self.execute();
    }

    fn abandon(&self) {
        match self.executed.compare_exchange(
            NOT_STARTED,
            EXECUTING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                debug!(operation = self.operation.name(), "command abandoned");
                *self.error.lock() = Some(ABANDONED_MESSAGE.to_string());
                self.finish(false);
            }
            Err(_) => {
                debug!(operation = self.operation.name(), "abandon ignored, command already started");
            }
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("operation", &self.operation)
            .field("concurrency", &self.concurrency)
            .field("executed", &self.executed.load(Ordering::Relaxed))
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
