use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::time::Duration;

use crate::operation::OperationRef;
use crate::types::CommandResult;

/// Одноразовый обработчик завершения. `FnOnce` гарантирует не больше одного вызова.
pub type OnComplete = Box<dyn FnOnce(OperationRef, CommandResult) + Send>;

/// То, что приходит в канал завершения.
#[derive(Debug, Clone)]
pub struct Completion {
    pub operation: OperationRef,
    pub result: CommandResult,
}

/// Передающая половина одноразового канала. Потребляется при отправке.
pub struct CompletionSender {
    tx: SyncSender<Completion>,
}

/// Принимающая половина. Получает ровно одно сообщение, если команда была уведомлена.
pub struct CompletionReceiver {
    rx: Receiver<Completion>,
}

/// Создает одноразовый канал завершения.
///
/// Отправитель превращается в `OnComplete` через [`CompletionSender::into_callback`]
/// и передается в команду; получатель остается у вызывающей стороны.
pub fn channel() -> (CompletionSender, CompletionReceiver) {
    let (tx, rx) = mpsc::sync_channel(1);
    (CompletionSender { tx }, CompletionReceiver { rx })
}

impl CompletionSender {
    pub fn send(self, operation: OperationRef, result: CommandResult) {
        // получатель мог уже уйти, это не ошибка команды
        let _ = self.tx.send(Completion { operation, result });
    }

    pub fn into_callback(self) -> OnComplete {
        Box::new(move |operation, result| self.send(operation, result))
    }
}

impl CompletionReceiver {
    /// Неблокирующая проверка. `None`, пока уведомления не было.
    pub fn try_recv(&self) -> Option<Completion> {
        match self.rx.try_recv() {
            Ok(c) => Some(c),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Completion> {
        match self.rx.recv_timeout(timeout) {
            Ok(c) => Some(c),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}
