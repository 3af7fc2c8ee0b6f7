use thiserror::Error;
use crate::storage::StorageError;

/// Ошибки воркера. Никогда не выходят за границу `Command::execute`.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {code:?}: {stderr}")]
    ToolFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Cannot parse tool output: {0}")]
    Parse(String),

    #[error("Worker '{worker}' cannot execute operation '{operation}'")]
    Unsupported {
        worker: &'static str,
        operation: &'static str,
    },
}

/// Нарушение контракта команды вызывающей стороной.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Command has not finished executing")]
    NotExecuted,

    #[error("Completion was already delivered")]
    AlreadyNotified,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("Thread pool is shut down")]
    ShutDown,

    #[error("Failed to spawn pool thread: {0}")]
    Spawn(String),
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("No worker registered for operation '{0}'")]
    UnknownOperation(String),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
