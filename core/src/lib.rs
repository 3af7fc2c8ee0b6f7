// core/src/lib.rs
pub mod types;
pub mod error;
pub mod storage;
pub mod operation;
pub mod state_table;
pub mod worker;
pub mod registry;
pub mod completion;
pub mod command;
pub mod pool;
pub mod provider;

pub use types::*;
pub use error::{WorkerError, CommandError, PoolError, ProviderError};
pub use operation::{Operation, OperationRef};
pub use state_table::StateTable;
pub use worker::Worker;
pub use registry::{WorkerRegistry, WorkerFactory};
pub use command::Command;
pub use pool::{ThreadPool, PoolConfig, QueuedWork};
pub use provider::{Provider, Submission, TickReport};
