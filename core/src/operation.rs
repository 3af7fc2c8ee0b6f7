use std::sync::Arc;
use crate::types::ItemPath;

/// Разделяемая ссылка на операцию. Операции сравниваются по идентичности `Arc`.
pub type OperationRef = Arc<Operation>;

/// Запрос на одно действие системы контроля версий.
///
/// После отправки операция не меняется: ею владеют одновременно вызывающая
/// сторона и команда, и она же возвращается в уведомлении о завершении.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Проверка, что инструмент доступен и директория под контролем версий.
    Connect,
    UpdateStatus {
        paths: Vec<ItemPath>,
    },
    MarkForAdd {
        paths: Vec<ItemPath>,
    },
    CheckIn {
        message: String,
        paths: Vec<ItemPath>,
    },
    Revert {
        paths: Vec<ItemPath>,
    },
    Delete {
        paths: Vec<ItemPath>,
    },
    /// Подтянуть изменения из удаленного репозитория.
    Sync {
        paths: Vec<ItemPath>,
    },
    Branch {
        name: String,
        create: bool,
    },
}

impl Operation {
    /// Имя, по которому реестр находит фабрику воркера.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Connect => "connect",
            Operation::UpdateStatus { .. } => "update_status",
            Operation::MarkForAdd { .. } => "mark_for_add",
            Operation::CheckIn { .. } => "check_in",
            Operation::Revert { .. } => "revert",
            Operation::Delete { .. } => "delete",
            Operation::Sync { .. } => "sync",
            Operation::Branch { .. } => "branch",
        }
    }

    /// Пути, которых касается операция. Пусто для `Connect` и `Branch`.
    pub fn paths(&self) -> &[ItemPath] {
        match self {
            Operation::UpdateStatus { paths }
            | Operation::MarkForAdd { paths }
            | Operation::CheckIn { paths, .. }
            | Operation::Revert { paths }
            | Operation::Delete { paths }
            | Operation::Sync { paths } => paths,
            Operation::Connect | Operation::Branch { .. } => &[],
        }
    }

    pub fn into_ref(self) -> OperationRef {
        Arc::new(self)
    }
}
