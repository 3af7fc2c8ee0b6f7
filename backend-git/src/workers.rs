use std::collections::HashSet;
use std::path::Path;

use spp_core::{ItemPath, ItemState, Operation, StateTable, Worker, WorkerError, WorkerRegistry};
use tracing::info;

use crate::git_repo::GitRepo;
use crate::status::query_status;

/// Регистрирует git-воркеры для всех видов операций.
///
/// # Arguments
///
/// * `registry` - Реестр, в который добавляются фабрики.
/// * `workdir` - Корень рабочей директории репозитория.
pub fn register_git_workers(registry: &mut WorkerRegistry, workdir: impl AsRef<Path>) {
    let repo = GitRepo::new(workdir);
    register_with_repo(registry, repo);
}

/// То же, что `register_git_workers`, но с готовым адаптером (например, с другим `git`).
pub fn register_with_repo(registry: &mut WorkerRegistry, repo: GitRepo) {
    let r = repo.clone();
    registry.register("connect", move || Box::new(ConnectWorker::new(r.clone())));
    let r = repo.clone();
    registry.register("update_status", move || Box::new(StatusWorker::new(r.clone())));
    let r = repo.clone();
    registry.register("mark_for_add", move || Box::new(AddWorker::new(r.clone())));
    let r = repo.clone();
    registry.register("check_in", move || Box::new(CommitWorker::new(r.clone())));
    let r = repo.clone();
    registry.register("revert", move || Box::new(RevertWorker::new(r.clone())));
    let r = repo.clone();
    registry.register("delete", move || Box::new(DeleteWorker::new(r.clone())));
    let r = repo.clone();
    registry.register("sync", move || Box::new(SyncWorker::new(r.clone())));
    registry.register("branch", move || Box::new(BranchWorker::new(repo.clone())));
}

/// Состояния, собранные после вызова git.
///
/// При полном обновлении (статус всего репозитория) пути из таблицы, о которых
/// git промолчал, считаются `Unchanged`.
#[derive(Debug, Default)]
struct Refresh {
    found: Vec<(ItemPath, ItemState)>,
    full: bool,
}

impl Refresh {
    fn collect(&mut self, repo: &GitRepo, paths: &[ItemPath]) -> Result<(), WorkerError> {
        self.found = query_status(repo, paths)?;
        self.full = paths.is_empty();
        Ok(())
    }

    fn apply(&mut self, states: &mut StateTable) -> bool {
        let mut changed = false;
        if self.full {
            let seen: HashSet<&ItemPath> = self.found.iter().map(|(p, _)| p).collect();
            let stale: Vec<ItemPath> = states
                .paths()
                .into_iter()
                .filter(|p| !seen.contains(p))
                .collect();
            changed |= states.merge_all(stale.into_iter().map(|p| (p, ItemState::Unchanged)));
        }
        changed |= states.merge_all(self.found.drain(..));
        self.full = false;
        changed
    }
}

fn unsupported(worker: &'static str, operation: &Operation) -> WorkerError {
    WorkerError::Unsupported { worker, operation: operation.name() }
}

fn with_paths<'a>(base: &[&'a str], paths: &'a [ItemPath]) -> Vec<&'a str> {
    let mut args: Vec<&str> = base.to_vec();
    args.push("--");
    args.extend(paths.iter().map(|p| p.as_str()));
    args
}

/// Проверка, что `git` доступен и директория является рабочей копией.
pub struct ConnectWorker {
    repo: GitRepo,
}

impl ConnectWorker {
    pub fn new(repo: GitRepo) -> Self {
        Self { repo }
    }
}

impl Worker for ConnectWorker {
    fn name(&self) -> &'static str {
        "connect"
    }

    fn execute(&mut self, operation: &Operation) -> Result<(), WorkerError> {
        if !matches!(operation, Operation::Connect) {
            return Err(unsupported(self.name(), operation));
        }
        let inside = self.repo.run_git_command(&["rev-parse", "--is-inside-work-tree"])?;
        if inside != "true" {
            return Err(WorkerError::Parse(format!("not a work tree: {}", inside)));
        }
        let version = self.repo.run_git_command(&["--version"])?;
        info!(%version, workdir = ?self.repo.workdir(), "connected");
        Ok(())
    }

    fn update_states(&mut self, _states: &mut StateTable) -> bool {
        false
    }
}

pub struct StatusWorker {
    repo: GitRepo,
    refresh: Refresh,
}

impl StatusWorker {
    pub fn new(repo: GitRepo) -> Self {
        Self { repo, refresh: Refresh::default() }
    }
}

impl Worker for StatusWorker {
    fn name(&self) -> &'static str {
        "update_status"
    }

    fn execute(&mut self, operation: &Operation) -> Result<(), WorkerError> {
        let Operation::UpdateStatus { paths } = operation else {
            return Err(unsupported(self.name(), operation));
        };
        self.refresh.collect(&self.repo, paths)
    }

    fn update_states(&mut self, states: &mut StateTable) -> bool {
        self.refresh.apply(states)
    }
}

pub struct AddWorker {
    repo: GitRepo,
    refresh: Refresh,
}

impl AddWorker {
    pub fn new(repo: GitRepo) -> Self {
        Self { repo, refresh: Refresh::default() }
    }
}

impl Worker for AddWorker {
    fn name(&self) -> &'static str {
        "mark_for_add"
    }

    fn execute(&mut self, operation: &Operation) -> Result<(), WorkerError> {
        let Operation::MarkForAdd { paths } = operation else {
            return Err(unsupported(self.name(), operation));
        };
        if paths.is_empty() {
            return Ok(());
        }
        self.repo.run_git_command(&with_paths(&["add"], paths))?;
        self.refresh.collect(&self.repo, paths)
    }

    fn update_states(&mut self, states: &mut StateTable) -> bool {
        self.refresh.apply(states)
    }
}

pub struct CommitWorker {
    repo: GitRepo,
    refresh: Refresh,
}

impl CommitWorker {
    pub fn new(repo: GitRepo) -> Self {
        Self { repo, refresh: Refresh::default() }
    }
}

impl Worker for CommitWorker {
    fn name(&self) -> &'static str {
        "check_in"
    }

    fn execute(&mut self, operation: &Operation) -> Result<(), WorkerError> {
        let Operation::CheckIn { message, paths } = operation else {
            return Err(unsupported(self.name(), operation));
        };

        // без путей коммитится то, что уже лежит в индексе
        if paths.is_empty() {
            self.repo.run_git_command(&["commit", "-q", "-m", message.as_str()])?;
        } else {
            self.repo.run_git_command(&with_paths(&["commit", "-q", "-m", message.as_str()], paths))?;
        }
        self.refresh.collect(&self.repo, paths)
    }

    fn update_states(&mut self, states: &mut StateTable) -> bool {
        self.refresh.apply(states)
    }
}

pub struct RevertWorker {
    repo: GitRepo,
    refresh: Refresh,
}

impl RevertWorker {
    pub fn new(repo: GitRepo) -> Self {
        Self { repo, refresh: Refresh::default() }
    }

    fn in_head(&self, path: &ItemPath) -> bool {
        let spec = format!("HEAD:{}", path.as_str());
        self.repo.run_git_command(&["cat-file", "-e", spec.as_str()]).is_ok()
    }
}

impl Worker for RevertWorker {
    fn name(&self) -> &'static str {
        "revert"
    }

    fn execute(&mut self, operation: &Operation) -> Result<(), WorkerError> {
        let Operation::Revert { paths } = operation else {
            return Err(unsupported(self.name(), operation));
        };
        if paths.is_empty() {
            return Ok(());
        }

        // новые файлы только убираются из индекса, содержимое остается на диске
        let (committed, added): (Vec<ItemPath>, Vec<ItemPath>) =
            paths.iter().cloned().partition(|p| self.in_head(p));

        if !added.is_empty() {
            self.repo.run_git_command(&with_paths(&["rm", "-q", "-r", "--cached"], &added))?;
        }
        if !committed.is_empty() {
            self.repo.run_git_command(&with_paths(
                &["restore", "--source=HEAD", "--staged", "--worktree"],
                &committed,
            ))?;
        }
        self.refresh.collect(&self.repo, paths)
    }

    fn update_states(&mut self, states: &mut StateTable) -> bool {
        self.refresh.apply(states)
    }
}

pub struct DeleteWorker {
    repo: GitRepo,
    refresh: Refresh,
}

impl DeleteWorker {
    pub fn new(repo: GitRepo) -> Self {
        Self { repo, refresh: Refresh::default() }
    }
}

impl Worker for DeleteWorker {
    fn name(&self) -> &'static str {
        "delete"
    }

    fn execute(&mut self, operation: &Operation) -> Result<(), WorkerError> {
        let Operation::Delete { paths } = operation else {
            return Err(unsupported(self.name(), operation));
        };
        if paths.is_empty() {
            return Ok(());
        }
        self.repo.run_git_command(&with_paths(&["rm", "-q"], paths))?;
        self.refresh.collect(&self.repo, paths)
    }

    fn update_states(&mut self, states: &mut StateTable) -> bool {
        self.refresh.apply(states)
    }
}

/// Подтягивает изменения из upstream текущей ветки (только fast-forward).
pub struct SyncWorker {
    repo: GitRepo,
    refresh: Refresh,
}

impl SyncWorker {
    pub fn new(repo: GitRepo) -> Self {
        Self { repo, refresh: Refresh::default() }
    }
}

impl Worker for SyncWorker {
    fn name(&self) -> &'static str {
        "sync"
    }

    fn execute(&mut self, operation: &Operation) -> Result<(), WorkerError> {
        let Operation::Sync { paths } = operation else {
            return Err(unsupported(self.name(), operation));
        };
        self.repo.run_git_command(&["pull", "--ff-only", "-q"])?;
        self.refresh.collect(&self.repo, paths)
    }

    fn update_states(&mut self, states: &mut StateTable) -> bool {
        self.refresh.apply(states)
    }
}

pub struct BranchWorker {
    repo: GitRepo,
    refresh: Refresh,
}

impl BranchWorker {
    pub fn new(repo: GitRepo) -> Self {
        Self { repo, refresh: Refresh::default() }
    }
}

impl Worker for BranchWorker {
    fn name(&self) -> &'static str {
        "branch"
    }

    fn execute(&mut self, operation: &Operation) -> Result<(), WorkerError> {
        let Operation::Branch { name, create } = operation else {
            return Err(unsupported(self.name(), operation));
        };
        if *create {
            self.repo.run_git_command(&["switch", "-q", "-c", name.as_str()])?;
        } else {
            self.repo.run_git_command(&["switch", "-q", name.as_str()])?;
        }
        // после переключения ветки устаревает весь кэш
        self.refresh.collect(&self.repo, &[])
    }

    fn update_states(&mut self, states: &mut StateTable) -> bool {
        self.refresh.apply(states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_refresh_resets_unreported_paths() {
        let mut table = StateTable::new();
        table.merge("old.txt".into(), ItemState::Modified);

        let mut refresh = Refresh {
            found: vec![(ItemPath::from("new.txt"), ItemState::NotTracked)],
            full: true,
        };

        assert!(refresh.apply(&mut table));
        assert_eq!(table.state_of(&"old.txt".into()), ItemState::Unchanged);
        assert_eq!(table.state_of(&"new.txt".into()), ItemState::NotTracked);
        assert!(!refresh.apply(&mut table));
    }

    #[test]
    fn test_partial_refresh_leaves_other_paths() {
        let mut table = StateTable::new();
        table.merge("old.txt".into(), ItemState::Modified);

        let mut refresh = Refresh {
            found: vec![(ItemPath::from("a.txt"), ItemState::Added)],
            full: false,
        };

        refresh.apply(&mut table);
        assert_eq!(table.state_of(&"old.txt".into()), ItemState::Modified);
    }

    #[test]
    fn test_worker_rejects_foreign_operation() {
        let mut worker = AddWorker::new(GitRepo::new("."));
        let err = worker.execute(&Operation::Connect).unwrap_err();
        assert!(matches!(err, WorkerError::Unsupported { worker: "mark_for_add", operation: "connect" }));
    }

    #[test]
    fn test_missing_tool_is_spawn_error() {
        let repo = GitRepo::new(".").with_program("definitely-not-a-real-git-binary");
        let mut worker = StatusWorker::new(repo);
        let err = worker.execute(&Operation::UpdateStatus { paths: vec![] }).unwrap_err();
        assert!(matches!(err, WorkerError::Spawn { .. }));
    }

    #[test]
    fn test_registers_every_operation() {
        let mut registry = WorkerRegistry::new();
        register_git_workers(&mut registry, ".");

        for name in ["connect", "update_status", "mark_for_add", "check_in", "revert", "delete", "sync", "branch"] {
            let worker = registry.create_worker(name).expect("worker registered");
            assert_eq!(worker.name(), name);
        }
    }
}
