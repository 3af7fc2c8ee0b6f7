use std::path::{Path, PathBuf};
use std::process::Command;

use spp_core::WorkerError;
use tracing::debug;

/// Обертка над утилитой CLI `git`, запускаемой в рабочей директории.
///
/// Пути в операциях считаются относительными к корню репозитория, поэтому
/// `workdir` должен указывать именно на него.
#[derive(Debug, Clone)]
pub struct GitRepo {
    workdir: PathBuf,
    program: String,
}

impl GitRepo {
    /// Создает новый экземпляр адаптера к Git-репозиторию.
    ///
    /// # Arguments
    ///
    /// * `workdir` - Путь к рабочей директории проекта.
    pub fn new(workdir: impl AsRef<Path>) -> Self {
        GitRepo {
            workdir: workdir.as_ref().to_path_buf(),
            program: "git".to_string(),
        }
    }

    /// Подменяет исполняемый файл (по умолчанию `git`).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Запускает `git` с аргументами и возвращает `stdout` как очищенную строку.
    ///
    /// # Errors
    ///
    /// * `WorkerError::Spawn`, если процесс не удалось запустить.
    /// * `WorkerError::ToolFailed` при ненулевом коде возврата (с текстом stderr).
    pub fn run_git_command(&self, args: &[&str]) -> Result<String, WorkerError> {
        let stdout = self.run_git_raw(args)?;
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }

    /// То же, что `run_git_command`, но без обработки вывода (нужно для `-z`).
    pub fn run_git_raw(&self, args: &[&str]) -> Result<Vec<u8>, WorkerError> {
        debug!(program = %self.program, ?args, "running tool");

        let output = Command::new(&self.program)
            .current_dir(&self.workdir)
            .args(args)
            .output()
            .map_err(|source| WorkerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(WorkerError::ToolFailed {
                command: format!("{} {}", self.program, args.join(" ")),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}
