use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::time::Duration;
use tokio::{signal, time};
use tracing::debug;

use spp_core::completion;
use spp_core::{
    Concurrency, ItemPath, ItemState, Operation, OperationRef, PoolConfig, Provider, Submission,
    WorkerRegistry,
};

use backend_git::register_git_workers;
use storage_file::JsonStateStore;

mod config;
mod logging;

use config::Config;

const SPP_DIR: &str = ".spp";

#[derive(Parser)]
#[command(name = "spp")]
#[command(about = "Source control command dispatcher over git", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Выполнить через пул потоков и дождаться результата опросом
    #[arg(long = "async", global = true)]
    run_async: bool,

    #[arg(long, global = true)]
    threads: Option<usize>,

    #[arg(long, global = true)]
    tick_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Проверить, что git доступен и текущая директория - рабочая копия
    Connect,
    /// Обновить состояния путей (без путей - всего репозитория)
    Status {
        paths: Vec<String>,
    },
    Add {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    Commit {
        #[arg(short, long)]
        message: String,
        paths: Vec<String>,
    },
    Revert {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    Rm {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    Sync,
    Branch {
        name: String,
        #[arg(long)]
        create: bool,
    },
    /// Показать закэшированные состояния, ничего не запуская
    States,
    /// Перечислить операции, для которых зарегистрированы воркеры
    Operations,
}

fn to_paths(raw: Vec<String>) -> Vec<ItemPath> {
    raw.into_iter().map(ItemPath).collect()
}

fn to_operation(command: Commands) -> Option<Operation> {
    let op = match command {
        Commands::Connect => Operation::Connect,
        Commands::Status { paths } => Operation::UpdateStatus { paths: to_paths(paths) },
        Commands::Add { paths } => Operation::MarkForAdd { paths: to_paths(paths) },
        Commands::Commit { message, paths } => Operation::CheckIn { message, paths: to_paths(paths) },
        Commands::Revert { paths } => Operation::Revert { paths: to_paths(paths) },
        Commands::Rm { paths } => Operation::Delete { paths: to_paths(paths) },
        Commands::Sync => Operation::Sync { paths: Vec::new() },
        Commands::Branch { name, create } => Operation::Branch { name, create },
        Commands::States | Commands::Operations => return None,
    };
    Some(op)
}

// служебные файлы самого spp в выводе не нужны
fn is_internal(path: &ItemPath) -> bool {
    let p = path.as_str();
    p == SPP_DIR || p.starts_with(".spp/")
}

fn print_entries(entries: impl IntoIterator<Item = (ItemPath, ItemState)>) {
    for (path, state) in entries {
        if !is_internal(&path) {
            println!("{:<12} {}", state.to_string(), path);
        }
    }
}

fn print_result(provider: &Provider, operation: &Operation) {
    match operation {
        Operation::Connect => println!("Подключено"),
        Operation::CheckIn { .. } => println!("Коммит создан"),
        _ => {
            let paths = operation.paths();
            if paths.is_empty() {
                let snapshot = provider.state_table().snapshot();
                print_entries(snapshot.into_iter().map(|e| (e.path, e.state)));
            } else {
                print_entries(paths.iter().map(|p| (p.clone(), provider.state(p))));
            }
        }
    }
}

/// Крутит `tick`, пока не завершатся все асинхронные команды.
///
/// Ctrl-C пытается отменить операцию, если ее еще не забрал поток пула.
async fn drive_until_idle(provider: &mut Provider, operation: &OperationRef, tick: Duration) -> Result<()> {
    let mut interval = time::interval(tick);
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut cancel_requested = false;

    while !provider.is_idle() {
        tokio::select! {
            _ = interval.tick() => {
                let report = provider.tick();
                if report.completed > 0 {
                    debug!(completed = report.completed, states_changed = report.states_changed, "polled");
                }
            }
            res = &mut ctrl_c, if !cancel_requested => {
                res.context("Не удалось подписаться на Ctrl-C")?;
                cancel_requested = true;
                if provider.cancel_operation(operation) {
                    eprintln!("Операция отменена");
                } else {
                    eprintln!("Операция уже выполняется, ждем завершения");
                }
            }
        }
    }
    Ok(())
}

fn build_provider(workdir: &Path, config: &Config) -> Result<Provider> {
    let mut registry = WorkerRegistry::new();
    register_git_workers(&mut registry, workdir);

    let pool_config = PoolConfig {
        num_threads: config.threads,
        ..PoolConfig::default()
    };
    let store = JsonStateStore::new(workdir.join(SPP_DIR).join("states.json"));

    let provider = Provider::new(registry, pool_config)
        .context("Не удалось запустить пул потоков")?
        .with_store(Box::new(store))
        .context("Не удалось прочитать таблицу состояний")?;
    Ok(provider)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    logging::init();

    let cli = Cli::parse();
    let current_dir = std::env::current_dir()?;

    let mut config = Config::load(&current_dir.join(SPP_DIR).join("config.json"))?;
    config.apply_overrides(cli.threads, cli.tick_ms);
    debug!(?config, "configuration");

    let concurrency = if cli.run_async {
        Concurrency::Asynchronous
    } else {
        Concurrency::Synchronous
    };

    let mut provider = build_provider(&current_dir, &config)?;

    if matches!(cli.command, Commands::Operations) {
        for name in provider.registry().names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let Some(operation) = to_operation(cli.command) else {
        let snapshot = provider.state_table().snapshot();
        if snapshot.is_empty() {
            println!("Таблица состояний пуста");
        }
        print_entries(snapshot.into_iter().map(|e| (e.path, e.state)));
        return Ok(());
    };
    let operation = operation.into_ref();

    let (tx, rx) = completion::channel();
    let submission = provider
        .execute(operation.clone(), concurrency, Some(tx.into_callback()))
        .with_context(|| format!("Не удалось запустить операцию {}", operation.name()))?;

    if submission == Submission::Queued {
        drive_until_idle(&mut provider, &operation, Duration::from_millis(config.tick_ms.max(1))).await?;
    }

    let done = rx
        .try_recv()
        .ok_or_else(|| anyhow::anyhow!("Операция {} не завершилась", operation.name()))?;

    provider.save_states().context("Не удалось сохранить таблицу состояний")?;

    if !done.result.is_success() {
        anyhow::bail!("Операция {} завершилась с ошибкой", operation.name());
    }

    print_result(&provider, &operation);
    Ok(())
}
