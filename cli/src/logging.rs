use tracing_subscriber::{fmt, EnvFilter};

/// Переменная окружения с фильтром логов (синтаксис `EnvFilter`).
pub const LOG_ENV: &str = "SPP_LOG";

/// Логи идут в stderr, чтобы не смешиваться с выводом команд.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    // повторная инициализация (например, в тестах) не ошибка
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
