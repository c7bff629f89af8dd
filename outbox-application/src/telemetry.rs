use crate::error::{AppError, AppResult};
use tracing_subscriber::EnvFilter;

/// 初始化日志输出；`RUST_LOG` 优先，否则使用 `default_filter`
pub fn init_tracing(default_filter: &str) -> AppResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| AppError::config("RUST_LOG", e.to_string()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| AppError::Lifecycle(format!("tracing already initialised: {e}")))
}
