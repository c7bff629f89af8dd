pub mod config;
pub mod error;
pub mod runtime;
pub mod telemetry;

pub use config::EventProperties;
pub use error::{AppError, AppResult};
pub use runtime::EventingRuntime;
