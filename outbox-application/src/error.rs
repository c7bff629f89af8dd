use outbox_domain::error::OutboxError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("outbox: {0}")]
    Outbox(#[from] OutboxError),

    #[error("config: {key}: {reason}")]
    Config { key: String, reason: String },

    #[error("lifecycle: {0}")]
    Lifecycle(String),
}

impl AppError {
    pub fn config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
