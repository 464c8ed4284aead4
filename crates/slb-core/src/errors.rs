/// Core error type for the shopping list bot.
///
/// Logical rejections (clearing a mirrored list, redeeming an unknown code, ...)
/// are ordinary replies and never surface here. Adapter crates map their
/// transport errors into `External`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
