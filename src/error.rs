#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Catalog API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Storage error ({bucket}): {message}")]
    Storage { bucket: String, message: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Http(_) => "http",
            AppError::Json(_) => "json",
            AppError::Audio(_) => "audio",
            AppError::Decode(_) => "decode",
            AppError::Api { .. } => "api",
            AppError::Storage { .. } => "storage",
            AppError::Config(_) => "config",
            AppError::NotFound(_) => "not_found",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Io(_) => "io",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
