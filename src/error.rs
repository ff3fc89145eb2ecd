use thiserror::Error;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sheets API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is missing")]
    Missing(&'static str),

    #[error("{name} is invalid: {message}")]
    Invalid { name: &'static str, message: String },
}
