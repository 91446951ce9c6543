use thiserror::Error;

/// All errors that can occur in nbcite-core.
#[derive(Debug, Error)]
pub enum NbciteError {
    #[error("Malformed notebook: {0}")]
    MalformedNotebook(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Normalization failed: {0}")]
    Normalize(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Process exit codes used by the CLI.
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    InvalidArgs = 1,
    GeneralError = 2,
}

pub type Result<T> = std::result::Result<T, NbciteError>;
