use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AquaError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(aquavoice::io))]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    #[diagnostic(code(aquavoice::config))]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(aquavoice::serde))]
    Serde(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    #[diagnostic(code(aquavoice::db))]
    Db(#[from] sea_orm::DbErr),

    #[error("Validation failed: {0}")]
    #[diagnostic(code(aquavoice::validation))]
    Validation(String),

    #[error("Authentication failed: {0}")]
    #[diagnostic(code(aquavoice::auth))]
    Auth(String),

    #[error("Not found: {0}")]
    #[diagnostic(code(aquavoice::not_found))]
    NotFound(String),

    #[error("Forbidden: {0}")]
    #[diagnostic(code(aquavoice::forbidden))]
    Forbidden(String),

    #[error("{0}")]
    #[diagnostic(code(aquavoice::other))]
    Other(String),
}
