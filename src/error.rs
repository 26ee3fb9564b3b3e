use thiserror::Error;

/// Fatal errors. Anything that only affects one entry or one image directory
/// is recorded in the report instead of being returned here.
#[derive(Error, Debug)]
pub enum ReconError {
    #[error("config error: {0}")]
    Config(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("cannot read catalog {path}: {source}")]
    CatalogRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog {path} is not a valid product list: {reason}")]
    CatalogParse { path: String, reason: String },

    #[error("backup of {path} failed: {source}")]
    Backup {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("backup {backup} does not match {path}")]
    BackupVerification { path: String, backup: String },

    #[error("writing catalog {path} failed ({source}); recover it from {backup}")]
    CatalogWrite {
        path: String,
        backup: String,
        #[source]
        source: std::io::Error,
    },

    #[error("writing report {path} failed: {source}")]
    ReportWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid placeholder pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("JSON error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] catalog_recon_common::Error),
}

pub type Result<T> = std::result::Result<T, ReconError>;
