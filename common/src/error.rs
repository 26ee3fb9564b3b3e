//! Keyword table errors. Errors from a table file carry its path.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot read keyword table {}: {source}", .path.display())]
    KeywordTableRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("keyword table {} is not a {{\"keyword\": [\"Category\"]}} object: {source}", .path.display())]
    KeywordTableParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Inline JSON that did not come from a file
    #[error("keyword table JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("keyword table has no usable keywords")]
    EmptyKeywordTable,
}

pub type Result<T> = std::result::Result<T, Error>;
