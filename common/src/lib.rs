//! Catalog Recon Common Library
//!
//! Pure building blocks shared by the reconciliation engine: catalog and
//! decision types, name normalization and the keyword → category table.
//! Only `KeywordTable::from_file` touches the filesystem; its errors name
//! the table file.

pub mod types;
pub mod normalizer;
pub mod keywords;
pub mod error;

pub use types::{
    CatalogEntry, DecisionStatus, EntryId, EntryOrigin, ImageDescriptor, MatchDecision,
    MatchTier,
};
pub use normalizer::{normalize, tokenize, tokens_related, DEFAULT_MIN_TOKEN_LEN};
pub use keywords::{KeywordRule, KeywordTable};
pub use error::{Error, Result};
