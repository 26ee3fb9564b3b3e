//! catalog-recon
//!
//! Repairs broken product image references in a JSON catalog by matching
//! product names against image files on disk, flags duplicate products and
//! commits the result behind a verified backup.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod matcher;
pub mod pipeline;
pub mod reconciler;
pub mod report;
pub mod resolver;
pub mod scanner;
pub mod transaction;
