//! kb-core - Core types and traits for the hybrid knowledge base
//!
//! This crate provides the foundational types, text normalization, traits,
//! configuration and error handling shared by the loader, the query engine
//! and the ingestion tooling.

pub mod config;
pub mod error;
pub mod synonyms;
pub mod text;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{KbError, Result};
pub use synonyms::SynonymTable;
pub use text::{normalize, tokenize};
pub use traits::*;
pub use types::*;
