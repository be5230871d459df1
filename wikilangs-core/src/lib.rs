//! Access layer for pre-trained per-language NLP artifacts.
//!
//! This crate resolves versioned artifacts published one repository per
//! language, caches them locally and exposes:
//! - Vocabulary tables (frequency, IDF, rank)
//! - N-gram scoring and next-token prediction with backoff
//! - Reproducible Markov-chain text generation
//! - A subword tokenizer adapter with an explicit unknown-token policy
//!
//! `Wikilangs` is the entry point; everything it builds is immutable and can
//! be shared between threads.

/// Error taxonomy and `Result` alias.
pub mod error;

/// Runtime configuration (defaults, TOML file, environment).
pub mod config;

/// Artifact resolution: catalog, remote stores and the download cache.
pub mod hub;

/// Models built from artifacts.
pub mod model;

/// Published language listing.
pub mod languages;

/// Process-scoped cache of loaded models.
pub mod model_cache;

/// Typed factory per model kind.
pub mod factory;

/// I/O utilities (file loading, atomic writes, snapshots).
///
/// Not exposed
pub(crate) mod io;

pub use config::Config;
pub use error::{Result, WikilangsError};
pub use factory::Wikilangs;
pub use hub::{ArtifactKey, ArtifactVariant, DateSpec, TokenUnit, TokenizerFormat};
pub use languages::LanguageInfo;
pub use model_cache::ModelCache;
