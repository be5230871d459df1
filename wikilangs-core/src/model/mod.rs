//! In-memory models built from resolved artifacts.
//!
//! This module provides:
//! - The vocabulary table (`Vocabulary`)
//! - N-gram scoring and next-token prediction with backoff (`NGramModel`)
//! - Seeded Markov-chain generation (`MarkovChain`)
//! - The subword tokenizer adapter (`BpeTokenizer`)

/// Frequency, IDF and rank per token.
pub mod vocabulary;

/// Fixed-order n-gram tables (`n >= 2`) with lower orders derived by
/// marginalisation.
///
/// Scores text and predicts next tokens, backing off to shorter contexts
/// with a fixed discount.
pub mod ngram_model;

/// Markov transition tables and the random walk generating text from them.
pub mod markov_chain;

/// A single Markov state (window of tokens).
///
/// Tracks weighted outgoing transitions and supports weighted random
/// sampling.
pub mod state;

/// Generation parameters: length, seed context, random seed and the
/// unknown-window policy.
pub mod generation_input;

/// Subword tokenizer adapter.
pub mod tokenizer;

/// Text to token splitting used by n-gram scoring.
pub mod segmenter;

/// Shared artifact parsing: metadata sidecars and the parallel row loader.
pub mod table;

pub use generation_input::{Fallback, GenerationInput};
pub use markov_chain::{MarkovChain, MarkovTable};
pub use ngram_model::{NGramModel, NGramTable};
pub use segmenter::{Segmenter, WhitespaceSegmenter};
pub use table::ArtifactMetadata;
pub use tokenizer::BpeTokenizer;
pub use vocabulary::{Vocabulary, VocabularyEntry};
