//! Error types for wikilangs-core.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Every failure the library surfaces.
///
/// Lookup misses (a token absent from a vocabulary, an unknown n-gram context,
/// an unknown Markov window) are not errors; they are handled by the models
/// themselves.
#[derive(Debug, Error)]
pub enum WikilangsError {
	/// The language code is not part of the published set.
	#[error("Unknown language: {language}")]
	UnknownLanguage { language: String },

	/// The requested configuration does not exist for that language.
	#[error("Unsupported variant for '{language}': {reason}")]
	UnsupportedVariant { language: String, reason: String },

	/// Network or storage failure while resolving an artifact.
	#[error("Artifact unavailable: {message}")]
	ArtifactUnavailable { message: String },

	/// A resolved file does not parse into the expected table.
	#[error("Malformed artifact {}: {message}", path.display())]
	MalformedArtifact { path: PathBuf, message: String },

	/// The subword model rejected an input.
	#[error("Tokenization failed: {0}")]
	Tokenization(String),

	/// A caller supplied value could not be interpreted.
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	#[error("Configuration error: {0}")]
	Config(String),

	/// The model cache holds `key` as another type than the one requested.
	#[error("Model cache holds {key} as another type than {expected}")]
	CacheTypeMismatch { key: String, expected: &'static str },
}

impl WikilangsError {
	pub(crate) fn unavailable(message: impl Into<String>) -> Self {
		Self::ArtifactUnavailable { message: message.into() }
	}

	pub(crate) fn malformed<P: AsRef<Path>>(path: P, message: impl Into<String>) -> Self {
		Self::MalformedArtifact {
			path: path.as_ref().to_path_buf(),
			message: message.into(),
		}
	}

	pub(crate) fn unsupported(language: &str, reason: impl Into<String>) -> Self {
		Self::UnsupportedVariant {
			language: language.to_owned(),
			reason: reason.into(),
		}
	}
}

impl From<reqwest::Error> for WikilangsError {
	fn from(err: reqwest::Error) -> Self {
		Self::unavailable(err.to_string())
	}
}

impl From<std::io::Error> for WikilangsError {
	fn from(err: std::io::Error) -> Self {
		Self::unavailable(format!("Local storage failure: {err}"))
	}
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, WikilangsError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_malformed_display_contains_path() {
		let err = WikilangsError::malformed("/tmp/en_vocabulary.jsonl", "line 3: missing field `rank`");
		let text = err.to_string();
		assert!(text.contains("en_vocabulary.jsonl"));
		assert!(text.contains("missing field"));
	}

	#[test]
	fn test_unsupported_variant_names_language() {
		let err = WikilangsError::unsupported("ary", "gram_size 9 is not published");
		assert!(err.to_string().contains("'ary'"));
		assert!(matches!(err, WikilangsError::UnsupportedVariant { .. }));
	}
}
