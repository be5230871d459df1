use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WikilangsError};

/// Tokenizer vocabulary sizes published per language.
pub const SUPPORTED_VOCAB_SIZES: [u32; 4] = [8000, 16000, 32000, 64000];

/// N-gram orders published per language.
pub const SUPPORTED_GRAM_SIZES: std::ops::RangeInclusive<usize> = 2..=5;

/// Markov window depths published per language.
pub const SUPPORTED_DEPTHS: std::ops::RangeInclusive<usize> = 1..=5;

/// Sentinel accepted wherever a snapshot date is expected.
pub const LATEST: &str = "latest";

/// Table encodings, preferred first.
const TABLE_EXTENSIONS: [&str; 2] = ["parquet", "jsonl"];

/// Granularity of the tokens a table was built from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUnit {
	/// Whitespace separated words.
	#[default]
	Word,
	/// Pieces produced by the language's subword tokenizer.
	Subword,
}

impl TokenUnit {
	pub fn as_str(&self) -> &'static str {
		match self {
			TokenUnit::Word => "word",
			TokenUnit::Subword => "subword",
		}
	}
}

impl fmt::Display for TokenUnit {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for TokenUnit {
	type Err = WikilangsError;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_ascii_lowercase().as_str() {
			"word" => Ok(TokenUnit::Word),
			"subword" => Ok(TokenUnit::Subword),
			other => Err(WikilangsError::InvalidArgument(format!(
				"unit must be 'word' or 'subword', got '{other}'"
			))),
		}
	}
}

/// Flavour of the tokenizer adapter.
///
/// Both flavours load the same serialized model; they differ in whether the
/// model's post-processor may add special tokens while encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerFormat {
	/// Raw pieces, no special tokens added.
	#[default]
	SentencePiece,
	/// Special tokens added by the model's post-processor.
	HuggingFace,
}

impl TokenizerFormat {
	pub fn as_str(&self) -> &'static str {
		match self {
			TokenizerFormat::SentencePiece => "sentencepiece",
			TokenizerFormat::HuggingFace => "huggingface",
		}
	}
}

impl fmt::Display for TokenizerFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for TokenizerFormat {
	type Err = WikilangsError;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_ascii_lowercase().as_str() {
			"sentencepiece" => Ok(TokenizerFormat::SentencePiece),
			"huggingface" => Ok(TokenizerFormat::HuggingFace),
			other => Err(WikilangsError::InvalidArgument(format!(
				"format must be 'sentencepiece' or 'huggingface', got '{other}'"
			))),
		}
	}
}

/// Requested snapshot date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum DateSpec {
	/// Newest snapshot published for the language.
	#[default]
	Latest,
	/// Explicit `YYYYMMDD` snapshot.
	Exact(String),
}

impl FromStr for DateSpec {
	type Err = WikilangsError;

	fn from_str(s: &str) -> Result<Self> {
		let s = s.trim();
		if s.is_empty() || s.eq_ignore_ascii_case(LATEST) {
			Ok(DateSpec::Latest)
		} else if is_valid_date(s) {
			Ok(DateSpec::Exact(s.to_owned()))
		} else {
			Err(WikilangsError::InvalidArgument(format!(
				"date must be YYYYMMDD or '{LATEST}', got '{s}'"
			)))
		}
	}
}

impl fmt::Display for DateSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DateSpec::Latest => f.write_str(LATEST),
			DateSpec::Exact(date) => f.write_str(date),
		}
	}
}

/// `YYYYMMDD` with a plausible month and day.
///
/// For strings accepted here lexicographic order equals chronological order.
pub fn is_valid_date(s: &str) -> bool {
	if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
		return false;
	}
	let month: u32 = s[4..6].parse().unwrap_or(0);
	let day: u32 = s[6..8].parse().unwrap_or(0);
	(1..=12).contains(&month) && (1..=31).contains(&day)
}

/// Model kind and its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactVariant {
	Tokenizer { vocab_size: u32, format: TokenizerFormat },
	NGram { gram_size: usize, unit: TokenUnit },
	Markov { depth: usize, unit: TokenUnit },
	Vocabulary,
}

/// Relative locations of one artifact inside a dated snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFiles {
	pub data: String,
	pub metadata: Option<String>,
}

impl ArtifactVariant {
	/// Checks the parameters against the published sets.
	pub fn validate(&self, language: &str) -> Result<()> {
		match *self {
			ArtifactVariant::Tokenizer { vocab_size, .. } if !SUPPORTED_VOCAB_SIZES.contains(&vocab_size) => {
				Err(WikilangsError::unsupported(
					language,
					format!("vocab_size {vocab_size} is not published (supported: {SUPPORTED_VOCAB_SIZES:?})"),
				))
			}
			ArtifactVariant::NGram { gram_size, .. } if !SUPPORTED_GRAM_SIZES.contains(&gram_size) => {
				Err(WikilangsError::unsupported(
					language,
					format!("gram_size {gram_size} is not published (supported: {SUPPORTED_GRAM_SIZES:?})"),
				))
			}
			ArtifactVariant::Markov { depth, .. } if !SUPPORTED_DEPTHS.contains(&depth) => {
				Err(WikilangsError::unsupported(
					language,
					format!("depth {depth} is not published (supported: {SUPPORTED_DEPTHS:?})"),
				))
			}
			_ => Ok(()),
		}
	}

	/// Candidate file sets, in preference order.
	///
	/// Tables are published as `.parquet`, with `.jsonl` accepted next to it.
	/// Subword tables are looked up in their own folder first and then in the
	/// word folder, where older snapshots published them. Tokenizers must be
	/// exported as `tokenizer.json`.
	pub fn candidates(&self, language: &str) -> Vec<ArtifactFiles> {
		match *self {
			ArtifactVariant::Tokenizer { vocab_size, .. } => vec![ArtifactFiles {
				data: format!("models/tokenizer/{language}_tokenizer_{}k.json", vocab_size / 1000),
				metadata: None,
			}],
			ArtifactVariant::NGram { gram_size, unit } => {
				let stem = format!("{language}_{gram_size}gram_{unit}");
				table_candidates("ngram", unit, &stem)
			}
			ArtifactVariant::Markov { depth, unit } => {
				let stem = format!("{language}_markov_ctx{depth}_{unit}");
				table_candidates("markov", unit, &stem)
			}
			ArtifactVariant::Vocabulary => table_files("vocabulary", &format!("{language}_vocabulary")),
		}
	}
}

fn table_candidates(kind: &str, unit: TokenUnit, stem: &str) -> Vec<ArtifactFiles> {
	let mut folders = vec![format!("{unit}_{kind}")];
	if unit != TokenUnit::Word {
		folders.push(format!("{}_{kind}", TokenUnit::Word));
	}
	folders.iter().flat_map(|folder| table_files(folder, stem)).collect()
}

/// Data files of one table in `folder`, sharing one metadata sidecar.
fn table_files(folder: &str, stem: &str) -> Vec<ArtifactFiles> {
	TABLE_EXTENSIONS
		.iter()
		.map(|extension| ArtifactFiles {
			data: format!("models/{folder}/{stem}.{extension}"),
			metadata: Some(format!("models/{folder}/{stem}_metadata.json")),
		})
		.collect()
}

impl fmt::Display for ArtifactVariant {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ArtifactVariant::Tokenizer { vocab_size, format } => write!(f, "tokenizer({vocab_size}, {format})"),
			ArtifactVariant::NGram { gram_size, unit } => write!(f, "{gram_size}-gram({unit})"),
			ArtifactVariant::Markov { depth, unit } => write!(f, "markov(depth {depth}, {unit})"),
			ArtifactVariant::Vocabulary => f.write_str("vocabulary"),
		}
	}
}

/// Fully resolved identity of an artifact.
///
/// `date` is always a concrete `YYYYMMDD`, never the `latest` sentinel, so two
/// keys are equal exactly when they designate the same file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
	pub language: String,
	pub date: String,
	pub variant: ArtifactVariant,
}

impl fmt::Display for ArtifactKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}@{} {}", self.language, self.date, self.variant)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_date_spec_parsing() {
		assert_eq!("latest".parse::<DateSpec>().unwrap(), DateSpec::Latest);
		assert_eq!("LATEST".parse::<DateSpec>().unwrap(), DateSpec::Latest);
		assert_eq!("20250101".parse::<DateSpec>().unwrap(), DateSpec::Exact("20250101".into()));
		assert!("2025-01-01".parse::<DateSpec>().is_err());
		assert!("20251301".parse::<DateSpec>().is_err());
		assert!("20250100".parse::<DateSpec>().is_err());
	}

	#[test]
	fn test_unsupported_parameters() {
		let tokenizer = ArtifactVariant::Tokenizer { vocab_size: 12345, format: TokenizerFormat::SentencePiece };
		assert!(matches!(tokenizer.validate("en"), Err(WikilangsError::UnsupportedVariant { .. })));

		for gram_size in [0, 1, 6, 10] {
			let variant = ArtifactVariant::NGram { gram_size, unit: TokenUnit::Word };
			assert!(variant.validate("en").is_err(), "gram_size {gram_size} accepted");
		}
		for depth in [0, 6] {
			let variant = ArtifactVariant::Markov { depth, unit: TokenUnit::Word };
			assert!(variant.validate("en").is_err(), "depth {depth} accepted");
		}
		assert!(ArtifactVariant::Vocabulary.validate("en").is_ok());
	}

	#[test]
	fn test_candidate_paths() {
		let tokenizer = ArtifactVariant::Tokenizer { vocab_size: 16000, format: TokenizerFormat::HuggingFace };
		assert_eq!(tokenizer.candidates("ary")[0].data, "models/tokenizer/ary_tokenizer_16k.json");

		let ngram = ArtifactVariant::NGram { gram_size: 3, unit: TokenUnit::Subword };
		let candidates = ngram.candidates("en");
		let data: Vec<&str> = candidates.iter().map(|files| files.data.as_str()).collect();
		assert_eq!(
			data,
			vec![
				"models/subword_ngram/en_3gram_subword.parquet",
				"models/subword_ngram/en_3gram_subword.jsonl",
				"models/word_ngram/en_3gram_subword.parquet",
				"models/word_ngram/en_3gram_subword.jsonl",
			]
		);
		assert_eq!(candidates[0].metadata, candidates[1].metadata);
		assert_eq!(
			candidates[0].metadata.as_deref(),
			Some("models/subword_ngram/en_3gram_subword_metadata.json")
		);

		let markov = ArtifactVariant::Markov { depth: 2, unit: TokenUnit::Word };
		let candidates = markov.candidates("en");
		assert_eq!(candidates.len(), 2);
		assert_eq!(candidates[0].data, "models/word_markov/en_markov_ctx2_word.parquet");
		assert_eq!(candidates[1].data, "models/word_markov/en_markov_ctx2_word.jsonl");

		let vocabulary = ArtifactVariant::Vocabulary.candidates("ary");
		assert_eq!(vocabulary[0].data, "models/vocabulary/ary_vocabulary.parquet");
		assert_eq!(vocabulary[1].metadata.as_deref(), Some("models/vocabulary/ary_vocabulary_metadata.json"));
	}

	#[test]
	fn test_unit_and_format_parsing() {
		assert_eq!("Subword".parse::<TokenUnit>().unwrap(), TokenUnit::Subword);
		assert!("char".parse::<TokenUnit>().is_err());
		assert_eq!("huggingface".parse::<TokenizerFormat>().unwrap(), TokenizerFormat::HuggingFace);
		assert!("bpe".parse::<TokenizerFormat>().is_err());
	}
}
