use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use log::warn;
use tokenizers::Tokenizer;

use super::segmenter::{Segmenter, WhitespaceSegmenter};
use crate::error::{Result, WikilangsError};
use crate::hub::variant::TokenizerFormat;

/// Token every out-of-vocabulary piece maps to.
pub const UNK_TOKEN: &str = "<unk>";

/// Subword tokenizer over a fixed vocabulary.
///
/// Segmentation is done by the serialized model; this adapter only adds the
/// unknown-token policy: ids produced by the model or given to `decode` that
/// fall outside the vocabulary become `unk_id`.
pub struct BpeTokenizer {
	inner: Tokenizer,
	format: TokenizerFormat,
	vocab_size: u32,
	unk_id: u32,
	model_vocab_size: usize,
}

impl fmt::Debug for BpeTokenizer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BpeTokenizer")
			.field("format", &self.format)
			.field("vocab_size", &self.vocab_size)
			.field("unk_id", &self.unk_id)
			.finish_non_exhaustive()
	}
}

fn tokenization_error(e: impl fmt::Display) -> WikilangsError {
	WikilangsError::Tokenization(e.to_string())
}

impl BpeTokenizer {
	/// Loads a serialized tokenizer (`tokenizer.json` layout).
	///
	/// `vocab_size` is the published size the file was requested for.
	///
	/// # Errors
	/// `MalformedArtifact` when the file does not deserialize or the model has
	/// no `<unk>` token.
	pub fn load<P: AsRef<Path>>(path: P, vocab_size: u32, format: TokenizerFormat) -> Result<Self> {
		let path = path.as_ref();
		let inner = Tokenizer::from_file(path).map_err(|e| WikilangsError::malformed(path, e.to_string()))?;
		let unk_id = inner
			.token_to_id(UNK_TOKEN)
			.ok_or_else(|| WikilangsError::malformed(path, format!("tokenizer defines no {UNK_TOKEN} token")))?;
		let model_vocab_size = inner.get_vocab_size(true);

		Ok(Self { inner, format, vocab_size, unk_id, model_vocab_size })
	}

	fn in_vocabulary(&self, id: u32) -> u32 {
		if (id as usize) < self.model_vocab_size { id } else { self.unk_id }
	}

	/// Subword pieces of `text`, without special tokens.
	pub fn tokenize(&self, text: &str) -> Result<Vec<String>> {
		let encoding = self.inner.encode(text, false).map_err(tokenization_error)?;
		Ok(encoding.get_tokens().to_vec())
	}

	/// Token ids of `text`.
	///
	/// The `HuggingFace` format lets the model add its special tokens, the
	/// `SentencePiece` format does not.
	pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
		let add_special_tokens = self.format == TokenizerFormat::HuggingFace;
		let encoding = self.inner.encode(text, add_special_tokens).map_err(tokenization_error)?;
		Ok(encoding.get_ids().iter().map(|&id| self.in_vocabulary(id)).collect())
	}

	/// Text of `ids`, special tokens skipped.
	///
	/// `decode(encode(text))` gives `text` back, up to whitespace
	/// normalisation, as long as every piece of `text` is in the vocabulary.
	pub fn decode(&self, ids: &[u32]) -> Result<String> {
		let ids: Vec<u32> = ids.iter().map(|&id| self.in_vocabulary(id)).collect();
		self.inner.decode(&ids, true).map_err(tokenization_error)
	}

	/// Token to id mapping, special tokens included.
	pub fn get_vocab(&self) -> HashMap<String, u32> {
		self.inner.get_vocab(true)
	}

	pub fn token_to_id(&self, token: &str) -> Option<u32> {
		self.inner.token_to_id(token)
	}

	pub fn id_to_token(&self, id: u32) -> Option<String> {
		self.inner.id_to_token(id)
	}

	/// Published vocabulary size this tokenizer was requested for.
	pub fn vocab_size(&self) -> u32 {
		self.vocab_size
	}

	pub fn unk_id(&self) -> u32 {
		self.unk_id
	}

	pub fn format(&self) -> TokenizerFormat {
		self.format
	}
}

impl Segmenter for BpeTokenizer {
	fn segment(&self, text: &str) -> Vec<String> {
		match self.tokenize(text) {
			Ok(tokens) => tokens,
			Err(e) => {
				warn!("Subword segmentation failed, splitting on whitespace: {e}");
				WhitespaceSegmenter.segment(text)
			}
		}
	}
}
