mod common;

use std::sync::Arc;

use common::fixture;
use wikilangs_core::{TokenizerFormat, WikilangsError};

#[test]
fn test_round_trip_of_known_words() {
	let fx = fixture();
	let tokenizer = fx.wikilangs.tokenizer("en", "latest", 16000, TokenizerFormat::SentencePiece).unwrap();

	assert_eq!(tokenizer.tokenize("the cat sat").unwrap(), vec!["the</w>", "cat</w>", "sat</w>"]);
	let ids = tokenizer.encode("the cat sat").unwrap();
	assert_eq!(ids, vec![9, 11, 12]);
	assert_eq!(tokenizer.decode(&ids).unwrap(), "the cat sat");
}

#[test]
fn test_unknown_pieces_map_to_unk() {
	let fx = fixture();
	let tokenizer = fx.wikilangs.tokenizer("en", "latest", 16000, TokenizerFormat::SentencePiece).unwrap();
	let unk = tokenizer.unk_id();
	assert_eq!(tokenizer.token_to_id("<unk>"), Some(unk));

	let ids = tokenizer.encode("the dog").unwrap();
	assert_eq!(ids[0], 9);
	assert!(ids[1..].iter().all(|&id| id == unk));

	// Lossy: unknown pieces are dropped on decoding.
	assert_eq!(tokenizer.decode(&ids).unwrap(), "the");
	// Ids outside the vocabulary decode like `<unk>`.
	assert_eq!(tokenizer.decode(&[9, 50_000]).unwrap(), "the");
}

#[test]
fn test_vocabulary_accessors() {
	let fx = fixture();
	let tokenizer = fx.wikilangs.tokenizer("en", "latest", 16000, TokenizerFormat::HuggingFace).unwrap();

	assert_eq!(tokenizer.vocab_size(), 16000);
	assert_eq!(tokenizer.format(), TokenizerFormat::HuggingFace);
	assert_eq!(tokenizer.get_vocab().len(), 13);
	assert_eq!(tokenizer.id_to_token(11).as_deref(), Some("cat</w>"));
	// No post processor: the HuggingFace format adds nothing here.
	assert_eq!(tokenizer.encode("cat").unwrap(), vec![11]);
}

#[test]
fn test_tokenizer_is_cached_per_variant() {
	let fx = fixture();
	let first = fx.wikilangs.tokenizer("en", "latest", 16000, TokenizerFormat::SentencePiece).unwrap();
	let second = fx.wikilangs.tokenizer("en", "20250101", 16000, TokenizerFormat::SentencePiece).unwrap();
	assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_unpublished_tokenizer_sizes() {
	let fx = fixture();
	let unpublished = fx.wikilangs.tokenizer("en", "latest", 32000, TokenizerFormat::SentencePiece);
	assert!(matches!(unpublished, Err(WikilangsError::UnsupportedVariant { .. })));

	let unsupported = fx.wikilangs.tokenizer("en", "latest", 12345, TokenizerFormat::SentencePiece);
	assert!(matches!(unsupported, Err(WikilangsError::UnsupportedVariant { .. })));
}
