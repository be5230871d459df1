use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::table::{ArtifactMetadata, Partial, build_parallel, parse_row};
use crate::error::Result;
use crate::io::Snapshot;

/// One vocabulary row.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VocabularyEntry {
	pub token: String,
	/// Occurrences in the corpus.
	pub frequency: u64,
	#[serde(default)]
	pub idf_score: f64,
	/// 1 for the most frequent token.
	pub rank: u32,
}

/// Rows read so far, indexed by token.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
struct VocabularyRows {
	entries: Vec<VocabularyEntry>,
	index: HashMap<String, usize>,
}

impl VocabularyRows {
	fn insert(&mut self, entry: VocabularyEntry) -> std::result::Result<(), String> {
		match self.index.entry(entry.token.clone()) {
			Entry::Occupied(_) => Err(format!("duplicate token '{}'", entry.token)),
			Entry::Vacant(slot) => {
				slot.insert(self.entries.len());
				self.entries.push(entry);
				Ok(())
			}
		}
	}
}

impl Partial for VocabularyRows {
	fn ingest(&mut self, line_no: usize, line: &str) -> std::result::Result<(), String> {
		let entry: VocabularyEntry = parse_row(line_no, line)?;
		if entry.rank == 0 {
			return Err(format!("line {line_no}: rank must be at least 1"));
		}
		if !(entry.idf_score.is_finite() && entry.idf_score >= 0.0) {
			return Err(format!("line {line_no}: idf_score must be a non-negative number"));
		}
		self.insert(entry).map_err(|e| format!("line {line_no}: {e}"))
	}

	fn merge(&mut self, other: Self) -> std::result::Result<(), String> {
		other.entries.into_iter().try_for_each(|entry| self.insert(entry))
	}
}

/// Token table with frequency, IDF and rank.
///
/// Read-only once loaded; iteration follows ascending rank, ties broken by
/// token.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Vocabulary {
	rows: VocabularyRows,
	#[serde(skip)]
	metadata: Option<ArtifactMetadata>,
}

impl Vocabulary {
	/// Parses a JSON lines vocabulary.
	///
	/// # Errors
	/// `MalformedArtifact` on unparsable rows, duplicate tokens, rank 0,
	/// negative or NaN IDF, or a file without rows.
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		let mut rows = build_parallel(path.as_ref(), VocabularyRows::default())?;
		rows.entries.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.token.cmp(&b.token)));
		rows.index = rows
			.entries
			.iter()
			.enumerate()
			.map(|(position, entry)| (entry.token.clone(), position))
			.collect();
		Ok(Self { rows, metadata: None })
	}

	pub(crate) fn with_metadata(mut self, metadata: Option<ArtifactMetadata>) -> Self {
		self.metadata = metadata;
		self
	}

	pub fn metadata(&self) -> Option<&ArtifactMetadata> {
		self.metadata.as_ref()
	}

	/// Entry of `token`, `None` when absent.
	pub fn lookup(&self, token: &str) -> Option<&VocabularyEntry> {
		self.rows.index.get(token).map(|&position| &self.rows.entries[position])
	}

	pub fn contains(&self, token: &str) -> bool {
		self.rows.index.contains_key(token)
	}

	/// Frequency of `token`, 0 when absent.
	pub fn frequency(&self, token: &str) -> u64 {
		self.lookup(token).map_or(0, |entry| entry.frequency)
	}

	/// Entries in ascending rank order. Each call starts over.
	pub fn iter(&self) -> std::slice::Iter<'_, VocabularyEntry> {
		self.rows.entries.iter()
	}

	/// Up to `top_k` tokens starting with `prefix`, most frequent first.
	pub fn words_with_prefix(&self, prefix: &str, top_k: usize) -> Vec<&str> {
		let mut matches: Vec<&VocabularyEntry> =
			self.rows.entries.iter().filter(|entry| entry.token.starts_with(prefix)).collect();
		matches.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.token.cmp(&b.token)));
		matches.into_iter().take(top_k).map(|entry| entry.token.as_str()).collect()
	}

	pub fn len(&self) -> usize {
		self.rows.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.entries.is_empty()
	}
}

impl<'a> IntoIterator for &'a Vocabulary {
	type Item = &'a VocabularyEntry;
	type IntoIter = std::slice::Iter<'a, VocabularyEntry>;

	fn into_iter(self) -> Self::IntoIter {
		self.iter()
	}
}

impl Snapshot for Vocabulary {
	fn check(&self) -> std::result::Result<(), String> {
		if self.rows.index.len() != self.rows.entries.len() {
			return Err("index does not match the rows".to_owned());
		}
		let indexed = self.rows.index.iter().all(|(token, &position)| {
			self.rows.entries.get(position).is_some_and(|entry| &entry.token == token)
		});
		if !indexed {
			return Err("index points at the wrong rows".to_owned());
		}
		if self.rows.entries.iter().any(|entry| entry.rank == 0) {
			return Err("rank must be at least 1".to_owned());
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::WikilangsError;
	use std::fs;

	fn load(content: &str) -> Result<Vocabulary> {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("xx_vocabulary.jsonl");
		fs::write(&path, content).unwrap();
		Vocabulary::load(&path)
	}

	const ROWS: &str = r#"{"token": "cat", "frequency": 40, "idf_score": 1.5, "rank": 3}
{"token": "the", "frequency": 120, "idf_score": 0.1, "rank": 1}
{"token": "car", "frequency": 40, "idf_score": 1.6, "rank": 4}
{"token": "a", "frequency": 90, "idf_score": 0.2, "rank": 2}
"#;

	#[test]
	fn test_lookup_and_miss() {
		let vocabulary = load(ROWS).unwrap();
		let the = vocabulary.lookup("the").unwrap();
		assert_eq!(the.rank, 1);
		assert_eq!(the.frequency, 120);
		assert!(vocabulary.lookup("dog").is_none());
		assert_eq!(vocabulary.frequency("dog"), 0);
		assert_eq!(vocabulary.len(), 4);
	}

	#[test]
	fn test_iteration_follows_rank_and_restarts() {
		let vocabulary = load(ROWS).unwrap();
		let first: Vec<&str> = vocabulary.iter().map(|e| e.token.as_str()).collect();
		assert_eq!(first, vec!["the", "a", "cat", "car"]);
		let second: Vec<&str> = (&vocabulary).into_iter().map(|e| e.token.as_str()).collect();
		assert_eq!(first, second);
	}

	#[test]
	fn test_words_with_prefix() {
		let vocabulary = load(ROWS).unwrap();
		assert_eq!(vocabulary.words_with_prefix("ca", 10), vec!["car", "cat"]);
		assert_eq!(vocabulary.words_with_prefix("ca", 1), vec!["car"]);
		assert!(vocabulary.words_with_prefix("zz", 5).is_empty());
	}

	#[test]
	fn test_rejects_invalid_rows() {
		let duplicate = "{\"token\": \"a\", \"frequency\": 1, \"idf_score\": 0.0, \"rank\": 1}\n\
		                 {\"token\": \"a\", \"frequency\": 1, \"idf_score\": 0.0, \"rank\": 2}\n";
		assert!(matches!(load(duplicate), Err(WikilangsError::MalformedArtifact { .. })));

		let rank_zero = r#"{"token": "a", "frequency": 1, "idf_score": 0.0, "rank": 0}"#;
		assert!(load(rank_zero).is_err());

		let negative_idf = r#"{"token": "a", "frequency": 1, "idf_score": -1.0, "rank": 1}"#;
		assert!(load(negative_idf).is_err());

		assert!(load("not json\n").is_err());
		assert!(load("").is_err());
	}

	#[test]
	fn test_loads_parquet_rows() {
		use parquet::data_type::{ByteArray, ByteArrayType, DoubleType, Int64Type};
		use parquet::file::properties::WriterProperties;
		use parquet::file::writer::SerializedFileWriter;
		use parquet::schema::parser::parse_message_type;
		use std::sync::Arc;

		let schema = parse_message_type(
			"message vocabulary {
				REQUIRED BYTE_ARRAY token (UTF8);
				REQUIRED INT64 frequency;
				REQUIRED DOUBLE idf_score;
				REQUIRED INT64 rank;
			}",
		)
		.unwrap();
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("xx_vocabulary.parquet");
		let file = fs::File::create(&path).unwrap();
		let mut writer =
			SerializedFileWriter::new(file, Arc::new(schema), Arc::new(WriterProperties::builder().build())).unwrap();

		let mut row_group = writer.next_row_group().unwrap();
		let mut column = row_group.next_column().unwrap().unwrap();
		let tokens: Vec<ByteArray> = ["cat", "the", "a"].into_iter().map(ByteArray::from).collect();
		column.typed::<ByteArrayType>().write_batch(&tokens, None, None).unwrap();
		column.close().unwrap();
		let mut column = row_group.next_column().unwrap().unwrap();
		column.typed::<Int64Type>().write_batch(&[40, 120, 90], None, None).unwrap();
		column.close().unwrap();
		let mut column = row_group.next_column().unwrap().unwrap();
		column.typed::<DoubleType>().write_batch(&[1.5, 0.1, 0.2], None, None).unwrap();
		column.close().unwrap();
		let mut column = row_group.next_column().unwrap().unwrap();
		column.typed::<Int64Type>().write_batch(&[3, 1, 2], None, None).unwrap();
		column.close().unwrap();
		row_group.close().unwrap();
		writer.close().unwrap();

		let vocabulary = Vocabulary::load(&path).unwrap();
		let tokens: Vec<&str> = vocabulary.iter().map(|e| e.token.as_str()).collect();
		assert_eq!(tokens, vec!["the", "a", "cat"]);
		assert_eq!(vocabulary.lookup("cat").unwrap().idf_score, 1.5);
		assert_eq!(vocabulary.frequency("a"), 90);
	}

	#[test]
	fn test_check_detects_a_stale_index() {
		let vocabulary = load(ROWS).unwrap();
		assert!(vocabulary.check().is_ok());

		let mut swapped = vocabulary.clone();
		swapped.rows.index.insert("the".to_owned(), 2);
		swapped.rows.index.insert("cat".to_owned(), 0);
		assert!(swapped.check().is_err());

		let mut missing = vocabulary;
		missing.rows.index.remove("a");
		assert!(missing.check().is_err());
	}
}
