use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::segmenter::Segmenter;
use super::table::{ArtifactMetadata, Partial, Tokens, build_parallel, parse_row};
use crate::error::{Result, WikilangsError};
use crate::hub::variant::TokenUnit;
use crate::io::Snapshot;

/// Factor applied to a probability each time the lookup backs off to a
/// shorter context.
pub const BACKOFF_DISCOUNT: f64 = 0.4;

/// Smallest per-token probability a score accounts for.
pub const MIN_PROBABILITY: f64 = 1e-10;

/// Next-token counts observed after one context.
///
/// `ranked` holds the same tokens as `counts`, by count descending then
/// token ascending, so predictions are a prefix of it.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
struct Distribution {
	counts: HashMap<String, u64>,
	ranked: Vec<(String, u64)>,
	total: u64,
}

impl Distribution {
	fn add(&mut self, token: &str, count: u64) {
		*self.counts.entry(token.to_owned()).or_insert(0) += count;
		self.total += count;
	}

	fn finish(&mut self) {
		self.ranked = self.counts.iter().map(|(token, count)| (token.clone(), *count)).collect();
		self.ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
	}

	fn probability(&self, token: &str) -> Option<f64> {
		self.counts.get(token).map(|&count| count as f64 / self.total as f64)
	}
}

/// Raw n-gram counts while the artifact is parsed.
#[derive(Clone, Debug)]
struct NGramCounts {
	gram_size: usize,
	counts: HashMap<Vec<String>, u64>,
}

#[derive(Deserialize)]
struct NGramRow {
	ngram: Tokens,
	#[serde(alias = "count")]
	frequency: u64,
}

impl Partial for NGramCounts {
	fn ingest(&mut self, line_no: usize, line: &str) -> std::result::Result<(), String> {
		let row: NGramRow = parse_row(line_no, line)?;
		let ngram = row.ngram.into_vec();
		if ngram.len() != self.gram_size {
			return Err(format!(
				"line {line_no}: expected {} tokens, found {}",
				self.gram_size,
				ngram.len()
			));
		}
		if row.frequency > 0 {
			*self.counts.entry(ngram).or_insert(0) += row.frequency;
		}
		Ok(())
	}

	fn merge(&mut self, other: Self) -> std::result::Result<(), String> {
		if self.gram_size != other.gram_size {
			return Err("N mismatch".to_owned());
		}
		for (ngram, count) in other.counts {
			*self.counts.entry(ngram).or_insert(0) += count;
		}
		Ok(())
	}
}

/// Next-token distributions for every context length below `gram_size`.
///
/// `levels[k]` maps a context of `k` tokens to the distribution of the token
/// that follows it. The top level comes from the artifact rows; lower levels
/// are obtained by dropping the leftmost context tokens and summing counts.
///
/// # Invariants
/// - `gram_size >= 2` and `levels.len() == gram_size`
/// - `levels[0]` holds exactly one distribution, keyed by the empty context
/// - every distribution has a positive total
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NGramTable {
	gram_size: usize,
	levels: Vec<HashMap<Vec<String>, Distribution>>,
	vocab_size: usize,
	total_ngrams: u64,
	unique_ngrams: usize,
}

impl NGramTable {
	/// Parses a JSON lines n-gram artifact.
	///
	/// Rows look like `{"ngram": ["the", "cat", "sat"], "frequency": 4}`; the
	/// n-gram may also be a space separated string. Repeated n-grams are
	/// summed, zero frequencies ignored.
	pub fn load<P: AsRef<Path>>(path: P, gram_size: usize) -> Result<Self> {
		let path = path.as_ref();
		if gram_size < 2 {
			return Err(WikilangsError::InvalidArgument("gram_size must be >= 2".to_owned()));
		}

		let counts = build_parallel(path, NGramCounts { gram_size, counts: HashMap::new() })?;
		if counts.counts.is_empty() {
			return Err(WikilangsError::malformed(path, "no n-gram with a positive frequency"));
		}
		Ok(Self::from_counts(gram_size, counts.counts))
	}

	fn from_counts(gram_size: usize, counts: HashMap<Vec<String>, u64>) -> Self {
		let mut levels: Vec<HashMap<Vec<String>, Distribution>> = vec![HashMap::new(); gram_size];
		let mut vocabulary: HashSet<&str> = HashSet::new();
		let mut total_ngrams = 0;

		for (ngram, count) in &counts {
			vocabulary.extend(ngram.iter().map(String::as_str));
			total_ngrams += count;

			let (history, next) = ngram.split_at(gram_size - 1);
			for (k, level) in levels.iter_mut().enumerate() {
				let context = history[history.len() - k..].to_vec();
				level.entry(context).or_default().add(&next[0], *count);
			}
		}

		for distribution in levels.iter_mut().flat_map(|level| level.values_mut()) {
			distribution.finish();
		}

		Self {
			gram_size,
			vocab_size: vocabulary.len(),
			total_ngrams,
			unique_ngrams: counts.len(),
			levels,
		}
	}

	pub fn gram_size(&self) -> usize {
		self.gram_size
	}

	/// Distinct tokens seen in any position.
	pub fn vocab_size(&self) -> usize {
		self.vocab_size
	}

	/// Probability of a token nobody ever observed.
	fn uniform_probability(&self) -> f64 {
		1.0 / (self.vocab_size + 1) as f64
	}

	/// Keeps at most the `gram_size - 1` last tokens.
	fn trim_context<'a>(&self, context: &'a [String]) -> &'a [String] {
		&context[context.len().saturating_sub(self.gram_size - 1)..]
	}

	/// Probability of `token` after `context`, backing off to shorter contexts
	/// and finally to the uniform floor. Never zero.
	pub fn probability(&self, context: &[String], token: &str) -> f64 {
		let context = self.trim_context(context);
		let mut weight = 1.0;
		for k in (0..=context.len()).rev() {
			let found = self.levels[k]
				.get(&context[context.len() - k..])
				.and_then(|distribution| distribution.probability(token));
			if let Some(probability) = found {
				return weight * probability;
			}
			weight *= BACKOFF_DISCOUNT;
		}
		weight * self.uniform_probability()
	}

	/// Most likely next tokens after the longest known suffix of `context`.
	pub fn predict(&self, context: &[String], top_k: usize) -> Vec<(String, f64)> {
		let context = self.trim_context(context);
		let mut weight = 1.0;
		for k in (0..=context.len()).rev() {
			if let Some(distribution) = self.levels[k].get(&context[context.len() - k..]) {
				let total = distribution.total as f64;
				return distribution
					.ranked
					.iter()
					.take(top_k)
					.map(|(token, count)| (token.clone(), weight * *count as f64 / total))
					.collect();
			}
			weight *= BACKOFF_DISCOUNT;
		}
		Vec::new()
	}
}

impl Snapshot for NGramTable {
	fn check(&self) -> std::result::Result<(), String> {
		if self.gram_size < 2 || self.levels.len() != self.gram_size {
			return Err(format!("{} context levels for {}-grams", self.levels.len(), self.gram_size));
		}
		if self.levels[0].len() != 1 {
			return Err("unigram level must hold the empty context only".to_owned());
		}
		for (k, level) in self.levels.iter().enumerate() {
			for (context, distribution) in level {
				if context.len() != k {
					return Err(format!("context of {} tokens at level {k}", context.len()));
				}
				if distribution.total == 0 || distribution.ranked.len() != distribution.counts.len() {
					return Err(format!("inconsistent distribution after {context:?}"));
				}
			}
		}
		Ok(())
	}
}

/// N-gram language model bound to the segmenter of its token unit.
pub struct NGramModel {
	table: NGramTable,
	unit: TokenUnit,
	segmenter: Arc<dyn Segmenter>,
	metadata: Option<ArtifactMetadata>,
}

impl fmt::Debug for NGramModel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("NGramModel")
			.field("gram_size", &self.table.gram_size)
			.field("unit", &self.unit)
			.field("unique_ngrams", &self.table.unique_ngrams)
			.finish_non_exhaustive()
	}
}

impl NGramModel {
	pub fn new(table: NGramTable, unit: TokenUnit, segmenter: Arc<dyn Segmenter>) -> Self {
		Self { table, unit, segmenter, metadata: None }
	}

	pub(crate) fn with_metadata(mut self, metadata: Option<ArtifactMetadata>) -> Self {
		self.metadata = metadata;
		self
	}

	/// Log-probability of `text`, the sum over its tokens.
	///
	/// Each token is looked up after up to `gram_size - 1` preceding tokens
	/// (see `NGramTable::probability`) and contributes at least
	/// `ln(MIN_PROBABILITY)`. Text without tokens scores `0.0`.
	pub fn score(&self, text: &str) -> f64 {
		let tokens = self.segmenter.segment(text);
		if tokens.is_empty() {
			return 0.0;
		}

		let floor = MIN_PROBABILITY.ln();
		tokens
			.iter()
			.enumerate()
			.map(|(i, token)| self.table.probability(&tokens[..i], token).ln().max(floor))
			.sum()
	}

	/// Up to `top_k` `(token, probability)` pairs, most likely first, ties in
	/// token order. Unknown contexts back off like `score` does.
	pub fn predict_next(&self, context: &str, top_k: usize) -> Vec<(String, f64)> {
		if top_k == 0 {
			return Vec::new();
		}
		let tokens = self.segmenter.segment(context);
		self.table.predict(&tokens, top_k)
	}

	pub fn gram_size(&self) -> usize {
		self.table.gram_size
	}

	pub fn unit(&self) -> TokenUnit {
		self.unit
	}

	pub fn table(&self) -> &NGramTable {
		&self.table
	}

	pub fn metadata(&self) -> Option<&ArtifactMetadata> {
		self.metadata.as_ref()
	}

	/// Vocabulary size published in the metadata, else distinct tokens.
	pub fn vocab_size(&self) -> usize {
		self.metadata
			.as_ref()
			.and_then(|m| m.vocab_size)
			.map_or(self.table.vocab_size, |v| v as usize)
	}

	/// N-gram occurrences of the training corpus.
	pub fn total_ngrams(&self) -> u64 {
		self.metadata
			.as_ref()
			.and_then(|m| m.total_ngrams)
			.unwrap_or(self.table.total_ngrams)
	}

	pub fn unique_ngrams(&self) -> u64 {
		self.metadata
			.as_ref()
			.and_then(|m| m.unique_ngrams)
			.unwrap_or(self.table.unique_ngrams as u64)
	}

	/// Distinct n-grams in the loaded table.
	pub fn size(&self) -> usize {
		self.table.unique_ngrams
	}
}
