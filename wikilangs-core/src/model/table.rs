use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use log::info;
use parquet::file::reader::{FileReader, SerializedFileReader};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WikilangsError};
use crate::io::read_file;

/// Contents of a `*_metadata.json` sidecar.
///
/// Only the counters used by the models are typed; every other key is kept
/// as is in `extra`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ArtifactMetadata {
	#[serde(default)]
	pub total_ngrams: Option<u64>,
	#[serde(default)]
	pub unique_ngrams: Option<u64>,
	#[serde(default)]
	pub vocab_size: Option<u64>,
	#[serde(flatten)]
	pub extra: BTreeMap<String, serde_json::Value>,
}

impl ArtifactMetadata {
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		let path = path.as_ref();
		let content = fs::read_to_string(path).map_err(|e| WikilangsError::malformed(path, e.to_string()))?;
		serde_json::from_str(&content).map_err(|e| WikilangsError::malformed(path, e.to_string()))
	}

	/// Loads the sidecar when there is one.
	pub(crate) fn load_optional(path: Option<&Path>) -> Result<Option<Self>> {
		path.map(Self::load).transpose()
	}
}

/// Token sequence as published: either a JSON list, a JSON list serialized
/// into a string, or a space separated string.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub(crate) enum Tokens {
	List(Vec<String>),
	Text(String),
}

impl Tokens {
	pub(crate) fn into_vec(self) -> Vec<String> {
		match self {
			Tokens::List(tokens) => tokens,
			Tokens::Text(text) => {
				if text.trim_start().starts_with('[') {
					if let Ok(tokens) = serde_json::from_str::<Vec<String>>(&text) {
						return tokens;
					}
				}
				text.split_whitespace().map(str::to_owned).collect()
			}
		}
	}
}

/// Rows of a tabular artifact, one JSON object per row.
///
/// `.parquet` files are decoded record by record, each record rendered as the
/// JSON object of its columns; anything else is read as JSON lines.
pub(crate) fn read_rows(path: &Path) -> Result<Vec<String>> {
	let malformed = |message: String| WikilangsError::malformed(path, message);
	if path.extension().is_some_and(|ext| ext == "parquet") {
		let file = File::open(path).map_err(|e| malformed(e.to_string()))?;
		let reader = SerializedFileReader::new(file).map_err(|e| malformed(e.to_string()))?;
		let rows = reader.get_row_iter(None).map_err(|e| malformed(e.to_string()))?;
		rows.map(|row| row.map(|row| row.to_json_value().to_string()).map_err(|e| malformed(e.to_string())))
			.collect()
	} else {
		read_file(path).map_err(|e| malformed(e.to_string()))
	}
}

/// Table under construction from a slice of artifact rows.
///
/// Partial tables are built independently and then merged, which lets large
/// artifacts be parsed on every core.
pub(crate) trait Partial: Clone + Send + 'static {
	/// Adds one non-blank row. `line_no` is 1-based.
	fn ingest(&mut self, line_no: usize, line: &str) -> std::result::Result<(), String>;

	/// Folds a partial table built from later rows into this one.
	fn merge(&mut self, other: Self) -> std::result::Result<(), String>;
}

/// Parses a tabular artifact (see `read_rows`) in parallel chunks.
///
/// - Lines are split into `cpus * 8` chunks, each ingested by its own thread
///   into a clone of `template`.
/// - Partial tables are merged in file order so the result does not depend
///   on thread scheduling.
/// - A file without any row is malformed.
pub(crate) fn build_parallel<T: Partial>(path: &Path, template: T) -> Result<T> {
	let lines = read_rows(path)?;
	if lines.iter().all(|line| line.trim().is_empty()) {
		return Err(WikilangsError::malformed(path, "artifact contains no rows"));
	}

	let cpus = num_cpus::get();
	let factor = 8;
	let chunks = cpus * factor;
	let chunk_size = lines.len().div_ceil(chunks);

	let (tx, rx) = mpsc::channel();
	let mut spawned = 0;
	for (index, chunk) in lines.chunks(chunk_size).enumerate() {
		let tx = tx.clone();
		let chunk: Vec<String> = chunk.to_vec();
		let mut partial = template.clone();
		let first_line = index * chunk_size + 1;

		thread::spawn(move || {
			let result = chunk
				.iter()
				.enumerate()
				.filter(|(_, line)| !line.trim().is_empty())
				.try_for_each(|(offset, line)| partial.ingest(first_line + offset, line))
				.map(|_| partial);
			// The receiver only hangs up once every sender is gone.
			let _ = tx.send((index, result));
		});
		spawned += 1;
	}
	drop(tx);

	let mut partials: Vec<(usize, std::result::Result<T, String>)> = rx.iter().collect();
	if partials.len() != spawned {
		return Err(WikilangsError::malformed(
			path,
			format!("{} of {spawned} parsing threads did not report", spawned - partials.len()),
		));
	}
	partials.sort_by_key(|(index, _)| *index);

	let mut table = template;
	for (_, partial) in partials {
		let partial = partial.map_err(|e| WikilangsError::malformed(path, e))?;
		table.merge(partial).map_err(|e| WikilangsError::malformed(path, e))?;
	}

	info!("Parsed {} ({} lines, {spawned} chunks)", path.display(), lines.len());
	Ok(table)
}

/// Deserializes one JSON row, prefixing errors with the line number.
pub(crate) fn parse_row<'a, R: Deserialize<'a>>(line_no: usize, line: &'a str) -> std::result::Result<R, String> {
	serde_json::from_str(line).map_err(|e| format!("line {line_no}: {e}"))
}
