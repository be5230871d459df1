use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::generation_input::{Fallback, GenerationInput, MAX_RESTARTS};
use super::state::State;
use super::table::{ArtifactMetadata, Partial, Tokens, build_parallel, parse_row};
use crate::error::{Result, WikilangsError};
use crate::hub::variant::TokenUnit;
use crate::io::Snapshot;

/// Window padding before the first token.
pub const START_TOKEN: &str = "<s>";
/// Sampling this token ends the generation.
pub const END_TOKEN: &str = "</s>";
pub const PAD_TOKEN: &str = "<pad>";

/// Subword pieces mark the start of a word with this character.
const WORD_BOUNDARY: char = '\u{2581}';

#[derive(Deserialize)]
struct TransitionRow {
	context: Tokens,
	next_token: String,
	#[serde(alias = "weight", alias = "count")]
	probability: f64,
}

/// States read so far.
#[derive(Clone, Debug)]
struct TransitionRows {
	depth: usize,
	states: HashMap<Vec<String>, State>,
}

impl Partial for TransitionRows {
	fn ingest(&mut self, line_no: usize, line: &str) -> std::result::Result<(), String> {
		let row: TransitionRow = parse_row(line_no, line)?;
		let context = row.context.into_vec();
		if context.len() != self.depth {
			return Err(format!(
				"line {line_no}: expected a context of {} tokens, found {}",
				self.depth,
				context.len()
			));
		}
		if !(row.probability.is_finite() && row.probability >= 0.0) {
			return Err(format!("line {line_no}: weight must be a non-negative number"));
		}

		self.states
			.entry(context.clone())
			.or_insert_with(|| State::new(context))
			.add_transition(&row.next_token, row.probability);
		Ok(())
	}

	fn merge(&mut self, other: Self) -> std::result::Result<(), String> {
		if self.depth != other.depth {
			return Err("Depth mismatch".to_owned());
		}
		for (key, state) in other.states {
			match self.states.get_mut(&key) {
				Some(existing) => existing.merge(state)?,
				None => {
					self.states.insert(key, state);
				}
			}
		}
		Ok(())
	}
}

/// Transition table of a Markov chain.
///
/// # Invariants
/// - every state key has exactly `depth` tokens
/// - `windows` lists the state keys in sorted order
/// - `vocabulary` lists every successor token in sorted order
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MarkovTable {
	depth: usize,
	states: HashMap<Vec<String>, State>,
	windows: Vec<Vec<String>>,
	vocabulary: Vec<String>,
	transitions: usize,
}

impl MarkovTable {
	/// Parses a JSON lines transition artifact.
	///
	/// Rows look like
	/// `{"context": ["the", "cat"], "next_token": "sat", "probability": 0.5}`;
	/// the context may also be a JSON list encoded as a string or a space
	/// separated string, and the weight may be named `weight` or `count`.
	/// Repeated `(context, next_token)` rows add up.
	pub fn load<P: AsRef<Path>>(path: P, depth: usize) -> Result<Self> {
		if depth == 0 {
			return Err(WikilangsError::InvalidArgument("depth must be >= 1".to_owned()));
		}
		let rows = build_parallel(path.as_ref(), TransitionRows { depth, states: HashMap::new() })?;
		Ok(Self::from_states(depth, rows.states))
	}

	fn from_states(depth: usize, states: HashMap<Vec<String>, State>) -> Self {
		let mut windows: Vec<Vec<String>> = states.keys().cloned().collect();
		windows.sort();

		let vocabulary: BTreeSet<&str> = states.values().flat_map(State::successors).collect();
		let vocabulary = vocabulary.into_iter().map(str::to_owned).collect();
		let transitions = states.values().map(State::len).sum();

		Self { depth, states, windows, vocabulary, transitions }
	}

	pub fn depth(&self) -> usize {
		self.depth
	}

	pub fn state(&self, window: &[String]) -> Option<&State> {
		self.states.get(window)
	}
}

impl Snapshot for MarkovTable {
	fn check(&self) -> std::result::Result<(), String> {
		if self.depth == 0 {
			return Err("depth must be >= 1".to_owned());
		}
		for (key, state) in &self.states {
			if key.len() != self.depth || state.key() != key.as_slice() {
				return Err(format!("state {key:?} does not match a depth of {}", self.depth));
			}
			state.check()?;
		}
		if self.windows.len() != self.states.len()
			|| !self.windows.windows(2).all(|pair| pair[0] < pair[1])
			|| !self.windows.iter().all(|window| self.states.contains_key(window))
		{
			return Err("windows do not list the states".to_owned());
		}
		let successors: BTreeSet<&str> = self.states.values().flat_map(State::successors).collect();
		if !self.vocabulary.iter().map(String::as_str).eq(successors) {
			return Err("vocabulary does not list the successors".to_owned());
		}
		if self.transitions != self.states.values().map(State::len).sum::<usize>() {
			return Err("transition count does not match the states".to_owned());
		}
		Ok(())
	}
}

/// Markov chain text generator.
#[derive(Debug, Clone)]
pub struct MarkovChain {
	table: MarkovTable,
	unit: TokenUnit,
	metadata: Option<ArtifactMetadata>,
}

impl MarkovChain {
	pub fn new(table: MarkovTable, unit: TokenUnit) -> Self {
		Self { table, unit, metadata: None }
	}

	pub(crate) fn with_metadata(mut self, metadata: Option<ArtifactMetadata>) -> Self {
		self.metadata = metadata;
		self
	}

	/// Generates up to `length` tokens after an optional seed context.
	///
	/// The random generator is seeded from fresh entropy; use
	/// `generate_with` and `GenerationInput::rng_seed` for reproducible text.
	pub fn generate(&self, length: usize, seed_context: Option<&[&str]>) -> String {
		let mut input = GenerationInput::new(length);
		if let Some(seed) = seed_context {
			input = input.with_seed_context(seed.iter().copied());
		}
		self.generate_with(&input)
	}

	/// Random walk over the table.
	///
	/// - The first window holds the last `depth` seed tokens, left padded with
	///   `<s>`.
	/// - Each step samples a successor of the current window and slides the
	///   window by one token.
	/// - Stops after `length` sampled tokens, when `</s>` is sampled, or when
	///   the fallback policy gives up on an unknown window.
	///
	/// The text is the seed followed by the sampled tokens, markers removed.
	pub fn generate_with(&self, input: &GenerationInput) -> String {
		let mut rng = match input.rng_seed {
			Some(seed) => StdRng::seed_from_u64(seed),
			None => StdRng::from_rng(&mut rand::rng()),
		};

		let seed: &[String] = input.seed_context.as_deref().unwrap_or_default();
		let mut window = self.initial_window(seed);
		let mut tokens: Vec<String> = seed.to_vec();

		let mut sampled = 0;
		let mut restarts = 0;
		while sampled < input.length {
			let next = match self.table.state(&window) {
				Some(state) => {
					restarts = 0;
					match state.sample(&mut rng) {
						Some(next) => next.to_owned(),
						None => break,
					}
				}
				None => match input.fallback {
					Fallback::Stop => break,
					Fallback::Restart => {
						if restarts >= MAX_RESTARTS || self.table.windows.is_empty() {
							break;
						}
						restarts += 1;
						let index = rng.random_range(0..self.table.windows.len());
						window = self.table.windows[index].clone();
						continue;
					}
					Fallback::UniformVocabulary => {
						if self.table.vocabulary.is_empty() {
							break;
						}
						let index = rng.random_range(0..self.table.vocabulary.len());
						self.table.vocabulary[index].clone()
					}
				},
			};

			sampled += 1;
			if next == END_TOKEN {
				break;
			}
			window.remove(0);
			window.push(next.clone());
			tokens.push(next);
		}

		self.assemble(&tokens)
	}

	fn initial_window(&self, seed: &[String]) -> Vec<String> {
		let depth = self.table.depth;
		let kept = &seed[seed.len().saturating_sub(depth)..];
		let mut window = vec![START_TOKEN.to_owned(); depth - kept.len()];
		window.extend(kept.iter().cloned());
		window
	}

	fn assemble(&self, tokens: &[String]) -> String {
		let kept = tokens
			.iter()
			.map(String::as_str)
			.filter(|token| ![START_TOKEN, END_TOKEN, PAD_TOKEN].contains(token));

		match self.unit {
			TokenUnit::Word => kept.collect::<Vec<_>>().join(" "),
			TokenUnit::Subword => {
				let text: String = kept.collect::<String>().replace(WORD_BOUNDARY, " ");
				text.split_whitespace().collect::<Vec<_>>().join(" ")
			}
		}
	}

	/// Normalised successor probabilities of `window`; empty when the window
	/// is unknown.
	pub fn transitions<S: AsRef<str>>(&self, window: &[S]) -> HashMap<String, f64> {
		let key: Vec<String> = window.iter().map(|token| token.as_ref().to_owned()).collect();
		self.table.state(&key).map(State::probabilities).unwrap_or_default()
	}

	pub fn depth(&self) -> usize {
		self.table.depth
	}

	pub fn unit(&self) -> TokenUnit {
		self.unit
	}

	pub fn metadata(&self) -> Option<&ArtifactMetadata> {
		self.metadata.as_ref()
	}

	/// Vocabulary size published in the metadata, else distinct successor
	/// tokens.
	pub fn vocab_size(&self) -> usize {
		self.metadata
			.as_ref()
			.and_then(|m| m.vocab_size)
			.map_or(self.table.vocabulary.len(), |v| v as usize)
	}

	/// Distinct `(window, next token)` transitions.
	pub fn size(&self) -> usize {
		self.table.transitions
	}

	/// Distinct windows.
	pub fn windows(&self) -> usize {
		self.table.windows.len()
	}
}
