use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WikilangsError;

/// What generation does when the current window has no recorded successor.
///
/// # Variants
/// - `Restart`: jump to a random known window without emitting it, at most
///   `MAX_RESTARTS` times in a row.
/// - `UniformVocabulary`: emit a token drawn uniformly from every successor
///   token of the table.
/// - `Stop`: end the generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
	#[default]
	Restart,
	UniformVocabulary,
	Stop,
}

/// Consecutive restarts allowed before `Fallback::Restart` gives up.
pub const MAX_RESTARTS: usize = 10;

impl FromStr for Fallback {
	type Err = WikilangsError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"restart" => Ok(Fallback::Restart),
			"uniform" | "uniform_vocabulary" => Ok(Fallback::UniformVocabulary),
			"stop" => Ok(Fallback::Stop),
			other => Err(WikilangsError::InvalidArgument(format!(
				"fallback must be 'restart', 'uniform' or 'stop', got '{other}'"
			))),
		}
	}
}

impl fmt::Display for Fallback {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Fallback::Restart => "restart",
			Fallback::UniformVocabulary => "uniform_vocabulary",
			Fallback::Stop => "stop",
		})
	}
}

/// Input parameters of a Markov generation.
///
/// # Responsibilities
/// - Bound the number of sampled tokens (`length`)
/// - Carry the optional seed context and random seed
/// - Select the policy for unknown windows (`fallback`)
///
/// Two generations with the same table and an equal input carrying
/// `rng_seed` produce the same text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationInput {
	/// Maximum number of tokens to sample.
	pub length: usize,

	/// Tokens the text starts with; the last `depth` of them seed the window.
	pub seed_context: Option<Vec<String>>,

	/// Seed of the random generator. Fresh entropy when `None`.
	pub rng_seed: Option<u64>,

	pub fallback: Fallback,
}

impl Default for GenerationInput {
	fn default() -> Self {
		Self::new(100)
	}
}

impl GenerationInput {
	pub fn new(length: usize) -> Self {
		Self { length, seed_context: None, rng_seed: None, fallback: Fallback::default() }
	}

	pub fn with_seed_context<I, S>(mut self, tokens: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.seed_context = Some(tokens.into_iter().map(Into::into).collect());
		self
	}

	pub fn with_rng_seed(mut self, seed: u64) -> Self {
		self.rng_seed = Some(seed);
		self
	}

	pub fn with_fallback(mut self, fallback: Fallback) -> Self {
		self.fallback = fallback;
		self
	}
}
