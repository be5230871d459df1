use std::collections::HashMap;
use std::sync::OnceLock;

use rand::Rng;

use serde::{Deserialize, Serialize};

/// Represents a state of a Markov chain.
///
/// A `State` corresponds to a fixed window of `depth` tokens (`key`) and
/// stores every successor observed after this window with its weight.
///
/// Conceptually, this is a node in a Markov chain where outgoing edges
/// are weighted. Weights are not required to be normalized.
///
/// ## Invariants
/// - All transitions belong to the same `key`
/// - `transitions` is sorted by token, each token appears once
/// - Each weight is finite and non-negative
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct State {
	/// Window of tokens identifying the state.
	key: Vec<String>,
	/// Outgoing transitions: next token and accumulated weight.
	/// Example: [("cat", 3.0), ("mat", 1.0)]
	transitions: Vec<(String, f64)>,
	/// Running sums of `transitions` weights, computed on first sample.
	#[serde(skip)]
	cumulative: OnceLock<Vec<f64>>,
}

impl State {
	/// Creates a new empty state for the given window.
	pub fn new(key: Vec<String>) -> Self {
		Self { key, transitions: Vec::new(), cumulative: OnceLock::new() }
	}

	pub fn key(&self) -> &[String] {
		&self.key
	}

	/// Records a transition toward `next_token`.
	///
	/// - If the transition already exists, its weight is increased.
	/// - Otherwise, it is inserted at its sorted position.
	pub fn add_transition(&mut self, next_token: &str, weight: f64) {
		match self.transitions.binary_search_by(|(token, _)| token.as_str().cmp(next_token)) {
			Ok(position) => self.transitions[position].1 += weight,
			Err(position) => self.transitions.insert(position, (next_token.to_owned(), weight)),
		}
		self.cumulative = OnceLock::new();
	}

	/// Successor tokens in sorted order.
	pub fn successors(&self) -> impl Iterator<Item = &str> {
		self.transitions.iter().map(|(token, _)| token.as_str())
	}

	pub fn len(&self) -> usize {
		self.transitions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.transitions.is_empty()
	}

	fn cumulative(&self) -> &[f64] {
		self.cumulative.get_or_init(|| {
			self.transitions
				.iter()
				.scan(0.0, |sum, (_, weight)| {
					*sum += weight;
					Some(*sum)
				})
				.collect()
		})
	}

	/// Transition probabilities, weights divided by their sum.
	///
	/// When every weight is zero the successors are equally likely.
	pub fn probabilities(&self) -> HashMap<String, f64> {
		let total = self.cumulative().last().copied().unwrap_or(0.0);
		let uniform = 1.0 / self.transitions.len() as f64;
		self.transitions
			.iter()
			.map(|(token, weight)| {
				let probability = if total > 0.0 { weight / total } else { uniform };
				(token.clone(), probability)
			})
			.collect()
	}

	/// Samples the next token with probability proportional to its weight.
	///
	/// This method performs:
	/// - a lazy O(n) running sum, memoized
	/// - an O(log n) binary search per sample
	///
	/// Returns `None` if the state has no transitions.
	pub fn sample<R: Rng>(&self, rng: &mut R) -> Option<&str> {
		if self.transitions.is_empty() {
			return None;
		}

		let cumulative = self.cumulative();
		let total = cumulative.last().copied().unwrap_or(0.0);
		if total <= 0.0 {
			let index = rng.random_range(0..self.transitions.len());
			return Some(self.transitions[index].0.as_str());
		}

		let r = rng.random::<f64>() * total;
		let index = cumulative.partition_point(|&sum| sum <= r).min(self.transitions.len() - 1);
		Some(self.transitions[index].0.as_str())
	}

	/// Verifies the invariants listed on the type.
	pub(crate) fn check(&self) -> Result<(), String> {
		if !self.transitions.windows(2).all(|pair| pair[0].0 < pair[1].0) {
			return Err(format!("transitions of {:?} are not sorted", self.key));
		}
		if self.transitions.iter().any(|(_, weight)| !(weight.is_finite() && *weight >= 0.0)) {
			return Err(format!("negative or non finite weight after {:?}", self.key));
		}
		Ok(())
	}

	/// Merges another state into this one.
	///
	/// Both states must represent the same window (`key`).
	/// Transition weights are summed.
	///
	/// # Errors
	/// Returns an error if the state keys do not match.
	pub fn merge(&mut self, other: Self) -> Result<(), String> {
		if self.key != other.key {
			return Err("Key mismatch".to_owned());
		}

		for (next_token, weight) in other.transitions {
			self.add_transition(&next_token, weight);
		}

		Ok(())
	}
}
