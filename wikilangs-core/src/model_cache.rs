//! Process-scoped cache of loaded models.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::error::{Result, WikilangsError};
use crate::hub::ArtifactKey;

type Entry = Arc<dyn Any + Send + Sync>;

/// Loaded models keyed by the artifact they were built from.
///
/// The cache is an explicit value injected into the factory: tests build an
/// isolated one, servers share one, and `evict` / `clear` release memory.
#[derive(Default)]
pub struct ModelCache {
	entries: Mutex<HashMap<ArtifactKey, Entry>>,
}

impl ModelCache {
	pub fn new() -> Self {
		Self::default()
	}

	fn entries(&self) -> MutexGuard<'_, HashMap<ArtifactKey, Entry>> {
		self.entries.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Returns the cached model for `key`, loading it on a miss.
	///
	/// The lock is not held while `load` runs, so two threads missing the same
	/// key may both load; the first stored value wins.
	pub fn get_or_load<T, F>(&self, key: &ArtifactKey, load: F) -> Result<Arc<T>>
	where
		T: Any + Send + Sync,
		F: FnOnce() -> Result<T>,
	{
		if let Some(model) = self.get::<T>(key) {
			debug!("Model cache hit for {key}");
			return Ok(model);
		}

		let loaded: Entry = Arc::new(load()?);
		let stored = Arc::clone(self.entries().entry(key.clone()).or_insert(loaded));
		stored.downcast::<T>().map_err(|_| WikilangsError::CacheTypeMismatch {
			key: key.to_string(),
			expected: std::any::type_name::<T>(),
		})
	}

	/// Cached model for `key`, if any.
	pub fn get<T: Any + Send + Sync>(&self, key: &ArtifactKey) -> Option<Arc<T>> {
		let entry = self.entries().get(key).cloned()?;
		entry.downcast::<T>().ok()
	}

	/// Drops the entry of `key`. Handles already given out stay valid.
	pub fn evict(&self, key: &ArtifactKey) -> bool {
		self.entries().remove(key).is_some()
	}

	pub fn clear(&self) {
		self.entries().clear();
	}

	pub fn len(&self) -> usize {
		self.entries().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries().is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::hub::ArtifactVariant;
	use std::cell::Cell;

	fn key(language: &str) -> ArtifactKey {
		ArtifactKey {
			language: language.to_owned(),
			date: "20250101".to_owned(),
			variant: ArtifactVariant::Vocabulary,
		}
	}

	#[test]
	fn test_loads_once() {
		let cache = ModelCache::new();
		let loads = Cell::new(0);
		let load = || {
			loads.set(loads.get() + 1);
			Ok(vec![1u32, 2, 3])
		};

		let first = cache.get_or_load(&key("en"), load).unwrap();
		let second = cache.get_or_load(&key("en"), load).unwrap();
		assert!(Arc::ptr_eq(&first, &second));
		assert_eq!(loads.get(), 1);
		assert_eq!(cache.len(), 1);
	}

	#[test]
	fn test_evict_and_clear() {
		let cache = ModelCache::new();
		cache.get_or_load(&key("en"), || Ok(1u8)).unwrap();
		cache.get_or_load(&key("fr"), || Ok(2u8)).unwrap();

		assert!(cache.evict(&key("en")));
		assert!(!cache.evict(&key("en")));
		assert!(cache.get::<u8>(&key("en")).is_none());
		assert_eq!(cache.get::<u8>(&key("fr")).as_deref(), Some(&2));

		cache.clear();
		assert!(cache.is_empty());
	}

	#[test]
	fn test_load_error_is_not_cached() {
		let cache = ModelCache::new();
		let failed: Result<Arc<u8>> =
			cache.get_or_load(&key("en"), || Err(WikilangsError::InvalidArgument("boom".into())));
		assert!(failed.is_err());
		assert!(cache.is_empty());
	}

	#[test]
	fn test_same_key_as_another_type() {
		let cache = ModelCache::new();
		cache.get_or_load(&key("en"), || Ok(1u8)).unwrap();

		let err = cache.get_or_load(&key("en"), || Ok("one".to_owned())).unwrap_err();
		assert!(matches!(err, WikilangsError::CacheTypeMismatch { expected, .. } if expected.contains("String")));
		// The first model stays cached.
		assert_eq!(cache.get::<u8>(&key("en")).as_deref(), Some(&1));
	}
}
