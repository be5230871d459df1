#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;
use wikilangs_core::hub::{LocalMirror, RemoteStore};
use wikilangs_core::{Config, ModelCache, Result, Wikilangs};

pub fn mirror_root() -> PathBuf {
	PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/mirror")
}

/// Fixture mirror counting the files it serves.
pub struct CountingStore {
	inner: LocalMirror,
	fetches: AtomicUsize,
}

impl CountingStore {
	pub fn new() -> Self {
		Self { inner: LocalMirror::new(mirror_root()), fetches: AtomicUsize::new(0) }
	}

	pub fn fetches(&self) -> usize {
		self.fetches.load(Ordering::SeqCst)
	}
}

impl RemoteStore for CountingStore {
	fn list_languages(&self) -> Result<Vec<String>> {
		self.inner.list_languages()
	}

	fn list_dates(&self, language: &str) -> Result<Vec<String>> {
		self.inner.list_dates(language)
	}

	fn list_files(&self, language: &str, date: &str) -> Result<Vec<String>> {
		self.inner.list_files(language, date)
	}

	fn fetch(&self, language: &str, date: &str, path: &str, out: &mut dyn Write) -> Result<u64> {
		self.fetches.fetch_add(1, Ordering::SeqCst);
		self.inner.fetch(language, date, path, out)
	}
}

/// Factory over the fixture mirror with a throwaway cache directory.
///
/// The `TempDir` must outlive the factory.
pub struct Fixture {
	pub cache: TempDir,
	pub store: Arc<CountingStore>,
	pub wikilangs: Wikilangs,
}

pub fn fixture() -> Fixture {
	fixture_with(|_| {})
}

pub fn fixture_with(tune: impl FnOnce(&mut Config)) -> Fixture {
	let cache = tempfile::tempdir().unwrap();
	let mut config = Config { cache_dir: cache.path().to_path_buf(), ..Config::default() };
	tune(&mut config);

	let store = Arc::new(CountingStore::new());
	let wikilangs = Wikilangs::with_store(config, store.clone(), Arc::new(ModelCache::new()));
	Fixture { cache, store, wikilangs }
}
