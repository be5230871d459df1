use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use super::store::RemoteStore;
use super::variant::{DateSpec, is_valid_date};
use crate::error::{Result, WikilangsError};

#[derive(Default)]
struct Listings {
	languages: Option<BTreeSet<String>>,
	dates: HashMap<String, BTreeSet<String>>,
	files: HashMap<(String, String), Arc<BTreeSet<String>>>,
}

/// Memoised view of what a `RemoteStore` publishes.
///
/// Each listing is fetched at most once per process until `invalidate` is
/// called, so resolving `latest` stays deterministic for the lifetime of the
/// catalog.
pub struct Catalog {
	store: Arc<dyn RemoteStore>,
	listings: Mutex<Listings>,
}

impl Catalog {
	pub fn new(store: Arc<dyn RemoteStore>) -> Self {
		Self { store, listings: Mutex::new(Listings::default()) }
	}

	pub fn store(&self) -> &Arc<dyn RemoteStore> {
		&self.store
	}

	fn listings(&self) -> MutexGuard<'_, Listings> {
		self.listings.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Every published language code, sorted.
	pub fn languages(&self) -> Result<BTreeSet<String>> {
		if let Some(languages) = &self.listings().languages {
			return Ok(languages.clone());
		}

		let languages: BTreeSet<String> = self.store.list_languages()?.into_iter().collect();
		debug!("Catalog lists {} languages", languages.len());
		self.listings().languages = Some(languages.clone());
		Ok(languages)
	}

	/// Fails with `UnknownLanguage` when `language` is not published.
	pub fn ensure_language(&self, language: &str) -> Result<()> {
		if language.trim().is_empty() || !self.languages()?.contains(language) {
			return Err(WikilangsError::UnknownLanguage { language: language.to_owned() });
		}
		Ok(())
	}

	/// Published snapshot dates of `language`, sorted ascending.
	pub fn dates(&self, language: &str) -> Result<BTreeSet<String>> {
		if let Some(dates) = self.listings().dates.get(language) {
			return Ok(dates.clone());
		}

		let dates: BTreeSet<String> = self
			.store
			.list_dates(language)?
			.into_iter()
			.filter(|d| is_valid_date(d))
			.collect();
		debug!("Catalog lists {} dates for '{language}'", dates.len());
		self.listings().dates.insert(language.to_owned(), dates.clone());
		Ok(dates)
	}

	/// Turns a date request into a concrete published date.
	///
	/// `Latest` picks the greatest published date; an explicit date must be
	/// published.
	pub fn resolve_date(&self, language: &str, date: &DateSpec) -> Result<String> {
		let dates = self.dates(language)?;
		match date {
			DateSpec::Latest => dates.last().cloned().ok_or_else(|| {
				WikilangsError::unavailable(format!("No snapshot published for '{language}'"))
			}),
			DateSpec::Exact(date) if dates.contains(date) => Ok(date.clone()),
			DateSpec::Exact(date) => Err(WikilangsError::unavailable(format!(
				"Snapshot {date} is not published for '{language}'"
			))),
		}
	}

	/// File paths of one snapshot.
	pub fn files(&self, language: &str, date: &str) -> Result<Arc<BTreeSet<String>>> {
		let key = (language.to_owned(), date.to_owned());
		if let Some(files) = self.listings().files.get(&key) {
			return Ok(Arc::clone(files));
		}

		let files: Arc<BTreeSet<String>> = Arc::new(self.store.list_files(language, date)?.into_iter().collect());
		debug!("Catalog lists {} files for '{language}' at {date}", files.len());
		self.listings().files.insert(key, Arc::clone(&files));
		Ok(files)
	}

	/// Forgets every memoised listing.
	pub fn invalidate(&self) {
		*self.listings() = Listings::default();
	}
}
