use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};

use super::catalog::Catalog;
use super::store::RemoteStore;
use super::variant::{ArtifactFiles, ArtifactKey, ArtifactVariant, DateSpec};
use crate::error::{Result, WikilangsError};
use crate::io;

/// Local files of a resolved artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
	pub key: ArtifactKey,
	/// Main data file inside the cache directory.
	pub path: PathBuf,
	/// Metadata sidecar, when the snapshot publishes one.
	pub metadata_path: Option<PathBuf>,
}

/// Maps `(language, date, variant)` to files in the local cache, downloading
/// whatever is missing.
///
/// Cache layout: `{cache_dir}/{language}/{date}/{path in snapshot}`.
pub struct Resolver {
	catalog: Catalog,
	cache_dir: PathBuf,
}

impl Resolver {
	pub fn new<P: AsRef<Path>>(store: Arc<dyn RemoteStore>, cache_dir: P) -> Self {
		Self {
			catalog: Catalog::new(store),
			cache_dir: cache_dir.as_ref().to_path_buf(),
		}
	}

	pub fn catalog(&self) -> &Catalog {
		&self.catalog
	}

	pub fn cache_dir(&self) -> &Path {
		&self.cache_dir
	}

	/// Resolves an artifact to local files.
	///
	/// # Errors
	/// - `InvalidArgument` when `date` is neither `YYYYMMDD` nor `latest`
	/// - `UnsupportedVariant` when the parameters are outside the published
	///   sets, or the snapshot does not contain the artifact
	/// - `UnknownLanguage` when the language is not published
	/// - `ArtifactUnavailable` on storage or network failures
	/// - `MalformedArtifact` when a download is empty
	pub fn resolve(&self, language: &str, date: &str, variant: &ArtifactVariant) -> Result<ResolvedArtifact> {
		let date_spec: DateSpec = date.parse()?;
		variant.validate(language)?;
		self.catalog.ensure_language(language)?;
		let date = self.catalog.resolve_date(language, &date_spec)?;

		let files = self.select_files(language, &date, variant)?;
		let path = self.fetch_cached(language, &date, &files.data)?;
		let metadata_path = match &files.metadata {
			Some(metadata) => Some(self.fetch_cached(language, &date, metadata)?),
			None => None,
		};

		Ok(ResolvedArtifact {
			key: ArtifactKey { language: language.to_owned(), date, variant: *variant },
			path,
			metadata_path,
		})
	}

	/// First candidate whose data file is published. The metadata sidecar is
	/// kept only when it is published too.
	fn select_files(&self, language: &str, date: &str, variant: &ArtifactVariant) -> Result<ArtifactFiles> {
		let published = self.catalog.files(language, date)?;

		variant
			.candidates(language)
			.into_iter()
			.find(|candidate| published.contains(&candidate.data))
			.map(|candidate| ArtifactFiles {
				metadata: candidate.metadata.filter(|m| published.contains(m)),
				data: candidate.data,
			})
			.ok_or_else(|| {
				WikilangsError::unsupported(language, format!("{variant} is not published in snapshot {date}"))
			})
	}

	fn cache_path(&self, language: &str, date: &str, relative: &str) -> PathBuf {
		let mut path = self.cache_dir.join(language).join(date);
		path.extend(relative.split('/').filter(|part| !part.is_empty()));
		path
	}

	/// Returns the cached copy of a snapshot file, downloading it first when
	/// it is missing or empty.
	fn fetch_cached(&self, language: &str, date: &str, relative: &str) -> Result<PathBuf> {
		let destination = self.cache_path(language, date, relative);
		if is_cached(&destination) {
			debug!("Cache hit {}", destination.display());
			return Ok(destination);
		}

		info!("Downloading {language}/{date}/{relative}");
		let store = self.catalog.store();
		let written = io::write_atomic(&destination, |out| {
			let written = store.fetch(language, date, relative, out)?;
			if written == 0 {
				return Err(WikilangsError::malformed(&destination, "downloaded file is empty"));
			}
			Ok(written)
		})?;
		debug!("Stored {written} bytes in {}", destination.display());

		Ok(destination)
	}
}

fn is_cached(path: &Path) -> bool {
	fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}
