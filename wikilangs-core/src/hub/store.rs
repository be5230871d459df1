use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::LINK;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::variant::is_valid_date;
use crate::config::Config;
use crate::error::{Result, WikilangsError};
use crate::io;

/// Remote artifact storage.
///
/// Layout: one repository per language, one snapshot per `YYYYMMDD` date,
/// files addressed by `/` separated paths relative to the snapshot root.
pub trait RemoteStore: Send + Sync {
	/// Every published language code.
	fn list_languages(&self) -> Result<Vec<String>>;

	/// Snapshot dates published for `language`. Entries that are not valid
	/// `YYYYMMDD` dates are never returned.
	fn list_dates(&self, language: &str) -> Result<Vec<String>>;

	/// Every file path of a snapshot.
	fn list_files(&self, language: &str, date: &str) -> Result<Vec<String>>;

	/// Streams one file into `out`, returning the number of bytes written.
	fn fetch(&self, language: &str, date: &str, path: &str, out: &mut dyn Write) -> Result<u64>;
}

/// Directory tree laid out as `{root}/{language}/{date}/{path}`.
///
/// The artifact cache uses the same layout, so a `LocalMirror` rooted at the
/// cache directory serves offline resolution.
#[derive(Debug, Clone)]
pub struct LocalMirror {
	root: PathBuf,
}

impl LocalMirror {
	pub fn new<P: AsRef<Path>>(root: P) -> Self {
		Self { root: root.as_ref().to_path_buf() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}
}

fn storage_error(path: &Path, e: std::io::Error) -> WikilangsError {
	WikilangsError::unavailable(format!("{}: {e}", path.display()))
}

impl RemoteStore for LocalMirror {
	fn list_languages(&self) -> Result<Vec<String>> {
		io::list_dirs(&self.root).map_err(|e| storage_error(&self.root, e))
	}

	fn list_dates(&self, language: &str) -> Result<Vec<String>> {
		let dir = self.root.join(language);
		let dates = io::list_dirs(&dir).map_err(|e| storage_error(&dir, e))?;
		Ok(dates.into_iter().filter(|d| is_valid_date(d)).collect())
	}

	fn list_files(&self, language: &str, date: &str) -> Result<Vec<String>> {
		let dir = self.root.join(language).join(date);
		io::list_files_recursive(&dir).map_err(|e| storage_error(&dir, e))
	}

	fn fetch(&self, language: &str, date: &str, path: &str, out: &mut dyn Write) -> Result<u64> {
		let source = self.root.join(language).join(date).join(path);
		let mut file = File::open(&source).map_err(|e| storage_error(&source, e))?;
		std::io::copy(&mut file, out).map_err(|e| storage_error(&source, e))
	}
}

#[derive(Deserialize)]
struct ModelEntry {
	id: String,
}

#[derive(Deserialize)]
struct GitRef {
	name: String,
}

/// Repositories requested per page of the organization listing.
const PAGE_SIZE: &str = "1000";

/// Upper bound on followed `Link` pages.
const MAX_PAGES: usize = 100;

/// Target of the `rel="next"` entry of a `Link` header, if any.
///
/// `<https://host/api/models?cursor=abc>; rel="next"` gives
/// `https://host/api/models?cursor=abc`.
fn next_link(header: &str) -> Option<String> {
	header.split(',').find_map(|link| {
		let mut parts = link.split(';');
		let target = parts.next()?.trim().strip_prefix('<')?.strip_suffix('>')?;
		let is_next = parts.any(|param| {
			let param = param.trim();
			param.eq_ignore_ascii_case("rel=\"next\"") || param.eq_ignore_ascii_case("rel=next")
		});
		is_next.then(|| target.to_owned())
	})
}

#[derive(Deserialize, Default)]
struct GitRefs {
	#[serde(default)]
	branches: Vec<GitRef>,
	#[serde(default)]
	tags: Vec<GitRef>,
}

#[derive(Deserialize)]
struct TreeEntry {
	#[serde(rename = "type")]
	kind: String,
	path: String,
}

/// Model hub reached over its REST API with a blocking HTTP client.
///
/// - languages: repositories of the organization (`/api/models?author=`)
/// - dates: branches and tags named `YYYYMMDD` (`/api/models/{repo}/refs`)
/// - files: recursive tree of the snapshot (`/api/models/{repo}/tree/{date}`)
/// - downloads: `/{repo}/resolve/{date}/{path}`
#[derive(Debug, Clone)]
pub struct HubStore {
	client: Client,
	endpoint: String,
	organization: String,
	token: Option<String>,
}

impl HubStore {
	pub fn new(config: &Config) -> Result<Self> {
		let client = Client::builder()
			.timeout(Duration::from_secs(config.timeout_secs))
			.user_agent(concat!("wikilangs-core/", env!("CARGO_PKG_VERSION")))
			.build()?;
		Ok(Self {
			client,
			endpoint: config.endpoint.trim_end_matches('/').to_owned(),
			organization: config.organization.clone(),
			token: config.token.clone(),
		})
	}

	fn repo(&self, language: &str) -> String {
		format!("{}/{}", self.organization, language)
	}

	fn get(&self, url: &str) -> RequestBuilder {
		let request = self.client.get(url);
		match &self.token {
			Some(token) => request.bearer_auth(token),
			None => request,
		}
	}

	fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
		self.get_page(url, query).map(|(body, _)| body)
	}

	/// Decoded body and the URL of the next page announced by `Link`.
	fn get_page<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<(T, Option<String>)> {
		debug!("GET {url}");
		let response = self.get(url).query(query).send()?;
		if response.status() == StatusCode::NOT_FOUND {
			return Err(WikilangsError::unavailable(format!("{url}: not found")));
		}
		let response = response.error_for_status()?;
		let next = response.headers().get(LINK).and_then(|value| value.to_str().ok()).and_then(next_link);
		let text = response.text()?;
		let body = serde_json::from_str(&text)
			.map_err(|e| WikilangsError::unavailable(format!("Unexpected response from {url}: {e}")))?;
		Ok((body, next))
	}
}

impl RemoteStore for HubStore {
	/// Follows `Link: <...>; rel="next"` until the listing is exhausted.
	fn list_languages(&self) -> Result<Vec<String>> {
		let url = format!("{}/api/models", self.endpoint);
		let (mut models, mut next): (Vec<ModelEntry>, _) =
			self.get_page(&url, &[("author", self.organization.as_str()), ("limit", PAGE_SIZE)])?;

		let mut pages = 1;
		while let Some(page_url) = next {
			if pages == MAX_PAGES {
				warn!("Language listing truncated after {MAX_PAGES} pages");
				break;
			}
			// The next link already carries the query.
			let (page, following): (Vec<ModelEntry>, _) = self.get_page(&page_url, &[])?;
			models.extend(page);
			next = following;
			pages += 1;
		}

		let prefix = format!("{}/", self.organization);
		let mut languages: Vec<String> = models
			.into_iter()
			.filter_map(|model| model.id.strip_prefix(&prefix).map(str::to_owned))
			.collect();
		languages.sort();
		languages.dedup();
		Ok(languages)
	}

	fn list_dates(&self, language: &str) -> Result<Vec<String>> {
		let url = format!("{}/api/models/{}/refs", self.endpoint, self.repo(language));
		let refs: GitRefs = self.get_json(&url, &[])?;
		Ok(refs
			.branches
			.into_iter()
			.chain(refs.tags)
			.map(|r| r.name)
			.filter(|name| is_valid_date(name))
			.collect())
	}

	fn list_files(&self, language: &str, date: &str) -> Result<Vec<String>> {
		let url = format!("{}/api/models/{}/tree/{}/models", self.endpoint, self.repo(language), date);
		let entries: Vec<TreeEntry> = self.get_json(&url, &[("recursive", "true")])?;
		Ok(entries
			.into_iter()
			.filter(|entry| entry.kind == "file")
			.map(|entry| entry.path)
			.collect())
	}

	fn fetch(&self, language: &str, date: &str, path: &str, out: &mut dyn Write) -> Result<u64> {
		let url = format!("{}/{}/resolve/{}/{}", self.endpoint, self.repo(language), date, path);
		debug!("GET {url}");
		let mut response = self.get(&url).send()?.error_for_status()?;
		response
			.copy_to(out)
			.map_err(|e| WikilangsError::unavailable(format!("Download of {url} failed: {e}")))
	}
}

/// Wrapper counting `fetch` calls, used to observe cache behaviour.
#[cfg(test)]
pub(crate) struct CountingStore<S> {
	pub inner: S,
	pub fetches: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl<S: RemoteStore> RemoteStore for CountingStore<S> {
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
		self.fetches.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
		self.inner.fetch(language, date, path, out)
	}
}
