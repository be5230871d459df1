//! Published language listing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hub::Catalog;
use crate::hub::variant::DateSpec;

/// Descriptive record of a language code.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LanguageInfo {
	/// Code as published.
	pub code: String,
	pub name: String,
	/// ISO 639-1 code, when `code` has that shape.
	pub alpha_2: Option<String>,
	/// ISO 639-3 code, when `code` has that shape.
	pub alpha_3: Option<String>,
}

impl LanguageInfo {
	/// Derives what the code itself tells: two lowercase letters are an
	/// ISO 639-1 code, three an ISO 639-3 code.
	pub fn from_code(code: &str) -> Self {
		let is_alpha = |len: usize| code.len() == len && code.bytes().all(|b| b.is_ascii_lowercase());
		let upper = code.to_ascii_uppercase();

		if is_alpha(2) {
			Self {
				code: code.to_owned(),
				name: format!("{upper} (ISO 639-1)"),
				alpha_2: Some(code.to_owned()),
				alpha_3: None,
			}
		} else if is_alpha(3) {
			Self {
				code: code.to_owned(),
				name: format!("{upper} (ISO 639-3)"),
				alpha_2: None,
				alpha_3: Some(code.to_owned()),
			}
		} else {
			Self { code: code.to_owned(), name: format!("{upper} (Unknown)"), alpha_2: None, alpha_3: None }
		}
	}
}

impl fmt::Display for LanguageInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.code, self.name)
	}
}

/// Sorted language codes.
///
/// With an explicit date only languages publishing that snapshot are kept;
/// when none does, every language is returned.
pub fn languages(catalog: &Catalog, date: &str) -> Result<Vec<String>> {
	let all: Vec<String> = catalog.languages()?.into_iter().collect();

	let date = match date.parse::<DateSpec>()? {
		DateSpec::Latest => return Ok(all),
		DateSpec::Exact(date) => date,
	};

	let mut dated = Vec::new();
	for language in &all {
		if catalog.dates(language)?.contains(&date) {
			dated.push(language.clone());
		}
	}

	Ok(if dated.is_empty() { all } else { dated })
}

/// `languages` with a `LanguageInfo` per code.
pub fn languages_with_metadata(catalog: &Catalog, date: &str) -> Result<Vec<LanguageInfo>> {
	Ok(languages(catalog, date)?.iter().map(|code| LanguageInfo::from_code(code)).collect())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::hub::LocalMirror;
	use std::fs;
	use std::sync::Arc;

	#[test]
	fn test_language_info_from_code() {
		let en = LanguageInfo::from_code("en");
		assert_eq!(en.name, "EN (ISO 639-1)");
		assert_eq!(en.alpha_2.as_deref(), Some("en"));
		assert_eq!(en.to_string(), "en: EN (ISO 639-1)");

		let ary = LanguageInfo::from_code("ary");
		assert_eq!(ary.alpha_3.as_deref(), Some("ary"));
		assert_eq!(ary.name, "ARY (ISO 639-3)");

		let tarask = LanguageInfo::from_code("be-tarask");
		assert_eq!(tarask.name, "BE-TARASK (Unknown)");
		assert_eq!(tarask.alpha_2, None);
	}

	#[test]
	fn test_languages_for_date() {
		let dir = tempfile::tempdir().unwrap();
		for path in ["en/20240601", "en/20250101", "fr/20250101", "ary/20240601"] {
			fs::create_dir_all(dir.path().join(path)).unwrap();
		}
		let catalog = Catalog::new(Arc::new(LocalMirror::new(dir.path())));

		assert_eq!(languages(&catalog, "latest").unwrap(), vec!["ary", "en", "fr"]);
		assert_eq!(languages(&catalog, "20240601").unwrap(), vec!["ary", "en"]);
		// No language publishes this date: full list.
		assert_eq!(languages(&catalog, "20230101").unwrap(), vec!["ary", "en", "fr"]);
		assert!(languages(&catalog, "soon").is_err());
	}
}
