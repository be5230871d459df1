//! One typed entry point per model kind.

use std::path::Path;
use std::sync::Arc;

use log::info;

use crate::config::Config;
use crate::error::Result;
use crate::hub::{ArtifactVariant, HubStore, LocalMirror, RemoteStore, Resolver, TokenUnit, TokenizerFormat};
use crate::io::{self, Snapshot};
use crate::languages::{self, LanguageInfo};
use crate::model::{
	ArtifactMetadata, BpeTokenizer, MarkovChain, MarkovTable, NGramModel, NGramTable, Segmenter, Vocabulary,
	WhitespaceSegmenter,
};
use crate::model_cache::ModelCache;

/// Factory resolving, loading and caching models.
///
/// Every method takes a language code and a date (`YYYYMMDD` or `latest`)
/// and returns a shared handle; loading the same artifact twice returns the
/// same handle until the model cache is cleared.
pub struct Wikilangs {
	config: Config,
	resolver: Resolver,
	models: Arc<ModelCache>,
}

impl Wikilangs {
	/// Factory over the hub, or over the cache directory alone when
	/// `config.offline` is set.
	pub fn new(config: Config) -> Result<Self> {
		config.validate()?;
		let store: Arc<dyn RemoteStore> = if config.offline {
			info!("Offline mode, resolving from {}", config.cache_dir.display());
			Arc::new(LocalMirror::new(&config.cache_dir))
		} else {
			Arc::new(HubStore::new(&config)?)
		};
		Ok(Self::with_store(config, store, Arc::new(ModelCache::new())))
	}

	/// Factory configured from the environment.
	pub fn from_env() -> Result<Self> {
		Self::new(Config::from_env()?)
	}

	/// Factory over an explicit store and model cache.
	pub fn with_store(config: Config, store: Arc<dyn RemoteStore>, models: Arc<ModelCache>) -> Self {
		let resolver = Resolver::new(store, &config.cache_dir);
		Self { config, resolver, models }
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn resolver(&self) -> &Resolver {
		&self.resolver
	}

	pub fn model_cache(&self) -> &Arc<ModelCache> {
		&self.models
	}

	/// Drops every loaded model and forgets the catalog listings.
	pub fn clear(&self) {
		self.models.clear();
		self.resolver.catalog().invalidate();
	}

	fn load_table<T, F>(&self, source: &Path, build: F) -> Result<T>
	where
		T: Snapshot,
		F: FnOnce() -> Result<T>,
	{
		io::load_snapshot_or_build(source, self.config.snapshots, build)
	}

	/// Subword tokenizer of `vocab_size` pieces.
	pub fn tokenizer(
		&self,
		language: &str,
		date: &str,
		vocab_size: u32,
		format: TokenizerFormat,
	) -> Result<Arc<BpeTokenizer>> {
		let variant = ArtifactVariant::Tokenizer { vocab_size, format };
		let resolved = self.resolver.resolve(language, date, &variant)?;
		self.models.get_or_load(&resolved.key, || {
			info!("Loading {}", resolved.key);
			BpeTokenizer::load(&resolved.path, vocab_size, format)
		})
	}

	/// N-gram model of order `gram_size`.
	///
	/// Subword models segment text with the language's tokenizer of
	/// `config.companion_vocab_size` pieces from the same snapshot.
	pub fn ngram(&self, language: &str, date: &str, gram_size: usize, unit: TokenUnit) -> Result<Arc<NGramModel>> {
		let variant = ArtifactVariant::NGram { gram_size, unit };
		let resolved = self.resolver.resolve(language, date, &variant)?;

		let segmenter: Arc<dyn Segmenter> = match unit {
			TokenUnit::Word => Arc::new(WhitespaceSegmenter),
			TokenUnit::Subword => self.tokenizer(
				language,
				&resolved.key.date,
				self.config.companion_vocab_size,
				TokenizerFormat::SentencePiece,
			)?,
		};

		self.models.get_or_load(&resolved.key, || {
			info!("Loading {}", resolved.key);
			let table = self.load_table(&resolved.path, || NGramTable::load(&resolved.path, gram_size))?;
			let metadata = ArtifactMetadata::load_optional(resolved.metadata_path.as_deref())?;
			Ok(NGramModel::new(table, unit, segmenter).with_metadata(metadata))
		})
	}

	/// Markov chain over windows of `depth` tokens.
	pub fn markov(&self, language: &str, date: &str, depth: usize, unit: TokenUnit) -> Result<Arc<MarkovChain>> {
		let variant = ArtifactVariant::Markov { depth, unit };
		let resolved = self.resolver.resolve(language, date, &variant)?;
		self.models.get_or_load(&resolved.key, || {
			info!("Loading {}", resolved.key);
			let table = self.load_table(&resolved.path, || MarkovTable::load(&resolved.path, depth))?;
			let metadata = ArtifactMetadata::load_optional(resolved.metadata_path.as_deref())?;
			Ok(MarkovChain::new(table, unit).with_metadata(metadata))
		})
	}

	/// Vocabulary table.
	pub fn vocabulary(&self, language: &str, date: &str) -> Result<Arc<Vocabulary>> {
		let resolved = self.resolver.resolve(language, date, &ArtifactVariant::Vocabulary)?;
		self.models.get_or_load(&resolved.key, || {
			info!("Loading {}", resolved.key);
			let vocabulary = self.load_table(&resolved.path, || Vocabulary::load(&resolved.path))?;
			let metadata = ArtifactMetadata::load_optional(resolved.metadata_path.as_deref())?;
			Ok(vocabulary.with_metadata(metadata))
		})
	}

	/// Published language codes, sorted (see `languages::languages`).
	pub fn languages(&self, date: &str) -> Result<Vec<String>> {
		languages::languages(self.resolver.catalog(), date)
	}

	pub fn languages_with_metadata(&self, date: &str) -> Result<Vec<LanguageInfo>> {
		languages::languages_with_metadata(self.resolver.catalog(), date)
	}
}
