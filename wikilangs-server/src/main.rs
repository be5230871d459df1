use std::env;
use std::path::Path;

use actix_web::http::StatusCode;
use actix_web::{App, HttpResponse, HttpServer, Responder, delete, get, web};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use wikilangs_core::model::{Fallback, GenerationInput, VocabularyEntry};
use wikilangs_core::{Config, LanguageInfo, TokenUnit, TokenizerFormat, Wikilangs, WikilangsError};

const DEFAULT_BIND: &str = "127.0.0.1:5000";

fn default_date() -> String {
	"latest".to_owned()
}

fn default_unit() -> String {
	TokenUnit::Word.to_string()
}

#[derive(Deserialize)]
struct LanguagesQuery {
	#[serde(default = "default_date")]
	date: String,
	metadata: Option<bool>,
}

#[derive(Deserialize)]
struct VocabularyQuery {
	lang: String,
	#[serde(default = "default_date")]
	date: String,
	word: Option<String>,
	prefix: Option<String>,
	top_k: Option<usize>,
}

/// Query parameters of `/v1/score` and `/v1/predict`.
#[derive(Deserialize)]
struct NGramQuery {
	lang: String,
	#[serde(default = "default_date")]
	date: String,
	n: Option<usize>,
	#[serde(default = "default_unit")]
	unit: String,
	text: String,
	top_k: Option<usize>,
}

#[derive(Deserialize)]
struct GenerateQuery {
	lang: String,
	#[serde(default = "default_date")]
	date: String,
	depth: Option<usize>,
	#[serde(default = "default_unit")]
	unit: String,
	length: Option<usize>,
	/// Space separated seed tokens.
	seed: Option<String>,
	rng_seed: Option<u64>,
	fallback: Option<String>,
}

impl GenerateQuery {
	fn generation_input(&self) -> Result<GenerationInput, WikilangsError> {
		let mut input = GenerationInput::new(self.length.unwrap_or(50));
		if let Some(seed) = self.seed.as_deref().filter(|s| !s.trim().is_empty()) {
			input = input.with_seed_context(seed.split_whitespace());
		}
		if let Some(rng_seed) = self.rng_seed {
			input = input.with_rng_seed(rng_seed);
		}
		if let Some(fallback) = &self.fallback {
			input = input.with_fallback(fallback.parse::<Fallback>()?);
		}
		Ok(input)
	}
}

#[derive(Deserialize)]
struct TokenizeQuery {
	lang: String,
	#[serde(default = "default_date")]
	date: String,
	vocab_size: Option<u32>,
	format: Option<String>,
	text: String,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Languages {
	Codes(Vec<String>),
	Detailed(Vec<LanguageInfo>),
}

#[derive(Serialize)]
#[serde(untagged)]
enum VocabularyAnswer {
	Entry(Option<VocabularyEntry>),
	Words(Vec<String>),
}

#[derive(Serialize)]
struct Score {
	score: f64,
}

#[derive(Serialize)]
struct Prediction {
	token: String,
	probability: f64,
}

#[derive(Serialize)]
struct Generated {
	text: String,
}

#[derive(Serialize)]
struct Tokenized {
	tokens: Vec<String>,
	ids: Vec<u32>,
}

fn status_of(err: &WikilangsError) -> StatusCode {
	match err {
		WikilangsError::UnknownLanguage { .. } => StatusCode::NOT_FOUND,
		WikilangsError::InvalidArgument(_) | WikilangsError::UnsupportedVariant { .. } => StatusCode::BAD_REQUEST,
		WikilangsError::ArtifactUnavailable { .. } => StatusCode::BAD_GATEWAY,
		_ => StatusCode::INTERNAL_SERVER_ERROR,
	}
}

/// Runs `work` on the blocking pool and renders its outcome as JSON.
async fn respond<T, F>(data: web::Data<Wikilangs>, work: F) -> HttpResponse
where
	T: Serialize + Send + 'static,
	F: FnOnce(&Wikilangs) -> Result<T, WikilangsError> + Send + 'static,
{
	match web::block(move || work(&data)).await {
		Ok(Ok(value)) => HttpResponse::Ok().json(value),
		Ok(Err(e)) => {
			let status = status_of(&e);
			if status.is_server_error() {
				error!("{e}");
			} else {
				warn!("{e}");
			}
			HttpResponse::build(status).body(e.to_string())
		}
		Err(e) => {
			error!("Blocking task failed: {e}");
			HttpResponse::InternalServerError().body("Request worker failed")
		}
	}
}

#[get("/v1/languages")]
async fn get_languages(data: web::Data<Wikilangs>, query: web::Query<LanguagesQuery>) -> impl Responder {
	let query = query.into_inner();
	respond(data, move |wikilangs| {
		if query.metadata.unwrap_or(false) {
			Ok(Languages::Detailed(wikilangs.languages_with_metadata(&query.date)?))
		} else {
			Ok(Languages::Codes(wikilangs.languages(&query.date)?))
		}
	})
	.await
}

/// `word` looks one token up, `prefix` lists the most frequent completions.
#[get("/v1/vocabulary")]
async fn get_vocabulary(data: web::Data<Wikilangs>, query: web::Query<VocabularyQuery>) -> impl Responder {
	let query = query.into_inner();
	respond(data, move |wikilangs| {
		let vocabulary = wikilangs.vocabulary(&query.lang, &query.date)?;
		match (&query.word, &query.prefix) {
			(Some(word), _) => Ok(VocabularyAnswer::Entry(vocabulary.lookup(word).cloned())),
			(None, Some(prefix)) => {
				let words = vocabulary.words_with_prefix(prefix, query.top_k.unwrap_or(10));
				Ok(VocabularyAnswer::Words(words.into_iter().map(str::to_owned).collect()))
			}
			(None, None) => Err(WikilangsError::InvalidArgument("either 'word' or 'prefix' is required".into())),
		}
	})
	.await
}

#[get("/v1/score")]
async fn get_score(data: web::Data<Wikilangs>, query: web::Query<NGramQuery>) -> impl Responder {
	let query = query.into_inner();
	respond(data, move |wikilangs| {
		let model = wikilangs.ngram(&query.lang, &query.date, query.n.unwrap_or(3), query.unit.parse()?)?;
		Ok(Score { score: model.score(&query.text) })
	})
	.await
}

#[get("/v1/predict")]
async fn get_predict(data: web::Data<Wikilangs>, query: web::Query<NGramQuery>) -> impl Responder {
	let query = query.into_inner();
	respond(data, move |wikilangs| {
		let model = wikilangs.ngram(&query.lang, &query.date, query.n.unwrap_or(3), query.unit.parse()?)?;
		let predictions = model
			.predict_next(&query.text, query.top_k.unwrap_or(5))
			.into_iter()
			.map(|(token, probability)| Prediction { token, probability })
			.collect::<Vec<_>>();
		Ok(predictions)
	})
	.await
}

#[get("/v1/generate")]
async fn get_generated(data: web::Data<Wikilangs>, query: web::Query<GenerateQuery>) -> impl Responder {
	let query = query.into_inner();
	respond(data, move |wikilangs| {
		let input = query.generation_input()?;
		let chain = wikilangs.markov(&query.lang, &query.date, query.depth.unwrap_or(2), query.unit.parse()?)?;
		Ok(Generated { text: chain.generate_with(&input) })
	})
	.await
}

#[get("/v1/tokenize")]
async fn get_tokenized(data: web::Data<Wikilangs>, query: web::Query<TokenizeQuery>) -> impl Responder {
	let query = query.into_inner();
	respond(data, move |wikilangs| {
		let format = match &query.format {
			Some(format) => format.parse::<TokenizerFormat>()?,
			None => TokenizerFormat::SentencePiece,
		};
		let tokenizer = wikilangs.tokenizer(&query.lang, &query.date, query.vocab_size.unwrap_or(16000), format)?;
		Ok(Tokenized { tokens: tokenizer.tokenize(&query.text)?, ids: tokenizer.encode(&query.text)? })
	})
	.await
}

/// Releases every loaded model; the next request reloads from the cache.
#[delete("/v1/models")]
async fn delete_models(data: web::Data<Wikilangs>) -> impl Responder {
	let released = data.model_cache().len();
	data.clear();
	info!("Released {released} models");
	HttpResponse::Ok().body(format!("Released {released} models"))
}

/// TOML file named by `WIKILANGS_CONFIG` when set, then environment overrides.
fn load_config() -> Result<Config, WikilangsError> {
	let mut config = match env::var("WIKILANGS_CONFIG") {
		Ok(path) => Config::from_file(Path::new(&path))?,
		Err(_) => Config::default(),
	};
	config.apply_env(|key| env::var(key).ok())?;
	Ok(config)
}

/// Main entry point for the server.
///
/// The factory is built before the runtime starts; `WIKILANGS_BIND` sets the
/// listening address.
fn main() -> std::io::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let config = load_config().map_err(std::io::Error::other)?;
	info!("Artifact cache in {}", config.cache_dir.display());
	let wikilangs = Wikilangs::new(config).map_err(std::io::Error::other)?;
	let bind = env::var("WIKILANGS_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_owned());
	let shared = web::Data::new(wikilangs);

	actix_web::rt::System::new().block_on(async move {
		info!("Listening on {bind}");
		HttpServer::new(move || {
			App::new()
				.app_data(shared.clone())
				.service(get_languages)
				.service(get_vocabulary)
				.service(get_score)
				.service(get_predict)
				.service(get_generated)
				.service(get_tokenized)
				.service(delete_models)
		})
		.bind(bind.as_str())?
		.run()
		.await
	})
}
