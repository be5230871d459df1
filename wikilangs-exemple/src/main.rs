use wikilangs_core::model::{Fallback, GenerationInput};
use wikilangs_core::{TokenUnit, TokenizerFormat, Wikilangs, WikilangsError};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Configuration comes from WIKILANGS_* variables (cache dir, endpoint, offline...)
    let wikilangs = Wikilangs::from_env()?;

    // Language to play with, "en" when none is given
    let language = std::env::args().nth(1).unwrap_or_else(|| "en".to_owned());

    let languages = wikilangs.languages("latest")?;
    println!("{} languages published, first ones: {:?}", languages.len(), &languages[..languages.len().min(10)]);

    // Vocabulary of the newest snapshot
    let vocabulary = wikilangs.vocabulary(&language, "latest")?;
    println!("Vocabulary: {} tokens", vocabulary.len());
    for entry in vocabulary.iter().take(5) {
        println!("  #{} {} (frequency {}, idf {:.3})", entry.rank, entry.token, entry.frequency, entry.idf_score);
    }
    println!("Completions of 'th': {:?}", vocabulary.words_with_prefix("th", 5));

    // Scoring: higher (closer to 0) is more likely
    let trigrams = wikilangs.ngram(&language, "latest", 3, TokenUnit::Word)?;
    for text in ["the cat sat on the mat", "mat the on sat cat the"] {
        println!("score({text:?}) = {:.4}", trigrams.score(text));
    }
    for (token, probability) in trigrams.predict_next("on the", 5) {
        println!("  on the -> {token} ({probability:.4})");
    }

    // Generation: a fixed seed gives the same text on every run
    let chain = wikilangs.markov(&language, "latest", 2, TokenUnit::Word)?;
    let input = GenerationInput::new(30).with_seed_context(["the"]).with_rng_seed(42).with_fallback(Fallback::Restart);
    for i in 0..3 {
        println!("Generated text {}: {}", i + 1, chain.generate_with(&input));
    }
    println!("Unseeded: {}", chain.generate(30, None));

    // Tokenizer round trip
    let tokenizer = wikilangs.tokenizer(&language, "latest", 16000, TokenizerFormat::SentencePiece)?;
    let ids = tokenizer.encode("the cat sat on the mat")?;
    println!("ids: {ids:?}");
    println!("decoded: {}", tokenizer.decode(&ids)?);

    // Asking for a variant that is never published
    match wikilangs.ngram(&language, "latest", 9, TokenUnit::Word) {
        Ok(_) => println!("Should not happen"),
        Err(WikilangsError::UnsupportedVariant { reason, .. }) => println!("9-grams are not available: {reason}"),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
