/// Splits raw text into the token unit a table was built from.
pub trait Segmenter: Send + Sync {
	fn segment(&self, text: &str) -> Vec<String>;
}

/// Word unit: tokens are the whitespace separated parts of the text.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceSegmenter;

impl Segmenter for WhitespaceSegmenter {
	fn segment(&self, text: &str) -> Vec<String> {
		text.split_whitespace().map(str::to_owned).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_whitespace_segmenter() {
		let tokens = WhitespaceSegmenter.segment("  the\tcat \n sat ");
		assert_eq!(tokens, vec!["the", "cat", "sat"]);
		assert!(WhitespaceSegmenter.segment("   ").is_empty());
	}
}
