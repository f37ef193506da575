use anyhow::{Context, Result};
use std::path::Path;
use tantivy::schema::{Schema, TextFieldIndexing, TextOptions, IndexRecordOption, STRING, STORED};
use tantivy::tokenizer::{TextAnalyzer, LowerCaser, RemoveLongFilter, StopWordFilter, Token, TokenStream, Tokenizer};
use tantivy::Index;

pub const TOKENIZER_NAME: &str = "text_with_stopwords";

pub const DEFAULT_STOP_WORDS: &[&str] = &[
	"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
];

/// `id` and `dir` are raw keyword fields; `text` is analyzed with the stopword tokenizer.
pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	let _id_field = schema_builder.add_text_field("id", STRING | STORED);
	let _dir_field = schema_builder.add_text_field("dir", STRING);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(TOKENIZER_NAME).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing);
	let _text_field = schema_builder.add_text_field("text", text_options);
	schema_builder.build()
}

/// Register the analyzer shared by indexing and query parsing, so both sides
/// see the same terms.
pub fn register_tokenizer(index: &Index, stop_words: &[String]) {
	let tokenizer = TextAnalyzer::builder(CjkAwareTokenizer)
		.filter(RemoveLongFilter::limit(64))
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(stop_words.iter().map(|s| s.to_lowercase())))
		.build();
	index.tokenizers().register(TOKENIZER_NAME, tokenizer);
}

/// Splits on non-alphanumeric characters like tantivy's `SimpleTokenizer`,
/// except that runs of CJK ideographs, kana and hangul become overlapping
/// bigrams (a lone character stays a unigram). CJK text has no word
/// separators, so a whole sentence would otherwise be one token.
#[derive(Clone, Default)]
pub struct CjkAwareTokenizer;

pub struct BufferedTokenStream {
	tokens: Vec<Token>,
	cursor: usize,
}

impl TokenStream for BufferedTokenStream {
	fn advance(&mut self) -> bool {
		if self.cursor < self.tokens.len() {
			self.cursor += 1;
			true
		} else {
			false
		}
	}

	fn token(&self) -> &Token { &self.tokens[self.cursor.saturating_sub(1)] }

	fn token_mut(&mut self) -> &mut Token { &mut self.tokens[self.cursor.saturating_sub(1)] }
}

impl Tokenizer for CjkAwareTokenizer {
	type TokenStream<'a> = BufferedTokenStream;

	fn token_stream<'a>(&'a mut self, text: &'a str) -> Self::TokenStream<'a> {
		BufferedTokenStream { tokens: split_tokens(text), cursor: 0 }
	}
}

pub fn is_cjk(c: char) -> bool {
	matches!(c as u32,
		0x3040..=0x30FF     // hiragana, katakana
		| 0x3400..=0x4DBF   // CJK extension A
		| 0x4E00..=0x9FFF   // CJK unified ideographs
		| 0xAC00..=0xD7AF   // hangul syllables
		| 0xF900..=0xFAFF   // compatibility ideographs
		| 0x20000..=0x2FA1F // extensions B and later
	)
}

fn split_tokens(text: &str) -> Vec<Token> {
	let mut tokens = Vec::new();
	let mut push = |from: usize, to: usize| {
		let position = tokens.len();
		tokens.push(Token { offset_from: from, offset_to: to, position, text: text[from..to].to_string(), position_length: 1 });
	};
	let mut word_start: Option<usize> = None;
	let mut cjk_run: Vec<(usize, usize)> = Vec::new();
	let flush_cjk = |run: &mut Vec<(usize, usize)>, push: &mut dyn FnMut(usize, usize)| {
		match run.len() {
			0 => {}
			1 => push(run[0].0, run[0].1),
			_ => {
				for pair in run.windows(2) { push(pair[0].0, pair[1].1); }
			}
		}
		run.clear();
	};
	for (i, c) in text.char_indices() {
		let end = i + c.len_utf8();
		if is_cjk(c) {
			if let Some(start) = word_start.take() { push(start, i); }
			cjk_run.push((i, end));
		} else if c.is_alphanumeric() {
			flush_cjk(&mut cjk_run, &mut push);
			word_start.get_or_insert(i);
		} else {
			flush_cjk(&mut cjk_run, &mut push);
			if let Some(start) = word_start.take() { push(start, i); }
		}
	}
	flush_cjk(&mut cjk_run, &mut push);
	if let Some(start) = word_start { push(start, text.len()); }
	tokens
}

pub fn default_stop_words() -> Vec<String> { DEFAULT_STOP_WORDS.iter().map(|s| s.to_string()).collect() }

/// One stopword per line; blank lines are ignored.
pub fn load_stop_words(path: &Path) -> Result<Vec<String>> {
	let content = std::fs::read_to_string(path).with_context(|| format!("reading stopwords from {}", path.display()))?;
	Ok(content.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect())
}
