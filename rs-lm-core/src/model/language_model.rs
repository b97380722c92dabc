use std::fs;
use std::io;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::io::{build_output_path, read_file};
use crate::model::generator::Generator;
use crate::model::ngram_index::NgramIndex;
use crate::model::predictor::{self, Prediction};
use crate::model::storage;
use crate::model::tokenizer;
use crate::model::vocabulary::Vocabulary;

/// Largest top-k the evaluation helper will score against.
const MAX_EVAL_TOP_K: usize = 64;

/// A complete word-level n-gram language model.
///
/// Holds the vocabulary, the trie-backed n-gram index, the maximum
/// order, and the number of training tokens seen. Created empty,
/// mutated only by training or loading, then used read-only by
/// prediction and generation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LanguageModel {
	vocab: Vocabulary,
	ngrams: NgramIndex,
	max_n: usize,
	total_tokens: u64,
}

impl LanguageModel {
	/// Creates an empty model accepting n-grams of order `1..=max_n`.
	///
	/// # Errors
	/// Returns an error if `max_n < 1`.
	pub fn new(max_n: usize) -> Result<Self, String> {
		Ok(Self {
			vocab: Vocabulary::new(),
			ngrams: NgramIndex::new(max_n)?,
			max_n,
			total_tokens: 0,
		})
	}

	/// Builds a model from a corpus file, with a compiled-model cache.
	///
	/// If a `.bin` snapshot sits next to the corpus it is loaded
	/// directly; otherwise the corpus is trained from scratch and the
	/// snapshot is written for the next run. The snapshot carries its
	/// own order, so `max_n` only applies when training happens.
	///
	/// # Errors
	/// Fails on I/O errors, on snapshot decoding errors, and on
	/// `max_n < 1`.
	pub fn from_corpus<P: AsRef<Path>>(
		filepath: P,
		max_n: usize,
	) -> Result<Self, Box<dyn std::error::Error>> {
		let snapshot_path = build_output_path(&filepath, "bin")?;
		if snapshot_path.exists() {
			let bytes = fs::read(&snapshot_path)?;
			let model: Self = postcard::from_bytes(&bytes)?;
			info!(
				"loaded compiled model from {} ({} tokens)",
				snapshot_path.display(),
				model.vocab.size()
			);
			return Ok(model);
		}

		let mut model = Self::new(max_n)?;
		model.train_from_file(&filepath)?;

		let bytes = postcard::to_stdvec(&model)?;
		fs::write(&snapshot_path, bytes)?;
		Ok(model)
	}

	/// Trains on a single corpus line.
	///
	/// Tokenizes the line, assigns ids, counts every token toward the
	/// unigram total and records all n-grams. Lines with no tokens are
	/// skipped.
	pub fn train_line(&mut self, line: &str) {
		let tokens = tokenizer::tokenize_line(line);
		if tokens.is_empty() {
			return;
		}

		let ids: Vec<u32> = tokens
			.iter()
			.map(|token| self.vocab.get_or_add(token))
			.collect();
		self.total_tokens += ids.len() as u64;
		self.ngrams.update_all(&ids);
	}

	/// Trains on every line of a corpus file.
	///
	/// # Errors
	/// Only I/O errors surface; malformed text cannot occur because
	/// tokenization is total.
	pub fn train_from_file<P: AsRef<Path>>(&mut self, filepath: P) -> io::Result<()> {
		let lines = read_file(&filepath)?;
		for line in &lines {
			self.train_line(line);
		}
		info!(
			"trained {} lines: {} tokens, vocabulary {}",
			lines.len(),
			self.total_tokens,
			self.vocab.size()
		);
		Ok(())
	}

	/// Writes the model to `<prefix>.vocab`, `.uni`, `.bi` and `.tri`.
	///
	/// Orders above 3 stay in memory only.
	///
	/// # Errors
	/// Surfaces the first file creation or write error.
	pub fn save(&self, prefix: &str) -> io::Result<()> {
		storage::save(self, prefix)
	}

	/// Loads model tables written by [`LanguageModel::save`].
	///
	/// The vocabulary is replaced wholesale; n-gram counts are added
	/// into the current index, so loading into a fresh model restores
	/// the saved counts exactly.
	///
	/// # Errors
	/// A missing or unreadable vocab file is an error. Missing `.uni`,
	/// `.bi` or `.tri` files are treated as empty tables, and a
	/// truncated file keeps whatever was read before the cut.
	pub fn load(&mut self, prefix: &str) -> io::Result<()> {
		storage::load(self, prefix)
	}

	/// Scores the `k` most likely tokens to follow `context`.
	///
	/// Always returns exactly `k` entries; see the predictor module
	/// for the back-off and smoothing rules.
	pub fn predict(&self, context: &str, k: usize) -> Vec<Prediction> {
		predictor::predict_next(self, context, k)
	}

	/// As [`LanguageModel::predict`], with token ids resolved to text.
	pub fn predict_words(&self, context: &str, k: usize) -> Vec<(String, f32)> {
		self.predict(context, k)
			.into_iter()
			.map(|p| (self.vocab.token_of(p.token_id).to_owned(), p.score))
			.collect()
	}

	/// Generates a continuation of `input` with a one-shot generator
	/// seeded from the operating system.
	///
	/// Use [`Generator::with_seed`] directly for reproducible output.
	pub fn generate(&self, input: &str, max_tokens: usize, temperature: f32) -> String {
		Generator::new().generate(self, input, max_tokens, temperature)
	}

	/// Measures the top-k hit rate of next-token prediction on a corpus.
	///
	/// For every adjacent token pair in every line, predicts from the
	/// previous token and checks whether the actual next token appears
	/// among the positive-scored top `top_k` (clamped to `1..=64`).
	///
	/// # Errors
	/// Only I/O errors surface.
	pub fn evaluate<P: AsRef<Path>>(&self, filepath: P, top_k: usize) -> io::Result<EvalReport> {
		let top_k = top_k.clamp(1, MAX_EVAL_TOP_K);
		let mut report = EvalReport::default();

		for line in read_file(&filepath)? {
			let tokens = tokenizer::tokenize_line(&line);
			if tokens.len() <= 1 {
				continue;
			}
			for pair in tokens.windows(2) {
				let predictions = self.predict(&pair[0], top_k);
				let gold = self.vocab.get(&pair[1]);
				let matched = gold.is_some_and(|gold_id| {
					predictions
						.iter()
						.any(|p| p.score > 0.0 && p.token_id == gold_id)
				});
				if matched {
					report.hits += 1;
				}
				report.pairs += 1;
			}
		}

		Ok(report)
	}

	/// Number of tokens in the vocabulary, reserved ones included.
	pub fn vocab_size(&self) -> u32 {
		self.vocab.size()
	}

	/// Number of training tokens processed.
	pub fn total_tokens(&self) -> u64 {
		self.total_tokens
	}

	/// Maximum n-gram order.
	pub fn max_n(&self) -> usize {
		self.max_n
	}

	/// Read access to the vocabulary.
	pub fn vocab(&self) -> &Vocabulary {
		&self.vocab
	}

	/// Read access to the n-gram index.
	pub fn ngrams(&self) -> &NgramIndex {
		&self.ngrams
	}

	pub(crate) fn vocab_mut(&mut self) -> &mut Vocabulary {
		&mut self.vocab
	}

	pub(crate) fn ngrams_mut(&mut self) -> &mut NgramIndex {
		&mut self.ngrams
	}

	pub(crate) fn set_total_tokens(&mut self, total_tokens: u64) {
		self.total_tokens = total_tokens;
	}
}

/// Outcome of a corpus evaluation run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvalReport {
	/// Next-token predictions attempted.
	pub pairs: u64,
	/// Predictions whose top-k contained the actual next token.
	pub hits: u64,
}

impl EvalReport {
	/// Fraction of pairs hit, in `[0, 1]`. Zero pairs rate as 0.
	pub fn hit_rate(&self) -> f64 {
		if self.pairs == 0 {
			0.0
		} else {
			self.hits as f64 / self.pairs as f64
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::PathBuf;

	fn temp_path(name: &str) -> PathBuf {
		std::env::temp_dir().join(format!("rs-lm-model-{}-{}", std::process::id(), name))
	}

	fn write_corpus(name: &str, contents: &str) -> PathBuf {
		let path = temp_path(name);
		fs::write(&path, contents).unwrap();
		path
	}

	#[test]
	fn rejects_zero_max_n() {
		assert!(LanguageModel::new(0).is_err());
	}

	#[test]
	fn training_counts_tokens_and_ngrams() {
		let mut model = LanguageModel::new(3).unwrap();
		model.train_line("a b c");
		model.train_line("a b d");
		model.train_line("");

		assert_eq!(model.total_tokens(), 6);
		let a = model.vocab().get("a").unwrap();
		let b = model.vocab().get("b").unwrap();
		let c = model.vocab().get("c").unwrap();
		let d = model.vocab().get("d").unwrap();
		assert_eq!(model.ngrams().count(&[a]), 2);
		assert_eq!(model.ngrams().count(&[a, b]), 2);
		assert_eq!(model.ngrams().count(&[a, b, c]), 1);
		assert_eq!(model.ngrams().count(&[a, b, d]), 1);
	}

	#[test]
	fn train_from_file_reads_every_line() {
		let path = write_corpus("train.txt", "a b c\na b d\n");
		let mut model = LanguageModel::new(3).unwrap();
		model.train_from_file(&path).unwrap();
		fs::remove_file(&path).unwrap();

		assert_eq!(model.total_tokens(), 6);
		assert_eq!(model.vocab_size(), 7);
	}

	#[test]
	fn predict_words_resolves_token_text() {
		let mut model = LanguageModel::new(3).unwrap();
		model.train_line("good morning world");
		let words = model.predict_words("good", 1);
		assert_eq!(words.len(), 1);
		assert_eq!(words[0].0, "morning");
		assert!(words[0].1 > 0.0);
	}

	#[test]
	fn from_corpus_writes_and_reuses_the_snapshot() {
		let path = write_corpus("cache.txt", "one two three\none two four\n");
		let snapshot = path.with_extension("bin");
		let _ = fs::remove_file(&snapshot);

		let trained = LanguageModel::from_corpus(&path, 3).unwrap();
		assert!(snapshot.exists());

		let cached = LanguageModel::from_corpus(&path, 3).unwrap();
		assert_eq!(cached.vocab_size(), trained.vocab_size());
		assert_eq!(cached.total_tokens(), trained.total_tokens());
		let one = trained.vocab().get("one").unwrap();
		let two = trained.vocab().get("two").unwrap();
		assert_eq!(cached.ngrams().count(&[one, two]), trained.ngrams().count(&[one, two]));

		fs::remove_file(&path).unwrap();
		fs::remove_file(&snapshot).unwrap();
	}

	#[test]
	fn evaluation_hits_on_a_memorised_corpus() {
		let path = write_corpus("eval.txt", "a b c\na b d\n");
		let mut model = LanguageModel::new(3).unwrap();
		model.train_from_file(&path).unwrap();

		let report = model.evaluate(&path, 5).unwrap();
		fs::remove_file(&path).unwrap();

		assert_eq!(report.pairs, 4);
		assert_eq!(report.hits, 4);
		assert!((report.hit_rate() - 1.0).abs() < f64::EPSILON);
	}

	#[test]
	fn evaluation_of_an_empty_corpus_rates_zero() {
		let path = write_corpus("eval-empty.txt", "\n\n");
		let model = LanguageModel::new(3).unwrap();
		let report = model.evaluate(&path, 5).unwrap();
		fs::remove_file(&path).unwrap();

		assert_eq!(report.pairs, 0);
		assert_eq!(report.hit_rate(), 0.0);
	}
}
