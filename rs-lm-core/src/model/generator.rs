use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::language_model::LanguageModel;
use crate::model::predictor::Prediction;
use crate::model::tokenizer;
use crate::model::vocabulary;

/// Number of context tokens the rolling window keeps.
pub const CONTEXT_WINDOW: usize = 7;

/// How many candidates each step asks the predictor for.
const TOP_K: usize = 10;

/// Temperatures at or below this sample greedily.
const GREEDY_TEMPERATURE: f32 = 0.01;

/// Below this top score the loop gives up once a few tokens are out.
const MIN_CONFIDENCE: f32 = 0.03;

/// Emitted tokens after which low confidence stops the loop.
const MIN_TOKENS_FOR_CUTOFF: usize = 3;

/// Emitted tokens after which a terminator word stops the loop.
const MIN_TOKENS_FOR_TERMINATOR: usize = 5;

/// Hard cap on emitted tokens, whatever `max_tokens` says.
const MAX_GENERATED: usize = 25;

/// Hard cap on `max_tokens` itself.
const MAX_LOOP: usize = 100;

/// Conversational closers that end a sequence once enough has been said.
const TERMINATORS: [&str; 7] = ["ya", "lah", "lho", "kok", "deh", "dong", "sih"];

/// Sentence-final bytes that always end a sequence.
const SENTENCE_ENDINGS: [char; 3] = ['.', '?', '!'];

/// Auto-regressive text generator.
///
/// Repeatedly asks the model for its top next tokens, samples one under
/// the requested temperature, and appends it to the output until a stop
/// rule fires.
///
/// # Responsibilities
/// - Maintain the rolling context window and the id history
/// - Temperature sampling over the predictor's ranked output
/// - Loop-aware stopping (punctuation, terminators, low confidence,
///   length, repetition)
///
/// The PRNG lives in the generator, so a seeded generator replays the
/// same text for the same model and input.
#[derive(Debug)]
pub struct Generator {
	rng: StdRng,
}

impl Generator {
	/// Creates a generator seeded from the operating system.
	pub fn new() -> Self {
		Self {
			rng: StdRng::from_os_rng(),
		}
	}

	/// Creates a generator with a fixed seed, for reproducible runs.
	pub fn with_seed(seed: u64) -> Self {
		Self {
			rng: StdRng::seed_from_u64(seed),
		}
	}

	/// Generates a continuation of `input`.
	///
	/// # Parameters
	/// - `input`: seed text; its last tokens prime the context window.
	/// - `max_tokens`: bound on the total window, seed tokens plus
	///   emitted ones (capped at 100).
	/// - `temperature`: <= 0.01 picks the top token every step; larger
	///   values flatten the sampling distribution.
	///
	/// # Returns
	/// The emitted tokens joined by single spaces; empty when the model
	/// has nothing confident to say.
	pub fn generate(
		&mut self,
		model: &LanguageModel,
		input: &str,
		max_tokens: usize,
		temperature: f32,
	) -> String {
		let max_tokens = max_tokens.min(MAX_LOOP);

		let mut window = tokenize_line_tail(input);
		let mut history: Vec<u32> = window
			.iter()
			.map(|token| model.vocab().get(token).unwrap_or(vocabulary::UNK_ID))
			.collect();

		let mut output = String::new();
		let mut emitted = 0;

		while history.len() < max_tokens {
			let context = window.join(" ");
			let predictions = model.predict(&context, TOP_K);
			let top_score = predictions.first().map(|p| p.score).unwrap_or(0.0);
			if top_score <= 0.0 {
				break;
			}

			let token_id = self.sample(&predictions, temperature);
			let text = model.vocab().token_of(token_id).to_owned();
			if text.is_empty() {
				break;
			}

			if !output.is_empty() {
				output.push(' ');
			}
			output.push_str(&text);
			emitted += 1;

			// Keep the last 6 window tokens and append the new one
			if window.len() >= CONTEXT_WINDOW {
				window.drain(..window.len() - (CONTEXT_WINDOW - 1));
			}
			window.push(text.clone());
			history.push(token_id);

			if should_stop(&text, top_score, emitted, &history) {
				break;
			}
		}

		output
	}

	/// Draws one token id from the ranked predictions.
	///
	/// Greedy below [`GREEDY_TEMPERATURE`]; otherwise an inverse-CDF
	/// draw over the temperature-adjusted scores, truncated at the
	/// first non-positive entry. Degenerate sums fall back to the top
	/// token.
	fn sample(&mut self, predictions: &[Prediction], temperature: f32) -> u32 {
		let top = predictions[0].token_id;
		if temperature <= GREEDY_TEMPERATURE {
			return top;
		}

		let live: Vec<&Prediction> = predictions
			.iter()
			.take_while(|p| p.score > 0.0)
			.collect();
		let adjusted: Vec<f32> = live
			.iter()
			.map(|p| ((p.score + 1e-9).ln() / temperature).exp())
			.collect();
		let sum: f32 = adjusted.iter().sum();
		if !sum.is_finite() || sum <= 0.0 {
			return top;
		}

		let draw: f32 = self.rng.random_range(0.0..1.0);
		let mut cumulative = 0.0;
		for (prediction, weight) in live.iter().zip(&adjusted) {
			cumulative += weight / sum;
			if cumulative >= draw {
				return prediction.token_id;
			}
		}

		top
	}
}

impl Default for Generator {
	fn default() -> Self {
		Self::new()
	}
}

/// Tokenizes `input` and keeps the last [`CONTEXT_WINDOW`] tokens.
fn tokenize_line_tail(input: &str) -> Vec<String> {
	let mut tokens = tokenizer::tokenize_line(input);
	if tokens.len() > CONTEXT_WINDOW {
		tokens.drain(..tokens.len() - CONTEXT_WINDOW);
	}
	tokens
}

/// Evaluates the stop rules after a token was appended.
fn should_stop(last_token: &str, top_score: f32, emitted: usize, history: &[u32]) -> bool {
	if last_token
		.chars()
		.last()
		.is_some_and(|c| SENTENCE_ENDINGS.contains(&c))
	{
		return true;
	}
	if emitted >= MIN_TOKENS_FOR_TERMINATOR && TERMINATORS.contains(&last_token) {
		return true;
	}
	if top_score < MIN_CONFIDENCE && emitted >= MIN_TOKENS_FOR_CUTOFF {
		return true;
	}
	if emitted >= MAX_GENERATED {
		return true;
	}
	has_repetition(history)
}

/// Detects short loops at the end of the id history: three identical
/// ids, or the same pair twice in a row.
fn has_repetition(history: &[u32]) -> bool {
	let n = history.len();
	if n >= 3 && history[n - 1] == history[n - 2] && history[n - 2] == history[n - 3] {
		return true;
	}
	n >= 4 && (history[n - 1], history[n - 2]) == (history[n - 3], history[n - 4])
}

#[cfg(test)]
mod tests {
	use super::*;

	fn model_from_lines(lines: &[&str], max_n: usize) -> LanguageModel {
		let mut model = LanguageModel::new(max_n).unwrap();
		for line in lines {
			model.train_line(line);
		}
		model
	}

	#[test]
	fn greedy_generation_completes_a_memorised_phrase() {
		let lines = vec!["hi there friend"; 10];
		let model = model_from_lines(&lines, 3);
		let mut generator = Generator::with_seed(42);
		let text = generator.generate(&model, "hi", 3, 0.0);
		assert_eq!(text, "there friend");
	}

	#[test]
	fn empty_input_generates_nothing() {
		let model = model_from_lines(&["hello world"], 3);
		let mut generator = Generator::with_seed(1);
		assert_eq!(generator.generate(&model, "", 10, 0.0), "");
	}

	#[test]
	fn untrained_model_generates_nothing() {
		let model = LanguageModel::new(3).unwrap();
		let mut generator = Generator::with_seed(1);
		assert_eq!(generator.generate(&model, "hello", 10, 0.7), "");
	}

	#[test]
	fn pair_repetition_stops_the_loop() {
		let lines = vec!["a b"; 5];
		let model = model_from_lines(&lines, 3);
		let mut generator = Generator::with_seed(7);
		// Greedy generation ping-pongs between "a" and "b" until the
		// pair repetition rule fires
		let text = generator.generate(&model, "a", 50, 0.0);
		assert_eq!(text, "b a b");
	}

	#[test]
	fn output_respects_the_requested_bound() {
		let lines = vec!["one two three four five six seven eight nine ten"; 3];
		let model = model_from_lines(&lines, 3);
		let mut generator = Generator::with_seed(3);
		for max_tokens in [1, 2, 5, 8] {
			let text = generator.generate(&model, "one", max_tokens, 0.0);
			let count = text.split_whitespace().count();
			assert!(count <= max_tokens, "{} tokens for bound {}", count, max_tokens);
		}
	}

	#[test]
	fn seeded_generation_is_reproducible() {
		let lines = vec![
			"the cat sat on the mat",
			"the dog sat on the rug",
			"the cat ran off the mat",
			"a dog ran over the rug",
		];
		let model = model_from_lines(&lines, 3);
		let first = Generator::with_seed(99).generate(&model, "the", 15, 0.8);
		let second = Generator::with_seed(99).generate(&model, "the", 15, 0.8);
		assert_eq!(first, second);
	}

	#[test]
	fn sampling_never_invents_tokens() {
		let lines = vec!["alpha beta gamma delta", "alpha gamma beta delta"];
		let model = model_from_lines(&lines, 3);
		let mut generator = Generator::with_seed(11);
		let text = generator.generate(&model, "alpha", 20, 1.2);
		for token in text.split_whitespace() {
			assert!(model.vocab().contains(token), "unknown token {:?}", token);
			assert!(token.len() <= tokenizer::MAX_TOKEN_LEN);
		}
	}

	#[test]
	fn repetition_detector_matches_tail_patterns() {
		assert!(has_repetition(&[5, 5, 5]));
		assert!(has_repetition(&[1, 5, 5, 5]));
		assert!(has_repetition(&[3, 4, 3, 4]));
		assert!(!has_repetition(&[3, 4, 4, 3]));
		assert!(!has_repetition(&[1, 2, 3, 4]));
		assert!(!has_repetition(&[5, 5]));
	}
}
