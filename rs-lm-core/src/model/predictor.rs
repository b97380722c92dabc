use crate::model::language_model::LanguageModel;
use crate::model::tokenizer;
use crate::model::vocabulary;

/// Decay applied to each step a context fragment sits farther from the
/// last token.
const DECAY: f32 = 0.85;

/// Weight of the unigram log-probability prior.
const BETA_UNIGRAM: f32 = 0.10;

/// Upper bound on distinct candidates gathered during back-off.
const MAX_CANDIDATES: usize = 100;

/// Floor applied before taking the prior's logarithm.
const PROBABILITY_FLOOR: f32 = 1e-9;

/// One next-token candidate with its score.
///
/// After a prediction call, scores are non-negative; when any are
/// positive the k returned scores sum to 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
	pub token_id: u32,
	pub score: f32,
}

impl Prediction {
	fn empty() -> Self {
		Self {
			token_id: vocabulary::UNK_ID,
			score: 0.0,
		}
	}
}

/// Scores the next token after `context` by backward reasoning.
///
/// Evidence is aggregated from the longest context suffix that resolves
/// in the vocabulary and the trie down to single-token suffixes, with
/// longer fragments weighted higher and more distant ones decayed. A
/// unigram log-prior then nudges common tokens up, the candidates are
/// ranked, and any remaining slots are padded from the unigram table.
///
/// # Returns
/// Exactly `k` entries; slots that could not be filled carry
/// `(UNK_ID, 0.0)`.
///
/// # Notes
/// - Total: an empty context, an untrained model, or a context made of
///   unknown words all degrade to zero-filled or unigram-only output.
/// - The returned scores are renormalized to sum to 1 whenever any of
///   them is positive.
pub(crate) fn predict_next(model: &LanguageModel, context: &str, k: usize) -> Vec<Prediction> {
	let mut output = vec![Prediction::empty(); k];
	if k == 0 {
		return output;
	}

	let tokens = tokenizer::tokenize_line(context);
	if tokens.is_empty() {
		return output;
	}

	let max_context = tokens.len().min(model.max_n().saturating_sub(1));
	let candidates = collect_candidates(model, &tokens, max_context);

	let mut filled = 0;
	if !candidates.is_empty() {
		let mut ranked = with_unigram_prior(model, candidates);
		ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
		for candidate in ranked.into_iter().take(k) {
			output[filled] = Prediction {
				token_id: candidate.token_id,
				// Scores are probabilities; a prior-dominated negative is cut off
				score: candidate.score.max(0.0),
			};
			filled += 1;
		}
	}

	if filled < k {
		pad_with_unigrams(model, &mut output, filled);
	}

	renormalize(&mut output);
	output
}

/// Walks suffix lengths from `max_context` down to 1 and accumulates
/// weighted, denominator-normalized child counts per candidate token.
fn collect_candidates(
	model: &LanguageModel,
	tokens: &[String],
	max_context: usize,
) -> Vec<Prediction> {
	let ngrams = model.ngrams();
	let mut candidates: Vec<Prediction> = Vec::new();

	for length in (1..=max_context).rev() {
		// Resolve the suffix of this length; one unknown word skips it entirely
		let mut suffix = Vec::with_capacity(length);
		let mut resolved = true;
		for token in &tokens[tokens.len() - length..] {
			match model.vocab().get(token) {
				Some(id) => suffix.push(id),
				None => {
					resolved = false;
					break;
				}
			}
		}
		if !resolved {
			continue;
		}

		let node = match ngrams.find_prefix(&suffix) {
			Some(node) => node,
			None => continue,
		};

		let denominator: u64 = ngrams
			.children(node)
			.map(|child| u64::from(ngrams.count_at(child)))
			.sum();
		if denominator == 0 {
			continue;
		}

		// Longer suffixes weigh more, distant ones decay
		let weight = length as f32 * DECAY.powi((max_context - length) as i32);

		for child in ngrams.children(node) {
			let contribution = weight * ngrams.count_at(child) as f32 / denominator as f32;
			let token_id = ngrams.token_at(child);
			match candidates.iter().position(|c| c.token_id == token_id) {
				Some(idx) => candidates[idx].score += contribution,
				None if candidates.len() < MAX_CANDIDATES => {
					candidates.push(Prediction {
						token_id,
						score: contribution,
					});
				}
				None => {}
			}
		}
	}

	candidates
}

/// Adds `BETA_UNIGRAM * ln(p)` to every candidate, where `p` is the
/// candidate's unigram probability (floored for unseen tokens).
///
/// Skipped entirely on an untrained model.
fn with_unigram_prior(model: &LanguageModel, mut candidates: Vec<Prediction>) -> Vec<Prediction> {
	if model.total_tokens() == 0 {
		return candidates;
	}

	for candidate in candidates.iter_mut() {
		let count = model.ngrams().count(&[candidate.token_id]);
		let p = if count > 0 {
			count as f32 / model.total_tokens() as f32
		} else {
			1.0 / (model.total_tokens() + 1) as f32
		};
		candidate.score += BETA_UNIGRAM * p.max(PROBABILITY_FLOOR).ln();
	}
	candidates
}

/// Fills remaining output slots from the unigram table, highest count
/// first, skipping token ids already present.
///
/// The stable sort keeps insertion order between equal counts. Does
/// nothing on an untrained model, leaving the zero slots in place.
fn pad_with_unigrams(model: &LanguageModel, output: &mut [Prediction], filled: usize) {
	if model.total_tokens() == 0 {
		return;
	}

	let ngrams = model.ngrams();
	let mut unigrams: Vec<Prediction> = ngrams
		.unigrams()
		.map(|node| Prediction {
			token_id: ngrams.token_at(node),
			score: ngrams.count_at(node) as f32 / model.total_tokens() as f32,
		})
		.collect();
	unigrams.sort_by(|a, b| b.score.total_cmp(&a.score));

	let mut next = filled;
	for unigram in unigrams {
		if next >= output.len() {
			break;
		}
		if output[..next].iter().any(|p| p.token_id == unigram.token_id) {
			continue;
		}
		output[next] = unigram;
		next += 1;
	}
}

/// Scales the emitted scores to sum to 1 when their sum is positive;
/// an all-zero result is left untouched.
fn renormalize(output: &mut [Prediction]) {
	let sum: f32 = output.iter().map(|p| p.score).sum();
	if sum > 0.0 {
		for prediction in output.iter_mut() {
			prediction.score /= sum;
		}
	}
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
	fn empty_context_zero_fills() {
		let model = model_from_lines(&["a b c"], 3);
		let predictions = model.predict("", 4);
		assert_eq!(predictions.len(), 4);
		for p in predictions {
			assert_eq!(p.token_id, vocabulary::UNK_ID);
			assert_eq!(p.score, 0.0);
		}
	}

	#[test]
	fn zero_k_yields_nothing() {
		let model = model_from_lines(&["a b"], 2);
		assert!(model.predict("a", 0).is_empty());
	}

	#[test]
	fn shared_context_splits_evenly() {
		let model = model_from_lines(&["a b c", "a b d"], 3);
		let c = model.vocab().get("c").unwrap();
		let d = model.vocab().get("d").unwrap();

		let predictions = model.predict("a b", 2);
		assert_eq!(predictions.len(), 2);

		let ids: Vec<u32> = predictions.iter().map(|p| p.token_id).collect();
		assert!(ids.contains(&c));
		assert!(ids.contains(&d));
		for p in &predictions {
			assert!((p.score - 0.5).abs() < 1e-5);
		}
		let sum: f32 = predictions.iter().map(|p| p.score).sum();
		assert!((sum - 1.0).abs() < 1e-5);
	}

	#[test]
	fn unknown_context_falls_back_to_unigrams() {
		let model = model_from_lines(&["x y"], 3);
		let x = model.vocab().get("x").unwrap();
		let y = model.vocab().get("y").unwrap();

		let predictions = model.predict("unknown y", 2);
		// Both unigrams count 1; insertion order breaks the tie
		assert_eq!(predictions[0].token_id, x);
		assert_eq!(predictions[1].token_id, y);
		let sum: f32 = predictions.iter().map(|p| p.score).sum();
		assert!((sum - 1.0).abs() < 1e-5);
	}

	#[test]
	fn longer_suffixes_dominate_the_ranking() {
		// "b" follows "a" twice, but after the bigram "z a" it is "c" that follows
		let model = model_from_lines(&["a b", "a b", "z a c"], 3);
		let c = model.vocab().get("c").unwrap();

		let predictions = model.predict("z a", 3);
		assert_eq!(predictions[0].token_id, c);
	}

	#[test]
	fn emitted_scores_are_non_negative_and_k_slots_wide() {
		let model = model_from_lines(&["one two three four five"], 3);
		let predictions = model.predict("one two", 10);
		assert_eq!(predictions.len(), 10);
		for p in &predictions {
			assert!(p.score >= 0.0);
		}
	}

	#[test]
	fn untrained_model_yields_zeros() {
		let model = LanguageModel::new(3).unwrap();
		let predictions = model.predict("anything at all", 3);
		for p in predictions {
			assert_eq!(p.score, 0.0);
			assert_eq!(p.token_id, vocabulary::UNK_ID);
		}
	}
}
