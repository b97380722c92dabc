use std::fs;

use rs_lm_core::model::generator::Generator;
use rs_lm_core::model::language_model::LanguageModel;

fn main() -> Result<(), Box<dyn std::error::Error>> {
	env_logger::init();

	// A small corpus, written next to the temp dir so the run is self-contained
	let corpus_path = std::env::temp_dir().join("rs-lm-exemple-corpus.txt");
	fs::write(
		&corpus_path,
		"the cat sat on the mat\n\
		 the dog sat on the rug\n\
		 the cat ran off the mat\n\
		 a dog ran over the rug\n\
		 the cat and the dog sat together\n",
	)?;

	// Train a fresh 3-gram model over the corpus
	let mut model = LanguageModel::new(3)?;
	model.train_from_file(&corpus_path)?;
	println!(
		"Trained rs-lm-core {}: vocabulary {}, {} tokens",
		rs_lm_core::VERSION,
		model.vocab_size(),
		model.total_tokens()
	);

	// Rank the most likely continuations of a context
	println!("\nAfter 'the cat':");
	for (token, score) in model.predict_words("the cat", 5) {
		if score > 0.0 {
			println!("  {} ({:.2}%)", token, score * 100.0);
		}
	}

	// Save the model tables and load them back into a fresh model
	let prefix = std::env::temp_dir().join("rs-lm-exemple-model");
	let prefix = prefix.to_string_lossy();
	model.save(&prefix)?;
	let mut reloaded = LanguageModel::new(3)?;
	reloaded.load(&prefix)?;
	println!(
		"\nReloaded from '{}': vocabulary {}, {} tokens",
		prefix,
		reloaded.vocab_size(),
		reloaded.total_tokens()
	);

	// Greedy generation always takes the top-ranked token
	println!("Greedy: {}", reloaded.generate("the cat", 10, 0.0));

	// A seeded generator replays the same sampled text on every run
	let mut generator = Generator::with_seed(42);
	println!("Seeded: {}", generator.generate(&reloaded, "the dog", 10, 0.8));

	// Top-k hit rate of next-token prediction over the training corpus
	let report = reloaded.evaluate(&corpus_path, 5)?;
	println!(
		"\nEval: {}/{} pairs hit ({:.2}%)",
		report.hits,
		report.pairs,
		report.hit_rate() * 100.0
	);

	Ok(())
}
