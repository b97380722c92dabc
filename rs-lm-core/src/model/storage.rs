use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};

use log::{debug, warn};

use crate::model::language_model::LanguageModel;
use crate::model::vocabulary::Vocabulary;

/// Writes the model to the four companion files of `prefix`.
///
/// Layout (all integers little-endian, untagged):
/// - `<prefix>.vocab`: `u32` size, then per token a `u16` length and
///   the raw bytes (no terminator).
/// - `<prefix>.uni`: `u64` total tokens, `u32` row count, then
///   `(token, count)` rows of `u32`.
/// - `<prefix>.bi`: `u32` row count, then `(prev, next, count)` rows.
/// - `<prefix>.tri`: `u32` row count, then `(id0, id1, id2, count)` rows.
///
/// Rows come out in trie order: depth first, insertion order within
/// each parent. Reloading reproduces that order, so a second save is
/// byte-identical.
pub(crate) fn save(model: &LanguageModel, prefix: &str) -> io::Result<()> {
	save_vocab(model, &format!("{}.vocab", prefix))?;
	save_unigrams(model, &format!("{}.uni", prefix))?;
	save_bigrams(model, &format!("{}.bi", prefix))?;
	save_trigrams(model, &format!("{}.tri", prefix))?;
	Ok(())
}

/// Loads model tables written by [`save`].
///
/// The vocab file is required; the three n-gram files are each
/// optional (absent means an empty table). A short read anywhere stops
/// that file and keeps what was read so far.
pub(crate) fn load(model: &mut LanguageModel, prefix: &str) -> io::Result<()> {
	load_vocab(model, &format!("{}.vocab", prefix))?;
	load_unigrams(model, &format!("{}.uni", prefix))?;
	load_bigrams(model, &format!("{}.bi", prefix))?;
	load_trigrams(model, &format!("{}.tri", prefix))?;
	Ok(())
}

fn save_vocab(model: &LanguageModel, path: &str) -> io::Result<()> {
	let mut file = BufWriter::new(File::create(path)?);
	write_u32(&mut file, model.vocab().size())?;
	for token in model.vocab().tokens() {
		write_u16(&mut file, token.len() as u16)?;
		file.write_all(token.as_bytes())?;
	}
	file.flush()
}

fn save_unigrams(model: &LanguageModel, path: &str) -> io::Result<()> {
	let ngrams = model.ngrams();
	let rows: Vec<(u32, u32)> = ngrams
		.unigrams()
		.map(|node| (ngrams.token_at(node), ngrams.count_at(node)))
		.collect();

	let mut file = BufWriter::new(File::create(path)?);
	write_u64(&mut file, model.total_tokens())?;
	write_u32(&mut file, rows.len() as u32)?;
	for (token, count) in rows {
		write_u32(&mut file, token)?;
		write_u32(&mut file, count)?;
	}
	file.flush()
}

fn save_bigrams(model: &LanguageModel, path: &str) -> io::Result<()> {
	let ngrams = model.ngrams();
	let mut rows: Vec<[u32; 3]> = Vec::new();
	for first in ngrams.unigrams() {
		for second in ngrams.children(first) {
			rows.push([
				ngrams.token_at(first),
				ngrams.token_at(second),
				ngrams.count_at(second),
			]);
		}
	}

	let mut file = BufWriter::new(File::create(path)?);
	write_u32(&mut file, rows.len() as u32)?;
	for row in rows {
		for value in row {
			write_u32(&mut file, value)?;
		}
	}
	file.flush()
}

fn save_trigrams(model: &LanguageModel, path: &str) -> io::Result<()> {
	let ngrams = model.ngrams();
	let mut rows: Vec<[u32; 4]> = Vec::new();
	for first in ngrams.unigrams() {
		for second in ngrams.children(first) {
			for third in ngrams.children(second) {
				rows.push([
					ngrams.token_at(first),
					ngrams.token_at(second),
					ngrams.token_at(third),
					ngrams.count_at(third),
				]);
			}
		}
	}

	let mut file = BufWriter::new(File::create(path)?);
	write_u32(&mut file, rows.len() as u32)?;
	for row in rows {
		for value in row {
			write_u32(&mut file, value)?;
		}
	}
	file.flush()
}

fn load_vocab(model: &mut LanguageModel, path: &str) -> io::Result<()> {
	let mut reader = BufReader::new(File::open(path)?);

	let Some(size) = try_read_u32(&mut reader)? else {
		warn!("vocab file {} is empty", path);
		return Ok(());
	};

	let mut tokens = Vec::with_capacity(size as usize);
	for _ in 0..size {
		let Some(length) = try_read_u16(&mut reader)? else {
			break;
		};
		let mut bytes = vec![0u8; length as usize];
		match reader.read_exact(&mut bytes) {
			Ok(()) => {}
			Err(error) if truncated(&error) => break,
			Err(error) => return Err(error),
		}
		tokens.push(String::from_utf8_lossy(&bytes).into_owned());
	}

	if tokens.len() < size as usize {
		warn!(
			"vocab file {} truncated: {} of {} tokens read",
			path,
			tokens.len(),
			size
		);
	}
	*model.vocab_mut() = Vocabulary::from_ordered_tokens(tokens);
	Ok(())
}

fn load_unigrams(model: &mut LanguageModel, path: &str) -> io::Result<()> {
	let Some(mut reader) = open_table(path)? else {
		return Ok(());
	};

	let Some(total_tokens) = try_read_u64(&mut reader)? else {
		return Ok(());
	};
	model.set_total_tokens(total_tokens);

	let Some(rows) = try_read_u32(&mut reader)? else {
		return Ok(());
	};
	for _ in 0..rows {
		let Some(token) = try_read_u32(&mut reader)? else {
			warn!("unigram table {} truncated", path);
			break;
		};
		let Some(count) = try_read_u32(&mut reader)? else {
			warn!("unigram table {} truncated", path);
			break;
		};
		model.ngrams_mut().add_with_count(&[token], count);
	}
	Ok(())
}

fn load_bigrams(model: &mut LanguageModel, path: &str) -> io::Result<()> {
	let Some(mut reader) = open_table(path)? else {
		return Ok(());
	};

	let Some(rows) = try_read_u32(&mut reader)? else {
		return Ok(());
	};
	for _ in 0..rows {
		let row: Option<([u32; 2], u32)> = try_read_row(&mut reader, path)?;
		let Some((pair, count)) = row else {
			break;
		};
		model.ngrams_mut().add_with_count(&pair, count);
	}
	Ok(())
}

fn load_trigrams(model: &mut LanguageModel, path: &str) -> io::Result<()> {
	let Some(mut reader) = open_table(path)? else {
		return Ok(());
	};

	let Some(rows) = try_read_u32(&mut reader)? else {
		return Ok(());
	};
	for _ in 0..rows {
		let row: Option<([u32; 3], u32)> = try_read_row(&mut reader, path)?;
		let Some((triple, count)) = row else {
			break;
		};
		model.ngrams_mut().add_with_count(&triple, count);
	}
	Ok(())
}

/// Opens an optional table file; absence is an empty table, not an error.
fn open_table(path: &str) -> io::Result<Option<BufReader<File>>> {
	match File::open(path) {
		Ok(file) => Ok(Some(BufReader::new(file))),
		Err(error) if error.kind() == ErrorKind::NotFound => {
			debug!("no table at {}, treating as empty", path);
			Ok(None)
		}
		Err(error) => Err(error),
	}
}

/// Reads `N` token ids followed by a count; `None` on truncation.
fn try_read_row<const N: usize>(
	reader: &mut impl Read,
	path: &str,
) -> io::Result<Option<([u32; N], u32)>> {
	let mut ids = [0u32; N];
	for slot in ids.iter_mut() {
		match try_read_u32(reader)? {
			Some(value) => *slot = value,
			None => {
				warn!("table {} truncated", path);
				return Ok(None);
			}
		}
	}
	match try_read_u32(reader)? {
		Some(count) => Ok(Some((ids, count))),
		None => {
			warn!("table {} truncated", path);
			Ok(None)
		}
	}
}

fn truncated(error: &io::Error) -> bool {
	error.kind() == ErrorKind::UnexpectedEof
}

fn write_u16(writer: &mut impl Write, value: u16) -> io::Result<()> {
	writer.write_all(&value.to_le_bytes())
}

fn write_u32(writer: &mut impl Write, value: u32) -> io::Result<()> {
	writer.write_all(&value.to_le_bytes())
}

fn write_u64(writer: &mut impl Write, value: u64) -> io::Result<()> {
	writer.write_all(&value.to_le_bytes())
}

fn try_read_u16(reader: &mut impl Read) -> io::Result<Option<u16>> {
	let mut bytes = [0u8; 2];
	read_or_eof(reader, &mut bytes).map(|ok| ok.then(|| u16::from_le_bytes(bytes)))
}

fn try_read_u32(reader: &mut impl Read) -> io::Result<Option<u32>> {
	let mut bytes = [0u8; 4];
	read_or_eof(reader, &mut bytes).map(|ok| ok.then(|| u32::from_le_bytes(bytes)))
}

fn try_read_u64(reader: &mut impl Read) -> io::Result<Option<u64>> {
	let mut bytes = [0u8; 8];
	read_or_eof(reader, &mut bytes).map(|ok| ok.then(|| u64::from_le_bytes(bytes)))
}

/// Fills `buffer` completely, or reports a clean end-of-file as `false`.
fn read_or_eof(reader: &mut impl Read, buffer: &mut [u8]) -> io::Result<bool> {
	match reader.read_exact(buffer) {
		Ok(()) => Ok(true),
		Err(error) if truncated(&error) => Ok(false),
		Err(error) => Err(error),
	}
}
