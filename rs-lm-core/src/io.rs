use std::fs::File;
use std::io::Read;
use std::io;
use std::path::{Path, PathBuf};

/// Reads a text file and returns all its lines as a `Vec<String>`.
///
/// - Reads the entire file into memory
/// - Splits on `\n` / `\r\n`
pub(crate) fn read_file<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	Ok(contents.lines().map(str::to_owned).collect())
}

/// Builds an output path based on an input path and a new extension.
///
/// Example:
/// `data/corpus.txt` + `"bin"` → `data/corpus.bin`
pub(crate) fn build_output_path<P: AsRef<Path>>(
	input_path: P,
	output_extension: &str,
) -> io::Result<PathBuf> {
	let input_path = input_path.as_ref();

	let parent = input_path.parent().unwrap_or_else(|| Path::new("."));
	let file_stem = input_path
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Input path has no filename"))?;

	let mut output = PathBuf::from(parent);
	output.push(file_stem);
	output.set_extension(output_extension);

	Ok(output)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;

	#[test]
	fn build_output_path_swaps_extension() {
		let path = build_output_path("data/corpus.txt", "bin").unwrap();
		assert_eq!(path, PathBuf::from("data/corpus.bin"));
	}

	#[test]
	fn build_output_path_without_filename_fails() {
		assert!(build_output_path("..", "bin").is_err());
	}

	#[test]
	fn read_file_splits_lines() {
		let path = std::env::temp_dir().join(format!("rs-lm-io-{}.txt", std::process::id()));
		fs::write(&path, "first line\nsecond line\n").unwrap();
		let lines = read_file(&path).unwrap();
		fs::remove_file(&path).unwrap();
		assert_eq!(lines, vec!["first line".to_owned(), "second line".to_owned()]);
	}

	#[test]
	fn read_file_missing_is_an_error() {
		assert!(read_file("does/not/exist.txt").is_err());
	}
}
