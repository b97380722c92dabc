/// Maximum number of tokens kept from a single line; the overflow is discarded.
pub const MAX_TOKENS: usize = 128;

/// Maximum token length in bytes; longer runs are silently truncated.
pub const MAX_TOKEN_LEN: usize = 31;

/// Splits a line into lowercased word tokens.
///
/// A token is a maximal run of bytes that are neither ASCII whitespace
/// nor ASCII punctuation. Every byte is folded to lowercase (ASCII only).
///
/// # Behavior
/// - Runs longer than [`MAX_TOKEN_LEN`] bytes keep their first 31 bytes;
///   the rest of the run is consumed and dropped.
/// - Lines yielding more than [`MAX_TOKENS`] tokens keep the first 128.
/// - Empty input yields an empty sequence.
///
/// # Notes
/// - Deterministic and total: never fails, whatever the input bytes.
/// - Non-ASCII bytes pass through untouched (no Unicode folding).
pub fn tokenize_line(line: &str) -> Vec<String> {
	let mut tokens = Vec::new();
	let mut word: Vec<u8> = Vec::with_capacity(MAX_TOKEN_LEN);

	for byte in line.bytes() {
		if byte.is_ascii_whitespace() || byte.is_ascii_punctuation() {
			if !word.is_empty() {
				push_word(&mut tokens, &mut word);
			}
		} else if word.len() < MAX_TOKEN_LEN {
			word.push(byte.to_ascii_lowercase());
		}
	}

	// Last word of the line, if any
	if !word.is_empty() {
		push_word(&mut tokens, &mut word);
	}

	tokens
}

/// Appends the accumulated word bytes as a token and clears the buffer.
///
/// Tokens past the [`MAX_TOKENS`] cap are dropped on the floor.
fn push_word(tokens: &mut Vec<String>, word: &mut Vec<u8>) {
	if tokens.len() < MAX_TOKENS {
		tokens.push(String::from_utf8_lossy(word).into_owned());
	}
	word.clear();
}
