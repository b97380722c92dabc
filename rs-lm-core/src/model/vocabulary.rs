use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Token text for the unknown-word placeholder, always at id 0.
pub const UNK_TOKEN: &str = "<unk>";
/// Token text for the start-of-sentence marker, always at id 1.
pub const START_TOKEN: &str = "<s>";
/// Token text for the end-of-sentence marker, always at id 2.
pub const END_TOKEN: &str = "</s>";

/// Id of [`UNK_TOKEN`]; also the soft-failure value of [`Vocabulary::get_or_add`].
pub const UNK_ID: u32 = 0;
/// Id of [`START_TOKEN`].
pub const START_ID: u32 = 1;
/// Id of [`END_TOKEN`].
pub const END_ID: u32 = 2;

/// Soft cap on the number of tokens; insertions beyond it degrade to [`UNK_ID`].
pub const MAX_VOCAB_SIZE: usize = 64 * 1024;

/// Bidirectional mapping between token strings and small integer ids.
///
/// Ids are dense and strictly increasing: the three reserved tokens take
/// 0/1/2 and every new token gets the next free id. Ids are never reused
/// or renumbered, so `id < size()` holds for every id handed out.
///
/// ## Invariants
/// - `token_to_id` and `id_to_token` agree at all times
/// - The reserved tokens are present after construction
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Vocabulary {
	/// Token text to id. Absence means the token is unknown.
	token_to_id: HashMap<String, u32>,
	/// Dense id-to-token array; the index is the id.
	id_to_token: Vec<String>,
}

impl Vocabulary {
	/// Creates a vocabulary holding only the three reserved tokens.
	pub fn new() -> Self {
		let mut vocab = Self {
			token_to_id: HashMap::new(),
			id_to_token: Vec::new(),
		};
		vocab.get_or_add(UNK_TOKEN);
		vocab.get_or_add(START_TOKEN);
		vocab.get_or_add(END_TOKEN);
		vocab
	}

	/// Returns the id of `token`, inserting it if missing.
	///
	/// New tokens receive the next free id. Once [`MAX_VOCAB_SIZE`] is
	/// reached the insertion fails softly and [`UNK_ID`] is returned.
	pub fn get_or_add(&mut self, token: &str) -> u32 {
		if let Some(id) = self.token_to_id.get(token) {
			return *id;
		}

		if self.id_to_token.len() >= MAX_VOCAB_SIZE {
			return UNK_ID;
		}

		let id = self.id_to_token.len() as u32;
		self.id_to_token.push(token.to_owned());
		self.token_to_id.insert(token.to_owned(), id);
		id
	}

	/// Looks up `token` without inserting it.
	///
	/// `None` means the token is absent; 0 is only ever returned for the
	/// literal `<unk>` string, so callers never have to disambiguate.
	pub fn get(&self, token: &str) -> Option<u32> {
		self.token_to_id.get(token).copied()
	}

	/// Returns the token text for `id`.
	///
	/// Out-of-range ids yield [`UNK_TOKEN`].
	pub fn token_of(&self, id: u32) -> &str {
		self.id_to_token
			.get(id as usize)
			.map(String::as_str)
			.unwrap_or(UNK_TOKEN)
	}

	/// Whether `token` is present.
	pub fn contains(&self, token: &str) -> bool {
		self.token_to_id.contains_key(token)
	}

	/// Number of tokens, reserved ones included.
	pub fn size(&self) -> u32 {
		self.id_to_token.len() as u32
	}

	/// Iterates tokens in id order.
	pub fn tokens(&self) -> impl Iterator<Item = &str> {
		self.id_to_token.iter().map(String::as_str)
	}

	/// Rebuilds a vocabulary from tokens listed in id order.
	///
	/// Used when loading from disk: position `i` in `tokens` becomes id
	/// `i`, so a file written from a trained model puts the reserved
	/// tokens back at 0/1/2. Duplicate strings keep the last id in the
	/// forward map.
	pub(crate) fn from_ordered_tokens(tokens: Vec<String>) -> Self {
		let mut token_to_id = HashMap::with_capacity(tokens.len());
		for (id, token) in tokens.iter().enumerate() {
			token_to_id.insert(token.clone(), id as u32);
		}
		Self {
			token_to_id,
			id_to_token: tokens,
		}
	}
}

impl Default for Vocabulary {
	fn default() -> Self {
		Self::new()
	}
}
