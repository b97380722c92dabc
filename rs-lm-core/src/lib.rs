//! Word-level n-gram language model library.
//!
//! This crate provides a complete n-gram language modeling system including:
//! - Whitespace/punctuation tokenization with ASCII case folding
//! - Vocabulary management with reserved ids
//! - A trie-backed multi-order n-gram count index
//! - Backward-reasoning next-token prediction with back-off and smoothing
//! - Temperature-based auto-regressive text generation
//! - A compact binary persistence format
//!
//! Only the high-level API is exposed publicly. Low-level file helpers
//! are kept internal to ensure consistency and prevent misuse.

/// Library version, taken from the crate manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core language model components and inference logic.
pub mod model;

/// I/O utilities (file loading, path helpers).
///
/// Not exposed
pub(crate) mod io;
