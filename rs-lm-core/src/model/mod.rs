//! Top-level module for the n-gram language modeling system.
//!
//! This crate provides a word-level multi-order n-gram engine, including:
//! - Line tokenization (`tokenizer`)
//! - Token/id mapping with reserved ids (`Vocabulary`)
//! - A trie-backed n-gram count index (`NgramIndex`)
//! - Backward-reasoning next-token scoring (`predictor`)
//! - Auto-regressive sampling (`Generator`)
//! - The assembled model with training and persistence (`LanguageModel`)

/// Auto-regressive text generation on top of the predictor.
///
/// Exposes temperature sampling, loop-aware stopping, and reproducible
/// seeding of the internal PRNG.
pub mod generator;

/// The assembled language model: vocabulary, n-gram index, training,
/// persistence, prediction, generation and evaluation entry points.
pub mod language_model;

/// Trie-structured n-gram count index.
///
/// Stores token-id paths of every order up to `max_n` in an arena of
/// nodes, with child lists kept in insertion order.
pub mod ngram_index;

/// Backward-reasoning next-token scorer.
///
/// Aggregates evidence from the longest matching context suffix down to
/// length 1, applies a unigram prior, and renormalizes the top-k.
pub mod predictor;

/// Line tokenizer: lowercased word tokens split on whitespace and
/// ASCII punctuation.
pub mod tokenizer;

/// Bidirectional token/id mapping with the three reserved ids.
pub mod vocabulary;

/// Binary persistence of the vocabulary and per-order n-gram tables.
/// This module is not exposed publicly.
mod storage;
