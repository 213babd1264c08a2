//! The Fuchsia trace format.
//!
//! A trace is a sequence of 64-bit-word aligned records. Every record starts
//! with a header word:
//!
//! | bits    | field                                    |
//! |---------|------------------------------------------|
//! | 0..=3   | record type                              |
//! | 4..=15  | record length in words, header included  |
//! | 16..=63 | type specific                            |
//!
//! Strings and threads are either written inline or interned per provider
//! and referenced by index; see [`provider`].

pub mod args;
pub mod layout;
pub mod provider;
mod record;
mod tokenizer;
pub mod writer;

pub use record::{EventKind, FuchsiaEvent, FuchsiaRecord};
pub use tokenizer::FuchsiaTokenizer;
