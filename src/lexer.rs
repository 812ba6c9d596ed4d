//! Context-sensitive Markdown tokenizer.
//!
//! The module is split into focused submodules to keep the pipeline
//! clear:
//! - `token`: the token vocabulary, spans, and emit hints.
//! - `rules`: pure nom scanners for the multi-character constructs.
//! - `cursor`: the stateful tokenizer that drives emission.
//!
//! The cursor owns all mutable state (scratch buffer, emitted tokens,
//! byte position); the rules are pure functions over `&str`, so the
//! boundary between the state machine and the grammar stays explicit.

pub mod token;

mod cursor;
mod rules;

pub use cursor::Tokenizer;
pub use token::{AttrList, TagName, Token, TokenHint, TokenKind};

pub(crate) use rules::frontmatter_end;
