//! Markdown-to-structured-document compiler.
//!
//! A two-stage pipeline turns a Markdown source string into a tree of
//! semantic document nodes and renders that tree to HTML:
//!
//! 1. **Tokenizer** ([`lexer`]): context-sensitive lexing into a flat
//!    stream of span-tagged tokens, disambiguated by bounded lookback
//!    over already-emitted tokens and bounded lookahead over the input.
//! 2. **Tree builder** ([`parser`]): a single left-to-right pass over
//!    the token stream that resolves delimiter pairing, reconstructs
//!    list and quote nesting from level hints, and interleaves raw
//!    HTML with Markdown content.
//!
//! Data flows strictly forward: `&str → Vec<Token> → Vec<Node> → HTML`.
//! The only shared read-only dependency is the [`SpanMap`], built once
//! by the tokenizer and borrowed by the tree builder for diagnostics.
//! Every entry point is synchronous and a pure function of its input.
//!
//! # Examples
//!
//! ```
//! let html = vellum::markdown_to_html("# Hi\n").unwrap();
//! assert_eq!(html, "<h1>Hi</h1>");
//! ```

pub mod ast;
pub mod codegen;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;

pub use ast::{Node, Visitor, walk_nodes};
pub use codegen::{HtmlRenderer, HtmlWriter, render_html, render_html_to};
pub use error::{MarkdownError, Result};
pub use lexer::{AttrList, TagName, Token, TokenHint, TokenKind, Tokenizer};
pub use parser::{ParserConfig, TreeBuilder, parse_tokens};
pub use span::{LineCol, Span, SpanMap};

/// Tokenizes a Markdown source string.
///
/// The returned stream is never empty; it always ends with an `Eof`
/// token. Frontmatter delimited by `+++` lines is skipped without
/// producing tokens.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Tokenizer::new(source).run().map(|(tokens, _)| tokens)
}

/// Compiles a Markdown source string into a document tree.
pub fn parse(source: &str) -> Result<Vec<Node>> {
    let (tokens, span_map) = Tokenizer::new(source).run()?;
    parse_tokens(tokens, &span_map)
}

/// Compiles Markdown straight to an HTML string.
pub fn markdown_to_html(source: &str) -> Result<String> {
    Ok(render_html(&parse(source)?))
}

/// Splits optional `+++` frontmatter off the source.
///
/// Returns the raw frontmatter body (without its fence lines) and the
/// remaining document. Collaborators deserialize the frontmatter; this
/// crate only locates it.
pub fn strip_frontmatter(source: &str) -> (Option<&str>, &str) {
    match lexer::frontmatter_end(source) {
        Some(end) => {
            let block = &source[..end];
            let body = block
                .strip_prefix("+++")
                .and_then(|rest| rest.strip_prefix('\n'))
                .and_then(|rest| rest.rfind("\n+++").map(|at| &rest[..at + 1]))
                .unwrap_or("");
            (Some(body), &source[end..])
        }
        None => (None, source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_always_ends_with_eof() {
        let tokens = tokenize("").unwrap();
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn parse_composes_the_stages() {
        let nodes = parse("**x**").unwrap();
        assert_eq!(nodes, vec![Node::Bold(vec![Node::Text("x".to_string())])]);
    }

    #[test]
    fn markdown_to_html_round_trip() {
        let html = markdown_to_html("# Hi\n\n*soft*\n\n").unwrap();
        assert_eq!(html, "<h1>Hi</h1><p><em>soft</em></p>");
    }

    #[test]
    fn strip_frontmatter_returns_body_and_rest() {
        let (front, rest) = strip_frontmatter("+++\ntitle = \"x\"\n+++\nbody");
        assert_eq!(front, Some("title = \"x\"\n"));
        assert_eq!(rest, "body");

        let (front, rest) = strip_frontmatter("no fences");
        assert_eq!(front, None);
        assert_eq!(rest, "no fences");
    }
}
