use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// HTML tag names the pipeline dispatches on.
///
/// A closed set of the tags the renderer knows about, plus an
/// open-ended `Other` variant carrying the original spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagName {
    Div,
    Span,
    P,
    A,
    Img,
    Pre,
    Code,
    Blockquote,
    Ul,
    Ol,
    Li,
    Br,
    Hr,
    Table,
    Script,
    Other(String),
}

impl TagName {
    /// Resolves a raw tag name, case-insensitively, into the closed set.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "div" => TagName::Div,
            "span" => TagName::Span,
            "p" => TagName::P,
            "a" => TagName::A,
            "img" => TagName::Img,
            "pre" => TagName::Pre,
            "code" => TagName::Code,
            "blockquote" => TagName::Blockquote,
            "ul" => TagName::Ul,
            "ol" => TagName::Ol,
            "li" => TagName::Li,
            "br" => TagName::Br,
            "hr" => TagName::Hr,
            "table" => TagName::Table,
            "script" => TagName::Script,
            _ => TagName::Other(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TagName::Div => "div",
            TagName::Span => "span",
            TagName::P => "p",
            TagName::A => "a",
            TagName::Img => "img",
            TagName::Pre => "pre",
            TagName::Code => "code",
            TagName::Blockquote => "blockquote",
            TagName::Ul => "ul",
            TagName::Ol => "ol",
            TagName::Li => "li",
            TagName::Br => "br",
            TagName::Hr => "hr",
            TagName::Table => "table",
            TagName::Script => "script",
            TagName::Other(name) => name,
        }
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered attribute list preserving source order and valueless forms.
///
/// A map would lose both the ordering and the `None` (valueless)
/// distinction, which the renderer must reproduce.
pub type AttrList = Vec<(String, Option<String>)>;

/// A lexed token: a tagged kind plus its source span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// The token vocabulary of the Markdown dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    /// A run of plain text. Adjacent `Text` tokens are merged on emit.
    Text(String),
    /// A single `\n`.
    Newline,
    /// A hard line break: `\` at end of line.
    LineBreak,
    /// `\x` for any single character `x`.
    Escape(char),
    /// `#{1..6}` at line start followed by whitespace.
    Heading(u8),
    SingleAsterisk,
    DoubleAsterisk,
    TripleAsterisk,
    SingleUnderscore,
    DoubleUnderscore,
    TripleUnderscore,
    /// `~~`, the strikethrough delimiter.
    DoubleTilde,
    /// Inline code delimiter.
    SingleGrave { language: Option<String> },
    /// Fenced code delimiter; the language is the text immediately
    /// after the opening fence, up to the next whitespace.
    TripleGrave { language: Option<String> },
    /// `---` standing alone on a line.
    TripleHyphen,
    /// `===` standing alone on a line.
    TripleEquals,
    /// `-` or `*` at line start followed by whitespace. The level is
    /// the leading indentation in columns.
    UListItem { level: usize },
    /// `1.` (any digits) at line start followed by whitespace.
    OListItem { level: usize },
    /// A run of `>` at line start; the level is the run length.
    BlockQuote { level: usize },
    HtmlOpenTag {
        name: TagName,
        attributes: AttrList,
        self_closing: bool,
    },
    HtmlCloseTag { name: TagName },
    /// `<script …>…</script>` including the raw body.
    ScriptTag { body: String, attributes: AttrList },
    /// `[` that is followed, on the same line, by a matching `]`.
    LinkStart,
    /// `![` that is followed, on the same line, by a matching `]`.
    ImageStart,
    /// `](`.
    LinkInterstice,
    /// The literal URL between `](` and `)`, `<…>` brackets stripped.
    LinkUri(String),
    /// `)` closing an open `LinkStart`/`ImageStart`.
    LinkEnd,
    /// `[^ref]`.
    FootnoteRef(String),
    /// `[^ref]:` at line start.
    FootnoteDef(String),
    /// End of input; always the last token.
    Eof,
}

impl TokenKind {
    /// True for a `Text` token consisting only of whitespace.
    pub fn is_blank_text(&self) -> bool {
        matches!(self, TokenKind::Text(text) if !text.is_empty() && text.chars().all(char::is_whitespace))
    }

    /// The nesting level of a list-item-like token.
    pub fn list_level(&self) -> Option<usize> {
        match self {
            TokenKind::UListItem { level }
            | TokenKind::OListItem { level }
            | TokenKind::BlockQuote { level } => Some(*level),
            _ => None,
        }
    }

    /// Reconstructs the source text of the token.
    ///
    /// Used to flatten token slices back to literal text (code spans,
    /// image alt text) and to degrade unpaired delimiters. List markers
    /// normalize to their canonical spelling.
    pub fn lexeme(&self) -> String {
        match self {
            TokenKind::Text(text) => text.clone(),
            TokenKind::Newline => "\n".to_string(),
            TokenKind::LineBreak => "\\\n".to_string(),
            TokenKind::Escape(c) => format!("\\{}", c),
            TokenKind::Heading(level) => "#".repeat(usize::from(*level)),
            TokenKind::SingleAsterisk => "*".to_string(),
            TokenKind::DoubleAsterisk => "**".to_string(),
            TokenKind::TripleAsterisk => "***".to_string(),
            TokenKind::SingleUnderscore => "_".to_string(),
            TokenKind::DoubleUnderscore => "__".to_string(),
            TokenKind::TripleUnderscore => "___".to_string(),
            TokenKind::DoubleTilde => "~~".to_string(),
            TokenKind::SingleGrave { .. } => "`".to_string(),
            TokenKind::TripleGrave { language } => match language {
                Some(language) => format!("```{}", language),
                None => "```".to_string(),
            },
            TokenKind::TripleHyphen => "---".to_string(),
            TokenKind::TripleEquals => "===".to_string(),
            TokenKind::UListItem { .. } => "-".to_string(),
            TokenKind::OListItem { .. } => "1.".to_string(),
            TokenKind::BlockQuote { level } => ">".repeat(*level),
            TokenKind::HtmlOpenTag {
                name,
                attributes,
                self_closing,
            } => {
                let mut out = format!("<{}", name);
                for (attr, value) in attributes {
                    match value {
                        Some(value) => {
                            out.push_str(&format!(" {}=\"{}\"", attr, value));
                        }
                        None => out.push_str(&format!(" {}", attr)),
                    }
                }
                if *self_closing {
                    out.push_str(" />");
                } else {
                    out.push('>');
                }
                out
            }
            TokenKind::HtmlCloseTag { name } => format!("</{}>", name),
            TokenKind::ScriptTag { body, attributes } => {
                let open = TokenKind::HtmlOpenTag {
                    name: TagName::Script,
                    attributes: attributes.clone(),
                    self_closing: false,
                };
                format!("{}{}</script>", open.lexeme(), body)
            }
            TokenKind::LinkStart => "[".to_string(),
            TokenKind::ImageStart => "![".to_string(),
            TokenKind::LinkInterstice => "](".to_string(),
            TokenKind::LinkUri(uri) => uri.clone(),
            TokenKind::LinkEnd => ")".to_string(),
            TokenKind::FootnoteRef(label) => format!("[^{}]", label),
            TokenKind::FootnoteDef(label) => format!("[^{}]:", label),
            TokenKind::Eof => String::new(),
        }
    }
}

/// Disambiguating context computed by the per-character handlers and
/// passed into the emit step. Identical scratch contents classify to
/// different tokens depending on the hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenHint {
    /// The scratch is `[` or `![` with a matching `]` later on the line.
    LinkStart,
    /// The scratch is `)` and the most recent unclosed delimiter is a
    /// link or image start.
    LinkEnd,
    /// A `-`/`*` marker at line start; carries the indent in columns.
    UListStart { indent: usize },
    /// A `1.` marker at line start; carries the indent in columns.
    OListStart { indent: usize },
    /// A `>` run at the beginning of a line; carries the run length.
    BlockQuote { level: usize },
    /// The escape token is `\` followed by a newline.
    InlineBreak,
    /// A `[^ref]` reference.
    FootnoteRef,
    /// A `[^ref]:` definition at line start.
    FootnoteDef,
}
