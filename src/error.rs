/// Error handling for the Markdown compiler.
///
/// Every error is fatal to the current parse; there is no partial-result
/// mode. Errors carry the kind, an optional resolved source region, and
/// format as `"<line>:<col>-<line>:<col>: <message>"` when the region is
/// known.
use crate::span::LineCol;
use std::fmt;

/// Main error type for the Markdown compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkdownError {
    /// An opening HTML tag without a matching close before end of input.
    UnclosedHtmlTag {
        tag: String,
        location: Option<LineCol>,
    },

    /// A `<script` without a literal `</script>` before end of input.
    UnclosedScriptTag { location: Option<LineCol> },

    /// Malformed attribute syntax inside `<…>`.
    InvalidAttribute {
        detail: String,
        location: Option<LineCol>,
    },

    /// A fenced-code delimiter never paired with a close.
    ///
    /// Single-token inline delimiters degrade to plain text instead;
    /// only an unclosed ``` fence is fatal.
    UnclosedDelimiter {
        delimiter: &'static str,
        location: Option<LineCol>,
    },

    /// Nesting exceeded the configured recursion bound.
    NestingTooDeep {
        limit: usize,
        location: Option<LineCol>,
    },
}

impl MarkdownError {
    /// The resolved source region the error points at, if known.
    pub fn location(&self) -> Option<LineCol> {
        match self {
            MarkdownError::UnclosedHtmlTag { location, .. }
            | MarkdownError::UnclosedScriptTag { location }
            | MarkdownError::InvalidAttribute { location, .. }
            | MarkdownError::UnclosedDelimiter { location, .. }
            | MarkdownError::NestingTooDeep { location, .. } => *location,
        }
    }

    fn message(&self) -> String {
        match self {
            MarkdownError::UnclosedHtmlTag { tag, .. } => {
                format!("unclosed HTML tag <{}>", tag)
            }
            MarkdownError::UnclosedScriptTag { .. } => "unclosed <script> tag".to_string(),
            MarkdownError::InvalidAttribute { detail, .. } => {
                format!("invalid attribute syntax: {}", detail)
            }
            MarkdownError::UnclosedDelimiter { delimiter, .. } => {
                format!("unclosed {} delimiter", delimiter)
            }
            MarkdownError::NestingTooDeep { limit, .. } => {
                format!("nesting exceeds the maximum depth of {}", limit)
            }
        }
    }
}

impl fmt::Display for MarkdownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location() {
            Some(location) => write!(f, "{}: {}", location, self.message()),
            None => write!(f, "{}", self.message()),
        }
    }
}

impl std::error::Error for MarkdownError {}

/// Convenience type alias for Results in the Markdown compiler.
pub type Result<T> = std::result::Result<T, MarkdownError>;
