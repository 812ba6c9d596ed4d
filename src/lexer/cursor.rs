use log::debug;
use unicode_segmentation::UnicodeSegmentation;

use super::rules;
use super::token::{AttrList, TagName, Token, TokenHint, TokenKind};
use crate::error::{MarkdownError, Result};
use crate::span::{Span, SpanMap};

/// Stateful tokenizer that produces the flat, span-tagged token stream.
///
/// The tokenizer walks the source left to right by grapheme cluster and
/// keeps two pieces of state: the already-emitted token vector, used as
/// bounded lookback for contextual disambiguation, and a scratch buffer
/// that accumulates characters until an emit step classifies them into
/// a token. Multi-character scans (HTML tags, script bodies, link URIs,
/// footnotes, fence info strings) are delegated to the pure `nom`
/// parsers in [`super::rules`]:
///
/// ```text
/// source ➜ cursor (state machine) ➜ rules (pure nom scanners) ➜ tokens + spans
/// ```
///
/// Markdown lexing is not context-free: the same character means
/// different things depending on preceding whitespace, preceding
/// newlines, and which delimiters are currently open. The lookback
/// helpers ([`Tokenizer::line_indent`] and friends) compute the
/// [`TokenHint`] that resolves each such ambiguity at emit time.
pub struct Tokenizer<'input> {
    source: &'input str,
    span_map: SpanMap,
    pos: usize,
    tokens: Vec<Token>,
    scratch: String,
    scratch_start: usize,
}

impl<'input> Tokenizer<'input> {
    pub fn new(source: &'input str) -> Self {
        Self {
            source,
            span_map: SpanMap::new(source),
            pos: 0,
            tokens: Vec::new(),
            scratch: String::new(),
            scratch_start: 0,
        }
    }

    /// The line table built for this source.
    pub fn span_map(&self) -> &SpanMap {
        &self.span_map
    }

    /// Consumes the tokenizer, producing the token stream and the span
    /// map. The stream is never empty: it always ends with `Eof`.
    pub fn run(mut self) -> Result<(Vec<Token>, SpanMap)> {
        if let Some(skip) = rules::frontmatter_end(self.source) {
            // Frontmatter belongs to a collaborator; no token covers it.
            self.pos = skip;
        }
        while let Some(grapheme) = self.current() {
            match grapheme {
                "\n" => {
                    self.emit(None);
                    self.push(TokenKind::Newline, Span::new(self.pos, self.pos + 1));
                    self.pos += 1;
                }
                "\r\n" => {
                    // CR is ordinary text; the LF still ends the line.
                    self.buffer("\r");
                    self.emit(None);
                    self.push(TokenKind::Newline, Span::new(self.pos, self.pos + 1));
                    self.pos += 1;
                }
                ">" => self.handle_quote(),
                "<" => self.handle_angle()?,
                "\\" => self.handle_escape(),
                "-" => self.handle_hyphen(),
                "*" => self.handle_asterisk(),
                "_" => self.handle_underscore(),
                "~" => self.handle_tilde(),
                "#" => self.handle_hash(),
                "=" => self.handle_equals(),
                "`" => self.handle_grave(),
                "!" => self.handle_bang(),
                "[" => self.handle_open_bracket(),
                "]" => self.handle_close_bracket(),
                ")" => self.handle_close_paren(),
                g if g.chars().next().is_some_and(|c| c.is_ascii_digit()) => {
                    self.handle_digit(g)
                }
                g => self.buffer(g),
            }
        }
        self.emit(None);
        let end = self.source.len();
        self.push(TokenKind::Eof, Span::new(end, end + 1));
        debug!(
            "tokenized {} bytes into {} tokens",
            self.source.len(),
            self.tokens.len()
        );
        Ok((self.tokens, self.span_map))
    }

    // ------------------------------------------------------------------
    // Cursor primitives
    // ------------------------------------------------------------------

    fn current(&self) -> Option<&'input str> {
        self.source[self.pos..].graphemes(true).next()
    }

    fn rest(&self) -> &'input str {
        &self.source[self.pos..]
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.source[self.pos + offset..].chars().next()
    }

    fn prev_char(&self) -> Option<char> {
        self.source[..self.pos].chars().next_back()
    }

    fn run_len(&self, marker: char) -> usize {
        self.rest().chars().take_while(|c| *c == marker).count()
    }

    fn scratch_blank(&self) -> bool {
        !self.scratch.is_empty() && self.scratch.chars().all(char::is_whitespace)
    }

    /// Accumulates one grapheme into the scratch buffer. Blank runs and
    /// non-blank runs are kept in separate `Text` tokens so that the
    /// indentation lookback can see leading whitespace on its own.
    fn buffer(&mut self, grapheme: &str) {
        let blank = grapheme.chars().all(char::is_whitespace);
        if !self.scratch.is_empty() && self.scratch_blank() != blank {
            self.emit(None);
        }
        if self.scratch.is_empty() {
            self.scratch_start = self.pos;
        }
        self.scratch.push_str(grapheme);
        self.pos += grapheme.len();
    }

    /// Accumulates `len` bytes of non-blank marker text at the cursor.
    fn buffer_run(&mut self, len: usize) {
        if self.scratch_blank() {
            self.emit(None);
        }
        if self.scratch.is_empty() {
            self.scratch_start = self.pos;
        }
        let end = self.pos + len;
        self.scratch.push_str(&self.source[self.pos..end]);
        self.pos = end;
    }

    /// Moves `len` bytes into the (empty) scratch so the next emit can
    /// classify them under a hint.
    fn take_into_scratch(&mut self, len: usize) {
        debug_assert!(self.scratch.is_empty());
        self.scratch_start = self.pos;
        let end = self.pos + len;
        self.scratch.push_str(&self.source[self.pos..end]);
        self.pos = end;
    }

    fn push(&mut self, kind: TokenKind, span: Span) {
        self.tokens.push(Token::new(kind, span));
    }

    /// The emit step: classifies the scratch buffer into a token and
    /// commits it. Adjacent `Text` tokens are merged here — the only
    /// place where previously-emitted tokens are mutated.
    fn emit(&mut self, hint: Option<TokenHint>) {
        if self.scratch.is_empty() {
            return;
        }
        let span = Span::new(self.scratch_start, self.pos);
        let content = std::mem::take(&mut self.scratch);
        let kind = classify(content, hint);
        if let TokenKind::Text(new_text) = &kind {
            if let Some(last) = self.tokens.last_mut() {
                if let TokenKind::Text(previous) = &mut last.kind {
                    previous.push_str(new_text);
                    last.span = last.span.join(span);
                    return;
                }
            }
        }
        self.push(kind, span);
    }

    // ------------------------------------------------------------------
    // Lookback
    // ------------------------------------------------------------------

    /// Indentation in columns when everything emitted since the last
    /// newline is blank text; `None` anywhere else on a line. This is
    /// the list-context hint.
    fn line_indent(&self) -> Option<usize> {
        let mut columns = 0;
        for token in self.tokens.iter().rev() {
            match &token.kind {
                TokenKind::Newline | TokenKind::LineBreak => break,
                TokenKind::Text(text) if token.kind.is_blank_text() => {
                    columns += indent_width(text);
                }
                _ => return None,
            }
        }
        Some(columns)
    }

    /// Like [`Self::line_indent`] but also accounts for blanks still
    /// sitting in the scratch buffer.
    fn at_line_start(&self) -> Option<usize> {
        if !self.scratch.is_empty() && !self.scratch_blank() {
            return None;
        }
        let pending = if self.scratch_blank() {
            indent_width(&self.scratch)
        } else {
            0
        };
        self.line_indent().map(|columns| columns + pending)
    }

    /// True when only whitespace, list markers, and quote markers have
    /// been emitted since the last newline — the positions where a `>`
    /// run opens a blockquote.
    fn quote_context(&self) -> bool {
        if !self.scratch.is_empty() && !self.scratch_blank() {
            return false;
        }
        for token in self.tokens.iter().rev() {
            match &token.kind {
                TokenKind::Newline | TokenKind::LineBreak => break,
                TokenKind::UListItem { .. }
                | TokenKind::OListItem { .. }
                | TokenKind::BlockQuote { .. } => {}
                kind if kind.is_blank_text() => {}
                _ => return false,
            }
        }
        true
    }

    /// True when the most recent unclosed delimiter in the token vector
    /// is a link or image start.
    fn open_link_pending(&self) -> bool {
        for token in self.tokens.iter().rev() {
            match token.kind {
                TokenKind::LinkEnd => return false,
                TokenKind::LinkStart | TokenKind::ImageStart => return true,
                _ => {}
            }
        }
        false
    }

    fn line_has_close_bracket(&self, from: usize) -> bool {
        self.source[from..]
            .chars()
            .take_while(|c| *c != '\n')
            .any(|c| c == ']')
    }

    /// Only blanks remain between `from` and the end of the line.
    fn rest_of_line_blank(&self, from: usize) -> bool {
        for c in self.source[from..].chars() {
            if c == '\n' {
                return true;
            }
            if !c.is_whitespace() {
                return false;
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Per-character handlers
    // ------------------------------------------------------------------

    fn handle_quote(&mut self) {
        let run = self.run_len('>');
        let followed = matches!(self.peek_at(run), Some(c) if c.is_whitespace() && c != '\n');
        if followed && self.quote_context() {
            self.emit(None);
            self.take_into_scratch(run);
            self.emit(Some(TokenHint::BlockQuote { level: run }));
        } else {
            self.buffer_run(run);
        }
    }

    fn handle_escape(&mut self) {
        self.emit(None);
        let after = &self.source[self.pos + 1..];
        match after.graphemes(true).next() {
            None => self.buffer("\\"),
            Some("\n") => {
                self.take_into_scratch(2);
                self.emit(Some(TokenHint::InlineBreak));
            }
            Some(g) => {
                self.take_into_scratch(1 + g.len());
                self.emit(None);
            }
        }
    }

    fn handle_hyphen(&mut self) {
        let run = self.run_len('-');
        let indent = self.at_line_start();
        if run == 3 && indent.is_some() && self.rest_of_line_blank(self.pos + 3) {
            self.emit(None);
            self.push(TokenKind::TripleHyphen, Span::new(self.pos, self.pos + 3));
            self.pos += 3;
            return;
        }
        if run == 1 && matches!(self.peek_at(1), Some(' ') | Some('\t')) {
            if let Some(indent) = indent {
                self.emit(None);
                self.take_into_scratch(1);
                self.emit(Some(TokenHint::UListStart { indent }));
                return;
            }
        }
        // '-' is also a word character ("well-known")
        self.buffer_run(run);
    }

    fn handle_asterisk(&mut self) {
        if self.run_len('*') == 1 && matches!(self.peek_at(1), Some(' ') | Some('\t')) {
            if let Some(indent) = self.at_line_start() {
                self.emit(None);
                self.take_into_scratch(1);
                self.emit(Some(TokenHint::UListStart { indent }));
                return;
            }
        }
        self.emit(None);
        let take = self.run_len('*').min(3);
        let kind = match take {
            1 => TokenKind::SingleAsterisk,
            2 => TokenKind::DoubleAsterisk,
            // Longer runs split into a triple plus the remainder, which
            // the next loop iteration picks up.
            _ => TokenKind::TripleAsterisk,
        };
        self.push(kind, Span::new(self.pos, self.pos + take));
        self.pos += take;
    }

    fn handle_underscore(&mut self) {
        let run = self.run_len('_');
        let prev_word = self.prev_char().is_some_and(|c| c.is_alphanumeric());
        let next_word = self.peek_at(run).is_some_and(|c| c.is_alphanumeric());
        if prev_word && next_word {
            // intra-word underscores stay identifier text
            self.buffer_run(run);
            return;
        }
        self.emit(None);
        let take = run.min(3);
        let kind = match take {
            1 => TokenKind::SingleUnderscore,
            2 => TokenKind::DoubleUnderscore,
            _ => TokenKind::TripleUnderscore,
        };
        self.push(kind, Span::new(self.pos, self.pos + take));
        self.pos += take;
    }

    fn handle_tilde(&mut self) {
        let run = self.run_len('~');
        if run == 2 {
            self.emit(None);
            self.push(TokenKind::DoubleTilde, Span::new(self.pos, self.pos + 2));
            self.pos += 2;
        } else {
            self.buffer_run(run);
        }
    }

    fn handle_hash(&mut self) {
        let run = self.run_len('#');
        if (1..=6).contains(&run)
            && matches!(self.peek_at(run), Some(' ') | Some('\t'))
            && self.at_line_start().is_some()
        {
            self.emit(None);
            self.push(
                TokenKind::Heading(run as u8),
                Span::new(self.pos, self.pos + run),
            );
            self.pos += run;
        } else {
            self.buffer_run(run);
        }
    }

    fn handle_equals(&mut self) {
        let run = self.run_len('=');
        if run == 3 && self.at_line_start().is_some() && self.rest_of_line_blank(self.pos + 3) {
            self.emit(None);
            self.push(TokenKind::TripleEquals, Span::new(self.pos, self.pos + 3));
            self.pos += 3;
        } else {
            self.buffer_run(run);
        }
    }

    fn handle_grave(&mut self) {
        let run = self.run_len('`');
        match run {
            1 => {
                self.emit(None);
                self.push(
                    TokenKind::SingleGrave { language: None },
                    Span::new(self.pos, self.pos + 1),
                );
                self.pos += 1;
            }
            // No double-grave form in this dialect.
            2 => self.buffer_run(2),
            _ => {
                self.emit(None);
                let start = self.pos;
                let mut end = start + 3;
                let mut language = None;
                if run == 3 {
                    if let Ok((_, info)) = rules::scan_fence_info(&self.source[end..]) {
                        if !info.is_empty() {
                            language = Some(info.to_string());
                            end += info.len();
                        }
                    }
                }
                self.push(TokenKind::TripleGrave { language }, Span::new(start, end));
                self.pos = end;
            }
        }
    }

    fn handle_bang(&mut self) {
        if self.peek_at(1) == Some('[') && self.line_has_close_bracket(self.pos + 2) {
            self.emit(None);
            self.take_into_scratch(2);
            self.emit(Some(TokenHint::LinkStart));
        } else {
            self.buffer("!");
        }
    }

    fn handle_open_bracket(&mut self) {
        if let Ok((rest, (_, is_def))) = rules::scan_footnote(self.rest()) {
            let mut len = self.rest().len() - rest.len();
            let mut hint = TokenHint::FootnoteRef;
            if is_def {
                if self.at_line_start().is_some() {
                    hint = TokenHint::FootnoteDef;
                } else {
                    // definitions only open lines; mid-line the colon
                    // stays ordinary text
                    len -= 1;
                }
            }
            self.emit(None);
            self.take_into_scratch(len);
            self.emit(Some(hint));
            return;
        }
        if self.line_has_close_bracket(self.pos + 1) {
            self.emit(None);
            self.take_into_scratch(1);
            self.emit(Some(TokenHint::LinkStart));
        } else {
            self.buffer("[");
        }
    }

    fn handle_close_bracket(&mut self) {
        match rules::scan_link_target(self.rest()) {
            Ok((rest, uri)) => {
                self.emit(None);
                let consumed = self.rest().len() - rest.len();
                self.push(TokenKind::LinkInterstice, Span::new(self.pos, self.pos + 2));
                if !uri.is_empty() {
                    self.push(
                        TokenKind::LinkUri(uri),
                        Span::new(self.pos + 2, self.pos + consumed),
                    );
                }
                self.pos += consumed;
            }
            Err(_) => self.buffer("]"),
        }
    }

    fn handle_close_paren(&mut self) {
        if self.open_link_pending() {
            self.emit(None);
            self.take_into_scratch(1);
            self.emit(Some(TokenHint::LinkEnd));
        } else {
            self.buffer(")");
        }
    }

    fn handle_digit(&mut self, grapheme: &'input str) {
        let digits = self
            .rest()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .count();
        let dotted = self.peek_at(digits) == Some('.')
            && matches!(self.peek_at(digits + 1), Some(' ') | Some('\t'));
        if dotted {
            if let Some(indent) = self.at_line_start() {
                self.emit(None);
                self.take_into_scratch(digits + 1);
                self.emit(Some(TokenHint::OListStart { indent }));
                return;
            }
        }
        self.buffer(grapheme);
    }

    fn handle_angle(&mut self) -> Result<()> {
        match rules::scan_html_tag(self.rest()) {
            Ok((rest, scan)) => {
                let tag_len = self.rest().len() - rest.len();
                if !scan.closing
                    && !scan.self_closing
                    && scan.name.eq_ignore_ascii_case("script")
                {
                    return self.finish_script(tag_len, scan.attributes);
                }
                self.emit(None);
                let name = TagName::parse(&scan.name);
                let span = Span::new(self.pos, self.pos + tag_len);
                let kind = if scan.closing {
                    TokenKind::HtmlCloseTag { name }
                } else {
                    TokenKind::HtmlOpenTag {
                        name,
                        attributes: scan.attributes,
                        self_closing: scan.self_closing,
                    }
                };
                self.push(kind, span);
                self.pos += tag_len;
                Ok(())
            }
            Err(_) => {
                if rules::looks_like_tag(self.rest()) {
                    if let Some(gt) = self.rest().find('>') {
                        let span = Span::new(self.pos, self.pos + gt + 1);
                        return Err(MarkdownError::InvalidAttribute {
                            detail: self.rest()[..gt + 1].chars().take(40).collect(),
                            location: self.span_map.lookup(span),
                        });
                    }
                }
                // no closing '>' before end of input: rewind to text
                self.buffer("<");
                Ok(())
            }
        }
    }

    /// Consumes `<script …>` plus the raw body up to the literal
    /// closing tag.
    fn finish_script(&mut self, tag_len: usize, attributes: AttrList) -> Result<()> {
        let rest = &self.source[self.pos + tag_len..];
        match rest.find("</script>") {
            Some(body_len) => {
                self.emit(None);
                let body = rest[..body_len].to_string();
                let total = tag_len + body_len + "</script>".len();
                self.push(
                    TokenKind::ScriptTag { body, attributes },
                    Span::new(self.pos, self.pos + total),
                );
                self.pos += total;
                Ok(())
            }
            None => Err(MarkdownError::UnclosedScriptTag {
                location: self.span_map.lookup(Span::new(self.pos, self.pos + tag_len)),
            }),
        }
    }
}

/// Classifies a full scratch buffer into a token kind, resolving
/// identical contents through the hint computed by the handler.
fn classify(content: String, hint: Option<TokenHint>) -> TokenKind {
    match hint {
        Some(TokenHint::UListStart { indent }) => TokenKind::UListItem { level: indent },
        Some(TokenHint::OListStart { indent }) => TokenKind::OListItem { level: indent },
        Some(TokenHint::BlockQuote { level }) => TokenKind::BlockQuote { level },
        Some(TokenHint::LinkStart) if content == "![" => TokenKind::ImageStart,
        Some(TokenHint::LinkStart) => TokenKind::LinkStart,
        Some(TokenHint::LinkEnd) => TokenKind::LinkEnd,
        Some(TokenHint::InlineBreak) => TokenKind::LineBreak,
        Some(TokenHint::FootnoteRef) => TokenKind::FootnoteRef(footnote_label(&content)),
        Some(TokenHint::FootnoteDef) => TokenKind::FootnoteDef(footnote_label(&content)),
        None => {
            let mut chars = content.chars();
            if chars.next() == Some('\\') {
                if let Some(escaped) = chars.next() {
                    if chars.next().is_none() {
                        return TokenKind::Escape(escaped);
                    }
                }
            }
            TokenKind::Text(content)
        }
    }
}

fn footnote_label(content: &str) -> String {
    content
        .trim_start_matches("[^")
        .trim_end_matches(':')
        .trim_end_matches(']')
        .to_string()
}

/// Column width of a blank run; tabs advance to the next multiple of 4.
fn indent_width(text: &str) -> usize {
    text.chars().fold(0, |width, c| {
        if c == '\t' {
            width + 4 - (width % 4)
        } else {
            width + 1
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(source: &str) -> Vec<Token> {
        Tokenizer::new(source).run().expect("tokenizer").0
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    fn text(s: &str) -> TokenKind {
        TokenKind::Text(s.to_string())
    }

    #[test]
    fn empty_input_still_yields_eof() {
        let tokens = tokenize("");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
        assert_eq!(tokens[0].span, Span::new(0, 1));
    }

    #[test]
    fn plain_text_merges_into_one_token() {
        assert_eq!(
            kinds("hello brave world"),
            vec![text("hello brave world"), TokenKind::Eof]
        );
    }

    #[test]
    fn heading_levels_map_by_run_length() {
        assert_eq!(
            kinds("# a"),
            vec![TokenKind::Heading(1), text(" a"), TokenKind::Eof]
        );
        assert_eq!(
            kinds("### a"),
            vec![TokenKind::Heading(3), text(" a"), TokenKind::Eof]
        );
        // seven hashes are not a heading
        assert_eq!(kinds("####### a"), vec![text("####### a"), TokenKind::Eof]);
        // headings only open lines
        assert_eq!(kinds("x # a"), vec![text("x # a"), TokenKind::Eof]);
        // and need trailing whitespace
        assert_eq!(kinds("#tag"), vec![text("#tag"), TokenKind::Eof]);
    }

    #[test]
    fn asterisk_runs_split_after_three() {
        assert_eq!(
            kinds("**a****"),
            vec![
                TokenKind::DoubleAsterisk,
                text("a"),
                TokenKind::TripleAsterisk,
                TokenKind::SingleAsterisk,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn underscores_inside_identifiers_stay_text() {
        assert_eq!(kinds("snake_case_name"), vec![text("snake_case_name"), TokenKind::Eof]);
        assert_eq!(
            kinds("_x_"),
            vec![
                TokenKind::SingleUnderscore,
                text("x"),
                TokenKind::SingleUnderscore,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn tilde_pairs_only() {
        assert_eq!(
            kinds("~~x~~"),
            vec![
                TokenKind::DoubleTilde,
                text("x"),
                TokenKind::DoubleTilde,
                TokenKind::Eof
            ]
        );
        assert_eq!(kinds("~x~"), vec![text("~x~"), TokenKind::Eof]);
    }

    #[test]
    fn escape_and_hard_break() {
        assert_eq!(
            kinds("a\\*b"),
            vec![text("a"), TokenKind::Escape('*'), text("b"), TokenKind::Eof]
        );
        assert_eq!(
            kinds("a\\\nb"),
            vec![text("a"), TokenKind::LineBreak, text("b"), TokenKind::Eof]
        );
        // trailing backslash is ordinary text
        assert_eq!(kinds("a\\"), vec![text("a\\"), TokenKind::Eof]);
    }

    #[test]
    fn unordered_list_markers_carry_indent() {
        assert_eq!(
            kinds("- a"),
            vec![
                TokenKind::UListItem { level: 0 },
                text(" a"),
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("  - a"),
            vec![
                text("  "),
                TokenKind::UListItem { level: 2 },
                text(" a"),
                TokenKind::Eof
            ]
        );
        // '*' bullets too
        assert_eq!(
            kinds("* a"),
            vec![
                TokenKind::UListItem { level: 0 },
                text(" a"),
                TokenKind::Eof
            ]
        );
        // mid-line dashes are word characters
        assert_eq!(kinds("well-known"), vec![text("well-known"), TokenKind::Eof]);
    }

    #[test]
    fn tab_indent_advances_to_multiple_of_four() {
        let tokens = kinds("\t- a");
        assert_eq!(tokens[1], TokenKind::UListItem { level: 4 });
    }

    #[test]
    fn ordered_list_markers() {
        assert_eq!(
            kinds("1. a"),
            vec![
                TokenKind::OListItem { level: 0 },
                text(" a"),
                TokenKind::Eof
            ]
        );
        // numbering is accepted and discarded
        assert_eq!(
            kinds("12. a"),
            vec![
                TokenKind::OListItem { level: 0 },
                text(" a"),
                TokenKind::Eof
            ]
        );
        // no trailing whitespace: plain text
        assert_eq!(kinds("1.5"), vec![text("1.5"), TokenKind::Eof]);
    }

    #[test]
    fn blockquote_runs() {
        assert_eq!(
            kinds("> f"),
            vec![
                TokenKind::BlockQuote { level: 1 },
                text(" f"),
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds(">>> h"),
            vec![
                TokenKind::BlockQuote { level: 3 },
                text(" h"),
                TokenKind::Eof
            ]
        );
        // not at line start: text
        assert_eq!(kinds("a > b"), vec![text("a > b"), TokenKind::Eof]);
    }

    #[test]
    fn horizontal_rule_markers_must_stand_alone() {
        assert_eq!(
            kinds("---\n"),
            vec![TokenKind::TripleHyphen, TokenKind::Newline, TokenKind::Eof]
        );
        assert_eq!(kinds("==="), vec![TokenKind::TripleEquals, TokenKind::Eof]);
        assert_eq!(kinds("--- x"), vec![text("--- x"), TokenKind::Eof]);
        assert_eq!(
            kinds("___"),
            vec![TokenKind::TripleUnderscore, TokenKind::Eof]
        );
    }

    #[test]
    fn inline_and_fenced_code() {
        assert_eq!(
            kinds("`x`"),
            vec![
                TokenKind::SingleGrave { language: None },
                text("x"),
                TokenKind::SingleGrave { language: None },
                TokenKind::Eof
            ]
        );
        let tokens = kinds("```rust\nlet x=1;\n```");
        assert_eq!(
            tokens[0],
            TokenKind::TripleGrave {
                language: Some("rust".to_string())
            }
        );
        assert_eq!(*tokens.last().unwrap(), TokenKind::Eof);
        assert_eq!(tokens[tokens.len() - 2], TokenKind::TripleGrave { language: None });
    }

    #[test]
    fn links_tokenize_to_delimiter_runs() {
        assert_eq!(
            kinds("[a](https://x.y)"),
            vec![
                TokenKind::LinkStart,
                text("a"),
                TokenKind::LinkInterstice,
                TokenKind::LinkUri("https://x.y".to_string()),
                TokenKind::LinkEnd,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn bracketed_uri_keeps_inner_parens() {
        let tokens = kinds("[a](<https://x.y/(z)>)");
        assert!(tokens.contains(&TokenKind::LinkUri("https://x.y/(z)".to_string())));
        assert!(tokens.contains(&TokenKind::LinkEnd));
    }

    #[test]
    fn image_start_requires_matching_bracket() {
        assert_eq!(
            kinds("![alt](u)"),
            vec![
                TokenKind::ImageStart,
                text("alt"),
                TokenKind::LinkInterstice,
                TokenKind::LinkUri("u".to_string()),
                TokenKind::LinkEnd,
                TokenKind::Eof
            ]
        );
        assert_eq!(kinds("!x"), vec![text("!x"), TokenKind::Eof]);
    }

    #[test]
    fn bracket_without_close_stays_text() {
        assert_eq!(kinds("[abc"), vec![text("[abc"), TokenKind::Eof]);
        // close on a later line does not count
        assert_eq!(kinds("[a\n]b"), vec![text("[a"), TokenKind::Newline, text("]b"), TokenKind::Eof]);
    }

    #[test]
    fn paren_without_open_link_stays_text() {
        assert_eq!(kinds("(a)"), vec![text("(a)"), TokenKind::Eof]);
    }

    #[test]
    fn footnote_forms() {
        assert_eq!(
            kinds("x[^1]"),
            vec![
                text("x"),
                TokenKind::FootnoteRef("1".to_string()),
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("[^note]: body"),
            vec![
                TokenKind::FootnoteDef("note".to_string()),
                text(" body"),
                TokenKind::Eof
            ]
        );
        // definitions only open lines
        let tokens = kinds("x [^note]: y");
        assert_eq!(tokens[1], TokenKind::FootnoteRef("note".to_string()));
    }

    #[test]
    fn html_tags_with_attributes() {
        let tokens = kinds("<a href=\"/x\" hidden>t</a>");
        assert_eq!(
            tokens[0],
            TokenKind::HtmlOpenTag {
                name: TagName::A,
                attributes: vec![
                    ("href".to_string(), Some("/x".to_string())),
                    ("hidden".to_string(), None),
                ],
                self_closing: false,
            }
        );
        assert_eq!(tokens[1], text("t"));
        assert_eq!(tokens[2], TokenKind::HtmlCloseTag { name: TagName::A });
    }

    #[test]
    fn self_closing_tag() {
        let tokens = kinds("<br/>");
        assert_eq!(
            tokens[0],
            TokenKind::HtmlOpenTag {
                name: TagName::Br,
                attributes: vec![],
                self_closing: true,
            }
        );
    }

    #[test]
    fn script_tag_captures_raw_body() {
        let tokens = kinds("<script defer>let a = \"*not bold*\";</script>");
        match &tokens[0] {
            TokenKind::ScriptTag { body, attributes } => {
                assert_eq!(body, "let a = \"*not bold*\";");
                assert_eq!(attributes, &vec![("defer".to_string(), None)]);
            }
            other => panic!("expected script tag, got {:?}", other),
        }
    }

    #[test]
    fn unclosed_script_is_fatal() {
        let error = Tokenizer::new("<script>let a = 1;").run().unwrap_err();
        assert!(matches!(error, MarkdownError::UnclosedScriptTag { .. }));
    }

    #[test]
    fn malformed_attributes_are_fatal() {
        let error = Tokenizer::new("<div a=>x</div>").run().unwrap_err();
        assert!(matches!(error, MarkdownError::InvalidAttribute { .. }));
    }

    #[test]
    fn angle_without_close_rewinds_to_text() {
        assert_eq!(kinds("a < b"), vec![text("a < b"), TokenKind::Eof]);
        assert_eq!(kinds("1 <3"), vec![text("1 <3"), TokenKind::Eof]);
        assert_eq!(kinds("<div"), vec![text("<div"), TokenKind::Eof]);
    }

    #[test]
    fn frontmatter_is_skipped() {
        let source = "+++\ntitle = \"x\"\n+++\nbody";
        let tokens = tokenize(source);
        assert_eq!(tokens[0].kind, text("body"));
        // spans stay relative to the full source
        assert_eq!(&source[tokens[0].span.start..tokens[0].span.end], "body");
    }

    #[test]
    fn spans_are_ordered_and_cover_the_source() {
        let source = "# h\n\n- a\n- *b*\n\n> q [l](u) `c` ~~s~~ x\n";
        let tokens = tokenize(source);
        let mut cursor = 0;
        let mut rebuilt = String::new();
        for token in &tokens {
            if token.kind == TokenKind::Eof {
                break;
            }
            assert!(token.span.start >= cursor, "overlapping span {:?}", token);
            rebuilt.push_str(&source[token.span.start..token.span.end]);
            cursor = token.span.end;
        }
        assert_eq!(rebuilt, source);
    }

    #[test]
    fn crlf_keeps_carriage_return_as_text() {
        assert_eq!(
            kinds("a\r\nb"),
            vec![text("a\r"), TokenKind::Newline, text("b"), TokenKind::Eof]
        );
    }
}
