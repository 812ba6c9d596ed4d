use log::debug;

use crate::ast::Node;
use crate::error::{MarkdownError, Result};
use crate::lexer::{Token, TokenKind};
use crate::span::{LineCol, Span, SpanMap};

/// Configuration for the tree builder.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Maximum recursion depth. Nested emphasis, lists, quotes, and
    /// HTML all recurse on token slices; pathological inputs are cut
    /// off here instead of overflowing the stack.
    pub max_nesting_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: 1024,
        }
    }
}

/// Builds the document tree out of the flat token stream.
///
/// The builder owns its token slice and walks it once, left to right.
/// Many rules recurse by running a child builder over an inner token
/// slice: emphasis bodies, heading content, link descriptions, list
/// items, and HTML children. Delimiter ambiguities (`***` opening both
/// bold and italic) are resolved by rewriting the owned token slice in
/// place — the stream is treated *as if* it had contained the split
/// delimiters.
pub struct TreeBuilder<'map> {
    tokens: Vec<Token>,
    pos: usize,
    output: Vec<Node>,
    curr_list: Option<Node>,
    span_map: &'map SpanMap,
    config: ParserConfig,
    depth: usize,
}

/// Builds a document tree from a token stream with default
/// configuration.
pub fn parse_tokens(tokens: Vec<Token>, span_map: &SpanMap) -> Result<Vec<Node>> {
    let builder = TreeBuilder::new(tokens, span_map, ParserConfig::default());
    builder.build()
}

impl<'map> TreeBuilder<'map> {
    pub fn new(tokens: Vec<Token>, span_map: &'map SpanMap, config: ParserConfig) -> Self {
        Self {
            tokens,
            pos: 0,
            output: Vec::new(),
            curr_list: None,
            span_map,
            config,
            depth: 0,
        }
    }

    fn child(&self, tokens: Vec<Token>) -> TreeBuilder<'map> {
        TreeBuilder {
            tokens,
            pos: 0,
            output: Vec::new(),
            curr_list: None,
            span_map: self.span_map,
            config: self.config.clone(),
            depth: self.depth + 1,
        }
    }

    /// Consumes the builder and produces the node list for its slice.
    pub fn build(mut self) -> Result<Vec<Node>> {
        if self.depth > self.config.max_nesting_depth {
            return Err(MarkdownError::NestingTooDeep {
                limit: self.config.max_nesting_depth,
                location: self
                    .tokens
                    .first()
                    .and_then(|token| self.span_map.lookup(token.span)),
            });
        }
        while self.pos < self.tokens.len() {
            let kind = self.tokens[self.pos].kind.clone();
            match kind {
                TokenKind::Eof => break,
                TokenKind::Text(text) => {
                    self.pos += 1;
                    self.push_text(&text);
                }
                TokenKind::Escape(c) => {
                    self.pos += 1;
                    self.push_text(&c.to_string());
                }
                TokenKind::Newline => self.handle_newline(),
                TokenKind::LineBreak => {
                    self.pos += 1;
                    self.output.push(Node::InlineLineBreak);
                }
                TokenKind::Heading(level) => self.handle_heading(level)?,
                TokenKind::SingleAsterisk | TokenKind::SingleUnderscore => self.handle_italic()?,
                TokenKind::DoubleAsterisk => self.handle_bold()?,
                TokenKind::TripleAsterisk => self.handle_triple_asterisk()?,
                TokenKind::DoubleUnderscore => {
                    self.handle_simple_pair(TokenKind::DoubleUnderscore, Node::Underline, "__")?
                }
                TokenKind::DoubleTilde => {
                    self.handle_simple_pair(TokenKind::DoubleTilde, Node::Strikethrough, "~~")?
                }
                TokenKind::TripleUnderscore => {
                    self.pos += 1;
                    self.output.push(Node::InlineLineBreak);
                }
                TokenKind::TripleHyphen | TokenKind::TripleEquals => {
                    self.pos += 1;
                    self.output.push(Node::HorizontalRule);
                }
                TokenKind::SingleGrave { language } => self.handle_inline_code(language),
                TokenKind::TripleGrave { language } => self.handle_fenced_code(language)?,
                TokenKind::LinkStart => self.handle_link(false)?,
                TokenKind::ImageStart => self.handle_link(true)?,
                // stray link internals degrade to their literal text
                TokenKind::LinkInterstice | TokenKind::LinkUri(_) | TokenKind::LinkEnd => {
                    self.pos += 1;
                    self.push_text(&kind.lexeme());
                }
                TokenKind::UListItem { .. }
                | TokenKind::OListItem { .. }
                | TokenKind::BlockQuote { .. } => self.handle_list_item(kind)?,
                TokenKind::HtmlOpenTag {
                    name,
                    attributes,
                    self_closing,
                } => self.handle_html_open(name, attributes, self_closing)?,
                TokenKind::HtmlCloseTag { .. } => {
                    // unmatched close tag
                    self.pos += 1;
                    self.push_text(&kind.lexeme());
                }
                TokenKind::ScriptTag { body, attributes } => {
                    self.pos += 1;
                    self.output.push(Node::CustomScript { body, attributes });
                }
                TokenKind::FootnoteRef(label) => {
                    self.pos += 1;
                    self.output.push(Node::FootnoteRef(label));
                }
                TokenKind::FootnoteDef(label) => self.handle_footnote_def(label)?,
            }
        }
        if let Some(list) = self.curr_list.take() {
            self.output.push(list);
        }
        if self.depth == 0 {
            debug!("built {} top-level nodes", self.output.len());
        }
        Ok(self.output)
    }

    // ------------------------------------------------------------------
    // Text and paragraphs
    // ------------------------------------------------------------------

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Node::Text(previous)) = self.output.last_mut() {
            previous.push_str(text);
        } else {
            self.output.push(Node::Text(text.to_string()));
        }
    }

    /// Drops trailing blanks from the preceding text node. Applied when
    /// a line-start construct begins, so the newline that ended the
    /// previous line does not leak into its text.
    fn trim_blank_tail(&mut self) {
        if let Some(Node::Text(text)) = self.output.last_mut() {
            let trimmed = text.trim_end().len();
            if trimmed == 0 {
                self.output.pop();
            } else {
                text.truncate(trimmed);
            }
        }
    }

    fn handle_newline(&mut self) {
        let next = self.tokens.get(self.pos + 1).map(|token| &token.kind);
        match next {
            Some(TokenKind::Newline) => {
                while matches!(
                    self.tokens.get(self.pos).map(|token| &token.kind),
                    Some(TokenKind::Newline)
                ) {
                    self.pos += 1;
                }
                self.wrap_paragraph();
            }
            // the newline closing the document carries no content
            Some(TokenKind::Eof) | None => self.pos += 1,
            _ => {
                // a lone newline is literal text
                self.pos += 1;
                self.push_text("\n");
            }
        }
    }

    /// Paragraph inference at a blank-line boundary: walk back over the
    /// recently pushed nodes, popping consecutive inline nodes into a
    /// fresh paragraph. A boundary with nothing but blanks behind it
    /// becomes a paragraph separator.
    fn wrap_paragraph(&mut self) {
        let mut taken = Vec::new();
        while let Some(node) = self.output.last() {
            if node.is_inline() {
                taken.push(self.output.pop().expect("non-empty output"));
            } else {
                break;
            }
        }
        taken.reverse();
        let blank_only = taken
            .iter()
            .all(|node| matches!(node, Node::Text(text) if text.trim().is_empty()));
        if taken.is_empty() || blank_only {
            self.output.push(Node::LineBreak);
            return;
        }
        if let Some(Node::Text(text)) = taken.first_mut() {
            let trimmed = text.trim_start().to_string();
            if trimmed.is_empty() {
                taken.remove(0);
            } else {
                *text = trimmed;
            }
        }
        if let Some(Node::Text(text)) = taken.last_mut() {
            let trimmed = text.trim_end().len();
            if trimmed == 0 {
                taken.pop();
            } else {
                text.truncate(trimmed);
            }
        }
        self.output.push(Node::Paragraph(taken));
    }

    // ------------------------------------------------------------------
    // Emphasis
    // ------------------------------------------------------------------

    /// Finds the next token matching `closer`, skipping across link
    /// runs, which bind tighter than emphasis.
    fn find_closer(&self, from: usize, closer: impl Fn(&TokenKind) -> bool) -> Option<usize> {
        let mut i = from;
        while i < self.tokens.len() {
            match &self.tokens[i].kind {
                TokenKind::Eof => return None,
                TokenKind::LinkStart | TokenKind::ImageStart => {
                    match self.find_link_end(i + 1) {
                        Some(end) => i = end + 1,
                        None => i += 1,
                    }
                    continue;
                }
                kind if closer(kind) => return Some(i),
                _ => {}
            }
            i += 1;
        }
        None
    }

    fn find_link_end(&self, from: usize) -> Option<usize> {
        self.tokens[from..]
            .iter()
            .position(|token| token.kind == TokenKind::LinkEnd)
            .map(|offset| from + offset)
    }

    fn inner_slice(&self, from: usize, to: usize) -> Vec<Token> {
        self.tokens[from..to].to_vec()
    }

    fn handle_italic(&mut self) -> Result<()> {
        let open = self.pos;
        let closer = self.find_closer(open + 1, |kind| {
            matches!(
                kind,
                TokenKind::SingleAsterisk | TokenKind::SingleUnderscore | TokenKind::TripleAsterisk
            )
        });
        match closer {
            None => {
                let literal = self.tokens[open].kind.lexeme();
                self.pos = open + 1;
                self.push_text(&literal);
            }
            Some(close) => {
                let inner = self.inner_slice(open + 1, close);
                let children = self.child(inner).build()?;
                self.output.push(Node::Italic(children));
                if self.tokens[close].kind == TokenKind::TripleAsterisk {
                    // the triple both closes the italic and reopens bold
                    self.tokens[close].kind = TokenKind::DoubleAsterisk;
                    self.pos = close;
                } else {
                    self.pos = close + 1;
                }
            }
        }
        Ok(())
    }

    fn handle_bold(&mut self) -> Result<()> {
        let open = self.pos;
        let closer = self.find_closer(open + 1, |kind| {
            matches!(
                kind,
                TokenKind::DoubleAsterisk | TokenKind::TripleAsterisk
            )
        });
        match closer {
            None => {
                self.pos = open + 1;
                self.push_text("**");
            }
            Some(close) => {
                let inner = self.inner_slice(open + 1, close);
                let children = self.child(inner).build()?;
                self.output.push(Node::Bold(children));
                if self.tokens[close].kind == TokenKind::TripleAsterisk {
                    self.tokens[close].kind = TokenKind::SingleAsterisk;
                    self.pos = close;
                } else {
                    self.pos = close + 1;
                }
            }
        }
        Ok(())
    }

    /// A `***` run opens bold and italic at once; lookahead over the
    /// remaining tokens decides which one closes first.
    fn handle_triple_asterisk(&mut self) -> Result<()> {
        let open = self.pos;
        let closer = self.find_closer(open + 1, |kind| {
            matches!(
                kind,
                TokenKind::SingleAsterisk
                    | TokenKind::SingleUnderscore
                    | TokenKind::DoubleAsterisk
                    | TokenKind::TripleAsterisk
            )
        });
        let span = self.tokens[open].span;
        match closer.map(|close| (close, self.tokens[close].kind.clone())) {
            // `***x***`: plain bold-italic
            Some((close, TokenKind::TripleAsterisk)) => {
                let inner = self.inner_slice(open + 1, close);
                let children = self.child(inner).build()?;
                self.output.push(Node::Bold(vec![Node::Italic(children)]));
                self.pos = close + 1;
            }
            // a single `*` closes first: the italic is innermost, so the
            // stream is treated as `**` followed by `*`
            Some((_, TokenKind::SingleAsterisk)) | Some((_, TokenKind::SingleUnderscore)) => {
                self.tokens[open].kind = TokenKind::DoubleAsterisk;
                self.tokens[open].span = Span::new(span.start, span.start + 2);
                self.tokens.insert(
                    open + 1,
                    Token::new(
                        TokenKind::SingleAsterisk,
                        Span::new(span.start + 2, span.end),
                    ),
                );
            }
            // `**` closes first: the bold is innermost
            Some((_, TokenKind::DoubleAsterisk)) => {
                self.tokens[open].kind = TokenKind::SingleAsterisk;
                self.tokens[open].span = Span::new(span.start, span.start + 1);
                self.tokens.insert(
                    open + 1,
                    Token::new(
                        TokenKind::DoubleAsterisk,
                        Span::new(span.start + 1, span.end),
                    ),
                );
            }
            // no closer at all: the rest of the slice is bold-italic
            _ => {
                let inner = self.inner_slice(open + 1, self.tokens.len());
                let children = self.child(inner).build()?;
                self.output.push(Node::Bold(vec![Node::Italic(children)]));
                self.pos = self.tokens.len();
            }
        }
        Ok(())
    }

    fn handle_simple_pair(
        &mut self,
        close: TokenKind,
        wrap: fn(Vec<Node>) -> Node,
        literal: &str,
    ) -> Result<()> {
        let open = self.pos;
        let closer = self.find_closer(open + 1, |kind| *kind == close);
        match closer {
            None => {
                self.pos = open + 1;
                self.push_text(literal);
            }
            Some(close) => {
                let inner = self.inner_slice(open + 1, close);
                let children = self.child(inner).build()?;
                self.output.push(wrap(children));
                self.pos = close + 1;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Code
    // ------------------------------------------------------------------

    fn handle_inline_code(&mut self, language: Option<String>) {
        let open = self.pos;
        let close = self.tokens[open + 1..]
            .iter()
            .position(|token| matches!(token.kind, TokenKind::SingleGrave { .. }))
            .map(|offset| open + 1 + offset);
        match close {
            None => {
                self.pos = open + 1;
                self.push_text("`");
            }
            Some(close) => {
                // code content is literal, never parsed
                let flat = flatten_tokens(&self.tokens[open + 1..close]);
                let children = if flat.is_empty() {
                    Vec::new()
                } else {
                    vec![Node::Text(flat)]
                };
                self.output.push(Node::Code { children, language });
                self.pos = close + 1;
            }
        }
    }

    fn handle_fenced_code(&mut self, language: Option<String>) -> Result<()> {
        let open = self.pos;
        let close = self.tokens[open + 1..]
            .iter()
            .position(|token| matches!(token.kind, TokenKind::TripleGrave { .. }))
            .map(|offset| open + 1 + offset);
        match close {
            None => Err(MarkdownError::UnclosedDelimiter {
                delimiter: "```",
                location: self.span_map.lookup(self.tokens[open].span),
            }),
            Some(close) => {
                let mut body = &self.tokens[open + 1..close];
                // the newline right after the opening fence is not content
                if matches!(body.first().map(|token| &token.kind), Some(TokenKind::Newline)) {
                    body = &body[1..];
                }
                let flat = flatten_tokens(body);
                let children = if flat.is_empty() {
                    Vec::new()
                } else {
                    vec![Node::Text(flat)]
                };
                self.output.push(Node::MultilineCode { children, language });
                self.pos = close + 1;
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Links and images
    // ------------------------------------------------------------------

    fn handle_link(&mut self, image: bool) -> Result<()> {
        let open = self.pos;
        let Some(end) = self.find_link_end(open + 1) else {
            let literal = self.tokens[open].kind.lexeme();
            self.pos = open + 1;
            self.push_text(&literal);
            return Ok(());
        };
        let mut desc_end = end;
        let mut uri = None;
        for i in open + 1..end {
            match &self.tokens[i].kind {
                TokenKind::LinkInterstice => desc_end = desc_end.min(i),
                TokenKind::LinkUri(target) if uri.is_none() => uri = Some(target.clone()),
                _ => {}
            }
        }
        let description = self.inner_slice(open + 1, desc_end);
        if image {
            let alt = flatten_tokens(&description);
            self.output.push(Node::Image { alt, uri });
        } else {
            let children = self.child(description).build()?;
            self.output.push(Node::Link { children, uri });
        }
        self.pos = end + 1;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Headings and footnote definitions
    // ------------------------------------------------------------------

    /// Tokens from `from` up to (excluding) the next newline, plus the
    /// position just past that newline.
    fn rest_of_line(&self, from: usize) -> (usize, usize) {
        let mut i = from;
        while i < self.tokens.len() {
            match self.tokens[i].kind {
                TokenKind::Newline => return (i, i + 1),
                TokenKind::Eof => return (i, i),
                _ => i += 1,
            }
        }
        (i, i)
    }

    fn handle_heading(&mut self, level: u8) -> Result<()> {
        self.trim_blank_tail();
        let open = self.pos;
        let (line_end, next) = self.rest_of_line(open + 1);
        let mut inner = self.inner_slice(open + 1, line_end);
        trim_slice_edges(&mut inner);
        let children = self.child(inner).build()?;
        self.output.push(Node::Heading { level, children });
        self.pos = next;
        Ok(())
    }

    fn handle_footnote_def(&mut self, label: String) -> Result<()> {
        self.trim_blank_tail();
        let open = self.pos;
        let (line_end, next) = self.rest_of_line(open + 1);
        let mut inner = self.inner_slice(open + 1, line_end);
        trim_slice_edges(&mut inner);
        let children = self.child(inner).build()?;
        self.output.push(Node::FootnoteDef { label, children });
        self.pos = next;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Raw HTML
    // ------------------------------------------------------------------

    fn handle_html_open(
        &mut self,
        name: crate::lexer::TagName,
        attributes: crate::lexer::AttrList,
        self_closing: bool,
    ) -> Result<()> {
        let open = self.pos;
        if self_closing {
            self.pos = open + 1;
            self.output.push(Node::CustomHtml {
                name,
                attributes,
                children: Vec::new(),
            });
            return Ok(());
        }
        // nested tags of the same name pair via a depth counter
        let mut nesting = 1usize;
        let mut close = None;
        let mut i = open + 1;
        while i < self.tokens.len() {
            match &self.tokens[i].kind {
                TokenKind::HtmlOpenTag {
                    name: open_name,
                    self_closing: false,
                    ..
                } if *open_name == name => nesting += 1,
                TokenKind::HtmlCloseTag { name: close_name } if *close_name == name => {
                    nesting -= 1;
                    if nesting == 0 {
                        close = Some(i);
                        break;
                    }
                }
                TokenKind::Eof => break,
                _ => {}
            }
            i += 1;
        }
        let Some(close) = close else {
            return Err(MarkdownError::UnclosedHtmlTag {
                tag: name.to_string(),
                location: self.span_map.lookup(self.tokens[open].span),
            });
        };
        let inner = self.inner_slice(open + 1, close);
        let children = self.child(inner).build()?;
        self.output.push(Node::CustomHtml {
            name,
            attributes,
            children,
        });
        self.pos = close + 1;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lists and quotes
    // ------------------------------------------------------------------

    fn handle_list_item(&mut self, marker: TokenKind) -> Result<()> {
        self.trim_blank_tail();
        let marker_location = self.span_map.lookup(self.tokens[self.pos].span);
        let level = marker.list_level().unwrap_or(0);
        let (mut slice, at_end) = self.collect_item_slice(level);
        trim_slice_edges(&mut slice);
        let content = self.child(slice).build()?;

        // close any open container this item cannot extend
        while let Some(curr) = &self.curr_list {
            let (curr_level, compatible) = container_shape(curr, &marker, marker_location);
            if curr_level > level || (curr_level == level && !compatible) {
                let done = self.curr_list.take().expect("open container");
                self.output.push(done);
            } else {
                break;
            }
        }

        match &mut self.curr_list {
            None => {
                self.curr_list = Some(new_container(&marker, level, content, marker_location))
            }
            Some(curr) => append_item(curr, content, marker_location),
        }

        if at_end {
            if let Some(done) = self.curr_list.take() {
                self.output.push(done);
            }
        }
        Ok(())
    }

    /// Advances from just past the marker token, taking tokens while
    /// (a) no blank line or end of input is reached and (b) no
    /// list-item-like token at the same or a shallower level appears.
    /// The captured slice ends at its newline; newlines after the slice
    /// are consumed greedily. Returns the slice and whether the
    /// container terminates here.
    fn collect_item_slice(&mut self, level: usize) -> (Vec<Token>, bool) {
        let start = self.pos + 1;
        let mut i = start;
        let mut at_end = false;
        loop {
            match self.tokens.get(i).map(|token| &token.kind) {
                None | Some(TokenKind::Eof) => {
                    at_end = true;
                    break;
                }
                Some(TokenKind::Newline) => {
                    let next = self.tokens.get(i + 1).map(|token| &token.kind);
                    if matches!(next, None | Some(TokenKind::Newline) | Some(TokenKind::Eof)) {
                        at_end = true;
                        break;
                    }
                    i += 1;
                }
                Some(kind) => {
                    if kind.list_level().is_some_and(|l| l <= level) {
                        break;
                    }
                    i += 1;
                }
            }
        }
        let mut slice = self.tokens[start..i].to_vec();
        while matches!(
            slice.last().map(|token| &token.kind),
            Some(TokenKind::Newline)
        ) || slice.last().is_some_and(|token| token.kind.is_blank_text())
        {
            slice.pop();
        }
        self.pos = i;
        while matches!(
            self.tokens.get(self.pos).map(|token| &token.kind),
            Some(TokenKind::Newline)
        ) {
            self.pos += 1;
        }
        (slice, at_end)
    }
}

/// Concatenates the literal source text of a token slice.
fn flatten_tokens(tokens: &[Token]) -> String {
    tokens.iter().map(|token| token.kind.lexeme()).collect()
}

/// Removes marker separation from an item or heading slice: leading
/// blank tokens go away and the first text token loses its leading
/// whitespace.
fn trim_slice_edges(tokens: &mut Vec<Token>) {
    while tokens
        .first()
        .is_some_and(|token| token.kind.is_blank_text())
    {
        tokens.remove(0);
    }
    if let Some(first) = tokens.first_mut() {
        if let TokenKind::Text(text) = &mut first.kind {
            let trimmed = text.trim_start().to_string();
            *text = trimmed;
        }
    }
}

/// Token position carried into internal-invariant panics.
fn panic_position(location: Option<LineCol>) -> String {
    match location {
        Some(location) => location.to_string(),
        None => "end of input".to_string(),
    }
}

/// Level and kind-compatibility of an open container against a marker.
fn container_shape(
    container: &Node,
    marker: &TokenKind,
    location: Option<LineCol>,
) -> (usize, bool) {
    match (container, marker) {
        (Node::UList { level, .. }, TokenKind::UListItem { .. }) => (*level, true),
        (Node::OList { level, .. }, TokenKind::OListItem { .. }) => (*level, true),
        (Node::Quote { level, .. }, TokenKind::BlockQuote { .. }) => (*level, true),
        (Node::UList { level, .. } | Node::OList { level, .. } | Node::Quote { level, .. }, _) => {
            (*level, false)
        }
        _ => unreachable!(
            "current container is always a list or quote (marker at {})",
            panic_position(location)
        ),
    }
}

fn new_container(
    marker: &TokenKind,
    level: usize,
    content: Vec<Node>,
    location: Option<LineCol>,
) -> Node {
    match marker {
        TokenKind::UListItem { .. } => Node::UList {
            level,
            items: vec![Node::ListItem(content)],
        },
        TokenKind::OListItem { .. } => Node::OList {
            level,
            items: vec![Node::ListItem(content)],
        },
        TokenKind::BlockQuote { .. } => Node::Quote {
            level,
            items: vec![Node::Paragraph(content)],
        },
        other => unreachable!(
            "not a list marker at {}: {:?}",
            panic_position(location),
            other
        ),
    }
}

fn append_item(container: &mut Node, content: Vec<Node>, location: Option<LineCol>) {
    match container {
        Node::UList { items, .. } | Node::OList { items, .. } => {
            items.push(Node::ListItem(content));
        }
        Node::Quote { items, .. } => {
            // one paragraph per quote level; continuations extend it
            if let Some(Node::Paragraph(children)) = items.last_mut() {
                children.extend(content);
            } else {
                items.push(Node::Paragraph(content));
            }
        }
        other => unreachable!(
            "not a container at {}: {:?}",
            panic_position(location),
            other
        ),
    }
}
