use crate::lexer::{AttrList, TagName};
use serde::{Deserialize, Serialize};

/// A node of the compiled document tree.
///
/// One recursive sum type covers both inline content (rendered within a
/// line) and block content (rendered as its own element). Nodes are
/// immutable once returned by the tree builder and owned by the caller;
/// the renderer borrows them read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    // ---- inline ----
    Text(String),
    /// A hard break within a line.
    InlineLineBreak,
    Bold(Vec<Node>),
    Italic(Vec<Node>),
    Strikethrough(Vec<Node>),
    Underline(Vec<Node>),
    /// Inline code.
    Code {
        children: Vec<Node>,
        language: Option<String>,
    },
    Link {
        children: Vec<Node>,
        uri: Option<String>,
    },
    /// The alt text is flattened to a plain string; no `src` is emitted
    /// in this dialect.
    Image { alt: String, uri: Option<String> },
    /// A footnote reference such as `[^1]`.
    FootnoteRef(String),

    // ---- block ----
    Paragraph(Vec<Node>),
    /// Level is 1..=6.
    Heading { level: u8, children: Vec<Node> },
    HorizontalRule,
    /// A paragraph separator produced by a run of blank lines.
    LineBreak,
    /// Generic block container. Part of the public vocabulary for
    /// embedding callers; the tree builder itself never constructs one.
    Div(Vec<Node>),
    /// Fenced code.
    MultilineCode {
        children: Vec<Node>,
        language: Option<String>,
    },
    /// Only ever a direct child of `UList` or `OList`.
    ListItem(Vec<Node>),
    UList { items: Vec<Node>, level: usize },
    OList { items: Vec<Node>, level: usize },
    /// Blockquote; items are block-level content, typically a single
    /// paragraph per level.
    Quote { items: Vec<Node>, level: usize },
    /// Raw HTML with its original tag, attributes, and parsed children.
    CustomHtml {
        name: TagName,
        attributes: AttrList,
        children: Vec<Node>,
    },
    /// A `<script>` element with its raw body.
    CustomScript { body: String, attributes: AttrList },
    /// A footnote definition: `[^ref]: …` at line start.
    FootnoteDef { label: String, children: Vec<Node> },
}

impl Node {
    /// True for nodes rendered within a line. The paragraph inference
    /// walk collects exactly these; anything else terminates it.
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            Node::Text(_)
                | Node::InlineLineBreak
                | Node::Bold(_)
                | Node::Italic(_)
                | Node::Strikethrough(_)
                | Node::Underline(_)
                | Node::Code { .. }
                | Node::Link { .. }
                | Node::Image { .. }
                | Node::FootnoteRef(_)
        )
    }

    pub fn is_block(&self) -> bool {
        !self.is_inline()
    }
}

/// Depth-first traversal hook with one method per node kind.
///
/// Every method receives the node's payload and defaults to walking the
/// children, so an implementation only overrides the kinds it cares
/// about. [`walk_nodes`] drives the dispatch.
pub trait Visitor {
    fn visit_text(&mut self, _text: &str) {}

    fn visit_inline_line_break(&mut self) {}

    fn visit_bold(&mut self, children: &[Node])
    where
        Self: Sized,
    {
        walk_nodes(self, children);
    }

    fn visit_italic(&mut self, children: &[Node])
    where
        Self: Sized,
    {
        walk_nodes(self, children);
    }

    fn visit_strikethrough(&mut self, children: &[Node])
    where
        Self: Sized,
    {
        walk_nodes(self, children);
    }

    fn visit_underline(&mut self, children: &[Node])
    where
        Self: Sized,
    {
        walk_nodes(self, children);
    }

    fn visit_code(&mut self, children: &[Node], _language: Option<&str>)
    where
        Self: Sized,
    {
        walk_nodes(self, children);
    }

    fn visit_link(&mut self, children: &[Node], _uri: Option<&str>)
    where
        Self: Sized,
    {
        walk_nodes(self, children);
    }

    fn visit_footnote_ref(&mut self, _label: &str) {}

    fn visit_paragraph(&mut self, children: &[Node])
    where
        Self: Sized,
    {
        walk_nodes(self, children);
    }

    fn visit_heading(&mut self, _level: u8, children: &[Node])
    where
        Self: Sized,
    {
        walk_nodes(self, children);
    }

    fn visit_horizontal_rule(&mut self) {}

    fn visit_line_break(&mut self) {}

    fn visit_div(&mut self, children: &[Node])
    where
        Self: Sized,
    {
        walk_nodes(self, children);
    }

    fn visit_image(&mut self, _alt: &str, _uri: Option<&str>) {}

    fn visit_multiline_code(&mut self, children: &[Node], _language: Option<&str>)
    where
        Self: Sized,
    {
        walk_nodes(self, children);
    }

    fn visit_list_item(&mut self, children: &[Node])
    where
        Self: Sized,
    {
        walk_nodes(self, children);
    }

    fn visit_ulist(&mut self, items: &[Node], _level: usize)
    where
        Self: Sized,
    {
        walk_nodes(self, items);
    }

    fn visit_olist(&mut self, items: &[Node], _level: usize)
    where
        Self: Sized,
    {
        walk_nodes(self, items);
    }

    fn visit_quote(&mut self, items: &[Node], _level: usize)
    where
        Self: Sized,
    {
        walk_nodes(self, items);
    }

    fn visit_custom_html(&mut self, _name: &TagName, _attributes: &AttrList, children: &[Node])
    where
        Self: Sized,
    {
        walk_nodes(self, children);
    }

    fn visit_custom_script(&mut self, _body: &str, _attributes: &AttrList) {}

    fn visit_footnote_def(&mut self, _label: &str, children: &[Node])
    where
        Self: Sized,
    {
        walk_nodes(self, children);
    }
}

/// Dispatches each node to its visitor method, in order.
pub fn walk_nodes<V: Visitor>(visitor: &mut V, nodes: &[Node]) {
    for node in nodes {
        match node {
            Node::Text(text) => visitor.visit_text(text),
            Node::InlineLineBreak => visitor.visit_inline_line_break(),
            Node::Bold(children) => visitor.visit_bold(children),
            Node::Italic(children) => visitor.visit_italic(children),
            Node::Strikethrough(children) => visitor.visit_strikethrough(children),
            Node::Underline(children) => visitor.visit_underline(children),
            Node::Code { children, language } => visitor.visit_code(children, language.as_deref()),
            Node::Link { children, uri } => visitor.visit_link(children, uri.as_deref()),
            Node::FootnoteRef(label) => visitor.visit_footnote_ref(label),
            Node::Paragraph(children) => visitor.visit_paragraph(children),
            Node::Heading { level, children } => visitor.visit_heading(*level, children),
            Node::HorizontalRule => visitor.visit_horizontal_rule(),
            Node::LineBreak => visitor.visit_line_break(),
            Node::Div(children) => visitor.visit_div(children),
            Node::Image { alt, uri } => visitor.visit_image(alt, uri.as_deref()),
            Node::MultilineCode { children, language } => {
                visitor.visit_multiline_code(children, language.as_deref())
            }
            Node::ListItem(children) => visitor.visit_list_item(children),
            Node::UList { items, level } => visitor.visit_ulist(items, *level),
            Node::OList { items, level } => visitor.visit_olist(items, *level),
            Node::Quote { items, level } => visitor.visit_quote(items, *level),
            Node::CustomHtml {
                name,
                attributes,
                children,
            } => visitor.visit_custom_html(name, attributes, children),
            Node::CustomScript { body, attributes } => {
                visitor.visit_custom_script(body, attributes)
            }
            Node::FootnoteDef { label, children } => visitor.visit_footnote_def(label, children),
        }
    }
}
