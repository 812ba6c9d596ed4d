use std::fmt;

use crate::ast::{Node, Visitor, walk_nodes};
use crate::lexer::{AttrList, TagName};

/// Low-level HTML writing with escaping.
///
/// The writer accumulates output in a buffer; the renderer drives it
/// through the visitor. Text content and attribute values are escaped;
/// raw passthrough (script bodies) bypasses escaping explicitly.
#[derive(Debug, Default)]
pub struct HtmlWriter {
    buffer: String,
}

impl HtmlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_raw(&mut self, html: &str) {
        self.buffer.push_str(html);
    }

    pub fn write_text(&mut self, text: &str) {
        self.buffer.push_str(&Self::escape_html(text));
    }

    /// `<tag>` with its attribute list; valueless attributes render
    /// bare, in source order.
    pub fn open_tag(&mut self, tag: &str, attributes: &AttrList) {
        self.buffer.push('<');
        self.buffer.push_str(tag);
        for (name, value) in attributes {
            self.buffer.push(' ');
            self.buffer.push_str(name);
            if let Some(value) = value {
                self.buffer.push_str("=\"");
                self.buffer.push_str(&Self::escape_attribute(value));
                self.buffer.push('"');
            }
        }
        self.buffer.push('>');
    }

    pub fn close_tag(&mut self, tag: &str) {
        self.buffer.push_str("</");
        self.buffer.push_str(tag);
        self.buffer.push('>');
    }

    /// Escapes HTML special characters in text content.
    pub fn escape_html(text: &str) -> String {
        let mut escaped = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '<' => escaped.push_str("&lt;"),
                '>' => escaped.push_str("&gt;"),
                '&' => escaped.push_str("&amp;"),
                '"' => escaped.push_str("&quot;"),
                '\'' => escaped.push_str("&#x27;"),
                c => escaped.push(c),
            }
        }
        escaped
    }

    /// Escapes HTML special characters in attribute values.
    pub fn escape_attribute(text: &str) -> String {
        let mut escaped = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '<' => escaped.push_str("&lt;"),
                '>' => escaped.push_str("&gt;"),
                '&' => escaped.push_str("&amp;"),
                '"' => escaped.push_str("&quot;"),
                '\'' => escaped.push_str("&#x27;"),
                '\n' => escaped.push_str("&#10;"),
                c => escaped.push(c),
            }
        }
        escaped
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }
}

/// Void elements emit a single form with no closing tag.
fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Visitor that serializes the document tree to HTML.
///
/// Each node reopens its tag, emits its children in order, and closes
/// the tag; void tags emit a single form. `CustomHtml` preserves
/// attribute order and valueless attributes; `CustomScript` bodies pass
/// through raw.
#[derive(Debug, Default)]
pub struct HtmlRenderer {
    writer: HtmlWriter,
}

impl HtmlRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(mut self, nodes: &[Node]) -> String {
        walk_nodes(&mut self, nodes);
        self.writer.take_output()
    }

    fn wrapped(&mut self, tag: &str, children: &[Node]) {
        self.writer.open_tag(tag, &Vec::new());
        walk_nodes(self, children);
        self.writer.close_tag(tag);
    }
}

impl Visitor for HtmlRenderer {
    fn visit_text(&mut self, text: &str) {
        self.writer.write_text(text);
    }

    fn visit_inline_line_break(&mut self) {
        self.writer.write_raw("<br>");
    }

    fn visit_bold(&mut self, children: &[Node]) {
        self.wrapped("strong", children);
    }

    fn visit_italic(&mut self, children: &[Node]) {
        self.wrapped("em", children);
    }

    fn visit_strikethrough(&mut self, children: &[Node]) {
        self.wrapped("s", children);
    }

    fn visit_underline(&mut self, children: &[Node]) {
        self.wrapped("u", children);
    }

    fn visit_code(&mut self, children: &[Node], _language: Option<&str>) {
        self.wrapped("code", children);
    }

    fn visit_link(&mut self, children: &[Node], uri: Option<&str>) {
        let attributes: AttrList = match uri {
            Some(uri) => vec![("href".to_string(), Some(uri.to_string()))],
            None => Vec::new(),
        };
        self.writer.open_tag("a", &attributes);
        walk_nodes(self, children);
        self.writer.close_tag("a");
    }

    fn visit_footnote_ref(&mut self, label: &str) {
        self.writer.write_raw("<sup>");
        let attributes = vec![("href".to_string(), Some(format!("#fn-{}", label)))];
        self.writer.open_tag("a", &attributes);
        self.writer.write_text(label);
        self.writer.close_tag("a");
        self.writer.write_raw("</sup>");
    }

    fn visit_paragraph(&mut self, children: &[Node]) {
        self.wrapped("p", children);
    }

    fn visit_heading(&mut self, level: u8, children: &[Node]) {
        let tag = format!("h{}", level);
        self.writer.open_tag(&tag, &Vec::new());
        walk_nodes(self, children);
        self.writer.close_tag(&tag);
    }

    fn visit_horizontal_rule(&mut self) {
        self.writer.write_raw("<hr>");
    }

    fn visit_line_break(&mut self) {
        self.writer.write_raw("<br>");
    }

    fn visit_div(&mut self, children: &[Node]) {
        self.wrapped("div", children);
    }

    fn visit_image(&mut self, alt: &str, _uri: Option<&str>) {
        // this dialect never emits src; images resolve client-side
        let attributes = vec![("alt".to_string(), Some(alt.to_string()))];
        self.writer.open_tag("img", &attributes);
    }

    fn visit_multiline_code(&mut self, children: &[Node], language: Option<&str>) {
        self.writer.write_raw("<pre>");
        let attributes: AttrList = match language {
            Some(language) => vec![("class".to_string(), Some(format!("lang-{}", language)))],
            None => Vec::new(),
        };
        self.writer.open_tag("code", &attributes);
        walk_nodes(self, children);
        self.writer.close_tag("code");
        self.writer.write_raw("</pre>");
    }

    fn visit_list_item(&mut self, children: &[Node]) {
        self.wrapped("li", children);
    }

    fn visit_ulist(&mut self, items: &[Node], _level: usize) {
        self.writer.open_tag("ul", &Vec::new());
        walk_nodes(self, items);
        self.writer.close_tag("ul");
    }

    fn visit_olist(&mut self, items: &[Node], _level: usize) {
        self.writer.open_tag("ol", &Vec::new());
        walk_nodes(self, items);
        self.writer.close_tag("ol");
    }

    fn visit_quote(&mut self, items: &[Node], _level: usize) {
        self.writer.open_tag("blockquote", &Vec::new());
        walk_nodes(self, items);
        self.writer.close_tag("blockquote");
    }

    fn visit_custom_html(&mut self, name: &TagName, attributes: &AttrList, children: &[Node]) {
        let tag = name.as_str().to_string();
        self.writer.open_tag(&tag, attributes);
        if is_void_tag(&tag) {
            return;
        }
        walk_nodes(self, children);
        self.writer.close_tag(&tag);
    }

    fn visit_custom_script(&mut self, body: &str, attributes: &AttrList) {
        self.writer.open_tag("script", attributes);
        self.writer.write_raw(body);
        self.writer.close_tag("script");
    }

    fn visit_footnote_def(&mut self, label: &str, children: &[Node]) {
        let attributes = vec![
            ("class".to_string(), Some("footnote".to_string())),
            ("id".to_string(), Some(format!("fn-{}", label))),
        ];
        self.writer.open_tag("div", &attributes);
        walk_nodes(self, children);
        self.writer.close_tag("div");
    }
}

/// Renders a document tree to an HTML string.
pub fn render_html(nodes: &[Node]) -> String {
    HtmlRenderer::new().render(nodes)
}

/// Renders a document tree into any [`fmt::Write`] sink.
pub fn render_html_to<W: fmt::Write>(nodes: &[Node], out: &mut W) -> fmt::Result {
    out.write_str(&render_html(nodes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Node {
        Node::Text(s.to_string())
    }

    #[test]
    fn escapes_text_content() {
        let nodes = vec![text("a < b & c")];
        assert_eq!(render_html(&nodes), "a &lt; b &amp; c");
    }

    #[test]
    fn renders_basic_blocks() {
        let nodes = vec![
            Node::Heading {
                level: 2,
                children: vec![text("Title")],
            },
            Node::Paragraph(vec![text("body")]),
            Node::HorizontalRule,
        ];
        assert_eq!(render_html(&nodes), "<h2>Title</h2><p>body</p><hr>");
    }

    #[test]
    fn renders_emphasis_nesting() {
        let nodes = vec![Node::Bold(vec![Node::Italic(vec![text("x")])])];
        assert_eq!(render_html(&nodes), "<strong><em>x</em></strong>");
    }

    #[test]
    fn renders_code_with_language_class() {
        let nodes = vec![Node::MultilineCode {
            children: vec![text("let x=1;\n")],
            language: Some("rust".to_string()),
        }];
        assert_eq!(
            render_html(&nodes),
            "<pre><code class=\"lang-rust\">let x=1;\n</code></pre>"
        );
    }

    #[test]
    fn renders_links_and_images() {
        let nodes = vec![
            Node::Link {
                children: vec![text("go")],
                uri: Some("https://x.y".to_string()),
            },
            Node::Image {
                alt: "pic".to_string(),
                uri: Some("ignored".to_string()),
            },
        ];
        assert_eq!(
            render_html(&nodes),
            "<a href=\"https://x.y\">go</a><img alt=\"pic\">"
        );
    }

    #[test]
    fn renders_lists() {
        let nodes = vec![Node::UList {
            level: 0,
            items: vec![
                Node::ListItem(vec![text("a")]),
                Node::ListItem(vec![text("b")]),
            ],
        }];
        assert_eq!(render_html(&nodes), "<ul><li>a</li><li>b</li></ul>");
    }

    #[test]
    fn renders_quotes_one_paragraph_per_level() {
        let nodes = vec![Node::Quote {
            level: 1,
            items: vec![Node::Paragraph(vec![
                text("f"),
                Node::Quote {
                    level: 2,
                    items: vec![Node::Paragraph(vec![text("g")])],
                },
            ])],
        }];
        assert_eq!(
            render_html(&nodes),
            "<blockquote><p>f<blockquote><p>g</p></blockquote></p></blockquote>"
        );
    }

    #[test]
    fn custom_html_preserves_attribute_order_and_valueless_forms() {
        let nodes = vec![Node::CustomHtml {
            name: TagName::Other("aside".to_string()),
            attributes: vec![
                ("data-x".to_string(), Some("1".to_string())),
                ("hidden".to_string(), None),
            ],
            children: vec![text("inner")],
        }];
        assert_eq!(
            render_html(&nodes),
            "<aside data-x=\"1\" hidden>inner</aside>"
        );
    }

    #[test]
    fn custom_void_tags_do_not_close() {
        let nodes = vec![Node::CustomHtml {
            name: TagName::Br,
            attributes: vec![],
            children: vec![],
        }];
        assert_eq!(render_html(&nodes), "<br>");
    }

    #[test]
    fn script_body_is_raw() {
        let nodes = vec![Node::CustomScript {
            body: "if (a < b) { go(); }".to_string(),
            attributes: vec![("defer".to_string(), None)],
        }];
        assert_eq!(
            render_html(&nodes),
            "<script defer>if (a < b) { go(); }</script>"
        );
    }

    #[test]
    fn footnote_rendering() {
        let nodes = vec![
            Node::FootnoteRef("1".to_string()),
            Node::FootnoteDef {
                label: "1".to_string(),
                children: vec![text("note")],
            },
        ];
        assert_eq!(
            render_html(&nodes),
            "<sup><a href=\"#fn-1\">1</a></sup><div class=\"footnote\" id=\"fn-1\">note</div>"
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let nodes = vec![Node::Paragraph(vec![
            text("a"),
            Node::Bold(vec![text("b")]),
        ])];
        assert_eq!(render_html(&nodes), render_html(&nodes));
    }
}
