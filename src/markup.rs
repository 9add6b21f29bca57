//! HTML fragment parsing and serialization.
//!
//! Parsing runs html5ever's fragment parser, which accepts any input and
//! repairs it the way a browser would. Each repair it reports becomes a
//! `markup-repair` warning. The resulting DOM is copied into an owned
//! [`Node`] tree that the rewrite passes can edit freely.
//!
//! Before the parser sees the source, two fixes are applied:
//!
//! - Custom elements written `<pl-x ... />` are expanded to `<pl-x ...></pl-x>`.
//!   HTML ignores the slash on non-void elements.
//! - `<` and `>` inside inline math (`$..$`, `$$..$$`, `\(..\)`, `\[..\]`) and
//!   any `<` that does not open a complete tag are encoded, so `$x<y$` and
//!   `a<b` stay text.
//!
//! Text nodes hold encoded HTML. Attribute values hold plain text and are
//! escaped on output.

use std::rc::Rc;

use html5ever::tendril::TendrilSink;
use html5ever::{ParseOpts, parse_fragment};
use markup5ever::{LocalName, Namespace, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use crate::error::Diagnostic;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// One node of a parsed fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Encoded HTML text.
    Text(String),
    Comment(String),
}

impl Node {
    /// Text node holding `text` with HTML special characters escaped.
    pub fn text(text: &str) -> Node {
        Node::Text(escape_text(text))
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn is_whitespace(&self) -> bool {
        matches!(self, Node::Text(t) if t.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    /// Decoded value. `None` for boolean flags set with
    /// [`Element::with_flag`], which serialize without `=""`.
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    /// Lowercased tag name.
    pub name: String,
    pub attrs: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder-style boolean attribute.
    pub fn with_flag(mut self, name: &str) -> Self {
        self.remove_attr(name);
        self.attrs.push(Attribute {
            name: name.to_string(),
            value: None,
        });
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_deref().unwrap_or(""))
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a.name == name)
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = Some(value.into());
        match self.attrs.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attrs.push(Attribute {
                name: name.to_string(),
                value,
            }),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|a| a.name != name);
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Concatenated encoded text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// Serialized children.
    pub fn inner_html(&self) -> String {
        to_html(&self.children)
    }

    pub fn into_node(self) -> Node {
        Node::Element(self)
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Element(el) => collect_text(&el.children, out),
            Node::Comment(_) => {}
        }
    }
}

/// Output of [`parse`]: the node list plus repair diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMarkup {
    pub nodes: Vec<Node>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse an HTML fragment. Never fails; malformed input is repaired.
pub fn parse(source: &str) -> ParsedMarkup {
    let prepared = prepare(source);
    let context = QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from("body"));
    let dom = parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new())
        .one(prepared.as_str());

    let diagnostics = dom
        .errors
        .iter()
        .map(|err| Diagnostic::warning("markup-repair", err.to_string()))
        .collect();

    let root = fragment_root(&dom.document);
    ParsedMarkup {
        nodes: convert_children(&root, false),
        diagnostics,
    }
}

/// The fragment parser wraps its output in an `<html>` element.
fn fragment_root(document: &Handle) -> Handle {
    let children = document.children.borrow();
    children
        .iter()
        .find(|child| matches!(&child.data, NodeData::Element { name, .. } if &*name.local == "html"))
        .map(Rc::clone)
        .unwrap_or_else(|| Rc::clone(document))
}

fn convert_children(handle: &Handle, raw_text: bool) -> Vec<Node> {
    handle
        .children
        .borrow()
        .iter()
        .filter_map(|child| convert(child, raw_text))
        .collect()
}

fn convert(handle: &Handle, raw_text: bool) -> Option<Node> {
    match &handle.data {
        NodeData::Text { contents } => {
            let text = contents.borrow();
            Some(Node::Text(if raw_text {
                text.to_string()
            } else {
                escape_text(&text)
            }))
        }
        NodeData::Comment { contents } => Some(Node::Comment(contents.to_string())),
        NodeData::Element {
            name,
            attrs,
            template_contents,
            ..
        } => {
            let mut element = Element::new(&*name.local);
            element.attrs = attrs
                .borrow()
                .iter()
                .map(|attr| Attribute {
                    name: match &attr.name.prefix {
                        Some(prefix) => format!("{}:{}", &**prefix, &*attr.name.local),
                        None => attr.name.local.to_string(),
                    },
                    value: Some(attr.value.to_string()),
                })
                .collect();
            let raw = RAW_TEXT_ELEMENTS.contains(&element.name.as_str());
            element.children = match &*template_contents.borrow() {
                Some(contents) => convert_children(contents, raw),
                None => convert_children(handle, raw),
            };
            Some(Node::Element(element))
        }
        _ => None,
    }
}

// ------------------------------------------------------------------
// Source preparation
// ------------------------------------------------------------------

fn prepare(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(pos) = rest.find(['<', '$', '\\']) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        if let Some(len) = math_len(rest) {
            push_math(&rest[..len], &mut out);
            rest = &rest[len..];
        } else if rest.starts_with('<') {
            match tag_len(rest) {
                Some(len) => {
                    let tag = &rest[..len];
                    rest = &rest[len..];
                    push_tag(tag, &mut out);
                    if let Some(name) = raw_text_start(tag) {
                        let body = raw_text_len(rest, &name);
                        out.push_str(&rest[..body]);
                        rest = &rest[body..];
                    }
                }
                None => {
                    out.push_str("&lt;");
                    rest = &rest[1..];
                }
            }
        } else {
            // `$` or `\` without a closing delimiter
            out.push_str(&rest[..1]);
            rest = &rest[1..];
        }
    }

    out.push_str(rest);
    out
}

/// `<` followed by a letter, `/` or `!`.
fn starts_tag(s: &str) -> bool {
    s[1..].starts_with(|c: char| c.is_ascii_alphabetic() || c == '/' || c == '!')
}

/// Length of the tag or comment at the start of `s`.
fn tag_len(s: &str) -> Option<usize> {
    if let Some(body) = s.strip_prefix("<!--") {
        return Some(body.find("-->").map_or(s.len(), |end| 4 + end + 3));
    }
    if !starts_tag(s) {
        return None;
    }
    let mut quote = None;
    let mut after_equals = false;
    for (i, c) in s.char_indices().skip(1) {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' if after_equals => quote = Some(c),
            '>' => return Some(i + 1),
            '<' => return None,
            _ => {}
        }
        if !c.is_ascii_whitespace() {
            after_equals = c == '=';
        }
    }
    None
}

fn tag_name(tag: &str) -> &str {
    let body = tag.trim_start_matches('<');
    let end = body
        .find(|c: char| c.is_ascii_whitespace() || c == '/' || c == '>')
        .unwrap_or(body.len());
    &body[..end]
}

fn push_tag(tag: &str, out: &mut String) {
    let name = tag_name(tag);
    match tag.strip_suffix("/>") {
        Some(open) if name.contains('-') => {
            out.push_str(open.trim_end());
            out.push_str("></");
            out.push_str(name);
            out.push('>');
        }
        _ => out.push_str(tag),
    }
}

fn raw_text_start(tag: &str) -> Option<String> {
    let name = tag_name(tag).to_ascii_lowercase();
    (RAW_TEXT_ELEMENTS.contains(&name.as_str()) && !tag.ends_with("/>")).then_some(name)
}

fn raw_text_len(rest: &str, name: &str) -> usize {
    rest.to_ascii_lowercase()
        .find(&format!("</{name}"))
        .unwrap_or(rest.len())
}

/// Length of the inline math span at the start of `s`.
fn math_len(s: &str) -> Option<usize> {
    let (open, close, single_line) = if s.starts_with("$$") {
        ("$$", "$$", false)
    } else if s.starts_with('$') {
        ("$", "$", true)
    } else if s.starts_with("\\(") {
        ("\\(", "\\)", false)
    } else if s.starts_with("\\[") {
        ("\\[", "\\]", false)
    } else {
        return None;
    };
    let body = &s[open.len()..];
    let end = body.find(close)?;
    let inner = &body[..end];
    if inner.is_empty() || inner.contains("</") || inner.contains("/>") {
        return None;
    }
    if single_line && inner.contains('\n') {
        return None;
    }
    Some(open.len() + end + close.len())
}

fn push_math(math: &str, out: &mut String) {
    for c in math.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

// ------------------------------------------------------------------
// Serialization
// ------------------------------------------------------------------

/// Escape `&`, `<` and `>` for a text node.
pub fn escape_text(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\u{a0}' => escaped.push_str("&nbsp;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn escape_attr(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\u{a0}' => escaped.push_str("&nbsp;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Serialize nodes back to HTML.
pub fn to_html(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out);
    }
    out
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => out.push_str(text),
        Node::Comment(body) => {
            out.push_str("<!--");
            out.push_str(body);
            out.push_str("-->");
        }
        Node::Element(el) => {
            out.push('<');
            out.push_str(&el.name);
            for attr in &el.attrs {
                out.push(' ');
                out.push_str(&attr.name);
                if let Some(value) = &attr.value {
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&el.name.as_str()) {
                return;
            }
            for child in &el.children {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(&el.name);
            out.push('>');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn roundtrip(src: &str) -> String {
        to_html(&parse(src).nodes)
    }

    #[test]
    fn well_formed_fragment_roundtrips() {
        let src = r#"<div class="q"><p>Load <b>10</b> N</p><input type="number" name="x"><!-- note --></div>"#;
        assert_eq!(roundtrip(src), src);
        assert!(parse(src).diagnostics.is_empty());
    }

    #[test]
    fn self_closing_custom_tag() {
        let parsed = parse(r#"<pl-figure file-name="a.png" /><p>after</p>"#);
        assert_eq!(parsed.nodes.len(), 2);
        let el = parsed.nodes[0].as_element().unwrap();
        assert_eq!(el.name, "pl-figure");
        assert!(el.children.is_empty());
        assert_eq!(el.attr("file-name"), Some("a.png"));
        assert_eq!(
            roundtrip(r#"<pl-figure file-name="a.png"/>"#),
            r#"<pl-figure file-name="a.png"></pl-figure>"#
        );
    }

    #[test]
    fn attribute_forms() {
        let parsed = parse("<PL-Answer correct=true name='a b' checked data-x = \"1\">x</pl-answer>");
        let el = parsed.nodes[0].as_element().unwrap();
        assert_eq!(el.name, "pl-answer");
        assert_eq!(el.attr("correct"), Some("true"));
        assert_eq!(el.attr("name"), Some("a b"));
        assert_eq!(el.attr("checked"), Some(""));
        assert_eq!(el.attr("data-x"), Some("1"));
        assert!(parsed.diagnostics.is_empty());
    }

    #[test]
    fn attribute_values_are_decoded() {
        let parsed = parse(r#"<pl-text name="a&amp;b" title='say "hi"'></pl-text>"#);
        let el = parsed.nodes[0].as_element().unwrap();
        assert_eq!(el.attr("name"), Some("a&b"));
        assert_eq!(
            to_html(&parsed.nodes),
            r#"<pl-text name="a&amp;b" title="say &quot;hi&quot;"></pl-text>"#
        );
    }

    #[test]
    fn nesting_builds_tree() {
        let parsed = parse("<pl-checkbox><pl-answer>A</pl-answer><pl-answer>B</pl-answer></pl-checkbox>");
        let group = parsed.nodes[0].as_element().unwrap();
        let texts: Vec<String> = group.child_elements().map(Element::text_content).collect();
        assert_eq!(texts, vec!["A", "B"]);
    }

    #[test]
    fn unclosed_elements_are_repaired() {
        let parsed = parse("<div><span>text</div>");
        assert_eq!(to_html(&parsed.nodes), "<div><span>text</span></div>");
        assert!(!parsed.diagnostics.is_empty());
        assert_eq!(parsed.diagnostics[0].code, "markup-repair");
    }

    #[test]
    fn optional_close_tags_are_quiet() {
        let parsed = parse("<ul><li>a<li>b</ul>");
        assert_eq!(to_html(&parsed.nodes), "<ul><li>a</li><li>b</li></ul>");
        assert!(parsed.diagnostics.is_empty());
    }

    #[test]
    fn stray_close_is_dropped() {
        let parsed = parse("a</span>b");
        assert_eq!(to_html(&parsed.nodes), "ab");
        assert_eq!(parsed.diagnostics[0].code, "markup-repair");
    }

    #[test]
    fn unclosed_at_eof() {
        assert_eq!(roundtrip("<pl-question-panel>text"), "<pl-question-panel>text</pl-question-panel>");
    }

    #[test]
    fn lone_angle_brackets_are_text() {
        assert_eq!(roundtrip("a < b and 3<4"), "a &lt; b and 3&lt;4");
        assert_eq!(parse("x < y").nodes, vec![Node::Text("x &lt; y".into())]);
    }

    #[test]
    fn unterminated_tag_start_is_text() {
        let parsed = parse(r#"<pl-number-input answers-name="a"></pl-number-input> holds when a<b"#);
        assert_eq!(parsed.nodes.len(), 2);
        assert_eq!(parsed.nodes[0].as_element().map(|el| el.name.as_str()), Some("pl-number-input"));
        assert_eq!(parsed.nodes[1], Node::Text(" holds when a&lt;b".into()));
    }

    #[test]
    fn unterminated_quote_is_text() {
        assert_eq!(roundtrip(r#"<div class="x"#), r#"&lt;div class="x"#);
    }

    #[test]
    fn comparisons_inside_math_stay_text() {
        let parsed = parse("<p>Assume $x<y$ and $y>0$.</p>");
        assert_eq!(to_html(&parsed.nodes), "<p>Assume $x&lt;y$ and $y&gt;0$.</p>");
        assert!(parsed.diagnostics.is_empty());
        assert_eq!(roundtrip(r"\(a<b\) and $$c<d$$"), r"\(a&lt;b\) and $$c&lt;d$$");
    }

    #[test]
    fn dollar_amounts_around_markup_are_left_alone() {
        assert_eq!(roundtrip("$5 and <b>bold</b> for $3"), "$5 and <b>bold</b> for $3");
    }

    #[test]
    fn script_content_is_raw() {
        let src = "<script>if (a<b && $x) { x(\"</div>\"); }</script>";
        let parsed = parse(src);
        assert_eq!(parsed.nodes.len(), 1);
        assert_eq!(to_html(&parsed.nodes), src);
    }

    #[test]
    fn generated_elements_serialize() {
        let input = Element::new("input")
            .with_attr("type", "checkbox")
            .with_attr("value", "say \"hi\" & bye")
            .with_flag("checked");
        let label = Element::new("label").with_child(Node::text("a < b"));
        assert_eq!(
            to_html(&[input.into_node(), label.into_node()]),
            "<input type=\"checkbox\" value=\"say &quot;hi&quot; &amp; bye\" checked><label>a &lt; b</label>"
        );
    }

    #[test]
    fn remove_attr_drops_it() {
        let mut el = Element::new("pl-answer").with_attr("correct", "true").with_attr("name", "a");
        el.remove_attr("correct");
        assert!(!el.has_attr("correct"));
        assert_eq!(el.attr("name"), Some("a"));
    }
}
