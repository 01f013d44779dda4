//! Usage: Mutable arena DOM for the page domain (parsed with `scraper`, edited in place).
//!
//! `scraper` trees are read-only, so parsed markup is copied into a flat arena of nodes addressed by
//! [`NodeId`]. Detached nodes stay in the arena with no parent; ids are never reused.

use scraper::Html;
use std::collections::VecDeque;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ElementData {
    name: String,
    attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    Root,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    location: Option<Url>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Document {
    pub const ROOT: NodeId = NodeId(0);

    pub fn new(location: Option<Url>) -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
            location,
        }
    }

    /// Parses a full page (`<html>` wrapper and all).
    pub fn parse(html: &str, location: Option<Url>) -> Self {
        let mut doc = Self::new(location);
        let parsed = Html::parse_document(html);
        doc.import(&parsed, Self::ROOT, false);
        doc
    }

    pub fn location(&self) -> Option<&Url> {
        self.location.as_ref()
    }

    pub fn set_location(&mut self, location: Option<Url>) {
        self.location = location;
    }

    /// Parses `html` as a fragment and appends its top-level nodes to `parent`.
    /// Returns the appended nodes in document order.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Vec<NodeId> {
        if !self.contains(parent) {
            return Vec::new();
        }
        let parsed = Html::parse_fragment(html);
        self.import(&parsed, parent, true)
    }

    fn import(&mut self, parsed: &Html, parent: NodeId, unwrap_html: bool) -> Vec<NodeId> {
        let mut added = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back((parsed.tree.root(), parent, true));

        while let Some((node, parent, top_level)) = queue.pop_front() {
            match node.value() {
                scraper::Node::Document | scraper::Node::Fragment => {
                    for child in node.children() {
                        queue.push_back((child, parent, top_level));
                    }
                }
                // Fragment parsing wraps everything in a synthetic <html>.
                scraper::Node::Element(element)
                    if unwrap_html && top_level && element.name() == "html" =>
                {
                    for child in node.children() {
                        queue.push_back((child, parent, top_level));
                    }
                }
                scraper::Node::Element(element) => {
                    let id = self.push(
                        parent,
                        NodeKind::Element(ElementData {
                            name: element.name().to_ascii_lowercase(),
                            attrs: element
                                .attrs()
                                .map(|(name, value)| (name.to_string(), value.to_string()))
                                .collect(),
                        }),
                    );
                    if top_level {
                        added.push(id);
                    }
                    for child in node.children() {
                        queue.push_back((child, id, false));
                    }
                }
                scraper::Node::Text(text) => {
                    let id = self.push(parent, NodeKind::Text(String::from(&**text)));
                    if top_level {
                        added.push(id);
                    }
                }
                _ => {}
            }
        }
        added
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.name.as_str())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    /// Sets or replaces an attribute. No-op on non-element nodes.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(Node {
            kind: NodeKind::Element(element),
            ..
        }) = self.nodes.get_mut(id.0)
        else {
            return;
        };
        match element.attrs.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => element.attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .map(|classes| classes.split_ascii_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn first_element_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|child| self.is_element(*child))
    }

    /// `ancestor` is `node` or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// `root` followed by all of its descendants, in document order.
    pub fn descendants(&self, root: NodeId) -> Descendants<'_> {
        let stack = if self.contains(root) { vec![root] } else { Vec::new() };
        Descendants { doc: self, stack }
    }

    pub fn find_element(&self, root: NodeId, pred: impl Fn(&Self, NodeId) -> bool) -> Option<NodeId> {
        self.descendants(root)
            .find(|id| self.is_element(*id) && pred(self, *id))
    }

    pub fn elements_by_tag_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.descendants(Self::ROOT)
            .filter(move |id| self.tag_name(*id) == Some(name))
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in self.descendants(id) {
            if let NodeKind::Text(text) = &self.nodes[node.0].kind {
                out.push_str(text);
            }
        }
        out
    }

    /// Replaces all children of `id` with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        if !self.is_element(id) {
            return;
        }
        let old = std::mem::take(&mut self.nodes[id.0].children);
        for child in old {
            self.nodes[child.0].parent = None;
        }
        if !text.is_empty() {
            self.push(id, NodeKind::Text(text.to_string()));
        }
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id.0) else {
            return;
        };
        match &node.kind {
            NodeKind::Root => {
                for child in &node.children {
                    self.write_html(*child, out);
                }
            }
            NodeKind::Text(text) => out.push_str(&escape(text, false)),
            NodeKind::Element(element) => {
                out.push('<');
                out.push_str(&element.name);
                for (name, value) in &element.attrs {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape(value, true));
                        out.push('"');
                    }
                }
                out.push('>');
                for child in &node.children {
                    self.write_html(*child, out);
                }
                out.push_str("</");
                out.push_str(&element.name);
                out.push('>');
            }
        }
    }
}

fn escape(raw: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Pre-order walk; the tree may not be mutated while this is alive.
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(id).iter().rev().copied());
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_html_returns_top_level_nodes_in_order() {
        let mut doc = Document::default();
        let added = doc.append_html(Document::ROOT, "<p id=\"a\">one</p>text<span>two</span>");
        assert_eq!(added.len(), 3);
        assert_eq!(doc.tag_name(added[0]), Some("p"));
        assert!(!doc.is_element(added[1]));
        assert_eq!(doc.tag_name(added[2]), Some("span"));
        assert_eq!(doc.parent(added[0]), Some(Document::ROOT));
        assert_eq!(doc.text_content(Document::ROOT), "onetexttwo");
    }

    #[test]
    fn custom_elements_and_attributes_survive_parsing() {
        let mut doc = Document::default();
        let added = doc.append_html(
            Document::ROOT,
            r#"<a id="video-title" class="yt-simple-endpoint style-scope" title="Titre" href="/watch?v=xyz">Titre</a>"#,
        );
        let anchor = added[0];
        assert_eq!(doc.attr(anchor, "id"), Some("video-title"));
        assert_eq!(doc.attr(anchor, "href"), Some("/watch?v=xyz"));
        assert!(doc.has_class(anchor, "style-scope"));
        assert!(!doc.has_class(anchor, "style"));

        let added = doc.append_html(anchor, "<yt-formatted-string>x</yt-formatted-string>");
        assert_eq!(doc.tag_name(added[0]), Some("yt-formatted-string"));
    }

    #[test]
    fn descendants_are_inclusive_and_in_document_order() {
        let mut doc = Document::default();
        let added = doc.append_html(Document::ROOT, "<div><a><b></b></a><i></i></div>");
        let names: Vec<_> = doc
            .descendants(added[0])
            .filter_map(|id| doc.tag_name(id))
            .collect();
        assert_eq!(names, vec!["div", "a", "b", "i"]);
    }

    #[test]
    fn set_text_content_replaces_children() {
        let mut doc = Document::default();
        let added = doc.append_html(Document::ROOT, "<a>old <b>bold</b></a>");
        let bold = doc.first_element_child(added[0]).expect("b");

        doc.set_text_content(added[0], "new");
        assert_eq!(doc.text_content(added[0]), "new");
        assert_eq!(doc.parent(bold), None);
        assert_eq!(doc.outer_html(added[0]), "<a>new</a>");
    }

    #[test]
    fn set_attr_adds_then_replaces() {
        let mut doc = Document::default();
        let added = doc.append_html(Document::ROOT, "<a title=\"x\"></a>");
        doc.set_attr(added[0], "delocalised", "");
        doc.set_attr(added[0], "title", "a \"quoted\" title");
        assert!(doc.has_attr(added[0], "delocalised"));
        assert_eq!(doc.attr(added[0], "title"), Some("a \"quoted\" title"));
        assert_eq!(
            doc.outer_html(added[0]),
            "<a title=\"a &quot;quoted&quot; title\" delocalised></a>"
        );
    }

    #[test]
    fn parse_keeps_full_page_structure() {
        let doc = Document::parse(
            "<!doctype html><html><body><ytd-app><p>hi</p></ytd-app></body></html>",
            Url::parse("https://www.youtube.com/watch?v=abc").ok(),
        );
        let app = doc.elements_by_tag_name("ytd-app").next().expect("ytd-app");
        assert_eq!(doc.text_content(app), "hi");
        assert!(doc.is_inclusive_ancestor(Document::ROOT, app));
        assert_eq!(
            doc.location().map(Url::as_str),
            Some("https://www.youtube.com/watch?v=abc")
        );
    }
}
