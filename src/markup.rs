//! Markup model: a thin query/mutate/serialize layer over the kuchikiki DOM.
//!
//! Nodes are reference counted and not `Send`; a [`Document`] lives on the task
//! that parsed it.

use kuchikiki::traits::TendrilSink;
use kuchikiki::{ElementData, NodeDataRef, NodeRef};

/// Elements rendered on their own line by [`Element::inner_text`]
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main",
    "nav", "ol", "p", "pre", "section", "table", "tr", "ul",
];

/// A parsed HTML document
#[derive(Clone)]
pub struct Document {
    root: NodeRef,
}

impl Document {
    /// Parse a full HTML document
    pub fn parse(html: &str) -> Self {
        Self {
            root: kuchikiki::parse_html().one(html),
        }
    }

    /// First element matching `selector`
    pub fn select_first(&self, selector: &str) -> Option<Element> {
        select_first_in(&self.root, selector)
    }

    /// All elements matching `selector`, in document order
    pub fn select_all(&self, selector: &str) -> Vec<Element> {
        select_all_in(&self.root, selector)
    }

    /// Serialize the whole document
    pub fn serialize(&self) -> String {
        self.root.to_string()
    }
}

/// Handle to one element node
#[derive(Clone)]
pub struct Element(NodeDataRef<ElementData>);

impl Element {
    /// Wrap an element node, `None` for text/comment/document nodes
    pub fn from_node(node: &NodeRef) -> Option<Self> {
        node.clone().into_element_ref().map(Element)
    }

    /// Underlying node
    pub fn node(&self) -> &NodeRef {
        self.0.as_node()
    }

    /// Lowercase tag name
    pub fn tag(&self) -> String {
        self.0.name.local.to_string()
    }

    /// Attribute value
    pub fn attr(&self, name: &str) -> Option<String> {
        self.0.attributes.borrow().get(name).map(str::to_string)
    }

    /// Whether the attribute is present
    pub fn has_attr(&self, name: &str) -> bool {
        self.0.attributes.borrow().contains(name)
    }

    /// Set (or replace) an attribute
    pub fn set_attr(&self, name: &str, value: &str) {
        self.0
            .attributes
            .borrow_mut()
            .insert(name, value.to_string());
    }

    /// Remove an attribute if present
    pub fn remove_attr(&self, name: &str) {
        self.0.attributes.borrow_mut().remove(name);
    }

    /// First descendant matching `selector`
    pub fn select_first(&self, selector: &str) -> Option<Element> {
        select_first_in(self.node(), selector)
    }

    /// All descendants matching `selector`
    pub fn select_all(&self, selector: &str) -> Vec<Element> {
        select_all_in(self.node(), selector)
    }

    /// Detach this element from the tree
    pub fn remove(&self) {
        self.node().detach();
    }

    /// Serialized children
    pub fn inner_html(&self) -> String {
        self.node().children().map(|child| child.to_string()).collect()
    }

    /// Serialized element including itself
    pub fn outer_html(&self) -> String {
        self.node().to_string()
    }

    /// Replace all children with the parsed markup
    pub fn set_inner_html(&self, html: &str) {
        self.clear_children();
        self.append_html(html);
    }

    /// Append the parsed markup after the existing children
    pub fn append_html(&self, html: &str) {
        for node in fragment_nodes(html) {
            node.detach();
            self.node().append(node);
        }
    }

    /// Replace this element with the parsed markup; returns the first new element
    pub fn replace_with_html(&self, html: &str) -> Option<Element> {
        let mut first = None;
        for node in fragment_nodes(html) {
            node.detach();
            self.node().insert_before(node.clone());
            if first.is_none() {
                first = Element::from_node(&node);
            }
        }
        self.remove();
        first
    }

    /// Concatenated text of all descendant text nodes
    pub fn text(&self) -> String {
        self.node().text_contents()
    }

    /// Rendered text with line breaks at `<br>` and block boundaries
    pub fn inner_text(&self) -> String {
        let mut out = String::new();
        render_text(self.node(), &mut out);
        let lines: Vec<&str> = out.lines().map(str::trim).collect();
        let mut text = lines.join("\n");
        while text.contains("\n\n\n") {
            text = text.replace("\n\n\n", "\n\n");
        }
        text.trim().to_string()
    }

    /// Replace all children with a single text node
    pub fn set_text(&self, text: &str) {
        self.clear_children();
        self.node().append(NodeRef::new_text(text));
    }

    /// Class list
    pub fn classes(&self) -> Vec<String> {
        self.attr("class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Remove a class if present
    pub fn remove_class(&self, class: &str) {
        let classes = self.classes();
        if classes.iter().any(|c| c == class) {
            let kept: Vec<String> = classes.into_iter().filter(|c| c != class).collect();
            self.set_attr("class", &kept.join(" "));
        }
    }

    /// Set one property in the inline `style` attribute, keeping the others
    pub fn set_style_property(&self, property: &str, value: &str) {
        let mut declarations: Vec<String> = self
            .attr("style")
            .map(|style| {
                style
                    .split(';')
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .filter(|d| {
                        d.split(':')
                            .next()
                            .map(|name| !name.trim().eq_ignore_ascii_case(property))
                            .unwrap_or(true)
                    })
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        declarations.push(format!("{property}: {value}"));
        self.set_attr("style", &format!("{};", declarations.join("; ")));
    }

    fn clear_children(&self) {
        let children: Vec<NodeRef> = self.node().children().collect();
        for child in children {
            child.detach();
        }
    }
}

fn select_first_in(node: &NodeRef, selector: &str) -> Option<Element> {
    match node.select_first(selector) {
        Ok(found) => Some(Element(found)),
        Err(()) => None,
    }
}

fn select_all_in(node: &NodeRef, selector: &str) -> Vec<Element> {
    match node.select(selector) {
        Ok(found) => found.map(Element).collect(),
        Err(()) => {
            tracing::debug!(selector, "invalid selector");
            Vec::new()
        }
    }
}

/// Parse a markup fragment into detached-able top-level nodes
fn fragment_nodes(html: &str) -> Vec<NodeRef> {
    let wrapper = kuchikiki::parse_html().one(format!(
        "<!DOCTYPE html><html><head></head><body>{html}</body></html>"
    ));
    match wrapper.select_first("body") {
        Ok(body) => body.as_node().children().collect(),
        Err(()) => Vec::new(),
    }
}

fn render_text(node: &NodeRef, out: &mut String) {
    for child in node.children() {
        if let Some(text) = child.as_text() {
            let text = text.borrow();
            let collapsed: Vec<&str> = text.split_whitespace().collect();
            if !collapsed.is_empty() {
                if text.starts_with(char::is_whitespace) && !out.ends_with(['\n', ' ']) && !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(&collapsed.join(" "));
                if text.ends_with(char::is_whitespace) {
                    out.push(' ');
                }
            }
            continue;
        }
        let Some(element) = child.as_element() else {
            continue;
        };
        let tag = &*element.name.local;
        match tag {
            "script" | "style" | "template" | "noscript" => {}
            "br" => out.push('\n'),
            tag if BLOCK_TAGS.contains(&tag) => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                render_text(&child, out);
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ => render_text(&child, out),
        }
    }
}
