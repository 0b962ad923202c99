//! Minimal node arena standing in for the document.
//!
//! Nodes are addressed by [`NodeId`]. Removing a node frees its whole
//! subtree; ids are never reused. `<template>` elements keep their parsed
//! children as inert content instead of live nodes.

use std::fmt;
use std::rc::Rc;
use xprops_parser::{MarkupElement, MarkupNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        /// Inert content of a `<template>`
        content: Option<Rc<Vec<MarkupNode>>>,
    },
    Text(String),
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
pub struct Dom {
    nodes: Vec<Option<NodeData>>,
    root: NodeId,
}

impl Dom {
    /// Empty document with a `<body>` root
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        dom.root = dom.create_element("body", Vec::new());
        dom
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        }));
        id
    }

    fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn create_element(&mut self, tag: &str, attributes: Vec<(String, String)>) -> NodeId {
        self.alloc(NodeKind::Element {
            tag: tag.to_string(),
            attributes,
            content: None,
        })
    }

    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.alloc(NodeKind::Text(content.to_string()))
    }

    /// Build a detached subtree from parsed markup
    pub fn instantiate(&mut self, markup: &MarkupNode) -> NodeId {
        match markup {
            MarkupNode::Text { content } => self.create_text(content),
            MarkupNode::Element(element) => self.instantiate_element(element),
        }
    }

    fn instantiate_element(&mut self, element: &MarkupElement) -> NodeId {
        if element.tag == "template" {
            return self.alloc(NodeKind::Element {
                tag: element.tag.clone(),
                attributes: element.attributes.clone(),
                content: Some(Rc::new(element.children.clone())),
            });
        }

        let id = self.create_element(&element.tag, element.attributes.clone());
        for child in &element.children {
            let child = self.instantiate(child);
            self.append_child(id, child);
        }
        id
    }

    fn detach(&mut self, child: NodeId) {
        let parent = self.node_mut(child).and_then(|node| node.parent.take());
        if let Some(parent) = parent.and_then(|p| self.node_mut(p)) {
            parent.children.retain(|c| *c != child);
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        } else {
            return;
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
    }

    /// Move `node` to directly follow `reference` under the same parent
    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) {
        let Some(parent) = self.parent(reference) else {
            return;
        };
        self.detach(node);
        let Some(parent_node) = self.node_mut(parent) else {
            return;
        };
        let position = parent_node
            .children
            .iter()
            .position(|c| *c == reference)
            .map(|i| i + 1)
            .unwrap_or(parent_node.children.len());
        parent_node.children.insert(position, node);
        if let Some(child) = self.node_mut(node) {
            child.parent = Some(parent);
        }
    }

    /// Detach `node` and free its subtree, returning the freed ids
    pub fn remove(&mut self, node: NodeId) -> Vec<NodeId> {
        let freed = self.descendants(node);
        self.detach(node);
        for id in &freed {
            if let Some(slot) = self.nodes.get_mut(id.0) {
                *slot = None;
            }
        }
        freed
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.node(node).map(|n| n.children.clone()).unwrap_or_default()
    }

    /// `node` and everything below it, in document order
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let Some(data) = self.node(id) else {
                continue;
            };
            out.push(id);
            stack.extend(data.children.iter().rev().copied());
        }
        out
    }

    pub fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.node(node).map(|n| &n.kind)
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match self.kind(node)? {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    pub fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        match self.kind(node) {
            Some(NodeKind::Element { attributes, .. }) => attributes.clone(),
            _ => Vec::new(),
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match self.kind(node)? {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(NodeData {
            kind: NodeKind::Element { attributes, .. },
            ..
        }) = self.node_mut(node)
        {
            match attributes.iter_mut().find(|(key, _)| key == name) {
                Some((_, existing)) => *existing = value.to_string(),
                None => attributes.push((name.to_string(), value.to_string())),
            }
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let Some(NodeData {
            kind: NodeKind::Element { attributes, .. },
            ..
        }) = self.node_mut(node)
        {
            attributes.retain(|(key, _)| key != name);
        }
    }

    pub fn template_content(&self, node: NodeId) -> Option<Rc<Vec<MarkupNode>>> {
        match self.kind(node)? {
            NodeKind::Element { content, .. } => content.clone(),
            NodeKind::Text(_) => None,
        }
    }

    /// Replace all children of `node` with a single text node
    pub fn set_text_content(&mut self, node: NodeId, text: &str) {
        for child in self.children(node) {
            self.remove(child);
        }
        if !text.is_empty() {
            let text = self.create_text(text);
            self.append_child(node, text);
        }
    }

    /// Concatenated text of every text node below `node`
    pub fn inner_text(&self, node: NodeId) -> String {
        self.descendants(node)
            .into_iter()
            .filter_map(|id| match self.kind(id) {
                Some(NodeKind::Text(text)) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// First element matching `#id`, a tag name or `*`, in document order
    pub fn query_selector(&self, selector: &str) -> Option<NodeId> {
        self.query_selector_all(selector).into_iter().next()
    }

    pub fn query_selector_all(&self, selector: &str) -> Vec<NodeId> {
        let matches = |id: NodeId| match selector.strip_prefix('#') {
            Some(wanted) => self.attribute(id, "id") == Some(wanted),
            None if selector == "*" => self.tag(id).is_some(),
            None => self.tag(id) == Some(selector),
        };
        self.descendants(self.root)
            .into_iter()
            .filter(|id| *id != self.root && matches(*id))
            .collect()
    }

    /// Serialise the children of `node` back to markup
    pub fn render(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.render_node(child, &mut out);
        }
        out
    }

    fn render_node(&self, node: NodeId, out: &mut String) {
        match self.kind(node) {
            Some(NodeKind::Text(text)) => out.push_str(&escape(text, false)),
            Some(NodeKind::Element {
                tag, attributes, ..
            }) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push_str(&format!(" {}=\"{}\"", name, escape(value, true)));
                }
                out.push('>');
                for child in self.children(node) {
                    self.render_node(child, out);
                }
                out.push_str(&format!("</{}>", tag));
            }
            None => {}
        }
    }
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

fn escape(value: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}
