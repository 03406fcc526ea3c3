use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tags;

pub type Attrs = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    /// `Dom::new` always allocates the root first.
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    pub tag: String,
    pub attrs: Attrs,
}

#[derive(Debug, Clone)]
struct NodeEntry {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed mutable document tree.
///
/// Nodes are never freed: a removed node is merely detached, so every
/// [`NodeId`] handed out stays valid for the lifetime of the `Dom`. Commands
/// rely on this to keep bookmarks and side tables stable across moves.
#[derive(Debug, Clone)]
pub struct Dom {
    nodes: Vec<NodeEntry>,
    root: NodeId,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            root: NodeId::ROOT,
        };
        dom.root = dom.create_element(tags::ROOT);
        dom
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeEntry {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attrs: Attrs::new(),
        }))
    }

    pub fn create_element_with_attrs(&mut self, tag: &str, attrs: Attrs) -> NodeId {
        let id = self.create_element(tag);
        if let NodeData::Element(el) = &mut self.nodes[id.0].data {
            el.attrs = attrs;
        }
        id
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Text(text.into()))
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Element(el) => Some(el.tag.as_str()),
            NodeData::Text(_) => None,
        }
    }

    pub fn is_tag(&self, id: NodeId, tag: &str) -> bool {
        self.tag(id) == Some(tag)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].data, NodeData::Element(_))
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].data, NodeData::Text(_))
    }

    pub fn set_tag(&mut self, id: NodeId, tag: &str) {
        if let NodeData::Element(el) = &mut self.nodes[id.0].data {
            el.tag = tag.to_ascii_lowercase();
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Text(text) => Some(text.as_str()),
            NodeData::Element(_) => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        if let NodeData::Text(current) = &mut self.nodes[id.0].data {
            *current = text.into();
        }
    }

    pub fn attrs(&self, id: NodeId) -> Option<&Attrs> {
        match &self.nodes[id.0].data {
            NodeData::Element(el) => Some(&el.attrs),
            NodeData::Text(_) => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attrs(id)?.get(name).map(String::as_str)
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let NodeData::Element(el) = &mut self.nodes[id.0].data {
            el.attrs.insert(name.to_ascii_lowercase(), value.into());
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        match &mut self.nodes[id.0].data {
            NodeData::Element(el) => el.attrs.remove(name),
            NodeData::Text(_) => None,
        }
    }

    /// Reads a `rowspan`/`colspan` style attribute. Missing, malformed or zero
    /// values count as 1.
    pub fn span_attr(&self, id: NodeId, name: &str) -> usize {
        self.attr(id, name)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(1)
    }

    /// Writes a span attribute, dropping it entirely when it is 1.
    pub fn set_span_attr(&mut self, id: NodeId, name: &str, span: usize) {
        if span <= 1 {
            self.remove_attr(id, name);
        } else {
            self.set_attr(id, name, span.to_string());
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn child(&self, id: NodeId, ix: usize) -> Option<NodeId> {
        self.nodes[id.0].children.get(ix).copied()
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].children.first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].children.last().copied()
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.is_element(*c))
            .collect()
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let ix = self.index_in_parent(id)?;
        self.child(parent, ix + 1)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let ix = self.index_in_parent(id)?;
        ix.checked_sub(1).and_then(|ix| self.child(parent, ix))
    }

    pub fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.next_sibling(id);
        while let Some(node) = current {
            if self.is_element(node) {
                return Some(node);
            }
            current = self.next_sibling(node);
        }
        None
    }

    pub fn previous_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.previous_sibling(id);
        while let Some(node) = current {
            if self.is_element(node) {
                return Some(node);
            }
            current = self.previous_sibling(node);
        }
        None
    }

    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            out.push(node);
            current = self.parent(node);
        }
        out
    }

    /// Nearest ancestor-or-self element with `tag`, not crossing `limit`.
    pub fn closest(&self, id: NodeId, tag: &str, limit: Option<NodeId>) -> Option<NodeId> {
        self.closest_by(id, limit, |dom, node| dom.is_tag(node, tag))
    }

    pub fn closest_by(
        &self,
        id: NodeId,
        limit: Option<NodeId>,
        pred: impl Fn(&Dom, NodeId) -> bool,
    ) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if pred(self, node) {
                return Some(node);
            }
            if Some(node) == limit || node == self.root {
                return None;
            }
            current = self.parent(node);
        }
        None
    }

    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        self.contains(self.root, id)
    }

    /// Pre-order descendants, not including `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    pub fn first_descendant_tagged(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.descendants(id)
            .into_iter()
            .find(|node| self.is_tag(*node, tag))
    }

    pub fn text_content(&self, id: NodeId) -> String {
        match &self.nodes[id.0].data {
            NodeData::Text(text) => text.clone(),
            NodeData::Element(_) => {
                let mut out = String::new();
                for node in self.descendants(id) {
                    if let Some(text) = self.text(node) {
                        out.push_str(text);
                    }
                }
                out
            }
        }
    }

    pub fn remove(&mut self, id: NodeId) {
        let Some(parent) = self.nodes[id.0].parent.take() else {
            return;
        };
        self.nodes[parent.0].children.retain(|c| *c != id);
    }

    /// Inserts `child` into `parent` before `reference`, or appends when
    /// `reference` is `None` or not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        // A node without children cannot be an ancestor of `parent`.
        let cyclic = !self.nodes[child.0].children.is_empty() && self.contains(child, parent);
        if child == parent || cyclic {
            tracing::warn!(target: "rte::dom", ?child, ?parent, "refusing cyclic insert");
            return;
        }
        self.remove(child);
        let ix = reference
            .and_then(|r| self.nodes[parent.0].children.iter().position(|c| *c == r))
            .unwrap_or(self.nodes[parent.0].children.len());
        self.nodes[parent.0].children.insert(ix, child);
        self.nodes[child.0].parent = Some(parent);
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        let first = self.first_child(parent);
        self.insert_before(parent, child, first);
    }

    pub fn insert_before_node(&mut self, reference: NodeId, child: NodeId) {
        if let Some(parent) = self.parent(reference) {
            self.insert_before(parent, child, Some(reference));
        }
    }

    pub fn insert_after(&mut self, reference: NodeId, child: NodeId) {
        if let Some(parent) = self.parent(reference) {
            let next = self.next_sibling(reference);
            self.insert_before(parent, child, next);
        }
    }

    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        self.insert_before_node(old, new);
        self.remove(old);
    }

    pub fn move_children(&mut self, from: NodeId, to: NodeId) {
        let children = self.nodes[from.0].children.clone();
        for child in children {
            self.append_child(to, child);
        }
    }

    pub fn unwrap_node(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        let children = self.nodes[id.0].children.clone();
        for child in children {
            self.insert_before(parent, child, Some(id));
        }
        self.remove(id);
    }

    pub fn clone_node(&mut self, id: NodeId, deep: bool) -> NodeId {
        let data = self.nodes[id.0].data.clone();
        let copy = self.push(data);
        if !deep {
            return copy;
        }
        let mut stack = vec![(id, copy)];
        while let Some((source, target)) = stack.pop() {
            let children = self.nodes[source.0].children.clone();
            for child in children {
                let data = self.nodes[child.0].data.clone();
                let child_copy = self.push(data);
                self.append_child(target, child_copy);
                stack.push((child, child_copy));
            }
        }
        copy
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.write_html(*child, &mut out);
        }
        out
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    pub fn html(&self) -> String {
        self.inner_html(self.root)
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let mut stack = vec![HtmlStep::Open(id)];
        while let Some(step) = stack.pop() {
            let node = match step {
                HtmlStep::Open(node) => node,
                HtmlStep::Close(tag) => {
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                    continue;
                }
            };
            match &self.nodes[node.0].data {
                NodeData::Text(text) => escape_text(text, out),
                NodeData::Element(el) => {
                    out.push('<');
                    out.push_str(&el.tag);
                    for (name, value) in &el.attrs {
                        out.push(' ');
                        out.push_str(name);
                        out.push_str("=\"");
                        escape_attr(value, out);
                        out.push('"');
                    }
                    out.push('>');
                    if tags::is_void(&el.tag) {
                        continue;
                    }
                    stack.push(HtmlStep::Close(&el.tag));
                    stack.extend(self.children(node).iter().rev().map(|c| HtmlStep::Open(*c)));
                }
            }
        }
    }
}

enum HtmlStep<'a> {
    Open(NodeId),
    Close(&'a str),
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

pub(crate) fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}
