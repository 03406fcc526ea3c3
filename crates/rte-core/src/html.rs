//! Bridge between HTML markup and the arena tree.

use html5ever::tendril::TendrilSink;
use html5ever::{LocalName, Namespace, ParseOpts, QualName, parse_fragment};
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};

use crate::dom::{Attrs, Dom, NodeId};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Tag of the detached container that holds a parsed fragment.
pub const FRAGMENT_CONTAINER: &str = "div";

/// Parses `html` as body content and imports the result into `dom` under a
/// fresh, detached container element. The container is returned.
pub fn parse_fragment_into(dom: &mut Dom, html: &str) -> NodeId {
    let container = dom.create_element(FRAGMENT_CONTAINER);
    let context = QualName::new(
        None,
        Namespace::from(HTML_NAMESPACE),
        LocalName::from("body"),
    );
    let rc = parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new()).one(html);

    // Fragment parsing yields `#document > html > (fragment nodes)`.
    let document_children = rc.document.children.borrow();
    for top in document_children.iter() {
        match &top.data {
            RcNodeData::Element { name, .. } if name.local.as_ref() == "html" => {
                for child in top.children.borrow().iter() {
                    import_node(dom, container, child);
                }
            }
            _ => import_node(dom, container, top),
        }
    }
    tracing::trace!(
        target: "rte::html",
        nodes = dom.children(container).len(),
        "parsed fragment"
    );
    container
}

impl Dom {
    /// Builds a document whose root holds the parsed `html`.
    pub fn from_html(html: &str) -> Self {
        let mut dom = Dom::new();
        let container = parse_fragment_into(&mut dom, html);
        let root = dom.root();
        dom.move_children(container, root);
        dom
    }

    /// Replaces the content of `parent` with freshly parsed `html`.
    pub fn set_inner_html(&mut self, parent: NodeId, html: &str) {
        for child in self.children(parent).to_vec() {
            self.remove(child);
        }
        let container = parse_fragment_into(self, html);
        self.move_children(container, parent);
    }
}

fn import_node(dom: &mut Dom, parent: NodeId, handle: &Handle) {
    let mut stack = vec![(parent, handle.clone())];
    while let Some((parent, handle)) = stack.pop() {
        match &handle.data {
            RcNodeData::Element { name, attrs, .. } => {
                let mut imported = Attrs::new();
                for attr in attrs.borrow().iter() {
                    imported.insert(
                        attr.name.local.as_ref().to_ascii_lowercase(),
                        attr.value.to_string(),
                    );
                }
                let node = dom.create_element_with_attrs(name.local.as_ref(), imported);
                dom.append_child(parent, node);
                stack.extend(handle.children.borrow().iter().rev().map(|c| (node, c.clone())));
            }
            RcNodeData::Text { contents } => {
                let text = contents.borrow().to_string();
                if text.is_empty() {
                    continue;
                }
                // html5ever may emit adjacent text runs; keep them as one node.
                if let Some(last) = dom.last_child(parent) {
                    if let Some(existing) = dom.text(last) {
                        let joined = format!("{existing}{text}");
                        dom.set_text(last, joined);
                        continue;
                    }
                }
                let node = dom.create_text(text);
                dom.append_child(parent, node);
            }
            RcNodeData::Document => {
                stack.extend(handle.children.borrow().iter().rev().map(|c| (parent, c.clone())));
            }
            RcNodeData::Comment { .. }
            | RcNodeData::Doctype { .. }
            | RcNodeData::ProcessingInstruction { .. } => {}
        }
    }
}
