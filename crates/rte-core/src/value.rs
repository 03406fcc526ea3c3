use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::dom::{Attrs, Dom, NodeData, NodeId};

const DEFAULT_SCHEMA: &str = "rte-core";
const DEFAULT_VERSION: u32 = 1;

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_version() -> u32 {
    DEFAULT_VERSION
}

/// Plain tree form of a document, independent of arena ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeValue {
    Element {
        tag: String,
        #[serde(default, skip_serializing_if = "Attrs::is_empty")]
        attrs: Attrs,
        #[serde(default)]
        children: Vec<NodeValue>,
    },
    Text {
        text: String,
    },
}

impl NodeValue {
    pub fn from_dom(dom: &Dom, node: NodeId) -> Self {
        // Reverse pre-order visits children before their parents.
        let mut built: HashMap<NodeId, NodeValue> = HashMap::new();
        for id in dom.descendants(node).into_iter().rev() {
            let value = Self::shallow(dom, id, &mut built);
            built.insert(id, value);
        }
        Self::shallow(dom, node, &mut built)
    }

    fn shallow(dom: &Dom, node: NodeId, built: &mut HashMap<NodeId, NodeValue>) -> Self {
        match dom.data(node) {
            NodeData::Text(text) => NodeValue::Text { text: text.clone() },
            NodeData::Element(el) => NodeValue::Element {
                tag: el.tag.clone(),
                attrs: el.attrs.clone(),
                children: dom
                    .children(node)
                    .iter()
                    .filter_map(|c| built.remove(c))
                    .collect(),
            },
        }
    }

    /// Creates the node (and its subtree) in `dom`, detached.
    pub fn build(&self, dom: &mut Dom) -> NodeId {
        let root = Self::build_shallow(self, dom);
        let mut stack = vec![(root, self)];
        while let Some((node, value)) = stack.pop() {
            let NodeValue::Element { children, .. } = value else {
                continue;
            };
            for child in children {
                let id = Self::build_shallow(child, dom);
                dom.append_child(node, id);
                stack.push((id, child));
            }
        }
        root
    }

    fn build_shallow(value: &NodeValue, dom: &mut Dom) -> NodeId {
        match value {
            NodeValue::Text { text } => dom.create_text(text.clone()),
            NodeValue::Element { tag, attrs, .. } => {
                dom.create_element_with_attrs(tag, attrs.clone())
            }
        }
    }
}

impl Drop for NodeValue {
    fn drop(&mut self) {
        let NodeValue::Element { children, .. } = self else {
            return;
        };
        let mut pending = std::mem::take(children);
        while let Some(mut value) = pending.pop() {
            if let NodeValue::Element { children, .. } = &mut value {
                pending.append(children);
            }
        }
    }
}

/// Versioned, serialisable document value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorValue {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub document: Vec<NodeValue>,
}

impl EditorValue {
    pub fn from_dom(dom: &Dom) -> Self {
        Self {
            schema: default_schema(),
            version: default_version(),
            document: dom
                .children(dom.root())
                .iter()
                .map(|c| NodeValue::from_dom(dom, *c))
                .collect(),
        }
    }

    pub fn into_dom(self) -> Dom {
        let mut dom = Dom::new();
        let root = dom.root();
        for node in &self.document {
            let child = node.build(&mut dom);
            dom.append_child(root, child);
        }
        dom
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Document state captured before a risky edit. Restoring brings back the
/// exact tree, so node ids held by the caller stay meaningful.
#[derive(Debug, Clone)]
pub struct Snapshot {
    markup: String,
    dom: Dom,
}

impl Snapshot {
    pub fn capture(dom: &Dom) -> Self {
        Self {
            markup: dom.html(),
            dom: dom.clone(),
        }
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn restore(self, dom: &mut Dom) {
        *dom = self.dom;
        tracing::debug!(target: "rte::dom", len = self.markup.len(), "restored snapshot");
    }
}
