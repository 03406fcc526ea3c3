use serde::{Deserialize, Serialize};

use crate::dom::{Dom, NodeId};
use crate::tags;

/// A point in the tree. For text nodes `offset` is a byte offset into the
/// text; for elements it is a child index. `None` denotes the structural
/// position of the node itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub node: NodeId,
    #[serde(default)]
    pub offset: Option<usize>,
}

impl Position {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self {
            node,
            offset: Some(offset),
        }
    }

    pub fn structural(node: NodeId) -> Self {
        Self { node, offset: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellSelection {
    pub cells: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingSelection {
    pub start: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_selection: Option<CellSelection>,
}

impl ProcessingSelection {
    pub fn caret(node: NodeId, offset: usize) -> Self {
        Self {
            start: Position::new(node, offset),
            end: None,
            cell_selection: None,
        }
    }

    pub fn range(start: Position, end: Position) -> Self {
        Self {
            start,
            end: Some(end),
            cell_selection: None,
        }
    }

    pub fn cells(cells: Vec<NodeId>) -> Self {
        let start = cells
            .first()
            .copied()
            .map(Position::structural)
            .unwrap_or(Position::structural(NodeId::ROOT));
        Self {
            start,
            end: None,
            cell_selection: Some(CellSelection { cells }),
        }
    }

    pub fn end_or_start(&self) -> Position {
        self.end.unwrap_or(self.start)
    }

    pub fn selected_cells(&self) -> &[NodeId] {
        self.cell_selection
            .as_ref()
            .map(|c| c.cells.as_slice())
            .unwrap_or(&[])
    }
}

/// Caret position that survives a command's restructuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub start: Position,
}

impl Bookmark {
    pub fn at(node: NodeId, offset: usize) -> Self {
        Self {
            start: Position::new(node, offset),
        }
    }

    pub fn structural(node: NodeId) -> Self {
        Self {
            start: Position::structural(node),
        }
    }

    pub fn from_selection(selection: &ProcessingSelection) -> Self {
        Self {
            start: selection.start,
        }
    }

    pub fn to_selection(self) -> ProcessingSelection {
        ProcessingSelection {
            start: self.start,
            end: None,
            cell_selection: None,
        }
    }

    pub fn at_start_of(dom: &Dom, node: NodeId) -> Self {
        if dom.is_text(node) {
            return Self::at(node, 0);
        }
        match dom.descendants(node).into_iter().find(|n| dom.is_text(*n)) {
            Some(text) => Self::at(text, 0),
            None => Self::at(node, 0),
        }
    }

    pub fn at_end_of(dom: &Dom, node: NodeId) -> Self {
        if let Some(text) = dom.text(node) {
            return Self::at(node, text.len());
        }
        match dom
            .descendants(node)
            .into_iter()
            .rev()
            .find(|n| dom.is_text(*n))
        {
            Some(text) => Self::at(text, dom.text(text).map(str::len).unwrap_or(0)),
            None => Self::at(node, dom.children(node).len()),
        }
    }
}

/// The nodes a selection spans plus their common ancestor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeList {
    pub common_ancestor: NodeId,
    pub nodes: Vec<NodeId>,
}

impl NodeList {
    pub fn from_selection(dom: &Dom, selection: &ProcessingSelection) -> Self {
        if let Some(cells) = &selection.cell_selection {
            if !cells.cells.is_empty() {
                let common = common_ancestor(dom, &cells.cells).unwrap_or(dom.root());
                return Self {
                    common_ancestor: common,
                    nodes: cells.cells.clone(),
                };
            }
        }

        let start = leaf_at(dom, selection.start);
        let end = leaf_at(dom, selection.end_or_start());
        let common = common_ancestor(dom, &[start, end]).unwrap_or(dom.root());
        if start == end {
            return Self {
                common_ancestor: common,
                nodes: vec![start],
            };
        }

        let mut nodes = Vec::new();
        let mut inside = false;
        for node in dom.descendants(common) {
            if node == start {
                inside = true;
            }
            if inside && dom.children(node).is_empty() {
                nodes.push(node);
            }
            if node == end {
                break;
            }
        }
        if nodes.is_empty() {
            nodes.push(start);
        }
        Self {
            common_ancestor: common,
            nodes,
        }
    }
}

/// The deepest node a position refers to.
pub fn leaf_at(dom: &Dom, position: Position) -> NodeId {
    let mut node = position.node;
    let Some(mut ix) = position.offset else {
        return node;
    };
    while !dom.is_text(node) {
        let children = dom.children(node);
        if children.is_empty() {
            break;
        }
        let child = children[ix.min(children.len() - 1)];
        if dom.is_text(child) || dom.children(child).is_empty() {
            return child;
        }
        node = child;
        ix = 0;
    }
    node
}

pub fn common_ancestor(dom: &Dom, nodes: &[NodeId]) -> Option<NodeId> {
    let first = *nodes.first()?;
    let mut chain: Vec<NodeId> = vec![first];
    chain.extend(dom.ancestors(first));
    chain
        .into_iter()
        .find(|candidate| nodes.iter().all(|n| dom.contains(*candidate, *n)))
}

pub fn cell_for_position(dom: &Dom, position: Position) -> Option<NodeId> {
    dom.closest_by(position.node, None, tags::is_cell)
}
