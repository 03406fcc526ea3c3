//! Tag classification shared by every command.

use crate::dom::{Dom, NodeId};

pub const ROOT: &str = "body";
pub const PARAGRAPH: &str = "p";
pub const BREAK: &str = "br";
pub const TABLE: &str = "table";
pub const ROW: &str = "tr";
pub const DATA_CELL: &str = "td";
pub const HEADER_CELL: &str = "th";
pub const LIST_ITEM: &str = "li";
pub const UNORDERED_LIST: &str = "ul";
pub const ORDERED_LIST: &str = "ol";

pub const NBSP: &str = "\u{a0}";

const VOID: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const BLOCK: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "body",
    "caption",
    "dd",
    "div",
    "dl",
    "dt",
    "figure",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "li",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "tr",
    "ul",
];

/// Blocks whose own content is edited directly (the "edit block" kinds).
const EDIT_BLOCK: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "address", "li", "div", "dt", "dd",
];

/// Elements that may carry content without a surrounding edit block.
const CONTENT_ATOM: &[&str] = &["img", "hr", "iframe", "embed", "object", "video", "audio"];

pub fn is_void(tag: &str) -> bool {
    VOID.contains(&tag)
}

pub fn is_block_tag(tag: &str) -> bool {
    BLOCK.contains(&tag)
}

pub fn is_list_tag(tag: &str) -> bool {
    tag == UNORDERED_LIST || tag == ORDERED_LIST
}

pub fn is_cell_tag(tag: &str) -> bool {
    tag == DATA_CELL || tag == HEADER_CELL
}

pub fn is_table_section_tag(tag: &str) -> bool {
    matches!(tag, "thead" | "tbody" | "tfoot")
}

/// Blocks that are pasted as a whole and never merged into surrounding text.
pub fn is_atomic_tag(tag: &str) -> bool {
    tag == TABLE || is_list_tag(tag)
}

pub fn is_edit_block_tag(tag: &str) -> bool {
    EDIT_BLOCK.contains(&tag)
}

pub fn is_block(dom: &Dom, node: NodeId) -> bool {
    dom.tag(node).is_some_and(is_block_tag)
}

pub fn is_inline(dom: &Dom, node: NodeId) -> bool {
    dom.is_text(node) || dom.tag(node).is_some_and(|t| !is_block_tag(t))
}

pub fn is_list(dom: &Dom, node: NodeId) -> bool {
    dom.tag(node).is_some_and(is_list_tag)
}

pub fn is_list_item(dom: &Dom, node: NodeId) -> bool {
    dom.is_tag(node, LIST_ITEM)
}

pub fn is_table(dom: &Dom, node: NodeId) -> bool {
    dom.is_tag(node, TABLE)
}

pub fn is_row(dom: &Dom, node: NodeId) -> bool {
    dom.is_tag(node, ROW)
}

pub fn is_cell(dom: &Dom, node: NodeId) -> bool {
    dom.tag(node).is_some_and(is_cell_tag)
}

pub fn is_atomic(dom: &Dom, node: NodeId) -> bool {
    dom.tag(node).is_some_and(is_atomic_tag)
}

pub fn is_edit_block(dom: &Dom, node: NodeId) -> bool {
    dom.tag(node).is_some_and(is_edit_block_tag)
}

/// Structural containers that bound edit blocks: table cells and the root.
pub fn is_auxiliary_root(dom: &Dom, node: NodeId) -> bool {
    node == dom.root() || is_cell(dom, node)
}

pub fn is_placeholder(dom: &Dom, node: NodeId) -> bool {
    if dom.is_tag(node, BREAK) {
        return true;
    }
    dom.text(node)
        .is_some_and(|t| t.chars().all(|c| c.is_whitespace() || c == '\u{a0}'))
}

pub fn is_content_atom(dom: &Dom, node: NodeId) -> bool {
    dom.tag(node).is_some_and(|t| CONTENT_ATOM.contains(&t)) || is_table(dom, node)
}
