//! Block-level helpers the commands share: finding edit blocks, splitting
//! subtrees at a caret, empty-line placeholders and duplicate-wrapper cleanup.

use crate::dom::{Dom, NodeId, clamp_to_char_boundary};
use crate::selection::{Bookmark, Position};
use crate::tags;

pub fn get_edit_block(dom: &Dom, node: NodeId) -> Option<NodeId> {
    dom.closest_by(node, None, |dom, n| {
        tags::is_edit_block(dom, n) || tags::is_auxiliary_root(dom, n)
    })
}

/// Like [`get_edit_block`], but never returns an auxiliary root: loose inline
/// content of a cell or of the root is wrapped into a paragraph first.
pub fn get_scoped_block(dom: &mut Dom, node: NodeId, paragraph_tag: &str) -> Option<NodeId> {
    let block = get_edit_block(dom, node)?;
    if !tags::is_auxiliary_root(dom, block) {
        return Some(block);
    }
    ensure_block_structure(dom, block, paragraph_tag);
    if node == block {
        return dom.element_children(block).into_iter().find(|c| tags::is_edit_block(dom, *c));
    }
    get_edit_block(dom, node).filter(|b| !tags::is_auxiliary_root(dom, *b))
}

/// Wraps each run of inline children of `container` into a paragraph.
/// Whitespace-only runs between blocks are dropped. An empty container gets a
/// single empty paragraph.
pub fn ensure_block_structure(dom: &mut Dom, container: NodeId, paragraph_tag: &str) {
    let children = dom.children(container).to_vec();
    if children.is_empty() {
        let p = create_empty_paragraph(dom, paragraph_tag);
        dom.append_child(container, p);
        return;
    }

    let mut run: Vec<NodeId> = Vec::new();
    let flush = |dom: &mut Dom, run: &mut Vec<NodeId>| {
        if run.is_empty() {
            return;
        }
        let meaningful = run.iter().any(|n| {
            dom.text(*n)
                .is_none_or(|t| !t.trim().is_empty() || t.contains('\u{a0}'))
        });
        if !meaningful {
            for node in run.drain(..) {
                dom.remove(node);
            }
            return;
        }
        let p = dom.create_element(paragraph_tag);
        dom.insert_before_node(run[0], p);
        for node in run.drain(..) {
            dom.append_child(p, node);
        }
    };

    for child in children {
        if tags::is_inline(dom, child) {
            run.push(child);
        } else {
            flush(dom, &mut run);
        }
    }
    flush(dom, &mut run);
}

pub fn create_empty_line_placeholder(dom: &mut Dom) -> NodeId {
    dom.create_element(tags::BREAK)
}

pub fn create_empty_paragraph(dom: &mut Dom, paragraph_tag: &str) -> NodeId {
    let p = dom.create_element(paragraph_tag);
    let br = create_empty_line_placeholder(dom);
    dom.append_child(p, br);
    p
}

pub fn insert_paragraph(
    dom: &mut Dom,
    reference: NodeId,
    after: bool,
    paragraph_tag: &str,
) -> NodeId {
    let p = create_empty_paragraph(dom, paragraph_tag);
    if after {
        dom.insert_after(reference, p);
    } else {
        dom.insert_before_node(reference, p);
    }
    p
}

/// Whether `node` carries no visible content: only line-break placeholders,
/// whitespace and empty inline wrappers.
pub fn is_empty_block(dom: &Dom, node: NodeId) -> bool {
    dom.descendants(node).into_iter().all(|n| {
        if tags::is_content_atom(dom, n) || tags::is_list(dom, n) {
            return false;
        }
        if dom.is_text(n) {
            return tags::is_placeholder(dom, n);
        }
        true
    })
}

pub fn ensure_empty_line_placeholders(dom: &mut Dom, node: NodeId) {
    let mut targets: Vec<NodeId> = vec![node];
    targets.extend(dom.descendants(node));
    for target in targets {
        let fillable = tags::is_edit_block(dom, target) || tags::is_cell(dom, target);
        if !fillable || !is_empty_block(dom, target) {
            continue;
        }
        if dom.descendants(target).iter().any(|n| dom.is_tag(*n, tags::BREAK)) {
            continue;
        }
        for child in dom.children(target).to_vec() {
            dom.remove(child);
        }
        let br = create_empty_line_placeholder(dom);
        dom.append_child(target, br);
    }
}

pub fn split_text_node(dom: &mut Dom, text_node: NodeId, offset: usize) -> NodeId {
    let text = dom.text(text_node).unwrap_or_default().to_string();
    let at = clamp_to_char_boundary(&text, offset);
    let (head, tail) = text.split_at(at);
    let right = dom.create_text(tail);
    dom.set_text(text_node, head);
    dom.insert_after(text_node, right);
    right
}

/// Splits every level between `position` and `container` (inclusive). The
/// content after the position moves into a shallow clone of `container`
/// inserted right after it; the clone is returned.
pub fn split_to_parent(dom: &mut Dom, container: NodeId, position: Position) -> Option<NodeId> {
    if !dom.contains(container, position.node) {
        return None;
    }

    let (mut current, mut split_before) = split_point(dom, position)?;
    if !dom.contains(container, current) {
        // Structural position at the container itself.
        current = container;
        split_before = dom.first_child(container);
    }

    loop {
        let clone = dom.clone_node(current, false);
        let tail: Vec<NodeId> = match split_before {
            Some(reference) => {
                let children = dom.children(current);
                let ix = children.iter().position(|c| *c == reference).unwrap_or(children.len());
                children[ix..].to_vec()
            }
            None => Vec::new(),
        };
        for node in tail {
            dom.append_child(clone, node);
        }
        dom.insert_after(current, clone);
        if current == container {
            remove_empty_inline(dom, container);
            remove_empty_inline(dom, clone);
            tracing::trace!(target: "rte::dom", ?container, ?clone, "split to parent");
            return Some(clone);
        }
        split_before = Some(clone);
        current = dom.parent(current)?;
    }
}

fn split_point(dom: &mut Dom, position: Position) -> Option<(NodeId, Option<NodeId>)> {
    let node = position.node;
    if let Some(text) = dom.text(node) {
        let len = text.len();
        let parent = dom.parent(node)?;
        let offset = position.offset.unwrap_or(0);
        return Some(if offset == 0 {
            (parent, Some(node))
        } else if offset >= len {
            (parent, dom.next_sibling(node))
        } else {
            let right = split_text_node(dom, node, offset);
            (parent, Some(right))
        });
    }
    match position.offset {
        Some(ix) => Some((node, dom.child(node, ix))),
        None => Some((dom.parent(node)?, Some(node))),
    }
}

pub fn remove_empty_inline(dom: &mut Dom, node: NodeId) {
    for n in dom.descendants(node).into_iter().rev() {
        let Some(tag) = dom.tag(n) else {
            continue;
        };
        if tags::is_block_tag(tag) || tags::is_void(tag) {
            continue;
        }
        if dom.children(n).is_empty() {
            dom.remove(n);
        }
    }
}

pub fn change_container_tag(dom: &mut Dom, node: NodeId, tag: &str) {
    dom.set_tag(node, tag);
}

fn same_structure(dom: &Dom, a: NodeId, b: NodeId) -> bool {
    match (dom.tag(a), dom.tag(b)) {
        (Some(ta), Some(tb)) => ta == tb && dom.attrs(a) == dom.attrs(b),
        _ => false,
    }
}

/// Normalises inline structure below `node` after content was spliced in:
/// inline wrappers nested inside an identical ancestor are unwrapped,
/// adjacent identical wrappers are merged and adjacent text nodes are joined.
/// `bookmark` is remapped when the text node it points into is merged away.
pub fn remove_duplicate_structures(dom: &mut Dom, node: NodeId, bookmark: &mut Bookmark) {
    for n in dom.descendants(node).into_iter().rev() {
        if !dom.is_element(n) || !tags::is_inline(dom, n) || dom.tag(n).is_some_and(tags::is_void) {
            continue;
        }
        let duplicated = dom
            .ancestors(n)
            .into_iter()
            .take_while(|a| *a != node && tags::is_inline(dom, *a))
            .any(|a| same_structure(dom, a, n));
        if duplicated {
            dom.unwrap_node(n);
        }
    }
    merge_adjacent(dom, node, bookmark);
}

fn merge_adjacent(dom: &mut Dom, node: NodeId, bookmark: &mut Bookmark) {
    let mut pending = vec![node];
    while let Some(node) = pending.pop() {
        merge_children(dom, node, bookmark);
        pending.extend(
            dom.children(node)
                .iter()
                .rev()
                .copied()
                .filter(|c| dom.is_element(*c)),
        );
    }
}

fn merge_children(dom: &mut Dom, node: NodeId, bookmark: &mut Bookmark) {
    let mut ix = 0;
    while ix + 1 < dom.children(node).len() {
        let left = dom.children(node)[ix];
        let right = dom.children(node)[ix + 1];
        if let (Some(lt), Some(rt)) = (dom.text(left), dom.text(right)) {
            let left_len = lt.len();
            let joined = format!("{lt}{rt}");
            dom.set_text(left, joined);
            dom.remove(right);
            if bookmark.start.node == right {
                let offset = left_len + bookmark.start.offset.unwrap_or(0);
                bookmark.start = Position::new(left, offset);
            }
            continue;
        }
        let mergeable = dom.is_element(left)
            && tags::is_inline(dom, left)
            && !dom.tag(left).is_some_and(tags::is_void)
            && same_structure(dom, left, right);
        if mergeable {
            if bookmark.start.node == node {
                match bookmark.start.offset {
                    Some(o) if o == ix + 1 => *bookmark = Bookmark::at_end_of(dom, left),
                    Some(o) if o > ix + 1 => bookmark.start.offset = Some(o - 1),
                    _ => {}
                }
            }
            dom.move_children(right, left);
            dom.remove(right);
            continue;
        }
        ix += 1;
    }
}

/// Drops `<br>` placeholders and blank text directly inside `block`, usually
/// right before real content goes in.
pub fn remove_placeholders(dom: &mut Dom, block: NodeId) {
    for child in dom.children(block).to_vec() {
        if tags::is_placeholder(dom, child) {
            dom.remove(child);
        }
    }
}
