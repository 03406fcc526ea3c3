//! List restructuring: promoting and demoting items, splitting nested lists
//! when items turn back into paragraphs, and building lists from blocks.

use std::collections::HashSet;

use crate::dom::{Dom, NodeId};
use crate::dom_processor::{
    create_empty_line_placeholder, create_empty_paragraph, ensure_block_structure, is_empty_block,
};
use crate::tags;

/// List item containing `node`. The search stops at table cells, so a list
/// around a table never claims the cell content.
pub fn get_item_for_dom(dom: &Dom, node: NodeId) -> Option<NodeId> {
    dom.closest_by(node, None, |dom, n| tags::is_list_item(dom, n) || tags::is_cell(dom, n))
        .filter(|n| tags::is_list_item(dom, *n))
}

pub fn get_list_for_item(dom: &Dom, item: NodeId) -> Option<NodeId> {
    dom.parent(item).filter(|p| tags::is_list(dom, *p))
}

pub fn get_top_list_for_item(dom: &Dom, item: NodeId) -> Option<NodeId> {
    let mut list = get_list_for_item(dom, item)?;
    while let Some(parent_item) = dom.parent(list).filter(|p| tags::is_list_item(dom, *p)) {
        match get_list_for_item(dom, parent_item) {
            Some(outer) => list = outer,
            None => break,
        }
    }
    Some(list)
}

pub fn get_nesting_level(dom: &Dom, item: NodeId) -> usize {
    let mut lists = 0usize;
    for ancestor in dom.ancestors(item) {
        if tags::is_cell(dom, ancestor) {
            break;
        }
        if tags::is_list(dom, ancestor) {
            lists += 1;
        }
    }
    lists.saturating_sub(1)
}

pub fn is_top_level_list(dom: &Dom, list: NodeId) -> bool {
    !dom.parent(list).is_some_and(|p| tags::is_list_item(dom, p))
}

pub fn is_first_list_item(dom: &Dom, item: NodeId) -> bool {
    previous_item(dom, item).is_none()
}

pub fn is_last_list_item(dom: &Dom, item: NodeId) -> bool {
    next_item(dom, item).is_none()
}

fn previous_item(dom: &Dom, item: NodeId) -> Option<NodeId> {
    let mut current = dom.previous_element_sibling(item);
    while let Some(node) = current {
        if tags::is_list_item(dom, node) {
            return Some(node);
        }
        current = dom.previous_element_sibling(node);
    }
    None
}

fn next_item(dom: &Dom, item: NodeId) -> Option<NodeId> {
    let mut current = dom.next_element_sibling(item);
    while let Some(node) = current {
        if tags::is_list_item(dom, node) {
            return Some(node);
        }
        current = dom.next_element_sibling(node);
    }
    None
}

pub fn list_items(dom: &Dom, list: NodeId) -> Vec<NodeId> {
    dom.element_children(list)
        .into_iter()
        .filter(|c| tags::is_list_item(dom, *c))
        .collect()
}

pub fn is_list_empty(dom: &Dom, list: NodeId) -> bool {
    list_items(dom, list).into_iter().all(|item| is_item_empty(dom, item))
}

pub fn is_item_empty(dom: &Dom, item: NodeId) -> bool {
    dom.children(item).iter().all(|child| {
        if tags::is_list(dom, *child) {
            is_list_empty(dom, *child)
        } else if dom.is_text(*child) {
            tags::is_placeholder(dom, *child)
        } else {
            is_empty_block(dom, *child) && !tags::is_content_atom(dom, *child)
        }
    })
}

pub fn is_same_type(dom: &Dom, a: NodeId, b: NodeId) -> bool {
    tags::is_list(dom, a) && dom.tag(a) == dom.tag(b)
}

pub fn get_nested_lists(dom: &Dom, item: NodeId) -> Vec<NodeId> {
    dom.element_children(item)
        .into_iter()
        .filter(|c| tags::is_list(dom, *c))
        .collect()
}

fn has_own_content(dom: &Dom, item: NodeId) -> bool {
    dom.children(item).iter().any(|child| {
        if tags::is_list(dom, *child) {
            false
        } else if dom.is_text(*child) {
            !tags::is_placeholder(dom, *child)
        } else {
            !is_empty_block(dom, *child) || tags::is_content_atom(dom, *child)
        }
    })
}

pub fn document_order(dom: &Dom, nodes: &[NodeId]) -> Vec<NodeId> {
    let wanted: HashSet<NodeId> = nodes.iter().copied().collect();
    dom.descendants(dom.root())
        .into_iter()
        .filter(|n| wanted.contains(n))
        .collect()
}

/// Moves each item into a nested list of its previous sibling. Items
/// without a previous sibling stay where they are.
pub fn indent_items(dom: &mut Dom, items: &[NodeId]) -> usize {
    let items = document_order(dom, items);
    let mut moved = 0;
    for item in &items {
        if items
            .iter()
            .any(|other| other != item && dom.contains(*other, *item))
        {
            // travels with its selected ancestor
            continue;
        }
        let Some(list) = get_list_for_item(dom, *item) else {
            continue;
        };
        let Some(previous) = previous_item(dom, *item) else {
            continue;
        };
        let nested = match dom
            .last_child(previous)
            .filter(|c| is_same_type(dom, *c, list))
        {
            Some(nested) => nested,
            None => {
                let tag = dom.tag(list).unwrap_or(tags::UNORDERED_LIST).to_string();
                let nested = dom.create_element(&tag);
                dom.append_child(previous, nested);
                nested
            }
        };
        dom.append_child(nested, *item);
        // The item's own sub-items join it at the new level.
        for sub in get_nested_lists(dom, *item) {
            if is_same_type(dom, sub, nested) {
                for child in list_items(dom, sub) {
                    dom.append_child(nested, child);
                }
                dom.remove(sub);
            }
        }
        moved += 1;
    }
    tracing::debug!(target: "rte::list", moved, "indented items");
    moved
}

/// Moves each item one level up. Following siblings become a nested list of
/// the promoted item; items of a top-level list are turned into paragraphs.
pub fn outdent_items(
    dom: &mut Dom,
    items: &[NodeId],
    keep_structure: bool,
    paragraph_tag: &str,
) -> Vec<NodeId> {
    let items = document_order(dom, items);
    let (top, nested): (Vec<NodeId>, Vec<NodeId>) = items
        .iter()
        .copied()
        .partition(|item| get_nesting_level(dom, *item) == 0);

    for item in nested.iter().rev() {
        let Some(list) = get_list_for_item(dom, *item) else {
            continue;
        };
        let Some(parent_item) = dom.parent(list).filter(|p| tags::is_list_item(dom, *p)) else {
            continue;
        };
        let mut following = Vec::new();
        let mut current = dom.next_sibling(*item);
        while let Some(node) = current {
            following.push(node);
            current = dom.next_sibling(node);
        }
        if following.iter().any(|n| tags::is_list_item(dom, *n)) {
            let tag = dom.tag(list).unwrap_or(tags::UNORDERED_LIST).to_string();
            let tail = dom.create_element(&tag);
            for node in following {
                dom.append_child(tail, node);
            }
            dom.append_child(*item, tail);
        }
        dom.insert_after(parent_item, *item);
        if list_items(dom, list).is_empty() {
            dom.remove(list);
        }
    }
    tracing::debug!(
        target: "rte::list",
        promoted = nested.len(),
        unlisted = top.len(),
        "outdented items"
    );

    if top.is_empty() {
        Vec::new()
    } else {
        unlist_items(dom, &top, keep_structure, paragraph_tag)
    }
}

/// Algorithm-local flags for [`unlist_items`], kept beside the tree instead
/// of on it.
#[derive(Debug, Default)]
struct Markers {
    removal: HashSet<NodeId>,
    cloned: HashSet<NodeId>,
}

impl Markers {
    fn is_marked(&self, node: NodeId) -> bool {
        self.removal.contains(&node) || self.cloned.contains(&node)
    }

    fn clone_marked(&mut self, dom: &mut Dom, node: NodeId) -> NodeId {
        let copy = dom.clone_node(node, false);
        self.cloned.insert(copy);
        copy
    }
}

/// Turns list items back into paragraphs placed outside their top-level list
/// and returns the first block created for each item.
pub fn unlist_items(
    dom: &mut Dom,
    items: &[NodeId],
    keep_structure: bool,
    paragraph_tag: &str,
) -> Vec<NodeId> {
    let items = document_order(dom, items);
    let mut groups: Vec<(NodeId, Vec<NodeId>)> = Vec::new();
    for item in items {
        if !tags::is_list_item(dom, item) {
            continue;
        }
        let Some(top) = get_top_list_for_item(dom, item) else {
            continue;
        };
        match groups.iter_mut().find(|(t, _)| *t == top) {
            Some((_, run)) => run.push(item),
            None => groups.push((top, vec![item])),
        }
    }

    let mut created = Vec::new();
    for (top, run) in groups {
        created.extend(unlist_run(dom, top, &run, keep_structure, paragraph_tag));
    }
    created
}

fn unlist_run(
    dom: &mut Dom,
    top: NodeId,
    run: &[NodeId],
    keep_structure: bool,
    paragraph_tag: &str,
) -> Vec<NodeId> {
    let (Some(&first), Some(&last)) = (run.first(), run.last()) else {
        return Vec::new();
    };
    let mut markers = Markers::default();
    let before = dom
        .descendants(top)
        .into_iter()
        .find(|n| tags::is_list_item(dom, *n))
        == Some(first);

    let mut created = Vec::new();
    let mut anchor: Option<NodeId> = None;
    for item in run {
        let blocks = extract_item_content(dom, *item, paragraph_tag);
        markers.removal.insert(*item);
        if let Some(first_block) = blocks.first() {
            created.push(*first_block);
        }
        for block in blocks {
            match (before, anchor) {
                (true, _) => dom.insert_before_node(top, block),
                (false, None) => dom.insert_after(top, block),
                (false, Some(previous)) => dom.insert_after(previous, block),
            }
            anchor = Some(block);
        }
    }

    let split = split_after(dom, top, last, &mut markers);
    if let Some(split) = split {
        match anchor {
            Some(anchor) if !before => dom.insert_after(anchor, split),
            _ => dom.insert_after(top, split),
        }
    }

    clean_up_list(dom, top, &markers);
    if let Some(split) = split {
        if keep_structure {
            pad_empty_levels(dom, split, &markers);
        } else {
            flatten_leading_levels(dom, split, &markers);
        }
        if dom.is_attached(split) {
            clean_up_list(dom, split, &markers);
        }
    }
    tracing::debug!(
        target: "rte::list",
        items = run.len(),
        before,
        split = split.is_some(),
        keep_structure,
        "unlisted items"
    );
    created
}

fn extract_item_content(dom: &mut Dom, item: NodeId, paragraph_tag: &str) -> Vec<NodeId> {
    let mut blocks: Vec<NodeId> = Vec::new();
    let mut paragraph: Option<NodeId> = None;
    for child in dom.children(item).to_vec() {
        if tags::is_list(dom, child) {
            paragraph = None;
            continue;
        }
        if tags::is_inline(dom, child) {
            let p = match paragraph {
                Some(p) => p,
                None => {
                    let p = dom.create_element(paragraph_tag);
                    blocks.push(p);
                    paragraph = Some(p);
                    p
                }
            };
            dom.append_child(p, child);
        } else {
            paragraph = None;
            dom.remove(child);
            blocks.push(child);
        }
    }

    let meaningful: Vec<NodeId> = blocks
        .iter()
        .copied()
        .filter(|b| {
            !is_empty_block(dom, *b) || !dom.is_tag(*b, paragraph_tag) || has_break(dom, *b)
        })
        .collect();
    if meaningful.is_empty() {
        return vec![create_empty_paragraph(dom, paragraph_tag)];
    }
    for block in &meaningful {
        if is_empty_block(dom, *block) && !has_break(dom, *block) {
            let br = create_empty_line_placeholder(dom);
            dom.append_child(*block, br);
        }
    }
    meaningful
}

fn has_break(dom: &Dom, node: NodeId) -> bool {
    dom.first_descendant_tagged(node, tags::BREAK).is_some()
}

/// Moves everything after `last` (in document order) inside `top` into a
/// chain of list copies and returns the outermost copy, or `None` when
/// nothing follows.
fn split_after(dom: &mut Dom, top: NodeId, last: NodeId, markers: &mut Markers) -> Option<NodeId> {
    let mut cur_list = get_list_for_item(dom, last)?;

    let carried = markers.clone_marked(dom, cur_list);
    let holder = markers.clone_marked(dom, last);
    for nested in get_nested_lists(dom, last) {
        dom.append_child(holder, nested);
    }
    if !dom.children(holder).is_empty() {
        dom.append_child(carried, holder);
    }
    move_following_siblings(dom, last, carried);
    let mut carried = carried;

    while cur_list != top {
        let Some(parent_item) = dom.parent(cur_list).filter(|p| tags::is_list_item(dom, *p)) else {
            break;
        };
        let Some(parent_list) = get_list_for_item(dom, parent_item) else {
            break;
        };
        let outer = markers.clone_marked(dom, parent_list);
        let holder = markers.clone_marked(dom, parent_item);
        let carried_items = !list_items(dom, carried).is_empty();
        // Content of the parent item after the split level comes along.
        let mut trailing = Vec::new();
        let mut current = dom.next_sibling(cur_list);
        while let Some(node) = current {
            trailing.push(node);
            current = dom.next_sibling(node);
        }
        if carried_items {
            dom.append_child(holder, carried);
        }
        for node in trailing {
            dom.append_child(holder, node);
        }
        if !dom.children(holder).is_empty() {
            dom.append_child(outer, holder);
        }
        move_following_siblings(dom, parent_item, outer);
        carried = outer;
        cur_list = parent_list;
    }

    if list_items(dom, carried).is_empty() {
        None
    } else {
        Some(carried)
    }
}

fn move_following_siblings(dom: &mut Dom, node: NodeId, target: NodeId) {
    let mut current = dom.next_sibling(node);
    while let Some(sibling) = current {
        current = dom.next_sibling(sibling);
        dom.append_child(target, sibling);
    }
}

/// Lifts the nested lists of a leading, content-less copied item in front of
/// `list`, repeatedly, then joins the lifted lists with their neighbours.
fn flatten_leading_levels(dom: &mut Dom, list: NodeId, markers: &Markers) {
    let mut lifted = Vec::new();
    let mut pending = vec![list];
    while let Some(current) = pending.pop() {
        let Some(first) = list_items(dom, current).first().copied() else {
            continue;
        };
        if !markers.cloned.contains(&first) || has_own_content(dom, first) {
            continue;
        }
        let nested = get_nested_lists(dom, first);
        for sub in &nested {
            dom.insert_before_node(current, *sub);
        }
        dom.remove(first);
        lifted.extend(nested.iter().copied());
        pending.extend(nested.iter().rev().copied());
    }
    if lifted.is_empty() {
        return;
    }
    lifted.push(list);
    for level in lifted {
        join_neighbours(dom, level);
    }
}

fn pad_empty_levels(dom: &mut Dom, list: NodeId, markers: &Markers) {
    let mut pending = vec![list];
    while let Some(current) = pending.pop() {
        for item in list_items(dom, current) {
            if markers.cloned.contains(&item) && !has_own_content(dom, item) {
                let nbsp = dom.create_text(tags::NBSP);
                dom.prepend_child(item, nbsp);
            }
            pending.extend(get_nested_lists(dom, item));
        }
    }
}

fn clean_up_list(dom: &mut Dom, list: NodeId, markers: &Markers) {
    let mut lists = Vec::new();
    let mut pending = vec![list];
    while let Some(current) = pending.pop() {
        lists.push(current);
        for item in list_items(dom, current) {
            pending.extend(get_nested_lists(dom, item));
        }
    }
    // Nested levels come after their ancestors, so walk backwards.
    for current in lists.into_iter().rev() {
        for item in list_items(dom, current) {
            if markers.is_marked(item) && is_item_empty(dom, item) {
                dom.remove(item);
            }
        }
        if list_items(dom, current).is_empty() {
            dom.remove(current);
        }
    }
}

/// Wraps `blocks` into new `list_tag` lists, one per table cell / root
/// boundary, and returns the lists. Existing list items are absorbed with
/// their whole list; the result joins adjacent lists of the same type.
pub fn create_list(
    dom: &mut Dom,
    blocks: &[NodeId],
    list_tag: &str,
    paragraph_tag: &str,
) -> Vec<NodeId> {
    let mut lists: Vec<NodeId> = Vec::new();
    let mut current: Option<(NodeId, NodeId)> = None; // (boundary, list)
    // Cells open a nested group of blocks that is finished before the outer
    // group continues.
    let mut groups = vec![normalize_blocks(dom, blocks).into_iter()];
    while let Some(group) = groups.last_mut() {
        let Some(block) = group.next() else {
            groups.pop();
            continue;
        };
        if tags::is_auxiliary_root(dom, block) {
            ensure_block_structure(dom, block, paragraph_tag);
            let inner: Vec<NodeId> = dom
                .element_children(block)
                .into_iter()
                .filter(|c| tags::is_block(dom, *c))
                .collect();
            groups.push(normalize_blocks(dom, &inner).into_iter());
            current = None;
            continue;
        }

        let boundary = dom
            .closest_by(block, None, tags::is_auxiliary_root)
            .unwrap_or(dom.root());
        let list = match current {
            Some((b, list)) if b == boundary && dom.next_sibling(list) == Some(block) => list,
            _ => {
                let list = dom.create_element(list_tag);
                dom.insert_before_node(block, list);
                lists.push(list);
                current = Some((boundary, list));
                list
            }
        };

        if tags::is_list(dom, block) {
            for item in list_items(dom, block) {
                dom.append_child(list, item);
            }
            dom.remove(block);
            continue;
        }

        let item = dom.create_element(tags::LIST_ITEM);
        dom.append_child(list, item);
        if dom.is_tag(block, paragraph_tag) || dom.is_tag(block, "div") {
            dom.move_children(block, item);
            dom.remove(block);
        } else {
            dom.append_child(item, block);
        }
        if dom.children(item).is_empty() {
            let br = create_empty_line_placeholder(dom);
            dom.append_child(item, br);
        }
    }

    let mut merged = Vec::new();
    for list in lists {
        merged.push(join_neighbours(dom, list));
    }
    tracing::debug!(target: "rte::list", lists = merged.len(), tag = list_tag, "created lists");
    merged
}

fn normalize_blocks(dom: &Dom, blocks: &[NodeId]) -> Vec<NodeId> {
    let mut normalized: Vec<NodeId> = Vec::new();
    for block in blocks {
        let block = match get_item_for_dom(dom, *block) {
            Some(item) => get_top_list_for_item(dom, item).unwrap_or(item),
            None => *block,
        };
        if !normalized.contains(&block) {
            normalized.push(block);
        }
    }
    let normalized: Vec<NodeId> = normalized
        .iter()
        .copied()
        .filter(|b| !normalized.iter().any(|o| o != b && dom.contains(*o, *b)))
        .collect();
    document_order(dom, &normalized)
}

pub fn join_neighbours(dom: &mut Dom, list: NodeId) -> NodeId {
    if !dom.is_attached(list) {
        return list;
    }
    let mut list = list;
    if let Some(previous) = dom.previous_element_sibling(list) {
        if is_same_type(dom, previous, list) {
            dom.move_children(list, previous);
            dom.remove(list);
            list = previous;
        }
    }
    if let Some(next) = dom.next_element_sibling(list) {
        if is_same_type(dom, list, next) {
            dom.move_children(next, list);
            dom.remove(next);
        }
    }
    list
}
