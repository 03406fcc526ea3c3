//! Clean-up of pasted markup before it is merged into the document.

use crate::config::PasteRules;
use crate::dom::{Dom, NodeId};
use crate::tags;

/// Applies `rules` to everything below `container`: removed tags go away with
/// their content, stripped tags are replaced by their children, local file
/// images are dropped and the configured attributes are cleared.
pub fn prepare_html_paste(dom: &mut Dom, container: NodeId, rules: &PasteRules) {
    let mut removed = 0usize;
    let mut unwrapped = 0usize;
    for node in dom.descendants(container).into_iter().rev() {
        let Some(tag) = dom.tag(node).map(str::to_ascii_lowercase) else {
            continue;
        };
        if rules.remove_tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
            dom.remove(node);
            removed += 1;
            continue;
        }
        if tag == "img" && !rules.allow_file_images && is_local_file(dom.attr(node, "src")) {
            dom.remove(node);
            removed += 1;
            continue;
        }
        for name in &rules.strip_attributes {
            dom.remove_attr(node, name);
        }
        if rules.strip_tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
            dom.unwrap_node(node);
            unwrapped += 1;
        }
    }
    tracing::debug!(target: "rte::paste", removed, unwrapped, "prepared pasted markup");
}

fn is_local_file(src: Option<&str>) -> bool {
    src.is_some_and(|s| s.trim_start().to_ascii_lowercase().starts_with("file:"))
}

/// Collapses whitespace runs outside `pre` and drops blank text between
/// blocks or at the edges of a block.
pub fn process_whitespace(dom: &mut Dom, container: NodeId) {
    for node in dom.descendants(container) {
        let Some(text) = dom.text(node) else {
            continue;
        };
        if dom.closest(node, "pre", Some(container)).is_some() {
            continue;
        }
        let collapsed = collapse_whitespace(text);
        if collapsed != text {
            dom.set_text(node, collapsed);
        }
    }

    for node in dom.descendants(container).into_iter().rev() {
        let Some(text) = dom.text(node) else {
            continue;
        };
        if !text.chars().all(|c| c.is_ascii_whitespace()) {
            continue;
        }
        let Some(parent) = dom.parent(node) else {
            continue;
        };
        let parent_is_block = parent == container || tags::is_block(dom, parent);
        let previous_block = dom.previous_sibling(node).is_none_or(|s| tags::is_block(dom, s));
        let next_block = dom.next_sibling(node).is_none_or(|s| tags::is_block(dom, s));
        if parent_is_block && previous_block && next_block {
            dom.remove(node);
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Plain text of `container`: blocks are separated by a blank line, `<br>`
/// becomes a line break.
pub fn to_plain_text(dom: &Dom, container: NodeId) -> String {
    let mut out = String::new();
    write_plain_text(dom, container, &mut out);
    out.trim_matches('\n').to_string()
}

enum PlainStep {
    Node(NodeId),
    CellEnd,
}

fn write_plain_text(dom: &Dom, node: NodeId, out: &mut String) {
    let mut stack: Vec<PlainStep> = dom
        .children(node)
        .iter()
        .rev()
        .map(|c| PlainStep::Node(*c))
        .collect();
    while let Some(step) = stack.pop() {
        let child = match step {
            PlainStep::Node(child) => child,
            PlainStep::CellEnd => {
                out.push('\t');
                continue;
            }
        };
        if let Some(text) = dom.text(child) {
            out.push_str(&text.replace('\u{a0}', " "));
            continue;
        }
        if dom.is_tag(child, tags::BREAK) {
            out.push('\n');
            continue;
        }
        let block = tags::is_block(dom, child) && !tags::is_cell(dom, child);
        if block && !out.is_empty() && !out.ends_with("\n\n") {
            out.push_str(if out.ends_with('\n') { "\n" } else { "\n\n" });
        }
        if tags::is_cell(dom, child) {
            stack.push(PlainStep::CellEnd);
        }
        stack.extend(dom.children(child).iter().rev().map(|c| PlainStep::Node(*c)));
    }
}
