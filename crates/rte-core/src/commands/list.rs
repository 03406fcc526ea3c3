use serde_json::Value;

use super::{Command, CommandValue, EditContext, ExecDef, ProcessingOptions};
use crate::dom::{Dom, NodeId};
use crate::dom_processor::{change_container_tag, get_scoped_block};
use crate::error::CommandError;
use crate::list_utils::{
    create_list, get_item_for_dom, get_list_for_item, indent_items, is_first_list_item,
    join_neighbours, outdent_items, unlist_items,
};
use crate::selection::{Bookmark, NodeList, ProcessingSelection, leaf_at};
use crate::tags;

const COMMANDS: &[&str] = &["insertunorderedlist", "insertorderedlist", "indent", "outdent"];

/// List creation, removal, retyping and nesting.
pub struct ListCommand;

impl Command for ListCommand {
    fn id(&self) -> &'static str {
        "list"
    }

    fn is_command(&self, name: &str) -> bool {
        COMMANDS.contains(&name)
    }

    fn execute(
        &self,
        cx: &mut EditContext<'_>,
        def: &mut ExecDef,
    ) -> Result<Option<Value>, CommandError> {
        let keep_structure = match &def.value {
            CommandValue::List(value) => value.keep_structure,
            _ => None,
        }
        .unwrap_or(cx.config.list.keep_structure);
        let paragraph_tag = cx.config.paragraph_tag.as_str();
        let blocks = selected_blocks(cx.dom, def, paragraph_tag);
        let command = def.command.clone();
        tracing::debug!(
            target: "rte::list",
            %command,
            blocks = blocks.len(),
            keep_structure,
            "execute"
        );

        let created = match command.as_str() {
            "insertunorderedlist" | "insertorderedlist" => {
                let list_tag = if command == "insertorderedlist" {
                    tags::ORDERED_LIST
                } else {
                    tags::UNORDERED_LIST
                };
                toggle_list(cx.dom, &blocks, list_tag, keep_structure, paragraph_tag)
            }
            "indent" => {
                let items = items_for(cx.dom, &blocks);
                if items.is_empty() {
                    tracing::warn!(target: "rte::list", "indent outside of a list");
                    return Ok(None);
                }
                indent_items(cx.dom, &items);
                Vec::new()
            }
            "outdent" => {
                let items = items_for(cx.dom, &blocks);
                if items.is_empty() {
                    tracing::warn!(target: "rte::list", "outdent outside of a list");
                    return Ok(None);
                }
                outdent_items(cx.dom, &items, keep_structure, paragraph_tag)
            }
            other => return Err(CommandError::UnknownCommand(other.to_string())),
        };

        def.bookmark = Some(settle_bookmark(cx.dom, &def.selection, created.first().copied()));
        Ok(None)
    }

    fn query_state(
        &self,
        dom: &Dom,
        selection: &ProcessingSelection,
        _node_list: &NodeList,
        name: &str,
    ) -> Option<Value> {
        let item = get_item_for_dom(dom, leaf_at(dom, selection.start));
        let list = item.and_then(|i| get_list_for_item(dom, i));
        let state = match name {
            "insertunorderedlist" => list.is_some_and(|l| dom.is_tag(l, tags::UNORDERED_LIST)),
            "insertorderedlist" => list.is_some_and(|l| dom.is_tag(l, tags::ORDERED_LIST)),
            "indent" => item.is_some_and(|i| !is_first_list_item(dom, i)),
            "outdent" => item.is_some(),
            _ => return None,
        };
        Some(Value::Bool(state))
    }
}

/// Edit blocks touched by the node list, in order; loose inline content of
/// the root or a cell is wrapped into a paragraph first.
fn selected_blocks(dom: &mut Dom, def: &ExecDef, paragraph_tag: &str) -> Vec<NodeId> {
    let mut nodes: Vec<NodeId> = def.node_list.nodes.clone();
    if nodes.is_empty() {
        nodes.push(leaf_at(dom, def.selection.start));
    }
    let mut blocks = Vec::new();
    for node in nodes {
        if !dom.is_attached(node) {
            continue;
        }
        if let Some(block) = get_scoped_block(dom, node, paragraph_tag) {
            if !blocks.contains(&block) {
                blocks.push(block);
            }
        }
    }
    blocks
}

fn items_for(dom: &Dom, blocks: &[NodeId]) -> Vec<NodeId> {
    let mut items = Vec::new();
    for block in blocks {
        if let Some(item) = get_item_for_dom(dom, *block) {
            if !items.contains(&item) {
                items.push(item);
            }
        }
    }
    items
}

/// Creates a list, removes it when every block already sits in a list of
/// that type, or retypes lists of the other type.
fn toggle_list(
    dom: &mut Dom,
    blocks: &[NodeId],
    list_tag: &str,
    keep_structure: bool,
    paragraph_tag: &str,
) -> Vec<NodeId> {
    if blocks.is_empty() {
        return Vec::new();
    }
    let all_listed = blocks.iter().all(|b| get_item_for_dom(dom, *b).is_some());
    if !all_listed {
        return create_list(dom, blocks, list_tag, paragraph_tag);
    }

    let items = items_for(dom, blocks);
    let mut lists: Vec<NodeId> = Vec::new();
    for item in &items {
        if let Some(list) = get_list_for_item(dom, *item) {
            if !lists.contains(&list) {
                lists.push(list);
            }
        }
    }
    if lists.iter().all(|l| dom.is_tag(*l, list_tag)) {
        return unlist_items(dom, &items, keep_structure, paragraph_tag);
    }

    for list in &lists {
        if !dom.is_tag(*list, list_tag) {
            change_container_tag(dom, *list, list_tag);
            join_neighbours(dom, *list);
        }
    }
    tracing::debug!(target: "rte::list", lists = lists.len(), tag = list_tag, "retyped lists");
    Vec::new()
}

/// Keeps the caret where it was when its node survived, otherwise moves it
/// to the start of `fallback`.
fn settle_bookmark(
    dom: &Dom,
    selection: &ProcessingSelection,
    fallback: Option<NodeId>,
) -> Bookmark {
    let start = selection.start;
    if dom.is_attached(start.node) {
        return Bookmark::from_selection(selection);
    }
    match fallback {
        Some(node) => Bookmark::at_start_of(dom, node),
        None => Bookmark::at(dom.root(), 0),
    }
}
