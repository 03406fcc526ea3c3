use serde_json::Value;

use super::{Command, CommandValue, EditContext, ExecDef, PasteValue, ProcessingOptions};
use crate::cleanup::{prepare_html_paste, process_whitespace, to_plain_text};
use crate::config::{EditorConfig, PasteRules};
use crate::dom::{Dom, NodeId};
use crate::dom_processor::{
    ensure_block_structure, get_scoped_block, is_empty_block, remove_duplicate_structures,
    remove_placeholders, split_to_parent,
};
use crate::error::{CommandError, TableError};
use crate::html::parse_fragment_into;
use crate::list_utils::{get_item_for_dom, list_items};
use crate::selection::{Bookmark, Position, ProcessingSelection, cell_for_position, leaf_at};
use crate::table_matrix::TableMatrix;
use crate::tags;
use crate::value::Snapshot;

/// Host hook for `mode: "browser"`: lets the embedding environment run its
/// own paste.
pub trait NativePaste: Send + Sync {
    fn paste(
        &self,
        dom: &mut Dom,
        selection: &ProcessingSelection,
    ) -> Result<Option<Bookmark>, String>;
}

/// Reconciles clipboard content with the document.
#[derive(Default)]
pub struct PasteCommand {
    native: Option<Box<dyn NativePaste>>,
}

impl PasteCommand {
    pub fn with_native(native: impl NativePaste + 'static) -> Self {
        Self {
            native: Some(Box::new(native)),
        }
    }
}

impl Command for PasteCommand {
    fn id(&self) -> &'static str {
        "paste"
    }

    fn is_command(&self, name: &str) -> bool {
        name == "paste"
    }

    fn processing_options(&self) -> ProcessingOptions {
        ProcessingOptions::PROVIDE_BOOKMARK | ProcessingOptions::PROVIDE_SELECTION
    }

    fn execute(
        &self,
        cx: &mut EditContext<'_>,
        def: &mut ExecDef,
    ) -> Result<Option<Value>, CommandError> {
        let value = match &def.value {
            CommandValue::Paste(value) => value.clone(),
            _ => PasteValue::default(),
        };
        tracing::debug!(target: "rte::paste", mode = %value.mode, "execute");

        let result = match value.mode.as_str() {
            "browser" => return self.paste_native(cx.dom, def),
            "plaintext" => {
                let text = match (&value.text, &value.html) {
                    (Some(text), _) => text.clone(),
                    (None, Some(html)) => html_to_text(cx.dom, html),
                    (None, None) => String::new(),
                };
                paste_plain_text(cx.dom, cx.config, def, &text)
            }
            "wordhtml" => {
                let rules = value.paste_rules.as_ref().unwrap_or(&cx.config.paste);
                match (&value.html, &value.text) {
                    (Some(html), _) if value.strip_html_tags => {
                        let fragment = parse_fragment_into(cx.dom, html);
                        prepare_html_paste(cx.dom, fragment, rules);
                        let text = to_plain_text(cx.dom, fragment);
                        paste_plain_text(cx.dom, cx.config, def, &text)
                    }
                    (Some(html), _) => paste_html(cx.dom, cx.config, def, html, rules),
                    (None, Some(text)) => paste_plain_text(cx.dom, cx.config, def, text),
                    (None, None) => Ok(()),
                }
            }
            other => return Err(CommandError::InvalidPasteMode(other.to_string())),
        };

        match result {
            Ok(()) => Ok(None),
            Err(err) if err.is_user_facing() => Err(err),
            Err(err) => {
                tracing::error!(target: "rte::paste", error = %err, "paste failed");
                if def.bookmark.is_none_or(|b| !cx.dom.is_attached(b.start.node)) {
                    def.bookmark = Some(Bookmark::at(cx.dom.root(), 0));
                }
                Ok(None)
            }
        }
    }
}

impl PasteCommand {
    fn paste_native(
        &self,
        dom: &mut Dom,
        def: &mut ExecDef,
    ) -> Result<Option<Value>, CommandError> {
        let Some(native) = &self.native else {
            tracing::warn!(target: "rte::paste", "no native paste available");
            return Err(CommandError::CannotPaste);
        };
        match native.paste(dom, &def.selection) {
            Ok(bookmark) => {
                if bookmark.is_some() {
                    def.bookmark = bookmark;
                }
                Ok(None)
            }
            Err(reason) => {
                tracing::warn!(target: "rte::paste", %reason, "native paste failed");
                Err(CommandError::CannotPaste)
            }
        }
    }
}

fn html_to_text(dom: &mut Dom, html: &str) -> String {
    let fragment = parse_fragment_into(dom, html);
    to_plain_text(dom, fragment)
}

fn caret_anchor(dom: &Dom, selection: &ProcessingSelection) -> NodeId {
    let anchor = leaf_at(dom, selection.start);
    if dom.is_attached(anchor) {
        anchor
    } else {
        dom.root()
    }
}

/// Where to split `block`: the caret when it lies inside, the block start
/// when the block only held placeholders, the block end otherwise.
fn split_position(
    dom: &mut Dom,
    block: NodeId,
    selection: &ProcessingSelection,
    was_empty: bool,
) -> Position {
    if was_empty {
        remove_placeholders(dom, block);
        return Position::new(block, 0);
    }
    if dom.contains(block, selection.start.node) && selection.start.node != block {
        return selection.start;
    }
    if selection.start.node == block && selection.start.offset.is_some() {
        return selection.start;
    }
    Position::new(block, dom.children(block).len())
}

fn fill_lines(dom: &mut Dom, lines: &[&str]) -> Vec<NodeId> {
    let mut nodes = Vec::new();
    for (ix, line) in lines.iter().enumerate() {
        if ix > 0 {
            nodes.push(dom.create_element(tags::BREAK));
        }
        if !line.is_empty() {
            nodes.push(dom.create_text(*line));
        }
    }
    nodes
}

fn prepend_all(dom: &mut Dom, parent: NodeId, nodes: &[NodeId]) {
    let first = dom.first_child(parent);
    for node in nodes {
        dom.insert_before(parent, *node, first);
    }
}

fn ensure_line(dom: &mut Dom, block: NodeId) {
    if dom.children(block).is_empty() {
        let br = dom.create_element(tags::BREAK);
        dom.append_child(block, br);
    }
}

fn caret_after(dom: &Dom, node: NodeId) -> Bookmark {
    if dom.is_text(node) {
        return Bookmark::at_end_of(dom, node);
    }
    match (dom.parent(node), dom.index_in_parent(node)) {
        (Some(parent), Some(ix)) => Bookmark::at(parent, ix + 1),
        _ => Bookmark::at_end_of(dom, node),
    }
}

/// Blank lines separate paragraphs, single line breaks become `<br>`.
/// Inside a list every paragraph becomes its own item.
fn paste_plain_text(
    dom: &mut Dom,
    config: &EditorConfig,
    def: &mut ExecDef,
    text: &str,
) -> Result<(), CommandError> {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let paragraph_tag = config.paragraph_tag.as_str();
    let anchor = caret_anchor(dom, &def.selection);
    let block = get_scoped_block(dom, anchor, paragraph_tag)
        .ok_or_else(|| CommandError::invalid_args("paste", "no block at the caret"))?;

    let paragraphs: Vec<Vec<&str>> = text.split("\n\n").map(|p| p.split('\n').collect()).collect();
    let middle_tag = if tags::is_list_item(dom, block) {
        tags::LIST_ITEM.to_string()
    } else {
        paragraph_tag.to_string()
    };

    let was_empty = is_empty_block(dom, block);
    let position = split_position(dom, block, &def.selection, was_empty);
    let right = split_to_parent(dom, block, position)
        .ok_or_else(|| CommandError::invalid_args("paste", "caret is outside its block"))?;

    let first = fill_lines(dom, &paragraphs[0]);
    for node in &first {
        dom.append_child(block, *node);
    }
    let mut caret = first.last().map(|n| caret_after(dom, *n));

    if paragraphs.len() == 1 {
        dom.move_children(right, block);
        dom.remove(right);
        ensure_line(dom, block);
    } else {
        for lines in &paragraphs[1..paragraphs.len() - 1] {
            let p = dom.create_element(&middle_tag);
            for node in fill_lines(dom, lines) {
                dom.append_child(p, node);
            }
            ensure_line(dom, p);
            dom.insert_before_node(right, p);
            caret = Some(Bookmark::at_end_of(dom, p));
        }
        let last = fill_lines(dom, &paragraphs[paragraphs.len() - 1]);
        prepend_all(dom, right, &last);
        caret = Some(match last.last() {
            Some(node) => caret_after(dom, *node),
            None => Bookmark::at(right, 0),
        });
        ensure_line(dom, block);
        ensure_line(dom, right);
    }

    tracing::debug!(target: "rte::paste", paragraphs = paragraphs.len(), "pasted plain text");
    def.bookmark = Some(caret.unwrap_or_else(|| Bookmark::at(block, 0)));
    Ok(())
}

fn paste_html(
    dom: &mut Dom,
    config: &EditorConfig,
    def: &mut ExecDef,
    html: &str,
    rules: &PasteRules,
) -> Result<(), CommandError> {
    let fragment = parse_fragment_into(dom, html);
    prepare_html_paste(dom, fragment, rules);
    process_whitespace(dom, fragment);
    if dom.children(fragment).is_empty() {
        tracing::debug!(target: "rte::paste", "nothing left to paste after cleanup");
        return Ok(());
    }

    let cells: Vec<NodeId> = match def.selection.selected_cells() {
        [] => cell_for_position(dom, def.selection.start).into_iter().collect(),
        cells => cells.to_vec(),
    };
    let pasted_tables: Vec<NodeId> = dom
        .element_children(fragment)
        .into_iter()
        .filter(|n| tags::is_table(dom, *n))
        .collect();
    let only_table = dom
        .children(fragment)
        .iter()
        .all(|n| tags::is_table(dom, *n) || tags::is_placeholder(dom, *n));

    if !cells.is_empty() && pasted_tables.len() == 1 && only_table {
        return paste_table_to_table(dom, def, pasted_tables[0], &cells);
    }
    let bookmark = insert_html(dom, config, def, fragment)?;
    def.bookmark = Some(bookmark);
    Ok(())
}

/// Grid-level merge of a pasted table. The document is restored on failure.
fn paste_table_to_table(
    dom: &mut Dom,
    def: &mut ExecDef,
    pasted: NodeId,
    cells: &[NodeId],
) -> Result<(), CommandError> {
    let snapshot = Snapshot::capture(dom);
    match merge_pasted_table(dom, pasted, cells) {
        Ok(bookmark) => {
            def.bookmark = Some(bookmark);
            Ok(())
        }
        Err(err) => {
            snapshot.restore(dom);
            tracing::warn!(target: "rte::paste", error = %err, "table paste rolled back");
            Err(err)
        }
    }
}

fn merge_pasted_table(
    dom: &mut Dom,
    pasted: NodeId,
    cells: &[NodeId],
) -> Result<Bookmark, CommandError> {
    let table = dom
        .closest(cells[0], tags::TABLE, None)
        .ok_or(TableError::NotATable)?;
    let matrix = TableMatrix::new(dom, table)?;
    let pasted_matrix = TableMatrix::new(dom, pasted)?;
    let pasted_size = pasted_matrix.get_table_size();
    if pasted_size.rows == 0 || pasted_size.cols == 0 {
        return Ok(Bookmark::at_start_of(dom, cells[0]));
    }

    if cells.len() > 1 {
        let props = matrix
            .create_selection(cells)
            .ok_or(TableError::InvalidStructure)?;
        if !props.is_rect {
            return Err(CommandError::NonRectangularSelection);
        }
        let merged =
            matrix.merge_to_single_cell(dom, props.min_col, props.min_row, props.cols, props.rows)?;
        TableMatrix::optimize_spans(dom, table)?;
        for child in dom.children(merged).to_vec() {
            dom.remove(child);
        }
        dom.append_child(merged, pasted);
        tracing::debug!(
            target: "rte::paste",
            cols = props.cols,
            rows = props.rows,
            "nested pasted table"
        );
        return Ok(Bookmark::at_start_of(dom, pasted));
    }

    let dest = *matrix
        .get_cell_def(cells[0])
        .ok_or(TableError::InvalidStructure)?;
    let size = matrix.get_table_size();
    let extra_cols = (dest.col + pasted_size.cols).saturating_sub(size.cols);
    let extra_rows = (dest.row + pasted_size.rows).saturating_sub(size.rows);
    let matrix = if extra_cols > 0 || extra_rows > 0 {
        matrix.extend_by(dom, extra_cols, extra_rows)?
    } else {
        matrix
    };

    let placeholder =
        matrix.merge_to_single_cell(dom, dest.col, dest.row, pasted_size.cols, pasted_size.rows)?;
    let matrix = TableMatrix::new(dom, table)?;
    let last_col = dest.col + pasted_size.cols - 1;
    let mut transplanted = Vec::new();
    for i in 0..pasted_size.rows {
        let row = dest.row + i;
        let tr = matrix.get_row_dom(row).ok_or(TableError::InvalidStructure)?;
        let anchor = matrix.get_follow_up_cell(last_col, row).map(|d| d.cell);
        for cell in pasted_matrix.get_row(i) {
            dom.insert_before(tr, cell.cell, anchor);
            transplanted.push(cell.cell);
        }
    }
    dom.remove(placeholder);
    TableMatrix::optimize_spans(dom, table)?;
    tracing::debug!(
        target: "rte::paste",
        col = dest.col,
        row = dest.row,
        cols = pasted_size.cols,
        rows = pasted_size.rows,
        extra_cols,
        extra_rows,
        "merged pasted table"
    );
    Ok(match transplanted.last() {
        Some(cell) => Bookmark::at_end_of(dom, *cell),
        None => Bookmark::structural(table),
    })
}

fn to_list_items(dom: &mut Dom, blocks: Vec<NodeId>) -> Vec<NodeId> {
    let mut items = Vec::new();
    for block in blocks {
        if tags::is_list(dom, block) {
            items.extend(list_items(dom, block));
        } else if tags::is_list_item(dom, block) {
            items.push(block);
        } else if tags::is_edit_block(dom, block) {
            dom.set_tag(block, tags::LIST_ITEM);
            items.push(block);
        } else {
            let item = dom.create_element(tags::LIST_ITEM);
            dom.append_child(item, block);
            items.push(item);
        }
    }
    items
}

/// Generic block paste: the first and last pasted blocks merge into the text
/// around the caret, the blocks in between become siblings. Tables and lists
/// are always inserted whole.
fn insert_html(
    dom: &mut Dom,
    config: &EditorConfig,
    def: &ExecDef,
    fragment: NodeId,
) -> Result<Bookmark, CommandError> {
    let paragraph_tag = config.paragraph_tag.as_str();
    ensure_block_structure(dom, fragment, paragraph_tag);

    let anchor = caret_anchor(dom, &def.selection);
    let block = get_scoped_block(dom, anchor, paragraph_tag)
        .ok_or_else(|| CommandError::invalid_args("paste", "no block at the caret"))?;
    let in_list = get_item_for_dom(dom, block).is_some();

    let mut pasted: Vec<NodeId> = dom
        .children(fragment)
        .iter()
        .copied()
        .filter(|n| !dom.is_text(*n))
        .collect();
    if in_list {
        pasted = to_list_items(dom, pasted);
    }
    let Some(&first) = pasted.first() else {
        return Ok(Bookmark::from_selection(&def.selection));
    };
    let last = pasted[pasted.len() - 1];

    let was_empty = is_empty_block(dom, block);
    let position = split_position(dom, block, &def.selection, was_empty);
    let scope = dom.parent(block).unwrap_or(dom.root());
    let right = split_to_parent(dom, block, position)
        .ok_or_else(|| CommandError::invalid_args("paste", "caret is outside its block"))?;

    let mut bookmark = None;
    for (ix, node) in pasted.iter().copied().enumerate() {
        let atomic = tags::is_atomic(dom, node);
        if node == first && !atomic {
            let children = dom.children(node).to_vec();
            for child in &children {
                dom.append_child(block, *child);
            }
            bookmark = children.last().map(|c| caret_after(dom, *c));
            if pasted.len() == 1 {
                dom.move_children(right, block);
                dom.remove(right);
            }
            continue;
        }
        if node == last && ix > 0 && !atomic && !was_empty {
            let children = dom.children(node).to_vec();
            prepend_all(dom, right, &children);
            bookmark = Some(match children.last() {
                Some(child) => caret_after(dom, *child),
                None => Bookmark::at(right, 0),
            });
            continue;
        }
        dom.insert_before_node(right, node);
        bookmark = Some(Bookmark::at_end_of(dom, node));
    }

    for half in [block, right] {
        if dom.is_attached(half) && is_empty_block(dom, half) && dom.children(scope).len() > 1 {
            dom.remove(half);
        }
    }
    if dom.is_attached(block) {
        ensure_line(dom, block);
    }

    let mut bookmark = bookmark.unwrap_or_else(|| Bookmark::from_selection(&def.selection));
    remove_duplicate_structures(dom, scope, &mut bookmark);
    tracing::debug!(target: "rte::paste", blocks = pasted.len(), in_list, "inserted html");
    Ok(bookmark)
}
