use serde_json::{Value, json};

use super::{
    ApplyTo, CaretPlacement, Command, CommandValue, CreateTableValue, EditContext, ExecDef,
    InsertValue, MergeCellsValue, ModifyCellValue, ProcessingOptions, Side, SplitDirection,
    TableAttrsValue,
};
use crate::config::EditorConfig;
use crate::dom::{Dom, NodeId};
use crate::dom_processor::{
    create_empty_line_placeholder, create_empty_paragraph, get_scoped_block, insert_paragraph,
    is_empty_block, split_to_parent,
};
use crate::error::CommandError;
use crate::html::parse_fragment_into;
use crate::selection::{Bookmark, NodeList, ProcessingSelection, cell_for_position, leaf_at};
use crate::table_matrix::{COLSPAN, CellDef, ROWSPAN, TableMatrix, create_empty_cell};
use crate::tags;

const COMMANDS: &[&str] = &[
    "table",
    "createtable",
    "modifytable",
    "removetable",
    "insertrow",
    "removerow",
    "insertcolumn",
    "removecolumn",
    "mergecells",
    "splitcell",
    "modifycell",
    "ensureparagraph",
];

pub struct TableCommand;

impl Command for TableCommand {
    fn id(&self) -> &'static str {
        "table"
    }

    fn is_command(&self, name: &str) -> bool {
        COMMANDS.contains(&name)
    }

    fn processing_options(&self) -> ProcessingOptions {
        ProcessingOptions::PROVIDE_BOOKMARK
            | ProcessingOptions::PROVIDE_SELECTION
            | ProcessingOptions::PROVIDE_NODE_LIST
    }

    fn execute(
        &self,
        cx: &mut EditContext<'_>,
        def: &mut ExecDef,
    ) -> Result<Option<Value>, CommandError> {
        let command = def.command.clone();
        tracing::debug!(target: "rte::table", %command, "execute");
        match (command.as_str(), def.value.clone()) {
            ("createtable", CommandValue::CreateTable(value)) => create_table(cx, def, &value),
            ("createtable", _) => create_table(cx, def, &CreateTableValue::default()),
            ("modifytable", CommandValue::ModifyTable(value)) => modify_table(cx.dom, def, &value),
            ("removetable", _) => {
                let Some(table) = locate_table(cx.dom, &def.selection) else {
                    return guarded(&command, "selection is not inside a table");
                };
                def.bookmark = Some(remove_table(cx.dom, cx.config, table));
                Ok(None)
            }
            ("insertrow", CommandValue::Insert(value)) => insert_row(cx.dom, def, value),
            ("insertrow", _) => insert_row(cx.dom, def, InsertValue::default()),
            ("removerow", _) => remove_rows(cx.dom, cx.config, def),
            ("insertcolumn", CommandValue::Insert(value)) => insert_column(cx.dom, def, value),
            ("insertcolumn", _) => insert_column(cx.dom, def, InsertValue::default()),
            ("removecolumn", _) => remove_columns(cx.dom, cx.config, def),
            ("modifycell", CommandValue::ModifyCell(value)) => modify_cell(cx.dom, def, &value),
            ("mergecells", CommandValue::MergeCells(value)) => merge_cells(cx.dom, def, &value),
            ("mergecells", _) => merge_cells(cx.dom, def, &MergeCellsValue::default()),
            ("splitcell", CommandValue::SplitCell(direction)) => split_cell(cx.dom, def, direction),
            ("ensureparagraph", CommandValue::EnsureParagraph(side)) => {
                ensure_paragraph(cx.dom, cx.config, def, side)
            }
            ("ensureparagraph", _) => ensure_paragraph(cx.dom, cx.config, def, Side::Before),
            (name, value) => Err(CommandError::invalid_args(
                name,
                format!("unsupported value {value:?}"),
            )),
        }
    }

    fn query_state(
        &self,
        dom: &Dom,
        selection: &ProcessingSelection,
        _node_list: &NodeList,
        name: &str,
    ) -> Option<Value> {
        let table = locate_table(dom, selection);
        let cells = selected_cells(dom, selection);
        Some(match name {
            "table" => match table.and_then(|t| TableMatrix::new(dom, t).ok()) {
                Some(matrix) => {
                    let size = matrix.get_table_size();
                    let cell = cells.first().and_then(|c| matrix.get_cell_def(*c));
                    json!({
                        "inTable": true,
                        "rows": size.rows,
                        "cols": size.cols,
                        "cell": cell,
                    })
                }
                None => json!({ "inTable": table.is_some() }),
            },
            "mergecells" => {
                let mergeable = cells.len() > 1
                    && table
                        .and_then(|t| TableMatrix::new(dom, t).ok())
                        .and_then(|m| m.create_selection(&cells))
                        .is_some_and(|props| props.is_rect);
                Value::Bool(mergeable)
            }
            "splitcell" => Value::Bool(cells.len() == 1),
            "createtable" => Value::Bool(true),
            _ => Value::Bool(table.is_some()),
        })
    }
}

fn guarded(command: &str, reason: &str) -> Result<Option<Value>, CommandError> {
    tracing::warn!(target: "rte::table", command, reason, "guarded no-op");
    Ok(None)
}

fn selected_cells(dom: &Dom, selection: &ProcessingSelection) -> Vec<NodeId> {
    let cells = selection.selected_cells();
    if !cells.is_empty() {
        return cells.to_vec();
    }
    cell_for_position(dom, selection.start).into_iter().collect()
}

fn locate_table(dom: &Dom, selection: &ProcessingSelection) -> Option<NodeId> {
    let from = selected_cells(dom, selection)
        .first()
        .copied()
        .unwrap_or_else(|| leaf_at(dom, selection.start));
    dom.closest(from, tags::TABLE, None)
}

fn locate(
    dom: &Dom,
    def: &ExecDef,
) -> Result<Option<(NodeId, TableMatrix, Vec<CellDef>)>, CommandError> {
    let cells = selected_cells(dom, &def.selection);
    let Some(table) = locate_table(dom, &def.selection) else {
        return Ok(None);
    };
    let matrix = TableMatrix::new(dom, table)?;
    let defs: Vec<CellDef> = cells
        .iter()
        .filter_map(|c| matrix.get_cell_def(*c).copied())
        .collect();
    if defs.is_empty() {
        return Ok(None);
    }
    Ok(Some((table, matrix, defs)))
}

fn set_optional(dom: &mut Dom, node: NodeId, name: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        dom.set_attr(node, name, value);
    }
}

/// `Some("")` clears the attribute, `None` leaves it alone.
fn apply_attr(dom: &mut Dom, node: NodeId, name: &str, value: Option<&str>) {
    match value {
        Some("") => {
            dom.remove_attr(node, name);
        }
        Some(value) => dom.set_attr(node, name, value),
        None => {}
    }
}

fn create_table(
    cx: &mut EditContext<'_>,
    def: &mut ExecDef,
    value: &CreateTableValue,
) -> Result<Option<Value>, CommandError> {
    let blocks = match &value.html {
        Some(html) => {
            let container = parse_fragment_into(cx.dom, html);
            let blocks = cx.dom.children(container).to_vec();
            if blocks.is_empty() {
                return Err(CommandError::invalid_args("createtable", "empty html"));
            }
            blocks
        }
        None => vec![build_table(cx.dom, cx.config, value)],
    };
    insert_blocks_at_caret(cx.dom, cx.config, &def.selection, &blocks);

    let table = blocks
        .iter()
        .copied()
        .find(|b| tags::is_table(cx.dom, *b))
        .or_else(|| blocks.iter().find_map(|b| cx.dom.first_descendant_tagged(*b, tags::TABLE)));
    let Some(table) = table else {
        def.bookmark = blocks.last().map(|b| Bookmark::at_end_of(cx.dom, *b));
        return Ok(None);
    };

    let root = cx.dom.root();
    if cx.config.table.trailing_paragraph
        && cx.dom.parent(table) == Some(root)
        && cx.dom.next_element_sibling(table).is_none()
    {
        insert_paragraph(cx.dom, table, true, &cx.config.paragraph_tag);
    }

    let first_cell = TableMatrix::new(cx.dom, table)
        .ok()
        .and_then(|m| m.get_cell_for_coords(0, 0).map(|d| d.cell));
    def.bookmark = Some(match first_cell {
        Some(cell) => Bookmark::at_start_of(cx.dom, cell),
        None => Bookmark::structural(table),
    });
    tracing::debug!(target: "rte::table", ?table, "created table");
    Ok(Some(json!({ "table": table })))
}

fn build_table(dom: &mut Dom, config: &EditorConfig, value: &CreateTableValue) -> NodeId {
    let rows = value.rows.unwrap_or(2).clamp(1, config.table.max_rows);
    let cols = value.columns.unwrap_or(2).clamp(1, config.table.max_cols);
    let header = value
        .header
        .clone()
        .unwrap_or_else(|| config.table.header.clone());
    let header_top = header.split_whitespace().any(|h| h == "top");
    let header_left = header.split_whitespace().any(|h| h == "left");

    let table = dom.create_element(tags::TABLE);
    set_optional(dom, table, "border", value.border.as_deref().or(config.table.border.as_deref()));
    set_optional(
        dom,
        table,
        "cellpadding",
        value.cellpadding.as_deref().or(config.table.cellpadding.as_deref()),
    );
    set_optional(
        dom,
        table,
        "cellspacing",
        value.cellspacing.as_deref().or(config.table.cellspacing.as_deref()),
    );
    set_optional(dom, table, "width", value.width.as_deref());
    set_optional(dom, table, "height", value.height.as_deref());
    set_optional(dom, table, "class", value.table_style.as_deref());

    let tbody = dom.create_element("tbody");
    dom.append_child(table, tbody);
    for r in 0..rows {
        let tr = dom.create_element(tags::ROW);
        for c in 0..cols {
            let tag = if (header_top && r == 0) || (header_left && c == 0) {
                tags::HEADER_CELL
            } else {
                tags::DATA_CELL
            };
            let cell = create_empty_cell(dom, tag);
            dom.append_child(tr, cell);
        }
        dom.append_child(tbody, tr);
    }
    table
}

/// Places `blocks` at the caret: an empty block is replaced, a block with
/// content is split around the caret.
pub(crate) fn insert_blocks_at_caret(
    dom: &mut Dom,
    config: &EditorConfig,
    selection: &ProcessingSelection,
    blocks: &[NodeId],
) {
    let Some(&first) = blocks.first() else {
        return;
    };
    let mut anchor = leaf_at(dom, selection.start);
    if !dom.is_attached(anchor) {
        anchor = dom.root();
    }
    let Some(target) = get_scoped_block(dom, anchor, &config.paragraph_tag) else {
        let root = dom.root();
        for block in blocks {
            dom.append_child(root, *block);
        }
        return;
    };

    if tags::is_list_item(dom, target) {
        for block in blocks {
            dom.append_child(target, *block);
        }
        return;
    }

    if is_empty_block(dom, target) {
        dom.replace(target, first);
    } else {
        let right = split_to_parent(dom, target, selection.start);
        dom.insert_after(target, first);
        if is_empty_block(dom, target) {
            dom.remove(target);
        }
        if let Some(right) = right {
            if is_empty_block(dom, right) {
                dom.remove(right);
            }
        }
    }
    let mut previous = first;
    for block in &blocks[1..] {
        dom.insert_after(previous, *block);
        previous = *block;
    }
}

fn modify_table(
    dom: &mut Dom,
    def: &mut ExecDef,
    value: &TableAttrsValue,
) -> Result<Option<Value>, CommandError> {
    let Some(table) = locate_table(dom, &def.selection) else {
        return guarded("modifytable", "selection is not inside a table");
    };
    apply_attr(dom, table, "border", value.border.as_deref());
    apply_attr(dom, table, "cellpadding", value.cellpadding.as_deref());
    apply_attr(dom, table, "cellspacing", value.cellspacing.as_deref());
    apply_attr(dom, table, "width", value.width.as_deref());
    apply_attr(dom, table, "height", value.height.as_deref());
    apply_attr(dom, table, "class", value.table_style.as_deref());
    Ok(None)
}

/// Detaches `table`; the document and a surrounding cell are never left
/// without a line to put the caret on.
pub(crate) fn remove_table(dom: &mut Dom, config: &EditorConfig, table: NodeId) -> Bookmark {
    let parent = dom.parent(table);
    let next = dom.next_element_sibling(table);
    let previous = dom.previous_element_sibling(table);
    dom.remove(table);
    tracing::debug!(target: "rte::table", ?table, "removed table");

    let root = dom.root();
    match parent {
        Some(parent) if parent == root => {
            let leftovers = dom.children(root).to_vec();
            if leftovers.iter().all(|c| tags::is_placeholder(dom, *c)) {
                for child in leftovers {
                    dom.remove(child);
                }
                let p = create_empty_paragraph(dom, &config.paragraph_tag);
                dom.append_child(root, p);
                return Bookmark::at(p, 0);
            }
        }
        Some(parent) if tags::is_cell(dom, parent) && is_empty_block(dom, parent) => {
            for child in dom.children(parent).to_vec() {
                dom.remove(child);
            }
            let br = create_empty_line_placeholder(dom);
            dom.append_child(parent, br);
            return Bookmark::at(parent, 0);
        }
        _ => {}
    }
    if let Some(next) = next {
        Bookmark::at_start_of(dom, next)
    } else if let Some(previous) = previous {
        Bookmark::at_end_of(dom, previous)
    } else {
        Bookmark::at(parent.unwrap_or(root), 0)
    }
}

fn caret_in(dom: &Dom, cell: Option<NodeId>, fallback: NodeId) -> Bookmark {
    match cell {
        Some(cell) => Bookmark::at_start_of(dom, cell),
        None => Bookmark::structural(fallback),
    }
}

fn insert_row(
    dom: &mut Dom,
    def: &mut ExecDef,
    value: InsertValue,
) -> Result<Option<Value>, CommandError> {
    let Some((table, matrix, defs)) = locate(dom, def)? else {
        return guarded("insertrow", "selection is not inside a table");
    };
    let reference = defs[0];
    if defs
        .iter()
        .any(|d| d.row != reference.row || d.row_span != reference.row_span)
    {
        return guarded("insertrow", "selection covers more than one row");
    }

    let size = matrix.get_table_size();
    let ref_row = match value.position {
        Side::Before => reference.row,
        Side::After => reference.last_row(),
    };
    let ins = match value.position {
        Side::Before => ref_row,
        Side::After => ref_row + 1,
    };
    let Some(ref_tr) = matrix.get_row_dom(ref_row) else {
        return guarded("insertrow", "reference row is missing");
    };

    let tr = dom.create_element(tags::ROW);
    let mut new_cells: Vec<(usize, NodeId)> = Vec::new();
    let mut grown: Vec<NodeId> = Vec::new();
    let mut col = 0;
    while col < size.cols {
        let Some(current) = matrix.get_cell_for_coords(col, ref_row).copied() else {
            break;
        };
        let spans_boundary =
            ins > 0 && ins < size.rows && current.row < ins && current.last_row() >= ins;
        if spans_boundary {
            if !grown.contains(&current.cell) {
                dom.set_span_attr(current.cell, ROWSPAN, current.row_span + 1);
                grown.push(current.cell);
            }
            col = current.col + current.col_span;
            continue;
        }
        let tag = dom.tag(current.cell).unwrap_or(tags::DATA_CELL).to_string();
        let cell = create_empty_cell(dom, &tag);
        dom.append_child(tr, cell);
        new_cells.push((col, cell));
        col += 1;
    }

    match value.position {
        Side::Before => dom.insert_before_node(ref_tr, tr),
        Side::After => dom.insert_after(ref_tr, tr),
    }
    tracing::debug!(
        target: "rte::table",
        row = ins,
        cells = new_cells.len(),
        grown = grown.len(),
        "inserted row"
    );

    let target = match value.caret_position {
        CaretPlacement::FirstCell => new_cells.first().map(|(_, c)| *c),
        CaretPlacement::Aligned => new_cells
            .iter()
            .find(|(c, _)| *c == reference.col)
            .or(new_cells.first())
            .map(|(_, c)| *c),
    };
    def.bookmark = Some(caret_in(dom, target.or(Some(reference.cell)), table));
    Ok(None)
}

fn remove_rows(
    dom: &mut Dom,
    config: &EditorConfig,
    def: &mut ExecDef,
) -> Result<Option<Value>, CommandError> {
    let Some((table, matrix, defs)) = locate(dom, def)? else {
        return guarded("removerow", "selection is not inside a table");
    };
    let mut rows: Vec<usize> = defs.iter().map(|d| d.row).collect();
    rows.sort_unstable();
    rows.dedup();
    let top = rows[0];
    let caret_col = defs[0].col;

    if rows.len() >= matrix.get_table_size().rows {
        def.bookmark = Some(remove_table(dom, config, table));
        return Ok(None);
    }

    let mut survivor = None;
    for row in rows.iter().rev().copied() {
        let matrix = TableMatrix::new(dom, table)?;
        if matrix.get_table_size().rows <= 1 {
            def.bookmark = Some(remove_table(dom, config, table));
            return Ok(None);
        }
        let kept = remove_single_row(dom, &matrix, row);
        if row == top {
            survivor = kept.iter().find(|d| d.covers(caret_col, top)).map(|d| d.cell);
        }
        TableMatrix::optimize_spans(dom, table)?;
    }

    let matrix = TableMatrix::new(dom, table)?;
    let target = survivor
        .or_else(|| matrix.get_cell_for_coords(caret_col, top).map(|d| d.cell))
        .or_else(|| {
            top.checked_sub(1)
                .and_then(|r| matrix.get_cell_for_coords(caret_col, r))
                .map(|d| d.cell)
        });
    def.bookmark = Some(caret_in(dom, target, table));
    Ok(None)
}

/// Removes one grid row. Cells starting in it that span further down move
/// into the next row; cells reaching into it from above get shorter. The
/// cells that survive are returned.
fn remove_single_row(dom: &mut Dom, matrix: &TableMatrix, row: usize) -> Vec<CellDef> {
    let mut kept = Vec::new();
    let next_tr = matrix.get_row_dom(row + 1);
    for def in matrix.cells_covering_row(row) {
        if def.row_span == 1 {
            dom.remove(def.cell);
            continue;
        }
        dom.set_span_attr(def.cell, ROWSPAN, def.row_span - 1);
        if def.row == row {
            if let Some(next_tr) = next_tr {
                let anchor = matrix.get_follow_up_cell(def.col, row + 1).map(|d| d.cell);
                dom.insert_before(next_tr, def.cell, anchor);
            }
        }
        kept.push(*def);
    }
    if let Some(tr) = matrix.get_row_dom(row) {
        dom.remove(tr);
    }
    tracing::trace!(target: "rte::table", row, kept = kept.len(), "removed row");
    kept
}

fn insert_column(
    dom: &mut Dom,
    def: &mut ExecDef,
    value: InsertValue,
) -> Result<Option<Value>, CommandError> {
    let Some((table, matrix, defs)) = locate(dom, def)? else {
        return guarded("insertcolumn", "selection is not inside a table");
    };
    let reference = defs[0];
    if defs
        .iter()
        .any(|d| d.col != reference.col || d.col_span != reference.col_span)
    {
        return guarded("insertcolumn", "selection covers more than one column");
    }

    let size = matrix.get_table_size();
    let ref_col = match value.position {
        Side::Before => reference.col,
        Side::After => reference.last_col(),
    };
    let ins = match value.position {
        Side::Before => ref_col,
        Side::After => ref_col + 1,
    };

    let mut new_cells: Vec<(usize, NodeId)> = Vec::new();
    let mut grown: Vec<NodeId> = Vec::new();
    for row in 0..size.rows {
        let Some(current) = matrix.get_cell_for_coords(ref_col, row).copied() else {
            continue;
        };
        let spans_boundary =
            ins > 0 && ins < size.cols && current.col < ins && current.last_col() >= ins;
        if spans_boundary {
            if !grown.contains(&current.cell) {
                dom.set_span_attr(current.cell, COLSPAN, current.col_span + 1);
                grown.push(current.cell);
            }
            continue;
        }
        let Some(tr) = matrix.get_row_dom(row) else {
            continue;
        };
        let tag = dom.tag(current.cell).unwrap_or(tags::DATA_CELL).to_string();
        let cell = create_empty_cell(dom, &tag);
        let anchor = matrix.cell_at_or_after(ins, row).map(|d| d.cell);
        dom.insert_before(tr, cell, anchor);
        new_cells.push((row, cell));
    }
    tracing::debug!(
        target: "rte::table",
        col = ins,
        cells = new_cells.len(),
        grown = grown.len(),
        "inserted column"
    );

    let target = match value.caret_position {
        CaretPlacement::FirstCell => new_cells.first().map(|(_, c)| *c),
        CaretPlacement::Aligned => new_cells
            .iter()
            .find(|(r, _)| *r == reference.row)
            .or(new_cells.first())
            .map(|(_, c)| *c),
    };
    def.bookmark = Some(caret_in(dom, target.or(Some(reference.cell)), table));
    Ok(None)
}

fn remove_columns(
    dom: &mut Dom,
    config: &EditorConfig,
    def: &mut ExecDef,
) -> Result<Option<Value>, CommandError> {
    let Some((table, matrix, defs)) = locate(dom, def)? else {
        return guarded("removecolumn", "selection is not inside a table");
    };
    let mut cols: Vec<usize> = defs.iter().map(|d| d.col).collect();
    cols.sort_unstable();
    cols.dedup();
    let left = cols[0];
    let caret_row = defs[0].row;

    if cols.len() >= matrix.get_table_size().cols {
        def.bookmark = Some(remove_table(dom, config, table));
        return Ok(None);
    }

    let mut survivor = None;
    for col in cols.iter().rev().copied() {
        let matrix = TableMatrix::new(dom, table)?;
        if matrix.get_table_size().cols <= 1 {
            def.bookmark = Some(remove_table(dom, config, table));
            return Ok(None);
        }
        let kept = remove_single_column(dom, &matrix, col);
        if col == left {
            survivor = kept.iter().find(|d| d.covers(left, caret_row)).map(|d| d.cell);
        }
        TableMatrix::optimize_spans(dom, table)?;
    }

    let matrix = TableMatrix::new(dom, table)?;
    let target = survivor
        .or_else(|| matrix.get_cell_for_coords(left, caret_row).map(|d| d.cell))
        .or_else(|| {
            left.checked_sub(1)
                .and_then(|c| matrix.get_cell_for_coords(c, caret_row))
                .map(|d| d.cell)
        });
    def.bookmark = Some(caret_in(dom, target, table));
    Ok(None)
}

fn remove_single_column(dom: &mut Dom, matrix: &TableMatrix, col: usize) -> Vec<CellDef> {
    let mut kept = Vec::new();
    for def in matrix.cells_covering_column(col) {
        if def.col_span > 1 {
            dom.set_span_attr(def.cell, COLSPAN, def.col_span - 1);
            kept.push(*def);
        } else {
            dom.remove(def.cell);
        }
    }
    tracing::trace!(target: "rte::table", col, kept = kept.len(), "removed column");
    kept
}

fn cell_tag(command: &str, cell_type: &str) -> Result<&'static str, CommandError> {
    match cell_type {
        "th" | "header" => Ok(tags::HEADER_CELL),
        "td" | "data" => Ok(tags::DATA_CELL),
        other => Err(CommandError::invalid_args(command, format!("unknown cell type {other:?}"))),
    }
}

fn modify_cell(
    dom: &mut Dom,
    def: &mut ExecDef,
    value: &ModifyCellValue,
) -> Result<Option<Value>, CommandError> {
    let Some((_, matrix, defs)) = locate(dom, def)? else {
        return guarded("modifycell", "selection is not inside a table");
    };
    let tag = value
        .cell_type
        .as_deref()
        .map(|t| cell_tag("modifycell", t))
        .transpose()?;

    let mut targets: Vec<NodeId> = Vec::new();
    for cell_def in &defs {
        let expanded: Vec<NodeId> = match value.apply_to {
            ApplyTo::Cell => vec![cell_def.cell],
            ApplyTo::Row => matrix.get_row(cell_def.row).iter().map(|d| d.cell).collect(),
            ApplyTo::Column => matrix.get_column(cell_def.col).iter().map(|d| d.cell).collect(),
        };
        for cell in expanded {
            if !targets.contains(&cell) {
                targets.push(cell);
            }
        }
    }

    for cell in &targets {
        apply_attr(dom, *cell, "width", value.width.as_deref());
        apply_attr(dom, *cell, "height", value.height.as_deref());
        apply_attr(dom, *cell, "align", value.align.as_deref());
        apply_attr(dom, *cell, "valign", value.valign.as_deref());
        apply_attr(dom, *cell, "class", value.cell_style.as_deref());
        if let Some(tag) = tag {
            dom.set_tag(*cell, tag);
        }
    }
    tracing::debug!(
        target: "rte::table",
        apply_to = ?value.apply_to,
        cells = targets.len(),
        "modified cells"
    );
    Ok(None)
}

fn merge_cells(
    dom: &mut Dom,
    def: &mut ExecDef,
    value: &MergeCellsValue,
) -> Result<Option<Value>, CommandError> {
    let Some(table) = locate_table(dom, &def.selection) else {
        return guarded("mergecells", "selection is not inside a table");
    };
    let matrix = TableMatrix::new(dom, table)?;

    let (col, row, cols, rows) = match value.selection_props {
        Some(props) => {
            let anchor = matrix.get_cell_def(props.anchor_cell).ok_or_else(|| {
                CommandError::invalid_args("mergecells", "anchor cell is not part of the table")
            })?;
            (anchor.col, anchor.row, props.cols, props.rows)
        }
        None => {
            let selected = if value.cells.is_empty() {
                def.selection.selected_cells().to_vec()
            } else {
                value.cells.clone()
            };
            if selected.len() < 2 {
                return guarded("mergecells", "fewer than two cells selected");
            }
            let Some(props) = matrix.create_selection(&selected) else {
                return guarded("mergecells", "selected cells are not in the table");
            };
            if !props.is_rect {
                return Err(CommandError::NonRectangularSelection);
            }
            (props.min_col, props.min_row, props.cols, props.rows)
        }
    };
    if cols * rows <= 1 {
        return guarded("mergecells", "nothing to merge");
    }
    if !matrix.is_clean_rect(col, row, cols, rows) {
        return Err(CommandError::NonRectangularSelection);
    }
    let Some(anchor) = matrix.get_cell_for_coords(col, row).map(|d| d.cell) else {
        return guarded("mergecells", "anchor slot is empty");
    };

    let mut others: Vec<NodeId> = Vec::new();
    for r in row..row + rows {
        for c in col..col + cols {
            if let Some(d) = matrix.get_cell_for_coords(c, r) {
                if d.cell != anchor && !others.contains(&d.cell) {
                    others.push(d.cell);
                }
            }
        }
    }
    let mut anchor_empty = is_empty_block(dom, anchor);
    for other in &others {
        if is_empty_block(dom, *other) {
            continue;
        }
        if anchor_empty {
            for child in dom.children(anchor).to_vec() {
                dom.remove(child);
            }
            anchor_empty = false;
        } else {
            let space = dom.create_text(" ");
            dom.append_child(anchor, space);
        }
        dom.move_children(*other, anchor);
    }

    matrix.merge_to_single_cell(dom, col, row, cols, rows)?;
    TableMatrix::optimize_spans(dom, table)?;
    tracing::debug!(target: "rte::table", col, row, cols, rows, "merged cells");
    def.bookmark = Some(Bookmark::at_start_of(dom, anchor));
    Ok(None)
}

fn split_cell(
    dom: &mut Dom,
    def: &mut ExecDef,
    direction: SplitDirection,
) -> Result<Option<Value>, CommandError> {
    let Some((_, matrix, defs)) = locate(dom, def)? else {
        return guarded("splitcell", "selection is not inside a table");
    };
    let cell = defs[0];
    let tag = dom.tag(cell.cell).unwrap_or(tags::DATA_CELL).to_string();
    let created = create_empty_cell(dom, &tag);

    match direction {
        SplitDirection::Horizontal => {
            if cell.col_span > 1 {
                dom.set_span_attr(cell.cell, COLSPAN, cell.col_span - 1);
            } else {
                for other in matrix.cells_covering_column(cell.col) {
                    if other.cell != cell.cell {
                        dom.set_span_attr(other.cell, COLSPAN, other.col_span + 1);
                    }
                }
            }
            dom.set_span_attr(created, ROWSPAN, cell.row_span);
            dom.insert_after(cell.cell, created);
        }
        SplitDirection::Vertical => {
            dom.set_span_attr(created, COLSPAN, cell.col_span);
            if cell.row_span > 1 {
                dom.set_span_attr(cell.cell, ROWSPAN, cell.row_span - 1);
                let Some(tr) = matrix.get_row_dom(cell.last_row()) else {
                    return guarded("splitcell", "spanned row is missing");
                };
                let anchor = matrix.get_follow_up_cell(cell.col, cell.last_row()).map(|d| d.cell);
                dom.insert_before(tr, created, anchor);
            } else {
                let Some(row_tr) = matrix.get_row_dom(cell.row) else {
                    return guarded("splitcell", "row is missing");
                };
                for other in matrix.cells_covering_row(cell.row) {
                    if other.cell != cell.cell {
                        dom.set_span_attr(other.cell, ROWSPAN, other.row_span + 1);
                    }
                }
                let tr = dom.create_element(tags::ROW);
                dom.append_child(tr, created);
                dom.insert_after(row_tr, tr);
            }
        }
    }
    tracing::debug!(target: "rte::table", ?direction, cell = ?cell.cell, "split cell");
    def.bookmark = Some(Bookmark::at_start_of(dom, cell.cell));
    Ok(None)
}

fn ensure_paragraph(
    dom: &mut Dom,
    config: &EditorConfig,
    def: &mut ExecDef,
    side: Side,
) -> Result<Option<Value>, CommandError> {
    let Some(table) = locate_table(dom, &def.selection) else {
        return guarded("ensureparagraph", "selection is not inside a table");
    };
    if dom.parent(table) != Some(dom.root()) {
        return guarded("ensureparagraph", "table is not a top-level block");
    }
    let p = insert_paragraph(dom, table, side == Side::After, &config.paragraph_tag);
    def.bookmark = Some(Bookmark::at(p, 0));
    Ok(None)
}
