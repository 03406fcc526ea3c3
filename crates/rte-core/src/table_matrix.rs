//! Grid model of a table.
//!
//! A [`TableMatrix`] is built from the current tree on demand and never
//! updated incrementally: operations that change the table structure return
//! a freshly built matrix (or expect the caller to rebuild one).

use serde::Serialize;

use crate::dom::{Dom, NodeId};
use crate::dom_processor::create_empty_line_placeholder;
use crate::error::TableError;
use crate::tags;

pub const ROWSPAN: &str = "rowspan";
pub const COLSPAN: &str = "colspan";

/// Largest spans browsers honour; bigger values are clamped.
pub const MAX_COLSPAN: usize = 1000;
pub const MAX_ROWSPAN: usize = 65534;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellDef {
    pub cell: NodeId,
    pub row: usize,
    pub col: usize,
    pub row_span: usize,
    pub col_span: usize,
    /// `true` for the top-left slot a cell occupies, `false` for the slots
    /// its span covers.
    pub is_origin: bool,
}

impl CellDef {
    pub fn last_row(&self) -> usize {
        self.row + self.row_span - 1
    }

    pub fn last_col(&self) -> usize {
        self.col + self.col_span - 1
    }

    pub fn covers(&self, col: usize, row: usize) -> bool {
        (self.col..self.col + self.col_span).contains(&col)
            && (self.row..self.row + self.row_span).contains(&row)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableSize {
    pub rows: usize,
    pub cols: usize,
}

/// Shape of a set of selected cells in grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellSelectionProps {
    pub anchor_cell: NodeId,
    pub min_col: usize,
    pub min_row: usize,
    pub cols: usize,
    pub rows: usize,
    /// The selected cells tile their bounding box exactly.
    pub is_rect: bool,
}

#[derive(Debug, Clone)]
pub struct TableMatrix {
    table: NodeId,
    rows: Vec<NodeId>,
    /// Origin cells in row-major order.
    cells: Vec<CellDef>,
    /// For every slot, the index of the covering cell in `cells`.
    grid: Vec<Vec<usize>>,
    cols: usize,
}

/// `tr` elements of `table` in document order, looking through
/// `thead`/`tbody`/`tfoot` but not into nested tables.
pub fn table_rows(dom: &Dom, table: NodeId) -> Vec<NodeId> {
    let mut rows = Vec::new();
    for child in dom.element_children(table) {
        if tags::is_row(dom, child) {
            rows.push(child);
        } else if dom.tag(child).is_some_and(tags::is_table_section_tag) {
            rows.extend(
                dom.element_children(child)
                    .into_iter()
                    .filter(|r| tags::is_row(dom, *r)),
            );
        }
    }
    rows
}

fn row_cells(dom: &Dom, row: NodeId) -> Vec<NodeId> {
    dom.element_children(row)
        .into_iter()
        .filter(|c| tags::is_cell(dom, *c))
        .collect()
}

pub fn create_table_matrix(dom: &Dom, table: NodeId) -> Result<TableMatrix, TableError> {
    TableMatrix::new(dom, table)
}

impl TableMatrix {
    pub fn new(dom: &Dom, table: NodeId) -> Result<Self, TableError> {
        if !tags::is_table(dom, table) {
            return Err(TableError::NotATable);
        }
        let rows = table_rows(dom, table);
        let row_count = rows.len();
        let mut occupancy: Vec<Vec<Option<usize>>> = vec![Vec::new(); row_count];
        let mut cells: Vec<CellDef> = Vec::new();

        for (r, row) in rows.iter().enumerate() {
            let mut col = 0usize;
            for cell in row_cells(dom, *row) {
                while occupancy[r].get(col).is_some_and(Option::is_some) {
                    col += 1;
                }
                let row_span = if dom.attr(cell, ROWSPAN).map(str::trim) == Some("0") {
                    row_count - r
                } else {
                    dom.span_attr(cell, ROWSPAN).min(MAX_ROWSPAN).min(row_count - r)
                };
                let col_span = dom.span_attr(cell, COLSPAN).min(MAX_COLSPAN);
                let end = col.checked_add(col_span).ok_or(TableError::InvalidStructure)?;
                let ix = cells.len();
                cells.push(CellDef {
                    cell,
                    row: r,
                    col,
                    row_span,
                    col_span,
                    is_origin: true,
                });
                for slots in occupancy.iter_mut().skip(r).take(row_span) {
                    if slots.len() < end {
                        slots.resize(end, None);
                    }
                    for slot in &mut slots[col..end] {
                        if slot.is_some() {
                            tracing::debug!(
                                target: "rte::table",
                                ?cell,
                                r,
                                col,
                                "overlapping cell spans"
                            );
                            return Err(TableError::InvalidStructure);
                        }
                        *slot = Some(ix);
                    }
                }
                col = end;
            }
        }

        let cols = occupancy.iter().map(Vec::len).max().unwrap_or(0);
        let mut grid: Vec<Vec<usize>> = Vec::with_capacity(row_count);
        for (r, slots) in occupancy.into_iter().enumerate() {
            if slots.len() < cols || slots.iter().any(Option::is_none) {
                tracing::debug!(target: "rte::table", row = r, cols, "ragged table row");
                return Err(TableError::InvalidStructure);
            }
            grid.push(slots.into_iter().flatten().collect());
        }

        Ok(Self {
            table,
            rows,
            cells,
            grid,
            cols,
        })
    }

    pub fn table(&self) -> NodeId {
        self.table
    }

    pub fn get_table_size(&self) -> TableSize {
        TableSize {
            rows: self.rows.len(),
            cols: self.cols,
        }
    }

    pub fn cells(&self) -> &[CellDef] {
        &self.cells
    }

    pub fn get_cell_def(&self, cell: NodeId) -> Option<&CellDef> {
        self.cells.iter().find(|c| c.cell == cell)
    }

    pub fn get_cell_for_coords(&self, col: usize, row: usize) -> Option<&CellDef> {
        let ix = *self.grid.get(row)?.get(col)?;
        self.cells.get(ix)
    }

    /// The cell covering the slot, but only if its element lives in `row`.
    pub fn get_row_cell_for_coords(&self, col: usize, row: usize) -> Option<&CellDef> {
        self.get_cell_for_coords(col, row).filter(|c| c.row == row)
    }

    pub fn get_row(&self, n: usize) -> Vec<&CellDef> {
        self.cells.iter().filter(|c| c.row == n).collect()
    }

    pub fn get_column(&self, n: usize) -> Vec<&CellDef> {
        self.cells.iter().filter(|c| c.col == n).collect()
    }

    pub fn cells_covering_row(&self, n: usize) -> Vec<&CellDef> {
        let mut out: Vec<&CellDef> = Vec::new();
        if let Some(slots) = self.grid.get(n) {
            for ix in slots {
                let def = &self.cells[*ix];
                if !out.iter().any(|c| c.cell == def.cell) {
                    out.push(def);
                }
            }
        }
        out
    }

    pub fn cells_covering_column(&self, n: usize) -> Vec<&CellDef> {
        let mut out: Vec<&CellDef> = Vec::new();
        for slots in &self.grid {
            if let Some(ix) = slots.get(n) {
                let def = &self.cells[*ix];
                if !out.iter().any(|c| c.cell == def.cell) {
                    out.push(def);
                }
            }
        }
        out
    }

    pub fn get_row_dom(&self, n: usize) -> Option<NodeId> {
        self.rows.get(n).copied()
    }

    /// First cell of `row` whose element starts right of `col`: the sibling a
    /// cell placed at `col` has to be inserted before. `None` means "append".
    pub fn get_follow_up_cell(&self, col: usize, row: usize) -> Option<&CellDef> {
        self.cells.iter().find(|c| c.row == row && c.col > col)
    }

    pub fn cell_at_or_after(&self, col: usize, row: usize) -> Option<&CellDef> {
        self.cells.iter().find(|c| c.row == row && c.col >= col)
    }

    /// One entry per slot; covered slots repeat the spanning cell with
    /// `is_origin == false`.
    pub fn create_full_matrix(&self) -> Vec<Vec<CellDef>> {
        self.grid
            .iter()
            .enumerate()
            .map(|(r, slots)| {
                slots
                    .iter()
                    .enumerate()
                    .map(|(c, ix)| {
                        let def = self.cells[*ix];
                        CellDef {
                            is_origin: def.row == r && def.col == c,
                            ..def
                        }
                    })
                    .collect()
            })
            .collect()
    }

    pub fn origin_matrix(&self) -> Vec<Vec<Option<CellDef>>> {
        let mut out = vec![vec![None; self.cols]; self.rows.len()];
        for def in &self.cells {
            out[def.row][def.col] = Some(*def);
        }
        out
    }

    pub fn create_selection(&self, selected: &[NodeId]) -> Option<CellSelectionProps> {
        let defs: Vec<&CellDef> = selected
            .iter()
            .filter_map(|cell| self.get_cell_def(*cell))
            .collect();
        let first = defs.first()?;

        let min_col = defs.iter().map(|d| d.col).min()?;
        let min_row = defs.iter().map(|d| d.row).min()?;
        let max_col = defs.iter().map(|d| d.last_col()).max()?;
        let max_row = defs.iter().map(|d| d.last_row()).max()?;
        let cols = max_col - min_col + 1;
        let rows = max_row - min_row + 1;

        let mut is_rect = true;
        'slots: for r in min_row..=max_row {
            for c in min_col..=max_col {
                let covered_by_selection = self
                    .get_cell_for_coords(c, r)
                    .is_some_and(|def| defs.iter().any(|d| d.cell == def.cell));
                if !covered_by_selection {
                    is_rect = false;
                    break 'slots;
                }
            }
        }

        let anchor_cell = self
            .get_cell_for_coords(min_col, min_row)
            .filter(|def| defs.iter().any(|d| d.cell == def.cell))
            .map(|def| def.cell)
            .unwrap_or(first.cell);

        Some(CellSelectionProps {
            anchor_cell,
            min_col,
            min_row,
            cols,
            rows,
            is_rect,
        })
    }

    pub fn is_clean_rect(&self, col: usize, row: usize, cols: usize, rows: usize) -> bool {
        if cols == 0 || rows == 0 || col + cols > self.cols || row + rows > self.rows.len() {
            return false;
        }
        for r in row..row + rows {
            for c in col..col + cols {
                let Some(def) = self.get_cell_for_coords(c, r) else {
                    return false;
                };
                if def.col < col
                    || def.row < row
                    || def.last_col() >= col + cols
                    || def.last_row() >= row + rows
                {
                    return false;
                }
            }
        }
        true
    }

    pub fn extend_by(
        &self,
        dom: &mut Dom,
        cols: usize,
        rows: usize,
    ) -> Result<TableMatrix, TableError> {
        if cols > 0 {
            for row in &self.rows {
                let tag = self.trailing_cell_tag(dom, *row);
                for _ in 0..cols {
                    let cell = create_empty_cell(dom, tag);
                    dom.append_child(*row, cell);
                }
            }
        }
        if rows > 0 {
            let total_cols = self.cols + cols;
            let container = match self.rows.last().and_then(|r| dom.parent(*r)) {
                Some(section) => section,
                None => {
                    let tbody = dom.create_element("tbody");
                    dom.append_child(self.table, tbody);
                    tbody
                }
            };
            for _ in 0..rows {
                let tr = dom.create_element(tags::ROW);
                for _ in 0..total_cols.max(1) {
                    let cell = create_empty_cell(dom, tags::DATA_CELL);
                    dom.append_child(tr, cell);
                }
                dom.append_child(container, tr);
            }
        }
        tracing::debug!(target: "rte::table", cols, rows, "extended table");
        TableMatrix::new(dom, self.table)
    }

    fn trailing_cell_tag(&self, dom: &Dom, row: NodeId) -> &'static str {
        match dom.last_child(row).and_then(|c| dom.tag(c)) {
            Some(tags::HEADER_CELL) => tags::HEADER_CELL,
            _ => tags::DATA_CELL,
        }
    }

    /// Collapses the rectangle into its top-left cell, which is returned.
    /// Fails with [`TableError::InvalidStructure`] when a cell crosses the
    /// rectangle's border; the tree is left untouched in that case.
    pub fn merge_to_single_cell(
        &self,
        dom: &mut Dom,
        col: usize,
        row: usize,
        cols: usize,
        rows: usize,
    ) -> Result<NodeId, TableError> {
        if !self.is_clean_rect(col, row, cols, rows) {
            tracing::debug!(
                target: "rte::table",
                col,
                row,
                cols,
                rows,
                "merge target is not a clean rectangle"
            );
            return Err(TableError::InvalidStructure);
        }
        let origin = self
            .get_cell_for_coords(col, row)
            .map(|def| def.cell)
            .ok_or(TableError::InvalidStructure)?;

        let mut removed: Vec<NodeId> = Vec::new();
        for r in row..row + rows {
            for c in col..col + cols {
                if let Some(def) = self.get_cell_for_coords(c, r) {
                    if def.cell != origin && !removed.contains(&def.cell) {
                        removed.push(def.cell);
                    }
                }
            }
        }
        for cell in &removed {
            dom.remove(*cell);
        }
        dom.set_span_attr(origin, COLSPAN, cols);
        dom.set_span_attr(origin, ROWSPAN, rows);
        Ok(origin)
    }

    /// Rewrites spans that overstate a cell's footprint: spans reaching past
    /// the table, rows no cell starts in and columns no cell starts in.
    pub fn optimize_spans(dom: &mut Dom, table: NodeId) -> Result<TableMatrix, TableError> {
        loop {
            let matrix = TableMatrix::new(dom, table)?;
            for def in &matrix.cells {
                if dom.span_attr(def.cell, ROWSPAN) != def.row_span
                    || dom.attr(def.cell, ROWSPAN).is_some_and(|v| v.trim() == "0")
                {
                    dom.set_span_attr(def.cell, ROWSPAN, def.row_span);
                }
                if dom.span_attr(def.cell, COLSPAN) != def.col_span {
                    dom.set_span_attr(def.cell, COLSPAN, def.col_span);
                }
            }
            if matrix.cols == 0 {
                return Ok(matrix);
            }

            let empty_row = (0..matrix.rows.len()).rev().find(|r| matrix.get_row(*r).is_empty());
            if let Some(r) = empty_row {
                for def in matrix.cells_covering_row(r) {
                    dom.set_span_attr(def.cell, ROWSPAN, def.row_span.saturating_sub(1));
                }
                if let Some(tr) = matrix.get_row_dom(r) {
                    dom.remove(tr);
                }
                tracing::trace!(target: "rte::table", row = r, "dropped redundant row");
                continue;
            }

            let empty_col = (1..matrix.cols).rev().find(|c| matrix.get_column(*c).is_empty());
            if let Some(c) = empty_col {
                for def in matrix.cells_covering_column(c) {
                    dom.set_span_attr(def.cell, COLSPAN, def.col_span.saturating_sub(1));
                }
                tracing::trace!(target: "rte::table", col = c, "dropped redundant column");
                continue;
            }

            return Ok(matrix);
        }
    }
}

pub fn create_empty_cell(dom: &mut Dom, tag: &str) -> NodeId {
    let cell = dom.create_element(tag);
    let br = create_empty_line_placeholder(dom);
    dom.append_child(cell, br);
    cell
}
