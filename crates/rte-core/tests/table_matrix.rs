use rte_core::table_matrix::{create_table_matrix, table_rows};
use rte_core::{Dom, NodeId, TableError, TableMatrix, TableSize};

fn table_of(dom: &Dom) -> NodeId {
    dom.first_descendant_tagged(dom.root(), "table").unwrap()
}

fn cell_with_text(dom: &Dom, text: &str) -> NodeId {
    let node = dom
        .descendants(dom.root())
        .into_iter()
        .find(|n| dom.text(*n) == Some(text))
        .unwrap();
    dom.parent(node).unwrap()
}

#[test]
fn spans_reserve_slots_for_later_cells() {
    let dom = Dom::from_html(
        "<table>\
         <tr><td rowspan=\"2\">a</td><td colspan=\"2\">b</td></tr>\
         <tr><td>c</td><td>d</td></tr>\
         </table>",
    );
    let matrix = TableMatrix::new(&dom, table_of(&dom)).unwrap();
    assert_eq!(matrix.get_table_size(), TableSize { rows: 2, cols: 3 });

    let c = matrix.get_cell_def(cell_with_text(&dom, "c")).unwrap();
    assert_eq!((c.col, c.row), (1, 1));
    let d = matrix.get_cell_def(cell_with_text(&dom, "d")).unwrap();
    assert_eq!((d.col, d.row), (2, 1));

    let a = cell_with_text(&dom, "a");
    assert_eq!(matrix.get_cell_for_coords(0, 1).unwrap().cell, a);
    assert!(matrix.get_row_cell_for_coords(0, 1).is_none());
    assert_eq!(matrix.get_row_cell_for_coords(0, 0).unwrap().cell, a);
}

#[test]
fn full_matrix_is_rectangular_with_one_origin_per_cell() {
    let dom = Dom::from_html(
        "<table>\
         <tr><td rowspan=\"2\" colspan=\"2\">a</td><td>b</td></tr>\
         <tr><td>c</td></tr>\
         <tr><td>d</td><td colspan=\"2\">e</td></tr>\
         </table>",
    );
    let matrix = create_table_matrix(&dom, table_of(&dom)).unwrap();
    let full = matrix.create_full_matrix();
    assert_eq!(full.len(), 3);
    assert!(full.iter().all(|row| row.len() == 3));

    for def in matrix.cells() {
        let origins = full
            .iter()
            .flatten()
            .filter(|slot| slot.cell == def.cell && slot.is_origin)
            .count();
        assert_eq!(origins, 1);
        let covered = full.iter().flatten().filter(|slot| slot.cell == def.cell).count();
        assert_eq!(covered, def.row_span * def.col_span);
    }

    let origins = matrix.origin_matrix();
    assert!(origins[0][0].is_some());
    assert!(origins[0][1].is_none());
    assert!(origins[1][0].is_none());
}

#[test]
fn ragged_and_overlapping_tables_are_rejected() {
    let ragged = Dom::from_html("<table><tr><td>a</td><td>b</td></tr><tr><td>c</td></tr></table>");
    assert_eq!(
        TableMatrix::new(&ragged, table_of(&ragged)).unwrap_err(),
        TableError::InvalidStructure
    );

    let overlapping = Dom::from_html(
        "<table>\
         <tr><td>a</td><td rowspan=\"2\">b</td></tr>\
         <tr><td colspan=\"2\">c</td></tr>\
         </table>",
    );
    assert_eq!(
        TableMatrix::new(&overlapping, table_of(&overlapping)).unwrap_err(),
        TableError::InvalidStructure
    );

    let dom = Dom::from_html("<p>text</p>");
    let p = dom.first_child(dom.root()).unwrap();
    assert_eq!(TableMatrix::new(&dom, p).unwrap_err(), TableError::NotATable);
}

#[test]
fn rowspan_zero_and_overflow_stop_at_the_last_row() {
    let dom = Dom::from_html(
        "<table>\
         <tr><td rowspan=\"0\">a</td><td rowspan=\"9\">b</td></tr>\
         <tr></tr>\
         <tr></tr>\
         </table>",
    );
    let matrix = TableMatrix::new(&dom, table_of(&dom)).unwrap();
    assert_eq!(matrix.get_table_size(), TableSize { rows: 3, cols: 2 });
    assert_eq!(matrix.get_cell_def(cell_with_text(&dom, "a")).unwrap().row_span, 3);
    assert_eq!(matrix.get_cell_def(cell_with_text(&dom, "b")).unwrap().row_span, 3);
}

#[test]
fn rows_are_found_through_sections() {
    let dom = Dom::from_html(
        "<table>\
         <thead><tr><th>h</th></tr></thead>\
         <tbody><tr><td>b</td></tr></tbody>\
         <tfoot><tr><td>f</td></tr></tfoot>\
         </table>",
    );
    let table = table_of(&dom);
    assert_eq!(table_rows(&dom, table).len(), 3);
    let matrix = TableMatrix::new(&dom, table).unwrap();
    assert_eq!(matrix.get_column(0).len(), 3);
    assert_eq!(matrix.get_row(1)[0].cell, cell_with_text(&dom, "b"));
}

#[test]
fn follow_up_cell_skips_cells_reaching_in_from_above() {
    let dom = Dom::from_html(
        "<table>\
         <tr><td>a</td><td rowspan=\"2\">b</td><td>c</td></tr>\
         <tr><td>d</td><td>e</td></tr>\
         </table>",
    );
    let matrix = TableMatrix::new(&dom, table_of(&dom)).unwrap();
    assert_eq!(
        matrix.get_follow_up_cell(0, 1).unwrap().cell,
        cell_with_text(&dom, "e")
    );
    assert!(matrix.get_follow_up_cell(2, 1).is_none());
    assert_eq!(matrix.cells_covering_row(1).len(), 3);
    assert_eq!(matrix.cells_covering_column(1).len(), 1);
}

#[test]
fn selection_is_rect_exactly_when_the_merge_succeeds() {
    let html = "<table>\
                <tr><td colspan=\"2\">a</td><td>b</td></tr>\
                <tr><td>c</td><td>d</td><td>e</td></tr>\
                </table>";

    let mut dom = Dom::from_html(html);
    let matrix = TableMatrix::new(&dom, table_of(&dom)).unwrap();
    let cells = ["b", "d", "e"].map(|t| cell_with_text(&dom, t));
    let props = matrix.create_selection(&cells).unwrap();
    assert!(!props.is_rect);
    assert_eq!((props.min_col, props.min_row, props.cols, props.rows), (1, 0, 2, 2));
    assert!(!matrix.is_clean_rect(props.min_col, props.min_row, props.cols, props.rows));
    assert_eq!(
        matrix
            .merge_to_single_cell(&mut dom, props.min_col, props.min_row, props.cols, props.rows)
            .unwrap_err(),
        TableError::InvalidStructure
    );
    assert_eq!(dom.html(), Dom::from_html(html).html());

    let cells = ["a", "c", "d"].map(|t| cell_with_text(&dom, t));
    let props = matrix.create_selection(&cells).unwrap();
    assert!(props.is_rect);
    assert_eq!(props.anchor_cell, cell_with_text(&dom, "a"));
    let merged = matrix
        .merge_to_single_cell(&mut dom, props.min_col, props.min_row, props.cols, props.rows)
        .unwrap();
    assert_eq!(merged, props.anchor_cell);
    assert_eq!(
        dom.html(),
        "<table><tbody>\
         <tr><td colspan=\"2\" rowspan=\"2\">a</td><td>b</td></tr>\
         <tr><td>e</td></tr>\
         </tbody></table>"
    );
}

#[test]
fn extend_by_grows_rows_and_columns() {
    let mut dom = Dom::from_html("<table><tr><th>a</th><td>b</td></tr></table>");
    let table = table_of(&dom);
    let matrix = TableMatrix::new(&dom, table).unwrap();
    let grown = matrix.extend_by(&mut dom, 1, 2).unwrap();
    assert_eq!(grown.get_table_size(), TableSize { rows: 3, cols: 3 });
    assert_eq!(
        dom.html(),
        "<table><tbody>\
         <tr><th>a</th><td>b</td><td><br></td></tr>\
         <tr><td><br></td><td><br></td><td><br></td></tr>\
         <tr><td><br></td><td><br></td><td><br></td></tr>\
         </tbody></table>"
    );
}

#[test]
fn optimize_spans_drops_rows_without_origins() {
    let mut dom = Dom::from_html(
        "<table>\
         <tr><td rowspan=\"2\">a</td><td rowspan=\"2\">b</td></tr>\
         <tr></tr>\
         <tr><td>c</td><td rowspan=\"4\">d</td></tr>\
         </table>",
    );
    let table = table_of(&dom);
    let matrix = TableMatrix::optimize_spans(&mut dom, table).unwrap();
    assert_eq!(matrix.get_table_size(), TableSize { rows: 2, cols: 2 });
    assert_eq!(
        dom.html(),
        "<table><tbody>\
         <tr><td>a</td><td>b</td></tr>\
         <tr><td>c</td><td>d</td></tr>\
         </tbody></table>"
    );
}

#[test]
fn optimize_spans_drops_columns_without_origins() {
    let mut dom = Dom::from_html(
        "<table>\
         <tr><td>a</td><td colspan=\"3\">b</td></tr>\
         <tr><td colspan=\"2\">c</td><td colspan=\"2\">d</td></tr>\
         </table>",
    );
    let table = table_of(&dom);
    let matrix = TableMatrix::optimize_spans(&mut dom, table).unwrap();
    assert_eq!(matrix.get_table_size(), TableSize { rows: 2, cols: 3 });
    assert_eq!(
        dom.html(),
        "<table><tbody>\
         <tr><td>a</td><td colspan=\"2\">b</td></tr>\
         <tr><td colspan=\"2\">c</td><td>d</td></tr>\
         </tbody></table>"
    );
}

#[test]
fn oversized_spans_are_clamped() {
    let dom = Dom::from_html(
        "<table>\
         <tr><td colspan=\"18446744073709551615\">a</td><td rowspan=\"99999\">b</td></tr>\
         <tr><td colspan=\"99999999999999999999999\">c</td></tr>\
         </table>",
    );
    let table = table_of(&dom);
    let matrix = TableMatrix::new(&dom, table);
    assert_eq!(matrix.unwrap_err(), TableError::InvalidStructure);

    let dom = Dom::from_html("<table><tr><td colspan=\"18446744073709551615\">a</td></tr></table>");
    let matrix = TableMatrix::new(&dom, table_of(&dom)).unwrap();
    assert_eq!(matrix.get_table_size(), TableSize { rows: 1, cols: 1000 });
    assert_eq!(matrix.get_cell_def(cell_with_text(&dom, "a")).unwrap().col_span, 1000);

    let dom = Dom::from_html("<table><tr><td rowspan=\"4000000000\">a</td></tr><tr></tr></table>");
    let matrix = TableMatrix::new(&dom, table_of(&dom)).unwrap();
    assert_eq!(matrix.get_cell_def(cell_with_text(&dom, "a")).unwrap().row_span, 2);
}

#[test]
fn optimize_spans_rewrites_clamped_colspan() {
    let mut dom = Dom::from_html(
        "<table>\
         <tr><td colspan=\"5000\">a</td></tr>\
         <tr><td>b</td><td colspan=\"999\">c</td></tr>\
         </table>",
    );
    let table = table_of(&dom);
    let matrix = TableMatrix::optimize_spans(&mut dom, table).unwrap();
    assert_eq!(matrix.get_table_size(), TableSize { rows: 2, cols: 2 });
    assert_eq!(
        dom.html(),
        "<table><tbody>\
         <tr><td colspan=\"2\">a</td></tr>\
         <tr><td>b</td><td>c</td></tr>\
         </tbody></table>"
    );
}
