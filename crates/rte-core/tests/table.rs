use rte_core::{CommandError, Dom, Editor, NodeId, TableMatrix, TableSize};
use serde_json::json;

const GRID: &str = "<table>\
    <tr><td>a1</td><td>a2</td><td>a3</td></tr>\
    <tr><td>b1</td><td>b2</td><td>b3</td></tr>\
    <tr><td>c1</td><td>c2</td><td>c3</td></tr>\
    </table>";

const QUAD: &str = "<table><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></table>";

fn text_node(dom: &Dom, text: &str) -> NodeId {
    dom.descendants(dom.root())
        .into_iter()
        .find(|n| dom.text(*n) == Some(text))
        .unwrap()
}

fn cell(dom: &Dom, text: &str) -> NodeId {
    dom.parent(text_node(dom, text)).unwrap()
}

fn matrix(editor: &Editor) -> TableMatrix {
    let dom = editor.dom();
    let table = dom.first_descendant_tagged(dom.root(), "table").unwrap();
    TableMatrix::new(dom, table).unwrap()
}

fn editor_in(html: &str, text: &str) -> Editor {
    let mut editor = Editor::from_html(html);
    let caret = text_node(editor.dom(), text);
    editor.set_caret(caret, 0);
    editor
}

#[test]
fn createtable_replaces_empty_paragraph_and_moves_caret_into_first_cell() {
    let mut editor = Editor::with_core_commands();
    let ret = editor
        .run_command("createTable", Some(json!({ "rows": 2, "columns": 2 })))
        .unwrap();
    assert!(ret.unwrap().get("table").is_some());

    assert_eq!(
        editor.html(),
        "<table border=\"1\"><tbody>\
         <tr><td><br></td><td><br></td></tr>\
         <tr><td><br></td><td><br></td></tr>\
         </tbody></table><p><br></p>"
    );
    let first = matrix(&editor).get_cell_for_coords(0, 0).unwrap().cell;
    assert_eq!(editor.selection().start.node, first);
}

#[test]
fn createtable_marks_header_row_and_column() {
    let mut editor = Editor::with_core_commands();
    editor
        .run_command(
            "createtable",
            Some(json!({
                "rows": 2,
                "columns": 2,
                "header": "top left",
                "border": "0",
                "tableStyle": "grid"
            })),
        )
        .unwrap();
    assert_eq!(
        editor.html(),
        "<table border=\"0\" class=\"grid\"><tbody>\
         <tr><th><br></th><th><br></th></tr>\
         <tr><th><br></th><td><br></td></tr>\
         </tbody></table><p><br></p>"
    );
}

#[test]
fn createtable_splits_paragraph_at_caret() {
    let mut editor = Editor::from_html("<p>HelloWorld</p>");
    let text = text_node(editor.dom(), "HelloWorld");
    editor.set_caret(text, 5);
    editor
        .run_command("createtable", Some(json!({ "rows": 1, "columns": 1 })))
        .unwrap();
    assert_eq!(
        editor.html(),
        "<p>Hello</p><table border=\"1\"><tbody><tr><td><br></td></tr></tbody></table><p>World</p>"
    );
}

#[test]
fn insert_row_after_adds_fresh_cells() {
    let mut editor = editor_in(GRID, "b2");
    editor
        .run_command("insertrow", Some(json!({ "position": "after" })))
        .unwrap();

    let m = matrix(&editor);
    assert_eq!(m.get_table_size(), TableSize { rows: 4, cols: 3 });
    for def in m.get_row(2) {
        assert_eq!((def.row_span, def.col_span), (1, 1));
        assert_eq!(editor.dom().inner_html(def.cell), "<br>");
    }
    assert_eq!(editor.selection().start.node, m.get_cell_for_coords(1, 2).unwrap().cell);
}

#[test]
fn insert_row_grows_cells_spanning_the_boundary() {
    let mut editor = editor_in(
        "<table><tr><td rowspan=\"2\">a</td><td>b</td></tr><tr><td>c</td></tr></table>",
        "b",
    );
    editor.run_command("insertrow", Some(json!("after"))).unwrap();
    assert_eq!(
        editor.html(),
        "<table><tbody>\
         <tr><td rowspan=\"3\">a</td><td>b</td></tr>\
         <tr><td><br></td></tr>\
         <tr><td>c</td></tr>\
         </tbody></table>"
    );
}

#[test]
fn insert_row_first_cell_caret_placement() {
    let mut editor = editor_in(GRID, "b3");
    editor
        .run_command(
            "insertrow",
            Some(json!({ "position": "before", "caretPosition": "firstCell" })),
        )
        .unwrap();
    let m = matrix(&editor);
    assert_eq!(m.get_table_size().rows, 4);
    assert_eq!(editor.selection().start.node, m.get_cell_for_coords(0, 1).unwrap().cell);
}

#[test]
fn insert_row_with_cells_from_two_rows_is_a_no_op() {
    let mut editor = Editor::from_html(GRID);
    let before = editor.html();
    let cells = vec![cell(editor.dom(), "a1"), cell(editor.dom(), "b1")];
    editor.select_cells(cells);
    assert_eq!(editor.run_command("insertrow", None).unwrap(), None);
    assert_eq!(editor.html(), before);
    assert!(!editor.can_undo());
}

#[test]
fn insert_then_remove_row_restores_the_table() {
    let mut editor = editor_in(GRID, "b2");
    let original = editor.html();
    editor.run_command("insertrow", Some(json!("after"))).unwrap();
    editor.run_command("removerow", None).unwrap();
    assert_eq!(editor.html(), original);
    assert_eq!(editor.selection().start.node, text_node(editor.dom(), "c2"));
}

#[test]
fn remove_row_moves_spanning_cell_down() {
    let mut editor = editor_in(
        "<table>\
         <tr><td rowspan=\"2\">a1</td><td>a2</td><td>a3</td></tr>\
         <tr><td>b2</td><td>b3</td></tr>\
         <tr><td>c1</td><td>c2</td><td>c3</td></tr>\
         </table>",
        "a1",
    );
    editor.run_command("removerow", None).unwrap();
    assert_eq!(
        editor.html(),
        "<table><tbody>\
         <tr><td>a1</td><td>b2</td><td>b3</td></tr>\
         <tr><td>c1</td><td>c2</td><td>c3</td></tr>\
         </tbody></table>"
    );
    assert_eq!(matrix(&editor).get_table_size(), TableSize { rows: 2, cols: 3 });
    assert_eq!(editor.selection().start.node, text_node(editor.dom(), "a1"));
}

#[test]
fn remove_last_row_falls_back_to_previous_row() {
    let mut editor = editor_in(GRID, "c3");
    editor.run_command("removerow", None).unwrap();
    assert_eq!(matrix(&editor).get_table_size(), TableSize { rows: 2, cols: 3 });
    assert_eq!(editor.selection().start.node, text_node(editor.dom(), "b3"));
}

#[test]
fn remove_selected_rows_in_one_go() {
    let mut editor = Editor::from_html(GRID);
    let cells = vec![cell(editor.dom(), "a1"), cell(editor.dom(), "b2")];
    editor.select_cells(cells);
    editor.run_command("removerow", None).unwrap();
    assert_eq!(
        editor.html(),
        "<table><tbody><tr><td>c1</td><td>c2</td><td>c3</td></tr></tbody></table>"
    );
}

#[test]
fn removing_every_row_removes_the_table() {
    let mut editor = editor_in("<table><tr><td>a</td><td>b</td></tr></table>", "a");
    editor.run_command("removerow", None).unwrap();
    assert_eq!(editor.html(), "<p><br></p>");
}

#[test]
fn insert_column_after_caret_cell() {
    let mut editor = editor_in(QUAD, "a");
    editor.run_command("insertcolumn", Some(json!("after"))).unwrap();
    assert_eq!(
        editor.html(),
        "<table><tbody>\
         <tr><td>a</td><td><br></td><td>b</td></tr>\
         <tr><td>c</td><td><br></td><td>d</td></tr>\
         </tbody></table>"
    );
    let inserted = matrix(&editor).get_cell_for_coords(1, 0).unwrap().cell;
    assert_eq!(editor.selection().start.node, inserted);
}

#[test]
fn insert_column_grows_cells_spanning_the_boundary() {
    let mut editor = editor_in(
        "<table><tr><td colspan=\"2\">a</td></tr><tr><td>b</td><td>c</td></tr></table>",
        "b",
    );
    editor.run_command("insertcolumn", Some(json!({ "position": "after" }))).unwrap();
    assert_eq!(
        editor.html(),
        "<table><tbody>\
         <tr><td colspan=\"3\">a</td></tr>\
         <tr><td>b</td><td><br></td><td>c</td></tr>\
         </tbody></table>"
    );
}

#[test]
fn remove_column_shrinks_spanning_cells() {
    let mut editor = editor_in(
        "<table>\
         <tr><td colspan=\"2\">a</td><td>b</td></tr>\
         <tr><td>c</td><td>d</td><td>e</td></tr>\
         </table>",
        "d",
    );
    editor.run_command("removecolumn", None).unwrap();
    assert_eq!(
        editor.html(),
        "<table><tbody>\
         <tr><td>a</td><td>b</td></tr>\
         <tr><td>c</td><td>e</td></tr>\
         </tbody></table>"
    );
    assert_eq!(editor.selection().start.node, text_node(editor.dom(), "e"));

    let m = matrix(&editor);
    let size = m.get_table_size();
    assert!(m.cells().iter().all(|d| d.last_col() < size.cols && d.last_row() < size.rows));
}

#[test]
fn remove_last_column_falls_back_to_previous_column() {
    let mut editor = editor_in(GRID, "c3");
    editor.run_command("removecolumn", None).unwrap();
    assert_eq!(matrix(&editor).get_table_size(), TableSize { rows: 3, cols: 2 });
    assert_eq!(editor.selection().start.node, text_node(editor.dom(), "c2"));
}

#[test]
fn remove_column_keeps_caret_in_shrunk_cell() {
    let mut editor = editor_in(
        "<table>\
         <tr><td>a</td><td colspan=\"2\">b</td></tr>\
         <tr><td>c</td><td>d</td><td>e</td></tr>\
         </table>",
        "b",
    );
    editor.run_command("removecolumn", None).unwrap();
    assert_eq!(
        editor.html(),
        "<table><tbody>\
         <tr><td>a</td><td>b</td></tr>\
         <tr><td>c</td><td>e</td></tr>\
         </tbody></table>"
    );
    assert_eq!(editor.selection().start.node, text_node(editor.dom(), "b"));
}

#[test]
fn remove_column_through_cell_spanning_rows_and_columns() {
    let mut editor = editor_in(
        "<table>\
         <tr><td rowspan=\"2\" colspan=\"2\">x</td><td>a3</td></tr>\
         <tr><td>b3</td></tr>\
         <tr><td>c1</td><td>c2</td><td>c3</td></tr>\
         </table>",
        "x",
    );
    editor.run_command("removecolumn", None).unwrap();
    assert_eq!(
        editor.html(),
        "<table><tbody>\
         <tr><td rowspan=\"2\">x</td><td>a3</td></tr>\
         <tr><td>b3</td></tr>\
         <tr><td>c2</td><td>c3</td></tr>\
         </tbody></table>"
    );
    assert_eq!(matrix(&editor).get_table_size(), TableSize { rows: 3, cols: 2 });
    assert_eq!(editor.selection().start.node, text_node(editor.dom(), "x"));
}

#[test]
fn remove_last_column_falls_back_to_cell_spanning_rows() {
    let mut editor = editor_in(
        "<table>\
         <tr><td>a1</td><td rowspan=\"3\">a2</td><td>a3</td></tr>\
         <tr><td>b1</td><td>b3</td></tr>\
         <tr><td>c1</td><td>c3</td></tr>\
         </table>",
        "c3",
    );
    editor.run_command("removecolumn", None).unwrap();
    assert_eq!(
        editor.html(),
        "<table><tbody>\
         <tr><td>a1</td><td rowspan=\"3\">a2</td></tr>\
         <tr><td>b1</td></tr>\
         <tr><td>c1</td></tr>\
         </tbody></table>"
    );
    assert_eq!(editor.selection().start.node, text_node(editor.dom(), "a2"));
}

#[test]
fn remove_column_of_single_column_table_removes_table() {
    let mut editor =
        editor_in("<table><tr><td>a</td></tr><tr><td>b</td></tr></table><p>x</p>", "a");
    editor.run_command("removecolumn", None).unwrap();
    assert_eq!(editor.html(), "<p>x</p>");
    assert_eq!(editor.selection().start.node, text_node(editor.dom(), "x"));
}

#[test]
fn remove_table_inside_cell_keeps_a_line() {
    let mut editor = editor_in(
        "<table><tr><td><table><tr><td>inner</td></tr></table></td></tr></table>",
        "inner",
    );
    editor.run_command("removetable", None).unwrap();
    assert_eq!(editor.html(), "<table><tbody><tr><td><br></td></tr></tbody></table>");
}

#[test]
fn merge_cells_joins_content_into_anchor() {
    let mut editor = Editor::from_html(GRID);
    let cells = ["a1", "a2", "b1", "b2"]
        .map(|t| cell(editor.dom(), t))
        .to_vec();
    editor.select_cells(cells);
    assert!(editor.query_state::<bool>("mergecells").unwrap());
    editor.run_command("mergecells", None).unwrap();
    assert_eq!(
        editor.html(),
        "<table><tbody>\
         <tr><td colspan=\"2\" rowspan=\"2\">a1 a2 b1 b2</td><td>a3</td></tr>\
         <tr><td>b3</td></tr>\
         <tr><td>c1</td><td>c2</td><td>c3</td></tr>\
         </tbody></table>"
    );
}

#[test]
fn merge_cells_with_explicit_selection_props() {
    let mut editor = editor_in(GRID, "b2");
    let anchor = cell(editor.dom(), "b2");
    editor
        .run_command(
            "mergecells",
            Some(json!({ "selectionProps": { "anchorCell": anchor, "cols": 2, "rows": 1 } })),
        )
        .unwrap();
    assert_eq!(
        editor.html(),
        "<table><tbody>\
         <tr><td>a1</td><td>a2</td><td>a3</td></tr>\
         <tr><td>b1</td><td colspan=\"2\">b2 b3</td></tr>\
         <tr><td>c1</td><td>c2</td><td>c3</td></tr>\
         </tbody></table>"
    );
}

#[test]
fn merge_cells_rejects_non_rectangular_selection() {
    let mut editor = Editor::from_html(GRID);
    let before = editor.html();
    let cells = ["a1", "a2", "b1"].map(|t| cell(editor.dom(), t)).to_vec();
    editor.select_cells(cells);
    assert!(!editor.query_state::<bool>("mergecells").unwrap());

    let err = editor.run_command("mergecells", None).unwrap_err();
    assert_eq!(err, CommandError::NonRectangularSelection);
    assert!(err.is_user_facing());
    assert_eq!(editor.html(), before);
}

#[test]
fn split_cell_horizontally_widens_neighbours() {
    let mut editor = editor_in(QUAD, "a");
    editor.run_command("splitcell", Some(json!("horizontal"))).unwrap();
    assert_eq!(
        editor.html(),
        "<table><tbody>\
         <tr><td>a</td><td><br></td><td>b</td></tr>\
         <tr><td colspan=\"2\">c</td><td>d</td></tr>\
         </tbody></table>"
    );
}

#[test]
fn split_cell_vertically_adds_a_row() {
    let mut editor = editor_in(QUAD, "a");
    editor.run_command("splitcell", Some(json!("vertical"))).unwrap();
    assert_eq!(
        editor.html(),
        "<table><tbody>\
         <tr><td>a</td><td rowspan=\"2\">b</td></tr>\
         <tr><td><br></td></tr>\
         <tr><td>c</td><td>d</td></tr>\
         </tbody></table>"
    );
}

#[test]
fn split_merged_cell_undoes_the_span() {
    let mut editor = editor_in(
        "<table><tr><td rowspan=\"2\">a</td><td>b</td></tr><tr><td>c</td></tr></table>",
        "a",
    );
    editor.run_command("splitcell", Some(json!("vertical"))).unwrap();
    assert_eq!(
        editor.html(),
        "<table><tbody>\
         <tr><td>a</td><td>b</td></tr>\
         <tr><td><br></td><td>c</td></tr>\
         </tbody></table>"
    );
}

#[test]
fn modify_cell_applies_to_the_whole_row() {
    let mut editor = editor_in(QUAD, "b");
    editor
        .run_command(
            "modifycell",
            Some(json!({ "_applyTo": "row", "width": "50", "cellType": "header" })),
        )
        .unwrap();
    assert_eq!(
        editor.html(),
        "<table><tbody>\
         <tr><th width=\"50\">a</th><th width=\"50\">b</th></tr>\
         <tr><td>c</td><td>d</td></tr>\
         </tbody></table>"
    );

    let err = editor
        .run_command("modifycell", Some(json!({ "cellType": "footer" })))
        .unwrap_err();
    assert!(matches!(err, CommandError::InvalidArgs { .. }));
}

#[test]
fn modify_table_sets_and_clears_attributes() {
    let mut editor = editor_in("<table border=\"1\"><tr><td>a</td></tr></table>", "a");
    editor
        .run_command("modifytable", Some(json!({ "border": "", "width": "100%" })))
        .unwrap();
    assert_eq!(
        editor.html(),
        "<table width=\"100%\"><tbody><tr><td>a</td></tr></tbody></table>"
    );
}

#[test]
fn ensure_paragraph_only_for_top_level_tables() {
    let mut editor = editor_in("<table><tr><td>a</td></tr></table>", "a");
    editor.run_command("ensureparagraph", Some(json!("after"))).unwrap();
    assert_eq!(
        editor.html(),
        "<table><tbody><tr><td>a</td></tr></tbody></table><p><br></p>"
    );

    let mut nested = editor_in(
        "<table><tr><td><table><tr><td>inner</td></tr></table></td></tr></table>",
        "inner",
    );
    let before = nested.html();
    nested.run_command("ensureparagraph", Some(json!("before"))).unwrap();
    assert_eq!(nested.html(), before);
}

#[test]
fn table_query_reports_grid_and_caret_cell() {
    let editor = editor_in(GRID, "b3");
    let state = editor.query_state_json("table").unwrap();
    assert_eq!(state["inTable"], json!(true));
    assert_eq!(state["rows"], json!(3));
    assert_eq!(state["cols"], json!(3));
    assert_eq!(state["cell"]["col"], json!(2));
    assert_eq!(state["cell"]["row"], json!(1));

    let outside = Editor::from_html("<p>x</p>");
    assert_eq!(outside.query_state_json("table").unwrap(), json!({ "inTable": false }));
    assert!(!outside.query_state::<bool>("insertrow").unwrap());
}
