use rte_core::{CommandRegistry, Dom, Editor, EditorConfig};
use serde_json::json;

fn plain_paste(editor: &mut Editor, text: &str) {
    editor
        .run_command("paste", Some(json!({ "mode": "plaintext", "text": text })))
        .unwrap();
}

#[test]
fn undo_redo_restores_markup_and_selection() {
    let mut editor = Editor::with_core_commands();
    let root = editor.dom().root();
    editor
        .run_command("createtable", Some(json!({ "rows": 1, "columns": 1 })))
        .unwrap();
    let with_table = editor.html();
    let cell = editor.dom().first_descendant_tagged(root, "td").unwrap();
    assert_eq!(editor.selection().start.node, cell);
    assert!(editor.can_undo());

    assert!(editor.undo());
    assert_eq!(editor.html(), "<p><br></p>");
    assert_eq!(editor.selection().start.node, root);
    assert!(!editor.can_undo());
    assert!(editor.can_redo());

    assert!(editor.redo());
    assert_eq!(editor.html(), with_table);
    assert_eq!(editor.selection().start.node, cell);
    assert!(!editor.redo());
}

#[test]
fn new_change_clears_redo() {
    let mut editor = Editor::from_html("<p>x</p>");
    plain_paste(&mut editor, "a");
    plain_paste(&mut editor, "b");
    assert_eq!(editor.html(), "<p>xab</p>");

    assert!(editor.undo());
    assert_eq!(editor.html(), "<p>xa</p>");
    assert!(editor.can_redo());

    plain_paste(&mut editor, "c");
    assert!(!editor.can_redo());
    assert_eq!(editor.html(), "<p>xac</p>");
}

#[test]
fn unchanged_markup_leaves_no_history() {
    let mut editor = Editor::from_html("<p>x</p>");
    editor.run_command("insertrow", None).unwrap();
    editor.run_command("outdent", None).unwrap();
    assert!(!editor.can_undo());
    assert!(!editor.undo());
}

#[test]
fn history_is_bounded() {
    let config = EditorConfig {
        max_undo: 2,
        ..EditorConfig::default()
    };
    let mut editor = Editor::new(Dom::from_html("<p>x</p>"), CommandRegistry::core(), config);
    for _ in 0..3 {
        plain_paste(&mut editor, "a");
    }
    assert_eq!(editor.html(), "<p>xaaa</p>");

    assert!(editor.undo());
    assert!(editor.undo());
    assert_eq!(editor.html(), "<p>xa</p>");
    assert!(!editor.undo());
}

#[test]
fn direct_tree_edits_drop_redo() {
    let mut editor = Editor::from_html("<p>x</p>");
    plain_paste(&mut editor, "y");
    editor.undo();
    assert!(editor.can_redo());

    let root = editor.dom().root();
    let p = editor.dom_mut().create_element("p");
    editor.dom_mut().append_child(root, p);
    assert!(!editor.can_redo());
    assert!(!editor.can_undo());
}
