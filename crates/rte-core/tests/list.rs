use rte_core::list_utils::{
    create_list, get_item_for_dom, get_list_for_item, get_nesting_level, get_top_list_for_item,
    is_first_list_item, is_item_empty, is_last_list_item, is_list_empty, is_top_level_list,
    unlist_items,
};
use rte_core::{Dom, Editor, NodeId, Position, ProcessingSelection};
use serde_json::json;

fn text_node(dom: &Dom, text: &str) -> NodeId {
    dom.descendants(dom.root())
        .into_iter()
        .find(|n| dom.text(*n) == Some(text))
        .unwrap()
}

fn item(dom: &Dom, text: &str) -> NodeId {
    get_item_for_dom(dom, text_node(dom, text)).unwrap()
}

fn select_text(editor: &mut Editor, from: &str, to: &str) {
    let start = text_node(editor.dom(), from);
    let end = text_node(editor.dom(), to);
    let end_offset = to.len();
    editor.set_selection(ProcessingSelection::range(
        Position::new(start, 0),
        Position::new(end, end_offset),
    ));
}

#[test]
fn list_predicates() {
    let dom = Dom::from_html("<ul><li>a<ol><li>b</li><li><br></li></ol></li><li>c</li></ul>");
    let a = item(&dom, "a");
    let b = item(&dom, "b");
    let c = item(&dom, "c");
    let outer = get_list_for_item(&dom, a).unwrap();
    let inner = get_list_for_item(&dom, b).unwrap();

    assert_eq!(get_top_list_for_item(&dom, b), Some(outer));
    assert!(is_top_level_list(&dom, outer));
    assert!(!is_top_level_list(&dom, inner));
    assert_eq!(get_nesting_level(&dom, a), 0);
    assert_eq!(get_nesting_level(&dom, b), 1);
    assert!(is_first_list_item(&dom, a));
    assert!(!is_first_list_item(&dom, c));
    assert!(is_last_list_item(&dom, c));
    assert!(!is_list_empty(&dom, inner));

    let empty = dom.children(inner)[1];
    assert!(is_item_empty(&dom, empty));
    assert!(!is_item_empty(&dom, a));
}

#[test]
fn unlisting_middle_items_splits_the_list() {
    let mut dom = Dom::from_html("<ul><li>one</li><li>two</li><li>three</li><li>four</li></ul>");
    let items = vec![item(&dom, "two"), item(&dom, "three")];
    let created = unlist_items(&mut dom, &items, false, "p");
    assert_eq!(created.len(), 2);
    assert_eq!(
        dom.html(),
        "<ul><li>one</li></ul><p>two</p><p>three</p><ul><li>four</li></ul>"
    );
}

#[test]
fn unlisting_leading_items_places_paragraphs_before_the_list() {
    let mut dom = Dom::from_html("<ol><li>one</li><li>two</li><li>three</li></ol>");
    let items = vec![item(&dom, "one"), item(&dom, "two")];
    unlist_items(&mut dom, &items, false, "p");
    assert_eq!(dom.html(), "<p>one</p><p>two</p><ol><li>three</li></ol>");
}

#[test]
fn unlisting_nested_item_flattens_the_split_list() {
    let mut dom = Dom::from_html("<ul><li>a<ul><li>b</li><li>c</li></ul></li><li>d</li></ul>");
    let items = vec![item(&dom, "b")];
    unlist_items(&mut dom, &items, false, "p");
    assert_eq!(
        dom.html(),
        "<ul><li>a</li></ul><p>b</p><ul><li>c</li><li>d</li></ul>"
    );
}

#[test]
fn unlisting_nested_item_can_keep_the_structure() {
    let mut dom = Dom::from_html("<ul><li>a<ul><li>b</li><li>c</li></ul></li><li>d</li></ul>");
    let items = vec![item(&dom, "b")];
    unlist_items(&mut dom, &items, true, "p");
    assert_eq!(
        dom.html(),
        "<ul><li>a</li></ul><p>b</p><ul><li>&nbsp;<ul><li>c</li></ul></li><li>d</li></ul>"
    );
}

#[test]
fn unlisting_keeps_items_that_were_empty_before() {
    let mut dom = Dom::from_html("<ul><li>x</li><li><br></li><li>y</li><li>z</li></ul>");
    let items = vec![item(&dom, "y")];
    unlist_items(&mut dom, &items, false, "p");
    assert_eq!(
        dom.html(),
        "<ul><li>x</li><li><br></li></ul><p>y</p><ul><li>z</li></ul>"
    );
}

#[test]
fn create_list_then_unlist_preserves_content() {
    let mut dom = Dom::from_html("<p>one</p><h2>two</h2><p>three</p>");
    let blocks = dom.element_children(dom.root());
    let lists = create_list(&mut dom, &blocks, "ul", "p");
    assert_eq!(lists.len(), 1);
    assert_eq!(
        dom.html(),
        "<ul><li>one</li><li><h2>two</h2></li><li>three</li></ul>"
    );

    let items = dom.element_children(lists[0]);
    unlist_items(&mut dom, &items, false, "p");
    assert_eq!(dom.html(), "<p>one</p><h2>two</h2><p>three</p>");
}

#[test]
fn create_list_joins_an_adjacent_list_of_the_same_type() {
    let mut dom = Dom::from_html("<ul><li>one</li></ul><p>two</p>");
    let p = dom.element_children(dom.root())[1];
    create_list(&mut dom, &[p], "ul", "p");
    assert_eq!(dom.html(), "<ul><li>one</li><li>two</li></ul>");
}

#[test]
fn create_list_starts_a_list_per_cell() {
    let mut dom = Dom::from_html("<table><tr><td>a</td><td>b</td></tr></table>");
    let cells: Vec<NodeId> = ["a", "b"]
        .iter()
        .map(|t| dom.parent(text_node(&dom, t)).unwrap())
        .collect();
    let lists = create_list(&mut dom, &cells, "ol", "p");
    assert_eq!(lists.len(), 2);
    assert_eq!(
        dom.html(),
        "<table><tbody><tr>\
         <td><ol><li>a</li></ol></td><td><ol><li>b</li></ol></td>\
         </tr></tbody></table>"
    );
}

#[test]
fn toggle_unordered_list_on_and_off() {
    let mut editor = Editor::from_html("<p>one</p><p>two</p><p>three</p>");
    let original = editor.html();
    select_text(&mut editor, "one", "three");

    editor.run_command("insertunorderedlist", None).unwrap();
    assert_eq!(
        editor.html(),
        "<ul><li>one</li><li>two</li><li>three</li></ul>"
    );
    assert!(editor.query_state::<bool>("insertunorderedlist").unwrap());
    assert!(!editor.query_state::<bool>("insertorderedlist").unwrap());

    select_text(&mut editor, "one", "three");
    editor.run_command("insertunorderedlist", None).unwrap();
    assert_eq!(editor.html(), original);
}

#[test]
fn unlisting_selected_items_through_the_command() {
    let mut editor =
        Editor::from_html("<ul><li>one</li><li>two</li><li>three</li><li>four</li></ul>");
    select_text(&mut editor, "two", "three");
    editor.run_command("insertunorderedlist", None).unwrap();
    assert_eq!(
        editor.html(),
        "<ul><li>one</li></ul><p>two</p><p>three</p><ul><li>four</li></ul>"
    );
    assert_eq!(editor.selection().start.node, text_node(editor.dom(), "two"));
}

#[test]
fn ordered_list_command_retypes_an_unordered_list() {
    let mut editor = Editor::from_html("<ul><li>one</li><li>two</li></ul>");
    select_text(&mut editor, "one", "two");
    editor.run_command("insertorderedlist", None).unwrap();
    assert_eq!(editor.html(), "<ol><li>one</li><li>two</li></ol>");
}

#[test]
fn indent_and_outdent_move_items_between_levels() {
    let mut editor = Editor::from_html("<ul><li>a</li><li>b</li></ul>");
    let b = text_node(editor.dom(), "b");
    editor.set_caret(b, 0);

    assert!(editor.query_state::<bool>("indent").unwrap());
    editor.run_command("indent", None).unwrap();
    assert_eq!(editor.html(), "<ul><li>a<ul><li>b</li></ul></li></ul>");

    editor.run_command("outdent", None).unwrap();
    assert_eq!(editor.html(), "<ul><li>a</li><li>b</li></ul>");

    editor.run_command("outdent", Some(json!({ "keepStructure": false }))).unwrap();
    assert_eq!(editor.html(), "<ul><li>a</li></ul><p>b</p>");
}

#[test]
fn indent_outside_a_list_is_a_no_op() {
    let mut editor = Editor::from_html("<p>text</p>");
    let text = text_node(editor.dom(), "text");
    editor.set_caret(text, 0);
    editor.run_command("indent", None).unwrap();
    assert_eq!(editor.html(), "<p>text</p>");
    assert!(!editor.can_undo());
}

#[test]
fn unlisting_leaves_unrelated_adjacent_lists_alone() {
    let mut dom = Dom::from_html(
        "<ul><li>x</li></ul><ul><li>y</li></ul><p>sep</p>\
         <ul><li>one</li><li>two<ul><li>twoa</li><li>twob</li></ul></li><li>three</li></ul>",
    );
    let items = vec![item(&dom, "twoa")];
    unlist_items(&mut dom, &items, false, "p");
    assert_eq!(
        dom.html(),
        "<ul><li>x</li></ul><ul><li>y</li></ul><p>sep</p><ul><li>one</li><li>two</li></ul>\
         <p>twoa</p><ul><li>twob</li><li>three</li></ul>"
    );
}

#[test]
fn retyping_joins_only_the_neighbours_of_the_retyped_list() {
    let mut editor = Editor::from_html(
        "<ol><li>x</li></ol><ol><li>y</li></ol><p>sep</p><ul><li>a</li></ul><ol><li>b</li></ol>",
    );
    select_text(&mut editor, "a", "a");
    editor.run_command("insertorderedlist", None).unwrap();
    assert_eq!(
        editor.html(),
        "<ol><li>x</li></ol><ol><li>y</li></ol><p>sep</p><ol><li>a</li><li>b</li></ol>"
    );
}
