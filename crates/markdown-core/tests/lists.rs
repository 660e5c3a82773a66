use serde_json::json;
use ti_markdown_core::{
    Editor, EditorFactory, ElementNode, LIST, LIST_ITEM, Location, Node, Point, indent_list,
    outdent_list,
};

fn editor(children: Vec<Node>) -> Editor {
    Editor::new(EditorFactory::markdown().unwrap(), children).unwrap()
}

fn cursor(path: &[usize], offset: usize) -> Point {
    Point::new(path.to_vec(), offset)
}

fn list(ordered: bool, items: Vec<Node>) -> Node {
    Node::Element(ElementNode::new(LIST, items).with_attr("ordered", ordered))
}

fn item(children: Vec<Node>) -> Node {
    Node::element(LIST_ITEM, children)
}

fn nested() -> Node {
    list(
        false,
        vec![item(vec![Node::paragraph("a"), Node::list(false, &["b"])])],
    )
}

#[test]
fn first_item_cannot_be_indented() {
    let mut editor = editor(vec![Node::list(false, &["a", "b"])]);
    editor.select(cursor(&[0, 0, 0, 0], 0));
    let state = &editor.actions(None, Some(&["indent-list"]))[0].state;
    assert!(state.disabled);
    assert!(!editor.run_action("indent-list", None).unwrap());

    let first = editor.entry_at(&[0, 0]).unwrap();
    assert!(!indent_list(&mut editor, &first, None, None).unwrap());
    assert_eq!(editor.children()[0], Node::list(false, &["a", "b"]));
}

#[test]
fn indent_nests_under_the_previous_item() {
    let mut editor = editor(vec![Node::list(false, &["a", "b"])]);
    editor.select(cursor(&[0, 1, 0, 0], 0));
    assert!(editor.run_action("indent-list", None).unwrap());
    assert_eq!(editor.children()[0], nested());
}

#[test]
fn indent_can_change_the_sublist_kind() {
    let mut editor = editor(vec![Node::list(false, &["a", "b"])]);
    let at = Location::from(cursor(&[0, 1, 0, 0], 0));
    let params = json!({ "ordered": true });
    let serde_json::Value::Object(params) = params else {
        panic!("expected object");
    };
    assert!(
        editor
            .run_action_with_params("indent-list", Some(&at), params)
            .unwrap()
    );
    assert_eq!(
        editor.children()[0],
        list(
            false,
            vec![item(vec![Node::paragraph("a"), Node::list(true, &["b"])])]
        )
    );
}

#[test]
fn outdent_lifts_a_nested_item_back() {
    let mut editor = editor(vec![nested()]);
    let b = editor.entry_at(&[0, 0, 1, 0]).unwrap();
    assert!(outdent_list(&mut editor, &b).unwrap());
    assert_eq!(editor.children()[0], Node::list(false, &["a", "b"]));
}

#[test]
fn outdent_at_the_top_splits_the_list() {
    let mut editor = editor(vec![Node::list(false, &["a", "b", "c"])]);
    editor.select(cursor(&[0, 1, 0, 0], 0));
    assert!(editor.run_action("outdent-list", None).unwrap());
    assert_eq!(
        editor.children(),
        vec![
            Node::list(false, &["a"]),
            Node::paragraph("b"),
            Node::list(false, &["c"]),
            Node::paragraph(""),
        ]
    );
}

#[test]
fn outdent_is_disabled_outside_lists() {
    let mut editor = editor(vec![Node::paragraph("x")]);
    editor.select(cursor(&[0, 0], 0));
    let state = &editor.actions(None, Some(&["outdent-list"]))[0].state;
    assert!(state.disabled);
}

#[test]
fn backspace_at_item_start_outdents() {
    let mut editor = editor(vec![Node::list(false, &["a", "b"])]);
    editor.select(cursor(&[0, 1, 0, 0], 0));
    editor.delete_backward().unwrap();
    assert_eq!(
        editor.children(),
        vec![Node::list(false, &["a"]), Node::paragraph("b"), Node::paragraph("")]
    );
}

#[test]
fn ordered_prefix_from_one_carries_no_start() {
    let mut editor = editor(vec![Node::paragraph("")]);
    editor.select(cursor(&[0, 0], 0));
    for ch in ["1", ".", " ", "x"] {
        editor.insert_text(ch).unwrap();
    }
    assert_eq!(editor.children()[0], Node::list(true, &["x"]));
}
