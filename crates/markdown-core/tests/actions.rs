use serde_json::{Map, Value, json};
use ti_markdown_core::{
    ActionType, CODE, Decorator, Editor, EditorError, EditorFactory, KeyEvent, Location, Marks,
    Node, PARAGRAPH, Point, Range, TABLE, TABLE_ROW,
};

fn editor(children: Vec<Node>) -> Editor {
    Editor::new(EditorFactory::markdown().unwrap(), children).unwrap()
}

fn cursor(path: &[usize], offset: usize) -> Point {
    Point::new(path.to_vec(), offset)
}

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

fn state_of(editor: &Editor, key: &str) -> (bool, bool) {
    let instances = editor.actions(None, Some(&[key]));
    let state = &instances[0].state;
    (state.active, state.disabled)
}

#[test]
fn heading_actions_toggle_back_to_paragraph() {
    let mut editor = editor(vec![Node::paragraph("title")]);
    editor.select(cursor(&[0, 0], 2));
    assert_eq!(state_of(&editor, "toggle-heading-2"), (false, false));

    assert!(editor.run_action("toggle-heading-2", None).unwrap());
    assert_eq!(editor.children()[0], Node::heading(2, "title"));
    assert_eq!(state_of(&editor, "toggle-heading-2"), (true, false));
    assert_eq!(state_of(&editor, "toggle-heading-1"), (false, false));

    assert!(editor.run_action("toggle-heading-2", None).unwrap());
    assert_eq!(editor.children()[0], Node::paragraph("title"));
}

#[test]
fn heading_depth_can_be_overridden() {
    let mut editor = editor(vec![Node::paragraph("title")]);
    editor.select(cursor(&[0, 0], 0));
    editor
        .run_action_with_params("toggle-heading-1", None, params(json!({ "depth": 4 })))
        .unwrap();
    assert_eq!(editor.children()[0], Node::heading(4, "title"));
}

#[test]
fn blockquote_action_wraps_and_unwraps() {
    let mut editor = editor(vec![Node::paragraph("quote")]);
    editor.select(cursor(&[0, 0], 0));

    assert!(editor.run_action("toggle-blockquote", None).unwrap());
    assert_eq!(
        editor.children()[0],
        Node::blockquote(vec![Node::paragraph("quote")])
    );
    assert_eq!(state_of(&editor, "toggle-blockquote"), (true, false));

    assert!(editor.run_action("toggle-blockquote", None).unwrap());
    assert_eq!(editor.children()[0], Node::paragraph("quote"));
}

#[test]
fn list_actions_switch_ordering_in_place() {
    let mut editor = editor(vec![Node::paragraph("one")]);
    editor.select(cursor(&[0, 0], 0));

    assert!(editor.run_action("toggle-unordered-list", None).unwrap());
    assert_eq!(editor.children()[0], Node::list(false, &["one"]));
    assert_eq!(state_of(&editor, "toggle-unordered-list"), (true, false));
    assert_eq!(state_of(&editor, "toggle-ordered-list"), (false, false));

    assert!(editor.run_action("toggle-ordered-list", None).unwrap());
    assert_eq!(editor.children()[0], Node::list(true, &["one"]));

    assert!(editor.run_action("toggle-ordered-list", None).unwrap());
    assert_eq!(editor.children()[0], Node::paragraph("one"));
}

#[test]
fn code_block_action_uses_the_default_language() {
    let mut editor = editor(vec![Node::paragraph("let x = 1;")]);
    editor.select(cursor(&[0, 0], 0));

    assert!(editor.run_action("toggle-codeblock", None).unwrap());
    assert_eq!(editor.children()[0], Node::code("markdown", "let x = 1;"));
    assert_eq!(state_of(&editor, "toggle-codeblock"), (true, false));

    assert!(editor.run_action("toggle-codeblock", None).unwrap());
    assert_eq!(editor.children()[0], Node::paragraph("let x = 1;"));
    assert_eq!(editor.children()[0].element_type(), Some("paragraph"));
    assert_ne!(editor.children()[0].element_type(), Some(CODE));
}

#[test]
fn table_actions_edit_rows_and_columns() {
    let mut editor = editor(vec![Node::paragraph("cell")]);
    editor.select(cursor(&[0, 0], 0));

    assert!(editor.run_action("toggle-table", None).unwrap());
    assert_eq!(
        editor.children()[0],
        Node::table(&[&["cell", ""], &["", ""]])
    );

    editor.select(cursor(&[0, 0, 0, 0], 0));
    assert!(editor.run_action("table-insert-row-below", None).unwrap());
    assert!(editor.run_action("table-insert-col-right", None).unwrap());
    assert_eq!(
        editor.children()[0],
        Node::table(&[&["cell", "", ""], &["", "", ""], &["", "", ""]])
    );

    editor.select(cursor(&[0, 1, 0, 0], 0));
    assert!(editor.run_action("table-delete-row", None).unwrap());
    let Node::Element(table) = &editor.children()[0] else {
        panic!("expected table");
    };
    assert_eq!(table.children.len(), 2);
    assert!(table.children.iter().all(|row| row.element_type() == Some(TABLE_ROW)));

    let inside = Location::from(cursor(&[0, 0, 0, 0], 0));
    assert!(editor.run_action("toggle-table", Some(&inside)).unwrap());
    assert_eq!(editor.children()[0], Node::paragraph("cell"));
    assert_ne!(editor.children()[0].element_type(), Some(TABLE));
}

#[test]
fn table_edits_are_disabled_outside_tables() {
    let mut editor = editor(vec![Node::paragraph("text")]);
    editor.select(cursor(&[0, 0], 0));
    assert_eq!(state_of(&editor, "table-delete-row"), (false, true));
    assert!(!editor.run_action("table-delete-row", None).unwrap());
}

#[test]
fn mark_actions_style_the_selected_text() {
    let mut editor = editor(vec![Node::paragraph("hello world")]);
    let hello = Range::new(cursor(&[0, 0], 0), cursor(&[0, 0], 5));
    editor.set_selection(Some(hello.clone()));

    assert!(editor.run_action("strong", None).unwrap());
    let strong = Marks::default().with(Decorator::Strong);
    assert_eq!(
        editor.children()[0],
        Node::element(
            "paragraph",
            vec![Node::styled("hello", strong), Node::text(" world")]
        )
    );

    editor.set_selection(Some(hello));
    assert_eq!(state_of(&editor, "strong"), (true, false));
    assert!(editor.key_down(&KeyEvent::new("b").ctrl()).unwrap());
    assert_eq!(editor.children()[0], Node::paragraph("hello world"));
}

#[test]
fn collapsed_mark_toggles_become_pending() {
    let mut editor = editor(vec![Node::paragraph("abc")]);
    editor.select(cursor(&[0, 0], 1));
    assert!(!editor.is_mark_active(Decorator::Emphasis));

    assert!(editor.run_action("emphasis", None).unwrap());
    assert!(editor.is_mark_active(Decorator::Emphasis));
    assert_eq!(editor.children()[0], Node::paragraph("abc"));
}

#[test]
fn marks_are_disabled_inside_code_blocks() {
    let mut editor = editor(vec![Node::code("rust", "fn main() {}")]);
    editor.set_selection(Some(Range::new(cursor(&[0, 0], 0), cursor(&[0, 0], 2))));
    assert_eq!(state_of(&editor, "strong"), (false, true));
    assert!(!editor.run_action("strong", None).unwrap());
}

#[test]
fn link_action_wraps_and_unwraps_the_selection() {
    let mut editor = editor(vec![Node::paragraph("see docs")]);
    editor.set_selection(Some(Range::new(cursor(&[0, 0], 4), cursor(&[0, 0], 8))));

    let url = params(json!({ "url": "https://example.com" }));
    assert!(
        editor
            .run_action_with_params("toggle-link", None, url)
            .unwrap()
    );
    assert_eq!(
        editor.children()[0],
        Node::element(
            "paragraph",
            vec![
                Node::text("see "),
                Node::link("https://example.com", "docs"),
                Node::text(" "),
            ]
        )
    );

    editor.select(cursor(&[0, 1, 0], 1));
    assert_eq!(state_of(&editor, "toggle-link"), (true, false));
    assert!(editor.run_action("toggle-link", None).unwrap());
    assert_eq!(editor.children()[0], Node::paragraph("see docs "));
}

#[test]
fn link_and_image_need_a_url() {
    let mut editor = editor(vec![Node::paragraph("x")]);
    editor.select(cursor(&[0, 0], 1));
    assert!(!editor.run_action("toggle-link", None).unwrap());
    assert!(!editor.run_action("toggle-image", None).unwrap());
    assert_eq!(editor.children(), vec![Node::paragraph("x")]);
}

#[test]
fn image_action_pads_the_image_with_spaces() {
    let mut editor = editor(vec![Node::paragraph("x")]);
    editor.select(cursor(&[0, 0], 1));
    let image = params(json!({ "url": "https://example.com/a.png", "alt": "a" }));
    assert!(
        editor
            .run_action_with_params("toggle-image", None, image)
            .unwrap()
    );
    assert_eq!(
        editor.children()[0],
        Node::element(
            "paragraph",
            vec![
                Node::text("x "),
                Node::image("https://example.com/a.png", "a"),
                Node::text(" "),
            ]
        )
    );
}

#[test]
fn unknown_actions_are_errors() {
    let mut editor = editor(vec![Node::paragraph("x")]);
    editor.select(cursor(&[0, 0], 0));
    let err = editor.run_action("no-such-action", None).unwrap_err();
    assert!(matches!(err, EditorError::UnknownAction(key) if key == "no-such-action"));
}

#[test]
fn actions_without_a_location_do_nothing() {
    let mut editor = editor(vec![Node::paragraph("x")]);
    assert!(editor.selection().is_none());
    assert!(!editor.run_action("toggle-heading-1", None).unwrap());
    assert!(
        editor
            .actions(None, None)
            .iter()
            .all(|instance| instance.state.disabled)
    );
}

#[test]
fn toolbar_groups_name_registered_actions() {
    let factory = EditorFactory::markdown().unwrap();
    let line: Vec<&String> = factory.line_actions().iter().flatten().collect();
    assert!(!line.is_empty());
    for key in line.iter().copied().chain(factory.selection_actions()) {
        assert!(factory.action(key).is_some(), "missing action {key}");
    }
    assert_eq!(
        factory.action("strong").map(|action| action.ty),
        Some(ActionType::Selection)
    );
    assert_eq!(
        factory
            .action_for_hotkey(&KeyEvent::new("i").meta())
            .map(|action| action.key.as_str()),
        Some("emphasis")
    );
}

#[test]
fn top_level_actions_insert_blocks() {
    let mut editor = editor(vec![Node::heading(1, "a"), Node::paragraph("b")]);
    let first = Location::from(vec![0, 0]);
    assert!(editor.run_action("insert-paragraph", Some(&first)).unwrap());
    assert_eq!(editor.children()[0], Node::paragraph(""));
    assert_eq!(editor.children()[1], Node::heading(1, "a"));

    let heading = Location::from(vec![1]);
    assert!(
        editor
            .run_action("insert-thematic-break", Some(&heading))
            .unwrap()
    );
    assert_eq!(editor.children()[2], Node::thematic_break());
}

#[test]
fn quotes_nest_and_unnest_one_level_at_a_time() {
    let mut editor = editor(vec![Node::blockquote(vec![Node::paragraph("q")])]);
    editor.select(cursor(&[0, 0, 0], 0));
    assert_eq!(state_of(&editor, "indent-blockquote"), (false, false));
    assert_eq!(state_of(&editor, "outdent-blockquote"), (true, false));

    assert!(editor.run_action("indent-blockquote", None).unwrap());
    assert_eq!(
        editor.children()[0],
        Node::blockquote(vec![Node::blockquote(vec![Node::paragraph("q")])])
    );

    assert!(editor.run_action("outdent-blockquote", None).unwrap());
    assert!(editor.run_action("outdent-blockquote", None).unwrap());
    assert_eq!(editor.children()[0], Node::paragraph("q"));
    assert_eq!(state_of(&editor, "outdent-blockquote"), (false, true));
    assert!(!editor.run_action("outdent-blockquote", None).unwrap());
}

#[test]
fn removing_a_table_keeps_its_text() {
    let mut editor = editor(vec![Node::table(&[&["a", "b"], &["c", "d"]])]);
    editor.select(cursor(&[0, 1, 1, 0], 1));
    assert_eq!(state_of(&editor, "remove-selection-table"), (true, false));

    assert!(editor.run_action("remove-selection-table", None).unwrap());
    assert_eq!(editor.children()[0], Node::paragraph("a b c d"));
    assert_eq!(state_of(&editor, "remove-selection-table"), (false, true));
}

#[test]
fn images_go_into_a_new_paragraph_above_an_empty_one() {
    let mut editor = editor(vec![Node::paragraph("text"), Node::paragraph("")]);
    let state_at = |editor: &Editor, index: usize| {
        let at = Location::from(vec![index]);
        let instances = editor.actions(Some(&at), Some(&["insert-image"]));
        (instances[0].state.active, instances[0].state.disabled)
    };
    assert_eq!(state_at(&editor, 0), (false, true));
    assert_eq!(state_at(&editor, 1), (false, false));

    let empty = Location::from(vec![1]);
    assert!(!editor.run_action("insert-image", Some(&empty)).unwrap());

    let url = params(json!({ "url": "https://example.com/a.png" }));
    assert!(
        editor
            .run_action_with_params("insert-image", Some(&empty), url)
            .unwrap()
    );
    assert_eq!(
        editor.children()[1],
        Node::element(
            PARAGRAPH,
            vec![
                Node::text(" "),
                Node::image("https://example.com/a.png", "no-alt"),
                Node::text(" "),
            ]
        )
    );
    assert_eq!(editor.children()[2], Node::paragraph(""));
    assert_eq!(state_at(&editor, 1), (true, true));
}
