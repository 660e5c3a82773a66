use ti_markdown_core::{
    Attrs, BLOCKQUOTE, Editor, EditorFactory, HEADING, LIST, LIST_ITEM, Node, PARAGRAPH,
    TABLE_CELL, ToggleStrategy,
};

fn editor(children: Vec<Node>) -> Editor {
    Editor::new(EditorFactory::markdown().unwrap(), children).unwrap()
}

fn depth(value: u64) -> Attrs {
    Attrs::from([("depth".to_string(), value.into())])
}

#[test]
fn paragraph_and_heading_replace_each_other() {
    let mut editor = editor(vec![Node::paragraph("title")]);
    let paragraph = editor.entry_at(&[0]).unwrap();
    let heading = editor.config_for(HEADING).unwrap();

    let (target, strategy) = editor.can_toggle(&paragraph, &heading, false).unwrap();
    assert_eq!(target, paragraph);
    assert_eq!(strategy, ToggleStrategy::Replace);

    assert!(editor.toggle(&paragraph, &heading, depth(2)).unwrap());
    assert_eq!(editor.children()[0], Node::heading(2, "title"));

    let entry = editor.entry_at(&[0]).unwrap();
    assert!(editor.toggle_to(&entry, PARAGRAPH, Attrs::new()).unwrap());
    assert_eq!(editor.children()[0], Node::paragraph("title"));
}

#[test]
fn toggling_strips_the_old_attributes() {
    let mut editor = editor(vec![Node::heading(3, "x")]);
    let entry = editor.entry_at(&[0]).unwrap();
    editor.toggle_to(&entry, PARAGRAPH, Attrs::new()).unwrap();
    let Node::Element(el) = &editor.children()[0] else {
        panic!("expected paragraph");
    };
    assert!(el.attrs.is_empty());
}

#[test]
fn blockquote_toggles_by_wrapping() {
    let mut editor = editor(vec![Node::paragraph("quote me")]);
    let paragraph = editor.entry_at(&[0]).unwrap();
    let quote = editor.config_for(BLOCKQUOTE).unwrap();

    let (_, strategy) = editor.can_toggle(&paragraph, &quote, false).unwrap();
    assert_eq!(strategy, ToggleStrategy::Wrap);
    assert!(editor.toggle(&paragraph, &quote, Attrs::new()).unwrap());
    assert_eq!(
        editor.children(),
        vec![
            Node::blockquote(vec![Node::paragraph("quote me")]),
            Node::paragraph(""),
        ]
    );
}

#[test]
fn toggle_searches_ancestors_only_when_asked() {
    let editor = editor(vec![Node::paragraph("text")]);
    let text = editor.entry_at(&[0, 0]).unwrap();
    let heading = editor.config_for(HEADING).unwrap();

    assert!(editor.can_toggle(&text, &heading, false).is_none());
    let (target, _) = editor.can_toggle(&text, &heading, true).unwrap();
    assert_eq!(target.path, vec![0]);
}

#[test]
fn wrap_then_unwrap_restores_the_tree() {
    let mut editor = editor(vec![Node::paragraph("one"), Node::paragraph("two")]);
    let before = editor.children();
    let list = editor.config_for(LIST).unwrap();
    let item = editor.config_for(LIST_ITEM).unwrap();
    let paragraph = editor.entry_at(&[0]).unwrap();

    assert!(editor.can_wrap(&paragraph, &[&list, &item]));
    let ordered = Attrs::from([("ordered".to_string(), false.into())]);
    assert!(
        editor
            .wrap(&paragraph, &[&list, &item], &[ordered, Attrs::new()])
            .unwrap()
    );
    assert_eq!(editor.children()[0], Node::list(false, &["one"]));

    let wrapped = editor.entry_at(&[0]).unwrap();
    assert!(editor.can_unwrap(&wrapped, &[&list, &item]));
    assert!(editor.unwrap(&wrapped, &[&list, &item]).unwrap());
    assert_eq!(editor.children(), before);
}

#[test]
fn unwrap_requires_an_exact_chain() {
    let editor = editor(vec![Node::list(false, &["a"])]);
    let list = editor.config_for(LIST).unwrap();
    let quote = editor.config_for(BLOCKQUOTE).unwrap();
    let entry = editor.entry_at(&[0]).unwrap();

    assert!(!editor.can_unwrap(&entry, &[&quote]));
    // Items cannot stand directly in the root.
    assert!(!editor.can_unwrap(&entry, &[&list]));
}

#[test]
fn table_cell_cannot_be_wrapped_in_a_list() {
    let editor = editor(vec![Node::table(&[&["cell"]])]);
    let cell = editor.entry_at(&[0, 0, 0]).unwrap();
    assert!(editor.node(cell.id).unwrap().is_type(TABLE_CELL));

    let list = editor.config_for(LIST).unwrap();
    let item = editor.config_for(LIST_ITEM).unwrap();
    assert!(!editor.can_wrap(&cell, &[&list, &item]));
    assert!(!editor.can_wrap(&cell, &[&item]));
    assert!(!editor.can_wrap(&cell, &[&list]));
}

#[test]
fn infeasible_edits_leave_the_tree_alone() {
    let mut editor = editor(vec![Node::table(&[&["cell"]])]);
    editor.take_operations();
    let before = editor.children();
    let cell = editor.entry_at(&[0, 0, 0]).unwrap();
    let list = editor.config_for(LIST).unwrap();
    let item = editor.config_for(LIST_ITEM).unwrap();

    assert!(!editor.wrap(&cell, &[&list, &item], &[]).unwrap());
    assert!(!editor.toggle_to(&cell, "no-such-type", Attrs::new()).unwrap());
    assert_eq!(editor.children(), before);
    assert!(editor.take_operations().is_empty());
}
