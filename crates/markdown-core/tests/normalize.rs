use proptest::prelude::*;
use ti_markdown_core::{
    BLOCKQUOTE, CODE, Decorator, Editor, EditorConfig, EditorError, EditorFactory, HEADING, HTML,
    LINK, LIST, LIST_ITEM, Marks, Node, PARAGRAPH, TABLE, TABLE_CELL, TABLE_ROW, THEMATIC_BREAK,
};

fn editor(children: Vec<Node>) -> Editor {
    Editor::new(EditorFactory::markdown().unwrap(), children).unwrap()
}

#[test]
fn empty_document_gets_one_paragraph() {
    let editor = editor(Vec::new());
    assert_eq!(editor.children(), vec![Node::paragraph("")]);
}

#[test]
fn document_always_ends_in_a_paragraph() {
    let editor = editor(vec![Node::heading(1, "Title")]);
    assert_eq!(
        editor.children(),
        vec![Node::heading(1, "Title"), Node::paragraph("")]
    );
}

#[test]
fn empty_containers_are_pruned() {
    let editor = editor(vec![
        Node::blockquote(Vec::new()),
        Node::element(LIST, vec![Node::element(LIST_ITEM, Vec::new())]),
        Node::paragraph("kept"),
    ]);
    assert_eq!(editor.children(), vec![Node::paragraph("kept")]);
}

#[test]
fn stray_children_get_the_default_wrapper() {
    let editor = editor(vec![
        Node::element(LIST, vec![Node::paragraph("loose")]),
        Node::text("bare"),
    ]);
    assert_eq!(
        editor.children(),
        vec![
            Node::element(
                LIST,
                vec![Node::element(LIST_ITEM, vec![Node::paragraph("loose")])]
            ),
            Node::paragraph("bare"),
        ]
    );
}

#[test]
fn blocks_inside_phrasing_are_lifted() {
    let editor = editor(vec![Node::element(
        PARAGRAPH,
        vec![Node::text("a"), Node::heading(2, "b")],
    )]);
    assert_eq!(editor.children(), vec![Node::paragraph("ab")]);
}

#[test]
fn value_containers_keep_only_plain_text() {
    let strong = Marks::default().with(Decorator::Strong);
    let editor = editor(vec![Node::element(
        CODE,
        vec![Node::link("https://example.com", "x"), Node::styled("y", strong)],
    )]);
    assert_eq!(
        editor.children()[0],
        Node::element(CODE, vec![Node::text("xy")])
    );
}

#[test]
fn inline_code_clears_other_decorators() {
    let marks = Marks::default()
        .with(Decorator::Strong)
        .with(Decorator::Emphasis)
        .with(Decorator::InlineCode);
    let editor = editor(vec![Node::element(
        PARAGRAPH,
        vec![Node::styled("code", marks)],
    )]);
    assert_eq!(
        editor.children(),
        vec![Node::element(
            PARAGRAPH,
            vec![Node::styled(
                "code",
                Marks::default().with(Decorator::InlineCode)
            )]
        )]
    );
}

#[test]
fn empty_text_drops_decorators_and_neighbours_merge() {
    let strong = Marks::default().with(Decorator::Strong);
    let editor = editor(vec![
        Node::element(PARAGRAPH, vec![Node::styled("", strong)]),
        Node::element(
            PARAGRAPH,
            vec![Node::text("a"), Node::styled("", strong), Node::text("b")],
        ),
    ]);
    assert_eq!(
        editor.children(),
        vec![Node::paragraph(""), Node::paragraph("ab")]
    );
}

#[test]
fn void_elements_lose_their_children() {
    let editor = editor(vec![Node::element(
        THEMATIC_BREAK,
        vec![Node::text("ignored")],
    )]);
    assert_eq!(
        editor.children(),
        vec![Node::thematic_break(), Node::paragraph("")]
    );
}

#[test]
fn blank_links_are_removed() {
    let editor = editor(vec![Node::element(
        PARAGRAPH,
        vec![Node::text("a "), Node::link("https://example.com", " ")],
    )]);
    assert_eq!(editor.children(), vec![Node::paragraph("a ")]);
}

#[test]
fn short_table_rows_are_padded() {
    let editor = editor(vec![Node::table(&[&["a", "b"], &["c"]])]);
    let Node::Element(table) = &editor.children()[0] else {
        panic!("expected table");
    };
    let Node::Element(row) = &table.children[1] else {
        panic!("expected row");
    };
    assert_eq!(row.children.len(), 2);
    assert_eq!(row.children[1], Node::element(TABLE_CELL, vec![Node::text("")]));
}

#[test]
fn adjacent_lists_merge_once_their_separator_is_gone() {
    let mut editor = editor(vec![
        Node::list(false, &["a"]),
        Node::paragraph("between"),
        Node::list(false, &["b"]),
    ]);
    assert_eq!(editor.children().len(), 4);

    editor.remove_node(&[1]).unwrap();
    assert_eq!(
        editor.children(),
        vec![Node::list(false, &["a", "b"]), Node::paragraph("")]
    );
}

#[test]
fn lists_of_different_kinds_stay_apart() {
    let editor = editor(vec![Node::list(false, &["a"]), Node::list(true, &["b"])]);
    assert_eq!(
        editor.children(),
        vec![
            Node::list(false, &["a"]),
            Node::list(true, &["b"]),
            Node::paragraph(""),
        ]
    );
}

#[test]
fn trailing_paragraph_in_an_item_starts_a_new_item() {
    let item = Node::element(
        LIST_ITEM,
        vec![Node::paragraph("first"), Node::paragraph("second")],
    );
    let list = Node::Element(
        ti_markdown_core::ElementNode::new(LIST, vec![item]).with_attr("ordered", false),
    );
    let editor = editor(vec![list]);
    assert_eq!(editor.children()[0], Node::list(false, &["first", "second"]));
}

#[test]
fn normalization_budget_is_reported() {
    let config = EditorConfig {
        max_normalize_iterations: 1,
        ..EditorConfig::default()
    };
    let nested = Node::blockquote(vec![Node::blockquote(vec![Node::blockquote(vec![
        Node::text("deep"),
    ])])]);
    let err = Editor::with_config(EditorFactory::markdown().unwrap(), config, vec![nested])
        .unwrap_err();
    assert!(matches!(err, EditorError::NormalizeDidNotConverge { .. }));
}

fn marks() -> impl Strategy<Value = Marks> {
    (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
        |(strong, emphasis, delete, inline_code)| Marks {
            strong,
            emphasis,
            delete,
            inline_code,
        },
    )
}

const TYPES: [&str; 11] = [
    PARAGRAPH, HEADING, BLOCKQUOTE, LIST, LIST_ITEM, CODE, TABLE, TABLE_ROW, TABLE_CELL, LINK, HTML,
];

fn fragment_node() -> impl Strategy<Value = Node> {
    let leaf = prop_oneof![
        4 => ("[a-z ]{0,6}", marks()).prop_map(|(text, marks)| Node::styled(text, marks)),
        1 => Just(Node::image("https://example.com/a.png", "a")),
        1 => Just(Node::thematic_break()),
    ];
    leaf.prop_recursive(3, 32, 4, |inner| {
        (
            proptest::sample::select(TYPES.to_vec()),
            prop::collection::vec(inner, 0..4),
        )
            .prop_map(|(ty, children)| Node::element(ty, children))
    })
}

fn assert_no_empty_blocks(node: &Node) {
    let Node::Element(el) = node else {
        return;
    };
    let void = matches!(el.ty.as_str(), "image" | THEMATIC_BREAK);
    assert!(void || !el.children.is_empty(), "empty {}", el.ty);
    el.children.iter().for_each(assert_no_empty_blocks);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn normalizing_twice_changes_nothing(
        fragment in prop::collection::vec(fragment_node(), 0..5)
    ) {
        let factory = EditorFactory::markdown().unwrap();
        let once = Editor::new(factory.clone(), fragment).unwrap().children();
        let twice = Editor::new(factory, once.clone()).unwrap().children();
        prop_assert_eq!(&once, &twice);

        prop_assert!(!once.is_empty());
        prop_assert_eq!(once.last().and_then(Node::element_type), Some(PARAGRAPH));
        once.iter().for_each(assert_no_empty_blocks);
    }
}

#[test]
fn large_lists_are_repaired_item_by_item() {
    let paragraphs = (0..2000)
        .map(|ix| Node::paragraph(format!("item {ix}")))
        .collect();
    let editor = editor(vec![Node::element(LIST, paragraphs)]);
    let Node::Element(list) = &editor.children()[0] else {
        panic!("expected list");
    };
    assert_eq!(list.children.len(), 2000);
    assert!(
        list.children
            .iter()
            .all(|item| item.element_type() == Some(LIST_ITEM))
    );
    assert_eq!(list.children[1999].string(), "item 1999");
}
