use std::sync::Arc;

use ti_markdown_core::{
    ContentType, DecoratedRange, Editor, EditorFactory, ElementConfig, Node, Point, Range,
    builtin_plugins,
};

fn markdown(children: Vec<Node>) -> Editor {
    Editor::new(EditorFactory::markdown().unwrap(), children).unwrap()
}

#[test]
fn code_blocks_are_highlighted() {
    let source = "fn main() {}";
    let editor = markdown(vec![Node::code("rust", source)]);
    let decorations = editor.decorations();

    assert!(!decorations.is_empty());
    for decoration in &decorations {
        let (start, end) = decoration.range.edges();
        assert_eq!(start.path, vec![0, 0]);
        assert_eq!(end.path, vec![0, 0]);
        assert!(start.offset < end.offset);
        assert!(end.offset <= source.len());
        assert!(!decoration.token.is_empty());
    }
    assert!(decorations.iter().any(|d| d.range.start().offset == 0));
}

#[test]
fn unknown_languages_and_plain_blocks_are_left_alone() {
    let editor = markdown(vec![
        Node::code("no-such-language", "whatever"),
        Node::paragraph("fn main() {}"),
        Node::heading(1, "let x = 1;"),
    ]);
    assert!(editor.decorations().is_empty());
}

fn boxed_factory() -> Arc<EditorFactory> {
    let mut factory = EditorFactory::new();
    for plugin in builtin_plugins() {
        factory.use_plugin(plugin.as_ref()).unwrap();
    }
    let boxed = ElementConfig::block("box", ContentType::Flow, Some(ContentType::Flow)).decorate(
        |editor, entry, _| {
            let Some(len) = editor
                .node(entry.id)
                .and_then(|node| node.text().map(str::len))
            else {
                return Vec::new();
            };
            vec![DecoratedRange {
                range: Range::new(
                    Point::new(entry.path.clone(), 0),
                    Point::new(entry.path.clone(), len),
                ),
                token: "box".to_string(),
            }]
        },
    );
    factory.define_element(boxed).unwrap();
    factory.freeze();
    Arc::new(factory)
}

#[test]
fn nearest_decorating_ancestor_wins() {
    let editor = Editor::new(
        boxed_factory(),
        vec![
            Node::element(
                "box",
                vec![Node::paragraph("inside"), Node::code("rust", "let x = 1;")],
            ),
            Node::paragraph("outside"),
        ],
    )
    .unwrap();

    let decorations = editor.decorations();
    let boxed: Vec<_> = decorations.iter().filter(|d| d.token == "box").collect();
    assert_eq!(boxed.len(), 1);
    assert_eq!(boxed[0].range.start().path, vec![0, 0, 0]);
    assert_eq!(boxed[0].range.end().offset, "inside".len());

    // The code block decorates its own text instead of the box.
    assert!(
        decorations
            .iter()
            .filter(|d| d.range.start().path == vec![0, 1, 0])
            .all(|d| d.token != "box")
    );
    assert!(
        decorations
            .iter()
            .any(|d| d.range.start().path == vec![0, 1, 0])
    );
    assert!(
        decorations
            .iter()
            .all(|d| d.range.start().path.first() == Some(&0))
    );
}
