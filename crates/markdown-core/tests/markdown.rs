use std::sync::Arc;

use serde_json::json;
use ti_markdown_core::{
    Bullet, Decorator, Editor, EditorFactory, ElementNode, IMAGE, LINK, LIST, LIST_ITEM,
    MarkdownOptions, Marks, Node, PARAGRAPH, TABLE, TABLE_CELL, TABLE_ROW, builtin_plugins,
    generate_html, generate_markdown, parse_html, parse_markdown,
};

fn factory() -> Arc<EditorFactory> {
    EditorFactory::markdown().unwrap()
}

fn styled(text: &str, decorator: Decorator) -> Node {
    Node::styled(text, Marks::default().with(decorator))
}

const CORPUS: &[&str] = &[
    "# Title\n\nSome **bold** and *emphasis* text.\n",
    "- one\n- two\n  - nested\n- three\n",
    "3. third\n4. fourth\n",
    "1. one\n\n5) five\n",
    "- [x] done\n- [ ] todo\n",
    "> quoted\n>\n> - item\n",
    "```rust\nfn main() {\n    println!(\"hi\");\n}\n```\n",
    "| a | b |\n| --- | :-: |\n| 1 | 2 |\n",
    "See [docs](https://example.com \"Docs\") and ![logo](https://example.com/logo.png).\n",
    "~~gone~~ and `code` and ***both***\n",
    "line one\\\nline two\n",
    "before\n\n---\n\nafter\n",
    "<div>raw</div>\n",
];

#[test]
fn corpus_is_stable_after_one_round_trip() {
    let factory = factory();
    for source in CORPUS {
        let once = generate_markdown(&factory, &parse_markdown(&factory, source)).unwrap();
        let twice = generate_markdown(&factory, &parse_markdown(&factory, &once)).unwrap();
        assert_eq!(once, twice, "unstable markdown for {source:?}");
        assert_eq!(
            parse_markdown(&factory, &once),
            parse_markdown(&factory, source),
            "fragment changed for {source:?}"
        );
    }
}

#[test]
fn corpus_survives_normalization() -> anyhow::Result<()> {
    let factory = factory();
    for source in CORPUS {
        let expected = generate_markdown(&factory, &parse_markdown(&factory, source))?;
        let editor = Editor::new(factory.clone(), parse_markdown(&factory, source))?;
        assert_eq!(editor.to_markdown()?, expected, "for {source:?}");
    }
    Ok(())
}

#[test]
fn headings_and_marks_parse_to_styled_text() {
    let fragment = parse_markdown(&factory(), "## Title\n\nSome **bold** and `code`.\n");
    assert_eq!(
        fragment,
        vec![
            Node::heading(2, "Title"),
            Node::element(
                PARAGRAPH,
                vec![
                    Node::text("Some "),
                    styled("bold", Decorator::Strong),
                    Node::text(" and "),
                    styled("code", Decorator::InlineCode),
                    Node::text("."),
                ]
            ),
        ]
    );
}

#[test]
fn lists_keep_their_start_and_tasks() {
    let fragment = parse_markdown(&factory(), "3. a\n4. b\n\n- [x] done\n");
    let Node::Element(ordered) = &fragment[0] else {
        panic!("expected list");
    };
    assert_eq!(ordered.ty, LIST);
    assert_eq!(ordered.attr_bool("ordered"), Some(true));
    assert_eq!(ordered.attr_u64("start"), Some(3));
    assert_eq!(ordered.children.len(), 2);

    let Node::Element(tasks) = &fragment[1] else {
        panic!("expected list");
    };
    let Node::Element(item) = &tasks.children[0] else {
        panic!("expected item");
    };
    assert_eq!(item.ty, LIST_ITEM);
    assert_eq!(item.attr_bool("checked"), Some(true));
}

#[test]
fn code_blocks_split_language_and_meta() {
    let fragment = parse_markdown(&factory(), "```rust title=main.rs\nfn main() {}\n```\n");
    let Node::Element(code) = &fragment[0] else {
        panic!("expected code");
    };
    assert_eq!(code.attr_str("lang"), Some("rust"));
    assert_eq!(code.attr_str("meta"), Some("title=main.rs"));
    assert_eq!(fragment[0].string(), "fn main() {}");
}

#[test]
fn tables_record_alignment() {
    let fragment = parse_markdown(&factory(), "| a | b |\n| :-- | --: |\n| 1 | 2 |\n");
    let Node::Element(table) = &fragment[0] else {
        panic!("expected table");
    };
    assert_eq!(table.ty, TABLE);
    assert_eq!(table.attrs.get("align"), Some(&json!(["left", "right"])));
    assert_eq!(table.children.len(), 2);
    assert_eq!(
        table.children[1],
        Node::element(
            TABLE_ROW,
            vec![
                Node::element(TABLE_CELL, vec![Node::text("1")]),
                Node::element(TABLE_CELL, vec![Node::text("2")]),
            ]
        )
    );
}

#[test]
fn links_and_images_keep_titles() {
    let fragment = parse_markdown(
        &factory(),
        "[docs](https://example.com \"Docs\") ![logo](https://example.com/l.png)\n",
    );
    let Node::Element(paragraph) = &fragment[0] else {
        panic!("expected paragraph");
    };
    let Node::Element(link) = &paragraph.children[0] else {
        panic!("expected link");
    };
    assert_eq!(link.ty, LINK);
    assert_eq!(link.attr_str("url"), Some("https://example.com"));
    assert_eq!(link.attr_str("title"), Some("Docs"));
    let image = paragraph
        .children
        .iter()
        .find_map(|child| child.as_element().filter(|el| el.ty == IMAGE))
        .unwrap();
    assert_eq!(image.attr_str("alt"), Some("logo"));
}

#[test]
fn generated_markdown_for_common_blocks() {
    let factory = factory();
    let fragment = vec![
        Node::heading(1, "Title"),
        Node::element(
            PARAGRAPH,
            vec![Node::text("a "), styled("b", Decorator::Emphasis)],
        ),
        Node::list(false, &["x", "y"]),
        Node::code("rust", "let a = 1;"),
        Node::paragraph(""),
    ];
    assert_eq!(
        generate_markdown(&factory, &fragment).unwrap(),
        "# Title\n\na *b*\n\n- x\n- y\n\n``` rust\nlet a = 1;\n```\n"
    );
}

#[test]
fn ordered_lists_from_one_omit_start() {
    let fragment = parse_markdown(&factory(), "1. a\n");
    let Node::Element(list) = &fragment[0] else {
        panic!("expected list");
    };
    assert_eq!(list.attr_u64("start"), None);
}

#[test]
fn markdown_options_choose_the_bullet() {
    let mut factory = EditorFactory::new();
    for plugin in builtin_plugins() {
        factory.use_plugin(plugin.as_ref()).unwrap();
    }
    factory
        .set_markdown_options(MarkdownOptions {
            bullet: Bullet::Star,
            ..MarkdownOptions::default()
        })
        .unwrap();
    factory.freeze();
    let text = generate_markdown(&factory, &[Node::list(false, &["a", "b"])]).unwrap();
    assert_eq!(text, "* a\n* b\n");
}

#[test]
fn shared_processor_runs_before_the_direction() {
    let mut factory = EditorFactory::new();
    for plugin in builtin_plugins() {
        factory.use_plugin(plugin.as_ref()).unwrap();
    }
    factory
        .config_deserialize_processor(|processor| {
            processor.use_transform(Arc::new(|mut nodes: Vec<Node>| {
                nodes.push(Node::paragraph("direction"));
                nodes
            }))
        })
        .unwrap();
    factory
        .config_processor(|processor| {
            processor.use_transform(Arc::new(|mut nodes: Vec<Node>| {
                nodes.push(Node::paragraph("shared"));
                nodes
            }))
        })
        .unwrap();
    factory.freeze();

    assert_eq!(
        parse_markdown(&factory, "text\n"),
        vec![
            Node::paragraph("text"),
            Node::paragraph("shared"),
            Node::paragraph("direction"),
        ]
    );
    // Serialization only runs the shared transform.
    assert_eq!(
        generate_markdown(&factory, &[Node::paragraph("a")]).unwrap(),
        "a\n\nshared\n"
    );
}

#[test]
fn html_is_generated_from_the_same_tree() {
    let factory = factory();
    let fragment = vec![
        Node::heading(1, "T"),
        Node::element(
            PARAGRAPH,
            vec![Node::text("a "), styled("b", Decorator::Strong)],
        ),
    ];
    assert_eq!(
        generate_html(&factory, &fragment).unwrap(),
        "<h1>T</h1>\n<p>a <strong>b</strong></p>\n"
    );
}

#[test]
fn html_lowers_to_blocks() {
    let fragment = parse_html(
        &factory(),
        "<h1>Title</h1><ol start=\"2\"><li>two</li></ol>\
         <blockquote><p>quote</p></blockquote>\
         <p><a href=\"https://example.com\">link</a> <img src=\"a.png\" alt=\"a\"></p>\
         <table><tr><th>h</th></tr><tr><td>c</td></tr></table><hr>",
    );
    assert_eq!(fragment[0], Node::heading(1, "Title"));

    let ordered = Node::Element(
        ElementNode::new(LIST, vec![Node::element(LIST_ITEM, vec![Node::paragraph("two")])])
            .with_attr("ordered", true)
            .with_attr("start", 2),
    );
    assert_eq!(fragment[1], ordered);
    assert_eq!(fragment[2], Node::blockquote(vec![Node::paragraph("quote")]));
    assert_eq!(
        fragment[3],
        Node::element(
            PARAGRAPH,
            vec![
                Node::link("https://example.com", "link"),
                Node::text(" "),
                Node::image("a.png", "a"),
            ]
        )
    );
    assert_eq!(fragment[4], Node::table(&[&["h"], &["c"]]));
    assert_eq!(fragment[5], Node::thematic_break());
}

#[test]
fn scripts_and_styles_are_dropped() {
    let fragment = parse_html(
        &factory(),
        "<style>p { color: red }</style><script>alert(1)</script><p>kept</p>",
    );
    assert_eq!(fragment, vec![Node::paragraph("kept")]);
}

#[test]
fn neighbouring_ordered_lists_stay_apart() {
    let factory = factory();
    let second = Node::Element(
        ElementNode::new(LIST, vec![Node::element(LIST_ITEM, vec![Node::paragraph("b")])])
            .with_attr("ordered", true)
            .with_attr("start", 5),
    );
    let editor = Editor::new(factory.clone(), vec![Node::list(true, &["a"]), second]).unwrap();
    let text = editor.to_markdown().unwrap();

    let lists: Vec<Node> = parse_markdown(&factory, &text)
        .into_iter()
        .filter(|node| node.element_type() == Some(LIST))
        .collect();
    assert_eq!(lists.len(), 2, "lists merged in {text:?}");
    assert_eq!(lists[0].string(), "a");
    assert_eq!(lists[1].as_element().unwrap().attr_u64("start"), Some(5));
}
