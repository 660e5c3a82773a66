use std::cell::RefCell;

use comrak::nodes::{
    Ast, AstNode, ListDelimType, ListType, NodeCode, NodeCodeBlock, NodeHeading, NodeHtmlBlock,
    NodeLink, NodeList, NodeTable, NodeValue, TableAlignment,
};
use comrak::{Arena, ComrakOptions, ListStyleType, format_commonmark, format_html, parse_document};
use serde_json::Value;
use tracing::trace;

use super::{Bullet, MarkdownOptions};
use crate::error::BridgeError;
use crate::node::{
    BLOCKQUOTE, CODE, Decorator, ElementNode, HEADING, HTML, IMAGE, LINK, LIST, LIST_ITEM, Marks,
    Node, PARAGRAPH, TABLE, TABLE_CELL, TABLE_ROW, THEMATIC_BREAK,
};
use crate::registry::EditorFactory;

/// Decorators that become nested emphasis nodes, outermost first.
const NESTED: [Decorator; 3] = [Decorator::Delete, Decorator::Strong, Decorator::Emphasis];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Output {
    Markdown,
    Html,
}

fn comrak_options(markdown: &MarkdownOptions) -> ComrakOptions<'static> {
    let mut options = ComrakOptions::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.render.unsafe_ = true;
    options.render.width = markdown.width;
    options.render.list_style = match markdown.bullet {
        Bullet::Dash => ListStyleType::Dash,
        Bullet::Star => ListStyleType::Star,
        Bullet::Plus => ListStyleType::Plus,
    };
    options
}

fn bullet_char(bullet: Bullet) -> u8 {
    match bullet {
        Bullet::Dash => b'-',
        Bullet::Star => b'*',
        Bullet::Plus => b'+',
    }
}

pub fn generate_markdown(factory: &EditorFactory, fragment: &[Node]) -> Result<String, BridgeError> {
    render(factory, fragment, Output::Markdown)
}

pub fn parse_markdown(factory: &EditorFactory, text: &str) -> Vec<Node> {
    let arena = Arena::new();
    let options = comrak_options(factory.markdown_options());
    let root = parse_document(&arena, text, &options);
    let fragment = collect_blocks(root);
    trace!(blocks = fragment.len(), "parsed markdown");
    factory.run_deserialize(fragment)
}

pub(super) fn render(
    factory: &EditorFactory,
    fragment: &[Node],
    output: Output,
) -> Result<String, BridgeError> {
    let fragment = factory.run_serialize(fragment.to_vec());
    let arena = Arena::new();
    let builder = AstBuilder {
        arena: &arena,
        options: factory.markdown_options(),
    };
    let root = builder.alloc(NodeValue::Document);
    for node in &fragment {
        builder.append_block(root, node);
    }

    let options = comrak_options(factory.markdown_options());
    let mut out = Vec::new();
    match output {
        Output::Markdown => format_commonmark(root, &options, &mut out)?,
        Output::Html => format_html(root, &options, &mut out)?,
    }
    let text = String::from_utf8(out)?;
    // comrak puts a marker comment after a list followed by another list or a
    // code block. Ordered neighbours alternate delimiters instead, bullet
    // neighbours are merged by normalization and fenced code never joins a list.
    Ok(text.replace("<!-- end list -->\n\n", ""))
}

struct AstBuilder<'a, 'o> {
    arena: &'a Arena<AstNode<'a>>,
    options: &'o MarkdownOptions,
}

impl<'a> AstBuilder<'a, '_> {
    fn alloc(&self, value: NodeValue) -> &'a AstNode<'a> {
        self.arena
            .alloc(AstNode::new(RefCell::new(Ast::new(value, (0, 0).into()))))
    }

    fn push(&self, parent: &'a AstNode<'a>, value: NodeValue) -> &'a AstNode<'a> {
        let node = self.alloc(value);
        parent.append(node);
        node
    }

    fn append_block(&self, parent: &'a AstNode<'a>, node: &Node) {
        let el = match node {
            Node::Element(el) => el,
            Node::Text(_) => {
                let paragraph = self.push(parent, NodeValue::Paragraph);
                self.append_inlines(paragraph, std::slice::from_ref(node), 0);
                return;
            }
        };
        match el.ty.as_str() {
            PARAGRAPH => self.append_paragraph(parent, el),
            HEADING => {
                let level = el.attr_u64("depth").unwrap_or(1).clamp(1, 6) as u8;
                let heading = self.push(
                    parent,
                    NodeValue::Heading(NodeHeading {
                        level,
                        setext: false,
                    }),
                );
                self.append_inlines(heading, &el.children, 0);
            }
            BLOCKQUOTE => {
                let quote = self.push(parent, NodeValue::BlockQuote);
                self.append_blocks(quote, &el.children);
            }
            LIST => self.append_list(parent, el),
            CODE => {
                let lang = el.attr_str("lang").unwrap_or_default();
                let info = match el.attr_str("meta") {
                    Some(meta) if !meta.is_empty() => format!("{lang} {meta}"),
                    _ => lang.to_string(),
                };
                let mut literal = node.string();
                if !literal.ends_with('\n') {
                    literal.push('\n');
                }
                self.push(
                    parent,
                    NodeValue::CodeBlock(NodeCodeBlock {
                        fenced: true,
                        fence_char: b'`',
                        fence_length: 3,
                        fence_offset: 0,
                        info,
                        literal,
                    }),
                );
            }
            TABLE => self.append_table(parent, el),
            THEMATIC_BREAK => {
                self.push(parent, NodeValue::ThematicBreak);
            }
            HTML => self.append_html_block(parent, node.string()),
            _ if el.children.iter().any(|child| self.is_inline_content(child)) => {
                let paragraph = self.push(parent, NodeValue::Paragraph);
                self.append_inlines(paragraph, &el.children, 0);
            }
            _ => self.append_blocks(parent, &el.children),
        }
    }

    fn append_blocks(&self, parent: &'a AstNode<'a>, nodes: &[Node]) {
        for node in nodes {
            self.append_block(parent, node);
        }
    }

    fn is_inline_content(&self, node: &Node) -> bool {
        match node {
            Node::Text(_) => true,
            Node::Element(el) => matches!(el.ty.as_str(), LINK | IMAGE),
        }
    }

    fn append_paragraph(&self, parent: &'a AstNode<'a>, el: &ElementNode) {
        let blank = el.children.iter().all(|child| match child {
            Node::Text(text) => text.text.is_empty(),
            Node::Element(_) => false,
        });
        if blank {
            return;
        }
        if let [Node::Element(only)] = el.children.as_slice()
            && only.ty == HTML
        {
            self.append_html_block(parent, Node::Element(only.clone()).string());
            return;
        }
        let paragraph = self.push(parent, NodeValue::Paragraph);
        self.append_inlines(paragraph, &el.children, 0);
    }

    fn append_html_block(&self, parent: &'a AstNode<'a>, mut literal: String) {
        if !literal.ends_with('\n') {
            literal.push('\n');
        }
        self.push(
            parent,
            NodeValue::HtmlBlock(NodeHtmlBlock {
                block_type: 0,
                literal,
            }),
        );
    }

    fn append_list(&self, parent: &'a AstNode<'a>, el: &ElementNode) {
        let ordered = el.attr_bool("ordered").unwrap_or(false);
        // A changed delimiter is what keeps two ordered lists apart.
        let previous = parent.last_child().and_then(|node| match &node.data.borrow().value {
            NodeValue::List(prev) if prev.list_type == ListType::Ordered => Some(prev.delimiter),
            _ => None,
        });
        let delimiter = match previous {
            Some(ListDelimType::Period) if ordered => ListDelimType::Paren,
            _ => ListDelimType::Period,
        };
        let list = NodeList {
            list_type: if ordered {
                ListType::Ordered
            } else {
                ListType::Bullet
            },
            marker_offset: 0,
            padding: 0,
            start: el.attr_u64("start").unwrap_or(1) as usize,
            delimiter,
            bullet_char: bullet_char(self.options.bullet),
            tight: !el.attr_bool("spread").unwrap_or(false),
        };
        let list_node = self.push(parent, NodeValue::List(list.clone()));
        for item in &el.children {
            let Node::Element(item_el) = item else {
                continue;
            };
            if item_el.ty != LIST_ITEM {
                let item_node = self.push(list_node, NodeValue::Item(list.clone()));
                self.append_block(item_node, item);
                continue;
            }
            let value = match item_el.attr_bool("checked") {
                Some(checked) => NodeValue::TaskItem(checked.then_some('x')),
                None => NodeValue::Item(list.clone()),
            };
            let item_node = self.push(list_node, value);
            self.append_blocks(item_node, &item_el.children);
        }
    }

    fn append_table(&self, parent: &'a AstNode<'a>, el: &ElementNode) {
        let rows: Vec<&ElementNode> = el.children.iter().filter_map(Node::as_element).collect();
        let num_columns = rows.iter().map(|row| row.children.len()).max().unwrap_or(0);
        if num_columns == 0 {
            return;
        }
        let declared: Vec<TableAlignment> = el
            .attrs
            .get("align")
            .and_then(Value::as_array)
            .map(|align| align.iter().map(alignment_from_value).collect())
            .unwrap_or_default();
        let alignments = (0..num_columns)
            .map(|ix| declared.get(ix).copied().unwrap_or(TableAlignment::None))
            .collect();
        let table = self.push(
            parent,
            NodeValue::Table(NodeTable {
                alignments,
                num_columns,
                num_rows: rows.len(),
                num_nonempty_cells: 0,
            }),
        );
        for (ix, row) in rows.iter().enumerate() {
            let row_node = self.push(table, NodeValue::TableRow(ix == 0));
            for cell in 0..num_columns {
                let cell_node = self.push(row_node, NodeValue::TableCell);
                match row.children.get(cell) {
                    Some(Node::Element(cell_el)) => {
                        self.append_inlines(cell_node, &cell_el.children, 0)
                    }
                    Some(text @ Node::Text(_)) => {
                        self.append_inlines(cell_node, std::slice::from_ref(text), 0)
                    }
                    None => {}
                }
            }
        }
    }

    /// Emits runs of inline nodes, grouping neighbours that share the
    /// decorator of the current nesting level.
    fn append_inlines(&self, parent: &'a AstNode<'a>, nodes: &[Node], level: usize) {
        let Some(decorator) = NESTED.get(level).copied() else {
            for node in nodes {
                self.append_inline(parent, node);
            }
            return;
        };
        let mut start = 0;
        while start < nodes.len() {
            let on = marks_of(&nodes[start]).has(decorator);
            let end = nodes[start..]
                .iter()
                .position(|node| marks_of(node).has(decorator) != on)
                .map_or(nodes.len(), |len| start + len);
            let run = &nodes[start..end];
            if on {
                let value = match decorator {
                    Decorator::Delete => NodeValue::Strikethrough,
                    Decorator::Strong => NodeValue::Strong,
                    _ => NodeValue::Emph,
                };
                let wrapper = self.push(parent, value);
                self.append_inlines(wrapper, run, level + 1);
            } else {
                self.append_inlines(parent, run, level + 1);
            }
            start = end;
        }
    }

    fn append_inline(&self, parent: &'a AstNode<'a>, node: &Node) {
        match node {
            Node::Text(text) if text.text.is_empty() => {}
            Node::Text(text) if text.marks.inline_code => {
                self.push(
                    parent,
                    NodeValue::Code(NodeCode {
                        num_backticks: 1,
                        literal: text.text.clone(),
                    }),
                );
            }
            Node::Text(text) => {
                for (ix, line) in text.text.split('\n').enumerate() {
                    if ix > 0 {
                        self.push(parent, NodeValue::LineBreak);
                    }
                    if !line.is_empty() {
                        self.push(parent, NodeValue::Text(line.to_string()));
                    }
                }
            }
            Node::Element(el) => match el.ty.as_str() {
                LINK => {
                    let link = self.push(
                        parent,
                        NodeValue::Link(NodeLink {
                            url: el.attr_str("url").unwrap_or_default().to_string(),
                            title: el.attr_str("title").unwrap_or_default().to_string(),
                        }),
                    );
                    self.append_inlines(link, &el.children, 0);
                }
                IMAGE => {
                    let image = self.push(
                        parent,
                        NodeValue::Image(NodeLink {
                            url: el.attr_str("url").unwrap_or_default().to_string(),
                            title: el.attr_str("title").unwrap_or_default().to_string(),
                        }),
                    );
                    let alt = el.attr_str("alt").unwrap_or_default();
                    if !alt.is_empty() {
                        self.push(image, NodeValue::Text(alt.to_string()));
                    }
                }
                HTML => {
                    self.push(parent, NodeValue::HtmlInline(node.string()));
                }
                _ => self.append_inlines(parent, &el.children, 0),
            },
        }
    }
}

fn marks_of(node: &Node) -> Marks {
    match node {
        Node::Text(text) => text.marks,
        Node::Element(_) => Marks::default(),
    }
}

fn alignment_from_value(value: &Value) -> TableAlignment {
    match value.as_str() {
        Some("left") => TableAlignment::Left,
        Some("center") => TableAlignment::Center,
        Some("right") => TableAlignment::Right,
        _ => TableAlignment::None,
    }
}

fn alignment_to_value(align: &TableAlignment) -> Value {
    match align {
        TableAlignment::Left => Value::from("left"),
        TableAlignment::Center => Value::from("center"),
        TableAlignment::Right => Value::from("right"),
        TableAlignment::None => Value::Null,
    }
}

/// Phrasing containers always keep at least one leaf so normalization does
/// not drop them.
fn or_empty(mut children: Vec<Node>) -> Vec<Node> {
    if children.is_empty() {
        children.push(Node::text(""));
    }
    children
}

fn collect_blocks<'a>(node: &'a AstNode<'a>) -> Vec<Node> {
    node.children().filter_map(collect_block).collect()
}

fn collect_block<'a>(node: &'a AstNode<'a>) -> Option<Node> {
    let data = node.data.borrow();
    let block = match &data.value {
        NodeValue::Paragraph => Node::element(PARAGRAPH, or_empty(collect_inlines(node))),
        NodeValue::Heading(heading) => Node::Element(
            ElementNode::new(HEADING, or_empty(collect_inlines(node)))
                .with_attr("depth", heading.level),
        ),
        NodeValue::BlockQuote => Node::element(BLOCKQUOTE, collect_blocks(node)),
        NodeValue::List(list) => {
            let ordered = matches!(list.list_type, ListType::Ordered);
            let mut el = ElementNode::new(LIST, collect_blocks(node))
                .with_attr("ordered", ordered)
                .with_attr("spread", !list.tight);
            if ordered && list.start != 1 {
                el = el.with_attr("start", list.start);
            }
            Node::Element(el)
        }
        NodeValue::Item(_) => Node::element(LIST_ITEM, collect_blocks(node)),
        NodeValue::TaskItem(symbol) => Node::Element(
            ElementNode::new(LIST_ITEM, collect_blocks(node))
                .with_attr("checked", symbol.is_some_and(|c| c == 'x' || c == 'X')),
        ),
        NodeValue::CodeBlock(code) => {
            let mut info = code.info.trim().splitn(2, char::is_whitespace);
            let lang = info.next().unwrap_or_default();
            let meta = info.next().map(str::trim).unwrap_or_default();
            let text = code.literal.strip_suffix('\n').unwrap_or(&code.literal);
            let mut el = ElementNode::new(CODE, vec![Node::text(text)]).with_attr("lang", lang);
            if !meta.is_empty() {
                el = el.with_attr("meta", meta);
            }
            Node::Element(el)
        }
        NodeValue::HtmlBlock(html) => {
            let literal = html.literal.strip_suffix('\n').unwrap_or(&html.literal);
            Node::element(HTML, vec![Node::text(literal)])
        }
        NodeValue::ThematicBreak => Node::thematic_break(),
        NodeValue::Table(table) => {
            let align: Vec<Value> = table.alignments.iter().map(alignment_to_value).collect();
            Node::Element(ElementNode::new(TABLE, collect_blocks(node)).with_attr("align", align))
        }
        NodeValue::TableRow(_) => Node::element(TABLE_ROW, collect_blocks(node)),
        NodeValue::TableCell => Node::element(TABLE_CELL, or_empty(collect_inlines(node))),
        _ => return None,
    };
    Some(block)
}

fn collect_inlines<'a>(node: &'a AstNode<'a>) -> Vec<Node> {
    let mut out = Vec::new();
    for child in node.children() {
        collect_inline(child, Marks::default(), &mut out);
    }
    out
}

fn collect_inline<'a>(node: &'a AstNode<'a>, marks: Marks, out: &mut Vec<Node>) {
    let data = node.data.borrow();
    let nested = |decorator: Decorator, out: &mut Vec<Node>| {
        for child in node.children() {
            collect_inline(child, marks.with(decorator), out);
        }
    };
    match &data.value {
        NodeValue::Text(text) => push_text(out, text, marks),
        NodeValue::SoftBreak => push_text(out, " ", marks),
        NodeValue::LineBreak => push_text(out, "\n", marks),
        NodeValue::Code(code) => push_text(out, &code.literal, marks.with(Decorator::InlineCode)),
        NodeValue::Emph => nested(Decorator::Emphasis, out),
        NodeValue::Strong => nested(Decorator::Strong, out),
        NodeValue::Strikethrough => nested(Decorator::Delete, out),
        NodeValue::Link(link) => {
            let mut children = Vec::new();
            for child in node.children() {
                collect_inline(child, marks, &mut children);
            }
            let mut el = ElementNode::new(LINK, or_empty(children)).with_attr("url", link.url.as_str());
            if !link.title.is_empty() {
                el = el.with_attr("title", link.title.as_str());
            }
            out.push(Node::Element(el));
        }
        NodeValue::Image(link) => {
            let alt = node
                .descendants()
                .skip(1)
                .filter_map(|d| match &d.data.borrow().value {
                    NodeValue::Text(text) => Some(text.clone()),
                    _ => None,
                })
                .collect::<String>();
            let mut el = ElementNode::new(IMAGE, Vec::new())
                .with_attr("url", link.url.as_str())
                .with_attr("alt", alt);
            if !link.title.is_empty() {
                el = el.with_attr("title", link.title.as_str());
            }
            out.push(Node::Element(el));
        }
        NodeValue::HtmlInline(html) => {
            out.push(Node::element(HTML, vec![Node::text(html.as_str())]));
        }
        _ => {
            for child in node.children() {
                collect_inline(child, marks, out);
            }
        }
    }
}

fn push_text(out: &mut Vec<Node>, text: &str, marks: Marks) {
    if let Some(Node::Text(last)) = out.last_mut()
        && last.marks == marks
    {
        last.text.push_str(text);
        return;
    }
    out.push(Node::styled(text, marks));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> EditorFactory {
        let mut factory = EditorFactory::new();
        factory.freeze();
        factory
    }

    #[test]
    fn neighbours_share_one_wrapper() {
        let strong = Marks::default().with(Decorator::Strong);
        let fragment = vec![Node::element(
            PARAGRAPH,
            vec![
                Node::styled("a", strong),
                Node::styled("b", strong.with(Decorator::InlineCode)),
            ],
        )];
        let text = generate_markdown(&factory(), &fragment).unwrap();
        assert_eq!(text, "**a`b`**\n");
    }

    #[test]
    fn blank_paragraphs_are_skipped() {
        let fragment = vec![Node::heading(2, "Title"), Node::paragraph("")];
        let text = generate_markdown(&factory(), &fragment).unwrap();
        assert_eq!(text, "## Title\n");
    }

    #[test]
    fn soft_breaks_become_spaces() {
        let fragment = parse_markdown(&factory(), "one\ntwo\n");
        assert_eq!(fragment, vec![Node::paragraph("one two")]);
    }
}
