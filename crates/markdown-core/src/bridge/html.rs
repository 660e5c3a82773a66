use html5ever::tendril::TendrilSink;
use html5ever::{ParseOpts, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use tracing::trace;

use super::markdown::{Output, render};
use crate::error::BridgeError;
use crate::node::{
    BLOCKQUOTE, CODE, Decorator, ElementNode, HEADING, IMAGE, LINK, LIST, LIST_ITEM, Marks, Node,
    PARAGRAPH, TABLE, TABLE_CELL, TABLE_ROW,
};
use crate::registry::EditorFactory;

pub fn generate_html(factory: &EditorFactory, fragment: &[Node]) -> Result<String, BridgeError> {
    render(factory, fragment, Output::Html)
}

/// Lowers an HTML document or snippet to block fragments. Unknown tags are
/// transparent; their content is kept.
pub fn parse_html(factory: &EditorFactory, html: &str) -> Vec<Node> {
    let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);
    let mut lowering = Lowering::default();
    lowering.blocks(&dom.document);
    let fragment = lowering.finish();
    trace!(blocks = fragment.len(), "parsed html");
    factory.run_deserialize(fragment)
}

fn tag_name(handle: &Handle) -> Option<String> {
    match &handle.data {
        NodeData::Element { name, .. } => Some(name.local.to_ascii_lowercase().to_string()),
        _ => None,
    }
}

fn attr(handle: &Handle, key: &str) -> Option<String> {
    let NodeData::Element { attrs, .. } = &handle.data else {
        return None;
    };
    attrs
        .borrow()
        .iter()
        .find(|attr| &*attr.name.local == key)
        .map(|attr| attr.value.to_string())
}

fn children(handle: &Handle) -> Vec<Handle> {
    handle.children.borrow().iter().cloned().collect()
}

/// Raw text below a node, whitespace preserved.
fn text_content(handle: &Handle, out: &mut String) {
    match &handle.data {
        NodeData::Text { contents } => out.push_str(&contents.borrow()),
        _ => {
            for child in children(handle) {
                text_content(&child, out);
            }
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

fn is_skipped(tag: &str) -> bool {
    matches!(
        tag,
        "head" | "script" | "style" | "title" | "meta" | "link" | "template" | "noscript"
    )
}

fn heading_depth(tag: &str) -> Option<u8> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn is_block_tag(tag: &str) -> bool {
    heading_depth(tag).is_some()
        || matches!(
            tag,
            "p" | "blockquote"
                | "ul"
                | "ol"
                | "li"
                | "pre"
                | "table"
                | "hr"
                | "div"
                | "section"
                | "article"
                | "header"
                | "footer"
                | "main"
                | "nav"
                | "aside"
                | "figure"
                | "body"
                | "html"
        )
}

#[derive(Default)]
struct Lowering {
    blocks: Vec<Node>,
    /// Inline content waiting for its implicit paragraph.
    run: Vec<Node>,
}

impl Lowering {
    fn finish(mut self) -> Vec<Node> {
        self.flush();
        self.blocks
    }

    fn flush(&mut self) {
        let mut run = std::mem::take(&mut self.run);
        if let Some(Node::Text(first)) = run.first_mut() {
            first.text = first.text.trim_start().to_string();
        }
        if let Some(Node::Text(last)) = run.last_mut() {
            last.text = last.text.trim_end().to_string();
        }
        run.retain(|node| !matches!(node, Node::Text(text) if text.text.is_empty()));
        if !run.is_empty() {
            self.blocks.push(Node::element(PARAGRAPH, run));
        }
    }

    fn push_block(&mut self, block: Node) {
        self.flush();
        self.blocks.push(block);
    }

    fn blocks(&mut self, handle: &Handle) {
        for child in children(handle) {
            self.block(&child);
        }
    }

    fn block(&mut self, handle: &Handle) {
        let tag = match &handle.data {
            NodeData::Document => {
                self.blocks(handle);
                return;
            }
            NodeData::Text { .. } => {
                inline(handle, Marks::default(), &mut self.run);
                return;
            }
            NodeData::Element { .. } => tag_name(handle).unwrap_or_default(),
            _ => return,
        };
        if is_skipped(&tag) {
            return;
        }
        if !is_block_tag(&tag) {
            inline(handle, Marks::default(), &mut self.run);
            return;
        }

        if let Some(depth) = heading_depth(&tag) {
            let node = ElementNode::new(HEADING, phrasing(handle)).with_attr("depth", depth);
            self.push_block(Node::Element(node));
            return;
        }
        match tag.as_str() {
            "p" => self.push_block(Node::element(PARAGRAPH, phrasing(handle))),
            "blockquote" => self.push_block(Node::element(BLOCKQUOTE, nested_blocks(handle))),
            "ul" | "ol" => self.push_block(list(handle, tag == "ol")),
            "li" => self.push_block(list_item(handle)),
            "pre" => self.push_block(code_block(handle)),
            "table" => self.push_block(table(handle)),
            "hr" => self.push_block(Node::thematic_break()),
            _ => {
                self.flush();
                self.blocks(handle);
                self.flush();
            }
        }
    }
}

fn nested_blocks(handle: &Handle) -> Vec<Node> {
    let mut lowering = Lowering::default();
    lowering.blocks(handle);
    lowering.finish()
}

fn phrasing(handle: &Handle) -> Vec<Node> {
    let mut out = Vec::new();
    for child in children(handle) {
        inline(&child, Marks::default(), &mut out);
    }
    if let Some(Node::Text(first)) = out.first_mut() {
        first.text = first.text.trim_start().to_string();
    }
    if let Some(Node::Text(last)) = out.last_mut() {
        last.text = last.text.trim_end().to_string();
    }
    if out.is_empty() {
        out.push(Node::text(""));
    }
    out
}

fn list(handle: &Handle, ordered: bool) -> Node {
    let items = children(handle)
        .iter()
        .filter_map(|child| match tag_name(child).as_deref() {
            Some("li") => Some(list_item(child)),
            Some(_) => {
                let blocks = nested_blocks(child);
                (!blocks.is_empty()).then(|| Node::element(LIST_ITEM, blocks))
            }
            None => None,
        })
        .collect();
    let mut el = ElementNode::new(LIST, items).with_attr("ordered", ordered);
    if ordered
        && let Some(start) = attr(handle, "start").and_then(|s| s.trim().parse::<u64>().ok())
        && start != 1
    {
        el = el.with_attr("start", start);
    }
    Node::Element(el)
}

fn list_item(handle: &Handle) -> Node {
    let checkbox = children(handle).into_iter().find(|child| {
        tag_name(child).as_deref() == Some("input")
            && attr(child, "type").is_some_and(|ty| ty.eq_ignore_ascii_case("checkbox"))
    });
    let mut el = ElementNode::new(LIST_ITEM, nested_blocks(handle));
    if el.children.is_empty() {
        el.children.push(Node::paragraph(""));
    }
    if let Some(checkbox) = checkbox {
        el = el.with_attr("checked", attr(&checkbox, "checked").is_some());
    }
    Node::Element(el)
}

fn code_block(handle: &Handle) -> Node {
    let lang = children(handle)
        .iter()
        .find(|child| tag_name(child).as_deref() == Some("code"))
        .and_then(|code| attr(code, "class"))
        .and_then(|class| {
            class
                .split_whitespace()
                .find_map(|c| c.strip_prefix("language-").map(str::to_string))
        })
        .unwrap_or_default();
    let mut text = String::new();
    text_content(handle, &mut text);
    let text = text.strip_suffix('\n').unwrap_or(&text).to_string();
    Node::Element(ElementNode::new(CODE, vec![Node::text(text)]).with_attr("lang", lang))
}

fn table(handle: &Handle) -> Node {
    let mut rows = Vec::new();
    collect_rows(handle, &mut rows);
    Node::element(TABLE, rows)
}

fn collect_rows(handle: &Handle, rows: &mut Vec<Node>) {
    for child in children(handle) {
        match tag_name(&child).as_deref() {
            Some("tr") => {
                let cells = children(&child)
                    .iter()
                    .filter(|cell| matches!(tag_name(cell).as_deref(), Some("td" | "th")))
                    .map(|cell| Node::element(TABLE_CELL, phrasing(cell)))
                    .collect();
                rows.push(Node::element(TABLE_ROW, cells));
            }
            Some("thead" | "tbody" | "tfoot") => collect_rows(&child, rows),
            _ => {}
        }
    }
}

fn push_text(out: &mut Vec<Node>, text: &str, marks: Marks) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(last)) = out.last_mut()
        && last.marks == marks
    {
        // Collapsing whitespace across element boundaries.
        if last.text.ends_with(' ') && text.starts_with(' ') {
            last.text.push_str(&text[1..]);
        } else {
            last.text.push_str(text);
        }
        return;
    }
    out.push(Node::styled(text, marks));
}

fn inline(handle: &Handle, marks: Marks, out: &mut Vec<Node>) {
    let tag = match &handle.data {
        NodeData::Text { contents } => {
            push_text(out, &collapse_whitespace(&contents.borrow()), marks);
            return;
        }
        NodeData::Element { .. } => tag_name(handle).unwrap_or_default(),
        _ => return,
    };
    if is_skipped(&tag) {
        return;
    }
    let decorator = match tag.as_str() {
        "strong" | "b" => Some(Decorator::Strong),
        "em" | "i" => Some(Decorator::Emphasis),
        "del" | "s" | "strike" => Some(Decorator::Delete),
        "code" | "kbd" | "samp" => Some(Decorator::InlineCode),
        _ => None,
    };
    if let Some(decorator) = decorator {
        for child in children(handle) {
            inline(&child, marks.with(decorator), out);
        }
        return;
    }
    match tag.as_str() {
        "br" => push_text(out, "\n", marks),
        "a" => {
            let mut link = Vec::new();
            for child in children(handle) {
                inline(&child, marks, &mut link);
            }
            if link.is_empty() {
                link.push(Node::text(""));
            }
            let mut el = ElementNode::new(LINK, link)
                .with_attr("url", attr(handle, "href").unwrap_or_default());
            if let Some(title) = attr(handle, "title") {
                el = el.with_attr("title", title);
            }
            out.push(Node::Element(el));
        }
        "img" => {
            let mut el = ElementNode::new(IMAGE, Vec::new())
                .with_attr("url", attr(handle, "src").unwrap_or_default())
                .with_attr("alt", attr(handle, "alt").unwrap_or_default());
            if let Some(title) = attr(handle, "title") {
                el = el.with_attr("title", title);
            }
            out.push(Node::Element(el));
        }
        "input" => {}
        _ => {
            for child in children(handle) {
                inline(&child, marks, out);
            }
        }
    }
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
    fn inline_runs_get_an_implicit_paragraph() {
        let fragment = parse_html(&factory(), "hello <b>bold</b><h2>Title</h2>");
        assert_eq!(
            fragment,
            vec![
                Node::element(
                    PARAGRAPH,
                    vec![
                        Node::text("hello "),
                        Node::styled("bold", Marks::default().with(Decorator::Strong)),
                    ]
                ),
                Node::heading(2, "Title"),
            ]
        );
    }

    #[test]
    fn tag_names_ignore_case() {
        let fragment = parse_html(&factory(), "<H3>Title</H3><P>body</P>");
        assert_eq!(
            fragment,
            vec![Node::heading(3, "Title"), Node::paragraph("body")]
        );
    }

    #[test]
    fn pre_keeps_whitespace_and_language() {
        let fragment = parse_html(
            &factory(),
            "<pre><code class=\"language-rust\">fn main() {\n    1\n}\n</code></pre>",
        );
        assert_eq!(fragment, vec![Node::code("rust", "fn main() {\n    1\n}")]);
    }
}
