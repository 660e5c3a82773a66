use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type Attrs = BTreeMap<String, serde_json::Value>;
pub type ElementType = String;

pub const PARAGRAPH: &str = "paragraph";
pub const HEADING: &str = "heading";
pub const BLOCKQUOTE: &str = "blockquote";
pub const LIST: &str = "list";
pub const LIST_ITEM: &str = "listItem";
pub const CODE: &str = "code";
pub const TABLE: &str = "table";
pub const TABLE_ROW: &str = "tableRow";
pub const TABLE_CELL: &str = "tableCell";
pub const LINK: &str = "link";
pub const IMAGE: &str = "image";
pub const THEMATIC_BREAK: &str = "thematicBreak";
pub const HTML: &str = "html";

/// An owned document fragment, detached from any editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode::new(text))
    }

    pub fn styled(text: impl Into<String>, marks: Marks) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks,
        })
    }

    pub fn element(ty: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Element(ElementNode::new(ty, children))
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Node::element(PARAGRAPH, vec![Node::text(text)])
    }

    pub fn heading(depth: u8, text: impl Into<String>) -> Self {
        Node::Element(
            ElementNode::new(HEADING, vec![Node::text(text)]).with_attr("depth", depth),
        )
    }

    pub fn blockquote(children: Vec<Node>) -> Self {
        Node::element(BLOCKQUOTE, children)
    }

    /// A list whose items each hold a single paragraph.
    pub fn list(ordered: bool, items: &[&str]) -> Self {
        let items = items
            .iter()
            .map(|text| Node::element(LIST_ITEM, vec![Node::paragraph(*text)]))
            .collect();
        Node::Element(ElementNode::new(LIST, items).with_attr("ordered", ordered))
    }

    pub fn code(lang: &str, text: impl Into<String>) -> Self {
        Node::Element(ElementNode::new(CODE, vec![Node::text(text)]).with_attr("lang", lang))
    }

    pub fn link(url: &str, text: impl Into<String>) -> Self {
        Node::Element(ElementNode::new(LINK, vec![Node::text(text)]).with_attr("url", url))
    }

    pub fn image(url: &str, alt: &str) -> Self {
        Node::Element(
            ElementNode::new(IMAGE, Vec::new())
                .with_attr("url", url)
                .with_attr("alt", alt),
        )
    }

    pub fn table(rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|cells| {
                let cells = cells
                    .iter()
                    .map(|text| Node::element(TABLE_CELL, vec![Node::text(*text)]))
                    .collect();
                Node::element(TABLE_ROW, cells)
            })
            .collect();
        Node::element(TABLE, rows)
    }

    pub fn thematic_break() -> Self {
        Node::element(THEMATIC_BREAK, Vec::new())
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Node::Text(_))
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    pub fn element_type(&self) -> Option<&str> {
        self.as_element().map(|el| el.ty.as_str())
    }

    /// Concatenated text of every leaf below this node.
    pub fn string(&self) -> String {
        let mut out = String::new();
        self.push_string(&mut out);
        out
    }

    fn push_string(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(&t.text),
            Node::Element(el) => {
                for child in &el.children {
                    child.push_string(out);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    #[serde(rename = "type")]
    pub ty: ElementType,
    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl ElementNode {
    pub fn new(ty: impl Into<String>, children: Vec<Node>) -> Self {
        Self {
            ty: ty.into(),
            attrs: Attrs::new(),
            children,
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(Value::as_str)
    }

    pub fn attr_u64(&self, key: &str) -> Option<u64> {
        self.attrs.get(key).and_then(Value::as_u64)
    }

    pub fn attr_bool(&self, key: &str) -> Option<bool> {
        self.attrs.get(key).and_then(Value::as_bool)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default, skip_serializing_if = "Marks::is_plain")]
    pub marks: Marks,
}

impl TextNode {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: Marks::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Decorator {
    Strong,
    Emphasis,
    Delete,
    InlineCode,
}

impl Decorator {
    pub const ALL: [Decorator; 4] = [
        Decorator::Strong,
        Decorator::Emphasis,
        Decorator::Delete,
        Decorator::InlineCode,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Decorator::Strong => "strong",
            Decorator::Emphasis => "emphasis",
            Decorator::Delete => "delete",
            Decorator::InlineCode => "inlineCode",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Decorator::ALL.into_iter().find(|d| d.key() == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marks {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub strong: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub emphasis: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub delete: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inline_code: bool,
}

impl Marks {
    pub fn is_plain(&self) -> bool {
        *self == Marks::default()
    }

    pub fn has(&self, decorator: Decorator) -> bool {
        match decorator {
            Decorator::Strong => self.strong,
            Decorator::Emphasis => self.emphasis,
            Decorator::Delete => self.delete,
            Decorator::InlineCode => self.inline_code,
        }
    }

    pub fn set(&mut self, decorator: Decorator, on: bool) {
        match decorator {
            Decorator::Strong => self.strong = on,
            Decorator::Emphasis => self.emphasis = on,
            Decorator::Delete => self.delete = on,
            Decorator::InlineCode => self.inline_code = on,
        }
    }

    pub fn with(mut self, decorator: Decorator) -> Self {
        self.set(decorator, true);
        self
    }
}
