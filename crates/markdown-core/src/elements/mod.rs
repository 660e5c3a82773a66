//! The built-in markdown element types, the text leaf and their actions.
//!
//! Each element family is a plugin. `register_all` installs them in a fixed
//! order and sets the default toolbar groups.

mod blockquote;
mod code;
mod heading;
mod html;
mod image;
mod link;
mod list;
mod paragraph;
mod table;
mod text;
mod thematic_break;

use serde_json::Value;

use crate::document::NodeId;
use crate::editor::{Editor, NodeEntry};
use crate::error::{EditorError, FactoryError};
use crate::location::{Range, next_sibling};
use crate::node::{Attrs, Node};
use crate::registry::{EditorFactory, MarkdownPlugin};

pub use self::blockquote::BlockquotePlugin;
pub use self::code::CodePlugin;
pub use self::heading::HeadingPlugin;
pub use self::html::HtmlPlugin;
pub use self::image::{ImagePlugin, image_run};
pub use self::link::{LinkPlugin, trailing_url};
pub use self::list::{ListPlugin, indent_list, outdent_list};
pub use self::paragraph::ParagraphPlugin;
pub use self::table::TablePlugin;
pub use self::text::TextPlugin;
pub use self::thematic_break::ThematicBreakPlugin;

pub const LINE_ACTIONS: [&[&str]; 3] = [
    &[
        "toggle-heading-1",
        "toggle-heading-2",
        "toggle-heading-3",
        "toggle-heading-4",
        "toggle-heading-5",
        "toggle-heading-6",
    ],
    &[
        "toggle-ordered-list",
        "toggle-unordered-list",
        "indent-list",
        "outdent-list",
    ],
    &[
        "toggle-blockquote",
        "indent-blockquote",
        "outdent-blockquote",
        "toggle-codeblock",
        "toggle-table",
    ],
];

pub const SELECTION_ACTIONS: [&str; 13] = [
    "strong",
    "emphasis",
    "delete",
    "inlineCode",
    "toggle-link",
    "toggle-image",
    "table-insert-row-above",
    "table-insert-row-below",
    "table-insert-col-left",
    "table-insert-col-right",
    "table-delete-row",
    "table-delete-col",
    "remove-selection-table",
];

pub fn builtin_plugins() -> Vec<Box<dyn MarkdownPlugin>> {
    vec![
        Box::new(ParagraphPlugin),
        Box::new(HeadingPlugin),
        Box::new(BlockquotePlugin),
        Box::new(ListPlugin),
        Box::new(CodePlugin),
        Box::new(TablePlugin),
        Box::new(LinkPlugin),
        Box::new(ImagePlugin),
        Box::new(ThematicBreakPlugin),
        Box::new(HtmlPlugin),
        Box::new(TextPlugin),
    ]
}

pub(crate) fn register_all(factory: &mut EditorFactory) -> Result<(), FactoryError> {
    for plugin in builtin_plugins() {
        factory.use_plugin(plugin.as_ref())?;
    }
    factory.set_line_actions(LINE_ACTIONS.iter().map(|group| group.to_vec()))?;
    factory.set_selection_actions(SELECTION_ACTIONS)?;
    Ok(())
}

fn attr(key: &str, value: impl Into<Value>) -> Attrs {
    Attrs::from([(key.to_string(), value.into())])
}

fn is_type(editor: &Editor, entry: &NodeEntry, ty: &str) -> bool {
    editor.node(entry.id).is_some_and(|n| n.is_type(ty))
}

fn attr_of<'a>(editor: &'a Editor, entry: &NodeEntry, key: &str) -> Option<&'a Value> {
    editor.node(entry.id)?.attr(key)
}

fn cannot_toggle(editor: &Editor, entry: &NodeEntry, ty: &str, search_ancestors: bool) -> bool {
    editor
        .config_for(ty)
        .is_none_or(|config| editor.can_toggle(entry, &config, search_ancestors).is_none())
}

/// Elements of type `ty` that hold the range start or lie inside the range,
/// in document order.
fn elements_in_range(editor: &Editor, range: &Range, ty: &str) -> Vec<NodeEntry> {
    let doc = editor.document();
    let (start, end) = range.edges();
    let (Some(first), Some(last)) = (doc.resolve(&start.path), doc.resolve(&end.path)) else {
        return Vec::new();
    };
    let order = doc.descendants(doc.root());
    let (Some(from), Some(to)) = (
        order.iter().position(|id| *id == first),
        order.iter().position(|id| *id == last),
    ) else {
        return Vec::new();
    };
    let mut found: Vec<NodeId> = doc.ancestors(first);
    found.reverse();
    found.extend(order.get(from..=to).unwrap_or_default());
    let mut entries: Vec<NodeEntry> = Vec::new();
    for id in found {
        if editor.node(id).is_some_and(|n| n.is_type(ty))
            && !entries.iter().any(|e| e.id == id)
            && let Some(entry) = editor.entry(id)
        {
            entries.push(entry);
        }
    }
    entries
}

/// Replaces the range with inline `nodes` and puts the cursor after them.
pub(crate) fn insert_inlines(editor: &mut Editor, range: &Range, nodes: Vec<Node>) -> Result<bool, EditorError> {
    let point = range.start().clone();
    if !editor.node_at(&point.path).is_some_and(|n| n.is_text()) {
        return Ok(false);
    }
    let count = nodes.len();
    editor.without_normalizing(|editor| {
        editor.delete_range(range)?;
        let len = editor.node_at(&point.path).and_then(|n| n.text()).map_or(0, str::len);
        let at = if point.offset == 0 {
            point.path.clone()
        } else {
            if point.offset < len {
                editor.split_node(&point.path, point.offset)?;
            }
            next_sibling(&point.path)
                .ok_or_else(|| EditorError::invalid_path(&point.path, "root cannot hold text"))?
        };
        editor.insert_nodes(&at, nodes)?;
        let mut last = at;
        if let Some(ix) = last.last_mut() {
            *ix += count.saturating_sub(1);
        }
        if let Some(id) = editor.document().resolve(&last) {
            editor.select_end_of(id);
        }
        Ok(true)
    })
}
