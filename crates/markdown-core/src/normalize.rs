//! Built-in structural repairs. Every call fixes at most one violation; the
//! editor keeps re-running dirty nodes until nothing changes.

use crate::content::ContentType;
use crate::document::{NodeData, NodeId};
use crate::editor::{Editor, NodeEntry};
use crate::error::EditorError;
use crate::location::child_path;
use crate::node::{ElementNode, Marks, Node, PARAGRAPH};
use crate::ops::Op;
use crate::registry::NormalizeContext;

/// The element that wraps stray content in a container of the given model.
pub fn default_wrapper(model: ContentType) -> Option<&'static str> {
    match model {
        ContentType::Flow => Some(PARAGRAPH),
        ContentType::List => Some(crate::node::LIST_ITEM),
        ContentType::Table => Some(crate::node::TABLE_ROW),
        ContentType::TableRow => Some(crate::node::TABLE_CELL),
        _ => None,
    }
}

pub(crate) fn normalize_node(editor: &mut Editor, id: NodeId) -> Result<(), EditorError> {
    let Some(entry) = editor.entry(id) else {
        return Ok(());
    };
    let Some(data) = editor.node(id).map(|n| n.data().clone()) else {
        return Ok(());
    };
    match data {
        NodeData::Root => normalize_root(editor, &entry),
        NodeData::Element { ty, .. } => {
            let custom = editor.factory().element(&ty).and_then(|c| c.normalize.clone());
            if let Some(normalize) = custom {
                let mut cx = NormalizeContext::default();
                normalize(editor, &entry, &mut cx)?;
                if cx.is_prevented() {
                    return Ok(());
                }
            }
            match editor.entry(id) {
                Some(entry) => normalize_element(editor, &entry),
                None => Ok(()),
            }
        }
        NodeData::Text { .. } => {
            let custom = editor.factory().text().normalize.clone();
            if let Some(normalize) = custom {
                let mut cx = NormalizeContext::default();
                normalize(editor, &entry, &mut cx)?;
            }
            Ok(())
        }
    }
}

fn normalize_root(editor: &mut Editor, entry: &NodeEntry) -> Result<(), EditorError> {
    let len = editor.document().children_of(entry.id).len();
    if len == 0 {
        editor.apply(Op::InsertNode {
            path: vec![0],
            node: Node::paragraph(""),
        })?;
        return Ok(());
    }
    if repair_children(editor, entry, Some(ContentType::Flow))? {
        return Ok(());
    }
    let last_is_paragraph = editor
        .document()
        .children_of(entry.id)
        .last()
        .and_then(|id| editor.node(*id))
        .is_some_and(|n| n.is_type(PARAGRAPH));
    if !last_is_paragraph {
        let len = editor.document().children_of(entry.id).len();
        editor.apply(Op::InsertNode {
            path: vec![len],
            node: Node::paragraph(""),
        })?;
    }
    Ok(())
}

fn normalize_element(editor: &mut Editor, entry: &NodeEntry) -> Result<(), EditorError> {
    let Some(node) = editor.node(entry.id) else {
        return Ok(());
    };
    let is_void = editor.is_void(&node);
    let len = node.len();

    if is_void {
        if len > 0 {
            editor.apply(Op::RemoveNode {
                path: child_path(&entry.path, 0),
            })?;
        }
        return Ok(());
    }
    if len == 0 {
        editor.apply(Op::RemoveNode {
            path: entry.path.clone(),
        })?;
        return Ok(());
    }

    let Some(config) = editor.element_config(entry.id) else {
        return Ok(());
    };
    if repair_children(editor, entry, config.content_model_type)? {
        return Ok(());
    }
    if merge_texts(editor, entry)? {
        return Ok(());
    }
    if config.content_model_type == Some(ContentType::Value) || config.disallow_text_decorators {
        clear_text_marks(editor, entry)?;
    }
    Ok(())
}

/// Whether content of kind `ty` fits `model`, directly or through the chain of
/// default wrappers.
fn reachable(editor: &Editor, ty: ContentType, model: ContentType, depth: usize) -> bool {
    if ty.conforms(model) {
        return true;
    }
    if depth == 0 {
        return false;
    }
    let Some(wrapper) = default_wrapper(model).and_then(|w| editor.factory().element(w)) else {
        return false;
    };
    match wrapper.content_model_type {
        Some(inner) => reachable(editor, ty, inner, depth - 1),
        None => false,
    }
}

fn is_phrasing_family(ty: ContentType) -> bool {
    ty.family() == ContentType::Phrasing.family()
}

/// Wraps or lifts the first child that does not conform to `model`.
fn repair_children(
    editor: &mut Editor,
    entry: &NodeEntry,
    model: Option<ContentType>,
) -> Result<bool, EditorError> {
    let Some(model) = model else {
        return Ok(false);
    };
    let children = editor.document().children_of(entry.id).to_vec();
    for (ix, child) in children.iter().enumerate() {
        let Some(ty) = editor.content_type(*child) else {
            continue;
        };
        let is_text = editor.node(*child).is_some_and(|n| n.is_text());
        // Raw text is the only thing a value container holds.
        if ty.conforms(model) || (is_text && model == ContentType::Value) {
            continue;
        }
        let path = child_path(&entry.path, ix);

        if model == ContentType::Value {
            let text = editor.string(*child);
            editor.without_normalizing(|editor| {
                editor.apply(Op::RemoveNode { path: path.clone() })?;
                editor.apply(Op::InsertNode {
                    path,
                    node: Node::text(text),
                })?;
                Ok(())
            })?;
            return Ok(true);
        }

        if let Some(wrapper) = default_wrapper(model)
            && let Some(config) = editor.factory().element(wrapper).cloned()
            && config
                .content_model_type
                .is_some_and(|inner| reachable(editor, ty, inner, 3))
        {
            let mut count = 1;
            if is_phrasing_family(ty) {
                for next in &children[ix + 1..] {
                    let fits = editor.content_type(*next).is_some_and(|next_ty| {
                        !next_ty.conforms(model) && is_phrasing_family(next_ty)
                    });
                    if !fits {
                        break;
                    }
                    count += 1;
                }
            }
            editor.wrap_nodes(&path, count, ElementNode::new(wrapper, Vec::new()))?;
            return Ok(true);
        }

        if is_text || editor.node(*child).is_some_and(|n| n.is_empty()) {
            editor.apply(Op::RemoveNode { path })?;
        } else {
            editor.unwrap_node(&path)?;
        }
        return Ok(true);
    }
    Ok(false)
}

/// Joins neighbouring texts with equal marks and drops empty texts that have
/// siblings. An empty text closing the block after an inline element stays,
/// it is where the cursor goes once it leaves the inline.
fn merge_texts(editor: &mut Editor, entry: &NodeEntry) -> Result<bool, EditorError> {
    let children = editor.document().children_of(entry.id).to_vec();
    let leaves: Vec<Option<(String, Marks)>> = children
        .iter()
        .map(|id| match editor.node(*id).map(|n| n.data()) {
            Some(NodeData::Text { text, marks }) => Some((text.clone(), *marks)),
            _ => None,
        })
        .collect();

    for (ix, leaf) in leaves.iter().enumerate() {
        let Some((text, _)) = leaf else {
            continue;
        };
        let closes_after_inline =
            ix + 1 == leaves.len() && ix > 0 && leaves[ix - 1].is_none();
        if text.is_empty() && children.len() > 1 && !closes_after_inline {
            editor.apply(Op::RemoveNode {
                path: child_path(&entry.path, ix),
            })?;
            return Ok(true);
        }
    }
    for ix in 1..leaves.len() {
        if let (Some((_, prev)), Some((_, marks))) = (&leaves[ix - 1], &leaves[ix])
            && prev == marks
        {
            editor.apply(Op::MergeNode {
                path: child_path(&entry.path, ix),
            })?;
            return Ok(true);
        }
    }
    Ok(false)
}

fn clear_text_marks(editor: &mut Editor, entry: &NodeEntry) -> Result<(), EditorError> {
    let children = editor.document().children_of(entry.id).to_vec();
    for (ix, child) in children.iter().enumerate() {
        if editor
            .node(*child)
            .and_then(|n| n.marks())
            .is_some_and(|marks| !marks.is_plain())
        {
            editor.apply(Op::SetMarks {
                path: child_path(&entry.path, ix),
                marks: Marks::default(),
            })?;
            return Ok(());
        }
    }
    Ok(())
}
