use serde_json::Value;

use crate::actions::{Action, ActionState, ActionType};
use crate::content::{ContentType, conforms_opt};
use crate::editor::{Editor, NodeEntry};
use crate::error::{EditorError, FactoryError};
use crate::location::{child_path, next_sibling, previous_sibling};
use crate::node::{Attrs, ElementNode, LIST, LIST_ITEM, PARAGRAPH};
use crate::registry::{ElementConfig, MarkdownPlugin, PrefixToggle};

use super::{attr, attr_of, is_type};

fn is_ordered(editor: &Editor, list: &NodeEntry) -> bool {
    attr_of(editor, list, "ordered")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn start_of(editor: &Editor, list: &NodeEntry) -> Option<u64> {
    attr_of(editor, list, "start").and_then(Value::as_u64)
}

/// Attributes of a list. Ordered lists starting at one carry no `start`.
fn list_attrs(ordered: bool, start: Option<u64>) -> Attrs {
    let mut attrs = attr("ordered", ordered);
    if let Some(start) = start.filter(|start| ordered && *start != 1) {
        attrs.insert("start".to_string(), start.into());
    }
    attrs
}

/// Rewrites ordering attributes in place, dropping a stale `start`.
fn set_list_attrs(editor: &mut Editor, list: &NodeEntry, attrs: Attrs) -> Result<(), EditorError> {
    editor.without_normalizing(|editor| {
        if !attrs.contains_key("start") {
            editor.unset_attrs(&list.path, &["start"])?;
        }
        editor.set_node(&list.path, None, attrs)
    })
}

fn item_of(editor: &Editor, paragraph: &NodeEntry) -> Option<NodeEntry> {
    editor
        .parent_entry(paragraph)
        .filter(|parent| is_type(editor, parent, LIST_ITEM))
}

fn parent_list(editor: &Editor, item: &NodeEntry) -> Option<NodeEntry> {
    editor
        .parent_entry(item)
        .filter(|parent| is_type(editor, parent, LIST))
}

/// Nests `item` under its previous sibling. The new sublist copies the
/// ordering of the current list unless `ordered` says otherwise.
pub fn indent_list(
    editor: &mut Editor,
    item: &NodeEntry,
    ordered: Option<bool>,
    start: Option<u64>,
) -> Result<bool, EditorError> {
    let (Some(item_config), Some(list_config)) =
        (editor.config_for(LIST_ITEM), editor.config_for(LIST))
    else {
        return Ok(false);
    };
    let Some(list) = parent_list(editor, item) else {
        return Ok(false);
    };
    if item.path.last().is_none_or(|ix| *ix == 0) {
        return Ok(false);
    }
    let ordered = ordered.unwrap_or_else(|| is_ordered(editor, &list));
    editor.without_normalizing(|editor| {
        let wrapped = editor.wrap(
            item,
            &[&item_config, &list_config],
            &[Attrs::new(), list_attrs(ordered, start)],
        )?;
        if !wrapped {
            return Ok(false);
        }
        editor.merge_nodes(&item.path)?;
        Ok(true)
    })
}

/// Moves `item` one level up. At the top level its content leaves the list
/// as plain blocks.
pub fn outdent_list(editor: &mut Editor, item: &NodeEntry) -> Result<bool, EditorError> {
    let (Some(item_config), Some(list_config)) =
        (editor.config_for(LIST_ITEM), editor.config_for(LIST))
    else {
        return Ok(false);
    };
    let Some(list) = parent_list(editor, item) else {
        return Ok(false);
    };
    let Some(&index) = item.path.last() else {
        return Ok(false);
    };
    let doc = editor.document();
    let Some(holder) = doc.parent_of(list.id) else {
        return Ok(false);
    };
    let model = editor.content_model_type(holder);
    let fits = doc
        .children_of(item.id)
        .iter()
        .all(|child| conforms_opt(editor.content_type(*child), model));
    if !fits {
        return Ok(false);
    }
    let len = doc.children_of(list.id).len();
    let holder = editor.entry(holder);

    editor.without_normalizing(|editor| {
        if index + 1 < len {
            editor.split_node(&list.path, index + 1)?;
        }
        if index > 0 {
            editor.split_node(&list.path, index)?;
        }
        let Some(own_list) = editor
            .document()
            .parent_of(item.id)
            .and_then(|id| editor.entry(id))
        else {
            return Ok(false);
        };
        let list_index = own_list.path.last().copied().unwrap_or_default();
        if !editor.unwrap(&own_list, &[&list_config, &item_config])? {
            return Ok(false);
        }
        if let Some(holder) = holder.filter(|h| is_type(editor, h, LIST_ITEM))
            && list_index > 0
        {
            editor.split_node(&holder.path, list_index)?;
        }
        Ok(true)
    })
}

fn normalize_list(
    editor: &mut Editor,
    list: &NodeEntry,
) -> Result<bool, EditorError> {
    if editor.node(list.id).is_none_or(|n| n.is_empty()) {
        editor.remove_node(&list.path)?;
        return Ok(true);
    }
    let Some(prev) = previous_sibling(&list.path).and_then(|path| editor.entry_at(&path)) else {
        return Ok(false);
    };
    let mergeable = is_type(editor, &prev, LIST)
        && is_ordered(editor, &prev) == is_ordered(editor, list)
        && start_of(editor, &prev).is_none()
        && start_of(editor, list).is_none();
    if mergeable {
        editor.merge_nodes(&list.path)?;
    }
    Ok(mergeable)
}

/// A trailing paragraph after other content starts the next item.
fn normalize_item(editor: &mut Editor, item: &NodeEntry) -> Result<(), EditorError> {
    let children = editor.document().children_of(item.id).to_vec();
    let Some(last) = children.last() else {
        return Ok(());
    };
    if children.len() < 2 || !editor.node(*last).is_some_and(|n| n.is_type(PARAGRAPH)) {
        return Ok(());
    }
    let Some(next) = next_sibling(&item.path) else {
        return Ok(());
    };
    let attrs: Attrs = editor
        .node(item.id)
        .and_then(|n| n.attrs())
        .map(|attrs| {
            attrs
                .iter()
                .filter(|(key, _)| matches!(key.as_str(), "checked" | "spread"))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default();
    let from = child_path(&item.path, children.len() - 1);
    editor.without_normalizing(|editor| {
        editor.move_node(&from, &next)?;
        editor.wrap_node(
            &next,
            ElementNode {
                ty: LIST_ITEM.to_string(),
                attrs,
                children: Vec::new(),
            },
        )?;
        Ok(())
    })
}

fn trigger_list(prefix: &str) -> Option<Attrs> {
    if prefix == "-" {
        return Some(list_attrs(false, None));
    }
    let start = prefix.strip_suffix('.')?.parse::<u64>().ok()?;
    Some(list_attrs(true, Some(start)))
}

fn toggle_from_prefix(
    editor: &mut Editor,
    paragraph: &NodeEntry,
    params: Attrs,
) -> Result<bool, EditorError> {
    if let Some(list) = editor.nearest(paragraph, LIST) {
        set_list_attrs(editor, &list, params)?;
        return Ok(true);
    }
    let (Some(list_config), Some(item_config)) =
        (editor.config_for(LIST), editor.config_for(LIST_ITEM))
    else {
        return Ok(false);
    };
    editor.wrap(paragraph, &[&list_config, &item_config], &[params, Attrs::new()])
}

pub struct ListPlugin;

impl MarkdownPlugin for ListPlugin {
    fn id(&self) -> &'static str {
        "list"
    }

    fn elements(&self) -> Result<Vec<ElementConfig>, FactoryError> {
        let toggle = PrefixToggle::new(
            r"^(?:-|\d+\.)$",
            |prefix, _| trigger_list(prefix),
            toggle_from_prefix,
        )?;
        let list = ElementConfig::block(LIST, ContentType::Flow, Some(ContentType::List))
            .toggle(toggle)
            .normalize(|editor, entry, cx| {
                if normalize_list(editor, entry)? {
                    cx.prevent_defaults();
                }
                Ok(())
            });

        let item = ElementConfig::block(LIST_ITEM, ContentType::List, Some(ContentType::Flow))
            .wrapping_paragraph()
            .normalize(|editor, entry, _| normalize_item(editor, entry))
            .on_start_delete(|editor, paragraph| match item_of(editor, paragraph) {
                Some(item) => outdent_list(editor, &item),
                None => Ok(false),
            })
            .on_start_enter(|editor, paragraph| {
                if !editor.string(paragraph.id).is_empty() {
                    return Ok(false);
                }
                match item_of(editor, paragraph) {
                    Some(item) => outdent_list(editor, &item),
                    None => Ok(false),
                }
            })
            .on_tab(|editor, paragraph| match item_of(editor, paragraph) {
                Some(item) => indent_list(editor, &item, None, None),
                None => Ok(false),
            });
        Ok(vec![list, item])
    }

    fn actions(&self) -> Vec<Action> {
        vec![
            Action::new("indent-list", ActionType::Phrasing, |editor, location, state| {
                let Some(item) = location
                    .entry(editor)
                    .and_then(|entry| editor.nearest(&entry, LIST_ITEM))
                else {
                    return Ok(false);
                };
                indent_list(
                    editor,
                    &item,
                    state.param_bool("ordered"),
                    state.param_u64("start"),
                )
            })
            .compute_state(|editor, location| {
                let Some(item) = location
                    .entry(editor)
                    .and_then(|entry| editor.nearest(&entry, LIST_ITEM))
                else {
                    return ActionState::disabled();
                };
                let Some(list) = parent_list(editor, &item) else {
                    return ActionState::disabled();
                };
                let first = item.path.last().is_none_or(|ix| *ix == 0);
                let single = editor.document().children_of(list.id).len() <= 1;
                ActionState::new(false, first || single)
            }),
            Action::new("outdent-list", ActionType::Phrasing, |editor, location, _| {
                let Some(item) = location
                    .entry(editor)
                    .and_then(|entry| editor.nearest(&entry, LIST_ITEM))
                else {
                    return Ok(false);
                };
                outdent_list(editor, &item)
            })
            .compute_state(|editor, location| {
                let in_list = location
                    .entry(editor)
                    .and_then(|entry| editor.nearest(&entry, LIST_ITEM))
                    .and_then(|item| parent_list(editor, &item))
                    .is_some();
                ActionState::new(false, !in_list)
            }),
            toggle_list(true),
            toggle_list(false),
        ]
    }
}

fn toggle_list(ordered: bool) -> Action {
    let key = if ordered {
        "toggle-ordered-list"
    } else {
        "toggle-unordered-list"
    };
    Action::new(key, ActionType::Phrasing, move |editor, location, state| {
        let (Some(entry), Some(list_config), Some(item_config)) = (
            location.entry(editor),
            editor.config_for(LIST),
            editor.config_for(LIST_ITEM),
        ) else {
            return Ok(false);
        };
        let attrs = list_attrs(ordered, state.param_u64("start"));
        match editor.nearest(&entry, LIST) {
            Some(list) if state.active => editor.unwrap(&list, &[&list_config, &item_config]),
            Some(list) => {
                set_list_attrs(editor, &list, attrs)?;
                Ok(true)
            }
            None => editor.wrap(&entry, &[&list_config, &item_config], &[attrs, Attrs::new()]),
        }
    })
    .compute_state(move |editor, location| {
        let (Some(entry), Some(list_config), Some(item_config)) = (
            location.entry(editor),
            editor.config_for(LIST),
            editor.config_for(LIST_ITEM),
        ) else {
            return ActionState::disabled();
        };
        match editor.nearest(&entry, LIST) {
            Some(list) if is_ordered(editor, &list) == ordered => {
                ActionState::new(true, !editor.can_unwrap(&list, &[&list_config, &item_config]))
            }
            Some(_) => ActionState::new(false, false),
            None => ActionState::new(
                false,
                !editor.can_wrap(&entry, &[&list_config, &item_config]),
            ),
        }
    })
}
