use serde_json::Value;

use crate::actions::{Action, ActionState, ActionType};
use crate::content::ContentType;
use crate::editor::{Editor, NodeEntry};
use crate::error::FactoryError;
use crate::node::{Attrs, HEADING, PARAGRAPH};
use crate::registry::{ElementConfig, MarkdownPlugin, PrefixToggle};

use super::{attr, attr_of, cannot_toggle, is_type};

const MAX_DEPTH: u64 = 6;

fn depth_of(editor: &Editor, entry: &NodeEntry) -> Option<u64> {
    if !is_type(editor, entry, HEADING) {
        return None;
    }
    Some(attr_of(editor, entry, "depth").and_then(Value::as_u64).unwrap_or(1))
}

pub struct HeadingPlugin;

impl MarkdownPlugin for HeadingPlugin {
    fn id(&self) -> &'static str {
        "heading"
    }

    fn elements(&self) -> Result<Vec<ElementConfig>, FactoryError> {
        let toggle = PrefixToggle::new(
            r"^#{1,6}$",
            |prefix, _| Some(attr("depth", prefix.len() as u64)),
            |editor, entry, params| editor.toggle_to(entry, HEADING, params),
        )?
        .estimate_prefix_length(6);

        let heading = ElementConfig::block(HEADING, ContentType::Flow, Some(ContentType::Phrasing))
            .toggle(toggle)
            .on_tab(|editor, entry| {
                let Some(depth) = depth_of(editor, entry) else {
                    return Ok(false);
                };
                if depth < MAX_DEPTH {
                    editor.set_node(&entry.path, None, attr("depth", depth + 1))?;
                }
                Ok(true)
            })
            .on_start_delete(|editor, entry| {
                let Some(depth) = depth_of(editor, entry) else {
                    return Ok(false);
                };
                if depth > 1 {
                    editor.set_node(&entry.path, None, attr("depth", depth - 1))?;
                } else {
                    editor.replace_node_attrs(&entry.path, PARAGRAPH, Attrs::new())?;
                }
                Ok(true)
            })
            .on_start_enter(|editor, entry| {
                if depth_of(editor, entry).is_none() {
                    return Ok(false);
                }
                editor.replace_node_attrs(&entry.path, PARAGRAPH, Attrs::new())?;
                Ok(true)
            });
        Ok(vec![heading])
    }

    fn actions(&self) -> Vec<Action> {
        (1..=MAX_DEPTH).map(toggle_heading).collect()
    }
}

fn toggle_heading(depth: u64) -> Action {
    Action::new(
        format!("toggle-heading-{depth}"),
        ActionType::Phrasing,
        |editor, location, state| {
            let Some(entry) = location.entry(editor) else {
                return Ok(false);
            };
            if state.active {
                return editor.toggle_to(&entry, PARAGRAPH, Attrs::new());
            }
            let depth = state.param_u64("depth").unwrap_or(1).clamp(1, MAX_DEPTH);
            editor.toggle_to(&entry, HEADING, attr("depth", depth))
        },
    )
    .default_param("depth", depth)
    .compute_state(move |editor, location| {
        let Some(entry) = location.entry(editor) else {
            return ActionState::disabled();
        };
        match editor.nearest(&entry, HEADING) {
            Some(heading) => ActionState::new(
                depth_of(editor, &heading) == Some(depth),
                cannot_toggle(editor, &heading, PARAGRAPH, false),
            ),
            None => ActionState::new(false, cannot_toggle(editor, &entry, HEADING, true)),
        }
    })
}
