use crate::actions::{Action, ActionState, ActionType};
use crate::content::ContentType;
use crate::error::FactoryError;
use crate::node::{Attrs, Node, PARAGRAPH};
use crate::registry::{ElementConfig, MarkdownPlugin};

use super::cannot_toggle;

pub struct ParagraphPlugin;

impl MarkdownPlugin for ParagraphPlugin {
    fn id(&self) -> &'static str {
        "paragraph"
    }

    fn elements(&self) -> Result<Vec<ElementConfig>, FactoryError> {
        Ok(vec![ElementConfig::block(
            PARAGRAPH,
            ContentType::Flow,
            Some(ContentType::Phrasing),
        )])
    }

    fn actions(&self) -> Vec<Action> {
        vec![
            Action::new("toggle-paragraph", ActionType::Phrasing, |editor, location, _| {
                let Some(entry) = location.entry(editor) else {
                    return Ok(false);
                };
                editor.toggle_to(&entry, PARAGRAPH, Attrs::new())
            })
            .compute_state(|editor, location| {
                let Some(entry) = location.entry(editor) else {
                    return ActionState::disabled();
                };
                if editor.nearest(&entry, PARAGRAPH).is_some() {
                    return ActionState::new(true, true);
                }
                ActionState::new(false, cannot_toggle(editor, &entry, PARAGRAPH, true))
            }),
            Action::new("insert-paragraph", ActionType::TopLevel, |editor, location, _| {
                let path = location.path();
                editor.insert_node(&path, Node::paragraph(""))?;
                if let Some(id) = editor.document().resolve(&path) {
                    editor.select_start_of(id);
                }
                Ok(true)
            }),
        ]
    }
}
