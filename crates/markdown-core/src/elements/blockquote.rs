use crate::actions::{Action, ActionState, ActionType};
use crate::content::ContentType;
use crate::error::FactoryError;
use crate::node::{Attrs, BLOCKQUOTE};
use crate::registry::{ElementConfig, MarkdownPlugin, PrefixToggle};

use super::{cannot_toggle, is_type};

pub struct BlockquotePlugin;

impl MarkdownPlugin for BlockquotePlugin {
    fn id(&self) -> &'static str {
        "blockquote"
    }

    fn elements(&self) -> Result<Vec<ElementConfig>, FactoryError> {
        let toggle = PrefixToggle::new(
            r"^>$",
            |_, _| Some(Attrs::new()),
            |editor, entry, params| editor.toggle_to(entry, BLOCKQUOTE, params),
        )?
        .estimate_prefix_length(1);

        let blockquote = ElementConfig::block(BLOCKQUOTE, ContentType::Flow, Some(ContentType::Flow))
            .wrapping_paragraph()
            .toggle(toggle)
            .on_start_delete(|editor, paragraph| {
                let Some(quote) = editor
                    .parent_entry(paragraph)
                    .filter(|parent| is_type(editor, parent, BLOCKQUOTE))
                else {
                    return Ok(false);
                };
                let Some(config) = editor.config_for(BLOCKQUOTE) else {
                    return Ok(false);
                };
                editor.unwrap(&quote, &[&config])
            });
        Ok(vec![blockquote])
    }

    fn actions(&self) -> Vec<Action> {
        vec![
            Action::new("toggle-blockquote", ActionType::Phrasing, |editor, location, _| {
                let (Some(entry), Some(config)) =
                    (location.entry(editor), editor.config_for(BLOCKQUOTE))
                else {
                    return Ok(false);
                };
                match editor.nearest(&entry, BLOCKQUOTE) {
                    Some(quote) => editor.unwrap(&quote, &[&config]),
                    None => editor.toggle(&entry, &config, Attrs::new()),
                }
            })
            .compute_state(|editor, location| {
                let (Some(entry), Some(config)) =
                    (location.entry(editor), editor.config_for(BLOCKQUOTE))
                else {
                    return ActionState::disabled();
                };
                match editor.nearest(&entry, BLOCKQUOTE) {
                    Some(quote) => ActionState::new(true, !editor.can_unwrap(&quote, &[&config])),
                    None => ActionState::new(false, cannot_toggle(editor, &entry, BLOCKQUOTE, false)),
                }
            }),
            Action::new("indent-blockquote", ActionType::Phrasing, |editor, location, _| {
                let (Some(entry), Some(config)) =
                    (location.entry(editor), editor.config_for(BLOCKQUOTE))
                else {
                    return Ok(false);
                };
                editor.toggle(&entry, &config, Attrs::new())
            })
            .compute_state(|editor, location| match location.entry(editor) {
                Some(entry) => ActionState::new(false, cannot_toggle(editor, &entry, BLOCKQUOTE, false)),
                None => ActionState::disabled(),
            }),
            Action::new("outdent-blockquote", ActionType::Phrasing, |editor, location, _| {
                let (Some(entry), Some(config)) =
                    (location.entry(editor), editor.config_for(BLOCKQUOTE))
                else {
                    return Ok(false);
                };
                match editor.nearest(&entry, BLOCKQUOTE) {
                    Some(quote) => editor.unwrap(&quote, &[&config]),
                    None => Ok(false),
                }
            })
            .compute_state(|editor, location| {
                let (Some(entry), Some(config)) =
                    (location.entry(editor), editor.config_for(BLOCKQUOTE))
                else {
                    return ActionState::disabled();
                };
                match editor.nearest(&entry, BLOCKQUOTE) {
                    Some(quote) => ActionState::new(true, !editor.can_unwrap(&quote, &[&config])),
                    None => ActionState::disabled(),
                }
            }),
        ]
    }
}
