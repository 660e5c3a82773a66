use crate::actions::{Action, ActionState, ActionType};
use crate::content::ContentType;
use crate::document::NodeData;
use crate::editor::{Editor, NodeEntry};
use crate::error::EditorError;
use crate::location::Range;
use crate::node::{Decorator, Marks};
use crate::ops::Op;
use crate::registry::{MarkdownPlugin, TextConfig};

/// Decorators a leaf may keep: none on empty text, and inline code excludes
/// every other decorator.
fn allowed_marks(text: &str, marks: Marks) -> Marks {
    if text.is_empty() {
        Marks::default()
    } else if marks.inline_code {
        Marks::default().with(Decorator::InlineCode)
    } else {
        marks
    }
}

fn normalize_text(editor: &mut Editor, entry: &NodeEntry) -> Result<(), EditorError> {
    let (current, allowed) = match editor.node(entry.id).map(|n| n.data()) {
        Some(NodeData::Text { text, marks }) => (*marks, allowed_marks(text, *marks)),
        _ => return Ok(()),
    };
    if allowed != current {
        editor.apply(Op::SetMarks {
            path: entry.path.clone(),
            marks: allowed,
        })?;
    }
    Ok(())
}

/// Whether every text in the range sits in an element that takes decorators.
fn decorators_allowed(editor: &Editor, range: &Range) -> bool {
    let texts = editor.texts_in_range(range);
    !texts.is_empty()
        && texts.iter().all(|(id, _, _)| {
            editor
                .document()
                .parent_of(*id)
                .and_then(|parent| {
                    let config = editor.element_config(parent)?;
                    Some(
                        !config.disallow_text_decorators
                            && config.content_model_type != Some(ContentType::Value),
                    )
                })
                .unwrap_or(false)
        })
}

fn mark_action(decorator: Decorator, hotkey: Option<&str>) -> Action {
    let action = Action::new(
        decorator.key(),
        ActionType::Selection,
        move |editor, location, state| {
            let Some(range) = location.range().cloned() else {
                return Ok(false);
            };
            let on = !state.active;
            if range.is_collapsed() {
                let mut marks = editor.marks().unwrap_or_default();
                marks.set(decorator, on);
                editor.set_pending_marks(Some(marks));
            } else {
                editor.set_marks_in_range(&range, decorator, on)?;
            }
            Ok(true)
        },
    )
    .compute_state(move |editor, location| {
        let Some(range) = location.range() else {
            return ActionState::disabled();
        };
        ActionState::new(
            editor.is_mark_active_in(range, decorator),
            !decorators_allowed(editor, range),
        )
    });
    match hotkey {
        Some(hotkey) => action.hotkey(hotkey),
        None => action,
    }
}

pub struct TextPlugin;

impl MarkdownPlugin for TextPlugin {
    fn id(&self) -> &'static str {
        "text"
    }

    fn text(&self) -> Option<TextConfig> {
        Some(TextConfig::default().normalize(|editor, entry, _| normalize_text(editor, entry)))
    }

    fn actions(&self) -> Vec<Action> {
        vec![
            mark_action(Decorator::Strong, Some("mod+b")),
            mark_action(Decorator::Emphasis, Some("mod+i")),
            mark_action(Decorator::Delete, None),
            mark_action(Decorator::InlineCode, Some("mod+e")),
        ]
    }
}
