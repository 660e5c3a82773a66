use crate::actions::{Action, ActionState, ActionType};
use crate::content::ContentType;
use crate::error::FactoryError;
use crate::editor::Editor;
use crate::location::{Point, Range, child_path};
use crate::node::{IMAGE, Node, PARAGRAPH};
use crate::registry::{ElementConfig, MarkdownPlugin};

use super::link::inline_insert_disabled;
use super::{elements_in_range, insert_inlines};

/// An image padded by a space on each side, so the cursor has somewhere to
/// go around the void element.
pub fn image_run(url: &str, alt: &str) -> Vec<Node> {
    vec![Node::text(" "), Node::image(url, alt), Node::text(" ")]
}

/// Whether the block at `path` is a paragraph holding an image, and whether
/// it holds anything besides images and empty text.
fn paragraph_contents(editor: &Editor, path: &[usize]) -> Option<(bool, bool)> {
    let entry = editor.entry_at(path)?;
    if !editor.node(entry.id)?.is_type(PARAGRAPH) {
        return None;
    }
    let mut has_image = false;
    let mut has_text = false;
    for child in editor.document().children_of(entry.id) {
        let node = editor.node(*child)?;
        if node.is_text() {
            has_text |= node.text().is_some_and(|text| !text.is_empty());
        } else if node.is_type(IMAGE) {
            has_image = true;
        } else {
            has_text = true;
        }
    }
    Some((has_image, has_text))
}

pub struct ImagePlugin;

impl MarkdownPlugin for ImagePlugin {
    fn id(&self) -> &'static str {
        "image"
    }

    fn elements(&self) -> Result<Vec<ElementConfig>, FactoryError> {
        Ok(vec![
            ElementConfig::inline(IMAGE, ContentType::StaticPhrasing, None).void(),
        ])
    }

    fn actions(&self) -> Vec<Action> {
        vec![
            Action::new("toggle-image", ActionType::Selection, |editor, location, state| {
                let Some(range) = location.range().cloned() else {
                    return Ok(false);
                };
                if state.active {
                    let images = elements_in_range(editor, &range, IMAGE);
                    return editor.without_normalizing(|editor| {
                        for image in images.iter().rev() {
                            if let Some(path) = editor.document().path_of(image.id) {
                                editor.remove_node(&path)?;
                            }
                        }
                        Ok(true)
                    });
                }
                let Some(url) = state.param_str("url").filter(|url| !url.is_empty()) else {
                    return Ok(false);
                };
                let run = image_run(url, state.param_str("alt").unwrap_or_default());
                insert_inlines(editor, &range, run)
            })
            .compute_state(|editor, location| {
                let active = location
                    .range()
                    .is_some_and(|range| !elements_in_range(editor, range, IMAGE).is_empty());
                ActionState::new(active, inline_insert_disabled(editor, location) && !active)
            }),
            Action::new("insert-image", ActionType::TopLevel, |editor, location, state| {
                let Some(url) = state.param_str("url").filter(|url| !url.is_empty()) else {
                    return Ok(false);
                };
                let alt = state.param_str("alt").unwrap_or("no-alt");
                let path = location.path();
                editor.insert_node(&path, Node::paragraph(""))?;
                let start = Range::collapsed(Point::new(child_path(&path, 0), 0));
                insert_inlines(editor, &start, image_run(url, alt))
            })
            .compute_state(|editor, location| match paragraph_contents(editor, &location.path()) {
                Some((has_image, has_text)) => ActionState::new(has_image, has_image || has_text),
                None => ActionState::disabled(),
            }),
        ]
    }
}
