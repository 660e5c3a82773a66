use std::sync::OnceLock;

use regex::Regex;

use crate::actions::{Action, ActionLocation, ActionState, ActionType};
use crate::content::ContentType;
use crate::editor::Editor;
use crate::error::FactoryError;
use crate::node::{IMAGE, LINK, Node};
use crate::registry::{ElementConfig, MarkdownPlugin};

use super::{elements_in_range, insert_inlines};

/// A bare `http(s)` URL that ends `text`, with its byte offset.
pub fn trailing_url(text: &str) -> Option<(usize, &str)> {
    static URL: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = URL
        .get_or_init(|| Regex::new(r"(?:^|\s)(https?://[^\s<>]+)$").ok())
        .as_ref()?;
    let found = pattern.captures(text)?.get(1)?;
    Some((found.start(), found.as_str()))
}

/// Shared by the link and image actions: inline elements are only offered
/// inside a single phrasing block that allows decorators.
pub(super) fn inline_insert_disabled(editor: &Editor, location: &ActionLocation) -> bool {
    let Some(range) = location.range() else {
        return true;
    };
    let parent = |path: &[usize]| {
        editor
            .document()
            .resolve(path)
            .and_then(|id| editor.document().parent_of(id))
    };
    let (Some(anchor), Some(focus)) = (parent(&range.anchor.path), parent(&range.focus.path))
    else {
        return true;
    };
    if anchor != focus {
        return true;
    }
    let decorators_allowed = editor
        .element_config(anchor)
        .is_some_and(|config| !config.disallow_text_decorators);
    !decorators_allowed || editor.content_model_type(anchor) != Some(ContentType::Phrasing)
}

pub struct LinkPlugin;

impl MarkdownPlugin for LinkPlugin {
    fn id(&self) -> &'static str {
        "link"
    }

    fn elements(&self) -> Result<Vec<ElementConfig>, FactoryError> {
        let link = ElementConfig::inline(LINK, ContentType::Phrasing, Some(ContentType::StaticPhrasing))
            .normalize(|editor, entry, cx| {
                let blank = editor.string(entry.id).trim().is_empty();
                let has_image = editor
                    .document()
                    .children_of(entry.id)
                    .iter()
                    .any(|id| editor.node(*id).is_some_and(|n| n.is_type(IMAGE)));
                if blank && !has_image {
                    editor.remove_node(&entry.path)?;
                    cx.prevent_defaults();
                }
                Ok(())
            });
        Ok(vec![link])
    }

    fn actions(&self) -> Vec<Action> {
        vec![
            Action::new("toggle-link", ActionType::Selection, |editor, location, state| {
                let Some(range) = location.range().cloned() else {
                    return Ok(false);
                };
                if state.active {
                    let links = elements_in_range(editor, &range, LINK);
                    return editor.without_normalizing(|editor| {
                        for link in links.iter().rev() {
                            if let Some(path) = editor.document().path_of(link.id) {
                                editor.unwrap_node(&path)?;
                            }
                        }
                        Ok(true)
                    });
                }
                let Some(url) = state.param_str("url").filter(|url| !url.is_empty()) else {
                    return Ok(false);
                };
                let url = url.to_string();
                let selected: String = editor
                    .texts_in_range(&range)
                    .into_iter()
                    .filter_map(|(id, lo, hi)| {
                        editor.node(id)?.text()?.get(lo..hi).map(str::to_string)
                    })
                    .collect();
                let text = state
                    .param_str("text")
                    .filter(|text| !text.is_empty())
                    .map(str::to_string)
                    .or_else(|| (!selected.is_empty()).then_some(selected))
                    .unwrap_or_else(|| url.clone());
                insert_inlines(editor, &range, vec![Node::link(&url, text), Node::text(" ")])
            })
            .compute_state(|editor, location| {
                let active = location
                    .range()
                    .is_some_and(|range| !elements_in_range(editor, range, LINK).is_empty());
                ActionState::new(active, inline_insert_disabled(editor, location) && !active)
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_must_end_the_text() {
        assert_eq!(
            trailing_url("see https://example.com/a?b=1"),
            Some((4, "https://example.com/a?b=1"))
        );
        assert_eq!(trailing_url("http://x.io"), Some((0, "http://x.io")));
        assert_eq!(trailing_url("https://example.com and more"), None);
        assert_eq!(trailing_url("nothttps://example.com"), None);
    }
}
