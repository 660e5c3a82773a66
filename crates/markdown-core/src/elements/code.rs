use serde_json::Value;

use crate::actions::{Action, ActionState, ActionType};
use crate::content::{ContentType, conforms_opt};
use crate::decoration::DecoratedRange;
use crate::editor::{Editor, NodeEntry};
use crate::error::{EditorError, FactoryError};
use crate::highlight::highlight;
use crate::location::{Point, Range};
use crate::node::{Attrs, CODE, Node, PARAGRAPH};
use crate::registry::{ElementConfig, MarkdownPlugin, PrefixToggle};

use super::{attr, attr_of, is_type};

fn decorate_code(editor: &Editor, entry: &NodeEntry, code: &NodeEntry) -> Vec<DecoratedRange> {
    let Some(text) = editor.node(entry.id).and_then(|n| n.text()) else {
        return Vec::new();
    };
    let Some(lang) = attr_of(editor, code, "lang").and_then(Value::as_str) else {
        return Vec::new();
    };
    highlight(lang, text)
        .into_iter()
        .map(|token| DecoratedRange {
            range: Range::new(
                Point::new(entry.path.clone(), token.start),
                Point::new(entry.path.clone(), token.end),
            ),
            token: token.kind,
        })
        .collect()
}

/// Replaces a block by a code block holding its plain text.
fn block_to_code(editor: &mut Editor, block: &NodeEntry, lang: &str) -> Result<bool, EditorError> {
    let text = editor.string(block.id);
    let path = block.path.clone();
    editor.without_normalizing(|editor| {
        editor.remove_node(&path)?;
        editor.insert_node(&path, Node::code(lang, text))?;
        if let Some(id) = editor.document().resolve(&path) {
            editor.select_end_of(id);
        }
        Ok(true)
    })
}

pub struct CodePlugin;

impl MarkdownPlugin for CodePlugin {
    fn id(&self) -> &'static str {
        "code"
    }

    fn elements(&self) -> Result<Vec<ElementConfig>, FactoryError> {
        let toggle = PrefixToggle::new(
            r"^```([\w+#-]*)$",
            |prefix, paragraph| {
                if paragraph.path.len() != 1 {
                    return None;
                }
                let lang = prefix.trim_start_matches('`');
                Some(if lang.is_empty() {
                    Attrs::new()
                } else {
                    attr("lang", lang)
                })
            },
            |editor, paragraph, params| {
                let lang = params
                    .get("lang")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| editor.config().code_block_default_lang.clone());
                block_to_code(editor, paragraph, &lang)
            },
        )?;
        let code = ElementConfig::block(CODE, ContentType::Flow, Some(ContentType::Value))
            .decorate(decorate_code)
            .toggle(toggle);
        Ok(vec![code])
    }

    fn actions(&self) -> Vec<Action> {
        vec![
            Action::new("toggle-codeblock", ActionType::Phrasing, |editor, location, state| {
                let Some(entry) = location.entry(editor) else {
                    return Ok(false);
                };
                if state.active {
                    editor.replace_node_attrs(&entry.path, PARAGRAPH, Attrs::new())?;
                    return Ok(true);
                }
                let lang = editor.config().code_block_default_lang.clone();
                block_to_code(editor, &entry, &lang)
            })
            .compute_state(|editor, location| {
                let Some(entry) = location.entry(editor) else {
                    return ActionState::disabled();
                };
                if is_type(editor, &entry, CODE) {
                    return ActionState::new(true, false);
                }
                let Some(parent) = editor.document().parent_of(entry.id) else {
                    return ActionState::disabled();
                };
                let fits = editor.content_model_type(entry.id) == Some(ContentType::Phrasing)
                    && conforms_opt(Some(ContentType::Flow), editor.content_model_type(parent));
                ActionState::new(false, !fits)
            }),
        ]
    }
}
