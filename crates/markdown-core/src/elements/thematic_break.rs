use crate::actions::{Action, ActionType};
use crate::content::ContentType;
use crate::editor::Editor;
use crate::error::{EditorError, FactoryError};
use crate::location::{Path, next_sibling};
use crate::node::{Attrs, Node, THEMATIC_BREAK};
use crate::registry::{ElementConfig, MarkdownPlugin, PrefixToggle};

/// Inserts a break at `at` and moves the cursor into the block after it.
fn insert_break(editor: &mut Editor, at: &Path) -> Result<bool, EditorError> {
    editor.without_normalizing(|editor| {
        editor.insert_node(at, Node::thematic_break())?;
        let Some(after) = next_sibling(at) else {
            return Ok(true);
        };
        if editor.node_at(&after).is_none() {
            editor.insert_node(&after, Node::paragraph(""))?;
        }
        if let Some(id) = editor.document().resolve(&after) {
            editor.select_start_of(id);
        }
        Ok(true)
    })
}

pub struct ThematicBreakPlugin;

impl MarkdownPlugin for ThematicBreakPlugin {
    fn id(&self) -> &'static str {
        "thematic-break"
    }

    fn elements(&self) -> Result<Vec<ElementConfig>, FactoryError> {
        let toggle = PrefixToggle::new(
            r"^---$",
            |_, paragraph| (paragraph.path.len() == 1).then(Attrs::new),
            |editor, paragraph, _| insert_break(editor, &paragraph.path),
        )?
        .estimate_prefix_length(3);
        Ok(vec![
            ElementConfig::block(THEMATIC_BREAK, ContentType::Flow, None)
                .void()
                .disallow_text_decorators()
                .toggle(toggle),
        ])
    }

    fn actions(&self) -> Vec<Action> {
        vec![Action::new(
            "insert-thematic-break",
            ActionType::TopLevel,
            |editor, location, _| {
                let Some(at) = next_sibling(&location.path()) else {
                    return Ok(false);
                };
                insert_break(editor, &at)
            },
        )]
    }
}
