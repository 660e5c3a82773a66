use serde::{Deserialize, Serialize};

use crate::editor::{Editor, NodeEntry};
use crate::location::{Range, is_ancestor};
use crate::registry::DecorateFn;

/// An overlay over part of a text leaf, tagged with a highlight token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoratedRange {
    pub range: Range,
    pub token: String,
}

struct Frame {
    element: NodeEntry,
    decorate: DecorateFn,
}

/// Attributes each node's decorations to its nearest decorating ancestor
/// during a reading-order walk.
#[derive(Default)]
pub struct DecorationStack {
    frames: Vec<Frame>,
}

impl DecorationStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn decorate(&mut self, editor: &Editor, entry: &NodeEntry) -> Vec<DecoratedRange> {
        let Some(node) = editor.node(entry.id) else {
            return Vec::new();
        };
        if node.is_root() {
            self.frames.clear();
            return Vec::new();
        }
        if let Some(decorate) = editor
            .element_config(entry.id)
            .and_then(|config| config.decorate.clone())
        {
            self.frames.push(Frame {
                element: entry.clone(),
                decorate,
            });
            return Vec::new();
        }
        self.frames
            .iter()
            .rev()
            .find(|frame| is_ancestor(&frame.element.path, &entry.path))
            .map(|frame| (frame.decorate)(editor, entry, &frame.element))
            .unwrap_or_default()
    }
}

impl Editor {
    /// Decorations for the whole document.
    pub fn decorations(&self) -> Vec<DecoratedRange> {
        let doc = self.document();
        let mut stack = DecorationStack::new();
        let root = doc.root();
        std::iter::once(root)
            .chain(doc.descendants(root))
            .filter_map(|id| self.entry(id))
            .flat_map(|entry| stack.decorate(self, &entry))
            .collect()
    }
}
