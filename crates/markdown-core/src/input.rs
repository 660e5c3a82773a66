//! Keyboard and clipboard entry points.
//!
//! Typing runs through the prefix toggles and autolinking, the block events
//! intercept delete, enter and tab, and pasted content goes through the
//! markdown and HTML bridges before it is inserted.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actions::KeyEvent;
use crate::content::ContentType;
use crate::document::NodeId;
use crate::editor::{Editor, NodeEntry};
use crate::elements::{insert_inlines, trailing_url};
use crate::error::EditorError;
use crate::location::{Point, Range, next_sibling};
use crate::node::{ElementNode, HEADING, LINK, Node, PARAGRAPH};
use crate::registry::BlockEvent;
use crate::upload::{PendingUpload, UploadFile};

/// Clipboard or drag payload. An internal fragment is preferred, then HTML,
/// then plain text read as markdown. Files only matter when nothing else is
/// present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataTransfer {
    pub fragment: Option<Vec<Node>>,
    pub html: Option<String>,
    pub text: Option<String>,
    pub files: Vec<UploadFile>,
}

impl DataTransfer {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn html(html: impl Into<String>) -> Self {
        Self {
            html: Some(html.into()),
            ..Self::default()
        }
    }

    pub fn files(files: Vec<UploadFile>) -> Self {
        Self {
            files,
            ..Self::default()
        }
    }

    fn has_content(&self) -> bool {
        self.fragment.is_some()
            || self.html.as_deref().is_some_and(|html| !html.is_empty())
            || self.text.as_deref().is_some_and(|text| !text.is_empty())
    }
}

fn is_blank(editor: &Editor, id: NodeId) -> bool {
    let doc = editor.document();
    doc.string(id).is_empty()
        && doc
            .children_of(id)
            .iter()
            .all(|child| doc.get(*child).is_some_and(|n| n.is_text()))
}

impl Editor {
    /// Collapses an expanded selection by deleting it. Returns the cursor.
    fn collapse_selection(&mut self) -> Result<Option<Point>, EditorError> {
        let Some(range) = self.selection() else {
            return Ok(None);
        };
        if !range.is_collapsed() {
            self.delete_range(&range)?;
        }
        Ok(self.selection().map(|range| range.anchor))
    }

    /// Types `data` at the selection.
    pub fn insert_text(&mut self, data: &str) -> Result<(), EditorError> {
        self.without_normalizing(|editor| {
            let Some(point) = editor.collapse_selection()? else {
                return Ok(());
            };
            if data == " " {
                if editor.try_prefix_toggle(&point)? {
                    return Ok(());
                }
                if editor.config().autolink {
                    editor.autolink_before(&point)?;
                }
            }
            let point = editor.selection().map_or(point, |range| range.anchor);
            let point = editor.step_out_of_link_end(point)?;
            editor.insert_text_at(&point, data)
        })
    }

    /// Moves a point at the end of a link's last text to the text right after
    /// the link, creating that text when the link closes its block.
    fn step_out_of_link_end(&mut self, point: Point) -> Result<Point, EditorError> {
        let doc = self.document();
        let Some(leaf) = doc.resolve(&point.path) else {
            return Ok(point);
        };
        let Some(link) = doc
            .parent_of(leaf)
            .filter(|id| self.node(*id).is_some_and(|n| n.is_type(LINK)))
        else {
            return Ok(point);
        };
        if doc.children_of(link).last() != Some(&leaf) || self.text_len(leaf) != point.offset {
            return Ok(point);
        }
        let Some(link_path) = doc.path_of(link) else {
            return Ok(point);
        };
        let marks = self
            .node(leaf)
            .and_then(|n| n.marks().copied())
            .unwrap_or_default();
        let after = next_sibling(&link_path)
            .ok_or_else(|| EditorError::invalid_path(&link_path, "root cannot hold text"))?;
        if !self.node_at(&after).is_some_and(|n| n.is_text()) {
            self.insert_node(&after, Node::styled("", marks))?;
        }
        if let Some(id) = self.document().resolve(&after) {
            self.select_start_of(id);
        }
        Ok(Point::new(after, 0))
    }

    /// Runs the first prefix toggle matching the text before the cursor.
    fn try_prefix_toggle(&mut self, point: &Point) -> Result<bool, EditorError> {
        let doc = self.document();
        let Some(leaf) = doc.resolve(&point.path) else {
            return Ok(false);
        };
        let Some(paragraph) = doc.parent_of(leaf).and_then(|id| self.entry(id)) else {
            return Ok(false);
        };
        if !self.node(paragraph.id).is_some_and(|n| n.is_type(PARAGRAPH))
            || doc.index_of(leaf) != Some(0)
        {
            return Ok(false);
        }
        let Some(prefix) = self
            .node(leaf)
            .and_then(|n| n.text())
            .and_then(|text| text.get(..point.offset))
            .map(str::to_string)
        else {
            return Ok(false);
        };
        if prefix.is_empty() {
            return Ok(false);
        }

        let matched = self.factory().elements().find_map(|config| {
            let toggle = config.toggle.as_ref()?;
            let params = toggle.trigger(&prefix, &paragraph)?;
            Some((config.ty.clone(), toggle.toggle.clone(), params))
        });
        let Some((ty, toggle, params)) = matched else {
            return Ok(false);
        };
        debug!(element = %ty, %prefix, "prefix toggle");
        self.remove_text(leaf, 0, point.offset)?;
        toggle(self, &paragraph, params)?;
        Ok(true)
    }

    /// Wraps a URL ending right before the cursor in a link and leaves the
    /// cursor after it.
    fn autolink_before(&mut self, point: &Point) -> Result<bool, EditorError> {
        let doc = self.document();
        let Some(leaf) = doc.resolve(&point.path) else {
            return Ok(false);
        };
        let in_link = doc
            .ancestors(leaf)
            .iter()
            .any(|id| self.node(*id).is_some_and(|n| n.is_type(LINK)));
        let phrasing = doc
            .parent_of(leaf)
            .is_some_and(|parent| self.content_model_type(parent) == Some(ContentType::Phrasing));
        if in_link || !phrasing {
            return Ok(false);
        }
        let Some(node) = self.node(leaf) else {
            return Ok(false);
        };
        let marks = node.marks().copied().unwrap_or_default();
        let Some(text) = node.text() else {
            return Ok(false);
        };
        let len = text.len();
        let Some((start, url)) = text.get(..point.offset).and_then(trailing_url) else {
            return Ok(false);
        };
        let url = url.to_string();
        debug!(%url, "autolink");

        self.without_normalizing(|editor| {
            let path = point.path.clone();
            if point.offset < len {
                editor.split_node(&path, point.offset)?;
            }
            let target = if start > 0 {
                editor.split_node(&path, start)?;
                next_sibling(&path)
                    .ok_or_else(|| EditorError::invalid_path(&path, "root cannot hold text"))?
            } else {
                path
            };
            editor.wrap_node(&target, ElementNode::new(LINK, Vec::new()).with_attr("url", url))?;
            let after = next_sibling(&target)
                .ok_or_else(|| EditorError::invalid_path(&target, "root cannot hold text"))?;
            if !editor.node_at(&after).is_some_and(|n| n.is_text()) {
                editor.insert_node(&after, Node::styled("", marks))?;
            }
            if let Some(id) = editor.document().resolve(&after) {
                editor.select_start_of(id);
            }
            Ok(true)
        })
    }

    /// Fires a block event for the block holding `point`. Delete and enter
    /// only fire at the very start of the block. A paragraph that opens a
    /// wrapping container hands the event on to the container.
    fn fire_block_event(&mut self, event: BlockEvent, point: &Point) -> Result<bool, EditorError> {
        let Some(leaf) = self.document().resolve(&point.path) else {
            return Ok(false);
        };
        let Some(block) = self.block_of(leaf) else {
            return Ok(false);
        };
        if event != BlockEvent::Tab {
            let first = self.document().texts_in(block.id).first().copied();
            if point.offset != 0 || first != Some(leaf) {
                return Ok(false);
            }
        }

        let own = self
            .element_config(block.id)
            .and_then(|config| config.events.handler(event).cloned());
        let opens_container = self.node(block.id).is_some_and(|n| n.is_type(PARAGRAPH))
            && self.document().index_of(block.id) == Some(0);
        let container = self
            .parent_entry(&block)
            .filter(|_| opens_container)
            .and_then(|parent| {
                let config = self.element_config(parent.id)?;
                config
                    .wrapping_paragraph
                    .then(|| config.events.handler(event).cloned())
                    .flatten()
            });
        if own.is_none() && container.is_none() {
            return Ok(false);
        }

        debug!(?event, block = ?block.path, "block event");
        self.without_normalizing(|editor| {
            if let Some(handler) = own
                && handler(editor, &block)?
            {
                return Ok(true);
            }
            match container {
                Some(handler) => handler(editor, &block),
                None => Ok(false),
            }
        })
    }

    /// Backspace.
    pub fn delete_backward(&mut self) -> Result<(), EditorError> {
        let Some(range) = self.selection() else {
            return Ok(());
        };
        if !range.is_collapsed() {
            return self.delete_range(&range);
        }
        let point = range.anchor;
        if self.fire_block_event(BlockEvent::StartDelete, &point)? {
            return Ok(());
        }
        let Some(leaf) = self.document().resolve(&point.path) else {
            return Ok(());
        };

        if point.offset > 0 {
            let step = self
                .node(leaf)
                .and_then(|n| n.text())
                .and_then(|text| text.get(..point.offset))
                .and_then(|before| before.chars().next_back())
                .map_or(1, char::len_utf8);
            let from = Point::new(point.path.clone(), point.offset.saturating_sub(step));
            return self.delete_range(&Range::new(from, point));
        }

        let Some(previous) = self.previous_text(leaf) else {
            return Ok(());
        };
        let (Some(path), len) = (self.document().path_of(previous), self.text_len(previous)) else {
            return Ok(());
        };
        let same_block = self.block_of(previous).map(|b| b.id) == self.block_of(leaf).map(|b| b.id);
        let from = if same_block && len > 0 {
            let step = self
                .node(previous)
                .and_then(|n| n.text())
                .and_then(|text| text.chars().next_back())
                .map_or(1, char::len_utf8);
            Point::new(path, len - step)
        } else {
            Point::new(path, len)
        };
        if same_block && len == 0 {
            self.select(from);
            return self.delete_backward();
        }
        self.delete_range(&Range::new(from, point))
    }

    /// Enter. Splits the block at the cursor unless a block event takes it.
    pub fn insert_break(&mut self) -> Result<(), EditorError> {
        self.without_normalizing(|editor| {
            let Some(point) = editor.collapse_selection()? else {
                return Ok(());
            };
            if editor.fire_block_event(BlockEvent::StartEnter, &point)? {
                return Ok(());
            }
            let Some(leaf) = editor.document().resolve(&point.path) else {
                return Ok(());
            };
            let Some(block) = editor.block_of(leaf) else {
                return Ok(());
            };
            let splittable = editor
                .document()
                .parent_of(block.id)
                .is_some_and(|parent| editor.content_model_type(parent) == Some(ContentType::Flow))
                && editor.content_model_type(block.id) != Some(ContentType::Value);
            if !splittable {
                return editor.insert_text_at(&point, "\n");
            }

            let after = editor.split_block_at(&point, &block.path)?;
            let is_heading = editor.node_at(&after).is_some_and(|n| n.is_type(HEADING));
            if let Some(id) = editor.document().resolve(&after)
                && is_heading
                && is_blank(editor, id)
            {
                editor.replace_node_attrs(&after, PARAGRAPH, Default::default())?;
            }
            Ok(())
        })
    }

    /// Tab. Returns whether a block consumed it.
    pub fn tab(&mut self) -> Result<bool, EditorError> {
        let Some(range) = self.selection() else {
            return Ok(false);
        };
        if !range.is_collapsed() {
            return Ok(false);
        }
        self.fire_block_event(BlockEvent::Tab, &range.anchor)
    }

    /// Routes a key press. Returns whether the editor handled it.
    pub fn key_down(&mut self, event: &KeyEvent) -> Result<bool, EditorError> {
        if let Some(action) = self.factory().action_for_hotkey(event).cloned()
            && self.run_action(&action.key, None)?
        {
            return Ok(true);
        }
        let plain = !(event.ctrl || event.meta || event.shift || event.alt);
        match event.key.to_lowercase().as_str() {
            "tab" if plain => self.tab(),
            "enter" if event.ctrl => {
                self.insert_text("\n")?;
                Ok(true)
            }
            "enter" if plain => {
                let in_text_block = self
                    .selection()
                    .and_then(|range| self.document().resolve(&range.anchor.path))
                    .and_then(|leaf| self.block_of(leaf))
                    .and_then(|block| self.node(block.id))
                    .is_some_and(|n| n.is_type(PARAGRAPH) || n.is_type(HEADING));
                if in_text_block {
                    self.insert_break()?;
                } else {
                    self.insert_text("\n")?;
                }
                Ok(true)
            }
            "backspace" if plain => {
                self.delete_backward()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Inserts pasted content at the selection. Files with no other content
    /// start an image upload, returned for the host to drive.
    pub fn paste(&mut self, data: DataTransfer) -> Result<Option<PendingUpload>, EditorError> {
        if !data.has_content() {
            let images: Vec<UploadFile> =
                data.files.into_iter().filter(UploadFile::is_image).collect();
            return Ok(self.begin_image_upload(images));
        }
        let in_value = self
            .selection()
            .and_then(|range| self.document().resolve(&range.anchor.path))
            .and_then(|leaf| self.block_of(leaf))
            .is_some_and(|block| self.content_model_type(block.id) == Some(ContentType::Value));

        let fragment = match data {
            DataTransfer {
                fragment: Some(fragment),
                ..
            } => {
                debug!(nodes = fragment.len(), "paste internal fragment");
                fragment
            }
            DataTransfer {
                text: Some(text), ..
            } if in_value => {
                debug!("paste plain text into value block");
                self.without_normalizing(|editor| {
                    let Some(point) = editor.collapse_selection()? else {
                        return Ok(());
                    };
                    editor.insert_text_at(&point, &text)
                })?;
                return Ok(None);
            }
            DataTransfer {
                html: Some(html), ..
            } if !html.is_empty() => {
                debug!("paste html");
                self.parse_html(&html)
            }
            DataTransfer { text, .. } => {
                debug!("paste markdown text");
                self.parse_markdown(text.as_deref().unwrap_or_default())
            }
        };
        self.insert_fragment(fragment)?;
        Ok(None)
    }

    /// Drops data at `at`, as a paste there.
    pub fn drop_data(
        &mut self,
        data: DataTransfer,
        at: Point,
    ) -> Result<Option<PendingUpload>, EditorError> {
        self.select(at);
        self.paste(data)
    }

    /// Inserts a fragment at the selection. Blocks split the block holding the
    /// cursor, a lone paragraph is inserted inline, and value blocks receive
    /// the fragment as markdown text.
    pub fn insert_fragment(&mut self, fragment: Vec<Node>) -> Result<bool, EditorError> {
        if fragment.is_empty() {
            return Ok(false);
        }
        self.without_normalizing(|editor| {
            let Some(point) = editor.collapse_selection()? else {
                return Ok(false);
            };
            let Some(leaf) = editor
                .document()
                .resolve(&point.path)
                .filter(|id| editor.node(*id).is_some_and(|n| n.is_text()))
            else {
                return Ok(false);
            };
            let Some(block) = editor.block_of(leaf) else {
                return Ok(false);
            };

            if editor.content_model_type(block.id) == Some(ContentType::Value) {
                let text = editor.generate_markdown(&fragment)?;
                editor.insert_text_at(&point, text.trim_end_matches('\n'))?;
                return Ok(true);
            }
            if let [Node::Element(only)] = fragment.as_slice()
                && only.ty == PARAGRAPH
            {
                return insert_inlines(editor, &Range::collapsed(point), only.children.clone());
            }
            let holds_blocks = editor
                .document()
                .parent_of(block.id)
                .is_some_and(|parent| editor.content_model_type(parent) == Some(ContentType::Flow));
            if !holds_blocks {
                let text = fragment
                    .iter()
                    .map(Node::string)
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                editor.insert_text_at(&point, &text)?;
                return Ok(true);
            }
            editor.insert_blocks(&point, &block, fragment)
        })
    }

    fn insert_blocks(
        &mut self,
        point: &Point,
        block: &NodeEntry,
        fragment: Vec<Node>,
    ) -> Result<bool, EditorError> {
        let count = fragment.len();
        let after = self.split_block_at(point, &block.path)?;
        let tail = self.document().resolve(&after);
        self.insert_nodes(&after, fragment)?;
        let Some((&index, parent)) = after.split_last() else {
            return Ok(false);
        };
        let inserted: Vec<NodeId> = (index..index + count)
            .filter_map(|ix| {
                let mut path = parent.to_vec();
                path.push(ix);
                self.document().resolve(&path)
            })
            .collect();

        for half in [Some(block.id), tail].into_iter().flatten() {
            if is_blank(self, half)
                && let Some(path) = self.document().path_of(half)
            {
                self.remove_node(&path)?;
            }
        }
        if let Some(last) = inserted.last() {
            self.select_end_of(*last);
        }
        Ok(true)
    }

    /// The selected content as a fragment. A selection inside one block
    /// yields a paragraph of the selected slices, anything wider copies the
    /// touched top-level blocks whole.
    pub fn fragment_of(&self, range: &Range) -> Vec<Node> {
        let doc = self.document();
        let (start, end) = range.edges();
        let (Some(first), Some(last)) = (doc.resolve(&start.path), doc.resolve(&end.path)) else {
            return Vec::new();
        };
        let same_block = self.block_of(first).map(|b| b.id) == self.block_of(last).map(|b| b.id);
        if !same_block {
            let (Some(from), Some(to)) = (start.path.first(), end.path.first()) else {
                return Vec::new();
            };
            return (*from..=*to)
                .filter_map(|ix| self.node_at(&[ix])?.to_node())
                .collect();
        }

        let children: Vec<Node> = self
            .texts_in_range(range)
            .into_iter()
            .filter(|(_, lo, hi)| lo < hi)
            .filter_map(|(id, lo, hi)| {
                let node = self.node(id)?;
                let slice = node.text()?.get(lo..hi)?;
                let leaf = Node::styled(slice, node.marks().copied().unwrap_or_default());
                match node.parent() {
                    Some(parent) if parent.is_type(LINK) => Some(Node::Element(ElementNode {
                        ty: LINK.to_string(),
                        attrs: parent.attrs().cloned().unwrap_or_default(),
                        children: vec![leaf],
                    })),
                    _ => Some(leaf),
                }
            })
            .collect();
        if children.is_empty() {
            return Vec::new();
        }
        vec![Node::element(PARAGRAPH, children)]
    }

    /// Clipboard payload for the selection, or `None` when it is collapsed.
    pub fn copy(&self) -> Result<Option<DataTransfer>, EditorError> {
        let Some(range) = self.selection().filter(|range| !range.is_collapsed()) else {
            return Ok(None);
        };
        let fragment = self.fragment_of(&range);
        if fragment.is_empty() {
            return Ok(None);
        }
        let text = self.generate_markdown(&fragment)?;
        let html = self.generate_html(&fragment)?;
        Ok(Some(DataTransfer {
            fragment: Some(fragment),
            html: Some(html),
            text: Some(text),
            files: Vec::new(),
        }))
    }
}
