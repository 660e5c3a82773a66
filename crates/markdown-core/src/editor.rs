use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::content::{ContentType, ContentTypePair};
use crate::document::{Document, NodeData, NodeId, NodeView};
use crate::error::EditorError;
use crate::location::{Path, Point, Range};
use crate::node::{Marks, Node};
use crate::ops::{Op, PointShift};
use crate::registry::{ElementConfig, EditorFactory};

/// A node together with the path it had when the entry was taken.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeEntry {
    pub id: NodeId,
    pub path: Path,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub max_normalize_iterations: usize,
    pub code_block_default_lang: String,
    pub autolink: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_normalize_iterations: 0,
            code_block_default_lang: String::new(),
            autolink: true,
        }
    }
}

impl EditorConfig {
    pub fn with_defaults(mut self) -> Self {
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = 100;
        }
        if self.code_block_default_lang.is_empty() {
            self.code_block_default_lang = "markdown".to_string();
        }
        self
    }
}

pub type AlertFn = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// A position held by node identity, so it survives unrelated edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Anchor {
    pub node: NodeId,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TrackedRange {
    anchor: Anchor,
    focus: Anchor,
}

/// Live reference to a node. Resolves to `None` once the node is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathRef {
    node: NodeId,
}

impl PathRef {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn current(&self, editor: &Editor) -> Option<Path> {
        editor.doc.path_of(self.node)
    }
}

/// Live reference to a point, kept up to date by the owning editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointRef {
    key: u64,
}

impl PointRef {
    pub fn current(&self, editor: &Editor) -> Option<Point> {
        let anchor = editor.refs.get(&self.key).copied().flatten()?;
        editor.point_of(anchor)
    }

    pub fn unref(self, editor: &mut Editor) -> Option<Point> {
        let point = self.current(editor);
        editor.refs.remove(&self.key);
        point
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeRef {
    anchor: PointRef,
    focus: PointRef,
}

impl RangeRef {
    pub fn current(&self, editor: &Editor) -> Option<Range> {
        Some(Range::new(
            self.anchor.current(editor)?,
            self.focus.current(editor)?,
        ))
    }

    pub fn unref(self, editor: &mut Editor) -> Option<Range> {
        let anchor = self.anchor.unref(editor);
        let focus = self.focus.unref(editor);
        Some(Range::new(anchor?, focus?))
    }
}

/// What a host renderer receives for one element or leaf.
#[derive(Debug)]
pub struct RenderProps<'a> {
    pub node: NodeView<'a>,
    pub path: Path,
    pub children: &'a [NodeId],
    pub editable: bool,
}

/// Dirty nodes, deepest first. A node's key is its path when it was marked;
/// a key gone stale is refreshed when it reaches the top.
#[derive(Debug, Default)]
struct DirtyQueue {
    members: HashSet<NodeId>,
    queue: BinaryHeap<(usize, Path, NodeId)>,
}

impl DirtyQueue {
    fn mark(&mut self, doc: &Document, id: NodeId) {
        if !self.members.insert(id) {
            return;
        }
        match doc.path_of(id) {
            Some(path) => self.queue.push((path.len(), path, id)),
            None => {
                self.members.remove(&id);
            }
        }
    }

    fn len(&self) -> usize {
        self.members.len()
    }

    fn clear(&mut self) {
        self.members.clear();
        self.queue.clear();
    }

    fn pop_deepest(&mut self, doc: &Document) -> Option<NodeId> {
        while let Some((_, path, id)) = self.queue.pop() {
            if !self.members.contains(&id) {
                continue;
            }
            let Some(current) = doc.path_of(id) else {
                self.members.remove(&id);
                continue;
            };
            if current != path {
                self.queue.push((current.len(), current, id));
                continue;
            }
            self.members.remove(&id);
            return Some(id);
        }
        None
    }
}

/// One editing session over a document.
pub struct Editor {
    pub(crate) doc: Document,
    selection: Option<TrackedRange>,
    factory: Arc<EditorFactory>,
    config: EditorConfig,
    dirty: DirtyQueue,
    normalize_depth: usize,
    operations: Vec<Op>,
    refs: HashMap<u64, Option<Anchor>>,
    next_ref: u64,
    pending_marks: Option<Marks>,
    on_alert: Option<AlertFn>,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("children", &self.doc.to_fragment())
            .field("selection", &self.selection())
            .finish()
    }
}

impl Editor {
    pub fn new(factory: Arc<EditorFactory>, children: Vec<Node>) -> Result<Self, EditorError> {
        Self::with_config(factory, EditorConfig::default(), children)
    }

    pub fn with_config(
        factory: Arc<EditorFactory>,
        config: EditorConfig,
        children: Vec<Node>,
    ) -> Result<Self, EditorError> {
        if !factory.is_frozen() {
            return Err(EditorError::FactoryNotFrozen);
        }
        let doc = Document::from_fragment(&children);
        let mut editor = Self {
            doc,
            selection: None,
            factory,
            config: config.with_defaults(),
            dirty: DirtyQueue::default(),
            normalize_depth: 0,
            operations: Vec::new(),
            refs: HashMap::new(),
            next_ref: 0,
            pending_marks: None,
            on_alert: None,
        };
        editor.normalize_all()?;
        Ok(editor)
    }

    pub fn factory(&self) -> &Arc<EditorFactory> {
        &self.factory
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Owned copy of the root's children.
    pub fn children(&self) -> Vec<Node> {
        self.doc.to_fragment()
    }

    pub fn set_on_alert(&mut self, on_alert: impl Fn(&str, &str) + Send + Sync + 'static) {
        self.on_alert = Some(Arc::new(on_alert));
    }

    pub fn alert(&self, title: &str, message: &str) {
        warn!(title, message, "editor alert");
        if let Some(on_alert) = &self.on_alert {
            on_alert(title, message);
        }
    }

    /// Applies one primitive op and returns its inverse.
    pub fn apply(&mut self, op: Op) -> Result<Op, EditorError> {
        trace!(?op, "apply");
        let logged = op.clone();
        let applied = self.doc.apply(op)?;
        self.operations.push(logged);
        self.shift_points(&applied.shift);
        for id in applied.dirty {
            self.dirty.mark(&self.doc, id);
        }
        if self.normalize_depth == 0 {
            self.normalize()?;
        }
        Ok(applied.inverse)
    }

    /// Ops applied since the last call, for an external history.
    pub fn take_operations(&mut self) -> Vec<Op> {
        std::mem::take(&mut self.operations)
    }

    pub fn operations(&self) -> &[Op] {
        &self.operations
    }

    /// Runs `f` as one batch. Nested batches normalize once, when the
    /// outermost one finishes.
    pub fn without_normalizing<T>(
        &mut self,
        f: impl FnOnce(&mut Editor) -> Result<T, EditorError>,
    ) -> Result<T, EditorError> {
        self.normalize_depth += 1;
        let result = f(self);
        self.normalize_depth -= 1;
        let value = result?;
        if self.normalize_depth == 0 {
            self.normalize()?;
        }
        Ok(value)
    }

    pub fn is_normalizing(&self) -> bool {
        self.normalize_depth > 0
    }

    /// Marks every node dirty and normalizes the whole tree.
    pub fn normalize_all(&mut self) -> Result<(), EditorError> {
        let root = self.doc.root();
        self.dirty.mark(&self.doc, root);
        for id in self.doc.descendants(root) {
            self.dirty.mark(&self.doc, id);
        }
        self.normalize()
    }

    /// Drains dirty nodes deepest first until no rule applies.
    pub fn normalize(&mut self) -> Result<(), EditorError> {
        if self.normalize_depth > 0 {
            return Ok(());
        }
        let budget = self.config.max_normalize_iterations * self.dirty.len().max(1);
        let mut steps = 0;
        self.normalize_depth += 1;
        let result = loop {
            let Some(id) = self.dirty.pop_deepest(&self.doc) else {
                break Ok(());
            };
            if steps >= budget {
                warn!(steps, "normalization exceeded its iteration budget");
                break Err(EditorError::NormalizeDidNotConverge { iterations: steps });
            }
            steps += 1;
            trace!(?id, "normalize node");
            if let Err(err) = crate::normalize::normalize_node(self, id) {
                break Err(err);
            }
        };
        self.normalize_depth -= 1;
        if result.is_err() {
            self.dirty.clear();
        }
        result
    }

    pub fn node(&self, id: NodeId) -> Option<NodeView<'_>> {
        self.doc.get(id)
    }

    pub fn node_at(&self, path: &[usize]) -> Option<NodeView<'_>> {
        self.doc.node_at(path)
    }

    pub fn entry(&self, id: NodeId) -> Option<NodeEntry> {
        Some(NodeEntry {
            id,
            path: self.doc.path_of(id)?,
        })
    }

    pub fn entry_at(&self, path: &[usize]) -> Option<NodeEntry> {
        Some(NodeEntry {
            id: self.doc.resolve(path)?,
            path: path.to_vec(),
        })
    }

    pub fn parent_entry(&self, entry: &NodeEntry) -> Option<NodeEntry> {
        self.entry(self.doc.parent_of(entry.id)?)
    }

    pub fn string(&self, id: NodeId) -> String {
        self.doc.string(id)
    }

    pub fn element_config(&self, id: NodeId) -> Option<Arc<ElementConfig>> {
        let ty = self.doc.get(id)?.element_type()?;
        self.factory.element(ty).cloned()
    }

    pub fn content_type_pair(&self, id: NodeId) -> ContentTypePair {
        match self.doc.get(id) {
            Some(node) => self.factory.content_type_pair(&node),
            None => ContentTypePair::UNKNOWN,
        }
    }

    pub fn content_type(&self, id: NodeId) -> Option<ContentType> {
        self.content_type_pair(id).content_type
    }

    pub fn content_model_type(&self, id: NodeId) -> Option<ContentType> {
        self.content_type_pair(id).content_model_type
    }

    pub fn is_inline(&self, node: &NodeView<'_>) -> bool {
        match node.data() {
            NodeData::Text { .. } => true,
            NodeData::Root => false,
            NodeData::Element { ty, .. } => self.factory.is_inline(ty),
        }
    }

    pub fn is_void(&self, node: &NodeView<'_>) -> bool {
        node.element_type()
            .is_some_and(|ty| self.factory.is_void(ty))
    }

    /// Nearest block element holding `id`, itself included.
    pub fn block_of(&self, id: NodeId) -> Option<NodeEntry> {
        std::iter::once(id)
            .chain(self.doc.ancestors(id))
            .find(|candidate| {
                self.doc
                    .get(*candidate)
                    .is_some_and(|node| node.is_element() && !self.is_inline(&node))
            })
            .and_then(|id| self.entry(id))
    }

    pub fn render_props(&self, id: NodeId) -> Option<RenderProps<'_>> {
        let node = self.doc.get(id)?;
        let editable = match node.element_type() {
            Some(ty) => self.factory.element(ty).is_none_or(|config| config.editable),
            None => true,
        };
        Some(RenderProps {
            node,
            path: node.path()?,
            children: node.child_ids(),
            editable,
        })
    }

    pub fn selection(&self) -> Option<Range> {
        let tracked = self.selection?;
        Some(Range::new(
            self.point_of(tracked.anchor)?,
            self.point_of(tracked.focus)?,
        ))
    }

    pub fn set_selection(&mut self, range: Option<Range>) {
        self.pending_marks = None;
        self.selection = range.and_then(|range| {
            Some(TrackedRange {
                anchor: self.anchor_of(&range.anchor)?,
                focus: self.anchor_of(&range.focus)?,
            })
        });
    }

    pub fn select(&mut self, point: Point) {
        self.set_selection(Some(Range::collapsed(point)));
    }

    pub(crate) fn select_anchor(&mut self, anchor: Anchor) {
        self.selection = Some(TrackedRange {
            anchor,
            focus: anchor,
        });
    }

    /// Collapsed cursor at the end of the node's last text.
    pub fn select_end_of(&mut self, id: NodeId) {
        let leaf = if self.doc.get(id).is_some_and(|n| n.is_text()) {
            Some(id)
        } else {
            self.doc.texts_in(id).last().copied()
        };
        if let Some(leaf) = leaf {
            let offset = self.doc.get(leaf).and_then(|n| n.text()).map_or(0, str::len);
            self.select_anchor(Anchor { node: leaf, offset });
        }
    }

    pub fn select_start_of(&mut self, id: NodeId) {
        let leaf = if self.doc.get(id).is_some_and(|n| n.is_text()) {
            Some(id)
        } else {
            self.doc.texts_in(id).first().copied()
        };
        if let Some(leaf) = leaf {
            self.select_anchor(Anchor { node: leaf, offset: 0 });
        }
    }

    pub fn deselect(&mut self) {
        self.selection = None;
    }

    pub fn pending_marks(&self) -> Option<Marks> {
        self.pending_marks
    }

    pub(crate) fn set_pending_marks(&mut self, marks: Option<Marks>) {
        self.pending_marks = marks;
    }

    pub fn path_ref(&self, path: &[usize]) -> Option<PathRef> {
        Some(PathRef {
            node: self.doc.resolve(path)?,
        })
    }

    pub fn point_ref(&mut self, point: &Point) -> Option<PointRef> {
        let anchor = self.anchor_of(point)?;
        let key = self.next_ref;
        self.next_ref += 1;
        self.refs.insert(key, Some(anchor));
        Some(PointRef { key })
    }

    pub fn range_ref(&mut self, range: &Range) -> Option<RangeRef> {
        let anchor = self.point_ref(&range.anchor)?;
        let Some(focus) = self.point_ref(&range.focus) else {
            self.refs.remove(&anchor.key);
            return None;
        };
        Some(RangeRef { anchor, focus })
    }

    /// Resolves a path point to an identity anchor, descending into the first
    /// text when the path names an element.
    pub(crate) fn anchor_of(&self, point: &Point) -> Option<Anchor> {
        let id = self.doc.resolve(&point.path)?;
        let node = self.doc.get(id)?;
        if let Some(text) = node.text() {
            let mut offset = point.offset.min(text.len());
            while offset > 0 && !text.is_char_boundary(offset) {
                offset -= 1;
            }
            return Some(Anchor { node: id, offset });
        }
        match self.doc.texts_in(id).first() {
            Some(leaf) => Some(Anchor {
                node: *leaf,
                offset: 0,
            }),
            None => Some(Anchor {
                node: id,
                offset: 0,
            }),
        }
    }

    pub(crate) fn point_of(&self, anchor: Anchor) -> Option<Point> {
        Some(Point::new(self.doc.path_of(anchor.node)?, anchor.offset))
    }

    fn shift_points(&mut self, shift: &PointShift) {
        if matches!(shift, PointShift::None) {
            return;
        }
        if let Some(tracked) = self.selection {
            let anchor = shift_anchor(tracked.anchor, shift, true);
            let focus = shift_anchor(tracked.focus, shift, true);
            self.selection = match (anchor, focus) {
                (Some(anchor), Some(focus)) => Some(TrackedRange { anchor, focus }),
                (Some(only), None) | (None, Some(only)) => Some(TrackedRange {
                    anchor: only,
                    focus: only,
                }),
                (None, None) => None,
            };
        }
        for slot in self.refs.values_mut() {
            if let Some(anchor) = *slot {
                *slot = shift_anchor(anchor, shift, false);
            }
        }
    }
}

/// Moves an anchor through one applied op. Anchors inside removed nodes
/// fall back to a neighbouring text when `fallback` is set and die otherwise.
fn shift_anchor(anchor: Anchor, shift: &PointShift, fallback: bool) -> Option<Anchor> {
    match shift {
        PointShift::None => Some(anchor),
        PointShift::InsertText { node, offset, len } => {
            if anchor.node == *node && anchor.offset >= *offset {
                Some(Anchor {
                    offset: anchor.offset + len,
                    ..anchor
                })
            } else {
                Some(anchor)
            }
        }
        PointShift::RemoveText { node, offset, len } => {
            if anchor.node == *node && anchor.offset > *offset {
                Some(Anchor {
                    offset: anchor.offset.saturating_sub(*len).max(*offset),
                    ..anchor
                })
            } else {
                Some(anchor)
            }
        }
        PointShift::Removed { ids, before, after } => {
            if !ids.contains(&anchor.node) {
                return Some(anchor);
            }
            if !fallback {
                return None;
            }
            before
                .or(*after)
                .map(|(node, offset)| Anchor { node, offset })
        }
        PointShift::SplitText {
            node,
            new_node,
            position,
        } => {
            if anchor.node == *node && anchor.offset >= *position {
                Some(Anchor {
                    node: *new_node,
                    offset: anchor.offset - position,
                })
            } else {
                Some(anchor)
            }
        }
        PointShift::MergeText { from, into, delta } => {
            if anchor.node == *from {
                Some(Anchor {
                    node: *into,
                    offset: anchor.offset + delta,
                })
            } else {
                Some(anchor)
            }
        }
    }
}
