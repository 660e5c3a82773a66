use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::location::Path;
use crate::node::{Attrs, ElementNode, Marks, Node, TextNode};

/// Stable identity of a node. Ids are never reused within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Root,
    Element { ty: String, attrs: Attrs },
    Text { text: String, marks: Marks },
}

#[derive(Debug, Clone)]
struct Slot {
    parent: Option<NodeId>,
    data: NodeData,
    children: Vec<NodeId>,
}

/// Arena-backed document tree. Paths are derived from parent links on demand.
#[derive(Debug, Clone)]
pub struct Document {
    slots: HashMap<NodeId, Slot>,
    root: NodeId,
    next_id: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut slots = HashMap::new();
        slots.insert(
            root,
            Slot {
                parent: None,
                data: NodeData::Root,
                children: Vec::new(),
            },
        );
        Self {
            slots,
            root,
            next_id: 1,
        }
    }

    pub fn from_fragment(nodes: &[Node]) -> Self {
        let mut doc = Self::new();
        let root = doc.root;
        for (ix, node) in nodes.iter().enumerate() {
            doc.insert(root, ix, node);
        }
        doc
    }

    pub fn to_fragment(&self) -> Vec<Node> {
        self.root_view().children().filter_map(|n| n.to_node()).collect()
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_view(&self) -> NodeView<'_> {
        NodeView {
            doc: self,
            id: self.root,
            slot: &self.slots[&self.root],
        }
    }

    pub fn get(&self, id: NodeId) -> Option<NodeView<'_>> {
        let slot = self.slots.get(&id)?;
        Some(NodeView {
            doc: self,
            id,
            slot,
        })
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.slots.get(&id)?.parent
    }

    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.slots
            .get(&id)
            .map(|slot| slot.children.as_slice())
            .unwrap_or_default()
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent_of(id)?;
        self.children_of(parent).iter().position(|c| *c == id)
    }

    /// Current path of a node, or `None` once it has been removed.
    pub fn path_of(&self, id: NodeId) -> Option<Path> {
        let mut path = Vec::new();
        let mut current = id;
        while let Some(parent) = self.slots.get(&current)?.parent {
            let ix = self.children_of(parent).iter().position(|c| *c == current)?;
            path.push(ix);
            current = parent;
        }
        if current != self.root {
            return None;
        }
        path.reverse();
        Some(path)
    }

    pub fn resolve(&self, path: &[usize]) -> Option<NodeId> {
        let mut current = self.root;
        for &ix in path {
            current = *self.children_of(current).get(ix)?;
        }
        Some(current)
    }

    pub fn node_at(&self, path: &[usize]) -> Option<NodeView<'_>> {
        self.get(self.resolve(path)?)
    }

    pub fn depth_of(&self, id: NodeId) -> Option<usize> {
        let mut depth = 0;
        let mut current = self.slots.get(&id)?;
        while let Some(parent) = current.parent {
            depth += 1;
            current = self.slots.get(&parent)?;
        }
        Some(depth)
    }

    /// Ancestors of `id`, nearest first, ending at the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent_of(id);
        while let Some(parent) = current {
            out.push(parent);
            current = self.parent_of(parent);
        }
        out
    }

    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    /// Descendants of `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        fn walk(doc: &Document, id: NodeId, out: &mut Vec<NodeId>) {
            for &child in doc.children_of(id) {
                out.push(child);
                walk(doc, child, out);
            }
        }

        let mut out = Vec::new();
        walk(self, id, &mut out);
        out
    }

    /// Every text leaf of the document in reading order.
    pub fn texts(&self) -> Vec<NodeId> {
        self.texts_in(self.root)
    }

    pub fn texts_in(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|id| matches!(self.get(*id).map(|n| n.data()), Some(NodeData::Text { .. })))
            .collect()
    }

    pub fn string(&self, id: NodeId) -> String {
        self.get(id).map(|n| n.string()).unwrap_or_default()
    }

    pub(crate) fn alloc(&mut self, parent: Option<NodeId>, data: NodeData) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.slots.insert(
            id,
            Slot {
                parent,
                data,
                children: Vec::new(),
            },
        );
        id
    }

    /// Materializes an owned fragment below `parent` at `index`.
    pub(crate) fn insert(&mut self, parent: NodeId, index: usize, node: &Node) -> NodeId {
        let id = match node {
            Node::Text(t) => self.alloc(
                Some(parent),
                NodeData::Text {
                    text: t.text.clone(),
                    marks: t.marks,
                },
            ),
            Node::Element(el) => {
                let id = self.alloc(
                    Some(parent),
                    NodeData::Element {
                        ty: el.ty.clone(),
                        attrs: el.attrs.clone(),
                    },
                );
                for (ix, child) in el.children.iter().enumerate() {
                    self.insert(id, ix, child);
                }
                id
            }
        };
        if let Some(slot) = self.slots.get_mut(&parent) {
            let index = index.min(slot.children.len());
            slot.children.insert(index, id);
        }
        id
    }

    /// Removes a subtree, returning it as a fragment together with the freed ids.
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<(Node, Vec<NodeId>)> {
        let node = self.get(id)?.to_node()?;
        self.detach(id)?;
        let mut freed = vec![id];
        freed.extend(self.descendants(id));
        for freed_id in &freed {
            self.slots.remove(freed_id);
        }
        Some((node, freed))
    }

    pub(crate) fn detach(&mut self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent_of(id)?;
        let siblings = &mut self.slots.get_mut(&parent)?.children;
        let index = siblings.iter().position(|c| *c == id)?;
        siblings.remove(index);
        self.slots.get_mut(&id)?.parent = None;
        Some((parent, index))
    }

    pub(crate) fn attach(&mut self, id: NodeId, parent: NodeId, index: usize) {
        if let Some(slot) = self.slots.get_mut(&parent) {
            let index = index.min(slot.children.len());
            slot.children.insert(index, id);
        }
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.parent = Some(parent);
        }
    }

    pub(crate) fn data_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.slots.get_mut(&id).map(|slot| &mut slot.data)
    }

    /// Nearest text leaf strictly before the subtree of `id`, as (leaf, end offset).
    pub(crate) fn text_before(&self, id: NodeId) -> Option<(NodeId, usize)> {
        let order = self.descendants(self.root);
        let start = order.iter().position(|n| *n == id)?;
        order[..start].iter().rev().find_map(|n| match self.get(*n)?.data() {
            NodeData::Text { text, .. } => Some((*n, text.len())),
            _ => None,
        })
    }

    /// Nearest text leaf strictly after the subtree of `id`, as (leaf, 0).
    pub(crate) fn text_after(&self, id: NodeId) -> Option<(NodeId, usize)> {
        let order = self.descendants(self.root);
        let start = order.iter().position(|n| *n == id)?;
        let skip = self.descendants(id).len();
        order[start + 1 + skip..].iter().find_map(|n| match self.get(*n)?.data() {
            NodeData::Text { .. } => Some((*n, 0)),
            _ => None,
        })
    }
}

/// Borrowed view of one arena slot.
#[derive(Clone, Copy)]
pub struct NodeView<'a> {
    doc: &'a Document,
    id: NodeId,
    slot: &'a Slot,
}

impl std::fmt::Debug for NodeView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeView")
            .field("id", &self.id)
            .field("data", &self.slot.data)
            .finish()
    }
}

impl<'a> NodeView<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn data(&self) -> &'a NodeData {
        &self.slot.data
    }

    pub fn is_root(&self) -> bool {
        matches!(self.slot.data, NodeData::Root)
    }

    pub fn is_text(&self) -> bool {
        matches!(self.slot.data, NodeData::Text { .. })
    }

    pub fn is_element(&self) -> bool {
        matches!(self.slot.data, NodeData::Element { .. })
    }

    pub fn element_type(&self) -> Option<&'a str> {
        match &self.slot.data {
            NodeData::Element { ty, .. } => Some(ty.as_str()),
            _ => None,
        }
    }

    pub fn is_type(&self, ty: &str) -> bool {
        self.element_type() == Some(ty)
    }

    pub fn attrs(&self) -> Option<&'a Attrs> {
        match &self.slot.data {
            NodeData::Element { attrs, .. } => Some(attrs),
            _ => None,
        }
    }

    pub fn attr(&self, key: &str) -> Option<&'a Value> {
        self.attrs()?.get(key)
    }

    pub fn text(&self) -> Option<&'a str> {
        match &self.slot.data {
            NodeData::Text { text, .. } => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn marks(&self) -> Option<&'a Marks> {
        match &self.slot.data {
            NodeData::Text { marks, .. } => Some(marks),
            _ => None,
        }
    }

    pub fn child_ids(&self) -> &'a [NodeId] {
        &self.slot.children
    }

    pub fn len(&self) -> usize {
        self.slot.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.children.is_empty()
    }

    pub fn child(&self, index: usize) -> Option<NodeView<'a>> {
        self.doc.get(*self.slot.children.get(index)?)
    }

    pub fn children(&self) -> impl Iterator<Item = NodeView<'a>> + 'a {
        let doc = self.doc;
        self.slot.children.iter().filter_map(move |id| doc.get(*id))
    }

    pub fn parent(&self) -> Option<NodeView<'a>> {
        self.doc.get(self.slot.parent?)
    }

    pub fn path(&self) -> Option<Path> {
        self.doc.path_of(self.id)
    }

    pub fn string(&self) -> String {
        match &self.slot.data {
            NodeData::Text { text, .. } => text.clone(),
            _ => self.children().map(|c| c.string()).collect(),
        }
    }

    /// Owned copy of this subtree. The root has no fragment form.
    pub fn to_node(&self) -> Option<Node> {
        match &self.slot.data {
            NodeData::Root => None,
            NodeData::Text { text, marks } => Some(Node::Text(TextNode {
                text: text.clone(),
                marks: *marks,
            })),
            NodeData::Element { ty, attrs } => Some(Node::Element(ElementNode {
                ty: ty.clone(),
                attrs: attrs.clone(),
                children: self.children().filter_map(|c| c.to_node()).collect(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_structure_and_removed_ids_stop_resolving() {
        let mut doc = Document::from_fragment(&[
            Node::paragraph("a"),
            Node::blockquote(vec![Node::paragraph("b")]),
        ]);
        let quote = doc.resolve(&[1]).expect("quote");
        let inner = doc.resolve(&[1, 0, 0]).expect("inner text");
        assert_eq!(doc.path_of(inner), Some(vec![1, 0, 0]));

        let first = doc.resolve(&[0]).expect("first");
        doc.remove(first);
        assert_eq!(doc.path_of(inner), Some(vec![0, 0, 0]));
        assert_eq!(doc.path_of(first), None);

        doc.remove(quote);
        assert_eq!(doc.path_of(inner), None);
        assert!(doc.to_fragment().is_empty());
    }
}
