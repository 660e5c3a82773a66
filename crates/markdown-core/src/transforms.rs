use std::collections::HashSet;

use crate::document::{NodeData, NodeId};
use crate::editor::{Anchor, Editor};
use crate::error::EditorError;
use crate::location::{Path, Point, Range, child_path, next_sibling};
use crate::node::{Attrs, Decorator, ElementNode, Marks, Node};
use crate::ops::{AttrPatch, Op};

fn split_last(at: &[usize]) -> Result<(usize, Path), EditorError> {
    match at.split_last() {
        Some((&index, parent)) => Ok((index, parent.to_vec())),
        None => Err(EditorError::invalid_path(at, "root cannot be targeted")),
    }
}

impl Editor {
    pub fn insert_nodes(&mut self, at: &[usize], nodes: Vec<Node>) -> Result<(), EditorError> {
        let (index, parent) = split_last(at)?;
        self.without_normalizing(|editor| {
            for (offset, node) in nodes.into_iter().enumerate() {
                editor.apply(Op::InsertNode {
                    path: child_path(&parent, index + offset),
                    node,
                })?;
            }
            Ok(())
        })
    }

    pub fn insert_node(&mut self, at: &[usize], node: Node) -> Result<(), EditorError> {
        self.insert_nodes(at, vec![node])
    }

    /// Removes a subtree and hands it back.
    pub fn remove_node(&mut self, at: &[usize]) -> Result<Node, EditorError> {
        let node = self
            .node_at(at)
            .and_then(|n| n.to_node())
            .ok_or_else(|| EditorError::invalid_path(at, "nothing to remove"))?;
        self.apply(Op::RemoveNode { path: at.to_vec() })?;
        Ok(node)
    }

    pub fn set_node(
        &mut self,
        at: &[usize],
        ty: Option<&str>,
        attrs: Attrs,
    ) -> Result<(), EditorError> {
        self.apply(Op::SetNode {
            path: at.to_vec(),
            ty: ty.map(str::to_string),
            patch: AttrPatch::set(attrs),
        })?;
        Ok(())
    }

    pub fn unset_attrs(&mut self, at: &[usize], keys: &[&str]) -> Result<(), EditorError> {
        self.apply(Op::SetNode {
            path: at.to_vec(),
            ty: None,
            patch: AttrPatch::remove(keys.iter().copied()),
        })?;
        Ok(())
    }

    /// Overwrites the type and drops every attribute not in `attrs`.
    pub fn replace_node_attrs(
        &mut self,
        at: &[usize],
        ty: &str,
        attrs: Attrs,
    ) -> Result<(), EditorError> {
        let current = self
            .node_at(at)
            .and_then(|n| n.attrs())
            .ok_or_else(|| EditorError::invalid_path(at, "only elements carry attributes"))?;
        let remove = current
            .keys()
            .filter(|key| !attrs.contains_key(*key))
            .cloned()
            .collect();
        self.apply(Op::SetNode {
            path: at.to_vec(),
            ty: Some(ty.to_string()),
            patch: AttrPatch { set: attrs, remove },
        })?;
        Ok(())
    }

    /// Wraps `count` siblings starting at `at` in a new element. The
    /// wrapper's own children are ignored.
    pub fn wrap_nodes(
        &mut self,
        at: &[usize],
        count: usize,
        wrapper: ElementNode,
    ) -> Result<NodeId, EditorError> {
        let (index, parent) = split_last(at)?;
        let shell = Node::Element(ElementNode {
            children: Vec::new(),
            ..wrapper
        });
        self.without_normalizing(|editor| {
            editor.apply(Op::InsertNode {
                path: at.to_vec(),
                node: shell,
            })?;
            for ix in 0..count {
                editor.apply(Op::MoveNode {
                    path: child_path(&parent, index + 1),
                    to: child_path(at, ix),
                })?;
            }
            editor
                .doc
                .resolve(at)
                .ok_or_else(|| EditorError::invalid_path(at, "wrapper vanished"))
        })
    }

    pub fn wrap_node(&mut self, at: &[usize], wrapper: ElementNode) -> Result<NodeId, EditorError> {
        self.wrap_nodes(at, 1, wrapper)
    }

    /// Lifts every child of the element at `at` into its parent and removes
    /// the emptied element.
    pub fn unwrap_node(&mut self, at: &[usize]) -> Result<(), EditorError> {
        let (index, parent) = split_last(at)?;
        let count = self
            .node_at(at)
            .ok_or_else(|| EditorError::invalid_path(at, "nothing to unwrap"))?
            .len();
        self.without_normalizing(|editor| {
            for ix in 0..count {
                editor.apply(Op::MoveNode {
                    path: child_path(at, 0),
                    to: child_path(&parent, index + 1 + ix),
                })?;
            }
            editor.apply(Op::RemoveNode { path: at.to_vec() })?;
            Ok(())
        })
    }

    pub fn move_node(&mut self, from: &[usize], to: &[usize]) -> Result<(), EditorError> {
        self.apply(Op::MoveNode {
            path: from.to_vec(),
            to: to.to_vec(),
        })?;
        Ok(())
    }

    /// Merges the node at `at` into its previous sibling.
    pub fn merge_nodes(&mut self, at: &[usize]) -> Result<(), EditorError> {
        self.apply(Op::MergeNode { path: at.to_vec() })?;
        Ok(())
    }

    /// Splits an element before child `position`, or a text at a byte offset.
    pub fn split_node(&mut self, at: &[usize], position: usize) -> Result<(), EditorError> {
        self.apply(Op::SplitNode {
            path: at.to_vec(),
            position,
            template: None,
        })?;
        Ok(())
    }

    /// Splits every node from the text at `point` up to and including the
    /// element at `block`. Returns the path of the new second half.
    pub fn split_block_at(&mut self, point: &Point, block: &[usize]) -> Result<Path, EditorError> {
        if !crate::location::is_ancestor(block, &point.path) {
            return Err(EditorError::invalid_path(&point.path, "point is outside the block"));
        }
        self.without_normalizing(|editor| {
            editor.split_node(&point.path, point.offset)?;
            let (mut position, mut current) = split_last(&point.path)?;
            position += 1;
            loop {
                editor.split_node(&current, position)?;
                if current.as_slice() == block {
                    break;
                }
                let (index, parent) = split_last(&current)?;
                position = index + 1;
                current = parent;
            }
            next_sibling(block).ok_or_else(|| EditorError::invalid_path(block, "root cannot split"))
        })
    }

    /// Inserts text at a point using the pending marks, if any.
    pub fn insert_text_at(&mut self, point: &Point, text: &str) -> Result<(), EditorError> {
        if text.is_empty() {
            return Ok(());
        }
        let anchor = self
            .anchor_of(point)
            .ok_or_else(|| EditorError::invalid_path(&point.path, "missing text"))?;
        let (len, marks) = match self.node(anchor.node).map(|n| n.data()) {
            Some(NodeData::Text { text, marks }) => (text.len(), *marks),
            _ => return Err(EditorError::invalid_path(&point.path, "expected text")),
        };
        let path = self
            .doc
            .path_of(anchor.node)
            .ok_or_else(|| EditorError::invalid_path(&point.path, "missing text"))?;

        match self.pending_marks() {
            Some(pending) if pending != marks => self.without_normalizing(|editor| {
                editor.set_pending_marks(None);
                if anchor.offset < len {
                    editor.split_node(&path, anchor.offset)?;
                }
                let styled = next_sibling(&path)
                    .ok_or_else(|| EditorError::invalid_path(&path, "root cannot hold text"))?;
                editor.apply(Op::InsertNode {
                    path: styled.clone(),
                    node: Node::styled(text, pending),
                })?;
                if let Some(node) = editor.doc.resolve(&styled) {
                    editor.select_anchor(Anchor {
                        node,
                        offset: text.len(),
                    });
                }
                Ok(())
            }),
            _ => {
                self.set_pending_marks(None);
                self.apply(Op::InsertText {
                    path,
                    offset: anchor.offset,
                    text: text.to_string(),
                })?;
                Ok(())
            }
        }
    }

    /// Deletes the content of a range, joining the blocks at its edges.
    pub fn delete_range(&mut self, range: &Range) -> Result<(), EditorError> {
        if range.is_collapsed() {
            return Ok(());
        }
        let (start, end) = range.edges();
        let (Some(start), Some(end)) = (self.anchor_of(start), self.anchor_of(end)) else {
            return Ok(());
        };

        self.without_normalizing(|editor| {
            if start.node == end.node {
                editor.remove_text(start.node, start.offset, end.offset)?;
                editor.select_anchor(start);
                return Ok(());
            }

            let start_len = editor.text_len(start.node);
            editor.remove_text(start.node, start.offset, start_len)?;
            editor.remove_text(end.node, 0, end.offset)?;

            let order = editor.doc.descendants(editor.doc.root());
            let from = order.iter().position(|id| *id == start.node);
            let to = order.iter().position(|id| *id == end.node);
            if let (Some(from), Some(to)) = (from, to) {
                let end_ancestors: HashSet<NodeId> =
                    editor.doc.ancestors(end.node).into_iter().collect();
                let between: Vec<NodeId> = order[from + 1..to]
                    .iter()
                    .copied()
                    .filter(|id| !end_ancestors.contains(id))
                    .collect();
                let inside: HashSet<NodeId> = between.iter().copied().collect();
                for id in between {
                    if editor.doc.ancestors(id).iter().any(|a| inside.contains(a)) {
                        continue;
                    }
                    if let Some(path) = editor.doc.path_of(id) {
                        editor.apply(Op::RemoveNode { path })?;
                    }
                }
            }

            let start_block = editor.block_of(start.node);
            let end_block = editor.block_of(end.node);
            if let (Some(start_block), Some(end_block)) = (start_block, end_block)
                && start_block.id != end_block.id
                && !editor.doc.is_ancestor(start_block.id, end_block.id)
                && !editor.doc.is_ancestor(end_block.id, start_block.id)
            {
                editor.join_blocks(start_block.id, end_block.id)?;
            }
            editor.select_anchor(start);
            Ok(())
        })
    }

    /// Moves every child of `from` to the end of `into`, then removes `from`.
    pub(crate) fn join_blocks(&mut self, into: NodeId, from: NodeId) -> Result<(), EditorError> {
        let children = self.doc.children_of(from).to_vec();
        for child in children {
            let (Some(path), Some(target)) = (self.doc.path_of(child), self.doc.path_of(into))
            else {
                continue;
            };
            let len = self.doc.children_of(into).len();
            self.apply(Op::MoveNode {
                path,
                to: child_path(&target, len),
            })?;
        }
        if let Some(path) = self.doc.path_of(from) {
            self.apply(Op::RemoveNode { path })?;
        }
        Ok(())
    }

    pub(crate) fn remove_text(
        &mut self,
        leaf: NodeId,
        start: usize,
        end: usize,
    ) -> Result<(), EditorError> {
        let Some(value) = self.node(leaf).and_then(|n| n.text()) else {
            return Ok(());
        };
        let end = end.min(value.len());
        if start >= end {
            return Ok(());
        }
        let removed = value.get(start..end).unwrap_or_default().to_string();
        let path = self
            .doc
            .path_of(leaf)
            .ok_or_else(|| EditorError::invalid_path(&[], "removed text"))?;
        self.apply(Op::RemoveText {
            path,
            offset: start,
            text: removed,
        })?;
        Ok(())
    }

    pub(crate) fn text_len(&self, leaf: NodeId) -> usize {
        self.node(leaf).and_then(|n| n.text()).map_or(0, str::len)
    }

    /// Text slices covered by a range, as (leaf, start, end) in reading order.
    pub fn texts_in_range(&self, range: &Range) -> Vec<(NodeId, usize, usize)> {
        let (start, end) = range.edges();
        let (Some(start), Some(end)) = (self.anchor_of(start), self.anchor_of(end)) else {
            return Vec::new();
        };
        let texts = self.doc.texts();
        let (Some(from), Some(to)) = (
            texts.iter().position(|id| *id == start.node),
            texts.iter().position(|id| *id == end.node),
        ) else {
            return Vec::new();
        };
        texts[from..=to]
            .iter()
            .map(|id| {
                let lo = if *id == start.node { start.offset } else { 0 };
                let hi = if *id == end.node {
                    end.offset
                } else {
                    self.text_len(*id)
                };
                (*id, lo, hi)
            })
            .collect()
    }

    /// Marks at the cursor, including marks pending for the next insertion.
    pub fn marks(&self) -> Option<Marks> {
        if let Some(pending) = self.pending_marks() {
            return Some(pending);
        }
        let range = self.selection()?;
        self.node_at(&range.anchor.path)?.marks().copied()
    }

    pub fn is_mark_active(&self, decorator: Decorator) -> bool {
        match self.selection() {
            Some(range) => self.is_mark_active_in(&range, decorator),
            None => false,
        }
    }

    /// Whether every non-empty slice of `range` carries the decorator. A
    /// collapsed range asks the cursor marks instead.
    pub fn is_mark_active_in(&self, range: &Range, decorator: Decorator) -> bool {
        if range.is_collapsed() {
            return self.marks().is_some_and(|marks| marks.has(decorator));
        }
        let slices: Vec<_> = self
            .texts_in_range(range)
            .into_iter()
            .filter(|(_, lo, hi)| lo < hi)
            .collect();
        !slices.is_empty()
            && slices.iter().all(|(id, _, _)| {
                self.node(*id)
                    .and_then(|n| n.marks())
                    .is_some_and(|marks| marks.has(decorator))
            })
    }

    pub fn add_mark(&mut self, decorator: Decorator) -> Result<(), EditorError> {
        self.set_mark(decorator, true)
    }

    pub fn remove_mark(&mut self, decorator: Decorator) -> Result<(), EditorError> {
        self.set_mark(decorator, false)
    }

    pub fn toggle_mark(&mut self, decorator: Decorator) -> Result<(), EditorError> {
        let active = self.is_mark_active(decorator);
        self.set_mark(decorator, !active)
    }

    fn set_mark(&mut self, decorator: Decorator, on: bool) -> Result<(), EditorError> {
        let Some(range) = self.selection() else {
            return Ok(());
        };
        if range.is_collapsed() {
            let mut marks = self.marks().unwrap_or_default();
            marks.set(decorator, on);
            self.set_pending_marks(Some(marks));
            return Ok(());
        }
        self.set_marks_in_range(&range, decorator, on)
    }

    /// Sets or clears a decorator on exactly the text covered by `range`,
    /// splitting the edge leaves as needed. The range is selected afterwards.
    pub fn set_marks_in_range(
        &mut self,
        range: &Range,
        decorator: Decorator,
        on: bool,
    ) -> Result<(), EditorError> {
        let (start, end) = range.edges();
        let (Some(start), Some(end)) = (self.anchor_of(start), self.anchor_of(end)) else {
            return Ok(());
        };
        if range.is_collapsed() {
            return Ok(());
        }

        self.without_normalizing(|editor| {
            let end_len = editor.text_len(end.node);
            if end.offset > 0 && end.offset < end_len {
                editor.split_leaf(end.node, end.offset)?;
            }
            let first = if start.offset == 0 {
                Some(start.node)
            } else if start.offset < editor.text_len(start.node) {
                editor.split_leaf(start.node, start.offset)?
            } else {
                editor.next_text(start.node)
            };
            let last = if start.node == end.node {
                first
            } else if end.offset == 0 {
                editor.previous_text(end.node)
            } else {
                Some(end.node)
            };
            let (Some(first), Some(last)) = (first, last) else {
                return Ok(());
            };

            let texts = editor.doc.texts();
            let (Some(from), Some(to)) = (
                texts.iter().position(|id| *id == first),
                texts.iter().position(|id| *id == last),
            ) else {
                return Ok(());
            };
            for id in texts.get(from..=to).unwrap_or_default() {
                let (Some(path), Some(current)) =
                    (editor.doc.path_of(*id), editor.node(*id).and_then(|n| n.marks()).copied())
                else {
                    continue;
                };
                let mut marks = current;
                marks.set(decorator, on);
                if marks != current {
                    editor.apply(Op::SetMarks { path, marks })?;
                }
            }
            let last_len = editor.text_len(last);
            editor.set_selection(Some(Range::new(
                Point::new(editor.doc.path_of(first).unwrap_or_default(), 0),
                Point::new(editor.doc.path_of(last).unwrap_or_default(), last_len),
            )));
            Ok(())
        })
    }

    /// Splits a text leaf and returns the id of the second half.
    fn split_leaf(&mut self, leaf: NodeId, offset: usize) -> Result<Option<NodeId>, EditorError> {
        let Some(path) = self.doc.path_of(leaf) else {
            return Ok(None);
        };
        self.split_node(&path, offset)?;
        Ok(next_sibling(&path).and_then(|next| self.doc.resolve(&next)))
    }

    pub(crate) fn next_text(&self, leaf: NodeId) -> Option<NodeId> {
        let texts = self.doc.texts();
        let ix = texts.iter().position(|id| *id == leaf)?;
        texts.get(ix + 1).copied()
    }

    pub(crate) fn previous_text(&self, leaf: NodeId) -> Option<NodeId> {
        let texts = self.doc.texts();
        let ix = texts.iter().position(|id| *id == leaf)?;
        texts.get(ix.checked_sub(1)?).copied()
    }
}
