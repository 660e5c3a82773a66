use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::document::{Document, NodeData, NodeId};
use crate::error::EditorError;
use crate::location::{Path, next_sibling, previous_sibling};
use crate::node::{Attrs, ElementNode, Marks, Node, TextNode};

/// Primitive document mutation. Applying one yields its inverse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    InsertNode {
        #[serde(default)]
        path: Path,
        node: Node,
    },
    RemoveNode {
        #[serde(default)]
        path: Path,
    },
    /// `to` is read against the tree with the node already taken out.
    MoveNode {
        #[serde(default)]
        path: Path,
        to: Path,
    },
    SetNode {
        #[serde(default)]
        path: Path,
        #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
        ty: Option<String>,
        #[serde(default)]
        patch: AttrPatch,
    },
    InsertText {
        #[serde(default)]
        path: Path,
        offset: usize,
        text: String,
    },
    RemoveText {
        #[serde(default)]
        path: Path,
        offset: usize,
        text: String,
    },
    SetMarks {
        #[serde(default)]
        path: Path,
        marks: Marks,
    },
    /// Splits a text at a byte offset or an element at a child index.
    SplitNode {
        #[serde(default)]
        path: Path,
        position: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        template: Option<Node>,
    },
    /// Merges the node at `path` into its previous sibling.
    MergeNode {
        #[serde(default)]
        path: Path,
    },
}

impl Op {
    pub fn path(&self) -> &[usize] {
        match self {
            Op::InsertNode { path, .. }
            | Op::RemoveNode { path }
            | Op::MoveNode { path, .. }
            | Op::SetNode { path, .. }
            | Op::InsertText { path, .. }
            | Op::RemoveText { path, .. }
            | Op::SetMarks { path, .. }
            | Op::SplitNode { path, .. }
            | Op::MergeNode { path } => path,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrPatch {
    #[serde(default)]
    pub set: Attrs,
    #[serde(default)]
    pub remove: Vec<String>,
}

impl AttrPatch {
    pub fn set(attrs: Attrs) -> Self {
        Self {
            set: attrs,
            remove: Vec::new(),
        }
    }

    pub fn remove<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            set: Attrs::new(),
            remove: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }
}

fn patch_apply(attrs: &mut Attrs, patch: &AttrPatch) -> AttrPatch {
    let mut old_set: Attrs = Attrs::new();
    let mut old_remove: Vec<String> = Vec::new();

    for (k, v) in &patch.set {
        if let Some(prev) = attrs.insert(k.clone(), v.clone()) {
            old_set.insert(k.clone(), prev);
        } else {
            old_remove.push(k.clone());
        }
    }

    for key in &patch.remove {
        if let Some(prev) = attrs.remove(key) {
            old_set.insert(key.clone(), prev);
        }
    }

    AttrPatch {
        set: old_set,
        remove: old_remove,
    }
}

/// How tracked points must follow an applied op.
#[derive(Debug, Clone)]
pub(crate) enum PointShift {
    None,
    InsertText {
        node: NodeId,
        offset: usize,
        len: usize,
    },
    RemoveText {
        node: NodeId,
        offset: usize,
        len: usize,
    },
    Removed {
        ids: HashSet<NodeId>,
        before: Option<(NodeId, usize)>,
        after: Option<(NodeId, usize)>,
    },
    SplitText {
        node: NodeId,
        new_node: NodeId,
        position: usize,
    },
    MergeText {
        from: NodeId,
        into: NodeId,
        delta: usize,
    },
}

#[derive(Debug)]
pub(crate) struct Applied {
    pub inverse: Op,
    pub dirty: Vec<NodeId>,
    pub shift: PointShift,
}

fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

fn with_ancestors(doc: &Document, id: NodeId) -> Vec<NodeId> {
    let mut out = vec![id];
    out.extend(doc.ancestors(id));
    out
}

fn split_parent(path: &[usize]) -> Result<(&[usize], usize), EditorError> {
    match path.split_last() {
        Some((&index, parent)) => Ok((parent, index)),
        None => Err(EditorError::invalid_path(path, "root cannot be targeted")),
    }
}

fn shell_of(data: &NodeData) -> Option<Node> {
    match data {
        NodeData::Root => None,
        NodeData::Element { ty, attrs } => Some(Node::Element(ElementNode {
            ty: ty.clone(),
            attrs: attrs.clone(),
            children: Vec::new(),
        })),
        NodeData::Text { marks, .. } => Some(Node::Text(TextNode {
            text: String::new(),
            marks: *marks,
        })),
    }
}

impl Document {
    pub(crate) fn apply(&mut self, op: Op) -> Result<Applied, EditorError> {
        match op {
            Op::InsertNode { path, node } => {
                let (parent_path, index) = split_parent(&path)?;
                let parent = self
                    .resolve(parent_path)
                    .ok_or_else(|| EditorError::invalid_path(&path, "missing parent"))?;
                if matches!(self.get(parent).map(|p| p.data()), Some(NodeData::Text { .. })) {
                    return Err(EditorError::invalid_path(&path, "text cannot hold children"));
                }
                if index > self.children_of(parent).len() {
                    return Err(EditorError::invalid_path(&path, "insert index out of bounds"));
                }
                let id = self.insert(parent, index, &node);
                let mut dirty = with_ancestors(self, parent);
                dirty.push(id);
                dirty.extend(self.descendants(id));
                dirty.extend(self.children_of(parent).get(index + 1).copied());
                Ok(Applied {
                    inverse: Op::RemoveNode { path },
                    dirty,
                    shift: PointShift::None,
                })
            }
            Op::RemoveNode { path } => {
                let (_, index) = split_parent(&path)?;
                let id = self
                    .resolve(&path)
                    .ok_or_else(|| EditorError::invalid_path(&path, "nothing to remove"))?;
                let parent = self
                    .parent_of(id)
                    .ok_or_else(|| EditorError::invalid_path(&path, "detached node"))?;
                let before = self.text_before(id);
                let after = self.text_after(id);
                let (node, freed) = self
                    .remove(id)
                    .ok_or_else(|| EditorError::invalid_path(&path, "nothing to remove"))?;
                // The sibling that slid into the gap now neighbours a new node.
                let mut dirty = with_ancestors(self, parent);
                dirty.extend(self.children_of(parent).get(index).copied());
                Ok(Applied {
                    inverse: Op::InsertNode { path, node },
                    dirty,
                    shift: PointShift::Removed {
                        ids: freed.into_iter().collect(),
                        before,
                        after,
                    },
                })
            }
            Op::MoveNode { path, to } => {
                split_parent(&path)?;
                let (to_parent_path, to_index) = split_parent(&to)?;
                let id = self
                    .resolve(&path)
                    .ok_or_else(|| EditorError::invalid_path(&path, "nothing to move"))?;
                let (old_parent, old_index) = self
                    .detach(id)
                    .ok_or_else(|| EditorError::invalid_path(&path, "detached node"))?;
                let Some(new_parent) = self.resolve(to_parent_path) else {
                    self.attach(id, old_parent, old_index);
                    return Err(EditorError::invalid_path(&to, "missing move target"));
                };
                if to_index > self.children_of(new_parent).len() {
                    self.attach(id, old_parent, old_index);
                    return Err(EditorError::invalid_path(&to, "move index out of bounds"));
                }
                self.attach(id, new_parent, to_index);
                let mut dirty = with_ancestors(self, old_parent);
                dirty.extend(self.children_of(old_parent).get(old_index).copied());
                dirty.extend(with_ancestors(self, new_parent));
                dirty.push(id);
                Ok(Applied {
                    inverse: Op::MoveNode { path: to, to: path },
                    dirty,
                    shift: PointShift::None,
                })
            }
            Op::SetNode { path, ty, patch } => {
                let id = self
                    .resolve(&path)
                    .ok_or_else(|| EditorError::invalid_path(&path, "nothing to set"))?;
                let Some(NodeData::Element {
                    ty: current_ty,
                    attrs,
                }) = self.data_mut(id)
                else {
                    return Err(EditorError::invalid_path(&path, "only elements carry attributes"));
                };
                let old_ty = ty.map(|ty| std::mem::replace(current_ty, ty));
                let old_patch = patch_apply(attrs, &patch);
                Ok(Applied {
                    inverse: Op::SetNode {
                        path,
                        ty: old_ty,
                        patch: old_patch,
                    },
                    dirty: with_ancestors(self, id),
                    shift: PointShift::None,
                })
            }
            Op::InsertText { path, offset, text } => {
                let id = self
                    .resolve(&path)
                    .ok_or_else(|| EditorError::invalid_path(&path, "missing text"))?;
                let Some(NodeData::Text { text: value, .. }) = self.data_mut(id) else {
                    return Err(EditorError::invalid_path(&path, "expected text"));
                };
                let offset = clamp_to_char_boundary(value, offset);
                value.insert_str(offset, &text);
                let len = text.len();
                Ok(Applied {
                    inverse: Op::RemoveText { path, offset, text },
                    dirty: with_ancestors(self, id),
                    shift: PointShift::InsertText {
                        node: id,
                        offset,
                        len,
                    },
                })
            }
            Op::RemoveText { path, offset, text } => {
                let id = self
                    .resolve(&path)
                    .ok_or_else(|| EditorError::invalid_path(&path, "missing text"))?;
                let Some(NodeData::Text { text: value, .. }) = self.data_mut(id) else {
                    return Err(EditorError::invalid_path(&path, "expected text"));
                };
                let start = clamp_to_char_boundary(value, offset);
                let end = clamp_to_char_boundary(value, start + text.len());
                let removed = value[start..end].to_string();
                value.replace_range(start..end, "");
                let len = removed.len();
                Ok(Applied {
                    inverse: Op::InsertText {
                        path,
                        offset: start,
                        text: removed,
                    },
                    dirty: with_ancestors(self, id),
                    shift: PointShift::RemoveText {
                        node: id,
                        offset: start,
                        len,
                    },
                })
            }
            Op::SetMarks { path, marks } => {
                let id = self
                    .resolve(&path)
                    .ok_or_else(|| EditorError::invalid_path(&path, "missing text"))?;
                let Some(NodeData::Text { marks: current, .. }) = self.data_mut(id) else {
                    return Err(EditorError::invalid_path(&path, "expected text"));
                };
                let old = std::mem::replace(current, marks);
                Ok(Applied {
                    inverse: Op::SetMarks { path, marks: old },
                    dirty: with_ancestors(self, id),
                    shift: PointShift::None,
                })
            }
            Op::SplitNode {
                path,
                position,
                template,
            } => self.apply_split(path, position, template),
            Op::MergeNode { path } => self.apply_merge(path),
        }
    }

    fn apply_split(
        &mut self,
        path: Path,
        position: usize,
        template: Option<Node>,
    ) -> Result<Applied, EditorError> {
        let (_, index) = split_parent(&path)?;
        let id = self
            .resolve(&path)
            .ok_or_else(|| EditorError::invalid_path(&path, "nothing to split"))?;
        let parent = self
            .parent_of(id)
            .ok_or_else(|| EditorError::invalid_path(&path, "detached node"))?;
        let data = self
            .get(id)
            .map(|n| n.data().clone())
            .ok_or_else(|| EditorError::invalid_path(&path, "nothing to split"))?;
        let shell = template
            .as_ref()
            .and_then(|t| match t {
                Node::Element(el) => Some(NodeData::Element {
                    ty: el.ty.clone(),
                    attrs: el.attrs.clone(),
                }),
                Node::Text(t) => Some(NodeData::Text {
                    text: String::new(),
                    marks: t.marks,
                }),
            });

        let (new_id, shift) = match data {
            NodeData::Root => return Err(EditorError::invalid_path(&path, "root cannot split")),
            NodeData::Text { text, marks } => {
                let position = clamp_to_char_boundary(&text, position);
                let tail = text[position..].to_string();
                if let Some(NodeData::Text { text, .. }) = self.data_mut(id) {
                    text.truncate(position);
                }
                let marks = match shell {
                    Some(NodeData::Text { marks, .. }) => marks,
                    _ => marks,
                };
                let new_id = self.alloc(None, NodeData::Text { text: tail, marks });
                (
                    new_id,
                    PointShift::SplitText {
                        node: id,
                        new_node: new_id,
                        position,
                    },
                )
            }
            NodeData::Element { ty, attrs } => {
                let data = match shell {
                    Some(data @ NodeData::Element { .. }) => data,
                    _ => NodeData::Element { ty, attrs },
                };
                let new_id = self.alloc(None, data);
                let moved: Vec<NodeId> = self
                    .children_of(id)
                    .iter()
                    .skip(position)
                    .copied()
                    .collect();
                for (ix, child) in moved.into_iter().enumerate() {
                    self.detach(child);
                    self.attach(child, new_id, ix);
                }
                (new_id, PointShift::None)
            }
        };
        self.attach(new_id, parent, index + 1);

        let mut dirty = with_ancestors(self, parent);
        dirty.push(id);
        dirty.push(new_id);
        let next = next_sibling(&path).unwrap_or_default();
        Ok(Applied {
            inverse: Op::MergeNode { path: next },
            dirty,
            shift,
        })
    }

    fn apply_merge(&mut self, path: Path) -> Result<Applied, EditorError> {
        let prev_path = previous_sibling(&path)
            .ok_or_else(|| EditorError::invalid_path(&path, "no previous sibling to merge into"))?;
        let id = self
            .resolve(&path)
            .ok_or_else(|| EditorError::invalid_path(&path, "nothing to merge"))?;
        let prev = self
            .resolve(&prev_path)
            .ok_or_else(|| EditorError::invalid_path(&path, "no previous sibling to merge into"))?;
        let parent = self
            .parent_of(id)
            .ok_or_else(|| EditorError::invalid_path(&path, "detached node"))?;

        let data = self
            .get(id)
            .map(|n| n.data().clone())
            .ok_or_else(|| EditorError::invalid_path(&path, "nothing to merge"))?;
        let template = shell_of(&data);

        let prev_data = self.get(prev).map(|n| n.data().clone());
        let (position, shift) = match (data, prev_data) {
            (NodeData::Text { text, .. }, Some(NodeData::Text { text: prev_text, .. })) => {
                let delta = prev_text.len();
                if let Some(NodeData::Text { text: value, .. }) = self.data_mut(prev) {
                    value.push_str(&text);
                }
                (
                    delta,
                    PointShift::MergeText {
                        from: id,
                        into: prev,
                        delta,
                    },
                )
            }
            (NodeData::Element { .. }, Some(NodeData::Element { .. })) => {
                let position = self.children_of(prev).len();
                let moved: Vec<NodeId> = self.children_of(id).to_vec();
                for (ix, child) in moved.into_iter().enumerate() {
                    self.detach(child);
                    self.attach(child, prev, position + ix);
                }
                (position, PointShift::None)
            }
            _ => {
                return Err(EditorError::invalid_path(
                    &path,
                    "only like nodes can be merged",
                ));
            }
        };
        self.remove(id);

        let mut dirty = with_ancestors(self, parent);
        dirty.push(prev);
        Ok(Applied {
            inverse: Op::SplitNode {
                path: prev_path,
                position,
                template,
            },
            dirty,
            shift,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_ops_restore_the_fragment() {
        let original = vec![Node::paragraph("hello"), Node::paragraph("world")];
        let mut doc = Document::from_fragment(&original);

        let ops = vec![
            Op::SplitNode {
                path: vec![0, 0],
                position: 2,
                template: None,
            },
            Op::MergeNode { path: vec![1] },
            Op::MoveNode {
                path: vec![0, 2],
                to: vec![0, 0],
            },
            Op::SetNode {
                path: vec![0],
                ty: Some("heading".into()),
                patch: AttrPatch::set(Attrs::from([("depth".into(), 2.into())])),
            },
        ];

        let mut inverses = Vec::new();
        for op in ops {
            inverses.push(doc.apply(op).expect("op applies").inverse);
        }
        for inverse in inverses.into_iter().rev() {
            doc.apply(inverse).expect("inverse applies");
        }
        assert_eq!(doc.to_fragment(), original);
    }
}
