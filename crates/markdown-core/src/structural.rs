use std::sync::Arc;

use crate::content::conforms_opt;
use crate::document::NodeId;
use crate::editor::{Editor, NodeEntry};
use crate::error::EditorError;
use crate::node::{Attrs, ElementNode};
use crate::registry::ElementConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleStrategy {
    /// Same content model: retype the node in place.
    Replace,
    /// The node becomes the only child of a new element.
    Wrap,
}

impl Editor {
    pub fn config_for(&self, ty: &str) -> Option<Arc<ElementConfig>> {
        self.factory().element(ty).cloned()
    }

    /// Nearest element of type `ty`, starting at the entry itself.
    pub fn nearest(&self, entry: &NodeEntry, ty: &str) -> Option<NodeEntry> {
        std::iter::once(entry.id)
            .chain(self.document().ancestors(entry.id))
            .find(|id| self.node(*id).is_some_and(|n| n.is_type(ty)))
            .and_then(|id| self.entry(id))
    }

    fn accepts(&self, parent: Option<NodeId>, config: &ElementConfig) -> bool {
        let Some(parent) = parent else {
            return false;
        };
        conforms_opt(Some(config.content_type), self.content_model_type(parent))
    }

    pub fn can_toggle(
        &self,
        entry: &NodeEntry,
        config: &ElementConfig,
        search_ancestors: bool,
    ) -> Option<(NodeEntry, ToggleStrategy)> {
        let doc = self.document();
        let mut candidates = vec![entry.id];
        if search_ancestors {
            candidates.extend(doc.ancestors(entry.id));
        }
        for id in candidates {
            if id == doc.root() {
                break;
            }
            let pair = self.content_type_pair(id);
            if pair.content_type != Some(config.content_type) {
                continue;
            }
            if !self.accepts(doc.parent_of(id), config) {
                continue;
            }
            if pair.content_model_type.is_some()
                && pair.content_model_type == config.content_model_type
            {
                return Some((self.entry(id)?, ToggleStrategy::Replace));
            }
            if conforms_opt(pair.content_type, config.content_model_type) {
                return Some((self.entry(id)?, ToggleStrategy::Wrap));
            }
        }
        None
    }

    /// Converts the entry (or an ancestor) to the configured type. Returns
    /// `false` when no node can take the type.
    pub fn toggle(
        &mut self,
        entry: &NodeEntry,
        config: &ElementConfig,
        params: Attrs,
    ) -> Result<bool, EditorError> {
        let Some((target, strategy)) = self.can_toggle(entry, config, true) else {
            return Ok(false);
        };
        self.without_normalizing(|editor| {
            match strategy {
                ToggleStrategy::Replace => {
                    editor.replace_node_attrs(&target.path, &config.ty, params)?;
                }
                ToggleStrategy::Wrap => {
                    editor.wrap_node(
                        &target.path,
                        ElementNode {
                            ty: config.ty.clone(),
                            attrs: params,
                            children: Vec::new(),
                        },
                    )?;
                }
            }
            Ok(true)
        })
    }

    /// Whether `configs`, outermost first, can be stacked around the entry.
    pub fn can_wrap(&self, entry: &NodeEntry, configs: &[&ElementConfig]) -> bool {
        let doc = self.document();
        let Some(parent) = doc.parent_of(entry.id) else {
            return false;
        };
        if configs.is_empty() {
            return false;
        }
        let mut expected = self.content_model_type(parent);
        for config in configs {
            if !conforms_opt(Some(config.content_type), expected) {
                return false;
            }
            expected = config.content_model_type;
        }
        conforms_opt(self.content_type(entry.id), expected)
    }

    /// Wraps the entry in `configs`, outermost first. The innermost wrapper is
    /// inserted first so every step targets the same path.
    pub fn wrap(
        &mut self,
        entry: &NodeEntry,
        configs: &[&ElementConfig],
        params: &[Attrs],
    ) -> Result<bool, EditorError> {
        if !self.can_wrap(entry, configs) {
            return Ok(false);
        }
        self.without_normalizing(|editor| {
            for (ix, config) in configs.iter().enumerate().rev() {
                editor.wrap_node(
                    &entry.path,
                    ElementNode {
                        ty: config.ty.clone(),
                        attrs: params.get(ix).cloned().unwrap_or_default(),
                        children: Vec::new(),
                    },
                )?;
            }
            Ok(true)
        })
    }

    /// Nodes of each level of the chain, if the entry matches it exactly.
    fn unwrap_levels(&self, entry: &NodeEntry, configs: &[&ElementConfig]) -> Option<Vec<Vec<NodeId>>> {
        if configs.is_empty() {
            return None;
        }
        let doc = self.document();
        let parent = doc.parent_of(entry.id)?;
        let mut levels = Vec::with_capacity(configs.len());
        let mut level = vec![entry.id];
        for config in configs {
            if level.is_empty() {
                return None;
            }
            let exact = level
                .iter()
                .all(|id| self.node(*id).is_some_and(|n| n.is_type(&config.ty)));
            if !exact {
                return None;
            }
            let next = level
                .iter()
                .flat_map(|id| doc.children_of(*id).iter().copied())
                .collect();
            levels.push(std::mem::replace(&mut level, next));
        }
        let model = self.content_model_type(parent);
        let fits = level
            .iter()
            .all(|id| conforms_opt(self.content_type(*id), model));
        fits.then_some(levels)
    }

    pub fn can_unwrap(&self, entry: &NodeEntry, configs: &[&ElementConfig]) -> bool {
        self.unwrap_levels(entry, configs).is_some()
    }

    /// Removes the chain of wrappers, deepest level first.
    pub fn unwrap(
        &mut self,
        entry: &NodeEntry,
        configs: &[&ElementConfig],
    ) -> Result<bool, EditorError> {
        let Some(levels) = self.unwrap_levels(entry, configs) else {
            return Ok(false);
        };
        self.without_normalizing(|editor| {
            for level in levels.iter().rev() {
                for id in level {
                    if let Some(path) = editor.document().path_of(*id) {
                        editor.unwrap_node(&path)?;
                    }
                }
            }
            Ok(true)
        })
    }

    /// `toggle` by type name; unknown types never toggle.
    pub fn toggle_to(
        &mut self,
        entry: &NodeEntry,
        ty: &str,
        params: Attrs,
    ) -> Result<bool, EditorError> {
        match self.config_for(ty) {
            Some(config) => self.toggle(entry, &config, params),
            None => Ok(false),
        }
    }
}
