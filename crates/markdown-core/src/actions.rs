use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::content::ContentType;
use crate::editor::{Editor, NodeEntry};
use crate::error::EditorError;
use crate::location::{Location, Path, Point, Range};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Acts on the selected range.
    Selection,
    /// Acts on the block that holds phrasing content.
    Phrasing,
    /// Acts on a direct child of the root.
    TopLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionLocation {
    Selection { range: Range },
    Phrasing { path: Path },
    TopLevel { index: usize },
}

impl ActionLocation {
    pub fn path(&self) -> Path {
        match self {
            ActionLocation::Selection { range } => range.start().path.clone(),
            ActionLocation::Phrasing { path } => path.clone(),
            ActionLocation::TopLevel { index } => vec![*index],
        }
    }

    pub fn range(&self) -> Option<&Range> {
        match self {
            ActionLocation::Selection { range } => Some(range),
            _ => None,
        }
    }

    pub fn entry(&self, editor: &Editor) -> Option<NodeEntry> {
        editor.entry_at(&self.path())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionState {
    pub active: bool,
    pub disabled: bool,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl ActionState {
    pub fn new(active: bool, disabled: bool) -> Self {
        Self {
            active,
            disabled,
            params: Map::new(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, true)
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    pub fn param_u64(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(Value::as_u64)
    }

    pub fn param_bool(&self, key: &str) -> Option<bool> {
        self.params.get(key).and_then(Value::as_bool)
    }
}

pub type ComputeStateFn = Arc<dyn Fn(&Editor, &ActionLocation) -> ActionState + Send + Sync>;
pub type ActionFn = Arc<
    dyn Fn(&mut Editor, &ActionLocation, &ActionState) -> Result<bool, EditorError> + Send + Sync,
>;

/// A named, typed editor command with toolbar state.
#[derive(Clone)]
pub struct Action {
    pub key: String,
    pub ty: ActionType,
    pub hotkeys: Vec<String>,
    pub default_params: Map<String, Value>,
    compute_state: Option<ComputeStateFn>,
    run: ActionFn,
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("key", &self.key)
            .field("ty", &self.ty)
            .field("hotkeys", &self.hotkeys)
            .finish_non_exhaustive()
    }
}

impl Action {
    pub fn new(
        key: impl Into<String>,
        ty: ActionType,
        run: impl Fn(&mut Editor, &ActionLocation, &ActionState) -> Result<bool, EditorError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            ty,
            hotkeys: Vec::new(),
            default_params: Map::new(),
            compute_state: None,
            run: Arc::new(run),
        }
    }

    pub fn hotkey(mut self, hotkey: impl Into<String>) -> Self {
        self.hotkeys.push(hotkey.into());
        self
    }

    pub fn default_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.default_params.insert(key.to_string(), value.into());
        self
    }

    pub fn compute_state(
        mut self,
        compute: impl Fn(&Editor, &ActionLocation) -> ActionState + Send + Sync + 'static,
    ) -> Self {
        self.compute_state = Some(Arc::new(compute));
        self
    }

    /// Current state, with default params filled in under computed ones.
    pub fn state(&self, editor: &Editor, location: &ActionLocation) -> ActionState {
        let mut state = match &self.compute_state {
            Some(compute) => compute(editor, location),
            None => ActionState::new(false, false),
        };
        for (key, value) in &self.default_params {
            state
                .params
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        state
    }
}

/// An action paired with its state, for toolbars.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionInstance {
    pub key: String,
    #[serde(rename = "type")]
    pub ty: ActionType,
    pub state: ActionState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyEvent {
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }
}

/// Matches hotkeys such as `mod+b` or `ctrl+shift+enter`, where `mod` is
/// either ctrl or meta.
pub fn hotkey_matches(hotkey: &str, event: &KeyEvent) -> bool {
    let parts: Vec<String> = hotkey.split('+').map(|p| p.trim().to_lowercase()).collect();
    let Some((key, modifiers)) = parts.split_last() else {
        return false;
    };
    if !key.eq_ignore_ascii_case(&event.key) {
        return false;
    }
    let has = |name: &str| modifiers.iter().any(|m| m == name);
    let wants_mod = has("mod");
    let ctrl_ok = if wants_mod {
        event.ctrl || event.meta
    } else {
        event.ctrl == has("ctrl")
    };
    let meta_ok = wants_mod || event.meta == (has("meta") || has("cmd"));
    ctrl_ok
        && meta_ok
        && event.shift == has("shift")
        && event.alt == (has("alt") || has("option"))
}

fn common_path(a: &[usize], b: &[usize]) -> Path {
    a.iter()
        .zip(b)
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| *x)
        .collect()
}

impl Editor {
    /// Pulls a range end that sits at the very start of a later leaf back to
    /// the end of the previous leaf.
    pub fn unhang_range(&self, range: &Range) -> Range {
        if range.is_collapsed() {
            return range.clone();
        }
        let (start, end) = range.edges();
        if end.offset != 0 || end.path == start.path {
            return range.clone();
        }
        let Some(leaf) = self.document().resolve(&end.path) else {
            return range.clone();
        };
        match self.previous_text(leaf) {
            Some(prev) => {
                let Some(path) = self.document().path_of(prev) else {
                    return range.clone();
                };
                let end = Point::new(path, self.text_len(prev));
                if end.cmp_position(start).is_lt() {
                    return range.clone();
                }
                Range::new(start.clone(), end)
            }
            None => range.clone(),
        }
    }

    fn node_range(&self, path: &[usize]) -> Option<Range> {
        let id = self.document().resolve(path)?;
        let texts = self.document().texts_in(id);
        match (texts.first(), texts.last()) {
            (Some(first), Some(last)) => Some(Range::new(
                Point::new(self.document().path_of(*first)?, 0),
                Point::new(self.document().path_of(*last)?, self.text_len(*last)),
            )),
            _ => Some(Range::collapsed(Point::new(path.to_vec(), 0))),
        }
    }

    /// Converts any location, or the selection, into what an action of `ty`
    /// operates on.
    pub fn action_location(
        &self,
        ty: ActionType,
        from: Option<&Location>,
    ) -> Option<ActionLocation> {
        let location = match from {
            Some(location) => location.clone(),
            None => Location::Range(self.selection()?),
        };
        let location = match location {
            Location::Range(range) => Location::Range(self.unhang_range(&range)),
            other => other,
        };
        let path = match &location {
            Location::Path { path } => path.clone(),
            Location::Point(point) => point.path.clone(),
            Location::Range(range) => common_path(&range.anchor.path, &range.focus.path),
        };

        match ty {
            ActionType::Phrasing => {
                let id = self.document().resolve(&path)?;
                let mut walk = std::iter::once(id).chain(self.document().ancestors(id));
                if let Some(found) =
                    walk.find(|id| self.content_model_type(*id) == Some(ContentType::Phrasing))
                {
                    return Some(ActionLocation::Phrasing {
                        path: self.document().path_of(found)?,
                    });
                }
                std::iter::once(id)
                    .chain(self.document().ancestors(id))
                    .find(|id| {
                        self.node(*id).is_some_and(|n| n.is_element())
                            && self.content_type(*id) == Some(ContentType::Flow)
                    })
                    .and_then(|found| self.document().path_of(found))
                    .map(|path| ActionLocation::Phrasing { path })
            }
            ActionType::Selection => {
                let range = match location {
                    Location::Range(range) => range,
                    Location::Point(point) => Range::collapsed(point),
                    Location::Path { path } => self.node_range(&path)?,
                };
                Some(ActionLocation::Selection { range })
            }
            ActionType::TopLevel => path
                .first()
                .map(|index| ActionLocation::TopLevel { index: *index }),
        }
    }

    pub fn run_action(&mut self, key: &str, from: Option<&Location>) -> Result<bool, EditorError> {
        self.run_action_with_params(key, from, Map::new())
    }

    /// Runs an action as one batch. Disabled or unlocatable actions return
    /// `Ok(false)` without running.
    pub fn run_action_with_params(
        &mut self,
        key: &str,
        from: Option<&Location>,
        params: Map<String, Value>,
    ) -> Result<bool, EditorError> {
        let action = self
            .factory()
            .action(key)
            .cloned()
            .ok_or_else(|| EditorError::UnknownAction(key.to_string()))?;
        let Some(location) = self.action_location(action.ty, from) else {
            debug!(action = key, "action has no location");
            return Ok(false);
        };
        let mut state = action.state(self, &location);
        if state.disabled {
            debug!(action = key, "action is disabled");
            return Ok(false);
        }
        state.params.extend(params);
        debug!(action = key, ?location, "run action");
        let run = action.run.clone();
        self.without_normalizing(|editor| run(editor, &location, &state))
    }

    /// States of the given actions, or of every action, without running any.
    pub fn actions(&self, from: Option<&Location>, keys: Option<&[&str]>) -> Vec<ActionInstance> {
        let factory = self.factory();
        let actions: Vec<_> = match keys {
            Some(keys) => keys.iter().filter_map(|key| factory.action(key)).collect(),
            None => factory.actions().collect(),
        };
        actions
            .into_iter()
            .map(|action| {
                let state = match self.action_location(action.ty, from) {
                    Some(location) => action.state(self, &location),
                    None => ActionState::disabled(),
                };
                ActionInstance {
                    key: action.key.clone(),
                    ty: action.ty,
                    state,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mod_matches_either_ctrl_or_meta() {
        assert!(hotkey_matches("mod+b", &KeyEvent::new("b").ctrl()));
        assert!(hotkey_matches("mod+b", &KeyEvent::new("B").meta()));
        assert!(!hotkey_matches("mod+b", &KeyEvent::new("b")));
        assert!(!hotkey_matches("mod+b", &KeyEvent::new("b").ctrl().shift()));
    }

    #[test]
    fn plain_modifiers_must_match_exactly() {
        assert!(hotkey_matches("ctrl+enter", &KeyEvent::new("Enter").ctrl()));
        assert!(!hotkey_matches("ctrl+enter", &KeyEvent::new("Enter").meta()));
        assert!(!hotkey_matches("enter", &KeyEvent::new("Enter").ctrl()));
    }
}
