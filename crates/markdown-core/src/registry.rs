use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};

use crate::actions::{Action, KeyEvent, hotkey_matches};
use crate::bridge::{FragmentTransform, MarkdownOptions, Processor};
use crate::content::{ContentType, ContentTypePair};
use crate::decoration::DecoratedRange;
use crate::document::{NodeData, NodeView};
use crate::editor::{Editor, NodeEntry};
use crate::error::{EditorError, FactoryError};
use crate::node::Attrs;

/// Handed to custom normalizers so they can take over a node completely.
#[derive(Debug, Default)]
pub struct NormalizeContext {
    prevented: bool,
}

impl NormalizeContext {
    pub fn prevent_defaults(&mut self) {
        self.prevented = true;
    }

    pub fn is_prevented(&self) -> bool {
        self.prevented
    }
}

pub type NormalizeFn = Arc<
    dyn Fn(&mut Editor, &NodeEntry, &mut NormalizeContext) -> Result<(), EditorError> + Send + Sync,
>;
/// Receives the decorated node and the element that owns the decoration.
pub type DecorateFn =
    Arc<dyn Fn(&Editor, &NodeEntry, &NodeEntry) -> Vec<DecoratedRange> + Send + Sync>;
/// Returns `true` when the event was consumed.
pub type BlockEventHandler =
    Arc<dyn Fn(&mut Editor, &NodeEntry) -> Result<bool, EditorError> + Send + Sync>;
pub type ToggleFn =
    Arc<dyn Fn(&mut Editor, &NodeEntry, Attrs) -> Result<bool, EditorError> + Send + Sync>;
/// Receives the typed prefix and the paragraph it was typed in.
pub type TriggerFn = Arc<dyn Fn(&str, &NodeEntry) -> Option<Attrs> + Send + Sync>;

/// Typing a matching prefix followed by a space at the start of a paragraph
/// converts the paragraph.
#[derive(Clone)]
pub struct PrefixToggle {
    pub prefix: Regex,
    pub estimate_prefix_length: Option<usize>,
    pub on_trigger: TriggerFn,
    pub toggle: ToggleFn,
}

impl PrefixToggle {
    /// Compiles `prefix` into a toggle rule.
    pub fn new(
        prefix: &str,
        on_trigger: impl Fn(&str, &NodeEntry) -> Option<Attrs> + Send + Sync + 'static,
        toggle: impl Fn(&mut Editor, &NodeEntry, Attrs) -> Result<bool, EditorError>
        + Send
        + Sync
        + 'static,
    ) -> Result<Self, FactoryError> {
        let prefix = Regex::new(prefix).map_err(|err| FactoryError::InvalidPattern {
            pattern: prefix.to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self {
            prefix,
            estimate_prefix_length: None,
            on_trigger: Arc::new(on_trigger),
            toggle: Arc::new(toggle),
        })
    }

    pub fn estimate_prefix_length(mut self, len: usize) -> Self {
        self.estimate_prefix_length = Some(len);
        self
    }

    /// Params for `prefix` typed in `paragraph`, if it triggers this toggle.
    pub fn trigger(&self, prefix: &str, paragraph: &NodeEntry) -> Option<Attrs> {
        if let Some(max) = self.estimate_prefix_length
            && prefix.chars().count() > max
        {
            return None;
        }
        if !self.prefix.is_match(prefix) {
            return None;
        }
        (self.on_trigger)(prefix, paragraph)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockEvent {
    Tab,
    StartDelete,
    StartEnter,
}

#[derive(Clone, Default)]
pub struct BlockEvents {
    pub on_tab: Option<BlockEventHandler>,
    pub on_start_delete: Option<BlockEventHandler>,
    pub on_start_enter: Option<BlockEventHandler>,
}

impl BlockEvents {
    pub fn handler(&self, event: BlockEvent) -> Option<&BlockEventHandler> {
        match event {
            BlockEvent::Tab => self.on_tab.as_ref(),
            BlockEvent::StartDelete => self.on_start_delete.as_ref(),
            BlockEvent::StartEnter => self.on_start_enter.as_ref(),
        }
    }
}

/// Declarative description of one element type.
#[derive(Clone)]
pub struct ElementConfig {
    pub ty: String,
    pub is_inline: bool,
    pub is_void: bool,
    pub content_type: ContentType,
    pub content_model_type: Option<ContentType>,
    /// Block events of this container also fire from its first paragraph.
    pub wrapping_paragraph: bool,
    pub editable: bool,
    pub disallow_text_decorators: bool,
    pub normalize: Option<NormalizeFn>,
    pub decorate: Option<DecorateFn>,
    pub toggle: Option<PrefixToggle>,
    pub events: BlockEvents,
}

impl ElementConfig {
    pub fn block(
        ty: impl Into<String>,
        content_type: ContentType,
        content_model_type: Option<ContentType>,
    ) -> Self {
        Self {
            ty: ty.into(),
            is_inline: false,
            is_void: false,
            content_type,
            content_model_type,
            wrapping_paragraph: false,
            editable: true,
            disallow_text_decorators: false,
            normalize: None,
            decorate: None,
            toggle: None,
            events: BlockEvents::default(),
        }
    }

    pub fn inline(
        ty: impl Into<String>,
        content_type: ContentType,
        content_model_type: Option<ContentType>,
    ) -> Self {
        Self {
            is_inline: true,
            ..Self::block(ty, content_type, content_model_type)
        }
    }

    pub fn void(mut self) -> Self {
        self.is_void = true;
        self.content_model_type = None;
        self
    }

    pub fn wrapping_paragraph(mut self) -> Self {
        self.wrapping_paragraph = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    pub fn disallow_text_decorators(mut self) -> Self {
        self.disallow_text_decorators = true;
        self
    }

    pub fn normalize(
        mut self,
        normalize: impl Fn(&mut Editor, &NodeEntry, &mut NormalizeContext) -> Result<(), EditorError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.normalize = Some(Arc::new(normalize));
        self
    }

    pub fn decorate(
        mut self,
        decorate: impl Fn(&Editor, &NodeEntry, &NodeEntry) -> Vec<DecoratedRange>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.decorate = Some(Arc::new(decorate));
        self
    }

    pub fn toggle(mut self, toggle: PrefixToggle) -> Self {
        self.toggle = Some(toggle);
        self
    }

    pub fn on_tab(
        mut self,
        handler: impl Fn(&mut Editor, &NodeEntry) -> Result<bool, EditorError> + Send + Sync + 'static,
    ) -> Self {
        self.events.on_tab = Some(Arc::new(handler));
        self
    }

    pub fn on_start_delete(
        mut self,
        handler: impl Fn(&mut Editor, &NodeEntry) -> Result<bool, EditorError> + Send + Sync + 'static,
    ) -> Self {
        self.events.on_start_delete = Some(Arc::new(handler));
        self
    }

    pub fn on_start_enter(
        mut self,
        handler: impl Fn(&mut Editor, &NodeEntry) -> Result<bool, EditorError> + Send + Sync + 'static,
    ) -> Self {
        self.events.on_start_enter = Some(Arc::new(handler));
        self
    }

    pub fn pair(&self) -> ContentTypePair {
        ContentTypePair::new(self.content_type, self.content_model_type)
    }
}

/// The single descriptor shared by every text leaf.
#[derive(Clone)]
pub struct TextConfig {
    pub content_type: ContentType,
    pub content_model_type: Option<ContentType>,
    pub normalize: Option<NormalizeFn>,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            content_type: ContentType::StaticPhrasing,
            content_model_type: Some(ContentType::Value),
            normalize: None,
        }
    }
}

impl TextConfig {
    pub fn normalize(
        mut self,
        normalize: impl Fn(&mut Editor, &NodeEntry, &mut NormalizeContext) -> Result<(), EditorError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.normalize = Some(Arc::new(normalize));
        self
    }

    pub fn pair(&self) -> ContentTypePair {
        ContentTypePair::new(self.content_type, self.content_model_type)
    }
}

pub trait MarkdownPlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn elements(&self) -> Result<Vec<ElementConfig>, FactoryError> {
        Ok(Vec::new())
    }
    fn text(&self) -> Option<TextConfig> {
        None
    }
    fn actions(&self) -> Vec<Action> {
        Vec::new()
    }
    fn serialize_transforms(&self) -> Vec<FragmentTransform> {
        Vec::new()
    }
    fn deserialize_transforms(&self) -> Vec<FragmentTransform> {
        Vec::new()
    }
}

/// Configuration phase of an editor. Once frozen it is shared read-only by
/// every editor built from it.
pub struct EditorFactory {
    elements: Vec<Arc<ElementConfig>>,
    element_index: HashMap<String, usize>,
    inline_types: HashSet<String>,
    void_types: HashSet<String>,
    text: Option<Arc<TextConfig>>,
    actions: Vec<Arc<Action>>,
    action_index: HashMap<String, usize>,
    processor: Processor,
    serialize_processor: Processor,
    deserialize_processor: Processor,
    markdown_options: MarkdownOptions,
    line_actions: Vec<Vec<String>>,
    selection_actions: Vec<String>,
    frozen: bool,
}

impl Default for EditorFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorFactory {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            element_index: HashMap::new(),
            inline_types: HashSet::new(),
            void_types: HashSet::new(),
            text: None,
            actions: Vec::new(),
            action_index: HashMap::new(),
            processor: Processor::new("processor"),
            serialize_processor: Processor::new("serialize processor"),
            deserialize_processor: Processor::new("deserialize processor"),
            markdown_options: MarkdownOptions::default(),
            line_actions: Vec::new(),
            selection_actions: Vec::new(),
            frozen: false,
        }
    }

    /// A frozen factory with every built-in element and action.
    pub fn markdown() -> Result<Arc<Self>, FactoryError> {
        let mut factory = Self::new();
        crate::elements::register_all(&mut factory)?;
        factory.freeze();
        Ok(Arc::new(factory))
    }

    fn ensure_configurable(&self) -> Result<(), FactoryError> {
        if self.frozen {
            return Err(FactoryError::Frozen("editor factory"));
        }
        Ok(())
    }

    pub fn define_element(&mut self, config: ElementConfig) -> Result<(), FactoryError> {
        self.ensure_configurable()?;
        if self.element_index.contains_key(&config.ty) {
            return Err(FactoryError::DuplicateElement(config.ty));
        }
        if config.is_inline {
            self.inline_types.insert(config.ty.clone());
        }
        if config.is_void || config.content_model_type.is_none() {
            self.void_types.insert(config.ty.clone());
        }
        self.element_index
            .insert(config.ty.clone(), self.elements.len());
        self.elements.push(Arc::new(config));
        Ok(())
    }

    pub fn define_text(&mut self, config: TextConfig) -> Result<(), FactoryError> {
        self.ensure_configurable()?;
        if self.text.is_some() {
            return Err(FactoryError::DuplicateText);
        }
        self.text = Some(Arc::new(config));
        Ok(())
    }

    pub fn define_action(&mut self, action: Action) -> Result<(), FactoryError> {
        self.ensure_configurable()?;
        if self.action_index.contains_key(&action.key) {
            return Err(FactoryError::DuplicateAction(action.key));
        }
        self.action_index
            .insert(action.key.clone(), self.actions.len());
        self.actions.push(Arc::new(action));
        Ok(())
    }

    pub fn use_plugin(&mut self, plugin: &dyn MarkdownPlugin) -> Result<(), FactoryError> {
        self.ensure_configurable()?;
        debug!(plugin = plugin.id(), "registering markdown plugin");
        for element in plugin.elements()? {
            self.define_element(element)?;
        }
        if let Some(text) = plugin.text() {
            self.define_text(text)?;
        }
        for action in plugin.actions() {
            self.define_action(action)?;
        }
        for transform in plugin.serialize_transforms() {
            self.serialize_processor.use_transform(transform)?;
        }
        for transform in plugin.deserialize_transforms() {
            self.deserialize_processor.use_transform(transform)?;
        }
        Ok(())
    }

    /// Configures the transforms shared by both conversion directions.
    pub fn config_processor(
        &mut self,
        configure: impl FnOnce(&mut Processor) -> Result<(), FactoryError>,
    ) -> Result<(), FactoryError> {
        self.ensure_configurable()?;
        configure(&mut self.processor)
    }

    pub fn config_serialize_processor(
        &mut self,
        configure: impl FnOnce(&mut Processor) -> Result<(), FactoryError>,
    ) -> Result<(), FactoryError> {
        self.ensure_configurable()?;
        configure(&mut self.serialize_processor)
    }

    pub fn config_deserialize_processor(
        &mut self,
        configure: impl FnOnce(&mut Processor) -> Result<(), FactoryError>,
    ) -> Result<(), FactoryError> {
        self.ensure_configurable()?;
        configure(&mut self.deserialize_processor)
    }

    pub fn set_markdown_options(&mut self, options: MarkdownOptions) -> Result<(), FactoryError> {
        self.ensure_configurable()?;
        self.markdown_options = options;
        Ok(())
    }

    /// Toolbar groups for block-level actions.
    pub fn set_line_actions<G, S>(&mut self, groups: G) -> Result<(), FactoryError>
    where
        G: IntoIterator<Item = Vec<S>>,
        S: Into<String>,
    {
        self.ensure_configurable()?;
        self.line_actions = groups
            .into_iter()
            .map(|group| group.into_iter().map(Into::into).collect())
            .collect();
        Ok(())
    }

    pub fn set_selection_actions<I, S>(&mut self, keys: I) -> Result<(), FactoryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_configurable()?;
        self.selection_actions = keys.into_iter().map(Into::into).collect();
        Ok(())
    }

    pub fn freeze(&mut self) {
        if self.frozen {
            return;
        }
        if self.text.is_none() {
            self.text = Some(Arc::new(TextConfig::default()));
        }
        self.processor.freeze();
        self.serialize_processor.freeze();
        self.deserialize_processor.freeze();
        self.frozen = true;
        debug!(
            elements = self.elements.len(),
            actions = self.actions.len(),
            "editor factory frozen"
        );
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn element(&self, ty: &str) -> Option<&Arc<ElementConfig>> {
        self.element_index.get(ty).map(|ix| &self.elements[*ix])
    }

    /// Element configs in definition order.
    pub fn elements(&self) -> impl Iterator<Item = &Arc<ElementConfig>> {
        self.elements.iter()
    }

    pub fn text(&self) -> Arc<TextConfig> {
        self.text
            .clone()
            .unwrap_or_else(|| Arc::new(TextConfig::default()))
    }

    pub fn is_inline(&self, ty: &str) -> bool {
        self.inline_types.contains(ty)
    }

    pub fn is_void(&self, ty: &str) -> bool {
        self.void_types.contains(ty)
    }

    pub fn inline_types(&self) -> &HashSet<String> {
        &self.inline_types
    }

    pub fn void_types(&self) -> &HashSet<String> {
        &self.void_types
    }

    pub fn action(&self, key: &str) -> Option<&Arc<Action>> {
        self.action_index.get(key).map(|ix| &self.actions[*ix])
    }

    pub fn actions(&self) -> impl Iterator<Item = &Arc<Action>> {
        self.actions.iter()
    }

    pub fn action_for_hotkey(&self, event: &KeyEvent) -> Option<&Arc<Action>> {
        self.actions.iter().find(|action| {
            action
                .hotkeys
                .iter()
                .any(|hotkey| hotkey_matches(hotkey, event))
        })
    }

    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    pub fn serialize_processor(&self) -> &Processor {
        &self.serialize_processor
    }

    pub fn deserialize_processor(&self) -> &Processor {
        &self.deserialize_processor
    }

    pub fn markdown_options(&self) -> &MarkdownOptions {
        &self.markdown_options
    }

    pub fn line_actions(&self) -> &[Vec<String>] {
        &self.line_actions
    }

    pub fn selection_actions(&self) -> &[String] {
        &self.selection_actions
    }

    /// Category pair of a node. Unregistered element types have none.
    pub fn content_type_pair(&self, node: &NodeView<'_>) -> ContentTypePair {
        match node.data() {
            NodeData::Root => ContentTypePair::new(ContentType::Flow, Some(ContentType::Flow)),
            NodeData::Text { .. } => self.text().pair(),
            NodeData::Element { ty, .. } => match self.element(ty) {
                Some(config) => config.pair(),
                None => {
                    warn!(element = %ty, "unregistered element type");
                    ContentTypePair::UNKNOWN
                }
            },
        }
    }
}
