//! Conversion between document fragments and markdown or HTML text.
//!
//! Every conversion runs the factory's shared processor first and then the
//! processor of its direction. Processors are plain lists of fragment
//! transforms that are configured before the factory is frozen.

mod html;
mod markdown;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::editor::Editor;
use crate::error::{BridgeError, FactoryError};
use crate::node::Node;
use crate::registry::EditorFactory;

pub use self::html::{generate_html, parse_html};
pub use self::markdown::{generate_markdown, parse_markdown};

pub type FragmentTransform = Arc<dyn Fn(Vec<Node>) -> Vec<Node> + Send + Sync>;

/// An ordered pipeline of fragment transforms.
pub struct Processor {
    name: &'static str,
    transforms: Vec<FragmentTransform>,
    frozen: bool,
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("name", &self.name)
            .field("transforms", &self.transforms.len())
            .field("frozen", &self.frozen)
            .finish()
    }
}

impl Processor {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            transforms: Vec::new(),
            frozen: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn use_transform(&mut self, transform: FragmentTransform) -> Result<(), FactoryError> {
        if self.frozen {
            return Err(FactoryError::Frozen(self.name));
        }
        self.transforms.push(transform);
        Ok(())
    }

    pub fn freeze(&mut self) {
        if !self.frozen {
            debug!(processor = self.name, transforms = self.transforms.len(), "processor frozen");
        }
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn run(&self, fragment: Vec<Node>) -> Vec<Node> {
        self.transforms
            .iter()
            .fold(fragment, |fragment, transform| transform(fragment))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bullet {
    #[default]
    Dash,
    Star,
    Plus,
}

/// Settings of the markdown stringifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownOptions {
    pub bullet: Bullet,
    /// Wrap width for paragraphs. Zero never wraps.
    pub width: usize,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            bullet: Bullet::Dash,
            width: 0,
        }
    }
}

impl EditorFactory {
    pub(crate) fn run_serialize(&self, fragment: Vec<Node>) -> Vec<Node> {
        self.serialize_processor()
            .run(self.processor().run(fragment))
    }

    pub(crate) fn run_deserialize(&self, fragment: Vec<Node>) -> Vec<Node> {
        self.deserialize_processor()
            .run(self.processor().run(fragment))
    }
}

impl Editor {
    /// Markdown of the whole document.
    pub fn to_markdown(&self) -> Result<String, BridgeError> {
        generate_markdown(self.factory(), &self.children())
    }

    pub fn to_html(&self) -> Result<String, BridgeError> {
        generate_html(self.factory(), &self.children())
    }

    pub fn generate_markdown(&self, fragment: &[Node]) -> Result<String, BridgeError> {
        generate_markdown(self.factory(), fragment)
    }

    pub fn parse_markdown(&self, text: &str) -> Vec<Node> {
        parse_markdown(self.factory(), text)
    }

    pub fn generate_html(&self, fragment: &[Node]) -> Result<String, BridgeError> {
        generate_html(self.factory(), fragment)
    }

    pub fn parse_html(&self, html: &str) -> Vec<Node> {
        parse_html(self.factory(), html)
    }
}
