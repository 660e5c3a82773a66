use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::editor::{Editor, EditorConfig};
use crate::error::EditorError;
use crate::node::Node;
use crate::registry::EditorFactory;

const DEFAULT_SCHEMA: &str = "ti-markdown";
const DEFAULT_VERSION: u32 = 1;

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_version() -> u32 {
    DEFAULT_VERSION
}

/// Persisted form of an editor's document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorValue {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub children: Vec<Node>,
}

impl EditorValue {
    pub fn new(children: Vec<Node>) -> Self {
        Self {
            schema: default_schema(),
            version: default_version(),
            children,
        }
    }

    pub fn into_children(self) -> Vec<Node> {
        self.children
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Opens an editor over this value. The children are normalized on load.
    pub fn into_editor(
        self,
        factory: Arc<EditorFactory>,
        config: EditorConfig,
    ) -> Result<Editor, EditorError> {
        Editor::with_config(factory, config, self.children)
    }
}

impl Editor {
    pub fn value(&self) -> EditorValue {
        EditorValue::new(self.children())
    }
}
