use crate::content::ContentType;
use crate::error::FactoryError;
use crate::node::HTML;
use crate::registry::{ElementConfig, MarkdownPlugin};

/// Raw HTML is kept verbatim and never edited in place.
pub struct HtmlPlugin;

impl MarkdownPlugin for HtmlPlugin {
    fn id(&self) -> &'static str {
        "html"
    }

    fn elements(&self) -> Result<Vec<ElementConfig>, FactoryError> {
        Ok(vec![
            ElementConfig::block(HTML, ContentType::StaticPhrasing, Some(ContentType::Value))
                .read_only(),
        ])
    }
}
