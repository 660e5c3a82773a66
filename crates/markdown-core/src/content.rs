use serde::{Deserialize, Serialize};

/// Markdown content categories, laid out in a tagged numeric space.
///
/// The high nibble names the family. Within a family a larger code is a more
/// specific kind of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum ContentType {
    Flow = 0x10,
    List = 0x20,
    Phrasing = 0x30,
    StaticPhrasing = 0x31,
    Value = 0x40,
    Table = 0x50,
    TableRow = 0x60,
}

impl ContentType {
    pub const ALL: [ContentType; 7] = [
        ContentType::Flow,
        ContentType::List,
        ContentType::Phrasing,
        ContentType::StaticPhrasing,
        ContentType::Value,
        ContentType::Table,
        ContentType::TableRow,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn family(self) -> u8 {
        self.code() >> 4
    }

    /// Whether content of this kind may stand where `expected` is required.
    ///
    /// `StaticPhrasing` satisfies a `Phrasing` expectation, the reverse does not hold.
    pub fn conforms(self, expected: ContentType) -> bool {
        self == expected || (self.family() == expected.family() && self.code() >= expected.code())
    }
}

pub fn conforms(ty: ContentType, expected: ContentType) -> bool {
    ty.conforms(expected)
}

/// Conformance over optional categories. Anything unknown fails closed.
pub fn conforms_opt(ty: Option<ContentType>, expected: Option<ContentType>) -> bool {
    match (ty, expected) {
        (Some(ty), Some(expected)) => ty.conforms(expected),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTypePair {
    pub content_type: Option<ContentType>,
    pub content_model_type: Option<ContentType>,
}

impl ContentTypePair {
    pub const UNKNOWN: ContentTypePair = ContentTypePair {
        content_type: None,
        content_model_type: None,
    };

    pub fn new(content_type: ContentType, content_model_type: Option<ContentType>) -> Self {
        Self {
            content_type: Some(content_type),
            content_model_type,
        }
    }

    pub fn is_known(&self) -> bool {
        self.content_type.is_some()
    }
}
