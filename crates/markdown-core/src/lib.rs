mod actions;
mod bridge;
mod content;
mod decoration;
mod document;
mod editor;
mod elements;
mod error;
mod highlight;
mod input;
mod location;
mod node;
mod normalize;
mod ops;
mod registry;
mod structural;
mod transforms;
mod upload;
mod value;

pub use crate::actions::*;
pub use crate::bridge::*;
pub use crate::content::*;
pub use crate::decoration::*;
pub use crate::document::*;
pub use crate::editor::*;
pub use crate::elements::*;
pub use crate::error::*;
pub use crate::highlight::*;
pub use crate::input::*;
pub use crate::location::*;
pub use crate::node::*;
pub use crate::normalize::*;
pub use crate::ops::*;
pub use crate::registry::*;
pub use crate::structural::*;
pub use crate::upload::*;
pub use crate::value::*;
