//! Structural entities: nodes, line elements, materials, sections and supports

mod element;
mod material;
mod node;
mod section;
mod support;

pub use element::{Element, ElementKind};
pub use material::Material;
pub use node::{Node, DOF_LABELS};
pub use section::Section;
pub use support::Support;
