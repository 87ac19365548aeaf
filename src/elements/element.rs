//! Line elements connecting two nodes

use serde::{Deserialize, Serialize};

/// Closed set of line-element kinds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// Flexural member (axial, torsion and biaxial bending)
    #[default]
    Beam,
    /// Flexural member, analysed like a beam
    Column,
    /// Pin-ended bracing member, analysed like a truss
    Brace,
    /// Axial-only member
    Truss,
}

impl ElementKind {
    /// Whether the element carries end moments
    pub fn has_bending(self) -> bool {
        match self {
            ElementKind::Beam | ElementKind::Column => true,
            ElementKind::Brace | ElementKind::Truss => false,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ElementKind::Beam => "beam",
            ElementKind::Column => "column",
            ElementKind::Brace => "brace",
            ElementKind::Truss => "truss",
        }
    }
}

/// A two-node line element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    /// Element identifier, assigned by [`crate::FEModel::add_element`] when empty
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub kind: ElementKind,
    /// Start node id
    pub i_node: String,
    /// End node id
    pub j_node: String,
    /// Material name
    pub material: String,
    /// Section name
    pub section: String,
    /// Rotation of local y/z about local x (radians)
    #[serde(default)]
    pub rotation: f64,
    /// Inactive elements are skipped during assembly
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Element {
    /// Create a new element of the given kind
    pub fn new(kind: ElementKind, i_node: &str, j_node: &str, material: &str, section: &str) -> Self {
        Self {
            id: String::new(),
            kind,
            i_node: i_node.to_string(),
            j_node: j_node.to_string(),
            material: material.to_string(),
            section: section.to_string(),
            rotation: 0.0,
            active: true,
        }
    }

    pub fn beam(i_node: &str, j_node: &str, material: &str, section: &str) -> Self {
        Self::new(ElementKind::Beam, i_node, j_node, material, section)
    }

    pub fn column(i_node: &str, j_node: &str, material: &str, section: &str) -> Self {
        Self::new(ElementKind::Column, i_node, j_node, material, section)
    }

    pub fn brace(i_node: &str, j_node: &str, material: &str, section: &str) -> Self {
        Self::new(ElementKind::Brace, i_node, j_node, material, section)
    }

    pub fn truss(i_node: &str, j_node: &str, material: &str, section: &str) -> Self {
        Self::new(ElementKind::Truss, i_node, j_node, material, section)
    }

    /// Set element rotation about its longitudinal axis
    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    /// Mark the element active or inactive
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}
