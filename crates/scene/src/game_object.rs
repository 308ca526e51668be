//! Game objects and the mesh data they reference.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use glam::Vec3;

use crate::transform::TransformComponent;

/// Mesh data a game object draws. Shared between objects.
pub trait MeshSource: Send + Sync {
    fn name(&self) -> &str;

    /// Number of vertices drawn for this mesh.
    fn vertex_count(&self) -> u32;

    /// Concrete mesh type, for renderers that draw only their own meshes.
    fn as_any(&self) -> &dyn Any;
}

/// A mesh placed in the scene with a tint.
#[derive(Clone)]
pub struct GameObject {
    pub model: Arc<dyn MeshSource>,
    pub color: Vec3,
    pub transform: TransformComponent,
    pub name: String,
}

impl GameObject {
    /// Creates a white object at the origin.
    pub fn new(model: Arc<dyn MeshSource>, name: impl Into<String>) -> Self {
        Self {
            model,
            color: Vec3::ONE,
            transform: TransformComponent::default(),
            name: name.into(),
        }
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn with_transform(mut self, transform: TransformComponent) -> Self {
        self.transform = transform;
        self
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.model.vertex_count()
    }
}

impl fmt::Debug for GameObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameObject")
            .field("name", &self.name)
            .field("model", &self.model.name())
            .field("color", &self.color)
            .field("transform", &self.transform)
            .finish()
    }
}
