//! Id-keyed storage for game objects and point lights.
//!
//! # Overview
//!
//! [`ObjectRegistry`] hands out ids from one counter shared by game objects
//! and lights. Ids increase monotonically and are never reused, even after a
//! removal. Every mutator reports a missing id as [`SceneError::NotFound`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use glam::Vec3;
//! use engine_scene::{GameObject, MeshSource, ObjectRegistry, PointLight};
//!
//! struct Cube;
//!
//! impl MeshSource for Cube {
//!     fn name(&self) -> &str { "cube" }
//!     fn vertex_count(&self) -> u32 { 36 }
//!     fn as_any(&self) -> &dyn std::any::Any { self }
//! }
//!
//! let mut registry = ObjectRegistry::new();
//! let cube = registry.add_game_object(GameObject::new(Arc::new(Cube), "cube"));
//! let light = registry.add_point_light(PointLight::new(Vec3::Y));
//!
//! registry.move_game_object(cube, Vec3::new(0.0, 0.0, 2.0)).unwrap();
//! registry.set_point_light_intensity(light, 0.3).unwrap();
//! assert_eq!(registry.vertex_count(), 36);
//! ```

use std::collections::BTreeMap;

use glam::Vec3;
use tracing::debug;

use crate::error::{SceneError, SceneResult};
use crate::game_object::GameObject;
use crate::light::PointLight;

/// Identifier of a game object or point light.
pub type ObjectId = u32;

const GAME_OBJECT: &str = "game object";
const POINT_LIGHT: &str = "point light";

/// Owns the scene's game objects and point lights.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    game_objects: BTreeMap<ObjectId, GameObject>,
    point_lights: BTreeMap<ObjectId, PointLight>,
    current_id: ObjectId,
    vertex_count: u64,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `object` and returns its id.
    pub fn add_game_object(&mut self, object: GameObject) -> ObjectId {
        let id = self.assign_id();
        self.vertex_count += u64::from(object.vertex_count());
        debug!("Added game object '{}' as {}", object.name, id);
        self.game_objects.insert(id, object);
        id
    }

    /// Stores `light` and returns its id.
    pub fn add_point_light(&mut self, light: PointLight) -> ObjectId {
        let id = self.assign_id();
        self.point_lights.insert(id, light);
        debug!("Added point light {}", id);
        id
    }

    /// Removes and returns a game object.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::NotFound`] if no game object has this id.
    pub fn remove_game_object(&mut self, id: ObjectId) -> SceneResult<GameObject> {
        let object = self
            .game_objects
            .remove(&id)
            .ok_or(SceneError::NotFound {
                kind: GAME_OBJECT,
                id,
            })?;
        self.vertex_count -= u64::from(object.vertex_count());
        Ok(object)
    }

    /// Removes and returns a point light.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::NotFound`] if no point light has this id.
    pub fn remove_point_light(&mut self, id: ObjectId) -> SceneResult<PointLight> {
        self.point_lights.remove(&id).ok_or(SceneError::NotFound {
            kind: POINT_LIGHT,
            id,
        })
    }

    pub fn move_game_object(&mut self, id: ObjectId, translation: Vec3) -> SceneResult<()> {
        self.game_object_mut(id)?.transform.translation = translation;
        Ok(())
    }

    pub fn scale_game_object(&mut self, id: ObjectId, scale: f32) -> SceneResult<()> {
        self.game_object_mut(id)?.transform.scale = scale;
        Ok(())
    }

    pub fn rotate_game_object(&mut self, id: ObjectId, rotation: Vec3) -> SceneResult<()> {
        self.game_object_mut(id)?.transform.rotation = rotation;
        Ok(())
    }

    pub fn set_model_color(&mut self, id: ObjectId, color: Vec3) -> SceneResult<()> {
        self.game_object_mut(id)?.color = color;
        Ok(())
    }

    pub fn set_point_light_position(&mut self, id: ObjectId, position: Vec3) -> SceneResult<()> {
        self.point_light_mut(id)?.position = position;
        Ok(())
    }

    pub fn set_point_light_intensity(&mut self, id: ObjectId, intensity: f32) -> SceneResult<()> {
        self.point_light_mut(id)?.intensity = intensity;
        Ok(())
    }

    pub fn set_point_light_radius(&mut self, id: ObjectId, radius: f32) -> SceneResult<()> {
        self.point_light_mut(id)?.radius = radius;
        Ok(())
    }

    pub fn set_point_light_color(&mut self, id: ObjectId, color: Vec3) -> SceneResult<()> {
        self.point_light_mut(id)?.color = color;
        Ok(())
    }

    /// Game objects in ascending id order.
    pub fn game_objects(&self) -> impl Iterator<Item = (ObjectId, &GameObject)> {
        self.game_objects.iter().map(|(&id, object)| (id, object))
    }

    /// Point lights in ascending id order.
    pub fn point_lights(&self) -> impl Iterator<Item = (ObjectId, &PointLight)> {
        self.point_lights.iter().map(|(&id, light)| (id, light))
    }

    pub fn game_object(&self, id: ObjectId) -> Option<&GameObject> {
        self.game_objects.get(&id)
    }

    pub fn point_light(&self, id: ObjectId) -> Option<&PointLight> {
        self.point_lights.get(&id)
    }

    /// Total vertices of all stored game objects.
    #[inline]
    pub fn vertex_count(&self) -> u64 {
        self.vertex_count
    }

    fn game_object_mut(&mut self, id: ObjectId) -> SceneResult<&mut GameObject> {
        self.game_objects.get_mut(&id).ok_or(SceneError::NotFound {
            kind: GAME_OBJECT,
            id,
        })
    }

    fn point_light_mut(&mut self, id: ObjectId) -> SceneResult<&mut PointLight> {
        self.point_lights.get_mut(&id).ok_or(SceneError::NotFound {
            kind: POINT_LIGHT,
            id,
        })
    }

    fn assign_id(&mut self) -> ObjectId {
        let id = self.current_id;
        self.current_id += 1;
        id
    }
}
