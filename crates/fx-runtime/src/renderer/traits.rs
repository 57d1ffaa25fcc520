//! Renderer contract between the manager and a graphics backend.
//!
//! A renderer is bound to one graphics device. It owns the camera and
//! projection state and hands out node renderers and resource loaders that
//! the manager drives while drawing.

use std::path::Path;
use std::sync::Arc;

use glam::Vec3;
use parking_lot::Mutex;

use crate::effect::NodeKind;
use crate::manager::Handle;
use crate::math::Matrix44;

/// Texture slot handed out by a [`TextureLoader`]. Zero is never used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Model slot handed out by a [`ModelLoader`]. Zero is never used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelId(pub u32);

/// One particle submitted to a node renderer, already in world space.
#[derive(Debug, Clone, Copy)]
pub struct NodeDraw {
    pub handle: Handle,
    pub kind: NodeKind,
    pub position: Vec3,
    pub size: f32,
    pub color: [f32; 4],
    pub texture: Option<TextureId>,
    pub model: Option<ModelId>,
}

/// Draws one kind of node (sprite, ribbon, ring, track or model).
pub trait NodeRenderer: Send {
    fn render(&mut self, node: &NodeDraw);
}

pub trait TextureLoader: Send {
    fn load(&mut self, path: &Path) -> Option<TextureId>;
}

pub trait ModelLoader: Send {
    fn load(&mut self, path: &Path) -> Option<ModelId>;
}

/// Graphics backend bound to a device.
///
/// Draw calls are only valid between [`begin_rendering`](Renderer::begin_rendering)
/// returning `true` and the matching [`end_rendering`](Renderer::end_rendering).
pub trait Renderer: Send {
    /// Backend identifier (e.g., "recording").
    fn backend(&self) -> &'static str;

    fn set_camera_matrix(&mut self, view: Matrix44);
    fn set_projection_matrix(&mut self, projection: Matrix44);
    fn camera_matrix(&self) -> Matrix44;
    fn projection_matrix(&self) -> Matrix44;

    fn begin_rendering(&mut self) -> bool;
    fn end_rendering(&mut self);

    fn create_sprite_renderer(&self) -> Box<dyn NodeRenderer>;
    fn create_ribbon_renderer(&self) -> Box<dyn NodeRenderer>;
    fn create_ring_renderer(&self) -> Box<dyn NodeRenderer>;
    fn create_track_renderer(&self) -> Box<dyn NodeRenderer>;
    fn create_model_renderer(&self) -> Box<dyn NodeRenderer>;
    fn create_texture_loader(&self) -> Box<dyn TextureLoader>;
    fn create_model_loader(&self) -> Box<dyn ModelLoader>;
}

/// Renderer shared between the runtime owner and queued draw callbacks.
pub type SharedRenderer = Arc<Mutex<dyn Renderer>>;
