//! Contract between the bridge and the host engine.
//!
//! The host owns the window, the graphics device and two render queues: a
//! 2D queue run inside its 2D pass and a 3D queue run inside its 3D pass.
//! The bridge never draws directly; it hands the host [`RenderJob`]s.

use std::sync::Arc;

use fx_runtime::{RuntimeError, SharedRenderer};
use glam::{Affine2, Mat4, Vec2};

/// Deferred work executed by the host inside one of its render passes.
pub type RenderJob = Box<dyn FnOnce() + Send + 'static>;

/// The host's current 3D camera, in glam's column-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    pub view: Mat4,
    pub projection: Mat4,
}

impl Default for CameraMatrices {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }
}

/// A device the runtime renderer can be bound to.
pub trait GraphicsDevice: Send + Sync {
    /// Create the runtime renderer. Called once per runtime.
    fn create_renderer(&self) -> Result<SharedRenderer, RuntimeError>;
}

/// Host engine services the bridge relies on.
///
/// # Example Implementation
///
/// ```ignore
/// struct MyEngine { /* ... */ }
///
/// impl Host for MyEngine {
///     fn graphics_device(&self) -> Option<Arc<dyn GraphicsDevice>> { Some(self.device.clone()) }
///     fn window_size(&self) -> Vec2 { self.window.size() }
///     fn transform_2d(&self) -> Affine2 { self.renderer_2d.current_transform() }
///     fn camera(&self) -> CameraMatrices { self.scene.camera_matrices() }
///     fn enqueue_2d(&self, job: RenderJob) { self.queue_2d.push(job) }
///     fn enqueue_3d(&self, job: RenderJob) { self.queue_3d.push(job) }
/// }
/// ```
pub trait Host: Send + Sync {
    /// `None` when no device is available yet.
    fn graphics_device(&self) -> Option<Arc<dyn GraphicsDevice>>;

    /// Window size in pixels.
    fn window_size(&self) -> Vec2;

    /// Current local-to-screen transform of the 2D pass.
    fn transform_2d(&self) -> Affine2;

    fn camera(&self) -> CameraMatrices;

    fn enqueue_2d(&self, job: RenderJob);

    fn enqueue_3d(&self, job: RenderJob);

    /// Called once after the runtime is created so the host can build any
    /// pipeline state its render passes need before the first real frame.
    fn warm_up(&self) {}
}
