//! Reference particle effects runtime.
//!
//! A [`Manager`] owns playing instances of compiled [`Effect`] templates and
//! is addressed through opaque [`Handle`]s. Drawing goes through a
//! [`Renderer`] bound to a graphics device; the bundled
//! [`RecordingRenderer`] records clip-space draws instead of rasterizing.

pub mod error;
pub mod math;
pub mod rng;
pub mod effect;
pub mod instance;
pub mod manager;
pub mod renderer;

// Re-export key types at crate root for convenience
pub use error::RuntimeError;
pub use math::{CoordinateSystem, Matrix43, Matrix44};
pub use effect::{Effect, EffectDef, NodeDef, NodeKind, CompiledNode, MAX_PARTICLES_PER_NODE};
pub use instance::Particle;
pub use manager::{Manager, ManagerStats, Handle, SharedManager, DEFAULT_MAX_INSTANCES};
pub use renderer::{
    Renderer, SharedRenderer, NodeRenderer, NodeDraw,
    TextureLoader, ModelLoader, TextureId, ModelId,
    RecordingRenderer, DrawLog, DrawVertex,
};
