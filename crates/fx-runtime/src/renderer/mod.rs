pub mod traits;
pub mod recording;

pub use traits::{
    Renderer, SharedRenderer, NodeRenderer, NodeDraw,
    TextureLoader, ModelLoader, TextureId, ModelId,
};
pub use recording::{RecordingRenderer, DrawLog, DrawVertex};
