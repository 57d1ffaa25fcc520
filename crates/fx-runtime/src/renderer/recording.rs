use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use parking_lot::Mutex;

use super::traits::{
    ModelId, ModelLoader, NodeDraw, NodeRenderer, Renderer, TextureId, TextureLoader,
};
use crate::effect::NodeKind;
use crate::manager::Handle;
use crate::math::Matrix44;

/// One recorded particle draw. 12 floats-worth of plain data, ready for upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct DrawVertex {
    /// Clip-space position after camera and projection.
    pub clip: [f32; 4],
    pub color: [f32; 4],
    pub size: f32,
    /// `NodeKind` discriminant.
    pub kind: u32,
    /// Runtime handle of the instance that produced it.
    pub handle: i32,
    /// Texture slot, 0 when untextured.
    pub texture: u32,
}

impl DrawVertex {
    /// Clip position divided by w.
    pub fn ndc(&self) -> [f32; 3] {
        let [x, y, z, w] = self.clip;
        if w == 0.0 {
            return [x, y, z];
        }
        [x / w, y / w, z / w]
    }
}

#[derive(Debug, Default)]
struct RecordState {
    camera: Matrix44,
    projection: Matrix44,
    rendering: bool,
    passes: u32,
    rejected: u32,
    vertices: Vec<DrawVertex>,
    textures: Vec<PathBuf>,
    models: Vec<PathBuf>,
}

/// Shared view onto everything a [`RecordingRenderer`] has drawn.
#[derive(Debug, Clone, Default)]
pub struct DrawLog {
    state: Arc<Mutex<RecordState>>,
}

impl DrawLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all recorded vertices.
    pub fn vertices(&self) -> Vec<DrawVertex> {
        self.state.lock().vertices.clone()
    }

    /// Drain recorded vertices.
    pub fn take(&self) -> Vec<DrawVertex> {
        std::mem::take(&mut self.state.lock().vertices)
    }

    pub fn len(&self) -> usize {
        self.state.lock().vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().vertices.is_empty()
    }

    /// Vertices produced by one instance.
    pub fn count_for(&self, handle: Handle) -> usize {
        self.state
            .lock()
            .vertices
            .iter()
            .filter(|v| v.handle == handle.0)
            .count()
    }

    /// Completed begin/end rendering passes.
    pub fn passes(&self) -> u32 {
        self.state.lock().passes
    }

    /// Node draws submitted outside a rendering pass and dropped.
    pub fn rejected(&self) -> u32 {
        self.state.lock().rejected
    }

    pub fn textures(&self) -> Vec<PathBuf> {
        self.state.lock().textures.clone()
    }

    pub fn models(&self) -> Vec<PathBuf> {
        self.state.lock().models.clone()
    }

    /// Raw bytes of the vertex stream, laid out as the GPU would receive it.
    pub fn to_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.state.lock().vertices).to_vec()
    }
}

/// Software renderer that records draws instead of rasterizing them.
pub struct RecordingRenderer {
    log: DrawLog,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::with_log(DrawLog::new())
    }

    /// Record into an existing log (so the caller keeps a view of it).
    pub fn with_log(log: DrawLog) -> Self {
        Self { log }
    }

    pub fn log(&self) -> DrawLog {
        self.log.clone()
    }

    fn node_renderer(&self, kind: NodeKind) -> Box<dyn NodeRenderer> {
        Box::new(RecordingNodeRenderer {
            kind,
            state: Arc::clone(&self.log.state),
        })
    }
}

impl Default for RecordingRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for RecordingRenderer {
    fn backend(&self) -> &'static str {
        "recording"
    }

    fn set_camera_matrix(&mut self, view: Matrix44) {
        self.log.state.lock().camera = view;
    }

    fn set_projection_matrix(&mut self, projection: Matrix44) {
        self.log.state.lock().projection = projection;
    }

    fn camera_matrix(&self) -> Matrix44 {
        self.log.state.lock().camera
    }

    fn projection_matrix(&self) -> Matrix44 {
        self.log.state.lock().projection
    }

    fn begin_rendering(&mut self) -> bool {
        let mut state = self.log.state.lock();
        if state.rendering {
            log::warn!("recording renderer: begin_rendering called twice");
            return false;
        }
        state.rendering = true;
        true
    }

    fn end_rendering(&mut self) {
        let mut state = self.log.state.lock();
        if state.rendering {
            state.rendering = false;
            state.passes += 1;
        }
    }

    fn create_sprite_renderer(&self) -> Box<dyn NodeRenderer> {
        self.node_renderer(NodeKind::Sprite)
    }

    fn create_ribbon_renderer(&self) -> Box<dyn NodeRenderer> {
        self.node_renderer(NodeKind::Ribbon)
    }

    fn create_ring_renderer(&self) -> Box<dyn NodeRenderer> {
        self.node_renderer(NodeKind::Ring)
    }

    fn create_track_renderer(&self) -> Box<dyn NodeRenderer> {
        self.node_renderer(NodeKind::Track)
    }

    fn create_model_renderer(&self) -> Box<dyn NodeRenderer> {
        self.node_renderer(NodeKind::Model)
    }

    fn create_texture_loader(&self) -> Box<dyn TextureLoader> {
        Box::new(RecordingLoader {
            state: Arc::clone(&self.log.state),
        })
    }

    fn create_model_loader(&self) -> Box<dyn ModelLoader> {
        Box::new(RecordingLoader {
            state: Arc::clone(&self.log.state),
        })
    }
}

struct RecordingNodeRenderer {
    kind: NodeKind,
    state: Arc<Mutex<RecordState>>,
}

impl NodeRenderer for RecordingNodeRenderer {
    fn render(&mut self, node: &NodeDraw) {
        let mut state = self.state.lock();
        if !state.rendering {
            state.rejected += 1;
            return;
        }
        let view = state.camera.transform(node.position.extend(1.0));
        let clip: Vec4 = state.projection.transform(view);
        state.vertices.push(DrawVertex {
            clip: clip.to_array(),
            color: node.color,
            size: node.size,
            kind: self.kind as u32,
            handle: node.handle.0,
            texture: node.texture.map_or(0, |t| t.0),
        });
    }
}

/// Registers resource paths and hands out slots; nothing is read from disk.
struct RecordingLoader {
    state: Arc<Mutex<RecordState>>,
}

impl TextureLoader for RecordingLoader {
    fn load(&mut self, path: &Path) -> Option<TextureId> {
        let mut state = self.state.lock();
        state.textures.push(path.to_path_buf());
        Some(TextureId(state.textures.len() as u32))
    }
}

impl ModelLoader for RecordingLoader {
    fn load(&mut self, path: &Path) -> Option<ModelId> {
        let mut state = self.state.lock();
        state.models.push(path.to_path_buf());
        Some(ModelId(state.models.len() as u32))
    }
}
