//! Windowless host that records draws.
//!
//! Render jobs queue up until [`HeadlessHost::render_frame`] runs them: the
//! 3D queue first, then the 2D queue, the order a forward renderer composes
//! its passes. Every draw ends up in a shared [`DrawLog`].

use std::sync::Arc;

use fx_runtime::{DrawLog, RecordingRenderer, RuntimeError, SharedRenderer};
use glam::{Affine2, Vec2};
use parking_lot::Mutex;

use crate::host::{CameraMatrices, GraphicsDevice, Host, RenderJob};

/// Device whose renderers record into one log.
pub struct HeadlessDevice {
    log: DrawLog,
}

impl HeadlessDevice {
    pub fn new(log: DrawLog) -> Self {
        Self { log }
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_renderer(&self) -> Result<SharedRenderer, RuntimeError> {
        let renderer: SharedRenderer =
            Arc::new(Mutex::new(RecordingRenderer::with_log(self.log.clone())));
        Ok(renderer)
    }
}

/// Jobs executed by one [`HeadlessHost::render_frame`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub jobs_3d: usize,
    pub jobs_2d: usize,
}

struct HostState {
    window: Vec2,
    transform: Affine2,
    camera: CameraMatrices,
    queue_2d: Vec<RenderJob>,
    queue_3d: Vec<RenderJob>,
    warm_ups: u32,
}

pub struct HeadlessHost {
    device: Option<Arc<HeadlessDevice>>,
    log: DrawLog,
    state: Mutex<HostState>,
}

impl HeadlessHost {
    /// Host with a recording device and a `width` x `height` window.
    pub fn new(width: f32, height: f32) -> Self {
        let log = DrawLog::new();
        Self {
            device: Some(Arc::new(HeadlessDevice::new(log.clone()))),
            log,
            state: Mutex::new(HostState {
                window: Vec2::new(width, height),
                transform: Affine2::IDENTITY,
                camera: CameraMatrices::default(),
                queue_2d: Vec::new(),
                queue_3d: Vec::new(),
                warm_ups: 0,
            }),
        }
    }

    /// Host that reports no graphics device, so runtime creation fails.
    pub fn without_device(width: f32, height: f32) -> Self {
        Self {
            device: None,
            ..Self::new(width, height)
        }
    }

    /// Everything drawn through this host's device.
    pub fn draw_log(&self) -> DrawLog {
        self.log.clone()
    }

    pub fn set_window_size(&self, size: Vec2) {
        self.state.lock().window = size;
    }

    pub fn set_transform_2d(&self, transform: Affine2) {
        self.state.lock().transform = transform;
    }

    pub fn set_camera(&self, camera: CameraMatrices) {
        self.state.lock().camera = camera;
    }

    pub fn pending_2d(&self) -> usize {
        self.state.lock().queue_2d.len()
    }

    pub fn pending_3d(&self) -> usize {
        self.state.lock().queue_3d.len()
    }

    /// How many times the runtime asked for a pipeline warm-up.
    pub fn warm_up_count(&self) -> u32 {
        self.state.lock().warm_ups
    }

    /// Run queued jobs: the 3D pass, then the 2D pass.
    ///
    /// Jobs may enqueue further work; it waits for the next frame.
    pub fn render_frame(&self) -> FrameStats {
        let jobs_3d = std::mem::take(&mut self.state.lock().queue_3d);
        let mut stats = FrameStats {
            jobs_3d: jobs_3d.len(),
            ..FrameStats::default()
        };
        for job in jobs_3d {
            job();
        }

        let jobs_2d = std::mem::take(&mut self.state.lock().queue_2d);
        stats.jobs_2d = jobs_2d.len();
        for job in jobs_2d {
            job();
        }

        log::trace!(
            "headless: frame ran {} 3D and {} 2D jobs",
            stats.jobs_3d,
            stats.jobs_2d
        );
        stats
    }
}

impl Host for HeadlessHost {
    fn graphics_device(&self) -> Option<Arc<dyn GraphicsDevice>> {
        self.device
            .as_ref()
            .map(|device| Arc::clone(device) as Arc<dyn GraphicsDevice>)
    }

    fn window_size(&self) -> Vec2 {
        self.state.lock().window
    }

    fn transform_2d(&self) -> Affine2 {
        self.state.lock().transform
    }

    fn camera(&self) -> CameraMatrices {
        self.state.lock().camera
    }

    fn enqueue_2d(&self, job: RenderJob) {
        self.state.lock().queue_2d.push(job);
    }

    fn enqueue_3d(&self, job: RenderJob) {
        self.state.lock().queue_3d.push(job);
    }

    fn warm_up(&self) {
        self.state.lock().warm_ups += 1;
    }
}
