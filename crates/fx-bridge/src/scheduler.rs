//! Per-frame batching of handle updates and draws.
//!
//! Updates requested during a tick are collected and applied by one job in
//! the host's 3D queue, which also runs the runtime's global update. Draws
//! go straight into the host queue matching the handle's mode, capturing
//! the host's 2D transform or 3D camera at the moment they are requested.

use std::sync::{Arc, Weak};

use fx_runtime::{Handle, Matrix43, SharedManager, SharedRenderer};
use glam::Vec2;
use parking_lot::Mutex;

use crate::coords;
use crate::handle::{HandleCore, RenderMode};
use crate::host::CameraMatrices;
use crate::runtime::RuntimeCore;

/// Where the scheduler is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePhase {
    /// No frame begun yet, or the runtime was shut down.
    #[default]
    Idle,
    /// The hook ran; the update flush is queued and updates still accumulate.
    CollectingUpdates,
    /// Auto draws are queued; explicit draws may still be added.
    CollectingDraws,
    /// The update batch was applied.
    Flushed,
}

struct SchedulerState {
    phase: FramePhase,
    frame: u64,
    updates: Vec<(Arc<HandleCore>, f32)>,
    auto_draw: Vec<Weak<HandleCore>>,
}

/// Batches queued by handles, drained once per frame.
pub(crate) struct FrameScheduler {
    state: Mutex<SchedulerState>,
}

/// Queued work released by [`FrameScheduler::clear`].
pub(crate) type Dropped = Vec<(Arc<HandleCore>, f32)>;

impl FrameScheduler {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                phase: FramePhase::Idle,
                frame: 0,
                updates: Vec::new(),
                auto_draw: Vec::new(),
            }),
        }
    }

    pub fn phase(&self) -> FramePhase {
        self.state.lock().phase
    }

    pub fn frame(&self) -> u64 {
        self.state.lock().frame
    }

    /// Queue `delta_seconds` of playback for `handle` in this frame's batch.
    pub fn push_update(&self, handle: Arc<HandleCore>, delta_seconds: f32) {
        self.state.lock().updates.push((handle, delta_seconds));
    }

    #[cfg(test)]
    pub fn pending_updates(&self) -> usize {
        self.state.lock().updates.len()
    }

    pub fn register_auto_draw(&self, handle: &Arc<HandleCore>) {
        let mut state = self.state.lock();
        let weak = Arc::downgrade(handle);
        if !state.auto_draw.iter().any(|w| w.ptr_eq(&weak)) {
            state.auto_draw.push(weak);
        }
    }

    pub fn unregister_auto_draw(&self, handle: &Arc<HandleCore>) {
        let weak = Arc::downgrade(handle);
        self.state.lock().auto_draw.retain(|w| !w.ptr_eq(&weak));
    }

    /// Forget queued work and return to idle. The caller drops the result
    /// once no lock is held.
    #[must_use]
    pub fn clear(&self) -> Dropped {
        let mut state = self.state.lock();
        state.phase = FramePhase::Idle;
        state.auto_draw.clear();
        std::mem::take(&mut state.updates)
    }

    /// The per-frame hook.
    pub fn begin_frame(&self, core: &Arc<RuntimeCore>) {
        {
            let mut state = self.state.lock();
            if state.phase == FramePhase::CollectingDraws {
                log::debug!("fx scheduler: frame {} was never flushed", state.frame);
            }
            state.frame += 1;
            state.phase = FramePhase::CollectingUpdates;
            log::trace!("fx scheduler: frame {} collecting updates", state.frame);
        }

        let weak = Arc::downgrade(core);
        core.host.enqueue_3d(Box::new(move || {
            if let Some(core) = weak.upgrade() {
                core.scheduler.flush_updates(&core);
            }
        }));

        let auto_draw: Vec<Arc<HandleCore>> = {
            let mut state = self.state.lock();
            state.auto_draw.retain(|w| w.strong_count() > 0);
            state.auto_draw.iter().filter_map(Weak::upgrade).collect()
        };
        let (live, finished): (Vec<_>, Vec<_>) = {
            let manager = core.manager.lock();
            auto_draw
                .into_iter()
                .partition(|handle| manager.exists(handle.raw))
        };
        for handle in &live {
            self.enqueue_draw(core, handle);
        }

        {
            let mut state = self.state.lock();
            state
                .auto_draw
                .retain(|w| !finished.iter().any(|h| w.ptr_eq(&Arc::downgrade(h))));
            state.phase = FramePhase::CollectingDraws;
        }
        // Upgraded handles may be the last owners now.
        drop(live);
        drop(finished);
    }

    /// Apply the batch. Runs inside the host's 3D pass.
    fn flush_updates(&self, core: &RuntimeCore) {
        let updates = std::mem::take(&mut self.state.lock().updates);
        if core.is_alive() {
            let mut manager = core.manager.lock();
            manager.begin_update();
            for (handle, delta) in &updates {
                manager.update_handle(handle.raw, core.config.seconds_to_frames(*delta));
            }
            manager.end_update();
            manager.update(1.0);
        }
        let count = updates.len();
        drop(updates);

        let mut state = self.state.lock();
        state.phase = FramePhase::Flushed;
        log::trace!(
            "fx scheduler: frame {} flushed {} handle updates",
            state.frame,
            count
        );
    }

    /// Queue one draw of `handle` into the host queue for its mode.
    pub fn enqueue_draw(&self, core: &RuntimeCore, handle: &Arc<HandleCore>) {
        let job_handle = Arc::clone(handle);
        let manager = Arc::clone(&core.manager);
        let renderer = Arc::clone(&core.renderer);

        match handle.mode {
            RenderMode::Screen2D => {
                let window = core.host.window_size();
                let base = coords::to_effect_transform(&core.host.transform_2d());
                core.host.enqueue_2d(Box::new(move || {
                    draw_2d(&manager, &renderer, job_handle.raw, window, base);
                    drop(job_handle);
                }));
            }
            RenderMode::World3D => {
                let camera = core.host.camera();
                core.host.enqueue_3d(Box::new(move || {
                    draw_3d(&manager, &renderer, job_handle.raw, camera);
                    drop(job_handle);
                }));
            }
        }
    }
}

fn draw_2d(
    manager: &SharedManager,
    renderer: &SharedRenderer,
    raw: Handle,
    window: Vec2,
    base: Matrix43,
) {
    {
        let mut r = renderer.lock();
        r.set_camera_matrix(coords::view_2d(window));
        r.set_projection_matrix(coords::projection_2d(window));
        if !r.begin_rendering() {
            return;
        }
    }
    {
        let mut m = manager.lock();
        m.set_base_matrix(raw, base);
        m.begin_update();
        m.update_handle(raw, 0.0);
        m.end_update();
        m.draw_handle(raw);
    }
    renderer.lock().end_rendering();
}

fn draw_3d(manager: &SharedManager, renderer: &SharedRenderer, raw: Handle, camera: CameraMatrices) {
    {
        let mut r = renderer.lock();
        r.set_camera_matrix(coords::to_effect_matrix(&camera.view));
        r.set_projection_matrix(coords::to_effect_matrix(&camera.projection));
        if !r.begin_rendering() {
            return;
        }
    }
    manager.lock().draw_handle(raw);
    renderer.lock().end_rendering();
}

#[cfg(all(test, feature = "headless"))]
mod tests {
    use super::*;
    use crate::asset::EffectAsset;
    use crate::runtime::testing::*;
    use glam::{Affine2, Mat4, Vec3};

    #[test]
    fn phases_follow_the_frame() {
        let (host, rt) = runtime(800.0, 600.0);
        assert_eq!(rt.phase(), FramePhase::Idle);
        rt.begin_frame();
        assert_eq!(rt.phase(), FramePhase::CollectingDraws);
        host.render_frame();
        assert_eq!(rt.phase(), FramePhase::Flushed);
        rt.begin_frame();
        assert_eq!(rt.frame(), 2);
    }

    #[test]
    fn updates_are_applied_once_then_cleared() {
        let (host, rt) = runtime(800.0, 600.0);
        let asset = EffectAsset::open_in(&rt, effect_file(LONG_BURST));
        let fx = asset.play(Vec3::ZERO);
        fx.set_auto_update(false);
        fx.update_default();
        let core = rt.core().unwrap();
        assert_eq!(core.scheduler.pending_updates(), 1);

        rt.begin_frame();
        host.render_frame();
        assert_eq!(core.scheduler.pending_updates(), 0);
        let manager = rt.manager().unwrap();
        let time = manager.lock().instance_time(fx.raw().unwrap()).unwrap();
        assert!((time - 1.0).abs() < 1e-5, "time was {}", time);

        rt.begin_frame();
        host.render_frame();
        let time = manager.lock().instance_time(fx.raw().unwrap()).unwrap();
        assert!((time - 1.0).abs() < 1e-5, "paused handle advanced to {}", time);
    }

    #[test]
    fn update_of_a_dropped_handle_still_flushes() {
        let (host, rt) = runtime(800.0, 600.0);
        let asset = EffectAsset::open_in(&rt, effect_file(LONG_BURST));
        let fx = asset.play(Vec3::ZERO);
        fx.update_default();
        let raw = fx.raw().unwrap();
        drop(fx);

        let manager = rt.manager().unwrap();
        assert!(manager.lock().exists(raw), "queued update keeps the handle alive");
        rt.begin_frame();
        host.render_frame();
        assert!(!manager.lock().exists(raw), "stopped once the batch released it");
        assert_eq!(manager.lock().stats().stopped, 1);
    }

    #[test]
    fn screen_draw_uses_pixel_projection() {
        let (host, rt) = runtime(800.0, 600.0);
        let asset = EffectAsset::open_in(
            &rt,
            effect_file(r#"{ "duration": 1, "nodes": [ { "count": 1, "lifetime": 100 } ] }"#),
        );
        let fx = asset.play_2d(Vec2::new(100.0, 50.0), 1.0);
        rt.begin_frame();
        fx.draw();
        host.render_frame();

        let verts = host.draw_log().vertices();
        assert_eq!(verts.len(), 1);
        let [x, y, _] = verts[0].ndc();
        assert!((x + 0.75).abs() < 1e-4, "x was {}", x);
        assert!((y - 500.0 / 600.0).abs() < 1e-4, "y was {}", y);
    }

    #[test]
    fn screen_draw_captures_transform_at_enqueue_time() {
        let (host, rt) = runtime(800.0, 600.0);
        let asset = EffectAsset::open_in(
            &rt,
            effect_file(r#"{ "duration": 1, "nodes": [ { "count": 1, "lifetime": 100 } ] }"#),
        );
        let fx = asset.play_2d(Vec2::ZERO, 1.0);
        host.set_transform_2d(Affine2::from_translation(Vec2::new(400.0, 300.0)));
        fx.draw();
        host.set_transform_2d(Affine2::IDENTITY);
        rt.begin_frame();
        host.render_frame();

        let [x, y, _] = host.draw_log().vertices()[0].ndc();
        assert!(x.abs() < 1e-4 && y.abs() < 1e-4, "expected window center, got {} {}", x, y);
    }

    #[test]
    fn world_draw_uses_host_camera() {
        let (host, rt) = runtime(800.0, 600.0);
        host.set_camera(CameraMatrices {
            view: Mat4::from_translation(Vec3::new(-2.0, 0.0, 0.0)),
            projection: Mat4::from_scale(Vec3::new(0.5, 0.5, 1.0)),
        });
        let asset = EffectAsset::open_in(
            &rt,
            effect_file(r#"{ "duration": 1, "nodes": [ { "count": 1, "lifetime": 100 } ] }"#),
        );
        let fx = asset.play(Vec3::new(4.0, 2.0, 0.0));
        rt.begin_frame();
        fx.draw();
        host.render_frame();

        let [x, y, _] = host.draw_log().vertices()[0].ndc();
        assert!((x - 1.0).abs() < 1e-5, "x was {}", x);
        assert!((y - 1.0).abs() < 1e-5, "y was {}", y);
        assert_eq!(host.draw_log().passes(), 1);
    }

    #[test]
    fn auto_draw_handles_are_drawn_every_frame() {
        let (host, rt) = runtime(800.0, 600.0);
        let asset = EffectAsset::open_in(&rt, effect_file(LONG_BURST));
        let fx = asset.play(Vec3::ZERO);
        fx.set_auto_draw(true);

        for _ in 0..3 {
            rt.begin_frame();
            host.render_frame();
        }
        assert_eq!(host.draw_log().passes(), 3);
        assert_eq!(host.draw_log().count_for(fx.raw().unwrap()), 30);

        fx.set_auto_draw(false);
        rt.begin_frame();
        host.render_frame();
        assert_eq!(host.draw_log().passes(), 3);
    }

    #[test]
    fn auto_draw_registry_does_not_keep_handles_alive() {
        let (host, rt) = runtime(800.0, 600.0);
        let asset = EffectAsset::open_in(&rt, effect_file(LONG_BURST));
        let fx = asset.play(Vec3::ZERO);
        fx.set_auto_draw(true);
        let raw = fx.raw().unwrap();
        drop(fx);

        let manager = rt.manager().unwrap();
        assert!(!manager.lock().exists(raw));
        rt.begin_frame();
        host.render_frame();
        assert!(host.draw_log().is_empty());
    }

    #[test]
    fn finished_auto_draw_handles_stop_opening_passes() {
        let (host, rt) = runtime(800.0, 600.0);
        let asset = EffectAsset::open_in(&rt, effect_file(SHORT_BURST));
        let fx = asset.play(Vec3::ZERO);
        fx.set_auto_draw(true);

        for _ in 0..10 {
            rt.begin_frame();
            host.render_frame();
        }
        assert!(!fx.is_alive());
        let passes = host.draw_log().passes();
        assert!(passes < 10, "{} passes for a finished instance", passes);

        for _ in 0..5 {
            rt.begin_frame();
            host.render_frame();
        }
        assert_eq!(host.draw_log().passes(), passes);
        assert!(fx.is_auto_draw(), "the handle keeps its flag");
    }
}
