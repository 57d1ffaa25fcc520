//! Shared handle to one playing effect instance.
//!
//! Clones refer to the same instance; when the last clone goes away the
//! instance is stopped. Every operation on an empty handle does nothing and
//! every query returns a neutral value.

use std::fmt;
use std::sync::{Arc, Weak};

use fx_runtime::{Handle, SharedManager};
use glam::{Quat, Vec2, Vec3};
use parking_lot::Mutex;

use crate::coords;
use crate::runtime::RuntimeCore;

/// Which host pass an instance is drawn in. Fixed when the instance starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Screen pixels, drawn in the host's 2D pass.
    Screen2D,
    /// World units, drawn in the host's 3D pass.
    World3D,
}

struct HandleState {
    rotation: Quat,
    speed: f32,
    auto_update: bool,
    auto_draw: bool,
}

pub(crate) struct HandleCore {
    pub(crate) raw: Handle,
    pub(crate) mode: RenderMode,
    manager: SharedManager,
    runtime: Weak<RuntimeCore>,
    state: Mutex<HandleState>,
}

impl Drop for HandleCore {
    fn drop(&mut self) {
        let mut manager = self.manager.lock();
        if manager.exists(self.raw) {
            manager.stop_effect(self.raw);
            log::trace!("fx handle {}: stopped on drop", self.raw.0);
        }
    }
}

/// Handle to a playing effect, created by
/// [`EffectAsset::play`](crate::EffectAsset::play) or
/// [`EffectAsset::play_2d`](crate::EffectAsset::play_2d).
#[derive(Clone, Default)]
pub struct EffectHandle {
    inner: Option<Arc<HandleCore>>,
}

impl fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(core) => f
                .debug_struct("EffectHandle")
                .field("raw", &core.raw)
                .field("mode", &core.mode)
                .finish(),
            None => f.write_str("EffectHandle(empty)"),
        }
    }
}

impl EffectHandle {
    pub(crate) fn new(runtime: &Arc<RuntimeCore>, raw: Handle, mode: RenderMode) -> Self {
        let core = Arc::new(HandleCore {
            raw,
            mode,
            manager: Arc::clone(&runtime.manager),
            runtime: Arc::downgrade(runtime),
            state: Mutex::new(HandleState {
                rotation: Quat::IDENTITY,
                speed: 1.0,
                auto_update: true,
                auto_draw: false,
            }),
        });
        {
            let mut manager = core.manager.lock();
            manager.set_paused(raw, false);
            manager.set_auto_drawing(raw, false);
        }
        Self { inner: Some(core) }
    }

    /// Live runtime behind this handle, if it has not been shut down.
    fn runtime(&self) -> Option<(&Arc<HandleCore>, Arc<RuntimeCore>)> {
        let core = self.inner.as_ref()?;
        let runtime = core.runtime.upgrade().filter(|rt| rt.is_alive())?;
        Some((core, runtime))
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// Whether the runtime still has the instance.
    pub fn is_alive(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|core| core.manager.lock().exists(core.raw))
    }

    /// Runtime handle of the instance.
    pub fn raw(&self) -> Option<Handle> {
        self.inner.as_ref().map(|core| core.raw)
    }

    pub fn mode(&self) -> Option<RenderMode> {
        self.inner.as_ref().map(|core| core.mode)
    }

    /// Let the per-frame hook advance this instance by one frame. Turning it
    /// off pauses the instance; explicit [`update`](Self::update) calls still
    /// advance it.
    pub fn set_auto_update(&self, auto_update: bool) {
        let Some(core) = &self.inner else {
            return;
        };
        core.state.lock().auto_update = auto_update;
        core.manager.lock().set_paused(core.raw, !auto_update);
    }

    pub fn is_auto_update(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|core| core.state.lock().auto_update)
    }

    /// Draw this instance every frame without calling [`draw`](Self::draw).
    pub fn set_auto_draw(&self, auto_draw: bool) {
        let Some(core) = &self.inner else {
            return;
        };
        core.state.lock().auto_draw = auto_draw;
        core.manager.lock().set_auto_drawing(core.raw, auto_draw);
        if let Some(runtime) = core.runtime.upgrade() {
            if auto_draw {
                runtime.scheduler.register_auto_draw(core);
            } else {
                runtime.scheduler.unregister_auto_draw(core);
            }
        }
    }

    pub fn is_auto_draw(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|core| core.state.lock().auto_draw)
    }

    /// Advance by `delta_seconds` when this frame's batch is applied.
    ///
    /// Adds to auto-update: with auto-update on, two calls in one frame
    /// advance the instance three frames.
    pub fn update(&self, delta_seconds: f32) {
        if let Some((core, runtime)) = self.runtime() {
            runtime.scheduler.push_update(Arc::clone(core), delta_seconds);
        }
    }

    /// Advance by one frame (1/60 s).
    pub fn update_default(&self) {
        self.update(1.0 / 60.0);
    }

    /// Queue one draw in the host pass matching this handle's mode.
    ///
    /// Adds to auto-draw: an auto-drawn handle drawn explicitly is drawn twice.
    pub fn draw(&self) {
        if let Some((core, runtime)) = self.runtime() {
            runtime.scheduler.enqueue_draw(&runtime, core);
        }
    }

    pub fn set_speed(&self, speed: f32) {
        let Some(core) = &self.inner else {
            return;
        };
        core.state.lock().speed = speed;
        core.manager.lock().set_speed(core.raw, speed);
    }

    /// Playback speed; 0.0 for an empty handle.
    pub fn speed(&self) -> f32 {
        self.inner
            .as_ref()
            .map_or(0.0, |core| core.state.lock().speed)
    }

    /// Replace the rotation. Resets the instance's scale to one.
    pub fn set_angle(&self, rotation: Quat) {
        let Some(core) = &self.inner else {
            return;
        };
        core.state.lock().rotation = rotation;
        let (axis, angle) = rotation.to_axis_angle();
        let mut manager = core.manager.lock();
        manager.set_scale(core.raw, Vec3::ONE);
        manager.set_rotation(core.raw, axis, angle);
    }

    /// Compose `rotation` after the current one.
    pub fn rotate_by(&self, rotation: Quat) {
        if self.inner.is_some() {
            self.set_angle(self.angle() * rotation);
        }
    }

    /// Last rotation set; identity for an empty handle.
    pub fn angle(&self) -> Quat {
        self.inner
            .as_ref()
            .map_or(Quat::IDENTITY, |core| core.state.lock().rotation)
    }

    /// Move to `pos`. Screen handles read `x`/`y` as pixels and `z` as depth.
    pub fn set_pos(&self, pos: Vec3) {
        let Some(core) = &self.inner else {
            return;
        };
        let location = Self::to_world(core.mode, pos);
        core.manager.lock().set_location(core.raw, location);
    }

    pub fn set_pos_2d(&self, pos: Vec2, z: f32) {
        self.set_pos(pos.extend(z));
    }

    /// Offset the position, in the same units as [`set_pos`](Self::set_pos).
    pub fn move_by(&self, delta: Vec3) {
        let Some(core) = &self.inner else {
            return;
        };
        let delta = Self::to_world(core.mode, delta);
        core.manager.lock().add_location(core.raw, delta);
    }

    pub fn move_by_2d(&self, delta: Vec2, z: f32) {
        self.move_by(delta.extend(z));
    }

    /// Current position in the units [`set_pos`](Self::set_pos) takes.
    /// Zero for an empty handle or a finished instance.
    pub fn pos(&self) -> Vec3 {
        let Some(core) = &self.inner else {
            return Vec3::ZERO;
        };
        let Some(location) = core.manager.lock().location(core.raw) else {
            return Vec3::ZERO;
        };
        match core.mode {
            RenderMode::Screen2D => coords::pos3d_to_pos(location).extend(location.z),
            RenderMode::World3D => location,
        }
    }

    fn to_world(mode: RenderMode, pos: Vec3) -> Vec3 {
        match mode {
            RenderMode::Screen2D => coords::pos_to_pos3d(pos.truncate(), pos.z),
            RenderMode::World3D => pos,
        }
    }
}
