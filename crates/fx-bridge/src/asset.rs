use std::path::{Path, PathBuf};

use fx_runtime::Effect;
use glam::{Vec2, Vec3};

use crate::coords;
use crate::error::FxError;
use crate::handle::{EffectHandle, RenderMode};
use crate::runtime::FxRuntime;

/// Default depth for screen-space playback.
pub const DEFAULT_DEPTH_2D: f32 = 1.0;

/// A loaded effect template. Plays any number of instances.
///
/// Opening never fails loudly: an asset that could not be loaded is empty
/// and plays empty handles. Use [`try_open`](Self::try_open) to see why.
#[derive(Clone, Default)]
pub struct EffectAsset {
    runtime: FxRuntime,
    effect: Option<Effect>,
    path: PathBuf,
}

impl EffectAsset {
    /// Load from `path` into the global runtime.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::open_in(FxRuntime::global(), path)
    }

    pub fn open_in(runtime: &FxRuntime, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::try_open_in(runtime, path).unwrap_or_else(|e| {
            log::warn!("fx asset: {} not loaded: {}", path.display(), e);
            Self {
                runtime: runtime.clone(),
                effect: None,
                path: path.to_path_buf(),
            }
        })
    }

    pub fn try_open(path: impl AsRef<Path>) -> Result<Self, FxError> {
        Self::try_open_in(FxRuntime::global(), path)
    }

    pub fn try_open_in(runtime: &FxRuntime, path: impl AsRef<Path>) -> Result<Self, FxError> {
        let path = path.as_ref();
        let effect = runtime.load(path)?;
        log::debug!("fx asset: loaded '{}' from {}", effect.name(), path.display());
        Ok(Self {
            runtime: runtime.clone(),
            effect: Some(effect),
            path: path.to_path_buf(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.effect.is_none()
    }

    /// Path the asset was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn effect(&self) -> Option<&Effect> {
        self.effect.as_ref()
    }

    /// Start a world-space instance at `pos`.
    pub fn play(&self, pos: Vec3) -> EffectHandle {
        match &self.effect {
            Some(effect) => self.runtime.play(effect, pos, RenderMode::World3D),
            None => EffectHandle::default(),
        }
    }

    /// Start a screen-space instance at pixel `pos` and depth `z`.
    pub fn play_2d(&self, pos: Vec2, z: f32) -> EffectHandle {
        match &self.effect {
            Some(effect) => {
                self.runtime
                    .play(effect, coords::pos_to_pos3d(pos, z), RenderMode::Screen2D)
            }
            None => EffectHandle::default(),
        }
    }
}
