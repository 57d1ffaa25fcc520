//! Process-wide effects runtime.
//!
//! [`FxRuntime::global`] builds the runtime on first use from the host given
//! to [`install_host`]. If that fails the runtime stays uninitialized for the
//! rest of the process and every dependent call degrades to an empty result.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use fx_runtime::{Effect, Manager, SharedManager, SharedRenderer};
use glam::Vec3;
use parking_lot::Mutex;

use crate::config::RuntimeConfig;
use crate::error::FxError;
use crate::handle::{EffectHandle, RenderMode};
use crate::host::Host;
use crate::scheduler::{FramePhase, FrameScheduler};

static HOST: OnceLock<(Arc<dyn Host>, RuntimeConfig)> = OnceLock::new();
static GLOBAL: OnceLock<FxRuntime> = OnceLock::new();

/// Register the host the global runtime binds to. Only the first call wins.
pub fn install_host(host: Arc<dyn Host>) -> Result<(), FxError> {
    install_host_with_config(host, RuntimeConfig::default())
}

pub fn install_host_with_config(host: Arc<dyn Host>, config: RuntimeConfig) -> Result<(), FxError> {
    HOST.set((host, config))
        .map_err(|_| FxError::HostAlreadyInstalled)
}

/// Per-frame hook for the global runtime. Call once per host tick.
pub fn update() {
    FxRuntime::global().begin_frame();
}

pub(crate) struct RuntimeCore {
    // Declared before `renderer` so the manager is released first.
    pub(crate) manager: SharedManager,
    pub(crate) renderer: SharedRenderer,
    pub(crate) host: Arc<dyn Host>,
    pub(crate) scheduler: FrameScheduler,
    pub(crate) config: RuntimeConfig,
    alive: AtomicBool,
}

impl RuntimeCore {
    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

/// Owner of the effects manager and renderer.
///
/// Cheap to clone; clones share one runtime. The default value is an
/// uninitialized runtime.
#[derive(Clone, Default)]
pub struct FxRuntime {
    core: Option<Arc<RuntimeCore>>,
}

impl FxRuntime {
    /// The process-wide runtime, created on first access.
    pub fn global() -> &'static FxRuntime {
        GLOBAL.get_or_init(|| match HOST.get() {
            Some((host, config)) => Self::with_config(Arc::clone(host), config.clone()),
            None => {
                log::error!("fx runtime: no host installed, effects are disabled");
                Self::default()
            }
        })
    }

    /// A private runtime bound to `host`, with default configuration.
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self::with_config(host, RuntimeConfig::default())
    }

    pub fn with_config(host: Arc<dyn Host>, config: RuntimeConfig) -> Self {
        match Self::init(Arc::clone(&host), config) {
            Ok(core) => {
                {
                    let renderer = core.renderer.lock();
                    log::info!(
                        "fx runtime: initialized ({} backend, {} instances max)",
                        renderer.backend(),
                        core.config.max_instances
                    );
                }
                host.warm_up();
                Self {
                    core: Some(Arc::new(core)),
                }
            }
            Err(e) => {
                log::error!("fx runtime: initialization failed: {}", e);
                Self::default()
            }
        }
    }

    fn init(host: Arc<dyn Host>, config: RuntimeConfig) -> Result<RuntimeCore, FxError> {
        let device = host.graphics_device().ok_or(FxError::NoGraphicsDevice)?;
        let renderer = device.create_renderer()?;

        let mut manager = Manager::new(config.max_instances);
        {
            let r = renderer.lock();
            manager.set_sprite_renderer(r.create_sprite_renderer());
            manager.set_ribbon_renderer(r.create_ribbon_renderer());
            manager.set_ring_renderer(r.create_ring_renderer());
            manager.set_track_renderer(r.create_track_renderer());
            manager.set_model_renderer(r.create_model_renderer());
            manager.set_texture_loader(r.create_texture_loader());
            manager.set_model_loader(r.create_model_loader());
        }
        manager.set_coordinate_system(config.coordinate_system);

        Ok(RuntimeCore {
            manager: Arc::new(Mutex::new(manager)),
            renderer,
            host,
            scheduler: FrameScheduler::new(),
            config,
            alive: AtomicBool::new(true),
        })
    }

    pub fn is_init(&self) -> bool {
        self.core().is_some()
    }

    pub(crate) fn core(&self) -> Option<&Arc<RuntimeCore>> {
        self.core.as_ref().filter(|core| core.is_alive())
    }

    /// Per-frame hook: schedule this frame's update flush and auto draws.
    pub fn begin_frame(&self) {
        if let Some(core) = self.core() {
            core.scheduler.begin_frame(core);
        }
    }

    /// Stop every instance and release the manager's renderers ahead of the
    /// renderer itself. The runtime reports uninitialized afterwards.
    pub fn shutdown(&self) {
        let Some(core) = &self.core else {
            return;
        };
        if !core.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        // Queued handles may be the last owners; drop them with no lock held.
        drop(core.scheduler.clear());
        {
            let mut manager = core.manager.lock();
            manager.stop_all_effects();
            manager.release_renderers();
        }
        log::info!("fx runtime: shut down");
    }

    pub fn phase(&self) -> FramePhase {
        self.core()
            .map_or(FramePhase::Idle, |core| core.scheduler.phase())
    }

    /// Frames begun since creation.
    pub fn frame(&self) -> u64 {
        self.core().map_or(0, |core| core.scheduler.frame())
    }

    pub fn config(&self) -> Option<&RuntimeConfig> {
        self.core().map(|core| &core.config)
    }

    pub fn manager(&self) -> Option<SharedManager> {
        self.core().map(|core| Arc::clone(&core.manager))
    }

    pub fn renderer(&self) -> Option<SharedRenderer> {
        self.core().map(|core| Arc::clone(&core.renderer))
    }

    pub(crate) fn load(&self, path: &Path) -> Result<Effect, FxError> {
        let core = self.core().ok_or(FxError::NotInitialized)?;
        let effect = core.manager.lock().load_effect(path)?;
        Ok(effect)
    }

    pub(crate) fn play(&self, effect: &Effect, pos: Vec3, mode: RenderMode) -> EffectHandle {
        let Some(core) = self.core() else {
            return EffectHandle::default();
        };
        let raw = core.manager.lock().play(effect, pos);
        match raw {
            Some(raw) => EffectHandle::new(core, raw, mode),
            None => EffectHandle::default(),
        }
    }
}
