//! Bridge between a particle effects runtime and a host engine's frame loop.
//!
//! Install a [`Host`] once, call [`update`] every tick, and play effects
//! through [`EffectAsset`]:
//!
//! ```ignore
//! fx_bridge::install_host(host)?;
//! let spark = EffectAsset::open("assets/spark.efx.json");
//! let mut pool = EffectPool::new();
//! loop {
//!     fx_bridge::update();
//!     if clicked {
//!         pool.add(spark.play_2d(cursor, DEFAULT_DEPTH_2D));
//!     }
//!     pool.update();
//!     host.present();
//! }
//! ```

pub mod coords;
pub mod config;
pub mod error;
pub mod host;
#[cfg(feature = "headless")]
pub mod headless;
pub mod runtime;
pub mod scheduler;
pub mod handle;
pub mod asset;
pub mod pool;

// Re-export key types at crate root for convenience
pub use config::RuntimeConfig;
pub use error::FxError;
pub use host::{Host, GraphicsDevice, CameraMatrices, RenderJob};
#[cfg(feature = "headless")]
pub use headless::{HeadlessHost, HeadlessDevice, FrameStats};
pub use runtime::{FxRuntime, install_host, install_host_with_config, update};
pub use scheduler::FramePhase;
pub use handle::{EffectHandle, RenderMode};
pub use asset::{EffectAsset, DEFAULT_DEPTH_2D};
pub use pool::EffectPool;
