//! Three seconds of a headless scene: left clicks spawn a screen-space
//! effect at the cursor, right clicks spawn one at the world origin.

use std::path::PathBuf;
use std::sync::Arc;

use fx_bridge::{
    install_host, CameraMatrices, EffectAsset, EffectPool, FxRuntime, HeadlessHost, Host,
    DEFAULT_DEPTH_2D,
};
use glam::{Mat4, Vec2, Vec3};

const WIDTH: f32 = 800.0;
const HEIGHT: f32 = 600.0;
const FRAMES: u32 = 180;

enum Click {
    Left(Vec2),
    Right,
}

/// Scripted input: a click every 20 frames, alternating buttons.
fn click_at(frame: u32) -> Option<Click> {
    if frame % 20 != 0 {
        return None;
    }
    if (frame / 20) % 2 == 0 {
        let t = frame as f32 / FRAMES as f32;
        Some(Click::Left(Vec2::new(WIDTH * t, HEIGHT * (1.0 - t))))
    } else {
        Some(Click::Right)
    }
}

fn orbit_camera(frame: u32) -> CameraMatrices {
    let angle = frame as f32 * 0.01;
    let eye = Vec3::new(angle.sin() * 10.0, 4.0, -angle.cos() * 10.0);
    CameraMatrices {
        view: Mat4::look_at_lh(eye, Vec3::ZERO, Vec3::Y),
        projection: Mat4::perspective_lh(45f32.to_radians(), WIDTH / HEIGHT, 0.1, 100.0),
    }
}

fn main() {
    env_logger::init();

    let host = Arc::new(HeadlessHost::new(WIDTH, HEIGHT));
    if let Err(e) = install_host(Arc::clone(&host) as Arc<dyn Host>) {
        log::error!("fx-demo: {}", e);
        return;
    }

    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/spark.efx.json");
    let spark = EffectAsset::open(&path);
    if spark.is_empty() {
        log::error!("fx-demo: could not load {}", path.display());
        return;
    }

    let runtime = FxRuntime::global();
    let log = host.draw_log();
    let mut pool = EffectPool::new();

    for frame in 0..FRAMES {
        fx_bridge::update();
        host.set_camera(orbit_camera(frame));

        pool.update();
        match click_at(frame) {
            Some(Click::Left(cursor)) => pool.add(spark.play_2d(cursor, DEFAULT_DEPTH_2D)),
            Some(Click::Right) => pool.add(spark.play(Vec3::ZERO)),
            None => {}
        }

        let stats = host.render_frame();
        let drawn = log.take().len();
        if frame % 30 == 0 {
            log::info!(
                "frame {:3}: {} effects, {} particles drawn, {} 3D / {} 2D jobs",
                frame,
                pool.len(),
                drawn,
                stats.jobs_3d,
                stats.jobs_2d
            );
        }
    }

    if let Some(manager) = runtime.manager() {
        let stats = manager.lock().stats();
        log::info!(
            "fx-demo: {} played, {} finished, {} stopped",
            stats.played,
            stats.finished,
            stats.stopped
        );
    }

    pool.clear();
    runtime.shutdown();
}
