use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use glam::Vec3;
use parking_lot::Mutex;

use crate::effect::{Effect, EffectDef, Loaders, NodeKind};
use crate::error::RuntimeError;
use crate::instance::Instance;
use crate::math::{CoordinateSystem, Matrix43};
use crate::renderer::{ModelLoader, NodeDraw, NodeRenderer, TextureLoader};

/// Default instance capacity of a manager.
pub const DEFAULT_MAX_INSTANCES: usize = 1024 * 10;

/// Opaque identifier of one playing instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub i32);

/// Manager shared between the runtime owner and every live effect handle.
pub type SharedManager = Arc<Mutex<Manager>>;

/// Lifetime counters, mostly for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerStats {
    pub played: u64,
    /// Instances removed by `stop_effect`/`stop_all_effects`.
    pub stopped: u64,
    /// Instances removed because they ran to completion.
    pub finished: u64,
}

#[derive(Default)]
struct NodeRenderers {
    sprite: Option<Box<dyn NodeRenderer>>,
    ribbon: Option<Box<dyn NodeRenderer>>,
    ring: Option<Box<dyn NodeRenderer>>,
    track: Option<Box<dyn NodeRenderer>>,
    model: Option<Box<dyn NodeRenderer>>,
}

impl NodeRenderers {
    fn get_mut(&mut self, kind: NodeKind) -> Option<&mut (dyn NodeRenderer + 'static)> {
        let slot = match kind {
            NodeKind::Sprite => &mut self.sprite,
            NodeKind::Ribbon => &mut self.ribbon,
            NodeKind::Ring => &mut self.ring,
            NodeKind::Track => &mut self.track,
            NodeKind::Model => &mut self.model,
        };
        slot.as_deref_mut()
    }
}

/// Owns every playing instance and drives simulation and drawing.
pub struct Manager {
    capacity: usize,
    instances: BTreeMap<Handle, Instance>,
    next_handle: i32,
    coordinate_system: CoordinateSystem,
    renderers: NodeRenderers,
    texture_loader: Option<Box<dyn TextureLoader>>,
    model_loader: Option<Box<dyn ModelLoader>>,
    in_update: bool,
    stats: ManagerStats,
}

impl Manager {
    /// Create a manager that holds at most `capacity` instances at once.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            instances: BTreeMap::new(),
            next_handle: 0,
            coordinate_system: CoordinateSystem::default(),
            renderers: NodeRenderers::default(),
            texture_loader: None,
            model_loader: None,
            in_update: false,
            stats: ManagerStats::default(),
        }
    }

    // -- Wiring --

    pub fn set_sprite_renderer(&mut self, renderer: Box<dyn NodeRenderer>) {
        self.renderers.sprite = Some(renderer);
    }

    pub fn set_ribbon_renderer(&mut self, renderer: Box<dyn NodeRenderer>) {
        self.renderers.ribbon = Some(renderer);
    }

    pub fn set_ring_renderer(&mut self, renderer: Box<dyn NodeRenderer>) {
        self.renderers.ring = Some(renderer);
    }

    pub fn set_track_renderer(&mut self, renderer: Box<dyn NodeRenderer>) {
        self.renderers.track = Some(renderer);
    }

    pub fn set_model_renderer(&mut self, renderer: Box<dyn NodeRenderer>) {
        self.renderers.model = Some(renderer);
    }

    pub fn set_texture_loader(&mut self, loader: Box<dyn TextureLoader>) {
        self.texture_loader = Some(loader);
    }

    pub fn set_model_loader(&mut self, loader: Box<dyn ModelLoader>) {
        self.model_loader = Some(loader);
    }

    /// Drop node renderers and loaders so the renderer that made them can go.
    pub fn release_renderers(&mut self) {
        self.renderers = NodeRenderers::default();
        self.texture_loader = None;
        self.model_loader = None;
    }

    pub fn set_coordinate_system(&mut self, system: CoordinateSystem) {
        self.coordinate_system = system;
    }

    pub fn coordinate_system(&self) -> CoordinateSystem {
        self.coordinate_system
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn stats(&self) -> ManagerStats {
        self.stats
    }

    // -- Effects --

    /// Load and compile an effect file.
    pub fn load_effect(&mut self, path: &Path) -> Result<Effect, RuntimeError> {
        let json = std::fs::read_to_string(path).map_err(|source| RuntimeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let def = EffectDef::from_json(&json).map_err(|source| RuntimeError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        self.compile_effect(def, Some(path))
    }

    /// Compile an in-memory effect definition. `origin` anchors relative resource paths.
    pub fn compile_effect(
        &mut self,
        def: EffectDef,
        origin: Option<&Path>,
    ) -> Result<Effect, RuntimeError> {
        let loaders = Loaders {
            textures: self.texture_loader.as_deref_mut(),
            models: self.model_loader.as_deref_mut(),
        };
        Effect::compile(def, origin, self.coordinate_system, loaders)
    }

    /// Start a new instance at `position`. `None` when the manager is full.
    pub fn play(&mut self, effect: &Effect, position: Vec3) -> Option<Handle> {
        if self.instances.len() >= self.capacity {
            log::warn!(
                "manager: capacity of {} instances reached, '{}' not started",
                self.capacity,
                effect.name()
            );
            return None;
        }
        let handle = self.next_free_handle();
        let seed = (handle.0 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ 0x5DEE_CE66;
        self.instances
            .insert(handle, Instance::new(effect.clone(), position, seed));
        self.stats.played += 1;
        Some(handle)
    }

    /// Ids wrap to 0 after `i32::MAX`, skipping ones still in use.
    fn next_free_handle(&mut self) -> Handle {
        loop {
            let handle = Handle(self.next_handle);
            self.next_handle = self.next_handle.checked_add(1).unwrap_or(0);
            if !self.instances.contains_key(&handle) {
                return handle;
            }
        }
    }

    pub fn exists(&self, handle: Handle) -> bool {
        self.instances.contains_key(&handle)
    }

    /// Remove an instance immediately. Unknown handles are ignored.
    pub fn stop_effect(&mut self, handle: Handle) {
        if self.instances.remove(&handle).is_some() {
            self.stats.stopped += 1;
        }
    }

    pub fn stop_all_effects(&mut self) {
        self.stats.stopped += self.instances.len() as u64;
        self.instances.clear();
    }

    // -- Per-instance state --

    pub fn set_location(&mut self, handle: Handle, location: Vec3) {
        if let Some(inst) = self.instances.get_mut(&handle) {
            inst.location = location;
        }
    }

    pub fn add_location(&mut self, handle: Handle, delta: Vec3) {
        if let Some(inst) = self.instances.get_mut(&handle) {
            inst.location += delta;
        }
    }

    pub fn location(&self, handle: Handle) -> Option<Vec3> {
        self.instances.get(&handle).map(|i| i.location)
    }

    pub fn set_rotation(&mut self, handle: Handle, axis: Vec3, angle: f32) {
        if let Some(inst) = self.instances.get_mut(&handle) {
            inst.rotation_axis = axis;
            inst.rotation_angle = angle;
        }
    }

    /// Axis and angle in radians.
    pub fn rotation(&self, handle: Handle) -> Option<(Vec3, f32)> {
        self.instances
            .get(&handle)
            .map(|i| (i.rotation_axis, i.rotation_angle))
    }

    pub fn set_scale(&mut self, handle: Handle, scale: Vec3) {
        if let Some(inst) = self.instances.get_mut(&handle) {
            inst.scale = scale;
        }
    }

    pub fn scale(&self, handle: Handle) -> Option<Vec3> {
        self.instances.get(&handle).map(|i| i.scale)
    }

    pub fn set_base_matrix(&mut self, handle: Handle, base: Matrix43) {
        if let Some(inst) = self.instances.get_mut(&handle) {
            inst.base = base;
        }
    }

    pub fn set_speed(&mut self, handle: Handle, speed: f32) {
        if let Some(inst) = self.instances.get_mut(&handle) {
            inst.speed = speed;
        }
    }

    pub fn speed(&self, handle: Handle) -> Option<f32> {
        self.instances.get(&handle).map(|i| i.speed)
    }

    /// Paused instances are skipped by [`update`](Self::update) but still
    /// advance through [`update_handle`](Self::update_handle).
    pub fn set_paused(&mut self, handle: Handle, paused: bool) {
        if let Some(inst) = self.instances.get_mut(&handle) {
            inst.paused = paused;
        }
    }

    pub fn is_paused(&self, handle: Handle) -> bool {
        self.instances.get(&handle).is_some_and(|i| i.paused)
    }

    pub fn set_shown(&mut self, handle: Handle, shown: bool) {
        if let Some(inst) = self.instances.get_mut(&handle) {
            inst.shown = shown;
        }
    }

    /// Whether [`draw`](Self::draw) includes this instance.
    pub fn set_auto_drawing(&mut self, handle: Handle, auto_draw: bool) {
        if let Some(inst) = self.instances.get_mut(&handle) {
            inst.auto_draw = auto_draw;
        }
    }

    pub fn is_auto_drawing(&self, handle: Handle) -> bool {
        self.instances.get(&handle).is_some_and(|i| i.auto_draw)
    }

    /// Frames of playback elapsed for an instance.
    pub fn instance_time(&self, handle: Handle) -> Option<f32> {
        self.instances.get(&handle).map(|i| i.time())
    }

    pub fn particle_count(&self, handle: Handle) -> usize {
        self.instances.get(&handle).map_or(0, |i| i.particles().len())
    }

    // -- Simulation --

    /// Open an update batch; finished instances are swept at `end_update`.
    pub fn begin_update(&mut self) {
        self.in_update = true;
    }

    /// Advance one instance by `frames`, paused or not.
    pub fn update_handle(&mut self, handle: Handle, frames: f32) {
        if let Some(inst) = self.instances.get_mut(&handle) {
            inst.advance(frames);
        }
        if !self.in_update {
            self.sweep_finished();
        }
    }

    pub fn end_update(&mut self) {
        self.in_update = false;
        self.sweep_finished();
    }

    /// Advance every unpaused instance by `frames`.
    pub fn update(&mut self, frames: f32) {
        self.begin_update();
        for inst in self.instances.values_mut().filter(|i| !i.paused) {
            inst.advance(frames);
        }
        self.end_update();
    }

    fn sweep_finished(&mut self) {
        let before = self.instances.len();
        self.instances.retain(|_, inst| !inst.is_finished());
        self.stats.finished += (before - self.instances.len()) as u64;
    }

    // -- Drawing --

    /// Draw every shown instance flagged for auto drawing.
    pub fn draw(&mut self) {
        for (handle, inst) in &self.instances {
            if inst.auto_draw {
                Self::render_instance(&mut self.renderers, *handle, inst);
            }
        }
    }

    /// Draw a single instance regardless of its auto-draw flag.
    pub fn draw_handle(&mut self, handle: Handle) {
        if let Some(inst) = self.instances.get(&handle) {
            Self::render_instance(&mut self.renderers, handle, inst);
        }
    }

    fn render_instance(renderers: &mut NodeRenderers, handle: Handle, inst: &Instance) {
        if !inst.shown {
            return;
        }
        let world = inst.world_matrix();
        let nodes = inst.effect.nodes();
        for particle in inst.particles() {
            let node = &nodes[particle.node];
            let Some(renderer) = renderers.get_mut(node.def.kind) else {
                continue;
            };
            renderer.render(&NodeDraw {
                handle,
                kind: node.def.kind,
                position: world.transform_point(particle.position),
                size: node.def.size,
                color: node.def.color,
                texture: node.texture,
                model: node.model,
            });
        }
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INSTANCES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{RecordingRenderer, Renderer};

    fn wired() -> (Manager, RecordingRenderer) {
        let renderer = RecordingRenderer::new();
        let mut manager = Manager::new(8);
        manager.set_sprite_renderer(renderer.create_sprite_renderer());
        manager.set_ribbon_renderer(renderer.create_ribbon_renderer());
        manager.set_ring_renderer(renderer.create_ring_renderer());
        manager.set_track_renderer(renderer.create_track_renderer());
        manager.set_model_renderer(renderer.create_model_renderer());
        manager.set_texture_loader(renderer.create_texture_loader());
        manager.set_model_loader(renderer.create_model_loader());
        (manager, renderer)
    }

    fn effect(manager: &mut Manager, json: &str) -> Effect {
        manager
            .compile_effect(EffectDef::from_json(json).unwrap(), None)
            .unwrap()
    }

    #[test]
    fn play_and_stop() {
        let (mut manager, _r) = wired();
        let fx = effect(&mut manager, r#"{ "nodes": [ {} ] }"#);
        let h = manager.play(&fx, Vec3::ZERO).unwrap();
        assert!(manager.exists(h));
        manager.stop_effect(h);
        assert!(!manager.exists(h));
        manager.stop_effect(h);
        assert_eq!(manager.stats().stopped, 1, "unknown handles are not counted");
    }

    #[test]
    fn handles_are_unique() {
        let (mut manager, _r) = wired();
        let fx = effect(&mut manager, r#"{ "nodes": [ {} ] }"#);
        let a = manager.play(&fx, Vec3::ZERO).unwrap();
        let b = manager.play(&fx, Vec3::ZERO).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrapped_ids_skip_live_instances() {
        let (mut manager, _r) = wired();
        let fx = effect(&mut manager, r#"{ "nodes": [ {} ] }"#);
        let first = manager.play(&fx, Vec3::ONE).unwrap();
        assert_eq!(first, Handle(0));

        manager.next_handle = i32::MAX;
        let last = manager.play(&fx, Vec3::ZERO).unwrap();
        assert_eq!(last, Handle(i32::MAX));
        let wrapped = manager.play(&fx, Vec3::ZERO).unwrap();
        assert_eq!(wrapped, Handle(1));
        assert_eq!(manager.instance_count(), 3);
        assert_eq!(manager.location(first), Some(Vec3::ONE));
    }

    #[test]
    fn capacity_is_enforced() {
        let mut manager = Manager::new(2);
        let fx = effect(&mut manager, r#"{ "nodes": [ {} ] }"#);
        assert!(manager.play(&fx, Vec3::ZERO).is_some());
        assert!(manager.play(&fx, Vec3::ZERO).is_some());
        assert!(manager.play(&fx, Vec3::ZERO).is_none());
        assert_eq!(manager.instance_count(), 2);
    }

    #[test]
    fn default_capacity() {
        assert_eq!(Manager::default().capacity(), 10240);
    }

    #[test]
    fn update_skips_paused_but_update_handle_does_not() {
        let (mut manager, _r) = wired();
        let fx = effect(&mut manager, r#"{ "nodes": [ {} ] }"#);
        let h = manager.play(&fx, Vec3::ZERO).unwrap();
        manager.set_paused(h, true);
        manager.update(1.0);
        assert_eq!(manager.instance_time(h), Some(0.0));
        manager.begin_update();
        manager.update_handle(h, 2.0);
        manager.end_update();
        assert_eq!(manager.instance_time(h), Some(2.0));
    }

    #[test]
    fn finished_instances_are_swept() {
        let (mut manager, _r) = wired();
        let fx = effect(
            &mut manager,
            r#"{ "duration": 1, "nodes": [ { "lifetime": 2 } ] }"#,
        );
        let h = manager.play(&fx, Vec3::ZERO).unwrap();
        for _ in 0..3 {
            manager.update(1.0);
        }
        assert!(!manager.exists(h));
        assert_eq!(manager.stats().finished, 1);
        assert_eq!(manager.stats().stopped, 0);
    }

    #[test]
    fn draw_handle_renders_each_particle() {
        let (mut manager, mut renderer) = wired();
        let log = renderer.log();
        let fx = effect(&mut manager, r#"{ "nodes": [ { "count": 3 }, { "kind": "ring", "count": 2 } ] }"#);
        let h = manager.play(&fx, Vec3::new(1.0, 2.0, 3.0)).unwrap();
        manager.update(1.0);

        renderer.begin_rendering();
        manager.draw_handle(h);
        renderer.end_rendering();

        let verts = log.vertices();
        assert_eq!(verts.len(), 5);
        let rings = verts.iter().filter(|v| v.kind == NodeKind::Ring as u32).count();
        assert_eq!(rings, 2);
    }

    #[test]
    fn draw_only_includes_auto_drawn_instances() {
        let (mut manager, mut renderer) = wired();
        let log = renderer.log();
        let fx = effect(&mut manager, r#"{ "nodes": [ {} ] }"#);
        let a = manager.play(&fx, Vec3::ZERO).unwrap();
        let b = manager.play(&fx, Vec3::ZERO).unwrap();
        manager.set_auto_drawing(b, false);
        manager.update(1.0);

        renderer.begin_rendering();
        manager.draw();
        renderer.end_rendering();

        assert_eq!(log.count_for(a), 1);
        assert_eq!(log.count_for(b), 0);
    }

    #[test]
    fn hidden_instances_do_not_draw() {
        let (mut manager, mut renderer) = wired();
        let log = renderer.log();
        let fx = effect(&mut manager, r#"{ "nodes": [ {} ] }"#);
        let h = manager.play(&fx, Vec3::ZERO).unwrap();
        manager.update(1.0);
        manager.set_shown(h, false);

        renderer.begin_rendering();
        manager.draw_handle(h);
        renderer.end_rendering();
        assert!(log.is_empty());
    }

    #[test]
    fn released_renderers_draw_nothing() {
        let (mut manager, mut renderer) = wired();
        let log = renderer.log();
        let fx = effect(&mut manager, r#"{ "nodes": [ {} ] }"#);
        let h = manager.play(&fx, Vec3::ZERO).unwrap();
        manager.update(1.0);
        manager.release_renderers();

        renderer.begin_rendering();
        manager.draw_handle(h);
        renderer.end_rendering();
        assert!(log.is_empty());
    }

    #[test]
    fn location_and_scale_round_trip() {
        let (mut manager, _r) = wired();
        let fx = effect(&mut manager, r#"{ "nodes": [ {} ] }"#);
        let h = manager.play(&fx, Vec3::ZERO).unwrap();
        manager.set_location(h, Vec3::new(1.0, 2.0, 3.0));
        manager.add_location(h, Vec3::ONE);
        assert_eq!(manager.location(h), Some(Vec3::new(2.0, 3.0, 4.0)));
        manager.set_scale(h, Vec3::splat(2.0));
        assert_eq!(manager.scale(h), Some(Vec3::splat(2.0)));
        assert_eq!(manager.location(Handle(999)), None);
    }

    #[test]
    fn load_effect_reports_missing_file() {
        let mut manager = Manager::new(4);
        let err = manager
            .load_effect(Path::new("definitely/not/here.efx.json"))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Io { .. }));
    }

    #[test]
    fn load_effect_reports_bad_json() {
        let path = std::env::temp_dir().join(format!("fx-runtime-bad-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        let mut manager = Manager::new(4);
        let err = manager.load_effect(&path).unwrap_err();
        let _ = std::fs::remove_file(&path);
        assert!(matches!(err, RuntimeError::Parse { .. }));
    }
}
