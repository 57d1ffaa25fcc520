use glam::Vec3;

use crate::effect::{Effect, MAX_PARTICLES_PER_NODE};
use crate::math::Matrix43;
use crate::rng::Rng;

/// A live particle, positioned in instance-local space.
#[derive(Debug, Clone)]
pub struct Particle {
    /// Index of the node that emitted it.
    pub node: usize,
    pub position: Vec3,
    pub velocity: Vec3,
    /// Age in frames.
    pub age: f32,
}

impl Particle {
    /// Advance by `dt` frames. Returns false when expired.
    pub fn tick(&mut self, gravity: Vec3, lifetime: f32, dt: f32) -> bool {
        self.age += dt;
        if self.age >= lifetime {
            return false;
        }
        self.velocity += gravity * dt;
        self.position += self.velocity * dt;
        true
    }
}

/// One running playback of an effect.
pub(crate) struct Instance {
    pub effect: Effect,
    pub location: Vec3,
    pub rotation_axis: Vec3,
    pub rotation_angle: f32,
    pub scale: Vec3,
    pub base: Matrix43,
    pub speed: f32,
    pub paused: bool,
    pub shown: bool,
    pub auto_draw: bool,
    time: f32,
    burst_fired: bool,
    accumulators: Vec<f32>,
    particles: Vec<Particle>,
    rng: Rng,
}

impl Instance {
    pub fn new(effect: Effect, location: Vec3, seed: u64) -> Self {
        let nodes = effect.nodes().len();
        Self {
            effect,
            location,
            rotation_axis: Vec3::Y,
            rotation_angle: 0.0,
            scale: Vec3::ONE,
            base: Matrix43::IDENTITY,
            speed: 1.0,
            paused: false,
            shown: true,
            auto_draw: true,
            time: 0.0,
            burst_fired: false,
            accumulators: vec![0.0; nodes],
            particles: Vec::new(),
            rng: Rng::new(seed),
        }
    }

    /// Frames of playback elapsed, speed included.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Advance by `frames` scaled by the playback speed. Zero, negative and
    /// NaN steps do nothing; emission starts on the first positive step.
    pub fn advance(&mut self, frames: f32) {
        let dt = frames * self.speed;
        if dt.is_nan() || dt <= 0.0 {
            return;
        }

        let nodes = self.effect.nodes();
        self.particles.retain_mut(|p| {
            let node = &nodes[p.node];
            p.tick(node.gravity, node.def.lifetime, dt)
        });

        if !self.burst_fired {
            self.burst_fired = true;
            for (index, node) in nodes.iter().enumerate() {
                for _ in 0..node.def.count {
                    let particle = Self::emit(&mut self.rng, index, node.def.speed);
                    self.particles.push(particle);
                }
            }
        }

        let window = (self.effect.duration() - self.time).clamp(0.0, dt);
        if window > 0.0 {
            for (index, node) in nodes.iter().enumerate() {
                if node.def.rate <= 0.0 {
                    continue;
                }
                let acc = &mut self.accumulators[index];
                *acc += node.def.rate * window;
                let count = acc.floor();
                *acc -= count;
                for _ in 0..(count as u32).min(MAX_PARTICLES_PER_NODE) {
                    let particle = Self::emit(&mut self.rng, index, node.def.speed);
                    self.particles.push(particle);
                }
            }
        }

        self.time += dt;
    }

    fn emit(rng: &mut Rng, node: usize, speed: (f32, f32)) -> Particle {
        let magnitude = rng.range(speed.0, speed.1);
        Particle {
            node,
            position: Vec3::ZERO,
            velocity: rng.unit_vector() * magnitude,
            age: 0.0,
        }
    }

    /// Emission window is over and every particle has expired.
    pub fn is_finished(&self) -> bool {
        self.burst_fired && self.time >= self.effect.duration() && self.particles.is_empty()
    }

    /// Instance transform followed by the base matrix.
    pub fn world_matrix(&self) -> Matrix43 {
        Matrix43::srt(
            self.scale,
            self.rotation_axis,
            self.rotation_angle,
            self.location,
        )
        .multiply(&self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{EffectDef, Loaders};
    use crate::math::CoordinateSystem;

    fn effect(json: &str) -> Effect {
        let def = EffectDef::from_json(json).unwrap();
        Effect::compile(
            def,
            None,
            CoordinateSystem::RightHanded,
            Loaders {
                textures: None,
                models: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn particle_expires() {
        let mut p = Particle {
            node: 0,
            position: Vec3::ZERO,
            velocity: Vec3::X,
            age: 0.0,
        };
        assert!(p.tick(Vec3::ZERO, 2.0, 1.0));
        assert!(!p.tick(Vec3::ZERO, 2.0, 1.0), "particle should expire");
    }

    #[test]
    fn burst_fires_on_first_step() {
        let fx = effect(r#"{ "duration": 10, "nodes": [ { "count": 5 } ] }"#);
        let mut inst = Instance::new(fx, Vec3::ZERO, 42);
        assert!(inst.particles().is_empty());
        inst.advance(1.0);
        assert_eq!(inst.particles().len(), 5);
        inst.advance(1.0);
        assert_eq!(inst.particles().len(), 5, "burst fires once");
    }

    #[test]
    fn zero_step_does_nothing() {
        let fx = effect(r#"{ "nodes": [ { "count": 5 } ] }"#);
        let mut inst = Instance::new(fx, Vec3::ZERO, 42);
        inst.advance(0.0);
        assert!(inst.particles().is_empty());
        assert_eq!(inst.time(), 0.0);
    }

    #[test]
    fn nan_step_does_nothing() {
        let fx = effect(r#"{ "duration": 4, "nodes": [ { "count": 2, "rate": 1 } ] }"#);
        let mut inst = Instance::new(fx, Vec3::ZERO, 3);
        inst.advance(f32::NAN);
        assert!(inst.particles().is_empty());
        assert_eq!(inst.time(), 0.0);

        inst.speed = f32::NAN;
        inst.advance(1.0);
        assert_eq!(inst.time(), 0.0);
    }

    #[test]
    fn one_huge_step_emits_at_most_the_cap() {
        let fx = effect(r#"{ "duration": 1000000, "nodes": [ { "count": 0, "rate": 100, "lifetime": 1e9 } ] }"#);
        let mut inst = Instance::new(fx, Vec3::ZERO, 11);
        inst.advance(1_000_000.0);
        assert_eq!(inst.particles().len(), MAX_PARTICLES_PER_NODE as usize);
    }

    #[test]
    fn speed_scales_time() {
        let fx = effect(r#"{ "nodes": [ {} ] }"#);
        let mut inst = Instance::new(fx, Vec3::ZERO, 1);
        inst.speed = 2.0;
        inst.advance(1.5);
        assert_eq!(inst.time(), 3.0);
    }

    #[test]
    fn continuous_rate_stops_after_duration() {
        let fx = effect(r#"{ "duration": 4, "nodes": [ { "count": 0, "rate": 1, "lifetime": 100 } ] }"#);
        let mut inst = Instance::new(fx, Vec3::ZERO, 9);
        for _ in 0..10 {
            inst.advance(1.0);
        }
        assert_eq!(inst.particles().len(), 4);
    }

    #[test]
    fn finishes_when_window_closed_and_particles_gone() {
        let fx = effect(r#"{ "duration": 2, "nodes": [ { "count": 3, "lifetime": 3 } ] }"#);
        let mut inst = Instance::new(fx, Vec3::ZERO, 5);
        inst.advance(1.0);
        assert!(!inst.is_finished());
        for _ in 0..3 {
            inst.advance(1.0);
        }
        assert!(inst.is_finished());
    }

    #[test]
    fn world_matrix_applies_base_after_location() {
        let fx = effect(r#"{ "nodes": [ {} ] }"#);
        let mut inst = Instance::new(fx, Vec3::new(1.0, 2.0, 3.0), 5);
        inst.base = Matrix43::translation(Vec3::new(10.0, 0.0, 0.0));
        let p = inst.world_matrix().transform_point(Vec3::ZERO);
        assert_eq!(p, Vec3::new(11.0, 2.0, 3.0));
    }
}
