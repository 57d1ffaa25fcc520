//! Effect templates.
//!
//! An effect file is JSON describing one or more particle nodes. Loading
//! compiles it into an [`Effect`]: resource paths are resolved against the
//! file's directory and handed to the manager's loaders, and authored
//! right-handed vectors are converted to the manager's coordinate system.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;
use crate::math::CoordinateSystem;
use crate::renderer::{ModelId, ModelLoader, TextureId, TextureLoader};

/// Upper bound on a node's burst `count` and per-frame `rate`, and on the
/// particles one node emits in a single step.
pub const MAX_PARTICLES_PER_NODE: u32 = 10_000;

/// Which node renderer draws a node's particles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    #[default]
    Sprite,
    Ribbon,
    Ring,
    Track,
    Model,
}

/// Authored description of one particle node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDef {
    #[serde(default)]
    pub kind: NodeKind,
    /// Texture path relative to the effect file.
    #[serde(default)]
    pub texture: Option<String>,
    /// Model path relative to the effect file (model nodes only).
    #[serde(default)]
    pub model: Option<String>,
    /// Particles emitted on the first frame.
    #[serde(default = "default_count")]
    pub count: u32,
    /// Particles emitted per frame while the effect is within its duration.
    #[serde(default)]
    pub rate: f32,
    /// Particle lifetime in frames.
    #[serde(default = "default_lifetime")]
    pub lifetime: f32,
    /// Min/max initial speed in world units per frame.
    #[serde(default)]
    pub speed: (f32, f32),
    /// Constant acceleration in world units per frame squared.
    #[serde(default)]
    pub gravity: [f32; 3],
    #[serde(default = "default_size")]
    pub size: f32,
    #[serde(default = "default_color")]
    pub color: [f32; 4],
}

/// Authored effect file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectDef {
    #[serde(default)]
    pub name: String,
    /// Emission window in frames.
    #[serde(default = "default_duration")]
    pub duration: f32,
    pub nodes: Vec<NodeDef>,
}

fn default_count() -> u32 {
    1
}

fn default_lifetime() -> f32 {
    60.0
}

fn default_size() -> f32 {
    1.0
}

fn default_color() -> [f32; 4] {
    [1.0, 1.0, 1.0, 1.0]
}

fn default_duration() -> f32 {
    60.0
}

impl EffectDef {
    /// Parse an effect from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reject effects that could never show anything or never end.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.nodes.is_empty() {
            return Err(RuntimeError::InvalidEffect("effect has no nodes".into()));
        }
        if !(self.duration >= 0.0 && self.duration.is_finite()) {
            return Err(RuntimeError::InvalidEffect(format!(
                "duration must be finite and non-negative, got {}",
                self.duration
            )));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if !(node.lifetime > 0.0 && node.lifetime.is_finite()) {
                return Err(RuntimeError::InvalidEffect(format!(
                    "node {} lifetime must be positive, got {}",
                    i, node.lifetime
                )));
            }
            if node.count > MAX_PARTICLES_PER_NODE
                || node.rate.is_nan()
                || node.rate > MAX_PARTICLES_PER_NODE as f32
            {
                return Err(RuntimeError::InvalidEffect(format!(
                    "node {} emits more than {} particles",
                    i, MAX_PARTICLES_PER_NODE
                )));
            }
            if node.rate < 0.0 || node.speed.0 > node.speed.1 {
                return Err(RuntimeError::InvalidEffect(format!(
                    "node {} has a negative rate or an inverted speed range",
                    i
                )));
            }
            if node.kind == NodeKind::Model && node.model.is_none() {
                return Err(RuntimeError::InvalidEffect(format!(
                    "model node {} names no model",
                    i
                )));
            }
        }
        Ok(())
    }
}

/// A node with its resources resolved.
#[derive(Debug, Clone)]
pub struct CompiledNode {
    pub def: NodeDef,
    pub gravity: Vec3,
    pub texture: Option<TextureId>,
    pub model: Option<ModelId>,
}

#[derive(Debug)]
struct EffectData {
    name: String,
    duration: f32,
    nodes: Vec<CompiledNode>,
    path: Option<PathBuf>,
}

/// Compiled, immutable effect template. Cloning shares the template.
#[derive(Debug, Clone)]
pub struct Effect {
    data: Arc<EffectData>,
}

/// Loaders available while compiling.
pub(crate) struct Loaders<'a> {
    pub textures: Option<&'a mut (dyn TextureLoader + 'static)>,
    pub models: Option<&'a mut (dyn ModelLoader + 'static)>,
}

impl Effect {
    pub(crate) fn compile(
        def: EffectDef,
        path: Option<&Path>,
        system: CoordinateSystem,
        mut loaders: Loaders<'_>,
    ) -> Result<Self, RuntimeError> {
        def.validate()?;
        let base_dir = path.and_then(Path::parent).unwrap_or_else(|| Path::new(""));

        let mut nodes = Vec::with_capacity(def.nodes.len());
        for node in def.nodes {
            let [gx, gy, gz] = node.gravity;
            let gravity = Vec3::new(gx, gy, gz * system.z_sign());

            let texture = match (&node.texture, loaders.textures.as_deref_mut()) {
                (Some(rel), Some(loader)) => {
                    let resolved = base_dir.join(rel);
                    let id = loader.load(&resolved);
                    if id.is_none() {
                        log::warn!("effect: texture {} failed to load", resolved.display());
                    }
                    id
                }
                (Some(rel), None) => {
                    log::warn!("effect: no texture loader for {}", rel);
                    None
                }
                (None, _) => None,
            };

            let model = match (&node.model, loaders.models.as_deref_mut()) {
                (Some(rel), Some(loader)) => {
                    let resolved = base_dir.join(rel);
                    let id = loader.load(&resolved);
                    if id.is_none() {
                        log::warn!("effect: model {} failed to load", resolved.display());
                    }
                    id
                }
                (Some(rel), None) => {
                    log::warn!("effect: no model loader for {}", rel);
                    None
                }
                (None, _) => None,
            };

            nodes.push(CompiledNode {
                def: node,
                gravity,
                texture,
                model,
            });
        }

        Ok(Self {
            data: Arc::new(EffectData {
                name: def.name,
                duration: def.duration,
                nodes,
                path: path.map(Path::to_path_buf),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// Emission window in frames.
    pub fn duration(&self) -> f32 {
        self.data.duration
    }

    pub fn nodes(&self) -> &[CompiledNode] {
        &self.data.nodes
    }

    /// File the effect was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.data.path.as_deref()
    }

    /// Whether two handles share the same compiled template.
    pub fn ptr_eq(&self, other: &Effect) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_loaders() -> Loaders<'static> {
        Loaders {
            textures: None,
            models: None,
        }
    }

    #[test]
    fn parse_minimal_effect_uses_defaults() {
        let def = EffectDef::from_json(r#"{ "nodes": [ {} ] }"#).unwrap();
        assert_eq!(def.duration, 60.0);
        let node = &def.nodes[0];
        assert_eq!(node.kind, NodeKind::Sprite);
        assert_eq!(node.count, 1);
        assert_eq!(node.lifetime, 60.0);
        assert_eq!(node.color, [1.0; 4]);
    }

    #[test]
    fn parse_full_node() {
        let json = r#"{
            "name": "spark",
            "duration": 30,
            "nodes": [
                { "kind": "ribbon", "texture": "spark.png", "count": 8, "rate": 0.5,
                  "lifetime": 20, "speed": [0.1, 0.4], "gravity": [0, -0.01, 0.5],
                  "size": 2.0, "color": [1, 0.5, 0, 1] }
            ]
        }"#;
        let def = EffectDef::from_json(json).unwrap();
        assert_eq!(def.name, "spark");
        let node = &def.nodes[0];
        assert_eq!(node.kind, NodeKind::Ribbon);
        assert_eq!(node.texture.as_deref(), Some("spark.png"));
        assert_eq!(node.speed, (0.1, 0.4));
        assert!(def.validate().is_ok());
    }

    #[test]
    fn empty_effect_is_invalid() {
        let def = EffectDef::from_json(r#"{ "nodes": [] }"#).unwrap();
        assert!(matches!(def.validate(), Err(RuntimeError::InvalidEffect(_))));
    }

    #[test]
    fn zero_lifetime_is_invalid() {
        let def = EffectDef::from_json(r#"{ "nodes": [ { "lifetime": 0 } ] }"#).unwrap();
        assert!(def.validate().is_err());
    }

    #[test]
    fn particle_counts_are_capped() {
        let at_cap = format!(r#"{{ "nodes": [ {{ "count": {} }} ] }}"#, MAX_PARTICLES_PER_NODE);
        assert!(EffectDef::from_json(&at_cap).unwrap().validate().is_ok());

        let burst = r#"{ "nodes": [ { "count": 4000000000 } ] }"#;
        let rate = r#"{ "nodes": [ { "rate": 1e9 } ] }"#;
        for json in [burst, rate] {
            let def = EffectDef::from_json(json).unwrap();
            assert!(matches!(def.validate(), Err(RuntimeError::InvalidEffect(_))), "{}", json);
        }
    }

    #[test]
    fn model_node_needs_a_model() {
        let def = EffectDef::from_json(r#"{ "nodes": [ { "kind": "model" } ] }"#).unwrap();
        assert!(def.validate().is_err());
    }

    #[test]
    fn left_handed_compile_mirrors_gravity_z() {
        let def = EffectDef::from_json(r#"{ "nodes": [ { "gravity": [1, 2, 3] } ] }"#).unwrap();
        let lh = Effect::compile(def.clone(), None, CoordinateSystem::LeftHanded, no_loaders())
            .unwrap();
        let rh = Effect::compile(def, None, CoordinateSystem::RightHanded, no_loaders()).unwrap();
        assert_eq!(lh.nodes()[0].gravity, Vec3::new(1.0, 2.0, -3.0));
        assert_eq!(rh.nodes()[0].gravity, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn textures_resolve_relative_to_effect_file() {
        use crate::renderer::{RecordingRenderer, Renderer};

        let renderer = RecordingRenderer::new();
        let mut textures = renderer.create_texture_loader();
        let def =
            EffectDef::from_json(r#"{ "nodes": [ { "texture": "tex/spark.png" } ] }"#).unwrap();
        let effect = Effect::compile(
            def,
            Some(Path::new("assets/fx/spark.json")),
            CoordinateSystem::LeftHanded,
            Loaders {
                textures: Some(textures.as_mut()),
                models: None,
            },
        )
        .unwrap();

        assert_eq!(effect.nodes()[0].texture, Some(TextureId(1)));
        assert_eq!(
            renderer.log().textures(),
            vec![PathBuf::from("assets/fx/tex/spark.png")]
        );
        assert_eq!(effect.path(), Some(Path::new("assets/fx/spark.json")));
    }
}
