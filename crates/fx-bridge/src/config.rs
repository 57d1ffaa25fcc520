use fx_runtime::{CoordinateSystem, DEFAULT_MAX_INSTANCES};
use serde::{Deserialize, Serialize};

/// Runtime configuration, read once at initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of simultaneously playing instances (default: 10240).
    pub max_instances: usize,
    /// Handedness of the runtime's world space (default: left-handed).
    pub coordinate_system: CoordinateSystem,
    /// Runtime frames per second of host time (default: 60).
    pub frames_per_second: f32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_instances: DEFAULT_MAX_INSTANCES,
            coordinate_system: CoordinateSystem::LeftHanded,
            frames_per_second: 60.0,
        }
    }
}

impl RuntimeConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_max_instances(mut self, max_instances: usize) -> Self {
        self.max_instances = max_instances;
        self
    }

    pub fn with_coordinate_system(mut self, system: CoordinateSystem) -> Self {
        self.coordinate_system = system;
        self
    }

    /// Host seconds to runtime frames.
    pub fn seconds_to_frames(&self, seconds: f32) -> f32 {
        seconds * self.frames_per_second
    }
}
