//! Configuration system
//!
//! [`ColliderConfig`] holds the tuning knobs for collider selection and KD-tree
//! construction. Any [`Config`] type can be loaded from or saved to TOML or
//! RON, picked by file extension.

pub use serde::{Serialize, Deserialize};

use crate::collision::FaceCulling;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;

        Self::from_str_with_format(&contents, path)
    }

    /// Parse configuration text, using `path_hint`'s extension to pick the format
    fn from_str_with_format(contents: &str, path_hint: &str) -> Result<Self, ConfigError> {
        if path_hint.ends_with(".toml") {
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path_hint.ends_with(".ron") {
            ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path_hint.to_string()))
        }
    }

    /// Serialize configuration text, using `path_hint`'s extension to pick the format
    fn to_string_with_format(&self, path_hint: &str) -> Result<String, ConfigError> {
        if path_hint.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
        } else if path_hint.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path_hint.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = self.to_string_with_format(path)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is outside its accepted range
    #[error("Invalid value for `{field}`: {reason}")]
    Invalid {
        /// Offending field name
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

/// Collider selection and KD-tree build parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColliderConfig {
    /// `ColliderType::Auto` picks the linear collector at or below this many triangles
    pub auto_linear_max_triangles: u32,

    /// Leaf size target for meshes smaller than `large_mesh_threshold`
    pub small_mesh_triangles_per_node: u32,

    /// Triangle count from which the leaf size scales with the mesh
    pub large_mesh_threshold: u32,

    /// Large meshes aim for `count / large_mesh_divisor + 1` triangles per leaf
    pub large_mesh_divisor: u32,

    /// Back-face handling for every ray/triangle test the collider runs
    pub face_culling: FaceCulling,
}

impl Default for ColliderConfig {
    fn default() -> Self {
        Self {
            auto_linear_max_triangles: 6,
            small_mesh_triangles_per_node: 20,
            large_mesh_threshold: 500,
            large_mesh_divisor: 100,
            face_culling: FaceCulling::Back,
        }
    }
}

impl Config for ColliderConfig {}

impl ColliderConfig {
    /// Leaf triangle threshold for a tree over `triangle_count` triangles
    pub fn triangles_per_node(&self, triangle_count: u32) -> u32 {
        if triangle_count < self.large_mesh_threshold {
            self.small_mesh_triangles_per_node
        } else {
            triangle_count / self.large_mesh_divisor.max(1) + 1
        }
    }

    /// Check that the values can drive a tree build
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.large_mesh_divisor == 0 {
            return Err(ConfigError::Invalid {
                field: "large_mesh_divisor",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.small_mesh_triangles_per_node == 0 {
            return Err(ConfigError::Invalid {
                field: "small_mesh_triangles_per_node",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = ColliderConfig::default();
        assert_eq!(config.triangles_per_node(12), 20);
        assert_eq!(config.triangles_per_node(499), 20);
        assert_eq!(config.triangles_per_node(500), 6);
        assert_eq!(config.triangles_per_node(10_000), 101);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ColliderConfig {
            auto_linear_max_triangles: 12,
            face_culling: FaceCulling::None,
            ..Default::default()
        };

        let text = config.to_string_with_format("collider.toml").unwrap();
        let parsed = ColliderConfig::from_str_with_format(&text, "collider.toml").unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_ron_round_trip() {
        let config = ColliderConfig {
            large_mesh_threshold: 2000,
            ..Default::default()
        };

        let text = config.to_string_with_format("collider.ron").unwrap();
        let parsed = ColliderConfig::from_str_with_format(&text, "collider.ron").unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed = ColliderConfig::from_str_with_format(
            "small_mesh_triangles_per_node = 8\n",
            "collider.toml",
        )
        .unwrap();

        assert_eq!(parsed.small_mesh_triangles_per_node, 8);
        assert_eq!(parsed.auto_linear_max_triangles, 6);
        assert_eq!(parsed.face_culling, FaceCulling::Back);
    }

    #[test]
    fn test_unsupported_format() {
        let result = ColliderConfig::from_str_with_format("", "collider.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_validate_rejects_zero_divisor() {
        let config = ColliderConfig {
            large_mesh_divisor: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "large_mesh_divisor", .. })
        ));
    }
}
