//! Gameplay configuration parsing from TOML files

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::error;

use crate::game::constants::kinematics::DEFAULT_SAMPLE_WINDOW;
use crate::game::constants::nav::MAX_JUMP_ARC;
use crate::game::debug::DebugConfig;
use crate::game::gesture::{
    CheckType, ComparisonOp, ConditionNode, CooldownMatrix, GestureKind, OneHandGestureDefinition,
    TwoHandGestureDefinition,
};
use crate::game::nav::{NavRecoveryConfig, NavRecoverySettings};

/// Bundled gesture library and tuning
pub const DEFAULT_GAMEPLAY_TOML: &str = include_str!("../data/default_gameplay.toml");

/// Kinematic sampler section
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SamplerConfig {
    /// Averaging window for buffered values, in seconds
    #[serde(default = "default_sample_window")]
    pub sample_window: f32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_window: DEFAULT_SAMPLE_WINDOW,
        }
    }
}

fn default_sample_window() -> f32 {
    DEFAULT_SAMPLE_WINDOW
}

/// Two-hand casting poses, authored for the right hand
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PoseConfig {
    #[serde(rename = "static")]
    pub static_pose: TwoHandGestureDefinition,
    #[serde(rename = "dynamic")]
    pub dynamic_pose: TwoHandGestureDefinition,
}

impl PoseConfig {
    /// Poses whose entry can never hold.
    fn inert() -> Self {
        let never = || ConditionNode::new(CheckType::VelocityMagnitude, ComparisonOp::LessThan, 0.0);
        Self {
            static_pose: TwoHandGestureDefinition::new("cannon_static", never(), never()),
            dynamic_pose: TwoHandGestureDefinition::new("cannon_dynamic", never(), never()),
        }
    }
}

/// Gameplay configuration from a gameplay TOML file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GameplayConfig {
    #[serde(default)]
    pub sampler: SamplerConfig,
    /// Cooldown matrix between gesture kinds
    #[serde(default)]
    pub casting: CooldownMatrix,
    /// One-hand gesture library, in priority order
    #[serde(default)]
    pub gestures: Vec<OneHandGestureDefinition>,
    pub poses: PoseConfig,
    #[serde(default)]
    pub nav: NavRecoveryConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

impl Default for GameplayConfig {
    /// The bundled library. It is covered by tests, so failing to parse it
    /// only logs and falls back to a library with no gestures.
    fn default() -> Self {
        Self::from_toml_str(DEFAULT_GAMEPLAY_TOML).unwrap_or_else(|e| {
            error!(error = %e, "bundled gameplay config is invalid");
            Self {
                sampler: SamplerConfig::default(),
                casting: CooldownMatrix::default(),
                gestures: Vec::new(),
                poses: PoseConfig::inert(),
                nav: NavRecoveryConfig::default(),
                debug: DebugConfig::default(),
            }
        })
    }
}

impl GameplayConfig {
    /// Load and validate gameplay configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        let config: Self =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate gameplay configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn gesture(&self, name: &str) -> Option<&OneHandGestureDefinition> {
        self.gestures.iter().find(|g| g.name == name)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampler.sample_window <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "sampler.sample_window must be positive, got {}",
                self.sampler.sample_window
            )));
        }

        for gesture in &self.gestures {
            check_name("gesture", &gesture.name)?;
            check_thresholds(
                &gesture.name,
                gesture.min_entry_time,
                gesture.min_entry_distance,
                gesture.min_exit_time,
            )?;
            if !matches!(gesture.kind, GestureKind::Punch | GestureKind::Slash) {
                return Err(ConfigError::Invalid(format!(
                    "gesture '{}' has kind {:?}; one-hand gestures must be punch or slash",
                    gesture.name, gesture.kind
                )));
            }
        }

        for pose in [&self.poses.static_pose, &self.poses.dynamic_pose] {
            check_name("pose", &pose.name)?;
            check_thresholds(&pose.name, pose.min_entry_time, pose.min_entry_distance, pose.min_exit_time)?;
        }

        validate_nav(&self.nav)
    }
}

fn check_name(what: &str, name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{what} name must not be empty")));
    }
    Ok(())
}

fn check_thresholds(name: &str, entry_time: f32, entry_distance: f32, exit_time: f32) -> Result<(), ConfigError> {
    for (field, value) in [
        ("min_entry_time", entry_time),
        ("min_entry_distance", entry_distance),
        ("min_exit_time", exit_time),
    ] {
        if value < 0.0 {
            return Err(ConfigError::Invalid(format!("'{name}': {field} must not be negative, got {value}")));
        }
    }
    Ok(())
}

fn validate_nav(nav: &NavRecoveryConfig) -> Result<(), ConfigError> {
    for (field, arc) in [("min_jump_arc", nav.min_jump_arc), ("max_jump_arc", nav.max_jump_arc)] {
        if !(0.0..1.0).contains(&arc) {
            return Err(ConfigError::Invalid(format!("nav.{field} must be in [0, 1), got {arc}")));
        }
    }
    if nav.min_jump_arc > nav.max_jump_arc {
        return Err(ConfigError::Invalid(format!(
            "nav.min_jump_arc ({}) exceeds nav.max_jump_arc ({})",
            nav.min_jump_arc, nav.max_jump_arc
        )));
    }
    if nav.max_jump_arc > MAX_JUMP_ARC {
        return Err(ConfigError::Invalid(format!(
            "nav.max_jump_arc must not exceed {MAX_JUMP_ARC}, got {}",
            nav.max_jump_arc
        )));
    }
    if !(0.0..=1.0).contains(&nav.path_trace_fraction) {
        return Err(ConfigError::Invalid(format!(
            "nav.path_trace_fraction must be in [0, 1], got {}",
            nav.path_trace_fraction
        )));
    }
    validate_settings("nav.off_mesh", &nav.off_mesh)?;
    validate_settings("nav.island", &nav.island)
}

fn validate_settings(section: &str, settings: &NavRecoverySettings) -> Result<(), ConfigError> {
    if settings.search_inner_radius < 0.0 || settings.search_outer_radius < 0.0 {
        return Err(ConfigError::Invalid(format!("{section}: search radii must not be negative")));
    }
    if settings.search_inner_radius > settings.search_outer_radius {
        return Err(ConfigError::Invalid(format!(
            "{section}: search_inner_radius ({}) exceeds search_outer_radius ({})",
            settings.search_inner_radius, settings.search_outer_radius
        )));
    }
    if settings.failure_time_until_recovery < 0.0 || settings.max_recovery_attempt_time < 0.0 {
        return Err(ConfigError::Invalid(format!("{section}: recovery times must not be negative")));
    }
    Ok(())
}

/// Errors that can occur when loading gameplay configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
    #[error("failed to parse {}: {1}", .0.display())]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("invalid gameplay config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::nav::NavRecoveryAbility;

    const MINIMAL_POSES: &str = r#"
        [poses.static]
        name = "hold"
        [poses.dynamic]
        name = "thrust"
    "#;

    #[test]
    fn test_bundled_config_parses() {
        let config = GameplayConfig::from_toml_str(DEFAULT_GAMEPLAY_TOML).unwrap();
        assert!(config.gesture("punch").is_some());
        assert!(config.gesture("slash").is_some());
        assert_eq!(config.poses.static_pose.name, "cannon_static");
        assert_eq!(config.poses.dynamic_pose.name, "cannon_dynamic");
        assert_eq!(config, GameplayConfig::default());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = GameplayConfig::from_toml_str(MINIMAL_POSES).unwrap();
        assert!(config.gestures.is_empty());
        assert_eq!(config.sampler.sample_window, DEFAULT_SAMPLE_WINDOW);
        assert_eq!(config.nav, NavRecoveryConfig::default());
        assert_eq!(config.casting, CooldownMatrix::default());
        // untouched trees default to auto-success
        assert_eq!(config.poses.static_pose.entry(crate::game::gesture::Hand::Right), &ConditionNode::auto_success());
    }

    #[test]
    fn test_parse_nested_condition_tree() {
        let toml = format!(
            r#"
            [[gestures]]
            name = "jab"
            kind = "punch"
            min_entry_time = 0.05

            [gestures.entry]
            check = "velocity_x"
            op = ">="
            threshold = 200.0

            [[gestures.entry.strong]]
            check = "angular_velocity_z"
            source = "frame"
            op = "<"
            threshold = 90.0

            [[gestures.entry.weak]]
            check = "motion_angle_y"
            op = "le"
            threshold = 30.0
            {MINIMAL_POSES}
            "#
        );
        let config = GameplayConfig::from_toml_str(&toml).unwrap();
        let jab = config.gesture("jab").unwrap();
        assert_eq!(jab.kind, GestureKind::Punch);
        assert_eq!(jab.entry.op, ComparisonOp::GreaterThanEqual);
        assert_eq!(jab.entry.strong.len(), 1);
        assert_eq!(jab.entry.strong[0].check, CheckType::AngularVelocityZ);
        assert_eq!(jab.entry.weak[0].op, ComparisonOp::LessThanEqual);
    }

    #[test]
    fn test_parse_nav_sections() {
        let toml = format!(
            r#"
            {MINIMAL_POSES}
            [nav]
            ability = "off_nav_mesh"
            min_jump_arc = 0.1

            [nav.off_mesh]
            failure_count_until_recovery = 3
            skip_frames = 0
            "#
        );
        let config = GameplayConfig::from_toml_str(&toml).unwrap();
        assert_eq!(config.nav.ability, NavRecoveryAbility::OffNavMesh);
        assert_eq!(config.nav.min_jump_arc, 0.1);
        assert_eq!(config.nav.off_mesh.failure_count_until_recovery, 3);
        assert_eq!(config.nav.off_mesh.skip_frames, 0);
        assert_eq!(config.nav.off_mesh.max_recovery_attempt_time, 5.0);
        assert_eq!(config.nav.island, NavRecoverySettings::island());
    }

    #[test]
    fn test_rejects_inverted_jump_arcs() {
        let toml = format!("{MINIMAL_POSES}\n[nav]\nmin_jump_arc = 0.6\nmax_jump_arc = 0.4\n");
        let err = GameplayConfig::from_toml_str(&toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "got {err}");
    }

    #[test]
    fn test_rejects_negative_thresholds_and_empty_names() {
        let negative = format!(
            "[[gestures]]\nname = \"jab\"\nkind = \"punch\"\nmin_exit_time = -1.0\n{MINIMAL_POSES}"
        );
        assert!(matches!(
            GameplayConfig::from_toml_str(&negative),
            Err(ConfigError::Invalid(_))
        ));

        let unnamed = format!("[[gestures]]\nname = \" \"\nkind = \"slash\"\n{MINIMAL_POSES}");
        assert!(matches!(
            GameplayConfig::from_toml_str(&unnamed),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_inner_radius_beyond_outer() {
        let toml = format!(
            "{MINIMAL_POSES}\n[nav.island]\nsearch_inner_radius = 500.0\nsearch_outer_radius = 400.0\n"
        );
        assert!(matches!(
            GameplayConfig::from_toml_str(&toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = GameplayConfig::from_file(Path::new("/nonexistent/gameplay.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(..)));
    }
}
