//! TOML configuration.
//!
//! Every section is optional; anything left out takes the default below.
//!
//! ```toml
//! [matcher]
//! guided_threshold = 0.08
//! exam_threshold   = 0.05
//! order            = "lenient"   # or "strict"
//! origin           = "cursor"    # or "fixed" (uses fixed_origin)
//!
//! [curriculum]
//! order = ["lumos", "accio", "protego"]
//!
//! [[spells]]
//! id     = "glacius"
//! name   = "Glacius"
//! points = [ { x = 0.3, y = 0.3, checkpoint = true },
//!            { x = 0.7, y = 0.7, checkpoint = true } ]
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::Deserialize;
use spell_matcher::{CastOrigin, MatchConfig, OrderPolicy};
use spell_paths::{PathRegistry, SpellPath};
use thiserror::Error;
use tracing::warn;

// ════════════════════════════════════════════════════════════════════════════
// ConfigError
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ════════════════════════════════════════════════════════════════════════════
// Sections
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSetting {
    #[default]
    Lenient,
    Strict,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginSetting {
    #[default]
    Cursor,
    Fixed,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct MatcherSection {
    pub guided_threshold: f32,
    pub exam_threshold:   f32,
    pub trail_capacity:   usize,
    pub reset_delay_secs: f32,
    pub order:            OrderSetting,
    pub origin:           OriginSetting,
    pub fixed_origin:     [f32; 3],
}

impl Default for MatcherSection {
    fn default() -> Self {
        let m = MatchConfig::default();
        MatcherSection {
            guided_threshold: m.guided_threshold,
            exam_threshold:   m.exam_threshold,
            trail_capacity:   m.trail_capacity,
            reset_delay_secs: m.reset_delay,
            order:            OrderSetting::Lenient,
            origin:           OriginSetting::Cursor,
            fixed_origin:     [0.0; 3],
        }
    }
}

impl MatcherSection {
    pub fn to_match_config(&self) -> MatchConfig {
        MatchConfig {
            guided_threshold: self.guided_threshold,
            exam_threshold:   self.exam_threshold,
            trail_capacity:   self.trail_capacity,
            reset_delay:      self.reset_delay_secs,
            order: match self.order {
                OrderSetting::Lenient => OrderPolicy::Lenient,
                OrderSetting::Strict  => OrderPolicy::Strict,
            },
            origin: match self.origin {
                OriginSetting::Cursor => CastOrigin::Cursor,
                OriginSetting::Fixed  => CastOrigin::Fixed(Vec3::from_array(self.fixed_origin)),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct BurstSection {
    pub max_live: usize,
    /// Fixed RNG seed; random when absent.
    pub seed:     Option<u64>,
}

impl Default for BurstSection {
    fn default() -> Self {
        BurstSection { max_live: spell_burst::DEFAULT_MAX_LIVE, seed: None }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CurriculumSection {
    /// Spell ids in teaching order; empty means registry order.
    pub order: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChimeSection {
    pub enabled:  bool,
    /// General MIDI program (0-based).
    pub program:  u8,
    pub velocity: u8,
    pub channel:  u8,
    pub note_ms:  u64,
}

impl Default for ChimeSection {
    fn default() -> Self {
        ChimeSection { enabled: true, program: 98, velocity: 96, channel: 0, note_ms: 90 }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowSection {
    pub width:  usize,
    pub height: usize,
    pub fps:    u32,
}

impl Default for WindowSection {
    fn default() -> Self {
        WindowSection { width: 960, height: 640, fps: 60 }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// CasterConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CasterConfig {
    pub matcher:    MatcherSection,
    pub burst:      BurstSection,
    pub curriculum: CurriculumSection,
    pub chime:      ChimeSection,
    pub window:     WindowSection,
    /// Extra spell paths appended to the builtin registry.
    pub spells:     Vec<SpellPath>,
}

impl CasterConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: CasterConfig = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.matcher;
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if !positive(m.guided_threshold) || !positive(m.exam_threshold) {
            return Err(ConfigError::Invalid("match thresholds must be positive".into()));
        }
        if m.exam_threshold >= m.guided_threshold {
            return Err(ConfigError::Invalid(format!(
                "exam_threshold ({}) must be stricter than guided_threshold ({})",
                m.exam_threshold, m.guided_threshold
            )));
        }
        if !(m.reset_delay_secs.is_finite() && m.reset_delay_secs >= 0.0) {
            return Err(ConfigError::Invalid("reset_delay_secs must be >= 0".into()));
        }
        if self.burst.max_live == 0 {
            return Err(ConfigError::Invalid("burst.max_live must be at least 1".into()));
        }
        let c = &self.chime;
        if c.channel > 15 || c.program > 127 || c.velocity > 127 {
            return Err(ConfigError::Invalid("chime channel 0–15, program/velocity 0–127".into()));
        }
        let w = &self.window;
        if w.width < 480 || w.height < 320 || w.fps == 0 {
            return Err(ConfigError::Invalid("window must be at least 480×320 at 1+ fps".into()));
        }
        Ok(())
    }

    /// Curriculum ids resolved against `registry`.  Unknown and repeated
    /// ids are dropped with a warning; an empty result is an error.
    pub fn curriculum_ids(&self, registry: &PathRegistry) -> Result<Vec<String>, ConfigError> {
        let ids: Vec<String> = if self.curriculum.order.is_empty() {
            registry.ids().into_iter().map(str::to_string).collect()
        } else {
            let mut seen = HashSet::new();
            self.curriculum.order.iter()
                .filter(|id| {
                    if !registry.contains(id) {
                        warn!(spell = %id, "curriculum entry not in registry, skipped");
                        return false;
                    }
                    if !seen.insert(id.as_str()) {
                        warn!(spell = %id, "curriculum entry repeated, skipped");
                        return false;
                    }
                    true
                })
                .cloned()
                .collect()
        };
        if ids.is_empty() {
            return Err(ConfigError::Invalid("curriculum has no known spells".into()));
        }
        Ok(ids)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(CasterConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(CasterConfig::from_toml_str("").unwrap(), CasterConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = CasterConfig::from_toml_str(
            "[matcher]\norder = \"strict\"\norigin = \"fixed\"\nfixed_origin = [1.0, 2.0, 0.0]\n",
        ).unwrap();
        let m = cfg.matcher.to_match_config();
        assert_eq!(m.order, OrderPolicy::Strict);
        assert_eq!(m.origin, CastOrigin::Fixed(Vec3::new(1.0, 2.0, 0.0)));
        assert_eq!(m.guided_threshold, 0.08);
        assert_eq!(cfg.window, WindowSection::default());
    }

    #[test]
    fn exam_threshold_must_be_stricter() {
        let err = CasterConfig::from_toml_str(
            "[matcher]\nguided_threshold = 0.05\nexam_threshold = 0.08\n",
        ).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = CasterConfig::from_toml_str("[matcher\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn unknown_order_value_rejected() {
        let err = CasterConfig::from_toml_str("[matcher]\norder = \"sometimes\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = CasterConfig::load(Path::new("/nonexistent/wand_caster.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn curriculum_filters_unknown_ids() {
        let cfg = CasterConfig::from_toml_str(
            "[curriculum]\norder = [\"protego\", \"avada\", \"lumos\"]\n",
        ).unwrap();
        let ids = cfg.curriculum_ids(&PathRegistry::builtin()).unwrap();
        assert_eq!(ids, vec!["protego".to_string(), "lumos".to_string()]);
    }

    #[test]
    fn curriculum_keeps_first_of_repeated_ids() {
        let cfg = CasterConfig::from_toml_str(
            "[curriculum]\norder = [\"lumos\", \"lumos\", \"accio\", \"lumos\"]\n",
        ).unwrap();
        let ids = cfg.curriculum_ids(&PathRegistry::builtin()).unwrap();
        assert_eq!(ids, vec!["lumos".to_string(), "accio".to_string()]);
    }

    #[test]
    fn curriculum_defaults_to_registry_order() {
        let reg = PathRegistry::builtin();
        let ids = CasterConfig::default().curriculum_ids(&reg).unwrap();
        assert_eq!(ids.first().map(String::as_str), Some("lumos"));
        assert_eq!(ids.len(), reg.len());
    }

    #[test]
    fn curriculum_of_only_unknowns_is_invalid() {
        let cfg = CasterConfig::from_toml_str("[curriculum]\norder = [\"avada\"]\n").unwrap();
        assert!(cfg.curriculum_ids(&PathRegistry::builtin()).is_err());
    }

    #[test]
    fn example_config_is_valid() {
        let cfg = CasterConfig::from_toml_str(include_str!("../caster.example.toml")).unwrap();
        let mut reg = PathRegistry::builtin();
        for s in cfg.spells.clone() { reg.register(s).unwrap(); }
        assert_eq!(cfg.curriculum_ids(&reg).unwrap().last().map(String::as_str), Some("glacius"));
    }

    #[test]
    fn extra_spells_parse() {
        let cfg = CasterConfig::from_toml_str(r#"
            [[spells]]
            id     = "glacius"
            name   = "Glacius"
            color  = 0xFFAEEBFF
            points = [
                { x = 0.3, y = 0.3, checkpoint = true, label = "start" },
                { x = 0.5, y = 0.5 },
                { x = 0.7, y = 0.7, checkpoint = true },
            ]
        "#).unwrap();
        let spell = &cfg.spells[0];
        assert_eq!(spell.checkpoint_indices(), vec![0, 2]);
        assert_eq!(spell.color, 0xFFAEEBFF);
        assert!(spell.validate().is_ok());
    }
}
