//! Engine configuration.
//!
//! Defaults are embedded at compile time from `config/defaults.toml`. A
//! user TOML file may override any subset of keys; environment variables
//! override both.

use std::path::Path;

use safezone_scoring::adapter::ScoringPolicy;
use serde::Deserialize;
use thiserror::Error;

use crate::merger::MergerConfig;
use crate::sampler::SamplerConfig;
use crate::shaper::ShaperConfig;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("../config/defaults.toml");

/// URL of the remote scoring service.
pub const ENV_SCORER_URL: &str = "SAFEZONE_SCORER_URL";
/// Per-call scorer timeout in milliseconds.
pub const ENV_SCORER_TIMEOUT_MS: &str = "SAFEZONE_SCORER_TIMEOUT_MS";
/// Sampling RNG seed.
pub const ENV_SEED: &str = "SAFEZONE_SEED";
/// Debounce window in milliseconds.
pub const ENV_DEBOUNCE_MS: &str = "SAFEZONE_DEBOUNCE_MS";

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML or has the wrong shape.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override could not be parsed.
    #[error("Invalid value for {var}: {value:?}")]
    Env {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },

    /// A value is outside its allowed range.
    #[error("Invalid config value {key}: {reason}")]
    Invalid {
        /// Dotted config key.
        key: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Run-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Quiet period before a viewport change triggers a run.
    pub debounce_ms: u64,
    /// Seed for the sampling jitter RNG.
    pub seed: u64,
    /// Remote scoring service URL. `None` scores offline.
    pub scorer_url: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 3000,
            seed: 42,
            scorer_url: None,
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Viewport sampling.
    pub sampler: SamplerConfig,
    /// Cell polygon shaping.
    pub shaper: ShaperConfig,
    /// Region merging.
    pub merger: MergerConfig,
    /// Scorer call policy.
    pub scoring: ScoringPolicy,
    /// Run-level settings.
    pub engine: EngineSettings,
}

fn check(ok: bool, key: &'static str, reason: &'static str) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Invalid { key, reason })
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}

impl EngineConfig {
    /// The embedded defaults.
    ///
    /// # Panics
    ///
    /// Panics if the embedded `defaults.toml` is malformed, which is a
    /// build-time invariant.
    #[must_use]
    pub fn embedded() -> Self {
        toml::de::from_str(DEFAULTS_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse embedded defaults.toml: {e}"))
    }

    /// Parses a TOML document. Missing keys take their default values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is malformed.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::de::from_str(content)?)
    }

    /// Loads `path` if given, otherwise the embedded defaults, then applies
    /// environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, an
    /// environment override is malformed, or a value is out of range.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                log::debug!("Loading config from {}", path.display());
                Self::from_toml(&std::fs::read_to_string(path)?)?
            }
            None => Self::embedded(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies the `SAFEZONE_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] if a numeric variable does not parse.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|var| std::env::var(var).ok())
    }

    /// Applies overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] if a numeric variable does not parse.
    pub fn apply_overrides_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup(ENV_SCORER_URL).filter(|u| !u.trim().is_empty()) {
            self.engine.scorer_url = Some(url.trim().to_string());
        }
        if let Some(value) = lookup(ENV_SCORER_TIMEOUT_MS) {
            self.scoring.timeout_ms = parse_env(ENV_SCORER_TIMEOUT_MS, value)?;
        }
        if let Some(value) = lookup(ENV_SEED) {
            self.engine.seed = parse_env(ENV_SEED, value)?;
        }
        if let Some(value) = lookup(ENV_DEBOUNCE_MS) {
            self.engine.debounce_ms = parse_env(ENV_DEBOUNCE_MS, value)?;
        }
        Ok(())
    }

    /// Checks every value against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.sampler;
        check(
            s.base_grid_size_deg.is_finite() && s.base_grid_size_deg > 0.0,
            "sampler.base_grid_size_deg",
            "must be positive",
        )?;
        check(s.zoom_threshold.is_finite(), "sampler.zoom_threshold", "must be finite")?;
        check(
            s.zoom_factor.is_finite() && s.zoom_factor >= 1.0,
            "sampler.zoom_factor",
            "must be at least 1",
        )?;
        check(
            (0.0..=0.5).contains(&s.jitter_fraction),
            "sampler.jitter_fraction",
            "must be within [0, 0.5]",
        )?;
        check(s.max_steps_per_axis > 0, "sampler.max_steps_per_axis", "must be positive")?;
        check(
            s.priority_falloff_deg.is_finite() && s.priority_falloff_deg > 0.0,
            "sampler.priority_falloff_deg",
            "must be positive",
        )?;
        check(
            (0.0..=1.0).contains(&s.min_priority),
            "sampler.min_priority",
            "must be within [0, 1]",
        )?;

        let sh = &self.shaper;
        check(sh.vertex_count >= 3, "shaper.vertex_count", "must be at least 3")?;
        check(
            sh.radius_scale.is_finite() && sh.radius_scale > 0.0,
            "shaper.radius_scale",
            "must be positive",
        )?;
        check(
            (0.0..=180.0).contains(&sh.probe_angle_deg),
            "shaper.probe_angle_deg",
            "must be within [0, 180]",
        )?;
        check(
            sh.clamp_fraction > 0.0 && sh.clamp_fraction <= 1.0,
            "shaper.clamp_fraction",
            "must be within (0, 1]",
        )?;

        check(
            self.merger.max_score_delta.is_finite() && self.merger.max_score_delta >= 0.0,
            "merger.max_score_delta",
            "must be non-negative",
        )?;

        let p = &self.scoring;
        check(
            (0.0..=1.0).contains(&p.priority_threshold),
            "scoring.priority_threshold",
            "must be within [0, 1]",
        )?;
        check(p.concurrency > 0, "scoring.concurrency", "must be positive")?;
        check(p.bucket_capacity > 0, "scoring.bucket_capacity", "must be positive")?;
        check(p.refill_interval_ms > 0, "scoring.refill_interval_ms", "must be positive")?;
        check(p.timeout_ms > 0, "scoring.timeout_ms", "must be positive")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn embedded_defaults_match_code_defaults() {
        assert_eq!(EngineConfig::embedded(), EngineConfig::default());
        EngineConfig::embedded().validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = EngineConfig::from_toml(
            "[merger]\nmax_score_delta = 5.0\n\n[engine]\nscorer_url = \"http://localhost:9000/score\"\n",
        )
        .unwrap();

        assert!((config.merger.max_score_delta - 5.0).abs() < f64::EPSILON);
        assert_eq!(
            config.engine.scorer_url.as_deref(),
            Some("http://localhost:9000/score")
        );
        assert_eq!(config.sampler, SamplerConfig::default());
        assert_eq!(config.engine.seed, 42);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(matches!(
            EngineConfig::from_toml("[sampler\nbase_grid_size_deg = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            (ENV_SCORER_URL, " http://scorer/score "),
            (ENV_SCORER_TIMEOUT_MS, "750"),
            (ENV_SEED, "7"),
            (ENV_DEBOUNCE_MS, "100"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config
            .apply_overrides_from(|v| vars.get(v).map(ToString::to_string))
            .unwrap();

        assert_eq!(config.engine.scorer_url.as_deref(), Some("http://scorer/score"));
        assert_eq!(config.scoring.timeout_ms, 750);
        assert_eq!(config.engine.seed, 7);
        assert_eq!(config.engine.debounce_ms, 100);
    }

    #[test]
    fn bad_env_value_is_reported() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_overrides_from(|v| (v == ENV_SEED).then(|| "forty-two".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: ENV_SEED, .. }));
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut config = EngineConfig::default();
        config.sampler.base_grid_size_deg = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "sampler.base_grid_size_deg", .. })
        ));

        let mut config = EngineConfig::default();
        config.scoring.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.shaper.vertex_count = 2;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.scoring.priority_threshold = 1.5;
        assert!(config.validate().is_err());
    }
}
