// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Settings file for emotransform.
//!
//! Every field has a default, so an empty file (or no file at all) gives
//! the documented rule constants and leaves harmonization off.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::emotion::RuleSettings;
use crate::harmonize::HarmonizerSettings;
use crate::music::Key;

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Directory transformed scores are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Key to use instead of detecting one (e.g. "D minor")
    #[serde(default)]
    pub key: Option<String>,

    #[serde(default)]
    pub rules: RuleSettings,

    #[serde(default)]
    pub harmonizer: HarmonizerSettings,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            key: None,
            rules: RuleSettings::default(),
            harmonizer: HarmonizerSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate settings from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // serde_yaml reads an empty document as null
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Self = serde_yaml::from_str(yaml).context("Failed to parse YAML configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration to YAML")
    }

    /// Save settings to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))
    }

    /// Configured key, if one is set
    pub fn fixed_key(&self) -> Result<Option<Key>> {
        self.key
            .as_deref()
            .map(|k| k.parse::<Key>().with_context(|| format!("Invalid key in config: {:?}", k)))
            .transpose()
    }

    /// Reject values the rules cannot work with
    pub fn validate(&self) -> Result<()> {
        let rules = &self.rules;
        for (name, value) in [
            ("rules.slowed_bpm", rules.slowed_bpm),
            ("rules.echo_length", rules.echo_length),
            ("rules.long_note", rules.long_note),
            ("rules.short_note", rules.short_note),
            ("harmonizer.restored_tempo_bpm", self.harmonizer.restored_tempo_bpm),
        ] {
            if !(value.is_finite() && value > 0.0) {
                bail!("{} must be a positive number, got {}", name, value);
            }
        }
        if !(rules.echo_offset.is_finite() && rules.echo_offset >= 0.0) {
            bail!("rules.echo_offset must not be negative, got {}", rules.echo_offset);
        }
        self.fixed_key()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::Mode;
    use tempfile::tempdir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let settings = Settings::from_yaml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.rules.slowed_bpm, 60.0);
        assert!(!settings.harmonizer.enabled);
        assert_eq!(settings.fixed_key().unwrap(), None);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
output_dir: "out/emotions"
key: "D minor"

rules:
  slowed_bpm: 54
  echo_length: 0.25

harmonizer:
  enabled: true
  container: "harmony"
  restored_tempo_bpm: 72
"#;

        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.output_dir, PathBuf::from("out/emotions"));
        assert_eq!(settings.rules.slowed_bpm, 54.0);
        assert_eq!(settings.rules.echo_length, 0.25);
        assert_eq!(settings.rules.long_note, 2.0);
        assert!(settings.harmonizer.enabled);
        assert_eq!(settings.harmonizer.container, "harmony");
        assert_eq!(settings.harmonizer.restored_tempo_bpm, 72.0);

        let key = settings.fixed_key().unwrap().unwrap();
        assert_eq!(key.mode, Mode::Minor);
        assert_eq!(key.to_string(), "D minor");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Settings::from_yaml("rules:\n  slowed_bpm: 0\n").is_err());
        assert!(Settings::from_yaml("rules:\n  echo_offset: -1\n").is_err());
        assert!(Settings::from_yaml("key: \"H major\"\n").is_err());
        assert!(Settings::from_yaml("this is not valid yaml: [").is_err());
    }

    #[test]
    fn test_round_trip() {
        let mut settings = Settings::default();
        settings.key = Some("Eb major".to_string());
        settings.rules.short_note = 0.5;

        let yaml = settings.to_yaml().unwrap();
        assert_eq!(Settings::from_yaml(&yaml).unwrap(), settings);
    }

    #[test]
    fn test_load_and_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("emotransform.yaml");

        let mut settings = Settings::default();
        settings.harmonizer.enabled = true;
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert!(loaded.harmonizer.enabled);
        assert!(Settings::load(dir.path().join("missing.yaml")).is_err());
    }
}
