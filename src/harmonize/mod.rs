// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Four-part harmonization through an external container.
//!
//! The transformed MusicXML is copied into the container, harmonized by a
//! trained model, copied back as `<stem>_harm.xml`, patched and rendered to
//! `<stem>_harm.mid`. Every step blocks on the container; there is no
//! timeout.

pub mod patch;
pub mod runner;

pub use patch::{finish_harmonized, patch_midi_instrument, restore_tempo};
pub use runner::{CommandRunner, ProcessRunner};

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::emotion::Emotion;

/// Container and model locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarmonizerSettings {
    /// Run harmonization after every transformation
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_container")]
    pub container: String,

    /// Working folder inside the container
    #[serde(default = "default_remote_folder")]
    pub remote_folder: String,

    #[serde(default = "default_script")]
    pub script: String,

    /// Model checkpoint passed to the script
    #[serde(default = "default_checkpoint")]
    pub checkpoint: String,

    /// Where the script leaves its result
    #[serde(default = "default_decode_file")]
    pub decode_file: String,

    /// Tempo put back for AWE and SADNESS output
    #[serde(default = "default_restored_tempo")]
    pub restored_tempo_bpm: f64,
}

fn default_container() -> String {
    "bachbot".to_string()
}

fn default_remote_folder() -> String {
    "/root/bachbot/emo_src/".to_string()
}

fn default_script() -> String {
    "/root/bachbot/scripts/harmonize_melody.zsh".to_string()
}

fn default_checkpoint() -> String {
    "/root/bachbot/scratch/checkpoints/trained_model/checkpoint_5000.t7".to_string()
}

fn default_decode_file() -> String {
    "/root/bachbot/scratch/out/decode.xml".to_string()
}

fn default_restored_tempo() -> f64 {
    80.0
}

impl Default for HarmonizerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            container: default_container(),
            remote_folder: default_remote_folder(),
            script: default_script(),
            checkpoint: default_checkpoint(),
            decode_file: default_decode_file(),
            restored_tempo_bpm: default_restored_tempo(),
        }
    }
}

impl HarmonizerSettings {
    /// Path inside the container's working folder
    fn remote(&self, file: &str) -> String {
        format!("{}/{}", self.remote_folder.trim_end_matches('/'), file)
    }
}

/// Files produced by a harmonization round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Harmonized {
    pub xml_path: PathBuf,
    pub midi_path: PathBuf,
}

/// Turns a transformed melody into a harmonized, playable file
pub trait Harmonizer {
    /// Prepare the service; called once before the first `harmonize`
    fn start(&mut self) -> Result<()>;

    /// Harmonize the MusicXML file at `input`, writing results next to it
    fn harmonize(&mut self, input: &Path, emotion: Emotion) -> Result<Harmonized>;
}

/// Harmonizer backed by a `docker` container
pub struct ContainerHarmonizer<R = ProcessRunner> {
    runner: R,
    settings: HarmonizerSettings,
}

impl ContainerHarmonizer<ProcessRunner> {
    pub fn new(settings: HarmonizerSettings) -> Self {
        Self::with_runner(ProcessRunner, settings)
    }
}

impl<R: CommandRunner> ContainerHarmonizer<R> {
    pub fn with_runner(runner: R, settings: HarmonizerSettings) -> Self {
        Self { runner, settings }
    }

    pub fn settings(&self) -> &HarmonizerSettings {
        &self.settings
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn docker(&mut self, args: &[&str]) -> Result<()> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.runner.run("docker", &args)
    }

    fn exec(&mut self, args: &[&str]) -> Result<()> {
        let container = self.settings.container.clone();
        let mut full = vec!["exec", container.as_str()];
        full.extend_from_slice(args);
        self.docker(&full)
    }

    /// Remove remote leftovers; failures only warn
    fn clean_up(&mut self, stem: &str) {
        let mut leftovers = vec![self.settings.decode_file.clone()];
        for suffix in ["-harm.utf", ".utf", ".xml"] {
            leftovers.push(self.settings.remote(&format!("{}{}", stem, suffix)));
        }
        for file in leftovers {
            if let Err(err) = self.exec(&["rm", &file]) {
                warn!(file = %file, "cleanup failed: {:#}", err);
            }
        }
    }
}

impl<R: CommandRunner> Harmonizer for ContainerHarmonizer<R> {
    fn start(&mut self) -> Result<()> {
        let container = self.settings.container.clone();
        self.docker(&["start", &container])
            .with_context(|| format!("Failed to start container {}", container))?;
        let folder = self.settings.remote_folder.clone();
        self.exec(&["mkdir", "-p", &folder])
            .context("Failed to create remote folder")?;
        info!(container = %container, "harmonizer ready");
        Ok(())
    }

    fn harmonize(&mut self, input: &Path, emotion: Emotion) -> Result<Harmonized> {
        let file_name = input
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Not a file path: {:?}", input))?
            .to_string();
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("Not a file path: {:?}", input))?
            .to_string();
        let target_dir = input.parent().unwrap_or_else(|| Path::new("."));
        let container = self.settings.container.clone();

        let local_input = input.to_string_lossy().into_owned();
        let remote_input = format!("{}:{}", container, self.settings.remote(&file_name));
        self.docker(&["cp", local_input.as_str(), remote_input.as_str()])
            .context("Failed to copy score into container")?;

        // The script takes the remote path without its extension
        let script = self.settings.script.clone();
        let remote_stem = self.settings.remote(&stem);
        let checkpoint = self.settings.checkpoint.clone();
        self.exec(&["bash", &script, &remote_stem, &checkpoint])
            .context("Harmonization script failed")?;

        let xml_path = target_dir.join(format!("{}_harm.xml", stem));
        let local_output = xml_path.to_string_lossy().into_owned();
        let remote_output = format!("{}:{}", container, self.settings.decode_file);
        self.docker(&["cp", remote_output.as_str(), local_output.as_str()])
            .context("Failed to copy harmonized score out of container")?;

        self.clean_up(&stem);

        let midi_path = finish_harmonized(&xml_path, emotion, self.settings.restored_tempo_bpm)
            .with_context(|| format!("Failed to finish {:?}", xml_path))?;
        info!(xml = %xml_path.display(), midi = %midi_path.display(), "harmonized");
        Ok(Harmonized { xml_path, midi_path })
    }
}
