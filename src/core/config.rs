use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::state::Gender;
use crate::core::voices::{DEFAULT_FEMALE_VOICE, DEFAULT_MALE_VOICE, DEFAULT_NEUTRAL_VOICE};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_input")]
    pub input_folder: String,

    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default)]
    pub unattended: bool,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub audio: AudioConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CredentialsConfig {
    #[serde(default = "default_keys_file")]
    pub file: String,
    /// Newline-delimited keys; overrides `file` when non-blank.
    #[serde(default)]
    pub keys: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AudioConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_tts_model")]
    pub model: String,
    #[serde(default = "default_max_segment_chars")]
    pub max_segment_chars: usize,

    #[serde(default = "default_neutral_voice")]
    pub narrator_voice: String,
    #[serde(default = "default_male_voice")]
    pub default_male_voice: String,
    #[serde(default = "default_female_voice")]
    pub default_female_voice: String,
    #[serde(default = "default_neutral_voice")]
    pub default_neutral_voice: String,
}

impl AudioConfig {
    pub fn voice_for(&self, gender: Gender) -> &str {
        match gender {
            Gender::Male => &self.default_male_voice,
            Gender::Female => &self.default_female_voice,
            Gender::Neutral => &self.default_neutral_voice,
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            file: default_keys_file(),
            keys: None,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_llm_model(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_tts_model(),
            max_segment_chars: default_max_segment_chars(),
            narrator_voice: default_neutral_voice(),
            default_male_voice: default_male_voice(),
            default_female_voice: default_female_voice(),
            default_neutral_voice: default_neutral_voice(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_folder: default_input(),
            output_folder: default_output(),
            unattended: false,
            credentials: CredentialsConfig::default(),
            llm: LlmConfig::default(),
            audio: AudioConfig::default(),
        }
    }
}

fn default_input() -> String {
    "input".to_string()
}
fn default_output() -> String {
    "output".to_string()
}
fn default_keys_file() -> String {
    "api_keys.txt".to_string()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_llm_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_tts_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}
fn default_max_segment_chars() -> usize {
    4500
}
fn default_male_voice() -> String {
    DEFAULT_MALE_VOICE.to_string()
}
fn default_female_voice() -> String {
    DEFAULT_FEMALE_VOICE.to_string()
}
fn default_neutral_voice() -> String {
    DEFAULT_NEUTRAL_VOICE.to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config.yml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("{} not found. Please create one.", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        if config.audio.max_segment_chars == 0 {
            anyhow::bail!("audio.max_segment_chars must be greater than zero");
        }
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(Path::new("config.yml"))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.input_folder)?;
        fs::create_dir_all(&self.output_folder)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yml");
        fs::write(&path, "{}\n")?;

        let config = Config::load_from(&path)?;
        assert_eq!(config.input_folder, "input");
        assert_eq!(config.credentials.file, "api_keys.txt");
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert_eq!(config.audio.model, "gemini-2.5-flash-preview-tts");
        assert_eq!(config.audio.max_segment_chars, 4500);
        assert_eq!(config.audio.voice_for(Gender::Male), "Puck");
        assert_eq!(config.audio.voice_for(Gender::Female), "Kore");
        assert_eq!(config.audio.narrator_voice, "Kore");
        Ok(())
    }

    #[test]
    fn test_partial_sections_and_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yml");
        fs::write(
            &path,
            "unattended: true\ncredentials:\n  keys: |\n    k1\n    k2\naudio:\n  max_segment_chars: 1200\n  narrator_voice: Zephyr\n",
        )?;

        let config = Config::load_from(&path)?;
        assert!(config.unattended);
        assert_eq!(config.credentials.keys.as_deref(), Some("k1\nk2\n"));
        assert_eq!(config.audio.max_segment_chars, 1200);
        assert_eq!(config.audio.narrator_voice, "Zephyr");
        assert_eq!(config.audio.default_male_voice, "Puck");

        let saved = dir.path().join("saved.yml");
        config.save_to(&saved)?;
        let reloaded = Config::load_from(&saved)?;
        assert_eq!(reloaded.audio.max_segment_chars, 1200);
        assert_eq!(reloaded.credentials.keys, config.credentials.keys);
        Ok(())
    }

    #[test]
    fn test_missing_file_and_zero_segment_size_fail() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(Config::load_from(&dir.path().join("nope.yml")).is_err());

        let path = dir.path().join("config.yml");
        fs::write(&path, "audio:\n  max_segment_chars: 0\n")?;
        assert!(Config::load_from(&path).is_err());
        Ok(())
    }
}
