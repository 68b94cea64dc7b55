use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";

/// Settings for whole-deck generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Character budget for the combined source content in the prompt.
    pub max_input_chars: usize,
    /// Slide count used when no template is selected.
    pub default_slide_count: u32,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 8000,
            max_input_chars: 30_000,
            default_slide_count: 12,
            timeout_secs: 120,
        }
    }
}

impl GenerationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for single-field regeneration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub title_max_tokens: u32,
    pub bullet_max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for RegenerationSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            title_max_tokens: 100,
            bullet_max_tokens: 200,
            timeout_secs: 30,
        }
    }
}

impl RegenerationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for the export adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub timeout_secs: u64,
    /// Footer text stamped on every page when the deck is internal use only.
    pub watermark: String,
    /// Where exported files are written.
    pub output_dir: PathBuf,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            watermark: "Bell Confidential".to_string(),
            output_dir: PathBuf::from("./exports"),
        }
    }
}

impl ExportSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// All pipeline settings, as loaded from the static config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub regeneration: RegenerationSettings,
    #[serde(default)]
    pub export: ExportSettings,
}

impl Config {
    pub fn trace_loaded(&self) {
        info!(
            generation_model = %self.generation.model,
            regeneration_model = %self.regeneration.model,
            max_input_chars = self.generation.max_input_chars,
            output_dir = %self.export.output_dir.display(),
            "Loaded Config"
        );
        debug!(?self, "Config loaded (full debug)");
    }
}
