/// `load_config` module: reads the static YAML config and injects secrets from the environment.
///
/// The YAML file carries no secrets. The completion service key is only ever
/// read from `LLM_API_KEY`, which may come from a `.env` file.
///
/// # Errors
/// All errors use `anyhow::Error` with the offending path or variable named,
/// and are surfaced at the CLI boundary.
///
/// Accepted schema (every section and key is optional):
///
/// ```yaml
/// generation:
///   model: meta-llama/llama-4-scout-17b-16e-instruct
///   max_input_chars: 30000
///   timeout_secs: 120
/// regeneration:
///   timeout_secs: 30
/// export:
///   output_dir: ./exports
///   watermark: Bell Confidential
/// services:
///   completion_url: https://api.groq.com/openai/v1/chat/completions
///   render_url: http://localhost:8000/api/pptx
/// templates:
///   layout_map: ./template-maps.json
/// ```
use anyhow::{Context, Result};
use deckwright_core::config::{Config, ExportSettings, GenerationSettings, RegenerationSettings};
use deckwright_core::template::TemplateLayoutMap;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const API_KEY_ENV: &str = "LLM_API_KEY";
pub const DEFAULT_COMPLETION_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_RENDER_URL: &str = "http://localhost:8000/api/pptx";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServicesSection {
    pub completion_url: String,
    pub render_url: String,
}

impl Default for ServicesSection {
    fn default() -> Self {
        Self {
            completion_url: DEFAULT_COMPLETION_URL.to_string(),
            render_url: DEFAULT_RENDER_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TemplatesSection {
    /// Replaces the bundled layout map when set.
    pub layout_map: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub pipeline: Config,
    pub services: ServicesSection,
    pub templates: TemplatesSection,
    /// From `LLM_API_KEY`; only commands that call the completion service need it.
    pub api_key: Option<String>,
}

impl CliConfig {
    /// Defaults plus the environment secret, for runs without a config file.
    pub fn from_env() -> Self {
        Self {
            api_key: read_api_key(),
            ..Self::default()
        }
    }

    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref() {
            Some(key) => Ok(key),
            None => {
                error!(env = API_KEY_ENV, "API key missing in environment");
                Err(anyhow::anyhow!(
                    "{API_KEY_ENV} is not set; add it to the environment or a .env file"
                ))
            }
        }
    }

    /// The configured layout map, or the bundled one.
    pub fn layout_map(&self) -> Result<TemplateLayoutMap> {
        match &self.templates.layout_map {
            Some(path) => TemplateLayoutMap::load(path)
                .with_context(|| format!("Failed to load template layout map {path:?}")),
            None => Ok(TemplateLayoutMap::bundled()),
        }
    }
}

fn read_api_key() -> Option<String> {
    env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    generation: GenerationSettings,
    regeneration: RegenerationSettings,
    export: ExportSettings,
    services: ServicesSection,
    templates: TemplatesSection,
}

/// Loads a static YAML config file and injects the API key from the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty file is a valid, all-defaults config.
    let raw: RawConfig = if config_content.trim().is_empty() {
        RawConfig::default()
    } else {
        match serde_yaml::from_str(&config_content) {
            Ok(conf) => {
                info!(config_path = ?path_ref, "Parsed config YAML successfully");
                conf
            }
            Err(e) => {
                error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
                return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
            }
        }
    };

    let pipeline = Config {
        generation: raw.generation,
        regeneration: raw.regeneration,
        export: raw.export,
    };
    pipeline.trace_loaded();

    Ok(CliConfig {
        pipeline,
        services: raw.services,
        templates: raw.templates,
        api_key: read_api_key(),
    })
}
