use anyhow::{bail, Context, Result};
use ledgerlens_finance::classifier::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use ledgerlens_finance::{Classifier, KeywordClassifier, LlmClassifier, LlmConfig, PipelineConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::state::ensure_ledgerlens_home;

/// Environment variable holding the chat-completions API key.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub classifier: ClassifierSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSection {
    /// "groq" (any OpenAI-compatible endpoint) or "keywords"
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Upper bound on one categorization call
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub max_concurrent_jobs: usize,
    pub poll_interval_ms: u64,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.0,
            max_tokens: 1024,
            timeout_secs: 30,
        }
    }
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            poll_interval_ms: 200,
        }
    }
}

impl Config {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_concurrent_jobs: self.pipeline.max_concurrent_jobs,
            classifier_timeout: Duration::from_secs(self.classifier.timeout_secs),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.pipeline.poll_interval_ms.max(1))
    }

    /// Pick the classifier. A missing API key falls back to keyword rules.
    pub fn build_classifier(&self, api_key: Option<String>) -> Result<Arc<dyn Classifier>> {
        match self.classifier.provider.as_str() {
            "keywords" => Ok(Arc::new(KeywordClassifier)),
            "groq" | "openai" => match api_key.filter(|k| !k.trim().is_empty()) {
                Some(key) => {
                    info!(model = %self.classifier.model, "using chat-completions classifier");
                    Ok(Arc::new(LlmClassifier::new(LlmConfig {
                        base_url: self.classifier.base_url.clone(),
                        model: self.classifier.model.clone(),
                        api_key: key,
                        temperature: self.classifier.temperature,
                        max_tokens: self.classifier.max_tokens,
                    })))
                }
                None => {
                    warn!("{API_KEY_ENV} is not set; falling back to keyword categorization");
                    Ok(Arc::new(KeywordClassifier))
                }
            },
            other => bail!("unknown classifier provider '{other}' (expected 'groq' or 'keywords')"),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_ledgerlens_home()?.join("config.toml"))
}

/// Load from `path`, or the default location. A missing file means defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let p = match path {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config(cfg: &Config, path: &Path) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn init_config(path: Option<&Path>) -> Result<()> {
    let p = match path {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default(), &p)?;
    println!("Wrote {}", p.display());
    Ok(())
}
