//! Application configuration for docdigest.
//!
//! User config lives at `~/.docdigest/docdigest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DigestError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docdigest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docdigest";

// ---------------------------------------------------------------------------
// Config structs (matching docdigest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Ollama chat backend settings.
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Tika extraction server settings.
    #[serde(default)]
    pub tika: TikaConfig,

    /// Chunk splitter settings.
    #[serde(default)]
    pub splitter: SplitConfig,
}

/// `[ollama]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server.
    #[serde(default = "default_ollama_host")]
    pub host: String,

    /// Model used for every map and reduce query.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default)]
    pub temperature: f32,

    /// Context window size; also the reduce stage's token budget.
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,

    /// Fixed seed so reruns are reproducible.
    #[serde(default = "default_seed")]
    pub seed: i64,

    /// Tokens to predict (-1 infinite, -2 fill context).
    #[serde(default = "default_num_predict")]
    pub num_predict: i32,

    /// How long the model stays loaded (-1 keeps it resident).
    #[serde(default = "default_keep_alive")]
    pub keep_alive: i64,

    /// Top-k sampling cutoff; model default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    /// Nucleus sampling; model default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            model: default_model(),
            temperature: 0.0,
            num_ctx: default_num_ctx(),
            seed: default_seed(),
            num_predict: default_num_predict(),
            keep_alive: default_keep_alive(),
            top_k: None,
            top_p: None,
        }
    }
}

fn default_ollama_host() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "phi4".into()
}
fn default_num_ctx() -> u32 {
    37_500
}
fn default_seed() -> i64 {
    3
}
fn default_num_predict() -> i32 {
    -2
}
fn default_keep_alive() -> i64 {
    -1
}

/// `[tika]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TikaConfig {
    /// Base URL of the Tika server.
    #[serde(default = "default_tika_endpoint")]
    pub endpoint: String,

    /// Per-file request timeout in seconds.
    #[serde(default = "default_tika_timeout")]
    pub timeout_secs: u64,
}

impl Default for TikaConfig {
    fn default() -> Self {
        Self {
            endpoint: default_tika_endpoint(),
            timeout_secs: default_tika_timeout(),
        }
    }
}

fn default_tika_endpoint() -> String {
    "http://localhost:9998".into()
}
fn default_tika_timeout() -> u64 {
    300
}

/// `[splitter]` section, also used as the runtime split configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Maximum segment length in characters; also the batching ceiling.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap carried between adjacent segments, in characters.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl SplitConfig {
    /// Check `0 <= chunk_overlap < chunk_size`.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(DigestError::validation("chunk_size must be positive"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(DigestError::validation(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

fn default_chunk_size() -> usize {
    100_000
}
fn default_chunk_overlap() -> usize {
    100
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docdigest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| DigestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docdigest/docdigest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DigestError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DigestError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DigestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DigestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DigestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that both service endpoints parse as http(s) URLs.
pub fn validate_endpoints(config: &AppConfig) -> Result<()> {
    let endpoints = [
        ("ollama.host", &config.ollama.host),
        ("tika.endpoint", &config.tika.endpoint),
    ];
    for (name, raw) in endpoints {
        let url = Url::parse(raw)
            .map_err(|e| DigestError::config(format!("{name} '{raw}' is not a valid URL: {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(DigestError::config(format!(
                "{name} '{raw}' must use http or https"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("num_ctx"));
        assert!(toml_str.contains("localhost:9998"));
        assert!(!toml_str.contains("top_k"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let toml_str = r#"
[ollama]
model = "llama3.1"
top_p = 0.9

[splitter]
chunk_size = 65000
chunk_overlap = 0
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.ollama.model, "llama3.1");
        assert_eq!(config.ollama.top_p, Some(0.9));
        assert_eq!(config.ollama.num_ctx, 37_500);
        assert_eq!(config.ollama.seed, 3);
        assert_eq!(config.tika.endpoint, "http://localhost:9998");
        assert_eq!(config.splitter.chunk_size, 65_000);
        assert_eq!(config.splitter.chunk_overlap, 0);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[tika]\ntimeout_secs = 5\n").expect("write");

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.tika.timeout_secs, 5);

        std::fs::write(&path, "[tika\n").expect("write");
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn split_config_validation() {
        assert!(SplitConfig::default().validate().is_ok());
        let bad = SplitConfig {
            chunk_size: 10,
            chunk_overlap: 10,
        };
        assert!(bad.validate().is_err());
        let zero = SplitConfig {
            chunk_size: 0,
            chunk_overlap: 0,
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn endpoint_validation() {
        let mut config = AppConfig::default();
        assert!(validate_endpoints(&config).is_ok());

        config.tika.endpoint = "ftp://localhost:9998".into();
        let err = validate_endpoints(&config).unwrap_err();
        assert!(err.to_string().contains("tika.endpoint"));

        config.tika.endpoint = "not a url".into();
        assert!(validate_endpoints(&config).is_err());
    }
}
