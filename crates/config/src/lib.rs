//! Configuration loading, validation, and management for Storyverse.
//!
//! Loads configuration from `~/.storyverse/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.storyverse/config.toml`. Relative paths are resolved
/// against the configuration directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Universe document location
    #[serde(default)]
    pub universe: UniverseConfig,

    /// Where generated images, documents and the history ledger go
    #[serde(default)]
    pub outputs: OutputsConfig,

    /// Story generation (LLM) settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Image generation (diffusion) settings
    #[serde(default)]
    pub image: ImageConfig,

    /// Entity matching policy
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Bounds on the context handed to the generator
    #[serde(default)]
    pub context: ContextConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseConfig {
    #[serde(default = "default_universe_path")]
    pub path: String,
}

fn default_universe_path() -> String {
    "universe.json".into()
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            path: default_universe_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputsConfig {
    #[serde(default = "default_base_dir")]
    pub base_dir: String,

    /// Story images, one sub-directory per story (relative to `base_dir`)
    #[serde(default = "default_images_dir")]
    pub images_dir: String,

    /// Composed documents (relative to `base_dir`)
    #[serde(default = "default_documents_dir")]
    pub documents_dir: String,

    #[serde(default = "default_ledger_path")]
    pub ledger_path: String,

    /// Format of composed story documents
    #[serde(default)]
    pub document_format: DocumentFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    #[default]
    Pdf,
    Markdown,
}

fn default_base_dir() -> String {
    "output".into()
}
fn default_images_dir() -> String {
    "story_images".into()
}
fn default_documents_dir() -> String {
    "documents".into()
}
fn default_ledger_path() -> String {
    "history.jsonl".into()
}

impl Default for OutputsConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            images_dir: default_images_dir(),
            documents_dir: default_documents_dir(),
            ledger_path: default_ledger_path(),
            document_format: DocumentFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// OpenAI-compatible endpoint of the local LLM service
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_word_count")]
    pub default_word_count: u32,

    #[serde(default = "default_min_word_count")]
    pub min_word_count: u32,

    #[serde(default = "default_max_word_count")]
    pub max_word_count: u32,
}

fn default_ollama_url() -> String {
    "http://localhost:11434/v1".into()
}
fn default_model() -> String {
    "mistral".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_generation_timeout() -> u64 {
    180
}
fn default_word_count() -> u32 {
    200
}
fn default_min_word_count() -> u32 {
    100
}
fn default_max_word_count() -> u32 {
    1000
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_generation_timeout(),
            default_word_count: default_word_count(),
            min_word_count: default_min_word_count(),
            max_word_count: default_max_word_count(),
        }
    }
}

impl GenerationConfig {
    /// Clamp a requested word count into the configured range.
    pub fn word_count(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_word_count)
            .clamp(self.min_word_count, self.max_word_count)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// txt2img endpoint of the local diffusion service
    #[serde(default = "default_image_url")]
    pub base_url: String,

    #[serde(default = "default_size")]
    pub default_size: u32,

    #[serde(default = "default_min_size")]
    pub min_size: u32,

    #[serde(default = "default_max_size")]
    pub max_size: u32,

    #[serde(default = "default_size_step")]
    pub size_step: u32,

    #[serde(default = "default_inference_steps")]
    pub inference_steps: u32,

    #[serde(default)]
    pub guidance_scale: f32,

    #[serde(default = "default_images_per_prompt")]
    pub images_per_prompt: u32,

    #[serde(default = "default_image_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub style: StyleConfig,
}

fn default_image_url() -> String {
    "http://127.0.0.1:7860".into()
}
fn default_size() -> u32 {
    512
}
fn default_min_size() -> u32 {
    256
}
fn default_max_size() -> u32 {
    1024
}
fn default_size_step() -> u32 {
    64
}
fn default_inference_steps() -> u32 {
    1
}
fn default_images_per_prompt() -> u32 {
    1
}
fn default_image_timeout() -> u64 {
    300
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            base_url: default_image_url(),
            default_size: default_size(),
            min_size: default_min_size(),
            max_size: default_max_size(),
            size_step: default_size_step(),
            inference_steps: default_inference_steps(),
            guidance_scale: 0.0,
            images_per_prompt: default_images_per_prompt(),
            timeout_secs: default_image_timeout(),
            style: StyleConfig::default(),
        }
    }
}

/// Style fragments and weights combined into the diffusion prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleConfig {
    #[serde(default = "default_base_style")]
    pub base_style: String,

    #[serde(default = "default_quality_boost")]
    pub quality_boost: String,

    #[serde(default = "default_main_weight")]
    pub main_weight: f32,

    #[serde(default = "default_style_weight")]
    pub style_weight: f32,

    #[serde(default = "default_scene_weight")]
    pub scene_weight: f32,

    #[serde(default = "default_quality_weight")]
    pub quality_weight: f32,
}

fn default_base_style() -> String {
    "colorful children's book art, soft lighting, friendly faces".into()
}
fn default_quality_boost() -> String {
    "high quality, detailed, vibrant colors".into()
}
fn default_main_weight() -> f32 {
    1.0
}
fn default_style_weight() -> f32 {
    0.8
}
fn default_scene_weight() -> f32 {
    0.6
}
fn default_quality_weight() -> f32 {
    0.4
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            base_style: default_base_style(),
            quality_boost: default_quality_boost(),
            main_weight: default_main_weight(),
            style_weight: default_style_weight(),
            scene_weight: default_scene_weight(),
            quality_weight: default_quality_weight(),
        }
    }
}

/// Fuzzy entity matching policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Minimum similarity (0.0–1.0) for a fuzzy match
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Required gap between the best and the runner-up candidate
    #[serde(default = "default_separation_margin")]
    pub separation_margin: f32,
}

fn default_similarity_threshold() -> f32 {
    0.85
}
fn default_separation_margin() -> f32 {
    0.1
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            separation_margin: default_separation_margin(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_max_related_entities")]
    pub max_related_entities: usize,

    #[serde(default = "default_max_relationships")]
    pub max_relationships: usize,

    /// Token budget for the rendered context; 0 disables the budget
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,
}

fn default_max_related_entities() -> usize {
    8
}
fn default_max_relationships() -> usize {
    16
}
fn default_token_budget() -> usize {
    1024
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_related_entities: default_max_related_entities(),
            max_relationships: default_max_relationships(),
            token_budget: default_token_budget(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.storyverse/config.toml).
    ///
    /// Environment variable overrides (highest priority):
    /// - `STORYVERSE_UNIVERSE`: universe document path
    /// - `STORYVERSE_MODEL`: generation model
    /// - `STORYVERSE_OLLAMA_URL`: generation endpoint
    /// - `STORYVERSE_IMAGE_URL`: diffusion endpoint
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// [`AppConfig::load`]).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("STORYVERSE_UNIVERSE") {
            self.universe.path = path;
        }
        if let Some(model) = lookup("STORYVERSE_MODEL") {
            self.generation.model = model;
        }
        if let Some(url) = lookup("STORYVERSE_OLLAMA_URL") {
            self.generation.base_url = url;
        }
        if let Some(url) = lookup("STORYVERSE_IMAGE_URL") {
            self.image.base_url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".storyverse")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Resolve a configured path against the configuration directory.
    pub fn resolve(path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            path
        } else {
            Self::config_dir().join(path)
        }
    }

    pub fn universe_path(&self) -> PathBuf {
        Self::resolve(&self.universe.path)
    }

    pub fn ledger_path(&self) -> PathBuf {
        Self::resolve(&self.outputs.ledger_path)
    }

    pub fn images_dir(&self) -> PathBuf {
        Self::resolve(&self.outputs.base_dir).join(&self.outputs.images_dir)
    }

    pub fn documents_dir(&self) -> PathBuf {
        Self::resolve(&self.outputs.base_dir).join(&self.outputs.documents_dir)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.universe.path.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "universe.path must not be empty".into(),
            ));
        }

        let generation = &self.generation;
        if !(0.0..=2.0).contains(&generation.temperature) {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if generation.timeout_secs == 0 || self.image.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts must be greater than 0".into(),
            ));
        }
        if generation.min_word_count == 0
            || generation.min_word_count > generation.max_word_count
            || !(generation.min_word_count..=generation.max_word_count)
                .contains(&generation.default_word_count)
        {
            return Err(ConfigError::ValidationError(
                "generation word counts must satisfy 0 < min <= default <= max".into(),
            ));
        }

        let image = &self.image;
        if image.size_step == 0
            || image.min_size < image.size_step
            || image.min_size > image.max_size
            || !(image.min_size..=image.max_size).contains(&image.default_size)
        {
            return Err(ConfigError::ValidationError(
                "image sizes must satisfy step <= min <= default <= max".into(),
            ));
        }
        if image.inference_steps == 0 || image.images_per_prompt == 0 {
            return Err(ConfigError::ValidationError(
                "image.inference_steps and image.images_per_prompt must be at least 1".into(),
            ));
        }

        let resolver = &self.resolver;
        if !(0.0..=1.0).contains(&resolver.similarity_threshold)
            || !(0.0..=1.0).contains(&resolver.separation_margin)
        {
            return Err(ConfigError::ValidationError(
                "resolver threshold and margin must be between 0.0 and 1.0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.generation.model, "mistral");
        assert_eq!(config.generation.base_url, "http://localhost:11434/v1");
        assert_eq!(config.image.default_size, 512);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.generation.model, config.generation.model);
        assert_eq!(parsed.image.size_step, config.image.size_step);
        assert_eq!(parsed.context.max_relationships, config.context.max_relationships);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[generation]\nmodel = \"llama3\"\n\n[resolver]\nsimilarity_threshold = 0.9"
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.generation.model, "llama3");
        assert_eq!(config.generation.default_word_count, 200);
        assert!((config.resolver.similarity_threshold - 0.9).abs() < f32::EPSILON);
        assert!((config.resolver.separation_margin - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn document_format_defaults_to_pdf() {
        assert_eq!(AppConfig::default().outputs.document_format, DocumentFormat::Pdf);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[outputs]\ndocument_format = \"markdown\"").unwrap();
        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.outputs.document_format, DocumentFormat::Markdown);
        assert_eq!(config.outputs.documents_dir, "documents");
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.generation.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn image_size_range_validated() {
        let mut config = AppConfig::default();
        config.image.default_size = 2048;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn parse_error_carries_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[generation\nmodel = ").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().universe.path, "universe.json");
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| match key {
            "STORYVERSE_MODEL" => Some("phi3".into()),
            "STORYVERSE_UNIVERSE" => Some("/tmp/u.json".into()),
            _ => None,
        });
        assert_eq!(config.generation.model, "phi3");
        assert_eq!(config.universe_path(), PathBuf::from("/tmp/u.json"));
        assert_eq!(config.image.base_url, "http://127.0.0.1:7860");
    }

    #[test]
    fn word_count_is_clamped() {
        let generation = GenerationConfig::default();
        assert_eq!(generation.word_count(None), 200);
        assert_eq!(generation.word_count(Some(5000)), 1000);
        assert_eq!(generation.word_count(Some(10)), 100);
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("mistral"));
        assert!(toml_str.contains("similarity_threshold"));
    }
}
