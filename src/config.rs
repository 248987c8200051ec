//! TOML configuration.
//!
//! Every section except `[db]` is optional and falls back to defaults, so a
//! minimal config is just the database path. Credentials are never read from
//! the file; providers pick them up from the environment when constructed.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::extract::ExtractOptions;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/lens.sqlite"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_true")]
    pub use_ocr: bool,
    #[serde(default = "default_true")]
    pub extract_tables: bool,
    #[serde(default = "default_true")]
    pub extract_charts: bool,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    /// Pages with fewer non-whitespace characters than this are OCR'd.
    #[serde(default = "default_min_native_text_chars")]
    pub min_native_text_chars: usize,
    /// Minimum height in pixels of a graphic band to count as a chart.
    #[serde(default = "default_min_chart_height")]
    pub min_chart_height: u32,
    #[serde(default = "default_ocr_engine")]
    pub ocr_engine: String,
    #[serde(default = "default_tesseract_path")]
    pub tesseract_path: String,
    #[serde(default = "default_ocr_language")]
    pub ocr_language: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            use_ocr: true,
            extract_tables: true,
            extract_charts: true,
            max_file_bytes: default_max_file_bytes(),
            min_native_text_chars: default_min_native_text_chars(),
            min_chart_height: default_min_chart_height(),
            ocr_engine: default_ocr_engine(),
            tesseract_path: default_tesseract_path(),
            ocr_language: default_ocr_language(),
        }
    }
}

impl ExtractionConfig {
    /// Default per-document options from config.
    pub fn options(&self) -> ExtractOptions {
        ExtractOptions {
            use_ocr: self.use_ocr,
            extract_tables: self.extract_tables,
            extract_charts: self.extract_charts,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_max_file_bytes() -> u64 {
    50 * 1024 * 1024
}
fn default_min_native_text_chars() -> usize {
    16
}
fn default_min_chart_height() -> u32 {
    40
}
fn default_ocr_engine() -> String {
    "tesseract".to_string()
}
fn default_tesseract_path() -> String {
    "tesseract".to_string()
}
fn default_ocr_language() -> String {
    "eng".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_max_chunk_chars(),
        }
    }
}

fn default_max_chunk_chars() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,
    /// Hits kept per `(filename, page)`. Text files have no pages and
    /// count as one.
    #[serde(default = "default_max_chunks_per_page")]
    pub max_chunks_per_page: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_similarity: default_min_similarity(),
            max_chunks_per_page: default_max_chunks_per_page(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_min_similarity() -> f32 {
    0.1
}
fn default_max_chunks_per_page() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Vector dimension. `hashing` falls back to 384 and `local` infers it
    /// from the model; `openai` and `ollama` need it set.
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL override for the openai and ollama providers.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout_secs(),
            url: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_embedding_provider() -> String {
    "hashing".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_max_retries() -> u32 {
    1
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum characters of chunk text echoed back in each source.
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
    /// Base URL override for the chat API.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: None,
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            max_retries: default_max_retries(),
            timeout_secs: default_llm_timeout_secs(),
            excerpt_chars: default_excerpt_chars(),
            url: None,
        }
    }
}

fn default_llm_provider() -> String {
    "gemini".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_output_tokens() -> u32 {
    1024
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_excerpt_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Documents processed at the same time during batch ingestion.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    2
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_chunk_chars == 0 {
        anyhow::bail!("chunking.max_chunk_chars must be > 0");
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if !(-1.0..=1.0).contains(&config.retrieval.min_similarity) {
        anyhow::bail!("retrieval.min_similarity must be in [-1.0, 1.0]");
    }
    if config.retrieval.max_chunks_per_page < 1 {
        anyhow::bail!("retrieval.max_chunks_per_page must be >= 1");
    }

    if config.ingest.concurrency < 1 {
        anyhow::bail!("ingest.concurrency must be >= 1");
    }

    match config.extraction.ocr_engine.as_str() {
        "tesseract" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown OCR engine: '{}'. Must be tesseract or disabled.",
            other
        ),
    }

    match config.embedding.provider.as_str() {
        "disabled" | "hashing" | "openai" | "ollama" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, hashing, openai, ollama, or local.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        let needs_dims = matches!(config.embedding.provider.as_str(), "openai" | "ollama");
        if config.embedding.dims == Some(0) || (needs_dims && config.embedding.dims.is_none()) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }
        let needs_model = matches!(config.embedding.provider.as_str(), "openai" | "ollama");
        if needs_model && config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.llm.provider.as_str() {
        "gemini" | "openai" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be gemini or openai.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = parse("[db]\npath = \"/tmp/x.sqlite\"\n").unwrap();
        assert_eq!(cfg.retrieval.top_k, 5);
        assert!((cfg.retrieval.min_similarity - 0.1).abs() < 1e-6);
        assert_eq!(cfg.chunking.max_chunk_chars, 1000);
        assert_eq!(cfg.extraction.max_file_bytes, 50 * 1024 * 1024);
        assert_eq!(cfg.llm.provider, "gemini");
        assert_eq!(cfg.llm.excerpt_chars, 200);
        assert_eq!(cfg.ingest.concurrency, 2);
        assert_eq!(cfg.embedding.max_retries, 1);
    }

    #[test]
    fn test_rejects_zero_chunk_size() {
        let err = parse("[chunking]\nmax_chunk_chars = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_chunk_chars"));
    }

    #[test]
    fn test_rejects_unknown_llm_provider() {
        let err = parse("[llm]\nprovider = \"claude\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown llm provider"));
    }

    #[test]
    fn test_openai_embedding_requires_model() {
        let err = parse("[embedding]\nprovider = \"openai\"\ndims = 1536\n").unwrap_err();
        assert!(err.to_string().contains("embedding.model"));
    }

    #[test]
    fn test_hashing_embedding_without_dims_is_valid() {
        let cfg = parse("[embedding]\nbatch_size = 8\n").unwrap();
        assert_eq!(cfg.embedding.provider, "hashing");
        assert_eq!(cfg.embedding.dims, None);
        let provider = crate::embedding::create_provider(&cfg.embedding).unwrap();
        assert_eq!(provider.dims(), 384);
    }

    #[test]
    fn test_local_embedding_infers_dims() {
        let cfg = parse("[embedding]\nprovider = \"local\"\n").unwrap();
        assert_eq!(cfg.embedding.dims, None);
    }

    #[test]
    fn test_ollama_embedding_requires_dims() {
        let err = parse("[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn test_rejects_zero_dims() {
        let err = parse("[embedding]\ndims = 0\n").unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn test_rejects_out_of_range_similarity() {
        let err = parse("[retrieval]\nmin_similarity = 1.5\n").unwrap_err();
        assert!(err.to_string().contains("min_similarity"));
    }

    #[test]
    fn test_extraction_options_from_config() {
        let cfg = parse("[extraction]\nuse_ocr = false\nextract_charts = false\n").unwrap();
        let opts = cfg.extraction.options();
        assert!(!opts.use_ocr);
        assert!(opts.extract_tables);
        assert!(!opts.extract_charts);
    }
}
