use serde::{Deserialize, Serialize};
use std::path::Path;
use std::fs;
use anyhow::{Context, Result};

/// Default cap on one PDU (16 MiB).
pub const DEFAULT_MAX_PDU_SIZE: usize = 16 * 1024 * 1024;
/// Default cap on TLV nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
}

/// Limits applied by every decoder instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Largest PDU (header plus content) accepted before the stream is treated as malformed.
    #[serde(default = "default_max_pdu_size")]
    pub max_pdu_size: usize,
    /// Deepest TLV nesting accepted, the PDU itself being depth 1.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_pdu_size() -> usize {
    DEFAULT_MAX_PDU_SIZE
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_pdu_size: DEFAULT_MAX_PDU_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Attribute definitions backing `StaticSchema`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub attributes: Vec<AttributeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeConfig {
    pub name: String,
    pub oid: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// case_ignore (default), case_exact, numeric, integer, octet.
    #[serde(default)]
    pub normalizer: NormalizerKind,
}

/// Value normalization applied to assertion values of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizerKind {
    #[default]
    CaseIgnore,
    CaseExact,
    Numeric,
    Integer,
    Octet,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content).context("parsing config YAML")?;
        if config.decoder.max_depth == 0 {
            anyhow::bail!("decoder.max_depth must be at least 1");
        }
        Ok(config)
    }
}
