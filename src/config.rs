//! Pipeline Configuration Module
//! Input tables, text encoding, topology source and chart output settings.

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Topology used by the original chart (vega-datasets us-10m).
pub const DEFAULT_TOPOLOGY_URL: &str =
    "https://cdn.jsdelivr.net/npm/vega-datasets@v1.29.0/data/us-10m.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unknown text encoding: {0}")]
    UnknownEncoding(String),
    #[error("Chart size must be non-zero, got {width}x{height}")]
    EmptyChart { width: u32, height: u32 },
}

/// One delimited input file and the columns we need from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSource {
    pub path: PathBuf,
    /// Source-specific name of the state column, renamed to `state` on load.
    pub key_column: String,
    pub value_column: String,
}

impl TableSource {
    pub fn new(path: impl Into<PathBuf>, key_column: &str, value_column: &str) -> Self {
        Self {
            path: path.into(),
            key_column: key_column.to_string(),
            value_column: value_column.to_string(),
        }
    }
}

/// Where the US states topology comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologySource {
    pub url: String,
    /// Read instead of the URL when present; written after a successful fetch.
    pub cache_path: PathBuf,
    /// Object inside the topology holding state geometries.
    pub object: String,
}

impl Default for TopologySource {
    fn default() -> Self {
        Self {
            url: DEFAULT_TOPOLOGY_URL.to_string(),
            cache_path: PathBuf::from("data/us-10m.json"),
            object: "states".to_string(),
        }
    }
}

/// Rendered map artifact settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartOutput {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for ChartOutput {
    fn default() -> Self {
        Self {
            path: PathBuf::from("snap_per_household.html"),
            width: 800,
            height: 500,
            title: "SNAP per Household".to_string(),
        }
    }
}

/// Output file flavour, picked from the output path extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Standalone HTML page with hover text per state
    Html,
    /// Static SVG image
    Svg,
}

impl ChartOutput {
    pub fn format(&self) -> OutputFormat {
        match self.path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("svg") => OutputFormat::Svg,
            _ => OutputFormat::Html,
        }
    }
}

/// Everything the pipeline needs to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub benefits: TableSource,
    pub households: TableSource,
    pub persons: TableSource,
    /// WHATWG label of the encoding shared by the three input files.
    pub encoding: String,
    pub topology: TopologySource,
    pub output: ChartOutput,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            benefits: TableSource::new("snap-benefits-9.csv", "State", "TotalBenefits"),
            households: TableSource::new("snap-households-9.csv", "State", "Households"),
            persons: TableSource::new("snap-persons-9.csv", "State", "Persons"),
            encoding: "latin1".to_string(),
            topology: TopologySource::default(),
            output: ChartOutput::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.text_encoding()?;
        if self.output.width == 0 || self.output.height == 0 {
            return Err(ConfigError::EmptyChart {
                width: self.output.width,
                height: self.output.height,
            });
        }
        Ok(())
    }

    /// Resolve the configured encoding label.
    pub fn text_encoding(&self) -> Result<&'static Encoding, ConfigError> {
        Encoding::for_label(self.encoding.trim().as_bytes())
            .ok_or_else(|| ConfigError::UnknownEncoding(self.encoding.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_original_constants() {
        let config = PipelineConfig::default();
        assert_eq!(config.benefits.path, PathBuf::from("snap-benefits-9.csv"));
        assert_eq!(config.households.value_column, "Households");
        assert_eq!(config.persons.key_column, "State");
        assert_eq!(config.output.width, 800);
        assert_eq!(config.output.height, 500);
        assert_eq!(config.output.title, "SNAP per Household");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_keeps_defaults() -> anyhow::Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(
            file,
            r#"{{"output": {{"path": "map.svg", "title": "Per household"}}, "encoding": "utf-8"}}"#
        )?;

        let config = PipelineConfig::load(file.path())?;
        assert_eq!(config.output.title, "Per household");
        assert_eq!(config.output.width, 800);
        assert_eq!(config.output.format(), OutputFormat::Svg);
        assert_eq!(config.benefits.value_column, "TotalBenefits");
        assert_eq!(config.text_encoding()?, encoding_rs::UTF_8);
        Ok(())
    }

    #[test]
    fn test_latin1_label_resolves() {
        let config = PipelineConfig::default();
        assert_eq!(config.text_encoding().unwrap(), encoding_rs::WINDOWS_1252);
    }

    #[test]
    fn test_rejects_unknown_encoding_and_empty_chart() {
        let mut config = PipelineConfig::default();
        config.encoding = "klingon".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownEncoding(_))
        ));

        let mut config = PipelineConfig::default();
        config.output.height = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyChart { .. })
        ));
    }

    #[test]
    fn test_default_output_is_html() {
        assert_eq!(ChartOutput::default().format(), OutputFormat::Html);
    }
}
