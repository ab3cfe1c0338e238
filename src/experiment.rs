use crate::error::ManifestError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Value of the `config` attribute meaning "the pipeline's built-in config".
pub const DEFAULT_CONFIG_KEYWORD: &str = "default";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigRef {
    Default,
    Path(PathBuf),
}

impl ConfigRef {
    fn parse(raw: &str) -> Self {
        if raw == DEFAULT_CONFIG_KEYWORD {
            Self::Default
        } else {
            Self::Path(PathBuf::from(raw))
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Default => DEFAULT_CONFIG_KEYWORD.to_string(),
            Self::Path(path) => path.display().to_string(),
        }
    }
}

// The root element name differs between pipeline versions and is not checked.
#[derive(Debug, Deserialize)]
struct ExperimentXml {
    #[serde(rename = "@config")]
    config: Option<String>,
    #[serde(rename = "@sequences")]
    sequences: Option<String>,
}

/// The parts of a per-sub-problem experiment descriptor that the project
/// layer reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExperimentDescriptor {
    config: ConfigRef,
    sequences: Vec<String>,
}

impl ExperimentDescriptor {
    pub fn from_xml_file(path: &Path) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(path)
            .map_err(|e| ManifestError::io("read experiment", path, e))?;
        Self::parse(&text, &format!("experiment '{}'", path.display()))
    }

    pub fn from_xml_str(xml: &str) -> Result<Self, ManifestError> {
        Self::parse(xml, "experiment XML")
    }

    fn parse(xml: &str, context: &str) -> Result<Self, ManifestError> {
        let parsed: ExperimentXml =
            quick_xml::de::from_str(xml).map_err(|e| ManifestError::parse(context, e))?;
        let config = parsed
            .config
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .ok_or(ManifestError::MissingField("config"))?;
        Ok(Self {
            config: ConfigRef::parse(config),
            sequences: parsed
                .sequences
                .as_deref()
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        })
    }

    pub fn config_path(&self) -> &ConfigRef {
        &self.config
    }

    pub fn sequences(&self) -> &[String] {
        &self.sequences
    }
}
