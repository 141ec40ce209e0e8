//! Serializable run configuration for building an [`RddCounts`](super::RddCounts).

use crate::data::{SampleTypeFilter, GROUP_COLUMN};
use crate::error::{RddError, Result};
use crate::filter::GroupSelection;
use crate::flow::NoiseFloor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default ontology depth.
pub const DEFAULT_LEVELS: usize = 6;

fn default_levels() -> usize {
    DEFAULT_LEVELS
}

fn default_group_column() -> String {
    GROUP_COLUMN.to_string()
}

/// Inputs and options of one RDD run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RddConfig {
    /// Clustering table exported from the molecular network.
    #[serde(default)]
    pub network: Option<PathBuf>,
    /// Identifier of a network job to retrieve through a `NetworkSource`.
    #[serde(default)]
    pub task_id: Option<String>,
    /// External reference metadata; the bundled ontology when absent.
    #[serde(default)]
    pub reference_metadata: Option<PathBuf>,
    /// External sample metadata; derived from `DefaultGroups` when absent.
    #[serde(default)]
    pub sample_metadata: Option<PathBuf>,
    #[serde(default = "default_group_column")]
    pub sample_group_column: String,
    #[serde(default)]
    pub groups: GroupSelection,
    #[serde(default)]
    pub sample_type: SampleTypeFilter,
    #[serde(default = "default_levels")]
    pub levels: usize,
    /// Custom ontology columns, level 1 first.
    #[serde(default)]
    pub ontology_columns: Option<Vec<String>>,
    /// Background category used to prune flows built from the network.
    #[serde(default)]
    pub noise_floor: Option<NoiseFloor>,
}

impl Default for RddConfig {
    fn default() -> Self {
        Self {
            network: None,
            task_id: None,
            reference_metadata: None,
            sample_metadata: None,
            sample_group_column: default_group_column(),
            groups: GroupSelection::default(),
            sample_type: SampleTypeFilter::default(),
            levels: DEFAULT_LEVELS,
            ontology_columns: None,
            noise_floor: None,
        }
    }
}

impl RddConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(RddError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(RddError::from)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(RddError::from)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(RddError::from)
    }

    /// Read a `.yaml`/`.yml` or `.json` configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let parse: fn(&str) -> Result<Self> = match ext.as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml,
            Some("json") => Self::from_json,
            _ => {
                return Err(RddError::Format {
                    path: path.display().to_string(),
                })
            }
        };
        if !path.is_file() {
            return Err(RddError::NotFound(path.display().to_string()));
        }
        parse(&fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_defaults_from_minimal_yaml() {
        let config = RddConfig::from_yaml("network: net.tsv\n").unwrap();
        assert_eq!(config.network, Some(PathBuf::from("net.tsv")));
        assert_eq!(config.levels, DEFAULT_LEVELS);
        assert_eq!(config.sample_group_column, "group");
        assert_eq!(config.sample_type, SampleTypeFilter::All);
        assert!(config.groups.is_unrestricted());
        assert!(config.noise_floor.is_none());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = RddConfig {
            network: Some(PathBuf::from("net.tsv")),
            groups: GroupSelection::new(vec!["G1".into()], vec!["G4".into()]),
            sample_type: SampleTypeFilter::Simple,
            levels: 3,
            noise_floor: Some(NoiseFloor::default()),
            ..Default::default()
        };
        let yaml = config.to_yaml().unwrap();
        assert_eq!(RddConfig::from_yaml(&yaml).unwrap(), config);
    }

    #[test]
    fn test_from_json_path() {
        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"task_id": "abc123", "levels": 4, "sample_type": "complex"}}"#).unwrap();
        let config = RddConfig::from_path(file.path()).unwrap();
        assert_eq!(config.task_id.as_deref(), Some("abc123"));
        assert_eq!(config.levels, 4);
        assert_eq!(config.sample_type, SampleTypeFilter::Complex);
    }

    #[test]
    fn test_unknown_extension() {
        let err = RddConfig::from_path(Path::new("run.toml")).unwrap_err();
        assert!(matches!(err, RddError::Format { .. }));
    }
}
