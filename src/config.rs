// src/config.rs
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::dataset::{load_path, DataFormat, Dataset, JsonLayout};
use crate::view::View;

/// Where the dataset lives and how to read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetSource {
    pub path: PathBuf,
    #[serde(default)]
    pub format: Option<DataFormat>,
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub layout: JsonLayout,
}

impl DatasetSource {
    pub fn load(&self) -> Result<Dataset> {
        load_path(&self.path, self.format, &self.layout)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedView {
    pub name: String,
    #[serde(flatten)]
    pub view: View,
}

/// Top-level YAML configuration: one dataset, many views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub dataset: DatasetSource,
    #[serde(default)]
    pub views: Vec<NamedView>,
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml).context("parsing config YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file. A relative dataset path is resolved against the
    /// config file's directory.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let mut config = Self::from_yaml_str(&text)
            .with_context(|| format!("Invalid config file: {:?}", path))?;
        if config.dataset.path.is_relative() {
            if let Some(dir) = path.parent() {
                config.dataset.path = dir.join(&config.dataset.path);
            }
        }
        debug!(
            dataset = %config.dataset.path.display(),
            views = config.views.len(),
            "loaded config"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for v in &self.views {
            if v.name.trim().is_empty() {
                bail!("view names must not be empty");
            }
            if !seen.insert(v.name.as_str()) {
                bail!("duplicate view name `{}`", v.name);
            }
        }
        Ok(())
    }

    pub fn view(&self, name: &str) -> Option<&View> {
        self.views.iter().find(|v| v.name == name).map(|v| &v.view)
    }
}
