use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::composite::CompositeLayout;
use crate::error::Result;

/// A group of disciplines sharing a directory, e.g. `01_generic`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConfig {
    pub name: String,
    #[serde(default = "default_disciplines")]
    pub disciplines: u32,
}

impl StackConfig {
    pub fn new(name: &str, disciplines: u32) -> Self {
        Self {
            name: name.to_string(),
            disciplines,
        }
    }
}

fn default_disciplines() -> u32 {
    8
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// ONNX export of a YOLOv8 pose network.
    pub path: PathBuf,
    pub input_size: u32,
    pub score_threshold: f32,
    pub intra_threads: i16,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("yolov8x-pose.onnx"),
            input_size: 640,
            score_threshold: 0.25,
            intra_threads: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root holding one directory per stack.
    pub disciplines_dir: PathBuf,
    pub stacks: Vec<StackConfig>,
    pub model: ModelConfig,
    pub composite: CompositeLayout,
    /// TrueType font for the overlay legend; common system fonts are tried when unset.
    pub legend_font: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            disciplines_dir: PathBuf::from("disciplines"),
            stacks: vec![
                StackConfig::new("01_generic", 8),
                StackConfig::new("02_desktop", 8),
                StackConfig::new("03_saas", 8),
                StackConfig::new("04_mobile", 8),
            ],
            model: ModelConfig::default(),
            composite: CompositeLayout::default(),
            legend_font: None,
        }
    }
}

impl PipelineConfig {
    /// Reads a YAML config; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<PipelineConfig> {
        let text = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    pub fn stack_dir(&self, stack: &StackConfig) -> PathBuf {
        self.disciplines_dir.join(&stack.name)
    }

    pub fn images_dir(&self, stack: &StackConfig) -> PathBuf {
        self.stack_dir(stack).join("images")
    }

    pub fn composites_dir(&self) -> PathBuf {
        self.disciplines_dir.join("composites")
    }

    /// Stacks whose name starts with any of `prefixes`; all stacks when empty.
    pub fn select_stacks<S: AsRef<str>>(&self, prefixes: &[S]) -> Vec<&StackConfig> {
        self.stacks
            .iter()
            .filter(|s| prefixes.is_empty() || prefixes.iter().any(|p| s.name.starts_with(p.as_ref())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: PipelineConfig = serde_yaml::from_str(
            "disciplines_dir: assets\nstacks:\n  - name: 07_games\nmodel:\n  input_size: 320\n",
        )
        .unwrap();

        assert_eq!(config.disciplines_dir, PathBuf::from("assets"));
        assert_eq!(config.stacks, vec![StackConfig::new("07_games", 8)]);
        assert_eq!(config.model.input_size, 320);
        assert_eq!(config.model.score_threshold, 0.25);
        assert_eq!(config.composite, CompositeLayout::default());
    }

    #[test]
    fn stack_prefix_filter() {
        let config = PipelineConfig::default();
        let names: Vec<_> = config.select_stacks(&["02"]).iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, vec!["02_desktop"]);
        assert_eq!(config.select_stacks::<&str>(&[]).len(), 4);
        assert_eq!(config.select_stacks(&["01", "04"]).len(), 2);
    }
}
