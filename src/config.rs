use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::mapping::CursorMapping;
use crate::pipeline::wincur::ConversionOptions;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub options: ConversionOptions,
    /// Worker threads for folder conversion; 0 uses the rayon default.
    pub thread_count: usize,
    /// TOML file replacing the built-in filename role table.
    pub role_table: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("./out"),
            options: ConversionOptions::default(),
            thread_count: 0,
            role_table: None,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// The filename role table, loaded from `role_table` when one is set.
    pub fn mapping(&self) -> Result<CursorMapping> {
        match &self.role_table {
            Some(path) => CursorMapping::load_from_file(path)
                .with_context(|| format!("Failed to load role table {}", path.display())),
            None => Ok(CursorMapping::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::CursorRole;
    use tempfile::tempdir;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "input_dir = \"packs/cool\"\nthread_count = 2\n\n[options]\nmax_frames = 12\n",
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.input_dir, PathBuf::from("packs/cool"));
        assert_eq!(config.output_dir, PathBuf::from("./out"));
        assert_eq!(config.thread_count, 2);
        assert_eq!(config.options.max_frames, 12);
        assert!(config.options.parallel);
        assert_eq!(config.options.scale, None);
    }

    #[test]
    fn test_role_table_override() {
        let dir = tempdir().unwrap();
        let table = dir.path().join("roles.toml");

        let mut mapping = CursorMapping::default();
        mapping.set_mapping("Pointer".to_string(), vec![CursorRole::Arrow]);
        mapping.save_to_file(&table).unwrap();

        let config = Config {
            role_table: Some(table),
            ..Config::default()
        };
        assert_eq!(config.mapping().unwrap().roles_for("pointer.ani"), vec![CursorRole::Arrow]);

        let missing = Config {
            role_table: Some(dir.path().join("absent.toml")),
            ..Config::default()
        };
        assert!(missing.mapping().is_err());
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "thread_count = \"many\"").unwrap();

        assert!(Config::load_from_file(&path).is_err());
        assert!(Config::load_from_file(dir.path().join("none.toml")).is_err());
    }
}
