use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::role::CursorRole;

/// Conventional Windows cursor base names and the roles they fill.
///
/// Used when a cursor folder ships no usable `install.inf`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CursorMapping {
    #[serde(default = "default_win_to_roles")]
    pub win_to_roles: BTreeMap<String, Vec<CursorRole>>,
}

impl Default for CursorMapping {
    fn default() -> Self {
        Self {
            win_to_roles: default_win_to_roles(),
        }
    }
}

impl CursorMapping {
    /// Looks up a file name, ignoring case and a `.cur`/`.ani` extension.
    pub fn roles_for(&self, file_name: &str) -> Vec<CursorRole> {
        let key = normalize_name(file_name);
        self.win_to_roles
            .iter()
            .find(|(name, _)| normalize_name(name) == key)
            .map(|(_, roles)| roles.clone())
            .unwrap_or_default()
    }

    pub fn is_known(&self, file_name: &str) -> bool {
        !self.roles_for(file_name).is_empty()
    }

    pub fn set_mapping(&mut self, win_name: String, roles: Vec<CursorRole>) {
        self.win_to_roles.insert(win_name, roles);
    }

    pub fn supported_names(&self) -> Vec<&str> {
        self.win_to_roles.keys().map(String::as_str).collect()
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let content = self
            .to_toml_string()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        fs::write(path, content)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

fn normalize_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    lower
        .strip_suffix(".cur")
        .or_else(|| lower.strip_suffix(".ani"))
        .unwrap_or(&lower)
        .to_string()
}

fn default_win_to_roles() -> BTreeMap<String, Vec<CursorRole>> {
    use CursorRole::*;

    let mut map = BTreeMap::new();

    // Standard scheme file names
    map.insert("Normal".to_string(), vec![Arrow]);
    map.insert("Text".to_string(), vec![Ibeam]);
    map.insert("Link".to_string(), vec![Pointing]);
    map.insert("Busy".to_string(), vec![Busy]);
    map.insert("Working".to_string(), vec![Wait]);
    map.insert("Precision".to_string(), vec![Crosshair]);
    map.insert("Unavailable".to_string(), vec![Forbidden]);
    map.insert("Move".to_string(), vec![Move]);
    map.insert("Help".to_string(), vec![Help]);

    // Resize cursors fill both the resize and the window-edge role
    map.insert("Vertical".to_string(), vec![ResizeNs, WindowNs]);
    map.insert("Horizontal".to_string(), vec![ResizeWe, WindowEw]);
    map.insert("Diagonal1".to_string(), vec![WindowNwse]);
    map.insert("Diagonal2".to_string(), vec![WindowNesw]);

    // Registry value names some packs use as file names
    map.insert("Arrow".to_string(), vec![Arrow]);
    map.insert("IBeam".to_string(), vec![Ibeam]);
    map.insert("Hand".to_string(), vec![Pointing]);
    map.insert("Wait".to_string(), vec![Wait]);
    map.insert("Cross".to_string(), vec![Crosshair]);
    map.insert("No".to_string(), vec![Forbidden]);
    map.insert("SizeNS".to_string(), vec![ResizeNs, WindowNs]);
    map.insert("SizeWE".to_string(), vec![ResizeWe, WindowEw]);
    map.insert("SizeNWSE".to_string(), vec![WindowNwse]);
    map.insert("SizeNESW".to_string(), vec![WindowNesw]);
    map.insert("SizeAll".to_string(), vec![Move]);

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_lookup_ignores_case_and_extension() {
        let mapping = CursorMapping::default();

        assert_eq!(mapping.roles_for("Normal"), vec![CursorRole::Arrow]);
        assert_eq!(mapping.roles_for("normal.CUR"), vec![CursorRole::Arrow]);
        assert_eq!(mapping.roles_for("BUSY.ani"), vec![CursorRole::Busy]);
        assert!(mapping.roles_for("Person.cur").is_empty());
        assert!(!mapping.is_known("Pin"));
    }

    #[test]
    fn test_resize_cursors_map_to_two_roles() {
        let mapping = CursorMapping::default();

        assert_eq!(
            mapping.roles_for("Vertical.ani"),
            vec![CursorRole::ResizeNs, CursorRole::WindowNs]
        );
        assert_eq!(
            mapping.roles_for("sizewe"),
            vec![CursorRole::ResizeWe, CursorRole::WindowEw]
        );
    }

    #[test]
    fn test_toml_round_trip_with_override() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roles.toml");

        let mut mapping = CursorMapping::default();
        mapping.set_mapping("Pointer".to_string(), vec![CursorRole::Arrow]);
        mapping.save_to_file(&path).unwrap();

        let loaded = CursorMapping::load_from_file(&path).unwrap();
        assert_eq!(loaded, mapping);
        assert_eq!(loaded.roles_for("pointer.cur"), vec![CursorRole::Arrow]);
    }

    #[test]
    fn test_missing_table_falls_back_to_default() {
        let loaded = CursorMapping::from_toml_str("").unwrap();
        assert_eq!(loaded, CursorMapping::default());
    }
}
