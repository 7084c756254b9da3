//! Cross-platform application paths

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::DaemonError;

#[derive(Debug, Clone)]
pub struct AppPaths {
    data_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Result<Self, DaemonError> {
        let base = dirs::data_dir().ok_or(DaemonError::NoDataDir)?;
        Self::at(base.join("mazeplay"))
    }

    /// Paths rooted at `data_dir`, creating the maze directory.
    pub fn at(data_dir: PathBuf) -> Result<Self, DaemonError> {
        let paths = Self { data_dir };
        let mazes = paths.mazes_dir();
        fs::create_dir_all(&mazes).map_err(|source| DaemonError::Io {
            path: mazes,
            source,
        })?;
        Ok(paths)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn mazes_dir(&self) -> PathBuf {
        self.data_dir.join("mazes").join("json")
    }

    pub fn session_file(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }

    /// Document path for `name`, with or without the `.json` suffix.
    pub fn maze_file(&self, name: &str) -> Result<PathBuf, DaemonError> {
        let stem = name.strip_suffix(".json").unwrap_or(name);
        let valid = !stem.is_empty()
            && stem
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(DaemonError::InvalidName(name.to_string()));
        }
        Ok(self.mazes_dir().join(format!("{stem}.json")))
    }

    /// Stems of saved maze documents, sorted.
    pub fn list_mazes(&self) -> Result<Vec<String>, DaemonError> {
        let dir = self.mazes_dir();
        let entries = fs::read_dir(&dir).map_err(|source| DaemonError::Io {
            path: dir.clone(),
            source,
        })?;
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_paths(tag: &str) -> AppPaths {
        let root = std::env::temp_dir().join(format!("mazed-paths-{tag}-{}", std::process::id()));
        AppPaths::at(root).unwrap()
    }

    #[test]
    fn maze_names_are_sanitized() {
        let paths = temp_paths("names");
        assert!(paths
            .maze_file("maze_10x10_20240101_000000")
            .unwrap()
            .ends_with("mazes/json/maze_10x10_20240101_000000.json"));
        assert_eq!(
            paths.maze_file("a.json").unwrap(),
            paths.mazes_dir().join("a.json")
        );
        for bad in ["", "../etc/passwd", "a/b", ".json"] {
            assert!(matches!(
                paths.maze_file(bad),
                Err(DaemonError::InvalidName(_))
            ));
        }
        let _ = fs::remove_dir_all(paths.data_dir());
    }

    #[test]
    fn lists_only_json_documents() {
        let paths = temp_paths("list");
        fs::write(paths.mazes_dir().join("b.json"), "{}").unwrap();
        fs::write(paths.mazes_dir().join("a.json"), "{}").unwrap();
        fs::write(paths.mazes_dir().join("notes.txt"), "").unwrap();
        assert_eq!(paths.list_mazes().unwrap(), vec!["a", "b"]);
        let _ = fs::remove_dir_all(paths.data_dir());
    }
}
