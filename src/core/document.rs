//! JSON maze documents.
//!
//! ```text
//! {
//!   "metadata":   { "timestamp": "20250101_120000", "version": "2.0", "generator": "MazeGenerator" },
//!   "dimensions": { "height": 10, "width": 10 },
//!   "config":     { "decay_factor": .., "base_prob_factor": .., "min_room_prob": .., "direction_weights": {..} },
//!   "maze":       [[-1, 0, ..], ..],
//!   "statistics": { "rooms": .., "walls": .., "room_percentage": .. }
//! }
//! ```
//!
//! Only `maze` is required when reading; the other sections default.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::GenerationConfig;
use crate::generator::{GenerationStats, Generated};
use crate::grid::{Grid, GridError};

pub const DOCUMENT_VERSION: &str = "2.0";
pub const GENERATOR_NAME: &str = "MazeGenerator";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("malformed maze document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid maze grid: {0}")]
    Grid(#[from] GridError),
    #[error("document says {height}x{width} but the maze is {rows}x{cols}")]
    DimensionMismatch {
        height: usize,
        width: usize,
        rows: usize,
        cols: usize,
    },
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub timestamp: String,
    pub version: String,
    pub generator: String,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            timestamp: String::new(),
            version: DOCUMENT_VERSION.to_string(),
            generator: GENERATOR_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub height: usize,
    pub width: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    pub decay_factor: f64,
    pub base_prob_factor: f64,
    pub min_room_prob: f64,
    pub direction_weights: BTreeMap<String, f64>,
}

impl From<&GenerationConfig> for GeneratorSettings {
    fn from(cfg: &GenerationConfig) -> Self {
        let params = cfg.params();
        Self {
            decay_factor: params.decay_factor,
            base_prob_factor: params.base_prob_factor,
            min_room_prob: params.min_room_prob,
            direction_weights: params.direction_weights,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MazeDocument {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
    #[serde(default)]
    pub config: GeneratorSettings,
    pub maze: Vec<Vec<i32>>,
    #[serde(default)]
    pub statistics: GenerationStats,
}

impl MazeDocument {
    pub fn new(
        grid: &Grid,
        config: &GenerationConfig,
        statistics: GenerationStats,
        timestamp: String,
    ) -> Self {
        Self {
            metadata: Metadata {
                timestamp,
                ..Metadata::default()
            },
            dimensions: Some(Dimensions {
                height: grid.rows(),
                width: grid.cols(),
            }),
            config: GeneratorSettings::from(config),
            maze: grid.to_codes(),
            statistics,
        }
    }

    /// Document for a fresh generator result, stamped with the current time.
    pub fn from_generated(generated: &Generated, config: &GenerationConfig) -> Self {
        Self::new(&generated.grid, config, generated.stats, timestamp_now())
    }

    /// `maze_{H}x{W}_{timestamp}`.
    pub fn file_stem(&self) -> String {
        let (h, w) = match self.dimensions {
            Some(d) => (d.height, d.width),
            None => (self.maze.len(), self.maze.first().map_or(0, Vec::len)),
        };
        format!("maze_{h}x{w}_{}", self.metadata.timestamp)
    }

    /// Rebuilds the grid, rejecting unknown codes and size mismatches.
    pub fn grid(&self) -> Result<Grid, DocumentError> {
        let grid = Grid::from_codes(&self.maze)?;
        if let Some(d) = self.dimensions {
            if (d.height, d.width) != (grid.rows(), grid.cols()) {
                return Err(DocumentError::DimensionMismatch {
                    height: d.height,
                    width: d.width,
                    rows: grid.rows(),
                    cols: grid.cols(),
                });
            }
        }
        Ok(grid)
    }

    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Writes `<dir>/<file_stem>.json`, creating `dir` if needed.
    pub fn save_to_dir(&self, dir: &Path) -> Result<PathBuf, DocumentError> {
        fs::create_dir_all(dir).map_err(|source| DocumentError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = dir.join(format!("{}.json", self.file_stem()));
        let json = self.to_json_pretty()?;
        fs::write(&path, json).map_err(|source| DocumentError::Io {
            path: path.clone(),
            source,
        })?;
        info!("Maze saved to {:?}", path);
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let text = fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut doc = Self::from_json(&text)?;
        if doc.metadata.timestamp.is_empty() {
            doc.metadata.timestamp = timestamp_now();
        }
        info!("Maze loaded from {:?}", path);
        Ok(doc)
    }
}

/// `YYYYMMDD_HHMMSS`, as used in document file names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Current local time as a document timestamp.
pub fn timestamp_now() -> String {
    format_timestamp(&Local::now())
}

pub fn format_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::MazeGenerator;
    use crate::grid::CellType;
    use chrono::{NaiveDateTime, Utc};

    fn sample() -> (MazeDocument, Grid) {
        let cfg = GenerationConfig::preset("tiny").unwrap();
        let mut gen = MazeGenerator::with_seed(cfg.clone(), 4);
        let generated = gen.generate(Some(0), Some(0)).unwrap();
        let doc = MazeDocument::new(
            &generated.grid,
            &cfg,
            generated.stats,
            "20240102_030405".to_string(),
        );
        (doc, generated.grid)
    }

    #[test]
    fn timestamps_use_file_name_format() {
        let at = Utc.with_ymd_and_hms(2000, 2, 29, 3, 4, 5).unwrap();
        assert_eq!(format_timestamp(&at), "20000229_030405");

        let now = timestamp_now();
        assert_eq!(now.len(), 15);
        assert!(NaiveDateTime::parse_from_str(&now, TIMESTAMP_FORMAT).is_ok());
    }

    #[test]
    fn document_carries_metadata_and_stem() {
        let (doc, grid) = sample();
        assert_eq!(doc.metadata.version, "2.0");
        assert_eq!(doc.metadata.generator, "MazeGenerator");
        assert_eq!(doc.file_stem(), "maze_5x5_20240102_030405");
        assert_eq!(doc.grid().unwrap(), grid);
        assert_eq!(doc.config.direction_weights.len(), 4);
    }

    #[test]
    fn json_uses_integer_codes() {
        let (doc, grid) = sample();
        let json = doc.to_json_pretty().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["dimensions"]["height"], 5);
        let first = value["maze"][0][0].as_i64().unwrap();
        assert_eq!(first, i64::from(grid.get((0, 0)).code()));
        assert_eq!(MazeDocument::from_json(&json).unwrap(), doc);
    }

    #[test]
    fn bare_maze_loads_with_defaults() {
        let doc = MazeDocument::from_json(r#"{"maze": [[-1, 0], [0, 4]]}"#).unwrap();
        let grid = doc.grid().unwrap();
        assert_eq!(grid.get((1, 1)), CellType::Exit);
        assert_eq!(doc.metadata.version, DOCUMENT_VERSION);
    }

    #[test]
    fn bad_documents_are_rejected() {
        let unknown = MazeDocument::from_json(r#"{"maze": [[7]]}"#).unwrap();
        assert!(matches!(unknown.grid(), Err(DocumentError::Grid(_))));

        let mismatch = MazeDocument::from_json(
            r#"{"dimensions": {"height": 3, "width": 3}, "maze": [[0, 0]]}"#,
        )
        .unwrap();
        assert!(matches!(
            mismatch.grid(),
            Err(DocumentError::DimensionMismatch { .. })
        ));

        assert!(matches!(
            MazeDocument::from_json("{\"metadata\": {}}"),
            Err(DocumentError::Json(_))
        ));
    }

    #[test]
    fn save_and_load_through_directory() {
        let (doc, _) = sample();
        let dir = std::env::temp_dir().join(format!("mazeplay-doc-{}", std::process::id()));
        let path = doc.save_to_dir(&dir).unwrap();
        assert!(path.ends_with("maze_5x5_20240102_030405.json"));
        assert_eq!(MazeDocument::load(&path).unwrap(), doc);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn loading_an_unstamped_document_stamps_it() {
        let dir = std::env::temp_dir().join(format!("mazeplay-bare-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bare.json");
        fs::write(&path, r#"{"maze": [[-1, 0], [0, 4]]}"#).unwrap();

        let doc = MazeDocument::load(&path).unwrap();
        assert_eq!(doc.metadata.timestamp.len(), 15);
        let saved = doc.save_to_dir(&dir).unwrap();
        assert_ne!(saved.file_name().unwrap(), "maze_2x2_.json");
        let _ = fs::remove_dir_all(&dir);
    }
}
