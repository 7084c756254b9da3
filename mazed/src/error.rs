use std::path::PathBuf;

use mazeplay::config::ConfigError;
use mazeplay::document::DocumentError;
use mazeplay::dp::SolverError;
use mazeplay::game::GameError;
use mazeplay::generator::GenerateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("could not determine the user data directory")]
    NoDataDir,
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid maze name '{0}'")]
    InvalidName(String),
    #[error("maze '{0}' not found")]
    MazeNotFound(String),
    #[error("no maze loaded; generate or load one first")]
    NoMaze,
    #[error("no solver yet; run Solve first")]
    NoSolver,
    #[error("maze changed while solving; solve again")]
    MazeChanged,
    #[error("maze has no rooms left for an exit")]
    NoRooms,
    #[error("either a reward preset or explicit rewards is required")]
    MissingRewards,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("session file is unreadable: {0}")]
    Session(#[from] serde_json::Error),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
