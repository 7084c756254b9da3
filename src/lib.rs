//! # mazeplay
//!
//! Maze generation, interactive play and dynamic-programming solvers over a
//! shared integer-coded grid.
//!
//! ## Quick Start
//!
//! ```
//! use mazeplay::prelude::*;
//!
//! let config = GenerationConfig::preset("small").unwrap();
//! let mut generator = MazeGenerator::with_seed(config, 7);
//! let maze = generator.generate(None, None).unwrap();
//!
//! let mut game = MazeGame::with_seed(7);
//! game.load(maze.grid.clone()).unwrap();
//! game.start_game(None, None).unwrap();
//!
//! let mut solver = MazeDp::new(game.grid().unwrap().clone(), 0.9).unwrap();
//! let result = solver.value_iteration(100, 1e-4);
//! assert!(result.iterations > 0);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): Serialization, maze documents and the daemon protocol
//! - `parallel`: Run solver sweeps on rayon's thread pool
//!
//! ## Modules
//!
//! - [`grid`]: Cell codes, directions and the grid itself
//! - [`config`]: Generation parameters and presets
//! - [`generator`]: Probabilistic breadth-first maze generation
//! - [`game`]: Player/exit placement and moves
//! - [`dp`]: Value and policy iteration
//! - [`document`]: JSON maze documents
//! - [`observer`]: Read-only snapshot adapters

#[path = "core/grid.rs"]
pub mod grid;

#[path = "core/config.rs"]
pub mod config;

#[path = "core/generator.rs"]
pub mod generator;

#[path = "core/game.rs"]
pub mod game;

#[path = "core/dp.rs"]
pub mod dp;

#[cfg(feature = "serde")]
#[path = "core/document.rs"]
pub mod document;

pub mod observer;

#[cfg(feature = "serde")]
pub mod protocol;

/// Prelude module for convenient imports.
///
/// ```
/// use mazeplay::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{ConfigError, ConfigParams, GenerationConfig, PRESETS};
    pub use crate::dp::{
        IterationResult, MazeDp, RewardConfig, SolveMethod, SolverError, SolverStats,
    };
    #[cfg(feature = "serde")]
    pub use crate::document::{DocumentError, MazeDocument};
    pub use crate::game::{
        place_random_exit, ExitPlacement, ExitStrategy, GameError, GameInfo, GameSave, GameStats,
        MazeGame, MoveEvent,
    };
    pub use crate::generator::{
        weighted_shuffle, GenerateError, Generated, GenerationStats, MazeGenerator,
    };
    pub use crate::grid::{manhattan, CellType, Direction, Grid, GridError, Position};
    pub use crate::observer::{GameAdapter, GameSnapshot, SolverAdapter, SolverSnapshot};
}
