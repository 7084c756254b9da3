//! Wire messages between `mazed` and its clients.
//!
//! One JSON object per line in each direction, tagged by `"type"`:
//!
//! ```text
//! -> {"type":"Generate","preset":"small","seed":7}
//! <- {"type":"Maze","name":"maze_10x10_20250101_120000","cells":[[...]],"stats":{...}}
//! ```

use serde::{Deserialize, Serialize};

use crate::config::ConfigParams;
use crate::dp::{IterationResult, RewardConfig, SolveMethod, SolverStats};
use crate::game::MoveEvent;
use crate::generator::GenerationStats;
use crate::grid::{Direction, Position};
use crate::observer::{GameSnapshot, SolverSnapshot};

pub const DEFAULT_ADDR: &str = "127.0.0.1:9877";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    GetState,
    /// `params` wins over `preset`; with neither the default config is used.
    Generate {
        preset: Option<String>,
        params: Option<ConfigParams>,
        seed: Option<u64>,
        start: Option<Position>,
    },
    LoadMaze {
        name: String,
    },
    SaveMaze,
    ListMazes,
    StartGame {
        player: Option<Position>,
        min_exit_distance: Option<usize>,
    },
    Move {
        direction: Direction,
    },
    ValidMoves,
    NewExit,
    Solve {
        method: SolveMethod,
        gamma: Option<f64>,
        max_iterations: Option<usize>,
        theta: Option<f64>,
    },
    SetRewards {
        preset: Option<String>,
        rewards: Option<RewardConfig>,
    },
    ResetSolver,
    PolicyAt {
        row: usize,
        col: usize,
    },
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    State(StateSnapshot),
    Maze {
        name: String,
        cells: Vec<Vec<i32>>,
        stats: GenerationStats,
    },
    Moved {
        event: MoveEvent,
        game: GameSnapshot,
    },
    Moves {
        moves: Vec<Direction>,
    },
    Solved {
        result: IterationResult,
        stats: SolverStats,
    },
    Policy {
        row: usize,
        col: usize,
        action: Option<Direction>,
        value: Option<f64>,
    },
    Mazes {
        names: Vec<String>,
    },
    Success {
        message: String,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// File stem of the current maze, if any.
    pub maze: Option<String>,
    pub generation: Option<GenerationStats>,
    pub game: GameSnapshot,
    #[serde(default)]
    pub solver: Option<SolverSnapshot>,
    pub rewards: RewardConfig,
}
