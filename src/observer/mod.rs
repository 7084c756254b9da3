use rand::Rng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dp::{MazeDp, SolverStats};
use crate::game::{GameInfo, MazeGame};
use crate::grid::{Direction, Position};

/// A read-only snapshot of a game session.
///
/// Observers cannot move the player or touch the grid; snapshots are owned
/// so rendering layers can keep them across frames.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GameSnapshot {
    pub info: GameInfo,
    /// Integer cell codes, empty when no maze is loaded.
    pub cells: Vec<Vec<i32>>,
    pub path: Vec<Position>,
    pub valid_moves: Vec<Direction>,
    pub distance_to_exit: Option<usize>,
    pub elapsed_secs: Option<f64>,
}

pub struct GameAdapter<'a, R> {
    game: &'a MazeGame<R>,
}

impl<'a, R: Rng> GameAdapter<'a, R> {
    pub fn new(game: &'a MazeGame<R>) -> Self {
        Self { game }
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            info: self.game.info(),
            cells: self.game.grid().map(|g| g.to_codes()).unwrap_or_default(),
            path: self.game.stats().path.clone(),
            valid_moves: self.game.valid_moves(),
            distance_to_exit: self.game.distance_to_exit(),
            elapsed_secs: self.game.stats().elapsed().map(|d| d.as_secs_f64()),
        }
    }

    /// ASCII board, one row per line.
    pub fn render(&self) -> String {
        self.game.grid().map(|g| g.to_string()).unwrap_or_default()
    }
}

/// Heatmap and arrow data for a solver.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverSnapshot {
    pub stats: SolverStats,
    pub values: Vec<Vec<f64>>,
    pub policy: Vec<Vec<i8>>,
    pub history: Vec<f64>,
}

pub struct SolverAdapter<'a> {
    dp: &'a MazeDp,
}

impl<'a> SolverAdapter<'a> {
    pub fn new(dp: &'a MazeDp) -> Self {
        Self { dp }
    }

    pub fn snapshot(&self) -> SolverSnapshot {
        SolverSnapshot {
            stats: self.dp.stats(),
            values: self.dp.value_function(),
            policy: self.dp.policy_codes(),
            history: self.dp.convergence_history().to_vec(),
        }
    }

    /// Grid symbols with policy arrows drawn over solved cells.
    pub fn render_policy(&self) -> String {
        let grid = self.dp.grid();
        let mut out = String::with_capacity(grid.len() + grid.rows());
        for r in 0..grid.rows() {
            for c in 0..grid.cols() {
                let ch = match self.dp.policy_at(r, c) {
                    Some(action) => action.arrow(),
                    None => grid.get((r, c)).symbol(),
                };
                out.push(ch);
            }
            out.push('\n');
        }
        out
    }
}
