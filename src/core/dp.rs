//! Value and policy iteration over a maze seen as a deterministic MDP.
//!
//! States are the non-wall cells, actions are the four [`Direction`]s and a
//! move into a wall or off the grid leaves the agent where it is. EXIT cells
//! are absorbing: their value is pinned to their reward and never backed up.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::grid::{CellType, Direction, Grid, Position};

pub const DEFAULT_GAMMA: f64 = 0.9;
pub const DEFAULT_POLICY_SEED: u64 = 42;

const EVAL_THETA: f64 = 1e-4;
const MAX_EVAL_SWEEPS: usize = 100;

pub const REWARD_PRESETS: [&str; 5] = ["balanced", "fast_path", "careful", "goal_focused", "risky"];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("gamma must lie in (0, 1], got {0}")]
    InvalidGamma(f64),
    #[error("cannot solve an empty maze")]
    EmptyGrid,
    #[error("unknown reward preset '{0}'")]
    UnknownPreset(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SolveMethod {
    ValueIteration,
    PolicyIteration,
}

impl SolveMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SolveMethod::ValueIteration => "value_iteration",
            SolveMethod::PolicyIteration => "policy_iteration",
        }
    }

    /// Accepts the snake_case name or the short forms `vi` / `pi`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "value_iteration" | "value" | "vi" => Some(SolveMethod::ValueIteration),
            "policy_iteration" | "policy" | "pi" => Some(SolveMethod::PolicyIteration),
            _ => None,
        }
    }
}

/// Per-cell reward layout. `overrides` are applied last, in order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RewardConfig {
    pub step: f64,
    pub goal: f64,
    pub wall: f64,
    pub overrides: Vec<(Position, f64)>,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            step: -0.04,
            goal: 10.0,
            wall: 0.0,
            overrides: Vec::new(),
        }
    }
}

impl RewardConfig {
    pub fn new(step: f64, goal: f64, wall: f64) -> Self {
        Self {
            step,
            goal,
            wall,
            overrides: Vec::new(),
        }
    }

    pub fn with_override(mut self, pos: Position, reward: f64) -> Self {
        self.overrides.push((pos, reward));
        self
    }

    pub fn preset(name: &str) -> Result<Self, SolverError> {
        let cfg = match name {
            "balanced" => Self::new(-0.04, 10.0, 0.0),
            "fast_path" => Self::new(-0.1, 10.0, 0.0),
            "careful" => Self::new(-0.01, 5.0, 0.0),
            "goal_focused" => Self::new(-0.02, 50.0, 0.0),
            "risky" => Self::new(-0.05, 15.0, -5.0),
            other => return Err(SolverError::UnknownPreset(other.to_string())),
        };
        Ok(cfg)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IterationResult {
    pub method: SolveMethod,
    pub iterations: usize,
    pub converged: bool,
    /// Max change of the last value-iteration sweep; `None` for policy
    /// iteration or when no sweep ran.
    pub final_delta: Option<f64>,
    /// Per-sweep max delta (value iteration) or 1/0 policy-changed flags
    /// (policy iteration).
    pub history: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverStats {
    pub rows: usize,
    pub cols: usize,
    pub gamma: f64,
    pub terminal_states: usize,
    pub valid_states: usize,
    pub max_value: f64,
    pub min_value: f64,
    pub mean_value: f64,
}

/// Grid MDP solver. Owns its copy of the maze.
#[derive(Debug, Clone)]
pub struct MazeDp {
    grid: Grid,
    gamma: f64,
    reward_config: RewardConfig,
    rewards: Vec<f64>,
    terminal: Vec<bool>,
    terminals: Vec<Position>,
    values: Vec<f64>,
    policy: Vec<Option<Direction>>,
    history: Vec<f64>,
    policy_seed: u64,
}

impl MazeDp {
    pub fn new(grid: Grid, gamma: f64) -> Result<Self, SolverError> {
        if !(gamma > 0.0 && gamma <= 1.0) {
            return Err(SolverError::InvalidGamma(gamma));
        }
        if grid.is_empty() {
            return Err(SolverError::EmptyGrid);
        }

        let n = grid.len();
        let terminal: Vec<bool> = grid.cells().iter().map(|&c| c == CellType::Exit).collect();
        let terminals = grid.positions_of(CellType::Exit);
        let mut dp = Self {
            grid,
            gamma,
            reward_config: RewardConfig::default(),
            rewards: vec![0.0; n],
            terminal,
            terminals,
            values: vec![0.0; n],
            policy: vec![None; n],
            history: Vec::new(),
            policy_seed: DEFAULT_POLICY_SEED,
        };
        dp.apply_rewards();
        dp.reset();
        debug!(
            "Solver ready: {}x{} gamma={} terminals={}",
            dp.grid.rows(),
            dp.grid.cols(),
            gamma,
            dp.terminals.len()
        );
        Ok(dp)
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn terminal_states(&self) -> &[Position] {
        &self.terminals
    }

    pub fn reward_config(&self) -> &RewardConfig {
        &self.reward_config
    }

    pub fn policy_seed(&self) -> u64 {
        self.policy_seed
    }

    /// Seed for the random initial policy of [`MazeDp::policy_iteration`].
    pub fn set_policy_seed(&mut self, seed: u64) {
        self.policy_seed = seed;
    }

    fn apply_rewards(&mut self) {
        let cfg = &self.reward_config;
        for (reward, &cell) in self.rewards.iter_mut().zip(self.grid.cells()) {
            *reward = match cell {
                CellType::Wall => cfg.wall,
                CellType::Exit => cfg.goal,
                _ => cfg.step,
            };
        }
        for &(pos, reward) in &cfg.overrides {
            if self.grid.contains(pos) {
                let idx = self.grid.index(pos);
                self.rewards[idx] = reward;
            }
        }
        self.pin_terminals();
    }

    fn pin_terminals(&mut self) {
        for (idx, &is_terminal) in self.terminal.iter().enumerate() {
            if is_terminal {
                self.values[idx] = self.rewards[idx];
            }
        }
    }

    /// Rebuilds the reward grid. Learned values are kept, except terminals
    /// which follow their new reward.
    pub fn update_rewards(&mut self, config: RewardConfig) {
        info!(
            "Rewards updated: step={} goal={} wall={} overrides={}",
            config.step,
            config.goal,
            config.wall,
            config.overrides.len()
        );
        self.reward_config = config;
        self.apply_rewards();
    }

    #[inline]
    fn is_active(&self, idx: usize) -> bool {
        self.grid.cells()[idx] != CellType::Wall && !self.terminal[idx]
    }

    /// Deterministic transition; walls and edges bounce back to `pos`.
    pub fn next_state(&self, pos: Position, action: Direction) -> Position {
        match self.grid.step(pos, action) {
            Some(next) if self.grid.get(next) != CellType::Wall => next,
            _ => pos,
        }
    }

    fn backup(&self, idx: usize, action: Direction, values: &[f64]) -> f64 {
        let next = self.next_state(self.grid.position(idx), action);
        self.rewards[idx] + self.gamma * values[self.grid.index(next)]
    }

    /// First action in `Direction::ACTIONS` order reaching the max backup.
    fn best_action(&self, idx: usize, values: &[f64]) -> (Direction, f64) {
        let mut best = (Direction::ACTIONS[0], self.backup(idx, Direction::ACTIONS[0], values));
        for action in &Direction::ACTIONS[1..] {
            let q = self.backup(idx, *action, values);
            if q > best.1 {
                best = (*action, q);
            }
        }
        best
    }

    /// Computes a fresh value for every cell from the previous sweep.
    fn sweep<F>(&self, f: F) -> Vec<f64>
    where
        F: Fn(usize) -> f64 + Sync + Send,
    {
        #[cfg(feature = "parallel")]
        {
            (0..self.values.len()).into_par_iter().map(f).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            (0..self.values.len()).map(f).collect()
        }
    }

    fn max_delta(old: &[f64], new: &[f64]) -> f64 {
        old.iter()
            .zip(new)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }

    pub fn value_iteration(&mut self, max_iterations: usize, theta: f64) -> IterationResult {
        self.history.clear();
        let mut iterations = 0;
        let mut converged = false;

        for _ in 0..max_iterations {
            let old = &self.values;
            let next = self.sweep(|idx| {
                if self.is_active(idx) {
                    self.best_action(idx, old).1
                } else {
                    old[idx]
                }
            });
            let delta = Self::max_delta(&self.values, &next);
            self.values = next;
            self.history.push(delta);
            iterations += 1;

            if delta < theta {
                converged = true;
                break;
            }
        }

        self.extract_policy();
        info!(
            "Value iteration finished: {} iterations, converged={}",
            iterations, converged
        );
        IterationResult {
            method: SolveMethod::ValueIteration,
            iterations,
            converged,
            final_delta: self.history.last().copied(),
            history: self.history.clone(),
        }
    }

    fn extract_policy(&mut self) {
        let policy: Vec<Option<Direction>> = (0..self.values.len())
            .map(|idx| {
                self.is_active(idx)
                    .then(|| self.best_action(idx, &self.values).0)
            })
            .collect();
        self.policy = policy;
    }

    pub fn policy_iteration(&mut self, max_iterations: usize) -> IterationResult {
        let mut rng = StdRng::seed_from_u64(self.policy_seed);
        for idx in 0..self.policy.len() {
            self.policy[idx] = if self.is_active(idx) {
                Some(Direction::ACTIONS[rng.gen_range(0..Direction::ACTIONS.len())])
            } else {
                None
            };
        }

        self.history.clear();
        let mut iterations = 0;
        let mut converged = false;
        for _ in 0..max_iterations {
            self.evaluate_policy();
            let changed = self.improve_policy();
            iterations += 1;
            self.history.push(if changed { 1.0 } else { 0.0 });
            if !changed {
                converged = true;
                break;
            }
        }

        info!(
            "Policy iteration finished: {} iterations, converged={}",
            iterations, converged
        );
        IterationResult {
            method: SolveMethod::PolicyIteration,
            iterations,
            converged,
            final_delta: None,
            history: self.history.clone(),
        }
    }

    fn evaluate_policy(&mut self) {
        for sweep in 0..MAX_EVAL_SWEEPS {
            let old = &self.values;
            let policy = &self.policy;
            let next = self.sweep(|idx| match policy[idx] {
                Some(action) if self.is_active(idx) => self.backup(idx, action, old),
                _ => old[idx],
            });
            let delta = Self::max_delta(&self.values, &next);
            self.values = next;
            if delta < EVAL_THETA {
                debug!("Policy evaluation settled after {} sweeps", sweep + 1);
                return;
            }
        }
    }

    /// Greedy improvement; `true` when any action changed.
    fn improve_policy(&mut self) -> bool {
        let mut changed = false;
        for idx in 0..self.policy.len() {
            if !self.is_active(idx) {
                continue;
            }
            let best = Some(self.best_action(idx, &self.values).0);
            if self.policy[idx] != best {
                self.policy[idx] = best;
                changed = true;
            }
        }
        changed
    }

    /// Zeroes values and clears the policy; grid and rewards are kept.
    pub fn reset(&mut self) {
        self.values.iter_mut().for_each(|v| *v = 0.0);
        self.pin_terminals();
        self.policy.iter_mut().for_each(|a| *a = None);
        self.history.clear();
    }

    pub fn value(&self, pos: Position) -> Option<f64> {
        self.grid
            .contains(pos)
            .then(|| self.values[self.grid.index(pos)])
    }

    pub fn value_function(&self) -> Vec<Vec<f64>> {
        self.values
            .chunks(self.grid.cols())
            .map(<[f64]>::to_vec)
            .collect()
    }

    pub fn rewards(&self) -> Vec<Vec<f64>> {
        self.rewards
            .chunks(self.grid.cols())
            .map(<[f64]>::to_vec)
            .collect()
    }

    pub fn policy(&self) -> Vec<Vec<Option<Direction>>> {
        self.policy
            .chunks(self.grid.cols())
            .map(<[Option<Direction>]>::to_vec)
            .collect()
    }

    /// Action codes (UP=0 .. LEFT=3), -1 where no action applies.
    pub fn policy_codes(&self) -> Vec<Vec<i8>> {
        self.policy
            .chunks(self.grid.cols())
            .map(|row| {
                row.iter()
                    .map(|a| a.map_or(-1, |d| d.action_index() as i8))
                    .collect()
            })
            .collect()
    }

    /// `None` for walls, terminals, out-of-bounds cells and unsolved cells.
    pub fn policy_at(&self, row: usize, col: usize) -> Option<Direction> {
        if !self.grid.contains((row, col)) {
            return None;
        }
        self.policy[self.grid.index((row, col))]
    }

    /// Bellman backups for every action in `Direction::ACTIONS` order.
    pub fn action_values(&self, pos: Position) -> Option<[f64; 4]> {
        if !self.grid.contains(pos) || self.grid.get(pos) == CellType::Wall {
            return None;
        }
        let idx = self.grid.index(pos);
        Some(Direction::ACTIONS.map(|a| self.backup(idx, a, &self.values)))
    }

    pub fn convergence_history(&self) -> &[f64] {
        &self.history
    }

    /// Follows the current policy from `start` until a terminal, a revisited
    /// cell, a cell without an action, or `max_steps` moves.
    pub fn greedy_path(&self, start: Position, max_steps: usize) -> Vec<Position> {
        if !self.grid.is_walkable(start) {
            return Vec::new();
        }
        let mut path = vec![start];
        let mut seen = vec![false; self.values.len()];
        let mut pos = start;
        seen[self.grid.index(pos)] = true;

        for _ in 0..max_steps {
            let idx = self.grid.index(pos);
            let Some(action) = self.policy[idx] else {
                break;
            };
            let next = self.next_state(pos, action);
            let next_idx = self.grid.index(next);
            if seen[next_idx] {
                break;
            }
            seen[next_idx] = true;
            path.push(next);
            pos = next;
        }
        path
    }

    pub fn stats(&self) -> SolverStats {
        let valid: Vec<f64> = self
            .values
            .iter()
            .zip(self.grid.cells())
            .filter(|&(_, &c)| c != CellType::Wall)
            .map(|(&v, _)| v)
            .collect();

        let (max_value, min_value, mean_value) = if valid.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            (
                valid.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                valid.iter().copied().fold(f64::INFINITY, f64::min),
                valid.iter().sum::<f64>() / valid.len() as f64,
            )
        };

        SolverStats {
            rows: self.grid.rows(),
            cols: self.grid.cols(),
            gamma: self.gamma,
            terminal_states: self.terminals.len(),
            valid_states: valid.len(),
            max_value,
            min_value,
            mean_value,
        }
    }
}
