//! Probabilistic maze generation.
//!
//! Rooms grow outward from a start cell in FIFO (breadth-first) order. Each
//! unvisited neighbour of a dequeued room becomes a room with a probability
//! that rises with its position in a weighted-random direction order and
//! falls with the number of rooms already touching it. A neighbour that
//! would touch two separate room regions always becomes a wall, which keeps
//! the corridor network loop-free and in one piece.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::GenerationConfig;
use crate::grid::{manhattan, CellType, Direction, Grid, Position};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error("start ({row}, {col}) is outside the {height}x{width} maze")]
    StartOutOfBounds {
        row: usize,
        col: usize,
        height: usize,
        width: usize,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GenerationStats {
    pub rooms: usize,
    pub walls: usize,
    pub room_percentage: f64,
}

/// A finished maze and how it was produced.
#[derive(Debug, Clone)]
pub struct Generated {
    pub grid: Grid,
    pub stats: GenerationStats,
    pub start: Position,
}

/// Orders `items` by weighted sampling without replacement.
///
/// Each item with a positive weight `w` draws `u` in `[0, 1)` and gets the
/// key `u^(1/w)`; larger keys come first, so heavier items tend to lead.
/// Items with a weight `<= 0` draw nothing and trail in input order.
/// Extra items or weights beyond the shorter slice are ignored.
pub fn weighted_shuffle<T: Copy, R: Rng + ?Sized>(
    items: &[T],
    weights: &[f64],
    rng: &mut R,
) -> Vec<T> {
    let mut keyed: Vec<(f64, T)> = items
        .iter()
        .zip(weights)
        .map(|(&item, &w)| {
            let key = if w > 0.0 {
                rng.gen::<f64>().powf(1.0 / w)
            } else {
                f64::NEG_INFINITY
            };
            (key, item)
        })
        .collect();
    // Stable: equal keys (the zero-weight tail) keep their input order.
    keyed.sort_by(|a, b| b.0.total_cmp(&a.0));
    keyed.into_iter().map(|(_, item)| item).collect()
}

#[derive(Debug, Clone)]
pub struct MazeGenerator<R = StdRng> {
    config: GenerationConfig,
    grid: Grid,
    stats: GenerationStats,
    rng: R,
}

impl MazeGenerator<StdRng> {
    pub fn new(config: GenerationConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_seed(config: GenerationConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> MazeGenerator<R> {
    pub fn with_rng(config: GenerationConfig, rng: R) -> Self {
        let grid = Grid::new(config.height(), config.width(), CellType::Unvisited);
        Self {
            config,
            grid,
            stats: GenerationStats::default(),
            rng,
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// The grid of the most recent run (all UNVISITED before the first).
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn stats(&self) -> GenerationStats {
        self.stats
    }

    /// Runs one full generation. Missing start coordinates are drawn
    /// uniformly; the returned grid is a copy the caller owns.
    pub fn generate(
        &mut self,
        start_row: Option<usize>,
        start_col: Option<usize>,
    ) -> Result<Generated, GenerateError> {
        let (height, width) = (self.config.height(), self.config.width());
        let row = start_row.unwrap_or_else(|| self.rng.gen_range(0..height));
        let col = start_col.unwrap_or_else(|| self.rng.gen_range(0..width));
        if row >= height || col >= width {
            return Err(GenerateError::StartOutOfBounds {
                row,
                col,
                height,
                width,
            });
        }

        self.grid = Grid::new(height, width, CellType::Unvisited);
        self.stats = GenerationStats::default();

        let start = (row, col);
        self.grid.set(start, CellType::Room);
        self.stats.rooms += 1;
        let mut queue = VecDeque::from([start]);
        debug!("Starting maze generation at {:?} ({}x{})", start, height, width);

        let mut steps = 0usize;
        while let Some(pos) = queue.pop_front() {
            steps += 1;
            let neighbors = self.unvisited_neighbors(pos);
            let total = neighbors.len();
            trace!("step {steps}: visiting {pos:?}, {total} unvisited neighbours");
            for (i, next) in neighbors.into_iter().enumerate() {
                if self.process_neighbor(next, i, total) {
                    queue.push_back(next);
                }
            }
        }

        self.finalize();
        debug!(
            "Maze generated in {steps} steps: {} rooms, {} walls ({:.1}% rooms)",
            self.stats.rooms, self.stats.walls, self.stats.room_percentage
        );

        Ok(Generated {
            grid: self.grid.clone(),
            stats: self.stats,
            start,
        })
    }

    /// Directions in weighted-random order for the next expansion.
    pub fn weighted_directions(&mut self) -> Vec<Direction> {
        weighted_shuffle(
            &Direction::GENERATION_ORDER,
            &self.config.generation_weights(),
            &mut self.rng,
        )
    }

    /// UNVISITED neighbours of `pos`, in weighted-random direction order.
    pub fn unvisited_neighbors(&mut self, pos: Position) -> Vec<Position> {
        self.weighted_directions()
            .into_iter()
            .filter_map(|d| self.grid.step(pos, d))
            .filter(|&p| self.grid.get(p) == CellType::Unvisited)
            .collect()
    }

    pub fn count_adjacent_rooms(&self, pos: Position) -> usize {
        self.grid
            .neighbors(pos)
            .filter(|&p| self.grid.get(p) == CellType::Room)
            .count()
    }

    /// Connected groups among the ROOM cells 4-adjacent to `pos`, where two
    /// of them are connected only through each other (never through `pos`
    /// or any other cell).
    pub fn count_room_regions_around(&self, pos: Position) -> usize {
        let rooms = self.grid.neighbors_of_type(pos, CellType::Room);
        let mut seen = vec![false; rooms.len()];
        let mut regions = 0;

        for i in 0..rooms.len() {
            if seen[i] {
                continue;
            }
            regions += 1;
            seen[i] = true;
            let mut queue = VecDeque::from([rooms[i]]);
            while let Some(cur) = queue.pop_front() {
                for (j, &other) in rooms.iter().enumerate() {
                    if !seen[j] && manhattan(cur, other) == 1 {
                        seen[j] = true;
                        queue.push_back(other);
                    }
                }
            }
        }
        regions
    }

    /// Probability that the `index`-th of `total` discovered neighbours
    /// becomes a room.
    pub fn room_probability(&self, pos: Position, index: usize, total: usize) -> f64 {
        let base_prob = if total > 0 {
            (index + 1) as f64 / total as f64
        } else {
            self.config.base_prob_factor()
        };
        let decay = self.config.decay_factor() * self.count_adjacent_rooms(pos) as f64;
        (base_prob - decay).max(self.config.min_room_prob())
    }

    fn process_neighbor(&mut self, pos: Position, index: usize, total: usize) -> bool {
        let room_prob = self.room_probability(pos, index, total);
        let roll: f64 = self.rng.gen();
        let regions = self.count_room_regions_around(pos);
        let is_room = regions <= 1 && roll < room_prob;
        trace!(
            "  neighbour {pos:?}: room_prob={room_prob:.2} roll={roll:.2} regions={regions} -> {}",
            if is_room { "room" } else { "wall" }
        );

        if is_room {
            self.grid.set(pos, CellType::Room);
            self.stats.rooms += 1;
        } else {
            self.grid.set(pos, CellType::Wall);
            self.stats.walls += 1;
        }
        is_room
    }

    /// Turns every cell the expansion never reached into WALL.
    fn finalize(&mut self) {
        self.stats.walls += self.grid.replace_all(CellType::Unvisited, CellType::Wall);
        let total = self.grid.len();
        self.stats.room_percentage = if total > 0 {
            self.stats.rooms as f64 / total as f64 * 100.0
        } else {
            0.0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigParams, PRESETS};

    fn generator(width: usize, height: usize, seed: u64) -> MazeGenerator {
        let cfg = ConfigParams::with_size(width, height).build().unwrap();
        MazeGenerator::with_seed(cfg, seed)
    }

    #[test]
    fn generation_leaves_no_unvisited_cells() {
        for seed in 0..20 {
            let mut gen = generator(12, 9, seed);
            let out = gen.generate(None, None).unwrap();
            assert_eq!(out.grid.count(CellType::Unvisited), 0, "seed {seed}");
            assert_eq!(out.grid.rows(), 9);
            assert_eq!(out.grid.cols(), 12);
        }
    }

    #[test]
    fn rooms_form_a_single_region() {
        for name in PRESETS {
            for seed in 0..5 {
                let cfg = GenerationConfig::preset(name).unwrap();
                let mut gen = MazeGenerator::with_seed(cfg, seed);
                let out = gen.generate(None, None).unwrap();
                assert_eq!(
                    out.grid.regions(CellType::Room),
                    1,
                    "preset {name} seed {seed}\n{}",
                    out.grid
                );
                assert_eq!(out.grid.get(out.start), CellType::Room);
            }
        }
    }

    #[test]
    fn stats_match_grid() {
        let mut gen = generator(15, 15, 7);
        let out = gen.generate(Some(7), Some(7)).unwrap();
        assert_eq!(out.start, (7, 7));
        assert_eq!(out.stats.rooms, out.grid.count(CellType::Room));
        assert_eq!(out.stats.walls, out.grid.count(CellType::Wall));
        assert_eq!(out.stats.rooms + out.stats.walls, 225);
        let pct = out.stats.rooms as f64 / 225.0 * 100.0;
        assert!((out.stats.room_percentage - pct).abs() < 1e-9);
    }

    #[test]
    fn same_seed_same_maze() {
        let a = generator(20, 20, 99).generate(None, None).unwrap();
        let b = generator(20, 20, 99).generate(None, None).unwrap();
        assert_eq!(a.grid, b.grid);
        assert_eq!(a.start, b.start);
    }

    #[test]
    fn regenerating_starts_from_scratch() {
        let mut gen = generator(10, 10, 3);
        let first = gen.generate(Some(0), Some(0)).unwrap();
        let second = gen.generate(Some(9), Some(9)).unwrap();
        assert_eq!(second.stats.rooms + second.stats.walls, 100);
        assert_eq!(second.grid.get((9, 9)), CellType::Room);
        assert_eq!(first.stats.rooms + first.stats.walls, 100);
    }

    #[test]
    fn out_of_bounds_start_is_rejected() {
        let mut gen = generator(5, 4, 1);
        let err = gen.generate(Some(4), Some(0)).unwrap_err();
        assert_eq!(
            err,
            GenerateError::StartOutOfBounds {
                row: 4,
                col: 0,
                height: 4,
                width: 5
            }
        );
        assert_eq!(gen.grid().count(CellType::Unvisited), 20);
    }

    #[test]
    fn room_probability_follows_formula() {
        let mut gen = generator(5, 5, 0);
        gen.grid.set((2, 1), CellType::Room);
        // (2,2) touches one room.
        let p = gen.room_probability((2, 2), 2, 3);
        assert!((p - (1.0 - 0.25)).abs() < 1e-12);
        // First of four with one adjacent room drops below the floor.
        let p = gen.room_probability((2, 2), 0, 4);
        assert!((p - 0.05).abs() < 1e-12);
        // No neighbours discovered: base_prob_factor.
        let p = gen.room_probability((0, 4), 0, 0);
        assert!((p - 0.25).abs() < 1e-12);
    }

    #[test]
    fn regions_around_counts_room_neighbours() {
        let mut gen = generator(5, 5, 0);
        assert_eq!(gen.count_room_regions_around((2, 2)), 0);
        gen.grid.set((1, 2), CellType::Room);
        assert_eq!(gen.count_room_regions_around((2, 2)), 1);
        gen.grid.set((3, 2), CellType::Room);
        assert_eq!(gen.count_room_regions_around((2, 2)), 2);
        assert_eq!(gen.count_adjacent_rooms((2, 2)), 2);
    }

    #[test]
    fn heavy_weight_usually_leads() {
        let mut rng = StdRng::seed_from_u64(2024);
        let items = ['a', 'b', 'c', 'd'];
        let weights = [0.7, 0.1, 0.1, 0.1];
        let mut first = [0usize; 4];
        for _ in 0..10_000 {
            let order = weighted_shuffle(&items, &weights, &mut rng);
            let idx = items.iter().position(|&c| c == order[0]).unwrap();
            first[idx] += 1;
        }
        assert!(first[0] > first[1] && first[0] > first[2] && first[0] > first[3]);
    }

    #[test]
    fn zero_weights_trail_in_order() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            let order = weighted_shuffle(&[1, 2, 3, 4], &[0.0, 0.5, 0.0, 0.5], &mut rng);
            assert_eq!(&order[2..], &[1, 3]);
            assert_eq!(order.len(), 4);
        }
    }
}
