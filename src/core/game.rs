use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::grid::{manhattan, CellType, Direction, Grid, Position};

pub const DEFAULT_EXIT_SEARCH_RADIUS: usize = 3;
pub const DEFAULT_MIN_EXIT_DISTANCE: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("maze has no cells")]
    EmptyGrid,
    #[error("no maze loaded")]
    NoGrid,
    #[error("player has not been placed")]
    NoPlayer,
    #[error("invalid player position ({0}, {1})")]
    InvalidPosition(usize, usize),
    #[error("no rooms available for the {0}")]
    NoRooms(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MoveEvent {
    Moved,
    ReachedExit,
    Bump,
    OutOfBounds,
    /// No session, or the game is already over.
    Inactive,
}

impl MoveEvent {
    pub fn moved(self) -> bool {
        matches!(self, MoveEvent::Moved | MoveEvent::ReachedExit)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MoveEvent::Moved => "moved",
            MoveEvent::ReachedExit => "reached_exit",
            MoveEvent::Bump => "bump",
            MoveEvent::OutOfBounds => "out_of_bounds",
            MoveEvent::Inactive => "inactive",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GameStats {
    pub moves_count: u32,
    pub started_at: Option<Instant>,
    pub ended_at: Option<Instant>,
    /// Every cell the player has stood on; the first entry is the start.
    pub path: Vec<Position>,
}

impl GameStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start-to-finish time; `None` until the game is won.
    pub fn duration(&self) -> Option<Duration> {
        Some(self.ended_at?.duration_since(self.started_at?))
    }

    /// Time since the start, frozen once the game ends.
    pub fn elapsed(&self) -> Option<Duration> {
        let start = self.started_at?;
        Some(self.ended_at.unwrap_or_else(Instant::now).duration_since(start))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ExitStrategy {
    /// A room near one of the grid corners, far enough from the player.
    NearCorner,
    /// The room farthest from the player among those far enough away.
    Farthest,
    /// No room met the minimum distance; any room was used.
    Unconstrained,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExitPlacement {
    pub position: Position,
    pub distance: usize,
    pub strategy: ExitStrategy,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GameInfo {
    pub playing: bool,
    pub won: bool,
    pub over: bool,
    pub player: Option<Position>,
    pub exit: Option<Position>,
    pub dimensions: (usize, usize),
    pub moves_count: u32,
    pub duration_secs: Option<f64>,
    pub path_length: usize,
}

/// Serializable copy of a session.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GameSave {
    pub grid: Option<Grid>,
    pub original: Option<Grid>,
    pub player: Option<Position>,
    pub exit: Option<Position>,
    pub playing: bool,
    pub won: bool,
    pub over: bool,
    pub moves_count: u32,
    pub elapsed_secs: Option<f64>,
    pub path: Vec<Position>,
}

/// Interactive session over one maze.
///
/// The game owns its grid: `load` takes a grid by value and keeps a pristine
/// copy so `start_game` can restart on the same layout.
#[derive(Debug, Clone)]
pub struct MazeGame<R = StdRng> {
    grid: Option<Grid>,
    original: Option<Grid>,
    player: Option<Position>,
    exit: Option<Position>,
    playing: bool,
    won: bool,
    over: bool,
    stats: GameStats,
    exit_search_radius: usize,
    min_exit_distance: usize,
    rng: R,
}

impl MazeGame<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for MazeGame<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> MazeGame<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            grid: None,
            original: None,
            player: None,
            exit: None,
            playing: false,
            won: false,
            over: false,
            stats: GameStats::new(),
            exit_search_radius: DEFAULT_EXIT_SEARCH_RADIUS,
            min_exit_distance: DEFAULT_MIN_EXIT_DISTANCE,
            rng,
        }
    }

    pub fn load(&mut self, grid: Grid) -> Result<(), GameError> {
        if grid.is_empty() {
            return Err(GameError::EmptyGrid);
        }
        info!("Maze loaded: {}x{}", grid.rows(), grid.cols());
        self.original = Some(grid.clone());
        self.grid = Some(grid);
        self.reset_session();
        Ok(())
    }

    fn reset_session(&mut self) {
        self.player = None;
        self.exit = None;
        self.playing = false;
        self.won = false;
        self.over = false;
        self.stats = GameStats::new();
    }

    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    pub fn original_grid(&self) -> Option<&Grid> {
        self.original.as_ref()
    }

    /// `(height, width)`, or `(0, 0)` with no maze.
    pub fn dimensions(&self) -> (usize, usize) {
        self.grid
            .as_ref()
            .map(|g| (g.rows(), g.cols()))
            .unwrap_or((0, 0))
    }

    pub fn player(&self) -> Option<Position> {
        self.player
    }

    pub fn exit(&self) -> Option<Position> {
        self.exit
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_won(&self) -> bool {
        self.won
    }

    pub fn is_over(&self) -> bool {
        self.over
    }

    pub fn stats(&self) -> &GameStats {
        &self.stats
    }

    pub fn exit_search_radius(&self) -> usize {
        self.exit_search_radius
    }

    pub fn set_exit_search_radius(&mut self, radius: usize) {
        self.exit_search_radius = radius;
    }

    pub fn min_exit_distance(&self) -> usize {
        self.min_exit_distance
    }

    pub fn set_min_exit_distance(&mut self, distance: usize) {
        self.min_exit_distance = distance;
    }

    pub fn is_walkable(&self, pos: Position) -> bool {
        self.grid.as_ref().is_some_and(|g| g.is_walkable(pos))
    }

    /// ROOM cells, row-major.
    pub fn available_rooms(&self, exclude_player: bool) -> Vec<Position> {
        let Some(grid) = self.grid.as_ref() else {
            return Vec::new();
        };
        grid.positions_of(CellType::Room)
            .into_iter()
            .filter(|&p| !(exclude_player && Some(p) == self.player))
            .collect()
    }

    /// Puts the player on `position`, or on a random ROOM cell.
    pub fn place_player(&mut self, position: Option<Position>) -> Result<Position, GameError> {
        let grid = self.grid.as_ref().ok_or(GameError::NoGrid)?;

        let pos = match position {
            Some(p) => {
                if !grid.is_walkable(p) {
                    return Err(GameError::InvalidPosition(p.0, p.1));
                }
                p
            }
            None => {
                let rooms = grid.positions_of(CellType::Room);
                *rooms
                    .choose(&mut self.rng)
                    .ok_or(GameError::NoRooms("player"))?
            }
        };

        let grid = self.grid.as_mut().ok_or(GameError::NoGrid)?;
        if let Some(old) = self.player.take() {
            grid.set(old, CellType::Room);
        }
        if self.exit == Some(pos) {
            self.exit = None;
        }
        grid.set(pos, CellType::Player);

        self.player = Some(pos);
        self.playing = true;
        self.won = false;
        self.over = false;
        self.stats = GameStats {
            started_at: Some(Instant::now()),
            path: vec![pos],
            ..GameStats::new()
        };
        info!("Player placed at {:?}", pos);
        Ok(pos)
    }

    fn corners(&self) -> [Position; 4] {
        let (h, w) = self.dimensions();
        let (r, c) = (h.saturating_sub(1), w.saturating_sub(1));
        [(0, 0), (0, c), (r, 0), (r, c)]
    }

    /// ROOM cells (never the player) within a square of `radius` around
    /// `center`.
    fn rooms_near(&self, center: Position, radius: usize) -> Vec<Position> {
        let Some(grid) = self.grid.as_ref() else {
            return Vec::new();
        };
        let rows = center.0.saturating_sub(radius)..(center.0 + radius + 1).min(grid.rows());
        let cols = center.1.saturating_sub(radius)..(center.1 + radius + 1).min(grid.cols());
        let mut rooms = Vec::new();
        for r in rows {
            for c in cols.clone() {
                if grid.get((r, c)) == CellType::Room && Some((r, c)) != self.player {
                    rooms.push((r, c));
                }
            }
        }
        rooms
    }

    fn choose_exit(&mut self, player: Position, min_dist: usize) -> Option<(Position, ExitStrategy)> {
        let mut corners: Vec<(usize, Position)> = self
            .corners()
            .into_iter()
            .map(|c| (manhattan(player, c), c))
            .collect();
        corners.sort_by(|a, b| b.cmp(a));

        for (_, corner) in corners {
            let valid: Vec<Position> = self
                .rooms_near(corner, self.exit_search_radius)
                .into_iter()
                .filter(|&r| manhattan(player, r) >= min_dist)
                .collect();
            if let Some(&pos) = valid.choose(&mut self.rng) {
                return Some((pos, ExitStrategy::NearCorner));
            }
        }

        let rooms = self.available_rooms(true);
        let farthest = rooms
            .iter()
            .copied()
            .filter(|&r| manhattan(player, r) >= min_dist)
            .max_by_key(|&r| manhattan(player, r));
        if let Some(pos) = farthest {
            return Some((pos, ExitStrategy::Farthest));
        }

        let pos = *rooms.choose(&mut self.rng)?;
        warn!(
            "Exit placed at {:?} without the minimum distance constraint ({} < {})",
            pos,
            manhattan(player, pos),
            min_dist
        );
        Some((pos, ExitStrategy::Unconstrained))
    }

    /// Places the exit, preferring rooms near the corner farthest from the
    /// player. `min_distance` defaults to `min_exit_distance`.
    pub fn place_exit(&mut self, min_distance: Option<usize>) -> Result<ExitPlacement, GameError> {
        if self.grid.is_none() {
            return Err(GameError::NoGrid);
        }
        let player = match self.player {
            Some(p) if self.playing => p,
            _ => return Err(GameError::NoPlayer),
        };
        let min_dist = min_distance.unwrap_or(self.min_exit_distance);

        let (pos, strategy) = self
            .choose_exit(player, min_dist)
            .ok_or(GameError::NoRooms("exit"))?;

        // One active exit: stale or pre-loaded exits go back to rooms.
        let grid = self.grid.as_mut().ok_or(GameError::NoGrid)?;
        grid.replace_all(CellType::Exit, CellType::Room);
        grid.set(pos, CellType::Exit);
        self.exit = Some(pos);

        let distance = manhattan(player, pos);
        info!("Exit placed at {:?} - distance: {}", pos, distance);
        Ok(ExitPlacement {
            position: pos,
            distance,
            strategy,
        })
    }

    /// Attempts one move and reports what happened.
    pub fn step(&mut self, direction: Direction) -> MoveEvent {
        if !self.playing || self.over {
            return MoveEvent::Inactive;
        }
        let (Some(grid), Some(from)) = (self.grid.as_mut(), self.player) else {
            return MoveEvent::Inactive;
        };
        let Some(to) = grid.step(from, direction) else {
            debug!("Move {} from {:?} leaves the maze", direction, from);
            return MoveEvent::OutOfBounds;
        };

        let target = grid.get(to);
        if target == CellType::Wall {
            debug!("Move {} from {:?} hits a wall", direction, from);
            return MoveEvent::Bump;
        }

        grid.set(from, CellType::Visited);
        grid.set(to, CellType::Player);
        self.player = Some(to);
        self.stats.moves_count += 1;
        self.stats.path.push(to);

        if target == CellType::Exit {
            self.won = true;
            self.over = true;
            self.stats.ended_at = Some(Instant::now());
            info!(
                "Player reached the exit at {:?} in {} moves",
                to, self.stats.moves_count
            );
            MoveEvent::ReachedExit
        } else {
            MoveEvent::Moved
        }
    }

    /// `true` when the player actually moved.
    pub fn move_player(&mut self, direction: Direction) -> bool {
        self.step(direction).moved()
    }

    pub fn is_valid_move(&self, direction: Direction) -> bool {
        if !self.playing || self.over {
            return false;
        }
        match (self.grid.as_ref(), self.player) {
            (Some(grid), Some(from)) => grid
                .step(from, direction)
                .is_some_and(|to| grid.get(to).is_walkable()),
            _ => false,
        }
    }

    pub fn valid_moves(&self) -> Vec<Direction> {
        Direction::GENERATION_ORDER
            .into_iter()
            .filter(|&d| self.is_valid_move(d))
            .collect()
    }

    /// Restores the pristine maze and places a fresh player and exit.
    pub fn start_game(
        &mut self,
        player: Option<Position>,
        min_exit_distance: Option<usize>,
    ) -> Result<ExitPlacement, GameError> {
        let original = self.original.clone().ok_or(GameError::NoGrid)?;
        self.grid = Some(original);
        self.reset_session();
        self.place_player(player)?;
        let placement = self.place_exit(min_exit_distance)?;
        info!("Game started");
        Ok(placement)
    }

    pub fn distance_to_exit(&self) -> Option<usize> {
        Some(manhattan(self.player?, self.exit?))
    }

    pub fn info(&self) -> GameInfo {
        GameInfo {
            playing: self.playing,
            won: self.won,
            over: self.over,
            player: self.player,
            exit: self.exit,
            dimensions: self.dimensions(),
            moves_count: self.stats.moves_count,
            duration_secs: self.stats.duration().map(|d| d.as_secs_f64()),
            path_length: self.stats.path.len(),
        }
    }

    pub fn save_state(&self) -> GameSave {
        GameSave {
            grid: self.grid.clone(),
            original: self.original.clone(),
            player: self.player,
            exit: self.exit,
            playing: self.playing,
            won: self.won,
            over: self.over,
            moves_count: self.stats.moves_count,
            elapsed_secs: self.stats.elapsed().map(|d| d.as_secs_f64()),
            path: self.stats.path.clone(),
        }
    }

    /// Replaces the session with `save`. Positions must lie on the saved
    /// grid; nothing changes on error.
    pub fn restore_state(&mut self, save: GameSave) -> Result<(), GameError> {
        if let Some(grid) = save.grid.as_ref() {
            if grid.is_empty() {
                return Err(GameError::EmptyGrid);
            }
            for p in save.player.iter().chain(save.exit.iter()) {
                if !grid.contains(*p) {
                    return Err(GameError::InvalidPosition(p.0, p.1));
                }
            }
        } else if save.player.is_some() || save.exit.is_some() {
            return Err(GameError::NoGrid);
        }

        let now = Instant::now();
        let started_at = save
            .elapsed_secs
            .and_then(|s| now.checked_sub(Duration::from_secs_f64(s.max(0.0))));

        self.grid = save.grid;
        self.original = save.original;
        self.player = save.player;
        self.exit = save.exit;
        self.playing = save.playing;
        self.won = save.won;
        self.over = save.over;
        self.stats = GameStats {
            moves_count: save.moves_count,
            started_at,
            ended_at: if save.over { Some(now) } else { None },
            path: save.path,
        };
        info!("Game state restored");
        Ok(())
    }
}

/// Clears every EXIT back to ROOM and marks one new exit, preferring corner
/// rooms (40%), then edge rooms (60%), then any room.
pub fn place_random_exit<R: Rng + ?Sized>(grid: &mut Grid, rng: &mut R) -> Option<Position> {
    let cleared = grid.replace_all(CellType::Exit, CellType::Room);
    let rooms = grid.positions_of(CellType::Room);
    if rooms.is_empty() {
        return None;
    }

    let (last_row, last_col) = (grid.rows() - 1, grid.cols() - 1);
    let on_edge = |&(r, c): &Position| r == 0 || r == last_row || c == 0 || c == last_col;
    let on_corner = |&(r, c): &Position| (r == 0 || r == last_row) && (c == 0 || c == last_col);
    let corners: Vec<Position> = rooms.iter().copied().filter(on_corner).collect();
    let edges: Vec<Position> = rooms
        .iter()
        .copied()
        .filter(|p| on_edge(p) && !on_corner(p))
        .collect();

    let pos = if !corners.is_empty() && rng.gen::<f64>() < 0.4 {
        *corners.choose(rng)?
    } else if !edges.is_empty() && rng.gen::<f64>() < 0.6 {
        *edges.choose(rng)?
    } else {
        *rooms.choose(rng)?
    };

    grid.set(pos, CellType::Exit);
    debug!("Replaced {cleared} exit(s) with a new exit at {pos:?}");
    Some(pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_grid(rows: usize, cols: usize) -> Grid {
        Grid::new(rows, cols, CellType::Room)
    }

    fn game_with(grid: Grid) -> MazeGame {
        let mut g = MazeGame::with_seed(11);
        g.load(grid).unwrap();
        g
    }

    /// Rooms only along row 4 and column 4 of a 9x9 grid: nothing within
    /// three cells of any corner.
    fn cross_grid() -> Grid {
        let mut grid = Grid::new(9, 9, CellType::Wall);
        for i in 0..9 {
            grid.set((4, i), CellType::Room);
            grid.set((i, 4), CellType::Room);
        }
        grid
    }

    #[test]
    fn load_rejects_empty_grid() {
        let mut g = MazeGame::with_seed(1);
        assert_eq!(g.load(Grid::new(0, 0, CellType::Room)), Err(GameError::EmptyGrid));
        assert!(g.grid().is_none());
    }

    #[test]
    fn place_player_validates_position() {
        let grid = Grid::from_codes(&[vec![0, -1], vec![0, 0]]).unwrap();
        let mut g = game_with(grid);
        assert_eq!(
            g.place_player(Some((0, 1))),
            Err(GameError::InvalidPosition(0, 1))
        );
        assert_eq!(
            g.place_player(Some((5, 5))),
            Err(GameError::InvalidPosition(5, 5))
        );
        assert!(!g.is_playing());
        assert_eq!(g.grid().unwrap().count(CellType::Player), 0);

        assert_eq!(g.place_player(Some((1, 0))), Ok((1, 0)));
        assert_eq!(g.grid().unwrap().get((1, 0)), CellType::Player);
        assert_eq!(g.stats().path, vec![(1, 0)]);
        assert!(g.stats().started_at.is_some());
    }

    #[test]
    fn random_player_lands_on_a_room() {
        let grid = Grid::from_codes(&[vec![-1, -1, -1], vec![-1, 0, -1]]).unwrap();
        let mut g = game_with(grid);
        assert_eq!(g.place_player(None), Ok((1, 1)));
    }

    #[test]
    fn placement_fails_without_rooms_or_grid() {
        let mut g = MazeGame::with_seed(3);
        assert_eq!(g.place_player(None), Err(GameError::NoGrid));

        let mut g = game_with(Grid::new(2, 2, CellType::Wall));
        assert_eq!(g.place_player(None), Err(GameError::NoRooms("player")));
        assert_eq!(g.place_exit(None), Err(GameError::NoPlayer));
    }

    #[test]
    fn exit_respects_min_distance() {
        for seed in 0..20 {
            let mut g = MazeGame::with_seed(seed);
            g.load(open_grid(10, 10)).unwrap();
            let player = g.place_player(None).unwrap();
            let placed = g.place_exit(Some(5)).unwrap();
            assert!(manhattan(player, placed.position) >= 5);
            assert_eq!(placed.distance, manhattan(player, placed.position));
            assert_eq!(placed.strategy, ExitStrategy::NearCorner);
            assert_eq!(g.grid().unwrap().count(CellType::Exit), 1);
        }
    }

    #[test]
    fn exit_uses_farthest_room_when_corners_are_walled() {
        let mut g = game_with(cross_grid());
        g.place_player(Some((4, 4))).unwrap();
        let placed = g.place_exit(Some(3)).unwrap();
        assert_eq!(placed.strategy, ExitStrategy::Farthest);
        assert_eq!(placed.distance, 4);
    }

    #[test]
    fn exit_falls_back_without_distance() {
        let mut g = game_with(open_grid(1, 3));
        g.place_player(Some((0, 0))).unwrap();
        let placed = g.place_exit(None).unwrap();
        assert_eq!(placed.strategy, ExitStrategy::Unconstrained);
        assert_ne!(placed.position, (0, 0));
    }

    #[test]
    fn exit_fails_when_only_player_room_exists() {
        let grid = Grid::from_codes(&[vec![0, -1]]).unwrap();
        let mut g = game_with(grid);
        g.place_player(None).unwrap();
        assert_eq!(g.place_exit(None), Err(GameError::NoRooms("exit")));
    }

    #[test]
    fn moving_into_walls_or_edges_changes_nothing() {
        let grid = Grid::from_codes(&[vec![0, -1, 0], vec![0, 0, 0]]).unwrap();
        let mut g = game_with(grid);
        g.place_player(Some((0, 0))).unwrap();
        let before = g.grid().unwrap().clone();

        assert_eq!(g.step(Direction::Right), MoveEvent::Bump);
        assert_eq!(g.step(Direction::Up), MoveEvent::OutOfBounds);
        assert!(!g.move_player(Direction::Left));
        assert_eq!(g.player(), Some((0, 0)));
        assert_eq!(g.grid().unwrap(), &before);
        assert_eq!(g.stats().moves_count, 0);
    }

    #[test]
    fn normal_move_marks_visited() {
        let mut g = game_with(open_grid(2, 2));
        g.place_player(Some((0, 0))).unwrap();
        assert!(g.move_player(Direction::Down));
        let grid = g.grid().unwrap();
        assert_eq!(grid.get((0, 0)), CellType::Visited);
        assert_eq!(grid.get((1, 0)), CellType::Player);
        assert_eq!(g.stats().moves_count, 1);
        assert_eq!(g.stats().path, vec![(0, 0), (1, 0)]);
    }

    #[test]
    fn reaching_exit_wins_and_ends_game() {
        let mut g = game_with(open_grid(1, 7));
        g.place_player(Some((0, 0))).unwrap();
        let exit = g.place_exit(Some(5)).unwrap().position;
        assert!(exit.1 >= 5);

        let mut last = MoveEvent::Moved;
        for _ in 0..exit.1 {
            last = g.step(Direction::Right);
        }
        assert_eq!(last, MoveEvent::ReachedExit);
        assert!(g.is_won());
        assert!(g.is_over());
        assert_eq!(g.stats().path.last(), Some(&exit));
        assert_eq!(g.grid().unwrap().get(exit), CellType::Player);
        assert!(g.stats().duration().is_some());

        assert_eq!(g.step(Direction::Left), MoveEvent::Inactive);
        assert!(g.valid_moves().is_empty());
    }

    #[test]
    fn valid_moves_lists_open_directions() {
        let grid = Grid::from_codes(&[vec![-1, 0, -1], vec![0, 0, -1], vec![-1, -1, -1]]).unwrap();
        let mut g = game_with(grid);
        assert!(g.valid_moves().is_empty());
        g.place_player(Some((1, 1))).unwrap();
        assert_eq!(g.valid_moves(), vec![Direction::Up, Direction::Left]);
    }

    #[test]
    fn start_game_restores_original_layout() {
        let mut g = game_with(open_grid(8, 8));
        g.start_game(Some((0, 0)), None).unwrap();
        g.move_player(Direction::Right);
        g.move_player(Direction::Down);
        assert_eq!(g.grid().unwrap().count(CellType::Visited), 2);

        let placed = g.start_game(Some((7, 7)), Some(6)).unwrap();
        let grid = g.grid().unwrap();
        assert_eq!(grid.count(CellType::Visited), 0);
        assert_eq!(grid.count(CellType::Player), 1);
        assert_eq!(grid.count(CellType::Exit), 1);
        assert!(placed.distance >= 6);
        assert_eq!(g.stats().moves_count, 0);
    }

    #[test]
    fn preloaded_exit_is_replaced_by_the_placed_one() {
        let mut grid = open_grid(10, 10);
        grid.set((9, 9), CellType::Exit);
        let mut g = game_with(grid);

        let placed = g.start_game(Some((0, 9)), None).unwrap();
        let grid = g.grid().unwrap();
        assert_eq!(grid.count(CellType::Exit), 1);
        assert_eq!(grid.get(placed.position), CellType::Exit);
        assert_eq!(g.exit(), Some(placed.position));

        g.place_exit(None).unwrap();
        assert_eq!(g.grid().unwrap().count(CellType::Exit), 1);
    }

    #[test]
    fn save_and_restore_session() {
        let mut g = game_with(open_grid(6, 6));
        g.start_game(Some((0, 0)), None).unwrap();
        g.move_player(Direction::Right);
        let save = g.save_state();

        let mut other = MazeGame::with_seed(2);
        other.restore_state(save.clone()).unwrap();
        assert_eq!(other.player(), Some((0, 1)));
        assert_eq!(other.exit(), g.exit());
        assert_eq!(other.stats().moves_count, 1);
        assert_eq!(other.grid(), g.grid());
        assert_eq!(other.save_state().path, save.path);

        let mut bad = save;
        bad.player = Some((10, 10));
        assert_eq!(
            other.restore_state(bad),
            Err(GameError::InvalidPosition(10, 10))
        );
    }

    #[test]
    fn random_exit_replaces_existing_exits() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut grid = Grid::from_codes(&[vec![4, 0, 0], vec![0, -1, 0], vec![0, 0, 4]]).unwrap();
        for _ in 0..20 {
            let pos = place_random_exit(&mut grid, &mut rng).unwrap();
            assert_eq!(grid.count(CellType::Exit), 1);
            assert_eq!(grid.get(pos), CellType::Exit);
        }
        let mut walls = Grid::new(2, 2, CellType::Wall);
        assert_eq!(place_random_exit(&mut walls, &mut rng), None);
    }
}
