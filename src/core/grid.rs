use std::collections::VecDeque;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `(row, col)` coordinate into a [`Grid`].
pub type Position = (usize, usize);

/// Errors raised when a grid is built from external integer codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("grid has no rows or no columns")]
    Empty,
    #[error("row {row} has {found} cells, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("unknown cell code {code} at ({row}, {col})")]
    UnknownCode { row: usize, col: usize, code: i32 },
}

/// What occupies a grid cell.
///
/// The integer codes are the exchange format other tools read, so they must
/// never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "i32", into = "i32"))]
pub enum CellType {
    Unvisited,
    Wall,
    Room,
    Visited,
    Player,
    Exit,
}

impl CellType {
    pub const ALL: [CellType; 6] = [
        CellType::Unvisited,
        CellType::Wall,
        CellType::Room,
        CellType::Visited,
        CellType::Player,
        CellType::Exit,
    ];

    pub fn code(self) -> i32 {
        match self {
            CellType::Unvisited => -2,
            CellType::Wall => -1,
            CellType::Room => 0,
            CellType::Visited => 2,
            CellType::Player => 3,
            CellType::Exit => 4,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -2 => Some(CellType::Unvisited),
            -1 => Some(CellType::Wall),
            0 => Some(CellType::Room),
            2 => Some(CellType::Visited),
            3 => Some(CellType::Player),
            4 => Some(CellType::Exit),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CellType::Unvisited => "unvisited",
            CellType::Wall => "wall",
            CellType::Room => "room",
            CellType::Visited => "visited",
            CellType::Player => "player",
            CellType::Exit => "exit",
        }
    }

    /// Everything except WALL can be stood on.
    pub fn is_walkable(self) -> bool {
        !matches!(self, CellType::Wall)
    }

    pub fn symbol(self) -> char {
        match self {
            CellType::Unvisited => '?',
            CellType::Wall => '#',
            CellType::Room => '.',
            CellType::Visited => 'o',
            CellType::Player => 'P',
            CellType::Exit => 'E',
        }
    }
}

impl From<CellType> for i32 {
    fn from(cell: CellType) -> Self {
        cell.code()
    }
}

impl TryFrom<i32> for CellType {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        CellType::from_code(code).ok_or_else(|| format!("unknown cell code {code}"))
    }
}

/// One of the four grid moves.
///
/// Declaration order is the MDP action order (UP, RIGHT, DOWN, LEFT), so
/// `action_index` doubles as the policy code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    /// MDP action order; index == action code.
    pub const ACTIONS: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    /// Order of the weight vector used by the generator.
    pub const GENERATION_ORDER: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Right => (0, 1),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
        }
    }

    pub fn action_index(self) -> usize {
        match self {
            Direction::Up => 0,
            Direction::Right => 1,
            Direction::Down => 2,
            Direction::Left => 3,
        }
    }

    pub fn from_action_index(index: usize) -> Option<Self> {
        Self::ACTIONS.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Right => "RIGHT",
            Direction::Down => "DOWN",
            Direction::Left => "LEFT",
        }
    }

    /// Accepts direction names in any case and the `w/a/s/d` game keys.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "w" => Some(Direction::Up),
            "right" | "d" => Some(Direction::Right),
            "down" | "s" => Some(Direction::Down),
            "left" | "a" => Some(Direction::Left),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Right => Direction::Left,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
        }
    }

    pub fn arrow(self) -> char {
        match self {
            Direction::Up => '^',
            Direction::Right => '>',
            Direction::Down => 'v',
            Direction::Left => '<',
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn manhattan(a: Position, b: Position) -> usize {
    a.0.abs_diff(b.0) + a.1.abs_diff(b.1)
}

/// Rectangular row-major grid of cell types.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "Vec<Vec<i32>>", into = "Vec<Vec<i32>>")
)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<CellType>,
}

impl Grid {
    pub fn new(rows: usize, cols: usize, fill: CellType) -> Self {
        Self {
            rows,
            cols,
            cells: vec![fill; rows * cols],
        }
    }

    /// Builds a grid from the integer exchange format, rejecting ragged rows
    /// and unknown codes.
    pub fn from_codes<R: AsRef<[i32]>>(codes: &[R]) -> Result<Self, GridError> {
        let rows = codes.len();
        let cols = codes.first().map(|r| r.as_ref().len()).unwrap_or(0);
        if rows == 0 || cols == 0 {
            return Err(GridError::Empty);
        }

        let mut cells = Vec::with_capacity(rows * cols);
        for (row, line) in codes.iter().enumerate() {
            let line = line.as_ref();
            if line.len() != cols {
                return Err(GridError::Ragged {
                    row,
                    expected: cols,
                    found: line.len(),
                });
            }
            for (col, &code) in line.iter().enumerate() {
                let cell =
                    CellType::from_code(code).ok_or(GridError::UnknownCode { row, col, code })?;
                cells.push(cell);
            }
        }

        Ok(Self { rows, cols, cells })
    }

    pub fn to_codes(&self) -> Vec<Vec<i32>> {
        self.cells
            .chunks(self.cols.max(1))
            .take(self.rows)
            .map(|row| row.iter().map(|c| c.code()).collect())
            .collect()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    pub fn in_bounds(&self, row: isize, col: isize) -> bool {
        row >= 0 && col >= 0 && (row as usize) < self.rows && (col as usize) < self.cols
    }

    pub fn contains(&self, (row, col): Position) -> bool {
        row < self.rows && col < self.cols
    }

    #[inline]
    pub fn index(&self, (row, col): Position) -> usize {
        row * self.cols + col
    }

    #[inline]
    pub fn position(&self, index: usize) -> Position {
        (index / self.cols, index % self.cols)
    }

    /// Panics when `pos` is out of bounds.
    #[inline]
    pub fn get(&self, pos: Position) -> CellType {
        assert!(self.contains(pos), "position {pos:?} outside grid");
        self.cells[self.index(pos)]
    }

    pub fn cell(&self, pos: Position) -> Option<CellType> {
        if self.contains(pos) {
            Some(self.cells[self.index(pos)])
        } else {
            None
        }
    }

    /// Panics when `pos` is out of bounds.
    #[inline]
    pub fn set(&mut self, pos: Position, cell: CellType) {
        assert!(self.contains(pos), "position {pos:?} outside grid");
        let idx = self.index(pos);
        self.cells[idx] = cell;
    }

    pub fn is_walkable(&self, pos: Position) -> bool {
        self.cell(pos).is_some_and(CellType::is_walkable)
    }

    /// The in-bounds cell one step from `pos`, if any.
    pub fn step(&self, (row, col): Position, dir: Direction) -> Option<Position> {
        let (dr, dc) = dir.delta();
        let (r, c) = (row as isize + dr, col as isize + dc);
        if self.in_bounds(r, c) {
            Some((r as usize, c as usize))
        } else {
            None
        }
    }

    /// In-bounds 4-neighbours in generation order.
    pub fn neighbors(&self, pos: Position) -> impl Iterator<Item = Position> + '_ {
        Direction::GENERATION_ORDER
            .into_iter()
            .filter_map(move |d| self.step(pos, d))
    }

    pub fn neighbors_of_type(&self, pos: Position, cell: CellType) -> Vec<Position> {
        self.neighbors(pos).filter(|&p| self.get(p) == cell).collect()
    }

    pub fn cells(&self) -> &[CellType] {
        &self.cells
    }

    pub fn iter(&self) -> impl Iterator<Item = (Position, CellType)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, &c)| (self.position(i), c))
    }

    pub fn count(&self, cell: CellType) -> usize {
        self.cells.iter().filter(|&&c| c == cell).count()
    }

    /// Row-major positions holding `cell`.
    pub fn positions_of(&self, cell: CellType) -> Vec<Position> {
        self.iter()
            .filter(|&(_, c)| c == cell)
            .map(|(p, _)| p)
            .collect()
    }

    pub fn replace_all(&mut self, from: CellType, to: CellType) -> usize {
        let mut n = 0;
        for c in self.cells.iter_mut().filter(|c| **c == from) {
            *c = to;
            n += 1;
        }
        n
    }

    /// Number of maximal 4-connected regions of `cell`.
    pub fn regions(&self, cell: CellType) -> usize {
        let mut seen = vec![false; self.cells.len()];
        let mut queue = VecDeque::new();
        let mut regions = 0;

        for start in 0..self.cells.len() {
            if seen[start] || self.cells[start] != cell {
                continue;
            }
            regions += 1;
            seen[start] = true;
            queue.push_back(self.position(start));
            while let Some(pos) = queue.pop_front() {
                for next in self.neighbors(pos) {
                    let idx = self.index(next);
                    if !seen[idx] && self.cells[idx] == cell {
                        seen[idx] = true;
                        queue.push_back(next);
                    }
                }
            }
        }
        regions
    }
}

impl TryFrom<Vec<Vec<i32>>> for Grid {
    type Error = GridError;

    fn try_from(codes: Vec<Vec<i32>>) -> Result<Self, Self::Error> {
        Grid::from_codes(&codes)
    }
}

impl From<Grid> for Vec<Vec<i32>> {
    fn from(grid: Grid) -> Self {
        grid.to_codes()
    }
}

/// One character per cell, one line per row.
impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.cols.max(1)).take(self.rows) {
            for cell in row {
                write!(f, "{}", cell.symbol())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
