//! Occupancy grid the light cycles move on

use rand::seq::IteratorRandom;
use rand::Rng;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tron_shared::{Direction, Position, MAX_BOARD_EXTENT, MAX_PLAYERS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    /// Vacated by a player, impassable for the rest of the game.
    Trail,
    /// Current cell of a player.
    Occupied,
}

/// Single printable character for board dumps.
pub fn encode_cell(cell: Cell) -> char {
    match cell {
        Cell::Empty => ' ',
        Cell::Trail => 'X',
        Cell::Occupied => '1',
    }
}

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("failed to read board file: {0}")]
    Io(#[from] std::io::Error),
    #[error("board header must be `<width> <height>`")]
    MissingHeader,
    #[error("invalid board dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    #[error("invalid cell value {0:?}")]
    InvalidCell(String),
    #[error("board needs {expected} cells but found {found}")]
    CellCount { expected: usize, found: usize },
}

/// Row-major grid of [`Cell`]s plus optional per-player spawn points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
    spawn_points: BTreeMap<usize, Position>,
}

impl Board {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::Empty; width * height],
            spawn_points: BTreeMap::new(),
        }
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, BoardError> {
        fs::read_to_string(path)?.parse()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, pos: Position) -> Cell {
        self.cells[self.index(pos)]
    }

    pub fn set(&mut self, pos: Position, cell: Cell) {
        let index = self.index(pos);
        self.cells[index] = cell;
    }

    pub fn is_empty_at(&self, pos: Position) -> bool {
        self.get(pos) == Cell::Empty
    }

    /// Next cell in `direction`, re-entering at the opposite edge.
    pub fn wrap(&self, pos: Position, direction: Direction) -> Position {
        pos.step(direction, self.width, self.height)
    }

    pub fn spawn_point(&self, player_number: usize) -> Option<Position> {
        self.spawn_points.get(&player_number).copied()
    }

    pub fn set_spawn_point(&mut self, player_number: usize, pos: Position) {
        debug_assert!(pos.x < self.width && pos.y < self.height);
        self.spawn_points.insert(player_number, pos);
    }

    pub fn random_empty_cell<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Position> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| **cell == Cell::Empty)
            .map(|(index, _)| index)
            .choose(rng)
            .map(|index| Position::new(index % self.width, index / self.width))
    }

    pub fn count(&self, cell: Cell) -> usize {
        self.cells.iter().filter(|c| **c == cell).count()
    }

    fn index(&self, pos: Position) -> usize {
        assert!(
            pos.x < self.width && pos.y < self.height,
            "position {} outside {}x{} board",
            pos,
            self.width,
            self.height
        );
        pos.y * self.width + pos.x
    }
}

/// Parses the offline board format: a `W H` header followed by `W*H`
/// integers. `n` in `1..=MAX_PLAYERS` seeds player n's spawn point, any
/// other integer is an empty cell.
impl FromStr for Board {
    type Err = BoardError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut tokens = input.split_whitespace();
        let mut dimension = || -> Result<usize, BoardError> {
            tokens
                .next()
                .and_then(|t| t.parse().ok())
                .ok_or(BoardError::MissingHeader)
        };
        let width = dimension()?;
        let height = dimension()?;
        if width == 0 || height == 0 || width > MAX_BOARD_EXTENT || height > MAX_BOARD_EXTENT {
            return Err(BoardError::InvalidDimensions { width, height });
        }

        let mut board = Board::new(width, height);
        let mut found = 0;
        for token in tokens {
            if found == width * height {
                found += 1;
                break;
            }
            let value: i64 = token
                .parse()
                .map_err(|_| BoardError::InvalidCell(token.to_string()))?;
            if value >= 1 && value as usize <= MAX_PLAYERS {
                let pos = Position::new(found % width, found / width);
                board.spawn_points.entry(value as usize).or_insert(pos);
            }
            found += 1;
        }

        if found != width * height {
            return Err(BoardError::CellCount {
                expected: width * height,
                found,
            });
        }
        Ok(board)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.width) {
            for cell in row {
                write!(f, "{}|", encode_cell(*cell))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
