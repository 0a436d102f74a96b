//! Protocol vocabulary shared by the Tron server and its clients.
//!
//! Both sides agree on grid coordinates, the four facing directions and the
//! line-based text protocol defined in [`protocol`].

use std::fmt;

pub mod protocol;

pub use protocol::{
    encode_rejection, read_message, write_message, Handshake, Operation, ProtocolError,
    ServerUpdate, Snapshot,
};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BOARD_WIDTH: usize = 80;
pub const DEFAULT_BOARD_HEIGHT: usize = 80;
pub const MAX_PLAYERS: usize = 16;
/// Largest board side that still fits in [`protocol::MAX_COORD_DIGITS`] digits.
pub const MAX_BOARD_EXTENT: usize = 9999;
pub const MAX_MESSAGE_SIZE: usize = 1024;

/// Facing direction of a light cycle.
///
/// The numeric codes are the wire values and follow the enum order
/// `UP, RIGHT, DOWN, LEFT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up = 0,
    Right = 1,
    Down = 2,
    Left = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Right => Direction::Left,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
        }
    }

    /// A cycle may turn anywhere except straight back onto its own trail.
    pub fn can_turn_to(self, next: Direction) -> bool {
        next != self.opposite()
    }

    /// Axis delta of one step: `Up` is `y - 1`, `Right` is `x + 1`.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Up => "up",
            Direction::Right => "right",
            Direction::Down => "down",
            Direction::Left => "left",
        };
        f.write_str(name)
    }
}

/// Grid coordinates, `x` is the column and `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Moves one cell in `direction` on a torus of `width` x `height`.
    pub fn step(self, direction: Direction, width: usize, height: usize) -> Self {
        let (dx, dy) = direction.delta();
        Self {
            x: wrap_coord(self.x, dx, width),
            y: wrap_coord(self.y, dy, height),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

fn wrap_coord(coord: usize, delta: isize, extent: usize) -> usize {
    let extent = extent as isize;
    (coord as isize + delta).rem_euclid(extent) as usize
}

/// Per-player state carried in every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerState {
    pub position: Position,
    pub direction: Direction,
}

impl PlayerState {
    pub fn new(x: usize, y: usize, direction: Direction) -> Self {
        Self {
            position: Position::new(x, y),
            direction,
        }
    }
}
