//! Server settings and construction of the board and game from them

use crate::board::{Board, BoardError};
use crate::registry::Game;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use thiserror::Error;
use tron_shared::{
    DEFAULT_BOARD_HEIGHT, DEFAULT_BOARD_WIDTH, DEFAULT_PORT, MAX_BOARD_EXTENT, MAX_PLAYERS,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("player count must be between 1 and {max}, got {0}", max = MAX_PLAYERS)]
    PlayerCount(usize),
    #[error("board must be between 1x1 and {max}x{max}, got {width}x{height}", max = MAX_BOARD_EXTENT)]
    BoardSize { width: usize, height: usize },
    #[error("a {width}x{height} board cannot fit {players} players")]
    BoardTooSmall {
        width: usize,
        height: usize,
        players: usize,
    },
    #[error(transparent)]
    Board(#[from] BoardError),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of players the game waits for before starting.
    pub players: usize,
    pub board_width: usize,
    pub board_height: usize,
    /// Board file with spawn points, overrides the width and height.
    pub board_file: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            players: 2,
            board_width: DEFAULT_BOARD_WIDTH,
            board_height: DEFAULT_BOARD_HEIGHT,
            board_file: None,
            seed: None,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.players == 0 || self.players > MAX_PLAYERS {
            return Err(ConfigError::PlayerCount(self.players));
        }
        if self.board_file.is_none() {
            check_board_size(self.board_width, self.board_height, self.players)?;
        }
        Ok(())
    }

    pub fn load_board(&self) -> Result<Board, ConfigError> {
        let board = match &self.board_file {
            Some(path) => Board::load_from_file(path)?,
            None => Board::new(self.board_width, self.board_height),
        };
        check_board_size(board.width(), board.height(), self.players)?;
        Ok(board)
    }

    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    pub fn build_game(&self) -> Result<Game, ConfigError> {
        self.validate()?;
        let board = self.load_board()?;
        Ok(Game::new(board, self.players, self.rng()))
    }
}

fn check_board_size(width: usize, height: usize, players: usize) -> Result<(), ConfigError> {
    if width == 0 || height == 0 || width > MAX_BOARD_EXTENT || height > MAX_BOARD_EXTENT {
        return Err(ConfigError::BoardSize { width, height });
    }
    if width * height < players {
        return Err(ConfigError::BoardTooSmall {
            width,
            height,
            players,
        });
    }
    Ok(())
}
