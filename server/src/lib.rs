//! # Tron Game Server Library
//!
//! This library provides the authoritative server for a multiplayer light
//! cycle game played over TCP. Players steer across a wrapping grid, leaving
//! an impassable trail behind them; the first player to move into a non-empty
//! cell crashes and ends the game for everyone.
//!
//! ## Core Responsibilities
//!
//! ### Lockstep Simulation
//! The game advances in discrete ticks. A tick only runs once every connected
//! player has submitted a direction, so the slowest client sets the pace and
//! no player ever moves on stale input. Every player receives the resulting
//! snapshot before it may submit its next move.
//!
//! ### Player Lifecycle
//! Each TCP connection is one player session:
//! - Handshake: the client sends the join operation and learns the player
//!   count and board size
//! - Waiting: the session parks until every expected player has joined
//! - Active: one direction in, one snapshot out, per tick
//! - Disconnected: the slot stops moving but its cells stay on the board
//!
//! ### Shutdown
//! The accept loop, the ticker and every player task share a cancellation
//! token. Ctrl+C or the end of the game stops all of them, and the server
//! waits for every player task before returning.
//!
//! ## Module Organization
//!
//! ### Board Module (`board`)
//! The occupancy grid: cell states, wrap-around movement, spawn points and the
//! offline board file format.
//!
//! ### Game Module (`game`)
//! Per-player slots and the pure simulation step that moves every connected
//! player one cell and detects crashes.
//!
//! ### Registry Module (`registry`)
//! The shared [`Game`](registry::Game): slot assignment, the readiness
//! barrier and the ticker that publishes a report per completed tick.
//!
//! ### Network Module (`network`)
//! The TCP acceptor and the per-connection state machine speaking the text
//! protocol from `tron_shared`.
//!
//! ### Config Module (`config`)
//! Validated startup settings and the construction of the board and game.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use tron_server::config::ServerConfig;
//! use tron_server::network::Server;
//! use tron_server::shutdown;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         players: 2,
//!         ..Default::default()
//!     };
//!     let game = config.build_game()?;
//!     let server = Server::bind(&config.bind_addr(), game).await?;
//!
//!     // Keep the trigger around to stop the server early
//!     let (_trigger, shutdown) = shutdown::channel();
//!     let end = server.run(shutdown).await?;
//!     println!("Game over: {}", end);
//!
//!     Ok(())
//! }
//! ```

pub mod board;
pub mod config;
pub mod game;
pub mod network;
pub mod registry;
pub mod shutdown;

pub use config::{ConfigError, ServerConfig};
pub use network::Server;
pub use registry::{Game, GameEnd};
