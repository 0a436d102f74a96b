//! # Tron Client Library
//!
//! Headless client for the lockstep Tron server. It speaks the line-based
//! text protocol from `tron_shared` over a single TCP connection and leaves
//! rendering to the caller.
//!
//! ## Session Flow
//!
//! 1. [`Client::connect`] opens the connection, sends the join operation and
//!    reads the handshake with the player count and board size.
//! 2. Each tick the client sends one direction and receives one snapshot
//!    listing every player's position and direction in slot order.
//! 3. When a player crashes the server sends a last snapshot followed by a
//!    game over line, then closes the connection.
//!
//! The server only advances once every connected player has moved, so a
//! client that stops sending stalls the game for everyone until it
//! disconnects.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! The [`Client`] session and its [`ClientError`].
//!
//! ### Input Module (`input`)
//! [`Steering`](input::Steering), the bot policy choosing a direction per tick.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use tron_client::Client;
//! use tron_shared::{Direction, ServerUpdate};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("127.0.0.1:8080").await?;
//!     println!("Board is {}x{}", client.handshake().width, client.handshake().height);
//!
//!     loop {
//!         match client.step(Direction::Right).await? {
//!             ServerUpdate::Snapshot(snapshot) => println!("{:?}", snapshot.players),
//!             ServerUpdate::GameOver { crashed_player, .. } => {
//!                 println!("Player {} crashed", crashed_player);
//!                 break;
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod input;
pub mod network;

pub use network::{Client, ClientError};
