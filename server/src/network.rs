//! Server network layer: TCP acceptor, per-player protocol handler and
//! shutdown coordination

use crate::game::TickOutcome;
use crate::registry::{Game, GameEnd};
use crate::shutdown::{self, Shutdown};
use log::{debug, error, info, trace, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tron_shared::{
    encode_rejection, read_message, write_message, Direction, Operation, ServerUpdate,
};

/// Main server accepting players and running the game to completion
pub struct Server {
    listener: TcpListener,
    game: Arc<Game>,
}

impl Server {
    pub async fn bind(addr: &str, game: Game) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            game: Arc::new(game),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn game(&self) -> Arc<Game> {
        Arc::clone(&self.game)
    }

    /// Accepts players until every slot is filled, runs the ticker until the
    /// game ends, then stops and awaits all connection tasks.
    ///
    /// The listener is closed as soon as the game starts, so late
    /// connections are refused by the OS.
    pub async fn run(self, mut shutdown: Shutdown) -> io::Result<GameEnd> {
        let Server { listener, game } = self;
        let (stop_players, player_shutdown) = shutdown::channel();
        let mut tasks = Vec::with_capacity(game.expected_players());

        let accepted = Self::accept_players(
            listener,
            &game,
            &mut shutdown,
            &player_shutdown,
            &mut tasks,
        )
        .await;

        let result = match accepted {
            Ok(true) => Ok(game.run_ticker(&mut shutdown).await),
            Ok(false) => Ok(game.interrupt().await),
            Err(e) => {
                error!("Failed to accept players: {}", e);
                game.interrupt().await;
                Err(e)
            }
        };

        stop_players.trigger();
        for handle in tasks {
            if let Err(e) = handle.await {
                error!("Connection task panicked: {}", e);
            }
        }

        if let Ok(end) = &result {
            info!("Game over: {}", end);
        }
        result
    }

    /// Returns `Ok(true)` once all players joined and the game started,
    /// `Ok(false)` if shutdown fired first.
    ///
    /// Every accepted stream first reads its join request on its own task.
    /// Only requests that pass come back here to take a slot, so a rejected
    /// connection never counts toward the expected players.
    async fn accept_players(
        listener: TcpListener,
        game: &Arc<Game>,
        shutdown: &mut Shutdown,
        player_shutdown: &Shutdown,
        tasks: &mut Vec<JoinHandle<()>>,
    ) -> io::Result<bool> {
        let expected = game.expected_players();
        let (join_tx, mut join_rx) = mpsc::unbounded_channel::<Connection>();
        let mut joined = 0;
        info!("{} / {} players", joined, expected);

        while joined < expected {
            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    info!("Shutdown while waiting for players");
                    return Ok(false);
                }
                Some(connection) = join_rx.recv() => {
                    let Some(player) = game.join().await else {
                        return Err(io::Error::new(
                            io::ErrorKind::Other,
                            format!("no free cell for player {}", joined + 1),
                        ));
                    };
                    joined += 1;
                    info!("Player {} joined from {}", player, connection.addr);
                    info!("{} / {} players", joined, expected);

                    let handler = PlayerConnection {
                        player,
                        connection,
                        game: Arc::clone(game),
                    };
                    tasks.push(tokio::spawn(handler.run()));
                }
                accepted = listener.accept() => {
                    let (stream, addr) = accepted?;
                    debug!("Connection from {}", addr);
                    let connection = Connection::new(stream, addr, player_shutdown.clone());
                    tasks.push(tokio::spawn(screen_join_request(connection, join_tx.clone())));
                }
            }
        }

        drop(listener);
        join_rx.close();
        while let Ok(mut late) = join_rx.try_recv() {
            let _ = late.reject("game is full").await;
        }

        game.start().await;
        Ok(true)
    }
}

/// Waits for a fresh connection's join request and hands valid ones to the
/// acceptor.
async fn screen_join_request(
    mut connection: Connection,
    joins: mpsc::UnboundedSender<Connection>,
) {
    match connection.read_join_request().await {
        Ok(true) => {
            if let Err(mpsc::error::SendError(mut connection)) = joins.send(connection) {
                let _ = connection.reject("game is full").await;
            }
        }
        Ok(false) => {}
        Err(e) => debug!("Connection error for {}: {}", connection.addr, e),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    /// Slot assigned, handshake reply not sent yet
    Handshake,
    /// Joined, waiting for the remaining players
    AwaitStart,
    /// Exchanging one direction for one snapshot per tick
    Active,
    Disconnected,
}

enum Received {
    Message(String),
    /// Peer closed the stream or the server is stopping
    Closed,
    /// Line too long or not valid UTF-8
    Malformed(String),
}

/// One accepted TCP stream, split into buffered halves.
struct Connection {
    addr: SocketAddr,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    shutdown: Shutdown,
}

impl Connection {
    fn new(stream: TcpStream, addr: SocketAddr, shutdown: Shutdown) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
        }
        let (reader, writer) = stream.into_split();

        Connection {
            addr,
            reader: BufReader::new(reader),
            writer,
            shutdown,
        }
    }

    /// Reads the first line and checks it is a join request. Anything else
    /// is answered with an error line.
    async fn read_join_request(&mut self) -> io::Result<bool> {
        let message = match self.receive().await? {
            Received::Message(message) => message,
            Received::Closed => return Ok(false),
            Received::Malformed(reason) => {
                self.reject(&reason).await?;
                return Ok(false);
            }
        };

        let reason = match Operation::decode(&message) {
            Ok(Operation::JOIN) => return Ok(true),
            Ok(other) => format!(
                "expected join operation {}, got {}",
                Operation::JOIN.encode(),
                other.encode()
            ),
            Err(e) => e.to_string(),
        };
        self.reject(&reason).await?;
        Ok(false)
    }

    async fn receive(&mut self) -> io::Result<Received> {
        let result = tokio::select! {
            biased;
            _ = self.shutdown.wait() => return Ok(Received::Closed),
            result = read_message(&mut self.reader) => result,
        };

        match result {
            Ok(Some(message)) => Ok(Received::Message(message)),
            Ok(None) => {
                info!("{} closed the connection", self.addr);
                Ok(Received::Closed)
            }
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                Ok(Received::Malformed(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn send(&mut self, message: &str) -> io::Result<()> {
        write_message(&mut self.writer, message).await
    }

    async fn close(&mut self) {
        let _ = self.writer.shutdown().await;
    }

    /// Sends an error line and closes the write side.
    async fn reject(&mut self, reason: &str) -> io::Result<()> {
        warn!("Rejecting {}: {}", self.addr, reason);
        self.send(&encode_rejection(reason)).await?;
        self.close().await;
        Ok(())
    }
}

/// Protocol handler for a connection that holds a player slot
struct PlayerConnection {
    player: usize,
    connection: Connection,
    game: Arc<Game>,
}

impl PlayerConnection {
    /// Drives the connection through its states, then releases the slot.
    async fn run(mut self) {
        let mut state = ConnectionState::Handshake;

        loop {
            let next = match state {
                ConnectionState::Handshake => self.handshake().await,
                ConnectionState::AwaitStart => self.await_start().await,
                ConnectionState::Active => self.play_tick().await,
                ConnectionState::Disconnected => break,
            };

            let next = next.unwrap_or_else(|e| {
                debug!("Connection error for player {}: {}", self.player, e);
                ConnectionState::Disconnected
            });
            if next != state {
                trace!("Player {}: {:?} -> {:?}", self.player, state, next);
            }
            state = next;
        }

        if self.game.disconnect(self.player).await {
            debug!("{}", self.game.status().await);
        }
    }

    async fn handshake(&mut self) -> io::Result<ConnectionState> {
        let reply = self.game.handshake().await.encode();
        self.connection.send(&reply).await?;
        debug!("Player {} handshake complete: {}", self.player, reply);
        Ok(ConnectionState::AwaitStart)
    }

    async fn await_start(&mut self) -> io::Result<ConnectionState> {
        debug!("Player {} is waiting for the game to start", self.player);
        if self.game.wait_until_started(&mut self.connection.shutdown).await {
            Ok(ConnectionState::Active)
        } else {
            Ok(ConnectionState::Disconnected)
        }
    }

    /// Reads one direction, contributes it to the barrier and sends back the
    /// resulting snapshot.
    async fn play_tick(&mut self) -> io::Result<ConnectionState> {
        let message = match self.connection.receive().await? {
            Received::Message(message) => message,
            Received::Closed => return Ok(ConnectionState::Disconnected),
            Received::Malformed(reason) => return self.reject(&reason).await,
        };

        let direction = match Direction::decode(&message) {
            Ok(direction) => direction,
            Err(e) => return self.reject(&e.to_string()).await,
        };

        let Some(submitted) = self.game.submit_move(self.player, direction).await else {
            return Ok(ConnectionState::Disconnected);
        };
        let Some(report) = self
            .game
            .wait_for_tick(submitted, &mut self.connection.shutdown)
            .await
        else {
            return Ok(ConnectionState::Disconnected);
        };

        let update = ServerUpdate::Snapshot(report.snapshot);
        self.connection.send(&update.encode()).await?;

        if let TickOutcome::Crashed { player, .. } = report.outcome {
            let game_over = ServerUpdate::GameOver {
                crashed_player: player,
                tick: report.tick,
            };
            self.connection.send(&game_over.encode()).await?;
            self.connection.close().await;
            return Ok(ConnectionState::Disconnected);
        }

        Ok(ConnectionState::Active)
    }

    async fn reject(&mut self, reason: &str) -> io::Result<ConnectionState> {
        debug!("Player {} sent an invalid message", self.player);
        self.connection.reject(reason).await?;
        Ok(ConnectionState::Disconnected)
    }
}
