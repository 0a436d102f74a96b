//! Player registry and the readiness barrier that drives the ticks
//!
//! All shared game data (board, slots, counters) sits behind a single lock.
//! A tick may only run once every connected player has submitted a move:
//!
//! - [`Game::submit_move`] marks a player ready at most once per tick and
//!   wakes the ticker.
//! - [`Game::try_advance`] runs the simulation step when
//!   `ready >= connected`, then resets readiness and bumps the tick counter
//!   under the same lock.
//! - [`Game::wait_for_tick`] parks a player until the tick it contributed to
//!   has been published, so clients never get stale state.
//!
//! Invariant: `0 <= ready <= connected <= expected` after every operation.

use crate::board::{Board, Cell};
use crate::game::{
    simulate_tick, snapshot, start_direction, start_position, PlayerSlot, SlotStatus, TickOutcome,
};
use crate::shutdown::Shutdown;
use log::{debug, info, trace};
use rand::rngs::StdRng;
use std::fmt;
use tokio::sync::{watch, Mutex, Notify};
use tron_shared::{Direction, Handshake, Snapshot};

/// Published after every completed tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Number of completed ticks, including this one.
    pub tick: u64,
    pub snapshot: Snapshot,
    pub outcome: TickOutcome,
}

/// Why the game stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEnd {
    Crashed { player: usize, tick: u64 },
    AllDisconnected { tick: u64 },
    Interrupted,
}

impl fmt::Display for GameEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameEnd::Crashed { player, tick } => {
                write!(f, "player {} crashed on tick {}", player, tick)
            }
            GameEnd::AllDisconnected { tick } => {
                write!(f, "all players left after {} ticks", tick)
            }
            GameEnd::Interrupted => f.write_str("interrupted"),
        }
    }
}

/// Counter snapshot for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub expected: usize,
    pub connected: usize,
    pub ready: usize,
    pub tick: u64,
    pub started: bool,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick {}: {}/{} players connected, {} ready{}",
            self.tick,
            self.connected,
            self.expected,
            self.ready,
            if self.started { "" } else { " (waiting to start)" }
        )
    }
}

struct GameState {
    board: Board,
    slots: Vec<PlayerSlot>,
    connected: usize,
    ready: usize,
    tick: u64,
    end: Option<GameEnd>,
    rng: StdRng,
}

/// Shared game handed to the acceptor, the ticker and every player task.
pub struct Game {
    expected: usize,
    state: Mutex<GameState>,
    wake_ticker: Notify,
    started: watch::Sender<bool>,
    reports: watch::Sender<TickReport>,
}

impl Game {
    pub fn new(board: Board, expected_players: usize, rng: StdRng) -> Self {
        let (started, _) = watch::channel(false);
        let (reports, _) = watch::channel(TickReport {
            tick: 0,
            snapshot: Snapshot::default(),
            outcome: TickOutcome::Running,
        });

        Self {
            expected: expected_players,
            state: Mutex::new(GameState {
                board,
                slots: Vec::with_capacity(expected_players),
                connected: 0,
                ready: 0,
                tick: 0,
                end: None,
                rng,
            }),
            wake_ticker: Notify::new(),
            started,
            reports,
        }
    }

    pub fn expected_players(&self) -> usize {
        self.expected
    }

    /// Assigns the next free slot and places the player on the board.
    ///
    /// Returns the 1-based player number, or `None` when every slot is taken
    /// or the board has no empty cell left.
    pub async fn join(&self) -> Option<usize> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.slots.len() >= self.expected || state.end.is_some() {
            return None;
        }

        let player_number = state.slots.len() + 1;
        let position = start_position(&state.board, player_number, &mut state.rng)?;
        let direction = start_direction(&mut state.rng);
        state.board.set(position, Cell::Occupied);
        state
            .slots
            .push(PlayerSlot::new(player_number, position, direction));
        state.connected += 1;

        info!(
            "Player {} joined at {} facing {}",
            player_number, position, direction
        );
        Some(player_number)
    }

    /// Marks the game as started and publishes the initial positions.
    pub async fn start(&self) {
        {
            let state = self.state.lock().await;
            self.reports.send_replace(TickReport {
                tick: state.tick,
                snapshot: snapshot(&state.slots),
                outcome: TickOutcome::Running,
            });
        }
        self.started.send_replace(true);
        self.wake_ticker.notify_one();
        info!("All players have connected, starting game");
    }

    pub fn is_started(&self) -> bool {
        *self.started.borrow()
    }

    /// Resolves `true` once the game has started, `false` on shutdown.
    pub async fn wait_until_started(&self, shutdown: &mut Shutdown) -> bool {
        let mut started = self.started.subscribe();
        loop {
            if *started.borrow_and_update() {
                return true;
            }
            tokio::select! {
                biased;
                _ = shutdown.wait() => return false,
                changed = started.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    pub async fn handshake(&self) -> Handshake {
        let state = self.state.lock().await;
        Handshake {
            player_count: self.expected,
            width: state.board.width(),
            height: state.board.height(),
        }
    }

    /// Records `direction` for `player` and marks it ready for the current
    /// tick. Submitting twice within a tick only updates the direction.
    ///
    /// Returns the index of the tick the move belongs to, or `None` if the
    /// player is unknown, disconnected, or the game is over.
    pub async fn submit_move(&self, player: usize, direction: Direction) -> Option<u64> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.end.is_some() {
            return None;
        }

        let slot = state.slots.get_mut(player.checked_sub(1)?)?;
        if !slot.is_connected() {
            return None;
        }
        slot.direction = direction;
        if !slot.ready {
            slot.ready = true;
            state.ready += 1;
        }
        trace!(
            "Player {} ready with {} ({}/{})",
            player,
            direction,
            state.ready,
            state.connected
        );

        let tick = state.tick;
        drop(guard);
        self.wake_ticker.notify_one();
        Some(tick)
    }

    /// Waits for the first report after tick `submitted`.
    ///
    /// Returns `None` if shutdown fires before that tick completes.
    pub async fn wait_for_tick(
        &self,
        submitted: u64,
        shutdown: &mut Shutdown,
    ) -> Option<TickReport> {
        let mut reports = self.reports.subscribe();
        loop {
            {
                let report = reports.borrow_and_update();
                if report.tick > submitted {
                    return Some(report.clone());
                }
            }

            let interrupted = tokio::select! {
                biased;
                changed = reports.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                    false
                }
                _ = shutdown.wait() => true,
            };

            if interrupted {
                let report = reports.borrow();
                return (report.tick > submitted).then(|| report.clone());
            }
        }
    }

    /// Takes `player` out of the game. Its cells stay on the board.
    ///
    /// Idempotent: returns `false` if the player was already disconnected.
    pub async fn disconnect(&self, player: usize) -> bool {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let Some(slot) = player
            .checked_sub(1)
            .and_then(|index| state.slots.get_mut(index))
        else {
            return false;
        };
        if !slot.is_connected() {
            return false;
        }

        slot.status = SlotStatus::Disconnected;
        if slot.ready {
            slot.ready = false;
            state.ready -= 1;
        }
        state.connected -= 1;
        info!(
            "Player {} disconnected, {} still connected",
            player, state.connected
        );

        drop(guard);
        self.wake_ticker.notify_one();
        true
    }

    /// Runs one simulation step if every connected player is ready.
    ///
    /// Returns the terminal state once the game is over, `None` while it
    /// keeps running.
    pub async fn try_advance(&self) -> Option<GameEnd> {
        if !self.is_started() {
            return None;
        }

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if let Some(end) = state.end {
            return Some(end);
        }

        if state.connected == 0 {
            let end = GameEnd::AllDisconnected { tick: state.tick };
            state.end = Some(end);
            info!("Game finished, no players left");
            return Some(end);
        }
        if state.ready < state.connected {
            return None;
        }

        let outcome = simulate_tick(&mut state.board, &mut state.slots);
        for slot in state.slots.iter_mut() {
            slot.ready = false;
        }
        state.ready = 0;
        state.tick += 1;

        trace!("Board after tick {}:\n{}", state.tick, state.board);

        if let TickOutcome::Crashed { player, .. } = outcome {
            info!("Game has ended on tick {}", state.tick);
            state.end = Some(GameEnd::Crashed {
                player,
                tick: state.tick,
            });
        }

        self.reports.send_replace(TickReport {
            tick: state.tick,
            snapshot: snapshot(&state.slots),
            outcome,
        });
        debug!(
            "tick {}: {}/{} players connected",
            state.tick, state.connected, self.expected
        );

        state.end
    }

    /// Drives ticks until the game ends or shutdown fires.
    pub async fn run_ticker(&self, shutdown: &mut Shutdown) -> GameEnd {
        loop {
            if let Some(end) = self.try_advance().await {
                return end;
            }

            let interrupted = tokio::select! {
                biased;
                _ = shutdown.wait() => true,
                _ = self.wake_ticker.notified() => false,
            };

            if interrupted {
                return self.interrupt().await;
            }
        }
    }

    /// Moves the game into its terminal state unless it already ended.
    pub async fn interrupt(&self) -> GameEnd {
        let mut state = self.state.lock().await;
        *state.end.get_or_insert(GameEnd::Interrupted)
    }

    pub async fn status(&self) -> Status {
        let state = self.state.lock().await;
        Status {
            expected: self.expected,
            connected: state.connected,
            ready: state.ready,
            tick: state.tick,
            started: self.is_started(),
        }
    }

    pub async fn snapshot(&self) -> Snapshot {
        let state = self.state.lock().await;
        snapshot(&state.slots)
    }

    pub async fn slot(&self, player: usize) -> Option<PlayerSlot> {
        let state = self.state.lock().await;
        state.slots.get(player.checked_sub(1)?).cloned()
    }

    pub async fn board(&self) -> Board {
        self.state.lock().await.board.clone()
    }
}
