//! Per-player slots and the lockstep simulation step

use crate::board::{Board, Cell};
use log::{debug, info};
use rand::Rng;
use tron_shared::{Direction, PlayerState, Position, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Connected,
    Disconnected,
}

/// Fixed record for one player, kept for the whole game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSlot {
    /// 1-based and stable for the lifetime of the connection.
    pub player_number: usize,
    pub direction: Direction,
    pub status: SlotStatus,
    pub position: Position,
    /// Whether this player already submitted a move for the current tick.
    pub ready: bool,
}

impl PlayerSlot {
    pub fn new(player_number: usize, position: Position, direction: Direction) -> Self {
        Self {
            player_number,
            direction,
            status: SlotStatus::Connected,
            position,
            ready: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == SlotStatus::Connected
    }

    pub fn state(&self) -> PlayerState {
        PlayerState {
            position: self.position,
            direction: self.direction,
        }
    }
}

/// Result of advancing the board by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running,
    /// `player` moved into a non-empty cell at `position`. The game is over.
    Crashed { player: usize, position: Position },
}

/// Advances every connected player one cell, in slot order.
///
/// Each player marks its current cell as trail before moving, so a player
/// later in the order sees the cells vacated by earlier players as trail,
/// while an earlier player never sees where a later player is about to go.
/// The step stops at the first crash: the crashing player's position is
/// updated to the cell it hit and the players after it do not move.
pub fn simulate_tick(board: &mut Board, slots: &mut [PlayerSlot]) -> TickOutcome {
    for slot in slots.iter_mut().filter(|slot| slot.is_connected()) {
        board.set(slot.position, Cell::Trail);

        let next = board.wrap(slot.position, slot.direction);
        slot.position = next;

        if !board.is_empty_at(next) {
            info!(
                "Player {} crashed into {:?} at {}",
                slot.player_number,
                board.get(next),
                next
            );
            return TickOutcome::Crashed {
                player: slot.player_number,
                position: next,
            };
        }

        board.set(next, Cell::Occupied);
    }
    TickOutcome::Running
}

/// Picks the starting cell for `player_number`: its spawn point when the
/// board seeds one that is still free, otherwise a random empty cell.
pub fn start_position<R: Rng + ?Sized>(
    board: &Board,
    player_number: usize,
    rng: &mut R,
) -> Option<Position> {
    match board.spawn_point(player_number) {
        Some(pos) if board.is_empty_at(pos) => Some(pos),
        Some(pos) => {
            debug!(
                "Spawn point {} of player {} is taken, picking a random cell",
                pos, player_number
            );
            board.random_empty_cell(rng)
        }
        None => board.random_empty_cell(rng),
    }
}

/// Uniform over all four directions.
pub fn start_direction<R: Rng + ?Sized>(rng: &mut R) -> Direction {
    Direction::ALL[rng.gen_range(0..Direction::ALL.len())]
}

pub fn snapshot(slots: &[PlayerSlot]) -> Snapshot {
    Snapshot::new(slots.iter().map(PlayerSlot::state).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn place(board: &mut Board, number: usize, x: usize, y: usize, dir: Direction) -> PlayerSlot {
        let pos = Position::new(x, y);
        board.set(pos, Cell::Occupied);
        PlayerSlot::new(number, pos, dir)
    }

    #[test]
    fn test_single_step_marks_trail() {
        let mut board = Board::new(8, 10);
        let mut slots = vec![place(&mut board, 1, 2, 2, Direction::Right)];

        let outcome = simulate_tick(&mut board, &mut slots);

        assert_eq!(outcome, TickOutcome::Running);
        assert_eq!(slots[0].position, Position::new(3, 2));
        assert_eq!(board.get(Position::new(2, 2)), Cell::Trail);
        assert_eq!(board.get(Position::new(3, 2)), Cell::Occupied);
        assert_eq!(board.count(Cell::Occupied), 1);
    }

    #[test]
    fn test_up_wraps_to_bottom_row() {
        let mut board = Board::new(8, 10);
        let mut slots = vec![place(&mut board, 1, 5, 0, Direction::Up)];

        simulate_tick(&mut board, &mut slots);

        assert_eq!(slots[0].position, Position::new(5, 9));
    }

    #[test]
    fn test_left_wraps_to_last_column() {
        let mut board = Board::new(8, 10);
        let mut slots = vec![place(&mut board, 1, 0, 4, Direction::Left)];

        simulate_tick(&mut board, &mut slots);

        assert_eq!(slots[0].position, Position::new(7, 4));
    }

    #[test]
    fn test_trail_never_reverts() {
        let mut board = Board::new(8, 10);
        let mut slots = vec![place(&mut board, 1, 0, 0, Direction::Right)];

        for _ in 0..5 {
            assert_eq!(simulate_tick(&mut board, &mut slots), TickOutcome::Running);
        }

        for x in 0..5 {
            assert_eq!(board.get(Position::new(x, 0)), Cell::Trail);
        }
        assert_eq!(board.get(Position::new(5, 0)), Cell::Occupied);
        assert_eq!(board.count(Cell::Occupied), 1);
    }

    #[test]
    fn test_crossing_existing_trail_ends_game() {
        let mut board = Board::new(8, 10);
        // Player 2 lays a vertical trail down column 4
        let mut slots = vec![
            place(&mut board, 1, 1, 5, Direction::Right),
            place(&mut board, 2, 4, 4, Direction::Down),
        ];

        assert_eq!(simulate_tick(&mut board, &mut slots), TickOutcome::Running);
        assert_eq!(simulate_tick(&mut board, &mut slots), TickOutcome::Running);
        assert_eq!(board.get(Position::new(4, 5)), Cell::Trail);

        // Player 1 at (3, 5) now steps onto player 2's trail at (4, 5)
        let outcome = simulate_tick(&mut board, &mut slots);

        assert_eq!(
            outcome,
            TickOutcome::Crashed {
                player: 1,
                position: Position::new(4, 5)
            }
        );
        assert_eq!(slots[0].position, Position::new(4, 5));
        // Player 2 did not move in the tick that ended the game
        assert_eq!(slots[1].position, Position::new(4, 6));
    }

    #[test]
    fn test_head_on_hits_current_cell() {
        let mut board = Board::new(8, 10);
        let mut slots = vec![
            place(&mut board, 1, 2, 2, Direction::Right),
            place(&mut board, 2, 3, 2, Direction::Left),
        ];

        // Player 1 runs into player 2, who has not moved yet
        assert_eq!(
            simulate_tick(&mut board, &mut slots),
            TickOutcome::Crashed {
                player: 1,
                position: Position::new(3, 2)
            }
        );
    }

    #[test]
    fn test_later_player_sees_earlier_players_trail() {
        let mut board = Board::new(8, 10);
        // Player 2 heads into the cell player 1 vacates this tick
        let mut slots = vec![
            place(&mut board, 1, 2, 2, Direction::Right),
            place(&mut board, 2, 2, 1, Direction::Down),
        ];

        assert_eq!(
            simulate_tick(&mut board, &mut slots),
            TickOutcome::Crashed {
                player: 2,
                position: Position::new(2, 2)
            }
        );
    }

    #[test]
    fn test_earlier_player_claims_contested_cell() {
        let mut board = Board::new(8, 10);
        // Both head for (3, 2); player 1 moves first and gets it
        let mut slots = vec![
            place(&mut board, 1, 2, 2, Direction::Right),
            place(&mut board, 2, 4, 2, Direction::Left),
        ];

        let outcome = simulate_tick(&mut board, &mut slots);

        assert_eq!(
            outcome,
            TickOutcome::Crashed {
                player: 2,
                position: Position::new(3, 2)
            }
        );
        assert_eq!(slots[0].position, Position::new(3, 2));
        assert_eq!(board.get(Position::new(3, 2)), Cell::Occupied);
    }

    #[test]
    fn test_disconnected_player_stays_as_ghost_wall() {
        let mut board = Board::new(8, 10);
        let mut slots = vec![
            place(&mut board, 1, 1, 1, Direction::Right),
            place(&mut board, 2, 3, 1, Direction::Down),
        ];
        slots[1].status = SlotStatus::Disconnected;

        assert_eq!(simulate_tick(&mut board, &mut slots), TickOutcome::Running);
        assert_eq!(slots[1].position, Position::new(3, 1));
        assert_eq!(board.get(Position::new(3, 1)), Cell::Occupied);

        // Player 1 now at (2, 1) runs into the ghost
        assert_eq!(
            simulate_tick(&mut board, &mut slots),
            TickOutcome::Crashed {
                player: 1,
                position: Position::new(3, 1)
            }
        );
    }

    #[test]
    fn test_start_position_prefers_spawn_point() {
        let mut board = Board::new(8, 10);
        board.set_spawn_point(1, Position::new(0, 0));
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(
            start_position(&board, 1, &mut rng),
            Some(Position::new(0, 0))
        );

        board.set(Position::new(0, 0), Cell::Occupied);
        let fallback = start_position(&board, 1, &mut rng).unwrap();
        assert_ne!(fallback, Position::new(0, 0));
        assert!(board.is_empty_at(fallback));
    }

    #[test]
    fn test_start_direction_covers_all_directions() {
        let mut rng = StdRng::seed_from_u64(42);
        let seen: HashSet<Direction> = (0..200).map(|_| start_direction(&mut rng)).collect();
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_snapshot_in_slot_order() {
        let slots = vec![
            PlayerSlot::new(1, Position::new(1, 2), Direction::Up),
            PlayerSlot::new(2, Position::new(3, 4), Direction::Left),
        ];
        assert_eq!(snapshot(&slots).encode(), "1.2.0.3.4.3.");
    }
}
