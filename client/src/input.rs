//! Direction input for the headless bot

use rand::seq::SliceRandom;
use rand::Rng;
use tron_shared::Direction;

pub const DEFAULT_TURN_PROBABILITY: f64 = 0.2;

/// Produces one direction per tick: keeps going straight and occasionally
/// turns left or right, never back onto its own trail.
pub struct Steering<R> {
    rng: R,
    current: Option<Direction>,
    turn_probability: f64,
}

impl<R: Rng> Steering<R> {
    pub fn new(rng: R) -> Self {
        Self::with_turn_probability(rng, DEFAULT_TURN_PROBABILITY)
    }

    pub fn with_turn_probability(rng: R, turn_probability: f64) -> Self {
        Self {
            rng,
            current: None,
            turn_probability: turn_probability.clamp(0.0, 1.0),
        }
    }

    pub fn current(&self) -> Option<Direction> {
        self.current
    }

    pub fn next_direction(&mut self) -> Direction {
        let next = match self.current {
            None => Direction::ALL[self.rng.gen_range(0..Direction::ALL.len())],
            Some(current) if self.rng.gen_bool(self.turn_probability) => {
                let turns: Vec<Direction> = Direction::ALL
                    .into_iter()
                    .filter(|d| *d != current && current.can_turn_to(*d))
                    .collect();
                turns.choose(&mut self.rng).copied().unwrap_or(current)
            }
            Some(current) => current,
        };

        self.current = Some(next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_never_reverses() {
        let mut steering = Steering::with_turn_probability(StdRng::seed_from_u64(9), 1.0);
        let mut previous = steering.next_direction();

        for _ in 0..500 {
            let next = steering.next_direction();
            assert_ne!(next, previous.opposite());
            // Probability 1 always turns
            assert_ne!(next, previous);
            previous = next;
        }
    }

    #[test]
    fn test_zero_probability_goes_straight() {
        let mut steering = Steering::with_turn_probability(StdRng::seed_from_u64(1), 0.0);
        let first = steering.next_direction();

        for _ in 0..50 {
            assert_eq!(steering.next_direction(), first);
        }
        assert_eq!(steering.current(), Some(first));
    }

    #[test]
    fn test_probability_is_clamped() {
        let mut steering = Steering::with_turn_probability(StdRng::seed_from_u64(2), 7.5);
        steering.next_direction();
        steering.next_direction();
    }
}
