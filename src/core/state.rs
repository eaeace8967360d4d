//! The state contract consumed by the search engine.
//!
//! The engine knows nothing about boards or rules. It copies states (via
//! `Clone`), replays actions on private copies during selection, and asks
//! whether a position is finished and what it is worth.

use thiserror::Error;

use super::action::{Action, Reward};

/// Errors raised when an action cannot be applied to a state.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("game already ended")]
    GameOver,

    #[error("action {0} is out of range")]
    OutOfRange(Action),

    #[error("action {0} is not empty")]
    Occupied(Action),

    #[error("action {0} is not legal")]
    Illegal(Action),
}

/// A copyable game position with legality-checked transitions.
///
/// ## Implementation Notes
///
/// - `clone` must produce an independent deep copy; every simulation owns one
/// - `apply` must be deterministic and must reject moves after the game ended
/// - `terminal_reward` is only meaningful when `is_terminal` returns true, and
///   is scored for the player who made the final move
pub trait GameState: Clone + Send + Sync + 'static {
    /// Apply an action in place.
    fn apply(&mut self, action: Action) -> Result<(), MoveError>;

    /// Check if the game is over.
    fn is_terminal(&self) -> bool;

    /// Outcome of a finished game (1 = the last mover won, 0 = draw).
    fn terminal_reward(&self) -> Reward;
}
