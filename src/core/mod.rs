//! Core types: actions, the state contract, and deterministic RNG.
//!
//! Everything game-specific lives behind `GameState`; the rest of the crate
//! is written against these few definitions only.

pub mod action;
pub mod rng;
pub mod state;

pub use action::{Action, Prob, Reward};
pub use rng::{GameRng, GameRngState};
pub use state::{GameState, MoveError};
