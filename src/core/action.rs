//! Action, probability and reward scalars shared by the whole crate.
//!
//! Actions are opaque indices: the engine never interprets them beyond
//! equality, it only replays them on a `GameState` and hands them back
//! to the caller in move statistics.

/// An opaque move identifier understood by the concrete game.
pub type Action = u32;

/// Prior or sampling probability attached to an action.
pub type Prob = f64;

/// Scalar outcome estimate. Positive is good for the player who moved into
/// the position being scored.
pub type Reward = f64;
