//! Game implementations.
//!
//! Concrete states used to drive the engine in tests, benches and self-play.

pub mod gomoku;
