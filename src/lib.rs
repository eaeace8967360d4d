//! # selfplay-mcts
//!
//! A concurrent Monte Carlo Tree Search engine for AlphaZero-style self-play.
//!
//! ## Design Principles
//!
//! 1. **Game-Agnostic**: The engine only sees the `GameState` contract
//!    (copy, apply, terminal check, terminal reward).
//!
//! 2. **Evaluator-Agnostic**: Search calls an `Evaluator`; whether that is a
//!    model run inline or a batching `EvaluationQueue` shared by many
//!    searches is invisible to it.
//!
//! 3. **Reproducible**: Every source of randomness is a seeded `GameRng`
//!    passed in by the caller.
//!
//! ## Architecture
//!
//! - **Shared tree, lock-free statistics**: Search threads walk one tree
//!   under a read lock; visit counts, value sums and virtual loss are atomics,
//!   and expansion happens exactly once per node via compare-and-swap.
//!
//! - **Batched evaluation**: Requests from all search threads are drained in
//!   batches by one consumer thread per model replica.
//!
//! - **Tree reuse**: Playing a move re-roots the tree on the chosen child and
//!   keeps its statistics.
//!
//! ## Modules
//!
//! - `core`: Actions, the state contract, RNG
//! - `nn`: Evaluator contract, batch backends, evaluation queue
//! - `mcts`: Nodes, tree, concurrent search engine
//! - `games`: Board implementations (gomoku, tic-tac-toe)
//! - `training`: Self-play driver and trajectories

pub mod core;
pub mod games;
pub mod mcts;
pub mod nn;
pub mod training;

// Re-export commonly used types
pub use crate::core::{Action, GameRng, GameRngState, GameState, MoveError, Prob, Reward};

pub use crate::nn::{
    BatchEvaluator, DirectEvaluator, EvalError, Evaluation, EvaluationQueue, Evaluator,
    QueueError, QueueStats,
};

pub use crate::mcts::{
    ActionInfo, MCTSConfig, MCTSSearch, MCTSTree, Node, SearchError, SearchStats, TreeStats,
};

pub use crate::training::{ExperienceBuffer, SelfPlayConfig, SelfPlayWorker, Trajectory};
