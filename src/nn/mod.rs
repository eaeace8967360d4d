//! Evaluation layer between the search engine and the learned model.
//!
//! ## Overview
//!
//! - **Contract**: `Evaluator` maps a state to an `Evaluation`
//!   (value + prior over legal actions)
//! - **Backends**: `BatchEvaluator` scores prepared inputs in batches
//! - **Dispatch**: `EvaluationQueue` coalesces concurrent requests from many
//!   search threads into batched backend calls; `DirectEvaluator` calls a
//!   backend inline
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use selfplay_mcts::games::gomoku::{Board, UniformEvaluator};
//! use selfplay_mcts::mcts::{MCTSConfig, MCTSSearch};
//! use selfplay_mcts::nn::EvaluationQueue;
//!
//! // One consumer thread per model replica, all sharing one request queue
//! let queue = Arc::new(EvaluationQueue::<Board, _>::new(vec![UniformEvaluator; 2])?);
//!
//! // Hand the same queue to every search engine
//! let mut search = MCTSSearch::new(Board::tictactoe(), Arc::clone(&queue), MCTSConfig::default())?;
//! search.search(100)?;
//! assert!(queue.stats().batches > 0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod queue;
pub mod traits;

// Re-export main types
pub use queue::{EvaluationQueue, QueueError, QueueStats};
pub use traits::{BatchEvaluator, DirectEvaluator, EvalError, Evaluation, Evaluator};
