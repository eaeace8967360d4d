//! Concurrent Monte Carlo Tree Search.
//!
//! ## Overview
//!
//! - **Node**: lock-free visit/value statistics, virtual loss, and
//!   exactly-once expansion shared by all search threads
//! - **Tree**: owns the root and the root game state; advancing the game
//!   re-roots the tree on the played child and keeps its statistics
//! - **Search**: a persistent worker pool running select / evaluate /
//!   negamax backup simulations against an [`Evaluator`](crate::nn::Evaluator)
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use selfplay_mcts::games::gomoku::{Board, UniformEvaluator};
//! use selfplay_mcts::mcts::{MCTSConfig, MCTSSearch};
//!
//! let config = MCTSConfig::default().with_threads(2);
//! let mut search = MCTSSearch::new(Board::tictactoe(), Arc::new(UniformEvaluator), config)?;
//!
//! search.search(200)?;
//! for info in search.action_infos() {
//!     println!("{}: {} visits, q = {:.3}", info.action, info.visits, info.q);
//! }
//!
//! let action = search.best_action().expect("root has children");
//! search.play(action)?;
//! # Ok::<(), selfplay_mcts::mcts::SearchError>(())
//! ```

pub mod config;
pub mod node;
pub mod noise;
pub mod search;
pub mod stats;
pub mod tree;

// Re-export main types
pub use config::MCTSConfig;
pub use node::{AtomicF64, Child, ExpandState, Node};
pub use noise::dirichlet;
pub use search::{ActionInfo, MCTSSearch, SearchError};
pub use stats::SearchStats;
pub use tree::{MCTSTree, TreeStats};
