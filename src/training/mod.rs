//! Self-play data generation.
//!
//! This module provides the data structures and self-play loop for
//! generating training data in an AlphaZero-style training pipeline.
//!
//! ## Overview
//!
//! - **Trajectory**: Records a complete game with visit distributions and outcome
//! - **ExperienceBuffer**: Collects and samples from trajectories
//! - **SelfPlayWorker**: Runs games using MCTS to generate trajectories
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use selfplay_mcts::core::GameRng;
//! use selfplay_mcts::games::gomoku::{Board, UniformEvaluator};
//! use selfplay_mcts::mcts::MCTSConfig;
//! use selfplay_mcts::training::{ExperienceBuffer, SelfPlayConfig, SelfPlayWorker};
//!
//! let config = SelfPlayConfig::default().with_compute_budget(50);
//! let worker = SelfPlayWorker::new(config, MCTSConfig::default().with_threads(2));
//!
//! let mut rng = GameRng::new(7);
//! let trajectory = worker.play_game(Board::tictactoe(), Arc::new(UniformEvaluator), &mut rng)?;
//!
//! let mut buffer = ExperienceBuffer::new(1000);
//! buffer.push(trajectory);
//! let samples = buffer.sample_batch(4, &mut rng);
//! assert!(samples.len() <= 4);
//! # Ok::<(), selfplay_mcts::mcts::SearchError>(())
//! ```

pub mod self_play;
pub mod trajectory;

// Re-export main types
pub use self_play::{select_move, SelfPlayConfig, SelfPlayWorker};
pub use trajectory::{ExperienceBuffer, Step, Trajectory, TrainingSample};
