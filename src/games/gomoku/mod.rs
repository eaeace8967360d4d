//! k-in-a-row on a square board.
//!
//! The same rules cover tic-tac-toe (3x3, three in a row) and gomoku
//! (15x15, exactly five in a row):
//! - Black moves first and players alternate placing one stone
//! - A move completing a line of exactly `win_length` stones wins
//! - A full board with no winner is a draw

mod board;
mod evaluator;

pub use board::{Board, Status, Stone};
pub use evaluator::UniformEvaluator;
