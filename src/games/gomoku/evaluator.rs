//! Model-free evaluator for boards.

use crate::core::Action;
use crate::nn::{BatchEvaluator, EvalError, Evaluation, Evaluator};

use super::board::Board;

/// Uniform evaluator that assigns equal probability to every empty cell.
/// Value is always 0.0 (neutral). Useful for testing MCTS without a model.
///
/// Usable directly as an [`Evaluator`] or as a batch backend behind an
/// [`EvaluationQueue`](crate::nn::EvaluationQueue).
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformEvaluator;

impl UniformEvaluator {
    pub fn new() -> Self {
        Self
    }

    fn uniform(legal: &[Action]) -> Evaluation {
        if legal.is_empty() {
            return Evaluation::new(0.0, Vec::new());
        }
        let prob = 1.0 / legal.len() as f64;
        Evaluation::new(0.0, legal.iter().map(|&action| (action, prob)).collect())
    }
}

impl Evaluator<Board> for UniformEvaluator {
    fn evaluate(&self, state: &Board) -> Result<Evaluation, EvalError> {
        Ok(Self::uniform(&state.legal_actions()))
    }
}

impl BatchEvaluator<Board> for UniformEvaluator {
    type Input = Vec<Action>;
    type Output = Evaluation;

    fn prepare(state: &Board) -> Vec<Action> {
        state.legal_actions()
    }

    fn evaluate_batch(&mut self, inputs: Vec<Vec<Action>>) -> Result<Vec<Evaluation>, EvalError> {
        Ok(inputs.iter().map(|legal| Self::uniform(legal)).collect())
    }

    fn finish(output: Evaluation, _state: &Board) -> Evaluation {
        output
    }
}
