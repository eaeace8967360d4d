//! Evaluator traits for value and prior prediction.
//!
//! These traits define the interface between the search engine and whatever
//! produces position estimates (typically a neural network run in batches).
//!
//! - `Evaluator`: the per-state contract the search engine calls
//! - `BatchEvaluator`: a backend that scores many prepared inputs at once
//! - `DirectEvaluator`: runs a backend inline, one state per call

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{Action, Prob, Reward};

/// Errors that can occur during evaluation.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum EvalError {
    #[error("evaluation backend failed: {0}")]
    Backend(String),

    #[error("backend returned {got} results for a batch of {expected}")]
    BatchSizeMismatch { expected: usize, got: usize },

    #[error("evaluation queue is shut down")]
    QueueClosed,
}

/// Result of evaluating a game state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Value estimate, scored like `GameState::terminal_reward`.
    pub value: Reward,

    /// Prior over exactly the legal actions of the evaluated state.
    pub priors: Vec<(Action, Prob)>,
}

impl Evaluation {
    /// Create a new evaluation.
    pub fn new(value: Reward, priors: Vec<(Action, Prob)>) -> Self {
        Self { value, priors }
    }

    /// Sum of all priors.
    #[must_use]
    pub fn prior_mass(&self) -> Prob {
        self.priors.iter().map(|(_, p)| p).sum()
    }
}

/// Maps a state to a value estimate and a move distribution.
///
/// Implemented by concrete models and by `EvaluationQueue`, so the search
/// engine never knows whether its requests are batched.
pub trait Evaluator<S>: Send + Sync {
    /// Evaluate a single state.
    fn evaluate(&self, state: &S) -> Result<Evaluation, EvalError>;
}

/// A backend that evaluates prepared inputs in batches.
///
/// Preparation and post-processing are associated functions so that they run
/// on the requesting search thread; only `evaluate_batch` needs the backend
/// instance, which is owned by exactly one consumer thread.
pub trait BatchEvaluator<S>: Send + 'static {
    /// Model input built from one state.
    type Input: Send + 'static;

    /// Raw model output for one input.
    type Output: Send + 'static;

    /// Convert a state into a model input.
    fn prepare(state: &S) -> Self::Input;

    /// Evaluate a batch. Must return exactly one output per input, in order.
    fn evaluate_batch(&mut self, inputs: Vec<Self::Input>) -> Result<Vec<Self::Output>, EvalError>;

    /// Turn a raw output back into an `Evaluation` for the state it came from.
    fn finish(output: Self::Output, state: &S) -> Evaluation;
}

/// Runs a batch backend inline, one state per call.
///
/// Calls from concurrent search threads serialize on the backend.
#[derive(Debug)]
pub struct DirectEvaluator<B> {
    backend: Mutex<B>,
}

impl<B> DirectEvaluator<B> {
    /// Wrap a backend.
    pub fn new(backend: B) -> Self {
        Self {
            backend: Mutex::new(backend),
        }
    }

    /// Unwrap the backend.
    pub fn into_inner(self) -> B {
        self.backend.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S, B: BatchEvaluator<S>> Evaluator<S> for DirectEvaluator<B> {
    fn evaluate(&self, state: &S) -> Result<Evaluation, EvalError> {
        let input = B::prepare(state);
        let mut outputs = {
            let mut backend = self.backend.lock().unwrap_or_else(PoisonError::into_inner);
            backend.evaluate_batch(vec![input])?
        };
        if outputs.len() != 1 {
            return Err(EvalError::BatchSizeMismatch {
                expected: 1,
                got: outputs.len(),
            });
        }
        match outputs.pop() {
            Some(output) => Ok(B::finish(output, state)),
            None => Err(EvalError::BatchSizeMismatch { expected: 1, got: 0 }),
        }
    }
}
