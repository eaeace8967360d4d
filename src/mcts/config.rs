//! MCTS configuration parameters.

use serde::{Deserialize, Serialize};

use super::search::SearchError;

/// MCTS configuration parameters.
///
/// Immutable for the lifetime of an engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MCTSConfig {
    /// Number of persistent search worker threads.
    pub threads: usize,

    /// Visits (and unit losses) added to a node while a simulation is
    /// in flight through it. Higher values spread concurrent threads
    /// across more branches.
    pub virtual_loss: u32,

    /// Exploration weight in the UCT formula (default: 5.0).
    pub p_uct: f64,
}

impl Default for MCTSConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            virtual_loss: 3,
            p_uct: 5.0,
        }
    }
}

impl MCTSConfig {
    /// Create a new config with a custom thread count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Create a new config with a custom virtual loss.
    pub fn with_virtual_loss(mut self, virtual_loss: u32) -> Self {
        self.virtual_loss = virtual_loss;
        self
    }

    /// Create a new config with a custom exploration constant.
    pub fn with_p_uct(mut self, p_uct: f64) -> Self {
        self.p_uct = p_uct;
        self
    }

    /// Check the config can drive a search.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.threads == 0 {
            return Err(SearchError::InvalidConfig("threads must be at least 1".into()));
        }
        if !self.p_uct.is_finite() || self.p_uct < 0.0 {
            return Err(SearchError::InvalidConfig(format!(
                "p_uct must be finite and non-negative, got {}",
                self.p_uct
            )));
        }
        Ok(())
    }
}
