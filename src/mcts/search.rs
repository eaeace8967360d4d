//! Concurrent MCTS search engine.
//!
//! A persistent pool of worker threads runs simulations against a shared
//! tree. Workers read-lock the tree for the duration of one simulation and
//! touch node statistics only through atomics; structural changes to the
//! root (`play`, `reset`, noise) take the write lock and require `&mut self`,
//! so they can never overlap a running `search`.

use std::io;
use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::{Action, GameRng, GameState, MoveError, Prob};
use crate::nn::{EvalError, Evaluation, Evaluator};

use super::config::MCTSConfig;
use super::node::Node;
use super::noise::dirichlet;
use super::stats::{SearchCounters, SearchStats};
use super::tree::{MCTSTree, TreeStats};

/// Errors surfaced by the search engine.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid search config: {0}")]
    InvalidConfig(String),

    #[error("invalid noise parameters: {0}")]
    InvalidNoise(String),

    #[error(transparent)]
    Move(#[from] MoveError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("failed to spawn search worker: {0}")]
    Spawn(#[from] io::Error),

    #[error("search workers exited before finishing")]
    WorkersGone,
}

/// Snapshot of one root child.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionInfo {
    pub action: Action,
    pub prior: Prob,
    pub visits: u32,
    pub q: f64,
    pub uct: f64,
}

enum Job {
    Simulate(Sender<Result<(), SearchError>>),
    Stop,
}

struct Shared<S, E> {
    tree: RwLock<MCTSTree<S>>,
    evaluator: Arc<E>,
    config: MCTSConfig,
    counters: SearchCounters,
}

impl<S: GameState, E: Evaluator<S>> Shared<S, E> {
    fn read_tree(&self) -> RwLockReadGuard<'_, MCTSTree<S>> {
        self.tree.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_tree(&self) -> RwLockWriteGuard<'_, MCTSTree<S>> {
        self.tree.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Expand the root from the evaluator unless it is terminal or already expanded.
    fn expand_root(&self) -> Result<(), SearchError> {
        let tree = self.read_tree();
        if tree.state().is_terminal() || !tree.root().is_leaf() {
            return Ok(());
        }
        let evaluation = self.evaluate(tree.state())?;
        if tree.root().expand(&evaluation.priors) {
            SearchCounters::bump(&self.counters.expansions);
        }
        Ok(())
    }

    fn evaluate(&self, state: &S) -> Result<Evaluation, EvalError> {
        SearchCounters::bump(&self.counters.evaluations);
        self.evaluator.evaluate(state).map_err(|err| {
            SearchCounters::bump(&self.counters.evaluation_failures);
            warn!(error = %err, "evaluator call failed");
            err
        })
    }

    /// Run one select / evaluate / backup pass.
    fn simulate(&self) -> Result<(), SearchError> {
        let tree = self.read_tree();
        let k = self.config.virtual_loss;
        let mut state = tree.state().clone();
        let mut path: Vec<&Node> = Vec::with_capacity(64);
        path.push(tree.root());

        let mut node = tree.root();
        while let Some((action, child)) = node.select(self.config.p_uct) {
            if let Err(err) = state.apply(action) {
                revert_path(&path, k);
                return Err(err.into());
            }
            child.apply_virtual_loss(k);
            path.push(child);
            node = child;
        }

        let mut reward = if state.is_terminal() {
            SearchCounters::bump(&self.counters.terminal_hits);
            state.terminal_reward()
        } else {
            match self.evaluate(&state) {
                Ok(evaluation) => {
                    if node.expand(&evaluation.priors) {
                        SearchCounters::bump(&self.counters.expansions);
                    }
                    evaluation.value
                }
                Err(err) => {
                    revert_path(&path, k);
                    return Err(err.into());
                }
            }
        };

        // Each node stores reward for the player who moved into it.
        for node in path[1..].iter().rev() {
            node.revert_virtual_loss(k);
            node.update(reward);
            reward = -reward;
        }
        path[0].update(reward);

        SearchCounters::bump(&self.counters.simulations);
        Ok(())
    }
}

/// Undo the virtual loss of every non-root node on `path`.
fn revert_path(path: &[&Node], k: u32) {
    for node in path.iter().skip(1) {
        node.revert_virtual_loss(k);
    }
}

fn run_worker<S: GameState, E: Evaluator<S>>(shared: Arc<Shared<S, E>>, jobs: Receiver<Job>) {
    while let Ok(Job::Simulate(done)) = jobs.recv() {
        let result = shared.simulate();
        // The searcher only drops its receiver after collecting every result.
        let _ = done.send(result);
    }
}

/// Multi-threaded MCTS engine over game state `S` and evaluator `E`.
pub struct MCTSSearch<S: GameState, E: Evaluator<S> + 'static> {
    shared: Arc<Shared<S, E>>,
    jobs: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl<S: GameState, E: Evaluator<S> + 'static> MCTSSearch<S, E> {
    /// Build an engine rooted at `state`, expand the root, and start the worker pool.
    pub fn new(state: S, evaluator: Arc<E>, config: MCTSConfig) -> Result<Self, SearchError> {
        config.validate()?;
        let threads = config.threads;
        let shared = Arc::new(Shared {
            tree: RwLock::new(MCTSTree::new(state)),
            evaluator,
            config,
            counters: SearchCounters::default(),
        });
        shared.expand_root()?;

        let (jobs, receiver) = crossbeam_channel::unbounded();
        let mut search = Self {
            shared,
            jobs,
            workers: Vec::with_capacity(threads),
        };
        for idx in 0..threads {
            let shared = Arc::clone(&search.shared);
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("mcts-worker-{idx}"))
                .spawn(move || run_worker(shared, receiver))?;
            search.workers.push(handle);
        }

        debug!(threads, "search engine started");
        Ok(search)
    }

    /// Run exactly `n` simulations across the worker pool and block until all finish.
    ///
    /// If any simulation fails, the remaining ones still run and the first
    /// error is returned.
    pub fn search(&mut self, n: u32) -> Result<(), SearchError> {
        if n == 0 {
            return Ok(());
        }
        let start = Instant::now();

        let (done, results) = crossbeam_channel::unbounded();
        for _ in 0..n {
            self.jobs
                .send(Job::Simulate(done.clone()))
                .map_err(|_| SearchError::WorkersGone)?;
        }
        drop(done);

        let mut first_error = None;
        for _ in 0..n {
            match results.recv() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    first_error.get_or_insert(err);
                }
                // Every sender is gone: a worker died holding a job.
                Err(_) => {
                    first_error.get_or_insert(SearchError::WorkersGone);
                    break;
                }
            }
        }

        let elapsed_us = start.elapsed().as_micros() as u64;
        self.shared
            .counters
            .time_us
            .fetch_add(elapsed_us, Ordering::Relaxed);
        debug!(
            simulations = n,
            elapsed_us,
            root_visits = self.root_visits(),
            "search complete"
        );

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Advance the game by `action`, keeping the matching subtree.
    pub fn play(&mut self, action: Action) -> Result<(), SearchError> {
        let reused = self.shared.write_tree().play(action)?;
        if !reused {
            warn!(action, "played action has no subtree, starting from a fresh root");
        }
        Ok(())
    }

    /// Throw away the tree and restart from `state` with an expanded root.
    pub fn reset(&mut self, state: S) -> Result<(), SearchError> {
        self.shared.write_tree().reset(state);
        self.shared.expand_root()
    }

    /// Blend Dirichlet noise into the root priors:
    /// `prior = (1 - eps) * prior + eps * noise`.
    pub fn apply_root_noise(
        &mut self,
        alpha: f64,
        eps: f64,
        rng: &mut GameRng,
    ) -> Result<(), SearchError> {
        self.shared.expand_root()?;

        let mut tree = self.shared.write_tree();
        let children = tree.root_mut().children_mut();
        let noise = dirichlet(alpha, children.len(), rng)?;
        for (child, eta) in children.iter_mut().zip(noise) {
            let prior = child.node.prior();
            child.node.set_prior((1.0 - eps) * prior + eps * eta);
        }
        Ok(())
    }

    /// Most visited root action.
    #[must_use]
    pub fn best_action(&self) -> Option<Action> {
        self.shared.read_tree().root().best_action()
    }

    /// Root action maximizing `score`.
    pub fn best_action_by<F>(&self, score: F) -> Option<Action>
    where
        F: Fn(&Node) -> f64,
    {
        self.shared.read_tree().root().best_action_by(score)
    }

    /// Per-child statistics of the root, in expansion order.
    #[must_use]
    pub fn action_infos(&self) -> Vec<ActionInfo> {
        let tree = self.shared.read_tree();
        let root = tree.root();
        let parent_visits = root.visit_count();
        root.children()
            .iter()
            .map(|child| ActionInfo {
                action: child.action,
                prior: child.node.prior(),
                visits: child.node.visit_count(),
                q: child.node.q(),
                uct: child.node.uct(parent_visits, self.shared.config.p_uct),
            })
            .collect()
    }

    /// Copy of the game state at the root.
    #[must_use]
    pub fn state(&self) -> S {
        self.shared.read_tree().state().clone()
    }

    #[must_use]
    pub fn root_visits(&self) -> u32 {
        self.shared.read_tree().root().visit_count()
    }

    /// Borrow the root node for inspection.
    pub fn with_root<R>(&self, f: impl FnOnce(&Node) -> R) -> R {
        f(self.shared.read_tree().root())
    }

    #[must_use]
    pub fn stats(&self) -> SearchStats {
        self.shared.counters.snapshot()
    }

    #[must_use]
    pub fn tree_stats(&self) -> TreeStats {
        self.shared.read_tree().stats()
    }

    pub fn config(&self) -> &MCTSConfig {
        &self.shared.config
    }

    pub fn evaluator(&self) -> &Arc<E> {
        &self.shared.evaluator
    }
}

impl<S: GameState, E: Evaluator<S> + 'static> Drop for MCTSSearch<S, E> {
    fn drop(&mut self) {
        for _ in 0..self.workers.len() {
            let _ = self.jobs.send(Job::Stop);
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("search worker panicked");
            }
        }
        debug!("search engine stopped");
    }
}

impl<S: GameState, E: Evaluator<S> + 'static> std::fmt::Debug for MCTSSearch<S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MCTSSearch")
            .field("config", &self.shared.config)
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}
