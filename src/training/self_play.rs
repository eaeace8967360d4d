//! Self-play loop for generating training data.
//!
//! Runs games using MCTS to generate trajectories for training
//! neural networks in an AlphaZero-style loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::core::{Action, GameRng, GameState};
use crate::mcts::{ActionInfo, MCTSConfig, MCTSSearch, SearchError};
use crate::nn::Evaluator;

use super::trajectory::{Step, Trajectory};

/// Configuration for self-play.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelfPlayConfig {
    /// Simulations per move.
    pub compute_budget: u32,

    /// Moves before this index are sampled in proportion to visit counts;
    /// later moves pick among the most visited children.
    pub sample_steps: u32,

    /// Moves before this index get Dirichlet noise at the root.
    pub noise_steps: u32,

    /// Dirichlet concentration.
    pub noise_alpha: f64,

    /// Weight of the noise in the blended prior.
    pub noise_eps: f64,

    /// Maximum moves per game (to prevent infinite games).
    pub max_moves: u32,
}

impl Default for SelfPlayConfig {
    fn default() -> Self {
        Self {
            compute_budget: 800,
            sample_steps: 15,
            noise_steps: 3,
            noise_alpha: 0.03,
            noise_eps: 0.25,
            max_moves: 500,
        }
    }
}

impl SelfPlayConfig {
    /// Create a new self-play config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set simulations per move.
    pub fn with_compute_budget(mut self, budget: u32) -> Self {
        self.compute_budget = budget;
        self
    }

    /// Set the number of visit-sampled opening moves.
    pub fn with_sample_steps(mut self, steps: u32) -> Self {
        self.sample_steps = steps;
        self
    }

    /// Set the number of opening moves that receive root noise.
    pub fn with_noise_steps(mut self, steps: u32) -> Self {
        self.noise_steps = steps;
        self
    }

    /// Set Dirichlet parameters.
    pub fn with_noise(mut self, alpha: f64, eps: f64) -> Self {
        self.noise_alpha = alpha;
        self.noise_eps = eps;
        self
    }

    /// Set maximum moves per game.
    pub fn with_max_moves(mut self, max: u32) -> Self {
        self.max_moves = max;
        self
    }
}

/// Pick the move to play from a root snapshot.
///
/// Before `sample_steps` the move is drawn with probability proportional to
/// its visit count; afterwards it is drawn uniformly among the most visited
/// children. Returns `None` when there are no children.
pub fn select_move(
    infos: &[ActionInfo],
    move_number: u32,
    sample_steps: u32,
    rng: &mut GameRng,
) -> Option<Action> {
    if move_number < sample_steps {
        let weights: Vec<f64> = infos.iter().map(|info| f64::from(info.visits)).collect();
        if let Some(idx) = rng.choose_weighted(&weights) {
            return Some(infos[idx].action);
        }
    }

    let most = infos.iter().map(|info| info.visits).max()?;
    let best: Vec<Action> = infos
        .iter()
        .filter(|info| info.visits == most)
        .map(|info| info.action)
        .collect();
    Some(best[rng.gen_range_usize(0..best.len())])
}

/// Worker for running self-play games.
#[derive(Clone, Debug, Default)]
pub struct SelfPlayWorker {
    config: SelfPlayConfig,
    mcts: MCTSConfig,
}

impl SelfPlayWorker {
    /// Create a new self-play worker.
    pub fn new(config: SelfPlayConfig, mcts: MCTSConfig) -> Self {
        Self { config, mcts }
    }

    /// Play one game from `initial` to the end (or `max_moves`).
    ///
    /// The tree is kept across moves, so each search starts from the
    /// statistics gathered for the played child.
    pub fn play_game<S, E>(
        &self,
        initial: S,
        evaluator: Arc<E>,
        rng: &mut GameRng,
    ) -> Result<Trajectory, SearchError>
    where
        S: GameState,
        E: Evaluator<S> + 'static,
    {
        let cfg = &self.config;
        let mut trajectory = Trajectory::new(rng.seed());
        let mut search = MCTSSearch::new(initial, evaluator, self.mcts.clone())?;
        let mut state = search.state();

        for move_number in 0..cfg.max_moves {
            if state.is_terminal() {
                break;
            }

            if move_number < cfg.noise_steps {
                search.apply_root_noise(cfg.noise_alpha, cfg.noise_eps, rng)?;
            }
            search.search(cfg.compute_budget)?;

            let infos = search.action_infos();
            let Some(action) = select_move(&infos, move_number, cfg.sample_steps, rng) else {
                break;
            };
            trace!(move_number, action, "self-play move");

            trajectory.push(Step::new(
                move_number,
                action,
                infos.iter().map(|info| (info.action, info.visits)).collect(),
                search.root_visits(),
            ));
            search.play(action)?;
            state.apply(action)?;
        }

        if state.is_terminal() {
            trajectory.set_outcome(state.terminal_reward());
        }
        debug!(
            moves = trajectory.len(),
            finished = trajectory.is_finished(),
            "self-play game complete"
        );
        Ok(trajectory)
    }

    /// Play `count` games on `threads` concurrent game threads.
    ///
    /// All games share `evaluator`, which lets a batching queue combine
    /// requests across games. Game `i` uses a generator seeded with
    /// `seed + i`; results are returned in game order.
    pub fn play_games<S, E>(
        &self,
        make_state: impl Fn() -> S + Sync,
        evaluator: Arc<E>,
        count: usize,
        threads: usize,
        seed: u64,
    ) -> Result<Vec<Trajectory>, SearchError>
    where
        S: GameState,
        E: Evaluator<S> + 'static,
    {
        let next_game = AtomicUsize::new(0);
        let results: Mutex<Vec<(usize, Result<Trajectory, SearchError>)>> =
            Mutex::new(Vec::with_capacity(count));

        thread::scope(|scope| {
            for _ in 0..threads.max(1) {
                scope.spawn(|| loop {
                    let idx = next_game.fetch_add(1, Ordering::Relaxed);
                    if idx >= count {
                        break;
                    }
                    let mut rng = GameRng::new(seed.wrapping_add(idx as u64));
                    let result = self.play_game(make_state(), Arc::clone(&evaluator), &mut rng);
                    results
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push((idx, result));
                });
            }
        });

        let mut results = results.into_inner().unwrap_or_else(PoisonError::into_inner);
        results.sort_by_key(|(idx, _)| *idx);
        results.into_iter().map(|(_, result)| result).collect()
    }

    /// Get the configuration.
    pub fn config(&self) -> &SelfPlayConfig {
        &self.config
    }

    pub fn mcts_config(&self) -> &MCTSConfig {
        &self.mcts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::gomoku::{Board, UniformEvaluator};

    fn info(action: Action, visits: u32) -> ActionInfo {
        ActionInfo {
            action,
            prior: 0.0,
            visits,
            q: 0.0,
            uct: 0.0,
        }
    }

    fn small_worker() -> SelfPlayWorker {
        SelfPlayWorker::new(
            SelfPlayConfig::default().with_compute_budget(30).with_noise(0.3, 0.25),
            MCTSConfig::default().with_threads(2),
        )
    }

    #[test]
    fn test_self_play_config_default() {
        let config = SelfPlayConfig::default();
        assert_eq!(config.compute_budget, 800);
        assert_eq!(config.sample_steps, 15);
        assert_eq!(config.noise_steps, 3);
        assert_eq!(config.noise_alpha, 0.03);
        assert_eq!(config.noise_eps, 0.25);
    }

    #[test]
    fn test_self_play_config_serialization() {
        let config = SelfPlayConfig::default().with_max_moves(9);
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: SelfPlayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_select_move_greedy_after_sampling_phase() {
        let infos = vec![info(0, 3), info(1, 10), info(2, 7)];
        let mut rng = GameRng::new(0);
        for _ in 0..20 {
            assert_eq!(select_move(&infos, 5, 5, &mut rng), Some(1));
        }
    }

    #[test]
    fn test_select_move_greedy_ties_are_uniform() {
        let infos = vec![info(0, 4), info(1, 4), info(2, 1)];
        let mut rng = GameRng::new(3);
        let mut seen = [false; 3];
        for _ in 0..100 {
            let action = select_move(&infos, 10, 0, &mut rng).unwrap();
            seen[action as usize] = true;
        }
        assert_eq!(seen, [true, true, false]);
    }

    #[test]
    fn test_select_move_samples_only_visited() {
        let infos = vec![info(0, 0), info(1, 5), info(2, 0), info(3, 5)];
        let mut rng = GameRng::new(11);
        for _ in 0..100 {
            let action = select_move(&infos, 0, 10, &mut rng).unwrap();
            assert!(action == 1 || action == 3);
        }
    }

    #[test]
    fn test_select_move_without_visits_falls_back() {
        let infos = vec![info(0, 0), info(1, 0)];
        assert!(select_move(&infos, 0, 10, &mut GameRng::new(1)).is_some());
        assert_eq!(select_move(&[], 0, 10, &mut GameRng::new(1)), None);
    }

    #[test]
    fn test_play_game() {
        let worker = small_worker();
        let mut rng = GameRng::new(42);
        let trajectory = worker
            .play_game(Board::tictactoe(), Arc::new(UniformEvaluator), &mut rng)
            .unwrap();

        assert!(trajectory.is_finished());
        assert!(trajectory.len() >= 5 && trajectory.len() <= 9);
        assert_eq!(trajectory.seed, 42);

        // Replaying the recorded moves reproduces a finished game.
        let mut board = Board::tictactoe();
        for (i, step) in trajectory.steps.iter().enumerate() {
            assert_eq!(step.move_number as usize, i);
            assert!(step.root_visits >= 30);
            assert!(step.visit_counts.iter().any(|&(a, n)| a == step.action && n > 0));
            board.apply(step.action).unwrap();
        }
        assert!(board.is_terminal());
        assert_eq!(trajectory.outcome, Some(board.terminal_reward()));
    }

    #[test]
    fn test_play_game_respects_max_moves() {
        let worker = SelfPlayWorker::new(
            SelfPlayConfig::default().with_compute_budget(10).with_max_moves(2),
            MCTSConfig::default().with_threads(1),
        );
        let trajectory = worker
            .play_game(Board::tictactoe(), Arc::new(UniformEvaluator), &mut GameRng::new(1))
            .unwrap();
        assert_eq!(trajectory.len(), 2);
        assert!(!trajectory.is_finished());
    }

    #[test]
    fn test_play_game_rejects_bad_noise() {
        let worker = SelfPlayWorker::new(
            SelfPlayConfig::default().with_compute_budget(5).with_noise(0.0, 0.25),
            MCTSConfig::default().with_threads(1),
        );
        let result = worker.play_game(Board::tictactoe(), Arc::new(UniformEvaluator), &mut GameRng::new(1));
        assert!(matches!(result, Err(SearchError::InvalidNoise(_))));
    }

    #[test]
    fn test_play_games() {
        let worker = small_worker();
        let trajectories = worker
            .play_games(Board::tictactoe, Arc::new(UniformEvaluator), 4, 2, 100)
            .unwrap();

        assert_eq!(trajectories.len(), 4);
        let seeds: Vec<u64> = trajectories.iter().map(|t| t.seed).collect();
        assert_eq!(seeds, vec![100, 101, 102, 103]);
        assert!(trajectories.iter().all(Trajectory::is_finished));
    }
}
