//! Trajectory and experience buffer for training data collection.
//!
//! A trajectory records a complete self-play game, capturing:
//! - The root visit distribution at each move (the "target" policy)
//! - Actions actually played
//! - Final game outcome for value targets

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::{Action, GameRng, Reward};

/// A single move in a trajectory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Move number in the game (0-indexed).
    pub move_number: u32,

    /// The action that was actually played.
    pub action: Action,

    /// Visit count of every root child after the search.
    pub visit_counts: Vec<(Action, u32)>,

    /// Root visit count after the search.
    pub root_visits: u32,
}

impl Step {
    /// Create a new step.
    pub fn new(move_number: u32, action: Action, visit_counts: Vec<(Action, u32)>, root_visits: u32) -> Self {
        Self {
            move_number,
            action,
            visit_counts,
            root_visits,
        }
    }

    /// Visit counts normalized to probabilities.
    ///
    /// Falls back to uniform when no child was visited.
    pub fn policy(&self) -> Vec<(Action, f64)> {
        let total: u64 = self.visit_counts.iter().map(|&(_, n)| u64::from(n)).sum();
        if total == 0 {
            let p = 1.0 / self.visit_counts.len().max(1) as f64;
            return self.visit_counts.iter().map(|&(a, _)| (a, p)).collect();
        }
        self.visit_counts
            .iter()
            .map(|&(a, n)| (a, f64::from(n) / total as f64))
            .collect()
    }

    /// Get the probability assigned to the played action.
    pub fn taken_action_prob(&self) -> f64 {
        self.policy()
            .into_iter()
            .find(|&(a, _)| a == self.action)
            .map_or(0.0, |(_, p)| p)
    }
}

/// A complete game trajectory from self-play.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    /// All moves in the game.
    pub steps: Vec<Step>,

    /// Terminal reward scored for the player who made the final move,
    /// or `None` if the game was cut off before it ended.
    pub outcome: Option<Reward>,

    /// Seed of the generator that drove noise and move sampling.
    pub seed: u64,
}

impl Trajectory {
    /// Create a new trajectory.
    pub fn new(seed: u64) -> Self {
        Self {
            steps: Vec::new(),
            outcome: None,
            seed,
        }
    }

    /// Add a step to the trajectory.
    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Set the final outcome.
    pub fn set_outcome(&mut self, outcome: Reward) {
        self.outcome = Some(outcome);
    }

    /// Get the number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if trajectory is empty.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether the game reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Outcome from the perspective of the player making step `idx`.
    ///
    /// Players alternate, so the sign flips with each step back from the
    /// final move. Unfinished games score 0.
    pub fn value_for_step(&self, idx: usize) -> Reward {
        let Some(outcome) = self.outcome else {
            return 0.0;
        };
        let plies_from_end = self.steps.len().saturating_sub(1).saturating_sub(idx);
        if plies_from_end % 2 == 0 {
            outcome
        } else {
            -outcome
        }
    }

    /// Convert to training samples.
    ///
    /// Each sample pairs the visit policy of a move with the game outcome
    /// from the mover's perspective.
    pub fn to_training_samples(&self) -> Vec<TrainingSample> {
        self.steps
            .iter()
            .enumerate()
            .map(|(idx, step)| TrainingSample {
                move_number: step.move_number,
                policy: step.policy(),
                value: self.value_for_step(idx),
            })
            .collect()
    }
}

/// A single training sample extracted from a trajectory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    /// Move number the sample was taken at.
    pub move_number: u32,

    /// Target policy (MCTS visit distribution).
    pub policy: Vec<(Action, f64)>,

    /// Target value (game outcome for the player to move).
    pub value: Reward,
}

/// Buffer for storing trajectories during training.
///
/// Uses a FIFO strategy: when full, oldest trajectories are removed.
#[derive(Clone, Debug)]
pub struct ExperienceBuffer {
    trajectories: VecDeque<Trajectory>,
    max_trajectories: usize,
}

impl ExperienceBuffer {
    /// Create a new experience buffer.
    pub fn new(max_trajectories: usize) -> Self {
        Self {
            trajectories: VecDeque::with_capacity(max_trajectories),
            max_trajectories,
        }
    }

    /// Add a trajectory to the buffer.
    ///
    /// If the buffer is full, the oldest trajectory is removed.
    pub fn push(&mut self, trajectory: Trajectory) {
        if self.max_trajectories == 0 {
            return;
        }
        if self.trajectories.len() >= self.max_trajectories {
            self.trajectories.pop_front();
        }
        self.trajectories.push_back(trajectory);
    }

    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_trajectories
    }

    pub fn clear(&mut self) {
        self.trajectories.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trajectory> {
        self.trajectories.iter()
    }

    /// Get the total number of steps across all trajectories.
    pub fn total_steps(&self) -> usize {
        self.trajectories.iter().map(Trajectory::len).sum()
    }

    /// Extract all training samples from the buffer.
    pub fn to_training_samples(&self) -> Vec<TrainingSample> {
        self.trajectories
            .iter()
            .flat_map(Trajectory::to_training_samples)
            .collect()
    }

    /// Sample a random batch of training samples without replacement.
    pub fn sample_batch(&self, batch_size: usize, rng: &mut GameRng) -> Vec<TrainingSample> {
        let mut samples = self.to_training_samples();
        let limit = batch_size.min(samples.len());

        // Partial Fisher-Yates over the first `limit` slots
        let n = samples.len();
        for i in 0..limit {
            let j = i + rng.gen_range_usize(0..n - i);
            samples.swap(i, j);
        }
        samples.truncate(limit);
        samples
    }
}

impl Default for ExperienceBuffer {
    fn default() -> Self {
        Self::new(10000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_step(move_number: u32) -> Step {
        Step::new(move_number, 0, vec![(0, 3), (1, 1)], 5)
    }

    fn finished(len: u32, outcome: Reward) -> Trajectory {
        let mut traj = Trajectory::new(42);
        for i in 0..len {
            traj.push(make_test_step(i));
        }
        traj.set_outcome(outcome);
        traj
    }

    #[test]
    fn test_step_policy() {
        let step = make_test_step(0);
        assert_eq!(step.policy(), vec![(0, 0.75), (1, 0.25)]);
        assert!((step.taken_action_prob() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_step_policy_without_visits_is_uniform() {
        let step = Step::new(0, 1, vec![(0, 0), (1, 0)], 0);
        assert_eq!(step.policy(), vec![(0, 0.5), (1, 0.5)]);
        assert!(Step::new(0, 1, Vec::new(), 0).policy().is_empty());
    }

    #[test]
    fn test_trajectory_creation() {
        let mut traj = Trajectory::new(42);
        assert!(traj.is_empty());
        assert!(!traj.is_finished());

        traj.push(make_test_step(0));
        traj.push(make_test_step(1));
        assert_eq!(traj.len(), 2);
    }

    #[test]
    fn test_value_alternates_back_from_final_move() {
        let traj = finished(3, 1.0);
        assert_eq!(traj.value_for_step(2), 1.0);
        assert_eq!(traj.value_for_step(1), -1.0);
        assert_eq!(traj.value_for_step(0), 1.0);
    }

    #[test]
    fn test_unfinished_trajectory_scores_zero() {
        let mut traj = Trajectory::new(1);
        traj.push(make_test_step(0));
        assert_eq!(traj.value_for_step(0), 0.0);
    }

    #[test]
    fn test_trajectory_to_training_samples() {
        let samples = finished(2, 1.0).to_training_samples();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].value, -1.0);
        assert_eq!(samples[1].value, 1.0);
        assert_eq!(samples[1].move_number, 1);
    }

    #[test]
    fn test_trajectory_serialization() {
        let traj = finished(2, 0.0);
        let json = serde_json::to_string(&traj).unwrap();
        let deserialized: Trajectory = serde_json::from_str(&json).unwrap();
        assert_eq!(traj, deserialized);
    }

    #[test]
    fn test_experience_buffer_capacity() {
        let mut buffer = ExperienceBuffer::new(3);
        for seed in 1..=4 {
            buffer.push(Trajectory::new(seed));
        }
        assert_eq!(buffer.len(), 3);

        let seeds: Vec<_> = buffer.iter().map(|t| t.seed).collect();
        assert_eq!(seeds, vec![2, 3, 4]);
    }

    #[test]
    fn test_experience_buffer_total_steps() {
        let mut buffer = ExperienceBuffer::new(10);
        buffer.push(finished(2, 1.0));
        buffer.push(finished(1, 0.0));
        assert_eq!(buffer.total_steps(), 3);
        assert_eq!(buffer.to_training_samples().len(), 3);
    }

    #[test]
    fn test_experience_buffer_sample_batch() {
        let mut buffer = ExperienceBuffer::new(10);
        buffer.push(finished(5, 1.0));

        let batch = buffer.sample_batch(3, &mut GameRng::new(9));
        assert_eq!(batch.len(), 3);
        let mut moves: Vec<_> = batch.iter().map(|s| s.move_number).collect();
        moves.sort_unstable();
        moves.dedup();
        assert_eq!(moves.len(), 3);

        let again = buffer.sample_batch(3, &mut GameRng::new(9));
        assert_eq!(batch, again);
        assert_eq!(buffer.sample_batch(50, &mut GameRng::new(1)).len(), 5);
        assert!(ExperienceBuffer::new(2).sample_batch(4, &mut GameRng::new(1)).is_empty());
    }
}
