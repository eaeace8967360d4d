//! MCTS node with lock-free statistics.
//!
//! Each node exclusively owns its children through `Box`. There are no parent
//! pointers: a simulation records the path of borrowed nodes it walked, and
//! backup replays that path in reverse. Pruning takes `&mut` access to the
//! tree, so no reader can be walking into a subtree while it is destroyed.
//!
//! Statistics are touched only through atomics. Expansion is the one step
//! that mutates structure, and it is claimed exactly once with a
//! compare-and-swap before the children are published.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::OnceLock;

use smallvec::SmallVec;

use crate::core::{Action, Prob, Reward};

/// `f64` with atomic load and fetch-add, stored as bits in an `AtomicU64`.
#[derive(Debug, Default)]
pub struct AtomicF64 {
    bits: AtomicU64,
}

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    #[inline]
    pub fn load(&self, ordering: Ordering) -> f64 {
        f64::from_bits(self.bits.load(ordering))
    }

    /// Lock-free fetch-add using compare-and-swap. Returns the previous value.
    #[inline]
    pub fn fetch_add(&self, value: f64, ordering: Ordering) -> f64 {
        let mut current = self.bits.load(Ordering::Relaxed);
        loop {
            let new = (f64::from_bits(current) + value).to_bits();
            match self
                .bits
                .compare_exchange_weak(current, new, ordering, Ordering::Relaxed)
            {
                Ok(prev) => return f64::from_bits(prev),
                Err(actual) => current = actual,
            }
        }
    }
}

/// Expansion lifecycle of a node. `Expanding` is entered exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpandState {
    Leaf,
    Expanding,
    Expanded,
}

const LEAF: u8 = 0;
const EXPANDING: u8 = 1;
const EXPANDED: u8 = 2;

/// An owned edge from a node to one child.
#[derive(Debug)]
pub struct Child {
    /// Action leading to the child.
    pub action: Action,

    /// The child subtree.
    pub node: Box<Node>,
}

/// A node in the MCTS tree.
///
/// `visit_count` and `value_sum` include any virtual loss currently applied
/// by in-flight simulations. Virtual loss is kept in its own integer counter
/// so that applying and reverting it is exact.
#[derive(Debug)]
pub struct Node {
    prior: Prob,
    visits: AtomicU32,
    virtual_loss: AtomicU32,
    value_sum: AtomicF64,
    state: AtomicU8,
    children: OnceLock<SmallVec<[Child; 8]>>,
}

impl Node {
    /// Create an unexpanded node with the given prior.
    pub fn new(prior: Prob) -> Self {
        Self {
            prior,
            visits: AtomicU32::new(0),
            virtual_loss: AtomicU32::new(0),
            value_sum: AtomicF64::new(0.0),
            state: AtomicU8::new(LEAF),
            children: OnceLock::new(),
        }
    }

    /// Create a fresh root node.
    pub fn root() -> Self {
        Self::new(1.0)
    }

    /// Prior probability assigned at expansion (or blended root noise).
    #[inline]
    #[must_use]
    pub fn prior(&self) -> Prob {
        self.prior
    }

    /// Overwrite the prior. Requires exclusive access to the tree.
    pub fn set_prior(&mut self, prior: Prob) {
        self.prior = prior;
    }

    /// Visits including in-flight virtual loss.
    #[inline]
    #[must_use]
    pub fn visit_count(&self) -> u32 {
        self.visits.load(Ordering::Acquire) + self.virtual_loss.load(Ordering::Acquire)
    }

    /// Sum of backed-up rewards minus in-flight virtual loss.
    #[inline]
    #[must_use]
    pub fn value_sum(&self) -> f64 {
        self.value_sum.load(Ordering::Acquire) - f64::from(self.virtual_loss.load(Ordering::Acquire))
    }

    /// Mean value, 0 for an unvisited node.
    #[must_use]
    pub fn q(&self) -> f64 {
        q_of(self.visit_count(), self.value_sum())
    }

    /// UCT score of this node as a child of a parent with `parent_visits`.
    #[must_use]
    pub fn uct(&self, parent_visits: u32, p_uct: f64) -> f64 {
        let n = self.visit_count();
        let w = self.value_sum();
        let u = self.prior * p_uct * f64::from(parent_visits).sqrt() / (1.0 + f64::from(n));
        q_of(n, w) + u
    }

    /// Current expansion state.
    #[must_use]
    pub fn expand_state(&self) -> ExpandState {
        match self.state.load(Ordering::Acquire) {
            LEAF => ExpandState::Leaf,
            EXPANDING => ExpandState::Expanding,
            _ => ExpandState::Expanded,
        }
    }

    /// A node is a leaf until it has published at least one child.
    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children().is_empty()
    }

    /// Published children, in expansion order.
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[Child] {
        match self.children.get() {
            Some(children) => children.as_slice(),
            None => &[],
        }
    }

    /// Number of published children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    /// Child reached by `action`, if expanded.
    #[must_use]
    pub fn child(&self, action: Action) -> Option<&Node> {
        self.children()
            .iter()
            .find(|c| c.action == action)
            .map(|c| c.node.as_ref())
    }

    /// Mutable access to the children. Requires exclusive access to the tree.
    pub fn children_mut(&mut self) -> &mut [Child] {
        match self.children.get_mut() {
            Some(children) => children.as_mut_slice(),
            None => &mut [],
        }
    }

    /// Create one child per `(action, prior)` entry.
    ///
    /// Returns `true` for the single caller that won the expansion claim;
    /// every other call, concurrent or later, is a no-op returning `false`.
    pub fn expand(&self, priors: &[(Action, Prob)]) -> bool {
        if self
            .state
            .compare_exchange(LEAF, EXPANDING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let children: SmallVec<[Child; 8]> = priors
            .iter()
            .map(|&(action, prior)| Child {
                action,
                node: Box::new(Node::new(prior)),
            })
            .collect();
        // Only the claiming thread reaches this point, so the cell is still empty.
        let _ = self.children.set(children);
        self.state.store(EXPANDED, Ordering::Release);
        true
    }

    /// Child maximizing the UCT score; the first maximum wins ties.
    #[must_use]
    pub fn select(&self, p_uct: f64) -> Option<(Action, &Node)> {
        let parent_visits = self.visit_count();
        let mut best: Option<(Action, &Node, f64)> = None;

        for child in self.children() {
            let score = child.node.uct(parent_visits, p_uct);
            match best {
                Some((_, _, best_score)) if score <= best_score => {}
                _ => best = Some((child.action, child.node.as_ref(), score)),
            }
        }

        best.map(|(action, node, _)| (action, node))
    }

    /// Record one completed backup with `reward`.
    #[inline]
    pub fn update(&self, reward: Reward) {
        self.value_sum.fetch_add(reward, Ordering::AcqRel);
        self.visits.fetch_add(1, Ordering::AcqRel);
    }

    /// Make this node look `k` visits and `k` losses worse.
    #[inline]
    pub fn apply_virtual_loss(&self, k: u32) {
        self.virtual_loss.fetch_add(k, Ordering::AcqRel);
    }

    /// Undo a matching `apply_virtual_loss(k)`.
    #[inline]
    pub fn revert_virtual_loss(&self, k: u32) {
        self.virtual_loss.fetch_sub(k, Ordering::AcqRel);
    }

    /// Action of the most visited child.
    #[must_use]
    pub fn best_action(&self) -> Option<Action> {
        self.best_action_by(|node| f64::from(node.visit_count()))
    }

    /// Action of the child maximizing `score`; the first maximum wins ties.
    #[must_use]
    pub fn best_action_by<F>(&self, score: F) -> Option<Action>
    where
        F: Fn(&Node) -> f64,
    {
        let mut best: Option<(Action, f64)> = None;
        for child in self.children() {
            let s = score(child.node.as_ref());
            match best {
                Some((_, best_score)) if s <= best_score => {}
                _ => best = Some((child.action, s)),
            }
        }
        best.map(|(action, _)| action)
    }

    /// Remove the child for `action` and hand its subtree to the caller.
    ///
    /// Returns `None` if the action was never expanded.
    pub fn detach_action(&mut self, action: Action) -> Option<Box<Node>> {
        let children = self.children.get_mut()?;
        let idx = children.iter().position(|c| c.action == action)?;
        Some(children.remove(idx).node)
    }
}

#[inline]
fn q_of(n: u32, w: f64) -> f64 {
    if n > 0 {
        w / f64::from(n)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn expanded(priors: &[(Action, Prob)]) -> Node {
        let node = Node::root();
        assert!(node.expand(priors));
        node
    }

    #[test]
    fn test_atomic_f64() {
        let x = AtomicF64::new(1.5);
        assert_eq!(x.fetch_add(2.0, Ordering::AcqRel), 1.5);
        assert_eq!(x.fetch_add(-0.5, Ordering::AcqRel), 3.5);
        assert_eq!(x.load(Ordering::Acquire), 3.0);
    }

    #[test]
    fn test_atomic_f64_concurrent_adds() {
        let x = Arc::new(AtomicF64::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let x = Arc::clone(&x);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        x.fetch_add(1.0, Ordering::AcqRel);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(x.load(Ordering::Acquire), 8000.0);
    }

    #[test]
    fn test_new_node_is_leaf() {
        let node = Node::root();
        assert!(node.is_leaf());
        assert_eq!(node.expand_state(), ExpandState::Leaf);
        assert_eq!(node.visit_count(), 0);
        assert_eq!(node.q(), 0.0);
        assert_eq!(node.prior(), 1.0);
        assert!(node.select(5.0).is_none());
        assert!(node.best_action().is_none());
    }

    #[test]
    fn test_expand_creates_children_in_order() {
        let node = expanded(&[(4, 0.5), (1, 0.3), (7, 0.2)]);

        assert!(!node.is_leaf());
        assert_eq!(node.expand_state(), ExpandState::Expanded);
        let actions: Vec<_> = node.children().iter().map(|c| c.action).collect();
        assert_eq!(actions, vec![4, 1, 7]);
        assert_eq!(node.child(1).unwrap().prior(), 0.3);
        assert!(node.child(2).is_none());
    }

    #[test]
    fn test_second_expand_is_noop() {
        let node = expanded(&[(0, 1.0)]);
        assert!(!node.expand(&[(5, 0.5), (6, 0.5)]));
        assert_eq!(node.child_count(), 1);
        assert_eq!(node.children()[0].action, 0);
    }

    #[test]
    fn test_concurrent_expand_single_generation() {
        let node = Arc::new(Node::root());
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16u32)
            .map(|t| {
                let node = Arc::clone(&node);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    // Each thread offers a distinct distribution of a distinct size.
                    let priors: Vec<_> = (0..=t).map(|a| (a + 100 * t, 1.0)).collect();
                    barrier.wait();
                    node.expand(&priors)
                })
            })
            .collect();

        let winners: Vec<u32> = handles
            .into_iter()
            .enumerate()
            .filter_map(|(t, h)| h.join().unwrap().then_some(t as u32))
            .collect();

        assert_eq!(winners.len(), 1);
        let t = winners[0];
        let actions: Vec<_> = node.children().iter().map(|c| c.action).collect();
        let expected: Vec<_> = (0..=t).map(|a| a + 100 * t).collect();
        assert_eq!(actions, expected);
    }

    #[test]
    fn test_uct_formula() {
        let node = expanded(&[(0, 0.25)]);
        let child = node.child(0).unwrap();
        child.update(1.0);
        child.update(0.0);

        // Q = 0.5, U = 0.25 * 2.0 * sqrt(16) / (1 + 2)
        let expected = 0.5 + 0.25 * 2.0 * 4.0 / 3.0;
        assert!((child.uct(16, 2.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_select_prefers_prior_when_unvisited() {
        let node = expanded(&[(0, 0.2), (1, 0.7), (2, 0.1)]);
        node.update(0.0);
        let (action, _) = node.select(1.0).unwrap();
        assert_eq!(action, 1);
    }

    #[test]
    fn test_select_tie_breaks_to_first() {
        let node = expanded(&[(3, 0.5), (9, 0.5)]);
        node.update(0.0);
        let (action, _) = node.select(1.0).unwrap();
        assert_eq!(action, 3);

        // All-zero scores with a zero parent count still pick the first child.
        let fresh = expanded(&[(8, 0.1), (2, 0.9)]);
        assert_eq!(fresh.select(1.0).unwrap().0, 8);
    }

    #[test]
    fn test_select_follows_value() {
        let node = expanded(&[(0, 0.5), (1, 0.5)]);
        for _ in 0..10 {
            node.update(0.0);
        }
        node.child(0).unwrap().update(-1.0);
        node.child(1).unwrap().update(1.0);
        assert_eq!(node.select(0.1).unwrap().0, 1);
    }

    #[test]
    fn test_update_accumulates() {
        let node = Node::root();
        node.update(1.0);
        node.update(-0.5);
        node.update(0.25);
        assert_eq!(node.visit_count(), 3);
        assert!((node.value_sum() - 0.75).abs() < 1e-12);
        assert!((node.q() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_virtual_loss_visible_then_reverted() {
        let node = Node::root();
        node.update(0.5);

        node.apply_virtual_loss(3);
        assert_eq!(node.visit_count(), 4);
        assert_eq!(node.value_sum(), 0.5 - 3.0);

        node.revert_virtual_loss(3);
        assert_eq!(node.visit_count(), 1);
        assert_eq!(node.value_sum(), 0.5);
    }

    #[test]
    fn test_virtual_loss_discourages_selection() {
        let node = expanded(&[(0, 0.5), (1, 0.5)]);
        node.update(0.0);
        node.child(0).unwrap().apply_virtual_loss(3);
        assert_eq!(node.select(1.0).unwrap().0, 1);
    }

    #[test]
    fn test_best_action_by_visits_and_custom() {
        let node = expanded(&[(0, 0.9), (1, 0.1), (2, 0.0)]);
        node.child(1).unwrap().update(0.0);
        node.child(1).unwrap().update(0.0);
        node.child(2).unwrap().update(1.0);

        assert_eq!(node.best_action(), Some(1));
        assert_eq!(node.best_action_by(|n| n.prior()), Some(0));
        assert_eq!(node.best_action_by(|n| n.q()), Some(2));
    }

    #[test]
    fn test_detach_action() {
        let mut node = expanded(&[(0, 0.5), (1, 0.5)]);
        node.child(1).unwrap().update(0.75);

        let child = node.detach_action(1).unwrap();
        assert_eq!(child.visit_count(), 1);
        assert_eq!(child.value_sum(), 0.75);
        assert_eq!(node.child_count(), 1);

        assert!(node.detach_action(1).is_none());
        assert!(Node::root().detach_action(0).is_none());
    }

    #[test]
    fn test_set_prior_through_children_mut() {
        let mut node = expanded(&[(0, 0.3), (1, 0.7)]);
        for child in node.children_mut() {
            child.node.set_prior(0.5);
        }
        assert!(node.children().iter().all(|c| c.node.prior() == 0.5));
    }

    proptest! {
        #[test]
        fn prop_virtual_loss_cancels_exactly(
            rewards in proptest::collection::vec(-1.0f64..1.0, 0..20),
            k in 0u32..10,
        ) {
            let node = Node::root();
            for r in &rewards {
                node.update(*r);
            }
            let (n, w) = (node.visit_count(), node.value_sum());

            node.apply_virtual_loss(k);
            node.revert_virtual_loss(k);

            prop_assert_eq!(node.visit_count(), n);
            prop_assert_eq!(node.value_sum().to_bits(), w.to_bits());
        }

        #[test]
        fn prop_update_counts_every_backup(rewards in proptest::collection::vec(-1.0f64..1.0, 0..50)) {
            let node = Node::root();
            for r in &rewards {
                node.update(*r);
            }
            prop_assert_eq!(node.visit_count() as usize, rewards.len());
        }
    }
}
