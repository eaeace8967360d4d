//! Owned MCTS tree: the root node plus the game state it stands for.
//!
//! The tree is a strict ownership hierarchy of boxed nodes. Advancing the
//! game detaches the chosen child as the new root and drops every sibling
//! subtree along with the old root.

use crate::core::{Action, GameState, MoveError};

use super::node::Node;

/// Root node and matching game state.
#[derive(Debug)]
pub struct MCTSTree<S> {
    root: Box<Node>,
    state: S,
}

impl<S: GameState> MCTSTree<S> {
    /// Create a tree with a fresh, unexpanded root for `state`.
    pub fn new(state: S) -> Self {
        Self {
            root: Box::new(Node::root()),
            state,
        }
    }

    /// The root node.
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// The root node, mutably.
    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    /// Game state at the root.
    #[inline]
    #[must_use]
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Advance the game by `action` and re-root the tree on its child.
    ///
    /// The child's statistics are preserved. If `action` was never expanded
    /// the new root is a fresh, unexpanded node. Returns whether a subtree
    /// was reused. On an illegal move neither the state nor the tree change.
    pub fn play(&mut self, action: Action) -> Result<bool, MoveError> {
        self.state.apply(action)?;

        let (next, reused) = match self.root.detach_action(action) {
            Some(child) => (child, true),
            None => (Box::new(Node::root()), false),
        };
        // Dropping the old root destroys all sibling subtrees.
        self.root = next;
        Ok(reused)
    }

    /// Discard the whole tree and start fresh from `state`.
    pub fn reset(&mut self, state: S) {
        self.state = state;
        self.root = Box::new(Node::root());
    }

    /// Get statistics about the tree.
    #[must_use]
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        let mut stack: Vec<(&Node, u32)> = vec![(self.root.as_ref(), 0)];

        while let Some((node, depth)) = stack.pop() {
            stats.node_count += 1;
            stats.max_depth = stats.max_depth.max(depth);
            if !node.is_leaf() {
                stats.expanded_count += 1;
                stats.total_edges += node.child_count();
            }
            stack.extend(node.children().iter().map(|c| (c.node.as_ref(), depth + 1)));
        }

        stats
    }
}

/// Statistics about the MCTS tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Total number of nodes.
    pub node_count: usize,

    /// Maximum depth below the root.
    pub max_depth: u32,

    /// Nodes with published children.
    pub expanded_count: usize,

    /// Total number of parent-child edges.
    pub total_edges: usize,
}

impl TreeStats {
    /// Get the branching factor (average children per expanded node).
    #[must_use]
    pub fn branching_factor(&self) -> f64 {
        if self.expanded_count == 0 {
            0.0
        } else {
            self.total_edges as f64 / self.expanded_count as f64
        }
    }
}
