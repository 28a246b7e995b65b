//! The selection / expansion / backpropagation protocol (spec §4.4, §4.5).
//!
//! Unlike the teacher's single-threaded `zero_step_gather`/`zero_step_apply`
//! (which take `&mut Tree` because only one thread ever touches the tree),
//! these operate through a shared `&Tree` — every worker thread calls
//! `zero_step_gather` concurrently, coordinating through the atomics and
//! per-node wait-points on [`crate::zero::node::Node`] rather than a single
//! exclusive borrow.

use std::sync::atomic::Ordering;

use zero_util::sequence::choose_max_by_key;

use crate::board::{Move, Position, Terminal};
use crate::mapping::plane;
use crate::mapping::policy as policy_map;
use crate::params::SearchParams;
use crate::ttable::{CachedEval, TranspositionCache};

use super::arena::Arena;
use super::node::{Node, NodeId};
use super::tree::Tree;

/// A leaf that needs an external network call: no transposition-cache hit,
/// not terminal, not already claimed by another worker. `tensor` is already
/// the encoded board (spec §4.1) — everything downstream of
/// `zero_step_gather` speaks tensors and raw policy logits, never a bare
/// `Position`, until `zero_step_apply` decodes the result.
#[derive(Debug)]
pub struct PendingEvaluation {
    pub node: NodeId,
    pub tensor: Vec<f32>,
}

/// Collects the ancestor chain feeding the plane encoder's history window
/// (spec §4.1): positions still inside the current arena (walked via each
/// node's `parent` link, oldest first) prepended by the positions from
/// every root advancement before that ([`Tree::traversed_history`], already
/// oldest first).
fn ancestor_history(arena: &Arena, node_id: NodeId, tree: &Tree) -> Vec<Position> {
    let mut in_arena = Vec::new();
    let mut current = arena.get(node_id).parent;
    while let Some(id) = current {
        let node = arena.get(id);
        in_arena.push(node.state.clone());
        current = node.parent;
    }
    in_arena.reverse();

    let mut history = tree.traversed_history();
    history.extend(in_arena);
    history
}

/// Walks from the root to a leaf, applying virtual loss along the way.
/// Returns `Some` when the walk ends at a node that needs an evaluator
/// call; returns `None` when the walk resolved on its own — either a
/// terminal position (backpropagated immediately) or a transposition-cache
/// hit (expanded and backpropagated immediately, no network round trip).
pub fn zero_step_gather(
    tree: &Tree,
    ttable: &TranspositionCache,
    params: &SearchParams,
) -> Option<PendingEvaluation> {
    let arena = tree.current_arena();
    let mut current = tree.root_id();

    loop {
        let node = arena.get(current);

        match node.state.terminal() {
            Terminal::Draw => {
                backpropagate(&arena, current, 0.0);
                return None;
            }
            Terminal::LossForSideToMove => {
                backpropagate(&arena, current, -1.0);
                return None;
            }
            Terminal::Ongoing => {}
        }

        if node.is_expanded() {
            let children = node.children().expect("just checked is_expanded");
            let parent_visits = node.visits().max(1);
            let selected = choose_max_by_key(children, |&id| {
                arena.get(id).puct_score(parent_visits, params)
            })
            .expect("an expanded non-terminal node always has at least one child");

            arena.get(selected).virtual_loss.store(true, Ordering::Relaxed);
            current = selected;
            continue;
        }

        // Not expanded: try to become the worker responsible for submitting
        // this node for evaluation.
        if node
            .in_evaluation
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            if let Some(cached) = ttable.get(node.state.hash()) {
                apply_evaluation(&arena, current, &cached.priors, cached.value, params);
                node.in_evaluation.store(false, Ordering::Release);
                node.eval_complete.signal_ready();
                return None;
            }
            let history = ancestor_history(&arena, current, tree);
            let tensor = plane::encode(&node.state, &history, params.history_window);
            return Some(PendingEvaluation { node: current, tensor });
        }

        // Another worker already owns this node's expansion; wait for it to
        // finish, then retry the same node (it will now be expanded).
        node.eval_complete.wait_until_ready();
    }
}

/// Completes expansion for a node the caller just evaluated externally
/// (i.e. `zero_step_gather` returned `Some(PendingEvaluation)` for it).
/// `policy` is the backend's raw logits over the dense `[73·8·8]` encoding
/// (spec §4.2, §4.9); this is where they get decoded into per-move priors
/// via [`policy_map::policy_to_move_map`], before anything touches the tree.
/// Also responsible for populating the transposition cache, so later
/// descents that reach the same hash skip the network entirely.
pub fn zero_step_apply(
    tree: &Tree,
    ttable: &TranspositionCache,
    params: &SearchParams,
    node_id: NodeId,
    policy: Vec<f32>,
    value: f32,
) {
    let arena = tree.current_arena();
    let node = arena.get(node_id);
    let priors = policy_map::policy_to_move_map(&policy, &node.state);

    ttable.insert(node.state.hash(), CachedEval { priors: priors.clone(), value });
    apply_evaluation(&arena, node_id, &priors, value, params);

    node.in_evaluation.store(false, Ordering::Release);
    node.eval_complete.signal_ready();
}

/// Populates `children` (guarded by the node's one-time-write lock) and
/// backpropagates `value` from the leaf up to the root. Shared by the
/// cache-hit path (inline, no network call) and the external-evaluation
/// path (spec §4.4).
fn apply_evaluation(arena: &Arena, node_id: NodeId, priors: &[(Move, f32)], value: f32, _params: &SearchParams) {
    let node = arena.get(node_id);

    if !node.is_expanded() {
        let parent_depth = node.depth;
        let parent_moves_since_progress = node.moves_since_progress;
        let legal_moves = node.state.legal_moves();
        let parent_state = node.state.clone();

        let mut children = Vec::with_capacity(legal_moves.len());
        for mv in legal_moves {
            let prior = priors.iter().find(|(m, _)| *m == mv).map(|(_, p)| *p).unwrap_or(0.0);
            let moves_since_progress = if mv.is_capture() || mv.is_pawn_move() {
                0
            } else {
                parent_moves_since_progress.saturating_add(1)
            };
            let mut child_state = parent_state.clone();
            child_state.make_move(mv);
            children.push(arena.push(Node::new_child(
                node_id,
                parent_depth,
                child_state,
                mv,
                prior,
                moves_since_progress,
            )));
        }

        // Lost the race to another worker? Shouldn't happen: `in_evaluation`
        // already serializes this, but `try_set_children` still protects the
        // invariant that `children` is written exactly once.
        node.try_set_children(children);
    }

    backpropagate(arena, node_id, value);
}

/// Propagates `leaf_value` (from the leaf's own side-to-move perspective)
/// up to the root, negating exactly once per parent hop (spec §9, "value
/// sign convention") and clearing virtual loss along the way.
fn backpropagate(arena: &Arena, node_id: NodeId, leaf_value: f32) {
    let mut current = Some(node_id);
    let mut value = leaf_value;

    while let Some(id) = current {
        let node = arena.get(id);
        node.visits.fetch_add(1, Ordering::Relaxed);
        node.value_sum.fetch_add(value as f64, Ordering::Relaxed);
        node.virtual_loss.store(false, Ordering::Relaxed);

        current = node.parent;
        value = -value;
    }
}

/// Mixes Dirichlet noise into the root's already-populated children's
/// priors (spec §4.8), for training-mode root expansion.
pub fn apply_root_dirichlet_noise(arena: &Arena, root_id: NodeId, params: &SearchParams, rng: &mut impl rand::Rng) {
    use rand_distr::{Dirichlet, Distribution};

    let children = match arena.get(root_id).children() {
        Some(c) if !c.is_empty() => c,
        _ => return,
    };

    let alpha = vec![params.root_dirichlet_alpha as f64; children.len()];
    let dirichlet = Dirichlet::new(&alpha).expect("alpha must be positive");
    let noise = dirichlet.sample(rng);

    for (&child_id, d) in children.iter().zip(noise.iter()) {
        let child = arena.get(child_id);
        // Only ever called before the root is exposed to any worker thread
        // (root expansion runs before the pool starts), so the read-modify-
        // write here races with nobody.
        let mixed =
            (1.0 - params.root_dirichlet_epsilon) * child.prior() + params.root_dirichlet_epsilon * (*d as f32);
        child.set_prior(mixed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Position;

    #[test]
    fn gather_on_fresh_root_requests_evaluation() {
        let tree = Tree::new(Position::start());
        let ttable = TranspositionCache::with_byte_budget(1_000_000);
        let params = SearchParams::default();

        let pending = zero_step_gather(&tree, &ttable, &params);
        assert!(pending.is_some());
        let pending = pending.unwrap();
        assert_eq!(pending.node, tree.root_id());
    }

    #[test]
    fn apply_then_gather_descends_into_children() {
        let tree = Tree::new(Position::start());
        let ttable = TranspositionCache::with_byte_budget(1_000_000);
        let params = SearchParams::default();

        let pending = zero_step_gather(&tree, &ttable, &params).unwrap();
        let start = Position::start();
        let uniform: Vec<(Move, f32)> = start.legal_moves().into_iter().map(|m| (m, 1.0)).collect();
        let policy = policy_map::move_map_to_policy(&uniform, start.side_to_move());
        zero_step_apply(&tree, &ttable, &params, pending.node, policy, 0.1);

        let arena = tree.current_arena();
        assert_eq!(arena.get(tree.root_id()).visits(), 1);
        assert!(arena.get(tree.root_id()).is_expanded());

        // second simulation should now descend past the root into a child
        let pending2 = zero_step_gather(&tree, &ttable, &params);
        assert!(pending2.is_some());
        assert_ne!(pending2.unwrap().node, tree.root_id());
    }

    #[test]
    fn stalemate_root_backpropagates_draw_without_expanding() {
        // King vs king, side to move has no legal moves and is not in check.
        let board: board_game::games::chess::ChessBoard =
            "7k/8/6K1/8/8/8/8/8 b - - 0 1".parse().unwrap();
        let tree = Tree::new(Position::from_board_game(board));
        let ttable = TranspositionCache::with_byte_budget(1_000_000);
        let params = SearchParams::default();

        let pending = zero_step_gather(&tree, &ttable, &params);
        assert!(pending.is_none());

        let arena = tree.current_arena();
        let root = arena.get(tree.root_id());
        assert_eq!(root.visits(), 1);
        assert_eq!(root.value_sum(), 0.0);
        assert!(!root.is_expanded());
    }

    fn run_simulations(tree: &Tree, ttable: &TranspositionCache, params: &SearchParams, count: u32) {
        for _ in 0..count {
            if let Some(pending) = zero_step_gather(tree, ttable, params) {
                let arena = tree.current_arena();
                let state = arena.get(pending.node).state.clone();
                let uniform: Vec<(Move, f32)> = state.legal_moves().into_iter().map(|m| (m, 1.0)).collect();
                let policy = policy_map::move_map_to_policy(&uniform, state.side_to_move());
                zero_step_apply(tree, ttable, params, pending.node, policy, 0.0);
            }
        }
    }

    proptest::proptest! {
        /// Every visit lands on the root's path, so after any number of
        /// single-threaded simulations, the root's own visit count and the
        /// sum of its children's visit counts must differ by exactly one —
        /// the one visit the root collects for itself on each simulation
        /// that reaches past it (spec §8, "visit-count conservation").
        #[test]
        fn visits_conserved_across_simulations(count in 1u32..60) {
            let tree = Tree::new(Position::start());
            let ttable = TranspositionCache::with_byte_budget(1_000_000);
            let params = SearchParams::default();

            run_simulations(&tree, &ttable, &params, count);

            let arena = tree.current_arena();
            let root = arena.get(tree.root_id());
            if let Some(children) = root.children() {
                let children_visits: u64 = children.iter().map(|&id| arena.get(id).visits()).sum();
                proptest::prop_assert_eq!(children_visits, root.visits() - 1);
            }
        }
    }
}
