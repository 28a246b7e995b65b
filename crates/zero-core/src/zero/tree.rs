//! Owns the arena plus the bits of state that change at the granularity of
//! a whole search (current root, history of positions the engine has
//! actually played through) rather than a single node (spec §4.6).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::board::{Move, Position};

use super::arena::Arena;
use super::node::{Node, NodeId};

/// A search tree. `arena` is swapped wholesale on root advancement rather
/// than mutated in place, since [`Arena`] only ever grows (see
/// `zero::arena`'s module doc) — the old arena, and every node not on the
/// retained subtree, is dropped in one shot when the [`Mutex`] guard is
/// released.
pub struct Tree {
    arena: Mutex<std::sync::Arc<Arena>>,
    root: AtomicUsize,
    /// Root positions the engine has actually played through, oldest first
    /// — feeds the plane encoder's history window (spec §4.1, §4.6).
    traversed: Mutex<Vec<Position>>,
}

impl Tree {
    pub fn new(root_state: Position) -> Self {
        let arena = Arena::new();
        let root_id = arena.push(Node::new_root(root_state));
        Tree {
            arena: Mutex::new(std::sync::Arc::new(arena)),
            root: AtomicUsize::new(root_id),
            traversed: Mutex::new(Vec::new()),
        }
    }

    /// A stable snapshot of the current arena. Cheap to clone (one atomic
    /// refcount bump); hold it for the duration of one simulation so a
    /// concurrent `advance_root` can't pull the rug out mid-descent.
    pub fn current_arena(&self) -> std::sync::Arc<Arena> {
        self.arena.lock().unwrap().clone()
    }

    pub fn root_id(&self) -> NodeId {
        self.root.load(Ordering::Acquire)
    }

    pub fn root<'a>(&self, arena: &'a Arena) -> &'a Node {
        arena.get(self.root_id())
    }

    pub fn traversed_history(&self) -> Vec<Position> {
        self.traversed.lock().unwrap().clone()
    }

    /// Replaces the tree with the subtree rooted at `chosen_child`, freeing
    /// every other node (spec §4.6): the previous root's position is
    /// appended to the traversed history, and every surviving node's depth
    /// is shortened so the new root sits at depth 0.
    pub fn advance_root(&self, chosen_child: NodeId) {
        let old_arena = self.current_arena();
        let old_root_state = old_arena.get(self.root_id()).state.clone();
        self.traversed.lock().unwrap().push(old_root_state);

        let new_arena = Arena::new();
        let mut id_map: HashMap<NodeId, NodeId> = HashMap::new();

        let old_new_root = old_arena.get(chosen_child);
        let mut new_root = Node::new_root(old_new_root.state.clone());
        new_root.moves_since_progress = old_new_root.moves_since_progress;
        let new_root_id = new_arena.push(new_root);
        copy_stats(new_arena.get(new_root_id), old_new_root);
        id_map.insert(chosen_child, new_root_id);

        let mut queue: VecDeque<NodeId> = VecDeque::new();
        queue.push_back(chosen_child);

        while let Some(old_id) = queue.pop_front() {
            let old_node = old_arena.get(old_id);
            let new_parent_id = id_map[&old_id];
            if let Some(children) = old_node.children() {
                let parent_depth = new_arena.get(new_parent_id).depth;
                let mut new_children = Vec::with_capacity(children.len());
                for old_child_id in children {
                    let old_child = old_arena.get(old_child_id);
                    let mv = old_child.mv.expect("non-root node always has a move");
                    let new_child_id = new_arena.push(Node::new_child(
                        new_parent_id,
                        parent_depth,
                        old_child.state.clone(),
                        mv,
                        old_child.prior(),
                        old_child.moves_since_progress,
                    ));
                    copy_stats(new_arena.get(new_child_id), old_child);
                    id_map.insert(old_child_id, new_child_id);
                    new_children.push(new_child_id);
                    queue.push_back(old_child_id);
                }
                new_arena.get(new_parent_id).try_set_children(new_children);
            }
        }

        *self.arena.lock().unwrap() = std::sync::Arc::new(new_arena);
        self.root.store(new_root_id, Ordering::Release);
    }

    /// Depth-`1` walk from the root following maximum-visit children,
    /// formatted as SAN with move numbers (spec §4.11).
    pub fn top_line(&self) -> String {
        let arena = self.current_arena();
        let mut current = self.root_id();
        let mut position = arena.get(current).state.clone();
        let black_to_move = position.side_to_move() == chess::Color::Black;

        let base_offset = if black_to_move { 1 } else { 0 };
        let mut ply = 0usize;
        let mut out = String::new();
        if black_to_move {
            out.push_str("1... ");
        }

        loop {
            let node = arena.get(current);
            let children = match node.children() {
                Some(c) if !c.is_empty() => c,
                _ => break,
            };
            let best = children
                .into_iter()
                .max_by_key(|&id| arena.get(id).visits())
                .unwrap();
            let best_node = arena.get(best);
            let mv = best_node.mv.unwrap();

            let global_ply = ply + base_offset;
            let move_number = global_ply / 2 + 1;
            if global_ply % 2 == 0 {
                out.push_str(&format!("{}. ", move_number));
            }
            out.push_str(&mv.to_san(&position));
            out.push(' ');

            position.make_move(mv);
            current = best;
            ply += 1;
        }

        out.trim_end().to_string()
    }

    /// `value_sum / visits` averaged across the root's children, weighted
    /// by visits — the engine's own estimate of how the position is going
    /// for the side to move at the root (spec §6, `root_q`).
    pub fn root_q(&self) -> f32 {
        let arena = self.current_arena();
        let root = arena.get(self.root_id());
        match root.children() {
            None => root.q(),
            Some(children) if children.is_empty() => root.q(),
            Some(children) => {
                let total_visits: u64 = children.iter().map(|&id| arena.get(id).visits()).sum();
                if total_visits == 0 {
                    return root.q();
                }
                // Each child's value_sum is from the child's own side-to-move
                // perspective, i.e. the opponent of the root; negate once
                // before folding into the root's perspective (spec §9,
                // "value sign convention" — the reference implementation's
                // un-renegated average is the bug this avoids).
                let weighted: f64 = children.iter().map(|&id| -arena.get(id).value_sum()).sum();
                (weighted / total_visits as f64) as f32
            }
        }
    }

    pub fn find_child_by_move(&self, mv: Move) -> Option<NodeId> {
        let arena = self.current_arena();
        let root = arena.get(self.root_id());
        root.children()?.into_iter().find(|&id| arena.get(id).mv == Some(mv))
    }

    /// Forces root advancement to `mv`, for the human-vs-engine loop where
    /// the opponent's move may not be one the tree ever explored. Falls
    /// back to a fresh one-node tree at the resulting position when no
    /// matching child exists, rather than trying to splice in an unexplored
    /// branch (spec §6, `make_move`).
    pub fn force_advance(&self, mv: Move) {
        if let Some(child_id) = self.find_child_by_move(mv) {
            self.advance_root(child_id);
            return;
        }

        let arena = self.current_arena();
        let mut new_state = arena.get(self.root_id()).state.clone();
        new_state.make_move(mv);
        self.traversed.lock().unwrap().push(arena.get(self.root_id()).state.clone());
        drop(arena);

        let new_arena = Arena::new();
        let new_root_id = new_arena.push(Node::new_root(new_state));
        *self.arena.lock().unwrap() = std::sync::Arc::new(new_arena);
        self.root.store(new_root_id, Ordering::Release);
    }
}

fn copy_stats(dst: &Node, src: &Node) {
    dst.visits.store(src.visits(), Ordering::Relaxed);
    dst.value_sum.fetch_add(src.value_sum(), Ordering::Relaxed);
}
