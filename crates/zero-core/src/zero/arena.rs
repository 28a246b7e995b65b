//! Arena that owns every node created during one search (spec §3, §9).
//!
//! Backed by `append-only-vec`'s `AppendOnlyVec`, which lets many worker
//! threads push new nodes through a shared `&Arena` (no writer-side mutex
//! contention on the whole tree) while handing back *stable* references to
//! already-published nodes — exactly the "arena indexed by integer node IDs"
//! alternative the design notes recommend for a language with strict
//! borrowing (spec §9).
//!
//! `AppendOnlyVec` only grows, so "freeing every node not on the retained
//! subtree" (spec §4.6) is implemented by building a fresh arena containing
//! just the surviving subtree and dropping the old one — dropping the old
//! `Arena` releases every node in it in O(n), same as the owning-Vec model
//! the spec describes.

use append_only_vec::AppendOnlyVec;

use super::node::{Node, NodeId};

pub struct Arena {
    nodes: AppendOnlyVec<Node>,
}

impl Arena {
    pub fn new() -> Self {
        Arena { nodes: AppendOnlyVec::new() }
    }

    pub fn push(&self, node: Node) -> NodeId {
        self.nodes.push(node)
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<NodeId> for Arena {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        self.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Position;

    #[test]
    fn push_then_get_roundtrips() {
        let arena = Arena::new();
        let id = arena.push(Node::new_root(Position::start()));
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.get(id).depth, 0);
    }

    #[test]
    fn concurrent_pushes_keep_stable_indices() {
        use std::sync::Arc;
        use std::thread;

        let arena = Arc::new(Arena::new());
        let mut handles = vec![];
        for _ in 0..8 {
            let arena = arena.clone();
            handles.push(thread::spawn(move || {
                let mut ids = vec![];
                for _ in 0..50 {
                    ids.push(arena.push(Node::new_root(Position::start())));
                }
                ids
            }));
        }
        let mut all_ids = vec![];
        for h in handles {
            all_ids.extend(h.join().unwrap());
        }
        all_ids.sort_unstable();
        all_ids.dedup();
        assert_eq!(all_ids.len(), 400);
        assert_eq!(arena.len(), 400);
    }
}
