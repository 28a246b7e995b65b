//! The MCTS tree itself: arena-backed nodes, PUCT selection, and the
//! gather/apply step protocol (spec §3, §4.4–§4.8).

pub mod arena;
pub mod node;
pub mod step;
pub mod tree;
