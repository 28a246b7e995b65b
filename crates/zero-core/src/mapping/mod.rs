//! Chess-specific encoding layer (spec §4.1, §4.2): converts between board
//! state / legal moves and the tensors an [`crate::network::Evaluator`]
//! actually speaks. Lives in this crate (not one layer up in `zero-engine`)
//! because [`crate::board::Position`] is already chess-specific — there is
//! no game-agnostic core underneath it to keep this layer separate from.

pub mod plane;
pub mod policy;
