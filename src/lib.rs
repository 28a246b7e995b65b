//! Public facade: re-exports the generic search core and the chess-specific
//! encoding layer from `zero_core`, so a self-play or CLI layer only needs
//! to depend on this one crate.

pub use zero_core::board::{CastlingRights, Move, Position, Terminal};
pub use zero_core::mapping::plane::{encode as encode_planes, tensor_planes};
pub use zero_core::mapping::policy::{move_map_to_policy, policy_to_move_map, POLICY_SIZE};
pub use zero_core::network::{dummy::DummyEvaluator, gateway::EvaluatorGateway, Evaluator, RawEvaluation};
pub use zero_core::{ResultCode, Search, SearchError, SearchParams, SearchResult};
