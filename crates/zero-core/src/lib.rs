//! Parallel MCTS + neural-network search core (spec §2: node/arena,
//! evaluator gateway, search engine, worker pool, early-stop controller),
//! plus the board adapter (`board`) and the chess-specific plane/policy
//! encoding layer (`mapping`) the search depends on directly. The
//! `zero-engine` crate one layer up is a thin public facade that
//! re-exports these pieces for a self-play or CLI layer to consume.

pub mod board;
pub mod error;
pub mod mapping;
pub mod network;
pub mod params;
pub mod search;
pub mod ttable;
pub mod worker;
pub mod zero;

pub use error::{SearchError, SearchResult};
pub use params::SearchParams;
pub use search::{ResultCode, Search};
