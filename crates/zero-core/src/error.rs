use thiserror::Error;

/// Errors that can surface at the public [`crate::search::Search`] API.
///
/// The core never swallows an error silently (spec §7): cache races and
/// transient selection failures are handled internally (see
/// [`crate::zero::step`] and [`crate::zero::ttable`]) and never reach this
/// type. Only conditions that make the current search unusable are
/// represented here.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("evaluator backend failed: {0}")]
    EvaluatorFailed(String),

    #[error("illegal move supplied to make_move: {0:?} is not legal in the current position")]
    IllegalMove(String),

    #[error("search has no simulation budget: num_simulations must be > 0")]
    EmptyBudget,

    #[error("select_move called before the root was ever expanded")]
    NoSelectableChild,
}

pub type SearchResult<T> = Result<T, SearchError>;
