//! The evaluator contract (spec §6) and the gateway that serializes access
//! to it (spec §4.9). Loading and running the network itself is out of
//! scope — `Evaluator` is the seam a real backend plugs into.

pub mod dummy;
pub mod gateway;

/// One network evaluation: raw policy logits over the dense `[73·8·8]`
/// move-encoding (spec §4.2, §4.9) plus a scalar value in `[-1, 1]` for the
/// position's side to move. Turning these logits into per-move priors is
/// the caller's job (`crate::mapping::policy::policy_to_move_map`), not the
/// backend's — the backend never sees a `Position` or a `Move` at all.
#[derive(Debug, Clone)]
pub struct RawEvaluation {
    pub policy: Vec<f32>,
    pub value: f32,
}

/// A neural-network backend. The caller (the gateway) already serializes
/// calls with a single mutex, so implementations don't need to be
/// reentrant (spec §6, "the caller serializes; the backend need not be
/// reentrant"). Inputs are already-encoded board tensors (spec §4.1) —
/// the plane encoder runs before the batch reaches this trait, and the
/// policy map runs after, so the backend's only job is tensor in, tensor
/// out.
///
/// A failed call is fatal to the current search (spec §7, "evaluator
/// backend failure"): it propagates as [`crate::error::SearchError::EvaluatorFailed`]
/// rather than panicking, so the arena still gets dropped cleanly.
pub trait Evaluator: Send {
    fn evaluate_batch(&mut self, tensors: &[Vec<f32>]) -> Result<Vec<RawEvaluation>, String>;
}
