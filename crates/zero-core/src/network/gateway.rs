//! Single-writer, FIFO-batching gateway to a neural-network backend
//! (spec §4.9).

use std::collections::VecDeque;
use std::sync::Mutex;

use zero_util::sequence::zip_eq_exact;

use crate::params::SearchParams;
use crate::ttable::TranspositionCache;
use crate::zero::step::{zero_step_apply, PendingEvaluation};
use crate::zero::tree::Tree;

use super::Evaluator;

pub struct EvaluatorGateway<E: Evaluator> {
    /// The "currently evaluating" guard from spec §4.9: a plain `Mutex`
    /// already gives every other caller the "block on a condition variable
    /// until the guard is released" behavior the spec describes, without a
    /// separate condvar.
    evaluator: Mutex<E>,
    pending: Mutex<VecDeque<PendingEvaluation>>,
    batch_size: usize,
}

impl<E: Evaluator> EvaluatorGateway<E> {
    pub fn new(evaluator: E, batch_size: usize) -> Self {
        EvaluatorGateway {
            evaluator: Mutex::new(evaluator),
            pending: Mutex::new(VecDeque::new()),
            batch_size: batch_size.max(1),
        }
    }

    /// Pushes `item` into the pending queue. If the queue has reached the
    /// configured ceiling, this call drains it and performs the network
    /// call itself (dispatching per-result expansion/backprop for every
    /// item in the batch, not just its own). Otherwise it returns
    /// immediately — the item will be picked up whenever some other
    /// worker's submission triggers a flush.
    ///
    /// Errors only when the flush it triggers fails (spec §7, "evaluator
    /// backend failure") — the error carries the backend's message and
    /// leaves the arena untouched, ready to be dropped by the caller.
    pub fn submit(
        &self,
        tree: &Tree,
        ttable: &TranspositionCache,
        params: &SearchParams,
        item: PendingEvaluation,
    ) -> Result<(), String> {
        let batch = {
            let mut queue = self.pending.lock().unwrap();
            queue.push_back(item);
            if queue.len() >= self.batch_size {
                Some(queue.drain(..).collect::<Vec<_>>())
            } else {
                None
            }
        };

        match batch {
            Some(batch) => self.flush(tree, ttable, params, batch),
            None => Ok(()),
        }
    }

    /// Flushes whatever is currently queued, regardless of the batch-size
    /// ceiling. Used once the search budget is spent, so stragglers below
    /// the ceiling still get backpropagated before `start_search` returns.
    pub fn force_flush(&self, tree: &Tree, ttable: &TranspositionCache, params: &SearchParams) -> Result<(), String> {
        let batch: Vec<_> = self.pending.lock().unwrap().drain(..).collect();
        if batch.is_empty() {
            Ok(())
        } else {
            self.flush(tree, ttable, params, batch)
        }
    }

    fn flush(
        &self,
        tree: &Tree,
        ttable: &TranspositionCache,
        params: &SearchParams,
        batch: Vec<PendingEvaluation>,
    ) -> Result<(), String> {
        let tensors: Vec<_> = batch.iter().map(|item| item.tensor.clone()).collect();

        let evaluations = {
            let mut evaluator = self.evaluator.lock().unwrap();
            evaluator.evaluate_batch(&tensors)?
        };

        for (item, eval) in zip_eq_exact(batch, evaluations)? {
            zero_step_apply(tree, ttable, params, item.node, eval.policy, eval.value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Position;
    use crate::network::dummy::DummyEvaluator;
    use crate::network::RawEvaluation;
    use crate::zero::step::zero_step_gather;

    #[test]
    fn submit_below_ceiling_does_not_flush_until_threshold() {
        let tree = Tree::new(Position::start());
        let ttable = TranspositionCache::with_byte_budget(1_000_000);
        let params = SearchParams::default();
        let gateway = EvaluatorGateway::new(DummyEvaluator, 4);

        let pending = zero_step_gather(&tree, &ttable, &params).unwrap();
        gateway.submit(&tree, &ttable, &params, pending).unwrap();

        let arena = tree.current_arena();
        assert_eq!(arena.get(tree.root_id()).visits(), 0);

        gateway.force_flush(&tree, &ttable, &params).unwrap();
        let arena = tree.current_arena();
        assert_eq!(arena.get(tree.root_id()).visits(), 1);
    }

    struct FailingEvaluator;
    impl Evaluator for FailingEvaluator {
        fn evaluate_batch(&mut self, _tensors: &[Vec<f32>]) -> Result<Vec<RawEvaluation>, String> {
            Err("backend unavailable".to_string())
        }
    }

    #[test]
    fn evaluator_failure_surfaces_as_an_error_instead_of_panicking() {
        let tree = Tree::new(Position::start());
        let ttable = TranspositionCache::with_byte_budget(1_000_000);
        let params = SearchParams::default();
        let gateway = EvaluatorGateway::new(FailingEvaluator, 1);

        let pending = zero_step_gather(&tree, &ttable, &params).unwrap();
        let result = gateway.submit(&tree, &ttable, &params, pending);
        assert_eq!(result, Err("backend unavailable".to_string()));
    }
}
