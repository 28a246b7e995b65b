//! Fixed-size worker pool and wall-clock early-stop controller (spec §4.12,
//! §5). The pool itself follows `boomerchi-dream-go`'s `mcts` module — named
//! `crossbeam::scope` threads pulling from a shared remaining-simulation
//! counter rather than an explicit task queue of closures, since every task
//! is identical ("perform one simulation"). The early-stop algorithm is a
//! direct port of `original_source/src/search/threadpool.hpp`'s `stopAfter`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::board::Move;
use crate::error::{SearchError, SearchResult};
use crate::network::gateway::EvaluatorGateway;
use crate::network::Evaluator;
use crate::params::SearchParams;
use crate::ttable::TranspositionCache;
use crate::zero::step::zero_step_gather;
use crate::zero::tree::Tree;

/// Runs `num_simulations` simulations across `params.thread_count` worker
/// threads, stopping early if `deadline` elapses and the early-stop
/// controller decides the top move has stabilized. Blocks until every
/// dispatched worker has finished and any still-pending sub-ceiling batch
/// has been flushed.
///
/// Errors exactly when the evaluator backend fails (spec §7): the first
/// worker to observe a failure stops the whole pool rather than letting
/// every other thread spin down on its own schedule.
pub fn run_search<E: Evaluator>(
    tree: &Tree,
    ttable: &TranspositionCache,
    gateway: &EvaluatorGateway<E>,
    params: &SearchParams,
    num_simulations: u64,
    deadline: Option<Duration>,
) -> SearchResult<()> {
    let remaining = AtomicU64::new(num_simulations);
    let stop = AtomicBool::new(false);
    let failure: Mutex<Option<String>> = Mutex::new(None);

    crossbeam::scope(|scope| {
        if let Some(deadline) = deadline {
            scope
                .builder()
                .name("zero-early-stop".to_string())
                .spawn(|_| early_stop_controller(tree, params, deadline, &stop))
                .expect("failed to spawn early-stop thread");
        }

        for thread_id in 0..params.thread_count {
            scope
                .builder()
                .name(format!("zero-worker-{thread_id}"))
                .spawn(|_| worker_loop(tree, ttable, gateway, params, &remaining, &stop, &failure))
                .expect("failed to spawn worker thread");
        }
    })
    .expect("worker pool thread panicked");

    // Drain whatever didn't reach the batch-size ceiling so every dispatched
    // simulation is fully backpropagated before we return.
    if let Err(message) = gateway.force_flush(tree, ttable, params) {
        *failure.lock().unwrap() = Some(message);
    }

    if let Some(message) = failure.lock().unwrap().take() {
        return Err(SearchError::EvaluatorFailed(message));
    }

    debug!("search finished: {} simulations requested, stop={}", num_simulations, stop.load(Ordering::Relaxed));
    Ok(())
}

fn worker_loop<E: Evaluator>(
    tree: &Tree,
    ttable: &TranspositionCache,
    gateway: &EvaluatorGateway<E>,
    params: &SearchParams,
    remaining: &AtomicU64,
    stop: &AtomicBool,
    failure: &Mutex<Option<String>>,
) {
    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }

        let mut claimed = remaining.load(Ordering::Relaxed);
        loop {
            if claimed == 0 {
                return;
            }
            match remaining.compare_exchange_weak(claimed, claimed - 1, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => break,
                Err(actual) => claimed = actual,
            }
        }

        if let Some(pending) = zero_step_gather(tree, ttable, params) {
            if let Err(message) = gateway.submit(tree, ttable, params, pending) {
                *failure.lock().unwrap() = Some(message);
                stop.store(true, Ordering::Relaxed);
                return;
            }
        }
    }
}

/// Every second, once the root has grown past `growth_before_check * i`
/// visits, compares the top child's visit lead over the runner-up against
/// the previous check. A widening, stable lead for `checks_before_move`
/// consecutive checks signals the pool to stop; a change of leader resets
/// every counter. Matches `original_source/src/search/threadpool.hpp`
/// exactly, translated from a detached `std::thread` into a scoped one.
fn early_stop_controller(tree: &Tree, params: &SearchParams, deadline: Duration, stop: &AtomicBool) {
    let end = Instant::now() + deadline;
    let mut i: u64 = 1;
    let mut checks: u32 = 0;
    let mut prev_difference: i64 = 0;
    let mut top_move: Option<Move> = None;

    while Instant::now() < end {
        std::thread::sleep(Duration::from_secs(1));
        if stop.load(Ordering::Relaxed) {
            return;
        }

        let arena = tree.current_arena();
        let root = arena.get(tree.root_id());
        if root.visits() <= params.growth_before_check as u64 * i {
            continue;
        }
        i += 1;

        let children = match root.children() {
            Some(c) if !c.is_empty() => c,
            _ => continue,
        };

        let mut max_visits: i64 = 0;
        let mut second_to_max_visits: i64 = 0;
        let mut best_move: Option<Move> = None;
        for child_id in children {
            let child = arena.get(child_id);
            let visits = child.visits() as i64;
            if visits > max_visits {
                second_to_max_visits = max_visits;
                max_visits = visits;
                best_move = child.mv;
            } else if visits > second_to_max_visits {
                second_to_max_visits = visits;
            }
        }

        if best_move != top_move {
            checks = 0;
            prev_difference = 0;
            top_move = best_move;
        }

        let difference = max_visits - second_to_max_visits;
        if difference > prev_difference {
            if checks > params.checks_before_move {
                info!("early stop: top move stable for {checks} checks, lead {difference}");
                stop.store(true, Ordering::Relaxed);
                return;
            }
            checks += 1;
        } else {
            checks = 0;
        }
        prev_difference = difference;
    }

    stop.store(true, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Position;
    use crate::network::dummy::DummyEvaluator;

    #[test]
    fn run_search_reaches_requested_visit_count() {
        let tree = Tree::new(Position::start());
        let ttable = TranspositionCache::with_byte_budget(1_000_000);
        let gateway = EvaluatorGateway::new(DummyEvaluator, 8);
        let mut params = SearchParams::default();
        params.thread_count = 2;

        run_search(&tree, &ttable, &gateway, &params, 50, None).unwrap();

        let arena = tree.current_arena();
        assert_eq!(arena.get(tree.root_id()).visits(), 50);
    }

    #[test]
    fn run_search_with_single_thread_is_deterministic() {
        let run_once = || {
            let tree = Tree::new(Position::start());
            let ttable = TranspositionCache::with_byte_budget(1_000_000);
            let gateway = EvaluatorGateway::new(DummyEvaluator, 8);
            let mut params = SearchParams::default();
            params.thread_count = 1;
            run_search(&tree, &ttable, &gateway, &params, 30, None).unwrap();
            tree.top_line()
        };

        assert_eq!(run_once(), run_once());
    }

    struct FailingEvaluator;
    impl Evaluator for FailingEvaluator {
        fn evaluate_batch(&mut self, _tensors: &[Vec<f32>]) -> Result<Vec<crate::network::RawEvaluation>, String> {
            Err("backend unavailable".to_string())
        }
    }

    #[test]
    fn run_search_surfaces_evaluator_failure_instead_of_hanging() {
        let tree = Tree::new(Position::start());
        let ttable = TranspositionCache::with_byte_budget(1_000_000);
        let gateway = EvaluatorGateway::new(FailingEvaluator, 1);
        let mut params = SearchParams::default();
        params.thread_count = 4;

        let result = run_search(&tree, &ttable, &gateway, &params, 100, None);
        assert!(matches!(result, Err(SearchError::EvaluatorFailed(_))));
    }
}
