use serde::{Deserialize, Serialize};

/// Tunable search parameters. Defaults match the reference implementation's
/// `config_params()` (see `original_source/src/config.cpp`): this struct is
/// the Rust-native replacement for that ad-hoc key=value file format. Config
/// *file* parsing stays out of scope (self-play/CLI concern); callers that
/// want one can `serde`-deserialize this struct directly.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub cpuct_base: f32,
    pub cpuct_init: f32,
    pub cpuct_factor: f32,
    pub root_dirichlet_alpha: f32,
    pub root_dirichlet_epsilon: f32,
    pub checks_before_move: u32,
    pub growth_before_check: u32,
    pub thread_count: usize,
    pub transposition_table_size_bytes: usize,
    pub resign_eval_threshold: f32,
    pub temperature_start: f32,
    pub temperature_end: f32,
    /// Additive penalty applied to a child with an outstanding virtual loss,
    /// both in the Q denominator and as a direct score penalty (spec §4.5).
    pub virtual_loss_value: f32,
    /// Ceiling on how many pending requests the evaluator gateway batches
    /// together before it must flush (spec §4.9).
    pub nn_batch_size: usize,
    /// History window `H` fed to the plane encoder (spec §4.1).
    pub history_window: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            cpuct_base: 18368.0,
            cpuct_init: 2.147,
            cpuct_factor: 2.815,
            root_dirichlet_alpha: 0.3,
            root_dirichlet_epsilon: 0.25,
            checks_before_move: 3,
            growth_before_check: 1000,
            thread_count: 4,
            transposition_table_size_bytes: 10_000_000,
            resign_eval_threshold: 0.9,
            temperature_start: 1.0,
            temperature_end: 0.1,
            virtual_loss_value: 1.0,
            nn_batch_size: 16,
            history_window: 1,
        }
    }
}

impl SearchParams {
    /// `cpuct(n)` from spec §4.5: grows logarithmically with parent visits.
    pub fn cpuct(&self, parent_visits: u64) -> f32 {
        self.cpuct_init
            + self.cpuct_factor * ((parent_visits as f32 + self.cpuct_base) / self.cpuct_base).ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference() {
        let p = SearchParams::default();
        assert_eq!(p.cpuct_base, 18368.0);
        assert_eq!(p.checks_before_move, 3);
        assert_eq!(p.growth_before_check, 1000);
        assert_eq!(p.thread_count, 4);
        assert_eq!(p.transposition_table_size_bytes, 10_000_000);
    }

    #[test]
    fn cpuct_grows_with_visits() {
        let p = SearchParams::default();
        assert!(p.cpuct(10_000) > p.cpuct(0));
    }
}
