//! A stand-in backend for tests: all-zero logits (softmax to a uniform
//! policy once decoded) and zero value. Lets the property-based and seed
//! tests in spec.md §8 exercise the whole search core without a real
//! neural network, the same role the teacher's own `network::dummy` module
//! plays for its non-CUDA test runs.

use crate::mapping::policy::POLICY_SIZE;

use super::{Evaluator, RawEvaluation};

#[derive(Debug, Default, Clone, Copy)]
pub struct DummyEvaluator;

impl Evaluator for DummyEvaluator {
    fn evaluate_batch(&mut self, tensors: &[Vec<f32>]) -> Result<Vec<RawEvaluation>, String> {
        Ok(tensors
            .iter()
            .map(|_| RawEvaluation { policy: vec![0.0; POLICY_SIZE], value: 0.0 })
            .collect())
    }
}
