//! Candidate selection among matching instances.

use rand::seq::SliceRandom;
use crate::registry::instance::ServiceInstance;

/// Picks one instance out of the candidates that survived filtering.
pub trait Selector: Send + Sync + std::fmt::Debug {
    /// Returns `None` only when `candidates` is empty.
    fn select<'a>(&self, candidates: &'a [ServiceInstance]) -> Option<&'a ServiceInstance>;
}

/// Uniform random choice, no weighting.
#[derive(Debug, Default)]
pub struct RandomSelector;

impl RandomSelector {
    pub fn new() -> Self {
        Self
    }
}

impl Selector for RandomSelector {
    fn select<'a>(&self, candidates: &'a [ServiceInstance]) -> Option<&'a ServiceInstance> {
        candidates.choose(&mut rand::thread_rng())
    }
}
