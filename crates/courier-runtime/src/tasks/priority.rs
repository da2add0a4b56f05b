//! Queue priority.
//!
//! Each dequeue attempt asks the [`QueueSelector`] for an ordering of the
//! configured queues. In weighted mode the first queue is picked with
//! probability proportional to its weight, the next from the remainder, and so
//! on, so a heavier queue is drained preferentially while a lighter one still
//! gets its share whenever both have work. In strict mode the order is always
//! descending weight and a lighter queue only runs when every heavier one is
//! empty.

use std::collections::BTreeMap;
use std::sync::Mutex;

use courier_core::error::{CourierError, Result};
use courier_core::task::DEFAULT_QUEUE;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Validated mapping of queue name to relative weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueWeights {
    weights: Vec<(String, u32)>,
}

impl QueueWeights {
    /// Build from configuration. An empty mapping serves the default queue alone.
    pub fn new(weights: &BTreeMap<String, u32>) -> Result<Self> {
        if weights.is_empty() {
            return Ok(Self {
                weights: vec![(DEFAULT_QUEUE.to_string(), 1)],
            });
        }

        let mut entries = Vec::with_capacity(weights.len());
        for (queue, weight) in weights {
            if queue.trim().is_empty() {
                return Err(CourierError::InvalidArgument(
                    "queue name must not be empty".to_string(),
                ));
            }
            if *weight == 0 {
                return Err(CourierError::InvalidArgument(format!(
                    "queue '{}' must have a positive weight",
                    queue
                )));
            }
            entries.push((queue.clone(), *weight));
        }

        // Heaviest first; ties keep name order.
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(Self { weights: entries })
    }

    /// Queue names, heaviest first.
    pub fn queues(&self) -> Vec<String> {
        self.weights.iter().map(|(q, _)| q.clone()).collect()
    }

    pub fn weight(&self, queue: &str) -> Option<u32> {
        self.weights
            .iter()
            .find(|(q, _)| q == queue)
            .map(|(_, w)| *w)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Produces the order in which queues are tried on each dequeue.
pub struct QueueSelector {
    weights: QueueWeights,
    strict: bool,
    rng: Mutex<StdRng>,
}

impl QueueSelector {
    pub fn new(weights: QueueWeights, strict: bool) -> Self {
        Self {
            weights,
            strict,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic selector for tests.
    pub fn with_seed(weights: QueueWeights, strict: bool, seed: u64) -> Self {
        Self {
            weights,
            strict,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn weights(&self) -> &QueueWeights {
        &self.weights
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Queue order for the next dequeue attempt.
    pub fn order(&self) -> Vec<String> {
        if self.strict || self.weights.len() == 1 {
            return self.weights.queues();
        }

        let mut remaining = self.weights.weights.clone();
        let mut order = Vec::with_capacity(remaining.len());
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());

        while !remaining.is_empty() {
            let total: u64 = remaining.iter().map(|(_, w)| u64::from(*w)).sum();
            let mut pick = rng.gen_range(0..total);
            let mut index = remaining.len() - 1;
            for (i, (_, weight)) in remaining.iter().enumerate() {
                let weight = u64::from(*weight);
                if pick < weight {
                    index = i;
                    break;
                }
                pick -= weight;
            }
            order.push(remaining.remove(index).0);
        }

        order
    }
}
