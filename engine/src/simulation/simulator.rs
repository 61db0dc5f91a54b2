use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::storage::btree::{BTree, NOT_FOUND, RemoveOutcome, UpsertOutcome};
use crate::testing::{check_invariants, new_test_tree};

/// Simulation parameters.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub seed: u64,
    /// Keys are drawn uniformly from `0..key_space`.
    pub key_space: i64,
    /// Probability that an operation is an upsert.
    pub upsert_rate: f64,
    /// Probability that an operation is a removal; the rest are lookups.
    pub remove_rate: f64,
    /// Run the invariant checker every this many operations.
    pub check_every: usize,
}

impl SimulatorConfig {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            seed,
            key_space: 3000,
            upsert_rate: 0.55,
            remove_rate: 0.30,
            check_every: 500,
        }
    }

    #[must_use]
    pub const fn with_key_space(mut self, key_space: i64) -> Self {
        self.key_space = key_space;
        self
    }

    #[must_use]
    pub const fn with_rates(mut self, upsert_rate: f64, remove_rate: f64) -> Self {
        self.upsert_rate = upsert_rate;
        self.remove_rate = remove_rate;
        self
    }
}

/// Results from a simulation run.
#[derive(Debug, Default)]
pub struct SimulationResult {
    pub seed: u64,
    pub operations: u64,
    pub upserts: u64,
    pub removals: u64,
    pub lookups: u64,
    /// Highest tree height observed at a checkpoint.
    pub max_height: usize,
    /// Disagreements between the tree and the model, and invariant failures.
    pub failures: Vec<String>,
}

impl SimulationResult {
    /// Check if the run finished without any failure.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The simulator harness.
pub struct Simulator {
    config: SimulatorConfig,
    rng: StdRng,
    model: BTreeMap<i64, String>,
}

impl Simulator {
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            model: BTreeMap::new(),
        }
    }

    /// Run `operation_count` random operations on a fresh tree.
    pub fn run(&mut self, operation_count: usize) -> SimulationResult {
        let t = new_test_tree();
        self.model.clear();
        let mut result = SimulationResult {
            seed: self.config.seed,
            ..SimulationResult::default()
        };

        for step in 0..operation_count {
            let key = self.rng.random_range(0..self.config.key_space);
            let roll: f64 = self.rng.random();
            result.operations += 1;

            if roll < self.config.upsert_rate {
                result.upserts += 1;
                let value = format!("v{}-{step}", self.rng.random::<u16>());
                let expected = if self.model.insert(key, value.clone()).is_some() {
                    UpsertOutcome::Updated
                } else {
                    UpsertOutcome::Added
                };
                match t.tree.upsert(key, &value) {
                    Ok(outcome) if outcome == expected => {}
                    other => result.failures.push(format!(
                        "step {step}: upsert({key}) gave {other:?}, expected {expected:?}"
                    )),
                }
            } else if roll < self.config.upsert_rate + self.config.remove_rate {
                result.removals += 1;
                let was_empty = self.model.is_empty();
                let expected = match (was_empty, self.model.remove(&key).is_some()) {
                    (true, _) => RemoveOutcome::TreeEmpty,
                    (false, true) => RemoveOutcome::Removed,
                    (false, false) => RemoveOutcome::NotFound,
                };
                match t.tree.remove(key) {
                    Ok(outcome) if outcome == expected => {}
                    other => result.failures.push(format!(
                        "step {step}: remove({key}) gave {other:?}, expected {expected:?}"
                    )),
                }
            } else {
                result.lookups += 1;
                let expected = self.model.get(&key).map_or(NOT_FOUND, String::as_str);
                match t.tree.get_with_stats(key) {
                    Ok(found)
                        if found.value == expected
                            && found.found == self.model.contains_key(&key) => {}
                    other => result.failures.push(format!(
                        "step {step}: get({key}) gave {other:?}, expected {expected}"
                    )),
                }
            }

            if (step + 1) % self.config.check_every == 0 || step + 1 == operation_count {
                self.checkpoint(&t.tree, step, &mut result);
            }
            if !result.passed() {
                break;
            }
        }

        result
    }

    fn checkpoint(&self, tree: &BTree, step: usize, result: &mut SimulationResult) {
        match check_invariants(tree) {
            Ok(shape) => {
                result.max_height = result.max_height.max(shape.height);
                if !shape.keys.iter().eq(self.model.keys()) {
                    result.failures.push(format!(
                        "step {step}: tree holds {} keys, model holds {}",
                        shape.keys.len(),
                        self.model.len()
                    ));
                }
                if self.model.is_empty() && tree.root_index().ok().flatten().is_some() {
                    result
                        .failures
                        .push(format!("step {step}: empty model but tree has a root"));
                }
            }
            Err(violation) => result
                .failures
                .push(format!("step {step}: invariant violated: {violation}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_operations_match_model() {
        for seed in [1, 2, 3] {
            let mut sim = Simulator::new(SimulatorConfig::new(seed));
            let result = sim.run(4000);
            assert!(result.passed(), "seed {seed}: {:?}", result.failures);
            assert_eq!(result.operations, 4000);
            assert!(result.max_height >= 2, "seed {seed} never split the root");
        }
    }

    #[test]
    fn test_churn_around_root_split_threshold() {
        // Half upserts, half removals over 400 keys keeps roughly 200 keys
        // live, so the root keeps splitting and collapsing.
        let config = SimulatorConfig::new(99)
            .with_key_space(400)
            .with_rates(0.5, 0.5);
        let result = Simulator::new(config).run(6000);
        assert!(result.passed(), "{:?}", result.failures);
        assert_eq!(result.lookups, 0);
    }

    #[test]
    fn test_same_seed_same_run() {
        let first = Simulator::new(SimulatorConfig::new(42)).run(800);
        let second = Simulator::new(SimulatorConfig::new(42)).run(800);
        assert_eq!(first.upserts, second.upserts);
        assert_eq!(first.removals, second.removals);
        assert_eq!(first.lookups, second.lookups);
        assert_eq!(first.max_height, second.max_height);
    }
}
