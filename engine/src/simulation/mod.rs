//! Seeded randomized testing against an in-memory model.
//!
//! A `Simulator` drives a real file-backed tree with a reproducible stream of
//! upserts, removals and lookups, mirrors every operation on a
//! `std::collections::BTreeMap`, and checks the tree's structural invariants
//! at a fixed interval. Given the same seed, the run is identical.
//!
//! ```ignore
//! let mut sim = Simulator::new(SimulatorConfig::new(12345));
//! let result = sim.run(5000);
//! assert!(result.passed(), "{result:?}");
//! ```

mod simulator;

pub use simulator::{SimulationResult, Simulator, SimulatorConfig};
