//! Background bulk-data generator.
//!
//! Fills a shared tree with random records from a dedicated thread while
//! other callers keep using the tree. Every upsert goes through the tree's
//! lock like any other caller, so foreground lookups interleave with the
//! generator between upserts.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::JoinHandle;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::storage::btree::{BTree, BTreeError, UpsertOutcome};

/// Keys are drawn uniformly from this range.
pub const KEY_RANGE: RangeInclusive<i64> = 1..=1_000_000;

/// Length of the generated lowercase values.
pub const VALUE_LEN: usize = 8;

/// Progress counters shared between the generator thread and observers.
#[derive(Debug)]
pub struct GeneratorProgress {
    generating: AtomicBool,
    completed: AtomicUsize,
    target: usize,
}

impl GeneratorProgress {
    /// Whether the generator thread is still running.
    #[must_use]
    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::Acquire)
    }

    /// Upserts performed so far.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    /// Upserts requested.
    #[must_use]
    pub const fn target(&self) -> usize {
        self.target
    }
}

/// Totals of a finished generator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeneratorReport {
    pub added: usize,
    pub updated: usize,
}

/// Handle on a running generator thread.
pub struct Generator {
    progress: Arc<GeneratorProgress>,
    handle: JoinHandle<Result<GeneratorReport, BTreeError>>,
}

impl Generator {
    /// Start upserting `count` random records into `tree`.
    ///
    /// With a seed the sequence of keys and values is reproducible.
    #[must_use]
    #[allow(clippy::disallowed_methods)] // Arc::clone shares the progress counters
    pub fn spawn(tree: Arc<BTree>, count: usize, seed: Option<u64>) -> Self {
        let progress = Arc::new(GeneratorProgress {
            generating: AtomicBool::new(true),
            completed: AtomicUsize::new(0),
            target: count,
        });

        let shared = Arc::clone(&progress);
        let handle = std::thread::spawn(move || {
            let rng = seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
            let result = generate(&tree, rng, &shared);
            shared.generating.store(false, Ordering::Release);
            result
        });

        tracing::info!("Generator started: {count} records");
        Self { progress, handle }
    }

    /// Shared progress counters.
    #[must_use]
    pub const fn progress(&self) -> &Arc<GeneratorProgress> {
        &self.progress
    }

    /// Wait for the thread to finish.
    pub fn join(self) -> Result<GeneratorReport, GeneratorError> {
        let report = self
            .handle
            .join()
            .map_err(|_| GeneratorError::Panicked)?
            .map_err(GeneratorError::Tree)?;

        tracing::info!(
            "Generator finished: {} added, {} updated",
            report.added,
            report.updated
        );
        Ok(report)
    }
}

fn generate(
    tree: &BTree,
    mut rng: StdRng,
    progress: &GeneratorProgress,
) -> Result<GeneratorReport, BTreeError> {
    let mut report = GeneratorReport::default();

    for _ in 0..progress.target {
        let key = rng.random_range(KEY_RANGE);
        let value = random_value(&mut rng);

        match tree.upsert(key, &value)? {
            UpsertOutcome::Added => report.added += 1,
            UpsertOutcome::Updated => report.updated += 1,
        }
        progress.completed.fetch_add(1, Ordering::Relaxed);
    }

    Ok(report)
}

/// `VALUE_LEN` random lowercase ASCII letters.
fn random_value(rng: &mut StdRng) -> String {
    (0..VALUE_LEN)
        .map(|_| char::from(rng.random_range(b'a'..=b'z')))
        .collect()
}

/// Errors that can end a generator run.
#[derive(Debug)]
pub enum GeneratorError {
    /// An upsert failed; the run stopped there.
    Tree(BTreeError),
    /// The generator thread panicked.
    Panicked,
}

impl std::fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tree(e) => write!(f, "tree error: {e}"),
            Self::Panicked => write!(f, "generator thread panicked"),
        }
    }
}

impl std::error::Error for GeneratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tree(e) => Some(e),
            Self::Panicked => None,
        }
    }
}
