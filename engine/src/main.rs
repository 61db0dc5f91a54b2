#![cfg_attr(test, allow(clippy::disallowed_methods))]
use std::sync::Arc;
use std::time::Duration;

use engine::BTree;
use engine::config::EngineConfig;
use engine::generator::Generator;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

#[allow(clippy::disallowed_methods)] // Arc::clone shares the tree with the generator
fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Loaded configuration: database_file={}, generate_count={}",
        config.database_file.display(),
        config.generate_count
    );

    let tree = match BTree::open(&config.database_file) {
        Ok(tree) => Arc::new(tree),
        Err(e) => {
            tracing::error!("Failed to open tree: {e}");
            std::process::exit(1);
        }
    };

    if config.generate_count > 0 {
        let generator = Generator::spawn(
            Arc::clone(&tree),
            config.generate_count,
            config.generator_seed,
        );

        let progress = Arc::clone(generator.progress());
        while progress.is_generating() {
            std::thread::sleep(PROGRESS_INTERVAL);
            tracing::info!(
                "Generating: {}/{}",
                progress.completed(),
                progress.target()
            );
        }

        if let Err(e) = generator.join() {
            tracing::error!("Generator failed: {e}");
            std::process::exit(1);
        }
    }

    match (tree.root_index(), tree.node_count()) {
        (Ok(root), Ok(count)) => {
            tracing::info!("Tree root={root:?}, allocated nodes={count}");
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!("Failed to read tree header: {e}");
            std::process::exit(1);
        }
    }

    for &key in &config.lookup_keys {
        match tree.get_with_stats(key) {
            Ok(result) if result.found => tracing::info!(
                "Key {key}: '{}' after {} comparisons",
                result.value,
                result.comparisons
            ),
            Ok(result) => tracing::info!(
                "Key {key}: not found after {} comparisons",
                result.comparisons
            ),
            Err(e) => tracing::warn!("Lookup of {key} failed: {e}"),
        }
    }

    if let Err(e) = tree.sync() {
        tracing::warn!("Failed to sync tree file: {e}");
    }
}
