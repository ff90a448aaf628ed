use std::fs;
use std::path::Path;

use anyhow::Context;
use edgepurge_core::{Config, EntityRecord, ImageQueuer, Invalidation, MemoryQueue};

use super::args::ConfigArgs;

mod dispatch;
pub mod expand;
pub mod purge;

pub use dispatch::dispatch;

/// Config file, then `EDGEPURGE_*` variables, then command-line flags.
pub(crate) fn load_config(args: &ConfigArgs) -> anyhow::Result<Config> {
    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    config.purger = config.purger.merge_env();
    if let Some(endpoint) = &args.endpoint {
        config.purger = config.purger.with_endpoint(endpoint.clone());
    }
    Ok(config)
}

/// Invalidations for positional URIs, numbered after `first_id`.
pub(crate) fn uri_invalidations(
    uris: &[String],
    first_id: u64,
) -> anyhow::Result<Vec<Invalidation>> {
    uris.iter()
        .zip(first_id..)
        .map(|(uri, id)| Invalidation::new(id, uri.as_str()).map_err(anyhow::Error::from))
        .collect()
}

/// Run every entity in a JSON-lines file through the queuer.
pub(crate) fn queue_entities(
    path: &Path,
    queuer: &ImageQueuer,
    queue: &MemoryQueue,
) -> anyhow::Result<usize> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut queued = 0;
    for (n, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entity: EntityRecord = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid entity record", path.display(), n + 1))?;
        queued += queuer.enqueue(&entity, queue);
    }
    Ok(queued)
}
