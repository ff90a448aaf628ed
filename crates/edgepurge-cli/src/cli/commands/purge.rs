use edgepurge_core::{ImagePurger, ImageQueuer, MemoryQueue};

use super::super::args::PurgeArgs;
use super::{load_config, queue_entities, uri_invalidations};
use crate::exit_codes::{PURGE_FAILED, SUCCESS};

pub async fn run(args: PurgeArgs) -> anyhow::Result<i32> {
    let mut config = load_config(&args.config)?;
    if let Some(concurrency) = args.concurrency {
        config.purger = config.purger.with_concurrency(concurrency);
    }
    let purger = ImagePurger::from_config(&config)?;

    let queue = MemoryQueue::new();
    if let Some(path) = &args.entities {
        let queuer = ImageQueuer::new(config.queuer.clone());
        let queued = queue_entities(path, &queuer, &queue)?;
        tracing::debug!(queued, path = %path.display(), "queued entity resources");
    }
    let mut batch = queue.claim(queue.len());
    let next_id = batch.iter().map(|inv| inv.id().0).max().map_or(1, |max| max + 1);
    batch.extend(uri_invalidations(&args.uris, next_id)?);

    if batch.is_empty() {
        tracing::info!("nothing to purge");
        return Ok(SUCCESS);
    }

    let summary = purger.invalidate(&mut batch).await;
    for invalidation in &batch {
        println!("{}\t{}", invalidation.state(), invalidation.expression());
    }

    Ok(if summary.failed > 0 {
        PURGE_FAILED
    } else {
        SUCCESS
    })
}
