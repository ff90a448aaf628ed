use edgepurge_core::ImagePurger;

use super::super::args::ExpandArgs;
use super::{load_config, uri_invalidations};
use crate::exit_codes::SUCCESS;

pub fn run(args: ExpandArgs) -> anyhow::Result<i32> {
    let config = load_config(&args.config)?;
    let purger = ImagePurger::from_config(&config)?;

    for invalidation in uri_invalidations(&args.uris, 1)? {
        let plan = purger.plan(&invalidation);
        if plan.is_empty() {
            tracing::info!(expression = invalidation.expression(), "no derived resources exist");
        }
        for request in plan {
            println!("{}\t{}", request.method, request.target);
        }
    }
    Ok(SUCCESS)
}
