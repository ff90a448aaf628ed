//! Turning changed entities into queued invalidations.
//!
//! Which entity attributes reference resources is plain configuration
//! ([`QueuerConfig::resource_fields`]); resolving the references to storage
//! URIs happens before entities reach this module.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::QueuerConfig;
use crate::invalidation::Invalidation;

/// A changed entity with its resource references already resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_type: String,
    pub bundle: String,
    /// Attribute name to the storage URIs it references.
    #[serde(default)]
    pub fields: BTreeMap<String, Vec<String>>,
}

/// Destination for queued invalidations.
pub trait PurgeQueue: Send + Sync {
    fn add(&self, invalidations: Vec<Invalidation>);
}

/// In-process FIFO queue.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    items: Mutex<VecDeque<Invalidation>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take up to `limit` invalidations off the front of the queue.
    pub fn claim(&self, limit: usize) -> Vec<Invalidation> {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        let n = limit.min(items.len());
        items.drain(..n).collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PurgeQueue for MemoryQueue {
    fn add(&self, invalidations: Vec<Invalidation>) {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(invalidations);
    }
}

/// Decides which entities are purged and queues their resources.
#[derive(Debug)]
pub struct ImageQueuer {
    config: QueuerConfig,
    next_id: AtomicU64,
}

impl ImageQueuer {
    pub fn new(config: QueuerConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(1),
        }
    }

    /// Whether the entity passes the allow-list (an empty list allows all).
    pub fn accepts(&self, entity: &EntityRecord) -> bool {
        if self.config.entity_types.is_empty() {
            return true;
        }
        self.config
            .entity_types
            .get(&entity.entity_type)
            .is_some_and(|bundles| bundles.iter().any(|b| b == &entity.bundle))
    }

    /// Resource URIs referenced by the configured attributes, first-seen order.
    pub fn resource_uris(&self, entity: &EntityRecord) -> Vec<String> {
        let Some(fields) = self.config.resource_fields.get(&entity.entity_type) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        fields
            .iter()
            .filter_map(|field| entity.fields.get(field))
            .flatten()
            .filter(|uri| seen.insert(*uri))
            .cloned()
            .collect()
    }

    /// Invalidations for an accepted entity; invalid URIs are dropped.
    pub fn invalidations(&self, entity: &EntityRecord) -> Vec<Invalidation> {
        if !self.accepts(entity) {
            return Vec::new();
        }
        self.resource_uris(entity)
            .into_iter()
            .filter_map(|uri| {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                match Invalidation::new(id, uri) {
                    Ok(invalidation) => Some(invalidation),
                    Err(e) => {
                        debug!(error = %e, "skipping resource reference");
                        None
                    }
                }
            })
            .collect()
    }

    /// Queue the entity's resources; returns how many were queued.
    pub fn enqueue(&self, entity: &EntityRecord, queue: &dyn PurgeQueue) -> usize {
        let invalidations = self.invalidations(entity);
        let queued = invalidations.len();
        if queued > 0 {
            debug!(
                entity_type = %entity.entity_type,
                bundle = %entity.bundle,
                queued,
                "queued resource invalidations"
            );
            queue.add(invalidations);
        }
        queued
    }
}
