//! Derived-resource definitions and the registry they live in.
//!
//! A definition turns a canonical `scheme://target` expression into the
//! locator of one derived artifact and answers whether that artifact
//! currently exists. The registry is built once and shared read-only.

use std::fmt;
use std::sync::Arc;

use crate::config::{DerivativeConfig, StorageConfig};
use crate::error::PurgeResult;

mod expander;
mod storage;
mod style;

pub use expander::Expander;
pub use storage::LocalStorage;
pub use style::ImageStyle;

/// Where a derived artifact lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedLocator {
    /// Name of the rule that produced the locator.
    pub rule: String,
    /// Storage URI of the artifact (e.g. `public://styles/thumb/public/a.png`).
    pub storage_uri: String,
    /// Public URL the artifact is served (and cached) under.
    pub url: String,
}

type LocateFn = dyn Fn(&str) -> PurgeResult<DerivedLocator> + Send + Sync;
type ExistsFn = dyn Fn(&DerivedLocator) -> PurgeResult<bool> + Send + Sync;

/// A named derivation rule: locator builder plus existence predicate.
#[derive(Clone)]
pub struct DerivedResourceDefinition {
    name: String,
    locate: Arc<LocateFn>,
    exists: Arc<ExistsFn>,
}

impl DerivedResourceDefinition {
    pub fn new<L, E>(name: impl Into<String>, locate: L, exists: E) -> Self
    where
        L: Fn(&str) -> PurgeResult<DerivedLocator> + Send + Sync + 'static,
        E: Fn(&DerivedLocator) -> PurgeResult<bool> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            locate: Arc::new(locate),
            exists: Arc::new(exists),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn locate(&self, expression: &str) -> PurgeResult<DerivedLocator> {
        (self.locate)(expression)
    }

    pub fn exists(&self, locator: &DerivedLocator) -> PurgeResult<bool> {
        (self.exists)(locator)
    }
}

impl fmt::Debug for DerivedResourceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedResourceDefinition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered, read-only set of derivation rules.
#[derive(Debug, Clone, Default)]
pub struct DerivativeRegistry {
    definitions: Vec<DerivedResourceDefinition>,
}

impl DerivativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule; registry order is insertion order.
    pub fn with_definition(mut self, definition: DerivedResourceDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// Build image-style rules backed by local storage existence checks.
    pub fn from_config(derivatives: &DerivativeConfig, storage: &StorageConfig) -> PurgeResult<Self> {
        let storage = Arc::new(LocalStorage::new(storage.roots.clone()));
        let mut registry = Self::new();

        for name in &derivatives.styles {
            let style = ImageStyle::new(
                name.clone(),
                &derivatives.public_base_url,
                derivatives.derivative_scheme.clone(),
            )?;
            let storage = Arc::clone(&storage);
            registry = registry.with_definition(DerivedResourceDefinition::new(
                name.clone(),
                move |expression| style.locate(expression),
                move |locator| storage.exists(&locator.storage_uri),
            ));
        }

        Ok(registry)
    }

    pub fn definitions(&self) -> &[DerivedResourceDefinition] {
        &self.definitions
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(|d| d.name())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_keeps_insertion_order() {
        let locate = |name: &'static str| {
            move |expr: &str| {
                Ok(DerivedLocator {
                    rule: name.to_string(),
                    storage_uri: format!("{}/{}", name, expr),
                    url: format!("https://origin.example/{}", name),
                })
            }
        };
        let registry = DerivativeRegistry::new()
            .with_definition(DerivedResourceDefinition::new("b", locate("b"), |_| Ok(true)))
            .with_definition(DerivedResourceDefinition::new("a", locate("a"), |_| Ok(false)));

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(registry.len(), 2);

        let first = &registry.definitions()[0];
        let locator = first.locate("public://x.png").unwrap();
        assert_eq!(locator.rule, "b");
        assert!(first.exists(&locator).unwrap());
    }

    #[test]
    fn test_from_config_builds_style_rules() {
        let derivatives = DerivativeConfig {
            public_base_url: "https://origin.example/files".into(),
            styles: vec!["thumbnail".into(), "large".into()],
            ..Default::default()
        };
        let registry = DerivativeRegistry::from_config(&derivatives, &StorageConfig::default())
            .unwrap();

        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["thumbnail", "large"]
        );
        let locator = registry.definitions()[1]
            .locate("public://a/b.png")
            .unwrap();
        assert_eq!(
            locator.url,
            "https://origin.example/files/styles/large/public/a/b.png"
        );
        // No storage root for "public": the existence check errors out.
        assert!(registry.definitions()[1].exists(&locator).is_err());
    }
}
