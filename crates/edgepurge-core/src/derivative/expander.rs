//! Best-effort expansion of a canonical resource into derived locators.

use tracing::{debug, warn};

use super::{DerivativeRegistry, DerivedLocator};

/// Expands canonical expressions against a [`DerivativeRegistry`].
#[derive(Debug, Clone)]
pub struct Expander {
    registry: DerivativeRegistry,
}

impl Expander {
    pub fn new(registry: DerivativeRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &DerivativeRegistry {
        &self.registry
    }

    /// Derived locators that currently exist, in registry order.
    ///
    /// A rule whose locator or existence check fails is skipped; the
    /// remaining rules are still evaluated.
    pub fn expand(&self, expression: &str) -> Vec<DerivedLocator> {
        let mut found = Vec::new();

        for definition in self.registry.definitions() {
            let locator = match definition.locate(expression) {
                Ok(locator) => locator,
                Err(e) => {
                    warn!(rule = definition.name(), expression, error = %e, "skipping derived resource");
                    continue;
                }
            };

            match definition.exists(&locator) {
                Ok(true) => found.push(locator),
                Ok(false) => {
                    debug!(rule = definition.name(), uri = %locator.storage_uri, "derived resource not generated");
                }
                Err(e) => {
                    warn!(rule = definition.name(), uri = %locator.storage_uri, error = %e, "skipping derived resource");
                }
            }
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivative::DerivedResourceDefinition;
    use crate::error::PurgeError;

    fn rule(name: &'static str, exists: Result<bool, ()>) -> DerivedResourceDefinition {
        DerivedResourceDefinition::new(
            name,
            move |expr: &str| {
                Ok(DerivedLocator {
                    rule: name.to_string(),
                    storage_uri: format!("{}:{}", name, expr),
                    url: format!("https://origin.example/{}/x.png", name),
                })
            },
            move |_| {
                exists.map_err(|_| PurgeError::Expansion {
                    rule: name.to_string(),
                    message: "storage unreachable".into(),
                })
            },
        )
    }

    #[test]
    fn test_expand_filters_by_existence_in_order() {
        let registry = DerivativeRegistry::new()
            .with_definition(rule("c", Ok(true)))
            .with_definition(rule("a", Ok(false)))
            .with_definition(rule("b", Ok(true)));
        let expander = Expander::new(registry);

        let rules: Vec<_> = expander
            .expand("public://x.png")
            .into_iter()
            .map(|l| l.rule)
            .collect();
        assert_eq!(rules, vec!["c", "b"]);
    }

    #[test]
    fn test_existence_errors_skip_only_that_rule() {
        let registry = DerivativeRegistry::new()
            .with_definition(rule("broken", Err(())))
            .with_definition(rule("ok", Ok(true)));
        let expander = Expander::new(registry);

        let found = expander.expand("public://x.png");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].rule, "ok");
    }

    #[test]
    fn test_locate_errors_skip_only_that_rule() {
        let failing = DerivedResourceDefinition::new(
            "bad",
            |_: &str| {
                Err(PurgeError::Expansion {
                    rule: "bad".into(),
                    message: "cannot locate".into(),
                })
            },
            |_| Ok(true),
        );
        let registry = DerivativeRegistry::new()
            .with_definition(failing)
            .with_definition(rule("ok", Ok(true)));

        assert_eq!(Expander::new(registry).expand("public://x.png").len(), 1);
    }

    #[test]
    fn test_empty_registry_expands_to_nothing() {
        let expander = Expander::new(DerivativeRegistry::new());
        assert!(expander.expand("public://x.png").is_empty());
    }
}
