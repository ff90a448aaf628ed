//! Invalidation requests and their lifecycle.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PurgeError, PurgeResult};

/// Expression type label exposed through the `[invalidation:type]` token.
pub const URI_INVALIDATION_TYPE: &str = "uri";

/// Caller-assigned invalidation identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvalidationId(pub u64);

impl fmt::Display for InvalidationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of an invalidation.
///
/// Transitions only move forward: `New -> Processing -> {Succeeded, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvalidationState {
    New,
    Processing,
    Succeeded,
    Failed,
}

impl InvalidationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal forward step.
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::New, Self::Processing) => true,
            (Self::New | Self::Processing, Self::Succeeded | Self::Failed) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Processing => "PROCESSING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for InvalidationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request to purge every cached representation of a canonical resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invalidation {
    id: InvalidationId,
    expression: String,
    state: InvalidationState,
}

impl Invalidation {
    /// Create a new invalidation for a `scheme://target` expression.
    pub fn new(id: u64, expression: impl Into<String>) -> PurgeResult<Self> {
        let expression = expression.into();
        validate_expression(&expression)?;
        Ok(Self {
            id: InvalidationId(id),
            expression,
            state: InvalidationState::New,
        })
    }

    pub fn id(&self) -> InvalidationId {
        self.id
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn state(&self) -> InvalidationState {
        self.state
    }

    /// Apply a state change; backward or repeated terminal transitions are refused.
    pub(crate) fn set_state(&mut self, next: InvalidationState) -> bool {
        if self.state == next {
            return true;
        }
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        true
    }
}

/// Split a `scheme://target` expression into its scheme and target.
pub fn split_expression(expression: &str) -> Option<(&str, &str)> {
    let (scheme, target) = expression.split_once("://")?;
    if scheme.is_empty()
        || !scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.' | '_'))
    {
        return None;
    }
    Some((scheme, target))
}

fn validate_expression(expression: &str) -> PurgeResult<()> {
    let invalid = |reason: &str| PurgeError::InvalidExpression {
        expression: expression.to_string(),
        reason: reason.to_string(),
    };

    if expression.trim().is_empty() {
        return Err(invalid("expression can not be empty"));
    }
    match split_expression(expression) {
        Some((_, target)) if !target.is_empty() => Ok(()),
        Some(_) => Err(invalid("missing target after scheme")),
        None => Err(invalid("expected scheme://target")),
    }
}
