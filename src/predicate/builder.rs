//! Mutable accumulator for conditions.

use super::Condition;

/// Accumulates conditions with `and`/`or`
///
/// A builder that never received a present condition finishes as the absent
/// condition, so it can be handed to `filter` unconditionally.
///
/// ```
/// use quarry::predicate::{Condition, ConditionBuilder};
///
/// let mut builder = ConditionBuilder::new();
/// builder.and(Condition::absent());
/// assert!(!builder.has_value());
/// assert!(builder.finish().is_absent());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConditionBuilder {
    acc: Condition,
}

impl ConditionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an initial condition
    pub fn with(initial: Condition) -> Self {
        Self { acc: initial }
    }

    pub fn and(&mut self, condition: Condition) -> &mut Self {
        self.acc = std::mem::take(&mut self.acc).and(condition);
        self
    }

    pub fn or(&mut self, condition: Condition) -> &mut Self {
        self.acc = std::mem::take(&mut self.acc).or(condition);
        self
    }

    /// `and` the condition produced from `value`, when there is one
    pub fn and_if<T, F>(&mut self, value: Option<T>, f: F) -> &mut Self
    where
        F: FnOnce(T) -> Condition,
    {
        if let Some(value) = value {
            self.and(f(value));
        }
        self
    }

    /// Negate everything accumulated so far
    pub fn negate(&mut self) -> &mut Self {
        self.acc = std::mem::take(&mut self.acc).not();
        self
    }

    pub fn has_value(&self) -> bool {
        self.acc.is_present()
    }

    /// Snapshot of the accumulated condition
    pub fn finish(&self) -> Condition {
        self.acc.clone()
    }
}

impl From<ConditionBuilder> for Condition {
    fn from(builder: ConditionBuilder) -> Self {
        builder.acc
    }
}
