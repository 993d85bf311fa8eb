use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identifier of a step in a workflow definition (e.g. `billing-address`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for StepId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Shape rule applied to a required field once it is present.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldConstraint {
    /// Any non-blank value.
    #[default]
    Present,
    /// Value must be one of the listed options.
    OneOf { options: Vec<String> },
    /// ASCII digits only, with a length in `min_len..=max_len`.
    Digits { min_len: usize, max_len: usize },
    /// Character count in `min..=max`.
    Length { min: usize, max: usize },
    /// Decimal number, optionally bounded (inclusive).
    Decimal {
        min: Option<Decimal>,
        max: Option<Decimal>,
    },
}

/// A single step of a workflow definition.
///
/// Steps are immutable once they are part of a [`StepRegistry`](super::registry::StepRegistry).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// 1-based position in the workflow.
    pub order: u32,
    pub id: StepId,
    pub title: String,
    #[serde(default)]
    pub required_fields: BTreeSet<String>,
    /// Constraints keyed by required field id. Fields without an entry only need to be present.
    #[serde(default)]
    pub constraints: BTreeMap<String, FieldConstraint>,
}

impl Step {
    pub fn new(order: u32, id: impl Into<StepId>, title: impl Into<String>) -> Self {
        Self {
            order,
            id: id.into(),
            title: title.into(),
            required_fields: BTreeSet::new(),
            constraints: BTreeMap::new(),
        }
    }

    /// Marks `field` as required with no shape constraint.
    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.required_fields.insert(field.into());
        self
    }

    /// Marks `field` as required and attaches `constraint` to it.
    pub fn require_with(mut self, field: impl Into<String>, constraint: FieldConstraint) -> Self {
        let field = field.into();
        self.required_fields.insert(field.clone());
        self.constraints.insert(field, constraint);
        self
    }

    pub fn constraint_for(&self, field: &str) -> &FieldConstraint {
        static PRESENT: FieldConstraint = FieldConstraint::Present;
        self.constraints.get(field).unwrap_or(&PRESENT)
    }
}
