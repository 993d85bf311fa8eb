//! Per-step validation gate.
//!
//! Validation is pure: the same step and field values always produce the same
//! result. Reason codes are domain-level so callers can localize messages.

use super::step::{FieldConstraint, Step};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Field values collected by the workflow, keyed by field id.
pub type FieldValues = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    Missing,
    Malformed,
    OutOfRange,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ReasonCode::Missing => "missing",
            ReasonCode::Malformed => "malformed",
            ReasonCode::OutOfRange => "out_of_range",
        };
        f.write_str(code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field_id: String,
    pub reason: ReasonCode,
}

impl FieldViolation {
    pub fn new(field_id: impl Into<String>, reason: ReasonCode) -> Self {
        Self {
            field_id: field_id.into(),
            reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(BTreeSet<FieldViolation>),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn violations(&self) -> Option<&BTreeSet<FieldViolation>> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid(violations) => Some(violations),
        }
    }
}

/// Checks every required field of `step` against `values`.
pub fn validate(step: &Step, values: &FieldValues) -> ValidationResult {
    let violations: BTreeSet<FieldViolation> = step
        .required_fields
        .iter()
        .filter_map(|field| {
            let reason = match values.get(field).map(|v| v.trim()) {
                None | Some("") => Some(ReasonCode::Missing),
                Some(value) => check(step.constraint_for(field), value),
            };
            reason.map(|reason| FieldViolation::new(field.clone(), reason))
        })
        .collect();

    if violations.is_empty() {
        ValidationResult::Valid
    } else {
        ValidationResult::Invalid(violations)
    }
}

fn check(constraint: &FieldConstraint, value: &str) -> Option<ReasonCode> {
    match constraint {
        FieldConstraint::Present => None,
        FieldConstraint::OneOf { options } => {
            (!options.iter().any(|o| o == value)).then_some(ReasonCode::Malformed)
        }
        FieldConstraint::Digits { min_len, max_len } => {
            let well_formed = value.chars().all(|c| c.is_ascii_digit())
                && (*min_len..=*max_len).contains(&value.len());
            (!well_formed).then_some(ReasonCode::Malformed)
        }
        FieldConstraint::Length { min, max } => {
            let len = value.chars().count();
            (!(*min..=*max).contains(&len)).then_some(ReasonCode::Malformed)
        }
        FieldConstraint::Decimal { min, max } => match Decimal::from_str(value) {
            Err(_) => Some(ReasonCode::Malformed),
            Ok(number) => {
                let below = min.is_some_and(|min| number < min);
                let above = max.is_some_and(|max| number > max);
                (below || above).then_some(ReasonCode::OutOfRange)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registry::StepRegistry;
    use rust_decimal_macros::dec;

    fn values(pairs: &[(&str, &str)]) -> FieldValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_step_without_required_fields_is_always_valid() {
        let step = Step::new(1, "review", "Review");
        assert!(validate(&step, &FieldValues::new()).is_valid());
        assert!(validate(&step, &values(&[("anything", "")])).is_valid());
    }

    #[test]
    fn test_missing_and_blank_fields() {
        let step = Step::new(1, "contact", "Contact")
            .require("email")
            .require("name");

        let result = validate(&step, &values(&[("name", "   ")]));
        let violations = result.violations().unwrap();
        assert_eq!(violations.len(), 2);
        assert!(violations.contains(&FieldViolation::new("email", ReasonCode::Missing)));
        assert!(violations.contains(&FieldViolation::new("name", ReasonCode::Missing)));
    }

    #[test]
    fn test_one_of() {
        let registry = StepRegistry::checkout();
        let step = registry.first();

        assert!(validate(step, &values(&[("payment_method", "card")])).is_valid());
        assert_eq!(
            validate(step, &values(&[("payment_method", "cash")])),
            ValidationResult::Invalid(BTreeSet::from([FieldViolation::new(
                "payment_method",
                ReasonCode::Malformed
            )]))
        );
    }

    #[test]
    fn test_digits() {
        let step = Step::new(1, "card", "Card").require_with(
            "cvc",
            FieldConstraint::Digits {
                min_len: 3,
                max_len: 4,
            },
        );

        assert!(validate(&step, &values(&[("cvc", "123")])).is_valid());
        assert!(!validate(&step, &values(&[("cvc", "12")])).is_valid());
        assert!(!validate(&step, &values(&[("cvc", "12a")])).is_valid());
    }

    #[test]
    fn test_decimal_range() {
        let step = Step::new(1, "pay", "Pay").require_with(
            "amount",
            FieldConstraint::Decimal {
                min: Some(dec!(0.01)),
                max: Some(dec!(100)),
            },
        );

        assert!(validate(&step, &values(&[("amount", "99.99")])).is_valid());
        assert_eq!(
            validate(&step, &values(&[("amount", "0")])),
            ValidationResult::Invalid(BTreeSet::from([FieldViolation::new(
                "amount",
                ReasonCode::OutOfRange
            )]))
        );
        assert_eq!(
            validate(&step, &values(&[("amount", "ten")])),
            ValidationResult::Invalid(BTreeSet::from([FieldViolation::new(
                "amount",
                ReasonCode::Malformed
            )]))
        );
    }

    #[test]
    fn test_validation_is_deterministic() {
        let registry = StepRegistry::checkout();
        let step = &registry.steps()[1];
        let input = values(&[("full_name", "Ada"), ("country", "GBR")]);

        assert_eq!(validate(step, &input), validate(step, &input));
    }
}
