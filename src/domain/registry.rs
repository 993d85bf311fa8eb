use super::step::{FieldConstraint, Step, StepId};
use crate::error::{CheckoutError, Result};
use rust_decimal_macros::dec;
use std::collections::HashSet;

/// Ordered, immutable definition of the steps of a workflow.
///
/// Built once per workflow definition and shared read-only (behind an `Arc`)
/// by every workflow instance created from it.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRegistry {
    steps: Vec<Step>,
}

impl StepRegistry {
    /// Builds a registry, sorting by `order`.
    ///
    /// Fails with `InvalidRegistry` when the list is empty, an order is zero,
    /// or two steps share an `order` or an `id`.
    pub fn new(mut steps: Vec<Step>) -> Result<Self> {
        if steps.is_empty() {
            return Err(CheckoutError::InvalidRegistry(
                "a workflow needs at least one step".to_string(),
            ));
        }

        let mut orders = HashSet::new();
        let mut ids = HashSet::new();
        for step in &steps {
            if step.order == 0 {
                return Err(CheckoutError::InvalidRegistry(format!(
                    "step '{}' has order 0, orders start at 1",
                    step.id
                )));
            }
            if !orders.insert(step.order) {
                return Err(CheckoutError::InvalidRegistry(format!(
                    "duplicate step order {}",
                    step.order
                )));
            }
            if !ids.insert(step.id.clone()) {
                return Err(CheckoutError::InvalidRegistry(format!(
                    "duplicate step id '{}'",
                    step.id
                )));
            }
        }

        steps.sort_by_key(|step| step.order);
        Ok(Self { steps })
    }

    /// The standard three-step checkout: payment method, billing address, confirm & pay.
    pub fn checkout() -> Self {
        let length = |min, max| FieldConstraint::Length { min, max };
        Self {
            steps: vec![
                Step::new(1, "payment-method", "Payment method").require_with(
                    "payment_method",
                    FieldConstraint::OneOf {
                        options: vec![
                            "card".to_string(),
                            "bank_transfer".to_string(),
                            "wallet".to_string(),
                        ],
                    },
                ),
                Step::new(2, "billing-address", "Billing address")
                    .require_with("full_name", length(1, 120))
                    .require_with("address_line1", length(1, 200))
                    .require_with("city", length(1, 100))
                    .require_with("postal_code", length(3, 10))
                    .require_with("country", length(2, 2)),
                Step::new(3, "confirm-pay", "Confirm & pay").require_with(
                    "amount",
                    FieldConstraint::Decimal {
                        min: Some(dec!(0.01)),
                        max: Some(dec!(1000000)),
                    },
                ),
            ],
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step_at(&self, order: u32) -> Option<&Step> {
        self.steps.iter().find(|step| step.order == order)
    }

    pub fn get(&self, id: &StepId) -> Result<&Step> {
        self.steps
            .iter()
            .find(|step| &step.id == id)
            .ok_or_else(|| CheckoutError::UnknownStep(id.clone()))
    }

    /// Zero-based position of `id` in registry order.
    pub fn position(&self, id: &StepId) -> Result<usize> {
        self.steps
            .iter()
            .position(|step| &step.id == id)
            .ok_or_else(|| CheckoutError::UnknownStep(id.clone()))
    }

    pub fn next_of(&self, id: &StepId) -> Result<Option<&Step>> {
        let index = self.position(id)?;
        Ok(self.steps.get(index + 1))
    }

    pub fn previous_of(&self, id: &StepId) -> Result<Option<&Step>> {
        let index = self.position(id)?;
        Ok(index.checked_sub(1).and_then(|i| self.steps.get(i)))
    }

    pub fn first(&self) -> &Step {
        // Non-empty by construction.
        &self.steps[0]
    }

    pub fn last(&self) -> &Step {
        &self.steps[self.steps.len() - 1]
    }

    pub fn is_last(&self, id: &StepId) -> bool {
        &self.last().id == id
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
