use super::registry::StepRegistry;
use super::step::StepId;
use super::workflow::{WorkflowPhase, WorkflowState};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Current,
    Upcoming,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepIndicator {
    pub order: u32,
    pub id: StepId,
    pub title: String,
    pub status: StepStatus,
}

/// Read-only projection of a workflow for a step indicator.
///
/// Derived from the registry and the workflow state on every call; it never
/// holds progress of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressView {
    pub phase: WorkflowPhase,
    pub steps: Vec<StepIndicator>,
}

impl ProgressView {
    pub fn project(registry: &StepRegistry, state: &WorkflowState, phase: WorkflowPhase) -> Self {
        let steps = registry
            .steps()
            .iter()
            .map(|step| {
                // The current step wins over completion while the user is on it.
                let status = if step.id == state.current_step_id && !phase.is_terminal() {
                    StepStatus::Current
                } else if state.completed_step_ids.contains(&step.id) {
                    StepStatus::Completed
                } else {
                    StepStatus::Upcoming
                };
                StepIndicator {
                    order: step.order,
                    id: step.id.clone(),
                    title: step.title.clone(),
                    status,
                }
            })
            .collect();

        Self { phase, steps }
    }

    pub fn current(&self) -> Option<&StepIndicator> {
        self.steps.iter().find(|s| s.status == StepStatus::Current)
    }
}
