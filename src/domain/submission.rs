use super::validation::FieldValues;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Key the payment collaborator uses to deduplicate retries of one logical submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Generates a fresh key. Called once per workflow instance.
    pub fn generate() -> Self {
        Self(format!("chk_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdempotencyKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SubmissionErrorKind {
    /// Every automatic attempt hit a transient failure.
    TransientExhausted,
    /// The payment collaborator refused the payment (e.g. `card_declined`).
    Rejected(String),
    /// The in-flight attempt was lost before its outcome was observed.
    Interrupted,
}

impl fmt::Display for SubmissionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionErrorKind::TransientExhausted => f.write_str("transient_exhausted"),
            SubmissionErrorKind::Rejected(reason) => write!(f, "rejected: {}", reason),
            SubmissionErrorKind::Interrupted => f.write_str("interrupted"),
        }
    }
}

/// Submission lifecycle stored on the workflow state.
///
/// `Succeeded` and non-retryable `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionState {
    #[default]
    NotStarted,
    InFlight {
        idempotency_key: IdempotencyKey,
        attempt: u32,
    },
    Succeeded {
        confirmation_id: String,
    },
    Failed {
        error: SubmissionErrorKind,
        retryable: bool,
    },
}

impl SubmissionState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, SubmissionState::InFlight { .. })
    }

    /// True when a (re)submission may start from this state.
    pub fn accepts_submission(&self) -> bool {
        matches!(
            self,
            SubmissionState::NotStarted
                | SubmissionState::Failed {
                    retryable: true,
                    ..
                }
        )
    }
}

/// Terminal result of one logical submission, after automatic retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Succeeded {
        confirmation_id: String,
        attempts: u32,
    },
    Failed {
        error: SubmissionErrorKind,
        retryable: bool,
        attempts: u32,
    },
}

impl SubmissionOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            SubmissionOutcome::Succeeded { attempts, .. }
            | SubmissionOutcome::Failed { attempts, .. } => *attempts,
        }
    }
}

/// What the submission coordinator hands to the payment collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentPayload {
    pub workflow_id: Uuid,
    pub fields: FieldValues,
}

/// One network attempt against the payment collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub idempotency_key: IdempotencyKey,
    pub attempt: u32,
    pub payload: PaymentPayload,
}

/// The payment collaborator's tri-way answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayResponse {
    Success { confirmation_id: String },
    TransientError,
    PermanentError { reason_code: String },
}

/// A submission ready to be handed to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRequest {
    pub idempotency_key: IdempotencyKey,
    pub payload: PaymentPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_are_unique() {
        let a = IdempotencyKey::generate();
        let b = IdempotencyKey::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("chk_"));
    }

    #[test]
    fn test_accepts_submission() {
        assert!(SubmissionState::NotStarted.accepts_submission());
        assert!(
            SubmissionState::Failed {
                error: SubmissionErrorKind::TransientExhausted,
                retryable: true,
            }
            .accepts_submission()
        );
        assert!(
            !SubmissionState::Failed {
                error: SubmissionErrorKind::Rejected("card_declined".to_string()),
                retryable: false,
            }
            .accepts_submission()
        );
        assert!(
            !SubmissionState::InFlight {
                idempotency_key: IdempotencyKey::from("chk_1"),
                attempt: 1,
            }
            .accepts_submission()
        );
        assert!(
            !SubmissionState::Succeeded {
                confirmation_id: "conf_1".to_string()
            }
            .accepts_submission()
        );
    }

    #[test]
    fn test_submission_state_json_shape() {
        let state = SubmissionState::InFlight {
            idempotency_key: IdempotencyKey::from("chk_1"),
            attempt: 2,
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"], "in_flight");
        assert_eq!(json["idempotency_key"], "chk_1");
        assert_eq!(json["attempt"], 2);
    }
}
