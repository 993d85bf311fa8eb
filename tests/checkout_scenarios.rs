mod common;

use checkout_flow::config::RetryPolicy;
use checkout_flow::domain::step::StepId;
use checkout_flow::domain::submission::{SubmissionErrorKind, SubmissionState};
use checkout_flow::domain::validation::{FieldViolation, ReasonCode};
use checkout_flow::domain::workflow::WorkflowPhase;
use checkout_flow::error::CheckoutError;
use checkout_flow::infrastructure::simulated_gateway::{ScriptedResponse, SimulatedGateway};
use std::sync::Arc;

#[tokio::test]
async fn test_advance_gated_on_required_field() {
    let session = common::checkout_session(Arc::new(SimulatedGateway::new()), RetryPolicy::default());

    match session.advance().await {
        Err(CheckoutError::ValidationFailed(violations)) => {
            assert!(violations.contains(&FieldViolation::new("payment_method", ReasonCode::Missing)));
        }
        other => panic!("expected ValidationFailed, got {other:?}"),
    }
    assert_eq!(session.state().await.current_step_id, StepId::from("payment-method"));

    session.set_field("payment_method", "card").await.unwrap();
    let current = session.advance().await.unwrap();

    assert_eq!(current, StepId::from("billing-address"));
    assert_eq!(
        session.state().await.completed_step_ids,
        vec![StepId::from("payment-method")]
    );
}

#[tokio::test]
async fn test_transient_failures_then_success() {
    let gateway = Arc::new(SimulatedGateway::scripted(vec![
        ScriptedResponse::Transient,
        ScriptedResponse::Transient,
        ScriptedResponse::Transient,
        ScriptedResponse::Success(Some("conf_b".to_string())),
    ]));
    let session = common::session_at_confirm(gateway.clone(), RetryPolicy::immediate(5)).await;

    let confirmation_id = session.submit().await.unwrap();

    assert_eq!(confirmation_id, "conf_b");
    assert_eq!(session.phase().await, WorkflowPhase::Completed);
    assert_eq!(
        session.state().await.submission,
        SubmissionState::Succeeded {
            confirmation_id: "conf_b".to_string()
        }
    );

    let requests = gateway.requests();
    assert_eq!(requests.len(), 4);
    let attempts: Vec<u32> = requests.iter().map(|r| r.attempt).collect();
    assert_eq!(attempts, vec![1, 2, 3, 4]);
    assert!(
        requests
            .iter()
            .all(|r| r.idempotency_key == requests[0].idempotency_key)
    );
}

#[tokio::test]
async fn test_declined_payment_aborts_workflow() {
    let gateway = Arc::new(SimulatedGateway::scripted(vec![ScriptedResponse::Declined(
        "card_declined".to_string(),
    )]));
    let session = common::session_at_confirm(gateway.clone(), RetryPolicy::immediate(5)).await;

    match session.submit().await {
        Err(CheckoutError::SubmissionFailed { kind, retryable }) => {
            assert_eq!(kind, SubmissionErrorKind::Rejected("card_declined".to_string()));
            assert!(!retryable);
        }
        other => panic!("expected SubmissionFailed, got {other:?}"),
    }
    assert_eq!(session.phase().await, WorkflowPhase::Aborted);
    assert_eq!(gateway.requests().len(), 1);

    let advance = session.advance().await.unwrap_err();
    assert!(advance.is_terminal());
    assert!(matches!(advance, CheckoutError::WorkflowAborted));

    let resubmit = session.submit().await.unwrap_err();
    assert!(resubmit.is_terminal());
    assert_eq!(gateway.requests().len(), 1);
}

#[tokio::test]
async fn test_retry_after_retryable_failure_reuses_key() {
    let gateway = Arc::new(SimulatedGateway::scripted(vec![
        ScriptedResponse::Transient,
        ScriptedResponse::Transient,
        ScriptedResponse::Success(None),
    ]));
    let session = common::session_at_confirm(gateway.clone(), RetryPolicy::immediate(2)).await;

    let first = session.submit().await.unwrap_err();
    assert!(first.is_retryable());
    assert_eq!(session.phase().await, WorkflowPhase::Collecting);
    assert_eq!(session.state().await.current_step_id, StepId::from("confirm-pay"));

    // The user may correct input before retrying.
    session.set_field("amount", "40.00").await.unwrap();
    session.submit().await.unwrap();

    let requests = gateway.requests();
    assert_eq!(requests.len(), 3);
    assert!(
        requests
            .iter()
            .all(|r| r.idempotency_key == requests[0].idempotency_key)
    );
    // Attempt numbering restarts on the explicit retry.
    assert_eq!(requests[2].attempt, 1);
    assert_eq!(requests[2].payload.fields["amount"], "40.00");
}

#[tokio::test]
async fn test_invalid_confirmation_blocks_submit() {
    let gateway = Arc::new(SimulatedGateway::new());
    let session = common::session_at_confirm(gateway.clone(), RetryPolicy::immediate(2)).await;
    session.set_field("amount", "0").await.unwrap();

    match session.submit().await {
        Err(CheckoutError::ValidationFailed(violations)) => {
            assert!(violations.contains(&FieldViolation::new("amount", ReasonCode::OutOfRange)));
        }
        other => panic!("expected ValidationFailed, got {other:?}"),
    }
    assert!(gateway.requests().is_empty());
    assert_eq!(session.state().await.submission, SubmissionState::NotStarted);
}
