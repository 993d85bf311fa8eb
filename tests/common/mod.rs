#![allow(dead_code)]

use checkout_flow::application::coordinator::SubmissionCoordinator;
use checkout_flow::application::session::CheckoutSession;
use checkout_flow::config::RetryPolicy;
use checkout_flow::domain::registry::StepRegistry;
use checkout_flow::domain::workflow::Workflow;
use checkout_flow::infrastructure::simulated_gateway::SimulatedGateway;
use std::sync::Arc;

pub const BILLING: [(&str, &str); 5] = [
    ("full_name", "Ada Lovelace"),
    ("address_line1", "12 St James Square"),
    ("city", "London"),
    ("postal_code", "SW1Y 4JH"),
    ("country", "GB"),
];

pub fn checkout_session(gateway: Arc<SimulatedGateway>, policy: RetryPolicy) -> CheckoutSession {
    let workflow = Workflow::start(Arc::new(StepRegistry::checkout()));
    let coordinator = SubmissionCoordinator::new(gateway, policy);
    CheckoutSession::new(workflow, Arc::new(coordinator))
}

/// Walks a fresh session to `confirm-pay` with valid data on every step.
pub async fn fill_to_confirm(session: &CheckoutSession) {
    session.set_field("payment_method", "card").await.unwrap();
    session.advance().await.unwrap();
    for (field, value) in BILLING {
        session.set_field(field, value).await.unwrap();
    }
    session.advance().await.unwrap();
    session.set_field("amount", "42.50").await.unwrap();
}

pub async fn session_at_confirm(gateway: Arc<SimulatedGateway>, policy: RetryPolicy) -> CheckoutSession {
    let session = checkout_session(gateway, policy);
    fill_to_confirm(&session).await;
    session
}

pub fn write_config(contents: &str) -> tempfile::NamedTempFile {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}
