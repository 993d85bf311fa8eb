//! Application layer orchestrating checkouts.
//!
//! `CheckoutEngine` starts and resumes sessions, `CheckoutSession` applies UI
//! events to one workflow instance, and `SubmissionCoordinator` runs the final
//! payment on its own tokio task with retries and single-flight protection.

pub mod coordinator;
pub mod engine;
pub mod session;
