use crate::config::RetryPolicy;
use crate::domain::ports::PaymentGatewayHandle;
use crate::domain::submission::{
    ChargeRequest, GatewayResponse, IdempotencyKey, SubmissionErrorKind, SubmissionOutcome,
    SubmissionRequest,
};
use crate::error::{CheckoutError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{Instrument, error, info, info_span, warn};

/// Progress of one logical submission, as published by its driver task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionProgress {
    Attempting(u32),
    Finished(SubmissionOutcome),
}

/// Handle on a running (or finished) submission.
///
/// Dropping a ticket does not cancel the submission; another ticket for the
/// same key can be obtained with [`SubmissionCoordinator::attach`].
#[derive(Debug, Clone)]
pub struct SubmissionTicket {
    idempotency_key: IdempotencyKey,
    progress: watch::Receiver<SubmissionProgress>,
}

impl SubmissionTicket {
    pub fn idempotency_key(&self) -> &IdempotencyKey {
        &self.idempotency_key
    }

    pub fn current(&self) -> SubmissionProgress {
        self.progress.borrow().clone()
    }

    /// Waits for the next progress update. Returns `false` when the driver
    /// task is gone without publishing anything further.
    pub async fn changed(&mut self) -> bool {
        self.progress.changed().await.is_ok()
    }

    /// Waits for the terminal outcome.
    pub async fn outcome(mut self) -> SubmissionOutcome {
        loop {
            if let SubmissionProgress::Finished(outcome) = self.current() {
                return outcome;
            }
            if !self.changed().await {
                return SubmissionOutcome::Failed {
                    error: SubmissionErrorKind::Interrupted,
                    retryable: true,
                    attempts: 0,
                };
            }
        }
    }
}

/// Drives final submissions against the payment collaborator.
///
/// Single-flight per idempotency key: while a submission for a key is still
/// attempting, a second `submit` for that key is refused without touching
/// the network. Each submission runs on its own task, so it resolves even if
/// every caller goes away.
pub struct SubmissionCoordinator {
    gateway: PaymentGatewayHandle,
    policy: RetryPolicy,
    submissions: Arc<Mutex<HashMap<IdempotencyKey, watch::Receiver<SubmissionProgress>>>>,
}

impl SubmissionCoordinator {
    pub fn new(gateway: PaymentGatewayHandle, policy: RetryPolicy) -> Self {
        Self {
            gateway,
            policy,
            submissions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Starts a logical submission and returns a ticket to follow it.
    pub fn submit(&self, request: SubmissionRequest) -> Result<SubmissionTicket> {
        let key = request.idempotency_key.clone();
        let mut submissions = self
            .submissions
            .lock()
            .map_err(|_| CheckoutError::Storage("submission registry poisoned".to_string()))?;

        if submissions.get(&key).is_some_and(is_running) {
            return Err(CheckoutError::SubmissionAlreadyInProgress);
        }

        let (tx, rx) = watch::channel(SubmissionProgress::Attempting(1));
        submissions.insert(key.clone(), rx.clone());
        drop(submissions);

        let span = info_span!(
            "submission",
            workflow_id = %request.payload.workflow_id,
            idempotency_key = %key
        );
        let gateway = self.gateway.clone();
        let policy = self.policy.clone();
        tokio::spawn(
            async move {
                let outcome = drive(gateway, policy, request, &tx).await;
                tx.send_replace(SubmissionProgress::Finished(outcome));
            }
            .instrument(span),
        );

        Ok(SubmissionTicket {
            idempotency_key: key,
            progress: rx,
        })
    }

    /// Re-attaches to a submission this coordinator started, in flight or finished.
    pub fn attach(&self, key: &IdempotencyKey) -> Option<SubmissionTicket> {
        let submissions = self.submissions.lock().ok()?;
        submissions.get(key).map(|rx| SubmissionTicket {
            idempotency_key: key.clone(),
            progress: rx.clone(),
        })
    }

    /// Drops the entry for a key whose outcome has been applied.
    ///
    /// Entries still attempting are kept so a remounted caller can attach.
    pub fn forget(&self, key: &IdempotencyKey) {
        let Ok(mut submissions) = self.submissions.lock() else {
            return;
        };
        if submissions.get(key).is_some_and(|rx| !is_running(rx)) {
            submissions.remove(key);
        }
    }

    pub fn tracked(&self) -> usize {
        self.submissions.lock().map_or(0, |submissions| submissions.len())
    }
}

/// Attempting, with a driver task still alive to finish it.
fn is_running(progress: &watch::Receiver<SubmissionProgress>) -> bool {
    let attempting = matches!(*progress.borrow(), SubmissionProgress::Attempting(_));
    attempting && progress.has_changed().is_ok()
}

async fn drive(
    gateway: PaymentGatewayHandle,
    policy: RetryPolicy,
    request: SubmissionRequest,
    progress: &watch::Sender<SubmissionProgress>,
) -> SubmissionOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    info!(max_attempts, "submission started");

    loop {
        progress.send_replace(SubmissionProgress::Attempting(attempt));
        let response = gateway
            .charge(ChargeRequest {
                idempotency_key: request.idempotency_key.clone(),
                attempt,
                payload: request.payload.clone(),
            })
            .await;

        match response {
            GatewayResponse::Success { confirmation_id } => {
                info!(attempt, %confirmation_id, "submission succeeded");
                return SubmissionOutcome::Succeeded {
                    confirmation_id,
                    attempts: attempt,
                };
            }
            GatewayResponse::PermanentError { reason_code } => {
                error!(attempt, %reason_code, "submission rejected");
                return SubmissionOutcome::Failed {
                    error: SubmissionErrorKind::Rejected(reason_code),
                    retryable: false,
                    attempts: attempt,
                };
            }
            GatewayResponse::TransientError if attempt >= max_attempts => {
                warn!(attempt, "transient failure, attempts exhausted");
                return SubmissionOutcome::Failed {
                    error: SubmissionErrorKind::TransientExhausted,
                    retryable: true,
                    attempts: attempt,
                };
            }
            GatewayResponse::TransientError => {
                let delay = policy.delay_for(attempt);
                warn!(attempt, ?delay, "transient failure, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
