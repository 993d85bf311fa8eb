use crate::domain::ports::PaymentGateway;
use crate::domain::submission::{ChargeRequest, GatewayResponse, IdempotencyKey};
use crate::error::CheckoutError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;

/// One scripted answer of the simulated payment collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedResponse {
    /// Success, with an explicit confirmation id or a generated one.
    Success(Option<String>),
    Transient,
    Declined(String),
}

impl FromStr for ScriptedResponse {
    type Err = CheckoutError;

    /// Parses `success`, `success:<id>`, `transient`, `declined` or `declined:<reason>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, detail) = match s.trim().split_once(':') {
            Some((kind, detail)) => (kind, Some(detail.trim().to_string())),
            None => (s.trim(), None),
        };
        match kind {
            "success" => Ok(ScriptedResponse::Success(detail)),
            "transient" => Ok(ScriptedResponse::Transient),
            "declined" => Ok(ScriptedResponse::Declined(
                detail.unwrap_or_else(|| "card_declined".to_string()),
            )),
            other => Err(CheckoutError::Config(format!(
                "unknown gateway response '{}'",
                other
            ))),
        }
    }
}

/// In-process stand-in for the payment collaborator.
///
/// Answers from a script (then succeeds once the script runs out), records
/// every request, and replays the confirmation id for an idempotency key that
/// already succeeded. An optional hold keeps each call suspended until
/// [`release`](Self::release) hands out a permit.
#[derive(Debug, Default)]
pub struct SimulatedGateway {
    script: Mutex<VecDeque<ScriptedResponse>>,
    confirmations: Mutex<HashMap<IdempotencyKey, String>>,
    requests: Mutex<Vec<ChargeRequest>>,
    hold: Option<Semaphore>,
    sequence: AtomicU32,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    /// Suspends every call until a permit is released.
    pub fn held(mut self) -> Self {
        self.hold = Some(Semaphore::new(0));
        self
    }

    pub fn release(&self, calls: usize) {
        if let Some(hold) = &self.hold {
            hold.add_permits(calls);
        }
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<ChargeRequest> {
        lock(&self.requests).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, request: ChargeRequest) -> GatewayResponse {
        lock(&self.requests).push(request.clone());

        if let Some(hold) = &self.hold
            && let Ok(permit) = hold.acquire().await
        {
            permit.forget();
        }

        if let Some(confirmation_id) = lock(&self.confirmations).get(&request.idempotency_key) {
            return GatewayResponse::Success {
                confirmation_id: confirmation_id.clone(),
            };
        }

        let next = lock(&self.script)
            .pop_front()
            .unwrap_or(ScriptedResponse::Success(None));
        match next {
            ScriptedResponse::Success(explicit) => {
                let confirmation_id = explicit.unwrap_or_else(|| {
                    format!("conf_{:04}", self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
                });
                lock(&self.confirmations)
                    .insert(request.idempotency_key, confirmation_id.clone());
                GatewayResponse::Success { confirmation_id }
            }
            ScriptedResponse::Transient => GatewayResponse::TransientError,
            ScriptedResponse::Declined(reason_code) => {
                GatewayResponse::PermanentError { reason_code }
            }
        }
    }
}
