use crate::application::engine::CheckoutEngine;
use crate::application::session::CheckoutSession;
use crate::error::{CheckoutError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    Set,
    Advance,
    Back,
    Submit,
}

/// A UI event as recorded in a script: `action, field, value`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CheckoutEvent {
    pub action: EventAction,
    pub field: Option<String>,
    pub value: Option<String>,
}

impl CheckoutEvent {
    /// Feeds the event to a session, the way a form or button handler would.
    /// Submissions go through the engine so the in-flight record is stored
    /// before the charge.
    pub async fn apply_to(&self, engine: &CheckoutEngine, session: &CheckoutSession) -> Result<()> {
        match self.action {
            EventAction::Set => {
                let field = self.field.as_deref().ok_or_else(|| {
                    CheckoutError::Config("'set' events need a field".to_string())
                })?;
                session
                    .set_field(field, self.value.clone().unwrap_or_default())
                    .await
            }
            EventAction::Advance => session.advance().await.map(|_| ()),
            EventAction::Back => session.go_back().await.map(|_| ()),
            EventAction::Submit => engine.submit(session).await.map(|_| ()),
        }
    }
}

/// Reads checkout events from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<CheckoutEvent>`.
/// It handles whitespace trimming and flexible record lengths automatically.
pub struct EventReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> EventReader<R> {
    /// Creates a new `EventReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes events.
    pub fn events(self) -> impl Iterator<Item = Result<CheckoutEvent>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(CheckoutError::from))
    }
}
