use crate::application::session::CheckoutSession;
use crate::domain::progress::ProgressView;
use crate::domain::workflow::WorkflowRecord;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

/// Final view of a checkout: the durable record plus its progress projection.
#[derive(Debug, Serialize)]
pub struct CheckoutSummary {
    pub record: WorkflowRecord,
    pub progress: ProgressView,
}

impl CheckoutSummary {
    pub async fn of(session: &CheckoutSession) -> Self {
        Self {
            record: session.record().await,
            progress: session.progress().await,
        }
    }
}

/// Writes checkout summaries as pretty-printed JSON.
pub struct SummaryWriter<W: Write> {
    writer: W,
}

impl<W: Write> SummaryWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_summary(&mut self, summary: &CheckoutSummary) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.writer, summary)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}
