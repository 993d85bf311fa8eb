//! Outer adapters used by the CLI: scripted UI events in, checkout summaries out.

pub mod csv;
pub mod json;
