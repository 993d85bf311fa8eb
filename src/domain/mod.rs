//! Domain layer: workflow definition, validation and the state machine.
//!
//! Everything here is synchronous and free of I/O. External collaborators are
//! described by the traits in [`ports`].

pub mod ports;
pub mod progress;
pub mod registry;
pub mod step;
pub mod submission;
pub mod validation;
pub mod workflow;
