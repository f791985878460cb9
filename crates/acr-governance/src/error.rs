//! Errors raised by task derivation and completion.

use thiserror::Error;

use acr_core::{CanonicalizationError, SystemId};

use crate::tasks::TaskStatus;

/// Errors raised by governance task operations.
#[derive(Error, Debug)]
pub enum TaskError {
    /// The task is not derivable for the system right now.
    #[error("task {task_id} not found for system {system_id}")]
    NotFound {
        /// The system.
        system_id: SystemId,
        /// The requested task id.
        task_id: String,
    },

    /// The task cannot be completed in its current status.
    #[error("task {task_id} is {status}: {reason}")]
    InvalidState {
        /// The task.
        task_id: String,
        /// Its derived status.
        status: TaskStatus,
        /// Why completion was refused.
        reason: String,
    },

    /// Input failed validation.
    #[error("{0}")]
    Validation(String),

    /// Staleness evaluation failed while deriving document tasks.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),
}
