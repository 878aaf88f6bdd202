//! Error taxonomy for the top-level pipeline state machine.

use thiserror::Error;

use crate::{acquire::AcquireError, device::DeviceError, fota::FotaError, fus::FusError, repo::RepoError};

/// Errors surfaced by a single pipeline run. The orchestrator's own polling
/// loop never stops because of one of these; it logs, reports, and returns
/// to `WAITING_DEVICE`.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("FOTA error: {0}")]
    Fota(#[from] FotaError),

    #[error("FUS error: {0}")]
    Fus(#[from] FusError),

    #[error("acquisition error: {0}")]
    Acquire(#[from] AcquireError),

    #[error("repository error: {0}")]
    Repo(#[from] RepoError),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
