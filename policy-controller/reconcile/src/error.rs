use netpol_controller_core::{BackendError, InvalidPort};
use netpol_controller_k8s_api::labels;
use netpol_controller_k8s_index::StoreError;

/// Fails a reconciliation pass. The key is requeued with backoff whatever the cause.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("backend: {0}")]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid selector: {0}")]
    Selector(#[from] labels::Error),

    #[error("invalid port: {0}")]
    Port(#[from] InvalidPort),
}

impl Error {
    /// Indicates whether the failure may clear on its own.
    ///
    /// Invalid selectors and ports keep failing until the policy is edited.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Store(_))
    }
}
