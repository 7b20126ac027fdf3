use taskboard_core::protocol::{ErrorKind, Failure};
use taskboard_core::{CoreError, Group, ItemId};
use taskboard_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    /// Some writes of the operation committed before one failed. Nothing is
    /// rolled back; a resweep of `groups` restores density.
    #[error("partial apply on {groups:?}: {committed} writes committed, {failed} failed: {source}")]
    PartialApply {
        groups: Vec<Group>,
        committed: usize,
        failed: usize,
        source: StorageError,
    },
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(CoreError::UnknownItem(_)) | Self::ItemNotFound(_) => ErrorKind::NotFound,
            Self::Core(_) => ErrorKind::Validation,
            Self::Storage(StorageError::NotFound(_)) => ErrorKind::NotFound,
            Self::Storage(StorageError::ConstraintViolation(_)) => ErrorKind::Validation,
            Self::Storage(_) => ErrorKind::Transport,
            Self::PartialApply { .. } => ErrorKind::PartialApply,
        }
    }

    pub fn to_failure(&self) -> Failure {
        let mut failure = Failure::new(self.kind(), self.to_string());
        if let Self::PartialApply { groups, .. } = self {
            failure.repair = groups.clone();
        }
        failure
    }
}
