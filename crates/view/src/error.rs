use taskboard_core::CoreError;
use taskboard_core::ItemId;
use taskboard_core::protocol::Failure;
use thiserror::Error;

use crate::controller::Ticket;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("unknown ticket: {0}")]
    UnknownTicket(Ticket),

    #[error("item not on board: {0}")]
    UnknownItem(ItemId),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("request rejected: {0}")]
    Rejected(#[from] Failure),
}
