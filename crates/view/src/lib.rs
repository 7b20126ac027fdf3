//! Client-side optimistic view of the board.

pub mod controller;
pub mod error;
pub mod session;

pub use controller::{
    DropEvent, Notice, PendingMove, RefreshOutcome, Resolution, Ticket, ViewController,
};
pub use error::ViewError;
pub use session::{Session, Transport};
