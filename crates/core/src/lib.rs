pub mod board;
pub mod config;
pub mod error;
pub mod group;
pub mod ids;
pub mod item;
pub mod ordering;
pub mod protocol;
pub mod time;

pub use board::{Board, BoardStats, DensityViolation};
pub use error::CoreError;
pub use group::Group;
pub use ids::*;
pub use item::{Item, ItemEdit, Limits, NewItem};
pub use ordering::{MovePlan, MoveTarget, Placement};
pub use time::{Clock, Timestamp};
