//! Request/response contract between the view controller and the engine.
//!
//! Every request is self-contained: there is no transaction id and no batch,
//! even when one move rewrites many sibling positions.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::group::Group;
use crate::ids::ItemId;
use crate::item::{Item, ItemEdit, NewItem};
use crate::ordering::MoveTarget;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub item_id: ItemId,
    /// `None` keeps the item in its current group, or follows the sibling
    /// named by [`MoveTarget::Before`].
    pub target_group: Option<Group>,
    pub target: MoveTarget,
}

impl MoveRequest {
    pub fn within(item_id: ItemId, index: u32) -> Self {
        Self {
            item_id,
            target_group: None,
            target: MoveTarget::Index(index),
        }
    }

    pub fn across(item_id: ItemId, group: Group, index: Option<u32>) -> Self {
        Self {
            item_id,
            target_group: Some(group),
            target: index.map_or(MoveTarget::End, MoveTarget::Index),
        }
    }

    pub fn before(item_id: ItemId, sibling: ItemId) -> Self {
        Self {
            item_id,
            target_group: None,
            target: MoveTarget::Before(sibling),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderRequest {
    pub item_id: ItemId,
    pub group: Group,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    List { group: Option<Group> },
    Create(NewItem),
    Move(MoveRequest),
    Delete { item_id: ItemId },
    Reorder(ReorderRequest),
    Resweep { group: Group },
    Edit { item_id: ItemId, edit: ItemEdit },
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Self::List { .. } => "list",
            Self::Create(_) => "create",
            Self::Move(_) => "move",
            Self::Delete { .. } => "delete",
            Self::Reorder(_) => "reorder",
            Self::Resweep { .. } => "resweep",
            Self::Edit { .. } => "edit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub item: Item,
    /// Post-move state of every sibling whose position was rewritten.
    pub affected: Vec<Item>,
}

impl MoveOutcome {
    pub fn affected_siblings(&self) -> usize {
        self.affected.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub item_id: ItemId,
    pub group: Group,
    pub renumbered: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderOutcome {
    pub groups: Vec<Group>,
    /// Documents actually rewritten. Zero when the groups were already in
    /// the requested arrangement.
    pub writes: usize,
    /// Final content of `groups`, in position order.
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ack {
    Listed(Vec<Item>),
    Created(Item),
    Moved(MoveOutcome),
    Deleted(DeleteOutcome),
    Reordered(ReorderOutcome),
    Edited(Item),
}

impl Ack {
    /// Items whose authoritative post-operation state this ack carries.
    pub fn patches(&self) -> Vec<Item> {
        match self {
            Self::Listed(_) | Self::Deleted(_) => Vec::new(),
            Self::Created(item) | Self::Edited(item) => vec![item.clone()],
            Self::Moved(outcome) => {
                let mut items = outcome.affected.clone();
                items.push(outcome.item.clone());
                items
            }
            Self::Reordered(outcome) => outcome.items.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed input, rejected before any write.
    Validation,
    /// The referenced item no longer exists.
    NotFound,
    /// Some writes of a multi-write operation committed before one failed.
    PartialApply,
    /// The store was unreachable; nothing is assumed written.
    Transport,
}

impl ErrorKind {
    /// Whether the view should re-issue a reconciliation after this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PartialApply | Self::Transport)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::PartialApply => "partial_apply",
            Self::Transport => "transport",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
    /// Groups left possibly inconsistent; a resweep of each restores density.
    pub repair: Vec<Group>,
}

impl Failure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            repair: Vec::new(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for Failure {}

pub type Response = Result<Ack, Failure>;

pub fn to_msgpack<T: Serialize>(value: &T) -> Result<Vec<u8>, CoreError> {
    rmp_serde::to_vec(value).map_err(|e| CoreError::Serialization(e.to_string()))
}

pub fn from_msgpack<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CoreError> {
    rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
}
