use taskboard_core::{Group, Item, ItemId, Timestamp};

use crate::error::StorageError;

/// Document-level access to the item collection.
///
/// Each method is atomic for the single document it touches. There is no
/// multi-document transaction: callers that rewrite several items issue one
/// call per item and must cope with any of them failing independently.
pub trait ItemStore {
    fn insert_item(&mut self, item: &Item) -> Result<(), StorageError>;

    fn get_item(&self, item_id: ItemId) -> Result<Option<Item>, StorageError>;

    /// Items of one group ordered by `(position, created_at, id)`.
    fn list_group(&self, group: Group) -> Result<Vec<Item>, StorageError>;

    fn list_all(&self) -> Result<Vec<Item>, StorageError>;

    fn count_group(&self, group: Group) -> Result<u32, StorageError>;

    /// Rewrite one item's group and position. `NotFound` if it is gone.
    fn set_placement(
        &mut self,
        item_id: ItemId,
        group: Group,
        position: u32,
        updated_at: Timestamp,
    ) -> Result<(), StorageError>;

    /// Rewrite one item's text fields. `NotFound` if it is gone.
    fn set_text(
        &mut self,
        item_id: ItemId,
        title: &str,
        description: Option<&str>,
        updated_at: Timestamp,
    ) -> Result<(), StorageError>;

    /// `NotFound` if it is already gone.
    fn delete_item(&mut self, item_id: ItemId) -> Result<(), StorageError>;
}
