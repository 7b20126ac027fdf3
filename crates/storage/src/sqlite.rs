use rusqlite::{Connection, OptionalExtension};

use taskboard_core::{Group, Item, ItemId, Timestamp};

use crate::error::StorageError;
use crate::traits::ItemStore;

const ITEM_COLUMNS: &str =
    "item_id, title, description, grp, position, created_at, updated_at";

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

fn to_column(ts: Timestamp) -> Result<i64, StorageError> {
    i64::try_from(ts.as_millis())
        .map_err(|_| StorageError::Serialization(format!("timestamp {} out of range", ts.as_millis())))
}

fn from_column(ms: i64, label: &str) -> Result<Timestamp, StorageError> {
    u64::try_from(ms)
        .map(Timestamp::from_millis)
        .map_err(|_| StorageError::Serialization(format!("negative {label} {ms}")))
}

pub struct SqliteItemStore {
    conn: Connection,
}

impl SqliteItemStore {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        tracing::debug!(path, "opened item store");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn query_items(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Item>, StorageError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, RawItem::from_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?.into_item()?);
        }
        Ok(result)
    }

    fn expect_one(changed: usize, item_id: ItemId) -> Result<(), StorageError> {
        match changed {
            0 => Err(StorageError::NotFound(item_id.to_string())),
            _ => Ok(()),
        }
    }
}

/// Column values as read, before conversion into domain types. Conversion
/// happens outside the rusqlite row closure so it can fail with
/// `StorageError` instead of `rusqlite::Error`.
struct RawItem {
    item_id: Vec<u8>,
    title: String,
    description: Option<String>,
    group: String,
    position: i64,
    created_at: i64,
    updated_at: i64,
}

impl RawItem {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            item_id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            group: row.get(3)?,
            position: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn into_item(self) -> Result<Item, StorageError> {
        let position = u32::try_from(self.position)
            .map_err(|_| StorageError::Serialization(format!("invalid position {}", self.position)))?;
        Ok(Item {
            id: ItemId::from_bytes(to_array::<16>(self.item_id, "item_id")?),
            title: self.title,
            description: self.description,
            group: Group::parse(&self.group)?,
            position,
            created_at: from_column(self.created_at, "created_at")?,
            updated_at: from_column(self.updated_at, "updated_at")?,
        })
    }
}

impl ItemStore for SqliteItemStore {
    fn insert_item(&mut self, item: &Item) -> Result<(), StorageError> {
        let result = self.conn.execute(
            "INSERT INTO items (item_id, title, description, grp, position, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                item.id.as_bytes().as_slice(),
                item.title,
                item.description,
                item.group.as_str(),
                item.position,
                to_column(item.created_at)?,
                to_column(item.updated_at)?,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, msg))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::ConstraintViolation(
                    msg.unwrap_or_else(|| format!("item {}", item.id)),
                ))
            }
            Err(e) => Err(StorageError::Sqlite(e)),
        }
    }

    fn get_item(&self, item_id: ItemId) -> Result<Option<Item>, StorageError> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM items WHERE item_id = ?1"),
                rusqlite::params![item_id.as_bytes().as_slice()],
                RawItem::from_row,
            )
            .optional()?;
        raw.map(RawItem::into_item).transpose()
    }

    fn list_group(&self, group: Group) -> Result<Vec<Item>, StorageError> {
        self.query_items(
            &format!(
                "SELECT {ITEM_COLUMNS} FROM items WHERE grp = ?1 ORDER BY position, created_at, item_id"
            ),
            rusqlite::params![group.as_str()],
        )
    }

    fn list_all(&self) -> Result<Vec<Item>, StorageError> {
        let mut items = Vec::new();
        for group in Group::ALL {
            items.extend(self.list_group(group)?);
        }
        Ok(items)
    }

    fn count_group(&self, group: Group) -> Result<u32, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM items WHERE grp = ?1",
            rusqlite::params![group.as_str()],
            |row| row.get(0),
        )?;
        u32::try_from(count)
            .map_err(|_| StorageError::Serialization(format!("item count {count} out of range")))
    }

    fn set_placement(
        &mut self,
        item_id: ItemId,
        group: Group,
        position: u32,
        updated_at: Timestamp,
    ) -> Result<(), StorageError> {
        let changed = self.conn.execute(
            "UPDATE items SET grp = ?1, position = ?2, updated_at = ?3 WHERE item_id = ?4",
            rusqlite::params![
                group.as_str(),
                position,
                to_column(updated_at)?,
                item_id.as_bytes().as_slice(),
            ],
        )?;
        Self::expect_one(changed, item_id)
    }

    fn set_text(
        &mut self,
        item_id: ItemId,
        title: &str,
        description: Option<&str>,
        updated_at: Timestamp,
    ) -> Result<(), StorageError> {
        let changed = self.conn.execute(
            "UPDATE items SET title = ?1, description = ?2, updated_at = ?3 WHERE item_id = ?4",
            rusqlite::params![
                title,
                description,
                to_column(updated_at)?,
                item_id.as_bytes().as_slice(),
            ],
        )?;
        Self::expect_one(changed, item_id)
    }

    fn delete_item(&mut self, item_id: ItemId) -> Result<(), StorageError> {
        let changed = self.conn.execute(
            "DELETE FROM items WHERE item_id = ?1",
            rusqlite::params![item_id.as_bytes().as_slice()],
        )?;
        Self::expect_one(changed, item_id)
    }
}
