use taskboard_core::{Group, Item, ItemId, Timestamp};
use taskboard_storage::{ItemStore, StorageError};

/// Which writes a [`FaultyStore`] refuses. Write numbers count every write
/// attempted since the fault was armed, starting at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    #[default]
    None,
    /// Only the nth write fails.
    Nth(usize),
    /// The nth write and every one after it fail.
    From(usize),
    /// Every write touching this item fails.
    Item(ItemId),
}

/// Wraps a store and fails selected writes with `Unavailable`. Reads can be
/// cut off separately.
pub struct FaultyStore<S> {
    inner: S,
    fault: Fault,
    reads_down: bool,
    attempted: usize,
    committed: usize,
}

impl<S: ItemStore> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fault: Fault::None,
            reads_down: false,
            attempted: 0,
            committed: 0,
        }
    }

    /// Arm a fault and reset the write counters.
    pub fn arm(&mut self, fault: Fault) {
        self.fault = fault;
        self.attempted = 0;
        self.committed = 0;
    }

    pub fn disarm(&mut self) {
        self.arm(Fault::None);
        self.reads_down = false;
    }

    pub fn set_reads_down(&mut self, down: bool) {
        self.reads_down = down;
    }

    pub fn writes_attempted(&self) -> usize {
        self.attempted
    }

    pub fn writes_committed(&self) -> usize {
        self.committed
    }

    fn check_write(&mut self, item_id: ItemId) -> Result<(), StorageError> {
        let n = self.attempted;
        self.attempted += 1;
        let refused = match self.fault {
            Fault::None => false,
            Fault::Nth(k) => n == k,
            Fault::From(k) => n >= k,
            Fault::Item(id) => id == item_id,
        };
        if refused {
            return Err(StorageError::Unavailable(format!("injected fault on write {n} ({item_id})")));
        }
        Ok(())
    }

    fn check_read(&self) -> Result<(), StorageError> {
        if self.reads_down {
            return Err(StorageError::Unavailable("injected read fault".into()));
        }
        Ok(())
    }

    fn record<T>(&mut self, result: Result<T, StorageError>) -> Result<T, StorageError> {
        if result.is_ok() {
            self.committed += 1;
        }
        result
    }
}

impl<S: ItemStore> ItemStore for FaultyStore<S> {
    fn insert_item(&mut self, item: &Item) -> Result<(), StorageError> {
        self.check_write(item.id)?;
        let result = self.inner.insert_item(item);
        self.record(result)
    }

    fn get_item(&self, item_id: ItemId) -> Result<Option<Item>, StorageError> {
        self.check_read()?;
        self.inner.get_item(item_id)
    }

    fn list_group(&self, group: Group) -> Result<Vec<Item>, StorageError> {
        self.check_read()?;
        self.inner.list_group(group)
    }

    fn list_all(&self) -> Result<Vec<Item>, StorageError> {
        self.check_read()?;
        self.inner.list_all()
    }

    fn count_group(&self, group: Group) -> Result<u32, StorageError> {
        self.check_read()?;
        self.inner.count_group(group)
    }

    fn set_placement(
        &mut self,
        item_id: ItemId,
        group: Group,
        position: u32,
        updated_at: Timestamp,
    ) -> Result<(), StorageError> {
        self.check_write(item_id)?;
        let result = self.inner.set_placement(item_id, group, position, updated_at);
        self.record(result)
    }

    fn set_text(
        &mut self,
        item_id: ItemId,
        title: &str,
        description: Option<&str>,
        updated_at: Timestamp,
    ) -> Result<(), StorageError> {
        self.check_write(item_id)?;
        let result = self.inner.set_text(item_id, title, description, updated_at);
        self.record(result)
    }

    fn delete_item(&mut self, item_id: ItemId) -> Result<(), StorageError> {
        self.check_write(item_id)?;
        let result = self.inner.delete_item(item_id);
        self.record(result)
    }
}
