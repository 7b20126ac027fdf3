use taskboard_core::config::Config;
use taskboard_core::{Group, Item, ItemId, Limits, NewItem};
use taskboard_engine::{Engine, EngineError, telemetry};
use taskboard_storage::SqliteItemStore;

use crate::faulty::FaultyStore;
use crate::transport::LoopbackTransport;

pub type TestEngine = Engine<FaultyStore<SqliteItemStore>>;

/// An in-memory engine with fault injection and title-based lookups.
pub struct TestBoard {
    pub engine: TestEngine,
}

impl TestBoard {
    pub fn new() -> Result<Self, EngineError> {
        let store = FaultyStore::new(SqliteItemStore::open_in_memory()?);
        Ok(Self {
            engine: Engine::new(store, Limits::default()),
        })
    }

    /// Board built the way a deployment starts: logging from
    /// `config.logging`, store and limits from the rest of `config`.
    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        telemetry::init(&config.logging);
        let store = FaultyStore::new(taskboard_engine::open_store(&config.storage)?);
        Ok(Self {
            engine: Engine::new(store, config.limits),
        })
    }

    /// Board with `titles` appended to `group` in order.
    pub fn with_group(group: Group, titles: &[&str]) -> Result<Self, EngineError> {
        let mut board = Self::new()?;
        board.seed(group, titles)?;
        Ok(board)
    }

    pub fn seed(&mut self, group: Group, titles: &[&str]) -> Result<Vec<ItemId>, EngineError> {
        titles
            .iter()
            .map(|title| {
                let item = self.engine.create(NewItem::new(*title).in_group(group))?;
                Ok(item.id)
            })
            .collect()
    }

    pub fn store(&mut self) -> &mut FaultyStore<SqliteItemStore> {
        self.engine.store_mut()
    }

    pub fn item(&self, title: &str) -> Result<Item, EngineError> {
        self.engine
            .list(None)?
            .into_iter()
            .find(|i| i.title == title)
            .ok_or_else(|| taskboard_core::CoreError::InvalidData(format!("no item titled {title:?}")).into())
    }

    pub fn id(&self, title: &str) -> Result<ItemId, EngineError> {
        Ok(self.item(title)?.id)
    }

    pub fn titles(&self, group: Group) -> Result<Vec<String>, EngineError> {
        Ok(self
            .engine
            .list(Some(group))?
            .into_iter()
            .map(|i| i.title)
            .collect())
    }

    pub fn positions(&self, group: Group) -> Result<Vec<u32>, EngineError> {
        Ok(self
            .engine
            .list(Some(group))?
            .into_iter()
            .map(|i| i.position)
            .collect())
    }

    /// Every group holds exactly `0..count`.
    pub fn is_dense(&self) -> Result<bool, EngineError> {
        Ok(self.engine.audit()?.is_empty())
    }

    pub fn into_loopback(self) -> LoopbackTransport<FaultyStore<SqliteItemStore>> {
        LoopbackTransport::new(self.engine)
    }
}
