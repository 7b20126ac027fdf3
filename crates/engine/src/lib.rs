pub mod error;
pub mod telemetry;

pub use error::EngineError;

use taskboard_core::{
    Board, BoardStats, Clock, DensityViolation, Group, Item, ItemEdit, ItemId, Limits, MoveTarget,
    NewItem, Placement, Timestamp,
    config::{Config, StorageConfig},
    ordering,
    protocol::{
        Ack, DeleteOutcome, MoveOutcome, MoveRequest, ReorderOutcome, ReorderRequest, Request,
        Response,
    },
};
use taskboard_storage::{ItemStore, SqliteItemStore, StorageError};

/// Open the SQLite store described by `storage`; in memory when no path is
/// set.
pub fn open_store(storage: &StorageConfig) -> Result<SqliteItemStore, EngineError> {
    let store = match &storage.path {
        Some(path) => {
            let path = path.to_str().ok_or_else(|| {
                StorageError::Serialization(format!("non-utf8 path {}", path.display()))
            })?;
            SqliteItemStore::open(path)?
        }
        None => SqliteItemStore::open_in_memory()?,
    };
    Ok(store)
}

/// Result of fanning out one operation's writes. Every write is attempted;
/// a failure does not stop the ones after it.
struct WriteReport {
    committed: usize,
    failures: Vec<(ItemId, StorageError)>,
}

/// The Partition Store Engine: sole writer of authoritative group and
/// position values.
///
/// Each operation reads the lanes it needs, plans the new positions with
/// [`taskboard_core::ordering`], and persists them as independent
/// single-document writes. A fully successful operation leaves every touched
/// group dense; a failed one may be partially committed and is reported as
/// [`EngineError::PartialApply`] without compensation.
pub struct Engine<S: ItemStore = SqliteItemStore> {
    store: S,
    clock: Clock,
    limits: Limits,
}

impl Engine<SqliteItemStore> {
    pub fn in_memory() -> Result<Self, EngineError> {
        Ok(Self::new(SqliteItemStore::open_in_memory()?, Limits::default()))
    }

    pub fn open(storage: &StorageConfig, limits: Limits) -> Result<Self, EngineError> {
        Ok(Self::new(open_store(storage)?, limits))
    }

    /// Startup entry point: installs the log subscriber from
    /// `config.logging`, then opens the configured store.
    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        if !telemetry::init(&config.logging) {
            tracing::debug!("log subscriber already installed");
        }
        Self::open(&config.storage, config.limits)
    }
}

impl<S: ItemStore> Engine<S> {
    pub fn new(store: S, limits: Limits) -> Self {
        Self {
            store,
            clock: Clock::new(),
            limits,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    fn require_item(&self, item_id: ItemId) -> Result<Item, EngineError> {
        self.store
            .get_item(item_id)?
            .ok_or(EngineError::ItemNotFound(item_id))
    }

    fn write_placements(&mut self, placements: &[Placement], at: Timestamp) -> WriteReport {
        let mut report = WriteReport {
            committed: 0,
            failures: Vec::new(),
        };
        for p in placements {
            match self.store.set_placement(p.item_id, p.group, p.position, at) {
                Ok(()) => report.committed += 1,
                Err(e) => report.failures.push((p.item_id, e)),
            }
        }
        report
    }

    /// First failure wins. `prior` counts writes already committed earlier
    /// in the same operation.
    fn settle(report: WriteReport, groups: &[Group], prior: usize) -> Result<(), EngineError> {
        let committed = prior + report.committed;
        let failed = report.failures.len();
        let Some((item_id, source)) = report.failures.into_iter().next() else {
            return Ok(());
        };
        if committed == 0 {
            return Err(match source {
                StorageError::NotFound(_) => EngineError::ItemNotFound(item_id),
                other => other.into(),
            });
        }
        tracing::warn!(
            ?groups,
            committed,
            failed,
            "write fan-out partially applied: {source}"
        );
        Err(EngineError::PartialApply {
            groups: groups.to_vec(),
            committed,
            failed,
            source,
        })
    }

    fn load_lanes(&self, groups: &[Group]) -> Result<Board, EngineError> {
        let mut items = Vec::new();
        for group in Group::ALL {
            if groups.contains(&group) {
                items.extend(self.store.list_group(group)?);
            }
        }
        Ok(Board::from_items(items))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Items sorted by position; all groups in column order when `group` is `None`.
    pub fn list(&self, group: Option<Group>) -> Result<Vec<Item>, EngineError> {
        match group {
            Some(group) => Ok(self.store.list_group(group)?),
            None => Ok(self.store.list_all()?),
        }
    }

    pub fn get(&self, item_id: ItemId) -> Result<Item, EngineError> {
        self.require_item(item_id)
    }

    pub fn board(&self) -> Result<Board, EngineError> {
        Ok(Board::from_items(self.store.list_all()?))
    }

    pub fn stats(&self) -> Result<BoardStats, EngineError> {
        Ok(self.board()?.stats())
    }

    /// Groups whose stored positions are not exactly `0..count`.
    pub fn audit(&self) -> Result<Vec<DensityViolation>, EngineError> {
        Ok(self.board()?.audit())
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Append a new item at the end of its group (default `todo`).
    pub fn create(&mut self, new_item: NewItem) -> Result<Item, EngineError> {
        let new_item = new_item.validate(&self.limits)?;
        let group = new_item.group.unwrap_or_default();
        let position = self.store.count_group(group)?;
        let at = self.clock.tick()?;

        let item = Item {
            id: ItemId::new(),
            title: new_item.title,
            description: new_item.description,
            group,
            position,
            created_at: at,
            updated_at: at,
        };
        self.store.insert_item(&item)?;
        tracing::debug!(item = %item.id, %group, position, "created item");
        Ok(item)
    }

    /// Update title and/or description. A blank description clears it.
    pub fn edit(&mut self, item_id: ItemId, edit: ItemEdit) -> Result<Item, EngineError> {
        let mut item = self.require_item(item_id)?;
        if let Some(title) = &edit.title {
            item.title = self.limits.check_title(title)?;
        }
        if let Some(description) = &edit.description {
            item.description = self.limits.check_description(Some(description))?;
        }
        item.updated_at = self.clock.tick()?;

        self.store
            .set_text(item_id, &item.title, item.description.as_deref(), item.updated_at)
            .map_err(|e| match e {
                StorageError::NotFound(_) => EngineError::ItemNotFound(item_id),
                other => other.into(),
            })?;
        Ok(item)
    }

    /// Move inside the item's current group; `index` is clamped to the group.
    pub fn move_within_group(&mut self, item_id: ItemId, index: u32) -> Result<MoveOutcome, EngineError> {
        self.apply_move(&MoveRequest::within(item_id, index))
    }

    /// Move into `group` at `index`, or append when `index` is `None`.
    pub fn move_across_group(
        &mut self,
        item_id: ItemId,
        group: Group,
        index: Option<u32>,
    ) -> Result<MoveOutcome, EngineError> {
        self.apply_move(&MoveRequest::across(item_id, group, index))
    }

    /// Shift-based move. Touches only the siblings between the old and new
    /// slot (within a group), or the tail of the source and the tail of the
    /// target from the insertion point (across groups).
    pub fn apply_move(&mut self, request: &MoveRequest) -> Result<MoveOutcome, EngineError> {
        let item = self.require_item(request.item_id)?;

        let mut groups = vec![item.group];
        let dest = match (request.target_group, request.target) {
            (Some(group), _) => group,
            (None, MoveTarget::Before(sibling)) => self.require_item(sibling)?.group,
            (None, _) => item.group,
        };
        groups.push(dest);
        if let (Some(_), MoveTarget::Before(sibling)) = (request.target_group, request.target) {
            groups.push(self.require_item(sibling)?.group);
        }

        let board = self.load_lanes(&groups)?;
        let plan = board.plan_move(item.id, request.target_group, request.target)?;
        if plan.is_noop() {
            return Ok(MoveOutcome {
                item,
                affected: Vec::new(),
            });
        }

        let at = self.clock.tick()?;
        let writes = plan.writes();
        let report = self.write_placements(&writes, at);
        Self::settle(report, &plan.groups(), 0)?;

        tracing::debug!(
            item = %item.id,
            from = %plan.from.group,
            to = %plan.item.group,
            position = plan.item.position,
            siblings = plan.siblings.len(),
            "moved item"
        );

        let placed = |p: &Placement| {
            board.get(p.item_id).map(|i| Item {
                group: p.group,
                position: p.position,
                updated_at: at,
                ..i.clone()
            })
        };
        Ok(MoveOutcome {
            item: placed(&plan.item).unwrap_or(item),
            affected: plan.siblings.iter().filter_map(placed).collect(),
        })
    }

    /// Remove an item and renumber the rest of its group.
    pub fn delete(&mut self, item_id: ItemId) -> Result<DeleteOutcome, EngineError> {
        let item = self.require_item(item_id)?;
        let at = self.clock.tick()?;
        self.store.delete_item(item_id).map_err(|e| match e {
            StorageError::NotFound(_) => EngineError::ItemNotFound(item_id),
            other => other.into(),
        })?;

        let lane = match self.store.list_group(item.group) {
            Ok(lane) => lane,
            Err(source) => {
                return Err(EngineError::PartialApply {
                    groups: vec![item.group],
                    committed: 1,
                    failed: 1,
                    source,
                });
            }
        };
        let placements = ordering::plan_resweep(&lane)?;
        let report = self.write_placements(&placements, at);
        Self::settle(report, &[item.group], 1)?;

        tracing::debug!(item = %item_id, group = %item.group, renumbered = placements.len(), "deleted item");
        Ok(DeleteOutcome {
            item_id,
            group: item.group,
            renumbered: placements.len(),
        })
    }

    /// Full recomputation of `group` with `item_id` inserted at
    /// `new_position`. Idempotent: once the group holds that arrangement a
    /// rerun writes nothing. If the item currently lives in another group it
    /// is brought over and its former group is resweeped as well.
    pub fn reorder(
        &mut self,
        item_id: ItemId,
        new_position: u32,
        group: Group,
    ) -> Result<ReorderOutcome, EngineError> {
        let item = self.require_item(item_id)?;
        let mut groups = vec![group];
        if item.group != group {
            groups.push(item.group);
        }
        let board = self.load_lanes(&groups)?;

        let mut placements =
            ordering::plan_reorder(board.lane(group), &item, group, new_position as usize)?;
        if item.group != group {
            let former: Vec<Item> = board
                .lane(item.group)
                .iter()
                .filter(|i| i.id != item_id)
                .cloned()
                .collect();
            placements.extend(ordering::plan_resweep(&former)?);
        }

        self.commit_sweep(board, groups, placements)
    }

    /// Renumber `group` to `0..count` in its current read order.
    pub fn resweep(&mut self, group: Group) -> Result<ReorderOutcome, EngineError> {
        let board = self.load_lanes(&[group])?;
        let placements = ordering::plan_resweep(board.lane(group))?;
        self.commit_sweep(board, vec![group], placements)
    }

    /// Resweep every group that fails the density audit.
    pub fn heal(&mut self) -> Result<Vec<ReorderOutcome>, EngineError> {
        let mut outcomes = Vec::new();
        for violation in self.audit()? {
            tracing::info!(group = %violation.group, positions = ?violation.positions, "healing group");
            outcomes.push(self.resweep(violation.group)?);
        }
        Ok(outcomes)
    }

    fn commit_sweep(
        &mut self,
        mut board: Board,
        groups: Vec<Group>,
        placements: Vec<Placement>,
    ) -> Result<ReorderOutcome, EngineError> {
        if !placements.is_empty() {
            let at = self.clock.tick()?;
            let report = self.write_placements(&placements, at);
            Self::settle(report, &groups, 0)?;
            board.apply(&placements);
            let touched: Vec<Item> = placements
                .iter()
                .filter_map(|p| board.get(p.item_id))
                .map(|i| Item {
                    updated_at: at,
                    ..i.clone()
                })
                .collect();
            board.upsert(touched);
        }
        tracing::debug!(?groups, writes = placements.len(), "swept groups");

        let items = Group::ALL
            .into_iter()
            .filter(|g| groups.contains(g))
            .flat_map(|g| board.lane(g).to_vec())
            .collect();
        Ok(ReorderOutcome {
            groups,
            writes: placements.len(),
            items,
        })
    }

    // ========================================================================
    // Request dispatch
    // ========================================================================

    /// Serve one request of the view/engine contract.
    pub fn handle(&mut self, request: Request) -> Response {
        let name = request.name();
        let result = match request {
            Request::List { group } => self.list(group).map(Ack::Listed),
            Request::Create(new_item) => self.create(new_item).map(Ack::Created),
            Request::Move(req) => self.apply_move(&req).map(Ack::Moved),
            Request::Delete { item_id } => self.delete(item_id).map(Ack::Deleted),
            Request::Reorder(ReorderRequest {
                item_id,
                group,
                position,
            }) => self.reorder(item_id, position, group).map(Ack::Reordered),
            Request::Resweep { group } => self.resweep(group).map(Ack::Reordered),
            Request::Edit { item_id, edit } => self.edit(item_id, edit).map(Ack::Edited),
        };
        result.map_err(|e| {
            let failure = e.to_failure();
            tracing::warn!(request = name, kind = failure.kind.as_str(), "request failed: {e}");
            failure
        })
    }
}
