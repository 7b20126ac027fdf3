//! Position planning for a single group or a pair of groups.
//!
//! Every function here is pure: it takes lanes (items of one group sorted by
//! [`Item::order_key`]) and returns the placements that must be written to
//! reach the new arrangement. The engine persists these placements one
//! document at a time; the view controller applies the same placements to its
//! working copy, so both sides agree on the resulting order.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::group::Group;
use crate::ids::ItemId;
use crate::item::Item;

/// The group and position one item should hold after an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub item_id: ItemId,
    pub group: Group,
    pub position: u32,
}

impl Placement {
    pub fn new(item_id: ItemId, group: Group, position: usize) -> Result<Self, CoreError> {
        let position = u32::try_from(position)
            .map_err(|_| CoreError::InvalidData(format!("position {position} out of range")))?;
        Ok(Self {
            item_id,
            group,
            position,
        })
    }

    pub fn of(item: &Item) -> Self {
        Self {
            item_id: item.id,
            group: item.group,
            position: item.position,
        }
    }
}

/// Where a moved item should land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveTarget {
    /// Zero-based index in the destination group, clamped to the valid range.
    Index(u32),
    /// The slot currently held by this sibling, resolved against the
    /// authoritative order at the time the move is planned.
    Before(ItemId),
    /// After every existing item of the destination group.
    End,
}

/// Writes needed by one move: the shifted siblings, then the moved item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    pub from: Placement,
    pub item: Placement,
    pub siblings: Vec<Placement>,
}

impl MovePlan {
    pub fn is_noop(&self) -> bool {
        self.from == self.item && self.siblings.is_empty()
    }

    pub fn crosses_groups(&self) -> bool {
        self.from.group != self.item.group
    }

    /// Siblings first, moved item last. Empty for a no-op.
    pub fn writes(&self) -> Vec<Placement> {
        if self.is_noop() {
            return Vec::new();
        }
        let mut writes = self.siblings.clone();
        writes.push(self.item);
        writes
    }

    /// Groups whose order this plan touches.
    pub fn groups(&self) -> Vec<Group> {
        if self.crosses_groups() {
            vec![self.from.group, self.item.group]
        } else {
            vec![self.item.group]
        }
    }
}

pub fn sort_lane(lane: &mut [Item]) {
    lane.sort_by_key(Item::order_key);
}

fn index_of(lane: &[Item], item_id: ItemId) -> Result<usize, CoreError> {
    lane.iter()
        .position(|i| i.id == item_id)
        .ok_or(CoreError::UnknownItem(item_id))
}

/// Move within one group. Only the siblings between the old and new slot
/// shift, each by one step toward the vacated slot.
pub fn plan_within(lane: &[Item], item_id: ItemId, target: usize) -> Result<MovePlan, CoreError> {
    let from = index_of(lane, item_id)?;
    let group = lane[from].group;
    let to = target.min(lane.len() - 1);

    let siblings = if to > from {
        (from + 1..=to)
            .map(|idx| Placement::new(lane[idx].id, group, idx - 1))
            .collect::<Result<_, _>>()?
    } else {
        (to..from)
            .map(|idx| Placement::new(lane[idx].id, group, idx + 1))
            .collect::<Result<_, _>>()?
    };

    Ok(MovePlan {
        from: Placement::of(&lane[from]),
        item: Placement::new(item_id, group, to)?,
        siblings,
    })
}

/// Move into another group: close the gap in `source`, open a slot in
/// `target_lane` at `target` (append when `None`).
pub fn plan_across(
    source: &[Item],
    target_lane: &[Item],
    target_group: Group,
    item_id: ItemId,
    target: Option<usize>,
) -> Result<MovePlan, CoreError> {
    let from = index_of(source, item_id)?;
    let source_group = source[from].group;
    if source_group == target_group || target_lane.iter().any(|i| i.id == item_id) {
        return Err(CoreError::InvalidData(format!(
            "cross-group move of {item_id} within {source_group}"
        )));
    }
    let to = target.unwrap_or(target_lane.len()).min(target_lane.len());

    let siblings = source
        .iter()
        .enumerate()
        .skip(from + 1)
        .map(|(idx, item)| Placement::new(item.id, source_group, idx - 1))
        .chain(
            target_lane
                .iter()
                .enumerate()
                .skip(to)
                .map(|(idx, item)| Placement::new(item.id, target_group, idx + 1)),
        )
        .collect::<Result<_, _>>()?;

    Ok(MovePlan {
        from: Placement::of(&source[from]),
        item: Placement::new(item_id, target_group, to)?,
        siblings,
    })
}

/// Renumber a lane to `0..len` in its current order. Returns only the items
/// whose stored position differs, so a dense lane yields nothing.
pub fn plan_resweep(lane: &[Item]) -> Result<Vec<Placement>, CoreError> {
    lane.iter()
        .enumerate()
        .filter(|(idx, item)| item.position as usize != *idx)
        .map(|(idx, item)| Placement::new(item.id, item.group, idx))
        .collect()
}

/// Full recomputation of `group`: remove `item` from consideration, insert it
/// at `new_position` among the rest, and number the whole lane sequentially.
/// `lane` is the current content of `group` and may or may not contain `item`.
pub fn plan_reorder(
    lane: &[Item],
    item: &Item,
    group: Group,
    new_position: usize,
) -> Result<Vec<Placement>, CoreError> {
    let mut order: Vec<&Item> = lane.iter().filter(|i| i.id != item.id).collect();
    let at = new_position.min(order.len());
    order.insert(at, item);

    order
        .into_iter()
        .enumerate()
        .filter(|(idx, i)| i.group != group || i.position as usize != *idx)
        .map(|(idx, i)| Placement::new(i.id, group, idx))
        .collect()
}
