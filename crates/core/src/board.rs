use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::group::Group;
use crate::ids::ItemId;
use crate::item::Item;
use crate::ordering::{self, MovePlan, MoveTarget, Placement};

/// Read model: one ordered lane per group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    lanes: [Vec<Item>; 3],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardStats {
    pub todo: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub total: usize,
}

/// A group whose positions are not exactly `0..count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DensityViolation {
    pub group: Group,
    pub positions: Vec<u32>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Self {
        let mut board = Self::new();
        for item in items {
            board.lanes[item.group.index()].push(item);
        }
        for lane in &mut board.lanes {
            ordering::sort_lane(lane);
        }
        board
    }

    pub fn lane(&self, group: Group) -> &[Item] {
        &self.lanes[group.index()]
    }

    /// All items, column by column, each column in position order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.lanes.iter().flatten()
    }

    pub fn into_items(self) -> Vec<Item> {
        self.lanes.into_iter().flatten().collect()
    }

    pub fn len(&self) -> usize {
        self.lanes.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, item_id: ItemId) -> Option<&Item> {
        self.items().find(|i| i.id == item_id)
    }

    /// Group and lane index of an item.
    pub fn locate(&self, item_id: ItemId) -> Option<(Group, usize)> {
        Group::ALL.into_iter().find_map(|group| {
            self.lane(group)
                .iter()
                .position(|i| i.id == item_id)
                .map(|idx| (group, idx))
        })
    }

    pub fn stats(&self) -> BoardStats {
        let [todo, in_progress, completed] = self.lanes.each_ref().map(Vec::len);
        BoardStats {
            todo,
            in_progress,
            completed,
            total: todo + in_progress + completed,
        }
    }

    pub fn remove(&mut self, item_id: ItemId) -> Option<Item> {
        let (group, idx) = self.locate(item_id)?;
        Some(self.lanes[group.index()].remove(idx))
    }

    /// Insert or replace items by id, then restore lane order.
    pub fn upsert(&mut self, items: impl IntoIterator<Item = Item>) {
        for item in items {
            self.remove(item.id);
            self.lanes[item.group.index()].push(item);
        }
        for lane in &mut self.lanes {
            ordering::sort_lane(lane);
        }
    }

    /// Rewrite group/position of the placed items. Placements naming unknown
    /// items are skipped.
    pub fn apply(&mut self, placements: &[Placement]) {
        let moved: Vec<Item> = placements
            .iter()
            .filter_map(|p| {
                let mut item = self.remove(p.item_id)?;
                item.group = p.group;
                item.position = p.position;
                Some(item)
            })
            .collect();
        self.upsert(moved);
    }

    /// Plan a move against this board's order, resolving the target the same
    /// way the engine does.
    pub fn plan_move(
        &self,
        item_id: ItemId,
        target_group: Option<Group>,
        target: MoveTarget,
    ) -> Result<MovePlan, CoreError> {
        let (from_group, _) = self.locate(item_id).ok_or(CoreError::UnknownItem(item_id))?;
        let (dest, index) = match target {
            MoveTarget::Index(n) => (target_group.unwrap_or(from_group), Some(n as usize)),
            MoveTarget::End => (target_group.unwrap_or(from_group), None),
            MoveTarget::Before(sibling) => {
                let (sibling_group, idx) = self
                    .locate(sibling)
                    .ok_or(CoreError::UnknownItem(sibling))?;
                if let Some(group) = target_group
                    && group != sibling_group
                {
                    return Err(CoreError::validation(
                        "target",
                        format!("sibling {sibling} is in {sibling_group}, not {group}"),
                    ));
                }
                (sibling_group, Some(idx))
            }
        };

        if dest == from_group {
            let lane = self.lane(dest);
            let to = index.unwrap_or(lane.len() - 1);
            ordering::plan_within(lane, item_id, to)
        } else {
            ordering::plan_across(self.lane(from_group), self.lane(dest), dest, item_id, index)
        }
    }

    pub fn audit(&self) -> Vec<DensityViolation> {
        Group::ALL
            .into_iter()
            .filter_map(|group| {
                let positions: Vec<u32> = self.lane(group).iter().map(|i| i.position).collect();
                let dense = positions.iter().enumerate().all(|(idx, p)| *p as usize == idx);
                (!dense).then_some(DensityViolation { group, positions })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Timestamp;

    fn item(title: &str, group: Group, position: u32) -> Item {
        Item {
            id: ItemId::new(),
            title: title.into(),
            description: None,
            group,
            position,
            created_at: Timestamp::from_millis(1),
            updated_at: Timestamp::from_millis(1),
        }
    }

    fn titles(board: &Board, group: Group) -> Vec<String> {
        board.lane(group).iter().map(|i| i.title.clone()).collect()
    }

    #[test]
    fn from_items_sorts_each_lane() {
        let board = Board::from_items(vec![
            item("C", Group::Todo, 2),
            item("X", Group::Completed, 0),
            item("A", Group::Todo, 0),
            item("B", Group::Todo, 1),
        ]);
        assert_eq!(titles(&board, Group::Todo), vec!["A", "B", "C"]);
        assert_eq!(board.stats().total, 4);
        assert_eq!(board.stats().completed, 1);
        assert!(board.audit().is_empty());
    }

    #[test]
    fn apply_plan_matches_scenario_one() {
        let a = item("A", Group::Todo, 0);
        let b = item("B", Group::Todo, 1);
        let c = item("C", Group::Todo, 2);
        let c_id = c.id;
        let mut board = Board::from_items(vec![a, b, c]);

        let plan = board.plan_move(c_id, None, MoveTarget::Index(0)).unwrap();
        board.apply(&plan.writes());

        assert_eq!(titles(&board, Group::Todo), vec!["C", "A", "B"]);
        assert!(board.audit().is_empty());
    }

    #[test]
    fn before_sibling_in_other_group_inserts_ahead_of_it() {
        let a = item("A", Group::Todo, 0);
        let x = item("X", Group::InProgress, 0);
        let y = item("Y", Group::InProgress, 1);
        let (a_id, y_id) = (a.id, y.id);
        let mut board = Board::from_items(vec![a, x, y]);

        let plan = board.plan_move(a_id, None, MoveTarget::Before(y_id)).unwrap();
        board.apply(&plan.writes());

        assert_eq!(titles(&board, Group::InProgress), vec!["X", "A", "Y"]);
        assert!(board.lane(Group::Todo).is_empty());
        assert!(board.audit().is_empty());
    }

    #[test]
    fn sibling_outside_named_group_is_rejected() {
        let a = item("A", Group::Todo, 0);
        let x = item("X", Group::InProgress, 0);
        let (a_id, x_id) = (a.id, x.id);
        let board = Board::from_items(vec![a, x]);

        let err = board
            .plan_move(a_id, Some(Group::Completed), MoveTarget::Before(x_id))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "target", .. }));
    }

    #[test]
    fn audit_reports_gap() {
        let board = Board::from_items(vec![item("A", Group::Todo, 0), item("B", Group::Todo, 2)]);
        let violations = board.audit();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].group, Group::Todo);
        assert_eq!(violations[0].positions, vec![0, 2]);
    }
}
