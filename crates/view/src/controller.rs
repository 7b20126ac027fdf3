//! Optimistic view state.
//!
//! `working` is what the user sees and is mutated as soon as a drop happens.
//! `confirmed` is the last state known to match the store. Moves awaiting a
//! response are kept in issue order, each with the `working` board it was
//! applied on top of, so a failure can be undone without disturbing moves
//! issued after it.

use std::fmt;

use taskboard_core::config::TargetEncoding;
use taskboard_core::protocol::{Ack, ErrorKind, Failure, MoveRequest, ReorderRequest, Request, Response};
use taskboard_core::{Board, Group, Item, ItemId, MovePlan, MoveTarget, ordering};

use crate::error::ViewError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// `item` now belongs immediately before `before` in `group`, or at its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropEvent {
    pub item: ItemId,
    pub group: Group,
    pub before: Option<ItemId>,
}

impl DropEvent {
    pub fn before(item: ItemId, group: Group, sibling: ItemId) -> Self {
        Self {
            item,
            group,
            before: Some(sibling),
        }
    }

    pub fn at_end(item: ItemId, group: Group) -> Self {
        Self {
            item,
            group,
            before: None,
        }
    }
}

/// A move applied to `working` whose request still has to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMove {
    pub ticket: Ticket,
    pub request: Request,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Committed,
    /// `working` was restored. `recovery` holds the reconciliation requests
    /// to send; empty unless the failure kind is retryable.
    RolledBack {
        failure: Failure,
        recovery: Vec<Request>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied,
    /// Moves were in flight; the fresher collection was ignored.
    Deferred,
}

/// User-facing report of a reverted move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub item_id: ItemId,
    pub kind: ErrorKind,
    pub message: String,
}

/// A sent move. `request` is replayed verbatim after an earlier failure, so
/// the local board follows the same resolution the engine applies.
struct InFlight {
    ticket: Ticket,
    request: MoveRequest,
    rollback: Board,
}

pub struct ViewController {
    confirmed: Board,
    working: Board,
    in_flight: Vec<InFlight>,
    notices: Vec<Notice>,
    next_ticket: u64,
    encoding: TargetEncoding,
}

impl Default for ViewController {
    fn default() -> Self {
        Self::new(TargetEncoding::default())
    }
}

/// Plan a drop against `board`. `None` when the drop changes nothing.
fn plan_drop(board: &Board, event: &DropEvent) -> Result<Option<MovePlan>, ViewError> {
    if board.locate(event.item).is_none() {
        return Err(ViewError::UnknownItem(event.item));
    }
    let target = match event.before {
        Some(sibling) if sibling == event.item => return Ok(None),
        Some(sibling) => MoveTarget::Before(sibling),
        None => MoveTarget::End,
    };
    let plan = board.plan_move(event.item, Some(event.group), target)?;
    Ok((!plan.is_noop()).then_some(plan))
}

impl ViewController {
    pub fn new(encoding: TargetEncoding) -> Self {
        Self {
            confirmed: Board::new(),
            working: Board::new(),
            in_flight: Vec::new(),
            notices: Vec::new(),
            next_ticket: 1,
            encoding,
        }
    }

    pub fn with_items(items: Vec<Item>, encoding: TargetEncoding) -> Self {
        let mut controller = Self::new(encoding);
        controller.refresh(items);
        controller
    }

    pub fn working(&self) -> &Board {
        &self.working
    }

    pub fn confirmed(&self) -> &Board {
        &self.confirmed
    }

    /// Visible order of one group.
    pub fn lane(&self, group: Group) -> &[Item] {
        self.working.lane(group)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn encode(&self, event: &DropEvent, plan: &MovePlan) -> MoveRequest {
        match self.encoding {
            TargetEncoding::Index => MoveRequest {
                item_id: event.item,
                target_group: plan.crosses_groups().then_some(plan.item.group),
                target: MoveTarget::Index(plan.item.position),
            },
            TargetEncoding::Sibling => MoveRequest {
                item_id: event.item,
                target_group: Some(event.group),
                target: event.before.map_or(MoveTarget::End, MoveTarget::Before),
            },
        }
    }

    /// Apply a drop to `working` and return the request that persists it.
    pub fn propose(&mut self, event: DropEvent) -> Result<Option<PendingMove>, ViewError> {
        let Some(plan) = plan_drop(&self.working, &event)? else {
            tracing::debug!(item = %event.item, "drop leaves order unchanged");
            return Ok(None);
        };

        let request = self.encode(&event, &plan);
        let rollback = self.working.clone();
        self.working.apply(&plan.writes());

        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.in_flight.push(InFlight {
            ticket,
            request: request.clone(),
            rollback,
        });

        tracing::debug!(
            %ticket,
            item = %event.item,
            group = %plan.item.group,
            position = plan.item.position,
            in_flight = self.in_flight.len(),
            "applied move optimistically"
        );
        Ok(Some(PendingMove {
            ticket,
            request: Request::Move(request),
        }))
    }

    /// Settle a proposed move with the engine's response.
    pub fn complete(&mut self, ticket: Ticket, response: Response) -> Result<Resolution, ViewError> {
        let idx = self
            .in_flight
            .iter()
            .position(|f| f.ticket == ticket)
            .ok_or(ViewError::UnknownTicket(ticket))?;
        let entry = self.in_flight.remove(idx);

        let resolution = match response {
            Ok(ack) => {
                self.commit(idx, &ack);
                Resolution::Committed
            }
            Err(failure) => self.roll_back(idx, entry, failure),
        };

        if self.in_flight.is_empty() {
            self.confirmed = self.working.clone();
        }
        Ok(resolution)
    }

    fn commit(&mut self, idx: usize, ack: &Ack) {
        let patches = ack.patches();
        for later in &mut self.in_flight[idx..] {
            later.rollback.upsert(patches.iter().cloned());
        }
        // Later moves already reshaped `working`; their own acks will patch it.
        if idx == self.in_flight.len() {
            self.working.upsert(patches);
        }
    }

    /// Restore the failed move's rollback point and replay the moves issued
    /// after it on top, rebasing their rollback points.
    fn roll_back(&mut self, idx: usize, entry: InFlight, failure: Failure) -> Resolution {
        let mut board = entry.rollback;
        for later in &mut self.in_flight[idx..] {
            later.rollback = board.clone();
            let request = &later.request;
            match board.plan_move(request.item_id, request.target_group, request.target) {
                Ok(plan) if !plan.is_noop() => board.apply(&plan.writes()),
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(ticket = %later.ticket, "move no longer applies after rollback: {e}")
                }
            }
        }
        self.working = board;

        tracing::warn!(
            ticket = %entry.ticket,
            item = %entry.request.item_id,
            kind = failure.kind.as_str(),
            "move failed, rolled back: {}",
            failure.message
        );
        self.notices.push(Notice {
            item_id: entry.request.item_id,
            kind: failure.kind,
            message: failure.message.clone(),
        });

        let recovery = if failure.kind.is_retryable() {
            self.recovery_for(entry.request.item_id, &failure)
        } else {
            Vec::new()
        };
        Resolution::RolledBack { failure, recovery }
    }

    /// Reorder the item back to the slot the user now sees, and resweep any
    /// other group the failure left uncertain.
    fn recovery_for(&self, item_id: ItemId, failure: &Failure) -> Vec<Request> {
        let mut requests = Vec::new();
        let home = self.working.locate(item_id);
        if let Some((group, idx)) = home {
            match u32::try_from(idx) {
                Ok(position) => requests.push(Request::Reorder(ReorderRequest {
                    item_id,
                    group,
                    position,
                })),
                Err(_) => tracing::warn!(item = %item_id, idx, "visible index out of range, not reordering"),
            }
        }
        requests.extend(
            failure
                .repair
                .iter()
                .filter(|g| home.map(|(h, _)| h) != Some(**g))
                .map(|&group| Request::Resweep { group }),
        );
        requests
    }

    /// Replace both snapshots with a fresher collection, unless moves are in
    /// flight.
    pub fn refresh(&mut self, items: Vec<Item>) -> RefreshOutcome {
        if !self.in_flight.is_empty() {
            tracing::debug!(in_flight = self.in_flight.len(), "refresh deferred");
            return RefreshOutcome::Deferred;
        }
        self.confirmed = Board::from_items(items);
        self.working = self.confirmed.clone();
        RefreshOutcome::Applied
    }

    /// Fold a non-move acknowledgement (create, edit, delete, list, reorder)
    /// into both snapshots.
    pub fn absorb(&mut self, ack: &Ack) -> RefreshOutcome {
        if !self.in_flight.is_empty() {
            return RefreshOutcome::Deferred;
        }
        match ack {
            Ack::Listed(items) => return self.refresh(items.clone()),
            Ack::Deleted(outcome) => {
                self.working.remove(outcome.item_id);
                match ordering::plan_resweep(self.working.lane(outcome.group)) {
                    Ok(placements) => self.working.apply(&placements),
                    Err(e) => tracing::warn!(group = %outcome.group, "cannot renumber after delete: {e}"),
                }
            }
            other => self.working.upsert(other.patches()),
        }
        self.confirmed = self.working.clone();
        RefreshOutcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskboard_core::Timestamp;
    use taskboard_core::protocol::{DeleteOutcome, MoveOutcome};

    fn item(title: &str, group: Group, position: u32) -> Item {
        Item {
            id: ItemId::new(),
            title: title.into(),
            description: None,
            group,
            position,
            created_at: Timestamp::from_millis(1_000 + position as u64),
            updated_at: Timestamp::from_millis(1_000 + position as u64),
        }
    }

    /// todo = [A, B, C], in_progress = [X]
    fn fixture(encoding: TargetEncoding) -> (ViewController, [ItemId; 4]) {
        let items = vec![
            item("A", Group::Todo, 0),
            item("B", Group::Todo, 1),
            item("C", Group::Todo, 2),
            item("X", Group::InProgress, 0),
        ];
        let ids = [items[0].id, items[1].id, items[2].id, items[3].id];
        (ViewController::with_items(items, encoding), ids)
    }

    fn titles(controller: &ViewController, group: Group) -> Vec<String> {
        controller.lane(group).iter().map(|i| i.title.clone()).collect()
    }

    fn moved_ack(controller: &ViewController, item_id: ItemId) -> Response {
        let item = controller.working().get(item_id).unwrap().clone();
        Ok(Ack::Moved(MoveOutcome {
            item,
            affected: Vec::new(),
        }))
    }

    #[test]
    fn failed_move_restores_pre_move_order() {
        let (mut view, [a, _, c, _]) = fixture(TargetEncoding::Index);
        let before = view.working().clone();

        let pending = view.propose(DropEvent::before(c, Group::Todo, a)).unwrap().unwrap();
        assert_eq!(titles(&view, Group::Todo), vec!["C", "A", "B"]);

        let resolution = view
            .complete(pending.ticket, Err(Failure::transport("store unreachable")))
            .unwrap();

        assert_eq!(view.working(), &before);
        assert_eq!(view.confirmed(), &before);
        assert_eq!(titles(&view, Group::Todo), vec!["A", "B", "C"]);
        let Resolution::RolledBack { recovery, .. } = resolution else {
            panic!("expected rollback");
        };
        assert_eq!(
            recovery,
            vec![Request::Reorder(ReorderRequest {
                item_id: c,
                group: Group::Todo,
                position: 2,
            })]
        );
        let notices = view.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, ErrorKind::Transport);
        assert!(view.notices().is_empty());
    }

    #[test]
    fn index_encoding_sends_local_index() {
        let (mut view, [a, _, c, x]) = fixture(TargetEncoding::Index);
        let pending = view.propose(DropEvent::before(c, Group::Todo, a)).unwrap().unwrap();
        assert_eq!(pending.request, Request::Move(MoveRequest::within(c, 0)));

        let pending = view.propose(DropEvent::at_end(a, Group::InProgress)).unwrap().unwrap();
        assert_eq!(
            pending.request,
            Request::Move(MoveRequest::across(a, Group::InProgress, Some(1)))
        );
        assert_eq!(titles(&view, Group::InProgress), vec!["X", "A"]);
        assert_eq!(view.working().get(x).unwrap().position, 0);
    }

    #[test]
    fn sibling_encoding_defers_resolution_to_engine() {
        let (mut view, [a, _, c, _]) = fixture(TargetEncoding::Sibling);
        let pending = view.propose(DropEvent::before(c, Group::Todo, a)).unwrap().unwrap();
        assert_eq!(
            pending.request,
            Request::Move(MoveRequest {
                item_id: c,
                target_group: Some(Group::Todo),
                target: MoveTarget::Before(a),
            })
        );
    }

    #[test]
    fn noop_drops_issue_nothing() {
        let (mut view, [a, _, c, _]) = fixture(TargetEncoding::Index);
        assert_eq!(view.propose(DropEvent::before(a, Group::Todo, a)).unwrap(), None);
        assert_eq!(view.propose(DropEvent::at_end(c, Group::Todo)).unwrap(), None);
        assert!(view.is_idle());
    }

    #[test]
    fn unknown_item_is_rejected() {
        let (mut view, _) = fixture(TargetEncoding::Index);
        let ghost = ItemId::new();
        assert!(matches!(
            view.propose(DropEvent::at_end(ghost, Group::Todo)),
            Err(ViewError::UnknownItem(id)) if id == ghost
        ));
    }

    #[test]
    fn success_confirms_working() {
        let (mut view, [a, _, c, _]) = fixture(TargetEncoding::Index);
        let pending = view.propose(DropEvent::before(c, Group::Todo, a)).unwrap().unwrap();
        assert_ne!(view.confirmed(), view.working());

        let ack = moved_ack(&view, c);
        assert_eq!(view.complete(pending.ticket, ack).unwrap(), Resolution::Committed);
        assert_eq!(view.confirmed(), view.working());
        assert_eq!(titles(&view, Group::Todo), vec!["C", "A", "B"]);
        assert!(matches!(
            view.complete(pending.ticket, Err(Failure::transport("late"))),
            Err(ViewError::UnknownTicket(_))
        ));
    }

    #[test]
    fn earlier_failure_replays_later_move() {
        let (mut view, [a, b, c, _]) = fixture(TargetEncoding::Index);
        let original = view.working().clone();

        let first = view.propose(DropEvent::before(c, Group::Todo, a)).unwrap().unwrap();
        let second = view.propose(DropEvent::at_end(b, Group::InProgress)).unwrap().unwrap();
        assert_eq!(titles(&view, Group::Todo), vec!["C", "A"]);

        view.complete(first.ticket, Err(Failure::transport("timeout"))).unwrap();
        assert_eq!(titles(&view, Group::Todo), vec!["A", "C"]);
        assert_eq!(titles(&view, Group::InProgress), vec!["X", "B"]);
        assert_eq!(view.in_flight(), 1);

        view.complete(second.ticket, Err(Failure::transport("timeout"))).unwrap();
        assert_eq!(view.working(), &original);
        assert_eq!(view.notices().len(), 2);
    }

    #[test]
    fn replay_after_failure_uses_sent_index() {
        let items: Vec<Item> = ["A", "B", "C", "D"]
            .iter()
            .zip(0..)
            .map(|(title, position)| item(title, Group::Todo, position))
            .collect();
        let [a, _, c, d] = [items[0].id, items[1].id, items[2].id, items[3].id];
        let mut view = ViewController::with_items(items, TargetEncoding::Index);

        let first = view.propose(DropEvent::before(c, Group::Todo, a)).unwrap().unwrap();
        let second = view.propose(DropEvent::before(d, Group::Todo, a)).unwrap().unwrap();
        assert_eq!(titles(&view, Group::Todo), vec!["C", "D", "A", "B"]);
        assert_eq!(second.request, Request::Move(MoveRequest::within(d, 1)));

        // The engine will apply index 1 to [A, B, C, D], not "before A".
        view.complete(first.ticket, Err(Failure::transport("timeout"))).unwrap();
        assert_eq!(titles(&view, Group::Todo), vec!["A", "D", "B", "C"]);
    }

    #[test]
    fn later_failure_keeps_earlier_move() {
        let (mut view, [a, b, c, _]) = fixture(TargetEncoding::Index);

        let first = view.propose(DropEvent::before(c, Group::Todo, a)).unwrap().unwrap();
        let second = view.propose(DropEvent::at_end(b, Group::InProgress)).unwrap().unwrap();

        view.complete(second.ticket, Err(Failure::transport("timeout"))).unwrap();
        assert_eq!(titles(&view, Group::Todo), vec!["C", "A", "B"]);
        assert_eq!(titles(&view, Group::InProgress), vec!["X"]);

        let ack = moved_ack(&view, c);
        view.complete(first.ticket, ack).unwrap();
        assert_eq!(view.confirmed(), view.working());
        assert_eq!(titles(&view, Group::Todo), vec!["C", "A", "B"]);
    }

    #[test]
    fn refresh_waits_for_in_flight_moves() {
        let (mut view, [a, _, c, _]) = fixture(TargetEncoding::Index);
        let pending = view.propose(DropEvent::before(c, Group::Todo, a)).unwrap().unwrap();

        let stale = view.confirmed().clone().into_items();
        assert_eq!(view.refresh(stale.clone()), RefreshOutcome::Deferred);
        assert_eq!(titles(&view, Group::Todo), vec!["C", "A", "B"]);

        let ack = moved_ack(&view, c);
        view.complete(pending.ticket, ack).unwrap();
        assert_eq!(view.refresh(stale), RefreshOutcome::Applied);
        assert_eq!(titles(&view, Group::Todo), vec!["A", "B", "C"]);
    }

    #[test]
    fn partial_apply_recovery_resweeps_other_groups() {
        let (mut view, [a, _, _, x]) = fixture(TargetEncoding::Index);
        let pending = view.propose(DropEvent::before(a, Group::InProgress, x)).unwrap().unwrap();

        let mut failure = Failure::new(ErrorKind::PartialApply, "1 of 4 writes failed");
        failure.repair = vec![Group::Todo, Group::InProgress];
        let Resolution::RolledBack { recovery, .. } = view.complete(pending.ticket, Err(failure)).unwrap()
        else {
            panic!("expected rollback");
        };
        assert_eq!(
            recovery,
            vec![
                Request::Reorder(ReorderRequest {
                    item_id: a,
                    group: Group::Todo,
                    position: 0,
                }),
                Request::Resweep {
                    group: Group::InProgress
                },
            ]
        );
    }

    #[test]
    fn not_found_is_not_retried() {
        let (mut view, [a, _, c, _]) = fixture(TargetEncoding::Index);
        let pending = view.propose(DropEvent::before(c, Group::Todo, a)).unwrap().unwrap();
        let resolution = view
            .complete(pending.ticket, Err(Failure::new(ErrorKind::NotFound, "gone")))
            .unwrap();
        assert!(matches!(resolution, Resolution::RolledBack { recovery, .. } if recovery.is_empty()));
    }

    #[test]
    fn absorbed_delete_renumbers_group() {
        let (mut view, [a, _, _, _]) = fixture(TargetEncoding::Index);
        view.absorb(&Ack::Deleted(DeleteOutcome {
            item_id: a,
            group: Group::Todo,
            renumbered: 2,
        }));
        assert_eq!(titles(&view, Group::Todo), vec!["B", "C"]);
        assert!(view.working().audit().is_empty());
        assert_eq!(view.confirmed(), view.working());
    }
}
