use taskboard_core::Group;
use taskboard_core::protocol::{ErrorKind, MoveRequest, Request};
use taskboard_engine::EngineError;
use taskboard_harness::{Fault, TestBoard};
use taskboard_storage::StorageError;

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn failed_sibling_write_reports_partial_apply() -> TestResult {
    let mut board = TestBoard::with_group(Group::Todo, &["A", "B", "C", "D"])?;
    let d = board.id("D")?;

    // Writes: A->1, B->2, C->3, D->0. B's write is refused.
    board.store().arm(Fault::Nth(1));
    let err = board.engine.move_within_group(d, 0).unwrap_err();

    let EngineError::PartialApply {
        groups,
        committed,
        failed,
        source,
    } = &err
    else {
        panic!("expected partial apply, got {err}");
    };
    assert_eq!(groups, &vec![Group::Todo]);
    assert_eq!((*committed, *failed), (3, 1));
    assert!(matches!(source, StorageError::Unavailable(_)));
    assert_eq!(board.store().writes_attempted(), 4);
    assert_eq!(board.store().writes_committed(), 3);

    // No compensation: the group is left with a duplicate position.
    assert_eq!(board.positions(Group::Todo)?, vec![0, 1, 1, 3]);
    assert!(!board.is_dense()?);

    let failure = err.to_failure();
    assert_eq!(failure.kind, ErrorKind::PartialApply);
    assert_eq!(failure.repair, vec![Group::Todo]);
    Ok(())
}

#[test]
fn reorder_repairs_partial_apply_and_settles() -> TestResult {
    let mut board = TestBoard::with_group(Group::Todo, &["A", "B", "C", "D"])?;
    let d = board.id("D")?;

    board.store().arm(Fault::Nth(1));
    assert!(board.engine.move_within_group(d, 0).is_err());
    board.store().disarm();

    let first = board.engine.reorder(d, 0, Group::Todo)?;
    assert!(first.writes > 0);
    assert!(board.is_dense()?);
    let positions = board.positions(Group::Todo)?;
    let titles = board.titles(Group::Todo)?;
    assert_eq!(titles, vec!["D", "A", "B", "C"]);

    let second = board.engine.reorder(d, 0, Group::Todo)?;
    assert_eq!(second.writes, 0);
    assert_eq!(board.positions(Group::Todo)?, positions);
    Ok(())
}

#[test]
fn all_writes_refused_is_transport_error() -> TestResult {
    let mut board = TestBoard::with_group(Group::Todo, &["A", "B", "C"])?;
    let c = board.id("C")?;

    board.store().arm(Fault::From(0));
    let err = board.engine.move_within_group(c, 0).unwrap_err();
    assert!(matches!(err, EngineError::Storage(StorageError::Unavailable(_))));
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.to_failure().repair.is_empty());

    board.store().disarm();
    assert_eq!(board.titles(Group::Todo)?, vec!["A", "B", "C"]);
    assert!(board.is_dense()?);
    Ok(())
}

#[test]
fn every_write_is_attempted_after_a_failure() -> TestResult {
    let mut board = TestBoard::with_group(Group::Todo, &["A", "B", "C", "D", "E"])?;
    let e = board.id("E")?;

    board.store().arm(Fault::Nth(0));
    assert!(board.engine.move_within_group(e, 0).is_err());
    assert_eq!(board.store().writes_attempted(), 5);
    assert_eq!(board.store().writes_committed(), 4);
    Ok(())
}

#[test]
fn cross_group_partial_apply_names_both_groups() -> TestResult {
    let mut board = TestBoard::with_group(Group::Todo, &["A", "B", "C"])?;
    board.seed(Group::InProgress, &["X", "Y"])?;
    let (a, x) = (board.id("A")?, board.id("X")?);

    board.store().arm(Fault::Item(x));
    let failure = board
        .engine
        .handle(Request::Move(MoveRequest::across(a, Group::InProgress, Some(0))))
        .unwrap_err();
    assert_eq!(failure.kind, ErrorKind::PartialApply);
    assert_eq!(failure.repair, vec![Group::Todo, Group::InProgress]);
    assert!(!board.is_dense()?);

    board.store().disarm();
    for group in failure.repair {
        board.engine.resweep(group)?;
    }
    assert!(board.is_dense()?);
    assert_eq!(board.titles(Group::Todo)?, vec!["B", "C"]);
    assert_eq!(board.engine.list(Some(Group::InProgress))?.len(), 3);
    Ok(())
}

#[test]
fn delete_with_failed_renumber_is_partial() -> TestResult {
    let mut board = TestBoard::with_group(Group::Todo, &["A", "B", "C", "D"])?;
    let a = board.id("A")?;

    // Writes: delete A, B->0, C->1, D->2. C's write is refused.
    board.store().arm(Fault::Nth(2));
    let err = board.engine.delete(a).unwrap_err();
    assert!(matches!(
        err,
        EngineError::PartialApply {
            committed: 3,
            failed: 1,
            ..
        }
    ));
    assert_eq!(board.titles(Group::Todo)?, vec!["B", "C", "D"]);
    assert_eq!(board.positions(Group::Todo)?, vec![0, 2, 2]);

    board.store().disarm();
    let healed = board.engine.heal()?;
    assert_eq!(healed.len(), 1);
    assert_eq!(healed[0].groups, vec![Group::Todo]);
    assert_eq!(board.positions(Group::Todo)?, vec![0, 1, 2]);
    assert!(board.engine.heal()?.is_empty());
    Ok(())
}

#[test]
fn refused_delete_leaves_group_untouched() -> TestResult {
    let mut board = TestBoard::with_group(Group::Todo, &["A", "B"])?;
    let a = board.id("A")?;

    board.store().arm(Fault::Item(a));
    let err = board.engine.delete(a).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    board.store().disarm();
    assert_eq!(board.titles(Group::Todo)?, vec!["A", "B"]);
    Ok(())
}

#[test]
fn unreadable_store_is_transport_error() -> TestResult {
    let mut board = TestBoard::with_group(Group::Todo, &["A"])?;
    board.store().set_reads_down(true);
    let failure = board.engine.handle(Request::List { group: None }).unwrap_err();
    assert_eq!(failure.kind, ErrorKind::Transport);
    board.store().disarm();
    assert_eq!(board.engine.list(None)?.len(), 1);
    Ok(())
}

#[test]
fn audit_reports_each_broken_group() -> TestResult {
    let mut board = TestBoard::with_group(Group::Todo, &["A", "B", "C"])?;
    board.seed(Group::Completed, &["X", "Y", "Z"])?;
    let (c, z) = (board.id("C")?, board.id("Z")?);

    board.store().arm(Fault::Nth(0));
    assert!(board.engine.move_within_group(c, 0).is_err());
    board.store().arm(Fault::Nth(0));
    assert!(board.engine.move_within_group(z, 0).is_err());
    board.store().disarm();

    let groups: Vec<Group> = board.engine.audit()?.into_iter().map(|v| v.group).collect();
    assert_eq!(groups, vec![Group::Todo, Group::Completed]);
    assert_eq!(board.engine.heal()?.len(), 2);
    assert!(board.is_dense()?);
    Ok(())
}
