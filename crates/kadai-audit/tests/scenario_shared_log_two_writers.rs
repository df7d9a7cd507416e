//! Scenario: the daemon and the CLI append to one log through separate
//! writers and the chain stays intact.

use std::thread;

use kadai_audit::{verify_hash_chain, AuditWriter, TransitionEntry, VerifyResult};
use kadai_lifecycle::{AdminAction, OrderStatus};

fn approve(order_id: &str, actor: &str) -> TransitionEntry {
    TransitionEntry {
        order_id: order_id.to_string(),
        actor: actor.to_string(),
        action: AdminAction::Approve,
        from: OrderStatus::Pending,
        to: OrderStatus::Approved,
    }
}

#[test]
fn interleaved_writers_continue_each_others_chain() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit").join("transitions.jsonl");

    let mut daemon = AuditWriter::resume(&path, true).unwrap();
    daemon.append(approve("o-1", "admin-daemon")).unwrap();

    let mut cli = AuditWriter::resume(&path, true).unwrap();
    let from_cli = cli.append(approve("o-2", "cli")).unwrap();
    assert_eq!(from_cli.seq, 1);

    // The daemon's writer is stale here; it must pick up the CLI record.
    let from_daemon = daemon.append(approve("o-3", "admin-daemon")).unwrap();
    assert_eq!(from_daemon.seq, 2);
    assert_eq!(from_daemon.hash_prev, from_cli.hash_self);
    assert_eq!(daemon.seq(), 3);

    assert_eq!(
        verify_hash_chain(&path).unwrap(),
        VerifyResult::Valid { lines: 3 }
    );
}

#[test]
fn concurrent_writers_serialize_on_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("transitions.jsonl");

    let workers: Vec<_> = (0..4)
        .map(|n| {
            let path = path.clone();
            thread::spawn(move || {
                let mut w = AuditWriter::resume(&path, true).unwrap();
                for i in 0..10 {
                    w.append(approve(&format!("o-{n}-{i}"), &format!("writer-{n}")))
                        .unwrap();
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    assert_eq!(
        verify_hash_chain(&path).unwrap(),
        VerifyResult::Valid { lines: 40 }
    );
}
