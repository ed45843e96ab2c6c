mod common;

use common::*;
use postbox_store::{Store, StoreError};
use postbox_types::UserId;

fn three_users(store: &Store) -> (UserId, UserId, UserId) {
    (
        store.add_user("a", "pw").unwrap(),
        store.add_user("b", "pw").unwrap(),
        store.add_user("c", "pw").unwrap(),
    )
}

fn assert_read_by_within_recipients(store: &Store, caller: UserId, message_id: i64) {
    let msg = store.get_message(caller, message_id).unwrap();
    assert!(msg.read_by.iter().all(|r| msg.recipients.contains(r)));
}

#[test]
fn send_indexes_sender_and_recipients() {
    for (name, store) in stores() {
        let (a, b, c) = three_users(&store);
        let msg = store.send(a, &[b, c], "hi").unwrap();

        assert_eq!(store.get_sent(a).unwrap(), vec![msg], "{name}");
        assert_eq!(store.get_received(b).unwrap(), vec![msg], "{name}");
        assert_eq!(store.get_received(c).unwrap(), vec![msg], "{name}");
        assert!(store.get_received(a).unwrap().is_empty(), "{name}");

        let info = store.get_message(a, msg).unwrap();
        assert_eq!(info.body, "hi");
        assert_eq!(info.sender_id, a);
        assert_eq!(info.recipients, vec![b, c]);
        assert!(info.read_by.is_empty(), "{name}: sender fetch must not mark read");
    }
}

#[test]
fn fetch_marks_read_once() {
    for (name, store) in stores() {
        let (a, b, c) = three_users(&store);
        let msg = store.send(a, &[b, c], "hi").unwrap();

        let first = store.get_message(b, msg).unwrap();
        assert_eq!(first.read_by, vec![b], "{name}");

        let second = store.get_message(b, msg).unwrap();
        assert_eq!(second.read_by, first.read_by, "{name}");

        let third = store.get_message(c, msg).unwrap();
        assert_eq!(third.read_by, vec![b, c], "{name}");

        assert_read_by_within_recipients(&store, a, msg);
    }
}

#[test]
fn read_gate_blocks_delete() {
    for (name, store) in stores() {
        let (a, b, _) = three_users(&store);
        let msg = store.send(a, &[b], "hi").unwrap();
        store.get_message(b, msg).unwrap();

        assert!(is_conflict(&store.delete_message(a, msg)), "{name}");
        assert_eq!(store.get_message(a, msg).unwrap().read_by, vec![b], "{name}");
    }
}

#[test]
fn unread_message_can_be_retracted() {
    for (name, store) in stores() {
        let (a, b, _) = three_users(&store);
        let msg = store.send(a, &[b], "hi").unwrap();

        store.delete_message(a, msg).unwrap();

        assert!(is_not_found(&store.get_message(b, msg)), "{name}");
        assert!(store.get_received(b).unwrap().is_empty(), "{name}");
        assert!(store.get_sent(a).unwrap().is_empty(), "{name}");
        assert!(is_not_found(&store.delete_message(a, msg)), "{name}");
    }
}

#[test]
fn outsiders_cannot_read_or_delete() {
    for (name, store) in stores() {
        let (a, b, c) = three_users(&store);
        let msg = store.send(a, &[b], "hi").unwrap();

        assert!(is_unauthorized(&store.get_message(c, msg)), "{name}");
        assert!(is_unauthorized(&store.delete_message(b, msg)), "{name}");
        assert!(is_unauthorized(&store.delete_message(c, msg)), "{name}");

        // A failed attempt by a recipient must not leave a read mark behind.
        assert!(store.get_message(a, msg).unwrap().read_by.is_empty(), "{name}");
    }
}

#[test]
fn unknown_recipient_leaves_nothing_behind() {
    for (name, store) in stores() {
        let (a, b, _) = three_users(&store);

        match store.send(a, &[b, 77], "hi") {
            Err(StoreError::NotFound(msg)) => assert!(msg.contains("77"), "{name}: {msg}"),
            other => panic!("{name}: expected NotFound, got {other:?}"),
        }
        assert!(store.get_received(b).unwrap().is_empty(), "{name}");
        assert!(store.get_sent(a).unwrap().is_empty(), "{name}");
    }
}

#[test]
fn send_rejections() {
    for (name, store) in stores() {
        let (a, b, _) = three_users(&store);

        assert!(is_bad_request(&store.send(a, &[], "hi")), "{name}");
        assert!(is_bad_request(&store.send(a, &[b], &"x".repeat(4096))), "{name}");
        assert!(is_not_found(&store.send(99, &[b], "hi")), "{name}");
        assert!(is_not_found(&store.get_message(a, 12345)), "{name}");
    }
}

#[test]
fn duplicate_recipients_collapse() {
    for (name, store) in stores() {
        let (a, b, _) = three_users(&store);
        let msg = store.send(a, &[b, b, b], "hi").unwrap();

        assert_eq!(store.get_message(a, msg).unwrap().recipients, vec![b], "{name}");
        assert_eq!(store.get_received(b).unwrap(), vec![msg], "{name}");
    }
}

#[test]
fn sender_may_address_themself() {
    for (name, store) in stores() {
        let (a, _, _) = three_users(&store);
        let msg = store.send(a, &[a], "note to self").unwrap();

        assert_eq!(store.get_message(a, msg).unwrap().read_by, vec![a], "{name}");
        assert!(is_conflict(&store.delete_message(a, msg)), "{name}");
    }
}

#[test]
fn broadcast_excludes_sender_and_freezes_membership() {
    for (name, store) in stores() {
        let (a, b, c) = three_users(&store);
        let msg = store.broadcast(a, "hi all").unwrap();

        let late = store.add_user("late", "pw").unwrap();

        let info = store.get_message(a, msg).unwrap();
        assert_eq!(info.recipients, vec![b, c], "{name}");
        assert!(is_unauthorized(&store.get_message(late, msg)), "{name}");
        assert!(store.get_received(late).unwrap().is_empty(), "{name}");
    }
}

#[test]
fn broadcast_without_audience_is_rejected() {
    for (name, store) in stores() {
        let a = store.add_user("lonely", "pw").unwrap();
        assert!(is_bad_request(&store.broadcast(a, "anyone?")), "{name}");
        assert!(store.get_sent(a).unwrap().is_empty(), "{name}");
    }
}

#[test]
fn listings_are_ascending_and_require_a_user() {
    for (name, store) in stores() {
        let (a, b, _) = three_users(&store);
        let ids: Vec<_> = (0..4).map(|i| store.send(a, &[b], &format!("m{i}")).unwrap()).collect();

        assert_eq!(store.get_sent(a).unwrap(), ids, "{name}");
        assert_eq!(store.get_received(b).unwrap(), ids, "{name}");
        assert!(is_not_found(&store.get_sent(500)), "{name}");
        assert!(is_not_found(&store.get_received(500)), "{name}");
    }
}

#[test]
fn message_ids_are_not_reused_after_delete() {
    for (name, store) in stores() {
        let (a, b, _) = three_users(&store);
        let first = store.send(a, &[b], "one").unwrap();
        store.delete_message(a, first).unwrap();
        let second = store.send(a, &[b], "two").unwrap();
        assert!(second > first, "{name}");
    }
}
