/// Role fields are compared per connection and swapped on arrival.
use replica_shared::Value;
use replica_test::{pawn_layout, slots, TestLink};

const SIMULATED_PROXY: u8 = 1;
const AUTONOMOUS_PROXY: u8 = 2;
const AUTHORITY: u8 = 3;

fn pawn_link() -> TestLink {
    let mut link = TestLink::new(pawn_layout());
    link.set(slots::ROLE, Value::U8(AUTHORITY));
    link.set(slots::REMOTE_ROLE, Value::U8(SIMULATED_PROXY));
    link.set(slots::SPEED, Value::F32(4.5));
    link
}

#[test]
fn roles_arrive_swapped() {
    let mut link = pawn_link();
    link.sync();

    assert_eq!(link.client_data[slots::ROLE], Value::U8(SIMULATED_PROXY));
    assert_eq!(link.client_data[slots::REMOTE_ROLE], Value::U8(AUTHORITY));
    assert_eq!(link.client_data[slots::SPEED], Value::F32(4.5));
}

#[test]
fn remote_role_change_is_sent_alone() {
    let mut link = pawn_link();
    link.sync();
    assert_eq!(link.send(), None);

    link.set(slots::REMOTE_ROLE, Value::U8(AUTONOMOUS_PROXY));
    assert!(link.send_and_deliver().is_some());
    assert_eq!(link.client_data[slots::ROLE], Value::U8(AUTONOMOUS_PROXY));
    assert_eq!(link.client_data[slots::REMOTE_ROLE], Value::U8(AUTHORITY));
    assert_eq!(link.send(), None);
}

#[test]
fn roles_are_not_part_of_the_shared_history() {
    let mut link = pawn_link();
    link.sync();
    let end = link.changelist_state.history_end();

    link.set(slots::REMOTE_ROLE, Value::U8(AUTONOMOUS_PROXY));
    link.sync();
    assert_eq!(link.changelist_state.history_end(), end);
}

#[test]
fn swap_can_be_skipped() {
    let mut link = pawn_link();
    link.client.set_skip_role_swap(true);
    link.sync();

    assert_eq!(link.client_data[slots::ROLE], Value::U8(AUTHORITY));
    assert_eq!(link.client_data[slots::REMOTE_ROLE], Value::U8(SIMULATED_PROXY));
}
