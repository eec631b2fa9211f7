/// Lost packets are resent from the authority's history until the observer
/// converges.
use proptest::prelude::*;

use replica_shared::Value;
use replica_test::{assert_converged, character_layout, item, slots, TestLink};

#[derive(Clone, Debug)]
enum Edit {
    Health(u8),
    Name(String),
    Items(usize),
    BumpItem(usize),
}

impl Edit {
    fn apply(&self, link: &mut TestLink) {
        match self {
            Edit::Health(health) => link.set(slots::HEALTH, Value::F32(f32::from(*health))),
            Edit::Name(name) => link.set(slots::NAME, Value::Str(name.clone())),
            Edit::Items(count) => {
                let items = (0..*count).map(|index| item(index as i32, 1)).collect();
                link.set(slots::ITEMS, Value::Array(items));
            }
            Edit::BumpItem(index) => {
                if let Value::Array(items) = &mut link.server_data[slots::ITEMS] {
                    if let Some(element) = items.get_mut(*index) {
                        let count = match element[1] {
                            Value::U16(count) => count.wrapping_add(1),
                            _ => 1,
                        };
                        element[1] = Value::U16(count);
                    }
                }
            }
        }
    }
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        any::<u8>().prop_map(Edit::Health),
        "[a-z]{0,6}".prop_map(Edit::Name),
        (0usize..6).prop_map(Edit::Items),
        (0usize..6).prop_map(Edit::BumpItem),
    ]
}

#[test]
fn lost_change_is_resent() {
    let mut link = TestLink::new(character_layout());
    link.set(slots::HEALTH, Value::F32(100.0));
    link.sync();

    link.set(slots::HEALTH, Value::F32(50.0));
    let lost = link.send().expect("health change is sent");
    link.drop_packet(lost);
    assert_eq!(link.server.sending_state().num_naks(), 1);

    assert!(link.send_and_deliver().is_some());
    assert_converged!(link);
    assert_eq!(link.server.sending_state().num_naks(), 0);
    assert_eq!(link.send(), None);
}

#[test]
fn lost_change_merges_with_newer_changes() {
    let mut link = TestLink::new(character_layout());
    link.set(slots::HEALTH, Value::F32(100.0));
    link.sync();

    link.set(slots::HEALTH, Value::F32(50.0));
    let lost = link.send().expect("health change is sent");
    link.set(slots::NAME, Value::Str("late".to_string()));
    let kept = link.send().expect("name change is sent");
    link.drop_packet(lost);
    link.deliver(kept);

    assert!(!link.is_converged());
    link.sync();
    assert_converged!(link);
}

#[test]
fn lost_shrink_is_resent() {
    let mut link = TestLink::new(character_layout());
    link.set(slots::ITEMS, Value::Array(vec![item(1, 1), item(2, 2)]));
    link.sync();

    link.set(slots::ITEMS, Value::Array(vec![item(1, 1)]));
    let lost = link.send().expect("shrink is sent");
    link.drop_packet(lost);
    link.sync();
    assert_converged!(link);
}

#[test]
fn dormancy_waits_for_acks() {
    let mut link = TestLink::new(character_layout());
    assert!(!link.server.ready_for_dormancy());

    link.set(slots::HEALTH, Value::F32(1.0));
    let packet = link.send().expect("initial state is sent");
    assert!(!link.server.ready_for_dormancy());

    link.deliver(packet);
    assert!(!link.server.ready_for_dormancy());
    assert_eq!(link.send(), None);
    assert!(link.server.ready_for_dormancy());

    link.set(slots::HEALTH, Value::F32(2.0));
    let packet = link.send().expect("change is sent");
    link.drop_packet(packet);
    assert!(!link.server.ready_for_dormancy());

    link.sync();
    assert!(link.server.ready_for_dormancy());
}

#[test]
fn stopping_replication_forgets_in_flight_sends() {
    let mut link = TestLink::new(character_layout());
    link.set(slots::HEALTH, Value::F32(1.0));
    link.sync();

    link.set(slots::HEALTH, Value::F32(2.0));
    link.send().expect("change is sent");
    assert_eq!(link.server.sending_state().in_flight(), 1);

    link.server.stop_replicating().expect("stop replicating");
    assert_eq!(link.server.sending_state().in_flight(), 0);
    assert_eq!(link.server.sending_state().num_naks(), 0);
}

proptest! {
    #[test]
    fn random_loss_converges(
        steps in prop::collection::vec((edit_strategy(), any::<bool>()), 1..24)
    ) {
        let mut link = TestLink::new(character_layout());
        let mut sent_any = false;
        for (edit, lose) in &steps {
            edit.apply(&mut link);
            if let Some(packet) = link.send() {
                sent_any = true;
                if *lose {
                    link.drop_packet(packet);
                } else {
                    link.deliver(packet);
                }
            }
        }

        link.sync();
        prop_assert!(link.is_converged());
        prop_assert_eq!(link.server.ready_for_dormancy(), sent_any);
    }
}
