/// References to objects the observer has not seen yet are retried until
/// the objects arrive.
use std::sync::Arc;

use replica_shared::{
    FieldDescriptor, FieldType, Layout, ObjectId, PropertyKind, TypeDescriptor, UnmappedUpdate,
    Value,
};
use replica_test::{character_layout, slots, TestLink, TestResolver};

fn waiting_link() -> TestLink {
    let mut link = TestLink::new(character_layout());
    link.resolver = TestResolver::new();
    link
}

#[test]
fn pending_reference_resolves_later() {
    let mut link = waiting_link();
    link.set(slots::TARGET, Value::Object(Some(ObjectId(42))));

    let bunch = link.send_and_deliver().expect("target is sent");
    assert!(bunch.outcome.has_unmapped);
    assert!(bunch.outcome.guids_changed);
    assert_eq!(link.client_data[slots::TARGET], Value::Object(None));
    assert!(link.client.receiving_state().has_unmapped());
    assert!(link.take_notifies().is_empty());

    assert_eq!(
        link.update_unmapped(),
        UnmappedUpdate {
            has_unmapped: true,
            mapped_any: false
        }
    );

    link.resolver.arrive(42);
    assert_eq!(
        link.update_unmapped(),
        UnmappedUpdate {
            has_unmapped: false,
            mapped_any: true
        }
    );
    assert_eq!(link.client_data[slots::TARGET], Value::Object(Some(ObjectId(42))));
    assert_eq!(link.take_notifies(), vec!["target".to_string()]);
}

#[test]
fn overwritten_reference_stops_waiting() {
    let mut link = waiting_link();
    link.resolver.arrive(7);
    link.set(slots::TARGET, Value::Object(Some(ObjectId(42))));
    link.sync();
    assert!(link.client.receiving_state().has_unmapped());

    link.set(slots::TARGET, Value::Object(Some(ObjectId(7))));
    let bunch = link.send_and_deliver().expect("new target is sent");
    assert!(!bunch.outcome.has_unmapped);
    assert!(bunch.outcome.guids_changed);
    assert!(!link.client.receiving_state().has_unmapped());
    assert_eq!(link.client_data[slots::TARGET], Value::Object(Some(ObjectId(7))));

    link.resolver.arrive(42);
    assert_eq!(link.update_unmapped(), UnmappedUpdate::default());
    assert_eq!(link.client_data[slots::TARGET], Value::Object(Some(ObjectId(7))));
}

#[test]
fn null_reference_is_not_tracked() {
    let mut link = waiting_link();
    link.set(slots::HEALTH, Value::F32(1.0));
    link.sync();
    assert!(!link.client.receiving_state().has_unmapped());
}

/// A fast array of squad members, each following a leader.
fn squad_layout() -> Arc<Layout> {
    let member = TypeDescriptor::new("Member")
        .with_field(FieldDescriptor::property("leader", PropertyKind::ObjectRef))
        .with_field(FieldDescriptor::property("rank", PropertyKind::U16));
    Layout::compile(
        &TypeDescriptor::new("Squad")
            .with_field(FieldDescriptor::new("members", FieldType::FastArray(Arc::new(member)))),
    )
    .expect("squad layout compiles")
}

#[test]
fn pending_reference_in_fast_array_item_resolves_later() {
    let mut link = TestLink::new(squad_layout());
    link.resolver = TestResolver::new();
    let id = link.server_data[0]
        .as_fast_array_mut()
        .expect("members is a fast array")
        .add_item(vec![Value::Object(Some(ObjectId(42))), Value::U16(3)]);

    let bunch = link.send_and_deliver().expect("member is sent");
    assert!(bunch.outcome.has_unmapped);
    assert!(link.client.receiving_state().has_unmapped());

    let members = link.client_data[0].as_fast_array().expect("members arrived");
    let index = members.find_by_id(id).expect("member arrived");
    assert_eq!(members.items[index].data[0], Value::Object(None));
    assert_eq!(members.items[index].data[1], Value::U16(3));
    link.take_notifies();

    link.resolver.arrive(42);
    assert_eq!(
        link.update_unmapped(),
        UnmappedUpdate {
            has_unmapped: false,
            mapped_any: true
        }
    );
    let members = link.client_data[0].as_fast_array().expect("members arrived");
    assert_eq!(members.items[index].data[0], Value::Object(Some(ObjectId(42))));
    assert_eq!(link.take_notifies(), vec!["members".to_string()]);
}

#[test]
fn removed_fast_array_item_stops_waiting() {
    let mut link = TestLink::new(squad_layout());
    link.resolver = TestResolver::new();
    link.server_data[0]
        .as_fast_array_mut()
        .expect("members is a fast array")
        .add_item(vec![Value::Object(Some(ObjectId(42))), Value::U16(1)]);
    link.sync();
    assert!(link.client.receiving_state().has_unmapped());

    link.server_data[0]
        .as_fast_array_mut()
        .expect("members is a fast array")
        .remove_item(0);
    link.sync();
    assert!(!link.client.receiving_state().has_unmapped());
}
