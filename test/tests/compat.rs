/// The self-describing format: recordings, replays and peers whose layout
/// differs from the sender's.
use std::sync::Arc;

use replica_shared::{
    BitReader, BitWriter, FieldDescriptor, HostType, IdentityResolver, Layout, ObjectReplicator,
    PropertyKind, ReceiveError, RepChangelistState, ReplicationConfig, ReplicationFlags,
    ResendAllDataState, TypeDescriptor, Value,
};
use replica_test::{assert_converged, character_layout, item, slots, TestLink};

fn hero_v2() -> Arc<Layout> {
    Layout::compile(
        &TypeDescriptor::new("Hero")
            .with_field(FieldDescriptor::property("health", PropertyKind::F32))
            .with_field(FieldDescriptor::property("mana", PropertyKind::U32))
            .with_field(FieldDescriptor::property("name", PropertyKind::Str)),
    )
    .expect("hero v2 compiles")
}

fn hero_v1() -> Arc<Layout> {
    Layout::compile(
        &TypeDescriptor::new("Hero")
            .with_field(FieldDescriptor::property("name", PropertyKind::Str))
            .with_field(FieldDescriptor::property("health", PropertyKind::F32)),
    )
    .expect("hero v1 compiles")
}

const MANA_EXPORT: u32 = 1;

fn recorded_hero_bunch(mana: u32) -> Vec<u8> {
    let layout = hero_v2();
    let config = ReplicationConfig::default();
    let flags = ReplicationFlags {
        net_initial: true,
        ..ReplicationFlags::default()
    };
    let mut changelist_state = RepChangelistState::new(layout.clone(), &config);
    let mut recorder =
        ObjectReplicator::new(layout.clone(), &config, HostType::Authority, flags, true);

    let data = vec![
        Value::F32(42.0),
        Value::U32(mana),
        Value::Str("zed".to_string()),
    ];
    let mut writer = BitWriter::new();
    assert!(recorder
        .replicate_properties(
            &mut changelist_state,
            &data,
            1,
            flags,
            &mut writer,
            &IdentityResolver,
        )
        .expect("replicate"));
    writer.to_bytes()
}

#[test]
fn observer_skips_unknown_properties() {
    let bytes = recorded_hero_bunch(9);
    let layout = hero_v1();
    let config = ReplicationConfig::default();
    let mut observer = ObjectReplicator::new(
        layout.clone(),
        &config,
        HostType::Observer,
        ReplicationFlags::default(),
        false,
    );
    let mut data = layout.default_data();

    observer
        .received_bunch(&mut data, &mut BitReader::new(&bytes), &IdentityResolver)
        .expect("observer tolerates the extra property");
    assert_eq!(data[0], Value::Str("zed".to_string()));
    assert_eq!(data[1], Value::F32(42.0));

    let mana = observer
        .receiving_state()
        .exports()
        .get(MANA_EXPORT)
        .expect("mana was announced");
    assert_eq!(mana.name, "mana");
    assert!(mana.incompatible);
}

#[test]
fn authority_refuses_unknown_properties() {
    let bytes = recorded_hero_bunch(9);
    let layout = hero_v1();
    let config = ReplicationConfig::default();
    let mut authority = ObjectReplicator::new(
        layout.clone(),
        &config,
        HostType::Authority,
        ReplicationFlags::default(),
        false,
    );
    let mut data = layout.default_data();

    let result =
        authority.received_bunch(&mut data, &mut BitReader::new(&bytes), &IdentityResolver);
    assert!(matches!(
        result,
        Err(ReceiveError::IncompatibleProperty { ref name, .. }) if name == "mana"
    ));
}

#[test]
fn recording_link_converges() {
    let mut link = TestLink::with_config(character_layout(), ReplicationConfig::default(), true);
    link.flags.net_owner = true;
    link.set(slots::HEALTH, Value::F32(5.0));
    link.set(slots::ITEMS, Value::Array(vec![item(1, 1), item(2, 2), item(3, 3)]));
    link.sync();
    assert_converged!(link);
    assert_eq!(link.server.sending_state().in_flight(), 0);

    link.set(slots::ITEMS, Value::Array(vec![item(1, 1)]));
    link.sync();
    assert_converged!(link);

    link.set(slots::ITEMS, Value::Array(vec![item(1, 1), item(7, 7)]));
    link.set(slots::NAME, Value::Str("scribe".to_string()));
    link.sync();
    assert_converged!(link);
}

fn fresh_observer(link: &mut TestLink) {
    let layout = link.server.layout().clone();
    link.client = ObjectReplicator::new(
        layout.clone(),
        &link.config,
        HostType::Observer,
        ReplicationFlags::default(),
        false,
    );
    link.client_data = layout.default_data();
}

#[test]
fn replay_resends_everything_since_open() {
    let mut link = TestLink::with_config(character_layout(), ReplicationConfig::default(), true);
    link.set(slots::HEALTH, Value::F32(5.0));
    link.set(slots::ITEMS, Value::Array(vec![item(1, 1), item(2, 2)]));
    link.sync();
    link.set(slots::NAME, Value::Str("later".to_string()));
    link.sync();

    fresh_observer(&mut link);
    link.server.start_replaying();
    assert!(link.send_and_deliver().is_some());
    assert_converged!(link);

    // the resend applies to a single send
    assert_eq!(link.send(), None);
}

#[test]
fn resend_since_checkpoint_skips_older_changes() {
    let mut link = TestLink::with_config(character_layout(), ReplicationConfig::default(), true);
    link.set(slots::HEALTH, Value::F32(5.0));
    link.sync();

    link.server.set_checkpoint();
    link.set(slots::NAME, Value::Str("after".to_string()));
    link.sync();

    fresh_observer(&mut link);
    link.server.set_resend_all(ResendAllDataState::SinceCheckpoint);
    assert!(link.send_and_deliver().is_some());
    assert_eq!(link.client_data[slots::NAME], Value::Str("after".to_string()));
    assert_eq!(link.client_data[slots::HEALTH], Value::F32(0.0));
}
