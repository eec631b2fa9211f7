/// Conditional properties are held back per connection and released when
/// the connection's flags make them active.
use std::sync::Arc;

use replica_shared::{
    is_changelist_empty, BitReader, BitWriter, FieldDescriptor, HostType, IdentityResolver,
    Layout, ObjectReplicator, PacketIdRange, PropertyKind, RepChangelistState, RepCondition,
    ReplicationConfig, ReplicationFlags, TypeDescriptor, Value,
};
use replica_test::{assert_converged, character_layout, slots, TestLink};

fn scoreboard_layout() -> Arc<Layout> {
    Layout::compile(
        &TypeDescriptor::new("Scoreboard")
            .with_field(FieldDescriptor::property("round", PropertyKind::U16))
            .with_field(
                FieldDescriptor::property("score", PropertyKind::PackedInt)
                    .with_condition(RepCondition::Custom),
            )
            .with_field(
                FieldDescriptor::property("map_seed", PropertyKind::U64)
                    .with_condition(RepCondition::InitialOnly),
            )
            .with_field(
                FieldDescriptor::property("replay_marker", PropertyKind::Bool)
                    .with_condition(RepCondition::ReplayOnly),
            ),
    )
    .expect("scoreboard layout compiles")
}

const ROUND: usize = 0;
const SCORE: usize = 1;
const MAP_SEED: usize = 2;
const REPLAY_MARKER: usize = 3;

#[test]
fn owner_only_waits_for_ownership() {
    let mut link = TestLink::new(character_layout());
    link.set(slots::HEALTH, Value::F32(20.0));
    link.set(slots::SECRET, Value::U32(7));
    link.sync();

    assert_eq!(link.client_data[slots::HEALTH], Value::F32(20.0));
    assert_eq!(link.client_data[slots::SECRET], Value::U32(0));
    assert!(!is_changelist_empty(
        link.server.sending_state().inactive_changelist()
    ));

    link.flags.net_owner = true;
    assert!(link.send_and_deliver().is_some());
    assert_converged!(link);
    assert_eq!(link.server.sending_state().inactive_changelist(), &[0u16]);
}

#[test]
fn owner_only_changes_accumulate_while_inactive() {
    let mut link = TestLink::new(character_layout());
    link.set(slots::HEALTH, Value::F32(20.0));
    link.sync();

    link.set(slots::SECRET, Value::U32(1));
    link.sync();
    link.set(slots::SECRET, Value::U32(2));
    link.sync();
    assert_eq!(link.client_data[slots::SECRET], Value::U32(0));

    link.flags.net_owner = true;
    link.sync();
    assert_eq!(link.client_data[slots::SECRET], Value::U32(2));
}

#[test]
fn custom_condition_follows_the_tracker() {
    let mut link = TestLink::new(scoreboard_layout());
    link.set(ROUND, Value::U16(1));
    link.sync();

    link.changelist_state.set_custom_active(SCORE, false);
    link.set(SCORE, Value::U32(500));
    assert_eq!(link.send(), None);
    assert_eq!(link.client_data[SCORE], Value::U32(0));

    link.changelist_state.set_custom_active(SCORE, true);
    assert!(link.send_and_deliver().is_some());
    assert_eq!(link.client_data[SCORE], Value::U32(500));
}

/// Sends `data` to a fresh observer and returns what it decoded.
fn join(
    layout: &Arc<Layout>,
    config: &ReplicationConfig,
    changelist_state: &mut RepChangelistState,
    data: &[Value],
    frame: u32,
) -> Vec<Value> {
    let flags = ReplicationFlags {
        net_initial: true,
        ..ReplicationFlags::default()
    };
    let mut server =
        ObjectReplicator::new(layout.clone(), config, HostType::Authority, flags, false);
    let mut client =
        ObjectReplicator::new(layout.clone(), config, HostType::Observer, flags, false);
    let mut client_data = layout.default_data();

    let mut writer = BitWriter::new();
    let wrote = server
        .replicate_properties(changelist_state, data, frame, flags, &mut writer, &IdentityResolver)
        .expect("replicate");
    if wrote {
        server
            .post_send_bunch(PacketIdRange::single(1), true)
            .expect("post send");
        let bytes = writer.to_bytes();
        client
            .received_bunch(&mut client_data, &mut BitReader::new(&bytes), &IdentityResolver)
            .expect("received bunch");
    }
    client_data
}

fn late_joiner_view(share_serialized_data: bool) -> Vec<Value> {
    let layout = scoreboard_layout();
    let config = ReplicationConfig {
        share_serialized_data,
        ..ReplicationConfig::default()
    };
    let mut changelist_state = RepChangelistState::new(layout.clone(), &config);
    let mut data = layout.default_data();

    data[ROUND] = Value::U16(1);
    data[SCORE] = Value::U32(5);
    let first = join(&layout, &config, &mut changelist_state, &data, 1);
    assert_eq!(first[SCORE], Value::U32(5));

    changelist_state.set_custom_active(SCORE, false);
    data[SCORE] = Value::U32(7);
    join(&layout, &config, &mut changelist_state, &data, 2)
}

#[test]
fn late_joiner_skips_disabled_custom_parent() {
    let cached = late_joiner_view(true);
    let direct = late_joiner_view(false);

    assert_eq!(cached, direct);
    assert_eq!(cached[ROUND], Value::U16(1));
    assert_eq!(cached[SCORE], Value::U32(0));
}

#[test]
fn initial_only_is_sent_once() {
    let mut link = TestLink::new(scoreboard_layout());
    link.set(MAP_SEED, Value::U64(0xfeed));
    link.sync();
    assert_eq!(link.client_data[MAP_SEED], Value::U64(0xfeed));

    link.set(MAP_SEED, Value::U64(0xbeef));
    assert_eq!(link.send(), None);
    assert_eq!(link.client_data[MAP_SEED], Value::U64(0xfeed));
}

#[test]
fn replay_only_skips_live_connections() {
    let mut link = TestLink::new(scoreboard_layout());
    link.set(ROUND, Value::U16(3));
    link.set(REPLAY_MARKER, Value::Bool(true));
    link.sync();

    assert_eq!(link.client_data[ROUND], Value::U16(3));
    assert_eq!(link.client_data[REPLAY_MARKER], Value::Bool(false));
}
