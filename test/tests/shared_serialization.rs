/// One compare and one encoding per frame, fanned out to every connection.
use replica_shared::{
    BitReader, BitWriter, HostType, IdentityResolver, ObjectId, ObjectReplicator, PacketIdRange,
    RepChangelistState, ReplicationConfig, ReplicationFlags, Value,
};
use replica_test::{assert_converged, character_layout, item, slots, TestLink};

fn edit(link: &mut TestLink, step: usize) {
    match step % 4 {
        0 => link.set(slots::HEALTH, Value::F32(step as f32)),
        1 => link.set(
            slots::ITEMS,
            Value::Array((0..step).map(|index| item(index as i32, 2)).collect()),
        ),
        2 => link.set(slots::TARGET, Value::Object(Some(ObjectId(step as u64)))),
        _ => link.set(slots::NAME, Value::Str(format!("step {}", step))),
    }
}

fn bunches(share_serialized_data: bool) -> Vec<Vec<u8>> {
    let config = ReplicationConfig {
        share_serialized_data,
        ..ReplicationConfig::default()
    };
    let mut link = TestLink::with_config(character_layout(), config, false);
    link.flags.net_owner = true;

    let mut bunches = Vec::new();
    for step in 1..10 {
        edit(&mut link, step);
        if let Some(packet) = link.send() {
            bunches.push(link.payload(packet).expect("packet in flight").to_vec());
            link.deliver(packet);
        }
    }
    assert_converged!(link);
    bunches
}

#[test]
fn cached_encoding_matches_direct_encoding() {
    let shared = bunches(true);
    let direct = bunches(false);
    assert!(!shared.is_empty());
    assert_eq!(shared, direct);
}

#[test]
fn cache_is_built_when_changes_are_recorded() {
    let mut link = TestLink::new(character_layout());
    link.set(slots::HEALTH, Value::F32(3.0));
    link.send();
    assert!(link.changelist_state.shared_serialization().is_valid());
    assert!(!link.changelist_state.shared_serialization().is_empty());
}

type Observer = (ObjectReplicator, Vec<Value>);

fn send_frame(
    frame: u32,
    data: &[Value],
    flags: ReplicationFlags,
    changelist_state: &mut RepChangelistState,
    servers: &mut [ObjectReplicator],
    clients: &mut [Observer],
) {
    for (index, (server, (client, client_data))) in
        servers.iter_mut().zip(clients.iter_mut()).enumerate()
    {
        let mut writer = BitWriter::new();
        let wrote = server
            .replicate_properties(
                changelist_state,
                data,
                frame,
                flags,
                &mut writer,
                &IdentityResolver,
            )
            .expect("replicate");
        if !wrote {
            continue;
        }
        let packet = frame as u16 * 2 + index as u16;
        server
            .post_send_bunch(PacketIdRange::single(packet), true)
            .expect("post send");
        let bytes = writer.to_bytes();
        client
            .received_bunch(client_data, &mut BitReader::new(&bytes), &IdentityResolver)
            .expect("received bunch");
        server.update_acked(packet).expect("ack");
    }
}

#[test]
fn one_compare_per_frame_for_every_connection() {
    let layout = character_layout();
    let config = ReplicationConfig::default();
    let mut changelist_state = RepChangelistState::new(layout.clone(), &config);
    let mut data = layout.default_data();
    let mut flags = ReplicationFlags {
        net_initial: true,
        ..ReplicationFlags::default()
    };

    let mut servers: Vec<ObjectReplicator> = (0..2)
        .map(|_| ObjectReplicator::new(layout.clone(), &config, HostType::Authority, flags, false))
        .collect();
    let mut clients: Vec<Observer> = (0..2)
        .map(|_| {
            (
                ObjectReplicator::new(layout.clone(), &config, HostType::Observer, flags, false),
                layout.default_data(),
            )
        })
        .collect();

    data[slots::HEALTH] = Value::F32(1.0);
    send_frame(1, &data, flags, &mut changelist_state, &mut servers, &mut clients);
    flags.net_initial = false;

    let before = changelist_state.compare_index();
    data[slots::NAME] = Value::Str("fan out".to_string());
    send_frame(2, &data, flags, &mut changelist_state, &mut servers, &mut clients);
    assert_eq!(changelist_state.compare_index(), before + 1);

    for (_, client_data) in &clients {
        assert_eq!(client_data, &data);
    }
}
