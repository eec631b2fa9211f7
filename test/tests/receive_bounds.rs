/// A receiver enforces its own limits no matter what the sender wrote.
use replica_shared::{
    build_full_changelist, read_fast_array_delta, receive_properties, send_properties, BitReader,
    BitWriter, FastArrayValue, HostType, IdentityResolver, Layout, ObjectData, ObjectReplicator,
    ReceiveError, ReceivingRepState, ReplicationConfig, ReplicationFlags, Serde,
    UnsignedVariableInteger, Value,
};
use replica_test::{character_layout, item, item_descriptor, slots, TestResolver};

fn character_with_items(count: usize) -> ObjectData {
    let mut data = character_layout().default_data();
    data[slots::ITEMS] = Value::Array((0..count).map(|index| item(index as i32, 1)).collect());
    data
}

fn full_stream(data: &ObjectData) -> Vec<u8> {
    let layout = character_layout();
    let mut writer = BitWriter::new();
    send_properties(
        &layout,
        data,
        &build_full_changelist(&layout, data).expect("full changelist"),
        &mut writer,
        None,
        &[],
        &IdentityResolver,
    )
    .expect("send properties");
    writer.to_bytes()
}

fn receive_with(config: &ReplicationConfig, bytes: &[u8]) -> Result<ObjectData, ReceiveError> {
    let layout = character_layout();
    let mut state = ReceivingRepState::new(&layout);
    let mut data = layout.default_data();
    receive_properties(
        &layout,
        &mut state,
        &mut data,
        &mut BitReader::new(bytes),
        &TestResolver::everything(),
        config,
    )?;
    Ok(data)
}

#[test]
fn within_limits_is_accepted() {
    let data = character_with_items(10);
    let received = receive_with(&ReplicationConfig::default(), &full_stream(&data))
        .expect("stream within limits");
    assert_eq!(received[slots::ITEMS], data[slots::ITEMS]);
}

#[test]
fn element_count_is_bounded() {
    let config = ReplicationConfig {
        max_rep_array_size: 4,
        ..ReplicationConfig::default()
    };
    let result = receive_with(&config, &full_stream(&character_with_items(10)));
    assert!(matches!(
        result,
        Err(ReceiveError::ArrayTooLarge { count: 10, max: 4, .. })
    ));
}

#[test]
fn array_memory_is_bounded() {
    let config = ReplicationConfig {
        max_rep_array_memory: 30,
        ..ReplicationConfig::default()
    };
    match receive_with(&config, &full_stream(&character_with_items(10))) {
        Err(ReceiveError::ArrayMemoryExceeded { bytes, max, .. }) => {
            assert!(bytes > 30);
            assert_eq!(max, 30);
        }
        other => panic!("expected a memory bound error, got {:?}", other),
    }
}

#[test]
fn unknown_handle_is_rejected() {
    let mut writer = BitWriter::new();
    UnsignedVariableInteger::<7>::new(9u32).ser(&mut writer);
    UnsignedVariableInteger::<7>::new(0u32).ser(&mut writer);

    let result = receive_with(&ReplicationConfig::default(), &writer.to_bytes());
    assert_eq!(result, Err(ReceiveError::UnknownHandle { handle: 9 }));
}

#[test]
fn truncated_stream_is_rejected() {
    let mut data = character_with_items(3);
    data[slots::NAME] = Value::Str("a rather long name for a character".to_string());
    let bytes = full_stream(&data);

    let result = receive_with(&ReplicationConfig::default(), &bytes[..bytes.len() / 2]);
    assert!(matches!(result, Err(ReceiveError::Serde(_))));
}

#[test]
fn fast_array_counts_are_bounded() {
    let item_layout = Layout::compile(&item_descriptor()).expect("item layout");
    let mut writer = BitWriter::new();
    7i32.ser(&mut writer);
    UnsignedVariableInteger::<7>::new(5000u32).ser(&mut writer);
    UnsignedVariableInteger::<7>::new(0u32).ser(&mut writer);
    let bytes = writer.to_bytes();

    let mut array = FastArrayValue::new();
    let result = read_fast_array_delta(
        &item_layout,
        &mut array,
        &mut BitReader::new(&bytes),
        &IdentityResolver,
        &ReplicationConfig::default(),
        None,
    );
    assert_eq!(
        result,
        Err(ReceiveError::FastArrayTooLarge {
            count: 5000,
            max: 2048
        })
    );
    assert!(array.is_empty());
}

#[test]
fn custom_delta_header_must_name_a_fast_array() {
    let layout = character_layout();
    let mut observer = ObjectReplicator::new(
        layout.clone(),
        &ReplicationConfig::default(),
        HostType::Observer,
        ReplicationFlags::default(),
        false,
    );

    let mut writer = BitWriter::new();
    false.ser(&mut writer);
    UnsignedVariableInteger::<7>::new(2u32).ser(&mut writer);
    UnsignedVariableInteger::<7>::new(0u32).ser(&mut writer);
    let bytes = writer.to_bytes();

    let mut data = layout.default_data();
    let result = observer.received_bunch(&mut data, &mut BitReader::new(&bytes), &IdentityResolver);
    assert_eq!(
        result,
        Err(ReceiveError::UnknownCustomDeltaField { parent_index: 1 })
    );
}
