/// Properties of comparing object state and merging the resulting
/// changelists.
use proptest::prelude::*;

use replica_shared::{
    build_full_changelist, compare_properties, is_changelist_empty, merge_changelists,
    prune_changelist, ObjectData, SendError, Value,
};
use replica_test::{character_layout, item, slots};

fn state_strategy(num_items: usize) -> impl Strategy<Value = ObjectData> {
    (
        0u8..4,
        "[ab]{0,2}",
        prop::collection::vec((0i32..3, 0u16..3), num_items),
        0u32..3,
    )
        .prop_map(|(health, name, items, secret)| {
            let mut data = character_layout().default_data();
            data[slots::HEALTH] = Value::F32(f32::from(health));
            data[slots::NAME] = Value::Str(name);
            data[slots::ITEMS] = Value::Array(
                items
                    .into_iter()
                    .map(|(id, count)| item(id, count))
                    .collect(),
            );
            data[slots::SECRET] = Value::U32(secret);
            data
        })
}

fn changes_from_default(data: &ObjectData) -> Vec<u16> {
    let layout = character_layout();
    let mut shadow = layout.default_data();
    compare_properties(&layout, &mut shadow, data, false, None).expect("compare")
}

#[test]
fn full_changelist_names_every_element() {
    let layout = character_layout();
    let mut data = layout.default_data();
    data[slots::ITEMS] = Value::Array(vec![item(1, 1), item(2, 2)]);

    assert_eq!(
        build_full_changelist(&layout, &data).expect("full changelist"),
        vec![1, 2, 3, 4, 1, 2, 3, 4, 0, 4, 5, 0]
    );
}

#[test]
fn shrink_without_element_changes_keeps_an_empty_entry() {
    let layout = character_layout();
    let mut shadow = layout.default_data();
    let mut data = layout.default_data();
    data[slots::ITEMS] = Value::Array(vec![item(1, 1), item(2, 2)]);
    compare_properties(&layout, &mut shadow, &data, false, None).expect("compare");

    data[slots::ITEMS] = Value::Array(vec![item(1, 1)]);
    let changed = compare_properties(&layout, &mut shadow, &data, false, None).expect("compare");
    assert_eq!(changed, vec![3, 0, 0, 0]);
}

#[test]
fn pruning_drops_elements_past_the_live_length() {
    let layout = character_layout();
    let mut data = layout.default_data();
    data[slots::ITEMS] = Value::Array(vec![item(1, 1)]);

    let changed = [3, 3, 2, 3, 4, 0, 0];
    assert_eq!(prune_changelist(&layout, &data, &changed), vec![3, 1, 2, 0, 0]);
}

#[test]
fn arrays_past_the_handle_space_are_refused() {
    let layout = character_layout();
    let mut data = layout.default_data();
    data[slots::HEALTH] = Value::F32(5.0);

    // two handles per item, so 32767 items is the most that fits
    data[slots::ITEMS] = Value::Array(vec![item(1, 1); 32767]);
    let mut shadow = layout.default_data();
    assert!(compare_properties(&layout, &mut shadow, &data, false, None).is_ok());

    data[slots::ITEMS] = Value::Array(vec![item(1, 1); 32768]);
    let mut shadow = layout.default_data();
    let too_long = SendError::ArrayTooLong {
        name: "items".to_string(),
        len: 32768,
    };
    assert_eq!(
        compare_properties(&layout, &mut shadow, &data, false, None),
        Err(too_long.clone())
    );
    assert_eq!(shadow, layout.default_data());
    assert_eq!(build_full_changelist(&layout, &data), Err(too_long));
}

proptest! {
    #[test]
    fn compare_is_idempotent(data in state_strategy(3)) {
        let layout = character_layout();
        let mut shadow = layout.default_data();
        compare_properties(&layout, &mut shadow, &data, false, None).expect("compare");

        let again = compare_properties(&layout, &mut shadow, &data, false, None).expect("compare");
        prop_assert!(is_changelist_empty(&again));
        prop_assert_eq!(shadow, data);
    }

    #[test]
    fn merge_is_commutative(a in state_strategy(3), b in state_strategy(3)) {
        let layout = character_layout();
        let dirty_a = changes_from_default(&a);
        let dirty_b = changes_from_default(&b);

        prop_assert_eq!(
            merge_changelists(&layout, &b, &dirty_a, &dirty_b),
            merge_changelists(&layout, &b, &dirty_b, &dirty_a)
        );
    }

    #[test]
    fn merge_is_associative(
        a in state_strategy(2),
        b in state_strategy(2),
        c in state_strategy(2),
    ) {
        let layout = character_layout();
        let dirty_a = changes_from_default(&a);
        let dirty_b = changes_from_default(&b);
        let dirty_c = changes_from_default(&c);

        let left = merge_changelists(
            &layout,
            &c,
            &merge_changelists(&layout, &c, &dirty_a, &dirty_b),
            &dirty_c,
        );
        let right = merge_changelists(
            &layout,
            &c,
            &dirty_a,
            &merge_changelists(&layout, &c, &dirty_b, &dirty_c),
        );
        prop_assert_eq!(left, right);
    }

    #[test]
    fn merge_with_nothing_changes_nothing(a in state_strategy(3)) {
        let layout = character_layout();
        let dirty = changes_from_default(&a);
        prop_assert_eq!(merge_changelists(&layout, &a, &dirty, &[0]), dirty.clone());
        prop_assert_eq!(merge_changelists(&layout, &a, &[0], &dirty), dirty);
    }
}
