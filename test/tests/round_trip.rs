/// End-to-end replication of a character between an authority and an
/// observer over a lossless link.
use proptest::prelude::*;

use replica_shared::{ObjectData, ObjectId, Value};
use replica_test::{assert_converged, character_layout, item, slots, TestLink};

#[derive(Clone, Debug)]
struct CharacterState {
    health: f32,
    name: String,
    items: Vec<(i32, u16)>,
    secret: u32,
    target: Option<u64>,
}

impl CharacterState {
    fn apply(&self, data: &mut ObjectData) {
        data[slots::HEALTH] = Value::F32(self.health);
        data[slots::NAME] = Value::Str(self.name.clone());
        data[slots::ITEMS] = Value::Array(
            self.items
                .iter()
                .map(|(id, count)| item(*id, *count))
                .collect(),
        );
        data[slots::SECRET] = Value::U32(self.secret);
        data[slots::TARGET] = Value::Object(self.target.map(ObjectId));
    }
}

fn character_strategy() -> impl Strategy<Value = CharacterState> {
    (
        -1000.0f32..1000.0,
        "[a-z]{0,12}",
        prop::collection::vec((any::<i32>(), any::<u16>()), 0..8),
        any::<u32>(),
        prop::option::of(1u64..1000),
    )
        .prop_map(|(health, name, items, secret, target)| CharacterState {
            health,
            name,
            items,
            secret,
            target,
        })
}

fn owner_link() -> TestLink {
    let mut link = TestLink::new(character_layout());
    link.flags.net_owner = true;
    link
}

#[test]
fn initial_state_arrives() {
    let mut link = owner_link();
    link.set(slots::HEALTH, Value::F32(75.0));
    link.set(slots::NAME, Value::Str("ranger".to_string()));
    link.set(slots::ITEMS, Value::Array(vec![item(1, 3), item(2, 1)]));

    assert!(link.send_and_deliver().is_some());
    assert_converged!(link);
}

#[test]
fn default_object_sends_nothing() {
    let mut link = owner_link();
    assert_eq!(link.send(), None);
}

#[test]
fn unchanged_object_sends_nothing() {
    let mut link = owner_link();
    link.set(slots::HEALTH, Value::F32(10.0));
    assert_eq!(link.sync(), 1);

    assert_eq!(link.send(), None);
    assert_eq!(link.send(), None);
}

#[test]
fn changes_notify_once() {
    let mut link = owner_link();
    link.set(slots::HEALTH, Value::F32(10.0));
    link.sync();
    assert_eq!(link.take_notifies(), vec!["health".to_string()]);

    link.set(slots::NAME, Value::Str("quiet".to_string()));
    link.sync();
    assert!(link.take_notifies().is_empty());

    link.set(slots::ITEMS, Value::Array(vec![item(4, 4)]));
    link.sync();
    assert_eq!(link.take_notifies(), vec!["items".to_string()]);
}

#[test]
fn array_shrinks_and_grows() {
    let mut link = owner_link();
    link.set(
        slots::ITEMS,
        Value::Array(vec![item(1, 1), item(2, 2), item(3, 3)]),
    );
    link.sync();
    assert_converged!(link);

    link.set(slots::ITEMS, Value::Array(vec![item(1, 1)]));
    link.sync();
    assert_converged!(link);

    link.set(slots::ITEMS, Value::Array(Vec::new()));
    link.sync();
    assert_converged!(link);

    link.set(slots::ITEMS, Value::Array(vec![item(9, 9), item(8, 8)]));
    link.sync();
    assert_converged!(link);
}

#[test]
fn changing_one_element_is_cheaper_than_the_first_send() {
    let mut link = owner_link();
    let items = (0..16).map(|index| item(index, 1)).collect();
    link.set(slots::ITEMS, Value::Array(items));
    link.sync();
    let initial_bits = link.sent_bits();

    if let Value::Array(items) = &mut link.server_data[slots::ITEMS] {
        items[7][1] = Value::U16(2);
    }
    link.sync();
    assert_converged!(link);
    assert!(link.sent_bits() - initial_bits < initial_bits / 4);
}

proptest! {
    #[test]
    fn any_state_converges(state in character_strategy()) {
        let mut link = owner_link();
        state.apply(&mut link.server_data);
        link.sync();
        prop_assert!(link.is_converged());
    }

    #[test]
    fn any_sequence_of_states_converges(
        states in prop::collection::vec(character_strategy(), 1..6)
    ) {
        let mut link = owner_link();
        for state in &states {
            state.apply(&mut link.server_data);
            link.sync();
            prop_assert!(link.is_converged());
        }
        prop_assert_eq!(link.send(), None);
    }
}
