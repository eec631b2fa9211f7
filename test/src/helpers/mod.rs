pub mod assertions;
pub mod layouts;
pub mod link;

pub use layouts::{character_layout, inventory_layout, item, item_descriptor, pawn_layout, slots};
pub use link::TestLink;
pub use resolver::TestResolver;
